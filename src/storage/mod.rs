//! Window storage.
//!
//! This module owns everything that touches window files:
//! - [`Window`] and [`Retention`]: the in-memory series and its merge rules
//! - [`WindowStore`]: atomic, lenient persistence of the four window files
//! - [`SampleStore`]: raw sample ingestion
//! - [`MaintenanceFile`]: the ingestion pause flag

pub mod maintenance;
pub mod persistence;
pub mod sample_store;
pub mod window;

// Re-export commonly used types
pub use maintenance::{MaintenanceFile, MaintenanceState};
pub use persistence::{load_window, save_window, write_json_atomic, WindowStore};
pub use sample_store::{IngestReport, RejectedSample, SampleStore};
pub use window::{Retention, Window};
