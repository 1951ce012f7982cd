//! wattroll CLI entry point.

use wattroll_lib::cli::{self, Cli};
use wattroll_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the command
    cli::execute(cli).await
}
