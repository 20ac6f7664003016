//! IDBuilder command line entry point.
//!
//! Loads configuration, builds the id service and runs one command.

use idbuilder_core::run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run().await
}
