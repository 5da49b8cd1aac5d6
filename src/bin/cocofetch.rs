//! cocofetch CLI Tool
//!
//! Command-line interface for downloading the images listed in a COCO
//! annotation file.

#[cfg(feature = "cli")]
use cocofetch::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(2);
}
