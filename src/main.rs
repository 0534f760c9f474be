use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use hivetap::extraction::{self, Target};
use hivetap::volume;

#[derive(Parser)]
#[command(name = "hivetap")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract locked registry hives from a live NTFS system volume")]
struct Cli {
    /// Destination path for the SYSTEM hive
    system_dest: PathBuf,

    /// Destination path for the SAM hive
    sam_dest: PathBuf,

    /// Volume or disk image to read instead of auto-discovery
    #[arg(long)]
    volume: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_target(false).init();

    print_banner();

    if cli.volume.is_none() {
        println!("Discovering the system volume...");
    }
    let volume_path = volume::resolve_volume(cli.volume.as_deref())?;
    println!("Reading volume {volume_path}");
    println!();

    let targets = [
        Target::new("SYSTEM", cli.system_dest),
        Target::new("SAM", cli.sam_dest),
    ];

    let report = extraction::extract_all(&volume_path, &targets);

    println!();
    for (name, destination) in &report.saved {
        println!("{name} saved to {}", destination.display());
    }
    for (name, error) in &report.failed {
        eprintln!("{name}: {error}");
    }

    if !report.failed.is_empty() {
        anyhow::bail!(
            "{} of {} hives could not be extracted",
            report.failed.len(),
            targets.len()
        );
    }
    Ok(())
}

fn print_banner() {
    println!();
    println!("hivetap - locked hive extraction over raw NTFS metadata");
    println!();
}
