use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fs_shell::{RealFileSystem, Shell};

#[derive(Parser, Debug)]
#[command(name = "fs-shell")]
#[command(about = "Interactive shell for browsing and manipulating the filesystem", long_about = None)]
struct Cli {
    /// Directory to start in (defaults to the process working directory)
    #[arg(short = 'C', long)]
    directory: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let log_level = if cli.verbose { "debug" } else { "warn" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .target(env_logger::Target::Stderr)
        .init();

    let filesystem = match cli.directory {
        Some(dir) => RealFileSystem::rooted_at(&dir)
            .with_context(|| format!("Failed to start in {}", dir.display()))?,
        None => RealFileSystem::new().context("Failed to determine the current directory")?,
    };

    println!("Type 'help' for a list of commands.");

    let stdin = io::stdin();
    let stdout = io::stdout();

    let mut shell = Shell::new(filesystem, stdout.lock());
    shell.run(stdin.lock()).context("Shell loop failed")?;

    Ok(())
}
