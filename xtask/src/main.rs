use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_mangen::Man;
use defaults_bind::cli::build_cli;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate man pages for dbind and each of its subcommands
    Manpage {
        /// Output directory for the man pages
        #[arg(short, long, default_value = "man/man1")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Commands::Manpage { dir } => generate_manpages(&dir),
    }
}

fn generate_manpages(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).context("Failed to create output directory")?;

    let cmd = build_cli();
    render(dir, "dbind", cmd.clone())?;
    for sub in cmd.get_subcommands() {
        let name = format!("dbind-{}", sub.get_name());
        render(dir, &name, sub.clone())?;
    }
    Ok(())
}

fn render(dir: &Path, name: &str, cmd: clap::Command) -> Result<()> {
    let file_path = dir.join(format!("{name}.1"));
    let mut file = File::create(&file_path)
        .with_context(|| format!("Failed to create {}", file_path.display()))?;
    Man::new(cmd)
        .title(name)
        .render(&mut file)
        .with_context(|| format!("Failed to render {name}"))?;
    println!("Manpage generated at: {}", file_path.display());
    Ok(())
}
