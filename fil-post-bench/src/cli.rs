use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::bench::BenchParams;

#[derive(Debug, Parser)]
#[clap(name = "post-bench", version, about = "Window PoSt benchmark")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a Window PoSt over the sectors listed in a file.
    Bench {
        /// File with one sector number per line.
        #[clap(long, forbid_empty_values = true)]
        file: PathBuf,
        /// Directory with the sealed sector data.
        #[clap(long, forbid_empty_values = true)]
        db: PathBuf,
        /// Miner actor address, e.g. f01234.
        #[clap(long)]
        actor: Option<String>,
    },
}

impl From<Command> for BenchParams {
    fn from(command: Command) -> Self {
        match command {
            Command::Bench { file, db, actor } => BenchParams {
                sector_file: file,
                data_dir: db,
                actor,
            },
        }
    }
}

/// Writes `output` as a single line of JSON.
pub fn write_json<W: Write, T: Serialize>(mut writer: W, output: T) -> Result<()> {
    serde_json::to_writer(&mut writer, &output)?;
    writeln!(writer)?;
    Ok(())
}

pub fn print_stdout<T: Serialize>(output: T) -> Result<()> {
    let stdout = io::stdout();
    write_json(stdout.lock(), output)
}
