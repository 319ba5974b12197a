use std::fs::{self, File};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use cab000::{
    ArchitectureVariant, Cab000Reader, DirectoryToken, LegacyHeader, Normalizer,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cab000tool")]
#[command(about = "Inspects Windows CE cabinet setup headers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decodes a .000 setup file and prints it as legacy JSON
    Decode {
        /// Path to the .000 file
        path: PathBuf,
    },

    /// Normalizes a .000 file or legacy JSON document into canonical JSON
    Normalize {
        /// Path to a .000 file or a legacy JSON document
        path: PathBuf,
        /// Device class whose directory aliases apply
        #[arg(short, long, default_value = "pocket-pc")]
        variant: ArchitectureVariant,
    },

    /// Lists the directory aliases of a device class
    Aliases {
        /// Device class to list
        #[arg(short, long, default_value = "pocket-pc")]
        variant: ArchitectureVariant,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    match Cli::parse().command {
        Command::Decode { path } => {
            let file = File::open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            let setup = Cab000Reader::new(file)
                .with_context(|| format!("Failed to decode {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(setup.header())?);
        }
        Command::Normalize { path, variant } => {
            let (header, architecture) = load_header(&path)?;
            let normalizer =
                Normalizer::new(variant).architecture(architecture);
            match normalizer.normalize(&header) {
                Ok(setup) => {
                    println!("{}", serde_json::to_string_pretty(&setup)?)
                }
                Err(report) => bail!("{}", report),
            }
        }
        Command::Aliases { variant } => {
            for token in DirectoryToken::all() {
                match token.path(variant) {
                    Some(path) => println!("{:<8} {}", token.to_string(), path),
                    None => println!("{:<8} (undefined)", token.to_string()),
                }
            }
        }
    }
    Ok(())
}

fn load_header(
    path: &Path,
) -> anyhow::Result<(LegacyHeader, Option<cab000::Architecture>)> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.starts_with(b"MSCE") {
        let setup = Cab000Reader::new(Cursor::new(bytes))
            .with_context(|| format!("Failed to decode {}", path.display()))?;
        let architecture = setup.architecture();
        Ok((setup.into_header(), architecture))
    } else {
        let header = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok((header, None))
    }
}
