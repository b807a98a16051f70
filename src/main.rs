//! vibexpr - inspect, check and simplify encoded expression trees

use anyhow::Result;
use clap::{Parser as ClapParser, Subcommand};
use std::path::PathBuf;
use vibexpr::expression::registry::{self, Config};
use vibexpr::tool;

/// vibexpr - Inspect, check and simplify encoded expression trees
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Maximum whole-tree simplification passes
    #[arg(long, global = true, default_value_t = Config::new().max_passes)]
    max_passes: usize,

    /// Key mixed into redacted literals
    #[arg(long, global = true, default_value_t = 0)]
    redaction_key: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a file and print it as text
    Print {
        /// Encoded node or query
        file: PathBuf,

        /// Replace every literal with a random value of the same type
        #[arg(short, long)]
        redact: bool,
    },
    /// Decode a file and run the semantic checker on it
    Check {
        /// Encoded node or query
        file: PathBuf,
    },
    /// Decode a file, simplify it and print the result
    Simplify {
        /// Encoded node or query
        file: PathBuf,

        /// Also write the simplified tree to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    registry::configure(Config {
        max_passes: args.max_passes,
        redaction_key: args.redaction_key,
        ..Config::new()
    });

    match args.command {
        Command::Print { file, redact } => {
            let tree = tool::read(&file)?;
            println!("{}", tool::render(&tree, redact));
        }
        Command::Check { file } => {
            let tree = tool::read(&file)?;
            tool::check(&tree)?;
            log::info!("{}: ok", file.display());
        }
        Command::Simplify { file, output } => {
            let tree = tool::simplify(tool::read(&file)?);
            println!("{}", tool::render(&tree, false));
            if let Some(out) = output {
                tool::write(&out, &tree)?;
                log::info!("Wrote simplified tree to {}", out.display());
            }
        }
    }

    Ok(())
}
