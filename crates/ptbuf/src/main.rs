mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edit_history::HistoryConfig;
use text_buffer::BuildOptions;
use tracing_subscriber::EnvFilter;

/// Inspect and edit text files through a piece-tree buffer
#[derive(Parser, Debug)]
#[command(name = "ptbuf", version)]
struct Args {
    /// JSON file with buffer build options
    #[arg(long, value_name = "PATH", global = true)]
    build_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print line, byte and character counts of a file
    Stats {
        file: PathBuf,

        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print every match as line:column
    Find {
        file: PathBuf,
        pattern: String,

        /// Treat the pattern as plain text instead of a regular expression
        #[arg(long)]
        literal: bool,

        #[arg(long, default_value_t = 1000)]
        limit: usize,
    },

    /// Replace every match and save the result
    ReplaceAll {
        file: PathBuf,
        pattern: String,
        replacement: String,

        #[arg(long)]
        literal: bool,

        /// Where to save, defaults to the input file
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Also write the edit history and cursor to this JSON file
        #[arg(long, value_name = "PATH")]
        state: Option<PathBuf>,

        /// JSON file with history settings
        #[arg(long, value_name = "PATH")]
        history_config: Option<PathBuf>,
    },

    /// Print the SHA-256 of a file
    Hash { file: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let options = match &args.build_config {
        Some(path) => BuildOptions::load_from_file(path)
            .with_context(|| format!("reading build options from {}", path.display()))?,
        None => BuildOptions::default(),
    };

    match args.command {
        Command::Stats { file, json } => {
            let buffer = commands::load(&file, &options)?;
            let stats = commands::stats(&buffer)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{stats}");
            }
        }
        Command::Find {
            file,
            pattern,
            literal,
            limit,
        } => {
            let buffer = commands::load(&file, &options)?;
            let query = commands::query(&pattern, literal)?;
            for range in commands::find_all(&buffer, &query, limit)? {
                println!("{}:{}", range.start_line, range.start_column);
            }
        }
        Command::ReplaceAll {
            file,
            pattern,
            replacement,
            literal,
            output,
            state,
            history_config,
        } => {
            let history = match &history_config {
                Some(path) => HistoryConfig::load_from_file(path)
                    .with_context(|| format!("reading history config from {}", path.display()))?,
                None => HistoryConfig::default(),
            };
            let query = commands::query(&pattern, literal)?;
            let request = commands::ReplaceRequest {
                input: &file,
                output: output.as_deref().unwrap_or(&file),
                state: state.as_deref(),
                query: &query,
                replacement: &replacement,
            };
            let report = commands::replace_all(&request, &options, &history)?;
            println!("{} replacement(s), sha256 {}", report.replaced, report.hash);
        }
        Command::Hash { file } => {
            let digest = text_buffer::hash_file(&file)
                .with_context(|| format!("hashing {}", file.display()))?;
            println!("{digest}  {}", file.display());
        }
    }

    Ok(())
}
