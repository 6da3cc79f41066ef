use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the translation provider endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a JSON segment file
    Translate {
        /// Input segment file (JSON array of {start, end, text})
        #[arg(short, long)]
        input: PathBuf,

        /// Output file; `.srt` writes subtitles, anything else writes JSON
        #[arg(short, long)]
        output: PathBuf,

        /// Source language code
        #[arg(short, long, default_value = "en")]
        source: String,

        /// Target language code
        #[arg(short, long)]
        target: String,
    },

    /// Translate a single string
    Text {
        /// Text to translate
        text: String,

        /// Source language code
        #[arg(short, long, default_value = "en")]
        source: String,

        /// Target language code
        #[arg(short, long)]
        target: String,
    },

    /// Probe the provider and print service metrics
    Status,

    /// List supported target languages
    Languages,
}
