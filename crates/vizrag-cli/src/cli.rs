use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "vizrag", version)]
#[command(about = "Answer data visualization questions from a reference document", long_about = None)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "Configuration file [default: ./vizrag.toml, then ~/.vizrag/config.toml]"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Index storage directory (overrides config)")]
    pub storage: Option<PathBuf>,

    #[arg(long, global = true, help = "Source document: PDF, text or markdown (overrides config)")]
    pub source: Option<PathBuf>,

    #[arg(long, global = true, help = "Groq API key (overrides GROQ_API_KEY and .groq_api_key)")]
    pub api_key: Option<String>,

    #[arg(long, global = true, help = "Groq model to use (overrides config)")]
    pub model: Option<String>,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Build and persist the index unless a current one exists")]
    Build {
        #[arg(long, help = "Rebuild even if the stored index is current")]
        force: bool,
    },

    #[command(about = "Ask a single question")]
    Ask {
        #[arg(help = "The question to answer")]
        query: String,

        #[arg(long, help = "Number of chunks to retrieve")]
        top_k: Option<usize>,

        #[arg(long, help = "Print the retrieved chunks with their scores")]
        show_context: bool,
    },

    #[command(about = "Start an interactive question loop")]
    Chat {
        #[arg(long, help = "Number of chunks to retrieve")]
        top_k: Option<usize>,
    },

    #[command(about = "Run the built-in evaluation questions")]
    Eval {
        #[arg(long, help = "Number of chunks to retrieve")]
        top_k: Option<usize>,
    },

    #[command(about = "Show the stored index and whether its source changed")]
    Status,
}
