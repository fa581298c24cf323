use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "finagent", about = "Memory-augmented trading advisor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the four-stage pipeline for one symbol and date
    Run {
        #[arg(long)]
        symbol: String,
        /// Trading date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Available cash
        #[arg(long, default_value = "0")]
        cash: f64,
        /// Shares currently held
        #[arg(long, default_value = "0")]
        position: u64,
        /// Candlestick chart image (png, jpg or webp)
        #[arg(long)]
        chart: Option<String>,
    },
    /// Run the pipeline over every trading day in a range
    Backfill {
        /// Symbol to process; repeat for several
        #[arg(long = "symbol", required = true)]
        symbols: Vec<String>,
        /// First date (YYYY-MM-DD)
        #[arg(long)]
        from: String,
        /// Last date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: String,
        #[arg(long, default_value = "0")]
        cash: f64,
        #[arg(long, default_value = "0")]
        position: u64,
        /// Seconds to wait between dates (defaults to FINAGENT_BACKFILL_PAUSE_SECS)
        #[arg(long)]
        pause_secs: Option<u64>,
    },
    /// Inspect the memory tiers
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// Record counts per tier
    Stats,
    /// Most recent records of a tier
    Peek {
        /// market, price_reflection or decision_reflection
        #[arg(long)]
        tier: String,
        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Similarity search within a tier
    Search {
        #[arg(long)]
        tier: String,
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "3")]
        limit: usize,
    },
}
