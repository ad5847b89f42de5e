//! aptiq CLI: timed aptitude quizzes in the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "aptiq", version, about = "Offline timed aptitude quiz")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and a sample question bank
    Init,

    /// Validate question bank TOML files
    Validate {
        /// Path to a question bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// Seed the configured store if it holds no questions
    Seed,

    /// Show question bank counts by category and difficulty
    Stats,

    /// Play a timed quiz
    Play {
        /// User the session is recorded for
        #[arg(long)]
        user: String,

        /// Number of questions
        #[arg(long, default_value = "10")]
        count: usize,

        /// Only ask questions from this category
        #[arg(long)]
        category: Option<String>,

        /// Only ask questions of this difficulty
        #[arg(long)]
        difficulty: Option<String>,

        /// Mix difficulties in the configured proportions
        #[arg(long, conflicts_with_all = ["category", "difficulty"])]
        mixed: bool,
    },

    /// Show recent sessions and overall results for a user
    History {
        #[arg(long)]
        user: String,

        /// Number of sessions to list (default from config)
        #[arg(long)]
        limit: Option<usize>,

        /// Print sessions as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("aptiq=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Seed => commands::seed::execute(config).await,
        Commands::Stats => commands::stats::execute(config).await,
        Commands::Play {
            user,
            count,
            category,
            difficulty,
            mixed,
        } => commands::play::execute(config, user, count, category, difficulty, mixed).await,
        Commands::History { user, limit, json } => {
            commands::history::execute(config, user, limit, json).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
