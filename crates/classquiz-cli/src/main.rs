//! classquiz CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "classquiz", version, about = "Timed classroom quizzes and class results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a quiz interactively in the terminal
    Take {
        /// Quiz JSON file (document or bare question payload)
        #[arg(long, conflicts_with = "quiz_id")]
        quiz: Option<PathBuf>,

        /// Fetch the quiz assigned to --class-id with this id from the backend
        #[arg(long, requires = "class_id")]
        quiz_id: Option<String>,

        /// Class the attempt is recorded under
        #[arg(long)]
        class_id: Option<String>,

        /// Taker id
        #[arg(long)]
        student_id: String,

        /// Taker display name (defaults to the id)
        #[arg(long)]
        student_name: Option<String>,

        /// Keep the attempt in memory instead of posting it to the backend
        #[arg(long)]
        offline: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show statistics and the leaderboard for a quiz within a class
    Results {
        /// Quiz id
        #[arg(long)]
        quiz_id: String,

        /// Class id
        #[arg(long)]
        class_id: String,

        /// Read attempts from a JSON export instead of the backend
        #[arg(long)]
        from: Option<PathBuf>,

        /// Keep refreshing until interrupted
        #[arg(long)]
        watch: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,

        /// Also save the report as JSON to this path
        #[arg(long)]
        output: Option<PathBuf>,

        /// Minimum passing score (overrides config)
        #[arg(long)]
        pass_threshold: Option<u8>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Score a set of answers against a quiz
    Score {
        /// Quiz JSON file
        #[arg(long)]
        quiz: PathBuf,

        /// JSON array of answers, one per question ("" for unanswered)
        #[arg(long)]
        answers: PathBuf,
    },

    /// Validate quiz JSON files
    Validate {
        /// Path to a quiz file or directory
        #[arg(long)]
        quiz: PathBuf,
    },

    /// Create starter config and example quiz
    Init,
}

#[tokio::main]
async fn main() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "classquiz=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            quiz,
            quiz_id,
            class_id,
            student_id,
            student_name,
            offline,
            config,
        } => {
            commands::take::execute(commands::take::TakeArgs {
                quiz,
                quiz_id,
                class_id,
                student_id,
                student_name,
                offline,
                config,
            })
            .await
        }
        Commands::Results {
            quiz_id,
            class_id,
            from,
            watch,
            format,
            output,
            pass_threshold,
            config,
        } => {
            commands::results::execute(commands::results::ResultsArgs {
                quiz_id,
                class_id,
                from,
                watch,
                format,
                output,
                pass_threshold,
                config,
            })
            .await
        }
        Commands::Score { quiz, answers } => commands::score::execute(quiz, answers),
        Commands::Validate { quiz } => commands::validate::execute(quiz),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
