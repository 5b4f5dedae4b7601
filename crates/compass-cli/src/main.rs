//! compass CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;
mod config;

use commands::results::ResultFilter;
use commands::GlobalOpts;

#[derive(Parser)]
#[command(
    name = "compass",
    version,
    about = "Psychometric test assembly, scoring and reports"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// State file path (overrides the config)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create starter config and example item bank
    Init,

    /// Validate item bank TOML files
    Validate {
        /// Path to item bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// Build the state file from item banks and assemble every test
    Import {
        /// Path to item bank file or directory
        #[arg(long)]
        bank: PathBuf,

        /// Replace an existing state file
        #[arg(long)]
        force: bool,
    },

    /// Create a test, assembling it when clusters are attached
    NewTest {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: Option<String>,

        /// Create the test inactive
        #[arg(long)]
        inactive: bool,

        /// Cluster quota as CLUSTER or CLUSTER:P:R:SDB (repeatable)
        #[arg(long = "cluster")]
        clusters: Vec<String>,
    },

    /// Show or change the cluster quotas of a test
    Quota {
        #[arg(long)]
        test: u64,

        /// Attach or update a quota as CLUSTER or CLUSTER:P:R:SDB (repeatable)
        #[arg(long)]
        set: Vec<String>,

        /// Detach a cluster (repeatable)
        #[arg(long)]
        detach: Vec<u64>,
    },

    /// Regenerate the question list of a test (all tests when omitted)
    Assemble {
        #[arg(long)]
        test: Option<u64>,
    },

    /// Show the question sheet of a test
    Take {
        #[arg(long)]
        test: u64,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Score and store a set of answers
    Submit {
        #[arg(long)]
        test: u64,

        #[arg(long)]
        user: u64,

        /// JSON file with `[{"question_id": .., "value": ..}]`
        #[arg(long)]
        answers: Option<PathBuf>,

        /// Inline answer as QUESTION=VALUE (repeatable)
        #[arg(short, long)]
        answer: Vec<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show one result, or list results of a user or test
    Results {
        #[arg(long)]
        result: Option<u64>,

        #[arg(long)]
        user: Option<u64>,

        #[arg(long)]
        test: Option<u64>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Mark a result as reviewed
    Review {
        #[arg(long)]
        result: u64,

        #[arg(long)]
        expert: u64,
    },

    /// Render the report of a result
    Report {
        #[arg(long)]
        result: u64,

        /// Set the report summary
        #[arg(long)]
        summary: Option<String>,

        /// Set the report recommendations
        #[arg(long)]
        recommendations: Option<String>,

        /// Output format: json, html
        #[arg(long, default_value = "json")]
        format: String,

        /// Output directory (defaults to `output_dir` from the config)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("compass=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let opts = GlobalOpts {
        config: cli.config,
        state: cli.state,
    };

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Import { bank, force } => commands::import::execute(&opts, bank, force).await,
        Commands::NewTest {
            title,
            description,
            inactive,
            clusters,
        } => commands::quota::create(&opts, title, description, inactive, clusters).await,
        Commands::Quota { test, set, detach } => {
            commands::quota::execute(&opts, test, set, detach).await
        }
        Commands::Assemble { test } => commands::assemble::execute(&opts, test).await,
        Commands::Take { test, format } => commands::take::execute(&opts, test, format).await,
        Commands::Submit {
            test,
            user,
            answers,
            answer,
            format,
        } => commands::submit::execute(&opts, test, user, answers, answer, format).await,
        Commands::Results {
            result,
            user,
            test,
            format,
        } => match (result, user, test) {
            (Some(id), None, None) => {
                commands::results::execute(&opts, ResultFilter::One(id), format).await
            }
            (None, Some(id), None) => {
                commands::results::execute(&opts, ResultFilter::User(id), format).await
            }
            (None, None, Some(id)) => {
                commands::results::execute(&opts, ResultFilter::Test(id), format).await
            }
            _ => Err(anyhow::anyhow!(
                "exactly one of --result, --user or --test is required"
            )),
        },
        Commands::Review { result, expert } => {
            commands::review::execute(&opts, result, expert).await
        }
        Commands::Report {
            result,
            summary,
            recommendations,
            format,
            output,
        } => {
            commands::report::execute(&opts, result, summary, recommendations, format, output)
                .await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
