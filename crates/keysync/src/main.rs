//! keysync: rotate a token file and sync a git working copy on a schedule.
//!
//! Main binary with subcommands:
//! - `run`: Generate, wait, sync, repeat
//! - `check`: Validate run parameters and print the resulting configuration
//! - `token`: Generate a single token

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keysync_scheduler::{DEFAULT_SEED_PREFIX, HashTokenSource, RawInput, TokenSource, validate};

mod render;
mod run;

use render::OutputFormat;

#[derive(Parser)]
#[command(name = "keysync")]
#[command(about = "Scheduled token rotation with git sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Run parameters, taken as text and checked by the validator.
#[derive(Args, Debug)]
struct RunParams {
    /// Number of iterations (max 1000)
    #[arg(long, env = "KEYSYNC_ITERATIONS", allow_hyphen_values = true)]
    iterations: String,

    /// Base wait between token generation and sync
    #[arg(long, env = "KEYSYNC_WAIT", allow_hyphen_values = true)]
    wait: String,

    /// Unit of --wait: seconds or minutes
    #[arg(long, env = "KEYSYNC_UNIT", default_value = "minutes")]
    unit: String,

    /// Wait after a failed sync, in minutes (max 60)
    #[arg(long, env = "KEYSYNC_PROBLEM_WAIT", allow_hyphen_values = true)]
    problem_wait: String,
}

impl RunParams {
    fn raw_input(&self) -> RawInput {
        RawInput {
            iterations: self.iterations.clone(),
            wait: self.wait.clone(),
            unit: self.unit.clone(),
            problem_wait: self.problem_wait.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the token and sync loop
    Run {
        #[command(flatten)]
        params: RunParams,

        /// Git working copy to sync
        #[arg(long, env = "KEYSYNC_REPO_DIR", default_value = ".")]
        repo_dir: PathBuf,

        /// Token file, relative to the repository unless absolute
        #[arg(long, env = "KEYSYNC_TOKEN_FILE", default_value = "key.txt")]
        token_file: PathBuf,

        /// Remote to pull from and push to
        #[arg(long, env = "KEYSYNC_REMOTE", default_value = "origin")]
        remote: String,

        /// Branch to pull and push
        #[arg(long, env = "KEYSYNC_BRANCH", default_value = "main")]
        branch: String,

        /// Commit message for every sync
        #[arg(long, env = "KEYSYNC_COMMIT_MESSAGE", default_value = "update")]
        commit_message: String,

        /// Treat "nothing to commit" as success instead of a failed attempt
        #[arg(long, env = "KEYSYNC_BENIGN_EMPTY_COMMIT")]
        benign_empty_commit: bool,

        /// Prefix hashed into each token
        #[arg(long, env = "KEYSYNC_SEED_PREFIX", default_value = DEFAULT_SEED_PREFIX)]
        seed_prefix: String,

        /// Event output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate run parameters and print the resulting configuration
    Check {
        #[command(flatten)]
        params: RunParams,
    },

    /// Generate a single token
    Token {
        /// Write the token to this file instead of printing it
        #[arg(long)]
        write: Option<PathBuf>,

        /// Prefix hashed into the token
        #[arg(long, env = "KEYSYNC_SEED_PREFIX", default_value = DEFAULT_SEED_PREFIX)]
        seed_prefix: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "keysync=info,keysync_scheduler=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            params,
            repo_dir,
            token_file,
            remote,
            branch,
            commit_message,
            benign_empty_commit,
            seed_prefix,
            format,
        } => {
            run::run(
                &params.raw_input(),
                run::RunOptions {
                    repo_dir,
                    token_file,
                    remote,
                    branch,
                    commit_message,
                    benign_empty_commit,
                    seed_prefix,
                    format,
                },
            )
            .await
        }

        Commands::Check { params } => check(&params),

        Commands::Token { write, seed_prefix } => token(write, &seed_prefix).await,
    }
}

fn check(params: &RunParams) -> Result<()> {
    let config = validate(&params.raw_input())
        .map_err(|e| miette::miette!("invalid run parameters: {}", e))?;
    let json = serde_json::to_string_pretty(&config).map_err(|e| miette::miette!("{}", e))?;
    println!("{}", json);
    Ok(())
}

async fn token(write: Option<PathBuf>, seed_prefix: &str) -> Result<()> {
    let token = HashTokenSource::new(seed_prefix).generate();
    match write {
        Some(path) => {
            keysync_scheduler::write_token(&path, &token)
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            tracing::info!(path = %path.display(), "token written");
        }
        None => println!("{}", token),
    }
    Ok(())
}
