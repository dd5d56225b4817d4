//! MQSC configuration sync loop.
//!
//! Polls a GitHub repository for `.mqsc` files and applies each one to a local
//! queue manager through `runmqsc`, forever. All configuration is read once at
//! startup, from the environment (or the equivalent flags).

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use mqsync::discover::discover;
use mqsync::exit_codes;
use mqsync::io::config::{StartupValues, SyncConfig, load_settings};
use mqsync::io::executor::EngineExecutor;
use mqsync::io::source::GithubSource;
use mqsync::logging::{self, LogFormat};
use mqsync::looping::{ThreadSleeper, run_loop};

#[derive(Parser)]
#[command(
    name = "mqsync",
    version,
    about = "Continuously apply MQSC files from a GitHub repository to a queue manager"
)]
struct Cli {
    #[command(flatten)]
    startup: StartupArgs,

    /// Optional TOML file with tuning settings (suffix, engine, timeouts, limits).
    #[arg(long, env = "MQSYNC_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "MQSYNC_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug, Clone)]
struct StartupArgs {
    /// Access token for the GitHub API (may be empty for public repositories).
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, default_value = "")]
    github_token: String,
    #[arg(long, env = "GITHUB_REPO_OWNER", default_value = "")]
    github_repo_owner: String,
    #[arg(long, env = "GITHUB_REPO_NAME", default_value = "")]
    github_repo_name: String,
    /// Directory (or single file) inside the repository to sync from.
    #[arg(long, env = "GITHUB_REPO_PATH", default_value = "")]
    github_repo_path: String,
    /// Branch, tag or commit to read from (default branch when empty).
    #[arg(long, env = "GITHUB_REPO_REF", default_value = "")]
    github_repo_ref: String,
    /// Time between cycles, e.g. `30s`, `5m`, `1h30m`.
    #[arg(long, env = "GITHUB_POLL_INTERVAL", default_value = "")]
    github_poll_interval: String,
    #[arg(long, env = "QUEUE_MANAGER_NAME", default_value = "")]
    queue_manager_name: String,
}

impl From<StartupArgs> for StartupValues {
    fn from(args: StartupArgs) -> Self {
        Self {
            token: args.github_token,
            owner: args.github_repo_owner,
            repo: args.github_repo_name,
            root_path: args.github_repo_path,
            reference: args.github_repo_ref,
            poll_interval: args.github_poll_interval,
            queue_manager: args.queue_manager_name,
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the sync loop until the process is killed (default).
    Run,
    /// Run a single cycle and exit.
    Once,
    /// Print the configuration files that would be applied, one per line.
    Discover,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format);
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!(err = %format!("{err:#}"), "startup failed");
            exit_codes::STARTUP
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let settings = load_settings(cli.config.as_deref())?;
    let values = StartupValues::from(cli.startup);

    match cli.command.unwrap_or(Command::Run) {
        Command::Discover => {
            let location = values.location()?;
            let source = GithubSource::new(
                settings.api_base.clone(),
                values.token.clone(),
                &location,
                settings.http_timeout(),
            );
            let paths = discover(&source, &location, &settings.suffix)?;
            for path in paths {
                println!("{path}");
            }
            Ok(exit_codes::OK)
        }
        command => {
            let config = SyncConfig::build(&values, settings)?;
            let source = GithubSource::from_config(&config);
            let processor = EngineExecutor::from_config(&config);
            let max_cycles = (command == Command::Once).then_some(1);

            info!(
                owner = %config.location.owner,
                repo = %config.location.repo,
                path = %config.location.root_path,
                reference = %config.location.reference,
                queue_manager = %config.queue_manager,
                engine = %config.engine_path.display(),
                interval_secs = config.poll_interval.as_secs_f64(),
                "starting mq config sync loop"
            );
            run_loop(
                &config,
                &source,
                &processor,
                &ThreadSleeper,
                max_cycles,
                |_| {},
            );
            Ok(exit_codes::OK)
        }
    }
}
