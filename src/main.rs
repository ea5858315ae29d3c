use anyhow::Result;
use clap::{Parser, Subcommand};
use inferctl::commands::Command;
use inferctl::config::ConfigStore;
use inferctl::container::{DockerCli, InstanceId};
use inferctl::utils::ControllerError;
use log::debug;
use std::path::PathBuf;
use std::process::ExitCode;

/// Lifecycle controller for a local model server container
#[derive(Parser)]
#[command(name = "inferctl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "INFERCTL_CONFIG", default_value = "inferctl.json")]
    config: PathBuf,

    /// Name of the managed instance (defaults to the configured name)
    #[arg(long, env = "INFERCTL_INSTANCE")]
    instance: Option<String>,

    /// Container runtime binary
    #[arg(long, env = "INFERCTL_DOCKER", default_value = "docker")]
    docker: String,

    /// Do not wait for the instance to become ready
    #[arg(long)]
    no_wait: bool,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server with a model (defaults to the configured model)
    Start { model: Option<String> },
    /// Stop and remove the server
    Stop,
    /// Restart the server, optionally switching model
    Restart { model: Option<String> },
    /// Show the running model, drift and health
    Status,
    /// Start or restart the server if it does not match the configured model
    Check,
    /// List model directories and their weight artifacts
    Models,
    /// Show recent server output
    Logs {
        /// Number of lines from the end
        #[arg(long, default_value_t = 100)]
        tail: u32,
    },
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Start { model } => Command::Start { model },
            Commands::Stop => Command::Stop,
            Commands::Restart { model } => Command::Restart { model },
            Commands::Status => Command::Status,
            Commands::Check => Command::Check,
            Commands::Models => Command::Models,
            Commands::Logs { tail } => Command::Logs { tail: Some(tail) },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // Logs go to stderr so reports on stdout stay parseable
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = match e.downcast_ref::<ControllerError>() {
                Some(err) => err.user_message(),
                None => format!("{:#}", e),
            };
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let store = ConfigStore::new(cli.config);
    let settings = store.load()?;
    debug!("Loaded settings from {}: {:?}", store.path().display(), settings);

    let instance = cli.instance.map(InstanceId::new);
    let runtime = DockerCli::with_binary(cli.docker);
    let handler = inferctl::build_handler(store, &settings, runtime, instance)?
        .with_wait_for_health(!cli.no_wait);

    let report = handler.handle(cli.command.into()).await?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}
