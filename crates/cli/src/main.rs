use clap::{Parser, Subcommand};
use lib::channels::NotificationSink;

#[derive(Parser)]
#[command(name = "quip-relay")]
#[command(about = "Forward Quip live chat messages to Slack", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a template config.yaml.
    Init {
        /// Config file path (default: QUIP_RELAY_CONFIG or ~/.quip-relay/config.yaml)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Load and validate the configuration without connecting.
    Check {
        /// Config file path (default: QUIP_RELAY_CONFIG or ~/.quip-relay/config.yaml)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the relay: keep the Quip websocket open and forward chat messages until Ctrl+C.
    Run {
        /// Config file path (default: QUIP_RELAY_CONFIG or ~/.quip-relay/config.yaml)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Post a one-off message to Slack to test the sink configuration.
    Notify {
        /// Message text.
        text: String,

        /// Send to the status channel instead of the message channel.
        #[arg(long)]
        status: bool,

        /// Config file path (default: QUIP_RELAY_CONFIG or ~/.quip-relay/config.yaml)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("quip-relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Check { config }) => {
            if let Err(e) = run_check(config) {
                log::error!("check failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config }) => {
            if let Err(e) = run_relay(config).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Notify {
            text,
            status,
            config,
        }) => {
            if let Err(e) = run_notify(config, text, status).await {
                log::error!("notify failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

fn run_check(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    config.validate()?;
    println!("configuration at {} is valid", path.display());
    Ok(())
}

async fn run_relay(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    log::info!("starting relay with config {}", path.display());
    lib::relay::run_relay(config).await
}

async fn run_notify(
    config_path: Option<std::path::PathBuf>,
    text: String,
    status: bool,
) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let channel = if status {
        config.status_channel()
    } else {
        config.primary_channel()
    };
    let channel = channel.ok_or_else(|| {
        anyhow::anyhow!(
            "{} is not set",
            if status { "slack.statusChannel" } else { "slack.channel" }
        )
    })?;
    let sink = lib::relay::slack_sink(&config)?;
    sink.post(&text, &channel, &[]).await?;
    println!("sent to {}", channel);
    Ok(())
}
