use clap::{Parser, Subcommand};
use lib::gateway::{run_turn, InboundMessage};
use lib::session::SessionGateway;

#[derive(Parser)]
#[command(name = "fuelbridge")]
#[command(about = "Chatfuel webhook bridge to a Dialogflow agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Write a default config file (skipped when one exists).
    Init {
        /// Config file path (default: FUELBRIDGE_CONFIG_PATH or ~/.fuelbridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the webhook gateway. Dialogflow settings come from the config file and DF_PROJECT_ID / GOOGLE_APPLICATION_CREDENTIALS_JSON / BOT_SECRET.
    Gateway {
        /// Config file path (default: FUELBRIDGE_CONFIG_PATH or ~/.fuelbridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 3000)
        #[arg(long, short)]
        port: Option<u16>,

        /// Bind address (default from config or 127.0.0.1)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Send one message through the session gateway and print the reply payload.
    Query {
        /// Config file path (default: FUELBRIDGE_CONFIG_PATH or ~/.fuelbridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// User id; the same id continues the same Dialogflow session.
        #[arg(long, short, default_value = "cli")]
        user: String,

        /// Language tag (default from config)
        #[arg(long, short)]
        language: Option<String>,

        /// Message text
        text: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("fuelbridge {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port, bind }) => {
            if let Err(e) = run_gateway(config, port, bind).await {
                log::error!("gateway failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Query {
            config,
            user,
            language,
            text,
        }) => {
            if let Err(e) = run_query(config, user, language, text).await {
                log::error!("query failed: {}", e);
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
    if lib::config::init_config_file(&path)? {
        println!("wrote default configuration to {}", path.display());
    } else {
        println!("configuration already exists at {}", path.display());
    }
    Ok(())
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    log::debug!("using config {}", path.display());
    if let Some(p) = port {
        config.gateway.port = p;
    }
    if let Some(b) = bind {
        config.gateway.bind = b;
    }
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    lib::gateway::run_gateway(config).await
}

async fn run_query(
    config_path: Option<std::path::PathBuf>,
    user: String,
    language: Option<String>,
    text: String,
) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let settings = lib::config::resolve_dialogflow_settings(&config);
    let gateway = SessionGateway::new(settings);
    let msg = InboundMessage {
        user_id: user,
        text,
        language_code: language,
    };
    // Errors are reported as-is here rather than masked with the fallback text.
    let payload = run_turn(&gateway, &msg).await?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
