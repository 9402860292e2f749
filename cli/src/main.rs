use anyhow::Result;
use appointbot_core::config::{self, Config};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod chat;
mod onboard;
mod server;

#[derive(Parser)]
#[command(name = "appointbot")]
#[command(about = "appointbot - doctor appointment booking assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the LLM service and record files
    Onboard,
    /// Talk to the assistant in the terminal
    Chat {
        #[arg(short, long)]
        message: Option<String>,
        /// Conversation thread to continue
        #[arg(short, long)]
        thread: Option<String>,
    },
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Onboard
        } else {
            Commands::Chat {
                message: None,
                thread: None,
            }
        }
    });

    match command {
        Commands::Onboard => {
            let onboard_config = onboard::run_onboard().map_err(|e| {
                eprintln!("❌ Onboarding failed: {}", e);
                anyhow::anyhow!("Onboarding failed: {}", e)
            })?;
            config::save_config(&onboard_config)?;
        }
        Commands::Chat { message, thread } => {
            init_tracing("warn");
            let config = Config::load_or_init()?;
            let app = app::build(&config)?;
            let thread_id = thread.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            match message {
                Some(msg) => chat::run_once(&app.agent, &msg, &thread_id).await?,
                None => chat::run_repl(&app.agent, thread_id).await?,
            }
        }
        Commands::Serve { host, port } => {
            init_tracing("appointbot=info,appointbot_core=info,tower_http=debug");
            let mut config = Config::load_or_init()?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }

            tracing::info!(
                service = config.provider_name(),
                model = config.model_name(),
                "starting appointment service"
            );
            let app = app::build(&config)?;
            server::serve(app, &config.host, config.port).await?;
        }
    }

    Ok(())
}
