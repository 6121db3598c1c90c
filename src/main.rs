use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use streamchat::config::Config;
use streamchat::tools::ToolRegistry;
use streamchat::transport;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "streamchat")]
#[command(author, version, about = "Streaming chat server and terminal client with tool calling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (chat endpoint and browser page)
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// LLM provider to use (openai, sim)
        #[arg(long)]
        provider: Option<String>,

        /// Model to request from the provider
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Chat with a running server from the terminal
    Chat {
        /// Server base URL
        #[arg(long, env = "STREAMCHAT_URL", default_value = "http://127.0.0.1:3000")]
        url: String,
    },

    /// Run a tool directly, without a model
    Tool {
        #[command(subcommand)]
        tool: ToolCommand,
    },
}

#[derive(Subcommand)]
enum ToolCommand {
    /// Square root rounded to a number of decimal places
    SquareRoot {
        #[arg(allow_negative_numbers = true)]
        number: f64,

        #[arg(short, long, default_value = "2")]
        decimal_places: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "streamchat=debug,tower_http=debug"
    } else {
        "streamchat=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Serve {
            host,
            port,
            provider,
            model,
        } => {
            let mut config = Config::load().context("Failed to load configuration")?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(provider) = provider {
                config.llm.provider = provider;
            }
            if let Some(model) = model {
                config.llm.openai.model = model;
            }
            tracing::info!(
                "Starting HTTP server on {}:{}",
                config.server.host,
                config.server.port
            );
            transport::run_http_server(config).await?;
        }
        Commands::Chat { url } => {
            transport::client::run_chat(&url).await?;
        }
        Commands::Tool {
            tool: ToolCommand::SquareRoot {
                number,
                decimal_places,
            },
        } => {
            let registry = ToolRegistry::with_defaults();
            let result = registry
                .execute(
                    "squareRoot",
                    serde_json::json!({ "number": number, "decimalPlaces": decimal_places }),
                )
                .await;
            match result.error_text() {
                None => println!("{}", result.output),
                Some(error) => anyhow::bail!(error),
            }
        }
    }

    Ok(())
}
