mod config;
mod error;
mod render;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use runtime::crypto::{MarketQuery, PriceQuery};
use runtime::{Conversation, CryptoTools, McpToolHost, ToolHost};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::Result;

#[derive(Parser)]
#[command(name = "cryptochat")]
#[command(about = "Chat about crypto markets through an MCP tool server")]
#[command(long_about = None)]
#[command(version)]
struct Cli {
    /// Tool server URL (overrides CRYPTOCHAT_SERVER_URL and the config file)
    #[arg(long, global = true)]
    server_url: Option<String>,

    /// Config file path (default: ./cryptochat.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// The question
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// List the tools the server offers
    Tools,
    /// Show current prices
    Price {
        /// Comma-separated coin ids
        #[arg(long, default_value = "bitcoin")]
        ids: String,
        /// Comma-separated quote currencies
        #[arg(long, default_value = "usd,eur")]
        vs: String,
    },
    /// List known coins
    Coins {
        /// Show at most N coins
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show coins ranked by market cap
    Markets {
        /// Quote currency
        #[arg(long, default_value = "usd")]
        vs: String,
        /// Number of coins
        #[arg(short, long, default_value = "10")]
        limit: u32,
        /// Restrict to a category
        #[arg(long)]
        category: Option<String>,
    },
    /// Show trending coins
    Trending,
    /// Bitcoin price, top coins and trending coins at a glance
    Dashboard,
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(url) = cli.server_url {
        config.server.url = url;
    }

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(&config).await,
        Some(Commands::Ask { query }) => cmd_ask(&config, &query.join(" ")).await,
        Some(Commands::Tools) => {
            let host = connect(&config).await?;
            print!("{}", render::tools(host.specs()));
            close(host).await;
            Ok(())
        }
        Some(Commands::Price { ids, vs }) => {
            let host = connect(&config).await?;
            let query = PriceQuery::ids(ids).vs_currencies(vs);
            let prices = CryptoTools::new(&host).get_price(&query).await;
            close(host).await;
            print!("{}", render::prices(&prices?));
            Ok(())
        }
        Some(Commands::Coins { limit }) => {
            let host = connect(&config).await?;
            let coins = CryptoTools::new(&host).get_coin_list().await;
            close(host).await;
            print!("{}", render::coins(&coins?, limit));
            Ok(())
        }
        Some(Commands::Markets { vs, limit, category }) => {
            let host = connect(&config).await?;
            let query = MarketQuery {
                vs_currency: vs,
                category,
                per_page: limit,
                ..MarketQuery::default()
            };
            let rows = CryptoTools::new(&host).get_market_data(&query).await;
            close(host).await;
            print!("{}", render::markets(&rows?));
            Ok(())
        }
        Some(Commands::Trending) => {
            let host = connect(&config).await?;
            let trending = CryptoTools::new(&host).get_trending().await;
            close(host).await;
            print!("{}", render::trending(&trending?));
            Ok(())
        }
        Some(Commands::Dashboard) => cmd_dashboard(&config).await,
    }
}

async fn connect(config: &Config) -> Result<McpToolHost> {
    let host = McpToolHost::connect(config.client_config())
        .await?
        .with_prompt_templates(config.server.attach_prompts);
    Ok(host)
}

async fn close(host: McpToolHost) {
    if let Err(e) = host.shutdown().await {
        warn!(error = %e, "failed to close tool server connection");
    }
}

async fn cmd_ask(config: &Config, query: &str) -> Result<()> {
    let backend = config.backend()?;
    let host = connect(config).await?;

    let mut conversation = Conversation::new(backend, host);
    let answer = conversation.process_query(query).await?;
    println!("{answer}");
    Ok(())
}

async fn cmd_chat(config: &Config) -> Result<()> {
    println!("cryptochat v{}", env!("CARGO_PKG_VERSION"));

    let backend = config.backend()?;
    let host = connect(config).await?;

    println!("Server: {}", config.server.url);
    println!("Model: {}", backend.model());
    println!(
        "Tools: {}",
        host.specs()
            .iter()
            .map(|spec| spec.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let mut conversation = Conversation::new(backend, host);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        match conversation.process_query(input).await {
            Ok(response) => {
                println!("\n{response}\n");
            }
            Err(e) => {
                eprintln!("Error: {e}\n");
            }
        }
    }

    let usage = conversation.usage();
    println!(
        "\nSession ended. Tokens used: {} in, {} out.",
        usage.input_tokens, usage.output_tokens
    );
    Ok(())
}

async fn cmd_dashboard(config: &Config) -> Result<()> {
    let host = connect(config).await?;
    let tools = CryptoTools::new(&host);

    let price = tools
        .get_price(&PriceQuery::ids("bitcoin").vs_currencies("usd,eur"))
        .await;
    let markets = tools
        .get_market_data(&MarketQuery {
            per_page: 10,
            ..MarketQuery::default()
        })
        .await;
    let trending = tools.get_trending().await;
    close(host).await;

    // Each section fails independently.
    println!("== Bitcoin ==");
    match price {
        Ok(table) => print!("{}", render::prices(&table)),
        Err(e) => eprintln!("Error: {e}"),
    }
    println!("\n== Top 10 by market cap ==");
    match markets {
        Ok(rows) => print!("{}", render::markets(&rows)),
        Err(e) => eprintln!("Error: {e}"),
    }
    println!("\n== Trending ==");
    match trending {
        Ok(response) => print!("{}", render::trending(&response)),
        Err(e) => eprintln!("Error: {e}"),
    }
    Ok(())
}
