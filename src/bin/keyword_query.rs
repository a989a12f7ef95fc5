use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyword_lens::config::Settings;
use keyword_lens::request::Intent;
use keyword_lens::service::KeywordService;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "keyword_query")]
#[command(about = "Run one keyword operation against the live provider and print the table")]
struct Args {
    /// Seed for the history gap fill (entropy when omitted)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Phrase, exact-match or ASIN search
    Finder {
        input: String,

        /// ai-phrase | exact-match | asin-lookup
        #[arg(short = 't', long, default_value = "ai-phrase")]
        search_type: String,
    },
    /// Keyword universe expansion
    Universe {
        /// Newline or comma separated keywords
        #[arg(short, long, default_value = "")]
        keywords: String,

        /// Newline or comma separated ASINs
        #[arg(short, long, default_value = "")]
        asins: String,

        #[arg(short, long)]
        levels: Option<i64>,

        #[arg(long)]
        own_brand: Option<String>,
    },
    /// Monthly search volume history
    History { keywords: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::from_env()?;

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(settings.log_level.parse().unwrap_or(Level::WARN.into())),
        )
        .init();

    let mut service = KeywordService::from_settings(&settings)?;
    if let Some(seed) = args.seed {
        service = service.with_decay_seed(seed);
    }

    let table = match args.command {
        Command::Finder { input, search_type } => {
            let intent = Intent::from_search_type(&search_type)?;
            service.search(intent, &input).await?
        }
        Command::Universe {
            keywords,
            asins,
            levels,
            own_brand,
        } => {
            service
                .expand(&keywords, &asins, levels, own_brand.as_deref())
                .await?
        }
        Command::History { keywords } => service.history(&keywords).await?,
    };

    info!(rows = table.len(), "done");
    let out = serde_json::to_string_pretty(&table).context("serializing table")?;
    println!("{}", out);
    Ok(())
}
