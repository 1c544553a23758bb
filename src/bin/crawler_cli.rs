// src/bin/crawler_cli.rs
use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use ticker_crawler::crawler::partition_evenly;
use ticker_crawler::symbols::{bucket_letter, SurveyCandidates};
use ticker_crawler::{
    CrawlerConfig, HttpQuoteFetcher, MarketClock, ModeSource, PriceSnapshot, QuoteSource,
    TickerStore, TickerSymbol,
};

#[derive(Parser)]
#[command(name = "crawler-cli")]
#[command(about = "Inspect the ticker crawler's clock, store and fetcher", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mode the market clock asks for right now.
    Mode,
    /// Fetch one live quote.
    Fetch { symbol: String },
    /// List a letter's validated tickers, or per-letter counts without one.
    Tickers { letter: Option<char> },
    /// Next survey candidates for a letter, resuming after its stored cursor.
    Candidates {
        letter: char,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Stored snapshots for a ticker, newest last.
    History {
        symbol: String,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Preview how the index would be split across workers at market open.
    Partition {
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let config = CrawlerConfig::from_env()?;

    match command {
        Commands::Mode => {
            let clock = MarketClock::new(config.market_hours);
            let local = Utc::now().with_timezone(&config.market_hours.timezone);
            println!("🕘 {} ({})", local.format("%a %Y-%m-%d %H:%M:%S"), config.market_hours.timezone);
            println!("Mode: {}", clock.desired_mode());
        }
        Commands::Fetch { symbol } => {
            let symbol = TickerSymbol::from_query(&symbol)?;
            let fetcher = HttpQuoteFetcher::new(&config.fetcher)?;
            let snapshot = fetcher
                .fetch(&symbol)
                .await
                .with_context(|| format!("fetching {}", symbol))?;
            println!("✅ {}", symbol);
            print_snapshot(&snapshot);
        }
        Commands::Tickers { letter } => {
            let store = TickerStore::open(&config.data_dir)?;
            match letter {
                Some(letter) => {
                    let letter = bucket_letter(letter)?;
                    let tickers = store.load_bucket(letter)?;
                    for ticker in &tickers {
                        println!("{}", ticker);
                    }
                    println!("📋 {} tickers under {}", tickers.len(), letter);
                }
                None => {
                    let mut total = 0;
                    for (letter, count) in store.bucket_sizes()? {
                        println!("{}: {}", letter, count);
                        total += count;
                    }
                    println!("📋 {} tickers in total", total);
                }
            }
        }
        Commands::Candidates { letter, limit } => {
            let letter = bucket_letter(letter)?;
            let store = TickerStore::open(&config.data_dir)?;
            let cursor = store.survey_cursor(letter)?;
            let candidates = SurveyCandidates::resume_after(letter, cursor.as_ref());

            match &cursor {
                Some(cursor) => println!("Cursor for {}: {}", letter, cursor),
                None => println!("No cursor for {}; survey starts from the beginning", letter),
            }
            println!("{} candidates left", candidates.remaining());
            for candidate in candidates.take(limit) {
                println!("{}", candidate);
            }
        }
        Commands::History { symbol, limit } => {
            let symbol = TickerSymbol::from_query(&symbol)?;
            let store = TickerStore::open(&config.data_dir)?;
            let series = store.load_series(&symbol)?;
            if series.is_empty() {
                println!("No snapshots stored for {}", symbol);
            }
            for snapshot in series.iter().skip(series.len().saturating_sub(limit)) {
                print_snapshot(snapshot);
            }
        }
        Commands::Partition { workers } => {
            let workers = workers.unwrap_or(config.workers).max(1);
            let store = TickerStore::open(&config.data_dir)?;
            let tickers = store.load_all()?;
            println!("{} tickers over {} workers", tickers.len(), workers);
            for (worker, slice) in partition_evenly(&tickers, workers).iter().enumerate() {
                match (slice.first(), slice.last()) {
                    (Some(first), Some(last)) => {
                        println!("worker {}: {} tickers ({}..{})", worker, slice.len(), first, last)
                    }
                    _ => println!("worker {}: idle", worker),
                }
            }
        }
    }

    Ok(())
}

fn print_snapshot(snapshot: &PriceSnapshot) {
    let fmt_opt = |value: Option<f64>| value.map_or("-".to_string(), |v| format!("{:.2}", v));
    let change = snapshot
        .change_percent()
        .map_or(String::new(), |pct| format!(" ({:+.2}%)", pct));
    println!(
        "{}  price {:.2}{}  prev {}  open {}  bid {}  ask {}  vol {}",
        snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
        snapshot.price,
        change,
        fmt_opt(snapshot.previous_close),
        fmt_opt(snapshot.open),
        fmt_opt(snapshot.bid),
        fmt_opt(snapshot.ask),
        snapshot.volume.map_or("-".to_string(), |v| v.to_string()),
    );
}
