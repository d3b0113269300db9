mod catalog;
mod error;
mod extract;
mod fetch;
mod scraper;

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use extract::MismatchPolicy;
use fetch::Fetcher;
use scraper::ScrapeOptions;

#[derive(Parser)]
#[command(name = "sfc_cartdb", about = "Cartridge database scraper for superfamicom.org")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the full game list and write the cartridge database JSON
    Run {
        #[command(flatten)]
        net: NetArgs,
        /// First game-list page to scan
        #[arg(long, default_value = "1")]
        first_page: u32,
        /// Last game-list page to scan (the site currently has 24)
        #[arg(long, default_value = "24")]
        last_page: u32,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Concurrent detail-page fetches
        #[arg(short = 'j', long, default_value = "4")]
        concurrency: usize,
        /// What to do when a page has more checksums than mapper entries
        #[arg(long, value_enum, default_value = "stop-page")]
        on_short_mappers: MismatchPolicy,
    },
    /// Fetch one detail page and print its extracted records
    Inspect {
        #[command(flatten)]
        net: NetArgs,
        /// Detail path fragment, e.g. /ActRaiser
        fragment: String,
    },
}

#[derive(Args)]
struct NetArgs {
    /// Catalog site root
    #[arg(long, default_value = "https://superfamicom.org")]
    base_url: String,
    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,
    /// Retries per request on transient failures
    #[arg(long, default_value = "3")]
    retries: u32,
}

impl NetArgs {
    fn fetcher(&self) -> anyhow::Result<Fetcher> {
        Ok(Fetcher::new(
            &self.base_url,
            Duration::from_secs(self.timeout_secs),
            self.retries,
        )?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            net,
            first_page,
            last_page,
            output,
            concurrency,
            on_short_mappers,
        } => {
            let fetcher = net.fetcher()?;
            let opts = ScrapeOptions {
                first_page,
                last_page,
                concurrency,
                policy: on_short_mappers,
            };

            let (db, stats) = scraper::scrape(&fetcher, &opts).await?;

            let json = serde_json::to_string_pretty(&db)?;
            match &output {
                Some(path) => {
                    std::fs::write(path, json.as_bytes())
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("Wrote {} cartridges to {}", db.len(), path.display());
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(json.as_bytes())?;
                    stdout.write_all(b"\n")?;
                }
            }
            stats.print();
        }
        Commands::Inspect { net, fragment } => {
            let fetcher = net.fetcher()?;
            let html = fetcher.detail_page(&fragment).await?;
            let page = extract::extract_cartridges(&html, MismatchPolicy::StopPage);

            let db: std::collections::BTreeMap<_, _> = page.records.into_iter().collect();
            println!("{}", serde_json::to_string_pretty(&db)?);
            if page.skipped > 0 || page.truncated > 0 {
                eprintln!(
                    "{} skipped, {} dropped without ROM info",
                    page.skipped, page.truncated
                );
            }
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
