use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::error::ScrapeError;
use crate::extract::{self, Cartridge, MismatchPolicy};
use crate::fetch::Fetcher;

pub struct ScrapeOptions {
    pub first_page: u32,
    pub last_page: u32,
    pub concurrency: usize,
    pub policy: MismatchPolicy,
}

/// Run summary, printed after completion.
#[derive(Debug, Default)]
pub struct RunStats {
    pub index_pages: usize,
    pub index_errors: usize,
    pub detail_pages: usize,
    pub detail_errors: usize,
    pub records: usize,
    pub skipped_records: usize,
    pub truncated_pages: usize,
    pub duplicates: usize,
}

impl RunStats {
    // Stats go to stderr; stdout may be carrying the JSON document.
    pub fn print(&self) {
        eprintln!("Index pages:  {} ({} failed)", self.index_pages, self.index_errors);
        eprintln!("Detail pages: {} ({} failed)", self.detail_pages, self.detail_errors);
        eprintln!("Records:      {}", self.records);
        eprintln!("Skipped:      {}", self.skipped_records);
        eprintln!("Truncated:    {} pages", self.truncated_pages);
        eprintln!("Duplicates:   {}", self.duplicates);
    }
}

/// Walk the configured game-list pages, follow every detail link, and build
/// the checksum-keyed cartridge map. Index pages go one at a time; each
/// page's detail fetches run concurrently under a semaphore, streaming
/// results back over a channel so extraction interleaves with fetching.
pub async fn scrape(
    fetcher: &Fetcher,
    opts: &ScrapeOptions,
) -> Result<(BTreeMap<String, Cartridge>, RunStats)> {
    if opts.first_page == 0 || opts.first_page > opts.last_page {
        return Err(ScrapeError::InvalidPageRange {
            first: opts.first_page,
            last: opts.last_page,
        }
        .into());
    }

    let page_count = opts.last_page - opts.first_page + 1;
    let pb = ProgressBar::new(page_count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages {msg}")?
            .progress_chars("=> "),
    );

    let semaphore = Arc::new(Semaphore::new(opts.concurrency.max(1)));
    let mut db: BTreeMap<String, Cartridge> = BTreeMap::new();
    let mut stats = RunStats::default();

    for number in opts.first_page..=opts.last_page {
        let html = match fetcher.index_page(number).await {
            Ok(html) => html,
            Err(e) => {
                warn!("skipping game-list page {}: {}", number, e);
                stats.index_errors += 1;
                pb.inc(1);
                continue;
            }
        };
        stats.index_pages += 1;

        let fragments = catalog::detail_fragments(&html);
        if fragments.is_empty() {
            warn!(
                "game-list page {} matched no detail links; markup may have changed",
                number
            );
            pb.inc(1);
            continue;
        }
        debug!("game-list page {}: {} detail links", number, fragments.len());

        // Channel: fetch tasks send bodies back, this loop extracts and merges.
        let (tx, mut rx) = tokio::sync::mpsc::channel::<(String, Result<String, ScrapeError>)>(
            opts.concurrency.max(1) * 2,
        );

        for fragment in fragments {
            let fetcher = fetcher.clone();
            let sem = Arc::clone(&semaphore);
            let tx = tx.clone();

            tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                let result = fetcher.detail_page(&fragment).await;
                let _ = tx.send((fragment, result)).await;
            });
        }

        // Drop our copy of tx so rx closes when all spawned fetches finish.
        drop(tx);

        while let Some((fragment, result)) = rx.recv().await {
            let body = match result {
                Ok(body) => body,
                Err(e) => {
                    warn!("skipping detail page {}: {}", fragment, e);
                    stats.detail_errors += 1;
                    continue;
                }
            };
            stats.detail_pages += 1;

            let page = extract::extract_cartridges(&body, opts.policy);
            if page.records.is_empty() && page.skipped == 0 && page.truncated == 0 {
                warn!(
                    "detail page {} matched no checksums; markup may have changed",
                    fragment
                );
                continue;
            }

            stats.skipped_records += page.skipped;
            if page.truncated > 0 {
                stats.truncated_pages += 1;
                debug!(
                    "{}: {} checksums without ROM info dropped",
                    fragment, page.truncated
                );
            }

            merge_records(&mut db, &mut stats, page.records);
        }

        pb.set_message(format!("{} carts", db.len()));
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "scraped {} detail pages, {} cartridges ({} skipped, {} duplicates)",
        stats.detail_pages, stats.records, stats.skipped_records, stats.duplicates
    );

    Ok((db, stats))
}

/// Checksums are the document keys and are assumed unique across the whole
/// catalog; when the site disagrees, the later record wins and the collision
/// is counted.
fn merge_records(
    db: &mut BTreeMap<String, Cartridge>,
    stats: &mut RunStats,
    records: Vec<(String, Cartridge)>,
) {
    for (sha, cart) in records {
        if db.insert(sha.clone(), cart).is_some() {
            warn!("duplicate checksum {}; keeping latest", sha);
            stats.duplicates += 1;
        } else {
            stats.records += 1;
        }
    }
}
