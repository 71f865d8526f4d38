//! Polls the page until listing content shows up.

use crate::page::PageContext;
use scraper::Html;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a wait ended. None of these is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
    Cancelled,
}

fn probe_snapshot(html: &str, probe: &(dyn Fn(&Html) -> bool + Sync)) -> bool {
    let document = Html::parse_document(html);
    probe(&document)
}

/// Poll `probe` against fresh snapshots every `interval` until it holds,
/// `cancel` fires, or `timeout` elapses.
///
/// A snapshot that cannot be taken counts as "not ready yet".
pub async fn wait_until_ready(
    page: &dyn PageContext,
    probe: &(dyn Fn(&Html) -> bool + Sync),
    cancel: &CancellationToken,
    timeout: Duration,
    interval: Duration,
) -> Readiness {
    let deadline = Instant::now() + timeout;
    let mut polls = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Readiness::Cancelled;
        }

        polls += 1;
        match page.html().await {
            Ok(html) if probe_snapshot(&html, probe) => {
                debug!("Page ready after {} polls", polls);
                return Readiness::Ready;
            }
            Ok(_) => {}
            Err(e) => warn!("Readiness poll could not read the page: {}", e),
        }

        let now = Instant::now();
        if now >= deadline {
            debug!("Readiness wait timed out after {} polls", polls);
            return Readiness::TimedOut;
        }

        let pause = interval.min(deadline - now);
        tokio::select! {
            _ = cancel.cancelled() => return Readiness::Cancelled,
            _ = sleep(pause) => {}
        }
    }
}
