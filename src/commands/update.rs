use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::models::{UpdaterState, UpdaterStatus};
use crate::services::progress::format_bytes;
use crate::services::Updater;

const REPORT_INTERVAL: Duration = Duration::from_millis(500);

pub fn render_status(status: &UpdaterStatus) -> String {
    format!(
        "[{:>3.0}%] {}: {}",
        status.progress * 100.0,
        status.headline,
        status.detail
    )
}

/// Prints status changes to stdout. Installing updates are throttled; everything
/// else is printed as it arrives.
pub fn watch_status(mut rx: watch::Receiver<UpdaterStatus>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_line = String::new();
        let mut last_sent = Instant::now()
            .checked_sub(REPORT_INTERVAL)
            .unwrap_or_else(Instant::now);
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().clone();
            let line = render_status(&status);
            if line == last_line {
                continue;
            }
            let throttled = status.state == UpdaterState::Installing
                && last_sent.elapsed() < REPORT_INTERVAL;
            if throttled {
                continue;
            }
            println!("{line}");
            last_line = line;
            last_sent = Instant::now();
        }
    })
}

pub async fn check(updater: &mut Updater) -> UpdaterState {
    let state = updater.check_for_updates().await;
    if let Some(manifest) = updater.manifest() {
        if !manifest.release_notes.trim().is_empty() {
            println!(
                "Release {} ({}): {}",
                manifest.version,
                manifest.published_at,
                manifest.release_notes.trim()
            );
        }
    }
    for item in &updater.plan().queue {
        let size = if item.entry.size > 0 {
            format_bytes(item.entry.size)
        } else {
            "unknown size".to_string()
        };
        println!("  queued {} ({})", item.entry.path, size);
    }
    for skipped in &updater.plan().skipped {
        println!("  skipped {:?}: {}", skipped.path, skipped.reason);
    }
    state
}

/// Checks, then installs when updates are queued. A failed batch is retried up to
/// `retries` more times.
pub async fn install(updater: &mut Updater, retries: u32) -> UpdaterState {
    let mut state = check(updater).await;
    let mut attempt = 0;
    while state == UpdaterState::ReadyToUpdate {
        state = updater.install_queued().await;
        if state != UpdaterState::ReadyToUpdate || attempt >= retries {
            break;
        }
        attempt += 1;
        tracing::warn!("[updater] retrying install (attempt {}/{})", attempt + 1, retries + 1);
    }
    state
}
