use std::path::Path;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::header::{ACCEPT_ENCODING, USER_AGENT};
use tokio::io::AsyncWriteExt;
use tokio::time::MissedTickBehavior;

use crate::config::UpdaterConfig;
use crate::errors::{Result, UpdaterError};
use crate::models::QueuedFile;
use crate::utils::file::{file_len, try_delete};
use crate::utils::paths::part_path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchdogVerdict {
    Progress(u64),
    Idle,
    Stalled(Duration),
}

/// Tracks the last time the byte counter moved.
#[derive(Clone, Debug)]
pub struct StallWatchdog {
    limit: Duration,
    last_bytes: u64,
    last_change: Instant,
}

impl StallWatchdog {
    pub fn new(limit: Duration, now: Instant) -> Self {
        Self {
            limit,
            last_bytes: 0,
            last_change: now,
        }
    }

    pub fn last_bytes(&self) -> u64 {
        self.last_bytes
    }

    pub fn observe(&mut self, bytes: u64, now: Instant) -> WatchdogVerdict {
        if bytes > self.last_bytes {
            self.last_bytes = bytes;
            self.last_change = now;
            return WatchdogVerdict::Progress(bytes);
        }
        let idle = now.saturating_duration_since(self.last_change);
        if idle > self.limit {
            WatchdogVerdict::Stalled(idle)
        } else {
            WatchdogVerdict::Idle
        }
    }
}

#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    config: UpdaterConfig,
}

impl Downloader {
    pub fn new(config: &UpdaterConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            config: config.clone(),
        }
    }

    /// Streams one file into `<destination>.part`. The final path is never touched;
    /// on failure the `.part` file is removed before returning.
    pub async fn download_one<F>(&self, item: &QueuedFile, mut on_progress: F) -> Result<u64>
    where
        F: FnMut(u64),
    {
        if let Some(parent) = item.destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = part_path(&item.destination);

        let outcome = match self.transfer(item, &temp, &mut on_progress).await {
            Ok(downloaded) => verify_size(&temp, item.entry.size).map(|_| downloaded),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(downloaded) => {
                on_progress(if item.entry.size > 0 {
                    item.entry.size
                } else {
                    downloaded
                });
                tracing::info!("[download] {} ok ({} bytes)", item.entry.path, downloaded);
                Ok(downloaded)
            }
            Err(err) => {
                tracing::error!("[download] {} failed: {}", item.entry.path, err);
                try_delete(&temp).await;
                Err(err)
            }
        }
    }

    async fn transfer<F>(&self, item: &QueuedFile, temp: &Path, on_progress: &mut F) -> Result<u64>
    where
        F: FnMut(u64),
    {
        let budget = self.config.file_timeout_budget(item.entry.size);
        let stall_limit = self.config.stall_timeout();
        let started = Instant::now();
        let mut watchdog = StallWatchdog::new(stall_limit, started);
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(
            "[download] {} budget={:?} stall_limit={:?}",
            item.entry.url,
            budget,
            stall_limit
        );

        let send = self
            .client
            .get(item.entry.url.as_str())
            .timeout(budget)
            .header(USER_AGENT, self.config.user_agent.as_str())
            .header(ACCEPT_ENCODING, "identity")
            .send();
        tokio::pin!(send);

        let response = loop {
            tokio::select! {
                response = &mut send => break response.map_err(|err| classify(err, budget, 0))?,
                _ = ticker.tick() => check_watchdog(&mut watchdog, 0, started, budget, on_progress)?,
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::Http(format!(
                "{} -> HTTP {}",
                item.entry.url,
                status.as_u16()
            )));
        }

        let mut file = tokio::fs::File::create(temp).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded = 0_u64;

        loop {
            tokio::select! {
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        file.write_all(&bytes).await?;
                        downloaded = downloaded.saturating_add(bytes.len() as u64);
                    }
                    Some(Err(err)) => return Err(classify(err, budget, downloaded)),
                    None => break,
                },
                _ = ticker.tick() => {
                    check_watchdog(&mut watchdog, downloaded, started, budget, on_progress)?;
                }
            }
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if downloaded > watchdog.last_bytes() {
            on_progress(downloaded);
        }
        Ok(downloaded)
    }
}

fn check_watchdog<F>(
    watchdog: &mut StallWatchdog,
    downloaded: u64,
    started: Instant,
    budget: Duration,
    on_progress: &mut F,
) -> Result<()>
where
    F: FnMut(u64),
{
    let now = Instant::now();
    match watchdog.observe(downloaded, now) {
        WatchdogVerdict::Progress(bytes) => on_progress(bytes),
        WatchdogVerdict::Idle => {}
        WatchdogVerdict::Stalled(idle) => {
            tracing::warn!(
                "[download] stall: no new bytes for {:.1}s (limit {:.1}s), {} bytes so far",
                idle.as_secs_f64(),
                watchdog.limit.as_secs_f64(),
                downloaded
            );
            return Err(UpdaterError::Stalled {
                idle,
                limit: watchdog.limit,
                downloaded,
            });
        }
    }
    if now.saturating_duration_since(started) >= budget {
        return Err(UpdaterError::TimedOut { budget, downloaded });
    }
    Ok(())
}

fn classify(err: reqwest::Error, budget: Duration, downloaded: u64) -> UpdaterError {
    if err.is_timeout() {
        UpdaterError::TimedOut { budget, downloaded }
    } else {
        UpdaterError::Network(err)
    }
}

fn verify_size(temp: &Path, expected: u64) -> Result<()> {
    if expected == 0 {
        return Ok(());
    }
    let actual = file_len(temp).unwrap_or(0);
    if actual != expected {
        return Err(UpdaterError::SizeMismatch { expected, actual });
    }
    Ok(())
}
