use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, PRAGMA, USER_AGENT};
use reqwest::Url;

use crate::config::UpdaterConfig;
use crate::errors::{Result, UpdaterError};
use crate::models::Manifest;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

#[derive(Clone)]
pub struct ManifestService {
    client: reqwest::Client,
    user_agent: String,
    timeout: Duration,
}

impl ManifestService {
    pub fn new(config: &UpdaterConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(config.manifest_timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            user_agent: config.user_agent.clone(),
            timeout: config.manifest_timeout(),
        }
    }

    /// One cache-busted GET of the manifest. No retries.
    pub async fn fetch(&self, manifest_url: &str) -> Result<Manifest> {
        let url = cache_busted_url(manifest_url, chrono::Utc::now().timestamp())?;
        tracing::info!("[manifest] fetching {}", url);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(PRAGMA, "no-cache")
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::Http(format!(
                "manifest request failed: HTTP {}",
                status.as_u16()
            )));
        }

        let body = response.bytes().await?;
        let manifest = parse_manifest_body(&body)?;
        tracing::info!(
            "[manifest] version={} type={} files={} published_at={}",
            manifest.version,
            manifest.kind,
            manifest.files.len(),
            manifest.published_at
        );
        Ok(manifest)
    }
}

/// Appends `t=<unix seconds>` so intermediaries cannot serve a stale manifest.
pub fn cache_busted_url(base: &str, timestamp: i64) -> Result<Url> {
    let mut url = Url::parse(base.trim())
        .map_err(|err| UpdaterError::Config(format!("invalid manifest url {base:?}: {err}")))?;
    url.query_pairs_mut()
        .append_pair("t", &timestamp.to_string());
    Ok(url)
}

pub fn strip_bom(data: &[u8]) -> String {
    let data = data.strip_prefix(&UTF8_BOM[..]).unwrap_or(data);
    let text = String::from_utf8_lossy(data);
    text.strip_prefix('\u{feff}').unwrap_or(&text[..]).to_string()
}

pub fn parse_manifest_body(data: &[u8]) -> Result<Manifest> {
    let body = strip_bom(data);
    if body.trim().is_empty() {
        return Err(UpdaterError::EmptyManifest);
    }
    Ok(serde_json::from_str(&body)?)
}
