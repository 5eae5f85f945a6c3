//! Best-effort retrieval of official drawing results.
//!
//! Sources are tried sequentially in a fixed fallback order, never raced:
//! mirror JSON first (stable shape, CDN-served), then the official JSON
//! endpoint, then scraping the official result page, and finally a local
//! snapshot file when one is configured. Every request is bounded by the
//! client timeout; a failing source is logged and skipped.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::normalize::{self, SourceKind};
use crate::round;
use crate::types::DrawResult;

const MIRROR_BASE_URL: &str = "https://smok95.github.io/lotto/results";
const OFFICIAL_JSON_URL: &str = "https://www.dhlottery.co.kr/common.do?method=getLottoNumber";
const RESULT_PAGE_URL: &str = "https://www.dhlottery.co.kr/gameResult.do?method=byWin";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

pub struct ResultFetcher {
    client: reqwest::Client,
    cache_file: Option<PathBuf>,
}

impl ResultFetcher {
    pub fn new(timeout: Duration, cache_file: Option<PathBuf>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build http client: {e}")))?;
        Ok(Self { client, cache_file })
    }

    /// Fetches and normalizes one round's result, falling through the source
    /// list. Exhausting every source surfaces as "unavailable", never a hang
    /// and never a partial result.
    pub async fn fetch_round(&self, round: u32) -> AppResult<DrawResult> {
        let mut kinds = vec![
            SourceKind::MirrorJson,
            SourceKind::OfficialJson,
            SourceKind::ScrapedHtml,
        ];
        if self.cache_file.is_some() {
            kinds.push(SourceKind::CachedFile);
        }

        for kind in kinds {
            match self.try_source(round, kind).await {
                Ok(result) => {
                    debug!(round, source = ?kind, "draw result resolved");
                    return Ok(result);
                }
                Err(e) => warn!(round, source = ?kind, "source failed: {e:#}"),
            }
        }
        Err(AppError::ResultUnavailable(round))
    }

    /// Round number of the most recently published drawing. Falls back to
    /// the calendar when the network is unavailable.
    pub async fn latest_round(&self) -> u32 {
        match self.fetch_latest_round().await {
            Ok(round) => round,
            Err(e) => {
                warn!("latest round lookup failed, using calendar: {e:#}");
                round::latest_drawn_round(Utc::now())
            }
        }
    }

    async fn try_source(&self, round: u32, kind: SourceKind) -> anyhow::Result<DrawResult> {
        let raw = match kind {
            SourceKind::MirrorJson => {
                self.get_text(&format!("{MIRROR_BASE_URL}/{round}.json")).await?
            }
            SourceKind::OfficialJson => {
                self.get_text(&format!("{OFFICIAL_JSON_URL}&drwNo={round}")).await?
            }
            SourceKind::ScrapedHtml => {
                self.get_text(&format!("{RESULT_PAGE_URL}&drwNo={round}")).await?
            }
            SourceKind::CachedFile => {
                let path = self
                    .cache_file
                    .as_ref()
                    .context("no cache file configured")?;
                tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?
            }
        };
        Ok(normalize::normalize(&raw, kind, round)?)
    }

    async fn get_text(&self, url: &str) -> anyhow::Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn fetch_latest_round(&self) -> anyhow::Result<u32> {
        #[derive(Deserialize)]
        struct Latest {
            draw_no: u32,
        }

        let latest: Latest = self
            .client
            .get(format!("{MIRROR_BASE_URL}/latest.json"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(latest.draw_no)
    }
}
