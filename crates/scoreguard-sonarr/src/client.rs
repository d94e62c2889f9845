//! HTTP client for the upstream v3 REST API.
//!
//! # Design
//! - One `reqwest::Client` with the API key as a default header and the configured
//!   request timeout; the same timeout bounds each retry attempt.
//! - Requests are rebuilt for every attempt; status checks happen inside the retry loop,
//!   body decoding after it.
//! - Custom formats, quality profiles and the series/profile map rarely change and are
//!   memoized until [`MediaLibrary::clear_cache`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use scoreguard_core::{
    CustomFormat, Episode, EpisodeFile, HistoryRecord, MediaLibrary, QualityProfile, QueueItem,
    RemoveOptions, RetryError, RetryPolicy, Series, SystemStatus, retry,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SonarrError, SonarrResult};
use crate::policy::RetryBudgets;

const API_KEY_HEADER: &str = "x-api-key";
const API_PREFIX: &str = "api/v3/";
const QUEUE_PAGE_SIZE: &str = "1000";

/// Connection settings for [`SonarrClient`].
#[derive(Debug, Clone)]
pub struct SonarrSettings {
    /// Base URL, e.g. `http://localhost:8989`.
    pub url: String,
    /// API key.
    pub api_key: String,
    /// Request timeout.
    pub timeout: Duration,
}

/// Upstream REST client implementing [`MediaLibrary`].
pub struct SonarrClient {
    http: Client,
    api_base: Url,
    budgets: RetryBudgets,
    memo: Mutex<Memo>,
}

#[derive(Default)]
struct Memo {
    formats: Option<Vec<CustomFormat>>,
    profiles: Option<Vec<QualityProfile>>,
    series_profiles: Option<HashMap<i64, i64>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Page<T> {
    records: Vec<T>,
}

impl SonarrClient {
    /// Build a client with the standard retry budgets.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL or API key is unusable or the HTTP client cannot be built.
    pub fn new(settings: &SonarrSettings) -> SonarrResult<Self> {
        let api_base = api_base(&settings.url)?;
        let mut headers = HeaderMap::new();
        let mut key =
            HeaderValue::from_str(&settings.api_key).map_err(|_| SonarrError::InvalidApiKey)?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);
        let http = Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| SonarrError::ClientBuild { source })?;
        info!(url = %api_base, "upstream client initialised");
        Ok(Self {
            http,
            api_base,
            budgets: RetryBudgets::standard(settings.timeout),
            memo: Mutex::new(Memo::default()),
        })
    }

    /// Replace the retry budgets.
    #[must_use]
    pub const fn with_budgets(mut self, budgets: RetryBudgets) -> Self {
        self.budgets = budgets;
        self
    }

    /// Base URL every request path is joined onto.
    #[must_use]
    pub const fn api_base(&self) -> &Url {
        &self.api_base
    }

    fn endpoint(&self, path: &str) -> SonarrResult<Url> {
        self.api_base
            .join(path)
            .map_err(|source| SonarrError::InvalidUrl {
                url: path.to_string(),
                source,
            })
    }

    async fn execute<F>(
        &self,
        operation: &'static str,
        policy: &RetryPolicy,
        build: F,
    ) -> Result<Response, RetryError<SonarrError>>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        retry(policy, operation, || {
            let request = build(&self.http);
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|source| SonarrError::Transport { operation, source })?;
                debug!(operation, status = response.status().as_u16(), "upstream response");
                ensure_success(operation, response).await
            }
        })
        .await
    }

    async fn get_json<T>(
        &self,
        operation: &'static str,
        policy: &RetryPolicy,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let response = self
            .execute(operation, policy, |http| http.get(url.clone()).query(query))
            .await?;
        Ok(decode(operation, response).await?)
    }

    fn lock_memo(&self) -> MutexGuard<'_, Memo> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn all_series(&self, policy: &RetryPolicy) -> anyhow::Result<Vec<Series>> {
        self.get_json("series", policy, "series", &[]).await
    }
}

#[async_trait]
impl MediaLibrary for SonarrClient {
    async fn system_status(&self) -> anyhow::Result<SystemStatus> {
        self.get_json("system_status", &self.budgets.status, "system/status", &[])
            .await
    }

    async fn custom_formats(&self) -> anyhow::Result<Vec<CustomFormat>> {
        if let Some(formats) = self.lock_memo().formats.clone() {
            return Ok(formats);
        }
        let formats: Vec<CustomFormat> = self
            .get_json("custom_formats", &self.budgets.definitions, "customformat", &[])
            .await?;
        info!(count = formats.len(), "custom formats loaded");
        self.lock_memo().formats = Some(formats.clone());
        Ok(formats)
    }

    async fn quality_profiles(&self) -> anyhow::Result<Vec<QualityProfile>> {
        if let Some(profiles) = self.lock_memo().profiles.clone() {
            return Ok(profiles);
        }
        let profiles: Vec<QualityProfile> = self
            .get_json(
                "quality_profiles",
                &self.budgets.definitions,
                "qualityprofile",
                &[],
            )
            .await?;
        info!(count = profiles.len(), "quality profiles loaded");
        self.lock_memo().profiles = Some(profiles.clone());
        Ok(profiles)
    }

    async fn series_profile_map(&self) -> anyhow::Result<HashMap<i64, i64>> {
        if let Some(map) = self.lock_memo().series_profiles.clone() {
            return Ok(map);
        }
        let map: HashMap<i64, i64> = self
            .all_series(&self.budgets.definitions)
            .await?
            .into_iter()
            .filter_map(|series| {
                series
                    .quality_profile_id
                    .map(|profile| (series.id, profile))
            })
            .collect();
        info!(count = map.len(), "series profile map loaded");
        self.lock_memo().series_profiles = Some(map.clone());
        Ok(map)
    }

    async fn queue(&self) -> anyhow::Result<Vec<QueueItem>> {
        let page: Page<QueueItem> = self
            .get_json(
                "queue",
                &self.budgets.lookups,
                "queue",
                &[
                    ("pageSize", QUEUE_PAGE_SIZE.to_string()),
                    ("includeUnknownSeriesItems", "true".to_string()),
                    ("includeSeries", "true".to_string()),
                    ("includeEpisode", "true".to_string()),
                ],
            )
            .await?;
        debug!(items = page.records.len(), "queue fetched");
        Ok(page.records)
    }

    async fn series_by_title(&self, title: &str) -> anyhow::Result<Option<Series>> {
        let needle = title.trim().to_lowercase();
        Ok(self
            .all_series(&self.budgets.lookups)
            .await?
            .into_iter()
            .find(|series| series.title.to_lowercase().contains(&needle)))
    }

    async fn episode_by_number(
        &self,
        series_id: i64,
        season: i64,
        episode: i64,
    ) -> anyhow::Result<Option<Episode>> {
        let episodes: Vec<Episode> = self
            .get_json(
                "episodes",
                &self.budgets.lookups,
                "episode",
                &[("seriesId", series_id.to_string())],
            )
            .await?;
        Ok(episodes
            .into_iter()
            .find(|item| item.season_number == season && item.episode_number == episode))
    }

    async fn episode(&self, episode_id: i64) -> anyhow::Result<Episode> {
        self.get_json(
            "episode",
            &self.budgets.lookups,
            &format!("episode/{episode_id}"),
            &[],
        )
        .await
    }

    async fn history_for_episode(
        &self,
        episode_id: i64,
        limit: usize,
    ) -> anyhow::Result<Vec<HistoryRecord>> {
        let page: Page<HistoryRecord> = self
            .get_json(
                "history_for_episode",
                &self.budgets.lookups,
                "history",
                &[
                    ("pageSize", limit.to_string()),
                    ("episodeId", episode_id.to_string()),
                    ("sortKey", "date".to_string()),
                    ("sortDirection", "descending".to_string()),
                ],
            )
            .await?;
        Ok(page.records)
    }

    async fn recent_history(&self, limit: usize) -> anyhow::Result<Vec<HistoryRecord>> {
        let page: Page<HistoryRecord> = self
            .get_json(
                "recent_history",
                &self.budgets.lookups,
                "history",
                &[
                    ("pageSize", limit.to_string()),
                    ("sortKey", "date".to_string()),
                    ("sortDirection", "descending".to_string()),
                ],
            )
            .await?;
        Ok(page.records)
    }

    async fn episode_file(&self, file_id: i64) -> anyhow::Result<Option<EpisodeFile>> {
        let url = self.endpoint(&format!("episodefile/{file_id}"))?;
        let response = match self
            .execute("episode_file", &self.budgets.lookups, |http| {
                http.get(url.clone())
            })
            .await
        {
            Ok(response) => response,
            Err(err) if err.last_error().and_then(SonarrError::status) == Some(404) => {
                debug!(file_id, "episode file not found");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Some(decode("episode_file", response).await?))
    }

    async fn force_import(
        &self,
        download_id: &str,
        episode_id: i64,
        quality: Option<Value>,
    ) -> anyhow::Result<bool> {
        let candidates: Vec<Value> = self
            .get_json(
                "manual_import_candidates",
                &self.budgets.import,
                "manualimport",
                &[("downloadId", download_id.to_string())],
            )
            .await?;
        if candidates.is_empty() {
            warn!(download_id, "no manual import candidates");
            return Ok(false);
        }

        let items: Vec<Value> = candidates
            .into_iter()
            .map(|mut item| {
                if let Value::Object(fields) = &mut item {
                    fields.insert("episodeIds".to_string(), Value::from(vec![episode_id]));
                    if let Some(quality) = &quality {
                        fields.insert("quality".to_string(), quality.clone());
                    }
                }
                item
            })
            .collect();

        let url = self.endpoint("manualimport")?;
        let _ = self
            .execute("manual_import", &self.budgets.import, |http| {
                http.put(url.clone()).json(&items)
            })
            .await?;
        info!(download_id, episode_id, files = items.len(), "manual import submitted");
        Ok(true)
    }

    async fn remove_from_queue(
        &self,
        queue_id: i64,
        options: RemoveOptions,
    ) -> anyhow::Result<()> {
        let url = self.endpoint(&format!("queue/{queue_id}"))?;
        let query = [
            ("removeFromClient", options.remove_from_client.to_string()),
            ("blocklist", options.blocklist.to_string()),
        ];
        let _ = self
            .execute("remove_from_queue", &self.budgets.removal, |http| {
                http.delete(url.clone()).query(&query)
            })
            .await?;
        info!(
            queue_id,
            remove_from_client = options.remove_from_client,
            blocklist = options.blocklist,
            "queue item removed"
        );
        Ok(())
    }

    async fn clear_cache(&self) {
        *self.lock_memo() = Memo::default();
        debug!("upstream definition cache cleared");
    }
}

fn api_base(raw: &str) -> SonarrResult<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let base = Url::parse(&format!("{trimmed}/")).map_err(|source| SonarrError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    base.join(API_PREFIX)
        .map_err(|source| SonarrError::InvalidUrl {
            url: raw.to_string(),
            source,
        })
}

async fn ensure_success(operation: &'static str, response: Response) -> SonarrResult<Response> {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body).ok().and_then(|value| {
        value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    Err(SonarrError::Status {
        operation,
        status: status.as_u16(),
        message,
    })
}

async fn decode<T>(operation: &'static str, response: Response) -> SonarrResult<T>
where
    T: DeserializeOwned,
{
    response
        .json::<T>()
        .await
        .map_err(|source| SonarrError::Decode { operation, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_normalises_trailing_slashes() -> SonarrResult<()> {
        assert_eq!(
            api_base("http://sonarr:8989")?.as_str(),
            "http://sonarr:8989/api/v3/"
        );
        assert_eq!(
            api_base("https://media.example/sonarr/")?.as_str(),
            "https://media.example/sonarr/api/v3/"
        );
        assert!(api_base("not a url").is_err());
        Ok(())
    }

    #[test]
    fn api_keys_must_be_header_safe() {
        let settings = SonarrSettings {
            url: "http://sonarr:8989".into(),
            api_key: "bad\nkey".into(),
            timeout: Duration::from_secs(5),
        };
        assert!(matches!(
            SonarrClient::new(&settings),
            Err(SonarrError::InvalidApiKey)
        ));
    }
}
