use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use harvester_core::{
    parse_link_header, FailureKind, FetchError, ListRequest, Page, PageMeta, PageNumber,
    RateSnapshot,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::{Issue, PageSource};

const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            token: None,
            user_agent: concat!("issue-harvester/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Issues listing client for the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: Url,
    settings: ClientSettings,
}

impl GitHubClient {
    pub fn new(settings: ClientSettings) -> Result<Self, FetchError> {
        let base_url = Url::parse(settings.base_url.trim_end_matches('/'))
            .map_err(|err| FetchError::new(FailureKind::Network, format!("invalid base url: {err}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        let agent = HeaderValue::from_str(&settings.user_agent)
            .map_err(|err| FetchError::new(FailureKind::Network, format!("invalid user agent: {err}")))?;
        headers.insert(USER_AGENT, agent);
        if let Some(token) = settings.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| FetchError::new(FailureKind::Network, "token is not a valid header value"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            client,
            base_url,
            settings,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::new(FailureKind::Network, "base url cannot have a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<(HeaderMap, Vec<u8>), FetchError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        if !status.is_success() {
            return Err(classify_status(status, &headers));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(too_large(self.settings.max_bytes, content_len));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(too_large(self.settings.max_bytes, next_len));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok((headers, bytes))
    }
}

#[async_trait::async_trait]
impl PageSource for GitHubClient {
    type Item = Issue;

    async fn list_page(
        &self,
        request: &ListRequest,
        page: PageNumber,
        per_page: u32,
    ) -> Result<Page<Issue>, FetchError> {
        let mut url = self.endpoint(&["repos", request.owner.as_str(), request.repo.as_str(), "issues"])?;
        url.query_pairs_mut()
            .append_pair("state", request.state.as_str())
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());

        let (headers, body) = self.get(url).await?;
        let items: Vec<Issue> = decode(&body)?;

        let links = headers
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .map(parse_link_header)
            .unwrap_or_default();

        Ok(Page {
            items,
            meta: PageMeta {
                page,
                next_page: links.next,
                last_page: links.last,
                next_cursor: links.next_cursor,
                rate: rate_from_headers(&headers),
            },
        })
    }

    async fn rate_limit(&self) -> Result<RateSnapshot, FetchError> {
        let url = self.endpoint(&["rate_limit"])?;
        let (_, body) = self.get(url).await?;
        let response: RateLimitResponse = decode(&body)?;
        let core = response.resources.core;
        Ok(RateSnapshot {
            limit: core.limit,
            remaining: core.remaining,
            reset_at: epoch_to_utc(core.reset).ok_or_else(|| {
                FetchError::new(FailureKind::Decode, format!("invalid reset time {}", core.reset))
            })?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: RateLimitWindow,
}

#[derive(Debug, Deserialize)]
struct RateLimitWindow {
    limit: u32,
    remaining: u32,
    reset: i64,
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, FetchError> {
    serde_json::from_slice(body).map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))
}

/// Rate limiting shows up as 429, or as 403 with an exhausted quota header.
fn classify_status(status: StatusCode, headers: &HeaderMap) -> FetchError {
    let quota_exhausted = header_number::<u32>(headers, RATE_LIMIT_REMAINING) == Some(0);
    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && quota_exhausted) {
        let reset_at = header_number::<i64>(headers, RATE_LIMIT_RESET).and_then(epoch_to_utc);
        return FetchError::new(FailureKind::RateLimited { reset_at }, status.to_string());
    }
    FetchError::new(FailureKind::HttpStatus(status.as_u16()), status.to_string())
}

fn rate_from_headers(headers: &HeaderMap) -> Option<RateSnapshot> {
    Some(RateSnapshot {
        limit: header_number(headers, RATE_LIMIT_LIMIT)?,
        remaining: header_number(headers, RATE_LIMIT_REMAINING)?,
        reset_at: header_number::<i64>(headers, RATE_LIMIT_RESET).and_then(epoch_to_utc)?,
    })
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

fn epoch_to_utc(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

fn too_large(max_bytes: u64, actual: u64) -> FetchError {
    FetchError::new(
        FailureKind::Network,
        format!("response too large (max {max_bytes}, actual {actual})"),
    )
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return FetchError::new(FailureKind::Decode, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn forbidden_with_exhausted_quota_is_rate_limited() {
        let err = classify_status(
            StatusCode::FORBIDDEN,
            &headers(&[(RATE_LIMIT_REMAINING, "0"), (RATE_LIMIT_RESET, "1700000000")]),
        );
        assert_eq!(
            err.kind,
            FailureKind::RateLimited {
                reset_at: epoch_to_utc(1_700_000_000)
            }
        );
    }

    #[test]
    fn plain_forbidden_is_a_status_error() {
        let err = classify_status(StatusCode::FORBIDDEN, &headers(&[(RATE_LIMIT_REMAINING, "12")]));
        assert_eq!(err.kind, FailureKind::HttpStatus(403));
        assert!(err.kind.is_permanent());
    }

    #[test]
    fn too_many_requests_is_rate_limited_without_headers() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new());
        assert_eq!(err.kind, FailureKind::RateLimited { reset_at: None });
    }

    #[test]
    fn rate_headers_need_all_three_values() {
        assert!(rate_from_headers(&headers(&[(RATE_LIMIT_REMAINING, "10")])).is_none());
        let rate = rate_from_headers(&headers(&[
            (RATE_LIMIT_LIMIT, "5000"),
            (RATE_LIMIT_REMAINING, "4321"),
            (RATE_LIMIT_RESET, "1700000000"),
        ]))
        .unwrap();
        assert_eq!(rate.limit, 5000);
        assert_eq!(rate.remaining, 4321);
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let client = GitHubClient::new(ClientSettings {
            base_url: "http://localhost:9000/api/v3/".to_string(),
            ..ClientSettings::default()
        })
        .unwrap();
        let url = client.endpoint(&["repos", "o", "r", "issues"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/api/v3/repos/o/r/issues");
    }
}
