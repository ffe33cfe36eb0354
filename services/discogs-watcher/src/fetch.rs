//!
//! src/fetch.rs  Andrew Belles  Oct 16th, 2026
//!
//! Defines the discogs release client and the mapping of a raw
//! release document into a ReleaseSummary
//!

use async_trait::async_trait;
use reqwest::{Client, header, redirect, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{DiscogsConfig, HttpConfig};
use crate::errors::{FetchError, WatcherError};
use crate::types::{LowestPrice, ReleaseSummary};

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

fn client_with_headers(http: &HttpConfig, headers: header::HeaderMap) ->
    Result<Client, WatcherError> {
    client_helper(http)
        .default_headers(headers)
        .build()
        .map_err(|e| WatcherError::Http(format!("build client: {e}")))
}

///
/// Source of release summaries. One call is one lookup, nothing is cached
///
#[async_trait]
pub trait SummaryFetcher: Send + Sync {
    async fn fetch_summary(&self, id: u64) -> Result<ReleaseSummary, FetchError>;
}

#[derive(Clone, Debug)]
pub struct DiscogsClient {
    pub http: Client,
    pub cfg: DiscogsConfig
}

impl DiscogsClient {
    pub fn new(http_cfg: &HttpConfig, dg_cfg: &DiscogsConfig) -> Result<Self, WatcherError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json")
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_str(&dg_cfg.user_agent)
                .map_err(|e| WatcherError::Config(format!("invalid user_agent: {e}")))?,
        );
        let http = client_with_headers(http_cfg, headers)?;

        Ok(Self { http, cfg: dg_cfg.clone() })
    }

    /// GET /releases/{id}
    pub fn release(&self, release_id: u64) -> Result<RequestBuilder, FetchError> {
        let url = self.cfg.base_url.join(&format!("releases/{release_id}"))
            .map_err(|e| FetchError::transport(release_id, e))?;
        let rb = self.http.get(url);
        Ok(match &self.cfg.token {
            Some(token) => rb.header(header::AUTHORIZATION, format!("Discogs token={token}")),
            None => rb
        })
    }

    fn fallback_resource_url(&self, id: u64) -> String {
        format!("{}releases/{id}", self.cfg.base_url)
    }
}

#[async_trait]
impl SummaryFetcher for DiscogsClient {
    async fn fetch_summary(&self, id: u64) -> Result<ReleaseSummary, FetchError> {
        debug!(release = id, "fetch.release");
        let resp = self.release(id)?
            .send()
            .await
            .map_err(|e| FetchError::transport(id, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = FetchError::status(
                id, status.as_u16(), status.canonical_reason().unwrap_or(""), &body
            );
            warn!(release = id, status = %status, "fetch.release.status");
            return Err(err);
        }

        let body = resp.text().await.map_err(|e| FetchError::transport(id, e))?;
        let value: Value = serde_json::from_str(&body).map_err(|e| FetchError {
            id,
            status: Some(status.as_u16()),
            message: format!("Release {id}: invalid JSON body: {e}")
        })?;

        let summary = map_release(id, &value, || self.fallback_resource_url(id));
        debug!(
            release = id, for_sale = ?summary.num_for_sale,
            priced = summary.lowest_price.is_some(), "fetch.release.done"
        );
        Ok(summary)
    }
}

fn non_empty_str(v: &Value) -> Option<String> {
    v.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Comma-joined artist names, empty when the list is missing or empty
fn artist_label(v: &Value) -> String {
    v.as_array()
        .map(|artists| artists.iter()
            .filter_map(|a| a.get("name").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(", "))
        .unwrap_or_default()
}

fn lowest_price(v: &Value) -> Option<LowestPrice> {
    match v {
        Value::Number(n) => n.as_f64().map(LowestPrice::Amount),
        Value::Object(o) => {
            let value = o.get("value").and_then(Value::as_f64)?;
            let currency = o.get("currency").and_then(Value::as_str).unwrap_or_default();
            Some(LowestPrice::Priced { value, currency: currency.to_string() })
        },
        _ => None
    }
}

/// (thumbnail, full size): primary image if tagged, else the first listed;
/// thumbnail prefers uri150 and falls back to the full size uri
fn pick_images(v: &Value) -> (Option<String>, Option<String>) {
    let images = v.as_array().map(Vec::as_slice).unwrap_or_default();
    let chosen = images.iter()
        .find(|img| img.get("type").and_then(Value::as_str) == Some("primary"))
        .or_else(|| images.first());

    let Some(img) = chosen else { return (None, None) };
    let full  = img.get("uri").and_then(non_empty_str);
    let thumb = img.get("uri150").and_then(non_empty_str).or_else(|| full.clone());
    (thumb, full)
}

/// Non-negative whole number, accepting float encodings such as `3.0`
fn whole_count(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    let n = v.as_f64()?;
    let whole = n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= u64::MAX as f64;
    whole.then_some(n as u64)
}

///
/// Maps a raw release document. Missing or oddly shaped fields become
/// unknown, never zero, and never fail the mapping
///
pub fn map_release(
    requested: u64,
    v: &Value,
    resource_fallback: impl FnOnce() -> String
) -> ReleaseSummary {
    let (thumb_url, image_url) = pick_images(&v["images"]);

    ReleaseSummary {
        id: v["id"].as_u64().unwrap_or(requested),
        title: v["title"].as_str().unwrap_or_default().to_string(),
        artists: artist_label(&v["artists"]),
        num_for_sale: whole_count(&v["num_for_sale"]),
        lowest_price: lowest_price(&v["lowest_price"]),
        resource_url: non_empty_str(&v["resource_url"]).unwrap_or_else(resource_fallback),
        uri: non_empty_str(&v["uri"]),
        thumb_url,
        image_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use url::Url;
    use wiremock::{
        matchers::{header as header_is, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn map(v: Value) -> ReleaseSummary {
        map_release(1, &v, || "fallback".to_string())
    }

    fn client_for(base: &str, token: Option<&str>) -> DiscogsClient {
        let cfg = DiscogsConfig {
            base_url: Url::parse(base).unwrap(),
            token: token.map(str::to_string),
            user_agent: "discogs-watcher-test/0.1".to_string()
        };
        DiscogsClient::new(&HttpConfig::default(), &cfg).unwrap()
    }

    fn release_doc() -> Value {
        json!({
            "id": 249504,
            "title": "Never Gonna Give You Up",
            "artists": [{ "name": "Rick Astley", "id": 72872 }],
            "num_for_sale": 58,
            "lowest_price": 0.63,
            "resource_url": "https://api.discogs.com/releases/249504",
            "uri": "https://www.discogs.com/release/249504-Rick-Astley-Never-Gonna-Give-You-Up",
            "images": [
                { "type": "secondary", "uri": "https://i.discogs.com/b.jpg", "uri150": "https://i.discogs.com/b150.jpg" },
                { "type": "primary", "uri": "https://i.discogs.com/a.jpg", "uri150": "https://i.discogs.com/a150.jpg" }
            ]
        })
    }

    #[test]
    fn artists_are_joined() {
        let two = map(json!({ "artists": [{ "name": "A" }, { "name": "B" }] }));
        assert_eq!(two.artists, "A, B");
        assert_eq!(map(json!({ "artists": [] })).artists, "");
        assert_eq!(map(json!({})).artists, "");
        assert_eq!(map(json!({ "artists": "A" })).artists, "");
    }

    #[test]
    fn primary_image_thumbnail_wins() {
        let s = map(json!({ "images": [
            { "type": "secondary", "uri": "X" },
            { "type": "primary", "uri": "Y", "uri150": "Y150" }
        ]}));
        assert_eq!(s.thumb_url.as_deref(), Some("Y150"));
        assert_eq!(s.image_url.as_deref(), Some("Y"));
    }

    #[test]
    fn first_image_full_size_when_no_thumbnail() {
        let s = map(json!({ "images": [{ "type": "secondary", "uri": "X" }] }));
        assert_eq!(s.thumb_url.as_deref(), Some("X"));
        assert_eq!(s.image_url.as_deref(), Some("X"));

        let thumb_only = map(json!({ "images": [{ "type": "secondary", "uri150": "X150" }] }));
        assert_eq!(thumb_only.thumb_url.as_deref(), Some("X150"));
        assert_eq!(thumb_only.image_url, None);

        let none = map(json!({ "images": [] }));
        assert_eq!((none.thumb_url, none.image_url), (None, None));
    }

    #[test]
    fn price_shapes() {
        assert_eq!(map(json!({ "lowest_price": 5 })).lowest_price, Some(LowestPrice::Amount(5.0)));
        assert_eq!(
            map(json!({ "lowest_price": { "value": 12.5, "currency": "EUR" } })).lowest_price,
            Some(LowestPrice::Priced { value: 12.5, currency: "EUR".to_string() })
        );
        assert_eq!(map(json!({ "lowest_price": null })).lowest_price, None);
        assert_eq!(map(json!({ "lowest_price": { "currency": "EUR" } })).lowest_price, None);
        assert_eq!(map(json!({ "lowest_price": "cheap" })).lowest_price, None);
    }

    #[test]
    fn absent_fields_stay_unknown() {
        let s = map_release(77, &json!({ "num_for_sale": null }), || "api/77".to_string());
        assert_eq!(s.id, 77);
        assert_eq!(s.title, "");
        assert_eq!(s.num_for_sale, None);
        assert_eq!(s.lowest_price, None);
        assert_eq!(s.uri, None);
        assert_eq!(s.resource_url, "api/77");
        assert_eq!(s.link(), "api/77");

        assert_eq!(map(json!({ "num_for_sale": 0 })).num_for_sale, Some(0));
    }

    #[test]
    fn for_sale_count_accepts_whole_floats() {
        assert_eq!(map(json!({ "num_for_sale": 3.0 })).num_for_sale, Some(3));
        assert_eq!(map(json!({ "num_for_sale": 0.0 })).num_for_sale, Some(0));
        assert_eq!(map(json!({ "num_for_sale": 2.5 })).num_for_sale, None);
        assert_eq!(map(json!({ "num_for_sale": -1.0 })).num_for_sale, None);
        assert_eq!(map(json!({ "num_for_sale": "3" })).num_for_sale, None);
    }

    #[tokio::test]
    async fn fetch_sends_token_and_maps_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/releases/249504"))
            .and(header_is("authorization", "Discogs token=abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(release_doc()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&format!("{}/", server.uri()), Some("abc123"));
        let s = client.fetch_summary(249504).await.unwrap();

        assert_eq!(s.id, 249504);
        assert_eq!(s.artists, "Rick Astley");
        assert_eq!(s.num_for_sale, Some(58));
        assert_eq!(s.lowest_price, Some(LowestPrice::Amount(0.63)));
        assert_eq!(s.thumb_url.as_deref(), Some("https://i.discogs.com/a150.jpg"));
        assert!(s.link().starts_with("https://www.discogs.com/release/249504"));
    }

    #[tokio::test]
    async fn fetch_without_token_sends_no_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/releases/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 5, "title": "T" })))
            .mount(&server)
            .await;

        let client = client_for(&format!("{}/", server.uri()), None);
        let s = client.fetch_summary(5).await.unwrap();
        assert_eq!(s.title, "T");
        assert_eq!(s.resource_url, format!("{}/releases/5", server.uri()));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
        assert_eq!(
            requests[0].headers.get("user-agent").and_then(|v| v.to_str().ok()),
            Some("discogs-watcher-test/0.1")
        );
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_error() {
        let server = MockServer::start().await;
        let body = format!("{{\"message\": \"Release not found.\"}}{}", "z".repeat(500));
        Mock::given(method("GET"))
            .and(path("/releases/202"))
            .respond_with(ResponseTemplate::new(404).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&format!("{}/", server.uri()), None);
        let err = client.fetch_summary(202).await.unwrap_err();

        assert_eq!(err.id, 202);
        assert_eq!(err.status, Some(404));
        assert!(err.message.contains("Release 202: 404 Not Found"));
        assert!(err.message.contains("Release not found."));
        assert!(err.message.chars().count() < 300);
    }

    #[tokio::test]
    async fn odd_shapes_degrade_gracefully() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/releases/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "nine", "artists": "oops", "images": {}, "num_for_sale": -3
            })))
            .mount(&server)
            .await;

        let client = client_for(&format!("{}/", server.uri()), None);
        let s = client.fetch_summary(9).await.unwrap();
        assert_eq!(s.id, 9);
        assert_eq!(s.artists, "");
        assert_eq!(s.num_for_sale, None);
        assert_eq!(s.thumb_url, None);
    }

    #[tokio::test]
    async fn transport_failure_has_no_status() {
        let client = client_for("http://127.0.0.1:1/", None);
        let err = client.fetch_summary(3).await.unwrap_err();
        assert_eq!(err.id, 3);
        assert_eq!(err.status, None);
        assert!(err.message.starts_with("Release 3: "));
    }

    fn live() -> bool {
        std::env::var("LIVE_HTTP").ok().as_deref() == Some("1")
    }

    #[tokio::test]
    async fn discogs_client_testbench() -> Result<(), WatcherError> {
        dotenvy::dotenv().ok();

        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(())
        }

        let cfgs = crate::config::load_config()?;
        let client = DiscogsClient::new(&cfgs.http, &cfgs.discogs)?;
        let summary = client.fetch_summary(249504).await?;
        println!("summary: {summary:#?}");
        assert_eq!(summary.id, 249504);
        Ok(())
    }
}
