//! Page loading.
//!
//! [`PageFetcher`] is the seam between workflows and the network. The HTTP
//! implementation either GETs the page directly or, when a rendering endpoint
//! is configured, asks that service for the rendered markup of the page once
//! its ready selector has appeared.

use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::json;
use tracing::{debug, instrument, warn};
use url::Url;

use lexcrawl_shared::{HarvestConfig, LexcrawlError, Result};

use crate::page::LoadedPage;

/// Loads pages by URL.
pub trait PageFetcher: Send + Sync {
    /// Load `url`. `ready` lists selectors that signal the page is complete;
    /// an empty slice means the raw response is good enough.
    fn load(
        &self,
        url: &Url,
        ready: &'static [&'static str],
    ) -> impl Future<Output = Result<LoadedPage>> + Send;
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// HTTP page loader with SSRF protection.
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    timeout_secs: u64,
    render_endpoint: Option<Url>,
    /// Allow localhost/private IPs (for tests against mock servers).
    allow_localhost: bool,
}

impl HttpFetcher {
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LexcrawlError::Fetch(format!("failed to build HTTP client: {e}")))?;

        let render_endpoint = config
            .render_endpoint
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| {
                    LexcrawlError::config(format!("invalid render endpoint {raw:?}: {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
            render_endpoint,
            allow_localhost: false,
        })
    }

    /// Allow loading from localhost/private IPs.
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    fn map_send_error(&self, url: &Url, e: reqwest::Error) -> LexcrawlError {
        if e.is_timeout() {
            LexcrawlError::Timeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            LexcrawlError::Fetch(format!("{url}: {e}"))
        }
    }

    async fn fetch_direct(&self, url: &Url) -> Result<(String, u16)> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| self.map_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LexcrawlError::Fetch(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(url, e))?;
        Ok((body, status.as_u16()))
    }

    async fn fetch_rendered(
        &self,
        endpoint: &Url,
        url: &Url,
        ready: &[&str],
    ) -> Result<(String, u16)> {
        let mut payload = json!({ "url": url.as_str() });
        if !ready.is_empty() {
            payload["waitForSelector"] = json!({
                "selector": ready.join(", "),
                "timeout": self.timeout_secs * 1000,
            });
        }

        let response = self
            .client
            .post(endpoint.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LexcrawlError::Fetch(format!(
                "{url}: render endpoint returned HTTP {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_send_error(url, e))?;
        Ok((body, status.as_u16()))
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn load(&self, url: &Url, ready: &'static [&'static str]) -> Result<LoadedPage> {
        if !self.allow_localhost && is_ssrf_target(url) {
            warn!(%url, "SSRF protection: blocked");
            return Err(LexcrawlError::Fetch(format!("{url}: blocked host")));
        }

        let (html, status_code) = match &self.render_endpoint {
            Some(endpoint) => self.fetch_rendered(endpoint, url, ready).await?,
            None => self.fetch_direct(url).await?,
        };

        if !ready.is_empty() && !has_any(&html, ready) {
            debug!(%url, "no ready selector present in loaded page");
        }

        Ok(LoadedPage {
            url: url.clone(),
            html,
            status_code: Some(status_code),
        })
    }
}

fn has_any(html: &str, selectors: &[&str]) -> bool {
    let doc = Html::parse_document(html);
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .any(|sel| doc.select(&sel).next().is_some())
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
pub fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    if let Some(host) = url.host_str() {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        if host == "localhost" || host.ends_with(".local") || host.ends_with(".internal") {
            return true;
        }
    }

    false
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexcrawl_shared::AppConfig;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> HarvestConfig {
        let mut config = HarvestConfig::from(&AppConfig::default());
        config.timeout_secs = 2;
        config
    }

    #[test]
    fn ssrf_guard() {
        for blocked in [
            "file:///etc/passwd",
            "http://127.0.0.1:8080/",
            "http://10.0.0.1/",
            "http://192.168.1.1/admin",
            "http://localhost:3000/",
            "http://[::1]/",
        ] {
            assert!(is_ssrf_target(&Url::parse(blocked).unwrap()), "{blocked}");
        }
        assert!(!is_ssrf_target(
            &Url::parse("https://diariodarepublica.pt/dr/detalhe/lei/1").unwrap()
        ));
    }

    #[tokio::test]
    async fn direct_get_returns_markup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dr/detalhe/lei/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Lei</h1>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&config()).unwrap().allow_localhost();
        let url = Url::parse(&format!("{}/dr/detalhe/lei/1", server.uri())).unwrap();
        let page = fetcher.load(&url, &["h1"]).await.unwrap();
        assert_eq!(page.html, "<h1>Lei</h1>");
        assert_eq!(page.status_code, Some(200));
    }

    #[tokio::test]
    async fn http_error_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&config()).unwrap().allow_localhost();
        let url = Url::parse(&format!("{}/dr/detalhe/lei/1", server.uri())).unwrap();
        let err = fetcher.load(&url, &[]).await.unwrap_err();
        assert!(matches!(err, LexcrawlError::Fetch(_)), "{err}");
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn slow_page_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<h1>tarde</h1>")
                    .set_delay(Duration::from_secs(4)),
            )
            .mount(&server)
            .await;

        let mut config = config();
        config.timeout_secs = 1;
        let fetcher = HttpFetcher::new(&config).unwrap().allow_localhost();
        let url = Url::parse(&format!("{}/dr/detalhe/lei/1", server.uri())).unwrap();
        let err = fetcher.load(&url, &[]).await.unwrap_err();
        assert!(matches!(err, LexcrawlError::Timeout { secs: 1, .. }), "{err}");
    }

    #[tokio::test]
    async fn render_endpoint_receives_wait_selector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .and(body_partial_json(serde_json::json!({
                "url": "https://diariodarepublica.pt/dr/detalhe/lei/1",
                "waitForSelector": { "selector": "h1, div.x" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>renderizado</h1>"))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config();
        config.render_endpoint = Some(format!("{}/render", server.uri()));
        let fetcher = HttpFetcher::new(&config).unwrap().allow_localhost();
        let url = Url::parse("https://diariodarepublica.pt/dr/detalhe/lei/1").unwrap();
        let page = fetcher.load(&url, &["h1", "div.x"]).await.unwrap();
        assert_eq!(page.html, "<h1>renderizado</h1>");
        assert_eq!(page.url, url);
    }

    #[tokio::test]
    async fn private_hosts_are_blocked_by_default() {
        let fetcher = HttpFetcher::new(&config()).unwrap();
        let url = Url::parse("http://127.0.0.1:9/dr/detalhe/lei/1").unwrap();
        let err = fetcher.load(&url, &[]).await.unwrap_err();
        assert!(err.to_string().contains("blocked host"));
    }

    #[test]
    fn invalid_render_endpoint_is_a_config_error() {
        let mut config = config();
        config.render_endpoint = Some("not a url".into());
        assert!(matches!(
            HttpFetcher::new(&config),
            Err(LexcrawlError::Config { .. })
        ));
    }
}
