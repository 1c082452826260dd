use crate::config::Settings;
use crate::domain::feed::FeedPage;
use crate::ingest::FeedSource;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

const BODY_SNIPPET_BYTES: usize = 512;

/// Client for the upstream ratings feed (`GET <API_URL>[?next_page=<token>]`).
#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    http: reqwest::Client,
    api_url: String,
    auth_header: String,
}

impl HttpFeedClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_url = settings.require_api_url()?.to_string();
        let auth_header = settings.require_auth_header()?.to_string();

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.ingest_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("failed to build ratings feed http client")?;

        Ok(Self::new(http, api_url, auth_header))
    }

    pub fn new(http: reqwest::Client, api_url: String, auth_header: String) -> Self {
        Self {
            http,
            api_url,
            auth_header,
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&self.auth_header).context("AUTH_HEADER is not a valid header value")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl FeedSource for HttpFeedClient {
    async fn fetch_page(&self, page_number: u32, next_page: Option<&str>) -> Result<FeedPage> {
        let mut req = self.http.get(&self.api_url).headers(self.headers()?);
        if let Some(token) = next_page {
            req = req.query(&[("next_page", token)]);
        }

        let res = req
            .send()
            .await
            .with_context(|| format!("ratings page {page_number}: request failed"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("ratings page {page_number}: failed to read response body"))?;

        if !status.is_success() {
            anyhow::bail!(
                "ratings page {page_number}: HTTP {status}: {}",
                snippet(&text, BODY_SNIPPET_BYTES)
            );
        }

        serde_json::from_str::<FeedPage>(&text)
            .with_context(|| format!("ratings page {page_number}: response is not a valid page"))
    }
}

fn snippet(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
