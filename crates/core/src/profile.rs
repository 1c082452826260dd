use crate::config::Settings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("ticker is required")]
    MissingTicker,

    #[error("company profile lookup is not configured")]
    NotConfigured,

    #[error("profile service returned HTTP {status}")]
    Upstream { status: u16 },

    #[error("profile request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("profile response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("profile URL is invalid: {0}")]
    Url(#[from] url::ParseError),
}

/// Flattened company profile returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub ticker: String,
    pub description: String,
    pub domain: String,
    pub logo_url: String,
}

#[derive(Debug, Deserialize)]
struct UpstreamProfile {
    #[serde(default)]
    weburl: String,
    #[serde(default)]
    logo: String,
    #[serde(default, rename = "finnhubIndustry")]
    industry: String,
}

#[async_trait::async_trait]
pub trait CompanyProfileProvider: Send + Sync {
    async fn lookup(&self, ticker: &str) -> Result<CompanyProfile, ProfileError>;
}

#[derive(Debug, Clone)]
pub struct HttpProfileClient {
    http: reqwest::Client,
    url_template: String,
    api_key: String,
}

impl HttpProfileClient {
    pub fn from_settings(settings: &Settings) -> Result<Self, ProfileError> {
        let url_template = settings
            .profile_url_template
            .clone()
            .ok_or(ProfileError::NotConfigured)?;
        let api_key = settings
            .profile_api_key
            .clone()
            .ok_or(ProfileError::NotConfigured)?;
        Ok(Self::new(reqwest::Client::new(), url_template, api_key))
    }

    pub fn new(http: reqwest::Client, url_template: String, api_key: String) -> Self {
        Self {
            http,
            url_template,
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl CompanyProfileProvider for HttpProfileClient {
    async fn lookup(&self, ticker: &str) -> Result<CompanyProfile, ProfileError> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(ProfileError::MissingTicker);
        }

        let url = render_url(&self.url_template, ticker, &self.api_key)?;
        let res = self.http.get(url).send().await?;

        let status = res.status();
        if !status.is_success() {
            tracing::warn!(%ticker, http_status = %status, "profile lookup failed upstream");
            return Err(ProfileError::Upstream {
                status: status.as_u16(),
            });
        }

        let body = res.bytes().await?;
        let profile: UpstreamProfile = serde_json::from_slice(&body)?;

        Ok(CompanyProfile {
            ticker: ticker.to_string(),
            description: profile.industry,
            domain: profile.weburl,
            logo_url: profile.logo,
        })
    }
}

/// Fills the lookup URL template.
///
/// Supports named `{ticker}` / `{api_key}` placeholders, or two positional `%s` (ticker first,
/// then key). Both values are percent-encoded.
pub fn render_url(template: &str, ticker: &str, api_key: &str) -> Result<url::Url, ProfileError> {
    let ticker: String = url::form_urlencoded::byte_serialize(ticker.as_bytes()).collect();
    let api_key: String = url::form_urlencoded::byte_serialize(api_key.as_bytes()).collect();

    let rendered = if template.contains("{ticker}") || template.contains("{api_key}") {
        template
            .replace("{ticker}", &ticker)
            .replace("{api_key}", &api_key)
    } else {
        template
            .replacen("%s", &ticker, 1)
            .replacen("%s", &api_key, 1)
    };

    Ok(url::Url::parse(&rendered)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    fn client(server: &MockServer) -> HttpProfileClient {
        HttpProfileClient::new(
            reqwest::Client::new(),
            server.url("/api/v1/stock/profile2?symbol=%s&token=%s"),
            "secret".to_string(),
        )
    }

    #[test]
    fn renders_positional_and_named_templates() {
        let url = render_url("https://example.test/p?symbol=%s&token=%s", "BRK.B", "k").unwrap();
        assert_eq!(url.as_str(), "https://example.test/p?symbol=BRK.B&token=k");

        let url = render_url("https://example.test/{ticker}?key={api_key}", "AAPL", "a b").unwrap();
        assert_eq!(url.as_str(), "https://example.test/AAPL?key=a+b");
    }

    #[test]
    fn encodes_hostile_tickers() {
        let url = render_url("https://example.test/p?symbol=%s&token=%s", "A&token=x", "k").unwrap();
        assert_eq!(url.query(), Some("symbol=A%26token%3Dx&token=k"));
    }

    #[tokio::test]
    async fn reshapes_upstream_profile() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/stock/profile2")
                .query_param("symbol", "AAPL")
                .query_param("token", "secret");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "name": "Apple Inc",
                    "weburl": "https://www.apple.com/",
                    "logo": "https://static.example/AAPL.png",
                    "finnhubIndustry": "Technology"
                }));
        });

        let profile = client(&server).lookup("AAPL").await.unwrap();

        mock.assert();
        assert_eq!(
            profile,
            CompanyProfile {
                ticker: "AAPL".to_string(),
                description: "Technology".to_string(),
                domain: "https://www.apple.com/".to_string(),
                logo_url: "https://static.example/AAPL.png".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn passes_through_upstream_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/stock/profile2");
            then.status(429).body("slow down");
        });

        let err = client(&server).lookup("AAPL").await.unwrap_err();
        assert!(matches!(err, ProfileError::Upstream { status: 429 }));
    }

    #[tokio::test]
    async fn malformed_upstream_json_is_a_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/stock/profile2");
            then.status(200).body("<html>");
        });

        let err = client(&server).lookup("AAPL").await.unwrap_err();
        assert!(matches!(err, ProfileError::Decode(_)));
    }

    #[tokio::test]
    async fn blank_ticker_is_rejected_without_a_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET);
            then.status(200);
        });

        let err = client(&server).lookup("  ").await.unwrap_err();

        assert!(matches!(err, ProfileError::MissingTicker));
        mock.assert_hits(0);
    }
}
