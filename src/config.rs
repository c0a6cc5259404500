//! Endpoint resolution and client configuration.
//!
//! The API base URL and OAuth redirect URI resolve in three tiers: an explicit
//! configured value, then the hosting page's origin when one is known, then a
//! fixed local default.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::orchestrator::RunTiming;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:3000/callback";
/// Port the backend listens on when derived from the page origin.
pub const ORIGIN_API_PORT: u16 = 8000;

pub const SPOTIFY_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const SPOTIFY_SCOPES: &[&str] = &[
    "playlist-read-private",
    "playlist-modify-private",
    "playlist-modify-public",
];

/// Origin of the page hosting the client (scheme, host and optional port).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOrigin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl PageOrigin {
    /// Parse from any URL; path, query and fragment are ignored.
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(raw.trim())?;
        let host = url
            .host_str()
            .ok_or(url::ParseError::EmptyHost)?
            .to_string();
        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port: url.port(),
        })
    }

    /// `scheme://host[:port]`
    pub fn origin(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.scheme, self.host, port),
            None => format!("{}://{}", self.scheme, self.host),
        }
    }
}

fn configured(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve the backend base address. Never ends with `/`.
pub fn resolve_api_base_url(configured_value: Option<&str>, page: Option<&PageOrigin>) -> String {
    if let Some(value) = configured(configured_value) {
        return value.trim_end_matches('/').to_string();
    }
    if let Some(page) = page {
        return format!("{}://{}:{}", page.scheme, page.host, ORIGIN_API_PORT);
    }
    DEFAULT_API_BASE_URL.to_string()
}

/// Resolve the OAuth redirect URI registered with the provider.
pub fn resolve_redirect_uri(configured_value: Option<&str>, page: Option<&PageOrigin>) -> String {
    if let Some(value) = configured(configured_value) {
        return value.to_string();
    }
    if let Some(page) = page {
        return format!("{}/callback", page.origin());
    }
    DEFAULT_REDIRECT_URI.to_string()
}

/// Fully resolved client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub redirect_uri: String,
    pub client_id: Option<String>,
    pub storage_path: Option<PathBuf>,
    pub request_timeout: Option<Duration>,
    pub timing: RunTiming,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            client_id: None,
            storage_path: None,
            request_timeout: None,
            timing: RunTiming::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lan_page() -> PageOrigin {
        PageOrigin::parse("http://192.168.1.20:3000/classify?x=1").unwrap()
    }

    #[test]
    fn api_base_prefers_configured_value() {
        let page = lan_page();
        assert_eq!(
            resolve_api_base_url(Some("  https://api.example.com//  "), Some(&page)),
            "https://api.example.com"
        );
    }

    #[test]
    fn api_base_falls_back_to_page_host() {
        let page = lan_page();
        assert_eq!(
            resolve_api_base_url(None, Some(&page)),
            "http://192.168.1.20:8000"
        );
        assert_eq!(
            resolve_api_base_url(Some("   "), Some(&page)),
            "http://192.168.1.20:8000"
        );
    }

    #[test]
    fn api_base_falls_back_to_local_default() {
        assert_eq!(resolve_api_base_url(None, None), DEFAULT_API_BASE_URL);
        assert_eq!(resolve_api_base_url(Some(""), None), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn redirect_prefers_configured_value_trimmed() {
        let page = lan_page();
        assert_eq!(
            resolve_redirect_uri(Some(" https://app.example.com/callback/ "), Some(&page)),
            "https://app.example.com/callback/"
        );
    }

    #[test]
    fn redirect_falls_back_to_page_origin() {
        let page = lan_page();
        assert_eq!(
            resolve_redirect_uri(None, Some(&page)),
            "http://192.168.1.20:3000/callback"
        );
        let https = PageOrigin::parse("https://moodlist.example.com/").unwrap();
        assert_eq!(
            resolve_redirect_uri(None, Some(&https)),
            "https://moodlist.example.com/callback"
        );
    }

    #[test]
    fn redirect_falls_back_to_local_default() {
        assert_eq!(resolve_redirect_uri(None, None), DEFAULT_REDIRECT_URI);
    }

    #[test]
    fn page_origin_rejects_hostless_urls() {
        assert!(PageOrigin::parse("not a url").is_err());
        assert!(PageOrigin::parse("mailto:someone@example.com").is_err());
    }
}
