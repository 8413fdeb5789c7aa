//! Origin Client
//!
//! Fetches values from the upstream HTTP origin the server caches.

use anyhow::Context;
use serde_json::Value;
use tracing::debug;

/// HTTP client for `{base_url}/{key}` JSON documents.
#[derive(Debug, Clone)]
pub struct OriginClient {
    client: reqwest::Client,
    base_url: String,
}

impl OriginClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL the value of `key` is fetched from.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(key))
    }

    /// Fetches and decodes the JSON document for `key`.
    pub async fn fetch(&self, key: &str) -> anyhow::Result<Value> {
        let url = self.url_for(key);
        debug!(%url, "Fetching from origin");

        let value = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("origin rejected {}", url))?
            .json::<Value>()
            .await
            .with_context(|| format!("origin returned invalid JSON for {}", url))?;

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_encodes_key() {
        let origin = OriginClient::new("http://origin.local/api/");
        assert_eq!(origin.url_for("user-1"), "http://origin.local/api/user-1");
        assert_eq!(origin.url_for("a b/c"), "http://origin.local/api/a%20b%2Fc");
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_error() {
        // Bind then drop a listener to get a port nothing serves on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let origin = OriginClient::new(format!("http://{}", addr));
        let err = origin.fetch("k").await.unwrap_err();
        assert!(format!("{:#}", err).contains("request to"));
    }
}
