use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Best-effort cosmetic shortening. Implementations never fail: on any
/// error the input comes back unchanged.
#[async_trait]
pub trait Shorten: Send + Sync {
    async fn shorten(&self, url: &str) -> String;
}

/// TinyURL-shaped shortening client: GET `<base>/api-create.php?url=<long>`,
/// a 200 body is the short link.
pub struct UrlShortener {
    client: reqwest::Client,
    base_url: String,
}

impl UrlShortener {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    async fn request(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/api-create.php", self.base_url))
            .query(&[("url", url)])
            .send()
            .await
            .context("Failed to reach shortening service")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Shortening service error ({})", status);
        }

        response
            .text()
            .await
            .context("Failed to read shortened URL")
    }
}

#[async_trait]
impl Shorten for UrlShortener {
    async fn shorten(&self, url: &str) -> String {
        match self.request(url).await {
            Ok(short) => short,
            Err(e) => {
                debug!("Shortening failed, keeping long link: {:#}", e);
                url.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_service_falls_back_to_input() {
        // Nothing listens on this port; the connection fails immediately.
        let shortener = UrlShortener::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9".to_string(),
        );
        let long = "https://www.amazon.es/dp/B000123ABC?tag=mytag-21";
        assert_eq!(shortener.shorten(long).await, long);
    }
}
