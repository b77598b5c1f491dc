use tracing::debug;

use crate::{config::FetchConfig, error::ExtractionError};

/// Outbound page retrieval for live feature extraction.
pub struct PageFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl PageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Page markup. Non-success statuses are errors, as are bodies larger
    /// than the configured limit. Invalid UTF-8 is replaced, not rejected.
    pub async fn fetch(&self, url: &str) -> Result<String, ExtractionError> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        let too_large = || ExtractionError::BodyTooLarge {
            limit: self.max_body_bytes,
        };
        if response.content_length().is_some_and(|len| len > self.max_body_bytes as u64) {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        debug!("Fetched {} bytes from {}", body.len(), url);

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_url_fails_without_network() {
        let fetcher = PageFetcher::new(&FetchConfig::default()).unwrap();
        let result = fetcher.fetch("not a url").await;
        assert!(matches!(result, Err(ExtractionError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_sends_configured_user_agent() {
        let addr = test_site::spawn().await;
        let config = FetchConfig {
            user_agent: "PhishSense-Test/1.0".to_string(),
            ..Default::default()
        };
        let fetcher = PageFetcher::new(&config).unwrap();

        let body = fetcher.fetch(&format!("http://{addr}/agent")).await.unwrap();
        assert_eq!(body, "PhishSense-Test/1.0");
    }

    #[tokio::test]
    async fn test_returns_page_markup() {
        let addr = test_site::spawn().await;
        let fetcher = PageFetcher::new(&FetchConfig::default()).unwrap();

        let body = fetcher.fetch(&format!("http://{addr}/login")).await.unwrap();
        assert_eq!(body, test_site::LOGIN_PAGE);
    }

    #[tokio::test]
    async fn test_error_status_is_fetch_error() {
        let addr = test_site::spawn().await;
        let fetcher = PageFetcher::new(&FetchConfig::default()).unwrap();

        match fetcher.fetch(&format!("http://{addr}/missing")).await {
            Err(ExtractionError::Fetch(e)) => {
                assert_eq!(e.status(), Some(reqwest::StatusCode::NOT_FOUND));
            }
            other => panic!("expected fetch error, got {:?}", other.map(|b| b.len())),
        }
    }

    #[tokio::test]
    async fn test_timeout_applies() {
        let addr = test_site::spawn().await;
        let config = FetchConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        let fetcher = PageFetcher::new(&config).unwrap();

        match fetcher.fetch(&format!("http://{addr}/slow")).await {
            Err(ExtractionError::Fetch(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {:?}", other.map(|b| b.len())),
        }
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let addr = test_site::spawn().await;
        let config = FetchConfig {
            max_body_bytes: 1024,
            ..Default::default()
        };
        let fetcher = PageFetcher::new(&config).unwrap();

        let result = fetcher.fetch(&format!("http://{addr}/large")).await;
        assert!(matches!(result, Err(ExtractionError::BodyTooLarge { limit: 1024 })));
    }
}
