//! HTTP transport shared by the source fetchers

use std::time::Duration;

use reqwest::{header, Client};

use crate::error::FetchError;

/// Retry and deadline settings for upstream GETs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    pub backoff: Duration,
    /// Overall budget across every attempt
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_secs(2),
            deadline: Duration::from_secs(30),
        }
    }
}

/// GET client with retries on transport errors, 429 and 5xx
#[derive(Clone)]
pub struct SourceHttpClient {
    client: Client,
    policy: RetryPolicy,
}

impl SourceHttpClient {
    pub fn new(policy: RetryPolicy) -> Self {
        let client = Client::builder()
            .user_agent(concat!("propagation-report/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, policy }
    }

    /// Fetch `url` as text, honouring the retry policy and overall deadline
    pub async fn get_text(&self, url: &str, accept: &str) -> Result<String, FetchError> {
        match tokio::time::timeout(self.policy.deadline, self.get_with_retries(url, accept)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Transport(format!(
                "deadline of {}s exceeded",
                self.policy.deadline.as_secs()
            ))),
        }
    }

    async fn get_with_retries(&self, url: &str, accept: &str) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            match self.get_once(url, accept).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempt < self.policy.retries => {
                    attempt += 1;
                    tracing::debug!(url, attempt, error = %err, "Retrying upstream request");
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn get_once(&self, url: &str, accept: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, accept)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::HttpStatus { status });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Transport(format!("failed to read body: {}", e)))
    }
}

impl Default for SourceHttpClient {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
