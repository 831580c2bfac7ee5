//! Where the countdown deadline comes from.
//!
//! Normally a small text file on the web holding a single
//! `YYYY-MM-DD HH:MM:SS` line; it can also be pinned on the command line.

use crate::Result;
use crate::countdown::parse_deadline;
use chrono::NaiveDateTime;

/// Public deadline file maintained alongside the original clock.
pub const DEFAULT_DEADLINE_URL: &str =
    "https://sparkes.github.io/ClimateClockMinimal/deadline.txt";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeadlineSource {
    /// Fetch the deadline text over HTTP(S).
    Url(String),
    /// Use this text as-is.
    Fixed(String),
}

impl DeadlineSource {
    /// Raw deadline text, not yet validated.
    pub async fn fetch(&self, client: &reqwest::Client) -> Result<String> {
        match self {
            DeadlineSource::Fixed(text) => Ok(text.clone()),
            DeadlineSource::Url(url) => {
                tracing::info!("Fetching deadline from {}", url);
                let text = client
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?;
                Ok(text)
            }
        }
    }

    /// Fetch and parse. A malformed value is an error, never a guess.
    pub async fn load(&self, client: &reqwest::Client) -> Result<NaiveDateTime> {
        let text = self.fetch(client).await?;
        let deadline = parse_deadline(&text)?;
        tracing::info!("Deadline: {}", deadline);
        Ok(deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn fixed_source_skips_the_network() {
        let client = reqwest::Client::new();
        let source = DeadlineSource::Fixed("2029-07-22 12:00:00".to_string());
        assert_eq!(
            source.fetch(&client).await.unwrap(),
            "2029-07-22 12:00:00"
        );
        let deadline = source.load(&client).await.unwrap();
        assert_eq!(deadline.to_string(), "2029-07-22 12:00:00");
    }

    #[tokio::test]
    async fn malformed_fixed_source_is_rejected() {
        let client = reqwest::Client::new();
        let source = DeadlineSource::Fixed("soon".to_string());
        let err = source.load(&client).await.unwrap_err();
        assert!(matches!(err, Error::InvalidDeadlineFormat { .. }));
    }

    #[tokio::test]
    async fn unreachable_url_is_an_http_error() {
        let client = reqwest::Client::new();
        let source = DeadlineSource::Url("http://127.0.0.1:9/deadline.txt".to_string());
        let err = source.load(&client).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
