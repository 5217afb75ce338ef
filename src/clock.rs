//! Remote time lookup.
//!
//! The expiration gate must not trust the host clock alone, so the current
//! instant is asked from a public time service first.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::TimeError;

/// Default UTC endpoint of the public time service.
pub const DEFAULT_TIME_URL: &str = "http://worldtimeapi.org/api/timezone/Etc/UTC";

/// Anything that can tell the current UTC instant, possibly failing.
#[async_trait]
pub trait TimeSource: Send + Sync {
    async fn now_utc(&self) -> Result<DateTime<Utc>, TimeError>;
}

#[derive(Deserialize)]
struct TimePayload {
    datetime: String,
}

/// Parse a `{"datetime": "<ISO-8601>"}` body into a UTC instant.
pub fn parse_time_payload(body: &str) -> Result<DateTime<Utc>, TimeError> {
    let payload: TimePayload = serde_json::from_str(body)?;
    let parsed = DateTime::parse_from_rfc3339(&payload.datetime)?;
    Ok(parsed.with_timezone(&Utc))
}

/// HTTP client for a worldtimeapi.org compatible endpoint.
pub struct WorldTimeApi {
    client: reqwest::Client,
    url: String,
}

impl WorldTimeApi {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TimeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TimeSource for WorldTimeApi {
    async fn now_utc(&self) -> Result<DateTime<Utc>, TimeError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_time_payload(&body)
    }
}

/// Time sources with scripted answers, for tests and offline runs.
pub mod mock {
    use super::*;

    /// Always reports the same instant.
    pub struct FixedTime(pub DateTime<Utc>);

    #[async_trait]
    impl TimeSource for FixedTime {
        async fn now_utc(&self) -> Result<DateTime<Utc>, TimeError> {
            Ok(self.0)
        }
    }

    /// Always fails with a payload error, like a service answering garbage.
    pub struct UnreachableTime;

    #[async_trait]
    impl TimeSource for UnreachableTime {
        async fn now_utc(&self) -> Result<DateTime<Utc>, TimeError> {
            parse_time_payload("service unavailable")
        }
    }
}
