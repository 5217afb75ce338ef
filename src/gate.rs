use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use log::warn;

use crate::clock::TimeSource;

/// Message shown once the application has expired.
pub const EXPIRED_MESSAGE: &str = "Thank you for your visit.";

/// Message shown while the application is available.
pub const WELCOME_MESSAGE: &str = "Welcome to the application!";

/// Default expiration instant, 2024-09-10 14:00 UTC.
pub fn default_expiration() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 10, 14, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Whether the application may still be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Open,
    Expired,
}

/// Outcome of one gate check.
#[derive(Debug, Clone)]
pub struct GateCheck {
    /// Instant the decision was made against.
    pub now: DateTime<Utc>,
    /// Set when the remote clock failed and local time was used instead.
    pub warning: Option<String>,
    pub access: Access,
}

impl GateCheck {
    pub fn is_open(&self) -> bool {
        self.access == Access::Open
    }

    pub fn message(&self) -> &'static str {
        match self.access {
            Access::Open => WELCOME_MESSAGE,
            Access::Expired => EXPIRED_MESSAGE,
        }
    }
}

/// Pure gate decision: expired only strictly after the expiration instant.
pub fn access_at(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Access {
    if now > expires_at {
        Access::Expired
    } else {
        Access::Open
    }
}

/// Expiration gate. Every check asks the time source again.
pub struct Gate {
    expires_at: DateTime<Utc>,
    source: Arc<dyn TimeSource>,
}

impl Gate {
    pub fn new(expires_at: DateTime<Utc>, source: Arc<dyn TimeSource>) -> Self {
        Self { expires_at, source }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub async fn check(&self) -> GateCheck {
        let (now, warning) = match self.source.now_utc().await {
            Ok(now) => (now, None),
            Err(e) => {
                warn!("time service unavailable, falling back to local clock: {}", e);
                (
                    Utc::now(),
                    Some(format!("Error fetching time: {}. Using local system time.", e)),
                )
            }
        };

        GateCheck {
            now,
            warning,
            access: access_at(now, self.expires_at),
        }
    }
}
