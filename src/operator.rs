//! PIN gate for the operator dashboard.
//!
//! The PIN is checked against a bcrypt hash. Successful logins hand out an
//! opaque bearer token kept in memory; tokens lapse after a stretch of
//! inactivity or a fixed maximum lifetime. Repeated wrong PINs lock the
//! login for a while.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_FAILED_ATTEMPTS: u32 = 5;
const LOCKOUT_MINUTES: i64 = 15;
const SESSION_INACTIVITY_MINUTES: i64 = 30;
const SESSION_MAX_HOURS: i64 = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("too many failed attempts, try again in {retry_after_secs} seconds")]
    LockedOut { retry_after_secs: i64 },
    #[error("incorrect PIN")]
    InvalidPin,
    #[error("operator session required")]
    MissingToken,
    #[error("operator session expired or unknown")]
    InvalidSession,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperatorSession {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip)]
    last_activity: DateTime<Utc>,
}

impl OperatorSession {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
            || now - self.last_activity > Duration::minutes(SESSION_INACTIVITY_MINUTES)
    }
}

#[derive(Default)]
struct Lockout {
    failures: u32,
    locked_until: Option<DateTime<Utc>>,
}

pub struct OperatorAuth {
    pin_hash: String,
    sessions: Mutex<HashMap<String, OperatorSession>>,
    lockout: Mutex<Lockout>,
}

impl OperatorAuth {
    pub fn new(pin_hash: impl Into<String>) -> Self {
        Self {
            pin_hash: pin_hash.into(),
            sessions: Mutex::new(HashMap::new()),
            lockout: Mutex::new(Lockout::default()),
        }
    }

    /// Verifies the PIN and opens a session. Blocking; call off the async runtime.
    ///
    /// The lockout state stays locked across verification, so concurrent
    /// attempts are checked one at a time against the failure count.
    pub fn login(&self, pin: &str, now: DateTime<Utc>) -> Result<OperatorSession, AuthError> {
        let mut lockout = self.lockout.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(until) = lockout.locked_until {
            if now < until {
                return Err(AuthError::LockedOut {
                    retry_after_secs: (until - now).num_seconds().max(1),
                });
            }
            *lockout = Lockout::default();
        }

        if !bcrypt::verify(pin.trim(), &self.pin_hash).unwrap_or(false) {
            lockout.failures += 1;
            warn!(failures = lockout.failures, "operator login failed");
            if lockout.failures >= MAX_FAILED_ATTEMPTS {
                let until = now + Duration::minutes(LOCKOUT_MINUTES);
                lockout.locked_until = Some(until);
                warn!(%until, "operator login locked");
                return Err(AuthError::LockedOut {
                    retry_after_secs: LOCKOUT_MINUTES * 60,
                });
            }
            return Err(AuthError::InvalidPin);
        }
        *lockout = Lockout::default();
        drop(lockout);

        let session = OperatorSession {
            token: Uuid::new_v4().simple().to_string(),
            created_at: now,
            expires_at: now + Duration::hours(SESSION_MAX_HOURS),
            last_activity: now,
        };
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, existing| !existing.is_expired(now));
        sessions.insert(session.token.clone(), session.clone());
        info!(active_sessions = sessions.len(), "operator logged in");
        Ok(session)
    }

    /// Checks a bearer token and refreshes its inactivity timer.
    pub fn authorize(&self, token: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match sessions.get_mut(token) {
            None => return Err(AuthError::InvalidSession),
            Some(session) if session.is_expired(now) => true,
            Some(session) => {
                session.last_activity = now;
                false
            }
        };
        if expired {
            sessions.remove(token);
            return Err(AuthError::InvalidSession);
        }
        Ok(())
    }

    pub fn logout(&self, token: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(token).is_some()
    }
}

/// Pulls the token out of an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}
