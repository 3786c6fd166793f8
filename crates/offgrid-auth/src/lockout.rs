//! Failed-login tracking and temporary lockout.
//!
//! Failures accumulate per normalized identity inside a sliding window.
//! Reaching the threshold locks the identity for the configured period.
//! A successful login clears all state for the identity.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::LockoutConfig;

#[derive(Debug, Clone)]
struct LoginAttempt {
    attempts: u32,
    first_attempt: DateTime<Utc>,
    locked_until: Option<DateTime<Utc>>,
}

/// Result of [`LockoutManager::record_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// The identity is now locked.
    pub locked: bool,
    /// Failures left before the identity locks.
    pub remaining: u32,
}

/// Snapshot of an identity's lockout state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockoutInfo {
    pub attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct LockoutManager {
    attempts: RwLock<HashMap<String, LoginAttempt>>,
    max_attempts: u32,
    lockout_period: TimeDelta,
    window: TimeDelta,
    cleanup_interval: Duration,
}

impl Default for LockoutManager {
    fn default() -> Self {
        Self::new(&LockoutConfig::default())
    }
}

/// Upper bound for every configured period: ten years.
const MAX_PERIOD_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn secs_or(value: u64, default: u64) -> u64 {
    if value == 0 { default } else { value.min(MAX_PERIOD_SECS) }
}

fn period(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

fn normalize(identity: &str) -> String {
    identity.trim().to_lowercase()
}

impl LockoutManager {
    /// Zero values in `config` fall back to the defaults
    /// (5 attempts, 15 minute lock, 5 minute window and sweep).
    /// Periods longer than ten years are clamped.
    pub fn new(config: &LockoutConfig) -> Self {
        let defaults = LockoutConfig::default();
        let max_attempts = if config.max_attempts == 0 {
            defaults.max_attempts
        } else {
            config.max_attempts
        };
        let lockout_secs = secs_or(config.lockout_period_secs, defaults.lockout_period_secs);
        let window_secs = secs_or(config.window_secs, defaults.window_secs);
        let cleanup_secs = secs_or(config.cleanup_interval_secs, defaults.cleanup_interval_secs);

        Self {
            attempts: RwLock::new(HashMap::new()),
            max_attempts,
            lockout_period: period(lockout_secs),
            window: period(window_secs),
            cleanup_interval: Duration::from_secs(cleanup_secs),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_locked(&self, identity: &str) -> bool {
        self.is_locked_at(identity, Utc::now())
    }

    pub fn is_locked_at(&self, identity: &str, now: DateTime<Utc>) -> bool {
        self.attempts
            .read()
            .get(&normalize(identity))
            .and_then(|a| a.locked_until)
            .is_some_and(|until| now < until)
    }

    pub fn record_failure(&self, identity: &str) -> FailureOutcome {
        self.record_failure_at(identity, Utc::now())
    }

    /// Record a failed attempt observed at `now`.
    ///
    /// The increment and threshold check run under one write lock, so
    /// concurrent failures for the same identity cannot both slip under
    /// the threshold.
    pub fn record_failure_at(&self, identity: &str, now: DateTime<Utc>) -> FailureOutcome {
        let key = normalize(identity);
        let mut table = self.attempts.write();

        let Some(attempt) = table.get_mut(&key) else {
            table.insert(
                key,
                LoginAttempt {
                    attempts: 1,
                    first_attempt: now,
                    locked_until: None,
                },
            );
            return self.fresh_window();
        };

        if now - attempt.first_attempt > self.window {
            // Stale window, including an expired lock: start over.
            attempt.attempts = 1;
            attempt.first_attempt = now;
            attempt.locked_until = None;
            return self.fresh_window();
        }

        attempt.attempts += 1;
        if attempt.attempts >= self.max_attempts {
            attempt.locked_until = Some(
                now.checked_add_signed(self.lockout_period).unwrap_or(DateTime::<Utc>::MAX_UTC),
            );
            tracing::warn!(
                identity = %key,
                attempts = attempt.attempts,
                "identity locked after repeated login failures"
            );
            return FailureOutcome {
                locked: true,
                remaining: 0,
            };
        }

        FailureOutcome {
            locked: false,
            remaining: self.max_attempts - attempt.attempts,
        }
    }

    fn fresh_window(&self) -> FailureOutcome {
        if self.max_attempts <= 1 {
            return FailureOutcome {
                locked: false,
                remaining: 0,
            };
        }
        FailureOutcome {
            locked: false,
            remaining: self.max_attempts - 1,
        }
    }

    /// Forget all failures for `identity`, lifting any active lock.
    pub fn record_success(&self, identity: &str) {
        self.attempts.write().remove(&normalize(identity));
    }

    pub fn lockout_info(&self, identity: &str) -> LockoutInfo {
        self.attempts
            .read()
            .get(&normalize(identity))
            .map(|a| LockoutInfo {
                attempts: a.attempts,
                locked_until: a.locked_until,
            })
            .unwrap_or_default()
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    /// Drop expired locks and unlocked records whose window has passed.
    /// Returns the number of records removed.
    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut table = self.attempts.write();
        let before = table.len();
        table.retain(|_, a| match a.locked_until {
            Some(until) => now <= until,
            None => now - a.first_attempt <= self.window,
        });
        before - table.len()
    }

    /// Spawn the periodic sweep.
    ///
    /// The task stops when `cancel` fires or when the last strong
    /// reference to the manager is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        let period = self.cleanup_interval;

        tokio::spawn(async move {
            tracing::debug!(interval_secs = period.as_secs(), "lockout sweeper started");

            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("lockout sweeper cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Some(manager) = manager.upgrade() else {
                            break;
                        };
                        let removed = manager.purge_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "purged stale lockout records");
                        }
                    }
                }
            }
        })
    }
}
