//! Decides whether a caller may claim a coupon and which one they get.
//!
//! A claim is blocked while a ledger record matching either the caller's
//! identity or their source address is younger than the cooldown window.
//! Otherwise the oldest unclaimed coupon is taken with a compare-and-set on
//! the store; losing the race moves on to the next candidate.

use chrono::{DateTime, Utc};
use db::{ClaimLedger, ClaimRecord, CouponPool, pool::DbPool};
use std::time::Duration;
use thiserror::Error as ThisError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Granted { code: String },
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Cooldown { seconds_remaining: u64 },
    Exhausted,
    /// Store failure. Details are logged, never returned.
    InternalError,
}

#[derive(Debug, ThisError)]
enum ArbiterError {
    #[error(transparent)]
    Db(#[from] db::Error),
    #[error("every candidate was taken concurrently, gave up after {rounds} rounds")]
    Contention { rounds: usize },
}

#[derive(Clone)]
pub struct ClaimArbiter {
    db: DbPool,
    cooldown: Duration,
    rounds: usize,
}

impl ClaimArbiter {
    pub fn new(db: DbPool, cooldown: Duration, rounds: usize) -> Self {
        Self {
            db,
            cooldown,
            rounds: rounds.max(1),
        }
    }

    pub async fn claim(&self, identity: &str, source_address: &str) -> ClaimOutcome {
        self.claim_at(identity, source_address, Utc::now()).await
    }

    pub async fn claim_at(
        &self,
        identity: &str,
        source_address: &str,
        now: DateTime<Utc>,
    ) -> ClaimOutcome {
        match self.arbitrate(identity, source_address, now).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!("claim failed, identity={}: {}", identity, error);
                ClaimOutcome::Rejected(Rejection::InternalError)
            }
        }
    }

    /// Seconds left before `record` stops blocking, `None` once the window has passed.
    /// Both instants are truncated to whole seconds.
    pub fn seconds_remaining(&self, record: &ClaimRecord, now: DateTime<Utc>) -> Option<u64> {
        let last = record.timestamp_millis.div_euclid(1000);
        let elapsed = now.timestamp().saturating_sub(last).max(0) as u64;
        let window = self.cooldown.as_secs();
        (elapsed < window).then(|| window - elapsed)
    }

    async fn arbitrate(
        &self,
        identity: &str,
        source_address: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, ArbiterError> {
        if let Some(record) = self
            .db
            .claims()
            .find_blocking_record(identity, source_address)
            .await?
            && let Some(seconds_remaining) = self.seconds_remaining(&record, now)
        {
            tracing::debug!(
                "cooldown active, identity={} address={} remaining={}s",
                identity,
                source_address,
                seconds_remaining
            );
            return Ok(ClaimOutcome::Rejected(Rejection::Cooldown {
                seconds_remaining,
            }));
        }

        let coupons = self.db.coupons();
        for round in 1..=self.rounds {
            let candidates = coupons.list_unclaimed().await?;
            if candidates.is_empty() {
                tracing::debug!("no coupon left, identity={}", identity);
                return Ok(ClaimOutcome::Rejected(Rejection::Exhausted));
            }

            for coupon in candidates {
                if !coupons.try_claim(&coupon.id, identity, now).await? {
                    tracing::debug!("coupon {} already taken, round {}", coupon.id, round);
                    continue;
                }

                self.db
                    .claims()
                    .upsert(&ClaimRecord {
                        identity: identity.to_owned(),
                        source_address: source_address.to_owned(),
                        timestamp_millis: now.timestamp_millis(),
                        coupon_ref: coupon.id,
                    })
                    .await?;

                tracing::info!("granted coupon {} to {}", coupon.id, identity);
                return Ok(ClaimOutcome::Granted { code: coupon.code });
            }
        }

        Err(ArbiterError::Contention {
            rounds: self.rounds,
        })
    }
}
