use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod config;
pub mod connection;
pub mod error;
pub mod local_storage;
pub mod pool;

pub use error::{Error, Result};
pub use local_storage::LocalStorage;

/// Coupon ids are UUIDv7, so ordering by id agrees with creation order.
pub type CouponId = Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub claimed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn new(code: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            code: code.into(),
            claimed: false,
            claimed_by: None,
            claimed_at: None,
            created_at,
        }
    }

    /// Sort key used for "unclaimed the longest" selection.
    pub fn age_key(&self) -> (DateTime<Utc>, CouponId) {
        (self.created_at, self.id)
    }
}

/// Most recent successful claim of one identity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    pub identity: String,
    pub source_address: String,
    pub timestamp_millis: i64,
    pub coupon_ref: CouponId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Coupon),
    Duplicate,
}

/// Per-identity ledger of the latest claim, the source of cooldown truth.
#[async_trait]
pub trait ClaimLedger: Send + Sync {
    /// Find a record keyed by `identity` or carrying `source_address`.
    /// A match on either key blocks a claim; the most recent match is returned.
    async fn find_blocking_record(
        &self,
        identity: &str,
        source_address: &str,
    ) -> crate::Result<Option<ClaimRecord>>;

    /// Replace the record of `record.identity`.
    async fn upsert(&self, record: &ClaimRecord) -> crate::Result<()>;
}

#[async_trait]
pub trait CouponPool: Send + Sync {
    /// Unclaimed coupons, oldest first.
    async fn list_unclaimed(&self) -> crate::Result<Vec<Coupon>>;

    /// Mark the coupon claimed only if it is still unclaimed.
    /// Returns `false` when another caller got there first.
    async fn try_claim(
        &self,
        id: &CouponId,
        identity: &str,
        now: DateTime<Utc>,
    ) -> crate::Result<bool>;

    /// Insert a new unclaimed coupon unless one with the same code exists.
    async fn insert(&self, code: &str) -> crate::Result<InsertOutcome>;

    async fn list_all(&self) -> crate::Result<Vec<Coupon>>;

    /// Insert unclaimed coupons without checking codes for uniqueness.
    async fn bulk_insert(&self, codes: &[String]) -> crate::Result<usize>;

    async fn count(&self) -> crate::Result<u64>;
}
