//! PostgreSQL implementation of the coupon pool and the claim ledger.

use crate::{
    ClaimLedger, ClaimRecord, Coupon, CouponId, CouponPool, Error, InsertOutcome,
    pool::RealDbPool,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS coupons (
    id uuid PRIMARY KEY,
    code text NOT NULL,
    claimed boolean NOT NULL DEFAULT false,
    claimed_by text,
    claimed_at timestamptz,
    created_at timestamptz NOT NULL
);
CREATE INDEX IF NOT EXISTS coupons_unclaimed_idx
    ON coupons (created_at, id) WHERE claimed = false;
CREATE INDEX IF NOT EXISTS coupons_code_idx ON coupons (code);

CREATE TABLE IF NOT EXISTS claims (
    identity text PRIMARY KEY,
    source_address text NOT NULL,
    timestamp_millis bigint NOT NULL,
    coupon_id uuid NOT NULL
);
CREATE INDEX IF NOT EXISTS claims_source_address_idx ON claims (source_address);
"#;

const COUPON_COLUMNS: &str = "id, code, claimed, claimed_by, claimed_at, created_at";

impl TryFrom<Row> for Coupon {
    type Error = crate::Error;
    fn try_from(r: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.try_get("id").map_err(Error::data("coupons.id"))?,
            code: r.try_get("code").map_err(Error::data("coupons.code"))?,
            claimed: r
                .try_get("claimed")
                .map_err(Error::data("coupons.claimed"))?,
            claimed_by: r
                .try_get("claimed_by")
                .map_err(Error::data("coupons.claimed_by"))?,
            claimed_at: r
                .try_get("claimed_at")
                .map_err(Error::data("coupons.claimed_at"))?,
            created_at: r
                .try_get("created_at")
                .map_err(Error::data("coupons.created_at"))?,
        })
    }
}

impl TryFrom<Row> for ClaimRecord {
    type Error = crate::Error;
    fn try_from(r: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            identity: r
                .try_get("identity")
                .map_err(Error::data("claims.identity"))?,
            source_address: r
                .try_get("source_address")
                .map_err(Error::data("claims.source_address"))?,
            timestamp_millis: r
                .try_get("timestamp_millis")
                .map_err(Error::data("claims.timestamp_millis"))?,
            coupon_ref: r
                .try_get("coupon_id")
                .map_err(Error::data("claims.coupon_id"))?,
        })
    }
}

fn parse_coupons(rows: Vec<Row>) -> crate::Result<Vec<Coupon>> {
    rows.into_iter().map(Coupon::try_from).collect()
}

#[async_trait]
impl ClaimLedger for RealDbPool {
    async fn find_blocking_record(
        &self,
        identity: &str,
        source_address: &str,
    ) -> crate::Result<Option<ClaimRecord>> {
        let conn = self.get_conn().await?;
        conn.query_opt(
            "SELECT identity, source_address, timestamp_millis, coupon_id
            FROM claims
            WHERE identity = $1 OR source_address = $2
            ORDER BY timestamp_millis DESC
            LIMIT 1",
            &[&identity, &source_address],
        )
        .await
        .map_err(Error::exec("select claims"))?
        .map(ClaimRecord::try_from)
        .transpose()
    }

    async fn upsert(&self, record: &ClaimRecord) -> crate::Result<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO claims (identity, source_address, timestamp_millis, coupon_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (identity) DO UPDATE SET
                source_address = EXCLUDED.source_address,
                timestamp_millis = EXCLUDED.timestamp_millis,
                coupon_id = EXCLUDED.coupon_id",
            &[
                &record.identity,
                &record.source_address,
                &record.timestamp_millis,
                &record.coupon_ref,
            ],
        )
        .await
        .map_err(Error::exec("upsert claims"))?;
        Ok(())
    }
}

#[async_trait]
impl CouponPool for RealDbPool {
    async fn list_unclaimed(&self) -> crate::Result<Vec<Coupon>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                &format!(
                    "SELECT {COUPON_COLUMNS} FROM coupons
                    WHERE claimed = false
                    ORDER BY created_at, id"
                ),
                &[],
            )
            .await
            .map_err(Error::exec("select unclaimed coupons"))?;
        parse_coupons(rows)
    }

    async fn try_claim(
        &self,
        id: &CouponId,
        identity: &str,
        now: DateTime<Utc>,
    ) -> crate::Result<bool> {
        let conn = self.get_conn().await?;
        let updated = conn
            .execute(
                "UPDATE coupons
                SET claimed = true, claimed_by = $2, claimed_at = $3
                WHERE id = $1 AND claimed = false",
                &[id, &identity, &now],
            )
            .await
            .map_err(Error::exec("claim coupon"))?;
        Ok(updated == 1)
    }

    async fn insert(&self, code: &str) -> crate::Result<InsertOutcome> {
        let coupon = Coupon::new(code, Utc::now());
        let conn = self.get_conn().await?;
        let inserted = conn
            .execute(
                "INSERT INTO coupons (id, code, claimed, created_at)
                SELECT $1::uuid, $2::text, false, $3::timestamptz
                WHERE NOT EXISTS (SELECT 1 FROM coupons WHERE code = $2::text)",
                &[&coupon.id, &coupon.code, &coupon.created_at],
            )
            .await
            .map_err(Error::exec("insert coupons"))?;
        Ok(if inserted == 1 {
            InsertOutcome::Inserted(coupon)
        } else {
            InsertOutcome::Duplicate
        })
    }

    async fn list_all(&self) -> crate::Result<Vec<Coupon>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                &format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at, id"),
                &[],
            )
            .await
            .map_err(Error::exec("select coupons"))?;
        parse_coupons(rows)
    }

    async fn bulk_insert(&self, codes: &[String]) -> crate::Result<usize> {
        let now = Utc::now();
        let mut conn = self.get_conn().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(Error::exec("start transaction"))?;
        let stmt = tx
            .prepare_cached(
                "INSERT INTO coupons (id, code, claimed, created_at) VALUES ($1, $2, false, $3)",
            )
            .await
            .map_err(Error::exec("prepare insert coupons"))?;
        for code in codes {
            let coupon = Coupon::new(code.as_str(), now);
            tx.execute(&stmt, &[&coupon.id, &coupon.code, &coupon.created_at])
                .await
                .map_err(Error::exec("bulk insert coupons"))?;
        }
        tx.commit().await.map_err(Error::exec("commit"))?;
        Ok(codes.len())
    }

    async fn count(&self) -> crate::Result<u64> {
        let conn = self.get_conn().await?;
        let count: i64 = conn
            .query_one("SELECT count(*) FROM coupons", &[])
            .await
            .map_err(Error::exec("count coupons"))?
            .try_get(0)
            .map_err(Error::data("count"))?;
        Ok(count as u64)
    }
}
