use crate::{ClaimLedger, ClaimRecord, Coupon, CouponId, CouponPool, Error, InsertOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kv::{Bucket, Store};
use std::path::Path;

/// Embedded store backed by sled.
///
/// Claims on a coupon run inside a sled transaction on the `Coupons` bucket,
/// so concurrent claimers sharing this handle see a single winner.
#[derive(Clone)]
pub struct LocalStorage {
    db: kv::Store,
}

fn coupon_key(id: &CouponId) -> kv::Raw {
    id.as_bytes().as_slice().into()
}

fn claim_key(identity: &str) -> kv::Raw {
    identity.into()
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        tracing::info!("opening sled storage: {}", path.as_ref().display());
        let db = Store::new(kv::Config::new(path)).map_err(Error::local("open"))?;
        Ok(Self { db })
    }

    fn coupon_bucket(&self) -> crate::Result<Bucket<'_, kv::Raw, kv::Json<Coupon>>> {
        self.db
            .bucket(Some("Coupons"))
            .map_err(Error::local("open Coupons bucket"))
    }

    fn claim_bucket(&self) -> crate::Result<Bucket<'_, kv::Raw, kv::Json<ClaimRecord>>> {
        self.db
            .bucket(Some("Claims"))
            .map_err(Error::local("open Claims bucket"))
    }

    fn scan_coupons(&self) -> crate::Result<Vec<Coupon>> {
        let mut coupons = Vec::new();
        for item in self.coupon_bucket()?.iter() {
            let item = item.map_err(Error::local("iterate Coupons"))?;
            let coupon: kv::Json<Coupon> = item.value().map_err(Error::local("decode Coupons"))?;
            coupons.push(coupon.0);
        }
        coupons.sort_by_key(Coupon::age_key);
        Ok(coupons)
    }

    /// Write buffered changes to disk.
    pub fn flush(&self) -> crate::Result<()> {
        self.coupon_bucket()?
            .flush()
            .map_err(Error::local("flush Coupons"))?;
        self.claim_bucket()?
            .flush()
            .map_err(Error::local("flush Claims"))?;
        Ok(())
    }
}

#[async_trait]
impl ClaimLedger for LocalStorage {
    async fn find_blocking_record(
        &self,
        identity: &str,
        source_address: &str,
    ) -> crate::Result<Option<ClaimRecord>> {
        let bucket = self.claim_bucket()?;
        let mut found = bucket
            .get(&claim_key(identity))
            .map_err(Error::local("get Claims"))?
            .map(|r| r.0);

        for item in bucket.iter() {
            let item = item.map_err(Error::local("iterate Claims"))?;
            let record: kv::Json<ClaimRecord> =
                item.value().map_err(Error::local("decode Claims"))?;
            let record = record.0;
            if record.source_address == source_address
                && found
                    .as_ref()
                    .is_none_or(|f| record.timestamp_millis > f.timestamp_millis)
            {
                found = Some(record);
            }
        }

        Ok(found)
    }

    async fn upsert(&self, record: &ClaimRecord) -> crate::Result<()> {
        tracing::debug!("upsert claim, identity={}", record.identity);
        self.claim_bucket()?
            .set(&claim_key(&record.identity), &kv::Json(record.clone()))
            .map_err(Error::local("set Claims"))?;
        Ok(())
    }
}

#[async_trait]
impl CouponPool for LocalStorage {
    async fn list_unclaimed(&self) -> crate::Result<Vec<Coupon>> {
        let mut coupons = self.scan_coupons()?;
        coupons.retain(|c| !c.claimed);
        Ok(coupons)
    }

    async fn try_claim(
        &self,
        id: &CouponId,
        identity: &str,
        now: DateTime<Utc>,
    ) -> crate::Result<bool> {
        let key = coupon_key(id);
        self.coupon_bucket()?
            .transaction::<_, kv::Error, _>(|tx| {
                let Some(kv::Json(mut coupon)) = tx.get(&key)? else {
                    return Ok(false);
                };
                if coupon.claimed {
                    return Ok(false);
                }
                coupon.claimed = true;
                coupon.claimed_by = Some(identity.to_owned());
                coupon.claimed_at = Some(now);
                tx.set(&key, &kv::Json(coupon))?;
                Ok(true)
            })
            .map_err(Error::local("claim coupon"))
    }

    async fn insert(&self, code: &str) -> crate::Result<InsertOutcome> {
        if self.scan_coupons()?.iter().any(|c| c.code == code) {
            return Ok(InsertOutcome::Duplicate);
        }
        let coupon = Coupon::new(code, Utc::now());
        self.coupon_bucket()?
            .set(&coupon_key(&coupon.id), &kv::Json(coupon.clone()))
            .map_err(Error::local("set Coupons"))?;
        Ok(InsertOutcome::Inserted(coupon))
    }

    async fn list_all(&self) -> crate::Result<Vec<Coupon>> {
        self.scan_coupons()
    }

    async fn bulk_insert(&self, codes: &[String]) -> crate::Result<usize> {
        let now = Utc::now();
        let coupons = codes
            .iter()
            .map(|code| Coupon::new(code.as_str(), now))
            .collect::<Vec<_>>();
        self.coupon_bucket()?
            .transaction::<_, kv::Error, _>(|tx| {
                for coupon in &coupons {
                    tx.set(&coupon_key(&coupon.id), &kv::Json(coupon.clone()))?;
                }
                Ok(coupons.len())
            })
            .map_err(Error::local("bulk insert Coupons"))
    }

    async fn count(&self) -> crate::Result<u64> {
        Ok(self.coupon_bucket()?.len() as u64)
    }
}
