use db::CouponPool;
use rand::Rng;

/// Excludes 0, O, 1, I and L.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

fn random_chars<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// `XXXX-XXXX`
pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    let first = random_chars(rng, 4);
    let second = random_chars(rng, 4);
    format!("{first}-{second}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedOutcome {
    /// `false` when the pool already had coupons.
    pub seeded: bool,
    pub count: u64,
}

/// Fill an empty pool with `count` random codes. Does nothing on a non-empty pool.
pub async fn seed_pool(pool: &dyn CouponPool, count: usize) -> db::Result<SeedOutcome> {
    let existing = pool.count().await?;
    if existing > 0 {
        tracing::info!("pool already holds {} coupons, skipping seed", existing);
        return Ok(SeedOutcome {
            seeded: false,
            count: existing,
        });
    }

    let codes = {
        let mut rng = rand::thread_rng();
        (0..count)
            .map(|_| generate_code(&mut rng))
            .collect::<Vec<_>>()
    };
    let inserted = pool.bulk_insert(&codes).await?;
    tracing::info!("seeded {} coupons", inserted);
    Ok(SeedOutcome {
        seeded: true,
        count: inserted as u64,
    })
}
