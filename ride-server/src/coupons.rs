//! Coupon collaborator.
//!
//! Turns a coupon code into a discount for one rider. Redemption is
//! single-use per rider; a booking that fails after redeeming hands the
//! coupon back with [`Coupons::release`].

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::domain::RiderId;
use crate::pricing::round_cents;

/// How a coupon discounts a fare.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CouponRule {
    /// A fixed amount off.
    Flat { amount: f64 },
    /// A percentage off, capped.
    Percent { percent: f64, max_discount: f64 },
}

impl CouponRule {
    /// Discount granted on a fare of `subtotal`.
    pub fn discount(&self, subtotal: f64) -> f64 {
        let raw = match *self {
            CouponRule::Flat { amount } => amount,
            CouponRule::Percent {
                percent,
                max_discount,
            } => (subtotal * percent / 100.0).min(max_discount),
        };
        round_cents(raw.clamp(0.0, subtotal.max(0.0)))
    }
}

/// A redeemed coupon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouponGrant {
    pub code: String,
    pub discount: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CouponError {
    #[error("unknown coupon {0}")]
    Unknown(String),

    #[error("coupon {0} already used")]
    AlreadyUsed(String),

    #[error("coupon {code} requires a fare of at least {minimum}")]
    BelowMinimum { code: String, minimum: f64 },

    #[error("coupon service unavailable: {0}")]
    Unavailable(String),
}

/// The external coupon catalog.
pub trait Coupons: Send + Sync {
    /// Redeem `code` for `rider` against a fare of `subtotal`.
    fn redeem(
        &self,
        rider: RiderId,
        code: String,
        subtotal: f64,
    ) -> BoxFuture<'_, Result<CouponGrant, CouponError>>;

    /// Undo a redemption whose booking did not go through.
    fn release(&self, rider: RiderId, code: String) -> BoxFuture<'_, Result<(), CouponError>>;
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponOffer {
    pub code: String,
    pub rule: CouponRule,
    #[serde(default)]
    pub min_fare: f64,
}

/// In-memory coupon catalog.
#[derive(Debug, Default)]
pub struct MemoryCoupons {
    offers: HashMap<String, CouponOffer>,
    redeemed: Mutex<HashSet<(RiderId, String)>>,
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

impl MemoryCoupons {
    pub fn new(offers: impl IntoIterator<Item = CouponOffer>) -> Self {
        Self {
            offers: offers
                .into_iter()
                .map(|offer| (normalize(&offer.code), offer))
                .collect(),
            redeemed: Mutex::new(HashSet::new()),
        }
    }

    fn redeem_now(
        &self,
        rider: RiderId,
        code: &str,
        subtotal: f64,
    ) -> Result<CouponGrant, CouponError> {
        let code = normalize(code);
        let offer = self
            .offers
            .get(&code)
            .ok_or_else(|| CouponError::Unknown(code.clone()))?;
        if subtotal < offer.min_fare {
            return Err(CouponError::BelowMinimum {
                code,
                minimum: offer.min_fare,
            });
        }

        let mut redeemed = self
            .redeemed
            .lock()
            .map_err(|_| CouponError::Unavailable("coupon lock poisoned".to_string()))?;
        if !redeemed.insert((rider, code.clone())) {
            return Err(CouponError::AlreadyUsed(code));
        }

        Ok(CouponGrant {
            discount: offer.rule.discount(subtotal),
            code,
        })
    }
}

impl Coupons for MemoryCoupons {
    fn redeem(
        &self,
        rider: RiderId,
        code: String,
        subtotal: f64,
    ) -> BoxFuture<'_, Result<CouponGrant, CouponError>> {
        let result = self.redeem_now(rider, &code, subtotal);
        Box::pin(async move { result })
    }

    fn release(&self, rider: RiderId, code: String) -> BoxFuture<'_, Result<(), CouponError>> {
        let result = self
            .redeemed
            .lock()
            .map(|mut redeemed| {
                redeemed.remove(&(rider, normalize(&code)));
            })
            .map_err(|_| CouponError::Unavailable("coupon lock poisoned".to_string()));
        Box::pin(async move { result })
    }
}
