//! Wallet collaborator.
//!
//! Completion, tips and cancellation fees become signed postings against
//! rider and captain accounts. Each posting carries an idempotency key so a
//! retried call never double-posts.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use futures::future::BoxFuture;
use serde::Serialize;

use crate::domain::{CaptainId, RideId, RiderId};
use crate::pricing::round_cents;

/// An account the wallet ledger knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum Account {
    Rider(RiderId),
    Captain(CaptainId),
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Account::Rider(id) => write!(f, "rider:{id}"),
            Account::Captain(id) => write!(f, "captain:{id}"),
        }
    }
}

/// One posting. Positive amounts credit the account, negative debit it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Posting {
    pub key: String,
    pub account: Account,
    pub amount: f64,
    pub ride: RideId,
    pub memo: &'static str,
}

impl Posting {
    pub fn credit(account: Account, amount: f64, ride: RideId, memo: &'static str) -> Self {
        Self {
            key: format!("{ride}:{memo}:{account}"),
            account,
            amount: round_cents(amount),
            ride,
            memo,
        }
    }

    pub fn debit(account: Account, amount: f64, ride: RideId, memo: &'static str) -> Self {
        Self {
            amount: -round_cents(amount),
            ..Self::credit(account, amount, ride, memo)
        }
    }

    /// Distinguish repeated postings of the same kind, e.g. several tips.
    pub fn with_key_suffix(mut self, suffix: impl fmt::Display) -> Self {
        self.key = format!("{}:{suffix}", self.key);
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WalletError {
    #[error("wallet unavailable: {0}")]
    Unavailable(String),

    #[error("posting rejected: {0}")]
    Rejected(String),
}

impl WalletError {
    pub fn is_transient(&self) -> bool {
        matches!(self, WalletError::Unavailable(_))
    }
}

/// The external wallet ledger.
pub trait Wallet: Send + Sync {
    fn post(&self, posting: Posting) -> BoxFuture<'_, Result<(), WalletError>>;
}

/// In-memory wallet that records postings and running balances.
#[derive(Debug, Default)]
pub struct MemoryWallet {
    inner: Mutex<WalletBook>,
}

#[derive(Debug, Default)]
struct WalletBook {
    postings: Vec<Posting>,
    balances: HashMap<Account, f64>,
}

impl MemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, account: Account) -> f64 {
        self.inner
            .lock()
            .map(|book| book.balances.get(&account).copied().unwrap_or(0.0))
            .unwrap_or(0.0)
    }

    pub fn postings(&self) -> Vec<Posting> {
        self.inner
            .lock()
            .map(|book| book.postings.clone())
            .unwrap_or_default()
    }
}

impl Wallet for MemoryWallet {
    fn post(&self, posting: Posting) -> BoxFuture<'_, Result<(), WalletError>> {
        let result = match self.inner.lock() {
            Ok(mut book) => {
                if !posting.amount.is_finite() {
                    Err(WalletError::Rejected(format!(
                        "non-finite amount for {}",
                        posting.key
                    )))
                } else {
                    if !book.postings.iter().any(|p| p.key == posting.key) {
                        let balance = book.balances.entry(posting.account).or_insert(0.0);
                        *balance = round_cents(*balance + posting.amount);
                        book.postings.push(posting);
                    }
                    Ok(())
                }
            }
            Err(_) => Err(WalletError::Unavailable("wallet lock poisoned".to_string())),
        };
        Box::pin(async move { result })
    }
}
