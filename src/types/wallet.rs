//! Wallet-related types for the credit ledger
//!
//! A wallet is the per-owner balance record. Its balance is never edited
//! directly; it moves only when the store commits a unit of work that
//! completes a transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Owner identifier, supplied by the identity collaborator
pub type OwnerId = u32;

/// Wallet identifier, assigned sequentially by the store
pub type WalletId = u32;

/// Per-owner credit wallet
///
/// Exactly one wallet exists per owner. It is created lazily with a zero
/// balance the first time anything touches the owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wallet {
    /// Store-assigned wallet identifier
    pub id: WalletId,

    /// The owner of this wallet (unique across wallets)
    pub owner_id: OwnerId,

    /// Current balance
    ///
    /// Always equal to the sum of the amounts of this wallet's COMPLETED
    /// transactions. Never negative.
    pub balance: Decimal,

    /// When the wallet was first touched
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Create an empty wallet for `owner_id`
    pub fn new(id: WalletId, owner_id: OwnerId, created_at: DateTime<Utc>) -> Self {
        Wallet {
            id,
            owner_id,
            balance: Decimal::ZERO,
            created_at,
        }
    }
}

/// A wallet whose stored balance disagrees with its completed transactions
///
/// Produced by [`crate::core::WalletStore::reconcile`]. A healthy ledger
/// never yields one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceMismatch {
    pub wallet_id: WalletId,
    pub owner_id: OwnerId,
    /// Balance stored on the wallet record
    pub stored: Decimal,
    /// Sum of the wallet's COMPLETED transaction amounts
    pub computed: Decimal,
}
