//! Append-only wallet ledger with a running balance.

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::WalletError;
use crate::Amount;
use crate::model::{BatchId, BookingId, WalletKind};

/// What caused a ledger entry, if it was not a manual one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySource {
    Booking(BookingId),
    Batch(BatchId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletEntry {
    pub seq: usize,
    pub kind: WalletKind,
    pub amount: Amount,
    /// Balance right after this entry.
    pub balance: Amount,
    pub date: Option<NaiveDate>,
    pub description: String,
    pub source: Option<EntrySource>,
}

#[derive(Debug, Default)]
pub struct Wallet {
    entries: Vec<WalletEntry>,
    balance: Amount,
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn entries(&self) -> &[WalletEntry] {
        &self.entries
    }

    /// Check that an entry would be accepted, without recording it.
    pub fn check(&self, kind: WalletKind, amount: Amount) -> Result<(), WalletError> {
        self.next_balance(kind, amount).map(|_| ())
    }

    /// Balance after applying an entry, or why the entry is refused.
    fn next_balance(&self, kind: WalletKind, amount: Amount) -> Result<Amount, WalletError> {
        if !amount.is_positive() {
            return Err(WalletError::InvalidAmount(amount));
        }
        if kind.is_outflow() && self.balance < amount {
            warn!(
                balance = %self.balance,
                requested = %amount,
                kind = %kind,
                "wallet outflow refused"
            );
            return Err(WalletError::InsufficientFunds {
                balance: self.balance,
                requested: amount,
            });
        }

        let next = if kind.is_outflow() {
            self.balance.checked_sub(amount)
        } else {
            self.balance.checked_add(amount)
        };
        next.ok_or(WalletError::Overflow {
            balance: self.balance,
            requested: amount,
        })
    }

    /// Append an entry. Outflows never take the balance below zero.
    pub fn record(
        &mut self,
        kind: WalletKind,
        amount: Amount,
        date: Option<NaiveDate>,
        description: impl Into<String>,
        source: Option<EntrySource>,
    ) -> Result<&WalletEntry, WalletError> {
        self.balance = self.next_balance(kind, amount)?;

        let entry = WalletEntry {
            seq: self.entries.len() + 1,
            kind,
            amount,
            balance: self.balance,
            date,
            description: description.into(),
            source,
        };
        debug!(
            seq = entry.seq,
            kind = %kind,
            amount = %amount,
            balance = %entry.balance,
            "wallet entry recorded"
        );
        self.entries.push(entry);

        Ok(&self.entries[self.entries.len() - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_wallet() {
        let wallet = Wallet::new();
        assert_eq!(wallet.balance(), Amount::ZERO);
        assert!(wallet.entries().is_empty());
    }

    #[test]
    fn credits_and_debits_keep_running_balance() {
        let mut wallet = Wallet::new();
        wallet
            .record(WalletKind::Credit, Amount::from_units(500), None, "seed", None)
            .unwrap();
        wallet
            .record(
                WalletKind::Debit,
                Amount::from_units(120),
                None,
                "payout",
                Some(EntrySource::Booking(4)),
            )
            .unwrap();
        let entry = wallet
            .record(WalletKind::ProfitAddition, Amount::from_units(20), None, "profit", None)
            .unwrap();
        assert_eq!(entry.seq, 3);
        assert_eq!(entry.balance, Amount::from_units(400));

        wallet
            .record(WalletKind::ProfitWithdrawal, Amount::from_units(400), None, "all", None)
            .unwrap();
        assert_eq!(wallet.balance(), Amount::ZERO);

        let balances: Vec<_> = wallet.entries().iter().map(|e| e.balance).collect();
        assert_eq!(
            balances,
            vec![
                Amount::from_units(500),
                Amount::from_units(380),
                Amount::from_units(400),
                Amount::ZERO
            ]
        );
    }

    #[test]
    fn outflow_beyond_balance_is_refused() {
        let mut wallet = Wallet::new();
        wallet
            .record(WalletKind::Credit, Amount::from_units(50), None, "seed", None)
            .unwrap();

        let result = wallet.record(WalletKind::Debit, Amount::from_units(51), None, "too much", None);
        assert!(matches!(
            result,
            Err(WalletError::InsufficientFunds { .. })
        ));
        assert_eq!(wallet.balance(), Amount::from_units(50));
        assert_eq!(wallet.entries().len(), 1);
    }

    #[test]
    fn credit_that_would_overflow_is_refused() {
        let big = "90000000000000000".parse::<Amount>().unwrap();
        let mut wallet = Wallet::new();
        wallet
            .record(WalletKind::Credit, big, None, "first", None)
            .unwrap();

        let result = wallet.record(WalletKind::ProfitAddition, big, None, "second", None);
        assert!(matches!(
            result,
            Err(WalletError::Overflow { balance, requested }) if balance == big && requested == big
        ));
        assert_eq!(wallet.balance(), big);
        assert_eq!(wallet.entries().len(), 1);
    }

    #[test]
    fn non_positive_amount_is_refused() {
        let mut wallet = Wallet::new();
        assert!(matches!(
            wallet.record(WalletKind::Credit, Amount::ZERO, None, "zero", None),
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            wallet.check(WalletKind::ProfitAddition, Amount::from_units(-1)),
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(wallet.entries().is_empty());
    }
}
