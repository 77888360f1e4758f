//! Core domain types for the booking ledger.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;

use crate::Amount;

/// User identifier.
pub type UserId = u32;

/// Booking identifier.
pub type BookingId = u32;

/// Dealer identifier.
pub type DealerId = u32;

/// Dealer batch identifier.
pub type BatchId = u32;

/// Returned when a wire name does not match any variant.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a fieldless enum with snake_case wire names, plus `as_str`,
/// `Display` and `FromStr`.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

wire_enum! {
    /// Lifecycle of a booking. Variant order is the only legal progression.
    BookingStatus, "booking status" {
        /// Ordered on the platform, not yet received.
        Pending => "pending",
        /// Received by the user.
        Delivered => "delivered",
        /// Handed over to an admin, available for batching.
        GivenToAdmin => "given_to_admin",
        /// Assigned to a dealer batch.
        GivenToDealer => "given_to_dealer",
        /// Owner has been paid. Terminal.
        PaymentDone => "payment_done",
    }
}

impl BookingStatus {
    pub fn next(&self) -> Option<BookingStatus> {
        match self {
            BookingStatus::Pending => Some(BookingStatus::Delivered),
            BookingStatus::Delivered => Some(BookingStatus::GivenToAdmin),
            BookingStatus::GivenToAdmin => Some(BookingStatus::GivenToDealer),
            BookingStatus::GivenToDealer => Some(BookingStatus::PaymentDone),
            BookingStatus::PaymentDone => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

wire_enum! {
    /// Payment progress of a dealer batch, derived from its amounts.
    BatchStatus, "batch status" {
        PendingPayment => "pending_payment",
        PartiallyPaid => "partially_paid",
        CompletedPayment => "completed_payment",
    }
}

impl BatchStatus {
    pub fn from_amounts(total: Amount, paid: Amount) -> Self {
        if paid.is_zero() {
            BatchStatus::PendingPayment
        } else if paid >= total {
            BatchStatus::CompletedPayment
        } else {
            BatchStatus::PartiallyPaid
        }
    }
}

wire_enum! {
    Role, "role" {
        User => "user",
        Admin => "admin",
    }
}

wire_enum! {
    /// Kind of a wallet ledger entry.
    WalletKind, "wallet kind" {
        Credit => "credit",
        Debit => "debit",
        ProfitAddition => "profit_addition",
        ProfitWithdrawal => "profit_withdrawal",
    }
}

impl WalletKind {
    /// Whether entries of this kind reduce the balance.
    pub fn is_outflow(&self) -> bool {
        matches!(self, WalletKind::Debit | WalletKind::ProfitWithdrawal)
    }
}

/// Purchase details supplied when a booking is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDetails {
    pub date: NaiveDate,
    pub model: String,
    pub booking_price: Amount,
    pub selling_price: Option<Amount>,
    pub platform: String,
    pub card: String,
    pub notes: Option<String>,
}

/// Optional dealer contact fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealerContact {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// A command representing the possible inputs of the engine.
#[derive(Debug, Clone)]
pub enum Command {
    /// Add a user to the directory.
    RegisterUser {
        actor: UserId,
        user: UserId,
        username: String,
        role: Role,
    },
    /// Add a dealer.
    RegisterDealer {
        actor: UserId,
        dealer: DealerId,
        name: String,
        contact: DealerContact,
    },
    /// Log a new phone purchase owned by the actor.
    CreateBooking {
        actor: UserId,
        booking: BookingId,
        details: BookingDetails,
    },
    SetSellingPrice {
        actor: UserId,
        booking: BookingId,
        price: Amount,
    },
    DeleteBooking { actor: UserId, booking: BookingId },
    /// Move a booking one step forward in its lifecycle.
    Advance {
        actor: UserId,
        booking: BookingId,
        to: BookingStatus,
        date: Option<NaiveDate>,
    },
    /// Hand a booking to a dealer as part of a batch, creating the batch on first use.
    AssignToBatch {
        actor: UserId,
        batch: BatchId,
        dealer: DealerId,
        booking: BookingId,
        amount: Amount,
    },
    /// Record money received from the dealer for a batch.
    DealerPayment {
        actor: UserId,
        batch: BatchId,
        amount: Amount,
        date: Option<NaiveDate>,
    },
    /// Manual wallet ledger entry.
    WalletEntry {
        actor: UserId,
        kind: WalletKind,
        amount: Amount,
        date: Option<NaiveDate>,
        description: String,
    },
}

impl Command {
    pub fn actor(&self) -> UserId {
        match self {
            Command::RegisterUser { actor, .. }
            | Command::RegisterDealer { actor, .. }
            | Command::CreateBooking { actor, .. }
            | Command::SetSellingPrice { actor, .. }
            | Command::DeleteBooking { actor, .. }
            | Command::Advance { actor, .. }
            | Command::AssignToBatch { actor, .. }
            | Command::DealerPayment { actor, .. }
            | Command::WalletEntry { actor, .. } => *actor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_order_is_lifecycle_order() {
        let mut status = BookingStatus::Pending;
        let mut seen = vec![status];
        while let Some(next) = status.next() {
            assert!(next > status);
            seen.push(next);
            status = next;
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(status, BookingStatus::PaymentDone);
        assert!(status.is_terminal());
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(BookingStatus::GivenToAdmin.to_string(), "given_to_admin");
        assert_eq!(
            "given_to_dealer".parse::<BookingStatus>(),
            Ok(BookingStatus::GivenToDealer)
        );
        let err = "shipped".parse::<BookingStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown booking status 'shipped'");
    }

    #[test]
    fn batch_status_from_amounts() {
        let total = Amount::from_units(100);
        assert_eq!(
            BatchStatus::from_amounts(total, Amount::ZERO),
            BatchStatus::PendingPayment
        );
        assert_eq!(
            BatchStatus::from_amounts(total, Amount::from_units(40)),
            BatchStatus::PartiallyPaid
        );
        assert_eq!(
            BatchStatus::from_amounts(total, total),
            BatchStatus::CompletedPayment
        );
    }

    #[test]
    fn wallet_kind_direction() {
        assert!(!WalletKind::Credit.is_outflow());
        assert!(!WalletKind::ProfitAddition.is_outflow());
        assert!(WalletKind::Debit.is_outflow());
        assert!(WalletKind::ProfitWithdrawal.is_outflow());
        assert_eq!(
            "profit_withdrawal".parse::<WalletKind>(),
            Ok(WalletKind::ProfitWithdrawal)
        );
    }

    #[test]
    fn role_parse() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("root".parse::<Role>().is_err());
    }
}
