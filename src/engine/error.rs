//! Error types for command processing.

use thiserror::Error;

use crate::Amount;
use crate::model::{BatchId, BookingId, BookingStatus, DealerId, UserId};

/// Top-level error returned by [`Engine::apply`](super::Engine::apply).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Access(#[from] AccessError),

    #[error("{0}")]
    Directory(#[from] DirectoryError),

    #[error("booking rejected: {0}")]
    Booking(#[from] BookingError),

    #[error("batch rejected: {0}")]
    Batch(#[from] BatchError),

    #[error("wallet rejected: {0}")]
    Wallet(#[from] WalletError),
}

/// The actor is unknown or lacks the role for the action.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("unknown actor {0}")]
    UnknownActor(UserId),
    #[error("user {actor} is not allowed to {action}")]
    Forbidden { actor: UserId, action: &'static str },
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("duplicate user id {0}")]
    DuplicateUser(UserId),
    #[error("username '{0}' is already taken")]
    DuplicateUsername(String),
    #[error("duplicate dealer id {0}")]
    DuplicateDealer(DealerId),
    #[error("name must not be empty")]
    EmptyName,
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("duplicate booking id {0}")]
    DuplicateId(BookingId),
    #[error("booking {0} not found")]
    NotFound(BookingId),
    #[error("price must be positive, got {0}")]
    InvalidPrice(Amount),
    #[error("booking {booking} cannot move from {from} to {to}")]
    InvalidTransition {
        booking: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("booking {0} is already settled")]
    AlreadySettled(BookingId),
    #[error("booking {0} can only reach given_to_dealer through a batch assignment")]
    RequiresBatch(BookingId),
    #[error("booking {0} is {1} and can no longer be removed")]
    Locked(BookingId, BookingStatus),
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch {0} not found")]
    NotFound(BatchId),
    #[error("dealer {0} not found")]
    DealerNotFound(DealerId),
    #[error("booking {0} not found")]
    BookingNotFound(BookingId),
    #[error("booking {0} is {1}, expected given_to_admin")]
    BookingNotAvailable(BookingId, BookingStatus),
    #[error("batch {batch} belongs to dealer {expected}, not {got}")]
    DealerMismatch {
        batch: BatchId,
        expected: DealerId,
        got: DealerId,
    },
    #[error("batch {0} is fully paid and closed")]
    Closed(BatchId),
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Amount),
    #[error("adding {requested} to batch {batch} would overflow its total of {total}")]
    TotalOverflow {
        batch: BatchId,
        total: Amount,
        requested: Amount,
    },
    #[error("payment of {requested} exceeds remaining {remaining} on batch {batch}")]
    Overpayment {
        batch: BatchId,
        remaining: Amount,
        requested: Amount,
    },
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Amount),
    #[error("insufficient wallet balance: available {balance}, requested {requested}")]
    InsufficientFunds { balance: Amount, requested: Amount },
    #[error("crediting {requested} would overflow the wallet balance of {balance}")]
    Overflow { balance: Amount, requested: Amount },
}
