//! Booking ledger engine.
//!
//! The engine applies commands and maintains users, dealers, bookings,
//! dealer batches and the wallet ledger. Each command either applies in full
//! or is rejected with no state change.
//! Also supports async stream of commands.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tokio_stream::{Stream, StreamExt};
use tracing::field::display;
use tracing::info;

use crate::Amount;
use crate::model::{
    BatchId, BatchStatus, BookingDetails, BookingId, BookingStatus, Command, DealerContact,
    DealerId, Role, UserId, WalletKind,
};

mod state;
pub use state::{
    BatchPayment, Booking, Dealer, DealerBatch, DealerSummary, User, UserSummary,
};

mod wallet;
pub use wallet::{EntrySource, Wallet, WalletEntry};

mod error;
pub use error::{
    AccessError, BatchError, BookingError, DirectoryError, EngineError, WalletError,
};

/// The booking ledger engine.
pub struct Engine {
    users: BTreeMap<UserId, User>,
    dealers: BTreeMap<DealerId, Dealer>,
    bookings: BTreeMap<BookingId, Booking>,
    batches: BTreeMap<BatchId, DealerBatch>,
    wallet: Wallet,
}

/// Public API
impl Engine {
    pub fn new() -> Self {
        Self {
            users: BTreeMap::new(),
            dealers: BTreeMap::new(),
            bookings: BTreeMap::new(),
            batches: BTreeMap::new(),
            wallet: Wallet::new(),
        }
    }

    /// Run the engine with the given command stream
    pub async fn run(&mut self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // a rejected command is logged in `apply` and must not stop the replay
            let _ = self.apply(command);
        }
    }

    /// Apply a single command on top of the current engine state
    pub fn apply(&mut self, command: Command) -> Result<(), EngineError> {
        let actor = command.actor();
        let (name, subject, amount, result) = match command {
            Command::RegisterUser {
                actor,
                user,
                username,
                role,
            } => (
                "register user",
                Some(user),
                None,
                self.apply_register_user(actor, user, username, role),
            ),
            Command::RegisterDealer {
                actor,
                dealer,
                name,
                contact,
            } => (
                "register dealer",
                Some(dealer),
                None,
                self.apply_register_dealer(actor, dealer, name, contact),
            ),
            Command::CreateBooking {
                actor,
                booking,
                details,
            } => {
                let price = details.booking_price;
                (
                    "create booking",
                    Some(booking),
                    Some(price),
                    self.apply_create_booking(actor, booking, details),
                )
            }
            Command::SetSellingPrice {
                actor,
                booking,
                price,
            } => (
                "set selling price",
                Some(booking),
                Some(price),
                self.apply_set_selling_price(actor, booking, price),
            ),
            Command::DeleteBooking { actor, booking } => (
                "delete booking",
                Some(booking),
                None,
                self.apply_delete_booking(actor, booking),
            ),
            Command::Advance {
                actor,
                booking,
                to,
                date,
            } => (
                "advance",
                Some(booking),
                None,
                self.apply_advance(actor, booking, to, date),
            ),
            Command::AssignToBatch {
                actor,
                batch,
                dealer,
                booking,
                amount,
            } => (
                "assign to batch",
                Some(batch),
                Some(amount),
                self.apply_assign(actor, batch, dealer, booking, amount),
            ),
            Command::DealerPayment {
                actor,
                batch,
                amount,
                date,
            } => (
                "dealer payment",
                Some(batch),
                Some(amount),
                self.apply_dealer_payment(actor, batch, amount, date),
            ),
            Command::WalletEntry {
                actor,
                kind,
                amount,
                date,
                description,
            } => (
                "wallet entry",
                None,
                Some(amount),
                self.apply_wallet_entry(actor, kind, amount, date, description),
            ),
        };
        Self::log_result(name, actor, subject, amount, &result);
        result
    }

    /// Return all bookings, ordered by id.
    pub fn bookings(&self) -> impl Iterator<Item = &Booking> + '_ {
        self.bookings.values()
    }

    pub fn get_booking(&self, booking: BookingId) -> Option<&Booking> {
        self.bookings.get(&booking)
    }

    /// Bookings held by an admin and available for batching.
    pub fn inventory(&self) -> impl Iterator<Item = &Booking> + '_ {
        self.bookings
            .values()
            .filter(|b| b.status == BookingStatus::GivenToAdmin)
    }

    pub fn batches(&self) -> impl Iterator<Item = &DealerBatch> + '_ {
        self.batches.values()
    }

    pub fn get_batch(&self, batch: BatchId) -> Option<&DealerBatch> {
        self.batches.get(&batch)
    }

    pub fn dealers(&self) -> impl Iterator<Item = &Dealer> + '_ {
        self.dealers.values()
    }

    /// Totals for one dealer, aggregated over its batches.
    pub fn dealer_summary(&self, dealer: DealerId) -> Option<DealerSummary> {
        let record = self.dealers.get(&dealer)?;
        let batches: Vec<_> = self
            .batches
            .values()
            .filter(|b| b.dealer == dealer)
            .collect();
        Some(DealerSummary {
            id: dealer,
            name: record.name.clone(),
            batches: batches.len(),
            total_mobiles: batches.iter().map(|b| b.bookings.len()).sum(),
            total_amount: batches.iter().map(|b| b.total).sum(),
            paid_amount: batches.iter().map(|b| b.paid).sum(),
        })
    }

    pub fn dealer_summaries(&self) -> Vec<DealerSummary> {
        self.dealers
            .keys()
            .filter_map(|id| self.dealer_summary(*id))
            .collect()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> + '_ {
        self.users.values()
    }

    pub fn get_user(&self, user: UserId) -> Option<&User> {
        self.users.get(&user)
    }

    /// Booking totals for one user.
    pub fn user_summary(&self, user: UserId) -> Option<UserSummary> {
        let record = self.users.get(&user)?;
        let owned: Vec<_> = self.bookings.values().filter(|b| b.owner == user).collect();
        let settled: Vec<_> = owned.iter().filter(|b| b.is_settled()).collect();
        Some(UserSummary {
            id: user,
            username: record.username.clone(),
            bookings: owned.len(),
            with_owner: owned.iter().filter(|b| b.is_with_owner()).count(),
            settled: settled.len(),
            invested: owned.iter().map(|b| b.booking_price()).sum(),
            settled_amount: settled.iter().map(|b| b.booking_price()).sum(),
        })
    }

    pub fn user_summaries(&self) -> Vec<UserSummary> {
        self.users
            .keys()
            .filter_map(|id| self.user_summary(*id))
            .collect()
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }
}

/// Private API
impl Engine {
    /// Small helper to log `apply` results
    fn log_result(
        command: &str,
        actor: UserId,
        subject: Option<u32>,
        amount: Option<Amount>,
        result: &Result<(), EngineError>,
    ) {
        let amount = amount.map(display);
        match result {
            Ok(()) => info!(actor, subject, amount, "{command} applied"),
            Err(e) => info!(actor, subject, amount, reason = %e, "{command} skipped"),
        }
    }

    fn user(&self, actor: UserId) -> Result<&User, AccessError> {
        self.users
            .get(&actor)
            .ok_or(AccessError::UnknownActor(actor))
    }

    fn require_admin(&self, actor: UserId, action: &'static str) -> Result<(), AccessError> {
        if self.user(actor)?.is_admin() {
            Ok(())
        } else {
            Err(AccessError::Forbidden { actor, action })
        }
    }

    /// Owners may touch their own bookings, admins may touch any.
    fn require_owner_or_admin(
        &self,
        actor: UserId,
        owner: UserId,
        action: &'static str,
    ) -> Result<(), AccessError> {
        let user = self.user(actor)?;
        if user.id == owner || user.is_admin() {
            Ok(())
        } else {
            Err(AccessError::Forbidden { actor, action })
        }
    }

    /// Apply a `Command::RegisterUser`:
    /// - An empty directory accepts anyone (bootstrap), otherwise admins only
    /// - Ensure id and username are unique and the username is not blank
    fn apply_register_user(
        &mut self,
        actor: UserId,
        user: UserId,
        username: String,
        role: Role,
    ) -> Result<(), EngineError> {
        if !self.users.is_empty() {
            self.require_admin(actor, "register users")?;
        }

        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(DirectoryError::EmptyName.into());
        }
        if self.users.contains_key(&user) {
            return Err(DirectoryError::DuplicateUser(user).into());
        }
        if self.users.values().any(|u| u.username == username) {
            return Err(DirectoryError::DuplicateUsername(username).into());
        }

        self.users.insert(
            user,
            User {
                id: user,
                username,
                role,
            },
        );
        Ok(())
    }

    fn apply_register_dealer(
        &mut self,
        actor: UserId,
        dealer: DealerId,
        name: String,
        contact: DealerContact,
    ) -> Result<(), EngineError> {
        self.require_admin(actor, "register dealers")?;

        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DirectoryError::EmptyName.into());
        }
        if self.dealers.contains_key(&dealer) {
            return Err(DirectoryError::DuplicateDealer(dealer).into());
        }

        self.dealers.insert(
            dealer,
            Dealer {
                id: dealer,
                name,
                contact,
            },
        );
        Ok(())
    }

    /// Apply a `Command::CreateBooking`:
    /// - Any registered user may log a booking, which they then own
    /// - Ensure the id is unique and prices are positive
    fn apply_create_booking(
        &mut self,
        actor: UserId,
        booking: BookingId,
        details: BookingDetails,
    ) -> Result<(), EngineError> {
        self.user(actor)?;

        if self.bookings.contains_key(&booking) {
            return Err(BookingError::DuplicateId(booking).into());
        }
        let prices = std::iter::once(details.booking_price).chain(details.selling_price);
        for price in prices {
            if !price.is_positive() {
                return Err(BookingError::InvalidPrice(price).into());
            }
        }

        self.bookings
            .insert(booking, Booking::new(booking, actor, details));
        Ok(())
    }

    fn apply_set_selling_price(
        &mut self,
        actor: UserId,
        booking: BookingId,
        price: Amount,
    ) -> Result<(), EngineError> {
        self.user(actor)?;

        let record = self
            .bookings
            .get(&booking)
            .ok_or(BookingError::NotFound(booking))?;
        self.require_owner_or_admin(actor, record.owner, "edit this booking")?;

        if record.is_settled() {
            return Err(BookingError::AlreadySettled(booking).into());
        }
        if !price.is_positive() {
            return Err(BookingError::InvalidPrice(price).into());
        }

        if let Some(record) = self.bookings.get_mut(&booking) {
            record.details.selling_price = Some(price);
        }
        Ok(())
    }

    /// Apply a `Command::DeleteBooking`:
    /// - Only the owner or an admin
    /// - Only before the booking joins a batch
    fn apply_delete_booking(
        &mut self,
        actor: UserId,
        booking: BookingId,
    ) -> Result<(), EngineError> {
        self.user(actor)?;

        let record = self
            .bookings
            .get(&booking)
            .ok_or(BookingError::NotFound(booking))?;
        self.require_owner_or_admin(actor, record.owner, "delete this booking")?;

        if record.status >= BookingStatus::GivenToDealer {
            return Err(BookingError::Locked(booking, record.status).into());
        }

        self.bookings.remove(&booking);
        Ok(())
    }

    /// Apply a `Command::Advance`:
    /// - The actor must be allowed to drive the target status before the
    ///   booking's current status is looked at
    /// - Only a single forward step is allowed; `payment_done` is terminal
    /// - `delivered` and `given_to_admin` may be set by the owner or an admin
    /// - `given_to_dealer` is reserved for batch assignment
    /// - `payment_done` is admin only and debits the booking price from the
    ///   wallet; a refused debit leaves the booking unchanged
    fn apply_advance(
        &mut self,
        actor: UserId,
        booking: BookingId,
        to: BookingStatus,
        date: Option<NaiveDate>,
    ) -> Result<(), EngineError> {
        self.user(actor)?;

        let record = self
            .bookings
            .get(&booking)
            .ok_or(BookingError::NotFound(booking))?;
        let (owner, from, price) = (record.owner, record.status, record.booking_price());

        match to {
            BookingStatus::Pending | BookingStatus::Delivered | BookingStatus::GivenToAdmin => {
                self.require_owner_or_admin(actor, owner, "advance this booking")?;
            }
            BookingStatus::GivenToDealer => {}
            BookingStatus::PaymentDone => {
                self.require_admin(actor, "settle bookings")?;
            }
        }

        if from.is_terminal() {
            return Err(BookingError::AlreadySettled(booking).into());
        }
        if from.next() != Some(to) {
            return Err(BookingError::InvalidTransition { booking, from, to }.into());
        }

        match to {
            BookingStatus::Pending | BookingStatus::Delivered | BookingStatus::GivenToAdmin => {}
            BookingStatus::GivenToDealer => {
                return Err(BookingError::RequiresBatch(booking).into());
            }
            BookingStatus::PaymentDone => {
                let payee = self
                    .users
                    .get(&owner)
                    .map(|u| u.username.clone())
                    .unwrap_or_else(|| format!("user {owner}"));
                self.wallet.record(
                    WalletKind::Debit,
                    price,
                    date,
                    format!("payment to {payee} for booking {booking}"),
                    Some(EntrySource::Booking(booking)),
                )?;
            }
        }

        if let Some(record) = self.bookings.get_mut(&booking) {
            record.status = to;
        }
        Ok(())
    }

    /// Apply a `Command::AssignToBatch`:
    /// - Admin only, positive amount, known dealer
    /// - The booking must be held by an admin (`given_to_admin`)
    /// - An existing batch must belong to the same dealer and still be open
    /// - Create the batch on first use, then add the booking to its total
    fn apply_assign(
        &mut self,
        actor: UserId,
        batch: BatchId,
        dealer: DealerId,
        booking: BookingId,
        amount: Amount,
    ) -> Result<(), EngineError> {
        self.require_admin(actor, "assign bookings to dealers")?;

        if !amount.is_positive() {
            return Err(BatchError::InvalidAmount(amount).into());
        }
        if !self.dealers.contains_key(&dealer) {
            return Err(BatchError::DealerNotFound(dealer).into());
        }

        let record = self
            .bookings
            .get_mut(&booking)
            .ok_or(BatchError::BookingNotFound(booking))?;
        if record.status != BookingStatus::GivenToAdmin {
            return Err(BatchError::BookingNotAvailable(booking, record.status).into());
        }

        if let Some(existing) = self.batches.get(&batch) {
            if existing.dealer != dealer {
                return Err(BatchError::DealerMismatch {
                    batch,
                    expected: existing.dealer,
                    got: dealer,
                }
                .into());
            }
            if existing.status() == BatchStatus::CompletedPayment {
                return Err(BatchError::Closed(batch).into());
            }
            if existing.total.checked_add(amount).is_none() {
                return Err(BatchError::TotalOverflow {
                    batch,
                    total: existing.total,
                    requested: amount,
                }
                .into());
            }
        }

        record.status = BookingStatus::GivenToDealer;
        record.batch = Some(batch);
        record.dealer_amount = Some(amount);

        self.batches
            .entry(batch)
            .or_insert_with(|| DealerBatch::new(batch, dealer))
            .add_booking(booking, amount);
        Ok(())
    }

    /// Apply a `Command::DealerPayment`:
    /// - Admin only
    /// - The amount must be positive and not exceed what is still owed
    /// - Credit the wallet, then record the payment on the batch
    fn apply_dealer_payment(
        &mut self,
        actor: UserId,
        batch: BatchId,
        amount: Amount,
        date: Option<NaiveDate>,
    ) -> Result<(), EngineError> {
        self.require_admin(actor, "record dealer payments")?;

        let record = self
            .batches
            .get_mut(&batch)
            .ok_or(BatchError::NotFound(batch))?;
        if !amount.is_positive() {
            return Err(BatchError::InvalidAmount(amount).into());
        }
        if amount > record.remaining() {
            return Err(BatchError::Overpayment {
                batch,
                remaining: record.remaining(),
                requested: amount,
            }
            .into());
        }

        let payer = self
            .dealers
            .get(&record.dealer)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| format!("dealer {}", record.dealer));
        self.wallet.record(
            WalletKind::Credit,
            amount,
            date,
            format!("payment from {payer} for batch {batch}"),
            Some(EntrySource::Batch(batch)),
        )?;
        record.record_payment(date, amount);
        Ok(())
    }

    fn apply_wallet_entry(
        &mut self,
        actor: UserId,
        kind: WalletKind,
        amount: Amount,
        date: Option<NaiveDate>,
        description: String,
    ) -> Result<(), EngineError> {
        self.require_admin(actor, "edit the wallet")?;
        self.wallet.record(kind, amount, date, description, None)?;
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
