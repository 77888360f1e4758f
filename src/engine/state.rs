use chrono::NaiveDate;

use crate::Amount;
use crate::model::{
    BatchId, BatchStatus, BookingDetails, BookingId, BookingStatus, DealerContact, DealerId,
    Role, UserId,
};

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// One phone purchase and where it is in its lifecycle.
#[derive(Debug, Clone)]
pub struct Booking {
    pub id: BookingId,
    pub owner: UserId,
    pub details: BookingDetails,
    pub status: BookingStatus,
    pub batch: Option<BatchId>,
    pub dealer_amount: Option<Amount>,
}

impl Booking {
    pub fn new(id: BookingId, owner: UserId, details: BookingDetails) -> Self {
        Self {
            id,
            owner,
            details,
            status: BookingStatus::Pending,
            batch: None,
            dealer_amount: None,
        }
    }

    pub fn booking_price(&self) -> Amount {
        self.details.booking_price
    }

    /// Selling price minus booking price, once a selling price is known.
    pub fn profit(&self) -> Option<Amount> {
        self.details
            .selling_price
            .map(|selling| selling - self.details.booking_price)
    }

    /// Dealer amount minus booking price, once the booking is batched.
    pub fn dealer_margin(&self) -> Option<Amount> {
        self.dealer_amount
            .map(|dealer| dealer - self.details.booking_price)
    }

    /// Still with its owner, i.e. not yet handed to an admin.
    pub fn is_with_owner(&self) -> bool {
        self.status < BookingStatus::GivenToAdmin
    }

    pub fn is_settled(&self) -> bool {
        self.status == BookingStatus::PaymentDone
    }
}

#[derive(Debug, Clone)]
pub struct Dealer {
    pub id: DealerId,
    pub name: String,
    pub contact: DealerContact,
}

/// A payment received against a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPayment {
    pub date: Option<NaiveDate>,
    pub amount: Amount,
}

/// A group of bookings handed to one dealer, with its own payment tracking.
#[derive(Debug, Clone)]
pub struct DealerBatch {
    pub id: BatchId,
    pub dealer: DealerId,
    pub bookings: Vec<BookingId>,
    pub total: Amount,
    pub paid: Amount,
    pub payments: Vec<BatchPayment>,
}

impl DealerBatch {
    pub fn new(id: BatchId, dealer: DealerId) -> Self {
        Self {
            id,
            dealer,
            bookings: Vec::new(),
            total: Amount::ZERO,
            paid: Amount::ZERO,
            payments: Vec::new(),
        }
    }

    pub fn remaining(&self) -> Amount {
        self.total - self.paid
    }

    pub fn status(&self) -> BatchStatus {
        BatchStatus::from_amounts(self.total, self.paid)
    }

    pub fn add_booking(&mut self, booking: BookingId, amount: Amount) {
        self.bookings.push(booking);
        self.total += amount;
    }

    pub fn record_payment(&mut self, date: Option<NaiveDate>, amount: Amount) {
        self.payments.push(BatchPayment { date, amount });
        self.paid += amount;
    }
}

/// Dealer totals across all of its batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealerSummary {
    pub id: DealerId,
    pub name: String,
    pub batches: usize,
    pub total_mobiles: usize,
    pub total_amount: Amount,
    pub paid_amount: Amount,
}

impl DealerSummary {
    pub fn remaining_amount(&self) -> Amount {
        self.total_amount - self.paid_amount
    }
}

/// Booking totals for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub bookings: usize,
    pub with_owner: usize,
    pub settled: usize,
    pub invested: Amount,
    pub settled_amount: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(price: i64, selling: Option<i64>) -> BookingDetails {
        BookingDetails {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            model: "Pixel 8".to_string(),
            booking_price: Amount::from_units(price),
            selling_price: selling.map(Amount::from_units),
            platform: "flipkart".to_string(),
            card: "hdfc".to_string(),
            notes: None,
        }
    }

    #[test]
    fn new_booking_is_pending_and_unbatched() {
        let booking = Booking::new(1, 7, details(100, None));
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.batch.is_none());
        assert!(booking.is_with_owner());
        assert!(!booking.is_settled());
    }

    #[test]
    fn booking_profit_and_margin() {
        let mut booking = Booking::new(1, 7, details(100, Some(120)));
        assert_eq!(booking.profit(), Some(Amount::from_units(20)));
        assert_eq!(booking.dealer_margin(), None);

        booking.dealer_amount = Some(Amount::from_units(95));
        assert_eq!(booking.dealer_margin(), Some(Amount::from_units(-5)));

        let unsold = Booking::new(2, 7, details(100, None));
        assert_eq!(unsold.profit(), None);
    }

    #[test]
    fn batch_tracks_totals_and_status() {
        let mut batch = DealerBatch::new(1, 3);
        batch.add_booking(10, Amount::from_units(100));
        batch.add_booking(11, Amount::from_units(50));
        assert_eq!(batch.total, Amount::from_units(150));
        assert_eq!(batch.status(), BatchStatus::PendingPayment);

        batch.record_payment(None, Amount::from_units(60));
        assert_eq!(batch.remaining(), Amount::from_units(90));
        assert_eq!(batch.status(), BatchStatus::PartiallyPaid);

        batch.record_payment(None, Amount::from_units(90));
        assert_eq!(batch.remaining(), Amount::ZERO);
        assert_eq!(batch.status(), BatchStatus::CompletedPayment);
        assert_eq!(batch.payments.len(), 2);
    }

    #[test]
    fn dealer_summary_remaining() {
        let summary = DealerSummary {
            id: 1,
            name: "Ravi".to_string(),
            batches: 1,
            total_mobiles: 2,
            total_amount: Amount::from_units(150),
            paid_amount: Amount::from_units(100),
        };
        assert_eq!(summary.remaining_amount(), Amount::from_units(50));
    }
}
