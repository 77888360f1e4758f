use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::amount::AmountParseError;
use crate::engine::{
    Booking, Dealer, DealerBatch, DealerSummary, EntrySource, User, UserSummary, WalletEntry,
};
use crate::model::{
    BookingDetails, BookingStatus, Command, DealerContact, Role, UnknownVariant, WalletKind,
};
use crate::{Amount, BatchId, BookingId, DealerId, UserId};

/// Errors that can occur when reading command csv files
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("cannot open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized command type '{tx_type}'")]
    UnrecognizedType { line: usize, tx_type: String },

    #[error("line {line}: {tx_type} missing {field}")]
    MissingField {
        line: usize,
        tx_type: String,
        field: &'static str,
    },

    #[error("line {line}: {source}")]
    InvalidAmount {
        line: usize,
        source: AmountParseError,
    },

    #[error("line {line}: invalid date '{value}': {source}")]
    InvalidDate {
        line: usize,
        value: String,
        source: chrono::ParseError,
    },

    #[error("line {line}: {source}")]
    InvalidValue { line: usize, source: UnknownVariant },
}

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One input row. Columns a command does not use are left empty.
#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    actor: UserId,
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    booking: Option<BookingId>,
    #[serde(default)]
    dealer: Option<DealerId>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    card: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

/// Field access bound to the row's line and command type, for error reporting.
struct Fields<'a> {
    line: usize,
    tx_type: &'a str,
}

impl Fields<'_> {
    fn required<T>(&self, field: &'static str, value: Option<T>) -> Result<T, CsvError> {
        value.ok_or_else(|| CsvError::MissingField {
            line: self.line,
            tx_type: self.tx_type.to_string(),
            field,
        })
    }

    fn amount(&self, value: Option<String>) -> Result<Option<Amount>, CsvError> {
        value
            .map(|v| {
                v.parse::<Amount>().map_err(|source| CsvError::InvalidAmount {
                    line: self.line,
                    source,
                })
            })
            .transpose()
    }

    fn date(&self, value: Option<String>) -> Result<Option<NaiveDate>, CsvError> {
        value
            .map(|v| {
                NaiveDate::parse_from_str(&v, DATE_FORMAT).map_err(|source| {
                    CsvError::InvalidDate {
                        line: self.line,
                        value: v.clone(),
                        source,
                    }
                })
            })
            .transpose()
    }

    fn variant<T>(&self, field: &'static str, value: Option<String>) -> Result<T, CsvError>
    where
        T: FromStr<Err = UnknownVariant>,
    {
        self.required(field, value)?
            .parse()
            .map_err(|source| CsvError::InvalidValue {
                line: self.line,
                source,
            })
    }
}

impl InputRow {
    fn into_command(self, line: usize) -> Result<Command, CsvError> {
        let tx_type = self.r#type.clone();
        let f = Fields {
            line,
            tx_type: &tx_type,
        };
        let actor = self.actor;

        let command = match tx_type.as_str() {
            "user" => Command::RegisterUser {
                actor,
                user: f.required("id", self.id)?,
                username: f.required("name", self.name)?,
                role: f.variant::<Role>("kind", self.kind)?,
            },
            "dealer" => Command::RegisterDealer {
                actor,
                dealer: f.required("id", self.id)?,
                name: f.required("name", self.name)?,
                contact: DealerContact {
                    phone: self.phone,
                    email: self.email,
                    address: self.address,
                },
            },
            "booking" => Command::CreateBooking {
                actor,
                booking: f.required("id", self.id)?,
                details: BookingDetails {
                    date: f.required("date", f.date(self.date)?)?,
                    model: f.required("model", self.model)?,
                    booking_price: f.required("amount", f.amount(self.amount)?)?,
                    selling_price: f.amount(self.price)?,
                    platform: f.required("platform", self.platform)?,
                    card: f.required("card", self.card)?,
                    notes: self.note,
                },
            },
            "sell" => Command::SetSellingPrice {
                actor,
                booking: f.required("id", self.id)?,
                price: f.required("price", f.amount(self.price)?)?,
            },
            "delete" => Command::DeleteBooking {
                actor,
                booking: f.required("id", self.id)?,
            },
            "advance" => Command::Advance {
                actor,
                booking: f.required("id", self.id)?,
                to: f.variant::<BookingStatus>("kind", self.kind)?,
                date: f.date(self.date)?,
            },
            "assign" => Command::AssignToBatch {
                actor,
                batch: f.required("id", self.id)?,
                dealer: f.required("dealer", self.dealer)?,
                booking: f.required("booking", self.booking)?,
                amount: f.required("amount", f.amount(self.amount)?)?,
            },
            "payment" => Command::DealerPayment {
                actor,
                batch: f.required("id", self.id)?,
                amount: f.required("amount", f.amount(self.amount)?)?,
                date: f.date(self.date)?,
            },
            "wallet" => Command::WalletEntry {
                actor,
                kind: f.variant::<WalletKind>("kind", self.kind)?,
                amount: f.required("amount", f.amount(self.amount)?)?,
                date: f.date(self.date)?,
                description: self.note.unwrap_or_default(),
            },
            other => {
                return Err(CsvError::UnrecognizedType {
                    line,
                    tx_type: other.to_string(),
                });
            }
        };
        Ok(command)
    }
}

/// Read commands from a csv file
pub fn read_commands(
    path: &Path,
) -> Result<impl Iterator<Item = Result<Command, CsvError>> + use<>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            row.into_command(line)
        }))
}

#[derive(Debug, Serialize)]
struct BookingRow<'a> {
    id: BookingId,
    owner: UserId,
    date: String,
    model: &'a str,
    platform: &'a str,
    card: &'a str,
    status: &'static str,
    booking_price: String,
    selling_price: Option<String>,
    profit: Option<String>,
    batch: Option<BatchId>,
    dealer_amount: Option<String>,
    notes: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct BatchRow {
    id: BatchId,
    dealer: DealerId,
    mobiles: usize,
    bookings: String,
    total: String,
    paid: String,
    remaining: String,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct DealerRow<'a> {
    id: DealerId,
    name: &'a str,
    phone: Option<&'a str>,
    email: Option<&'a str>,
    address: Option<&'a str>,
    batches: usize,
    total_mobiles: usize,
    total_amount: String,
    paid_amount: String,
    remaining_amount: String,
}

#[derive(Debug, Serialize)]
struct WalletRow<'a> {
    seq: usize,
    date: Option<String>,
    kind: &'static str,
    amount: String,
    balance: String,
    source: Option<String>,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct UserRow<'a> {
    id: UserId,
    username: &'a str,
    role: &'static str,
    bookings: usize,
    with_owner: usize,
    settled: usize,
    invested: String,
    settled_amount: String,
}

/// Write bookings in csv format
pub fn write_bookings<'a>(
    out: impl io::Write,
    bookings: impl IntoIterator<Item = &'a Booking>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);

    for booking in bookings {
        let details = &booking.details;
        writer.serialize(BookingRow {
            id: booking.id,
            owner: booking.owner,
            date: details.date.format(DATE_FORMAT).to_string(),
            model: &details.model,
            platform: &details.platform,
            card: &details.card,
            status: booking.status.as_str(),
            booking_price: details.booking_price.to_string(),
            selling_price: details.selling_price.map(|p| p.to_string()),
            profit: booking.profit().map(|p| p.to_string()),
            batch: booking.batch,
            dealer_amount: booking.dealer_amount.map(|a| a.to_string()),
            notes: details.notes.as_deref(),
        })?;
    }

    writer.flush()?;
    Ok(())
}

/// Write dealer batches in csv format
pub fn write_batches<'a>(
    out: impl io::Write,
    batches: impl IntoIterator<Item = &'a DealerBatch>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);

    for batch in batches {
        let bookings: Vec<String> = batch.bookings.iter().map(|b| b.to_string()).collect();
        writer.serialize(BatchRow {
            id: batch.id,
            dealer: batch.dealer,
            mobiles: batch.bookings.len(),
            bookings: bookings.join(" "),
            total: batch.total.to_string(),
            paid: batch.paid.to_string(),
            remaining: batch.remaining().to_string(),
            status: batch.status().as_str(),
        })?;
    }

    writer.flush()?;
    Ok(())
}

/// Write dealers with their aggregated totals in csv format
pub fn write_dealers<'a>(
    out: impl io::Write,
    dealers: impl IntoIterator<Item = (&'a Dealer, DealerSummary)>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);

    for (dealer, summary) in dealers {
        writer.serialize(DealerRow {
            id: dealer.id,
            name: &dealer.name,
            phone: dealer.contact.phone.as_deref(),
            email: dealer.contact.email.as_deref(),
            address: dealer.contact.address.as_deref(),
            batches: summary.batches,
            total_mobiles: summary.total_mobiles,
            total_amount: summary.total_amount.to_string(),
            paid_amount: summary.paid_amount.to_string(),
            remaining_amount: summary.remaining_amount().to_string(),
        })?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the wallet ledger in csv format
pub fn write_wallet(out: impl io::Write, entries: &[WalletEntry]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);

    for entry in entries {
        writer.serialize(WalletRow {
            seq: entry.seq,
            date: entry.date.map(|d| d.format(DATE_FORMAT).to_string()),
            kind: entry.kind.as_str(),
            amount: entry.amount.to_string(),
            balance: entry.balance.to_string(),
            source: entry.source.map(|source| match source {
                EntrySource::Booking(id) => format!("booking:{id}"),
                EntrySource::Batch(id) => format!("batch:{id}"),
            }),
            description: &entry.description,
        })?;
    }

    writer.flush()?;
    Ok(())
}

/// Write users with their booking totals in csv format
pub fn write_users<'a>(
    out: impl io::Write,
    users: impl IntoIterator<Item = (&'a User, UserSummary)>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);

    for (user, summary) in users {
        writer.serialize(UserRow {
            id: user.id,
            username: &user.username,
            role: user.role.as_str(),
            bookings: summary.bookings,
            with_owner: summary.with_owner,
            settled: summary.settled,
            invested: summary.invested.to_string(),
            settled_amount: summary.settled_amount.to_string(),
        })?;
    }

    writer.flush()?;
    Ok(())
}
