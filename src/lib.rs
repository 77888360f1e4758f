pub mod amount;
pub mod csv;
pub mod engine;
pub mod model;

pub use amount::Amount;
pub use engine::Engine;
pub use model::{BatchId, BookingId, BookingStatus, Command, DealerId, UserId};
