//! Small shared utilities.

mod checksum;
mod timestamps;

pub use checksum::sha256_hex;
pub use timestamps::{iso_timestamp, now_utc, Timestamp};
