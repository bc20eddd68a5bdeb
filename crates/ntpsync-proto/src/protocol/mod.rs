//! Types and constants that precisely match the NTPv4 wire format.
//!
//! Provides `ReadBytes` and `WriteBytes` implementations which extend the byteorder crate
//! `WriteBytesExt` and `ReadBytesExt` traits with the ability to read and write types from the NTP
//! protocol respectively.
//!
//! Only the 48-byte header is modelled. Extension fields and the MAC trailer are ignored on
//! receipt and never produced.

/// NTP port number.
pub const PORT: u16 = 123;

/// Maximum stratum number. Anything at or above this is unsynchronized or reserved.
pub const MAXSTRAT: u8 = 16;

/// Poll exponent advertised in client requests (64 s).
pub const CLIENT_POLL: i8 = 6;

/// Precision exponent advertised in client requests (`0xEC`, about one microsecond).
pub const CLIENT_PRECISION: i8 = -20;

/// Scale of the 32-bit timestamp fraction (2^32).
pub const FRACTION_SCALE: f64 = 4_294_967_296.0;

/// Scale of the 16-bit short-format fraction (2^16).
pub const SHORT_FRACTION_SCALE: f64 = 65_536.0;

mod bytes;
mod io;
mod types;

pub use self::bytes::{FromBytes, ToBytes};
pub use self::io::{ReadBytes, ReadFromBytes, WriteBytes, WriteToBytes};
pub use self::types::*;
