//! Pull-style JSON reading and streaming JSON writing.
//!
//! [`JsonReader`] hands out one [`Token`] at a time, supports selecting names
//! out of a prebuilt [`Options`] set, and can fork itself for look-ahead.
//! [`JsonWriter`] places separators itself, defers names so that null members
//! can be dropped, and can flatten a nested object into its parent.

mod error;
mod reader;
mod token;
mod writer;

pub use error::StreamError;
pub use reader::{JsonReader, ReaderOptions, MAX_NESTING};
pub use token::{Options, Token};
pub use writer::{FlattenToken, JsonWriter, WriterOptions};
