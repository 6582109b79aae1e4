//! Protocol Buffers text format (textproto) encoding and decoding.
//!
//! This crate converts between [`prost_reflect::DynamicMessage`] values and
//! the textproto wire format: the same human-readable serialization the
//! reference C++ implementation calls `DebugString`/`TextFormat`. It is
//! built on top of [`prost`] and [`prost_reflect`] rather than generated
//! message types, since a schema-agnostic text encoder/decoder needs
//! runtime descriptor access.
//!
//! ```no_run
//! use prost_reflect::DynamicMessage;
//! use prost_text_format::{to_string, EncodeOptions};
//!
//! # fn example(message: &DynamicMessage) {
//! let (text, result) = to_string(message, &EncodeOptions::default());
//! result.expect("no non-fatal signals");
//! println!("{text}");
//! # }
//! ```

mod default_value;
mod decode;
mod encode;
mod error;
mod escape;
mod lexer;
mod options;
mod parser;
mod printer;
mod resolver;
mod unknown;
mod value;

pub use default_value::{Dialect, EnumValue, ParsedDefault, ScalarKind};
pub use error::{Accumulator, Error, ErrorKind, NonFatal};
pub use options::{DecodeOptions, EncodeOptions};
pub use printer::PrintOptions;
pub use resolver::TypeResolver;
pub use value::{Key, Message, Value, ValueKind};

use prost_reflect::DynamicMessage;

/// Marshals `message` to text-format bytes.
///
/// Returns the rendered bytes alongside a result that is `Ok(())` unless a
/// fatal error occurred (in which case the bytes are empty) or non-fatal
/// signals (required-not-set, invalid-UTF-8) were recorded while rendering
/// an otherwise-usable output.
pub fn marshal(message: &DynamicMessage, options: &EncodeOptions) -> (Vec<u8>, Result<(), Error>) {
    encode::marshal(message, options)
}

/// Convenience wrapper over [`marshal`] that lossily renders the output as
/// a `String` (text-format output is ASCII-compatible UTF-8 by
/// construction unless a string field held invalid UTF-8, in which case the
/// raw bytes are still escaped to ASCII).
pub fn to_string(message: &DynamicMessage, options: &EncodeOptions) -> (String, Result<(), Error>) {
    let (bytes, result) = marshal(message, options);
    (String::from_utf8_lossy(&bytes).into_owned(), result)
}

/// Unmarshals `bytes` into `message`, clearing it first. Decode semantics
/// are replacement, not merge.
pub fn unmarshal(message: &mut DynamicMessage, bytes: &[u8], options: &DecodeOptions) -> Result<(), Error> {
    decode::unmarshal(message, bytes, options)
}

/// Convenience wrapper over [`unmarshal`] for string input.
pub fn from_str(message: &mut DynamicMessage, text: &str, options: &DecodeOptions) -> Result<(), Error> {
    unmarshal(message, text.as_bytes(), options)
}
