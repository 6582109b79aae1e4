//! External interface (§6): the option structs callers pass to the encoder
//! and decoder entry points.

use std::sync::Arc;

use prost_reflect::DescriptorPool;

use crate::resolver::TypeResolver;

/// Options controlling [`crate::encode::marshal`].
#[derive(Clone)]
pub struct EncodeOptions {
    /// If false (the default), missing required fields produce a non-fatal
    /// required-not-set error alongside the (still usable) output.
    pub allow_partial: bool,
    /// Empty for compact single-line output; non-empty (spaces/tabs only)
    /// for multi-line indented output.
    pub indent: String,
    /// Nested-message delimiter pair: `(b'{', b'}')` or `(b'<', b'>')`.
    pub delimiters: (u8, u8),
    /// Escape non-ASCII bytes in string fields when set.
    pub output_ascii: bool,
    /// Injects a stray space to deter callers from relying on exact
    /// formatting; disable for deterministic tests.
    pub inject_randomness: bool,
    /// Resolves Any type URLs and extension names. Defaults to the global
    /// descriptor pool.
    pub resolver: Arc<dyn TypeResolver + Send + Sync>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            allow_partial: false,
            indent: String::new(),
            delimiters: (b'{', b'}'),
            output_ascii: false,
            inject_randomness: true,
            resolver: Arc::new(DescriptorPool::global()),
        }
    }
}

/// Options controlling [`crate::decode::unmarshal`].
#[derive(Clone)]
pub struct DecodeOptions {
    /// If false (the default), a missing required field at the end of the
    /// walk produces a non-fatal required-not-set error.
    pub allow_partial: bool,
    /// Resolves Any type URLs and extension names. Defaults to the global
    /// descriptor pool.
    pub resolver: Arc<dyn TypeResolver + Send + Sync>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            allow_partial: false,
            resolver: Arc::new(DescriptorPool::global()),
        }
    }
}
