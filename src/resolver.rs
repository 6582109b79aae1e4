//! Type resolver contract (§6): consumed by the encoder/decoder to cross
//! the Any boundary and to look up extensions by full name. The core only
//! ever reads from a resolver, so implementations need just be safe for
//! concurrent read access.

use prost_reflect::{DescriptorPool, ExtensionDescriptor, MessageDescriptor};

/// Resolves Any type URLs and extension full names against a registry of
/// known message/extension descriptors.
///
/// The default registry is a [`DescriptorPool`]; callers with a narrower or
/// differently-sourced registry can implement this trait directly.
pub trait TypeResolver {
    /// Resolves an Any `type_url`, matching on the trailing segment after
    /// the last `/`. Returns `None` if the type is not known to this
    /// resolver (the caller treats that as a fatal "unresolvable Any").
    fn find_message_by_url(&self, type_url: &str) -> Option<MessageDescriptor>;

    /// Resolves an extension by its fully-qualified name. Returns `None` if
    /// absent, which the caller treats as a sentinel not-found value rather
    /// than an error by itself.
    fn find_extension_by_name(&self, full_name: &str) -> Option<ExtensionDescriptor>;
}

impl TypeResolver for DescriptorPool {
    fn find_message_by_url(&self, type_url: &str) -> Option<MessageDescriptor> {
        let name = type_url.rsplit('/').next().unwrap_or(type_url);
        self.get_message_by_name(name)
    }

    fn find_extension_by_name(&self, full_name: &str) -> Option<ExtensionDescriptor> {
        let name = full_name.strip_prefix('.').unwrap_or(full_name);
        self.get_extension_by_name(name)
    }
}

impl<T: TypeResolver + ?Sized> TypeResolver for &T {
    fn find_message_by_url(&self, type_url: &str) -> Option<MessageDescriptor> {
        (**self).find_message_by_url(type_url)
    }

    fn find_extension_by_name(&self, full_name: &str) -> Option<ExtensionDescriptor> {
        (**self).find_extension_by_name(full_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_resolution_matches_trailing_segment() {
        let pool = DescriptorPool::global();
        // With an empty pool, resolution always misses; this just exercises
        // the trailing-segment split logic without needing a loaded file.
        assert!(pool
            .find_message_by_url("type.googleapis.com/does.not.Exist")
            .is_none());
    }
}
