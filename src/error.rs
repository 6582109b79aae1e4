//! Errors produced while converting between reflected messages and the
//! Protobuf text format, and the non-fatal error accumulator used to carry
//! required-not-set and invalid-UTF-8 signals through an encode or decode
//! without aborting it.

use std::fmt;

/// A fatal error: the operation could not produce a usable result and any
/// partially built message should be discarded.
#[derive(Clone, PartialEq, Eq)]
pub struct Error {
    inner: Box<ErrorKind>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Error {
            inner: Box::new(kind),
        }
    }

    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax(message.into()))
    }

    pub(crate) fn binary(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Binary(message.into()))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.inner
    }

    /// Returns the non-fatal signals carried by this error, if it (or, for a
    /// [`ErrorKind::Multiple`], every error it contains) is non-fatal.
    pub(crate) fn into_non_fatal(self) -> Result<NonFatal, Error> {
        match *self.inner {
            ErrorKind::RequiredNotSet(field) => {
                let mut nf = NonFatal::default();
                nf.required_not_set.push(field);
                Ok(nf)
            }
            ErrorKind::InvalidUtf8(field) => {
                let mut nf = NonFatal::default();
                nf.invalid_utf8.push(field);
                Ok(nf)
            }
            ErrorKind::Multiple(errors) => {
                let mut nf = NonFatal::default();
                for e in errors {
                    nf.merge(e.into_non_fatal()?);
                }
                Ok(nf)
            }
            other => Err(Error::new(other)),
        }
    }
}

/// The concrete reason an [`Error`] occurred.
///
/// Most variants are fatal (they abort the operation). `RequiredNotSet` and
/// `InvalidUtf8` are non-fatal: the accumulator in this module folds them
/// into a [`NonFatal`] instead of aborting.
#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed textual input: unterminated string, bad escape, mismatched
    /// delimiters, and so on.
    Syntax(String),
    /// A key in the tree did not resolve to a field, extension, or reserved
    /// name on the target descriptor.
    UnknownField(String),
    /// A bracketed key did not resolve via the extension resolver.
    UnknownExtension(String),
    /// An Any type URL did not resolve via the type resolver.
    UnresolvableAny(String),
    /// A non-message value was found where the schema expected a message.
    ExpectedMessage,
    /// A scalar literal did not fit the field's kind (range, sign, shape).
    OutOfRange { kind: &'static str, text: String },
    /// An enum identifier was not declared on the enum type.
    UnknownEnumValue(String),
    /// A singular (non-repeated) field appeared more than once.
    DuplicateField(String),
    /// Two fields of the same oneof appeared in one message body.
    DuplicateOneofMember { oneof: String, field: String },
    /// A map entry repeated its `key` or `value` sub-field.
    DuplicateMapEntryField(&'static str),
    /// A map entry contained a sub-field other than `key`/`value`.
    UnknownMapEntryField(String),
    /// An expanded Any body also contained ordinary fields.
    AnyMixedWithFields,
    /// A required field was left unset; non-fatal.
    RequiredNotSet(String),
    /// A string-kind field held non-UTF-8 bytes; non-fatal.
    InvalidUtf8(String),
    /// A batch of sub-errors, classified non-fatal only if every member is.
    Multiple(Vec<Error>),
    /// Propagated from the binary codec while crossing the Any boundary.
    Binary(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner {
            ErrorKind::Syntax(msg) => write!(f, "{msg}"),
            ErrorKind::UnknownField(name) => write!(f, "unknown field: {name}"),
            ErrorKind::UnknownExtension(name) => write!(f, "unrecognized extension {name}"),
            ErrorKind::UnresolvableAny(url) => write!(f, "unable to resolve type {url}"),
            ErrorKind::ExpectedMessage => write!(f, "expected message value"),
            ErrorKind::OutOfRange { kind, text } => {
                write!(f, "invalid {kind}: {text}")
            }
            ErrorKind::UnknownEnumValue(name) => write!(f, "unknown enum value {name}"),
            ErrorKind::DuplicateField(name) => {
                write!(f, "non-repeated field {name:?} is repeated")
            }
            ErrorKind::DuplicateOneofMember { oneof, field } => write!(
                f,
                "field {field:?} conflicts with another field already set in oneof {oneof:?}"
            ),
            ErrorKind::DuplicateMapEntryField(which) => {
                write!(f, "duplicate map entry {which} field")
            }
            ErrorKind::UnknownMapEntryField(name) => {
                write!(f, "unknown map entry field {name}")
            }
            ErrorKind::AnyMixedWithFields => {
                write!(f, "Any message cannot have both regular and expanded fields")
            }
            ErrorKind::RequiredNotSet(field) => write!(f, "required field {field} not set"),
            ErrorKind::InvalidUtf8(field) => {
                write!(f, "field {field} contains invalid UTF-8")
            }
            ErrorKind::Multiple(errors) => {
                let mut first = true;
                for e in errors {
                    if !first {
                        f.write_str("; ")?;
                    }
                    first = false;
                    write!(f, "{e}")?;
                }
                Ok(())
            }
            ErrorKind::Binary(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error({self})")
    }
}

impl std::error::Error for Error {}

/// Accumulated non-fatal signals: required fields left unset, and string
/// fields that held invalid UTF-8. Produced by [`Accumulator::surface`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NonFatal {
    required_not_set: Vec<String>,
    invalid_utf8: Vec<String>,
}

impl NonFatal {
    pub fn is_empty(&self) -> bool {
        self.required_not_set.is_empty() && self.invalid_utf8.is_empty()
    }

    /// Field paths (dotted, root-relative) of required fields left unset.
    pub fn required_not_set(&self) -> &[String] {
        &self.required_not_set
    }

    /// Field paths of string-kind fields that held invalid UTF-8.
    pub fn invalid_utf8_fields(&self) -> &[String] {
        &self.invalid_utf8
    }

    fn merge(&mut self, other: NonFatal) {
        self.required_not_set.extend(other.required_not_set);
        self.invalid_utf8.extend(other.invalid_utf8);
    }
}

impl fmt::Display for NonFatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for field in &self.required_not_set {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "required field {field} not set")?;
        }
        for field in &self.invalid_utf8 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "field {field} contains invalid UTF-8")?;
        }
        Ok(())
    }
}

impl std::error::Error for NonFatal {}

/// Carries a single encode or decode operation's error state: at most one
/// fatal cause, plus any number of accumulated non-fatal signals.
///
/// Every point in the encoder/decoder that can observe a problem calls
/// [`Accumulator::merge`] (for a single `Result`) rather than propagating the
/// error directly with `?`, so that non-fatal conditions discovered midway
/// through a walk don't cut the walk short.
#[derive(Debug, Default)]
pub struct Accumulator {
    fatal: Option<Error>,
    non_fatal: NonFatal,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a fatal error has been recorded; callers should stop
    /// walking as soon as this holds.
    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    /// Folds `result` into the accumulator. Returns `false` once (and for
    /// every call after) a fatal error has been merged in, `true` otherwise,
    /// mirroring the "should continue" contract the walkers rely on.
    pub fn merge(&mut self, result: Result<(), Error>) -> bool {
        if self.fatal.is_some() {
            return false;
        }
        match result {
            Ok(()) => true,
            Err(err) => match err.into_non_fatal() {
                Ok(nf) => {
                    self.non_fatal.merge(nf);
                    true
                }
                Err(fatal) => {
                    self.fatal = Some(fatal);
                    false
                }
            },
        }
    }

    pub fn record_required_not_set(&mut self, field: impl Into<String>) {
        self.merge(Err(Error::new(ErrorKind::RequiredNotSet(field.into()))));
    }

    pub fn record_invalid_utf8(&mut self, field: impl Into<String>) {
        self.merge(Err(Error::new(ErrorKind::InvalidUtf8(field.into()))));
    }

    /// Consumes the accumulator, returning the fatal error if one occurred,
    /// else an error reflecting the accumulated non-fatal signals (`Ok(())`
    /// if there were none).
    pub fn surface(self) -> Result<(), Error> {
        if let Some(fatal) = self.fatal {
            return Err(fatal);
        }
        if self.non_fatal.is_empty() {
            return Ok(());
        }
        Err(Error::from_non_fatal(self.non_fatal))
    }
}

impl Error {
    fn from_non_fatal(nf: NonFatal) -> Self {
        let mut errors = Vec::new();
        for field in nf.required_not_set {
            errors.push(Error::new(ErrorKind::RequiredNotSet(field)));
        }
        for field in nf.invalid_utf8 {
            errors.push(Error::new(ErrorKind::InvalidUtf8(field)));
        }
        Error::new(ErrorKind::Multiple(errors))
    }
}
