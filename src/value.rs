//! The tagged-value tree that the [`crate::lexer`]/[`crate::parser`] produce
//! and the [`crate::printer`] consumes: a schema-free representation of
//! every construct the text format grammar can express.

/// A single node of the parsed (or to-be-printed) text format tree.
///
/// `raw` holds the exact source bytes the parser consumed to produce this
/// value, when the value came from parsing; it is `None` for values built up
/// by the encoder. It exists so that legacy proto1 conventions (a large
/// positive hex literal meant to be read back as a negative number) can be
/// recovered on request, without the parser needing to guess up front.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub raw: Option<String>,
    pub kind: ValueKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float32(f32),
    Float64(f64),
    /// Not validated as UTF-8: serves as both text and raw bytes.
    String(Vec<u8>),
    /// A bare identifier, e.g. an enum value name or a boolean-looking word
    /// that wasn't resolved to `Bool` at parse time.
    Name(String),
    List(Vec<Value>),
    Message(Message),
}

/// An ordered list of field entries, exactly as they appeared in (or will
/// appear in) the source text. Order matters: repeated fields, duplicate map
/// keys, and oneof conflicts are all detected by walking this list in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message(pub Vec<(Key, Value)>);

#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// A plain field name.
    Name(String),
    /// A bracketed key: an extension full name or an Any type URL.
    String(String),
    /// An unknown field, addressed by number for round-tripping.
    Uint(u64),
}

impl Message {
    pub fn new() -> Self {
        Message(Vec::new())
    }

    pub fn push(&mut self, key: Key, value: Value) {
        self.0.push((key, value));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Key, Value)> {
        self.0.iter()
    }
}

impl Value {
    pub fn parsed(raw: impl Into<String>, kind: ValueKind) -> Self {
        Value {
            raw: Some(raw.into()),
            kind,
        }
    }

    pub fn synthetic(kind: ValueKind) -> Self {
        Value { raw: None, kind }
    }

    pub fn message(message: Message) -> Self {
        Value::synthetic(ValueKind::Message(message))
    }

    /// Best-effort conversion to `bool`. A `Name` of `true`/`True`/`t`/`1` or
    /// `false`/`False`/`f`/`0` converts; nothing else does.
    pub fn as_bool(&self) -> Option<bool> {
        match &self.kind {
            ValueKind::Bool(b) => Some(*b),
            ValueKind::Name(name) => match name.as_str() {
                "true" | "True" | "t" | "1" => Some(true),
                "false" | "False" | "f" | "0" => Some(false),
                _ => None,
            },
            ValueKind::Int(0) | ValueKind::Uint(0) => Some(false),
            ValueKind::Int(1) | ValueKind::Uint(1) => Some(true),
            _ => None,
        }
    }

    /// Best-effort conversion to a signed integer.
    pub fn as_int(&self) -> Option<i64> {
        match &self.kind {
            ValueKind::Int(v) => Some(*v),
            ValueKind::Uint(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Best-effort conversion to an unsigned integer. A negative `Int` never
    /// converts; callers that accept proto1's legacy large-hex-as-negative
    /// convention should inspect `raw` directly instead.
    pub fn as_uint(&self) -> Option<u64> {
        match &self.kind {
            ValueKind::Uint(v) => Some(*v),
            ValueKind::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match &self.kind {
            ValueKind::Float64(v) => Some(*v),
            ValueKind::Float32(v) => Some(*v as f64),
            ValueKind::Int(v) => Some(*v as f64),
            ValueKind::Uint(v) => Some(*v as f64),
            ValueKind::Name(name) => match name.as_str() {
                "nan" | "NaN" => Some(f64::NAN),
                "inf" | "Inf" | "infinity" | "Infinity" => Some(f64::INFINITY),
                "-inf" | "-Inf" | "-infinity" | "-Infinity" => Some(f64::NEG_INFINITY),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|v| v as f32)
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::Name(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.kind {
            ValueKind::String(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match &self.kind {
            ValueKind::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match &self.kind {
            ValueKind::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_message(self) -> Option<Message> {
        match self.kind {
            ValueKind::Message(m) => Some(m),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_converts_to_bool() {
        let v = Value::synthetic(ValueKind::Name("true".into()));
        assert_eq!(v.as_bool(), Some(true));
        let v = Value::synthetic(ValueKind::Name("maybe".into()));
        assert_eq!(v.as_bool(), None);
    }

    #[test]
    fn hex_uint_converts_to_int_when_in_range() {
        let v = Value::synthetic(ValueKind::Uint(0xff));
        assert_eq!(v.as_int(), Some(255));
    }
}
