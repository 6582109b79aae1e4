//! Text-Format Decoder (§4.5): parses bytes into the textual value tree via
//! [`crate::parser`], then walks the tree against a message descriptor,
//! populating a reflected message.

use std::collections::HashSet;

use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MapKey, Value as ReflectValue};

use crate::error::{Accumulator, Error, ErrorKind};
use crate::options::DecodeOptions;
use crate::value::{Key, Message, Value, ValueKind};

/// Unmarshals `bytes` into `message`. Per §4.5 step 1, `message` is cleared
/// first: decode semantics are replacement, not merge.
pub fn unmarshal(message: &mut DynamicMessage, bytes: &[u8], options: &DecodeOptions) -> Result<(), Error> {
    message.clear();

    let tree = crate::parser::parse(bytes)?;

    let mut acc = Accumulator::new();
    walk_message(message, &tree, options, &mut acc, "");

    if !options.allow_partial {
        check_required(message, "", &mut acc);
    }
    acc.surface()
}

fn walk_message(
    message: &mut DynamicMessage,
    tree: &Message,
    options: &DecodeOptions,
    acc: &mut Accumulator,
    path: &str,
) {
    if message.descriptor().full_name() == "google.protobuf.Any" {
        match classify_any(tree) {
            AnyShape::Expanded(url, nested_tree) => {
                log::trace!("expanding Any at {path:?} via type url {url}");
                expand_any(message, url, nested_tree, options, acc, path);
                return;
            }
            AnyShape::Mixed => {
                acc.merge(Err(Error::new(ErrorKind::AnyMixedWithFields)));
                return;
            }
            AnyShape::Unexpanded => {}
        }
    }

    let mut seen_singular: HashSet<String> = HashSet::new();
    let mut seen_oneof: HashSet<String> = HashSet::new();

    for (key, value) in tree.iter() {
        match key {
            Key::Name(name) => {
                let descriptor = message.descriptor();
                let field = descriptor
                    .get_field_by_name(name)
                    .or_else(|| descriptor.get_field_by_name(&name.to_lowercase()));
                let Some(field) = field else {
                    if descriptor.reserved_names().any(|r| r == name) {
                        continue;
                    }
                    acc.merge(Err(Error::new(ErrorKind::UnknownField(name.clone()))));
                    if acc.is_fatal() {
                        return;
                    }
                    continue;
                };
                if !assign_field(
                    message,
                    &field,
                    value,
                    options,
                    acc,
                    path,
                    &mut seen_singular,
                    &mut seen_oneof,
                ) {
                    return;
                }
            }
            Key::String(name) => {
                let ext = options
                    .resolver
                    .find_extension_by_name(name)
                    .or_else(|| options.resolver.find_extension_by_name(&format!("{name}.message_set_extension")));
                let Some(ext) = ext else {
                    acc.merge(Err(Error::new(ErrorKind::UnknownExtension(name.clone()))));
                    return;
                };
                let field_path = join_path(path, ext.full_name());
                let assigned = assign_value(&ext, value, options, acc, &field_path);
                if let Some(v) = assigned {
                    message.set_extension(&ext, v);
                }
                if acc.is_fatal() {
                    return;
                }
            }
            Key::Uint(_number) => {
                // Unknown fields round-trip opaquely through the binary
                // layer; the text decoder does not attempt to re-encode a
                // raw value back onto the message's unknown field set.
            }
        }
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

/// Returns true to continue walking the enclosing message, false if a
/// fatal error was recorded and the walk should stop.
#[allow(clippy::too_many_arguments)]
fn assign_field(
    message: &mut DynamicMessage,
    field: &FieldDescriptor,
    value: &Value,
    options: &DecodeOptions,
    acc: &mut Accumulator,
    path: &str,
    seen_singular: &mut HashSet<String>,
    seen_oneof: &mut HashSet<String>,
) -> bool {
    let field_path = join_path(path, field.name());

    if let Some(oneof) = field.containing_oneof() {
        if !seen_oneof.insert(oneof.name().to_string()) {
            acc.merge(Err(Error::new(ErrorKind::DuplicateOneofMember {
                oneof: oneof.name().to_string(),
                field: field.name().to_string(),
            })));
            return !acc.is_fatal();
        }
    }

    if field.is_map() {
        return assign_map_entry(message, field, value, options, acc, &field_path);
    }

    if field.is_list() {
        assign_repeated(message, field, value, options, acc, &field_path);
        return !acc.is_fatal();
    }

    if field.containing_oneof().is_none() && !seen_singular.insert(field.name().to_string()) {
        acc.merge(Err(Error::new(ErrorKind::DuplicateField(field.name().to_string()))));
        return !acc.is_fatal();
    }

    match assign_value(field, value, options, acc, &field_path) {
        Some(v) => {
            message.set_field(field, v);
            !acc.is_fatal()
        }
        None => !acc.is_fatal(),
    }
}

fn assign_repeated(
    message: &mut DynamicMessage,
    field: &FieldDescriptor,
    value: &Value,
    options: &DecodeOptions,
    acc: &mut Accumulator,
    path: &str,
) {
    let mut items = match message.get_field(field).into_owned() {
        ReflectValue::List(items) => items,
        _ => Vec::new(),
    };
    if let Some(elements) = value.as_list() {
        for element in elements {
            if let Some(v) = assign_value(field, element, options, acc, path) {
                items.push(v);
            }
        }
    } else if let Some(v) = assign_value(field, value, options, acc, path) {
        items.push(v);
    }
    message.set_field(field, ReflectValue::List(items));
}

fn assign_map_entry(
    message: &mut DynamicMessage,
    field: &FieldDescriptor,
    value: &Value,
    options: &DecodeOptions,
    acc: &mut Accumulator,
    path: &str,
) -> bool {
    let Some(entry) = value.as_message() else {
        acc.merge(Err(Error::new(ErrorKind::ExpectedMessage)));
        return !acc.is_fatal();
    };
    let Kind::Message(entry_desc) = field.kind() else {
        return true;
    };
    let key_field = entry_desc.fields().find(|f| f.name() == "key").unwrap();
    let value_field = entry_desc.fields().find(|f| f.name() == "value").unwrap();

    let mut key_value = None;
    let mut val_value = None;
    for (k, v) in entry.iter() {
        let Key::Name(name) = k else {
            acc.merge(Err(Error::new(ErrorKind::UnknownMapEntryField(format!("{k:?}")))));
            continue;
        };
        match name.as_str() {
            "key" => {
                if key_value.is_some() {
                    acc.merge(Err(Error::new(ErrorKind::DuplicateMapEntryField("key"))));
                    return !acc.is_fatal();
                }
                key_value = assign_value(&key_field, v, options, acc, path);
            }
            "value" => {
                if val_value.is_some() {
                    acc.merge(Err(Error::new(ErrorKind::DuplicateMapEntryField("value"))));
                    return !acc.is_fatal();
                }
                val_value = assign_value(&value_field, v, options, acc, path);
            }
            other => {
                acc.merge(Err(Error::new(ErrorKind::UnknownMapEntryField(other.to_string()))));
                return !acc.is_fatal();
            }
        }
    }
    if acc.is_fatal() {
        return false;
    }

    let key = match key_value.unwrap_or_else(|| zero_value(&key_field)) {
        ReflectValue::Bool(b) => MapKey::Bool(b),
        ReflectValue::I32(v) => MapKey::I32(v),
        ReflectValue::I64(v) => MapKey::I64(v),
        ReflectValue::U32(v) => MapKey::U32(v),
        ReflectValue::U64(v) => MapKey::U64(v),
        ReflectValue::String(s) => MapKey::String(s),
        _ => return true,
    };
    let val = val_value.unwrap_or_else(|| zero_value(&value_field));

    let mut map = match message.get_field(field).into_owned() {
        ReflectValue::Map(map) => map,
        _ => Default::default(),
    };
    // Later entry with a duplicate key silently overwrites the earlier one.
    map.insert(key, val);
    message.set_field(field, ReflectValue::Map(map));
    true
}

fn zero_value(field: &FieldDescriptor) -> ReflectValue {
    match field.kind() {
        Kind::Double | Kind::Float => ReflectValue::F64(0.0),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => ReflectValue::I32(0),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => ReflectValue::I64(0),
        Kind::Uint32 | Kind::Fixed32 => ReflectValue::U32(0),
        Kind::Uint64 | Kind::Fixed64 => ReflectValue::U64(0),
        Kind::Bool => ReflectValue::Bool(false),
        Kind::String => ReflectValue::String(String::new()),
        Kind::Bytes => ReflectValue::Bytes(Default::default()),
        Kind::Enum(_) => ReflectValue::EnumNumber(0),
        Kind::Message(m) => ReflectValue::Message(DynamicMessage::new(m)),
    }
}

/// Converts a single textual value into a reflected value for a scalar,
/// enum, or (recursively) message-kind field. Returns `None` only when a
/// non-fatal error was recorded in place of a usable value.
fn assign_value(
    field: &FieldDescriptor,
    value: &Value,
    options: &DecodeOptions,
    acc: &mut Accumulator,
    path: &str,
) -> Option<ReflectValue> {
    match field.kind() {
        Kind::Message(_) => {
            let Some(nested_tree) = value.as_message() else {
                acc.merge(Err(Error::new(ErrorKind::ExpectedMessage)));
                return None;
            };
            let Kind::Message(desc) = field.kind() else {
                unreachable!()
            };
            let mut nested = DynamicMessage::new(desc);
            walk_message(&mut nested, nested_tree, options, acc, path);
            Some(ReflectValue::Message(nested))
        }
        Kind::Enum(e) => {
            if let Some(name) = value.as_name() {
                if let Some(v) = e.get_value_by_name(name) {
                    return Some(ReflectValue::EnumNumber(v.number()));
                }
                acc.merge(Err(Error::new(ErrorKind::UnknownEnumValue(name.to_string()))));
                return None;
            }
            if let Some(n) = value.as_int() {
                return Some(ReflectValue::EnumNumber(n as i32));
            }
            acc.merge(Err(Error::new(ErrorKind::OutOfRange {
                kind: "enum",
                text: format!("{value:?}"),
            })));
            None
        }
        Kind::Bool => match value.as_bool() {
            Some(b) => Some(ReflectValue::Bool(b)),
            None => {
                acc.merge(Err(out_of_range("bool", value)));
                None
            }
        },
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => match value.as_int().and_then(|v| i32::try_from(v).ok()) {
            Some(v) => Some(ReflectValue::I32(v)),
            None => {
                acc.merge(Err(out_of_range("int32", value)));
                None
            }
        },
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => match value.as_int() {
            Some(v) => Some(ReflectValue::I64(v)),
            None => {
                acc.merge(Err(out_of_range("int64", value)));
                None
            }
        },
        Kind::Uint32 | Kind::Fixed32 => match value.as_uint().and_then(|v| u32::try_from(v).ok()) {
            Some(v) => Some(ReflectValue::U32(v)),
            None => {
                acc.merge(Err(out_of_range("uint32", value)));
                None
            }
        },
        Kind::Uint64 | Kind::Fixed64 => match value.as_uint() {
            Some(v) => Some(ReflectValue::U64(v)),
            None => {
                acc.merge(Err(out_of_range("uint64", value)));
                None
            }
        },
        Kind::Float => match value.as_f32() {
            Some(v) => Some(ReflectValue::F32(v)),
            None => {
                acc.merge(Err(out_of_range("float", value)));
                None
            }
        },
        Kind::Double => match value.as_f64() {
            Some(v) => Some(ReflectValue::F64(v)),
            None => {
                acc.merge(Err(out_of_range("double", value)));
                None
            }
        },
        Kind::Bytes => match value.as_bytes() {
            Some(b) => Some(ReflectValue::Bytes(b.to_vec().into())),
            None => {
                acc.merge(Err(out_of_range("bytes", value)));
                None
            }
        },
        Kind::String => match value.as_bytes() {
            Some(b) => match std::str::from_utf8(b) {
                Ok(s) => Some(ReflectValue::String(s.to_string())),
                Err(_) => {
                    // `prost_reflect::Value::String` wraps a real `String`,
                    // which upholds the UTF-8 invariant unconditionally;
                    // there is no byte-preserving value this crate could
                    // hand back through a string-kind field without either
                    // constructing an unsound `String` (`from_utf8_unchecked`
                    // on non-UTF-8 input) or smuggling the bytes through
                    // `Value::Bytes` against the field's declared kind. Both
                    // are worse than the lossy conversion below, so the raw
                    // bytes are not recoverable from the reflected message
                    // after this point — only the non-fatal signal survives.
                    // See DESIGN.md's "Open Questions resolved" for the
                    // reasoning.
                    acc.record_invalid_utf8(path.to_string());
                    Some(ReflectValue::String(String::from_utf8_lossy(b).into_owned()))
                }
            },
            None => {
                acc.merge(Err(out_of_range("string", value)));
                None
            }
        },
    }
}

fn out_of_range(kind: &'static str, value: &Value) -> Error {
    Error::new(ErrorKind::OutOfRange {
        kind,
        text: value.raw.clone().unwrap_or_else(|| format!("{value:?}")),
    })
}

/// How a tree shapes up against the expanded-Any grammar (§4.5 step 3): a
/// single string-keyed message field means expansion, that field alongside
/// any other field is the fatal "mixed" case, and anything else means the
/// tree addresses `type_url`/`value` directly and should fall through to the
/// ordinary field walk.
enum AnyShape<'a> {
    Expanded(&'a str, &'a Message),
    Mixed,
    Unexpanded,
}

fn classify_any(tree: &Message) -> AnyShape<'_> {
    let mut expanded = None;
    let mut other = false;
    for (key, value) in tree.iter() {
        match (key, value.as_message()) {
            (Key::String(url), Some(nested)) if expanded.is_none() => {
                expanded = Some((url.as_str(), nested));
            }
            _ => other = true,
        }
    }
    match expanded {
        Some((url, nested)) if !other => AnyShape::Expanded(url, nested),
        Some(_) => AnyShape::Mixed,
        None => AnyShape::Unexpanded,
    }
}

fn expand_any(
    message: &mut DynamicMessage,
    type_url: &str,
    nested_tree: &Message,
    options: &DecodeOptions,
    acc: &mut Accumulator,
    path: &str,
) {
    let Some(target) = options.resolver.find_message_by_url(type_url) else {
        acc.merge(Err(Error::new(ErrorKind::UnresolvableAny(type_url.to_string()))));
        return;
    };
    let mut nested = DynamicMessage::new(target);
    walk_message(&mut nested, nested_tree, options, acc, path);
    if !options.allow_partial {
        check_required(&nested, path, acc);
    }

    let value_bytes = nested.encode_to_vec();
    message.set_field_by_number(1, ReflectValue::String(type_url.to_string()));
    message.set_field_by_number(2, ReflectValue::Bytes(value_bytes.into()));
}

fn check_required(message: &DynamicMessage, path: &str, acc: &mut Accumulator) {
    for field in message.descriptor().fields() {
        let field_path = join_path(path, field.name());
        if field.cardinality() == prost_reflect::Cardinality::Required && !message.has_field(&field) {
            acc.merge(Err(Error::new(ErrorKind::RequiredNotSet(field_path.clone()))));
        }
        if !message.has_field(&field) {
            continue;
        }
        match message.get_field(&field).into_owned() {
            ReflectValue::Message(nested) => check_required(&nested, &field_path, acc),
            ReflectValue::List(items) => {
                for item in items {
                    if let ReflectValue::Message(nested) = item {
                        check_required(&nested, &field_path, acc);
                    }
                }
            }
            ReflectValue::Map(map) => {
                for value in map.values() {
                    if let ReflectValue::Message(nested) = value {
                        check_required(nested, &field_path, acc);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_any_requires_single_string_keyed_message_field() {
        let mut tree = Message::new();
        tree.push(
            Key::String("type.googleapis.com/pkg.Foo".into()),
            Value::message(Message::new()),
        );
        assert!(matches!(classify_any(&tree), AnyShape::Expanded(..)));

        let mut two_fields = Message::new();
        two_fields.push(Key::Name("a".into()), Value::synthetic(ValueKind::Uint(1)));
        two_fields.push(
            Key::String("type.googleapis.com/pkg.Foo".into()),
            Value::message(Message::new()),
        );
        assert!(matches!(classify_any(&two_fields), AnyShape::Mixed));

        let empty = Message::new();
        assert!(matches!(classify_any(&empty), AnyShape::Unexpanded));
    }
}
