//! Text-Format Encoder (§4.4): walks a reflected message in descriptor
//! order and produces the textual value tree, which [`crate::printer`] then
//! renders to bytes.

use std::cmp::Ordering;

use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MapKey, Value as ReflectValue};

use crate::default_value::render_float;
use crate::error::{Accumulator, Error, ErrorKind};
use crate::options::EncodeOptions;
use crate::printer::{self, PrintOptions};
use crate::resolver::TypeResolver;
use crate::value::{Key, Message, Value, ValueKind};

/// Marshals a reflected message to text-format bytes.
///
/// Mirrors [`crate::decode::unmarshal`]'s non-fatal handling: the returned
/// bytes are produced even when the accumulated error carries only
/// non-fatal signals (required-not-set, invalid UTF-8 encountered while
/// rendering a string field).
pub fn marshal(message: &DynamicMessage, options: &EncodeOptions) -> (Vec<u8>, Result<(), Error>) {
    let mut acc = Accumulator::new();
    let tree = build_tree(message, options, &mut acc, "");

    if !options.allow_partial {
        check_required(message, "", &mut acc);
    }

    let print_options = PrintOptions {
        indent: options.indent.clone(),
        delimiters: options.delimiters,
        output_ascii: options.output_ascii,
        inject_randomness: options.inject_randomness,
    };
    let bytes = match printer::print(&tree, &print_options) {
        Ok(bytes) => bytes,
        Err(e) => {
            acc.merge(Err(e));
            Vec::new()
        }
    };
    (bytes, acc.surface())
}

fn build_tree(
    message: &DynamicMessage,
    options: &EncodeOptions,
    acc: &mut Accumulator,
    path: &str,
) -> Message {
    if let Some(expanded) = try_expand_any(message, options, acc, path) {
        return expanded;
    }

    let mut tree = Message::new();
    let descriptor = message.descriptor();

    for field in descriptor.fields() {
        if !message.has_field(&field) {
            continue;
        }
        let value = message.get_field(&field);
        let field_path = join_path(path, field.name());
        emit_field(&field, &value, options, acc, &field_path, &mut tree);
    }

    emit_extensions(message, options, acc, path, &mut tree);
    emit_unknown(message, &mut tree);

    tree
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn emit_field(
    field: &FieldDescriptor,
    value: &ReflectValue,
    options: &EncodeOptions,
    acc: &mut Accumulator,
    path: &str,
    tree: &mut Message,
) {
    let key_name = field_key_name(field);

    if field.is_map() {
        emit_map(field, value, options, acc, path, &key_name, tree);
        return;
    }
    if field.is_list() {
        if let ReflectValue::List(items) = value {
            for item in items {
                let v = render_scalar_or_message(field, item, options, acc, path);
                tree.push(Key::Name(key_name.clone()), v);
            }
        }
        return;
    }
    let v = render_scalar_or_message(field, value, options, acc, path);
    tree.push(Key::Name(key_name), v);
}

/// Groups use the (capitalized) message type name as their wire key rather
/// than the lowercased field name the descriptor stores.
fn field_key_name(field: &FieldDescriptor) -> String {
    if field.is_group() {
        if let Kind::Message(m) = field.kind() {
            return m.name().to_string();
        }
    }
    field.name().to_string()
}

fn render_scalar_or_message(
    field: &FieldDescriptor,
    value: &ReflectValue,
    options: &EncodeOptions,
    acc: &mut Accumulator,
    path: &str,
) -> Value {
    match value {
        ReflectValue::Message(nested) => Value::message(build_tree(nested, options, acc, path)),
        other => render_scalar(field, other, acc, path),
    }
}

fn render_scalar(field: &FieldDescriptor, value: &ReflectValue, _acc: &mut Accumulator, path: &str) -> Value {
    match value {
        ReflectValue::Bool(b) => Value::synthetic(ValueKind::Bool(*b)),
        ReflectValue::I32(v) => Value::synthetic(ValueKind::Int(*v as i64)),
        ReflectValue::I64(v) => Value::synthetic(ValueKind::Int(*v)),
        ReflectValue::U32(v) => Value::synthetic(ValueKind::Uint(*v as u64)),
        ReflectValue::U64(v) => Value::synthetic(ValueKind::Uint(*v)),
        ReflectValue::F32(v) => Value::synthetic(ValueKind::Name(render_float(*v as f64))),
        ReflectValue::F64(v) => Value::synthetic(ValueKind::Name(render_float(*v))),
        ReflectValue::String(s) => Value::synthetic(ValueKind::String(s.as_bytes().to_vec())),
        ReflectValue::Bytes(b) => Value::synthetic(ValueKind::String(b.to_vec())),
        ReflectValue::EnumNumber(n) => {
            if let Kind::Enum(e) = field.kind() {
                if let Some(v) = e.get_value(*n) {
                    return Value::synthetic(ValueKind::Name(v.name().to_string()));
                }
            }
            Value::synthetic(ValueKind::Int(*n as i64))
        }
        _ => {
            let _ = path;
            Value::synthetic(ValueKind::Name("?".to_string()))
        }
    }
}

fn emit_map(
    field: &FieldDescriptor,
    value: &ReflectValue,
    options: &EncodeOptions,
    acc: &mut Accumulator,
    path: &str,
    key_name: &str,
    tree: &mut Message,
) {
    let ReflectValue::Map(map) = value else { return };
    let Kind::Message(entry_desc) = field.kind() else { return };
    let value_field = entry_desc
        .fields()
        .find(|f| f.name() == "value")
        .expect("map entry descriptor always has a value field");

    let mut entries: Vec<(&MapKey, &ReflectValue)> = map.iter().collect();
    entries.sort_by(|(a, _), (b, _)| compare_map_keys(a, b));

    for (map_key, map_value) in entries {
        let mut entry = Message::new();
        entry.push(Key::Name("key".to_string()), map_key_value(map_key));
        let v = render_scalar_or_message(&value_field, map_value, options, acc, path);
        entry.push(Key::Name("value".to_string()), v);
        tree.push(Key::Name(key_name.to_string()), Value::message(entry));
    }
}

fn map_key_value(key: &MapKey) -> Value {
    match key {
        MapKey::Bool(b) => Value::synthetic(ValueKind::Bool(*b)),
        MapKey::I32(v) => Value::synthetic(ValueKind::Int(*v as i64)),
        MapKey::I64(v) => Value::synthetic(ValueKind::Int(*v)),
        MapKey::U32(v) => Value::synthetic(ValueKind::Uint(*v as u64)),
        MapKey::U64(v) => Value::synthetic(ValueKind::Uint(*v)),
        MapKey::String(s) => Value::synthetic(ValueKind::String(s.as_bytes().to_vec())),
    }
}

/// Numeric keys sort numerically, string keys lexicographically, bool keys
/// `false < true`; the cardinality of a map means keys are always of a
/// single kind, so no cross-kind branch is ever taken in practice.
fn compare_map_keys(a: &MapKey, b: &MapKey) -> Ordering {
    match (a, b) {
        (MapKey::Bool(a), MapKey::Bool(b)) => a.cmp(b),
        (MapKey::I32(a), MapKey::I32(b)) => a.cmp(b),
        (MapKey::I64(a), MapKey::I64(b)) => a.cmp(b),
        (MapKey::U32(a), MapKey::U32(b)) => a.cmp(b),
        (MapKey::U64(a), MapKey::U64(b)) => a.cmp(b),
        (MapKey::String(a), MapKey::String(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

fn emit_extensions(
    message: &DynamicMessage,
    options: &EncodeOptions,
    acc: &mut Accumulator,
    path: &str,
    tree: &mut Message,
) {
    let mut extensions: Vec<_> = message.extensions().collect();
    extensions.sort_by(|(a, _), (b, _)| a.full_name().cmp(b.full_name()));

    for (ext, value) in extensions {
        let is_message_set = is_message_set_extension(&ext, message);
        let key_name = if is_message_set {
            containing_message_full_name(&ext)
        } else {
            ext.full_name().to_string()
        };
        let v = render_scalar_or_message(&ext, value, options, acc, path);
        tree.push(Key::String(key_name), v);
    }
}

/// MessageSet detection (§9): a `message_set_extension`-named field whose
/// message type's parent equals the extending message, on a message that
/// itself is declared `option message_set_wire_format = true`.
fn is_message_set_extension(ext: &prost_reflect::ExtensionDescriptor, message: &DynamicMessage) -> bool {
    ext.name() == "message_set_extension"
        && message.descriptor().full_name() == ext.containing_message().full_name()
        && message
            .descriptor()
            .options()
            .message_set_wire_format
            .unwrap_or(false)
}

fn containing_message_full_name(ext: &prost_reflect::ExtensionDescriptor) -> String {
    match ext.kind() {
        Kind::Message(m) => m.full_name().to_string(),
        _ => ext.full_name().to_string(),
    }
}

fn emit_unknown(message: &DynamicMessage, tree: &mut Message) {
    let raw = message.unknown_fields_raw();
    if raw.is_empty() {
        return;
    }
    match crate::unknown::decode(raw) {
        Ok(fields) => {
            let rendered = crate::unknown::render(&fields);
            for (key, value) in rendered.iter() {
                tree.push(key.clone(), value.clone());
            }
        }
        Err(_) => {
            // Unknown fields that fail to parse as valid wire data are
            // dropped rather than surfaced as a fatal encode error: they
            // never prevent a message from being otherwise well-formed.
        }
    }
}

fn try_expand_any(
    message: &DynamicMessage,
    options: &EncodeOptions,
    acc: &mut Accumulator,
    path: &str,
) -> Option<Message> {
    if message.descriptor().full_name() != "google.protobuf.Any" {
        return None;
    }
    let type_url = message.get_field_by_number(1)?.as_str()?.to_string();
    let value_bytes = message.get_field_by_number(2)?.as_bytes()?.to_vec();

    let Some(target) = options.resolver.find_message_by_url(&type_url) else {
        log::debug!("Any at {path:?} carries unresolvable type url {type_url}, emitting unexpanded");
        return None;
    };
    let nested = DynamicMessage::decode(target, value_bytes.as_slice()).ok()?;

    let inner_tree = build_tree(&nested, options, acc, path);
    if !options.allow_partial {
        check_required(&nested, path, acc);
    }
    let mut tree = Message::new();
    tree.push(Key::String(type_url), Value::message(inner_tree));
    Some(tree)
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
    use std::sync::Arc;

    use prost::encoding::{encode_key, encode_varint, WireType};
    use prost_reflect::DescriptorPool;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{
        DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet, MessageOptions,
    };

    use super::*;
    use crate::options::EncodeOptions;

    fn field(name: &str, number: i32, ty: Type, label: Label, type_name: Option<&str>) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(label as i32),
            r#type: Some(ty as i32),
            type_name: type_name.map(|s| s.to_string()),
            ..Default::default()
        }
    }

    fn pool() -> DescriptorPool {
        let any = DescriptorProto {
            name: Some("Any".to_string()),
            field: vec![
                field("type_url", 1, Type::String, Label::Optional, None),
                field("value", 2, Type::Bytes, Label::Optional, None),
            ],
            ..Default::default()
        };
        let any_file = FileDescriptorProto {
            name: Some("google/protobuf/any.proto".to_string()),
            package: Some("google.protobuf".to_string()),
            message_type: vec![any],
            syntax: Some("proto3".to_string()),
            ..Default::default()
        };

        let target = DescriptorProto {
            name: Some("Target".to_string()),
            field: vec![field("name", 1, Type::String, Label::Optional, None)],
            ..Default::default()
        };

        let holder = DescriptorProto {
            name: Some("Holder".to_string()),
            options: Some(MessageOptions {
                message_set_wire_format: Some(true),
                ..Default::default()
            }),
            extension_range: vec![prost_types::descriptor_proto::ExtensionRange {
                start: Some(4),
                end: Some(1_000_000),
                ..Default::default()
            }],
            ..Default::default()
        };
        let item_extension = FieldDescriptorProto {
            extendee: Some(".pkg.Holder".to_string()),
            ..field("message_set_extension", 1000, Type::Message, Label::Optional, Some(".pkg.Item"))
        };
        let item = DescriptorProto {
            name: Some("Item".to_string()),
            field: vec![field("data", 1, Type::String, Label::Optional, None)],
            extension: vec![item_extension],
            ..Default::default()
        };

        let pkg_file = FileDescriptorProto {
            name: Some("pkg.proto".to_string()),
            package: Some("pkg".to_string()),
            message_type: vec![target, holder, item],
            syntax: Some("proto2".to_string()),
            ..Default::default()
        };

        DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
            file: vec![any_file, pkg_file],
        })
        .expect("hand-built descriptor set is well-formed")
    }

    fn message(pool: &DescriptorPool, name: &str) -> DynamicMessage {
        let descriptor = pool.get_message_by_name(name).unwrap_or_else(|| panic!("missing message {name}"));
        DynamicMessage::new(descriptor)
    }

    #[test]
    fn any_expansion_emits_bracketed_url_key() {
        let pool = pool();
        let mut target = message(&pool, "pkg.Target");
        target.set_field_by_number(1, ReflectValue::String("hi".to_string()));
        let target_bytes = target.encode_to_vec();

        let mut any = message(&pool, "google.protobuf.Any");
        any.set_field_by_number(1, ReflectValue::String("type.example.com/pkg.Target".to_string()));
        any.set_field_by_number(2, ReflectValue::Bytes(target_bytes.into()));

        let options = EncodeOptions {
            inject_randomness: false,
            resolver: Arc::new(pool),
            ..Default::default()
        };
        let (bytes, result) = marshal(&any, &options);
        result.expect("encode should succeed");
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "[type.example.com/pkg.Target] {name: \"hi\"}");
    }

    #[test]
    fn message_set_extension_emits_type_name_key() {
        let pool = pool();
        let mut holder = message(&pool, "pkg.Holder");
        let ext = pool
            .get_extension_by_name("pkg.Item.message_set_extension")
            .expect("extension registered");

        let mut item = message(&pool, "pkg.Item");
        item.set_field_by_number(1, ReflectValue::String("payload".to_string()));
        holder.set_extension(&ext, ReflectValue::Message(item));

        let options = EncodeOptions {
            inject_randomness: false,
            resolver: Arc::new(pool),
            ..Default::default()
        };
        let (bytes, result) = marshal(&holder, &options);
        result.expect("encode should succeed");
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "[pkg.Item] {data: \"payload\"}");
    }

    #[test]
    fn unknown_field_is_re_emitted_by_number() {
        let pool = pool();
        let descriptor = pool.get_message_by_name("pkg.Target").unwrap();

        let mut buf = Vec::new();
        encode_key(1, WireType::LengthDelimited, &mut buf);
        encode_varint(2, &mut buf);
        buf.extend_from_slice(b"hi");
        encode_key(99, WireType::Varint, &mut buf);
        encode_varint(7, &mut buf);

        let message = DynamicMessage::decode(descriptor, buf.as_slice()).expect("decodes with unknown field 99");

        let options = EncodeOptions {
            inject_randomness: false,
            resolver: Arc::new(pool),
            ..Default::default()
        };
        let (bytes, result) = marshal(&message, &options);
        result.expect("encode should succeed");
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("99: 7"), "expected unknown field 99 in {text:?}");
    }
}
