//! Defines the reserved keys of the intermediate tree.
//!
//! # Tagged records
//! A tagged record is a JSON object carrying exactly one discriminator key from
//! this module (plus `$id` on object records). Everything else in the tree is
//! either a JSON primitive or a plain array/object.
//!
//! # Key escaping
//! Because every discriminator starts with `$`, user mapping keys that start
//! with `$` are escaped by doubling the leading `$`. Non-string keys use
//! `$`-prefixed sentinels, so they can never collide with a real string key:
//!
//! | Key | Encoded |
//! |---|---|
//! | `"name"` | `"name"` |
//! | `"$name"` | `"$$name"` |
//! | `null` | `"$null"` |
//! | `true` / `false` | `"$true"` / `"$false"` |
//! | `42` | `"$int:42"` |

use crate::value::Key;

/// A node of the intermediate tree.
pub type Node = serde_json::Value;
/// A JSON object node; tagged records are records carrying a discriminator.
pub type Record = serde_json::Map<String, Node>;

/// Object-instance record: qualified type name.
pub const TYPE: &str = "$type";
/// Memo index assigned to an object record.
pub const ID: &str = "$id";
/// Back-reference to a previously assigned memo index.
pub const REF: &str = "$ref";
/// Fixed-arity ordered collection.
pub const TUPLE: &str = "$tuple";
/// Unordered unique collection.
pub const SET: &str = "$set";
/// Reference to a type or function by name.
pub const TYPEREF: &str = "$typeref";
/// Reduction-based reconstruction.
pub const REDUCE: &str = "$reduce";
/// Opaque placeholder for a non-reconstructible value.
pub const REPR: &str = "$repr";

/// All discriminators, in the order the unpickler checks them.
pub const DISCRIMINATORS: [&str; 7] = [REF, TUPLE, SET, TYPEREF, REDUCE, REPR, TYPE];

const ESCAPE: char = '$';
const NULL_KEY: &str = "$null";
const TRUE_KEY: &str = "$true";
const FALSE_KEY: &str = "$false";
const INT_PREFIX: &str = "$int:";

/// Returns true if `key` is one of the reserved record keys.
pub fn is_reserved(key: &str) -> bool {
    key == ID || DISCRIMINATORS.contains(&key)
}

/// Encodes a mapping key (or object field name) for the tagged format.
pub fn encode_key(key: &Key) -> String {
    match key {
        Key::Null => NULL_KEY.to_string(),
        Key::Bool(true) => TRUE_KEY.to_string(),
        Key::Bool(false) => FALSE_KEY.to_string(),
        Key::Int(n) => format!("{INT_PREFIX}{n}"),
        Key::Str(s) => escape(s),
    }
}

/// Encodes a mapping key for plain (untagged) output.
///
/// The result is lossy: `null` becomes `"null"` and numbers their decimal form.
pub fn plain_key(key: &Key) -> String {
    match key {
        Key::Null => "null".to_string(),
        Key::Bool(b) => b.to_string(),
        Key::Int(n) => n.to_string(),
        Key::Str(s) => s.clone(),
    }
}

/// Decodes a key written by [`encode_key`].
///
/// Unknown `$`-prefixed keys are kept verbatim, so trees produced by other
/// writers still restore.
pub fn decode_key(raw: &str) -> Key {
    if let Some(rest) = raw.strip_prefix("$$") {
        return Key::Str(format!("{ESCAPE}{rest}"));
    }
    match raw {
        NULL_KEY => Key::Null,
        TRUE_KEY => Key::Bool(true),
        FALSE_KEY => Key::Bool(false),
        _ => raw
            .strip_prefix(INT_PREFIX)
            .and_then(|digits| digits.parse::<i64>().ok())
            .map_or_else(|| Key::Str(raw.to_string()), Key::Int),
    }
}

/// Escapes a field name or string key.
pub fn escape(name: &str) -> String {
    if name.starts_with(ESCAPE) {
        format!("{ESCAPE}{name}")
    } else {
        name.to_string()
    }
}

/// Reverses [`escape`].
pub fn unescape(name: &str) -> &str {
    if name.starts_with("$$") { &name[1..] } else { name }
}
