//! # graphpickle
//!
//! Serializes arbitrary in-memory object graphs, including shared and cyclic
//! references, heterogeneous containers and user-defined types, into a
//! JSON-compatible tree, and rebuilds an equivalent graph from that tree.
//!
//! ## Overview
//!
//! Plain serializers treat data as a tree: a value reachable from two places
//! is written twice and comes back as two independent copies, and a cycle
//! never terminates. graphpickle works on a graph instead. Every shared,
//! mutable value is given an index the first time it is reached and written
//! as a back-reference (`{"$ref": n}`) on every later visit. Restoring
//! replays the same walk, so aliasing and cycles survive the round-trip.
//!
//! ### Key Features
//!
//! *   **Identity Preservation:** Shared lists, dicts, sets and objects stay
//!     shared; self-referencing structures round-trip.
//! *   **Custom Types:** Derive [`PickleObject`] for a field view, return a
//!     [`Reduction`] for constructor-style rebuilding, or register a
//!     [`Handler`] to take over completely.
//! *   **Pluggable Text Codecs:** The intermediate tree is plain
//!     `serde_json::Value`; any [`Backend`] can turn it into text, and a
//!     [`BackendRegistry`] falls back between several.
//! *   **Plain Output:** With `unpicklable = false` the output is ordinary JSON
//!     for consumers that only need the data.
//!
//! ## Architecture
//!
//! ```text
//! Value graph ──Pickler──▶ Node tree ──Backend──▶ text
//!      ▲                      │
//!      └─────Unpickler────────┘◀──Backend── text
//! ```
//!
//! *   [`classify`] maps every value onto a closed set of structural kinds.
//! *   [`pickler::Pickler`] walks the graph depth-first, consulting the
//!     [`registry`] for handlers and the [`memo`] for identities.
//! *   [`unpickler::Unpickler`] walks the tree in the same order and rebuilds
//!     the graph, resolving type and function names through the registry.
//! *   [`backend`] adapts the tree to text.
//!
//! ### Tree Format
//!
//! | Tag | Meaning | Payload |
//! |---|---|---|
//! | `$type` | object-instance record | type name + field entries |
//! | `$id` | memo index of this record | integer |
//! | `$ref` | back-reference to a prior index | integer |
//! | `$tuple` | fixed-arity ordered collection | array |
//! | `$set` | unordered unique collection | array |
//! | `$typeref` | type or function by name | qualified name |
//! | `$reduce` | reduction-based reconstruction | 2 to 5 element array |
//! | `$repr` | opaque placeholder | description |
//!
//! Mapping keys that start with `$` are escaped by doubling the `$`;
//! non-string keys use sentinels (see [`tags`]).
//!
//! ## Usage Patterns
//!
//! ### Round-Tripping a Cyclic Graph
//!
//! ```rust
//! use graphpickle::{JsonPickle, Value};
//!
//! let list = Value::list(vec![Value::from("head")]);
//! if let Some(items) = list.as_list() {
//!     items.borrow_mut().push(list.clone());
//! }
//!
//! let text = JsonPickle::encode(&list)?;
//! assert_eq!(text, r#"["head",{"$ref":0}]"#);
//!
//! let restored = JsonPickle::decode(&text)?;
//! let tail = restored.as_list().and_then(|items| items.borrow().get(1).cloned());
//! assert!(tail.is_some_and(|tail| tail.same_as(&restored)));
//! # Ok::<(), graphpickle::PickleError>(())
//! ```
//!
//! ### Custom Types
//!
//! ```rust
//! use graphpickle::{JsonPickle, ListRef, PickleObject, Registry, Value};
//!
//! #[derive(Debug, Default, PickleObject)]
//! struct Player {
//!     name: String,
//!     level: i64,
//!     #[pickle(transient)]
//!     session: Option<String>,
//!     inventory: Option<ListRef>,
//! }
//!
//! let registry = Registry::new();
//! registry.register_type_of::<Player>();
//!
//! let player = Value::object(Player {
//!     name: "ada".into(),
//!     level: 3,
//!     session: Some("token".into()),
//!     inventory: Some(ListRef::new(vec![Value::from("sword")])),
//! });
//!
//! let pickle = JsonPickle::builder().registry(&registry);
//! let restored = pickle.decode(&pickle.encode(&player)?)?;
//! let object = restored
//!     .as_object()
//!     .and_then(|o| o.downcast_ref::<Player>().map(|p| (p.name.clone(), p.session.clone())));
//! assert_eq!(object, Some(("ada".to_string(), None)));
//! # Ok::<(), graphpickle::PickleError>(())
//! ```
//!
//! ## Safety and Robustness
//!
//! * **Encapsulated Unsafe:** the only `unsafe` block memory-maps a file in
//!   [`JsonPickle::load`].
//! * **No Panics:** no `unwrap()` or `panic!()` calls in the library
//!   (enforced by clippy lints).
//! * **Comprehensive Errors:** all failures correspond to a [`PickleError`].
//! * **Thread Safety:** values are `!Send`; registries are `Send + Sync` and
//!   every call works on its own snapshot.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod backend;
pub mod classify;
pub mod config;
pub mod convert;
pub mod error;
pub mod inspector;
pub mod object;
pub mod pickler;
pub mod registry;
pub mod tags;
pub mod unpickler;
pub mod value;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod memo;

// --- RE-EXPORTS ---

pub use api::{JsonPickle, PickleBuilder};
#[cfg(feature = "yaml")]
pub use backend::YamlBackend;
pub use backend::{Backend, BackendRegistry, JsonBackend};
pub use classify::{Capability, Kind};
pub use config::{PickleOptions, UnpicklableHandling};
pub use convert::{FromValue, ToValue};
pub use error::{PickleError, Result};
pub use inspector::{TreeInspector, TreeReport};
pub use object::{AsAny, Describe, PickleObject, Reduction, TypeDescriptor};
pub use pickler::Pickler;
pub use registry::{Handler, Registry, RegistrySnapshot};
pub use tags::{Node, Record};
pub use unpickler::Unpickler;
pub use value::{Callable, DictRef, Key, ListRef, NativeFn, ObjectRef, Opaque, SetRef, Shared, Value};

// Re-export the derive macro so it is accessible as `graphpickle::PickleObject`
pub use graphpickle_derive::PickleObject;

/// Encodes `value` with the global registry and backend.
pub fn encode(value: &Value, options: &PickleOptions) -> Result<String> {
    JsonPickle::builder().options(options.clone()).encode(value)
}

/// Decodes `text` with the global registry and backend.
pub fn decode(text: &str, options: &PickleOptions) -> Result<Value> {
    JsonPickle::builder().options(options.clone()).decode(text)
}

/// Registers `handler` for `T` in the global registry.
pub fn register<T: Describe, H: Handler + 'static>(handler: H) -> Option<std::sync::Arc<dyn Handler>> {
    Registry::global().register_for::<T, H>(handler)
}

/// Removes the global handler for `T`.
pub fn unregister<T: Describe>() -> Option<std::sync::Arc<dyn Handler>> {
    Registry::global().unregister(T::DESCRIPTOR.name())
}

/// Makes `T` resolvable by name in the global registry.
pub fn register_type<T: Describe>() {
    Registry::global().register_type_of::<T>();
}

/// Makes `func` resolvable by name in the global registry.
pub fn register_function(name: impl Into<String>, func: NativeFn) {
    Registry::global().register_function(name, func);
}
