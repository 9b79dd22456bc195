//! The tree walker that rebuilds object graphs.
//!
//! Restoration replays the pickler's pre-order walk. Every list, dict, set,
//! object record and reduce record claims the next memo slot when it is
//! reached, before any of its children are restored, so back-references
//! into a container or an object under construction resolve to the same
//! instance that is being filled in.

use tracing::{debug, debug_span, trace};

use crate::config::PickleOptions;
use crate::error::{PickleError, Result};
use crate::memo::{ObjectId, RestoreMemo};
use crate::registry::{Registry, RegistrySnapshot};
use crate::tags::{self, Node, Record};
use crate::value::{Dict, DictRef, Key, KeySet, ListRef, ObjectRef, Opaque, SetRef, Value};

/// Restores [`Node`] trees into [`Value`] graphs.
#[derive(Debug)]
pub struct Unpickler {
    registry: RegistrySnapshot,
    options: PickleOptions,
    memo: RestoreMemo,
    depth: usize,
    pending: Option<ObjectId>,
}

impl Unpickler {
    /// Creates an unpickler over a snapshot of `registry`.
    pub fn new(registry: &Registry, options: PickleOptions) -> Self {
        Self::with_snapshot(registry.snapshot(), options)
    }

    /// Creates an unpickler over an existing snapshot.
    pub fn with_snapshot(registry: RegistrySnapshot, options: PickleOptions) -> Self {
        Self {
            registry,
            options,
            memo: RestoreMemo::new(),
            depth: 0,
            pending: None,
        }
    }

    /// The active options.
    pub fn options(&self) -> &PickleOptions {
        &self.options
    }

    /// The registry snapshot in use.
    pub fn registry(&self) -> &RegistrySnapshot {
        &self.registry
    }

    /// Restores a whole tree, starting a fresh reference scope.
    pub fn restore(&mut self, node: &Node) -> Result<Value> {
        let span = debug_span!("restore");
        let _enter = span.enter();

        self.memo.clear();
        self.depth = 0;
        self.pending = None;
        let value = self.restore_nested(node);
        debug!(memoized = self.memo.len(), ok = value.is_ok(), "restore finished");
        self.memo.clear();
        value
    }

    /// Restores a node inside the current reference scope. Handlers use this
    /// for the values embedded in their records.
    pub fn restore_nested(&mut self, node: &Node) -> Result<Value> {
        match node {
            Node::Null => Ok(Value::Null),
            Node::Bool(b) => Ok(Value::Bool(*b)),
            Node::Number(n) => match n.as_i64() {
                Some(int) => Ok(Value::Int(int)),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| PickleError::malformed(format!("unrepresentable number {n}"))),
            },
            Node::String(s) => Ok(Value::Str(s.clone())),
            Node::Array(items) => {
                self.enter()?;
                let value = self.restore_list(items);
                self.depth -= 1;
                value
            }
            Node::Object(record) => {
                self.enter()?;
                let value = self.restore_record(record);
                self.depth -= 1;
                value
            }
        }
    }

    /// Registers the instance a handler is restoring before its nested values
    /// are restored, so that back-references to it inside its own record
    /// resolve. Must be called from [`Handler::restore`] at most once.
    ///
    /// [`Handler::restore`]: crate::registry::Handler::restore
    pub fn remember_pending(&mut self, object: &ObjectRef) -> Result<()> {
        let id = self
            .pending
            .take()
            .ok_or_else(|| PickleError::Handler("no handler object is awaiting registration".into()))?;
        self.memo.remember(id, Value::Object(object.clone()))
    }

    fn enter(&mut self) -> Result<()> {
        if let Some(max) = self.options.max_depth
            && self.depth >= max
        {
            return Err(PickleError::DepthExceeded(max));
        }
        self.depth += 1;
        Ok(())
    }

    fn restore_list(&mut self, items: &[Node]) -> Result<Value> {
        let list = ListRef::new(Vec::with_capacity(items.len()));
        self.memo.push(Value::List(list.clone()));
        for item in items {
            let value = self.restore_nested(item)?;
            list.borrow_mut().push(value);
        }
        Ok(Value::List(list))
    }

    fn restore_record(&mut self, record: &Record) -> Result<Value> {
        let tagged = tags::DISCRIMINATORS
            .iter()
            .find_map(|&tag| record.get(tag).map(|payload| (tag, payload)));
        match tagged {
            Some((tags::REF, payload)) => {
                let index = payload
                    .as_u64()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| PickleError::malformed(format!("{} must be an index, got {payload}", tags::REF)))?;
                self.memo.resolve(index)
            }
            Some((tags::TUPLE, payload)) => {
                let items = self.restore_array(tags::TUPLE, payload)?;
                Ok(Value::tuple(items))
            }
            Some((tags::SET, payload)) => self.restore_set(payload),
            Some((tags::TYPEREF, payload)) => self.registry.resolve_symbol(text(tags::TYPEREF, payload)?),
            Some((tags::REDUCE, payload)) => self.restore_reduce(record, payload),
            Some((tags::REPR, payload)) => {
                let value = Value::Opaque(Opaque::placeholder(text(tags::REPR, payload)?));
                if record.contains_key(tags::ID) {
                    let id = self.claim(record)?;
                    self.memo.remember(id, value.clone())?;
                }
                Ok(value)
            }
            Some((_, payload)) => self.restore_object(record, text(tags::TYPE, payload)?),
            None => self.restore_dict(record),
        }
    }

    /// Reserves the next memo slot, checking it against a declared `$id`.
    fn claim(&mut self, record: &Record) -> Result<ObjectId> {
        let id = self.memo.reserve();
        if let Some(declared) = record.get(tags::ID)
            && declared.as_u64() != u64::try_from(id.index()).ok()
        {
            return Err(PickleError::malformed(format!(
                "record declares {} {declared} but is object {id}",
                tags::ID
            )));
        }
        Ok(id)
    }

    fn restore_array(&mut self, tag: &str, payload: &Node) -> Result<Vec<Value>> {
        let items = payload
            .as_array()
            .ok_or_else(|| PickleError::malformed(format!("{tag} payload must be an array")))?;
        items.iter().map(|item| self.restore_nested(item)).collect()
    }

    fn restore_set(&mut self, payload: &Node) -> Result<Value> {
        let set = SetRef::new(KeySet::new());
        self.memo.push(Value::Set(set.clone()));
        for item in self.restore_array(tags::SET, payload)? {
            let key = to_key(item)?;
            set.borrow_mut().insert(key);
        }
        Ok(Value::Set(set))
    }

    fn restore_dict(&mut self, record: &Record) -> Result<Value> {
        let dict = DictRef::new(Dict::with_capacity(record.len()));
        self.memo.push(Value::Dict(dict.clone()));
        for (key, node) in record {
            let value = self.restore_nested(node)?;
            dict.borrow_mut().insert(tags::decode_key(key), value);
        }
        Ok(Value::Dict(dict))
    }

    fn restore_object(&mut self, record: &Record, type_name: &str) -> Result<Value> {
        if let Some(handler) = self.registry.lookup(type_name) {
            trace!(type_name, "dispatching to handler");
            let id = self.claim(record)?;
            let outer = self.pending.replace(id);
            let restored = handler.restore(record, self);
            let unclaimed = std::mem::replace(&mut self.pending, outer).is_some();
            let value = Value::Object(restored?);
            if unclaimed {
                self.memo.remember(id, value.clone())?;
            } else if !self.memo.resolve(id.index())?.same_as(&value) {
                return Err(PickleError::Handler(format!(
                    "handler for {type_name} returned a different object than it registered"
                )));
            }
            return Ok(value);
        }

        let descriptor = self
            .registry
            .resolve_type(type_name)
            .ok_or_else(|| PickleError::UnresolvableType(type_name.to_string()))?;
        let object = descriptor
            .construct()
            .ok_or_else(|| PickleError::UnresolvableType(format!("{type_name} (no constructor)")))?;

        let id = self.claim(record)?;
        let value = Value::Object(object.clone());
        self.memo.remember(id, value.clone())?;

        for (key, node) in record {
            if tags::is_reserved(key) {
                continue;
            }
            let field = self.restore_nested(node)?;
            object.borrow_mut().set_field(tags::unescape(key), field)?;
        }
        Ok(value)
    }

    fn restore_reduce(&mut self, record: &Record, payload: &Node) -> Result<Value> {
        let parts = payload
            .as_array()
            .ok_or_else(|| PickleError::malformed(format!("{} payload must be an array", tags::REDUCE)))?;
        let [callable, args, rest @ ..] = parts.as_slice() else {
            return Err(PickleError::malformed(format!("{} needs a callable and arguments", tags::REDUCE)));
        };
        if rest.len() > 3 {
            return Err(PickleError::malformed(format!("{} has {} parts", tags::REDUCE, parts.len())));
        }

        let id = self.claim(record)?;
        let callable = self.restore_symbol(callable)?;
        let args = self.restore_array(tags::REDUCE, args)?;
        let instance = invoke(&callable, &args)?;
        self.memo.remember(id, instance.clone())?;

        let mut rest = rest.iter();
        if let Some(state) = rest.next()
            && !state.is_null()
        {
            let state = self.restore_nested(state)?;
            apply_state(&instance, state)?;
        }
        if let Some(items) = rest.next()
            && !items.is_null()
        {
            let items = self.restore_array(tags::REDUCE, items)?;
            match &instance {
                Value::List(list) => list.borrow_mut().extend(items),
                other => {
                    return Err(PickleError::malformed(format!(
                        "cannot append list items to a {}",
                        other.kind_name()
                    )));
                }
            }
        }
        if let Some(entries) = rest.next()
            && !entries.is_null()
        {
            let pairs = self.restore_pairs(entries)?;
            match &instance {
                Value::Dict(dict) => dict.borrow_mut().extend(pairs),
                other => {
                    return Err(PickleError::malformed(format!(
                        "cannot insert dict items into a {}",
                        other.kind_name()
                    )));
                }
            }
        }
        Ok(instance)
    }

    /// The callable of a reduce record is a bare symbol reference and takes no
    /// depth level.
    fn restore_symbol(&self, node: &Node) -> Result<Value> {
        let name = node
            .as_object()
            .and_then(|record| record.get(tags::TYPEREF))
            .ok_or_else(|| {
                PickleError::malformed(format!("{} callable must be a {} record", tags::REDUCE, tags::TYPEREF))
            })?;
        self.registry.resolve_symbol(text(tags::TYPEREF, name)?)
    }

    /// Pairs are written as bare two-element arrays, which are not lists of
    /// the graph and take no memo slot.
    fn restore_pairs(&mut self, entries: &Node) -> Result<Vec<(Key, Value)>> {
        let entries = entries
            .as_array()
            .ok_or_else(|| PickleError::malformed("dict items must be an array"))?;
        let mut pairs = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some([key, item]) = entry.as_array().map(Vec::as_slice) else {
                return Err(PickleError::malformed("dict items must be [key, value] pairs"));
            };
            let key = to_key(self.restore_nested(key)?)?;
            let item = self.restore_nested(item)?;
            pairs.push((key, item));
        }
        Ok(pairs)
    }
}

fn text<'n>(tag: &str, payload: &'n Node) -> Result<&'n str> {
    payload
        .as_str()
        .ok_or_else(|| PickleError::malformed(format!("{tag} payload must be a string")))
}

fn to_key(value: Value) -> Result<Key> {
    Key::from_value(&value).ok_or_else(|| PickleError::TypeMismatch {
        expected: "key",
        found: value.kind_name(),
    })
}

fn invoke(callable: &Value, args: &[Value]) -> Result<Value> {
    match callable {
        Value::Type(descriptor) => {
            if !args.is_empty() {
                return Err(PickleError::malformed(format!(
                    "type {} takes no constructor arguments",
                    descriptor.name()
                )));
            }
            descriptor
                .construct()
                .map(Value::Object)
                .ok_or_else(|| PickleError::UnresolvableType(format!("{} (no constructor)", descriptor.name())))
        }
        Value::Function(function) => function.call(args),
        other => Err(PickleError::malformed(format!(
            "{} callable is a {}",
            tags::REDUCE,
            other.kind_name()
        ))),
    }
}

fn apply_state(instance: &Value, state: Value) -> Result<()> {
    match instance {
        Value::Object(object) => object.borrow_mut().set_state(state),
        Value::Dict(dict) => {
            let entries = match state {
                Value::Dict(entries) => entries,
                other => {
                    return Err(PickleError::TypeMismatch {
                        expected: "dict",
                        found: other.kind_name(),
                    });
                }
            };
            let entries: Vec<(Key, Value)> = entries.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            dict.borrow_mut().extend(entries);
            Ok(())
        }
        other => Err(PickleError::malformed(format!(
            "cannot apply state to a {}",
            other.kind_name()
        ))),
    }
}
