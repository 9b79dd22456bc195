//! The graph walker that produces the intermediate tree.
//!
//! # Reference protocol
//! With references kept, every list, dict, set and object gets a memo index
//! the first time it is reached, in depth-first pre-order starting at 0. A
//! later visit emits `{"$ref": n}` instead of the value. Object and reduce
//! records spell their index out as `$id`; containers carry it implicitly,
//! by position, and the [`Unpickler`](crate::unpickler::Unpickler) replays the
//! same walk to recover it.
//!
//! With references off, shared values are written once per path. A value
//! found among its own ancestors cannot be written at all; it becomes a
//! `$repr` placeholder or an [`PickleError::UnbrokenCycle`] error.

use serde_json::Number;
use tracing::{debug, debug_span, trace};

use crate::classify::{Kind, classify};
use crate::config::PickleOptions;
use crate::error::{PickleError, Result};
use crate::memo::{FlattenMemo, ObjectId};
use crate::object::Reduction;
use crate::registry::{Registry, RegistrySnapshot};
use crate::tags::{self, Node, Record};
use crate::value::{Key, ObjectRef, Value};

/// Flattens [`Value`] graphs into [`Node`] trees.
///
/// A `Pickler` can be reused; all walk state is reset at the start and end of
/// every [`Pickler::flatten`] call.
#[derive(Debug)]
pub struct Pickler {
    registry: RegistrySnapshot,
    options: PickleOptions,
    memo: FlattenMemo,
    depth: usize,
    ancestors: Vec<usize>,
}

impl Pickler {
    /// Creates a pickler over a snapshot of `registry`.
    pub fn new(registry: &Registry, options: PickleOptions) -> Self {
        Self::with_snapshot(registry.snapshot(), options)
    }

    /// Creates a pickler over an existing snapshot.
    pub fn with_snapshot(registry: RegistrySnapshot, options: PickleOptions) -> Self {
        Self {
            registry,
            options,
            memo: FlattenMemo::new(),
            depth: 0,
            ancestors: Vec::new(),
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

    /// Flattens a whole graph, starting a fresh reference scope.
    pub fn flatten(&mut self, value: &Value) -> Result<Node> {
        let span = debug_span!(
            "flatten",
            root = value.kind_name(),
            references = self.options.tracks_references(),
            tagged = self.options.unpicklable,
        );
        let _enter = span.enter();

        self.reset();
        let node = self.flatten_nested(value);
        debug!(memoized = self.memo.len(), ok = node.is_ok(), "flatten finished");
        self.reset();
        node
    }

    /// Flattens a value inside the current reference scope. Handlers use this
    /// for the values they embed in their records.
    pub fn flatten_nested(&mut self, value: &Value) -> Result<Node> {
        if classify(value) == Kind::Primitive {
            return leaf(value);
        }
        self.enter()?;
        let node = self.flatten_tracked(value);
        self.depth -= 1;
        node
    }

    fn reset(&mut self) {
        self.memo.clear();
        self.depth = 0;
        self.ancestors.clear();
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

    fn flatten_tracked(&mut self, value: &Value) -> Result<Node> {
        if self.options.tracks_references() {
            return match self.memo.get_or_assign(value) {
                Some((id, false)) => {
                    trace!(%id, kind = value.kind_name(), "memo hit");
                    Ok(reference(id))
                }
                Some((id, true)) => self.flatten_kind(value, Some(id)),
                None => self.flatten_kind(value, None),
            };
        }

        let Some(identity) = value.identity() else {
            return self.flatten_kind(value, None);
        };
        if self.ancestors.contains(&identity) {
            return self.placeholder_or(value.describe(), None, PickleError::UnbrokenCycle);
        }
        self.ancestors.push(identity);
        let node = self.flatten_kind(value, None);
        self.ancestors.pop();
        node
    }

    fn flatten_kind(&mut self, value: &Value, id: Option<ObjectId>) -> Result<Node> {
        match (classify(value), value) {
            (Kind::Primitive, _) => leaf(value),
            (Kind::Sequence, Value::List(list)) => {
                let items = list.borrow().clone();
                self.flatten_all(&items).map(Node::Array)
            }
            (Kind::TupleLike, Value::Tuple(items)) => {
                let items = self.flatten_all(items)?;
                Ok(self.tag(tags::TUPLE, Node::Array(items)))
            }
            (Kind::SetLike, Value::Set(set)) => {
                let keys: Vec<Key> = set.borrow().iter().cloned().collect();
                let items = keys.iter().map(|key| leaf(&key.to_value())).collect::<Result<_>>()?;
                Ok(self.tag(tags::SET, Node::Array(items)))
            }
            (Kind::Mapping, Value::Dict(dict)) => {
                let entries: Vec<(Key, Value)> = dict.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                let mut record = Record::new();
                for (key, item) in &entries {
                    let name = if self.options.unpicklable {
                        tags::encode_key(key)
                    } else {
                        tags::plain_key(key)
                    };
                    let node = self.flatten_nested(item)?;
                    record.insert(name, node);
                }
                Ok(Node::Object(record))
            }
            (Kind::FunctionLike | Kind::TypeReference, _) => self.flatten_symbol(value),
            (Kind::CustomObject | Kind::NonReconstructible, Value::Object(object)) => self.flatten_object(object, id),
            (Kind::NonReconstructible, _) => {
                if self.options.unpicklable {
                    self.placeholder_or(value.describe(), id, PickleError::Unpicklable)
                } else {
                    Ok(Node::String(value.describe()))
                }
            }
            (kind, other) => Err(PickleError::malformed(format!(
                "{} classified as {kind:?}",
                other.kind_name()
            ))),
        }
    }

    fn flatten_all(&mut self, items: &[Value]) -> Result<Vec<Node>> {
        items.iter().map(|item| self.flatten_nested(item)).collect()
    }

    fn flatten_symbol(&mut self, value: &Value) -> Result<Node> {
        let name = match value {
            Value::Type(descriptor) => Some(descriptor.name().to_string()),
            Value::Function(callable) => callable.name().map(str::to_string),
            _ => None,
        };
        match name {
            Some(name) => Ok(self.tag(tags::TYPEREF, Node::String(name))),
            None if !self.options.unpicklable => Ok(Node::String(value.describe())),
            None => self.placeholder_or(value.describe(), None, PickleError::UnresolvableSymbol),
        }
    }

    fn flatten_object(&mut self, object: &ObjectRef, id: Option<ObjectId>) -> Result<Node> {
        let type_name = object.type_name();

        if let Some(handler) = self.registry.lookup(type_name) {
            trace!(type_name, "dispatching to handler");
            let shell = self.shell(type_name, id);
            let mut record = handler.flatten(object, shell, self)?;
            if !self.options.unpicklable {
                record.retain(|key, _| !tags::is_reserved(key));
            }
            return Ok(Node::Object(record));
        }

        let reduction = object.borrow().reduce();
        if let Some(reduction) = reduction {
            // An unnamed callable makes the whole object non-reconstructible.
            if self.options.unpicklable
                && let Value::Function(callable) = &reduction.callable
                && callable.name().is_none()
            {
                let description = object.borrow().describe();
                return self.placeholder_or(description, id, PickleError::UnresolvableSymbol);
            }
            return self.flatten_reduction(type_name, reduction, id);
        }

        let constructible = object.borrow().descriptor().is_constructible();
        if !constructible && self.options.unpicklable {
            let description = object.borrow().describe();
            return self.placeholder_or(description, id, PickleError::Unpicklable);
        }
        self.flatten_fields(object, id)
    }

    fn flatten_fields(&mut self, object: &ObjectRef, id: Option<ObjectId>) -> Result<Node> {
        let (fields, transient) = {
            let inner = object.borrow();
            (inner.fields(), inner.transient_fields())
        };
        let mut record = self.shell(object.type_name(), id);
        for (name, field) in fields {
            if transient.contains(&name.as_str()) {
                continue;
            }
            let key = if self.options.unpicklable { tags::escape(&name) } else { name };
            let node = self.flatten_nested(&field)?;
            record.insert(key, node);
        }
        Ok(Node::Object(record))
    }

    fn flatten_reduction(&mut self, type_name: &str, reduction: Reduction, id: Option<ObjectId>) -> Result<Node> {
        if !self.options.unpicklable {
            return match &reduction.state {
                Some(state) => self.flatten_nested(state),
                None => self.flatten_all(&reduction.args).map(Node::Array),
            };
        }

        let callable = match &reduction.callable {
            Value::Type(_) | Value::Function(_) => self.flatten_symbol(&reduction.callable)?,
            other => {
                return Err(PickleError::Unpicklable(format!(
                    "reduction of {type_name} names a {} as its callable",
                    other.kind_name()
                )));
            }
        };
        let args = Node::Array(self.flatten_all(&reduction.args)?);

        let state = reduction.state.as_ref().map(|state| self.flatten_nested(state)).transpose()?;
        let list_items = reduction
            .list_items
            .as_deref()
            .map(|items| self.flatten_all(items).map(Node::Array))
            .transpose()?;
        let dict_items = reduction
            .dict_items
            .as_deref()
            .map(|entries| self.flatten_pairs(entries))
            .transpose()?;

        // Trailing absent parts are dropped; inner gaps are written as null.
        let tail = [state, list_items, dict_items];
        let used = tail.iter().rposition(Option::is_some).map_or(0, |last| last + 1);
        let mut parts = vec![callable, args];
        parts.extend(tail.into_iter().take(used).map(|part| part.unwrap_or(Node::Null)));

        let mut record = Record::new();
        record.insert(tags::REDUCE.to_string(), Node::Array(parts));
        if let Some(id) = id {
            record.insert(tags::ID.to_string(), Node::from(id.index()));
        }
        Ok(Node::Object(record))
    }

    fn flatten_pairs(&mut self, entries: &[(Key, Value)]) -> Result<Node> {
        let mut pairs = Vec::with_capacity(entries.len());
        for (key, item) in entries {
            let key = leaf(&key.to_value())?;
            let item = self.flatten_nested(item)?;
            pairs.push(Node::Array(vec![key, item]));
        }
        Ok(Node::Array(pairs))
    }

    /// A record pre-seeded with `$type` and, when references are kept, `$id`.
    fn shell(&self, type_name: &str, id: Option<ObjectId>) -> Record {
        let mut record = Record::new();
        if self.options.unpicklable {
            record.insert(tags::TYPE.to_string(), Node::String(type_name.to_string()));
        }
        if let Some(id) = id {
            record.insert(tags::ID.to_string(), Node::from(id.index()));
        }
        record
    }

    fn tag(&self, tag: &str, payload: Node) -> Node {
        if !self.options.unpicklable {
            return payload;
        }
        let mut record = Record::new();
        record.insert(tag.to_string(), payload);
        Node::Object(record)
    }

    fn placeholder_or(
        &self,
        description: String,
        id: Option<ObjectId>,
        error: fn(String) -> PickleError,
    ) -> Result<Node> {
        if !self.options.uses_placeholders() {
            return Err(error(description));
        }
        if !self.options.unpicklable {
            return Ok(Node::String(description));
        }
        let mut record = Record::new();
        record.insert(tags::REPR.to_string(), Node::String(description));
        if let Some(id) = id {
            record.insert(tags::ID.to_string(), Node::from(id.index()));
        }
        Ok(Node::Object(record))
    }
}

fn leaf(value: &Value) -> Result<Node> {
    match value {
        Value::Null => Ok(Node::Null),
        Value::Bool(b) => Ok(Node::Bool(*b)),
        Value::Int(n) => Ok(Node::from(*n)),
        Value::Float(x) => Number::from_f64(*x)
            .map(Node::Number)
            .ok_or_else(|| PickleError::UnencodableNode(format!("non-finite float {x}"))),
        Value::Str(s) => Ok(Node::String(s.clone())),
        other => Err(PickleError::malformed(format!("{} is not a leaf", other.kind_name()))),
    }
}

fn reference(id: ObjectId) -> Node {
    let mut record = Record::new();
    record.insert(tags::REF.to_string(), Node::from(id.index()));
    Node::Object(record)
}
