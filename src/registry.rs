//! Handler registry and name catalogs.
//!
//! The registry maps type names to custom [`Handler`]s and holds the two
//! catalogs the unpickler needs to turn names back into things: constructible
//! types (for `$type` and `$typeref`) and named functions (for `$typeref` and
//! reduction callables).
//!
//! A process-wide default lives behind [`Registry::global`], but every entry
//! point accepts its own `Registry`. Each top-level call works on a
//! [`RegistrySnapshot`] taken when it starts, so concurrent registration never
//! changes the rules of a call already in flight.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard};

use tracing::debug;

use crate::error::{PickleError, Result};
use crate::object::{Describe, TypeDescriptor};
use crate::pickler::Pickler;
use crate::tags::Record;
use crate::unpickler::Unpickler;
use crate::value::{Callable, NativeFn, ObjectRef, Value};

/// Custom flatten/restore logic for one type.
///
/// Handlers receive the active [`Pickler`]/[`Unpickler`], so nested values go
/// through the same memo as the rest of the graph
/// ([`Pickler::flatten_nested`], [`Unpickler::restore_nested`]).
pub trait Handler: Send + Sync + fmt::Debug {
    /// Completes `record`, which arrives pre-seeded with `$type` (and `$id`
    /// when references are kept). Keys written by the handler must not start
    /// with `$` unless escaped with [`tags::escape`](crate::tags::escape).
    fn flatten(&self, object: &ObjectRef, record: Record, pickler: &mut Pickler) -> Result<Record>;

    /// Rebuilds an object from the record written by [`Handler::flatten`].
    ///
    /// A record that refers back to itself needs its object registered with
    /// [`Unpickler::remember_pending`] before the nested values are restored.
    /// Otherwise the object is added to the memo once this returns.
    fn restore(&self, record: &Record, unpickler: &mut Unpickler) -> Result<ObjectRef>;
}

/// The registry contents. Cloned on write, shared on read.
#[derive(Clone, Default)]
pub struct Catalog {
    handlers: HashMap<&'static str, Arc<dyn Handler>>,
    types: HashMap<&'static str, TypeDescriptor>,
    functions: HashMap<String, NativeFn>,
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A thread-safe, copy-on-write registry.
#[derive(Debug, Default)]
pub struct Registry {
    inner: RwLock<Arc<Catalog>>,
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default registry.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Captures the current contents for one top-level call.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot(Arc::clone(&self.read()))
    }

    fn read(&self) -> RwLockReadGuard<'_, Arc<Catalog>> {
        // A panic while holding the lock cannot leave a half-written catalog:
        // writers only swap in a finished copy.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<R>(&self, apply: impl FnOnce(&mut Catalog) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        apply(Arc::make_mut(&mut guard))
    }

    /// Registers `handler` for the type named by `descriptor`, returning the
    /// handler it replaces. The descriptor is added to the type catalog too.
    pub fn register<H: Handler + 'static>(&self, descriptor: TypeDescriptor, handler: H) -> Option<Arc<dyn Handler>> {
        let name = descriptor.name();
        debug!(type_name = name, ?handler, "registering handler");
        self.update(|catalog| {
            catalog.types.insert(name, descriptor);
            catalog.handlers.insert(name, Arc::new(handler))
        })
    }

    /// [`Registry::register`] keyed by a type's static descriptor.
    pub fn register_for<T: Describe, H: Handler + 'static>(&self, handler: H) -> Option<Arc<dyn Handler>> {
        self.register(T::DESCRIPTOR, handler)
    }

    /// Removes the handler for `type_name`. A no-op if none is registered.
    pub fn unregister(&self, type_name: &str) -> Option<Arc<dyn Handler>> {
        let removed = self.update(|catalog| catalog.handlers.remove(type_name));
        if removed.is_some() {
            debug!(type_name, "unregistered handler");
        }
        removed
    }

    /// Current handler for `type_name`.
    pub fn lookup(&self, type_name: &str) -> Option<Arc<dyn Handler>> {
        self.read().handlers.get(type_name).cloned()
    }

    /// Makes a type resolvable by name.
    pub fn register_type(&self, descriptor: TypeDescriptor) {
        debug!(type_name = descriptor.name(), "registering type");
        self.update(|catalog| {
            catalog.types.insert(descriptor.name(), descriptor);
        });
    }

    /// [`Registry::register_type`] for a type with a static descriptor.
    pub fn register_type_of<T: Describe>(&self) {
        self.register_type(T::DESCRIPTOR);
    }

    /// Removes a type from the catalog.
    pub fn unregister_type(&self, type_name: &str) -> Option<TypeDescriptor> {
        debug!(type_name, "unregistering type");
        self.update(|catalog| catalog.types.remove(type_name))
    }

    /// Makes a function resolvable by name.
    pub fn register_function(&self, name: impl Into<String>, func: NativeFn) {
        let name = name.into();
        debug!(function = %name, "registering function");
        self.update(|catalog| {
            catalog.functions.insert(name, func);
        });
    }

    /// Removes a function from the catalog.
    pub fn unregister_function(&self, name: &str) -> Option<NativeFn> {
        debug!(function = name, "unregistering function");
        self.update(|catalog| catalog.functions.remove(name))
    }
}

/// An immutable view of a [`Registry`], valid for one call.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot(Arc<Catalog>);

impl RegistrySnapshot {
    /// Handler for `type_name`, by exact name.
    pub fn lookup(&self, type_name: &str) -> Option<Arc<dyn Handler>> {
        self.0.handlers.get(type_name).cloned()
    }

    /// Type descriptor registered under `name`.
    pub fn resolve_type(&self, name: &str) -> Option<TypeDescriptor> {
        self.0.types.get(name).copied()
    }

    /// Function registered under `name`.
    pub fn resolve_function(&self, name: &str) -> Option<Callable> {
        self.0
            .functions
            .get(name)
            .map(|&func| Callable::named(name, func))
    }

    /// Resolves a `$typeref` name: types first, then functions.
    pub fn resolve_symbol(&self, name: &str) -> Result<Value> {
        if let Some(descriptor) = self.resolve_type(name) {
            return Ok(Value::Type(descriptor));
        }
        self.resolve_function(name)
            .map(Value::Function)
            .ok_or_else(|| PickleError::UnresolvableType(name.to_string()))
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.0.handlers.len()
    }
}
