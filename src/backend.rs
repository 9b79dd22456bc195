//! Pluggable text codecs.
//!
//! A [`Backend`] turns an intermediate tree into text and back. Backends are
//! pure: they never see the object graph, only [`Node`]s.
//!
//! [`BackendRegistry`] keeps several backends in preference order. Encoding
//! and decoding try each one in turn and fall back to the next on failure,
//! so a document written by any loaded backend can be read back.

use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{debug, warn};

use crate::error::{PickleError, Result};
use crate::tags::Node;

/// Interface for text codecs.
pub trait Backend: Send + Sync + fmt::Debug {
    /// Unique name used by [`BackendRegistry`].
    fn name(&self) -> &str;

    /// Writes a tree as text.
    fn encode(&self, node: &Node) -> Result<String>;

    /// Parses text into a tree.
    fn decode(&self, text: &str) -> Result<Node>;
}

/// JSON through `serde_json`.
///
/// Object keys are written in insertion order. Memo indices follow document
/// order, so a backend must never reorder keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonBackend {
    indent: Option<usize>,
}

impl JsonBackend {
    /// Compact output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty-printed output indented by `indent` spaces.
    pub fn pretty(indent: usize) -> Self {
        Self { indent: Some(indent) }
    }
}

impl Backend for JsonBackend {
    fn name(&self) -> &str {
        "json"
    }

    fn encode(&self, node: &Node) -> Result<String> {
        let Some(width) = self.indent else {
            return serde_json::to_string(node).map_err(|e| PickleError::UnencodableNode(e.to_string()));
        };
        let indent = vec![b' '; width];
        let mut buffer = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(&indent));
        node.serialize(&mut serializer)
            .map_err(|e| PickleError::UnencodableNode(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| PickleError::UnencodableNode(e.to_string()))
    }

    fn decode(&self, text: &str) -> Result<Node> {
        serde_json::from_str(text).map_err(|e| PickleError::MalformedText(e.to_string()))
    }
}

/// YAML through `serde_yaml`.
#[cfg(feature = "yaml")]
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlBackend;

#[cfg(feature = "yaml")]
impl Backend for YamlBackend {
    fn name(&self) -> &str {
        "yaml"
    }

    fn encode(&self, node: &Node) -> Result<String> {
        serde_yaml::to_string(node).map_err(|e| PickleError::UnencodableNode(e.to_string()))
    }

    fn decode(&self, text: &str) -> Result<Node> {
        serde_yaml::from_str(text).map_err(|e| PickleError::MalformedText(e.to_string()))
    }
}

/// Backends in preference order.
#[derive(Debug)]
pub struct BackendRegistry {
    backends: RwLock<Vec<Arc<dyn Backend>>>,
}

static GLOBAL: LazyLock<BackendRegistry> = LazyLock::new(BackendRegistry::new);

impl BackendRegistry {
    /// A registry holding only [`JsonBackend`].
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.load_backend(JsonBackend::new());
        registry
    }

    /// A registry with no backends.
    pub fn empty() -> Self {
        Self {
            backends: RwLock::new(Vec::new()),
        }
    }

    /// The process-wide default.
    pub fn global() -> &'static BackendRegistry {
        &GLOBAL
    }

    fn snapshot(&self) -> Vec<Arc<dyn Backend>> {
        self.backends.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Loads a backend. A backend with the same name is replaced in place;
    /// a new one goes last in preference order.
    pub fn load_backend<B: Backend + 'static>(&self, backend: B) {
        let backend: Arc<dyn Backend> = Arc::new(backend);
        debug!(backend = backend.name(), "loading backend");
        let mut backends = self.backends.write().unwrap_or_else(PoisonError::into_inner);
        match backends.iter_mut().find(|b| b.name() == backend.name()) {
            Some(slot) => *slot = backend,
            None => backends.push(backend),
        }
    }

    /// Unloads a backend by name.
    pub fn remove_backend(&self, name: &str) -> Option<Arc<dyn Backend>> {
        let mut backends = self.backends.write().unwrap_or_else(PoisonError::into_inner);
        let position = backends.iter().position(|b| b.name() == name)?;
        debug!(backend = name, "removing backend");
        Some(backends.remove(position))
    }

    /// Moves a loaded backend to the front of the preference order.
    pub fn set_preferred_backend(&self, name: &str) -> Result<()> {
        let mut backends = self.backends.write().unwrap_or_else(PoisonError::into_inner);
        let position = backends
            .iter()
            .position(|b| b.name() == name)
            .ok_or_else(|| PickleError::UnknownBackend(name.to_string()))?;
        let preferred = backends.remove(position);
        backends.insert(0, preferred);
        debug!(backend = name, "preferred backend set");
        Ok(())
    }

    /// Names of the loaded backends, preferred first.
    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|b| b.name().to_string()).collect()
    }

    fn attempt<T>(&self, operation: &str, run: impl Fn(&dyn Backend) -> Result<T>) -> Result<T> {
        let mut last_error = None;
        for backend in self.snapshot() {
            match run(backend.as_ref()) {
                Ok(output) => return Ok(output),
                Err(error) => {
                    warn!(backend = backend.name(), operation, %error, "backend failed, trying the next one");
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| PickleError::UnknownBackend("(none loaded)".to_string())))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for BackendRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    fn encode(&self, node: &Node) -> Result<String> {
        self.attempt("encode", |backend| backend.encode(node))
    }

    fn decode(&self, text: &str) -> Result<Node> {
        self.attempt("decode", |backend| backend.decode(text))
    }
}
