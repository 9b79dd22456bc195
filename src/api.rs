//! The high-level entry points.
//!
//! [`JsonPickle`] encodes and decodes with the global registry and default
//! options. [`PickleBuilder`] carries an explicit registry, options and
//! backend, and is what the free functions and file helpers delegate to.
//! Loading maps the file into memory before parsing.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use tracing::debug;

use crate::backend::{Backend, BackendRegistry};
use crate::config::{PickleOptions, UnpicklableHandling};
use crate::error::{PickleError, Result};
use crate::inspector::{TreeInspector, TreeReport};
use crate::pickler::Pickler;
use crate::registry::Registry;
use crate::tags::Node;
use crate::unpickler::Unpickler;
use crate::value::Value;

/// The main entry point for encoding and decoding graphs.
///
/// The associated functions use default options, the global [`Registry`] and
/// the global [`BackendRegistry`]. Use [`JsonPickle::builder`] to change any
/// of them for a call.
#[derive(Debug)]
pub struct JsonPickle;

impl JsonPickle {
    /// Encodes a graph as text.
    pub fn encode(value: &Value) -> Result<String> {
        Self::builder().encode(value)
    }

    /// Decodes text into a graph.
    pub fn decode(text: &str) -> Result<Value> {
        Self::builder().decode(text)
    }

    /// Encodes a graph and writes it to `path`.
    pub fn save<P: AsRef<Path>>(path: P, value: &Value) -> Result<()> {
        Self::builder().save(path, value)
    }

    /// Reads and decodes the file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Value> {
        Self::builder().load(path)
    }

    /// Decodes text and reports its structure without restoring it.
    pub fn inspect(text: &str) -> Result<TreeReport> {
        Self::builder().inspect(text)
    }

    /// Starts a configurable call.
    pub fn builder() -> PickleBuilder<'static> {
        PickleBuilder {
            options: PickleOptions::default(),
            registry: Registry::global(),
            backend: None,
        }
    }
}

/// Per-call configuration: options, registry and backend.
///
/// ```rust
/// use graphpickle::{JsonBackend, JsonPickle, Registry, Value};
///
/// let registry = Registry::new();
/// let text = JsonPickle::builder()
///     .registry(&registry)
///     .backend(JsonBackend::pretty(2))
///     .max_depth(8)
///     .encode(&Value::tuple(vec![Value::from(1), Value::from(2)]))?;
/// assert!(text.starts_with("{\n  \"$tuple\""));
/// # Ok::<(), graphpickle::PickleError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PickleBuilder<'r> {
    options: PickleOptions,
    registry: &'r Registry,
    backend: Option<Arc<dyn Backend>>,
}

impl<'r> PickleBuilder<'r> {
    /// Replaces all options.
    pub fn options(mut self, options: PickleOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets `keep_references`.
    pub fn keep_references(mut self, keep: bool) -> Self {
        self.options.keep_references = keep;
        self
    }

    /// Sets `max_depth`.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.options.max_depth = Some(depth);
        self
    }

    /// Sets `unpicklable_handling`.
    pub fn unpicklable_handling(mut self, handling: UnpicklableHandling) -> Self {
        self.options.unpicklable_handling = handling;
        self
    }

    /// Sets `unpicklable`.
    pub fn unpicklable(mut self, unpicklable: bool) -> Self {
        self.options.unpicklable = unpicklable;
        self
    }

    /// Uses `registry` instead of the global one.
    pub fn registry<'a>(self, registry: &'a Registry) -> PickleBuilder<'a> {
        PickleBuilder {
            options: self.options,
            registry,
            backend: self.backend,
        }
    }

    /// Uses `backend` instead of the global backend registry.
    pub fn backend<B: Backend + 'static>(mut self, backend: B) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    fn text_backend(&self) -> &dyn Backend {
        match &self.backend {
            Some(backend) => backend.as_ref(),
            None => BackendRegistry::global(),
        }
    }

    /// Flattens a graph into an intermediate tree.
    pub fn flatten(&self, value: &Value) -> Result<Node> {
        Pickler::new(self.registry, self.options.clone()).flatten(value)
    }

    /// Restores a graph from an intermediate tree.
    pub fn restore(&self, node: &Node) -> Result<Value> {
        Unpickler::new(self.registry, self.options.clone()).restore(node)
    }

    /// Encodes a graph as text.
    pub fn encode(&self, value: &Value) -> Result<String> {
        let node = self.flatten(value)?;
        self.text_backend().encode(&node)
    }

    /// Decodes text into a graph.
    pub fn decode(&self, text: &str) -> Result<Value> {
        let node = self.text_backend().decode(text)?;
        self.restore(&node)
    }

    /// Decodes text and reports its structure.
    pub fn inspect(&self, text: &str) -> Result<TreeReport> {
        let node = self.text_backend().decode(text)?;
        Ok(TreeInspector::inspect(&node))
    }

    /// Encodes a graph and writes it to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P, value: &Value) -> Result<()> {
        let path = path.as_ref();
        let text = self.encode(value)?;

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(text.as_bytes())?;
        writer.flush()?;
        debug!(path = %path.display(), bytes = text.len(), "saved graph");
        Ok(())
    }

    /// Reads and decodes the file at `path`.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Value> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(PickleError::MalformedText(format!("{} is empty", path.display())));
        }

        // Safety: the map is read-only and dropped before returning. A file
        // truncated by another process while mapped is not supported.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        let text = std::str::from_utf8(&mmap).map_err(|e| PickleError::MalformedText(e.to_string()))?;
        debug!(path = %path.display(), bytes = text.len(), "loading graph");
        self.decode(text)
    }
}
