//! Options for a single encode or decode call.
//!
//! Options are plain data. They can be built in code with the `with_*`
//! setters or loaded from a JSON document; missing keys take their defaults.
//!
//! ```rust
//! use graphpickle::{PickleOptions, UnpicklableHandling};
//!
//! let options = PickleOptions::from_json(r#"{ "max_depth": 32, "unpicklable_handling": "placeholder" }"#)?;
//! assert_eq!(options.max_depth, Some(32));
//! assert!(options.keep_references);
//! assert_eq!(options.unpicklable_handling, UnpicklableHandling::Placeholder);
//! # Ok::<(), graphpickle::PickleError>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{PickleError, Result};

/// What the pickler does with a value it has no rebuild strategy for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnpicklableHandling {
    /// Fail the call.
    #[default]
    Error,
    /// Emit a `$repr` record carrying a description.
    Placeholder,
}

/// Per-call options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickleOptions {
    /// Emit `$ref` back-references for revisited objects. When false, shared
    /// objects are duplicated and cycles cannot be encoded.
    pub keep_references: bool,
    /// Maximum nesting depth, counted in containers and records.
    pub max_depth: Option<usize>,
    /// Handling of non-reconstructible values, anonymous functions and, with
    /// references off, cycles.
    pub unpicklable_handling: UnpicklableHandling,
    /// Emit tagged records. When false the output is plain JSON that cannot
    /// be restored to the original types.
    pub unpicklable: bool,
}

impl Default for PickleOptions {
    fn default() -> Self {
        Self {
            keep_references: true,
            max_depth: None,
            unpicklable_handling: UnpicklableHandling::Error,
            unpicklable: true,
        }
    }
}

impl PickleOptions {
    /// Parses options from a JSON object.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| PickleError::MalformedText(e.to_string()))
    }

    /// Sets `keep_references`.
    pub fn with_keep_references(mut self, keep: bool) -> Self {
        self.keep_references = keep;
        self
    }

    /// Sets `max_depth`.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sets `unpicklable_handling`.
    pub fn with_unpicklable_handling(mut self, handling: UnpicklableHandling) -> Self {
        self.unpicklable_handling = handling;
        self
    }

    /// Sets `unpicklable`.
    pub fn with_unpicklable(mut self, unpicklable: bool) -> Self {
        self.unpicklable = unpicklable;
        self
    }

    /// True if `$id`/`$ref` records are in effect. Plain output never carries
    /// references.
    pub fn tracks_references(&self) -> bool {
        self.keep_references && self.unpicklable
    }

    /// True if placeholders replace values that cannot be encoded.
    pub fn uses_placeholders(&self) -> bool {
        self.unpicklable_handling == UnpicklableHandling::Placeholder
    }
}
