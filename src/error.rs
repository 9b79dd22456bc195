//! Centralized error handling for graphpickle.
//!
//! Every failure the pickler, the unpickler, the registries or a backend can
//! produce is a variant of [`PickleError`]. Nothing in the library panics:
//! a call either returns a complete, structurally valid result or fails with
//! one of these variants, and no partial output escapes.
//!
//! ## Error Categories
//!
//! - **Encoding** ([`PickleError::UnresolvableSymbol`], [`PickleError::Unpicklable`],
//!   [`PickleError::UnbrokenCycle`], [`PickleError::DepthExceeded`]): the object
//!   graph contains something that cannot be written under the active options.
//! - **Decoding** ([`PickleError::UnresolvableType`], [`PickleError::DanglingReference`],
//!   [`PickleError::MalformedTree`], [`PickleError::TypeMismatch`],
//!   [`PickleError::UnknownField`]): the intermediate tree cannot be turned back
//!   into a graph.
//! - **Backend** ([`PickleError::MalformedText`], [`PickleError::UnencodableNode`],
//!   [`PickleError::UnknownBackend`]): the text codec rejected its input.
//! - **Environment** ([`PickleError::Io`], [`PickleError::Handler`]).
//!
//! ## Usage Patterns
//!
//! ```rust
//! use graphpickle::{JsonPickle, PickleError};
//!
//! match JsonPickle::decode(r#"[{"$ref": 7}]"#) {
//!     Err(PickleError::DanglingReference(index)) => assert_eq!(index, 7),
//!     other => panic!("unexpected result: {other:?}"),
//! }
//! ```

use std::io;
use std::sync::Arc;

/// A specialized `Result` type for graphpickle operations.
///
/// ```rust
/// fn answer() -> graphpickle::Result<i64> {
///     Ok(42)
/// }
/// # assert_eq!(answer().ok(), Some(42));
/// ```
pub type Result<T> = std::result::Result<T, PickleError>;

/// The master error enum covering all failure domains.
///
/// This type is `Clone` so that a handler or backend failure can be recorded
/// and re-raised. I/O errors are wrapped in `Arc` for that reason.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PickleError {
    /// A function or type could not be given a stable name while encoding
    /// (for example an anonymous closure).
    #[error("cannot derive a stable name for {0}")]
    UnresolvableSymbol(String),

    /// A `$type`, `$typeref` or `$reduce` name does not resolve to anything
    /// registered in the active registry.
    #[error("cannot resolve type or function `{0}`")]
    UnresolvableType(String),

    /// A `$ref` points at an index that was never defined, or that is still
    /// being constructed.
    ///
    /// Output of this crate's own pickler never triggers this; it signals
    /// malformed or foreign input.
    #[error("back-reference to undefined index {0}")]
    DanglingReference(usize),

    /// The configured `max_depth` ceiling was hit.
    #[error("maximum nesting depth of {0} exceeded")]
    DepthExceeded(usize),

    /// The backend could not parse its input text.
    #[error("malformed text: {0}")]
    MalformedText(String),

    /// The backend (or the pickler) could not represent a node.
    #[error("unencodable node: {0}")]
    UnencodableNode(String),

    /// A non-reconstructible value was found while `unpicklable_handling` is
    /// set to `Error`.
    #[error("value cannot be pickled: {0}")]
    Unpicklable(String),

    /// A cycle was found while reference tracking is disabled and
    /// placeholders are not allowed.
    #[error("cycle through {0} cannot be encoded without references")]
    UnbrokenCycle(String),

    /// A tagged record has the wrong shape (missing payload, wrong payload
    /// type, out-of-order `$id`).
    #[error("malformed tree: {0}")]
    MalformedTree(String),

    /// A restored value could not be converted into a field's Rust type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The kind the field accepts.
        expected: &'static str,
        /// The kind that was restored.
        found: &'static str,
    },

    /// A record carries a field the target type does not declare.
    #[error("type `{type_name}` has no field `{field}`")]
    UnknownField {
        /// Qualified name of the target type.
        type_name: String,
        /// Offending field name.
        field: String,
    },

    /// No backend is registered under this name.
    #[error("no backend named `{0}` is loaded")]
    UnknownBackend(String),

    /// A custom handler reported a failure of its own.
    #[error("handler failure: {0}")]
    Handler(String),

    /// Low-level I/O failure while saving or loading a file.
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),
}

impl From<io::Error> for PickleError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl PickleError {
    /// Shorthand for a [`PickleError::MalformedTree`] error.
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedTree(msg.into())
    }
}
