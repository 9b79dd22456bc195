//! Reference tracker for the pickler and the unpickler.
//!
//! This module defines the bidirectional memo that preserves object identity
//! across a round-trip: [`FlattenMemo`] maps identities to indices while a
//! graph is walked, and [`RestoreMemo`] maps the same indices back to the
//! rebuilt objects.

/// Defines the [`FlattenMemo`].
pub mod flatten;
/// Defines the `ObjectId` type.
pub mod id;
/// Defines the [`RestoreMemo`].
pub mod restore;

pub use flatten::FlattenMemo;
pub use id::ObjectId;
pub use restore::RestoreMemo;
