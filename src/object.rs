//! Defines the capability contract for custom types.
//!
//! The pickler never reflects over arbitrary memory. A custom type takes part
//! in pickling through exactly one of three capabilities:
//!
//! 1. a **field view**: [`PickleObject::fields`] enumerates named values and
//!    [`PickleObject::set_field`] assigns them back onto a freshly constructed
//!    instance (requires a constructor in the [`TypeDescriptor`]);
//! 2. a **reduction**: [`PickleObject::reduce`] returns a [`Reduction`] (a
//!    callable, its arguments and optional state);
//! 3. a **handler** registered for the type in the
//!    [`Registry`](crate::registry::Registry), which overrides both.
//!
//! `#[derive(PickleObject)]` implements the field view for plain structs.

use std::any::Any;
use std::fmt;

use crate::error::{PickleError, Result};
use crate::value::{Key, ObjectRef, Value};

/// Names a type and, optionally, knows how to allocate a blank instance.
///
/// Descriptors are `Copy` and can live in `const` items, which is how the
/// derive macro exposes them through [`Describe::DESCRIPTOR`].
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    name: &'static str,
    construct: Option<fn() -> ObjectRef>,
}

impl TypeDescriptor {
    /// A descriptor that can be referenced but not instantiated.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            construct: None,
        }
    }

    /// A descriptor with a no-argument constructor.
    pub const fn constructible(name: &'static str, construct: fn() -> ObjectRef) -> Self {
        Self {
            name,
            construct: Some(construct),
        }
    }

    /// The fully qualified name written to `$type`/`$typeref`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True if the type has a no-argument constructor.
    pub fn is_constructible(&self) -> bool {
        self.construct.is_some()
    }

    /// Allocates a blank instance.
    pub fn construct(&self) -> Option<ObjectRef> {
        self.construct.map(|f| f())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

/// Static access to a type's descriptor.
pub trait Describe {
    /// The descriptor for `Self`.
    const DESCRIPTOR: TypeDescriptor;
}

/// Upcasting helper for downcasts through `dyn PickleObject`.
pub trait AsAny: Any {
    /// `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Reconstruction recipe: call `callable(*args)`, then apply `state`,
/// append `list_items` and insert `dict_items`.
#[derive(Debug, Clone)]
pub struct Reduction {
    /// A [`Value::Type`] (constructed with no arguments) or a named
    /// [`Value::Function`].
    pub callable: Value,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// State applied after construction (see [`PickleObject::set_state`]).
    pub state: Option<Value>,
    /// Items appended to a list result.
    pub list_items: Option<Vec<Value>>,
    /// Entries inserted into a dict result.
    pub dict_items: Option<Vec<(Key, Value)>>,
}

impl Reduction {
    /// A reduction with no state.
    pub fn new(callable: impl Into<Value>, args: Vec<Value>) -> Self {
        Self {
            callable: callable.into(),
            args,
            state: None,
            list_items: None,
            dict_items: None,
        }
    }

    /// Sets the post-construction state.
    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the items appended after construction.
    pub fn with_list_items(mut self, items: Vec<Value>) -> Self {
        self.list_items = Some(items);
        self
    }

    /// Sets the entries inserted after construction.
    pub fn with_dict_items(mut self, items: Vec<(Key, Value)>) -> Self {
        self.dict_items = Some(items);
        self
    }
}

/// A custom type that can live in a [`Value`] graph.
pub trait PickleObject: AsAny {
    /// The type's descriptor.
    fn descriptor(&self) -> TypeDescriptor;

    /// Enumerates the object's named fields.
    fn fields(&self) -> Vec<(String, Value)> {
        Vec::new()
    }

    /// Assigns one field during restoration.
    fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        let _ = value;
        Err(PickleError::UnknownField {
            type_name: self.descriptor().name().to_string(),
            field: name.to_string(),
        })
    }

    /// Field names the pickler must skip.
    fn transient_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Reduction recipe, used in preference to the field view.
    fn reduce(&self) -> Option<Reduction> {
        None
    }

    /// Applies the `state` element of a reduction. The default treats a
    /// mapping of string keys as field assignments.
    fn set_state(&mut self, state: Value) -> Result<()> {
        let entries = match state {
            Value::Dict(entries) => entries,
            other => {
                return Err(PickleError::TypeMismatch {
                    expected: "dict",
                    found: other.kind_name(),
                });
            }
        };
        let entries: Vec<(Key, Value)> = entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in entries {
            let Key::Str(name) = key else {
                return Err(PickleError::malformed("state keys must be strings"));
            };
            self.set_field(&name, value)?;
        }
        Ok(())
    }

    /// Equality by the type's own definition. Defaults to never equal, so
    /// distinct objects compare by identity only.
    fn object_eq(&self, other: &dyn PickleObject) -> bool {
        let _ = other;
        false
    }

    /// Text used when the object has to be written as a placeholder.
    fn describe(&self) -> String {
        format!("<{} object>", self.descriptor().name())
    }
}
