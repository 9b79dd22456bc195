//! The dynamic object graph.
//!
//! A [`Value`] is either an immutable leaf (primitives, tuples, type and
//! function references, opaque resources) or a handle to a shared, mutable
//! cell ([`Shared`]). Cloning a `Value` aliases its shared parts, so the same
//! list, dict, set or object can be reachable from several places, including
//! from inside itself.
//!
//! ```rust
//! use graphpickle::Value;
//!
//! let inner = Value::list(vec![Value::from(1), Value::from(2)]);
//! let outer = Value::list(vec![inner.clone(), inner.clone()]);
//!
//! let items = outer.as_list().map(|l| l.borrow().clone()).unwrap_or_default();
//! assert!(items[0].same_as(&items[1]));
//! ```

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::error::Result;
use crate::object::{PickleObject, TypeDescriptor};

/// Insertion-ordered mapping payload.
pub type Dict = IndexMap<Key, Value>;
/// Insertion-ordered set payload.
pub type KeySet = IndexSet<Key>;

/// Shared list handle.
pub type ListRef = Shared<Vec<Value>>;
/// Shared mapping handle.
pub type DictRef = Shared<Dict>;
/// Shared set handle.
pub type SetRef = Shared<KeySet>;
/// Shared custom-object handle.
pub type ObjectRef = Shared<dyn PickleObject>;

/// Signature of a function that can be registered by name and referenced
/// from the intermediate tree.
pub type NativeFn = fn(&[Value]) -> Result<Value>;

/// A hashable mapping key or set element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// The `null` key.
    Null,
    /// A boolean key.
    Bool(bool),
    /// An integer key.
    Int(i64),
    /// A string key.
    Str(String),
}

impl Key {
    /// Converts a value into a key, if it is a hashable primitive.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Int(n) => Some(Self::Int(*n)),
            Value::Str(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    /// Returns the key as a primitive value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::Int(*n),
            Self::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A shared, mutable, identity-bearing cell.
///
/// Two `Shared` handles are the *same object* when they point at the same
/// allocation; [`Shared::identity`] exposes that allocation address and is
/// what the reference tracker memoizes.
pub struct Shared<T: ?Sized>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    /// Allocates a new cell.
    pub fn new(inner: T) -> Self {
        Self(Rc::new(RefCell::new(inner)))
    }
}

impl<T: ?Sized> Shared<T> {
    /// Immutably borrows the contents.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// Mutably borrows the contents.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Physical identity of the underlying allocation.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }

    /// Returns true if both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Shared<dyn PickleObject> {
    /// Moves a custom object into a new shared cell.
    pub fn object<T: PickleObject>(object: T) -> Self {
        let cell: Rc<RefCell<dyn PickleObject>> = Rc::new(RefCell::new(object));
        Self(cell)
    }

    /// Qualified name of the object's type.
    pub fn type_name(&self) -> &'static str {
        self.borrow().descriptor().name()
    }

    /// Borrows the object as its concrete type.
    pub fn downcast_ref<T: PickleObject>(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.borrow(), |o| o.as_any().downcast_ref::<T>()).ok()
    }

    /// Mutably borrows the object as its concrete type.
    pub fn downcast_mut<T: PickleObject>(&self) -> Option<RefMut<'_, T>> {
        RefMut::filter_map(self.borrow_mut(), |o| o.as_any_mut().downcast_mut::<T>()).ok()
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

// Contents are deliberately not printed: the graph may be cyclic.
impl<T: ?Sized> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared({:#x})", self.identity())
    }
}

/// A function value, either resolvable by name or anonymous.
#[derive(Clone)]
pub struct Callable {
    name: Option<String>,
    func: Rc<dyn Fn(&[Value]) -> Result<Value>>,
}

impl Callable {
    /// A function that can be referenced by `name` once registered.
    pub fn named(name: impl Into<String>, func: NativeFn) -> Self {
        Self {
            name: Some(name.into()),
            func: Rc::new(func),
        }
    }

    /// An anonymous function (closure). It has no stable name and cannot be
    /// pickled as a reference.
    pub fn anonymous(func: impl Fn(&[Value]) -> Result<Value> + 'static) -> Self {
        Self {
            name: None,
            func: Rc::new(func),
        }
    }

    /// The stable name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Invokes the function.
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (&self.name, &other.name) {
            (Some(a), Some(b)) => a == b,
            _ => Rc::as_ptr(&self.func).cast::<()>() == Rc::as_ptr(&other.func).cast::<()>(),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Callable({name})"),
            None => f.write_str("Callable(<anonymous>)"),
        }
    }
}

/// A value with no generic rebuild strategy: an open resource, a foreign
/// handle, or the placeholder restored from a `$repr` record.
#[derive(Clone)]
pub struct Opaque(Rc<OpaqueInner>);

struct OpaqueInner {
    description: String,
    resource: Option<Box<dyn Any>>,
}

impl Opaque {
    /// Wraps a live resource; its `Debug` output becomes the description.
    pub fn new<T: Any + fmt::Debug>(resource: T) -> Self {
        Self(Rc::new(OpaqueInner {
            description: format!("{resource:?}"),
            resource: Some(Box::new(resource)),
        }))
    }

    /// A description-only placeholder.
    pub fn placeholder(description: impl Into<String>) -> Self {
        Self(Rc::new(OpaqueInner {
            description: description.into(),
            resource: None,
        }))
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.0.description
    }

    /// True for placeholders restored from text.
    pub fn is_placeholder(&self) -> bool {
        self.0.resource.is_none()
    }

    /// Borrows the wrapped resource.
    pub fn resource<T: Any>(&self) -> Option<&T> {
        self.0.resource.as_ref().and_then(|r| r.downcast_ref::<T>())
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
            || (self.is_placeholder() && other.is_placeholder() && self.description() == other.description())
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.description())
    }
}

/// Any object reachable from a graph root.
#[derive(Debug, Clone)]
pub enum Value {
    /// `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// A string.
    Str(String),
    /// An ordered, mutable sequence.
    List(ListRef),
    /// An insertion-ordered, mutable mapping.
    Dict(DictRef),
    /// An insertion-ordered, mutable set.
    Set(SetRef),
    /// An immutable fixed-arity sequence.
    Tuple(Rc<[Value]>),
    /// A custom object.
    Object(ObjectRef),
    /// A reference to a type itself.
    Type(TypeDescriptor),
    /// A function.
    Function(Callable),
    /// A non-reconstructible value.
    Opaque(Opaque),
}

impl Value {
    /// Builds a new shared list.
    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Shared::new(items))
    }

    /// Builds a new shared mapping.
    pub fn dict<K: Into<Key>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Dict(Shared::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()))
    }

    /// Builds a new shared set.
    pub fn set<K: Into<Key>>(items: impl IntoIterator<Item = K>) -> Self {
        Self::Set(Shared::new(items.into_iter().map(Into::into).collect()))
    }

    /// Builds a tuple.
    pub fn tuple(items: Vec<Value>) -> Self {
        Self::Tuple(items.into())
    }

    /// Moves a custom object into the graph.
    pub fn object<T: PickleObject>(object: T) -> Self {
        Self::Object(Shared::object(object))
    }

    /// Wraps a non-reconstructible resource.
    pub fn opaque<T: Any + fmt::Debug>(resource: T) -> Self {
        Self::Opaque(Opaque::new(resource))
    }

    /// Short name of the value's variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Set(_) => "set",
            Self::Tuple(_) => "tuple",
            Self::Object(_) => "object",
            Self::Type(_) => "type",
            Self::Function(_) => "function",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Physical identity for the shared variants; `None` for everything that
    /// is never memoized.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Self::List(l) => Some(l.identity()),
            Self::Dict(d) => Some(d.identity()),
            Self::Set(s) => Some(s.identity()),
            Self::Object(o) => Some(o.identity()),
            _ => None,
        }
    }

    /// Returns true if both values are the same shared object.
    pub fn same_as(&self, other: &Value) -> bool {
        matches!((self.identity(), other.identity()), (Some(a), Some(b)) if a == b)
    }

    /// Human-readable description, used for `$repr` placeholders.
    pub fn describe(&self) -> String {
        match self {
            Self::Object(o) => o.borrow().describe(),
            Self::Type(t) => format!("<type {}>", t.name()),
            Self::Function(f) => match f.name() {
                Some(name) => format!("<function {name}>"),
                None => "<anonymous function>".to_string(),
            },
            Self::Opaque(o) => o.description().to_string(),
            Self::Float(x) => format!("{x}"),
            other => format!("<{}>", other.kind_name()),
        }
    }

    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The float payload.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// The string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The list handle.
    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// The mapping handle.
    pub fn as_dict(&self) -> Option<&DictRef> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// The set handle.
    pub fn as_set(&self) -> Option<&SetRef> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    /// The tuple elements.
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Self::Tuple(t) => Some(t),
            _ => None,
        }
    }

    /// The object handle.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Looks up `key` if this value is a mapping.
    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        self.as_dict().and_then(|d| d.borrow().get(&key.into()).cloned())
    }
}

/// Structural equality. Shared values that are the same object are equal
/// without being inspected; otherwise their contents are compared, which does
/// not terminate on cyclic graphs. Objects compare through
/// [`PickleObject::object_eq`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Self::Dict(a), Self::Dict(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Self::Set(a), Self::Set(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b) || a.borrow().object_eq(&*b.borrow()),
            (Self::Type(a), Self::Type(b)) => a.name() == b.name(),
            (Self::Function(a), Self::Function(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        key.to_value()
    }
}

impl From<TypeDescriptor> for Value {
    fn from(descriptor: TypeDescriptor) -> Self {
        Self::Type(descriptor)
    }
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Self {
        Self::Function(callable)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Self::Object(object)
    }
}
