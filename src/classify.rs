//! Type Classifier.
//!
//! Maps every [`Value`] onto one of a closed set of structural kinds. The
//! pickler switches over [`Kind`] exhaustively; nothing downstream inspects
//! variants or type names on its own.

use crate::object::PickleObject;
use crate::value::Value;

/// Structural kind of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// `null`, booleans, numbers, strings.
    Primitive,
    /// Ordered mutable sequence.
    Sequence,
    /// Fixed-arity immutable sequence.
    TupleLike,
    /// Unordered unique collection.
    SetLike,
    /// Key-value mapping.
    Mapping,
    /// A function value.
    FunctionLike,
    /// A reference to a type itself.
    TypeReference,
    /// A custom object offering a field view or a reduction.
    CustomObject,
    /// Anything with no generic rebuild strategy.
    NonReconstructible,
}

/// How a custom object can be rebuilt without a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The object provides a [`Reduction`](crate::object::Reduction).
    Reduce,
    /// The object provides a field view and a constructor.
    Fields,
    /// Neither.
    None,
}

/// Classifies `value`. Total and side-effect-free.
pub fn classify(value: &Value) -> Kind {
    match value {
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => Kind::Primitive,
        Value::List(_) => Kind::Sequence,
        Value::Tuple(_) => Kind::TupleLike,
        Value::Set(_) => Kind::SetLike,
        Value::Dict(_) => Kind::Mapping,
        Value::Function(_) => Kind::FunctionLike,
        Value::Type(_) => Kind::TypeReference,
        Value::Object(object) => match object_capability(&*object.borrow()) {
            Capability::Reduce | Capability::Fields => Kind::CustomObject,
            Capability::None => Kind::NonReconstructible,
        },
        Value::Opaque(_) => Kind::NonReconstructible,
    }
}

/// Reports which default capability `object` offers.
pub fn object_capability(object: &dyn PickleObject) -> Capability {
    if object.reduce().is_some() {
        Capability::Reduce
    } else if object.descriptor().is_constructible() {
        Capability::Fields
    } else {
        Capability::None
    }
}

/// True for JSON primitives.
pub fn is_primitive(value: &Value) -> bool {
    classify(value) == Kind::Primitive
}

/// True for lists, tuples and sets.
pub fn is_sequence(value: &Value) -> bool {
    matches!(classify(value), Kind::Sequence | Kind::TupleLike | Kind::SetLike)
}

/// True for mappings.
pub fn is_mapping(value: &Value) -> bool {
    classify(value) == Kind::Mapping
}

/// True for functions.
pub fn is_function(value: &Value) -> bool {
    classify(value) == Kind::FunctionLike
}

/// True for type references.
pub fn is_type(value: &Value) -> bool {
    classify(value) == Kind::TypeReference
}

/// True for objects, whether or not they can be rebuilt.
pub fn is_object(value: &Value) -> bool {
    matches!(value, Value::Object(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Reduction, TypeDescriptor};
    use crate::value::{Callable, ObjectRef};

    #[derive(Debug, Default)]
    struct Plain;

    impl PickleObject for Plain {
        fn descriptor(&self) -> TypeDescriptor {
            TypeDescriptor::constructible("classify::Plain", || ObjectRef::object(Plain))
        }
    }

    #[derive(Debug)]
    struct Socket;

    impl PickleObject for Socket {
        fn descriptor(&self) -> TypeDescriptor {
            TypeDescriptor::new("classify::Socket")
        }
    }

    #[derive(Debug)]
    struct Reduced;

    impl PickleObject for Reduced {
        fn descriptor(&self) -> TypeDescriptor {
            TypeDescriptor::new("classify::Reduced")
        }

        fn reduce(&self) -> Option<Reduction> {
            Some(Reduction::new(TypeDescriptor::new("classify::Reduced"), Vec::new()))
        }
    }

    #[test]
    fn primitives() {
        for value in [Value::Null, Value::from(3), Value::from(0.5), Value::from(true), Value::from("")] {
            assert!(is_primitive(&value), "{value:?}");
        }
        assert!(!is_primitive(&Value::list(vec![])));
        assert!(!is_primitive(&Value::tuple(vec![Value::from(1)])));
    }

    #[test]
    fn containers() {
        assert_eq!(classify(&Value::tuple(vec![])), Kind::TupleLike);
        assert_eq!(classify(&Value::set([1_i64, 3])), Kind::SetLike);
        assert!(is_sequence(&Value::set(Vec::<i64>::new())));
        assert!(is_mapping(&Value::dict([("key", Value::from("value"))])));
        assert!(!is_mapping(&Value::list(vec![])));
    }

    #[test]
    fn callables_and_types() {
        let f = Value::from(Callable::anonymous(|_| Ok(Value::Null)));
        assert!(is_function(&f));
        assert!(is_type(&Value::from(TypeDescriptor::new("x::Y"))));
        assert!(!is_function(&Value::object(Plain)));
    }

    #[test]
    fn objects_by_capability() {
        assert_eq!(classify(&Value::object(Plain)), Kind::CustomObject);
        assert_eq!(classify(&Value::object(Reduced)), Kind::CustomObject);
        assert_eq!(classify(&Value::object(Socket)), Kind::NonReconstructible);
        assert_eq!(classify(&Value::opaque(7_u32)), Kind::NonReconstructible);
        assert!(is_object(&Value::object(Socket)));
    }
}
