#![allow(missing_docs)]

use graphpickle::{
    Callable, Describe, JsonPickle, Key, ListRef, PickleError, PickleObject, Reduction, Registry, TypeDescriptor,
    Value,
};

#[derive(Debug, Default, PartialEq, PickleObject)]
#[pickle(name = "tests::Player", eq)]
struct Player {
    name: String,
    level: u32,
    #[pickle(rename = "$score")]
    score: f64,
    #[pickle(transient)]
    session: Option<String>,
    badges: Vec<String>,
}

fn player() -> Player {
    Player {
        name: "ada".into(),
        level: 7,
        score: 12.5,
        session: Some("secret".into()),
        badges: vec!["first".into(), "fast".into()],
    }
}

fn registry() -> Registry {
    let registry = Registry::new();
    registry.register_type_of::<Player>();
    registry
}

// --- DERIVED FIELD VIEW ---

#[test]
fn test_derive_round_trip() -> graphpickle::Result<()> {
    let registry = registry();
    let pickle = JsonPickle::builder().registry(&registry);

    let text = pickle.encode(&Value::object(player()))?;
    assert_eq!(
        text,
        r#"{"$type":"tests::Player","$id":0,"name":"ada","level":7,"$$score":12.5,"badges":["first","fast"]}"#
    );

    let restored = pickle.decode(&text)?;
    let expected = Player {
        session: None,
        ..player()
    };
    assert_eq!(restored, Value::object(expected));
    Ok(())
}

#[test]
fn test_transient_fields_are_omitted() {
    assert_eq!(player().transient_fields(), &["session"]);
    let names: Vec<String> = player().fields().into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, ["name", "level", "$score", "badges"]);
}

#[test]
fn test_descriptor_is_constructible() {
    assert_eq!(Player::DESCRIPTOR.name(), "tests::Player");
    assert!(Player::DESCRIPTOR.is_constructible());
    let blank = Player::DESCRIPTOR.construct();
    let is_default = blank
        .as_ref()
        .and_then(|o| o.downcast_ref::<Player>().map(|p| *p == Player::default()));
    assert_eq!(is_default, Some(true));
}

#[derive(Debug, Default, PickleObject)]
struct Untitled {
    value: i64,
}

#[test]
fn test_default_type_name_uses_module_path() {
    assert!(Untitled::DESCRIPTOR.name().ends_with("::Untitled"));
    assert!(Untitled::DESCRIPTOR.name().starts_with("object_test"));
}

#[test]
fn test_unregistered_type_fails() -> graphpickle::Result<()> {
    let registry = Registry::new();
    let pickle = JsonPickle::builder().registry(&registry);
    let text = pickle.encode(&Value::object(player()))?;
    assert!(matches!(
        pickle.decode(&text),
        Err(PickleError::UnresolvableType(name)) if name == "tests::Player"
    ));
    Ok(())
}

#[test]
fn test_unknown_and_mistyped_fields() {
    let registry = registry();
    let pickle = JsonPickle::builder().registry(&registry);

    assert!(matches!(
        pickle.decode(r#"{"$type":"tests::Player","color":"red"}"#),
        Err(PickleError::UnknownField { field, .. }) if field == "color"
    ));
    assert!(matches!(
        pickle.decode(r#"{"$type":"tests::Player","level":-1}"#),
        Err(PickleError::TypeMismatch { expected: "u32", .. })
    ));
}

#[test]
fn test_shared_list_field() -> graphpickle::Result<()> {
    #[derive(Debug, Default, PickleObject)]
    #[pickle(name = "tests::Team")]
    struct Team {
        members: Option<ListRef>,
        captains: Option<ListRef>,
    }

    let registry = Registry::new();
    registry.register_type_of::<Team>();
    let roster = ListRef::new(vec![Value::from("ada"), Value::from("bob")]);
    let team = Value::object(Team {
        members: Some(roster.clone()),
        captains: Some(roster),
    });

    let pickle = JsonPickle::builder().registry(&registry);
    let text = pickle.encode(&team)?;
    assert!(text.ends_with(r#""captains":{"$ref":1}}"#));

    let restored = pickle.decode(&text)?;
    let team = restored.as_object().and_then(|o| {
        o.downcast_ref::<Team>()
            .map(|t| (t.members.clone(), t.captains.clone()))
    });
    assert!(matches!(team, Some((Some(a), Some(b))) if a.ptr_eq(&b)));
    Ok(())
}

// --- REDUCTIONS ---

#[derive(Debug, PartialEq)]
struct Point {
    x: i64,
    y: i64,
}

fn make_point(args: &[Value]) -> graphpickle::Result<Value> {
    match args {
        [Value::Int(x), Value::Int(y)] => Ok(Value::object(Point { x: *x, y: *y })),
        _ => Err(PickleError::Handler("make_point expects two integers".into())),
    }
}

impl PickleObject for Point {
    fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::new("tests::Point")
    }

    fn reduce(&self) -> Option<Reduction> {
        Some(Reduction::new(
            Callable::named("tests::make_point", make_point),
            vec![Value::from(self.x), Value::from(self.y)],
        ))
    }

    fn object_eq(&self, other: &dyn PickleObject) -> bool {
        graphpickle::AsAny::as_any(other).downcast_ref::<Self>() == Some(self)
    }
}

#[test]
fn test_reduction_with_arguments() -> graphpickle::Result<()> {
    let registry = Registry::new();
    registry.register_function("tests::make_point", make_point);
    let pickle = JsonPickle::builder().registry(&registry);

    let point = Value::object(Point { x: 3, y: -4 });
    let root = Value::list(vec![point.clone(), point]);
    let text = pickle.encode(&root)?;
    assert_eq!(
        text,
        r#"[{"$reduce":[{"$typeref":"tests::make_point"},[3,-4]],"$id":1},{"$ref":1}]"#
    );

    let restored = pickle.decode(&text)?;
    let items = restored.as_list().map(|l| l.borrow().clone()).unwrap_or_default();
    assert_eq!(items[0], Value::object(Point { x: 3, y: -4 }));
    assert!(items[0].same_as(&items[1]));
    Ok(())
}

#[test]
fn test_reduction_depth_matches_on_both_sides() -> graphpickle::Result<()> {
    let registry = Registry::new();
    registry.register_function("tests::make_point", make_point);
    let pickle = JsonPickle::builder().registry(&registry).max_depth(1);

    let point = Value::object(Point { x: 1, y: 2 });
    let text = pickle.encode(&point)?;
    assert_eq!(pickle.decode(&text)?, point);

    let nested = Value::list(vec![point]);
    assert!(matches!(pickle.encode(&nested), Err(PickleError::DepthExceeded(1))));
    assert!(matches!(
        pickle.decode(r#"[{"$reduce":[{"$typeref":"tests::make_point"},[1,2]],"$id":1}]"#),
        Err(PickleError::DepthExceeded(1))
    ));
    Ok(())
}

#[derive(Debug, Default)]
struct Counter {
    hits: i64,
    label: String,
}

fn new_counter() -> graphpickle::ObjectRef {
    graphpickle::ObjectRef::object(Counter::default())
}

const COUNTER: TypeDescriptor = TypeDescriptor::constructible("tests::Counter", new_counter);

impl PickleObject for Counter {
    fn descriptor(&self) -> TypeDescriptor {
        COUNTER
    }

    fn set_field(&mut self, name: &str, value: Value) -> graphpickle::Result<()> {
        match (name, value) {
            ("hits", Value::Int(hits)) => self.hits = hits,
            ("label", Value::Str(label)) => self.label = label,
            (other, _) => {
                return Err(PickleError::UnknownField {
                    type_name: COUNTER.name().into(),
                    field: other.into(),
                });
            }
        }
        Ok(())
    }

    fn reduce(&self) -> Option<Reduction> {
        let state = Value::dict([("hits", Value::from(self.hits)), ("label", Value::from(self.label.as_str()))]);
        Some(Reduction::new(COUNTER, Vec::new()).with_state(state))
    }
}

#[test]
fn test_reduction_with_state() -> graphpickle::Result<()> {
    let registry = Registry::new();
    registry.register_type(COUNTER);
    let pickle = JsonPickle::builder().registry(&registry);

    let text = pickle.encode(&Value::object(Counter {
        hits: 9,
        label: "clicks".into(),
    }))?;
    assert_eq!(
        text,
        r#"{"$reduce":[{"$typeref":"tests::Counter"},[],{"hits":9,"label":"clicks"}],"$id":0}"#
    );

    let restored = pickle.decode(&text)?;
    let counter = restored
        .as_object()
        .and_then(|o| o.downcast_ref::<Counter>().map(|c| (c.hits, c.label.clone())));
    assert_eq!(counter, Some((9, "clicks".to_string())));
    Ok(())
}

#[derive(Debug)]
struct Bag {
    items: Vec<i64>,
    index: Vec<(String, i64)>,
}

fn empty_list(_: &[Value]) -> graphpickle::Result<Value> {
    Ok(Value::list(Vec::new()))
}

fn empty_dict(_: &[Value]) -> graphpickle::Result<Value> {
    Ok(Value::dict(Vec::<(Key, Value)>::new()))
}

impl PickleObject for Bag {
    fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::new("tests::Bag")
    }

    fn reduce(&self) -> Option<Reduction> {
        if self.index.is_empty() {
            let items = self.items.iter().map(|&n| Value::from(n)).collect();
            let reduction = Reduction::new(Callable::named("tests::empty_list", empty_list), Vec::new());
            return Some(reduction.with_list_items(items));
        }
        let entries = self.index.iter().map(|(k, v)| (Key::from(k.as_str()), Value::from(*v))).collect();
        Some(Reduction::new(Callable::named("tests::empty_dict", empty_dict), Vec::new()).with_dict_items(entries))
    }
}

#[test]
fn test_reduction_with_items() -> graphpickle::Result<()> {
    let registry = Registry::new();
    registry.register_function("tests::empty_list", empty_list);
    registry.register_function("tests::empty_dict", empty_dict);
    let pickle = JsonPickle::builder().registry(&registry);

    let listed = Value::object(Bag {
        items: vec![1, 2],
        index: Vec::new(),
    });
    let text = pickle.encode(&listed)?;
    assert_eq!(text, r#"{"$reduce":[{"$typeref":"tests::empty_list"},[],null,[1,2]],"$id":0}"#);
    assert_eq!(pickle.decode(&text)?, Value::list(vec![Value::from(1), Value::from(2)]));

    let indexed = Value::object(Bag {
        items: Vec::new(),
        index: vec![("a".into(), 1)],
    });
    let text = pickle.encode(&indexed)?;
    assert_eq!(
        text,
        r#"{"$reduce":[{"$typeref":"tests::empty_dict"},[],null,null,[["a",1]]],"$id":0}"#
    );
    assert_eq!(pickle.decode(&text)?, Value::dict([("a", Value::from(1))]));
    Ok(())
}
