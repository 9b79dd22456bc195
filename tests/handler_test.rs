#![allow(missing_docs)]

use graphpickle::{
    Describe, Handler, JsonPickle, ObjectRef, PickleError, PickleObject, Pickler, Record, Registry, TypeDescriptor,
    Unpickler, Value,
};

// --- A handler that rewrites the object's representation ---

#[derive(Debug, PartialEq)]
struct Temperature {
    celsius: f64,
}

impl Describe for Temperature {
    const DESCRIPTOR: TypeDescriptor = TypeDescriptor::new("tests::Temperature");
}

impl PickleObject for Temperature {
    fn descriptor(&self) -> TypeDescriptor {
        Self::DESCRIPTOR
    }

    fn object_eq(&self, other: &dyn PickleObject) -> bool {
        graphpickle::AsAny::as_any(other).downcast_ref::<Self>() == Some(self)
    }
}

#[derive(Debug)]
struct FahrenheitHandler;

impl Handler for FahrenheitHandler {
    fn flatten(&self, object: &ObjectRef, mut record: Record, _: &mut Pickler) -> graphpickle::Result<Record> {
        let celsius = object
            .downcast_ref::<Temperature>()
            .map(|t| t.celsius)
            .ok_or_else(|| PickleError::Handler("expected a Temperature".into()))?;
        record.insert("fahrenheit".into(), serde_json::json!(celsius * 9.0 / 5.0 + 32.0));
        Ok(record)
    }

    fn restore(&self, record: &Record, _: &mut Unpickler) -> graphpickle::Result<ObjectRef> {
        let fahrenheit = record
            .get("fahrenheit")
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| PickleError::Handler("missing fahrenheit".into()))?;
        Ok(ObjectRef::object(Temperature {
            celsius: (fahrenheit - 32.0) * 5.0 / 9.0,
        }))
    }
}

fn boiling() -> Value {
    Value::object(Temperature { celsius: 100.0 })
}

#[test]
fn test_handler_owns_the_record() -> graphpickle::Result<()> {
    let registry = Registry::new();
    registry.register_for::<Temperature, _>(FahrenheitHandler);
    let pickle = JsonPickle::builder().registry(&registry);

    let text = pickle.encode(&boiling())?;
    assert_eq!(text, r#"{"$type":"tests::Temperature","$id":0,"fahrenheit":212.0}"#);
    assert_eq!(pickle.decode(&text)?, boiling());
    Ok(())
}

#[test]
fn test_aliases_restore_to_one_object() -> graphpickle::Result<()> {
    let registry = Registry::new();
    registry.register_for::<Temperature, _>(FahrenheitHandler);
    let pickle = JsonPickle::builder().registry(&registry);

    let t = boiling();
    let text = pickle.encode(&Value::list(vec![t.clone(), t.clone(), t]))?;
    assert_eq!(
        text,
        r#"[{"$type":"tests::Temperature","$id":1,"fahrenheit":212.0},{"$ref":1},{"$ref":1}]"#
    );

    let restored = pickle.decode(&text)?;
    let items = restored.as_list().map(|l| l.borrow().clone()).unwrap_or_default();
    assert_eq!(items.len(), 3);
    assert!(items[0].same_as(&items[1]));
    assert!(items[1].same_as(&items[2]));
    assert_eq!(items[0], boiling());
    Ok(())
}

#[test]
fn test_plain_mode_strips_handler_tags() -> graphpickle::Result<()> {
    let registry = Registry::new();
    registry.register_for::<Temperature, _>(FahrenheitHandler);

    let text = JsonPickle::builder().registry(&registry).unpicklable(false).encode(&boiling())?;
    assert_eq!(text, r#"{"fahrenheit":212.0}"#);
    Ok(())
}

#[test]
fn test_unregister_falls_back_to_default_handling() -> graphpickle::Result<()> {
    let registry = Registry::new();
    registry.register_for::<Temperature, _>(FahrenheitHandler);
    assert!(registry.unregister("tests::Temperature").is_some());
    assert!(registry.lookup("tests::Temperature").is_none());

    // No handler, no reduction and no constructor left.
    let pickle = JsonPickle::builder().registry(&registry);
    assert!(matches!(pickle.encode(&boiling()), Err(PickleError::Unpicklable(_))));
    Ok(())
}

#[test]
fn test_snapshot_ignores_later_registrations() -> graphpickle::Result<()> {
    let registry = Registry::new();
    let pickler = Pickler::new(&registry, Default::default());
    registry.register_for::<Temperature, _>(FahrenheitHandler);

    assert!(pickler.registry().lookup("tests::Temperature").is_none());
    assert!(registry.snapshot().lookup("tests::Temperature").is_some());
    Ok(())
}

// --- A handler that embeds other graph values ---

#[derive(Debug)]
struct Envelope {
    payload: Value,
}

impl Describe for Envelope {
    const DESCRIPTOR: TypeDescriptor = TypeDescriptor::new("tests::Envelope");
}

impl PickleObject for Envelope {
    fn descriptor(&self) -> TypeDescriptor {
        Self::DESCRIPTOR
    }
}

#[derive(Debug)]
struct EnvelopeHandler;

impl Handler for EnvelopeHandler {
    fn flatten(&self, object: &ObjectRef, mut record: Record, pickler: &mut Pickler) -> graphpickle::Result<Record> {
        let payload = object
            .downcast_ref::<Envelope>()
            .map(|e| e.payload.clone())
            .ok_or_else(|| PickleError::Handler("expected an Envelope".into()))?;
        record.insert("payload".into(), pickler.flatten_nested(&payload)?);
        Ok(record)
    }

    fn restore(&self, record: &Record, unpickler: &mut Unpickler) -> graphpickle::Result<ObjectRef> {
        let node = record
            .get("payload")
            .ok_or_else(|| PickleError::Handler("missing payload".into()))?;
        let object = ObjectRef::object(Envelope { payload: Value::Null });
        unpickler.remember_pending(&object)?;
        let payload = unpickler.restore_nested(node)?;
        if let Some(mut envelope) = object.downcast_mut::<Envelope>() {
            envelope.payload = payload;
        }
        Ok(object)
    }
}

#[test]
fn test_nested_values_share_the_reference_scope() -> graphpickle::Result<()> {
    let registry = Registry::new();
    registry.register_for::<Envelope, _>(EnvelopeHandler);
    let pickle = JsonPickle::builder().registry(&registry);

    let shared = Value::list(vec![Value::from(1)]);
    let envelope = Value::object(Envelope {
        payload: shared.clone(),
    });
    let text = pickle.encode(&Value::list(vec![shared, envelope]))?;
    assert_eq!(text, r#"[[1],{"$type":"tests::Envelope","$id":2,"payload":{"$ref":1}}]"#);

    let restored = pickle.decode(&text)?;
    let items = restored.as_list().map(|l| l.borrow().clone()).unwrap_or_default();
    let payload = items[1]
        .as_object()
        .and_then(|o| o.downcast_ref::<Envelope>().map(|e| e.payload.clone()));
    assert!(payload.is_some_and(|p| p.same_as(&items[0])));
    Ok(())
}

#[test]
fn test_handler_object_can_contain_itself() -> graphpickle::Result<()> {
    let registry = Registry::new();
    registry.register_for::<Envelope, _>(EnvelopeHandler);
    let pickle = JsonPickle::builder().registry(&registry);

    let payload = Value::list(Vec::new());
    let envelope = Value::object(Envelope {
        payload: payload.clone(),
    });
    if let Some(items) = payload.as_list() {
        items.borrow_mut().push(envelope.clone());
    }
    let text = pickle.encode(&envelope)?;
    assert_eq!(text, r#"{"$type":"tests::Envelope","$id":0,"payload":[{"$ref":0}]}"#);

    let restored = pickle.decode(&text)?;
    let payload = restored
        .as_object()
        .and_then(|o| o.downcast_ref::<Envelope>().map(|e| e.payload.clone()));
    let inner = payload
        .as_ref()
        .and_then(Value::as_list)
        .and_then(|l| l.borrow().first().cloned());
    assert!(inner.is_some_and(|item| item.same_as(&restored)));
    Ok(())
}

#[derive(Debug)]
struct ForgetfulHandler;

impl Handler for ForgetfulHandler {
    fn flatten(&self, object: &ObjectRef, record: Record, pickler: &mut Pickler) -> graphpickle::Result<Record> {
        EnvelopeHandler.flatten(object, record, pickler)
    }

    fn restore(&self, _: &Record, unpickler: &mut Unpickler) -> graphpickle::Result<ObjectRef> {
        unpickler.remember_pending(&ObjectRef::object(Envelope { payload: Value::Null }))?;
        Ok(ObjectRef::object(Envelope { payload: Value::Null }))
    }
}

#[test]
fn test_handler_must_return_the_object_it_registered() {
    let registry = Registry::new();
    registry.register_for::<Envelope, _>(ForgetfulHandler);

    assert!(matches!(
        JsonPickle::builder().registry(&registry).decode(r#"{"$type":"tests::Envelope","$id":0,"payload":1}"#),
        Err(PickleError::Handler(_))
    ));
}

#[test]
fn test_handler_errors_propagate() {
    let registry = Registry::new();
    registry.register_for::<Envelope, _>(EnvelopeHandler);
    let pickle = JsonPickle::builder().registry(&registry);

    assert!(matches!(
        pickle.decode(r#"{"$type":"tests::Envelope"}"#),
        Err(PickleError::Handler(message)) if message == "missing payload"
    ));
}

// --- Shared registry across threads ---

fn noop(_: &[Value]) -> graphpickle::Result<Value> {
    Ok(Value::Null)
}

#[test]
fn test_concurrent_encoding_while_registering() -> graphpickle::Result<()> {
    let shared = Registry::new();
    shared.register_for::<Temperature, _>(FahrenheitHandler);
    let registry = &shared;
    let expected = r#"[{"$type":"tests::Temperature","$id":1,"fahrenheit":212.0},{"$ref":1}]"#;

    std::thread::scope(|scope| {
        let encoders: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(move || -> graphpickle::Result<()> {
                    let pickle = JsonPickle::builder().registry(registry);
                    for _ in 0..200 {
                        let t = boiling();
                        let text = pickle.encode(&Value::list(vec![t.clone(), t]))?;
                        assert_eq!(text, expected);
                        let restored = pickle.decode(&text)?;
                        let items = restored.as_list().map(|l| l.borrow().clone()).unwrap_or_default();
                        assert!(matches!(&items[..], [a, b] if a.same_as(b) && *a == boiling()));
                    }
                    Ok(())
                })
            })
            .collect();

        let writer = scope.spawn(move || {
            for round in 0..200 {
                registry.register_for::<Envelope, _>(EnvelopeHandler);
                registry.register_function(format!("tests::noop_{round}"), noop);
                registry.unregister("tests::Envelope");
                registry.unregister_function(&format!("tests::noop_{round}"));
            }
        });

        let joined = writer.join();
        assert!(joined.is_ok());
        encoders.into_iter().try_for_each(|encoder| {
            encoder
                .join()
                .map_err(|_| PickleError::Handler("encoder thread panicked".into()))?
        })
    })?;

    assert!(registry.lookup("tests::Envelope").is_none());
    assert!(registry.lookup("tests::Temperature").is_some());
    Ok(())
}
