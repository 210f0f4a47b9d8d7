use pretty_assertions::assert_eq;
use proptest::prelude::*;
use thiserror::Error;

use super::*;

struct Threshold {
    limit: i32,
}

struct Broken;
struct Printer;
struct Unbound;

#[derive(Error, Debug)]
#[error("out of paper")]
struct OutOfPaper;

fn stand_in_for(
    implementors: &[ImplementorDesc],
    markers: &Markers,
    instances: Vec<(&str, Instance)>,
) -> StandIn {
    let implementation = Arc::new(
        Resolver::new(number_types())
            .resolve(&service(), implementors, markers)
            .unwrap(),
    );
    let mut source = PreparedSource::new(&implementation);
    for (ty, instance) in instances {
        assert!(source.add(&ty.into(), instance));
    }
    SubclassBuilder.build(implementation, Arc::new(source)).unwrap()
}

#[test]
fn no_match_reports_argument_types() {
    let stand_in = stand_in_for(
        &[byte_handler()],
        &Markers::new(),
        vec![("ByteHandler", to_value(ByteHandler))],
    );

    match handle(&stand_in, to_value(2.5_f64)) {
        Err(DispatchError::NoMatch(e)) => {
            assert_eq!(e.implementee, TypeName::from("Service"));
            assert_eq!(e.method, "handle(Number) -> String");
            assert_eq!(e.arg_types, ["Double"]);
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn candidates_without_instances_are_skipped() -> Result<(), DispatchError> {
    let stand_in = stand_in_for(
        &scenario_implementors(),
        &scenario_markers(),
        vec![("Service", to_value(DefaultService)), ("ByteHandler", to_value(ByteHandler))],
    );

    assert_eq!(handle(&stand_in, to_value(1.0_f64))?, "D");
    assert_eq!(handle(&stand_in, to_value(7_u8))?, "X");
    Ok(())
}

#[test]
fn instances_are_tried_in_registration_order() -> Result<(), DispatchError> {
    let threshold = ImplementorDesc::new("Threshold")
        .method("handle", ["Integer"], STRING, |t: &Threshold, _| Ok(format!("under {}", t.limit)))
        .validity("below", ["Integer"], |t: &Threshold, args| Ok(*arg::<i32>(args, 0)? < t.limit));
    let markers =
        Markers::new().mark("Threshold", "handle", MethodMarker::default().validity("below"));
    let stand_in = stand_in_for(
        &[default_service(), threshold],
        &markers,
        vec![
            ("Threshold", to_value(Threshold { limit: 10 })),
            ("Threshold", to_value(Threshold { limit: 100 })),
            ("Service", to_value(DefaultService)),
        ],
    );

    assert_eq!(handle(&stand_in, to_value(5_i32))?, "under 10");
    assert_eq!(handle(&stand_in, to_value(50_i32))?, "under 100");
    assert_eq!(handle(&stand_in, to_value(500_i32))?, "D");
    Ok(())
}

#[test]
fn first_match_wins_between_equally_specific_candidates() -> Result<(), DispatchError> {
    let first = ImplementorDesc::new("First")
        .method("handle", ["Byte"], STRING, |_: &ByteHandler, _| Ok("first".to_string()));
    let second = ImplementorDesc::new("Second")
        .method("handle", ["Byte"], STRING, |_: &ByteHandler, _| Ok("second".to_string()));
    let stand_in = stand_in_for(
        &[first, second],
        &Markers::new(),
        vec![("First", to_value(ByteHandler)), ("Second", to_value(ByteHandler))],
    );

    for _ in 0..3 {
        assert_eq!(handle(&stand_in, to_value(1_u8))?, "first");
    }
    Ok(())
}

#[test]
fn validity_errors_abort_the_call() {
    let broken = ImplementorDesc::new("Broken")
        .method("handle", ["Double"], STRING, |_: &Broken, _| Ok("never".to_string()))
        .validity("is_ready", ["Double"], |_: &Broken, _| Err("sensor offline".into()));
    let markers =
        Markers::new().mark("Broken", "handle", MethodMarker::default().validity("is_ready"));
    let stand_in = stand_in_for(
        &[default_service(), broken],
        &markers,
        vec![("Broken", to_value(Broken)), ("Service", to_value(DefaultService))],
    );

    match handle(&stand_in, to_value(3.0_f64)) {
        Err(DispatchError::Validity {
            implementor,
            validity,
            source,
        }) => {
            assert_eq!(implementor, TypeName::from("Broken"));
            assert_eq!(validity, "is_ready");
            assert_eq!(source.to_string(), "sensor offline");
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn implementor_errors_come_back_unchanged() {
    let printer = ImplementorDesc::new("Printer").method(
        "handle",
        ["Number"],
        STRING,
        |_: &Printer, _: &[Value]| -> Result<String, BoxError> { Err(OutOfPaper.into()) },
    );
    let stand_in = stand_in_for(&[printer], &Markers::new(), vec![("Printer", to_value(Printer))]);

    let err = handle(&stand_in, to_value(1_u8)).unwrap_err();
    assert_eq!(err.to_string(), "out of paper");
    let original = err.into_implementor_error().unwrap();
    assert!(original.downcast::<OutOfPaper>().is_ok());
}

#[test]
fn calls_are_checked_against_the_implementee() {
    let stand_in = scenario_stand_in();
    let id = stand_in
        .implementation()
        .method_id("handle", &type_names(["Number"]))
        .unwrap();

    assert!(matches!(
        stand_in.invoke(id, &[]),
        Err(DispatchError::ArityMismatch { expected: 1, actual: 0, .. })
    ));
    assert!(matches!(
        stand_in.invoke(MethodId(3), &[to_value(1_u8)]),
        Err(DispatchError::UnknownMethod { index: 3, .. })
    ));
    match stand_in.call("handle", &[to_value(Unbound)]) {
        Err(DispatchError::UnknownMethodName { name, arg_types, .. }) => {
            assert_eq!(name, "handle");
            assert_eq!(arg_types, ["<unbound>"]);
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert!(matches!(
        stand_in.call("missing", &[]),
        Err(DispatchError::UnknownMethodName { .. })
    ));
}

#[test]
fn select_does_not_invoke() -> Result<(), DispatchError> {
    let implementation = scenario();
    let source = prepared(&implementation);
    let id = implementation.method_id("handle", &type_names(["Number"])).unwrap();

    let Selection { candidate, instance } =
        select(&implementation, &source, id, &[to_value(2_i32)])?;
    assert_eq!(candidate.implementor().as_str(), "IntegerHandler");
    assert!(instance.downcast_ref::<IntegerHandler>().is_some());

    let out = invoke(&implementation, &source, id, &[to_value(2_i32)])?;
    assert_eq!(from_value::<String>(out)?, "Z");
    Ok(())
}

proptest! {
    #[test]
    fn false_validity_is_never_selected(value in any::<f64>()) {
        let stand_in = scenario_stand_in();
        let expected = if value == 1.0 { "Y" } else { "D" };
        prop_assert_eq!(handle(&stand_in, to_value(value)).unwrap(), expected);
    }
}
