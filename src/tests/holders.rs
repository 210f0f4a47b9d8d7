use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;

/// Registry with a single `ByteHandler` component, counting fetches
struct CountingRegistry {
    scope: Scope,
    fetches: AtomicUsize,
}

impl CountingRegistry {
    fn new(scope: Scope) -> Arc<Self> {
        Arc::new(Self {
            scope,
            fetches: AtomicUsize::new(0),
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ComponentRegistry for CountingRegistry {
    fn components(&self) -> Vec<ComponentInfo> {
        vec![ComponentInfo {
            name: "handler".to_string(),
            ty: "ByteHandler".into(),
            scope: self.scope,
        }]
    }

    fn get_instance(&self, name: &str) -> Result<Fetched, WiringError> {
        if name != "handler" {
            return Err(WiringError::UnknownComponent(name.to_string()));
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        // leave room for concurrent callers to pile up
        thread::sleep(Duration::from_millis(5));
        Ok(Fetched::Plain(Arc::new(ByteHandler)))
    }

    fn scope(&self, name: &str) -> Option<Scope> {
        (name == "handler").then_some(self.scope)
    }
}

#[test]
fn single_fetch_under_contention() {
    const CALLERS: usize = 16;
    let registry = CountingRegistry::new(Scope::Singleton);
    let holder = Arc::new(SingleFetchHolder::new(registry.clone(), "handler", None));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let holder = holder.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                holder.provide().unwrap()
            })
        })
        .collect();
    let instances: Vec<Instance> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(registry.fetches(), 1);
    assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    assert!(holder.cached().is_some_and(|c| Arc::ptr_eq(c, &instances[0])));
    assert_eq!(holder.name(), "handler");
}

#[test]
fn per_call_fetches_every_time() -> Result<(), HolderError> {
    let registry = CountingRegistry::new(Scope::Prototype);
    let holder = PerCallHolder::new(registry.clone(), "handler", Some(Peeler::default()));

    let first = holder.provide()?;
    let second = holder.provide()?;
    let third = holder.provide()?;

    assert_eq!(registry.fetches(), 3);
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!Arc::ptr_eq(&second, &third));
    assert!(holder.is_peeling());
    Ok(())
}

#[test]
fn failed_fetches_are_not_cached() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let mut components = Components::new();
    components
        .prototype("flaky", "ByteHandler", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("not ready yet".into());
            }
            Ok(Fetched::Plain(Arc::new(ByteHandler)))
        })
        .unwrap();
    let holder = SingleFetchHolder::new(Arc::new(components), "flaky", None);

    assert!(matches!(
        holder.provide(),
        Err(HolderError::Fetch {
            source: WiringError::Creation { .. },
            ..
        })
    ));
    assert!(holder.cached().is_none());

    let instance = holder.provide().unwrap();
    let again = holder.provide().unwrap();
    assert!(Arc::ptr_eq(&instance, &again));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn peeling_recognized_wrappers() -> Result<(), ProxyPeelingError> {
    let target: Instance = Arc::new(ByteHandler);
    let peeler = Peeler::default();

    let peeled =
        peeler.peel(Fetched::Wrapped(Intercepted::around(SUBCLASS_PROXY, target.clone())))?;
    assert!(Arc::ptr_eq(&peeled, &target));
    assert_eq!((*peeled).type_id(), TypeId::of::<ByteHandler>());

    let peeled =
        peeler.peel(Fetched::Wrapped(Intercepted::around(INTERFACE_PROXY, target.clone())))?;
    assert_eq!((*peeled).type_id(), TypeId::of::<ByteHandler>());

    // plain objects are returned as is
    let plain = peeler.peel(Fetched::Plain(target.clone()))?;
    assert!(Arc::ptr_eq(&plain, &target));
    Ok(())
}

#[test]
fn peeling_refuses_unknown_wrappers() {
    let peeler = Peeler::new([INTERFACE_PROXY]);
    assert!(!peeler.recognizes(SUBCLASS_PROXY));

    let wrapped = Fetched::Wrapped(Intercepted::around(SUBCLASS_PROXY, Arc::new(ByteHandler)));
    assert_eq!(
        peeler.peel(wrapped).unwrap_err(),
        ProxyPeelingError::Unrecognized {
            kind: SUBCLASS_PROXY.to_string()
        }
    );

    let empty = Fetched::Wrapped(Arc::new(Intercepted {
        kind: INTERFACE_PROXY,
        target: None,
    }));
    assert_eq!(
        peeler.peel(empty).unwrap_err(),
        ProxyPeelingError::MissingTarget {
            kind: INTERFACE_PROXY.to_string()
        }
    );
}

fn wrapped_registry(kind: &'static str) -> Arc<Components> {
    let mut components = Components::new();
    components
        .singleton(
            "byte",
            "ByteHandler",
            Fetched::Wrapped(Intercepted::around(kind, Arc::new(ByteHandler))),
        )
        .unwrap();
    Arc::new(components)
}

#[test]
fn holders_without_peeling_return_the_wrapper() -> Result<(), HolderError> {
    let holder = SingleFetchHolder::new(wrapped_registry(SUBCLASS_PROXY), "byte", None);
    assert!(!holder.is_peeling());
    assert!(holder.provide()?.downcast_ref::<Intercepted>().is_some());

    let holder =
        SingleFetchHolder::new(wrapped_registry(SUBCLASS_PROXY), "byte", Some(Peeler::default()));
    assert!(holder.provide()?.downcast_ref::<ByteHandler>().is_some());
    Ok(())
}

fn holder_stand_in(registry: Arc<Components>) -> StandIn {
    let implementation = Arc::new(
        Resolver::new(number_types())
            .resolve(&service(), &[byte_handler()], &Markers::new())
            .unwrap(),
    );
    let source = HolderSource::from_registry(&implementation, registry, Some(Peeler::default()));
    assert_eq!(source.len(&"ByteHandler".into()), 1);
    SubclassBuilder.build(implementation, Arc::new(source)).unwrap()
}

#[test]
fn dispatch_through_peeled_holders() -> Result<(), DispatchError> {
    let stand_in = holder_stand_in(wrapped_registry(INTERFACE_PROXY));
    assert_eq!(handle(&stand_in, to_value(4_u8))?, "X");

    let stand_in = holder_stand_in(wrapped_registry("aspect"));
    assert!(matches!(
        handle(&stand_in, to_value(4_u8)),
        Err(DispatchError::Holder(HolderError::Peeling(ProxyPeelingError::Unrecognized { .. })))
    ));
    Ok(())
}

#[test]
fn holder_source_follows_component_scopes() -> Result<(), HolderError> {
    let implementation = scenario();
    let mut components = Components::new();
    components
        .instance("byte", "ByteHandler", Arc::new(ByteHandler))
        .unwrap()
        .prototype("integer", "IntegerHandler", || Ok(Fetched::Plain(Arc::new(IntegerHandler))))
        .unwrap()
        .instance("unrelated", "Number", Arc::new(7_u8))
        .unwrap();
    let source = HolderSource::from_registry(&implementation, Arc::new(components), None);

    assert_eq!(source.len(&"ByteHandler".into()), 1);
    assert_eq!(source.len(&"IntegerHandler".into()), 1);
    assert_eq!(source.len(&"Number".into()), 0);

    let bytes =
        (source.instances(&"ByteHandler".into())?, source.instances(&"ByteHandler".into())?);
    assert!(Arc::ptr_eq(&bytes.0[0], &bytes.1[0]));
    let integers =
        (source.instances(&"IntegerHandler".into())?, source.instances(&"IntegerHandler".into())?);
    assert!(!Arc::ptr_eq(&integers.0[0], &integers.1[0]));
    assert!(source.instances(&"DoubleHandler".into())?.is_empty());
    Ok(())
}

#[test]
fn prepared_sources_only_take_implementors() {
    let implementation = scenario();
    let mut source = PreparedSource::new(&implementation);

    assert!(source.accepts(&"ByteHandler".into()));
    assert!(!source.add(&"Number".into(), Arc::new(1_u8)));
    assert!(source.add(&"ByteHandler".into(), Arc::new(ByteHandler)));
    assert!(source.add(&"ByteHandler".into(), Arc::new(ByteHandler)));
    assert_eq!(source.len(&"ByteHandler".into()), 2);
    assert_eq!(source.len(&"Number".into()), 0);
}

#[test]
fn components_are_registered_once() {
    let mut components = Components::new();
    components.instance("byte", "ByteHandler", Arc::new(ByteHandler)).unwrap();

    assert!(matches!(
        components.instance("byte", "ByteHandler", Arc::new(ByteHandler)),
        Err(WiringError::AlreadyRegistered(name)) if name == "byte"
    ));
    assert!(matches!(
        components.get_instance("ghost"),
        Err(WiringError::UnknownComponent(name)) if name == "ghost"
    ));
    assert_eq!(components.scope("byte"), Some(Scope::Singleton));
    assert_eq!(components.scope("ghost"), None);
    assert_eq!(
        components.components(),
        [ComponentInfo {
            name: "byte".to_string(),
            ty: "ByteHandler".into(),
            scope: Scope::Singleton,
        }]
    );
}
