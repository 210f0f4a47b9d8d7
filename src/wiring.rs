use std::collections::hash_map::{Entry, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::*;

#[derive(Debug)]
enum Slot {
    Resolving,
    Ready(Arc<StandIn>),
}

/// Setup-phase registry of stand-ins.
///
/// Keeps the catalog of implementors per implementee, resolves each implementee once against the
/// component registry and shares the resulting stand-in with every dependent.
pub struct Wiring {
    registry: Arc<dyn ComponentRegistry>,
    resolver: Resolver,
    markers: Markers,
    peeler: Option<Peeler>,
    catalog: HashMap<TypeName, Vec<ImplementorDesc>>,
    stand_ins: Mutex<HashMap<TypeName, Slot>>,
}

impl Wiring {
    pub fn new(registry: Arc<dyn ComponentRegistry>, types: Arc<TypeSystem>) -> Self {
        Self {
            registry,
            resolver: Resolver::new(types),
            markers: Markers::new(),
            peeler: Some(Peeler::default()),
            catalog: HashMap::new(),
            stand_ins: Mutex::default(),
        }
    }

    pub fn with_markers(mut self, markers: Markers) -> Self {
        self.markers = markers;
        self
    }

    /// Select the peeler applied to fetched components, `None` to disable peeling
    pub fn with_peeling(mut self, peeler: Option<Peeler>) -> Self {
        self.peeler = peeler;
        self
    }

    /// Declare an implementor of an implementee
    pub fn implementor(
        &mut self,
        implementee: impl Into<TypeName>,
        implementor: ImplementorDesc,
    ) -> &mut Self {
        self.catalog.entry(implementee.into()).or_default().push(implementor);
        self
    }

    pub fn implementors(&self, implementee: &TypeName) -> &[ImplementorDesc] {
        self.catalog.get(implementee).map(Vec::as_slice).unwrap_or(&[])
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<TypeName, Slot>> {
        self.stand_ins.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Obtain the stand-in of an implementee, building it on first request.
    ///
    /// Interfaces get an interface-shaped stand-in, other implementees a subclass-shaped one.
    pub fn stand_in(&self, implementee: &ImplementeeDesc) -> Result<Arc<StandIn>, WiringError> {
        match self.slots().entry(implementee.name.clone()) {
            Entry::Occupied(o) => {
                return match o.get() {
                    Slot::Ready(stand_in) => Ok(stand_in.clone()),
                    Slot::Resolving => Err(WiringError::CyclicResolution),
                }
            }
            Entry::Vacant(v) => {
                v.insert(Slot::Resolving);
            }
        }

        let built = self.build(implementee);
        let mut slots = self.slots();
        match built {
            Ok(stand_in) => {
                slots.insert(implementee.name.clone(), Slot::Ready(stand_in.clone()));
                Ok(stand_in)
            }
            Err(e) => {
                slots.remove(&implementee.name);
                Err(e)
            }
        }
    }

    fn build(&self, implementee: &ImplementeeDesc) -> Result<Arc<StandIn>, WiringError> {
        let implementors = self.implementors(&implementee.name);
        // markers of implementors wired to other implementees are not checked here
        let markers = self.markers.restricted_to(implementors);
        let implementation =
            Arc::new(self.resolver.resolve(implementee, implementors, &markers)?);
        let source = HolderSource::from_registry(
            &implementation,
            self.registry.clone(),
            self.peeler.clone(),
        );
        debug!(
            implementee = %implementee.name,
            implementors = implementors.len(),
            "wiring stand-in"
        );
        let stand_in = match implementee.kind {
            ImplementeeKind::Interface => InterfaceBuilder.build(implementation, Arc::new(source))?,
            _ => SubclassBuilder.build(implementation, Arc::new(source))?,
        };
        Ok(Arc::new(stand_in))
    }
}
