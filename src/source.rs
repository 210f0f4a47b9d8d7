//! Instance sources: live implementor instances by implementor type

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::holder::{HolderError, PerCallHolder, Provider, Provide, SingleFetchHolder};
use crate::peel::Peeler;
use crate::registry::{ComponentRegistry, Scope};
use crate::resolve::Implementation;
use crate::types::{Instance, TypeName};

/// Supply the live instances of an implementor type, in registration order
pub trait InstanceSource: Send + Sync {
    fn instances(&self, implementor: &TypeName) -> Result<Vec<Instance>, HolderError>;
}

/// Eagerly populated source
///
/// Buckets exist for the implementors of one implementation only. Adding instances requires
/// exclusive access and belongs to the setup phase; once shared, the source is read-only.
#[derive(Default)]
pub struct PreparedSource {
    buckets: IndexMap<TypeName, Vec<Instance>>,
}

impl PreparedSource {
    /// Create empty buckets for all implementors of the implementation
    pub fn new(implementation: &Implementation) -> Self {
        Self::for_implementors(implementation.implementors().cloned())
    }

    pub fn for_implementors<I, N>(implementors: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<TypeName>,
    {
        Self {
            buckets: implementors.into_iter().map(|n| (n.into(), Vec::new())).collect(),
        }
    }

    /// Tell whether instances of this type are wanted
    pub fn accepts(&self, ty: &TypeName) -> bool {
        self.buckets.contains_key(ty)
    }

    /// Append an instance, returning false if the type is not wanted
    pub fn add(&mut self, ty: &TypeName, instance: Instance) -> bool {
        match self.buckets.get_mut(ty) {
            Some(bucket) => {
                bucket.push(instance);
                true
            }
            None => false,
        }
    }

    pub fn len(&self, ty: &TypeName) -> usize {
        self.buckets.get(ty).map_or(0, Vec::len)
    }
}

impl InstanceSource for PreparedSource {
    fn instances(&self, implementor: &TypeName) -> Result<Vec<Instance>, HolderError> {
        Ok(self.buckets.get(implementor).cloned().unwrap_or_default())
    }
}

/// Lazy source backed by instance holders
#[derive(Default)]
pub struct HolderSource {
    buckets: IndexMap<TypeName, Vec<Provider>>,
}

impl HolderSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, ty: impl Into<TypeName>, holder: Provider) -> &mut Self {
        self.buckets.entry(ty.into()).or_default().push(holder);
        self
    }

    /// Create holders for all registry components whose type is an implementor.
    ///
    /// Singleton components get a [SingleFetchHolder], prototype components a [PerCallHolder].
    pub fn from_registry(
        implementation: &Implementation,
        registry: Arc<dyn ComponentRegistry>,
        peeler: Option<Peeler>,
    ) -> Self {
        let mut source = HolderSource::new();
        for component in registry.components() {
            if !implementation.is_implementor(&component.ty) {
                continue;
            }
            debug!(
                implementee = %implementation.implementee().name,
                component = %component.name,
                scope = ?component.scope,
                "holder"
            );
            let holder: Provider = match component.scope {
                Scope::Singleton => Arc::new(SingleFetchHolder::new(
                    registry.clone(),
                    &component.name,
                    peeler.clone(),
                )),
                Scope::Prototype => Arc::new(PerCallHolder::new(
                    registry.clone(),
                    &component.name,
                    peeler.clone(),
                )),
            };
            source.add(component.ty, holder);
        }
        source
    }

    pub fn len(&self, ty: &TypeName) -> usize {
        self.buckets.get(ty).map_or(0, Vec::len)
    }
}

impl InstanceSource for HolderSource {
    fn instances(&self, implementor: &TypeName) -> Result<Vec<Instance>, HolderError> {
        match self.buckets.get(implementor) {
            Some(holders) => holders.iter().map(|h| h.provide()).collect(),
            None => Ok(Vec::new()),
        }
    }
}
