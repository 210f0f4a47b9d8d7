//! Component registry contract and an in-memory registry
//!
//! The registry is the collaborator owning component lifecycles. The dispatch engine only needs
//! to enumerate components, know their scope and obtain instances by name.

use std::fmt;
use std::sync::Arc;

use indexmap::map::{Entry, IndexMap};
use thiserror::Error;

use crate::peel::Fetched;
use crate::types::{Instance, TypeName};
use crate::ResolutionError;

/// Lifecycle of a registered component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One shared instance
    Singleton,
    /// A fresh instance on every request
    Prototype,
}

/// Description of a registered component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    pub name: String,
    pub ty: TypeName,
    pub scope: Scope,
}

/// Errors triggered during the autowiring process
#[derive(Error, Debug)]
pub enum WiringError {
    #[error("Cyclic dependencies: trying to start resolving in an open slot")]
    CyclicResolution,
    #[error("Consistency error: component `{0}` is already registered")]
    AlreadyRegistered(String),
    #[error("unknown component `{0}`")]
    UnknownComponent(String),
    #[error("component `{name}` could not be created")]
    Creation {
        name: String,
        #[source]
        source: crate::BoxError,
    },
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// Access to the components known to a container
pub trait ComponentRegistry: Send + Sync {
    /// All components, in registration order
    fn components(&self) -> Vec<ComponentInfo>;

    /// Obtain the component registered under `name`
    fn get_instance(&self, name: &str) -> Result<Fetched, WiringError>;

    fn scope(&self, name: &str) -> Option<Scope>;
}

type Factory = Arc<dyn Fn() -> Result<Fetched, crate::BoxError> + Send + Sync>;

enum Registration {
    Singleton(Fetched),
    Prototype(Factory),
}

struct Component {
    ty: TypeName,
    registration: Registration,
}

/// In-memory component registry
///
/// Singletons are stored as given, prototypes are created by calling their factory on every
/// request.
#[derive(Default)]
pub struct Components {
    entries: IndexMap<String, Component>,
}

impl fmt::Debug for Components {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.components()).finish()
    }
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(
        &mut self,
        name: &str,
        ty: TypeName,
        registration: Registration,
    ) -> Result<&mut Self, WiringError> {
        let Entry::Vacant(v) = self.entries.entry(name.to_string()) else {
            return Err(WiringError::AlreadyRegistered(name.to_string()));
        };
        v.insert(Component { ty, registration });
        Ok(self)
    }

    /// Register a shared component
    pub fn singleton(
        &mut self,
        name: &str,
        ty: impl Into<TypeName>,
        component: Fetched,
    ) -> Result<&mut Self, WiringError> {
        self.insert(name, ty.into(), Registration::Singleton(component))
    }

    /// Register a plain shared instance
    pub fn instance(
        &mut self,
        name: &str,
        ty: impl Into<TypeName>,
        instance: Instance,
    ) -> Result<&mut Self, WiringError> {
        self.singleton(name, ty, Fetched::Plain(instance))
    }

    /// Register a component created anew on every request
    pub fn prototype<F>(
        &mut self,
        name: &str,
        ty: impl Into<TypeName>,
        factory: F,
    ) -> Result<&mut Self, WiringError>
    where
        F: Fn() -> Result<Fetched, crate::BoxError> + Send + Sync + 'static,
    {
        self.insert(name, ty.into(), Registration::Prototype(Arc::new(factory)))
    }
}

impl ComponentRegistry for Components {
    fn components(&self) -> Vec<ComponentInfo> {
        self.entries
            .iter()
            .map(|(name, c)| ComponentInfo {
                name: name.clone(),
                ty: c.ty.clone(),
                scope: match c.registration {
                    Registration::Singleton(_) => Scope::Singleton,
                    Registration::Prototype(_) => Scope::Prototype,
                },
            })
            .collect()
    }

    fn get_instance(&self, name: &str) -> Result<Fetched, WiringError> {
        let component = self
            .entries
            .get(name)
            .ok_or_else(|| WiringError::UnknownComponent(name.to_string()))?;
        match &component.registration {
            Registration::Singleton(fetched) => Ok(fetched.clone()),
            Registration::Prototype(factory) => factory().map_err(|source| WiringError::Creation {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn scope(&self, name: &str) -> Option<Scope> {
        self.entries.get(name).map(|c| match c.registration {
            Registration::Singleton(_) => Scope::Singleton,
            Registration::Prototype(_) => Scope::Prototype,
        })
    }
}
