//! Lazy handles on named components
//!
//! This trait allows to use a uniform API for both shared components (the holder fetches them
//! once and keeps them) and on-demand instances (the holder fetches a fresh one every time).

use std::sync::Arc;

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::trace;

use crate::peel::{Peeler, ProxyPeelingError};
use crate::registry::{ComponentRegistry, WiringError};
use crate::types::Instance;

/// Errors raised while obtaining an instance from a holder
#[derive(Error, Debug)]
pub enum HolderError {
    #[error(transparent)]
    Peeling(#[from] ProxyPeelingError),
    #[error("cannot fetch component `{name}`")]
    Fetch {
        name: String,
        #[source]
        source: WiringError,
    },
}

/// Provide an instance of a component
pub trait Provide: Send + Sync {
    fn provide(&self) -> Result<Instance, HolderError>;
}

/// Shared trait object implementing [Provide]
pub type Provider = Arc<dyn Provide>;

/// Plain instances are their own provider
impl Provide for Instance {
    fn provide(&self) -> Result<Instance, HolderError> {
        Ok(self.clone())
    }
}

/// Fetch a named component from a registry, peeling it if requested
#[derive(Clone)]
struct Fetcher {
    registry: Arc<dyn ComponentRegistry>,
    name: String,
    peeler: Option<Peeler>,
}

impl Fetcher {
    fn fetch(&self) -> Result<Instance, HolderError> {
        trace!(component = %self.name, "fetch");
        let fetched = self.registry.get_instance(&self.name).map_err(|source| HolderError::Fetch {
            name: self.name.clone(),
            source,
        })?;
        match &self.peeler {
            Some(peeler) => Ok(peeler.peel(fetched)?),
            None => Ok(fetched.into_instance()),
        }
    }
}

/// Holder fetching a new instance on every call
pub struct PerCallHolder(Fetcher);

impl PerCallHolder {
    pub fn new(registry: Arc<dyn ComponentRegistry>, name: &str, peeler: Option<Peeler>) -> Self {
        PerCallHolder(Fetcher {
            registry,
            name: name.to_string(),
            peeler,
        })
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_peeling(&self) -> bool {
        self.0.peeler.is_some()
    }
}

impl Provide for PerCallHolder {
    fn provide(&self) -> Result<Instance, HolderError> {
        self.0.fetch()
    }
}

/// Holder fetching its component once and returning the same instance afterwards
///
/// Concurrent first calls run a single fetch and all observe the same reference.
/// A failed fetch is not remembered: the next call tries again.
pub struct SingleFetchHolder {
    fetcher: Fetcher,
    cell: OnceCell<Instance>,
}

impl SingleFetchHolder {
    pub fn new(registry: Arc<dyn ComponentRegistry>, name: &str, peeler: Option<Peeler>) -> Self {
        Self {
            fetcher: Fetcher {
                registry,
                name: name.to_string(),
                peeler,
            },
            cell: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.fetcher.name
    }

    pub fn is_peeling(&self) -> bool {
        self.fetcher.peeler.is_some()
    }

    /// The memoized instance, if a fetch already succeeded
    pub fn cached(&self) -> Option<&Instance> {
        self.cell.get()
    }
}

impl Provide for SingleFetchHolder {
    fn provide(&self) -> Result<Instance, HolderError> {
        self.cell.get_or_try_init(|| self.fetcher.fetch()).cloned()
    }
}
