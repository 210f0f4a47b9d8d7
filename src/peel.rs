//! Unwrapping of interception wrappers
//!
//! An interception layer may hand out wrappers around the real component. Wrappers expose their
//! target deliberately through the [Unwrappable] trait; a [Peeler] only unwraps the closed set of
//! wrapper kinds it was configured with and refuses anything else.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::types::Instance;

/// Kind of the wrappers produced by an interface-shaped interception proxy
pub const INTERFACE_PROXY: &str = "interface-proxy";
/// Kind of the wrappers produced by a subclass-shaped interception proxy
pub const SUBCLASS_PROXY: &str = "subclass-proxy";

/// A wrapper exposing the object it intercepts
pub trait Unwrappable: Send + Sync + 'static {
    /// Kind of wrapper, matched against the kinds recognized by a [Peeler]
    fn wrapper_kind(&self) -> &str;

    /// The wrapped object, if the wrapper currently has one
    fn target(&self) -> Option<Instance>;

    /// The wrapper itself, as a plain instance
    fn into_instance(self: Arc<Self>) -> Instance;
}

/// Object returned by a component registry
#[derive(Clone)]
pub enum Fetched {
    Plain(Instance),
    Wrapped(Arc<dyn Unwrappable>),
}

impl Fetched {
    /// Use the fetched object as is, without unwrapping it.
    pub fn into_instance(self) -> Instance {
        match self {
            Fetched::Plain(instance) => instance,
            Fetched::Wrapped(wrapper) => wrapper.into_instance(),
        }
    }
}

impl fmt::Debug for Fetched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fetched::Plain(_) => f.write_str("Plain(..)"),
            Fetched::Wrapped(wrapper) => write!(f, "Wrapped({})", wrapper.wrapper_kind()),
        }
    }
}

/// Failure to unwrap an interception wrapper
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyPeelingError {
    #[error("peeling is not supported for wrappers of kind `{kind}`")]
    Unrecognized { kind: String },
    #[error("wrapper of kind `{kind}` has no target")]
    MissingTarget { kind: String },
}

/// Unwraps the recognized kinds of interception wrappers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peeler {
    recognized: Vec<String>,
}

impl Default for Peeler {
    fn default() -> Self {
        Self::new([INTERFACE_PROXY, SUBCLASS_PROXY])
    }
}

impl Peeler {
    pub fn new<I, S>(recognized: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            recognized: recognized.into_iter().map(Into::into).collect(),
        }
    }

    pub fn recognizes(&self, kind: &str) -> bool {
        self.recognized.iter().any(|k| k == kind)
    }

    /// Return the raw object: plain objects as is, recognized wrappers replaced by their target.
    pub fn peel(&self, fetched: Fetched) -> Result<Instance, ProxyPeelingError> {
        let wrapper = match fetched {
            Fetched::Plain(instance) => return Ok(instance),
            Fetched::Wrapped(wrapper) => wrapper,
        };
        let kind = wrapper.wrapper_kind();
        if !self.recognizes(kind) {
            warn!(kind, "unrecognized interception wrapper");
            return Err(ProxyPeelingError::Unrecognized { kind: kind.to_string() });
        }
        wrapper.target().ok_or_else(|| ProxyPeelingError::MissingTarget { kind: kind.to_string() })
    }
}
