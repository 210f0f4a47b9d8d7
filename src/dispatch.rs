//! Call-time selection of the implementor method serving a call
//!
//! # Algorithm Overview
//!
//! 1. **Lookup**: fetch the precomputed candidate list of the called method
//! 2. **Type filter**: skip candidates whose parameter types do not accept the arguments
//! 3. **Instance filter**: skip candidates without live instances
//! 4. **Validity filter**: skip instances whose validity check returns false
//! 5. **Select**: the first (candidate, instance) pair passing every filter wins
//!
//! Candidates are scanned in table order, and for each candidate its instances in registration
//! order. The first match wins even when a later candidate would be equally specific.

use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::holder::HolderError;
use crate::resolve::{Candidate, Implementation, MethodId};
use crate::source::InstanceSource;
use crate::types::{BoxError, Instance, TypeName, Value};

/// Error when no implementor accepts a call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no implementor of `{implementee}::{method}` accepts ({})", .arg_types.join(", "))]
pub struct NoMatchingImplementor {
    /// The implementee whose method was called.
    pub implementee: TypeName,
    /// The called method, with its declared signature.
    pub method: String,
    /// The runtime types of the arguments.
    pub arg_types: Vec<String>,
}

/// Errors raised by a dispatched call
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    NoMatch(#[from] NoMatchingImplementor),
    #[error("implementee `{implementee}` has no method #{index}")]
    UnknownMethod { implementee: TypeName, index: usize },
    #[error(
        "implementee `{implementee}` has no method `{name}` accepting ({})",
        .arg_types.join(", ")
    )]
    UnknownMethodName {
        implementee: TypeName,
        name: String,
        arg_types: Vec<String>,
    },
    #[error("`{method}` expects {expected} arguments, got {actual}")]
    ArityMismatch {
        method: String,
        expected: usize,
        actual: usize,
    },
    #[error("validity check `{implementor}::{validity}` failed")]
    Validity {
        implementor: TypeName,
        validity: String,
        #[source]
        source: BoxError,
    },
    #[error(transparent)]
    Holder(#[from] HolderError),
    #[error("returned value is not a `{expected}`")]
    ReturnType { expected: &'static str },
    /// Error raised by the selected implementor method, left untouched
    #[error(transparent)]
    Implementor(BoxError),
}

impl DispatchError {
    /// Take back the error raised by the implementor method, if this is one.
    pub fn into_implementor_error(self) -> Result<BoxError, Self> {
        match self {
            DispatchError::Implementor(e) => Ok(e),
            other => Err(other),
        }
    }
}

/// The (candidate, instance) pair selected for a call
pub struct Selection<'a> {
    pub candidate: &'a Candidate,
    pub instance: Instance,
}

/// Select the candidate and instance serving a call, without invoking it.
pub fn select<'a>(
    implementation: &'a Implementation,
    source: &dyn InstanceSource,
    method: MethodId,
    args: &[Value],
) -> Result<Selection<'a>, DispatchError> {
    let sig = implementation.method(method).ok_or_else(|| DispatchError::UnknownMethod {
        implementee: implementation.implementee().name.clone(),
        index: method.index(),
    })?;
    if sig.params.len() != args.len() {
        return Err(DispatchError::ArityMismatch {
            method: sig.to_string(),
            expected: sig.params.len(),
            actual: args.len(),
        });
    }

    let types = implementation.types();
    for candidate in implementation.candidates(method) {
        if !candidate.accepts(types, args) {
            trace!(implementor = %candidate.implementor(), method = %sig, "type filter");
            continue;
        }
        for instance in source.instances(candidate.implementor())? {
            if let Some(validity) = candidate.validity() {
                let valid = validity
                    .check(&*instance, args)
                    .map_err(|source| DispatchError::Validity {
                        implementor: candidate.implementor().clone(),
                        validity: validity.name().to_string(),
                        source,
                    })?;
                if !valid {
                    trace!(
                        implementor = %candidate.implementor(),
                        method = %sig,
                        "validity filter"
                    );
                    continue;
                }
            }
            trace!(implementor = %candidate.implementor(), method = %sig, "selected");
            return Ok(Selection { candidate, instance });
        }
        trace!(implementor = %candidate.implementor(), method = %sig, "no instance");
    }

    Err(NoMatchingImplementor {
        implementee: implementation.implementee().name.clone(),
        method: sig.to_string(),
        arg_types: args.iter().map(|a| types.describe(&**a)).collect(),
    }
    .into())
}

/// Select the implementor method serving a call and invoke it.
pub fn invoke(
    implementation: &Implementation,
    source: &dyn InstanceSource,
    method: MethodId,
    args: &[Value],
) -> Result<Value, DispatchError> {
    let Selection { candidate, instance } = select(implementation, source, method, args)?;
    candidate.call(&*instance, args).map_err(DispatchError::Implementor)
}

/// An implementation bound to the instance source serving it
#[derive(Clone)]
pub struct Dispatcher {
    implementation: Arc<Implementation>,
    source: Arc<dyn InstanceSource>,
}

impl Dispatcher {
    pub fn new(implementation: Arc<Implementation>, source: Arc<dyn InstanceSource>) -> Self {
        Self { implementation, source }
    }

    pub fn implementation(&self) -> &Arc<Implementation> {
        &self.implementation
    }

    pub fn source(&self) -> &Arc<dyn InstanceSource> {
        &self.source
    }

    pub fn invoke(&self, method: MethodId, args: &[Value]) -> Result<Value, DispatchError> {
        invoke(&self.implementation, self.source.as_ref(), method, args)
    }

    /// Invoke the first method named `name` whose parameters accept the arguments.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, DispatchError> {
        let method = self.implementation.method_for_args(name, args).ok_or_else(|| {
            let types = self.implementation.types();
            DispatchError::UnknownMethodName {
                implementee: self.implementation.implementee().name.clone(),
                name: name.to_string(),
                arg_types: args.iter().map(|a| types.describe(&**a)).collect(),
            }
        })?;
        self.invoke(method, args)
    }
}
