//! Static resolution of candidate tables
//!
//! The [Resolver] matches every implementor method against the implementee methods once, during
//! setup, and produces an immutable [Implementation]: for each implementee method, the ordered
//! list of [Candidate] implementor methods able to serve it.
//!
//! * A candidate has the same name (or an `implements` alias), the same arity, parameter types
//!   which are the same as or subtypes of the implementee parameters, and a return type
//!   assignable to the implementee return type.
//! * Candidates are ordered by parameter specificity (most specific first), then by priority
//!   (lower first), then by discovery order.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use thiserror::Error;
use tracing::debug;

use crate::markers::Markers;
use crate::model::{
    ImplementeeDesc, ImplementeeKind, ImplementorDesc, MethodBody, MethodDesc, MethodSig,
};
use crate::types::{BoxError, TypeName, TypeSystem, Value, BOOL};

/// Errors detected while building an [Implementation] or a stand-in
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("implementee `{0}` can not be extended")]
    NotExtensible(TypeName),
    #[error("implementee `{0}` is not an interface")]
    NotAnInterface(TypeName),
    #[error("unknown type `{0}`")]
    UnknownType(TypeName),
    #[error("type `{0}` is already declared")]
    DuplicateType(TypeName),
    #[error("rust type `{rust_type}` is already bound to `{bound}`")]
    RuntimeTypeBound {
        rust_type: &'static str,
        bound: TypeName,
    },
    #[error("implementee `{implementee}` declares `{method}` twice")]
    DuplicateMethod { implementee: TypeName, method: String },
    #[error("implementor `{0}` is listed twice")]
    DuplicateImplementor(TypeName),
    #[error("marker targets unknown method `{implementor}::{method}`")]
    UnknownMarkerTarget { implementor: TypeName, method: String },
    #[error("marker on `{implementor}::{method}` implements unknown method `{target}`")]
    UnknownImplemented {
        implementor: TypeName,
        method: String,
        target: String,
    },
    #[error("validity method `{implementor}::{validity}` does not exist")]
    UnknownValidity { implementor: TypeName, validity: String },
    #[error("validity method `{implementor}::{validity}` does not fit `{method}`: {reason}")]
    InvalidValidity {
        implementor: TypeName,
        validity: String,
        method: String,
        reason: &'static str,
    },
}

/// Position of a method in the implementee's method list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub(crate) usize);

impl MethodId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Validity check attached to a candidate
#[derive(Clone)]
pub struct Validity {
    pub(crate) name: String,
    pub(crate) arity: usize,
    pub(crate) body: MethodBody,
}

impl Validity {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of leading call arguments handed to the check
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub(crate) fn check(
        &self,
        instance: &(dyn Any + Send + Sync),
        args: &[Value],
    ) -> Result<bool, BoxError> {
        let out = (self.body)(instance, &args[..self.arity.min(args.len())])?;
        match (*out).downcast_ref::<bool>() {
            Some(valid) => Ok(*valid),
            None => Err(format!("validity method `{}` did not return a bool", self.name).into()),
        }
    }
}

impl fmt::Debug for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validity")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// One implementor method eligible for an implementee method
#[derive(Clone)]
pub struct Candidate {
    pub(crate) implementor: TypeName,
    pub(crate) sig: MethodSig,
    pub(crate) validity: Option<Validity>,
    pub(crate) priority: Option<i32>,
    pub(crate) discovery: usize,
    pub(crate) body: MethodBody,
}

impl Candidate {
    pub fn implementor(&self) -> &TypeName {
        &self.implementor
    }

    pub fn method(&self) -> &str {
        &self.sig.name
    }

    pub fn params(&self) -> &[TypeName] {
        &self.sig.params
    }

    pub fn ret(&self) -> &TypeName {
        &self.sig.ret
    }

    pub fn validity(&self) -> Option<&Validity> {
        self.validity.as_ref()
    }

    pub fn priority(&self) -> Option<i32> {
        self.priority
    }

    pub fn discovery(&self) -> usize {
        self.discovery
    }

    fn rank(&self) -> (i32, usize) {
        (self.priority.unwrap_or(0), self.discovery)
    }

    /// Check that every argument is a runtime instance of the declared parameter type.
    pub(crate) fn accepts(&self, types: &TypeSystem, args: &[Value]) -> bool {
        args.len() == self.sig.params.len()
            && args
                .iter()
                .zip(&self.sig.params)
                .all(|(arg, param)| types.is_instance(&**arg, param))
    }

    pub(crate) fn call(
        &self,
        instance: &(dyn Any + Send + Sync),
        args: &[Value],
    ) -> Result<Value, BoxError> {
        (self.body)(instance, args)
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("implementor", &self.implementor)
            .field("sig", &self.sig)
            .field("validity", &self.validity)
            .field("priority", &self.priority)
            .field("discovery", &self.discovery)
            .finish_non_exhaustive()
    }
}

/// Immutable candidate table for one implementee
///
/// Every implementee method maps to a candidate list, possibly empty.
#[derive(Debug)]
pub struct Implementation {
    implementee: ImplementeeDesc,
    implementors: IndexSet<TypeName>,
    table: Vec<Vec<Candidate>>,
    types: Arc<TypeSystem>,
}

impl Implementation {
    pub fn implementee(&self) -> &ImplementeeDesc {
        &self.implementee
    }

    pub fn implementors(&self) -> impl Iterator<Item = &TypeName> {
        self.implementors.iter()
    }

    pub fn is_implementor(&self, name: &TypeName) -> bool {
        self.implementors.contains(name)
    }

    pub fn types(&self) -> &TypeSystem {
        &self.types
    }

    pub fn method(&self, id: MethodId) -> Option<&MethodSig> {
        self.implementee.methods.get(id.0)
    }

    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> {
        (0..self.implementee.methods.len()).map(MethodId)
    }

    /// Find the method with the exact signature name and parameter types
    pub fn method_id(&self, name: &str, params: &[TypeName]) -> Option<MethodId> {
        self.implementee
            .methods
            .iter()
            .position(|m| m.name == name && m.params == params)
            .map(MethodId)
    }

    /// Find the first method with this name whose parameters accept the arguments
    pub fn method_for_args(&self, name: &str, args: &[Value]) -> Option<MethodId> {
        self.implementee
            .methods
            .iter()
            .position(|m| {
                m.name == name
                    && m.params.len() == args.len()
                    && args
                        .iter()
                        .zip(&m.params)
                        .all(|(arg, param)| self.types.is_instance(&**arg, param))
            })
            .map(MethodId)
    }

    pub fn candidates(&self, id: MethodId) -> &[Candidate] {
        self.table.get(id.0).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Builds [Implementation] tables from descriptors and markers
#[derive(Debug, Clone)]
pub struct Resolver {
    types: Arc<TypeSystem>,
}

impl Resolver {
    pub fn new(types: Arc<TypeSystem>) -> Self {
        Self { types }
    }

    pub fn types(&self) -> &Arc<TypeSystem> {
        &self.types
    }

    /// Build the candidate table of an implementee.
    ///
    /// The result only depends on the arguments: resolving the same input twice yields
    /// candidate lists in the same order.
    pub fn resolve(
        &self,
        implementee: &ImplementeeDesc,
        implementors: &[ImplementorDesc],
        markers: &Markers,
    ) -> Result<Implementation, ResolutionError> {
        if implementee.kind == ImplementeeKind::Sealed {
            return Err(ResolutionError::NotExtensible(implementee.name.clone()));
        }
        self.check_implementee(implementee)?;

        let mut names = IndexSet::new();
        for implementor in implementors {
            if !names.insert(implementor.name.clone()) {
                return Err(ResolutionError::DuplicateImplementor(implementor.name.clone()));
            }
            for method in &implementor.methods {
                self.check_sig(&method.sig)?;
            }
        }
        check_markers(implementee, implementors, markers)?;

        let mut pending: Vec<Vec<Candidate>> = vec![Vec::new(); implementee.methods.len()];
        let mut discovery = 0;
        for implementor in implementors {
            for method in &implementor.methods {
                let marker = markers.get(&implementor.name, &method.sig.name);
                if marker.is_some_and(|m| m.excluded) {
                    debug!(implementor = %implementor.name, method = %method.sig, "excluded");
                    continue;
                }
                let target = marker
                    .and_then(|m| m.implements.as_deref())
                    .unwrap_or(&method.sig.name);
                for (index, sig) in implementee.methods.iter().enumerate() {
                    if sig.name != target || !self.is_eligible(&method.sig, sig) {
                        continue;
                    }
                    let validity = match marker.and_then(|m| m.validity.as_deref()) {
                        Some(validity) => {
                            Some(self.find_validity(implementor, validity, &method.sig)?)
                        }
                        None => None,
                    };
                    pending[index].push(Candidate {
                        implementor: implementor.name.clone(),
                        sig: method.sig.clone(),
                        validity,
                        priority: marker.and_then(|m| m.priority),
                        discovery,
                        body: method.body.clone(),
                    });
                    discovery += 1;
                }
            }
        }

        let table: Vec<Vec<Candidate>> = pending
            .into_iter()
            .map(|candidates| self.order(candidates))
            .collect();
        for (sig, candidates) in implementee.methods.iter().zip(&table) {
            debug!(
                implementee = %implementee.name,
                method = %sig,
                candidates = candidates.len(),
                "resolved"
            );
        }

        Ok(Implementation {
            implementee: implementee.clone(),
            implementors: names,
            table,
            types: self.types.clone(),
        })
    }

    fn check_implementee(&self, implementee: &ImplementeeDesc) -> Result<(), ResolutionError> {
        for (i, sig) in implementee.methods.iter().enumerate() {
            self.check_sig(sig)?;
            let duplicated = implementee.methods[..i]
                .iter()
                .any(|other| other.name == sig.name && other.params == sig.params);
            if duplicated {
                return Err(ResolutionError::DuplicateMethod {
                    implementee: implementee.name.clone(),
                    method: sig.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_sig(&self, sig: &MethodSig) -> Result<(), ResolutionError> {
        match sig.params.iter().chain([&sig.ret]).find(|t| !self.types.contains(t)) {
            Some(unknown) => Err(ResolutionError::UnknownType(unknown.clone())),
            None => Ok(()),
        }
    }

    /// Narrowing-compatible: same arity, parameters and return type may only be subtypes.
    fn is_eligible(&self, method: &MethodSig, target: &MethodSig) -> bool {
        method.params.len() == target.params.len()
            && method
                .params
                .iter()
                .zip(&target.params)
                .all(|(p, t)| self.types.is_assignable(p, t))
            && self.types.is_assignable(&method.ret, &target.ret)
    }

    /// Pick the first overload of the validity method fitting the candidate signature
    fn find_validity(
        &self,
        implementor: &ImplementorDesc,
        validity: &str,
        method: &MethodSig,
    ) -> Result<Validity, ResolutionError> {
        let overloads: Vec<&MethodDesc> = implementor.methods_named(validity).collect();
        if overloads.is_empty() {
            return Err(ResolutionError::UnknownValidity {
                implementor: implementor.name.clone(),
                validity: validity.to_string(),
            });
        }
        let mut reason = "";
        for overload in overloads {
            if overload.sig.ret.as_str() != BOOL {
                reason = "it does not return bool";
                continue;
            }
            let fits = overload.sig.params.len() <= method.params.len()
                && overload
                    .sig
                    .params
                    .iter()
                    .zip(&method.params)
                    .all(|(v, p)| self.types.is_assignable(p, v));
            if !fits {
                reason = "its parameters are not a prefix of the method parameters";
                continue;
            }
            return Ok(Validity {
                name: validity.to_string(),
                arity: overload.sig.params.len(),
                body: overload.body.clone(),
            });
        }
        Err(ResolutionError::InvalidValidity {
            implementor: implementor.name.clone(),
            validity: validity.to_string(),
            method: method.to_string(),
            reason,
        })
    }

    /// Order candidates: repeatedly take the best ranked one that no remaining candidate
    /// is more specific than.
    fn order(&self, mut pending: Vec<Candidate>) -> Vec<Candidate> {
        pending.sort_by_key(Candidate::rank);
        let mut ordered = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let next = pending
                .iter()
                .position(|c| {
                    !pending
                        .iter()
                        .any(|other| self.types.is_more_specific(other.params(), c.params()))
                })
                .unwrap_or(0);
            ordered.push(pending.remove(next));
        }
        ordered
    }
}

fn check_markers(
    implementee: &ImplementeeDesc,
    implementors: &[ImplementorDesc],
    markers: &Markers,
) -> Result<(), ResolutionError> {
    for (implementor, method, marker) in markers.iter() {
        let desc = implementors
            .iter()
            .find(|i| &i.name == implementor)
            .filter(|i| i.methods_named(method).next().is_some());
        let Some(desc) = desc else {
            return Err(ResolutionError::UnknownMarkerTarget {
                implementor: implementor.clone(),
                method: method.to_string(),
            });
        };
        if let Some(validity) = &marker.validity {
            // signature fit is checked per candidate
            let mut overloads = desc.methods_named(validity).peekable();
            if overloads.peek().is_none() {
                return Err(ResolutionError::UnknownValidity {
                    implementor: implementor.clone(),
                    validity: validity.clone(),
                });
            }
            if !overloads.any(|m| m.sig.ret.as_str() == BOOL) {
                return Err(ResolutionError::InvalidValidity {
                    implementor: implementor.clone(),
                    validity: validity.clone(),
                    method: method.to_string(),
                    reason: "it does not return bool",
                });
            }
        }
        if let Some(target) = &marker.implements {
            if !implementee.methods.iter().any(|m| &m.name == target) {
                return Err(ResolutionError::UnknownImplemented {
                    implementor: implementor.clone(),
                    method: method.to_string(),
                    target: target.clone(),
                });
            }
        }
    }
    Ok(())
}
