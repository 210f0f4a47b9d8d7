//! Descriptors of implementees and implementors
//!
//! These are the statically known inputs of the [crate::Resolver]: the implementee lists the
//! method signatures callers see, and every implementor lists the methods it brings along
//! with the code to run them.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::types::{type_names, BoxError, TypeName, Value, BOOL};

/// Callable body of an implementor method
pub type MethodBody =
    Arc<dyn Fn(&(dyn Any + Send + Sync), &[Value]) -> Result<Value, BoxError> + Send + Sync>;

/// Shape of the implementee type, deciding which stand-ins can be built for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImplementeeKind {
    /// Pure interface: only abstract methods
    Interface,
    /// Class with at least one abstract method
    Abstract,
    /// Class that can be instantiated and extended
    Concrete,
    /// Class that can not be extended: no stand-in can be built
    Sealed,
}

/// Name, parameter types and return type of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<TypeName>,
    pub ret: TypeName,
}

impl MethodSig {
    pub fn new<I, N>(name: &str, params: I, ret: impl Into<TypeName>) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<TypeName>,
    {
        Self {
            name: name.to_string(),
            params: type_names(params),
            ret: ret.into(),
        }
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

/// The contract type jointly satisfied by several implementors
#[derive(Debug, Clone)]
pub struct ImplementeeDesc {
    pub name: TypeName,
    pub kind: ImplementeeKind,
    pub methods: Vec<MethodSig>,
}

impl ImplementeeDesc {
    pub fn new(name: impl Into<TypeName>, kind: ImplementeeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            methods: Vec::new(),
        }
    }

    pub fn interface(name: impl Into<TypeName>) -> Self {
        Self::new(name, ImplementeeKind::Interface)
    }

    /// Add a method signature
    pub fn method<I, N>(mut self, name: &str, params: I, ret: impl Into<TypeName>) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<TypeName>,
    {
        self.methods.push(MethodSig::new(name, params, ret));
        self
    }
}

/// Raised by typed method bodies when handed an instance of another type
#[derive(Error, Debug)]
#[error("instance is not a `{expected}`")]
pub struct InstanceMismatch {
    pub expected: &'static str,
}

/// One method of an implementor
#[derive(Clone)]
pub struct MethodDesc {
    pub sig: MethodSig,
    pub body: MethodBody,
}

impl fmt::Debug for MethodDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDesc").field("sig", &self.sig).finish_non_exhaustive()
    }
}

/// A concrete type contributing methods to an implementee
///
/// An implementee providing default method bodies is registered as an implementor
/// under its own name.
#[derive(Debug, Clone)]
pub struct ImplementorDesc {
    pub name: TypeName,
    pub methods: Vec<MethodDesc>,
}

impl ImplementorDesc {
    pub fn new(name: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Add a method with an untyped body
    pub fn raw_method(mut self, sig: MethodSig, body: MethodBody) -> Self {
        self.methods.push(MethodDesc { sig, body });
        self
    }

    /// Add a method whose body runs on an instance of the Rust type `T`.
    ///
    /// The returned value is wrapped as a [Value].
    pub fn method<T, R, I, N, F>(
        self,
        name: &str,
        params: I,
        ret: impl Into<TypeName>,
        f: F,
    ) -> Self
    where
        T: Any,
        R: Any + Send + Sync,
        I: IntoIterator<Item = N>,
        N: Into<TypeName>,
        F: Fn(&T, &[Value]) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        let body: MethodBody = Arc::new(move |instance: &(dyn Any + Send + Sync), args: &[Value]| {
            let this = instance.downcast_ref::<T>().ok_or(InstanceMismatch {
                expected: type_name::<T>(),
            })?;
            let out: Value = Arc::new(f(this, args)?);
            Ok(out)
        });
        self.raw_method(MethodSig::new(name, params, ret), body)
    }

    /// Add a boolean method usable as a validity check.
    pub fn validity<T, I, N, F>(self, name: &str, params: I, f: F) -> Self
    where
        T: Any,
        I: IntoIterator<Item = N>,
        N: Into<TypeName>,
        F: Fn(&T, &[Value]) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.method(name, params, BOOL, f)
    }

    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDesc> + 'a {
        self.methods.iter().filter(move |m| m.sig.name == name)
    }
}
