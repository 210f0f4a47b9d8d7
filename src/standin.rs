//! Stand-in objects presented to callers in place of a single implementation
//!
//! A [StandIn] binds an [Implementation] to an [InstanceSource] and forwards every implementee
//! method to the dispatcher. The [stand_in!](crate::stand_in) macro generates a typed facade
//! implementing a Rust trait method by method on top of it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::debug;

use crate::dispatch::{DispatchError, Dispatcher};
use crate::model::ImplementeeKind;
use crate::resolve::{Implementation, MethodId, ResolutionError};
use crate::source::InstanceSource;
use crate::types::Value;

/// How the stand-in presents itself to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Implements exactly the implementee interface
    Interface,
    /// Extends the implementee type, overriding every overridable method
    Subclass,
}

/// Forwarding object for one implementee
///
/// Equality, hashing and display use the stand-in's own identity and never reach the
/// dispatcher. Implementee methods named like them are dispatched like any other method.
pub struct StandIn {
    shape: Shape,
    dispatcher: Dispatcher,
}

impl StandIn {
    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn implementation(&self) -> &Arc<Implementation> {
        self.dispatcher.implementation()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn invoke(&self, method: MethodId, args: &[Value]) -> Result<Value, DispatchError> {
        self.dispatcher.invoke(method, args)
    }

    /// Invoke the first implementee method named `name` accepting the arguments.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, DispatchError> {
        self.dispatcher.call(name, args)
    }
}

impl PartialEq for StandIn {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for StandIn {}

impl Hash for StandIn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self, state)
    }
}

impl fmt::Display for StandIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StandIn [implementee={}]", self.implementation().implementee().name)
    }
}

impl fmt::Debug for StandIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandIn")
            .field("shape", &self.shape)
            .field("implementee", &self.implementation().implementee().name)
            .finish_non_exhaustive()
    }
}

/// Marker implemented by stand-ins and the facades built on them
pub trait AsStandIn {
    fn as_stand_in(&self) -> &StandIn;
}

impl AsStandIn for StandIn {
    fn as_stand_in(&self) -> &StandIn {
        self
    }
}

/// Build a stand-in forwarding to the dispatcher bound to `(implementation, source)`
pub trait StandInBuilder {
    fn build(
        &self,
        implementation: Arc<Implementation>,
        source: Arc<dyn InstanceSource>,
    ) -> Result<StandIn, ResolutionError>;
}

/// Builds interface-shaped stand-ins, for pure interfaces only
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceBuilder;

impl StandInBuilder for InterfaceBuilder {
    fn build(
        &self,
        implementation: Arc<Implementation>,
        source: Arc<dyn InstanceSource>,
    ) -> Result<StandIn, ResolutionError> {
        let implementee = implementation.implementee();
        if implementee.kind != ImplementeeKind::Interface {
            return Err(ResolutionError::NotAnInterface(implementee.name.clone()));
        }
        debug!(implementee = %implementee.name, "interface stand-in");
        Ok(StandIn {
            shape: Shape::Interface,
            dispatcher: Dispatcher::new(implementation, source),
        })
    }
}

/// Builds subclass-shaped stand-ins, for any extensible implementee
#[derive(Debug, Clone, Copy, Default)]
pub struct SubclassBuilder;

impl StandInBuilder for SubclassBuilder {
    fn build(
        &self,
        implementation: Arc<Implementation>,
        source: Arc<dyn InstanceSource>,
    ) -> Result<StandIn, ResolutionError> {
        let implementee = implementation.implementee();
        if implementee.kind == ImplementeeKind::Sealed {
            return Err(ResolutionError::NotExtensible(implementee.name.clone()));
        }
        debug!(implementee = %implementee.name, "subclass stand-in");
        Ok(StandIn {
            shape: Shape::Subclass,
            dispatcher: Dispatcher::new(implementation, source),
        })
    }
}

/// Generate a typed facade implementing a trait on top of a [StandIn].
///
/// Every listed method must be declared in the trait as returning `Result<$Ret, DispatchError>`.
/// Arguments are wrapped with [to_value](crate::to_value) and the returned value is extracted
/// with [from_value](crate::from_value).
///
/// ```
/// # use std::sync::Arc;
/// # use multimpl::*;
/// trait Greeter {
///     fn greet(&self, name: String) -> Result<String, DispatchError>;
/// }
///
/// stand_in!(pub struct GreeterStandIn: Greeter {
///     fn greet(&self, name: String) -> String;
/// });
///
/// struct English;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let types = Arc::new(TypeSystem::new());
/// let implementee = ImplementeeDesc::interface("Greeter").method("greet", ["String"], "String");
/// let english =
///     ImplementorDesc::new("English").method("greet", ["String"], "String", |_: &English, args| {
///         Ok(format!("Hello {}", arg::<String>(args, 0)?))
///     });
/// let implementation =
///     Arc::new(Resolver::new(types).resolve(&implementee, &[english], &Markers::new())?);
/// let mut source = PreparedSource::new(&implementation);
/// source.add(&"English".into(), Arc::new(English));
///
/// let greeter = GreeterStandIn::new(InterfaceBuilder.build(implementation, Arc::new(source))?);
/// assert_eq!(greeter.greet("Bob".to_string())?, "Hello Bob");
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! stand_in {
    ($(#[$meta:meta])* $vis:vis struct $Facade:ident : $Trait:path {
        $( fn $method:ident(&self $(, $arg:ident : $ArgTy:ty)* ) -> $Ret:ty; )*
    }) => {
        $(#[$meta])*
        $vis struct $Facade(::std::sync::Arc<$crate::StandIn>);

        impl $Facade {
            pub fn new(
                stand_in: impl ::std::convert::Into<::std::sync::Arc<$crate::StandIn>>,
            ) -> Self {
                Self(stand_in.into())
            }
        }

        impl $crate::AsStandIn for $Facade {
            fn as_stand_in(&self) -> &$crate::StandIn {
                &self.0
            }
        }

        impl $Trait for $Facade {
            $(
            fn $method(
                &self $(, $arg: $ArgTy)*
            ) -> ::std::result::Result<$Ret, $crate::DispatchError> {
                let args: ::std::vec::Vec<$crate::Value> = ::std::vec![$($crate::to_value($arg)),*];
                let value = self.0.call(::std::stringify!($method), &args)?;
                $crate::from_value::<$Ret>(value)
            }
            )*
        }
    };
}
