//! Predicate dispatch across several implementors of one contract.
//!
//! An abstract contract (the *implementee*) can be jointly satisfied by several independently
//! registered concrete types (the *implementors*). Every call on the contract is routed at runtime
//! to a single implementor method, chosen from the declared parameter types of the candidates and
//! from optional validity checks evaluated on the actual arguments.
//!
//! # Simple use case
//!
//! ```
//! # use std::sync::Arc;
//! # use multimpl::*;
//! struct Small;
//! struct Large;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut types = TypeSystem::new();
//! types.declare_runtime::<i64>("Long", [OBJECT])?;
//! let types = Arc::new(types);
//!
//! // Declare the contract and the implementors sharing it
//! let sizer = ImplementeeDesc::interface("Sizer").method("size", ["Long"], STRING);
//! let small = ImplementorDesc::new("Small")
//!     .method("size", ["Long"], STRING, |_: &Small, _| Ok("small".to_string()))
//!     .validity("is_small", ["Long"], |_: &Small, args| Ok(*arg::<i64>(args, 0)? < 10));
//! let large = ImplementorDesc::new("Large")
//!     .method("size", ["Long"], STRING, |_: &Large, _| Ok("large".to_string()));
//! let markers =
//!     Markers::new().mark("Small", "size", MethodMarker::default().validity("is_small"));
//!
//! // Resolve the candidate table once, then bind it to live instances
//! let implementation = Arc::new(Resolver::new(types).resolve(&sizer, &[small, large], &markers)?);
//! let mut source = PreparedSource::new(&implementation);
//! source.add(&"Small".into(), Arc::new(Small));
//! source.add(&"Large".into(), Arc::new(Large));
//! let stand_in = InterfaceBuilder.build(implementation, Arc::new(source))?;
//!
//! let size = stand_in.call("size", &[to_value(3_i64)])?;
//! assert_eq!(from_value::<String>(size)?, "small");
//! let size = stand_in.call("size", &[to_value(300_i64)])?;
//! assert_eq!(from_value::<String>(size)?, "large");
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! * The [TypeSystem] declares nominal types and their supertypes, and binds some of them to Rust
//!   types so that runtime values carried as [Value] can be recognized.
//! * The [Resolver] turns an implementee, its implementors and the [Markers] into an immutable
//!   [Implementation]: one ordered candidate list per implementee method.
//! * An [InstanceSource] supplies the live instances of each implementor, either prepared
//!   eagerly ([PreparedSource]) or fetched through holders ([HolderSource]) that keep a single
//!   instance or fetch a fresh one on every call, optionally unwrapping interception wrappers.
//! * The dispatcher ([invoke]) scans the candidates in order and invokes the first one whose
//!   types, instances and validity check accept the call.
//! * A [StandInBuilder] binds everything into a [StandIn], and [stand_in!] generates typed
//!   facades implementing a Rust trait on top of it.
//! * [Wiring] drives the whole setup against a [ComponentRegistry].

mod dispatch;
mod holder;
mod markers;
mod model;
mod peel;
mod registry;
mod resolve;
mod source;
mod standin;
mod types;
mod wiring;

pub use dispatch::{invoke, select, DispatchError, Dispatcher, NoMatchingImplementor, Selection};
pub use holder::{HolderError, PerCallHolder, Provide, Provider, SingleFetchHolder};
pub use markers::{MarkerError, Markers, MethodMarker};
pub use model::{
    ImplementeeDesc, ImplementeeKind, ImplementorDesc, InstanceMismatch, MethodBody, MethodDesc,
    MethodSig,
};
pub use peel::{Fetched, Peeler, ProxyPeelingError, Unwrappable, INTERFACE_PROXY, SUBCLASS_PROXY};
pub use registry::{ComponentInfo, ComponentRegistry, Components, Scope, WiringError};
pub use resolve::{Candidate, Implementation, MethodId, ResolutionError, Resolver, Validity};
pub use source::{HolderSource, InstanceSource, PreparedSource};
pub use standin::{AsStandIn, InterfaceBuilder, Shape, StandIn, StandInBuilder, SubclassBuilder};
pub use types::{
    arg, from_value, to_value, type_names, ArgError, BoxError, Instance, TypeName, TypeSystem,
    Value, BOOL, OBJECT, STRING, UNIT,
};
pub use wiring::Wiring;
