//! Nominal type descriptors and runtime values
//!
//! Dispatch needs two questions answered: is a declared type a subtype of another one, and what is
//! the declared type of a value seen at runtime. The [TypeSystem] answers both from explicit
//! declarations: every type lists its direct supertypes, and a type can be bound to a Rust type
//! through its [TypeId] so that values carried as [Value] can be recognized.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::ResolutionError;

/// Dynamically typed argument, return value or component instance
pub type Value = Arc<dyn Any + Send + Sync>;

/// A live implementor instance, as handed out by an instance source
pub type Instance = Value;

/// Error raised by implementor code
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Name of the top type, every declared type is assignable to it
pub const OBJECT: &str = "Object";
/// Name of the boolean type returned by validity checks
pub const BOOL: &str = "bool";
/// Name of the unit type
pub const UNIT: &str = "()";
/// Name of the owned string type
pub const STRING: &str = "String";

/// Identity of a declared type
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(Arc<str>);

impl TypeName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        TypeName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        TypeName::new(name)
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        TypeName::new(name)
    }
}

impl From<&TypeName> for TypeName {
    fn from(name: &TypeName) -> Self {
        name.clone()
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

/// Convert a list of names into type names
pub fn type_names<I, N>(names: I) -> Vec<TypeName>
where
    I: IntoIterator<Item = N>,
    N: Into<TypeName>,
{
    names.into_iter().map(Into::into).collect()
}

/// Declared type hierarchy
///
/// Supertypes must be declared before their subtypes, which keeps the hierarchy acyclic.
/// A type declared without supertypes extends [OBJECT].
#[derive(Debug, Clone)]
pub struct TypeSystem {
    types: IndexMap<TypeName, Vec<TypeName>>,
    runtime: HashMap<TypeId, TypeName>,
}

impl Default for TypeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeSystem {
    /// Create a type system with the predeclared `Object`, `bool`, `()` and `String` types.
    pub fn new() -> Self {
        let mut types = TypeSystem {
            types: IndexMap::new(),
            runtime: HashMap::new(),
        };
        types.types.insert(TypeName::new(OBJECT), Vec::new());
        types.insert_runtime::<bool>(BOOL);
        types.insert_runtime::<()>(UNIT);
        types.insert_runtime::<String>(STRING);
        types
    }

    fn insert_runtime<T: Any>(&mut self, name: &str) {
        let name = TypeName::new(name);
        self.types.insert(name.clone(), vec![TypeName::new(OBJECT)]);
        self.runtime.insert(TypeId::of::<T>(), name);
    }

    /// Declare an abstract type (no Rust value is ever recognized as exactly this type).
    pub fn declare<I, N>(&mut self, name: &str, supertypes: I) -> Result<&mut Self, ResolutionError>
    where
        I: IntoIterator<Item = N>,
        N: Into<TypeName>,
    {
        let name = TypeName::new(name);
        if self.types.contains_key(&name) {
            return Err(ResolutionError::DuplicateType(name));
        }
        let mut supertypes = type_names(supertypes);
        if let Some(unknown) = supertypes.iter().find(|s| !self.types.contains_key(*s)) {
            return Err(ResolutionError::UnknownType(unknown.clone()));
        }
        if supertypes.is_empty() {
            supertypes.push(TypeName::new(OBJECT));
        }
        self.types.insert(name, supertypes);
        Ok(self)
    }

    /// Declare a type and bind it to the Rust type `T` for runtime recognition.
    pub fn declare_runtime<T: Any>(
        &mut self,
        name: &str,
        supertypes: impl IntoIterator<Item = impl Into<TypeName>>,
    ) -> Result<&mut Self, ResolutionError> {
        if let Some(bound) = self.runtime.get(&TypeId::of::<T>()) {
            return Err(ResolutionError::RuntimeTypeBound {
                rust_type: type_name::<T>(),
                bound: bound.clone(),
            });
        }
        self.declare(name, supertypes)?;
        self.runtime.insert(TypeId::of::<T>(), TypeName::new(name));
        Ok(self)
    }

    pub fn contains(&self, name: &TypeName) -> bool {
        self.types.contains_key(name)
    }

    /// Check whether a value of type `from` can be used where `to` is expected.
    ///
    /// The relation is reflexive and transitive over declared supertypes.
    pub fn is_assignable(&self, from: &TypeName, to: &TypeName) -> bool {
        if from == to || to.as_str() == OBJECT {
            return true;
        }
        let mut pending: Vec<&TypeName> = vec![from];
        while let Some(current) = pending.pop() {
            let Some(supertypes) = self.types.get(current) else {
                continue;
            };
            for supertype in supertypes {
                if supertype == to {
                    return true;
                }
                pending.push(supertype);
            }
        }
        false
    }

    /// Check whether `a` is strictly more specific than `b`
    ///
    /// Every parameter of `a` must be assignable to the matching parameter of `b`,
    /// and at least one of them must be a proper subtype.
    pub fn is_more_specific(&self, a: &[TypeName], b: &[TypeName]) -> bool {
        if a.len() != b.len() {
            return false;
        }
        let mut strictly = false;
        for (pa, pb) in a.iter().zip(b) {
            if !self.is_assignable(pa, pb) {
                return false;
            }
            if pa != pb {
                strictly = true;
            }
        }
        strictly
    }

    /// Declared type of a runtime value, if its Rust type was bound.
    pub fn runtime_type(&self, value: &(dyn Any + Send + Sync)) -> Option<&TypeName> {
        self.runtime.get(&(*value).type_id())
    }

    /// Check whether a runtime value is an instance of a declared type.
    ///
    /// Values of unbound Rust types are only instances of [OBJECT].
    pub fn is_instance(&self, value: &(dyn Any + Send + Sync), ty: &TypeName) -> bool {
        match self.runtime_type(value) {
            Some(runtime) => self.is_assignable(runtime, ty),
            None => ty.as_str() == OBJECT,
        }
    }

    /// Human readable name of the runtime type of a value
    pub fn describe(&self, value: &(dyn Any + Send + Sync)) -> String {
        match self.runtime_type(value) {
            Some(name) => name.to_string(),
            None => String::from("<unbound>"),
        }
    }
}

/// Wrap a Rust value as a [Value].
///
/// A value that already is a [Value] is passed through instead of being wrapped twice.
pub fn to_value<T: Any + Send + Sync>(value: T) -> Value {
    let any: &dyn Any = &value;
    if let Some(existing) = any.downcast_ref::<Value>() {
        return existing.clone();
    }
    Arc::new(value)
}

/// Extract an owned Rust value from a [Value], cloning it if it is shared.
pub fn from_value<T: Any + Send + Sync + Clone>(value: Value) -> Result<T, crate::DispatchError> {
    if TypeId::of::<T>() == TypeId::of::<Value>() {
        let any: &dyn Any = &value;
        if let Some(same) = any.downcast_ref::<T>() {
            return Ok(same.clone());
        }
    }
    match value.downcast::<T>() {
        Ok(typed) => Ok(Arc::try_unwrap(typed).unwrap_or_else(|shared| (*shared).clone())),
        Err(_) => Err(crate::DispatchError::ReturnType {
            expected: type_name::<T>(),
        }),
    }
}

/// Failure to read a typed argument inside a method body
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArgError {
    #[error("missing argument {index}")]
    Missing { index: usize },
    #[error("argument {index} is not a `{expected}`")]
    Mismatch {
        index: usize,
        expected: &'static str,
    },
}

/// Borrow the argument at `index` as a `T`.
pub fn arg<T: Any>(args: &[Value], index: usize) -> Result<&T, ArgError> {
    let value = args.get(index).ok_or(ArgError::Missing { index })?;
    (**value).downcast_ref::<T>().ok_or(ArgError::Mismatch {
        index,
        expected: type_name::<T>(),
    })
}
