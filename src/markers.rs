//! Per-method markers: validity checks, priorities, exclusions and aliases
//!
//! Markers are a plain configuration value handed to the resolver. They can be built in code
//! or loaded from a TOML document:
//!
//! ```
//! # use multimpl::Markers;
//! let markers = Markers::from_toml_str(r#"
//!     [[marker]]
//!     implementor = "DoubleHandler"
//!     method = "handle"
//!     validity = "is_one"
//!     priority = 1
//! "#).unwrap();
//! assert_eq!(markers.get("DoubleHandler", "handle").unwrap().priority, Some(1));
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::model::ImplementorDesc;
use crate::types::TypeName;

/// Markers attached to one implementor method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodMarker {
    /// Name of a boolean method on the same implementor gating this one
    pub validity: Option<String>,
    /// Tie-breaker between equally specific candidates, lower first
    pub priority: Option<i32>,
    /// Never use this method as a candidate
    pub excluded: bool,
    /// Name of the implementee method implemented, when it differs
    pub implements: Option<String>,
}

impl MethodMarker {
    pub fn validity(mut self, method: &str) -> Self {
        self.validity = Some(method.to_string());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    pub fn implements(mut self, method: &str) -> Self {
        self.implements = Some(method.to_string());
        self
    }
}

/// Errors raised while loading markers
#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("cannot read marker file")]
    Io(#[from] std::io::Error),
    #[error("invalid marker document")]
    Parse(#[from] toml::de::Error),
    #[error("method `{implementor}::{method}` is marked twice")]
    Duplicate { implementor: TypeName, method: String },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MarkerDocument {
    #[serde(default)]
    marker: Vec<MarkerEntry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MarkerEntry {
    implementor: String,
    method: String,
    #[serde(default)]
    validity: Option<String>,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default)]
    excluded: bool,
    #[serde(default)]
    implements: Option<String>,
}

impl MarkerEntry {
    fn into_parts(self) -> ((TypeName, String), MethodMarker) {
        let marker = MethodMarker {
            validity: self.validity,
            priority: self.priority,
            excluded: self.excluded,
            implements: self.implements,
        };
        ((TypeName::from(self.implementor), self.method), marker)
    }
}

/// Markers for all implementor methods, keyed by implementor and method name
///
/// A marker applies to every overload of the named method.
#[derive(Debug, Clone, Default)]
pub struct Markers {
    entries: IndexMap<(TypeName, String), MethodMarker>,
}

impl Markers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a marker, replacing any previous one for the same method
    pub fn mark(
        mut self,
        implementor: impl Into<TypeName>,
        method: &str,
        marker: MethodMarker,
    ) -> Self {
        self.entries.insert((implementor.into(), method.to_string()), marker);
        self
    }

    pub fn get(&self, implementor: impl Into<TypeName>, method: &str) -> Option<&MethodMarker> {
        self.entries.get(&(implementor.into(), method.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeName, &str, &MethodMarker)> {
        self.entries
            .iter()
            .map(|((implementor, method), marker)| (implementor, method.as_str(), marker))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the markers targeting one of the given implementors
    pub fn restricted_to(&self, implementors: &[ImplementorDesc]) -> Self {
        let entries = self
            .entries
            .iter()
            .filter(|((implementor, _), _)| implementors.iter().any(|i| &i.name == implementor))
            .map(|(key, marker)| (key.clone(), marker.clone()))
            .collect();
        Self { entries }
    }

    /// Parse markers from a TOML document made of `[[marker]]` tables
    pub fn from_toml_str(source: &str) -> Result<Self, MarkerError> {
        let document: MarkerDocument = toml::from_str(source)?;
        let mut markers = Markers::new();
        for entry in document.marker {
            let (key, marker) = entry.into_parts();
            if markers.entries.contains_key(&key) {
                let (implementor, method) = key;
                return Err(MarkerError::Duplicate { implementor, method });
            }
            markers.entries.insert(key, marker);
        }
        Ok(markers)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MarkerError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}
