//! Module identity and static metadata

use semver::Version;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique, case-sensitive module identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleName(String);

impl ModuleName {
    /// Create a module name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ModuleName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for ModuleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModuleName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ModuleName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ModuleName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Static metadata describing one module
///
/// Descriptors are produced by whatever discovery mechanism the embedding
/// application uses and handed to the registry together with a factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Unique module name
    pub name: ModuleName,

    /// Module version
    pub version: Version,

    /// Human readable description
    #[serde(default)]
    pub description: String,

    /// Modules that must be registered (any version) before this one may load
    #[serde(default)]
    pub dependencies: Vec<ModuleName>,

    /// Lower loads earlier among modules sharing the same `load_first` flag
    #[serde(default)]
    pub load_priority: i16,

    /// Lower handles an event earlier
    #[serde(default)]
    pub handle_priority: i16,

    /// Fully load this module before any ordinary module starts loading
    #[serde(default)]
    pub load_first: bool,
}

impl ModuleDescriptor {
    /// Create a descriptor with default priorities and no dependencies
    pub fn new(name: impl Into<ModuleName>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            description: String::new(),
            dependencies: Vec::new(),
            load_priority: 0,
            handle_priority: 0,
            load_first: false,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a dependency
    pub fn with_dependency(mut self, name: impl Into<ModuleName>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// Set the load priority
    pub fn with_load_priority(mut self, priority: i16) -> Self {
        self.load_priority = priority;
        self
    }

    /// Set the handle priority
    pub fn with_handle_priority(mut self, priority: i16) -> Self {
        self.handle_priority = priority;
        self
    }

    /// Set the load-first flag
    pub fn with_load_first(mut self, load_first: bool) -> Self {
        self.load_first = load_first;
        self
    }

    /// Check whether this module's version lies within the inclusive bounds
    ///
    /// Absent bounds impose no constraint.
    pub fn version_within(&self, min: Option<&Version>, max: Option<&Version>) -> bool {
        min.map_or(true, |min| self.version >= *min) && max.map_or(true, |max| self.version <= *max)
    }
}
