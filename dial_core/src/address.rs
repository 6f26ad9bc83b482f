//! Addresses of logical algorithm instances.
//!
//! An [`Address`] names one running instance of an algorithm on one node of
//! the topology. Its string form `node/algorithm/instance` is stable and is
//! accepted back by [`str::parse`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing an address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The string does not have exactly three `/`-separated parts
    #[error("Malformed address \"{0}\": expected node/algorithm/instance")]
    Malformed(String),

    /// One of the three parts is empty
    #[error("Malformed address \"{0}\": empty component")]
    EmptyComponent(String),

    /// A part contains the `/` separator
    #[error("Malformed address component \"{0}\": contains '/'")]
    SeparatorInComponent(String),
}

/// Identifies a logical algorithm instance as `(node, algorithm, instance)`.
///
/// Addresses are plain values: they are never changed in place, related
/// addresses are derived with the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    node: String,
    algorithm: String,
    instance: String,
}

impl Address {
    /// Creates a new address without checking its parts.
    ///
    /// Use [`Address::try_new`] for names that are not known to be valid.
    /// The simulator refuses messages whose addresses fail
    /// [`Address::validate`].
    pub fn new(
        node: impl Into<String>,
        algorithm: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            algorithm: algorithm.into(),
            instance: instance.into(),
        }
    }

    /// Creates an address whose string form parses back to it.
    pub fn try_new(
        node: impl Into<String>,
        algorithm: impl Into<String>,
        instance: impl Into<String>,
    ) -> Result<Self, AddressError> {
        let address = Self::new(node, algorithm, instance);
        address.validate()?;
        Ok(address)
    }

    /// Checks that every part is non-empty and free of `/`.
    pub fn validate(&self) -> Result<(), AddressError> {
        let parts = [&self.node, &self.algorithm, &self.instance];
        if parts.iter().any(|part| part.is_empty()) {
            return Err(AddressError::EmptyComponent(self.to_string()));
        }
        match parts.iter().find(|part| part.contains('/')) {
            Some(part) => Err(AddressError::SeparatorInComponent(part.to_string())),
            None => Ok(()),
        }
    }

    /// Returns the node name.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Returns the algorithm name.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Returns the instance tag.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Copy of this address on another node.
    pub fn with_node(&self, node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            ..self.clone()
        }
    }

    /// Copy of this address for another algorithm.
    pub fn with_algorithm(&self, algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            ..self.clone()
        }
    }

    /// Copy of this address for another instance.
    pub fn with_instance(&self, instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.node, self.algorithm, self.instance)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let [node, algorithm, instance] = parts.as_slice() else {
            return Err(AddressError::Malformed(s.to_string()));
        };
        Self::try_new(*node, *algorithm, *instance)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
