//! Core data model: resources, tags, service and policy descriptors.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The resource being accessed, as a mapping from component-defined
/// resource-dimension names (e.g. "database", "table") to values.
///
/// Backed by a `BTreeMap` so that fingerprinting for the audit cache
/// (`PolicyRepository::fingerprint`) sees a stable key order for free.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessResource(BTreeMap<String, String>);

impl AccessResource {
    /// Build a resource descriptor from an iterator of (dimension, value)
    /// pairs.
    pub fn new<I, K, V>(dims: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(dims.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// A resource with a single dimension, e.g. the synthetic `"tag"`
    /// dimension used by [`crate::request::tag_access_request`].
    pub fn single(dimension: impl Into<String>, value: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(dimension.into(), value.into());
        Self(map)
    }

    /// Read a dimension's value, if present.
    pub fn get(&self, dimension: &str) -> Option<&str> {
        self.0.get(dimension).map(String::as_str)
    }

    /// Iterate dimension/value pairs in canonical (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A tag attached to a resource at request time, used to drive the tag
/// policy stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTag {
    /// Tag name, e.g. `"PII"`.
    pub name: String,

    /// Tag attributes beyond its name (owning classification service,
    /// free-form metadata, etc).
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ResourceTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Opaque back-reference to the service (e.g. "hive", "s3") a repository's
/// policies belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDef {
    pub name: String,
    #[serde(default)]
    pub resource_dimensions: Vec<String>,
}

impl ServiceDef {
    pub fn new(name: impl Into<String>, resource_dimensions: Vec<String>) -> Self {
        Self {
            name: name.into(),
            resource_dimensions,
        }
    }
}

/// The descriptor a [`crate::evaluator::PolicyEvaluator`] returns from
/// `policy()`. Deliberately thin: everything about *how* a policy matches
/// or evaluates is internal to the evaluator; this struct only carries what
/// the engine itself needs to report back to callers
/// (`getExactMatchPolicy`, `getAllowedPolicies`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    /// The resource spec this policy covers, re-queried by
    /// `PolicyEngine::allowed_policies`.
    pub resource: AccessResource,
    pub version: i64,
}

impl Policy {
    pub fn new(id: impl Into<String>, name: impl Into<String>, resource: AccessResource) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            resource,
            version: 1,
        }
    }
}
