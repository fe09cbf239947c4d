use serde::{Deserialize, Serialize};
use std::collections::BTreeMap as Map;

use crate::models::Service;

/// A scalar parameter declared by an infrastructure, such as `nWorker`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Flag(bool),
    Text(String),
}

impl From<i32> for Value {
    fn from(value: i32) -> Value {
        Value::Integer(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Value {
        Value::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Value {
        Value::Integer(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Value {
        Value::Flag(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        Value::Text(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Value {
        Value::Text(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    Parameter(Value),
    Service(Service),
}

/// The read-only resource map an infrastructure declares. Once built it is
/// never modified; deployments only read from it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InfrastructureGraph {
    resources: Map<String, Resource>,
}

impl InfrastructureGraph {
    pub fn builder() -> InfrastructureBuilder {
        InfrastructureBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        match self.resources.get(name) {
            Some(Resource::Parameter(value)) => Some(value),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.parameter(name) {
            Some(Value::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.resources
            .iter()
            .filter_map(|(name, resource)| match resource {
                Resource::Parameter(value) => Some((name.as_str(), value)),
                Resource::Service(_) => None,
            })
    }

    /// Declared services, ordered by resource name.
    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.resources.values().filter_map(|resource| match resource {
            Resource::Service(service) => Some(service),
            Resource::Parameter(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Redeclaring a resource name replaces the earlier declaration.
#[derive(Clone, Debug, Default)]
pub struct InfrastructureBuilder {
    resources: Map<String, Resource>,
}

impl InfrastructureBuilder {
    pub fn parameter<N, V>(mut self, name: N, value: V) -> InfrastructureBuilder
    where
        N: Into<String>,
        V: Into<Value>,
    {
        self.resources
            .insert(name.into(), Resource::Parameter(value.into()));
        self
    }

    pub fn service<N: Into<String>>(mut self, name: N, service: Service) -> InfrastructureBuilder {
        self.resources.insert(name.into(), Resource::Service(service));
        self
    }

    pub fn build(self) -> InfrastructureGraph {
        InfrastructureGraph {
            resources: self.resources,
        }
    }
}
