//! `networking.k8s.io/v1` `NetworkPolicy` documents.
//!
//! Documents use the `k8s-openapi` types, so a parsed document can be submitted to the API server
//! as is. An omitted list and an empty list are kept distinct, as are an omitted and an empty
//! selector.

use serde::Deserialize;
use std::{fmt, str::FromStr};

pub use k8s_openapi::api::networking::v1::{
    IPBlock, NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicyIngressRule, NetworkPolicyPeer,
    NetworkPolicyPort, NetworkPolicySpec,
};

/// An entry of a policy's `policyTypes`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PolicyType {
    Ingress,
    Egress,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid policy type: {0:?}")]
pub struct InvalidPolicyType(String);

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parses every document in a (possibly multi-document) YAML stream.
pub fn from_yaml(yaml: &str) -> Result<Vec<NetworkPolicy>, DocumentError> {
    let mut policies = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(yaml) {
        let value = serde_yaml::Value::deserialize(doc)?;
        if value.is_null() {
            continue;
        }
        policies.push(serde_yaml::from_value(value)?);
    }
    Ok(policies)
}

pub fn to_yaml(policy: &NetworkPolicy) -> Result<String, DocumentError> {
    Ok(serde_yaml::to_string(policy)?)
}

pub fn from_json(json: &str) -> Result<NetworkPolicy, DocumentError> {
    Ok(serde_json::from_str(json)?)
}

pub fn to_json(policy: &NetworkPolicy) -> Result<String, DocumentError> {
    Ok(serde_json::to_string(policy)?)
}

// === impl PolicyType ===

impl PolicyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingress => "Ingress",
            Self::Egress => "Egress",
        }
    }
}

impl FromStr for PolicyType {
    type Err = InvalidPolicyType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ingress" => Ok(Self::Ingress),
            "Egress" => Ok(Self::Egress),
            _ => Err(InvalidPolicyType(s.to_string())),
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}
