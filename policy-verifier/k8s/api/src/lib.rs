#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod network_policy;

pub use self::{
    labels::{Labels, Selector},
    network_policy::{DocumentError, NetworkPolicy, NetworkPolicySpec, PolicyType},
};
pub use k8s_openapi::{
    api::{
        self,
        core::v1::{Container, ContainerPort, Namespace, Pod, PodSpec, PodStatus, Service},
    },
    apimachinery::pkg::{apis::meta::v1::LabelSelector, util::intstr::IntOrString},
};
pub use kube::api::{ObjectMeta, ResourceExt};

/// The label the API server sets on every namespace to its own name.
pub const NAMESPACE_NAME_LABEL: &str = "kubernetes.io/metadata.name";
