//! Creates the resources under test and reads back their addresses.

use crate::{
    core::{job::service_name, topology, Protocol, Topology, Workload},
    k8s::{self, NetworkPolicy, ObjectMeta, ResourceExt},
};
use anyhow::{anyhow, Context, Result};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use std::net::IpAddr;
use tokio::time;

const FIELD_MANAGER: &str = "netpol-verifier";
const AGNHOST_IMAGE: &str = "registry.k8s.io/e2e-test-images/agnhost:2.43";

#[derive(Clone)]
pub struct Cluster {
    client: kube::Client,
}

// === impl Cluster ===

impl Cluster {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Applies a namespace for each namespace in the topology and a pod and service for each
    /// workload.
    #[tracing::instrument(skip_all)]
    pub async fn apply(&self, topology: &Topology) -> Result<()> {
        let params = PatchParams::apply(FIELD_MANAGER).force();

        let namespaces = Api::<k8s::Namespace>::all(self.client.clone());
        for ns in topology.namespaces() {
            namespaces
                .patch(&ns.name, &params, &Patch::Apply(mk_namespace(ns)))
                .await
                .with_context(|| format!("failed to apply namespace {}", ns.name))?;
            tracing::debug!(namespace = %ns.name, "Applied");
        }

        for workload in topology.workloads() {
            let pods = Api::<k8s::Pod>::namespaced(self.client.clone(), &workload.namespace);
            pods.patch(&workload.name, &params, &Patch::Apply(mk_pod(workload)))
                .await
                .with_context(|| format!("failed to apply pod {}", workload.key()))?;

            let services =
                Api::<k8s::Service>::namespaced(self.client.clone(), &workload.namespace);
            services
                .patch(
                    &service_name(workload),
                    &params,
                    &Patch::Apply(mk_service(workload)),
                )
                .await
                .with_context(|| format!("failed to apply service for {}", workload.key()))?;
            tracing::debug!(workload = %workload.key(), "Applied");
        }

        Ok(())
    }

    /// Waits for every pod to be ready and records its IP in the topology.
    #[tracing::instrument(skip_all)]
    pub async fn await_ips(&self, topology: &mut Topology, timeout: time::Duration) -> Result<()> {
        let keys = topology
            .workloads()
            .map(Workload::key)
            .collect::<Vec<_>>();
        for key in keys {
            let api = Api::<k8s::Pod>::namespaced(self.client.clone(), &key.namespace);
            let ready = kube::runtime::wait::await_condition(
                api.clone(),
                &key.name,
                |pod: Option<&k8s::Pod>| pod.map(is_ready).unwrap_or(false),
            );
            match time::timeout(timeout, ready).await {
                Ok(Ok(_)) => {}
                Ok(Err(error)) => {
                    return Err(anyhow!(error).context(format!("failed to watch pod {}", key)))
                }
                Err(_) => return Err(anyhow!("timed out waiting for pod {} to be ready", key)),
            }

            let pod = api
                .get(&key.name)
                .await
                .with_context(|| format!("failed to get pod {}", key))?;
            let ip = pod_ip(&pod).ok_or_else(|| anyhow!("pod {} has no IP", key))?;
            topology.set_ip(&key, ip)?;
            tracing::info!(workload = %key, %ip, "Ready");
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_network_policies(&self, namespaces: &[String]) -> Result<()> {
        for ns in namespaces {
            let api = Api::<NetworkPolicy>::namespaced(self.client.clone(), ns);
            api.delete_collection(&DeleteParams::default(), &ListParams::default())
                .await
                .with_context(|| format!("failed to delete network policies in {}", ns))?;
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(policy = %policy.name_any()))]
    pub async fn create_network_policy(&self, policy: &NetworkPolicy) -> Result<()> {
        let name = policy.name_any();
        let ns = policy
            .namespace()
            .ok_or_else(|| anyhow!("network policy {} has no namespace", name))?;
        let api = Api::<NetworkPolicy>::namespaced(self.client.clone(), &ns);
        api.create(&PostParams::default(), policy)
            .await
            .with_context(|| format!("failed to create network policy {}/{}", ns, name))?;
        Ok(())
    }
}

fn mk_namespace(ns: &topology::Namespace) -> k8s::Namespace {
    k8s::Namespace {
        metadata: ObjectMeta {
            name: Some(ns.name.clone()),
            labels: Some(ns.labels.as_ref().clone()),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn mk_pod(workload: &Workload) -> k8s::Pod {
    k8s::Pod {
        metadata: ObjectMeta {
            name: Some(workload.name.clone()),
            namespace: Some(workload.namespace.clone()),
            labels: Some(workload.labels.as_ref().clone()),
            ..Default::default()
        },
        spec: Some(k8s::PodSpec {
            containers: workload.containers.iter().map(mk_container).collect(),
            termination_grace_period_seconds: Some(0),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mk_container(container: &topology::Container) -> k8s::Container {
    let mut command = vec!["/agnhost".to_string()];
    let mut env = vec![];
    for port in &container.ports {
        match port.protocol {
            Protocol::Tcp | Protocol::Udp => command.extend([
                "serve-hostname".to_string(),
                "--http=false".to_string(),
                format!("--{}", port.protocol.as_str().to_ascii_lowercase()),
                format!("--port={}", port.port),
            ]),
            Protocol::Sctp => {
                command.push("porter".to_string());
                env.push(k8s::api::core::v1::EnvVar {
                    name: format!("SERVE_SCTP_PORT_{}", port.port),
                    value: Some("foo".to_string()),
                    ..Default::default()
                });
            }
        }
    }

    k8s::Container {
        name: container.name.clone(),
        image: Some(AGNHOST_IMAGE.to_string()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: Some(command),
        env: (!env.is_empty()).then_some(env),
        ports: Some(
            container
                .ports
                .iter()
                .map(|p| k8s::ContainerPort {
                    name: p.name.clone(),
                    container_port: i32::from(p.port),
                    protocol: Some(p.protocol.to_string()),
                    ..Default::default()
                })
                .collect(),
        ),
        ..Default::default()
    }
}

fn mk_service(workload: &Workload) -> k8s::Service {
    k8s::Service {
        metadata: ObjectMeta {
            name: Some(service_name(workload)),
            namespace: Some(workload.namespace.clone()),
            ..Default::default()
        },
        spec: Some(k8s::api::core::v1::ServiceSpec {
            selector: Some(workload.labels.as_ref().clone()),
            ports: Some(
                workload
                    .ports()
                    .map(|(_, p)| k8s::api::core::v1::ServicePort {
                        name: p.name.clone(),
                        port: i32::from(p.port),
                        protocol: Some(p.protocol.to_string()),
                        target_port: Some(IntOrString::Int(i32::from(p.port))),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn is_ready(pod: &k8s::Pod) -> bool {
    let ready = pod
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false);
    ready && pod_ip(pod).is_some()
}

fn pod_ip(pod: &k8s::Pod) -> Option<IpAddr> {
    pod.status.as_ref()?.pod_ip.as_deref()?.parse().ok()
}
