//! An in-memory model of the namespaces and workloads under test.

use crate::{Error, PortProtocol, Protocol, Result};
use netpol_verifier_k8s_api::{Labels, NAMESPACE_NAME_LABEL};
use std::{collections::BTreeMap, fmt, net::IpAddr};

/// Identifies a workload within a topology.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkloadKey {
    pub namespace: String,
    pub name: String,
}

#[derive(Clone, Debug, Default)]
pub struct Topology {
    namespaces: BTreeMap<String, Namespace>,
}

#[derive(Clone, Debug)]
pub struct Namespace {
    pub name: String,
    pub labels: Labels,
    workloads: BTreeMap<String, Workload>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Workload {
    pub namespace: String,
    pub name: String,
    pub labels: Labels,

    /// Unset until the workload is running in a cluster.
    pub ip: Option<IpAddr>,

    pub containers: Vec<Container>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Container {
    pub name: String,
    pub ports: Vec<ContainerPort>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerPort {
    pub name: Option<String>,
    pub port: u16,
    pub protocol: Protocol,
}

/// A workload as seen by a policy: its own labels and its namespace's labels.
#[derive(Copy, Clone, Debug)]
pub struct Endpoint<'t> {
    pub workload: &'t Workload,
    pub namespace_labels: &'t Labels,
}

// === impl WorkloadKey ===

impl WorkloadKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl Topology ===

impl Topology {
    /// Builds the conventional test model: every pod in every namespace, each labeled with its
    /// own name (`pod=<name>`, `ns=<namespace>`), with one container per served port.
    pub fn default_model(namespaces: &[&str], pods: &[&str], ports: &[PortProtocol]) -> Self {
        let mut topology = Self::default();
        for ns in namespaces {
            let labels = Some(("ns".to_string(), ns.to_string())).into_iter().collect();
            let namespace = topology
                .namespaces
                .entry(ns.to_string())
                .or_insert_with(|| Namespace::new(*ns, labels));
            for pod in pods {
                let labels = Some(("pod".to_string(), pod.to_string()))
                    .into_iter()
                    .collect::<Labels>();
                let containers = ports.iter().copied().map(Container::serving).collect();
                namespace
                    .workloads
                    .insert(pod.to_string(), Workload::new(*ns, *pod, labels, containers));
            }
        }
        topology
    }

    pub fn add_namespace(&mut self, name: impl Into<String>, labels: Labels) -> Result<()> {
        let name = name.into();
        if self.namespaces.contains_key(&name) {
            return Err(Error::DuplicateNamespace(name));
        }
        self.namespaces
            .insert(name.clone(), Namespace::new(name, labels));
        Ok(())
    }

    pub fn add_workload(&mut self, workload: Workload) -> Result<()> {
        let ns = self
            .namespaces
            .get_mut(&workload.namespace)
            .ok_or_else(|| Error::UnknownNamespace(workload.namespace.clone()))?;
        if ns.workloads.contains_key(&workload.name) {
            return Err(Error::DuplicateWorkload(workload.key()));
        }
        ns.workloads.insert(workload.name.clone(), workload);
        Ok(())
    }

    pub fn set_ip(&mut self, key: &WorkloadKey, ip: IpAddr) -> Result<()> {
        let workload = self
            .namespaces
            .get_mut(&key.namespace)
            .and_then(|ns| ns.workloads.get_mut(&key.name))
            .ok_or_else(|| Error::UnknownWorkload(key.clone()))?;
        tracing::trace!(workload = %key, %ip, "Assigned IP");
        workload.ip = Some(ip);
        Ok(())
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.values()
    }

    pub fn workload(&self, key: &WorkloadKey) -> Option<&Workload> {
        self.namespaces
            .get(&key.namespace)
            .and_then(|ns| ns.workloads.get(&key.name))
    }

    /// Iterates over all workloads, ordered by namespace and then by name.
    pub fn workloads(&self) -> impl Iterator<Item = &Workload> {
        self.namespaces.values().flat_map(|ns| ns.workloads.values())
    }

    pub fn endpoint(&self, key: &WorkloadKey) -> Result<Endpoint<'_>> {
        let ns = self
            .namespaces
            .get(&key.namespace)
            .ok_or_else(|| Error::UnknownNamespace(key.namespace.clone()))?;
        let workload = ns
            .workloads
            .get(&key.name)
            .ok_or_else(|| Error::UnknownWorkload(key.clone()))?;
        Ok(Endpoint {
            workload,
            namespace_labels: &ns.labels,
        })
    }

    /// Fails if any workload has not been assigned an IP.
    pub fn require_ips(&self) -> Result<()> {
        match self.workloads().find(|w| w.ip.is_none()) {
            Some(w) => Err(Error::MissingIp(w.key())),
            None => Ok(()),
        }
    }
}

// === impl Namespace ===

impl Namespace {
    /// Creates a namespace, setting the name label that the API server sets on every namespace.
    pub fn new(name: impl Into<String>, labels: Labels) -> Self {
        let name = name.into();
        Self {
            labels: labels.with(NAMESPACE_NAME_LABEL, name.clone()),
            name,
            workloads: BTreeMap::new(),
        }
    }

    pub fn workloads(&self) -> impl Iterator<Item = &Workload> {
        self.workloads.values()
    }
}

// === impl Workload ===

impl Workload {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        labels: impl Into<Labels>,
        containers: Vec<Container>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            labels: labels.into(),
            ip: None,
            containers,
        }
    }

    pub fn key(&self) -> WorkloadKey {
        WorkloadKey::new(&self.namespace, &self.name)
    }

    pub fn ip(&self) -> Result<IpAddr> {
        self.ip.ok_or_else(|| Error::MissingIp(self.key()))
    }

    pub fn ports(&self) -> impl Iterator<Item = (&Container, &ContainerPort)> {
        self.containers
            .iter()
            .flat_map(|c| c.ports.iter().map(move |p| (c, p)))
    }

    /// Finds the number of the port declared with the given name and protocol.
    pub fn resolve_named_port(&self, name: &str, protocol: Protocol) -> Option<u16> {
        self.ports()
            .find(|(_, p)| p.protocol == protocol && p.name.as_deref() == Some(name))
            .map(|(_, p)| p.port)
    }

    /// Finds the declared port with the given number and protocol.
    pub fn resolve_numbered_port(&self, port: u16, protocol: Protocol) -> Option<&ContainerPort> {
        self.ports()
            .find(|(_, p)| p.protocol == protocol && p.port == port)
            .map(|(_, p)| p)
    }
}

// === impl Container ===

impl Container {
    /// A container serving a single port, named after that port.
    pub fn serving(port: PortProtocol) -> Self {
        let proto = port.protocol.as_str().to_ascii_lowercase();
        Self {
            name: format!("cont-{}-{}", port.port, proto),
            ports: vec![ContainerPort {
                name: Some(format!("serve-{}-{}", port.port, proto)),
                port: port.port,
                protocol: port.protocol,
            }],
        }
    }
}
