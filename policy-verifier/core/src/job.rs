//! Probe jobs.
//!
//! A [`JobBuilder`] enumerates one job per (source, destination) pair, or per (source,
//! destination, container) triple when every declared port is probed. Jobs whose port cannot be
//! resolved against the destination are set aside rather than failing the build.

use crate::{
    port::{PortProtocol, PortRef, Protocol},
    topology::{Topology, Workload},
    Error, Matrix, Outcome, Result, WorkloadKey,
};
use netpol_verifier_k8s_api::Labels;
use std::{fmt, net::IpAddr, str::FromStr, time::Duration};

/// How a probe addresses its destination.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProbeMode {
    #[default]
    ServiceName,
    PodIp,
}

/// Which ports are probed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortSelection {
    /// Every port declared by each destination container.
    AllAvailable,

    /// A single port, by number or name, on every destination.
    Port { port: PortRef, protocol: Protocol },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeConfig {
    pub ports: PortSelection,
    pub mode: ProbeMode,
}

/// Identifies one side of a probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobEndpoint {
    pub key: WorkloadKey,
    pub labels: Labels,
    pub ip: Option<IpAddr>,
}

/// A single probe request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub source: JobEndpoint,
    pub destination: JobEndpoint,

    /// The host name or IP the source connects to.
    pub address: String,
    pub port: u16,
    pub port_name: Option<String>,
    pub protocol: Protocol,
    pub timeout: Duration,
    pub expected: Option<Outcome>,
}

/// A probe whose port could not be resolved on its destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnresolvedJob {
    pub source: WorkloadKey,
    pub destination: WorkloadKey,
    pub port: PortRef,
    pub protocol: Protocol,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Jobs {
    pub valid: Vec<Job>,
    pub bad_named_port: Vec<UnresolvedJob>,
    pub bad_port_protocol: Vec<UnresolvedJob>,
}

#[derive(Clone, Debug)]
pub struct JobBuilder {
    pub timeout: Duration,
    pub cluster_domain: String,
}

// === impl ProbeMode ===

impl FromStr for ProbeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "service-name" => Ok(Self::ServiceName),
            "pod-ip" => Ok(Self::PodIp),
            _ => Err(Error::InvalidProbeConfig(format!(
                "unknown probe mode: {:?}",
                s
            ))),
        }
    }
}

// === impl ProbeConfig ===

impl ProbeConfig {
    pub fn all_available(mode: ProbeMode) -> Self {
        Self {
            ports: PortSelection::AllAvailable,
            mode,
        }
    }

    pub fn port(port: impl Into<PortRef>, protocol: Protocol, mode: ProbeMode) -> Self {
        Self {
            ports: PortSelection::Port {
                port: port.into(),
                protocol,
            },
            mode,
        }
    }

    /// Builds a configuration from textual port and protocol settings.
    ///
    /// Without a port every declared port is probed. A protocol without a port is rejected.
    pub fn parse(port: Option<&str>, protocol: Option<&str>, mode: ProbeMode) -> Result<Self> {
        let protocol = protocol
            .map(|p| {
                p.parse::<Protocol>()
                    .map_err(|e| Error::InvalidProbeConfig(e.to_string()))
            })
            .transpose()?;
        match (port, protocol) {
            (None, None) => Ok(Self::all_available(mode)),
            (None, Some(_)) => Err(Error::InvalidProbeConfig(
                "a protocol requires a port".to_string(),
            )),
            (Some(port), protocol) => {
                let port = port
                    .parse::<PortRef>()
                    .map_err(|e| Error::InvalidProbeConfig(e.to_string()))?;
                Ok(Self::port(port, protocol.unwrap_or_default(), mode))
            }
        }
    }
}

// === impl Job ===

impl Job {
    pub fn port_protocol(&self) -> PortProtocol {
        PortProtocol::new(self.protocol, self.port)
    }

    /// The `host:port` the source connects to.
    pub fn target(&self) -> String {
        if self.address.contains(':') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} on {}",
            self.source.key,
            self.destination.key,
            self.port_protocol()
        )
    }
}

// === impl JobBuilder ===

impl Default for JobBuilder {
    fn default() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            cluster_domain: Self::DEFAULT_CLUSTER_DOMAIN.to_string(),
        }
    }
}

impl JobBuilder {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_CLUSTER_DOMAIN: &'static str = "cluster.local";

    /// Enumerates probe jobs over every ordered pair of workloads.
    ///
    /// When `expected` is set, each valid job carries the outcome recorded for it, which must be
    /// present.
    pub fn build(
        &self,
        topology: &Topology,
        config: &ProbeConfig,
        expected: Option<&Matrix>,
    ) -> Result<Jobs> {
        let mut jobs = Jobs::default();

        for source in topology.workloads() {
            for destination in topology.workloads() {
                match &config.ports {
                    PortSelection::AllAvailable => {
                        for (_, port) in destination.ports() {
                            let job = self.job(
                                config.mode,
                                source,
                                destination,
                                PortProtocol::new(port.protocol, port.port),
                                port.name.clone(),
                            )?;
                            jobs.valid.push(job);
                        }
                    }

                    PortSelection::Port {
                        port: PortRef::Number(number),
                        protocol,
                    } => match destination.resolve_numbered_port(*number, *protocol) {
                        Some(declared) => {
                            let job = self.job(
                                config.mode,
                                source,
                                destination,
                                PortProtocol::new(*protocol, *number),
                                declared.name.clone(),
                            )?;
                            jobs.valid.push(job);
                        }
                        None => jobs.bad_port_protocol.push(UnresolvedJob {
                            source: source.key(),
                            destination: destination.key(),
                            port: PortRef::Number(*number),
                            protocol: *protocol,
                        }),
                    },

                    PortSelection::Port {
                        port: PortRef::Name(name),
                        protocol,
                    } => match destination.resolve_named_port(name, *protocol) {
                        Some(number) => {
                            let job = self.job(
                                config.mode,
                                source,
                                destination,
                                PortProtocol::new(*protocol, number),
                                Some(name.clone()),
                            )?;
                            jobs.valid.push(job);
                        }
                        None => jobs.bad_named_port.push(UnresolvedJob {
                            source: source.key(),
                            destination: destination.key(),
                            port: PortRef::Name(name.clone()),
                            protocol: *protocol,
                        }),
                    },
                }
            }
        }

        if let Some(matrix) = expected {
            for job in &mut jobs.valid {
                let port = job.port_protocol();
                let outcome = matrix
                    .get(&job.source.key, &job.destination.key, port)
                    .ok_or_else(|| Error::MissingExpectation {
                        from: job.source.key.clone(),
                        to: job.destination.key.clone(),
                        port,
                    })?;
                job.expected = Some(outcome);
            }
        }

        tracing::debug!(
            valid = jobs.valid.len(),
            bad_named_port = jobs.bad_named_port.len(),
            bad_port_protocol = jobs.bad_port_protocol.len(),
            "Built jobs"
        );
        Ok(jobs)
    }

    fn job(
        &self,
        mode: ProbeMode,
        source: &Workload,
        destination: &Workload,
        port: PortProtocol,
        port_name: Option<String>,
    ) -> Result<Job> {
        let address = match mode {
            ProbeMode::ServiceName => self.service_name(destination),
            ProbeMode::PodIp => destination.ip()?.to_string(),
        };
        Ok(Job {
            source: JobEndpoint::from(source),
            destination: JobEndpoint::from(destination),
            address,
            port: port.port,
            port_name,
            protocol: port.protocol,
            timeout: self.timeout,
            expected: None,
        })
    }

    /// The cluster-internal host name of the service fronting `workload`.
    pub fn service_name(&self, workload: &Workload) -> String {
        format!(
            "{}.{}.svc.{}",
            service_name(workload),
            workload.namespace,
            self.cluster_domain
        )
    }
}

/// The name of the service fronting `workload`.
pub fn service_name(workload: &Workload) -> String {
    format!("s-{}-{}", workload.namespace, workload.name)
}

// === impl JobEndpoint ===

impl From<&Workload> for JobEndpoint {
    fn from(workload: &Workload) -> Self {
        Self {
            key: workload.key(),
            labels: workload.labels.clone(),
            ip: workload.ip,
        }
    }
}

// === impl Jobs ===

impl Jobs {
    /// Returns true if some jobs could not be resolved. Their absence from the valid set leaves
    /// gaps in any matrix built from it.
    pub fn has_unresolved(&self) -> bool {
        !self.bad_named_port.is_empty() || !self.bad_port_protocol.is_empty()
    }
}
