use crate::{
    cluster::Cluster,
    core::{JobBuilder, Policy, PortProtocol, ProbeConfig, ProbeMode, Protocol, Topology, WorkloadKey},
    generator::{Generator, Mode},
    k8s::{network_policy, NetworkPolicy},
    probe::KubeProbe,
    verify::verify,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::time::{self, Duration};
use tracing::info;

/// Time for a newly created policy to be enforced before probing.
const POLICY_SETTLE: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[clap(
    name = "netpol-verifier",
    about = "Verifies a cluster's network policy enforcement against a model"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "netpol_verifier=info,warn",
        env = "NETPOL_VERIFIER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    /// The catalogue of generated policies to verify.
    #[clap(long, value_enum, required_unless_present = "policy")]
    mode: Option<Mode>,

    /// Whether generated egress policies allow DNS.
    #[clap(long, default_value = "true", action = clap::ArgAction::Set)]
    allow_dns: bool,

    /// Prints every matrix, even when observations agree with the model.
    #[clap(long)]
    noisy: bool,

    /// A YAML file of network policies to verify. May be repeated.
    #[clap(long)]
    policy: Vec<PathBuf>,

    #[clap(long, default_value = "x,y,z")]
    namespaces: Names,

    #[clap(long, default_value = "a,b,c")]
    pods: Names,

    /// The port served by every pod.
    #[clap(long, default_value = "80")]
    port: u16,

    #[clap(long, default_value = "tcp")]
    protocol: Protocol,

    /// Restricts probing to a single port, by number or name. All served ports are probed
    /// otherwise.
    #[clap(long)]
    probe_port: Option<String>,

    #[clap(long, requires = "probe_port")]
    probe_protocol: Option<String>,

    #[clap(long, default_value = "service-name")]
    probe_mode: ProbeMode,

    #[clap(long, default_value = "5")]
    probe_timeout_secs: u64,

    #[clap(long, default_value = "10")]
    probe_concurrency: usize,

    /// How long to wait for each pod to become ready.
    #[clap(long, default_value = "120")]
    pod_timeout_secs: u64,

    #[clap(long, default_value = "cluster.local")]
    cluster_domain: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            mode,
            allow_dns,
            noisy,
            policy,
            namespaces: Names(namespaces),
            pods: Names(pods),
            port,
            protocol,
            probe_port,
            probe_protocol,
            probe_mode,
            probe_timeout_secs,
            probe_concurrency,
            pod_timeout_secs,
            cluster_domain,
        } = self;

        log_format
            .try_init(log_level)
            .map_err(|error| anyhow!("failed to initialize logging: {}", error))?;

        let config = ProbeConfig::parse(probe_port.as_deref(), probe_protocol.as_deref(), probe_mode)?;
        let builder = JobBuilder {
            timeout: Duration::from_secs(probe_timeout_secs),
            cluster_domain,
        };

        let mut topology = {
            let namespaces = namespaces.iter().map(String::as_str).collect::<Vec<_>>();
            let pods = pods.iter().map(String::as_str).collect::<Vec<_>>();
            Topology::default_model(&namespaces, &pods, &[PortProtocol::new(protocol, port)])
        };

        let client = client.try_client().await?;
        let cluster = Cluster::new(client.clone());
        cluster.apply(&topology).await?;
        cluster
            .await_ips(&mut topology, Duration::from_secs(pod_timeout_secs))
            .await?;
        topology.require_ips()?;

        let mut policies = Vec::new();
        for path in &policy {
            policies.extend(read_policies(path).await?);
        }
        if let Some(mode) = mode {
            let generator = Generator {
                peer_ip: peer_ip(&topology, &namespaces, &pods)?,
                namespaces: namespaces.clone(),
                port: PortProtocol::new(protocol, port),
                allow_dns,
            };
            policies.extend(generator.policies(mode));
        }
        info!(policies = policies.len(), "Verifying");

        let probe = KubeProbe::new(client, &topology);
        let namespaces = cleanup_namespaces(&topology, &policies);
        let mut inconsistent = 0;
        for (i, policy) in policies.iter().enumerate() {
            cluster.delete_network_policies(&namespaces).await?;
            cluster
                .create_network_policy(&NetworkPolicy::from(policy))
                .await?;
            time::sleep(POLICY_SETTLE).await;

            let report = verify(
                &probe,
                &topology,
                policy,
                &config,
                &builder,
                probe_concurrency,
            )
            .await?;
            report.print(noisy)?;
            if !report.is_consistent() {
                inconsistent += 1;
            }
            info!(policy = %policy.id(), "Finished policy #{}", i + 1);
        }
        cluster.delete_network_policies(&namespaces).await?;

        info!(policies = policies.len(), inconsistent, "Finished");
        Ok(())
    }
}

async fn read_policies(path: &Path) -> Result<Vec<Policy>> {
    let yaml = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    network_policy::from_yaml(&yaml)
        .with_context(|| format!("failed to parse {}", path.display()))?
        .into_iter()
        .map(|doc| {
            Policy::try_from(doc).with_context(|| format!("invalid policy in {}", path.display()))
        })
        .collect()
}

/// The namespaces that may hold policies under test: every namespace of the topology and the
/// namespace of each policy.
fn cleanup_namespaces(topology: &Topology, policies: &[Policy]) -> Vec<String> {
    let mut namespaces = topology
        .namespaces()
        .map(|ns| ns.name.clone())
        .collect::<Vec<_>>();
    for policy in policies {
        if !namespaces.contains(&policy.target.namespace) {
            namespaces.push(policy.target.namespace.clone());
        }
    }
    namespaces
}

/// The address generated IP-block peers refer to: the second pod of the first namespace.
fn peer_ip(topology: &Topology, namespaces: &[String], pods: &[String]) -> Result<std::net::IpAddr> {
    let ns = namespaces
        .first()
        .ok_or_else(|| anyhow!("at least one namespace is required"))?;
    let pod = pods
        .get(1)
        .or_else(|| pods.first())
        .ok_or_else(|| anyhow!("at least one pod is required"))?;
    let key = WorkloadKey::new(ns, pod);
    let workload = topology
        .workload(&key)
        .ok_or_else(|| anyhow!("unknown workload {}", key))?;
    Ok(workload.ip()?)
}

#[derive(Clone, Debug)]
struct Names(Vec<String>);

impl std::str::FromStr for Names {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        let names = s
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        if names.is_empty() {
            bail!("at least one name is required");
        }
        Ok(Self(names))
    }
}
