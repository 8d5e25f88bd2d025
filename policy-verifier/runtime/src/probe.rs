use crate::{
    core::{Job, Matrix, Outcome, Protocol, Topology, WorkloadKey},
    k8s,
};
use ahash::AHashMap as HashMap;
use anyhow::{anyhow, bail, Result};
use futures::prelude::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams};
use tokio::{io::AsyncReadExt, time};

/// Time allowed for an exec round trip beyond the connection timeout.
const EXEC_GRACE: time::Duration = time::Duration::from_secs(5);

/// Executes a single probe job.
///
/// A probe that completes reports whether the connection succeeded. Errors are reported as
/// unknown outcomes by [`run`].
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, job: &Job) -> Result<Outcome>;
}

/// Probes by executing `agnhost connect` in the source pod.
#[derive(Clone)]
pub struct KubeProbe {
    client: kube::Client,
    containers: HashMap<WorkloadKey, String>,
}

/// Runs all jobs with at most `concurrency` probes in flight.
///
/// Every job produces a cell: a probe that fails or exceeds its timeout is unknown.
pub async fn run<P>(probe: &P, jobs: &[Job], concurrency: usize) -> Matrix
where
    P: Probe + ?Sized,
{
    stream::iter(jobs)
        .map(|job| async move {
            let outcome = match time::timeout(job.timeout + EXEC_GRACE, probe.probe(job)).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(error)) => {
                    tracing::warn!(%job, %error, "Probe failed");
                    Outcome::Unknown
                }
                Err(_) => {
                    tracing::warn!(%job, "Probe timed out");
                    Outcome::Unknown
                }
            };
            if let Some(expected) = job.expected {
                if expected != outcome {
                    tracing::debug!(%job, %expected, observed = %outcome, "Unexpected outcome");
                }
            }
            (
                job.source.key.clone(),
                job.destination.key.clone(),
                job.port_protocol(),
                outcome,
            )
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect()
}

/// The `agnhost` command that connects to the job's destination.
pub fn connect_command(job: &Job) -> Vec<String> {
    let protocol = match job.protocol {
        Protocol::Tcp => "tcp",
        Protocol::Udp => "udp",
        Protocol::Sctp => "sctp",
    };
    vec![
        "/agnhost".to_string(),
        "connect".to_string(),
        job.target(),
        format!("--timeout={}s", job.timeout.as_secs().max(1)),
        format!("--protocol={}", protocol),
    ]
}

/// Maps the status of a completed `agnhost connect` exec to a connection outcome.
fn exec_outcome(status: &Status) -> Outcome {
    if status.status.as_deref() == Some("Success") {
        Outcome::Allowed
    } else {
        Outcome::Denied
    }
}

// === impl KubeProbe ===

impl KubeProbe {
    pub fn new(client: kube::Client, topology: &Topology) -> Self {
        let containers = topology
            .workloads()
            .filter_map(|w| Some((w.key(), w.containers.first()?.name.clone())))
            .collect();
        Self { client, containers }
    }
}

#[async_trait::async_trait]
impl Probe for KubeProbe {
    async fn probe(&self, job: &Job) -> Result<Outcome> {
        let source = &job.source.key;
        let container = self
            .containers
            .get(source)
            .ok_or_else(|| anyhow!("no container to probe from in {}", source))?;

        let api = Api::<k8s::Pod>::namespaced(self.client.clone(), &source.namespace);
        let params = AttachParams::default()
            .container(container.as_str())
            .stdout(false)
            .stderr(true);
        let mut attached = api
            .exec(&source.name, connect_command(job), &params)
            .await?;

        let mut stderr = String::new();
        if let Some(mut reader) = attached.stderr() {
            reader.read_to_string(&mut stderr).await?;
        }
        let status = match attached.take_status() {
            Some(status) => status.await,
            None => None,
        };
        attached.join().await?;

        let outcome = match status {
            Some(status) => exec_outcome(&status),
            None => bail!("exec in {} returned no status", source),
        };
        tracing::trace!(%job, %outcome, stderr = %stderr.trim(), "Probed");
        Ok(outcome)
    }
}
