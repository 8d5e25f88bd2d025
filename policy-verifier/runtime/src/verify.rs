use crate::{
    core::{
        synthetic, Comparison, Disagreement, Explanation, JobBuilder, Jobs, Matrix, Policy,
        PolicyIndex, ProbeConfig, SyntheticResult, Topology, Traffic,
    },
    k8s::{network_policy, NetworkPolicy},
    probe::{self, Probe},
};
use anyhow::Result;
use std::io::{self, Write};

/// The outcome of verifying a single policy against the cluster.
#[derive(Clone, Debug)]
pub struct Report {
    pub policy: Policy,
    pub jobs: Jobs,
    pub synthetic: SyntheticResult,
    pub observed: Matrix,
    pub comparison: Comparison,

    /// Each disagreeing cell with the directional decisions that predicted it.
    pub disagreements: Vec<(Disagreement, Explanation)>,
}

/// Predicts the connectivity under `policy`, probes it, and compares the two.
///
/// The policy is expected to already be in effect on the cluster.
#[tracing::instrument(skip_all, fields(policy = %policy.id()))]
pub async fn verify<P>(
    probe: &P,
    topology: &Topology,
    policy: &Policy,
    config: &ProbeConfig,
    builder: &JobBuilder,
    concurrency: usize,
) -> Result<Report>
where
    P: Probe + ?Sized,
{
    let index = PolicyIndex::new(topology, std::slice::from_ref(policy));

    let unlabeled = builder.build(topology, config, None)?;
    let synthetic = synthetic::evaluate(&index, topology, &unlabeled.valid)?;

    let jobs = builder.build(topology, config, Some(&synthetic.combined))?;
    for job in jobs.bad_named_port.iter().chain(&jobs.bad_port_protocol) {
        tracing::debug!(
            from = %job.source,
            to = %job.destination,
            port = %job.port,
            protocol = %job.protocol,
            "Skipped unresolved port"
        );
    }

    let observed = probe::run(probe, &jobs.valid, concurrency).await;
    let comparison = synthetic.combined.compare(&observed);

    let mut disagreements = Vec::new();
    for disagreement in comparison.disagreements() {
        let traffic = Traffic::new(
            topology,
            &disagreement.from,
            &disagreement.to,
            disagreement.port,
        )?;
        let explanation = index.explain(&traffic)?;
        disagreements.push((disagreement, explanation));
    }

    let counts = comparison.value_counts();
    tracing::info!(
        agree = counts.agree,
        disagree = counts.disagree,
        no_value = counts.no_value,
        skipped = jobs.bad_named_port.len() + jobs.bad_port_protocol.len(),
        "Verified"
    );

    Ok(Report {
        policy: policy.clone(),
        jobs,
        synthetic,
        observed,
        comparison,
        disagreements,
    })
}

// === impl Report ===

impl Report {
    pub fn is_consistent(&self) -> bool {
        self.disagreements.is_empty()
    }

    /// Writes the report to `out`.
    ///
    /// A consistent report is summarized by its counts unless `noisy` is set. Disagreements are
    /// always accompanied by the policy document and every matrix.
    pub fn write(&self, noisy: bool, out: &mut impl Write) -> Result<()> {
        writeln!(out, "policy {}: {}", self.policy.id(), self.comparison.value_counts())?;

        if !self.is_consistent() {
            let doc = NetworkPolicy::from(&self.policy);
            writeln!(out, "\n{}", network_policy::to_yaml(&doc)?)?;
            writeln!(out, "disagreements:")?;
            for (disagreement, explanation) in &self.disagreements {
                writeln!(
                    out,
                    "  {} (egress: {}, ingress: {})",
                    disagreement, explanation.egress.reason, explanation.ingress.reason
                )?;
            }
        }

        if noisy || !self.is_consistent() {
            for (title, table) in [
                ("ingress", self.synthetic.ingress.table()),
                ("egress", self.synthetic.egress.table()),
                ("expected", self.synthetic.combined.table()),
                ("observed", self.observed.table()),
                ("comparison", self.comparison.table()),
            ] {
                writeln!(out, "\n{}:\n{}", title, table)?;
            }
        }

        Ok(())
    }

    pub fn print(&self, noisy: bool) -> Result<()> {
        self.write(noisy, &mut io::stdout().lock())
    }
}
