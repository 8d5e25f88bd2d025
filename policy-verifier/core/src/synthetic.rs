use crate::{
    matcher::{PolicyIndex, Traffic},
    Job, Matrix, Result, Topology,
};

/// The expected connectivity of a set of jobs.
///
/// Only `combined` describes whether a flow succeeds; the per-direction matrices show which side
/// of a flow is responsible when it does not.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyntheticResult {
    pub ingress: Matrix,
    pub egress: Matrix,
    pub combined: Matrix,
}

/// Evaluates every job against the indexed policies.
pub fn evaluate(index: &PolicyIndex, topology: &Topology, jobs: &[Job]) -> Result<SyntheticResult> {
    let mut result = SyntheticResult::default();
    for job in jobs {
        let (from, to, port) = (&job.source.key, &job.destination.key, job.port_protocol());
        let traffic = Traffic::new(topology, from, to, port)?;
        let explanation = index.explain(&traffic)?;

        result
            .ingress
            .set(from.clone(), to.clone(), port, explanation.ingress.outcome);
        result
            .egress
            .set(from.clone(), to.clone(), port, explanation.egress.outcome);
        result
            .combined
            .set(from.clone(), to.clone(), port, explanation.outcome());
    }

    tracing::debug!(cells = result.combined.len(), "Evaluated jobs");
    Ok(result)
}
