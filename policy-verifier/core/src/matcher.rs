//! Evaluates traffic against an indexed set of policies.
//!
//! Each workload is mapped, per direction, to the policies that govern it. A direction that no
//! policy governs allows all traffic. Otherwise, traffic is allowed if any rule of any governing
//! policy allows it; a governing policy with no rules for the direction contributes nothing, so a
//! workload governed only by such policies denies all traffic in that direction.

use crate::{
    policy::{Direction, Policy},
    topology::{Endpoint, Topology},
    Error, Outcome, PortProtocol, Result, WorkloadKey,
};
use ahash::AHashMap as HashMap;
use std::fmt;

/// Policies indexed by the workloads they target.
#[derive(Clone, Debug)]
pub struct PolicyIndex {
    policies: Vec<Policy>,
    targets: HashMap<WorkloadKey, Targets>,
}

/// Indices of the policies governing a workload, per direction.
#[derive(Clone, Debug, Default)]
struct Targets {
    ingress: Vec<usize>,
    egress: Vec<usize>,
}

/// A flow from a source workload to a destination port.
#[derive(Copy, Clone, Debug)]
pub struct Traffic<'t> {
    pub source: Endpoint<'t>,
    pub destination: Endpoint<'t>,
    pub port: PortProtocol,
}

/// The evaluation of one direction of a flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub reason: Reason,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reason {
    /// No policy governs the workload in this direction.
    Untargeted,

    /// A rule of the named policy allows the traffic.
    Allowed { policy: String },

    /// The governing policies have no rules in this direction.
    NoRules,

    /// No rule of the governing policies allows the traffic.
    NoMatchingRule,

    /// No rule allows the traffic, but some rule refers to a named port that the destination does
    /// not declare.
    UnresolvedPort,
}

/// Both directional decisions for a flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Explanation {
    pub egress: Decision,
    pub ingress: Decision,
}

// === impl PolicyIndex ===

impl PolicyIndex {
    pub fn new(topology: &Topology, policies: &[Policy]) -> Self {
        let mut targets = HashMap::<WorkloadKey, Targets>::default();
        for workload in topology.workloads() {
            let entry = targets.entry(workload.key()).or_default();
            for (i, policy) in policies.iter().enumerate() {
                if !policy.target.matches(workload) {
                    continue;
                }
                let directions = policy.target.directions;
                if directions.ingress {
                    entry.ingress.push(i);
                }
                if directions.egress {
                    entry.egress.push(i);
                }
                tracing::trace!(workload = %workload.key(), policy = %policy.id(), "Targeted");
            }
        }

        tracing::debug!(
            policies = policies.len(),
            workloads = targets.len(),
            "Indexed policies"
        );
        Self {
            policies: policies.to_vec(),
            targets,
        }
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Iterates over the policies governing `workload` in `direction`.
    pub fn targeting<'i>(
        &'i self,
        workload: &WorkloadKey,
        direction: Direction,
    ) -> Result<impl Iterator<Item = &'i Policy> + 'i> {
        let targets = self
            .targets
            .get(workload)
            .ok_or_else(|| Error::UnknownWorkload(workload.clone()))?;
        let indices = match direction {
            Direction::Ingress => &targets.ingress,
            Direction::Egress => &targets.egress,
        };
        Ok(indices.iter().map(move |&i| &self.policies[i]))
    }

    /// Evaluates the traffic as received by its destination.
    pub fn ingress(&self, traffic: &Traffic<'_>) -> Result<Decision> {
        self.decide(Direction::Ingress, traffic)
    }

    /// Evaluates the traffic as sent by its source.
    pub fn egress(&self, traffic: &Traffic<'_>) -> Result<Decision> {
        self.decide(Direction::Egress, traffic)
    }

    pub fn explain(&self, traffic: &Traffic<'_>) -> Result<Explanation> {
        Ok(Explanation {
            egress: self.egress(traffic)?,
            ingress: self.ingress(traffic)?,
        })
    }

    /// Evaluates the full flow: the source must permit egress and the destination must permit
    /// ingress.
    pub fn evaluate(&self, traffic: &Traffic<'_>) -> Result<Outcome> {
        Ok(self.explain(traffic)?.outcome())
    }

    fn decide(&self, direction: Direction, traffic: &Traffic<'_>) -> Result<Decision> {
        // The governed workload is the destination for ingress and the source for egress; the
        // other side is the peer. Ports always refer to the destination.
        let (local, peer) = match direction {
            Direction::Ingress => (traffic.destination, traffic.source),
            Direction::Egress => (traffic.source, traffic.destination),
        };
        let destination = traffic.destination.workload;

        let mut targeted = false;
        let mut has_rules = false;
        let mut unknown = false;
        for policy in self.targeting(&local.workload.key(), direction)? {
            targeted = true;
            for rule in policy.rules(direction) {
                has_rules = true;
                match rule.allows(&peer, traffic.port, destination)? {
                    Outcome::Allowed => {
                        return Ok(Decision {
                            outcome: Outcome::Allowed,
                            reason: Reason::Allowed {
                                policy: policy.id(),
                            },
                        });
                    }
                    Outcome::Unknown => unknown = true,
                    Outcome::Denied => {}
                }
            }
        }

        let decision = if !targeted {
            Decision {
                outcome: Outcome::Allowed,
                reason: Reason::Untargeted,
            }
        } else if unknown {
            Decision {
                outcome: Outcome::Unknown,
                reason: Reason::UnresolvedPort,
            }
        } else if !has_rules {
            Decision {
                outcome: Outcome::Denied,
                reason: Reason::NoRules,
            }
        } else {
            Decision {
                outcome: Outcome::Denied,
                reason: Reason::NoMatchingRule,
            }
        };
        tracing::trace!(
            %direction,
            source = %traffic.source.workload.key(),
            destination = %destination.key(),
            port = %traffic.port,
            outcome = %decision.outcome,
            "Evaluated"
        );
        Ok(decision)
    }
}

// === impl Traffic ===

impl<'t> Traffic<'t> {
    pub fn new(
        topology: &'t Topology,
        source: &WorkloadKey,
        destination: &WorkloadKey,
        port: PortProtocol,
    ) -> Result<Self> {
        Ok(Self {
            source: topology.endpoint(source)?,
            destination: topology.endpoint(destination)?,
            port,
        })
    }
}

// === impl Explanation ===

impl Explanation {
    pub fn outcome(&self) -> Outcome {
        self.egress.outcome.and(self.ingress.outcome)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Untargeted => "no policy applies".fmt(f),
            Self::Allowed { policy } => write!(f, "allowed by {}", policy),
            Self::NoRules => "no rules".fmt(f),
            Self::NoMatchingRule => "no rule matches".fmt(f),
            Self::UnresolvedPort => "named port not declared".fmt(f),
        }
    }
}
