//! Network policy verification engine
//!
//! Policies are compiled into a [`PolicyIndex`] over a [`Topology`]. A [`JobBuilder`] enumerates
//! probe jobs between every pair of workloads; [`synthetic::evaluate`] predicts the outcome of
//! each job, producing ingress, egress, and combined [`Matrix`] values. The combined matrix is
//! compared against an observed matrix to produce a [`Comparison`].
//!
//! ```text
//! [ Topology ] -> [ JobBuilder ] -> [ Job ] -> [ PolicyIndex ] -> [ Matrix ] <-> [ Comparison ]
//! ```
//!
//! Outcomes are three-valued. A flow is allowed only if the source permits egress and the
//! destination permits ingress; a named port that the destination does not declare makes an
//! outcome `Unknown` rather than denied.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod comparison;
mod error;
pub mod job;
pub mod matcher;
mod matrix;
mod network_match;
pub mod policy;
mod port;
pub mod synthetic;
mod table;
pub mod topology;

#[cfg(test)]
mod tests;

pub use self::{
    comparison::{Cell, Comparison, Disagreement, ValueCounts, Verdict},
    error::{Error, Result},
    job::{Job, JobBuilder, Jobs, PortSelection, ProbeConfig, ProbeMode, UnresolvedJob},
    matcher::{Decision, Explanation, PolicyIndex, Reason, Traffic},
    matrix::{Matrix, Outcome},
    network_match::NetworkMatch,
    policy::{Direction, Directions, Policy},
    port::{InvalidPort, InvalidProtocol, PortProtocol, PortRef, Protocol},
    synthetic::SyntheticResult,
    table::Table,
    topology::{Topology, Workload, WorkloadKey},
};
pub use ipnet::IpNet;
