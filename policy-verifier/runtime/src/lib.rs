#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use netpol_verifier_core as core;
pub use netpol_verifier_k8s_api as k8s;

mod args;
pub mod cluster;
pub mod generator;
pub mod probe;
pub mod verify;

pub use self::{
    args::Args,
    cluster::Cluster,
    generator::{Generator, Mode},
    probe::{KubeProbe, Probe},
    verify::{verify, Report},
};
