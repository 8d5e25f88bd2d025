//! A fixed catalogue of typical policies for each mode.

use crate::core::{
    policy::{Directions, NamespaceMatch, Peer, PortMatch, Rule, Target},
    Direction, IpNet, NetworkMatch, Policy, PortProtocol, Protocol,
};
use crate::k8s::{
    labels::{Expression, Operator},
    Selector,
};
use std::net::IpAddr;

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Vary the peers and ports of ingress rules.
    Ingress,

    /// Vary the peers and ports of egress rules.
    Egress,

    /// Vary the namespace and target of an ingress policy.
    VaryIngress,

    /// Vary the namespace and target of an egress policy.
    VaryEgress,
}

#[derive(Clone, Debug)]
pub struct Generator {
    /// Namespaces in which targets may be placed. The first is the typical namespace.
    pub namespaces: Vec<String>,

    /// The address of a workload used to exercise IP-block peers.
    pub peer_ip: IpAddr,

    /// The port the typical rule allows.
    pub port: PortProtocol,

    /// Whether egress policies also allow DNS.
    pub allow_dns: bool,
}

// === impl Generator ===

impl Generator {
    pub fn policies(&self, mode: Mode) -> Vec<Policy> {
        match mode {
            Mode::Ingress => self.rule_variants(Direction::Ingress),
            Mode::Egress => self.rule_variants(Direction::Egress),
            Mode::VaryIngress => self.target_variants(Direction::Ingress),
            Mode::VaryEgress => self.target_variants(Direction::Egress),
        }
    }

    /// Policies on the typical target, one per rule variant.
    fn rule_variants(&self, direction: Direction) -> Vec<Policy> {
        let ns = self.typical_namespace();
        let mut policies = vec![
            self.mk_policy("deny-all", ns, typical_target(), direction, vec![]),
            self.mk_policy(
                "allow-all",
                ns,
                typical_target(),
                direction,
                vec![Rule::allow_all()],
            ),
        ];

        for (name, peer) in self.peers() {
            let rule = Rule {
                peers: vec![peer],
                ports: vec![],
            };
            policies.push(self.mk_policy(
                &format!("peer-{}", name),
                ns,
                typical_target(),
                direction,
                vec![rule],
            ));
        }

        for (name, port) in self.ports() {
            let rule = Rule {
                peers: vec![],
                ports: vec![port],
            };
            policies.push(self.mk_policy(
                &format!("port-{}", name),
                ns,
                typical_target(),
                direction,
                vec![rule],
            ));
        }

        policies
    }

    /// The typical rule, applied to each target in each namespace.
    fn target_variants(&self, direction: Direction) -> Vec<Policy> {
        let targets = [
            ("all", Selector::default()),
            ("pod-a", typical_target()),
            (
                "pod-a-or-b",
                Some(Expression::new("pod", Operator::In, ["a", "b"]))
                    .into_iter()
                    .collect(),
            ),
            (
                "not-pod-a",
                Some(Expression::new("pod", Operator::NotIn, ["a"]))
                    .into_iter()
                    .collect(),
            ),
        ];

        let mut policies = Vec::new();
        for ns in &self.namespaces {
            for (name, selector) in &targets {
                let rule = Rule {
                    peers: vec![self.typical_peer()],
                    ports: vec![self.typical_port()],
                };
                policies.push(self.mk_policy(
                    &format!("{}-{}", ns, name),
                    ns,
                    selector.clone(),
                    direction,
                    vec![rule],
                ));
            }
        }
        policies
    }

    fn mk_policy(
        &self,
        name: &str,
        namespace: &str,
        pod_selector: Selector,
        direction: Direction,
        mut rules: Vec<Rule>,
    ) -> Policy {
        let (prefix, directions) = match direction {
            Direction::Ingress => ("ingress", Directions::INGRESS),
            Direction::Egress => ("egress", Directions::EGRESS),
        };

        let target = Target {
            namespace: namespace.to_string(),
            pod_selector,
            directions,
        };
        let name = format!("{}-{}", prefix, name);
        match direction {
            Direction::Ingress => Policy {
                name,
                target,
                ingress: rules,
                egress: vec![],
            },
            Direction::Egress => {
                if self.allow_dns {
                    rules.push(dns_rule());
                }
                Policy {
                    name,
                    target,
                    ingress: vec![],
                    egress: rules,
                }
            }
        }
    }

    fn typical_namespace(&self) -> &str {
        self.namespaces.first().map(String::as_str).unwrap_or("default")
    }

    /// Pods labeled `pod=b` in any namespace.
    fn typical_peer(&self) -> Peer {
        Peer::Pods {
            namespaces: NamespaceMatch::Selector(Selector::default()),
            pods: Some(("pod", "b")).into_iter().collect(),
        }
    }

    fn typical_port(&self) -> PortMatch {
        PortMatch::Number {
            protocol: self.port.protocol,
            port: self.port.port,
            end_port: None,
        }
    }

    fn peers(&self) -> Vec<(&'static str, Peer)> {
        let ns = self.typical_namespace().to_string();
        let mut peers = vec![
            (
                "same-namespace-pod-b",
                Peer::Pods {
                    namespaces: NamespaceMatch::Name(ns.clone()),
                    pods: Some(("pod", "b")).into_iter().collect(),
                },
            ),
            (
                "same-namespace-all",
                Peer::Pods {
                    namespaces: NamespaceMatch::Name(ns),
                    pods: Selector::default(),
                },
            ),
            ("all-namespaces-pod-b", self.typical_peer()),
        ];

        if let Some(other) = self.namespaces.get(1) {
            peers.push((
                "other-namespace",
                Peer::Pods {
                    namespaces: NamespaceMatch::Selector(
                        Some(("ns".to_string(), other.clone())).into_iter().collect(),
                    ),
                    pods: Selector::default(),
                },
            ));
            peers.push((
                "other-namespace-pod-c",
                Peer::Pods {
                    namespaces: NamespaceMatch::Selector(
                        Some(("ns".to_string(), other.clone())).into_iter().collect(),
                    ),
                    pods: Some(("pod", "c")).into_iter().collect(),
                },
            ));
        }

        let host = IpNet::from(self.peer_ip);
        peers.push(("ip", Peer::Network(NetworkMatch::from(host))));
        let prefix = if self.peer_ip.is_ipv4() { 24 } else { 120 };
        if let Ok(net) = IpNet::new(self.peer_ip, prefix) {
            peers.push((
                "ip-except",
                Peer::Network(NetworkMatch {
                    net: net.trunc(),
                    except: vec![host],
                }),
            ));
        }

        peers
    }

    fn ports(&self) -> Vec<(&'static str, PortMatch)> {
        let PortProtocol { protocol, port } = self.port;
        let proto = protocol.as_str().to_ascii_lowercase();
        vec![
            (
                "numbered",
                PortMatch::Number {
                    protocol,
                    port,
                    end_port: None,
                },
            ),
            (
                "named",
                PortMatch::Name {
                    protocol,
                    name: format!("serve-{}-{}", port, proto),
                },
            ),
            (
                "other-number",
                PortMatch::Number {
                    protocol,
                    port: port.wrapping_add(1).max(1),
                    end_port: None,
                },
            ),
            ("protocol-only", PortMatch::Protocol(protocol)),
            (
                "undeclared-name",
                PortMatch::Name {
                    protocol,
                    name: "serve-missing".to_string(),
                },
            ),
            (
                "range",
                PortMatch::Number {
                    protocol,
                    port: port.saturating_sub(1).max(1),
                    end_port: Some(port.saturating_add(1)),
                },
            ),
        ]
    }
}

fn typical_target() -> Selector {
    Some(("pod", "a")).into_iter().collect()
}

/// Allows DNS lookups to any peer.
fn dns_rule() -> Rule {
    Rule {
        peers: vec![],
        ports: vec![
            PortMatch::Number {
                protocol: Protocol::Udp,
                port: 53,
                end_port: None,
            },
            PortMatch::Number {
                protocol: Protocol::Tcp,
                port: 53,
                end_port: None,
            },
        ],
    }
}
