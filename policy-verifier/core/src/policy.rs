//! Network policies, as understood by the matcher.
//!
//! A [`Policy`] is compiled from a `NetworkPolicy` document and can be converted back to one
//! without changing its meaning. In particular, a direction that is governed by a policy but has
//! no rules (deny all) stays distinct from a direction that is not governed at all (allow all).

use crate::{
    topology::{Endpoint, Workload},
    Error, NetworkMatch, Outcome, PortProtocol, Protocol, Result,
};
use ipnet::IpNet;
use netpol_verifier_k8s_api::{
    network_policy::{
        IPBlock, NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicyIngressRule,
        NetworkPolicyPeer, NetworkPolicyPort, NetworkPolicySpec, PolicyType,
    },
    IntOrString, LabelSelector, ObjectMeta, Selector,
};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Ingress,
    Egress,
}

/// The set of directions a policy governs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Directions {
    pub ingress: bool,
    pub egress: bool,
}

/// Selects the workloads a policy applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub namespace: String,
    pub pod_selector: Selector,
    pub directions: Directions,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NamespaceMatch {
    /// Matches only the named namespace.
    Name(String),

    /// Matches namespaces by label.
    Selector(Selector),
}

/// Selects traffic counterparts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Peer {
    Pods {
        namespaces: NamespaceMatch,
        pods: Selector,
    },
    Network(NetworkMatch),
}

/// Matches the (protocol, port) of traffic.
///
/// A rule without port matchers allows every port on every protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortMatch {
    /// Any port on the given protocol.
    Protocol(Protocol),

    /// A port number, or the inclusive range `port..=end_port`.
    Number {
        protocol: Protocol,
        port: u16,
        end_port: Option<u16>,
    },

    /// A port name, resolved against the destination workload's declared ports.
    Name { protocol: Protocol, name: String },
}

/// Allows traffic from (or to) any of `peers` on any of `ports`.
///
/// An empty peer list matches all peers; an empty port list matches all ports.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rule {
    pub peers: Vec<Peer>,
    pub ports: Vec<PortMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub target: Target,
    pub ingress: Vec<Rule>,
    pub egress: Vec<Rule>,
}

// === impl Direction ===

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingress => "ingress".fmt(f),
            Self::Egress => "egress".fmt(f),
        }
    }
}

// === impl Directions ===

impl Directions {
    pub const INGRESS: Self = Self {
        ingress: true,
        egress: false,
    };
    pub const EGRESS: Self = Self {
        ingress: false,
        egress: true,
    };
    pub const BOTH: Self = Self {
        ingress: true,
        egress: true,
    };

    pub fn contains(&self, direction: Direction) -> bool {
        match direction {
            Direction::Ingress => self.ingress,
            Direction::Egress => self.egress,
        }
    }
}

// === impl Target ===

impl Target {
    pub fn matches(&self, workload: &Workload) -> bool {
        workload.namespace == self.namespace && self.pod_selector.matches(&workload.labels)
    }
}

// === impl Peer ===

impl Peer {
    pub fn matches(&self, peer: &Endpoint<'_>) -> Result<bool> {
        match self {
            Self::Pods { namespaces, pods } => {
                let ns = match namespaces {
                    NamespaceMatch::Name(name) => *name == peer.workload.namespace,
                    NamespaceMatch::Selector(selector) => selector.matches(peer.namespace_labels),
                };
                Ok(ns && pods.matches(&peer.workload.labels))
            }
            Self::Network(net) => Ok(net.contains(&peer.workload.ip()?)),
        }
    }
}

// === impl PortMatch ===

impl PortMatch {
    /// Determines whether this matcher allows `port` on `destination`.
    ///
    /// Named ports that the destination does not declare cannot be evaluated and are `Unknown`.
    pub fn allows(&self, port: PortProtocol, destination: &Workload) -> Outcome {
        match self {
            Self::Protocol(protocol) => Outcome::from(*protocol == port.protocol),
            Self::Number {
                protocol,
                port: first,
                end_port,
            } => {
                let last = end_port.unwrap_or(*first);
                Outcome::from(*protocol == port.protocol && (*first..=last).contains(&port.port))
            }
            Self::Name { protocol, name } => {
                if *protocol != port.protocol {
                    return Outcome::Denied;
                }
                match destination.resolve_named_port(name, *protocol) {
                    Some(resolved) => Outcome::from(resolved == port.port),
                    None => {
                        tracing::trace!(
                            port = %name,
                            destination = %destination.key(),
                            "Named port not declared"
                        );
                        Outcome::Unknown
                    }
                }
            }
        }
    }
}

impl fmt::Display for PortMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(protocol) => write!(f, "{}/*", protocol),
            Self::Number {
                protocol,
                port,
                end_port: None,
            } => write!(f, "{}/{}", protocol, port),
            Self::Number {
                protocol,
                port,
                end_port: Some(end),
            } => write!(f, "{}/{}-{}", protocol, port, end),
            Self::Name { protocol, name } => write!(f, "{}/{}", protocol, name),
        }
    }
}

// === impl Rule ===

impl Rule {
    /// A rule that allows all traffic.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_allow_all(&self) -> bool {
        self.peers.is_empty() && self.ports.is_empty()
    }

    /// Determines whether this rule allows traffic with `peer` on `port` to `destination`.
    pub fn allows(
        &self,
        peer: &Endpoint<'_>,
        port: PortProtocol,
        destination: &Workload,
    ) -> Result<Outcome> {
        if !self.peers.is_empty() {
            let mut matched = false;
            for p in &self.peers {
                if p.matches(peer)? {
                    matched = true;
                    break;
                }
            }
            if !matched {
                return Ok(Outcome::Denied);
            }
        }

        if self.ports.is_empty() {
            return Ok(Outcome::Allowed);
        }

        Ok(self
            .ports
            .iter()
            .map(|m| m.allows(port, destination))
            .fold(Outcome::Denied, Outcome::or))
    }
}

// === impl Policy ===

impl Policy {
    pub fn rules(&self, direction: Direction) -> &[Rule] {
        match direction {
            Direction::Ingress => &self.ingress,
            Direction::Egress => &self.egress,
        }
    }

    /// Returns true if the policy governs `direction` with no rules, denying all such traffic.
    pub fn denies_all(&self, direction: Direction) -> bool {
        self.target.directions.contains(direction) && self.rules(direction).is_empty()
    }

    /// Returns true if the policy governs `direction` with a rule that allows all traffic.
    pub fn allows_all(&self, direction: Direction) -> bool {
        self.target.directions.contains(direction)
            && self.rules(direction).iter().any(Rule::is_allow_all)
    }

    /// A `namespace/name` identifier.
    pub fn id(&self) -> String {
        format!("{}/{}", self.target.namespace, self.name)
    }
}

impl TryFrom<NetworkPolicy> for Policy {
    type Error = Error;

    fn try_from(np: NetworkPolicy) -> Result<Self> {
        let ObjectMeta {
            name, namespace, ..
        } = np.metadata;
        let name = name.ok_or_else(|| Error::invalid_policy("<unnamed>", "name must be set"))?;
        let namespace =
            namespace.ok_or_else(|| Error::invalid_policy(&name, "namespace must be set"))?;
        let id = format!("{}/{}", namespace, name);

        let NetworkPolicySpec {
            pod_selector,
            policy_types,
            ingress,
            egress,
        } = np.spec.unwrap_or_default();

        let pod_selector: Option<LabelSelector> = pod_selector.into();
        let pod_selector = mk_selector(&id, pod_selector)?.unwrap_or_default();

        let ingress = ingress
            .into_iter()
            .flatten()
            .map(|NetworkPolicyIngressRule { from, ports }| mk_rule(&id, &namespace, from, ports))
            .collect::<Result<Vec<_>>>()?;
        let egress = egress
            .into_iter()
            .flatten()
            .map(|NetworkPolicyEgressRule { to, ports }| mk_rule(&id, &namespace, to, ports))
            .collect::<Result<Vec<_>>>()?;

        let policy_types = policy_types
            .into_iter()
            .flatten()
            .map(|t| {
                t.parse::<PolicyType>()
                    .map_err(|e| Error::invalid_policy(&id, e))
            })
            .collect::<Result<Vec<_>>>()?;

        // Without explicit policy types (absent or empty), ingress is always governed and egress
        // only when the policy has egress rules.
        let directions = if policy_types.is_empty() {
            Directions {
                ingress: true,
                egress: !egress.is_empty(),
            }
        } else {
            Directions {
                ingress: policy_types.contains(&PolicyType::Ingress),
                egress: policy_types.contains(&PolicyType::Egress),
            }
        };

        Ok(Policy {
            name,
            target: Target {
                namespace,
                pod_selector,
                directions,
            },
            ingress,
            egress,
        })
    }
}

impl From<&Policy> for NetworkPolicy {
    fn from(policy: &Policy) -> Self {
        let ns = &policy.target.namespace;
        let directions = policy.target.directions;

        let mut policy_types = Vec::new();
        if directions.ingress {
            policy_types.push(PolicyType::Ingress.to_string());
        }
        if directions.egress {
            policy_types.push(PolicyType::Egress.to_string());
        }

        let ingress = (!policy.ingress.is_empty()).then(|| {
            policy
                .ingress
                .iter()
                .map(|rule| {
                    let (from, ports) = mk_wire_rule(ns, rule);
                    NetworkPolicyIngressRule { from, ports }
                })
                .collect()
        });
        let egress = (!policy.egress.is_empty()).then(|| {
            policy
                .egress
                .iter()
                .map(|rule| {
                    let (to, ports) = mk_wire_rule(ns, rule);
                    NetworkPolicyEgressRule { to, ports }
                })
                .collect()
        });

        NetworkPolicy {
            metadata: ObjectMeta {
                name: Some(policy.name.clone()),
                namespace: Some(ns.clone()),
                ..Default::default()
            },
            spec: Some(NetworkPolicySpec {
                pod_selector: LabelSelector::from(&policy.target.pod_selector).into(),
                policy_types: Some(policy_types),
                ingress,
                egress,
            }),
            ..Default::default()
        }
    }
}

fn mk_selector(policy: &str, selector: Option<LabelSelector>) -> Result<Option<Selector>> {
    selector
        .map(Selector::try_from)
        .transpose()
        .map_err(|e| Error::invalid_policy(policy, e))
}

fn mk_rule(
    policy: &str,
    namespace: &str,
    peers: Option<Vec<NetworkPolicyPeer>>,
    ports: Option<Vec<NetworkPolicyPort>>,
) -> Result<Rule> {
    let peers = peers
        .into_iter()
        .flatten()
        .map(|peer| mk_peer(policy, namespace, peer))
        .collect::<Result<Vec<_>>>()?;
    let ports = ports
        .into_iter()
        .flatten()
        .map(|port| mk_port(policy, port))
        .collect::<Result<Vec<_>>>()?;
    Ok(Rule { peers, ports })
}

fn mk_peer(policy: &str, namespace: &str, peer: NetworkPolicyPeer) -> Result<Peer> {
    let NetworkPolicyPeer {
        pod_selector,
        namespace_selector,
        ip_block,
    } = peer;
    let pod_selector = mk_selector(policy, pod_selector)?;
    let namespace_selector = mk_selector(policy, namespace_selector)?;

    match (pod_selector, namespace_selector, ip_block) {
        (None, None, Some(IPBlock { cidr, except })) => {
            let net = parse_net(policy, &cidr)?;
            let except = except
                .into_iter()
                .flatten()
                .map(|cidr| parse_net(policy, &cidr))
                .collect::<Result<Vec<_>>>()?;
            Ok(Peer::Network(NetworkMatch { net, except }))
        }
        (_, _, Some(_)) => Err(Error::invalid_policy(
            policy,
            "ipBlock may not be combined with selectors",
        )),
        (Some(pods), None, None) => Ok(Peer::Pods {
            namespaces: NamespaceMatch::Name(namespace.to_string()),
            pods,
        }),
        (pods, Some(namespaces), None) => Ok(Peer::Pods {
            namespaces: NamespaceMatch::Selector(namespaces),
            pods: pods.unwrap_or_default(),
        }),
        (None, None, None) => Err(Error::invalid_policy(policy, "peer selects nothing")),
    }
}

fn parse_net(policy: &str, cidr: &str) -> Result<IpNet> {
    cidr.parse::<IpNet>()
        .or_else(|_| cidr.parse::<std::net::IpAddr>().map(IpNet::from))
        .map_err(|_| Error::invalid_policy(policy, format!("invalid CIDR: {:?}", cidr)))
}

fn mk_port(policy: &str, port: NetworkPolicyPort) -> Result<PortMatch> {
    let NetworkPolicyPort {
        protocol,
        port,
        end_port,
    } = port;

    let protocol = match protocol {
        Some(p) => p
            .parse::<Protocol>()
            .map_err(|e| Error::invalid_policy(policy, e))?,
        None => Protocol::default(),
    };

    match (port, end_port) {
        (None, None) => Ok(PortMatch::Protocol(protocol)),
        (None, Some(_)) => Err(Error::invalid_policy(policy, "endPort requires a port")),
        (Some(IntOrString::Int(port)), end_port) => {
            let port = mk_port_number(policy, port)?;
            let end_port = end_port
                .map(|end| mk_port_number(policy, end))
                .transpose()?;
            if matches!(end_port, Some(end) if end < port) {
                return Err(Error::invalid_policy(policy, "endPort must not be less than port"));
            }
            Ok(PortMatch::Number {
                protocol,
                port,
                end_port,
            })
        }
        (Some(IntOrString::String(_)), Some(_)) => Err(Error::invalid_policy(
            policy,
            "endPort may not be used with a named port",
        )),
        (Some(IntOrString::String(name)), None) => Ok(PortMatch::Name { protocol, name }),
    }
}

fn mk_port_number(policy: &str, port: i32) -> Result<u16> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(Error::invalid_policy(policy, format!("invalid port: {}", port))),
    }
}

fn mk_wire_rule(
    namespace: &str,
    rule: &Rule,
) -> (Option<Vec<NetworkPolicyPeer>>, Option<Vec<NetworkPolicyPort>>) {
    let peers = (!rule.peers.is_empty()).then(|| {
        rule.peers
            .iter()
            .map(|peer| mk_wire_peer(namespace, peer))
            .collect()
    });
    let ports = (!rule.ports.is_empty()).then(|| rule.ports.iter().map(mk_wire_port).collect());
    (peers, ports)
}

fn mk_wire_peer(namespace: &str, peer: &Peer) -> NetworkPolicyPeer {
    let selector = |s: &Selector| (!s.is_empty()).then(|| LabelSelector::from(s));
    match peer {
        Peer::Network(NetworkMatch { net, except }) => NetworkPolicyPeer {
            ip_block: Some(IPBlock {
                cidr: net.to_string(),
                except: (!except.is_empty()).then(|| except.iter().map(ToString::to_string).collect()),
            }),
            ..Default::default()
        },
        Peer::Pods {
            namespaces: NamespaceMatch::Name(name),
            pods,
        } if name == namespace => NetworkPolicyPeer {
            pod_selector: Some(LabelSelector::from(pods)),
            ..Default::default()
        },
        // A namespace other than the policy's own can only be selected by its name label.
        Peer::Pods {
            namespaces: NamespaceMatch::Name(name),
            pods,
        } => NetworkPolicyPeer {
            namespace_selector: Some(LabelSelector {
                match_labels: Some(
                    Some((
                        netpol_verifier_k8s_api::NAMESPACE_NAME_LABEL.to_string(),
                        name.clone(),
                    ))
                    .into_iter()
                    .collect(),
                ),
                ..Default::default()
            }),
            pod_selector: selector(pods),
            ..Default::default()
        },
        Peer::Pods {
            namespaces: NamespaceMatch::Selector(namespaces),
            pods,
        } => NetworkPolicyPeer {
            namespace_selector: Some(LabelSelector::from(namespaces)),
            pod_selector: selector(pods),
            ..Default::default()
        },
    }
}

fn mk_wire_port(port: &PortMatch) -> NetworkPolicyPort {
    match port {
        PortMatch::Protocol(protocol) => NetworkPolicyPort {
            protocol: Some(protocol.to_string()),
            ..Default::default()
        },
        PortMatch::Number {
            protocol,
            port,
            end_port,
        } => NetworkPolicyPort {
            protocol: Some(protocol.to_string()),
            port: Some(IntOrString::Int(i32::from(*port))),
            end_port: end_port.map(i32::from),
        },
        PortMatch::Name { protocol, name } => NetworkPolicyPort {
            protocol: Some(protocol.to_string()),
            port: Some(IntOrString::String(name.clone())),
            end_port: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use netpol_verifier_k8s_api::network_policy;

    fn doc(yaml: &str) -> NetworkPolicy {
        let yaml = format!(
            "apiVersion: networking.k8s.io/v1\nkind: NetworkPolicy\n{}",
            yaml.trim_start()
        );
        network_policy::from_yaml(&yaml).unwrap().remove(0)
    }

    fn parse(yaml: &str) -> Policy {
        doc(yaml).try_into().unwrap()
    }

    #[test]
    fn default_policy_types() {
        let policy = parse(
            r#"
metadata: {name: ingress-only, namespace: x}
spec:
  podSelector: {}
"#,
        );
        assert_eq!(policy.target.directions, Directions::INGRESS);
        assert!(policy.denies_all(Direction::Ingress));
        assert!(!policy.denies_all(Direction::Egress));

        let policy = parse(
            r#"
metadata: {name: with-egress, namespace: x}
spec:
  podSelector: {}
  egress:
  - {}
"#,
        );
        assert_eq!(policy.target.directions, Directions::BOTH);
        assert!(policy.allows_all(Direction::Egress));
        assert!(policy.denies_all(Direction::Ingress));

        // An empty list is defaulted like an absent one.
        let policy = parse(
            r#"
metadata: {name: empty-types, namespace: x}
spec:
  podSelector: {}
  policyTypes: []
"#,
        );
        assert_eq!(policy.target.directions, Directions::INGRESS);
        assert!(policy.denies_all(Direction::Ingress));

        let policy = parse(
            r#"
metadata: {name: empty-types-with-egress, namespace: x}
spec:
  podSelector: {}
  policyTypes: []
  egress:
  - ports: [{port: 53, protocol: UDP}]
"#,
        );
        assert_eq!(policy.target.directions, Directions::BOTH);
    }

    #[test]
    fn explicit_policy_types() {
        let policy = parse(
            r#"
metadata: {name: egress-deny, namespace: x}
spec:
  podSelector:
    matchLabels: {pod: a}
  policyTypes: [Egress]
"#,
        );
        assert_eq!(policy.target.directions, Directions::EGRESS);
        assert!(policy.denies_all(Direction::Egress));
        assert_eq!(
            policy.target.pod_selector,
            Selector::from_map(btreemap! {"pod".to_string() => "a".to_string()})
        );
    }

    #[test]
    fn peers_and_ports() {
        let policy = parse(
            r#"
metadata: {name: mixed, namespace: x}
spec:
  podSelector: {}
  ingress:
  - from:
    - podSelector: {matchLabels: {pod: b}}
    - namespaceSelector: {matchLabels: {ns: y}}
    - namespaceSelector: {}
      podSelector: {matchLabels: {pod: c}}
    - ipBlock: {cidr: 10.0.0.0/8, except: [10.1.0.0/16, 10.2.0.1]}
    ports:
    - port: 80
    - port: serve-81-udp
      protocol: UDP
    - protocol: SCTP
    - port: 1000
      endPort: 2000
      protocol: TCP
"#,
        );
        let rule = &policy.ingress[0];
        assert_eq!(
            rule.peers,
            vec![
                Peer::Pods {
                    namespaces: NamespaceMatch::Name("x".to_string()),
                    pods: Some(("pod", "b")).into_iter().collect(),
                },
                Peer::Pods {
                    namespaces: NamespaceMatch::Selector(Some(("ns", "y")).into_iter().collect()),
                    pods: Selector::default(),
                },
                Peer::Pods {
                    namespaces: NamespaceMatch::Selector(Selector::default()),
                    pods: Some(("pod", "c")).into_iter().collect(),
                },
                Peer::Network(NetworkMatch {
                    net: "10.0.0.0/8".parse().unwrap(),
                    except: vec![
                        "10.1.0.0/16".parse().unwrap(),
                        "10.2.0.1/32".parse().unwrap()
                    ],
                }),
            ]
        );
        assert_eq!(
            rule.ports,
            vec![
                PortMatch::Number {
                    protocol: Protocol::Tcp,
                    port: 80,
                    end_port: None
                },
                PortMatch::Name {
                    protocol: Protocol::Udp,
                    name: "serve-81-udp".to_string()
                },
                PortMatch::Protocol(Protocol::Sctp),
                PortMatch::Number {
                    protocol: Protocol::Tcp,
                    port: 1000,
                    end_port: Some(2000)
                },
            ]
        );
    }

    #[test]
    fn round_trips_through_documents() {
        for yaml in [
            r#"
metadata: {name: deny-all, namespace: x}
spec:
  podSelector: {}
  policyTypes: [Ingress, Egress]
"#,
            r#"
metadata: {name: allow-all, namespace: x}
spec:
  podSelector: {}
  ingress: [{}]
  egress: [{}]
"#,
            r#"
metadata: {name: mixed, namespace: y}
spec:
  podSelector: {matchLabels: {pod: a}}
  ingress:
  - from:
    - podSelector: {matchLabels: {pod: b}}
    - namespaceSelector: {matchLabels: {ns: z}}
    - ipBlock: {cidr: 10.0.0.0/8, except: [10.1.0.0/16]}
    ports:
    - {port: 80, protocol: TCP}
    - {port: serve-81-udp, protocol: UDP}
  egress:
  - to:
    - namespaceSelector: {}
    ports:
    - {port: 53, protocol: UDP}
"#,
        ] {
            let policy = parse(yaml);
            let yaml = network_policy::to_yaml(&NetworkPolicy::from(&policy)).unwrap();
            let reparsed = Policy::try_from(network_policy::from_yaml(&yaml).unwrap().remove(0))
                .unwrap();
            assert_eq!(policy, reparsed, "{}", yaml);
        }
    }

    #[test]
    fn rule_ports_survive_round_trip() {
        let policy = Policy {
            name: "ports".to_string(),
            target: Target {
                namespace: "x".to_string(),
                pod_selector: Selector::default(),
                directions: Directions::BOTH,
            },
            ingress: vec![
                Rule::allow_all(),
                Rule {
                    peers: vec![],
                    ports: vec![PortMatch::Protocol(Protocol::Udp)],
                },
            ],
            egress: vec![Rule {
                peers: vec![],
                ports: vec![
                    PortMatch::Protocol(Protocol::Sctp),
                    PortMatch::Number {
                        protocol: Protocol::Tcp,
                        port: 8000,
                        end_port: Some(8080),
                    },
                ],
            }],
        };

        let doc = NetworkPolicy::from(&policy);
        let ingress = doc.spec.as_ref().unwrap().ingress.as_ref().unwrap();
        assert_eq!(ingress[0].ports, None);
        assert_eq!(
            ingress[1].ports.as_ref().unwrap()[0].protocol.as_deref(),
            Some("UDP")
        );

        let yaml = network_policy::to_yaml(&doc).unwrap();
        let reparsed = network_policy::from_yaml(&yaml).unwrap().remove(0);
        assert_eq!(Policy::try_from(reparsed).unwrap(), policy, "{}", yaml);
    }

    #[test]
    fn governed_directions_survive_round_trip() {
        let policy = parse(
            r#"
metadata: {name: deny-ingress, namespace: x}
spec:
  podSelector: {}
"#,
        );
        let spec = NetworkPolicy::from(&policy).spec.unwrap();
        assert_eq!(spec.policy_types, Some(vec!["Ingress".to_string()]));
        assert_eq!(spec.ingress, None);
        assert_eq!(spec.egress, None);
    }

    #[test]
    fn rejects_invalid_documents() {
        for (yaml, msg) in [
            (
                "metadata: {name: p}\nspec: {podSelector: {}}",
                "missing namespace",
            ),
            (
                "metadata: {name: p, namespace: x}\nspec: {podSelector: {}, ingress: [{from: [{}]}]}",
                "empty peer",
            ),
            (
                "metadata: {name: p, namespace: x}\nspec: {podSelector: {}, ingress: [{from: [{ipBlock: {cidr: nope}}]}]}",
                "bad cidr",
            ),
            (
                "metadata: {name: p, namespace: x}\nspec: {podSelector: {}, ingress: [{ports: [{port: 80, protocol: ICMP}]}]}",
                "bad protocol",
            ),
            (
                "metadata: {name: p, namespace: x}\nspec: {podSelector: {}, ingress: [{ports: [{port: 0}]}]}",
                "port zero",
            ),
            (
                "metadata: {name: p, namespace: x}\nspec: {podSelector: {}, ingress: [{ports: [{port: 90, endPort: 80}]}]}",
                "inverted range",
            ),
            (
                "metadata: {name: p, namespace: x}\nspec: {podSelector: {}, ingress: [{ports: [{port: http, endPort: 80}]}]}",
                "named range",
            ),
            (
                "metadata: {name: p, namespace: x}\nspec: {podSelector: {}, ingress: [{from: [{podSelector: {}, ipBlock: {cidr: 10.0.0.0/8}}]}]}",
                "ipBlock with selector",
            ),
            (
                "metadata: {name: p, namespace: x}\nspec: {podSelector: {}, policyTypes: [ingress]}",
                "bad policy type",
            ),
            (
                "metadata: {name: p, namespace: x}\nspec: {podSelector: {matchExpressions: [{key: pod, operator: Equals}]}}",
                "bad selector operator",
            ),
        ] {
            assert!(
                matches!(Policy::try_from(doc(yaml)), Err(Error::InvalidPolicy { .. })),
                "{}",
                msg
            );
        }
    }
}
