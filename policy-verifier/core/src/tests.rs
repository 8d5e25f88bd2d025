use super::*;
use crate::policy::{NamespaceMatch, Peer, PortMatch, Rule, Target};
use maplit::btreemap;
use netpol_verifier_k8s_api::{network_policy, Selector};

const NAMESPACES: [&str; 3] = ["x", "y", "z"];
const PODS: [&str; 3] = ["a", "b", "c"];

/// A topology in which no policy applies allows all traffic.
#[test]
fn untargeted_allows_all() {
    let topology = mk_topology(&[PortProtocol::tcp(80), PortProtocol::udp(81)]);
    let result = run(&topology, &[]);

    assert_eq!(result.combined.len(), 9 * 9 * 2);
    for (from, to, port, outcome) in result.combined.iter() {
        assert_eq!(outcome, Outcome::Allowed, "{} -> {} on {}", from, to, port);
    }
    assert_eq!(result.ingress, result.combined);
    assert_eq!(result.egress, result.combined);
}

/// A policy that governs ingress for a workload without any ingress rules denies all of its
/// ingress, and leaves other workloads untouched.
#[test]
fn explicit_deny_all() {
    let topology = mk_topology(&[PortProtocol::tcp(80)]);
    let deny = Policy {
        name: "deny-a".to_string(),
        target: mk_target("x", Some(("pod", "a")), Directions::INGRESS),
        ingress: vec![],
        egress: vec![],
    };
    // Another policy that allows everything into a different workload.
    let allow = Policy {
        name: "allow-b".to_string(),
        target: mk_target("x", Some(("pod", "b")), Directions::INGRESS),
        ingress: vec![Rule::allow_all()],
        egress: vec![],
    };
    let result = run(&topology, &[deny, allow]);

    let xa = WorkloadKey::new("x", "a");
    for (from, to, _, outcome) in result.combined.iter() {
        let expected = if *to == xa {
            Outcome::Denied
        } else {
            Outcome::Allowed
        };
        assert_eq!(outcome, expected, "{} -> {}", from, to);
    }
}

/// Explicit allow-all and untargeted directions produce the same outcomes but are reported
/// differently.
#[test]
fn explicit_allow_all_is_distinct_from_untargeted() {
    let topology = mk_topology(&[PortProtocol::tcp(80)]);
    let allow = Policy {
        name: "allow-all".to_string(),
        target: mk_target("x", None, Directions::INGRESS),
        ingress: vec![Rule::allow_all()],
        egress: vec![],
    };
    let index = PolicyIndex::new(&topology, &[allow]);
    let p80 = PortProtocol::tcp(80);

    let traffic = Traffic::new(&topology, &key("y/a"), &key("x/a"), p80).unwrap();
    assert_eq!(
        index.ingress(&traffic).unwrap(),
        Decision {
            outcome: Outcome::Allowed,
            reason: Reason::Allowed {
                policy: "x/allow-all".to_string()
            },
        }
    );

    let traffic = Traffic::new(&topology, &key("x/a"), &key("y/a"), p80).unwrap();
    assert_eq!(
        index.ingress(&traffic).unwrap(),
        Decision {
            outcome: Outcome::Allowed,
            reason: Reason::Untargeted,
        }
    );
}

/// Multiple policies targeting the same workload combine by allowing the union of their rules.
#[test]
fn policies_are_ored() {
    let topology = mk_topology(&[PortProtocol::tcp(80)]);
    let allow_from = |name: &str, pod: &'static str| Policy {
        name: name.to_string(),
        target: mk_target("x", Some(("pod", "a")), Directions::INGRESS),
        ingress: vec![Rule {
            peers: vec![Peer::Pods {
                namespaces: NamespaceMatch::Name("x".to_string()),
                pods: Some(("pod", pod)).into_iter().collect(),
            }],
            ports: vec![PortMatch::Number {
                protocol: Protocol::Tcp,
                port: 80,
                end_port: None,
            }],
        }],
        egress: vec![],
    };
    let result = run(
        &topology,
        &[allow_from("allow-b", "b"), allow_from("allow-c", "c")],
    );

    let p80 = PortProtocol::tcp(80);
    let xa = key("x/a");
    assert_eq!(
        result.combined.get(&key("x/b"), &xa, p80),
        Some(Outcome::Allowed)
    );
    assert_eq!(
        result.combined.get(&key("x/c"), &xa, p80),
        Some(Outcome::Allowed)
    );
    assert_eq!(
        result.combined.get(&key("x/a"), &xa, p80),
        Some(Outcome::Denied)
    );
    assert_eq!(
        result.combined.get(&key("y/b"), &xa, p80),
        Some(Outcome::Denied)
    );
}

/// A flow requires both the source's egress and the destination's ingress to allow it.
#[test]
fn directions_are_anded() {
    let topology = mk_topology(&[PortProtocol::tcp(80)]);
    let allow_egress = Policy {
        name: "allow-egress".to_string(),
        target: mk_target("x", Some(("pod", "a")), Directions::EGRESS),
        ingress: vec![],
        egress: vec![Rule::allow_all()],
    };
    let deny_ingress = Policy {
        name: "deny-ingress".to_string(),
        target: mk_target("y", Some(("pod", "b")), Directions::INGRESS),
        ingress: vec![],
        egress: vec![],
    };
    let result = run(&topology, &[allow_egress, deny_ingress]);

    let (xa, yb, p80) = (key("x/a"), key("y/b"), PortProtocol::tcp(80));
    assert_eq!(result.egress.get(&xa, &yb, p80), Some(Outcome::Allowed));
    assert_eq!(result.ingress.get(&xa, &yb, p80), Some(Outcome::Denied));
    assert_eq!(result.combined.get(&xa, &yb, p80), Some(Outcome::Denied));

    for (from, to, port, outcome) in result.combined.iter() {
        let egress = result.egress.get(from, to, port).unwrap();
        let ingress = result.ingress.get(from, to, port).unwrap();
        assert_eq!(outcome, egress.and(ingress), "{} -> {}", from, to);
    }
}

/// Named ports that destinations do not declare never become valid jobs.
#[test]
fn unresolved_ports_are_set_aside() {
    let topology = mk_topology(&[PortProtocol::tcp(80)]);
    let config = ProbeConfig::port(
        PortRef::Name("serve-99-tcp".to_string()),
        Protocol::Tcp,
        ProbeMode::ServiceName,
    );
    let jobs = JobBuilder::default().build(&topology, &config, None).unwrap();
    assert!(jobs.valid.is_empty());
    assert_eq!(jobs.bad_named_port.len(), 81);
    assert!(jobs.bad_port_protocol.is_empty());

    let index = PolicyIndex::new(&topology, &[]);
    let result = synthetic::evaluate(&index, &topology, &jobs.valid).unwrap();
    assert!(result.combined.is_empty());
}

/// A named port rule that does not resolve on the destination yields an unknown outcome, which the
/// comparator does not count as agreement or disagreement.
#[test]
fn unresolved_rule_ports_are_unknown() {
    let topology = mk_topology(&[PortProtocol::tcp(80)]);
    let policy = network_policy::from_yaml(
        r#"
apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata: {name: named, namespace: x}
spec:
  podSelector: {}
  ingress:
  - ports:
    - port: serve-99-tcp
"#,
    )
    .unwrap()
    .remove(0);
    let result = run(&topology, &[Policy::try_from(policy).unwrap()]);

    let (ya, xa, p80) = (key("y/a"), key("x/a"), PortProtocol::tcp(80));
    assert_eq!(result.combined.get(&ya, &xa, p80), Some(Outcome::Unknown));

    let observed = result
        .combined
        .iter()
        .map(|(from, to, port, _)| (from.clone(), to.clone(), port, Outcome::Denied))
        .collect::<Matrix>();
    let counts = result.combined.compare(&observed).value_counts();
    assert_eq!(counts.no_value, 27);
    assert_eq!(counts.agree, 0);
    assert_eq!(counts.disagree, 54);
}

#[test]
fn comparison_counts_cover_every_cell() {
    let topology = mk_topology(&[PortProtocol::tcp(80), PortProtocol::udp(81)]);
    let expected = run(&topology, &[mk_scenario_policy()]).combined;

    // Observations that disagree, are unknown, or are missing in a regular pattern.
    let observed = expected
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 7 != 0)
        .map(|(i, (from, to, port, outcome))| {
            let outcome = match i % 3 {
                0 => outcome,
                1 => Outcome::Unknown,
                _ => outcome.or(Outcome::Allowed),
            };
            (from.clone(), to.clone(), port, outcome)
        })
        .collect::<Matrix>();

    let cmp = expected.compare(&observed);
    let counts = cmp.value_counts();
    assert_eq!(cmp.len(), expected.len());
    assert_eq!(counts.total(), cmp.len());
    assert!(counts.agree > 0 && counts.disagree > 0 && counts.no_value > 0);
    assert_eq!(cmp.disagreements().len(), counts.disagree);
}

#[test]
fn evaluation_is_idempotent() {
    let topology = mk_topology(&[PortProtocol::tcp(80), PortProtocol::udp(81)]);
    let policies = [mk_scenario_policy()];
    let first = run(&topology, &policies);
    let second = run(&topology, &policies);
    assert_eq!(first, second);
    assert_eq!(
        first.combined.table().to_string(),
        second.combined.table().to_string()
    );
}

/// Namespace x only admits traffic from namespace y on TCP/80.
#[test]
fn three_namespace_scenario() {
    let topology = mk_topology(&[PortProtocol::tcp(80)]);
    let result = run(&topology, &[mk_scenario_policy()]);

    assert_eq!(result.combined.len(), 81);
    for (from, to, port, outcome) in result.combined.iter() {
        assert_eq!(port, PortProtocol::tcp(80));
        let expected = if to.namespace != "x" || from.namespace == "y" {
            Outcome::Allowed
        } else {
            Outcome::Denied
        };
        assert_eq!(outcome, expected, "{} -> {}", from, to);
    }

    let table = result.combined.table();
    assert_eq!(table.header.len(), 10);
    assert_eq!(table.rows[0], vec!["x/a", "X", "X", "X", ".", ".", ".", ".", ".", "."]);
    assert_eq!(table.rows[3], vec!["y/a", ".", ".", ".", ".", ".", ".", ".", ".", "."]);

    // Probing against a cluster that enforces nothing disagrees exactly on the denied cells.
    let observed = result
        .combined
        .iter()
        .map(|(from, to, port, _)| (from.clone(), to.clone(), port, Outcome::Allowed))
        .collect::<Matrix>();
    let counts = result.combined.compare(&observed).value_counts();
    assert_eq!(
        counts,
        ValueCounts {
            agree: 81 - 18,
            disagree: 18,
            no_value: 0,
        }
    );
}

/// The same scenario, expressed as a policy document.
#[test]
fn three_namespace_scenario_from_document() {
    let topology = mk_topology(&[PortProtocol::tcp(80)]);
    let doc = network_policy::from_yaml(
        r#"
apiVersion: networking.k8s.io/v1
kind: NetworkPolicy
metadata:
  name: allow-y
  namespace: x
spec:
  podSelector: {}
  ingress:
  - from:
    - namespaceSelector:
        matchLabels:
          ns: y
    ports:
    - port: 80
"#,
    )
    .unwrap()
    .remove(0);
    let from_doc = run(&topology, &[Policy::try_from(doc).unwrap()]);
    let from_model = run(&topology, &[mk_scenario_policy()]);
    assert_eq!(from_doc.combined, from_model.combined);
}

// === helpers ===

fn run(topology: &Topology, policies: &[Policy]) -> SyntheticResult {
    let index = PolicyIndex::new(topology, policies);
    let jobs = JobBuilder::default()
        .build(
            topology,
            &ProbeConfig::all_available(ProbeMode::ServiceName),
            None,
        )
        .unwrap();
    synthetic::evaluate(&index, topology, &jobs.valid).unwrap()
}

fn mk_topology(ports: &[PortProtocol]) -> Topology {
    Topology::default_model(&NAMESPACES, &PODS, ports)
}

fn mk_target(ns: &str, pod: Option<(&'static str, &'static str)>, directions: Directions) -> Target {
    Target {
        namespace: ns.to_string(),
        pod_selector: pod.into_iter().collect(),
        directions,
    }
}

fn mk_scenario_policy() -> Policy {
    Policy {
        name: "allow-y".to_string(),
        target: mk_target("x", None, Directions::INGRESS),
        ingress: vec![Rule {
            peers: vec![Peer::Pods {
                namespaces: NamespaceMatch::Selector(Selector::from_map(btreemap! {
                    "ns".to_string() => "y".to_string(),
                })),
                pods: Selector::default(),
            }],
            ports: vec![PortMatch::Number {
                protocol: Protocol::Tcp,
                port: 80,
                end_port: None,
            }],
        }],
        egress: vec![],
    }
}

fn key(s: &str) -> WorkloadKey {
    let (ns, name) = s.split_once('/').unwrap();
    WorkloadKey::new(ns, name)
}
