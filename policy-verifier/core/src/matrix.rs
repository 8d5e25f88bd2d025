use crate::{table::Table, PortProtocol, WorkloadKey};
use std::{collections::BTreeMap, fmt};

/// The result of evaluating or probing traffic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    Allowed,
    Denied,

    /// The outcome could not be determined, e.g. because a named port did not resolve or a probe
    /// failed to complete.
    Unknown,
}

/// Per-port outcomes for every (source, destination) pair.
///
/// Entries are ordered by source, then destination, then port, so iteration and rendering are
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Matrix {
    cells: BTreeMap<(WorkloadKey, WorkloadKey), BTreeMap<PortProtocol, Outcome>>,
}

// === impl Outcome ===

impl Outcome {
    /// Disjunction: allowed if either side is allowed, otherwise unknown if either side is
    /// unknown.
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Allowed, _) | (_, Self::Allowed) => Self::Allowed,
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (Self::Denied, Self::Denied) => Self::Denied,
        }
    }

    /// Conjunction: denied if either side is denied, otherwise unknown if either side is unknown.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Denied, _) | (_, Self::Denied) => Self::Denied,
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (Self::Allowed, Self::Allowed) => Self::Allowed,
        }
    }

    pub(crate) fn mark(&self) -> char {
        match self {
            Self::Allowed => '.',
            Self::Denied => 'X',
            Self::Unknown => '?',
        }
    }
}

impl From<bool> for Outcome {
    fn from(allowed: bool) -> Self {
        if allowed {
            Self::Allowed
        } else {
            Self::Denied
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed => "allowed".fmt(f),
            Self::Denied => "denied".fmt(f),
            Self::Unknown => "unknown".fmt(f),
        }
    }
}

// === impl Matrix ===

impl Matrix {
    /// Records an outcome, replacing any previous outcome for the same cell.
    pub fn set(&mut self, from: WorkloadKey, to: WorkloadKey, port: PortProtocol, outcome: Outcome) {
        self.cells
            .entry((from, to))
            .or_default()
            .insert(port, outcome);
    }

    pub fn get(&self, from: &WorkloadKey, to: &WorkloadKey, port: PortProtocol) -> Option<Outcome> {
        self.cells
            .get(&(from.clone(), to.clone()))
            .and_then(|ports| ports.get(&port))
            .copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WorkloadKey, &WorkloadKey, PortProtocol, Outcome)> {
        self.cells.iter().flat_map(|((from, to), ports)| {
            ports
                .iter()
                .map(move |(port, outcome)| (from, to, *port, *outcome))
        })
    }

    /// The number of (source, destination, port) cells.
    pub fn len(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn table(&self) -> Table {
        Table::grid(
            self.iter()
                .map(|(from, to, port, outcome)| (from, to, port, outcome.mark())),
        )
    }
}

impl FromIterator<(WorkloadKey, WorkloadKey, PortProtocol, Outcome)> for Matrix {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = (WorkloadKey, WorkloadKey, PortProtocol, Outcome)>,
    {
        let mut matrix = Self::default();
        for (from, to, port, outcome) in iter {
            matrix.set(from, to, port, outcome);
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Outcome::*;

    #[test]
    fn three_valued_logic() {
        for (a, b, or, and) in [
            (Allowed, Allowed, Allowed, Allowed),
            (Allowed, Denied, Allowed, Denied),
            (Allowed, Unknown, Allowed, Unknown),
            (Denied, Denied, Denied, Denied),
            (Denied, Unknown, Unknown, Denied),
            (Unknown, Unknown, Unknown, Unknown),
        ] {
            assert_eq!(a.or(b), or, "{} or {}", a, b);
            assert_eq!(b.or(a), or, "{} or {}", b, a);
            assert_eq!(a.and(b), and, "{} and {}", a, b);
            assert_eq!(b.and(a), and, "{} and {}", b, a);
        }
    }

    #[test]
    fn cells_are_keyed_by_pair_and_port() {
        let xa = WorkloadKey::new("x", "a");
        let xb = WorkloadKey::new("x", "b");
        let mut matrix = Matrix::default();
        matrix.set(xa.clone(), xb.clone(), PortProtocol::tcp(80), Allowed);
        matrix.set(xa.clone(), xb.clone(), PortProtocol::udp(80), Denied);
        matrix.set(xb.clone(), xa.clone(), PortProtocol::tcp(80), Unknown);
        matrix.set(xa.clone(), xb.clone(), PortProtocol::tcp(80), Denied);

        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix.get(&xa, &xb, PortProtocol::tcp(80)), Some(Denied));
        assert_eq!(matrix.get(&xb, &xa, PortProtocol::tcp(80)), Some(Unknown));
        assert_eq!(matrix.get(&xb, &xa, PortProtocol::udp(80)), None);

        let order = matrix
            .iter()
            .map(|(from, to, port, _)| format!("{} {} {}", from, to, port))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec!["x/a x/b TCP/80", "x/a x/b UDP/80", "x/b x/a TCP/80"]
        );
    }
}
