use crate::{table::Table, Matrix, Outcome, PortProtocol, WorkloadKey};
use std::{collections::BTreeMap, fmt};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    Agree,
    Disagree,

    /// At least one side is unknown.
    NoValue,
}

/// An expected and an observed outcome for the same cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub expected: Outcome,
    pub observed: Outcome,
}

/// The cell-by-cell comparison of an expected matrix with an observed matrix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Comparison {
    cells: BTreeMap<(WorkloadKey, WorkloadKey), BTreeMap<PortProtocol, Cell>>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ValueCounts {
    pub agree: usize,
    pub disagree: usize,
    pub no_value: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Disagreement {
    pub from: WorkloadKey,
    pub to: WorkloadKey,
    pub port: PortProtocol,
    pub expected: Outcome,
    pub observed: Outcome,
}

// === impl Cell ===

impl Cell {
    pub fn verdict(&self) -> Verdict {
        match (self.expected, self.observed) {
            (Outcome::Unknown, _) | (_, Outcome::Unknown) => Verdict::NoValue,
            (e, o) if e == o => Verdict::Agree,
            _ => Verdict::Disagree,
        }
    }
}

// === impl Matrix ===

impl Matrix {
    /// Compares this (expected) matrix against an observed matrix.
    ///
    /// Every cell present in either matrix is compared. A cell missing from one side is treated
    /// as unknown on that side.
    pub fn compare(&self, observed: &Matrix) -> Comparison {
        let mut cells = BTreeMap::<_, BTreeMap<_, _>>::new();
        for (from, to, port, expected) in self.iter() {
            let observed = observed.get(from, to, port).unwrap_or(Outcome::Unknown);
            cells
                .entry((from.clone(), to.clone()))
                .or_default()
                .insert(port, Cell { expected, observed });
        }
        for (from, to, port, observed) in observed.iter() {
            cells
                .entry((from.clone(), to.clone()))
                .or_default()
                .entry(port)
                .or_insert(Cell {
                    expected: Outcome::Unknown,
                    observed,
                });
        }
        Comparison { cells }
    }
}

// === impl Comparison ===

impl Comparison {
    pub fn get(&self, from: &WorkloadKey, to: &WorkloadKey, port: PortProtocol) -> Option<Cell> {
        self.cells
            .get(&(from.clone(), to.clone()))
            .and_then(|ports| ports.get(&port))
            .copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WorkloadKey, &WorkloadKey, PortProtocol, Cell)> {
        self.cells.iter().flat_map(|((from, to), ports)| {
            ports.iter().map(move |(port, cell)| (from, to, *port, *cell))
        })
    }

    /// The number of compared cells.
    pub fn len(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn value_counts(&self) -> ValueCounts {
        let mut counts = ValueCounts::default();
        for (_, _, _, cell) in self.iter() {
            match cell.verdict() {
                Verdict::Agree => counts.agree += 1,
                Verdict::Disagree => counts.disagree += 1,
                Verdict::NoValue => counts.no_value += 1,
            }
        }
        counts
    }

    pub fn disagreements(&self) -> Vec<Disagreement> {
        self.iter()
            .filter(|(_, _, _, cell)| cell.verdict() == Verdict::Disagree)
            .map(|(from, to, port, cell)| Disagreement {
                from: from.clone(),
                to: to.clone(),
                port,
                expected: cell.expected,
                observed: cell.observed,
            })
            .collect()
    }

    pub fn table(&self) -> Table {
        Table::grid(self.iter().map(|(from, to, port, cell)| {
            let mark = match cell.verdict() {
                Verdict::Agree => '.',
                Verdict::Disagree => 'X',
                Verdict::NoValue => '?',
            };
            (from, to, port, mark)
        }))
    }
}

// === impl ValueCounts ===

impl ValueCounts {
    pub fn total(&self) -> usize {
        self.agree + self.disagree + self.no_value
    }
}

impl fmt::Display for ValueCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "true: {}, false: {}, no value: {}",
            self.agree, self.disagree, self.no_value
        )
    }
}

impl fmt::Display for Disagreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} on {}: expected {}, observed {}",
            self.from, self.to, self.port, self.expected, self.observed
        )
    }
}
