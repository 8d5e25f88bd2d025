use crate::{PortProtocol, WorkloadKey};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// A rendered grid keyed by source (rows) and destination (columns) identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

// === impl Table ===

impl Table {
    /// Lays out marked cells with one row per source and one column per destination.
    ///
    /// A cell holding a single port shows only its mark; a cell holding several ports lists each
    /// as `port:mark`.
    pub(crate) fn grid<'k>(
        cells: impl IntoIterator<Item = (&'k WorkloadKey, &'k WorkloadKey, PortProtocol, char)>,
    ) -> Self {
        let mut columns = BTreeSet::new();
        let mut grid = BTreeMap::<&WorkloadKey, BTreeMap<&WorkloadKey, Vec<(PortProtocol, char)>>>::new();
        for (from, to, port, mark) in cells {
            columns.insert(to);
            grid.entry(from)
                .or_default()
                .entry(to)
                .or_default()
                .push((port, mark));
        }

        let header = Some("-".to_string())
            .into_iter()
            .chain(columns.iter().map(ToString::to_string))
            .collect();

        let rows = grid
            .iter()
            .map(|(from, row)| {
                let cells = columns.iter().map(|to| match row.get(to).map(Vec::as_slice) {
                    None | Some([]) => String::new(),
                    Some([(_, mark)]) => mark.to_string(),
                    Some(ports) => ports
                        .iter()
                        .map(|(port, mark)| format!("{}:{}", port, mark))
                        .collect::<Vec<_>>()
                        .join(" "),
                });
                Some(from.to_string()).into_iter().chain(cells).collect()
            })
            .collect();

        Self { header, rows }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths = self.header.iter().map(String::len).collect::<Vec<_>>();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(cell.len()),
                    None => widths.push(cell.len()),
                }
            }
        }

        let line = |f: &mut fmt::Formatter<'_>, row: &[String]| -> fmt::Result {
            let cells = row
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = width))
                .collect::<Vec<_>>();
            writeln!(f, "| {} |", cells.join(" | "))
        };
        let rule = widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+");

        writeln!(f, "+{}+", rule)?;
        line(f, &self.header)?;
        writeln!(f, "+{}+", rule)?;
        for row in &self.rows {
            line(f, row)?;
        }
        writeln!(f, "+{}+", rule)
    }
}
