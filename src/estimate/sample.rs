//! Complete-case estimation samples.
//!
//! A specification only sees rows where the response and every regressor are
//! present. Dropped rows are counted per first-missing column so sample-size drift
//! across specifications is visible rather than silent.

use nalgebra::{DMatrix, DVector};

use crate::domain::{DropAudit, Regressor, Specification};
use crate::error::{PanelError, PanelResult};
use crate::panel::{PanelTable, entity_counts};

/// Rows, response and regressors retained for one specification.
///
/// Rows are ordered by entity, then time.
#[derive(Debug, Clone)]
pub struct EstimationSample {
    pub rows: Vec<usize>,
    /// Compact entity ids (`0..entity_names.len()`).
    pub entity_ids: Vec<usize>,
    pub entity_names: Vec<String>,
    pub times: Vec<i32>,
    pub y: DVector<f64>,
    /// Regressors without an intercept column.
    pub x: DMatrix<f64>,
    pub names: Vec<String>,
    pub audit: DropAudit,
}

enum Source<'a> {
    Column(&'a str, &'a [Option<f64>]),
    Product(&'a str, &'a [Option<f64>], &'a str, &'a [Option<f64>]),
}

impl Source<'_> {
    /// Value at `row`, or the name of the first missing input column.
    fn value(&self, row: usize) -> Result<f64, &str> {
        match self {
            Source::Column(name, values) => values[row].ok_or(*name),
            Source::Product(name_a, a, name_b, b) => {
                let va = a[row].ok_or(*name_a)?;
                let vb = b[row].ok_or(*name_b)?;
                Ok(va * vb)
            }
        }
    }
}

fn centered_column<'a>(table: &'a PanelTable, name: &str) -> PanelResult<&'a [Option<f64>]> {
    table
        .column(name)
        .map_err(|_| PanelError::MissingCenteredColumn(name.to_string()))
}

/// Build the complete-case sample for `spec`.
pub fn complete_cases(table: &PanelTable, spec: &Specification) -> PanelResult<EstimationSample> {
    let response_name = spec.response.column();
    let response = table.column(response_name)?;

    let names = spec.regressor_names();
    let mut seen = std::collections::HashSet::new();
    for name in &names {
        if !seen.insert(name.as_str()) {
            return Err(PanelError::RankDeficiency { column: name.clone() });
        }
    }

    let centered_names: Vec<Vec<String>> = spec.regressors.iter().map(Regressor::source_columns).collect();
    let mut sources = Vec::with_capacity(spec.regressors.len());
    for (regressor, cols) in spec.regressors.iter().zip(centered_names.iter()) {
        let source = match regressor {
            Regressor::Raw(v) => Source::Column(v.column(), table.variable(*v)?),
            Regressor::Centered(_) => Source::Column(&cols[0], centered_column(table, &cols[0])?),
            Regressor::Interaction(_, _) => Source::Product(
                &cols[0],
                centered_column(table, &cols[0])?,
                &cols[1],
                centered_column(table, &cols[1])?,
            ),
        };
        sources.push(source);
    }

    let mut audit = DropAudit {
        rows_total: table.n_rows(),
        ..DropAudit::default()
    };
    let k = sources.len();
    let mut rows = Vec::new();
    let mut table_entities = Vec::new();
    let mut times = Vec::new();
    let mut y = Vec::new();
    let mut x_rows: Vec<f64> = Vec::new();
    let mut row_buf = vec![0.0; k];

    for group in table.groups() {
        'rows: for row in group {
            let y_val = match response[row] {
                Some(v) => v,
                None => {
                    *audit.missing_by_column.entry(response_name.to_string()).or_insert(0) += 1;
                    continue;
                }
            };
            for (j, source) in sources.iter().enumerate() {
                match source.value(row) {
                    Ok(v) => row_buf[j] = v,
                    Err(missing) => {
                        *audit.missing_by_column.entry(missing.to_string()).or_insert(0) += 1;
                        continue 'rows;
                    }
                }
            }
            rows.push(row);
            table_entities.push(table.entity_ids()[row]);
            times.push(table.times()[row]);
            y.push(y_val);
            x_rows.extend_from_slice(&row_buf);
        }
    }

    // Compact entity ids over the retained rows.
    let mut remap = vec![usize::MAX; table.n_entities()];
    let mut entity_names = Vec::new();
    let mut entity_ids = Vec::with_capacity(rows.len());
    for &e in &table_entities {
        if remap[e] == usize::MAX {
            remap[e] = entity_names.len();
            entity_names.push(table.entity_names()[e].clone());
        }
        entity_ids.push(remap[e]);
    }

    audit.rows_used = rows.len();
    let n = rows.len();
    Ok(EstimationSample {
        rows,
        entity_ids,
        entity_names,
        times,
        y: DVector::from_vec(y),
        x: DMatrix::from_row_slice(n, k, &x_rows),
        names,
        audit,
    })
}

impl EstimationSample {
    pub fn n_obs(&self) -> usize {
        self.rows.len()
    }

    pub fn n_entities(&self) -> usize {
        self.entity_names.len()
    }

    pub fn counts(&self) -> Vec<usize> {
        entity_counts(&self.entity_ids, self.n_entities())
    }

    /// Drop entities observed exactly once.
    ///
    /// Their within-transformed rows are identically zero and carry no information.
    pub fn drop_singletons(self) -> Self {
        let counts = self.counts();
        if counts.iter().all(|&c| c != 1) {
            return self;
        }
        let keep: Vec<usize> = (0..self.n_obs()).filter(|&i| counts[self.entity_ids[i]] != 1).collect();

        let mut audit = self.audit.clone();
        audit.singleton_entities = self
            .entity_names
            .iter()
            .enumerate()
            .filter(|(e, _)| counts[*e] == 1)
            .map(|(_, name)| name.clone())
            .collect();

        let mut remap = vec![usize::MAX; self.n_entities()];
        let mut entity_names = Vec::new();
        for (e, name) in self.entity_names.iter().enumerate() {
            if counts[e] != 1 {
                remap[e] = entity_names.len();
                entity_names.push(name.clone());
            }
        }

        let k = self.x.ncols();
        let x = DMatrix::from_fn(keep.len(), k, |i, j| self.x[(keep[i], j)]);
        let y = DVector::from_fn(keep.len(), |i, _| self.y[keep[i]]);
        audit.rows_used = keep.len();

        EstimationSample {
            rows: keep.iter().map(|&i| self.rows[i]).collect(),
            entity_ids: keep.iter().map(|&i| remap[self.entity_ids[i]]).collect(),
            entity_names,
            times: keep.iter().map(|&i| self.times[i]).collect(),
            y,
            x,
            names: self.names,
            audit,
        }
    }
}
