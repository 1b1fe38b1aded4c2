//! Collinearity screening: pairwise-complete Pearson correlations.
//!
//! Each pair uses the rows where both variables are present, so one sparse
//! column does not shrink every other pair.

use tracing::warn;

use crate::domain::Variable;
use crate::error::PanelResult;
use crate::panel::PanelTable;

/// Symmetric correlation matrix over named variables.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    /// Row-major `names.len()²` entries; `None` when undefined.
    values: Vec<Option<f64>>,
}

/// A pair whose absolute correlation exceeds the screening threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct CollinearPair {
    pub a: String,
    pub b: String,
    pub correlation: f64,
}

impl CorrelationMatrix {
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values.get(i * self.names.len() + j).copied().flatten()
    }

    pub fn by_name(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        self.get(i, j)
    }

    /// Off-diagonal pairs with `|r| > threshold`, strongest first.
    pub fn near_collinear(&self, threshold: f64) -> Vec<CollinearPair> {
        let k = self.names.len();
        let mut pairs = Vec::new();
        for i in 0..k {
            for j in (i + 1)..k {
                if let Some(r) = self.get(i, j) {
                    if r.abs() > threshold {
                        pairs.push(CollinearPair {
                            a: self.names[i].clone(),
                            b: self.names[j].clone(),
                            correlation: r,
                        });
                    }
                }
            }
        }
        pairs.sort_by(|x, y| {
            y.correlation
                .abs()
                .partial_cmp(&x.correlation.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        pairs
    }
}

fn pairwise(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip();
    if xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(&ys) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx) * (x - mx);
        syy += (y - my) * (y - my);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

pub fn correlation_matrix(table: &PanelTable, variables: &[Variable]) -> PanelResult<CorrelationMatrix> {
    let columns = variables
        .iter()
        .map(|v| table.variable(*v))
        .collect::<PanelResult<Vec<_>>>()?;
    let k = columns.len();
    let mut values = vec![None; k * k];
    for i in 0..k {
        for j in i..k {
            let r = if i == j {
                pairwise(columns[i], columns[i]).map(|_| 1.0)
            } else {
                pairwise(columns[i], columns[j])
            };
            values[i * k + j] = r;
            values[j * k + i] = r;
        }
    }
    Ok(CorrelationMatrix {
        names: variables.iter().map(|v| v.column().to_string()).collect(),
        values,
    })
}

/// Compute the matrix and log every near-collinear pair.
pub fn screen_collinearity(
    table: &PanelTable,
    variables: &[Variable],
    threshold: f64,
) -> PanelResult<(CorrelationMatrix, Vec<CollinearPair>)> {
    let matrix = correlation_matrix(table, variables)?;
    let pairs = matrix.near_collinear(threshold);
    for p in &pairs {
        warn!(a = %p.a, b = %p.b, r = p.correlation, threshold, "near-collinear regressors");
    }
    Ok((matrix, pairs))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn table() -> PanelTable {
        let mut columns = BTreeMap::new();
        columns.insert(
            "gdp_growth".to_string(),
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), None],
        );
        columns.insert(
            "gov_spending".to_string(),
            vec![Some(2.1), Some(3.9), Some(6.2), Some(7.8), Some(100.0)],
        );
        columns.insert(
            "inflation".to_string(),
            vec![Some(5.0), Some(1.0), Some(4.0), Some(2.0), Some(3.0)],
        );
        columns.insert("corruption".to_string(), vec![Some(7.0); 5]);
        PanelTable::new(
            "country",
            "year",
            vec!["A".into(); 5],
            vec![2000, 2001, 2002, 2003, 2004],
            columns,
        )
        .unwrap()
    }

    #[test]
    fn pairwise_complete_rows_are_used() {
        let vars = [Variable::GdpGrowth, Variable::GovSpending, Variable::Inflation];
        let m = correlation_matrix(&table(), &vars).unwrap();
        // The outlier in gov_spending sits on the row where gdp_growth is missing.
        let r = m.by_name("gdp_growth", "gov_spending").unwrap();
        assert!(r > 0.99);
        assert_eq!(m.get(0, 0), Some(1.0));
        assert_eq!(m.get(0, 1), m.get(1, 0));
    }

    #[test]
    fn constant_column_has_undefined_correlation() {
        let vars = [Variable::Inflation, Variable::Corruption];
        let m = correlation_matrix(&table(), &vars).unwrap();
        assert_eq!(m.by_name("inflation", "corruption"), None);
        assert_eq!(m.get(1, 1), None);
    }

    #[test]
    fn screening_flags_only_strong_pairs() {
        let vars = [Variable::GdpGrowth, Variable::GovSpending, Variable::Inflation];
        let (_, pairs) = screen_collinearity(&table(), &vars, 0.8).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].a, "gdp_growth");
        assert_eq!(pairs[0].b, "gov_spending");
    }
}
