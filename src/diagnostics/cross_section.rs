//! Pesaran CD test for cross-sectional dependence.
//!
//! For every pair of entities the residuals are correlated over the periods both
//! entities observe (`T_ij`). Pairs with fewer than `MIN_COMMON_PERIODS` shared
//! periods, or with a constant residual series over them, are skipped. Over the
//! `P` remaining pairs:
//!
//! `CD = sqrt(1/P) · Σ sqrt(T_ij) ρ_ij ~ N(0, 1)`
//!
//! which reduces to `sqrt(2T / (N(N − 1))) Σ ρ_ij` on a balanced panel.

use std::collections::BTreeMap;

use crate::domain::{FittedModel, NullDistribution, TestKind, TestResult};
use crate::error::{PanelError, PanelResult};
use crate::math::p_value;

pub const MIN_COMMON_PERIODS: usize = 3;

/// Pearson correlation; `None` when either series is constant.
fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut sab = 0.0;
    let mut saa = 0.0;
    let mut sbb = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    if saa <= 0.0 || sbb <= 0.0 {
        return None;
    }
    Some(sab / (saa * sbb).sqrt())
}

pub fn pesaran_cd(model: &FittedModel) -> PanelResult<TestResult> {
    let mut by_entity: Vec<BTreeMap<i32, f64>> = vec![BTreeMap::new(); model.n_entities()];
    for (obs, r) in model.index().iter().zip(model.residuals().iter()) {
        by_entity[obs.entity].insert(obs.time, *r);
    }

    let mut sum = 0.0;
    let mut pairs = 0usize;
    let mut skipped = 0usize;
    for i in 0..by_entity.len() {
        for j in (i + 1)..by_entity.len() {
            let (a, b): (Vec<f64>, Vec<f64>) = by_entity[i]
                .iter()
                .filter_map(|(t, ei)| by_entity[j].get(t).map(|ej| (*ei, *ej)))
                .unzip();
            if a.len() < MIN_COMMON_PERIODS {
                skipped += 1;
                continue;
            }
            match correlation(&a, &b) {
                Some(rho) => {
                    sum += (a.len() as f64).sqrt() * rho;
                    pairs += 1;
                }
                None => skipped += 1,
            }
        }
    }

    if pairs == 0 {
        return Err(PanelError::InsufficientObservations {
            context: "Pesaran CD (entity pairs with common periods)".to_string(),
            available: 0,
            required: 1,
        });
    }

    let statistic = sum / (pairs as f64).sqrt();
    let distribution = NullDistribution::StandardNormal;
    Ok(TestResult {
        test: TestKind::PesaranCd,
        statistic,
        distribution,
        p_value: p_value(statistic, distribution)?,
        note: (skipped > 0).then(|| format!("{pairs} entity pairs used, {skipped} skipped")),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::{ModelType, Regressor, Specification, Variable};
    use crate::estimate::fit;
    use crate::panel::PanelTable;

    fn panel(common_shock: f64) -> PanelTable {
        let idio = [0.3, -0.2, 0.15, -0.35, 0.05, 0.25, -0.1, 0.4];
        let shock = [1.0, -1.5, 0.5, 2.0, -0.5, -1.0, 1.5, -2.0];
        let mut names = Vec::new();
        let mut years = Vec::new();
        let mut debt = Vec::new();
        let mut growth = Vec::new();
        for e in 0..6 {
            for t in 0..8 {
                let g = ((t * 3 + e * 5) % 7) as f64;
                names.push(format!("E{e}"));
                years.push(2000 + t as i32);
                growth.push(Some(g));
                debt.push(Some(e as f64 + 0.8 * g + common_shock * shock[t] + idio[(t + 3 * e) % 8]));
            }
        }
        let mut columns = BTreeMap::new();
        columns.insert("debt".to_string(), debt);
        columns.insert("gdp_growth".to_string(), growth);
        PanelTable::new("country", "year", names, years, columns).unwrap()
    }

    fn within(table: &PanelTable) -> FittedModel {
        let spec = Specification::new(
            "cd",
            Variable::Debt,
            vec![Regressor::Raw(Variable::GdpGrowth)],
            ModelType::Within,
        );
        fit(table, &spec).unwrap()
    }

    #[test]
    fn common_shock_is_detected() {
        let result = pesaran_cd(&within(&panel(3.0))).unwrap();
        assert!(result.statistic > 5.0, "CD {}", result.statistic);
        assert!(result.rejects(0.01));
        assert_eq!(result.note, None);
    }

    #[test]
    fn correlation_of_constant_series_is_undefined() {
        assert_eq!(correlation(&[1.0, 1.0, 1.0], &[0.5, 2.0, 1.0]), None);
        let rho = correlation(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((rho - 1.0).abs() < 1e-12);
    }

    #[test]
    fn disjoint_periods_leave_no_pairs() {
        let mut columns = BTreeMap::new();
        columns.insert("debt".to_string(), (0..6).map(|v| Some(v as f64 * 1.3 % 2.0)).collect());
        columns.insert("gdp_growth".to_string(), (0..6).map(|v| Some((v * v) as f64)).collect());
        let table = PanelTable::new(
            "country",
            "year",
            vec!["A".into(), "A".into(), "A".into(), "B".into(), "B".into(), "B".into()],
            vec![2000, 2001, 2002, 2010, 2011, 2012],
            columns,
        )
        .unwrap();
        assert!(matches!(
            pesaran_cd(&within(&table)),
            Err(PanelError::InsufficientObservations { .. })
        ));
    }
}
