//! One-way within (fixed-effects) transformation.
//!
//! Each value is replaced by its deviation from the entity mean, which removes the
//! entity intercepts algebraically instead of estimating one dummy per entity. The
//! transformation runs on the complete-case sample, so every transformed column
//! has an entity mean of exactly zero over the rows actually used.

use nalgebra::{DMatrix, DVector};

/// Per-entity means of `values`; `entity_ids` are compact (`0..n_entities`).
pub fn entity_means(values: &[f64], entity_ids: &[usize], n_entities: usize) -> Vec<f64> {
    let mut sums = vec![0.0; n_entities];
    let mut counts = vec![0usize; n_entities];
    for (&v, &e) in values.iter().zip(entity_ids) {
        sums[e] += v;
        counts[e] += 1;
    }
    sums.iter()
        .zip(counts.iter())
        .map(|(&s, &c)| if c == 0 { 0.0 } else { s / c as f64 })
        .collect()
}

/// Observation count per entity.
pub fn entity_counts(entity_ids: &[usize], n_entities: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_entities];
    for &e in entity_ids {
        counts[e] += 1;
    }
    counts
}

/// Subtract entity means from one column.
pub fn demean(values: &[f64], entity_ids: &[usize], n_entities: usize) -> Vec<f64> {
    let means = entity_means(values, entity_ids, n_entities);
    values
        .iter()
        .zip(entity_ids)
        .map(|(&v, &e)| v - means[e])
        .collect()
}

/// Quasi-demeaning `v - θ_e · mean_e(v)` used by random effects.
pub fn quasi_demean(values: &[f64], entity_ids: &[usize], theta: &[f64]) -> Vec<f64> {
    let means = entity_means(values, entity_ids, theta.len());
    values
        .iter()
        .zip(entity_ids)
        .map(|(&v, &e)| v - theta[e] * means[e])
        .collect()
}

/// Within-transform a response and design matrix.
pub fn within_transform(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    entity_ids: &[usize],
    n_entities: usize,
) -> (DMatrix<f64>, DVector<f64>) {
    let y_w = DVector::from_vec(demean(y.as_slice(), entity_ids, n_entities));
    let mut x_w = DMatrix::<f64>::zeros(x.nrows(), x.ncols());
    for j in 0..x.ncols() {
        let col: Vec<f64> = x.column(j).iter().copied().collect();
        let demeaned = demean(&col, entity_ids, n_entities);
        x_w.set_column(j, &DVector::from_vec(demeaned));
    }
    (x_w, y_w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_columns_have_zero_entity_means() {
        let ids = [0, 0, 0, 1, 1, 2, 2, 2, 2];
        let x = DMatrix::from_fn(9, 2, |i, j| ((i * 7 + j * 3) % 5) as f64 + 0.37 * i as f64);
        let y = DVector::from_fn(9, |i, _| (i as f64).powi(2));

        let (x_w, y_w) = within_transform(&x, &y, &ids, 3);
        for j in 0..2 {
            let col: Vec<f64> = x_w.column(j).iter().copied().collect();
            for m in entity_means(&col, &ids, 3) {
                assert!(m.abs() < 1e-12, "entity mean {m} not zero");
            }
        }
        for m in entity_means(y_w.as_slice(), &ids, 3) {
            assert!(m.abs() < 1e-12);
        }
    }

    #[test]
    fn singleton_entity_becomes_zero_row() {
        let ids = [0, 0, 1];
        let out = demean(&[1.0, 3.0, 42.0], &ids, 2);
        assert_eq!(out, vec![-1.0, 1.0, 0.0]);
    }

    #[test]
    fn quasi_demean_interpolates_between_pooling_and_within() {
        let ids = [0, 0, 1, 1];
        let values = [1.0, 3.0, 5.0, 9.0];
        assert_eq!(quasi_demean(&values, &ids, &[0.0, 0.0]), values.to_vec());
        assert_eq!(quasi_demean(&values, &ids, &[1.0, 1.0]), demean(&values, &ids, 2));
        assert_eq!(quasi_demean(&values, &ids, &[0.5, 0.5]), vec![0.0, 2.0, 1.5, 5.5]);
    }
}
