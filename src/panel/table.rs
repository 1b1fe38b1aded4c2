//! The panel table.
//!
//! A rectangular table of numeric columns indexed by `(entity, time)`. Missing
//! values are `None`. The index is validated once at construction: every pair must
//! be unique, since demeaning and clustering both key on it.

use std::collections::{BTreeMap, HashMap};

use crate::domain::Variable;
use crate::error::{PanelError, PanelResult};

#[derive(Debug, Clone)]
pub struct PanelTable {
    entity_column: String,
    time_column: String,
    /// Distinct entity names, sorted.
    entity_names: Vec<String>,
    /// Per-row position into `entity_names`.
    entity_ids: Vec<usize>,
    times: Vec<i32>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
    /// Means used to build centered columns, keyed by source column.
    centering_means: BTreeMap<String, f64>,
}

impl PanelTable {
    /// Build a table, failing with `DuplicateIndex` if an `(entity, time)` pair repeats.
    pub fn new(
        entity_column: impl Into<String>,
        time_column: impl Into<String>,
        entities: Vec<String>,
        times: Vec<i32>,
        columns: BTreeMap<String, Vec<Option<f64>>>,
    ) -> PanelResult<Self> {
        let n = entities.len();
        if times.len() != n {
            return Err(PanelError::RaggedColumn {
                column: "time".to_string(),
                expected: n,
                found: times.len(),
            });
        }
        for (name, values) in &columns {
            if values.len() != n {
                return Err(PanelError::RaggedColumn {
                    column: name.clone(),
                    expected: n,
                    found: values.len(),
                });
            }
        }

        let mut entity_names = entities.clone();
        entity_names.sort();
        entity_names.dedup();
        let lookup: HashMap<&str, usize> = entity_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let entity_ids: Vec<usize> = entities.iter().map(|e| lookup[e.as_str()]).collect();

        let mut seen: HashMap<(usize, i32), usize> = HashMap::with_capacity(n);
        for row in 0..n {
            let key = (entity_ids[row], times[row]);
            if let Some(&first_row) = seen.get(&key) {
                return Err(PanelError::DuplicateIndex {
                    entity: entities[row].clone(),
                    time: times[row],
                    first_row,
                    second_row: row,
                });
            }
            seen.insert(key, row);
        }

        Ok(Self {
            entity_column: entity_column.into(),
            time_column: time_column.into(),
            entity_names,
            entity_ids,
            times,
            columns,
            centering_means: BTreeMap::new(),
        })
    }

    pub fn entity_column(&self) -> &str {
        &self.entity_column
    }

    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    pub fn n_rows(&self) -> usize {
        self.times.len()
    }

    pub fn n_entities(&self) -> usize {
        self.entity_names.len()
    }

    pub fn entity_names(&self) -> &[String] {
        &self.entity_names
    }

    pub fn entity_ids(&self) -> &[usize] {
        &self.entity_ids
    }

    pub fn entity_of(&self, row: usize) -> &str {
        &self.entity_names[self.entity_ids[row]]
    }

    pub fn times(&self) -> &[i32] {
        &self.times
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> PanelResult<&[Option<f64>]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| PanelError::MissingColumn(name.to_string()))
    }

    pub fn variable(&self, variable: Variable) -> PanelResult<&[Option<f64>]> {
        self.column(variable.column())
    }

    /// Row positions per entity (indexed like `entity_names`), each sorted by time.
    pub fn groups(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.entity_names.len()];
        for (row, &entity) in self.entity_ids.iter().enumerate() {
            groups[entity].push(row);
        }
        for rows in &mut groups {
            rows.sort_by_key(|&r| self.times[r]);
        }
        groups
    }

    /// Mean recorded when `column` was centered.
    pub fn centering_mean(&self, column: &str) -> Option<f64> {
        self.centering_means.get(column).copied()
    }

    /// Fail unless `entity` has no missing values in `column`.
    ///
    /// Entities absent from the table pass trivially.
    pub fn require_complete(&self, entity: &str, column: &str) -> PanelResult<()> {
        let values = self.column(column)?;
        let missing = (0..self.n_rows())
            .filter(|&row| self.entity_of(row) == entity && values[row].is_none())
            .count();
        if missing > 0 {
            return Err(PanelError::IncompleteInterpolatedSeries {
                entity: entity.to_string(),
                column: column.to_string(),
                missing,
            });
        }
        Ok(())
    }

    /// Copy of this table with one more derived column.
    ///
    /// Existing columns are never overwritten; adding a name that already exists is
    /// a no-op returning an identical table.
    pub(crate) fn with_derived_column(
        &self,
        name: String,
        values: Vec<Option<f64>>,
        source: &str,
        mean: f64,
    ) -> PanelResult<Self> {
        if values.len() != self.n_rows() {
            return Err(PanelError::RaggedColumn {
                column: name,
                expected: self.n_rows(),
                found: values.len(),
            });
        }
        let mut out = self.clone();
        if !out.columns.contains_key(&name) {
            out.columns.insert(name, values);
            out.centering_means.insert(source.to_string(), mean);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_table(entities: &[&str], times: &[i32]) -> PanelResult<PanelTable> {
        let n = entities.len();
        let mut columns = BTreeMap::new();
        columns.insert("debt".to_string(), (0..n).map(|i| Some(i as f64)).collect());
        PanelTable::new(
            "country",
            "year",
            entities.iter().map(|s| s.to_string()).collect(),
            times.to_vec(),
            columns,
        )
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let err = small_table(&["Chile", "Peru", "Chile"], &[2000, 2000, 2000]).unwrap_err();
        match err {
            PanelError::DuplicateIndex {
                entity,
                time,
                first_row,
                second_row,
            } => {
                assert_eq!(entity, "Chile");
                assert_eq!(time, 2000);
                assert_eq!((first_row, second_row), (0, 2));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn groups_are_sorted_by_time() {
        let table = small_table(&["Peru", "Chile", "Peru", "Chile"], &[2002, 2001, 2001, 2000]).unwrap();
        assert_eq!(table.entity_names(), &["Chile".to_string(), "Peru".to_string()]);
        let groups = table.groups();
        assert_eq!(groups[0], vec![3, 1]);
        assert_eq!(groups[1], vec![2, 0]);
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let mut columns = BTreeMap::new();
        columns.insert("debt".to_string(), vec![Some(1.0)]);
        let err = PanelTable::new(
            "country",
            "year",
            vec!["A".to_string(), "B".to_string()],
            vec![2000, 2000],
            columns,
        )
        .unwrap_err();
        assert!(matches!(err, PanelError::RaggedColumn { found: 1, .. }));
    }

    #[test]
    fn require_complete_counts_gaps() {
        let mut columns = BTreeMap::new();
        columns.insert("unemployment".to_string(), vec![Some(5.0), None, None, Some(7.0)]);
        let table = PanelTable::new(
            "country",
            "year",
            vec!["China".into(), "China".into(), "Peru".into(), "Peru".into()],
            vec![2000, 2001, 2000, 2001],
            columns,
        )
        .unwrap();
        let err = table.require_complete("China", "unemployment").unwrap_err();
        assert!(matches!(err, PanelError::IncompleteInterpolatedSeries { missing: 1, .. }));
        assert!(table.require_complete("Argentina", "unemployment").is_ok());
    }
}
