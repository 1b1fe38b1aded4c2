//! Flat-file exports.
//!
//! - coefficient tables (one row per specification × covariance × regressor)
//! - fitted values and residuals keyed by (entity, time), for plotting
//! - the collinearity correlation matrix
//! - the panel itself (used by `simulate`)
//!
//! Everything is plain CSV so it opens in spreadsheets and downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{CoefficientTable, FittedModel, Variable};
use crate::error::AppError;
use crate::panel::PanelTable;
use crate::report::CorrelationMatrix;

fn create(path: &Path, what: &str) -> Result<csv::Writer<File>, AppError> {
    csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create {what} CSV '{}': {e}", path.display())))
}

fn write_err(what: &str) -> impl Fn(csv::Error) -> AppError + '_ {
    move |e| AppError::new(2, format!("Failed to write {what} CSV: {e}"))
}

fn flush_err(what: &str) -> impl Fn(std::io::Error) -> AppError + '_ {
    move |e| AppError::new(2, format!("Failed to flush {what} CSV: {e}"))
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x}")).unwrap_or_default()
}

/// Write coefficient tables to one CSV.
pub fn write_coefficients_csv(path: &Path, tables: &[&CoefficientTable]) -> Result<(), AppError> {
    let what = "coefficient";
    let mut w = create(path, what)?;
    w.write_record([
        "spec",
        "model",
        "covariance",
        "regressor",
        "estimate",
        "std_error",
        "statistic",
        "p_value",
        "df",
    ])
    .map_err(write_err(what))?;

    for table in tables {
        for row in &table.rows {
            w.write_record([
                table.spec_label.clone(),
                table.model.display_name().to_string(),
                table.covariance.label().to_string(),
                row.regressor.clone(),
                format!("{:.10}", row.estimate),
                format!("{:.10}", row.std_error),
                format!("{:.6}", row.statistic),
                format!("{:.6e}", row.p_value),
                table.df.to_string(),
            ])
            .map_err(write_err(what))?;
        }
    }
    w.flush().map_err(flush_err(what))
}

/// Fitted values (response scale) and residuals per retained observation.
pub fn write_residuals_csv(path: &Path, model: &FittedModel) -> Result<(), AppError> {
    let what = "residual";
    let mut w = create(path, what)?;
    w.write_record(["spec", "entity", "time", "fitted", "residual"])
        .map_err(write_err(what))?;

    let fitted = model.fitted_levels();
    for (i, obs) in model.index().iter().enumerate() {
        let entity = model.entity_names().get(obs.entity).map(String::as_str).unwrap_or_default();
        w.write_record([
            model.spec().label.clone(),
            entity.to_string(),
            obs.time.to_string(),
            format!("{:.10}", fitted[i]),
            format!("{:.10}", model.residuals()[i]),
        ])
        .map_err(write_err(what))?;
    }
    w.flush().map_err(flush_err(what))
}

/// Variable × variable correlation matrix; undefined entries are left empty.
pub fn write_correlation_csv(path: &Path, matrix: &CorrelationMatrix) -> Result<(), AppError> {
    let what = "correlation";
    let mut w = create(path, what)?;
    let mut header = vec!["variable".to_string()];
    header.extend(matrix.names.iter().cloned());
    w.write_record(&header).map_err(write_err(what))?;

    for (i, name) in matrix.names.iter().enumerate() {
        let mut record = vec![name.clone()];
        record.extend((0..matrix.names.len()).map(|j| fmt_opt(matrix.get(i, j))));
        w.write_record(&record).map_err(write_err(what))?;
    }
    w.flush().map_err(flush_err(what))
}

/// Write the study columns of a panel in the layout `ingest` reads back.
pub fn write_panel_csv<W: Write>(writer: W, table: &PanelTable) -> Result<(), AppError> {
    let what = "panel";
    let mut w = csv::Writer::from_writer(writer);
    let mut header = vec![table.entity_column().to_string(), table.time_column().to_string()];
    header.extend(Variable::ALL.iter().map(|v| v.column().to_string()));
    w.write_record(&header).map_err(write_err(what))?;

    let columns = Variable::ALL
        .iter()
        .map(|v| table.variable(*v))
        .collect::<Result<Vec<_>, _>>()?;
    for row in 0..table.n_rows() {
        let mut record = vec![table.entity_of(row).to_string(), table.times()[row].to_string()];
        record.extend(columns.iter().map(|c| c[row].map(|v| format!("{v}")).unwrap_or_else(|| "NA".to_string())));
        w.write_record(&record).map_err(write_err(what))?;
    }
    w.flush().map_err(flush_err(what))
}

pub fn write_panel_csv_file(path: &Path, table: &PanelTable) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create panel CSV '{}': {e}", path.display())))?;
    write_panel_csv(file, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticPanelConfig, generate_panel};
    use crate::io::read_panel;

    #[test]
    fn panel_csv_reads_back() {
        let config = SyntheticPanelConfig {
            entities: 4,
            years: 5,
            missing_rate: 0.1,
            ..SyntheticPanelConfig::default()
        };
        let table = generate_panel(&config).unwrap();
        let mut buf = Vec::new();
        write_panel_csv(&mut buf, &table).unwrap();

        let back = read_panel(buf.as_slice(), &[]).unwrap();
        assert_eq!(back.rows_used, 20);
        assert!(back.row_errors.is_empty());
        let a = table.column("inflation").unwrap();
        let b = back.table.column("inflation").unwrap();
        for (x, y) in a.iter().zip(b) {
            match (x, y) {
                (Some(x), Some(y)) => assert!((x - y).abs() < 1e-12),
                (None, None) => {}
                _ => panic!("missingness changed"),
            }
        }
    }
}
