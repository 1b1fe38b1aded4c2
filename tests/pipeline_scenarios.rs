use std::collections::BTreeMap;

use debt_panel::app::pipeline::run_analysis_on;
use debt_panel::data::{SyntheticPanelConfig, TRUE_INTERACTION, generate_panel, true_coefficients};
use debt_panel::diagnostics::hausman_statistic;
use debt_panel::domain::{AnalysisConfig, MixedFormPolicy, ModelType, Regressor, Specification, Study, Variable};
use debt_panel::error::PanelError;
use debt_panel::estimate::fit;
use debt_panel::io::{build_summary, read_panel, write_panel_csv};
use debt_panel::panel::{PanelTable, uncenter};
use nalgebra::{DMatrix, DVector};

fn table(rows: &[(&str, i32, f64, f64, f64)]) -> PanelTable {
    let mut columns = BTreeMap::new();
    columns.insert("debt".to_string(), rows.iter().map(|r| Some(r.2)).collect());
    columns.insert("gdp_growth".to_string(), rows.iter().map(|r| Some(r.3)).collect());
    columns.insert("gov_spending".to_string(), rows.iter().map(|r| Some(r.4)).collect());
    PanelTable::new(
        "country",
        "year",
        rows.iter().map(|r| r.0.to_string()).collect(),
        rows.iter().map(|r| r.1).collect(),
        columns,
    )
    .unwrap()
}

fn two_regressor_spec(model: ModelType) -> Specification {
    Specification::new(
        "two",
        Variable::Debt,
        vec![Regressor::Raw(Variable::GdpGrowth), Regressor::Raw(Variable::GovSpending)],
        model,
    )
}

#[test]
fn within_recovers_slopes_on_noise_free_panel() {
    let effects = [("A", 5.0), ("B", -3.0), ("C", 12.0)];
    let mut rows = Vec::new();
    for (e, (name, alpha)) in effects.iter().enumerate() {
        for t in 0..4 {
            let g = (t as f64) * 1.3 + e as f64 - 0.2 * (t * t) as f64;
            let s = 10.0 + ((t * 3 + e * 5) % 7) as f64;
            rows.push((*name, 2001 + t as i32, alpha + 2.0 * g - s, g, s));
        }
    }
    let model = fit(&table(&rows), &two_regressor_spec(ModelType::Within)).unwrap();
    assert!((model.coefficient("gdp_growth").unwrap() - 2.0).abs() < 1e-8);
    assert!((model.coefficient("gov_spending").unwrap() + 1.0).abs() < 1e-8);
    assert!(model.residuals().iter().all(|e| e.abs() < 1e-8));
}

#[test]
fn singleton_entity_is_dropped_not_fatal() {
    let mut rows = vec![("Solo", 2000, 4.0, 1.0, 2.0)];
    for (name, shift) in [("A", 0.0), ("B", 3.0)] {
        for t in 0..4 {
            let g = t as f64 + shift * 0.1;
            let s = ((t * 5) % 3) as f64 + shift;
            rows.push((name, 2000 + t as i32, shift + 0.5 * g + s, g, s));
        }
    }
    let model = fit(&table(&rows), &two_regressor_spec(ModelType::Within)).unwrap();
    assert_eq!(model.audit().singleton_entities, vec!["Solo".to_string()]);
    assert_eq!(model.n_obs(), 8);
    assert!((model.coefficient("gdp_growth").unwrap() - 0.5).abs() < 1e-8);
}

#[test]
fn duplicate_index_is_rejected() {
    let err = PanelTable::new(
        "country",
        "year",
        vec!["A".to_string(), "A".to_string()],
        vec![2000, 2000],
        BTreeMap::new(),
    )
    .unwrap_err();
    assert!(matches!(err, PanelError::DuplicateIndex { .. }));
}

#[test]
fn interaction_coefficient_recovered_from_centered_columns() {
    let mut rows = Vec::new();
    for (e, name) in ["A", "B", "C", "D"].iter().enumerate() {
        for t in 0..5 {
            let g = ((t * 7 + e * 3) % 5) as f64 - 1.0 + 0.1 * e as f64;
            let s = ((t * 2 + e) % 4) as f64 + 0.3 * t as f64;
            rows.push((*name, 2000 + t as i32, 0.0, g, s));
        }
    }
    let raw = table(&rows);
    let centered = raw.with_centered(&[Variable::GdpGrowth, Variable::GovSpending]).unwrap();
    let cg = centered.column("c_gdp_growth").unwrap();
    let cs = centered.column("c_gov_spending").unwrap();

    // debt = α_e + g − s + 3·c_g·c_s
    let debt: Vec<Option<f64>> = (0..centered.n_rows())
        .map(|i| {
            let g = rows[i].3;
            let s = rows[i].4;
            Some(10.0 * centered.entity_ids()[i] as f64 + g - s + 3.0 * cg[i].unwrap() * cs[i].unwrap())
        })
        .collect();
    let mut columns = BTreeMap::new();
    columns.insert("debt".to_string(), debt);
    columns.insert("gdp_growth".to_string(), rows.iter().map(|r| Some(r.3)).collect());
    columns.insert("gov_spending".to_string(), rows.iter().map(|r| Some(r.4)).collect());
    let panel = PanelTable::new(
        "country",
        "year",
        rows.iter().map(|r| r.0.to_string()).collect(),
        rows.iter().map(|r| r.1).collect(),
        columns,
    )
    .unwrap()
    .with_centered(&[Variable::GdpGrowth, Variable::GovSpending])
    .unwrap();

    let mut spec = Specification::new(
        "gxs",
        Variable::Debt,
        vec![
            Regressor::Centered(Variable::GdpGrowth),
            Regressor::Centered(Variable::GovSpending),
            Regressor::Interaction(Variable::GdpGrowth, Variable::GovSpending),
        ],
        ModelType::Within,
    );
    spec.interaction = Some((Variable::GdpGrowth, Variable::GovSpending));
    let model = fit(&panel, &spec).unwrap();
    let product = model.coefficient("c_gdp_growth:c_gov_spending").unwrap();
    assert!((product - 3.0).abs() < 1e-8, "product coefficient {product}");
    assert!((model.coefficient("c_gdp_growth").unwrap() - 1.0).abs() < 1e-8);
}

#[test]
fn centering_round_trips() {
    let rows: Vec<_> = (0..6).map(|t| ("A", 2000 + t, 1.0, t as f64 * 1.7 - 2.0, 3.0)).collect();
    let centered = table(&rows).with_centered(&[Variable::GdpGrowth]).unwrap();
    let mean = centered.centering_mean("gdp_growth").unwrap();
    let c = centered.column("c_gdp_growth").unwrap();
    let sum: f64 = c.iter().flatten().sum();
    assert!(sum.abs() < 1e-12);
    let back = uncenter(c, mean);
    for (b, r) in back.iter().zip(&rows) {
        assert!((b.unwrap() - r.3).abs() < 1e-12);
    }
}

#[test]
fn hausman_matches_hand_computation() {
    let b_f = DVector::from_vec(vec![1.0, 2.0]);
    let b_r = DVector::from_vec(vec![0.0, 1.0]);
    let v_f = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 1.0]));
    let v_r = DMatrix::from_diagonal(&DVector::from_vec(vec![0.5, 0.5]));
    // d = (1, 1), V = diag(0.5, 0.5) => H = 4
    let (h, df) = hausman_statistic(&b_f, &v_f, &b_r, &v_r).unwrap();
    assert!((h - 4.0).abs() < 1e-12);
    assert_eq!(df, 2);
}

#[test]
fn synthetic_panel_end_to_end() {
    let table = generate_panel(&SyntheticPanelConfig::default()).unwrap();
    let mut buf = Vec::new();
    write_panel_csv(&mut buf, &table).unwrap();
    let complete = vec!["China".to_string(), "Argentina".to_string()];
    let ingest = read_panel(buf.as_slice(), &complete).unwrap();
    assert_eq!(ingest.rows_used, 300);
    assert!(ingest.row_errors.is_empty());

    let mut config = AnalysisConfig::new("synthetic.csv".into());
    config.mixed_forms = MixedFormPolicy::Warn;
    config.parallel = false;
    let study = Study::debt_study();
    let run = run_analysis_on(ingest, &config, &study).unwrap();

    // Entity effects are large, so pooled OLS is never chosen.
    let bp = run.diagnostics.breusch_pagan.as_ref().unwrap();
    assert!(bp.p_value < 0.05);
    assert_ne!(run.diagnostics.decision.chosen, ModelType::Pooling);
    assert_eq!(run.final_model.model_type(), run.diagnostics.decision.chosen);

    let truth = true_coefficients();
    for name in ["gdp_growth", "gov_spending", "gov_revenue"] {
        let estimate = run.final_model.coefficient(name).unwrap();
        assert!((estimate - truth[name]).abs() < 0.5, "{name}: {estimate} vs {}", truth[name]);
    }
    assert!(run.final_cluster.is_ok());
    assert!(run.joint_wald.as_ref().unwrap().p_value < 0.01);

    assert_eq!(run.interactions.len(), 6);
    for (label, result) in &run.interactions {
        assert!(result.is_ok(), "{label} failed: {:?}", result.as_ref().err());
    }
    let (_, growth) = run
        .interactions
        .iter()
        .find(|(label, _)| label == "growth_x_spending")
        .unwrap();
    let growth = growth.as_ref().unwrap();
    let term = growth.product_term().unwrap();
    let gamma = growth.model.coefficient(&term).unwrap();
    assert!((gamma - TRUE_INTERACTION).abs() < 0.1, "interaction {gamma}");

    let (_, pop) = run.interactions.iter().find(|(label, _)| label == "pop_x_urban").unwrap();
    assert!(!pop.as_ref().unwrap().warnings.is_empty());

    let summary = build_summary(&run, &config);
    assert_eq!(summary.interactions.len(), 6);
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["rows_used"].as_u64(), Some(300));
}

#[test]
fn mixed_forms_fail_only_their_specification() {
    let table = generate_panel(&SyntheticPanelConfig {
        seed: 7,
        ..SyntheticPanelConfig::default()
    })
    .unwrap();
    let mut buf = Vec::new();
    write_panel_csv(&mut buf, &table).unwrap();
    let ingest = read_panel(buf.as_slice(), &[]).unwrap();

    let config = AnalysisConfig::new("synthetic.csv".into());
    let run = run_analysis_on(ingest, &config, &Study::debt_study()).unwrap();
    let failed: Vec<&str> = run
        .interactions
        .iter()
        .filter(|(_, r)| r.is_err())
        .map(|(label, _)| label.as_str())
        .collect();
    assert_eq!(failed, vec!["pop_x_urban"]);
}

#[test]
fn too_few_entities_for_random_effects_falls_back_to_within() {
    // 8 entities cannot identify the between variance of 12 slopes plus an intercept.
    let table = generate_panel(&SyntheticPanelConfig {
        entities: 8,
        missing_rate: 0.0,
        ..SyntheticPanelConfig::default()
    })
    .unwrap();
    let mut buf = Vec::new();
    write_panel_csv(&mut buf, &table).unwrap();
    let ingest = read_panel(buf.as_slice(), &[]).unwrap();

    let mut config = AnalysisConfig::new("synthetic.csv".into());
    config.parallel = false;
    let run = run_analysis_on(ingest, &config, &Study::debt_study()).unwrap();

    assert!(run.diagnostics.breusch_pagan.is_ok());
    let err = run.diagnostics.hausman.as_ref().unwrap_err();
    assert!(matches!(err, PanelError::InsufficientObservations { .. }), "{err}");

    let decision = &run.diagnostics.decision;
    assert!(decision.fallback);
    assert!(decision.reason.contains("Hausman"), "{}", decision.reason);
    assert_eq!(decision.chosen, ModelType::Within);
    assert_eq!(run.final_model.model_type(), ModelType::Within);
    assert_eq!(run.final_model.n_entities(), 8);

    let summary = serde_json::to_value(build_summary(&run, &config)).unwrap();
    assert_eq!(summary["decision"]["fallback"], true);
}
