//! Feature selection and model comparison tables

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::{format_metric, Decision, Evaluation, FittedModel, SelectionResult, TrainedModel};

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn section(icon: &str, title: &str) {
    println!();
    println!("    {} {}", style(icon).cyan(), style(title).white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    println!();
}

/// Print Boruta decisions, confirmed features first
pub fn display_selection(result: &SelectionResult) {
    section("🔬", "FEATURE SELECTION");

    let mut decisions: Vec<_> = result.decisions.iter().collect();
    decisions.sort_by(|a, b| {
        let rank = |d: Decision| match d {
            Decision::Confirmed => 0,
            Decision::Tentative => 1,
            Decision::Rejected => 2,
        };
        rank(a.decision).cmp(&rank(b.decision)).then(
            b.median_importance
                .partial_cmp(&a.median_importance)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Feature").add_attribute(Attribute::Bold),
        Cell::new("Decision").add_attribute(Attribute::Bold),
        Cell::new("Hits").add_attribute(Attribute::Bold),
        Cell::new("Median Z").add_attribute(Attribute::Bold),
    ]);
    for d in decisions {
        let color = match d.decision {
            Decision::Confirmed => Color::Green,
            Decision::Tentative => Color::Yellow,
            Decision::Rejected => Color::Red,
        };
        let label = if d.rough_fixed {
            format!("{} (rough fix)", d.decision)
        } else {
            d.decision.to_string()
        };
        table.add_row(vec![
            Cell::new(&d.name),
            Cell::new(label).fg(color),
            Cell::new(format!("{}/{}", d.hits, d.runs)),
            Cell::new(format!("{:.2}", d.median_importance)),
        ]);
    }
    print_indented(&table);
    println!(
        "      {} runs, shadow max median {:.2}, {} selected",
        result.runs,
        result.shadow_max_median,
        style(result.selected().len()).green().bold()
    );
}

/// Print one row per model with CV and test scores, best test AUC highlighted
pub fn display_model_comparison(models: &[TrainedModel], evaluations: &[Evaluation]) {
    section("🏁", "MODEL COMPARISON");

    let best_auc = evaluations
        .iter()
        .map(|e| e.metrics.auc)
        .filter(|a| a.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        ["Model", "Tuned", "CV AUC", "Test AUC", "Accuracy", "Sensitivity", "Specificity", "Precision"]
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );

    for (model, eval) in models.iter().zip(evaluations) {
        let auc_cell = Cell::new(format_metric(eval.metrics.auc));
        let auc_cell = if eval.metrics.auc == best_auc {
            auc_cell.fg(Color::Green).add_attribute(Attribute::Bold)
        } else {
            auc_cell
        };
        table.add_row(vec![
            Cell::new(model.name()),
            Cell::new(model.hyperparameters.to_string()),
            Cell::new(format_metric(model.cv_auc)),
            auc_cell,
            Cell::new(format_metric(eval.metrics.accuracy)),
            Cell::new(format_metric(eval.metrics.sensitivity)),
            Cell::new(format_metric(eval.metrics.specificity)),
            Cell::new(format_metric(eval.metrics.precision)),
        ]);
    }
    print_indented(&table);
}

/// Print the confusion matrix and the remaining metrics of one model
pub fn display_evaluation(eval: &Evaluation) {
    println!();
    println!(
        "    {} {}",
        style(&eval.model).white().bold(),
        style(format!("(threshold {:.2})", eval.threshold)).dim()
    );

    let cm = &eval.confusion;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new(""),
        Cell::new("Actual fail").add_attribute(Attribute::Bold),
        Cell::new("Actual pass").add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![
        Cell::new("Predicted fail").add_attribute(Attribute::Bold),
        Cell::new(cm.true_positive).fg(Color::Green),
        Cell::new(cm.false_positive).fg(Color::Red),
    ]);
    table.add_row(vec![
        Cell::new("Predicted pass").add_attribute(Attribute::Bold),
        Cell::new(cm.false_negative).fg(Color::Red),
        Cell::new(cm.true_negative).fg(Color::Green),
    ]);
    print_indented(&table);

    let m = &eval.metrics;
    println!(
        "      NPV {}  balanced acc {}  F1 {}  kappa {}",
        format_metric(m.negative_predictive_value),
        format_metric(m.balanced_accuracy),
        format_metric(m.f1),
        format_metric(m.kappa)
    );
}

/// Largest effects of a trained model: coefficients for linear families,
/// impurity importance summed per feature for forests
pub fn top_effects(trained: &TrainedModel, top: usize) -> Vec<(String, f64)> {
    let columns = trained.encoder.column_names();
    let mut effects: Vec<(String, f64)> = match &trained.model {
        FittedModel::Forest(_) => {
            let names = trained.encoder.feature_names();
            let mut totals = vec![0.0; names.len()];
            if let Some(importance) = trained.model.importances() {
                for (value, group) in importance.iter().zip(trained.encoder.groups()) {
                    totals[group] += value;
                }
            }
            names.into_iter().zip(totals).collect()
        }
        _ => match trained.model.coefficients() {
            Some((_, coefs)) => columns
                .into_iter()
                .zip(coefs.iter().copied())
                .filter(|(_, c)| *c != 0.0)
                .collect(),
            None => Vec::new(),
        },
    };
    effects.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap_or(std::cmp::Ordering::Equal));
    effects.truncate(top);
    effects
}

/// Print the largest effects of a model
pub fn display_effects(trained: &TrainedModel, top: usize) {
    let effects = top_effects(trained, top);
    if effects.is_empty() {
        return;
    }
    let heading = match trained.model {
        FittedModel::Forest(_) => "Importance",
        _ => "Coefficient",
    };

    println!();
    println!("    {}", style(trained.name()).white().bold());
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Term").add_attribute(Attribute::Bold),
        Cell::new(heading).add_attribute(Attribute::Bold),
    ]);
    for (name, value) in effects {
        let color = if value >= 0.0 { Color::Red } else { Color::Green };
        table.add_row(vec![Cell::new(name), Cell::new(format!("{:+.4}", value)).fg(color)]);
    }
    print_indented(&table);
}
