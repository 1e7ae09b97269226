//! Cleaning summary and stage timings

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;
use serde::Serialize;

use crate::pipeline::{CleaningSummary, MissingPolicy};

/// Missing ratio the survey analysis documents as acceptable
pub const DOCUMENTED_MISSING_THRESHOLD: f64 = 0.05;

/// Note shown when the applied missing policy differs from the documented one
pub fn missing_policy_note(policy: MissingPolicy) -> Option<String> {
    match policy {
        MissingPolicy::FullyMissing => Some(format!(
            "The documented rule drops columns above {:.0}% missing; only fully empty columns were dropped. \
             Pass --missing-threshold {} to apply the documented rule.",
            DOCUMENTED_MISSING_THRESHOLD * 100.0,
            DOCUMENTED_MISSING_THRESHOLD
        )),
        MissingPolicy::Threshold(t) if (t - DOCUMENTED_MISSING_THRESHOLD).abs() > f64::EPSILON => Some(format!(
            "Missing threshold {:.1}% differs from the documented {:.0}% rule.",
            t * 100.0,
            DOCUMENTED_MISSING_THRESHOLD * 100.0
        )),
        MissingPolicy::Threshold(_) => None,
    }
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn count_cell(count: usize) -> Cell {
    Cell::new(count).fg(if count == 0 { Color::White } else { Color::Red })
}

/// Print the cleaning summary table
pub fn display_cleaning(summary: &CleaningSummary) {
    println!();
    println!("    {} {}", style("🧹").cyan(), style("CLEANING SUMMARY").white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Metric").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);

    if let Some(policy) = summary.policy {
        table.add_row(vec![Cell::new("Missing policy"), Cell::new(policy)]);
    }
    table.add_row(vec![Cell::new("📁 Initial predictors"), Cell::new(summary.initial_columns)]);
    table.add_row(vec![
        Cell::new("🗑️  Dropped (missing)"),
        count_cell(summary.dropped_missing.len()),
    ]);
    table.add_row(vec![
        Cell::new("✋ Dropped (manual)"),
        count_cell(summary.dropped_manual.len()),
    ]);
    table.add_row(vec![
        Cell::new("✅ Final predictors"),
        Cell::new(summary.final_columns)
            .fg(Color::Green)
            .add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![
        Cell::new("Rows without target"),
        count_cell(summary.rows_dropped_target),
    ]);
    table.add_row(vec![Cell::new("Imputed cells"), Cell::new(summary.imputed_cells)]);

    let (non_events, events) = summary.class_counts;
    let total = (non_events + events).max(1);
    table.add_row(vec![
        Cell::new("🎯 Failing / passing"),
        Cell::new(format!(
            "{} / {} ({:.1}% failing)",
            events,
            non_events,
            events as f64 / total as f64 * 100.0
        ))
        .fg(Color::Cyan),
    ]);
    print_indented(&table);

    if let Some(policy) = summary.policy {
        if let Some(note) = missing_policy_note(policy) {
            println!();
            println!("    {} {}", style("ℹ").yellow(), style(note).dim());
        }
    }

    for (column, label) in &summary.sentinel_overrides {
        println!(
            "    {} {} already uses the sentinel, missing cells labelled {}",
            style("!").yellow(),
            style(column).bold(),
            style(label).yellow()
        );
    }

    if !summary.dropped_missing.is_empty() {
        println!();
        println!(
            "      {} {}:",
            style("High Missing Values").yellow(),
            style(format!("({})", summary.dropped_missing.len())).dim()
        );
        for (feature, ratio) in &summary.dropped_missing {
            println!("        {} {} {}", style("•").dim(), feature, style(format!("{:.1}%", ratio * 100.0)).dim());
        }
    }
    if !summary.dropped_manual.is_empty() {
        println!();
        println!(
            "      {} {}:",
            style("Manual Exclusions").yellow(),
            style(format!("({})", summary.dropped_manual.len())).dim()
        );
        for feature in &summary.dropped_manual {
            println!("        {} {}", style("•").dim(), feature);
        }
    }
}

/// Wall-clock time per stage
#[derive(Debug, Default, Serialize)]
pub struct StageTimings {
    stages: Vec<(String, f64)>,
}

impl StageTimings {
    pub fn record(&mut self, stage: &str, elapsed: Duration) {
        self.stages.push((stage.to_string(), elapsed.as_secs_f64()));
    }

    pub fn total_secs(&self) -> f64 {
        self.stages.iter().map(|(_, secs)| secs).sum()
    }

    pub fn display(&self) {
        println!();
        println!("    {} {}", style("⏱").cyan(), style("TIMINGS").white().bold());
        println!("    {}", style("─".repeat(50)).dim());

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Stage").add_attribute(Attribute::Bold),
            Cell::new("Seconds").add_attribute(Attribute::Bold),
        ]);
        for (stage, secs) in &self.stages {
            table.add_row(vec![Cell::new(stage), Cell::new(format!("{:.2}", secs))]);
        }
        table.add_row(vec![
            Cell::new("Total").add_attribute(Attribute::Bold),
            Cell::new(format!("{:.2}", self.total_secs())).add_attribute(Attribute::Bold),
        ]);
        print_indented(&table);
    }
}
