//! pisarisk: Math-failure risk models CLI
//!
//! Runs load → clean → split → select → train → evaluate on a survey extract
//! and prints a comparison of the fitted models.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use pisarisk::cli::{confirm_training, Cli};
use pisarisk::pipeline::{clean, evaluate, load_survey, select_features, train_all, train_test_split};
use pisarisk::report::{
    display_cleaning, display_effects, display_evaluation, display_model_comparison, display_selection,
    RunReportBuilder, StageTimings,
};
use pisarisk::utils::{
    create_progress_bar, create_spinner, finish_with_success, finish_with_warning, hidden_progress,
    print_banner, print_completion, print_config, print_count, print_info, print_step_header,
    print_step_time, print_success, print_warning,
};

/// Coefficients / importances listed per model
const TOP_EFFECTS: usize = 8;

fn spinner(show: bool, message: &str) -> ProgressBar {
    if show {
        create_spinner(message)
    } else {
        hidden_progress()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.to_config()?;
    let show = !cli.json;
    let target = config.target.as_str();
    let input = config
        .input
        .as_deref()
        .context("Input file is required. Use -i/--input to specify a file.")?;

    if show {
        print_banner(env!("CARGO_PKG_VERSION"));
        print_config(&config);
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut timings = StageTimings::default();

    // Step 1: Load
    if show {
        print_step_header(1, "Load Survey");
    }
    let step_start = Instant::now();
    let pb = spinner(show, "Reading survey file...");
    let survey = load_survey(
        input,
        config.infer_schema_length,
        config.population_filter(),
        &config.column_prefixes,
        target,
    )?;
    finish_with_success(&pb, "Dataset loaded");
    if show {
        println!("\n    {} Dataset Statistics:", style("✧").cyan());
        println!("      Rows on disk: {}", survey.raw_shape.0);
        println!("      Population rows: {}", survey.population_rows);
        println!("      Questionnaire columns: {}", survey.df.width().saturating_sub(1));
        println!("      Estimated memory: {:.2} MB", survey.memory_mb);
        print_step_time(step_start.elapsed());
    }
    timings.record("load", step_start.elapsed());

    // Step 2: Clean
    if show {
        print_step_header(2, "Clean");
    }
    let step_start = Instant::now();
    let pb = spinner(show, "Dropping, imputing and binarizing...");
    let cleaned = clean(&survey.df, &config.cleaning_options())?;
    finish_with_success(&pb, "Cleaning complete");
    let predictors = cleaned.predictors();
    if show {
        display_cleaning(&cleaned.summary);
        print_step_time(step_start.elapsed());
    }
    timings.record("clean", step_start.elapsed());

    // Step 3: Split
    if show {
        print_step_header(3, "Train/Test Split");
    }
    let step_start = Instant::now();
    let split = train_test_split(&cleaned.df, config.split_ratio, &mut rng)?;
    if show {
        print_success(&format!(
            "{} training rows, {} test rows",
            split.train.height(),
            split.test.height()
        ));
        print_step_time(step_start.elapsed());
    }
    timings.record("split", step_start.elapsed());

    let mut report = RunReportBuilder::new(&config, &cleaned.summary, split.train.height(), split.test.height());

    // Step 4: Feature selection
    if show {
        print_step_header(4, "Feature Selection (Boruta)");
    }
    let step_start = Instant::now();
    let selection = if config.skip_selection {
        if show {
            print_info("Selection skipped, every family uses all predictors");
        }
        None
    } else {
        let pb = spinner(show, &format!("Running up to {} Boruta rounds...", config.boruta.max_runs));
        let result = select_features(&split.train, target, &predictors, &config.boruta, &mut rng)?;
        if result.selected().is_empty() {
            finish_with_warning(&pb, "No feature confirmed, using all predictors");
        } else {
            finish_with_success(&pb, "Feature selection complete");
        }
        if show {
            print_count(
                "confirmed feature(s)",
                result.selected().len(),
                Some(&format!("of {}", predictors.len())),
            );
            display_selection(&result);
        }
        report.set_selection(&result);
        Some(result)
    };
    if show {
        print_step_time(step_start.elapsed());
    }
    timings.record("select", step_start.elapsed());

    // Step 5: Train
    if show {
        print_step_header(5, "Train Models");
    }
    let n_models = config.trainer.families.len() * 2;
    if show && !cli.no_confirm && !confirm_training(n_models, split.train.height(), config.trainer.folds)? {
        println!("Cancelled by user.");
        return Ok(());
    }

    let step_start = Instant::now();
    let pb = if show {
        create_progress_bar(n_models as u64, "Cross-validating")
    } else {
        hidden_progress()
    };
    let selected = selection.as_ref().map(|s| s.selected());
    let models = train_all(
        &split.train,
        target,
        &predictors,
        selected.as_deref(),
        &config.trainer,
        &mut rng,
        |trained| {
            pb.set_message(trained.name());
            pb.inc(1);
        },
    )?;
    finish_with_success(&pb, &format!("{} models trained", models.len()));
    if show {
        print_step_time(step_start.elapsed());
    }
    timings.record("train", step_start.elapsed());

    // Step 6: Evaluate
    if show {
        print_step_header(6, "Evaluate on Test Split");
    }
    let step_start = Instant::now();
    let mut evaluations = Vec::with_capacity(models.len());
    for trained in &models {
        let evaluation = evaluate(trained, &split.test, target, config.trainer.threshold)?;
        report.add_model(trained, &evaluation);
        evaluations.push(evaluation);
    }
    timings.record("evaluate", step_start.elapsed());

    let report = report.build(timings);

    if !show {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    display_model_comparison(&models, &evaluations);
    for evaluation in &evaluations {
        display_evaluation(evaluation);
    }
    println!();
    println!("    {} {}", style("📌").cyan(), style("LARGEST EFFECTS").white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    for trained in models.iter().filter(|m| !m.oversampled) {
        display_effects(trained, TOP_EFFECTS);
    }
    if let Some(best) = report.best_model() {
        println!();
        print_success(&format!("Best test AUC: {}", best.name));
    } else {
        print_warning("Test AUC is undefined for every model");
    }
    report.timings.display();

    print_completion();
    Ok(())
}
