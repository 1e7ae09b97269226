//! Interactive prompts using dialoguer

use anyhow::Result;
use dialoguer::Confirm;

/// Prompt user to confirm proceeding with an action
pub fn confirm_step(message: &str) -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(message)
        .default(true)
        .interact()?;
    Ok(confirmed)
}

/// Ask before the expensive training stage
pub fn confirm_training(models: usize, train_rows: usize, folds: usize) -> Result<bool> {
    let message = format!(
        "Train {} model(s) on {} rows with {}-fold cross-validation?",
        models, train_rows, folds
    );
    confirm_step(&message)
}
