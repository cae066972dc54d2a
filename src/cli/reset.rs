use crate::cli::{load_settings, state_store, Overrides};
use anyhow::{Context, Result};

pub fn run(overrides: &Overrides) -> Result<()> {
    let settings = load_settings(overrides)?;
    let store = state_store(&settings)?;

    if !store.exists() {
        println!("Nothing to reset.");
        return Ok(());
    }

    store
        .clear()
        .with_context(|| format!("Failed to remove {}", store.path().display()))?;

    tracing::info!(path = ?store.path(), "Removed refresh state");
    println!("Cleared stored refresh state.");
    Ok(())
}
