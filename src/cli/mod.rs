pub mod reset;
pub mod status;
pub mod trigger;
pub mod watch;

use crate::client::HttpJobClient;
use crate::controller::{EventBus, UpdateController};
use crate::core::clock::SystemClock;
use crate::core::settings::Settings;
use crate::core::store::StateStore;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub api_url: Option<String>,
    pub state_file: Option<PathBuf>,
}

pub fn load_settings(overrides: &Overrides) -> Result<Settings> {
    let mut settings = match &overrides.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    if let Some(url) = &overrides.api_url {
        settings.api.base_url = url.clone();
    }
    if let Some(path) = &overrides.state_file {
        settings.storage.state_path = Some(path.clone());
    }

    settings.validate()?;
    Ok(settings)
}

pub fn state_store(settings: &Settings) -> Result<StateStore> {
    let path = settings
        .state_path()
        .context("Could not determine data directory for refresh state")?;
    Ok(StateStore::new(path))
}

pub fn http_client(settings: &Settings) -> Result<Arc<HttpJobClient>> {
    let client = HttpJobClient::new(&settings.api.base_url, settings.request_timeout())
        .context("Failed to build HTTP client")?;
    Ok(Arc::new(client))
}

pub fn build_controller(
    settings: &Settings,
    client: Arc<HttpJobClient>,
    events: EventBus,
) -> Result<UpdateController> {
    let store = state_store(settings)?;
    tracing::debug!(
        path = ?store.path(),
        base_url = client.base_url(),
        "Building update controller"
    );

    Ok(UpdateController::new(
        client,
        store,
        events,
        settings.timing(),
        Arc::new(SystemClock),
    ))
}
