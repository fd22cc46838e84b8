use anyhow::Result;
use std::sync::Arc;

use axum::extract::Multipart;

use crate::common::AppConfig;
use crate::relay::{Reaper, TransferCoordinator};
use crate::session::{KeyGenerator, SessionStore};

/// What an upload hands over to its session: the still-unread request body.
pub type UploadSource = Multipart;

/// Shared handler state. Cloning is cheap; everything lives behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keygen: Arc<KeyGenerator>,
    pub coordinator: Arc<TransferCoordinator<UploadSource>>,
}

impl AppState {
    /// Validates `config` before anything is built from it.
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(SessionStore::new());
        let keygen = KeyGenerator::from_config(&config)?;
        let coordinator = TransferCoordinator::new(store, config.upload_timeout());

        Ok(Self {
            config: Arc::new(config),
            keygen: Arc::new(keygen),
            coordinator: Arc::new(coordinator),
        })
    }

    pub fn store(&self) -> &Arc<SessionStore<UploadSource>> {
        self.coordinator.store()
    }

    /// Reaper over this state's session store, on the configured cadence.
    pub fn reaper(&self) -> Reaper<UploadSource> {
        Reaper::new(self.store().clone(), self.config.reaper_interval())
    }
}
