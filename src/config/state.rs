// Application state module
// Read-only state shared by every connection

use std::sync::Arc;

use super::types::Config;
use crate::handler::FileServer;
use crate::isolation::ResponseFinishers;

/// Application state, built once at startup and never mutated
pub struct AppState {
    pub config: Config,
    pub files: FileServer,
    pub finishers: Arc<ResponseFinishers>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let files = FileServer::from_config(&config);
        Self::with_files(config, files)
    }

    /// Build state around an already configured file engine
    pub fn with_files(config: Config, files: FileServer) -> Self {
        Self {
            config,
            files,
            finishers: Arc::new(ResponseFinishers::isolated()),
        }
    }
}
