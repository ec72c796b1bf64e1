use tomehound_core::{AcquisitionService, Config, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    service: AcquisitionService,
}

impl AppState {
    pub fn new(config: Config, service: AcquisitionService) -> Self {
        Self { config, service }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn service(&self) -> &AcquisitionService {
        &self.service
    }
}
