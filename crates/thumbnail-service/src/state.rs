use crate::service::ThumbnailService;

#[derive(Clone)]
pub struct AppState {
    service: ThumbnailService,
    avif_enabled: bool,
}

impl AppState {
    pub fn new(service: ThumbnailService, avif_enabled: bool) -> Self {
        Self {
            service,
            avif_enabled,
        }
    }

    pub fn service(&self) -> &ThumbnailService {
        &self.service
    }

    /// Output encoding depends on `Accept`, so responses carry `Vary: Accept`
    pub fn avif_enabled(&self) -> bool {
        self.avif_enabled
    }
}
