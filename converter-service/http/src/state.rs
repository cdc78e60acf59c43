use std::sync::Arc;

use converter_application::{
    ConvertAudioUseCase, ProxyUploadUseCase, RetrieveConversionUseCase, ShareUseCase,
};
pub use converter_domain::Capabilities;

#[derive(Clone)]
pub struct AppState {
    pub convert: Arc<dyn ConvertAudioUseCase>,
    pub retrieve: Arc<dyn RetrieveConversionUseCase>,
    pub share: Arc<dyn ShareUseCase>,
    pub upload: Arc<dyn ProxyUploadUseCase>,
    pub capabilities: Capabilities,
}

impl AppState {
    pub fn new(
        convert: Arc<dyn ConvertAudioUseCase>,
        retrieve: Arc<dyn RetrieveConversionUseCase>,
        share: Arc<dyn ShareUseCase>,
        upload: Arc<dyn ProxyUploadUseCase>,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            convert,
            retrieve,
            share,
            upload,
            capabilities,
        }
    }
}
