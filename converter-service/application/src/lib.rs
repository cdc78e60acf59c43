pub mod dto;
pub mod error;
pub mod usecase;

pub use dto::*;
pub use error::*;
pub use usecase::{
    ConversionPolicy, ConvertAudioUseCase, ConvertAudioUseCaseImpl, ProxyUploadUseCase,
    ProxyUploadUseCaseImpl, PurgeExpiredUseCase, PurgeExpiredUseCaseImpl, PurgeReport,
    RetrieveConversionUseCase, RetrieveConversionUseCaseImpl, ShareUseCase, ShareUseCaseImpl,
};
