pub mod convert;
mod placeholder;
pub mod purge;
pub mod retrieve;
pub mod share;
pub mod upload;

pub use convert::{ConversionPolicy, ConvertAudioUseCase, ConvertAudioUseCaseImpl};
pub use purge::{PurgeExpiredUseCase, PurgeExpiredUseCaseImpl, PurgeReport};
pub use retrieve::{RetrieveConversionUseCase, RetrieveConversionUseCaseImpl};
pub use share::{ShareUseCase, ShareUseCaseImpl};
pub use upload::{ProxyUploadUseCase, ProxyUploadUseCaseImpl};
