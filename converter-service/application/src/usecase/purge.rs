use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use time::Duration;

use converter_domain::{Clock, FileStorePort, ShareStorePort};

use crate::ApplicationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub removed_files: usize,
    pub removed_shares: usize,
}

#[async_trait]
pub trait PurgeExpiredUseCase: Send + Sync {
    async fn purge(&self) -> Result<PurgeReport, ApplicationError>;
}

pub struct PurgeExpiredUseCaseImpl {
    file_store: Arc<dyn FileStorePort>,
    share_store: Arc<dyn ShareStorePort>,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl PurgeExpiredUseCaseImpl {
    pub fn new(
        file_store: Arc<dyn FileStorePort>,
        share_store: Arc<dyn ShareStorePort>,
        clock: Arc<dyn Clock>,
        retention: Duration,
    ) -> Self {
        Self {
            file_store,
            share_store,
            clock,
            retention,
        }
    }
}

#[async_trait]
impl PurgeExpiredUseCase for PurgeExpiredUseCaseImpl {
    async fn purge(&self) -> Result<PurgeReport, ApplicationError> {
        let now = self.clock.now();
        let report = PurgeReport {
            removed_files: self.file_store.purge_older_than(now - self.retention).await?,
            removed_shares: self.share_store.purge_expired(now).await?,
        };

        if report != PurgeReport::default() {
            tracing::info!(
                removed_files = report.removed_files,
                removed_shares = report.removed_shares,
                "purged expired conversions"
            );
        }
        Ok(report)
    }
}
