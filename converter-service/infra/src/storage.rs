use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use converter_domain::{
    DomainError, FileId, FileStorePort, ShareId, ShareRecord, ShareStorePort, StoredFile,
    WavHeader, WAV_HEADER_LEN,
};
use time::OffsetDateTime;
use tokio::io::AsyncReadExt;

use crate::read_wav_header_prefix;

/// Converted files stored as `<root>/<fileId>.wav`.
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, file_id: &FileId) -> PathBuf {
        self.root.join(format!("{file_id}.wav"))
    }
}

#[async_trait]
impl FileStorePort for FsFileStore {
    async fn save(&self, file_id: &FileId, bytes: &[u8]) -> Result<StoredFile, DomainError> {
        let path = self.path_for(file_id);
        write_atomically(&self.root, &path, bytes).await?;

        tracing::debug!(file_id = %file_id, size = bytes.len(), path = %path.display(), "stored converted file");

        self.stat(file_id).await?.ok_or_else(|| {
            DomainError::StorageWriteFailure(format!("{} vanished after write", path.display()))
        })
    }

    async fn load(&self, file_id: &FileId) -> Result<Option<Vec<u8>>, DomainError> {
        match tokio::fs::read(self.path_for(file_id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(DomainError::internal_error(&format!(
                "cannot read file {file_id}: {err}"
            ))),
        }
    }

    async fn stat(&self, file_id: &FileId) -> Result<Option<StoredFile>, DomainError> {
        let path = self.path_for(file_id);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(DomainError::internal_error(&format!(
                    "cannot stat file {file_id}: {err}"
                )))
            }
        };

        Ok(Some(StoredFile {
            file_id: *file_id,
            size: metadata.len(),
            modified_at: modified_at(&metadata),
            header: read_header(&path, metadata.len()).await,
        }))
    }

    async fn purge_older_than(&self, cutoff: OffsetDateTime) -> Result<usize, DomainError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                return Err(DomainError::internal_error(&format!(
                    "cannot list {}: {err}",
                    self.root.display()
                )))
            }
        };

        let mut removed = 0;
        while let Some(entry) = next_entry(&mut entries).await? {
            let path = entry.path();
            let is_converted_file = path.extension().is_some_and(|ext| ext == "wav")
                && stem(&path).is_some_and(|stem| stem.parse::<FileId>().is_ok());
            if !is_converted_file {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if modified_at(&metadata) < cutoff {
                remove_quietly(&path).await;
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Share records stored as pretty JSON under `<dir>/<shareId>.json`.
pub struct FsShareStore {
    dir: PathBuf,
}

impl FsShareStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, share_id: &ShareId) -> PathBuf {
        self.dir.join(format!("{share_id}.json"))
    }
}

#[async_trait]
impl ShareStorePort for FsShareStore {
    async fn put(&self, record: &ShareRecord) -> Result<(), DomainError> {
        let json = serde_json::to_vec_pretty(record).map_err(|err| {
            DomainError::internal_error(&format!("cannot serialize share record: {err}"))
        })?;
        write_atomically(&self.dir, &self.path_for(&record.share_id), &json).await
    }

    async fn get(&self, share_id: &ShareId) -> Result<Option<ShareRecord>, DomainError> {
        let bytes = match tokio::fs::read(self.path_for(share_id)).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(DomainError::internal_error(&format!(
                    "cannot read share {share_id}: {err}"
                )))
            }
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|err| {
            DomainError::internal_error(&format!("corrupt share record {share_id}: {err}"))
        })
    }

    async fn remove(&self, share_id: &ShareId) -> Result<bool, DomainError> {
        match tokio::fs::remove_file(self.path_for(share_id)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(DomainError::internal_error(&format!(
                "cannot remove share {share_id}: {err}"
            ))),
        }
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize, DomainError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                return Err(DomainError::internal_error(&format!(
                    "cannot list {}: {err}",
                    self.dir.display()
                )))
            }
        };

        let mut removed = 0;
        while let Some(entry) = next_entry(&mut entries).await? {
            let path = entry.path();
            let Some(share_id) = stem(&path).and_then(|stem| stem.parse::<ShareId>().ok()) else {
                continue;
            };
            match self.get(&share_id).await {
                Ok(Some(record)) if record.is_expired(now) => {
                    remove_quietly(&path).await;
                    removed += 1;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(share_id = %share_id, error = %err, "removing unreadable share record");
                    remove_quietly(&path).await;
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

async fn write_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), DomainError> {
    tokio::fs::create_dir_all(dir).await.map_err(|err| {
        DomainError::StorageWriteFailure(format!("cannot create {}: {err}", dir.display()))
    })?;

    let partial = path.with_extension("part");
    tokio::fs::write(&partial, bytes).await.map_err(|err| {
        DomainError::StorageWriteFailure(format!("cannot write {}: {err}", partial.display()))
    })?;
    tokio::fs::rename(&partial, path).await.map_err(|err| {
        DomainError::StorageWriteFailure(format!("cannot finalize {}: {err}", path.display()))
    })
}

async fn next_entry(
    entries: &mut tokio::fs::ReadDir,
) -> Result<Option<tokio::fs::DirEntry>, DomainError> {
    entries
        .next_entry()
        .await
        .map_err(|err| DomainError::internal_error(&format!("directory scan failed: {err}")))
}

async fn remove_quietly(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove expired entry");
        }
    }
}

async fn read_header(path: &Path, total_len: u64) -> Option<WavHeader> {
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let mut prefix = [0_u8; WAV_HEADER_LEN];
    file.read_exact(&mut prefix).await.ok()?;
    read_wav_header_prefix(&prefix, total_len).ok()
}

fn stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|stem| stem.to_str())
}

fn modified_at(metadata: &std::fs::Metadata) -> OffsetDateTime {
    metadata
        .modified()
        .map(OffsetDateTime::from)
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
}
