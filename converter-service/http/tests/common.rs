use std::{
    net::TcpListener as StdTcpListener,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use converter_application::{
    ApplicationError, BatchConvertRequest, BatchConvertResponse, BatchItemError, BatchItemResult,
    ConversionCheckResponse, ConversionDownload, ConversionOptions, ConvertAudioRequest,
    ConvertAudioResponse, ConvertAudioUseCase, CreateShareRequest, CreateShareResponse,
    DownloadConversionRequest, ProxyUploadRequest, ProxyUploadResponse, ProxyUploadUseCase,
    RetrieveConversionUseCase, ShareDetailsResponse, ShareUseCase, SharedDownload,
};
use converter_configuration::ServerConfig;
use converter_domain::{DomainError, FileId, ShareId};
use converter_http_server::{build_router, serve, AppState, Capabilities};
use time::OffsetDateTime;
use tokio::net::TcpListener;

pub const STORED_BYTES: &[u8] = b"RIFF\x24\x00\x00\x00WAVEstored";
pub const PLACEHOLDER_BYTES: &[u8] = b"RIFF\x24\x00\x00\x00WAVEplaceholder";

/// Ids the fakes recognize, plus whatever they saw last.
pub struct Fixture {
    pub stored_file: FileId,
    pub live_share: ShareId,
    pub expired_share: ShareId,
    pub last_options: Arc<Mutex<Option<ConversionOptions>>>,
    server: tokio::task::JoinHandle<()>,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn response_for(file_id: FileId, original_name: &str, options: &ConversionOptions) -> ConvertAudioResponse {
    ConvertAudioResponse {
        file_id,
        original_name: original_name.to_string(),
        ffmpeg_available: false,
        r2_success: false,
        size: 44 + 4,
        degraded: true,
        engine: "synthetic-chords".to_string(),
        sample_rate: options.sample_rate.unwrap_or(44_100),
        channels: options.channels.unwrap_or(2),
        bit_depth: options.bit_depth.unwrap_or(16),
        duration_seconds: 5.0,
    }
}

struct FakeConvert {
    last_options: Arc<Mutex<Option<ConversionOptions>>>,
}

#[async_trait]
impl ConvertAudioUseCase for FakeConvert {
    async fn convert(
        &self,
        request: ConvertAudioRequest,
    ) -> Result<ConvertAudioResponse, ApplicationError> {
        *self.last_options.lock().unwrap() = Some(request.options.clone());
        if !request.file.file_name.ends_with(".mp3") {
            return Err(DomainError::InvalidFileType(request.file.file_name).into());
        }
        if request.file.bytes == b"garbage" {
            return Err(DomainError::ConversionFailed("no engine could decode".into()).into());
        }
        Ok(response_for(
            FileId::generate(),
            &request.file.file_name,
            &request.options,
        ))
    }

    async fn convert_batch(
        &self,
        request: BatchConvertRequest,
    ) -> Result<BatchConvertResponse, ApplicationError> {
        let mut results = Vec::new();
        for (index, file) in request.files.into_iter().enumerate() {
            let original_name = file.file_name.clone();
            let outcome = self
                .convert(ConvertAudioRequest {
                    file,
                    options: request.options.clone(),
                })
                .await;
            results.push(match outcome {
                Ok(result) => BatchItemResult {
                    index,
                    original_name,
                    ok: true,
                    result: Some(result),
                    error: None,
                },
                Err(error) => BatchItemResult {
                    index,
                    original_name,
                    ok: false,
                    result: None,
                    error: Some(BatchItemError {
                        error: error.code().to_string(),
                        detail: error.to_string(),
                    }),
                },
            });
        }
        Ok(BatchConvertResponse { results })
    }
}

struct FakeRetrieve {
    stored_file: FileId,
}

#[async_trait]
impl RetrieveConversionUseCase for FakeRetrieve {
    async fn check(&self, file_id: &str) -> Result<ConversionCheckResponse, ApplicationError> {
        let file_id: FileId = file_id.parse()?;
        let exists = file_id == self.stored_file;
        Ok(ConversionCheckResponse {
            file_id,
            exists,
            size: if exists { STORED_BYTES.len() as u64 } else { 0 },
            sample_rate: exists.then_some(44_100),
            channels: exists.then_some(2),
            bit_depth: exists.then_some(16),
            duration_seconds: exists.then_some(0.0),
        })
    }

    async fn download(
        &self,
        request: DownloadConversionRequest,
    ) -> Result<ConversionDownload, ApplicationError> {
        let file_id: FileId = request.file_id.parse()?;
        if file_id == self.stored_file {
            return Ok(ConversionDownload {
                file_id,
                file_name: format!("{file_id}.wav"),
                bytes: STORED_BYTES.to_vec(),
                degraded: false,
            });
        }
        if request.rebuild {
            return Ok(ConversionDownload {
                file_id,
                file_name: format!("{file_id}.wav"),
                bytes: PLACEHOLDER_BYTES.to_vec(),
                degraded: true,
            });
        }
        Err(DomainError::FileNotFound(file_id.to_string()).into())
    }
}

struct FakeShare {
    stored_file: FileId,
    live_share: ShareId,
    expired_share: ShareId,
}

#[async_trait]
impl ShareUseCase for FakeShare {
    async fn create_share(
        &self,
        request: CreateShareRequest,
    ) -> Result<CreateShareResponse, ApplicationError> {
        let file_id: FileId = request.file_id.parse()?;
        if file_id != self.stored_file {
            return Err(DomainError::FileNotFound(file_id.to_string()).into());
        }
        Ok(CreateShareResponse {
            share_id: self.live_share,
            share_url: format!("http://localhost:8080/share/{}", self.live_share),
            expires_at: OffsetDateTime::UNIX_EPOCH,
        })
    }

    async fn get_share(&self, share_id: &str) -> Result<ShareDetailsResponse, ApplicationError> {
        let share_id: ShareId = share_id.parse()?;
        if share_id == self.expired_share {
            return Err(DomainError::ShareExpired(share_id.to_string()).into());
        }
        if share_id != self.live_share {
            return Err(DomainError::ShareNotFound(share_id.to_string()).into());
        }
        Ok(ShareDetailsResponse {
            share_id,
            file_id: self.stored_file,
            original_name: "Morning Take.mp3".to_string(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            expires_at: OffsetDateTime::UNIX_EPOCH,
            download_url: format!("http://localhost:8080/api/share/{share_id}/download"),
        })
    }

    async fn download_share(&self, share_id: &str) -> Result<SharedDownload, ApplicationError> {
        let details = self.get_share(share_id).await?;
        Ok(SharedDownload {
            share_id: details.share_id,
            file_name: "Morning Take.wav".to_string(),
            bytes: STORED_BYTES.to_vec(),
        })
    }
}

struct FakeUpload;

#[async_trait]
impl ProxyUploadUseCase for FakeUpload {
    async fn upload(
        &self,
        request: ProxyUploadRequest,
    ) -> Result<ProxyUploadResponse, ApplicationError> {
        let key = request
            .key
            .unwrap_or_else(|| format!("uploads/{}", request.file.file_name));
        if key.starts_with("fail") {
            return Err(DomainError::UploadFailure {
                attempts: 3,
                message: "bucket answered 500".into(),
            }
            .into());
        }
        Ok(ProxyUploadResponse {
            success: true,
            url: format!("https://bucket.example.test/{key}"),
            key,
            size: request.file.bytes.len() as u64,
            attempts: 1,
        })
    }
}

fn pick_free_port() -> u16 {
    StdTcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .expect("extract local addr")
        .port()
}

async fn connect_with_retry(client: &reqwest::Client, base_url: &str) {
    for _ in 0..40 {
        if client.get(format!("{base_url}/health")).send().await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("unable to reach test server at {base_url}");
}

pub async fn setup_test_server_with_limit(
    max_body_bytes: usize,
) -> Result<(Fixture, String, reqwest::Client), Box<dyn std::error::Error>> {
    let stored_file = FileId::generate();
    let live_share = ShareId::generate();
    let expired_share = ShareId::generate();
    let last_options = Arc::new(Mutex::new(None));

    let state = AppState::new(
        Arc::new(FakeConvert {
            last_options: last_options.clone(),
        }),
        Arc::new(FakeRetrieve { stored_file }),
        Arc::new(FakeShare {
            stored_file,
            live_share,
            expired_share,
        }),
        Arc::new(FakeUpload),
        Capabilities {
            system_ffmpeg: false,
            bundled_ffmpeg: true,
            object_storage: false,
        },
    );

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: pick_free_port(),
        max_body_bytes,
    };
    let listener = TcpListener::bind(config.bind_address()).await?;
    let router = build_router(state, &config);
    let server = tokio::spawn(async move {
        let _ = serve(listener, router).await;
    });

    let base_url = format!("http://{}", config.bind_address());
    let client = reqwest::Client::new();
    connect_with_retry(&client, &base_url).await;

    Ok((
        Fixture {
            stored_file,
            live_share,
            expired_share,
            last_options,
            server,
        },
        base_url,
        client,
    ))
}

pub async fn setup_test_server(
) -> Result<(Fixture, String, reqwest::Client), Box<dyn std::error::Error>> {
    setup_test_server_with_limit(ServerConfig::default().max_body_bytes).await
}
