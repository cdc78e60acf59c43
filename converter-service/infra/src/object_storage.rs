use std::time::Duration;

use async_trait::async_trait;
use converter_domain::{DomainError, ObjectStoragePort, StoredObject};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): doubles every attempt.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(120),
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// S3-compatible bucket reached with plain `PUT <endpoint>/<bucket>/<key>`.
pub struct HttpObjectStorage {
    client: Client,
    endpoint: String,
    bucket: String,
    access_token: Option<String>,
    public_base_url: Option<String>,
    retry: RetryPolicy,
}

impl HttpObjectStorage {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_token: Option<String>,
        public_base_url: Option<String>,
        retry: RetryPolicy,
    ) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(retry.attempt_timeout)
            .build()
            .map_err(|err| {
                DomainError::internal_error(&format!("cannot build object storage client: {err}"))
            })?;

        let endpoint: String = endpoint.into();
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            access_token,
            public_base_url: public_base_url.map(|url| url.trim_end_matches('/').to_string()),
            retry: RetryPolicy {
                max_attempts: retry.max_attempts.max(1),
                ..retry
            },
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{base}/{key}"),
            None => self.object_url(key),
        }
    }

    async fn put_once(
        &self,
        url: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), AttemptError> {
        let mut request = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes.to_vec());
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = tokio::time::timeout(self.retry.attempt_timeout, request.send())
            .await
            .map_err(|_| {
                AttemptError::Retryable(format!(
                    "attempt timed out after {}s",
                    self.retry.attempt_timeout.as_secs()
                ))
            })?
            .map_err(|err| AttemptError::Retryable(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_client_error()
            && status != StatusCode::REQUEST_TIMEOUT
            && status != StatusCode::TOO_MANY_REQUESTS
        {
            Err(AttemptError::Fatal(format!(
                "bucket rejected upload with HTTP {status}"
            )))
        } else {
            Err(AttemptError::Retryable(format!("bucket answered HTTP {status}")))
        }
    }
}

enum AttemptError {
    Retryable(String),
    Fatal(String),
}

#[async_trait]
impl ObjectStoragePort for HttpObjectStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, DomainError> {
        let url = self.object_url(key);
        let size = bytes.len() as u64;
        let max_attempts = self.retry.max_attempts;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let message = match self.put_once(&url, &bytes, content_type).await {
                Ok(()) => {
                    tracing::info!(key, size, attempt, "object storage upload succeeded");
                    return Ok(StoredObject {
                        key: key.to_string(),
                        url: self.public_url(key),
                        size,
                        attempts: attempt,
                    });
                }
                Err(AttemptError::Fatal(message)) => {
                    tracing::warn!(key, attempt, error = %message, "object storage upload rejected");
                    return Err(DomainError::UploadFailure {
                        attempts: attempt,
                        message,
                    });
                }
                Err(AttemptError::Retryable(message)) => message,
            };

            tracing::warn!(
                key,
                attempt,
                max_attempts,
                error = %message,
                "object storage upload attempt failed"
            );

            if attempt >= max_attempts {
                return Err(DomainError::UploadFailure {
                    attempts: attempt,
                    message,
                });
            }
            tokio::time::sleep(self.retry.backoff_after(attempt)).await;
        }
    }
}
