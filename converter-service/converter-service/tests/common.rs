use std::{net::TcpListener, time::Duration};

use reqwest::Client;
use tempfile::TempDir;

use converter_configuration::AppConfig;
use converter_setup::build_and_run;

pub struct TestFixture {
    pub storage: TempDir,
    server: tokio::task::JoinHandle<()>,
}

impl Drop for TestFixture {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn pick_free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .expect("extract local addr")
        .port()
}

async fn connect_with_retry(client: &Client, base_url: &str) {
    for _ in 0..40 {
        if client.get(format!("{base_url}/health")).send().await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("unable to reach converter service at {base_url}");
}

/// Full service on a free port, ffmpeg off, storage in a temp dir.
pub async fn setup_test_server() -> Result<(TestFixture, String, Client), Box<dyn std::error::Error>>
{
    let storage = tempfile::tempdir()?;
    let mut config = AppConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = pick_free_port();
    config.ffmpeg.enabled = false;
    config.storage.root_dir = storage.path().display().to_string();

    let base_url = format!("http://{}", config.server.bind_address());
    config.share.public_base_url = base_url.clone();

    let server_config = config.server.clone();
    let server = tokio::spawn(async move {
        if let Err(err) = build_and_run(config, server_config).await {
            eprintln!("converter service exited: {err:#}");
        }
    });

    let client = Client::new();
    connect_with_retry(&client, &base_url).await;
    Ok((TestFixture { storage, server }, base_url, client))
}
