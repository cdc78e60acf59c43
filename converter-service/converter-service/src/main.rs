use anyhow::Result;
use converter_configuration::{load_config, setup_logging};
use converter_setup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    setup_logging(&config);
    tracing::info!(bind = %config.server.bind_address(), "converter service starting");
    let server_config = config.server.clone();
    let app = Application::new(config).await?;
    app.run(server_config).await?;
    Ok(())
}
