use std::net::SocketAddr;

use common::FirmwareInfo;
use mock_device::MockDevice;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("mock_device=debug,tower_http=debug")
        .init();

    let addr: SocketAddr = std::env::var("MOCK_DEVICE_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;
    let version = std::env::var("MOCK_DEVICE_VERSION").unwrap_or_else(|_| "1.0.0".to_string());
    let latest = std::env::var("MOCK_DEVICE_LATEST").unwrap_or_else(|_| "1.1.0".to_string());

    let firmware = FirmwareInfo {
        url: format!("http://{}/firmware/{}.bin", addr, latest),
        version: latest,
        changelog: "Smoother fades between pattern steps".to_string(),
    };

    let device = MockDevice::new(version, firmware);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Mock device listening on http://{}", listener.local_addr()?);
    info!(
        "Point led-remote at it with LED_REMOTE_FIRMWARE_URL=http://{}/firmware/version.json",
        listener.local_addr()?
    );

    axum::serve(listener, mock_device::router(device)).await?;

    Ok(())
}
