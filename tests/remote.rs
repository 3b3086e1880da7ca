use std::{net::SocketAddr, time::Duration};

use common::{Color, FirmwareInfo};
use led_remote::prelude::*;
use mock_device::{MockDevice, Received};
use tokio::sync::mpsc;

struct Remote {
    controller: Controller<HttpDevice, MemoryStore>,
    receiver: mpsc::Receiver<MessageKind>,
    device: MockDevice,
    store: MemoryStore,
    address: String,
}

impl Remote {
    async fn start() -> Self {
        let device = MockDevice::new(
            "1.0.0",
            FirmwareInfo {
                version: "1.1.0".to_string(),
                url: "http://firmware.local/1.1.0.bin".to_string(),
                changelog: "Smoother fades".to_string(),
            },
        );
        let addr = mock_device::spawn(SocketAddr::from(([127, 0, 0, 1], 0)), device.clone())
            .await
            .unwrap();

        let config = Config {
            firmware_url: format!("http://{}/firmware/version.json", addr),
            update_reboot_grace_ms: 100,
            ..Config::default()
        };
        let store = MemoryStore::default();
        let (sender, receiver) = mpsc::channel(100);
        let controller = Controller::new(
            HttpDevice::new(config.firmware_url.clone()),
            store.clone(),
            config,
            sender,
        );

        Self {
            controller,
            receiver,
            device,
            store,
            address: addr.to_string(),
        }
    }

    /// Handle an intent and wait for the device requests it started.
    async fn intent(&mut self, intent: Intent) {
        self.controller.handle(intent.into());
        self.finish_requests().await;
    }

    async fn finish_requests(&mut self) {
        while self.controller.requests_in_flight() > 0 {
            let message = self.receiver.recv().await.unwrap();
            self.controller.handle(message);
        }
    }

    async fn connect(&mut self) {
        let address = self.address.clone();
        self.intent(Intent::Connect(address)).await;
    }

    /// Handle queued messages until none arrive for `quiet`.
    async fn settle(&mut self, quiet: Duration) {
        while let Ok(Some(message)) = tokio::time::timeout(quiet, self.receiver.recv()).await {
            self.controller.handle(message);
        }
        self.finish_requests().await;
    }

    async fn colors_sent(&self) -> Vec<Color> {
        self.device
            .received()
            .await
            .into_iter()
            .filter_map(|received| match received {
                Received::Color(color) => Some(color),
                _ => None,
            })
            .collect()
    }
}

#[tokio::test]
async fn test_connect_and_drag_color() {
    let mut remote = Remote::start().await;

    remote.connect().await;
    assert_eq!(remote.controller.connection_state(), ConnectionState::Connected);
    assert_eq!(remote.store.load(), Some(remote.address.clone()));

    for color in [
        Color::new(0, 0, 0),
        Color::new(10, 10, 10),
        Color::new(255, 0, 0),
    ] {
        remote.intent(Intent::ChangeColor(color)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    remote.settle(Duration::from_millis(500)).await;

    assert_eq!(remote.colors_sent().await, vec![Color::new(255, 0, 0)]);
    assert_eq!(remote.device.color().await, Color::new(255, 0, 0));
}

#[tokio::test]
async fn test_connect_pushes_chosen_color() {
    let mut remote = Remote::start().await;

    remote.intent(Intent::SelectPreset(Color::new(0, 0, 255))).await;
    remote.connect().await;
    assert!(remote.colors_sent().await.is_empty());

    remote.settle(Duration::from_millis(500)).await;
    assert_eq!(remote.colors_sent().await, vec![Color::new(0, 0, 255)]);
    assert_eq!(
        remote.controller.status(),
        &StatusMessage::success("Colour updated")
    );
}

#[tokio::test]
async fn test_rainbow_pattern() {
    let mut remote = Remote::start().await;
    remote.connect().await;

    remote.intent(Intent::SetMode(ControlMode::Pattern)).await;
    remote.intent(Intent::GenerateRainbow).await;
    remote.intent(Intent::SendPattern).await;

    assert_eq!(remote.controller.status().kind, StatusKind::Success);
    assert_eq!(remote.device.pattern().await, remote.controller.pattern().steps());
    assert_eq!(remote.device.pattern().await.len(), RAINBOW_STEPS);
}

#[tokio::test]
async fn test_firmware_update_flow() {
    let mut remote = Remote::start().await;
    remote.connect().await;

    remote.intent(Intent::SetMode(ControlMode::System)).await;
    assert_eq!(remote.controller.device_info().unwrap().version, "1.0.0");

    remote.intent(Intent::CheckFirmware).await;
    assert!(remote.controller.update_available());

    remote.intent(Intent::TriggerUpdate { confirmed: true }).await;
    assert_eq!(remote.controller.status().kind, StatusKind::Success);
    assert_eq!(remote.device.version().await, "1.1.0");

    // Dropped once the reboot grace period is over
    remote.settle(Duration::from_millis(500)).await;
    assert_eq!(remote.controller.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_unreachable_device_is_not_connected() {
    let mut remote = Remote::start().await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed = listener.local_addr().unwrap().to_string();
    drop(listener);

    remote.intent(Intent::Connect(closed)).await;

    assert_eq!(remote.controller.connection_state(), ConnectionState::Disconnected);
    assert_eq!(remote.controller.status().kind, StatusKind::Error);
    assert_eq!(remote.store.load(), None);
}
