use gimbal_controller::{AxisRole, GimbalConfig, GimbalController};
use std::error::Error;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn report(controller: &GimbalController) {
    let status = controller.get_status();
    for role in [AxisRole::Yaw, AxisRole::Pitch] {
        if let Some(axis) = status.axis(role) {
            info!(
                "{:?} {:+.2} deg (raw {:.2}), temp {:?}, faults {:?}",
                role,
                axis.state.corrected_deg,
                axis.state.raw_deg,
                axis.state.temperature_c,
                axis.state.faults
            );
        }
    }
    info!("Link {:?}, faults {:?}", status.safety.health, status.safety.faults);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = GimbalConfig::default();
    if let Some(endpoint) = std::env::args().nth(1) {
        config.link.endpoint = endpoint;
    }
    config.simulate_on_fail = true;

    let controller = GimbalController::connect(config).await?;
    controller.start();

    for _ in 0..4 {
        sleep(Duration::from_secs(1)).await;
        report(&controller);
    }

    if controller.link_available() {
        if let Err(e) = controller.stop_all().await {
            warn!("Broadcast stop failed: {}", e);
        }
    }
    controller.close().await?;
    Ok(())
}
