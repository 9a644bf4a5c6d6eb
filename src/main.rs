use std::error::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xarm_controller::{Controller, ControllerConfig, ServoState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let address = std::env::args().nth(1).unwrap_or_else(|| "USB".to_string());
    let debug = std::env::args().any(|arg| arg == "--debug");

    let mut controller = Controller::open(&address, ControllerConfig::default().debug(debug)).await?;

    let voltage = controller.get_battery_voltage().await?;
    if voltage > 0.0 {
        info!("Battery voltage: {:.2}V", voltage);
    } else {
        warn!("Battery voltage unavailable");
    }

    let max_id = controller.config().max_servo_id;
    let ids = controller.list_servos(max_id).await?;
    info!("Found {} servos: {:?}", ids.len(), ids);

    let mut servos: Vec<ServoState> = ids.into_iter().map(ServoState::new).collect();
    controller.get_positions(&mut servos).await?;
    for servo in &servos {
        info!("Servo {} position: {:.1} degrees (raw: {})", servo.id, servo.angle(), servo.position);
    }

    controller.servo_off(None).await?;
    Ok(())
}
