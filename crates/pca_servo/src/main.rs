pub mod config;

use config::ServoConfig;
use config_rs::{Config, File};
use pca_servo_core::BuildError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "rpi")]
async fn run(config: &ServoConfig, cancel_token: CancellationToken) -> Result<(), BuildError> {
    if let Some(ref pins) = config.strap_pins {
        pca_servo_rpi::apply_straps(&config.straps(), pins.output_enable, pins.a2, pins.a3)?;
    }
    let i2c = pca_servo_rpi::get_bus(config.i2c_bus)?;
    let (_controller, join_handle) = config.try_build(i2c, cancel_token).await?;
    join_handle
        .await
        .map_err(|err| BuildError::from_string(format!("servo controller task failed: {}", err)))
}

#[cfg(not(feature = "rpi"))]
async fn run(_config: &ServoConfig, _cancel_token: CancellationToken) -> Result<(), BuildError> {
    Err(BuildError::message(
        "no I2C transport compiled in. build with the `rpi` feature.",
    ))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pca_servo=debug,pca_servo_devices=debug,pca_servo_core=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() != 2 {
        warn!("only one parameter, the config file, is expected.");
        warn!("got {}", args.join(","));
    } else if let Some(cfg_name) = args.get(1).map(|o| o.as_str()) {
        let config_res = Config::builder()
            .add_source(File::with_name(cfg_name))
            .build()
            .and_then(|config| config.try_deserialize::<ServoConfig>());

        match config_res {
            Ok(config) => {
                info!("pca_servo starting up!");
                if let Some(ref name) = config.metadata.name {
                    info!("name: {name}")
                }
                if let Some(ref descrip) = config.metadata.description {
                    info!("description: {descrip}")
                }

                let cancel_token = CancellationToken::new();
                let shutdown = cancel_token.clone();
                tokio::spawn(async move {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => {
                            info!("got ctrl-c, shutting down");
                            shutdown.cancel();
                        }
                        Err(err) => error!("could not listen for ctrl-c: {}", err),
                    }
                });

                match run(&config, cancel_token).await {
                    Ok(_) => info!("pca_servo shut down!"),
                    Err(err) => error!("pca_servo exited with an error: {:?}", err),
                }
            }
            Err(err) => {
                error!(
                    "Error starting pca_servo. Failed to parse config: {:?}",
                    err
                );
            }
        }
    }
}
