use std::collections::HashMap;

use embedded_hal::i2c::I2c;
use futures::future::join_all;
use pca_servo_core::{BuildError, Calibration, Channel};
use pca_servo_devices::{AddressStraps, DriverOptions, ServoController, ServoDriver};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

fn default_bus() -> u8 {
    1
}

fn default_frequency() -> f64 {
    50.0
}

#[derive(Deserialize, Debug, Default)]
pub struct Metadata {
    pub name: Option<String>,
    pub description: Option<String>,
}

//BCM gpio numbers wired to the board's OE, A2 and A3 pins
#[derive(Deserialize, Debug)]
pub struct StrapPinsConfig {
    pub output_enable: u8,
    pub a2: u8,
    pub a3: u8,
}

//a named servo. If neither bound is given the channel adopts the driver defaults the first time it
//moves.
#[derive(Deserialize, Debug)]
pub struct ChannelConfig {
    pub channel: u8,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub initial: Option<f64>,
}

//system level config -- corresponds to 1 pwm chip instance
#[derive(Deserialize, Debug)]
pub struct ServoConfig {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default = "default_bus")]
    pub i2c_bus: u8,
    #[serde(default)]
    pub addr_bit2: bool,
    #[serde(default)]
    pub addr_bit3: bool,
    pub strap_pins: Option<StrapPinsConfig>,
    #[serde(default = "default_frequency")]
    pub frequency_hz: f64,
    pub default_low: Option<f64>,
    pub default_high: Option<f64>,
    pub sweep_degrees: Option<f64>,
    #[serde(default)]
    pub channels: HashMap<String, ChannelConfig>,
}

impl ServoConfig {
    pub fn straps(&self) -> AddressStraps {
        AddressStraps {
            addr_bit2: self.addr_bit2,
            addr_bit3: self.addr_bit3,
        }
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            default_low: self.default_low,
            default_high: self.default_high,
            straps: self.straps(),
            sweep_degrees: self.sweep_degrees,
        }
    }

    fn defaults(&self) -> Result<Calibration, BuildError> {
        Calibration::with_defaults(self.default_low, self.default_high).map_err(|err| {
            BuildError::from_string(format!("invalid default bounds: {}", err))
        })
    }

    //explicit calibration for a channel, filling a missing bound from the defaults
    fn calibration_for(defaults: &Calibration, channel: &ChannelConfig) -> Option<(f64, f64)> {
        match (channel.low, channel.high) {
            (None, None) => None,
            (low, high) => Some((low.unwrap_or(defaults.low()), high.unwrap_or(defaults.high()))),
        }
    }

    ///Checks every channel entry and reports all problems at once.
    pub fn validate(&self) -> Result<(), BuildError> {
        let defaults = self.defaults()?;
        let mut errs = Vec::new();
        let mut seen: HashMap<u8, &str> = HashMap::with_capacity(self.channels.len());

        for (name, channel_cfg) in &self.channels {
            if let Err(err) = Channel::new(channel_cfg.channel) {
                errs.push(format!("servo {}: {}", name, err));
            } else if let Some(other) = seen.insert(channel_cfg.channel, name) {
                errs.push(format!(
                    "servo {}: channel {} is already used by {}",
                    name, channel_cfg.channel, other
                ));
            }
            if let Some((low, high)) = Self::calibration_for(&defaults, channel_cfg) {
                if let Err(err) = Calibration::new(low, high) {
                    errs.push(format!("servo {}: {}", name, err));
                }
            }
            if let Some(initial) = channel_cfg.initial {
                if !(0.0..=1.0).contains(&initial) {
                    errs.push(format!(
                        "servo {}: initial position must be between 0.0 and 1.0, got {}",
                        name, initial
                    ));
                }
            }
        }

        if errs.is_empty() {
            Ok(())
        } else {
            errs.sort();
            Err(BuildError::messages(&errs))
        }
    }

    ///Brings the chip up on `i2c`: programs the frequency, applies the channel calibrations and
    ///moves every servo that has an initial position.
    pub async fn try_build<I2C>(
        &self,
        i2c: I2C,
        cancel_token: CancellationToken,
    ) -> Result<(ServoController, JoinHandle<()>), BuildError>
    where
        I2C: I2c + Send + 'static,
    {
        self.validate()?;
        let defaults = self.defaults()?;
        let driver = ServoDriver::new(i2c, self.driver_options())?;
        let (controller, join_handle) =
            ServoController::connect(driver, self.frequency_hz, cancel_token).await?;

        for (name, channel_cfg) in &self.channels {
            if let Some((low, high)) = Self::calibration_for(&defaults, channel_cfg) {
                controller.configure(channel_cfg.channel, low, high).await?;
                debug!("servo {} on channel {} calibrated", name, channel_cfg.channel);
            }
        }

        let moves = self.channels.iter().filter_map(|(name, channel_cfg)| {
            channel_cfg.initial.map(|position| {
                let controller = controller.clone();
                async move {
                    controller
                        .move_to(channel_cfg.channel, position)
                        .await
                        .map_err(|err| {
                            BuildError::from_string(format!(
                                "could not move servo {}: {}",
                                name, err
                            ))
                        })
                }
            })
        });
        let errs: Vec<BuildError> = join_all(moves)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();
        if !errs.is_empty() {
            return Err(BuildError::from_errs(errs));
        }

        info!("{} servo(s) ready", self.channels.len());
        Ok((controller, join_handle))
    }
}
