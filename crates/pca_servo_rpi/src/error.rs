use std::fmt::{Debug, Formatter};

use pca_servo_core::BuildError;

pub struct RpiError {
    pub message: String,
}

impl Debug for RpiError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        fmt.write_str(&self.message)
    }
}

impl From<rppal::gpio::Error> for RpiError {
    fn from(err: rppal::gpio::Error) -> Self {
        Self {
            message: format!("RpiGpioError - Cause: {}", err),
        }
    }
}

impl From<rppal::i2c::Error> for RpiError {
    fn from(err: rppal::i2c::Error) -> Self {
        Self {
            message: format!("RpiI2cError - Cause: {}", err),
        }
    }
}

impl From<RpiError> for BuildError {
    fn from(err: RpiError) -> Self {
        BuildError::from_string(err.message)
    }
}
