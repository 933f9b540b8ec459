//!This library provides the Raspberry Pi side of the servo driver. It is a wrapper around the rppal
//!library.
//!
//! `get_bus` returns an I2C bus that can be handed to a `ServoDriver`, and `apply_straps` sets the
//! board's address strap and output enable pins from GPIO.

//internal error type for rpi glue
pub mod error;

//address strap pins driven from gpio
pub mod straps;

pub use rppal::i2c::I2c;
pub use straps::apply_straps;

use error::RpiError;

//get i2c bus by id
pub fn get_bus(bus: u8) -> Result<I2c, RpiError> {
    Ok(I2c::with_bus(bus)?)
}
