//!Hardware side of the PCA9685 servo driver. Everything here is generic over the `embedded_hal` 1.0
//!I2C and digital pin traits, so any bus implementation can be plugged in.
//!
//! `ServoDriver` is the blocking driver; `ServoController` wraps one in a tokio task so it can be
//! shared and used from async code while keeping register chains from interleaving.

///PCA9685 register map and the single/chained register transfers built on top of the I2C bus.
pub mod registers;

///Servo position and calibration control for one PCA9685.
pub mod driver;

///Address strap and output enable pins.
pub mod straps;

///Async handle that serializes operations on a driver owned by a tokio task.
pub mod controller;

pub use controller::ServoController;
pub use driver::{DriverOptions, ServoDriver};
pub use straps::AddressStraps;
