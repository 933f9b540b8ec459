//!This is the core library for driving hobby servos from a PCA9685 PWM chip. It holds the channel
//!index type, the per-channel calibration store and the math that turns a normalized position into
//!the chip's 12 bit counters.
//!
//!Nothing in this crate talks to hardware. The register protocol and the driver itself live in
//!`pca_servo_devices`.

pub mod calibration;
pub mod channel;
pub mod conversion;
pub mod error;

pub use calibration::{Calibration, CalibrationStore};
pub use channel::Channel;
pub use conversion::PwmCounts;
pub use error::{BuildError, ErrorKind, ServoError};
