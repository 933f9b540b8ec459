//!A mod for the error types
use std::fmt::Debug;

use embedded_hal::i2c;
use thiserror::Error;

///Broad classes of `ServoError`. Range, Config and NotConfigured errors are caller bugs and are
///reported before any I2C traffic happens. Io errors come from the transport and are never retried
///here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Range,
    Config,
    NotConfigured,
    Io,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServoError {
    #[error("servos are 1-indexed and must be between 1 and 16, got {0}")]
    ChannelOutOfRange(u8),
    #[error("position must be between 0.0 and 1.0, got {0}")]
    PositionOutOfRange(f64),
    #[error("duty cycle must be between 0.0 and 1.0, got {0}")]
    DutyCycleOutOfRange(f64),
    #[error("angle must be between 0 and {sweep} degrees, got {degrees}")]
    AngleOutOfRange { degrees: f64, sweep: f64 },
    #[error("pwm frequency of {0} Hz is outside what the prescale register can produce")]
    FrequencyOutOfRange(f64),
    #[error("calibration low bound {low} must be strictly below high bound {high}")]
    InvalidBounds { low: f64, high: f64 },
    #[error("servo {0} is not configured")]
    NotConfigured(u8),
    #[error("i2c transfer failed at register 0x{register:02X}: {kind}")]
    Io { register: u8, kind: i2c::ErrorKind },
    #[error("servo controller task is no longer running")]
    ControllerClosed,
}

impl ServoError {
    ///wraps a transport error with the register that was being accessed
    pub fn io<E: i2c::Error>(register: u8, err: E) -> Self {
        ServoError::Io {
            register,
            kind: err.kind(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ChannelOutOfRange(_)
            | Self::PositionOutOfRange(_)
            | Self::DutyCycleOutOfRange(_)
            | Self::AngleOutOfRange { .. }
            | Self::FrequencyOutOfRange(_) => ErrorKind::Range,
            Self::InvalidBounds { .. } => ErrorKind::Config,
            Self::NotConfigured(_) => ErrorKind::NotConfigured,
            Self::Io { .. } | Self::ControllerClosed => ErrorKind::Io,
        }
    }
}

///Error type used when building a servo setup from configuration.
pub enum BuildError {
    Message(String),
    Messages(Vec<String>),
}

impl BuildError {
    pub fn from_string(msg: String) -> Self {
        BuildError::Message(msg)
    }
    pub fn from_errs(errs: Vec<BuildError>) -> Self {
        let mut messages = Vec::with_capacity(errs.len());
        for err in errs {
            match err {
                Self::Message(msg) => messages.push(msg),
                Self::Messages(mut msgs) => messages.append(&mut msgs),
            }
        }
        Self::Messages(messages)
    }
    pub fn message(msg: &str) -> Self {
        BuildError::Message(msg.to_string())
    }
    pub fn messages(msgs: &[String]) -> Self {
        BuildError::Messages(msgs.to_vec())
    }
}

impl Debug for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(message) => f.write_fmt(format_args!("BuildError: {}", message)),
            Self::Messages(messages) => f.write_fmt(format_args!(
                "BuildError (multiple): \n{}",
                messages.join("\n")
            )),
        }
    }
}

impl From<ServoError> for BuildError {
    fn from(err: ServoError) -> Self {
        BuildError::from_string(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ServoError::ChannelOutOfRange(17).kind(), ErrorKind::Range);
        assert_eq!(ServoError::PositionOutOfRange(1.5).kind(), ErrorKind::Range);
        assert_eq!(ServoError::FrequencyOutOfRange(5000.0).kind(), ErrorKind::Range);
        assert_eq!(
            ServoError::InvalidBounds {
                low: 0.2,
                high: 0.1
            }
            .kind(),
            ErrorKind::Config
        );
        assert_eq!(ServoError::NotConfigured(3).kind(), ErrorKind::NotConfigured);
        assert_eq!(
            ServoError::io(0x06, i2c::ErrorKind::Bus).kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn test_io_error_keeps_register() {
        let err = ServoError::io(0xFE, i2c::ErrorKind::Other);
        assert_eq!(
            err,
            ServoError::Io {
                register: 0xFE,
                kind: i2c::ErrorKind::Other
            }
        );
        assert!(err.to_string().contains("0xFE"));
    }

    #[test]
    fn test_from_errs_flattens() {
        let err = BuildError::from_errs(vec![
            BuildError::message("a"),
            BuildError::messages(&["b".to_string(), "c".to_string()]),
        ]);
        match err {
            BuildError::Messages(msgs) => assert_eq!(msgs, vec!["a", "b", "c"]),
            BuildError::Message(_) => panic!("expected aggregated messages"),
        }
    }
}
