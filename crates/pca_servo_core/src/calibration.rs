use tracing::debug;

use crate::{
    channel::{Channel, CHANNEL_COUNT},
    error::ServoError,
};

///Duty cycle used for position 0.0 when a channel was never configured.
pub const DEFAULT_LOW: f64 = 0.05;
///Duty cycle used for position 1.0 when a channel was never configured.
pub const DEFAULT_HIGH: f64 = 0.2;

///Duty cycle bounds for one servo. `low` is the duty cycle for position 0.0 and `high` the one for
///position 1.0.
///
/// Many hobby servos expect a 20 ms period and treat duty cycles of roughly 5% and 10% as their end
/// stops, but this varies a lot between devices, so each channel can be calibrated on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    low: f64,
    high: f64,
}

impl Calibration {
    pub fn new(low: f64, high: f64) -> Result<Self, ServoError> {
        if low.is_finite() && high.is_finite() && low < high {
            Ok(Calibration { low, high })
        } else {
            Err(ServoError::InvalidBounds { low, high })
        }
    }

    ///Fills in missing bounds with `DEFAULT_LOW` / `DEFAULT_HIGH`. An explicit `0.0` is kept as
    ///given.
    pub fn with_defaults(low: Option<f64>, high: Option<f64>) -> Result<Self, ServoError> {
        Calibration::new(low.unwrap_or(DEFAULT_LOW), high.unwrap_or(DEFAULT_HIGH))
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn span(&self) -> f64 {
        self.high - self.low
    }

    ///[0,1] position => duty cycle
    pub fn duty_cycle_for(&self, position: f64) -> f64 {
        position * self.span() + self.low
    }

    ///duty cycle => position. Not clamped, a duty cycle outside the bounds maps outside [0,1].
    pub fn position_for(&self, duty_cycle: f64) -> f64 {
        (duty_cycle - self.low) / self.span()
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration {
            low: DEFAULT_LOW,
            high: DEFAULT_HIGH,
        }
    }
}

///Per-channel calibration table. A channel gets an entry when it is configured, or the first time
///it is moved, in which case it adopts the store's defaults.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    defaults: Calibration,
    entries: [Option<Calibration>; CHANNEL_COUNT],
}

impl CalibrationStore {
    pub fn new(defaults: Calibration) -> Self {
        CalibrationStore {
            defaults,
            entries: [None; CHANNEL_COUNT],
        }
    }

    pub fn defaults(&self) -> Calibration {
        self.defaults
    }

    ///Validates and stores the bounds for `channel`, replacing any previous entry. Invalid bounds
    ///leave the store untouched.
    pub fn configure(&mut self, channel: Channel, low: f64, high: f64) -> Result<(), ServoError> {
        let calibration = Calibration::new(low, high)?;
        self.entries[channel.slot()] = Some(calibration);
        Ok(())
    }

    pub fn get(&self, channel: Channel) -> Result<Calibration, ServoError> {
        self.entries[channel.slot()].ok_or(ServoError::NotConfigured(channel.index()))
    }

    ///Returns the channel's calibration, adopting the defaults for it if it has none yet.
    pub fn resolve(&mut self, channel: Channel) -> Calibration {
        let defaults = self.defaults;
        *self.entries[channel.slot()].get_or_insert_with(|| {
            debug!(
                "servo {} not configured, using defaults [{}, {}]",
                channel, defaults.low, defaults.high
            );
            defaults
        })
    }
}

impl Default for CalibrationStore {
    fn default() -> Self {
        CalibrationStore::new(Calibration::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(index: u8) -> Channel {
        Channel::new(index).unwrap()
    }

    #[test]
    fn test_bounds_must_be_ordered() {
        assert!(Calibration::new(0.05, 0.12).is_ok());
        assert!(Calibration::new(0.0, 1.0).is_ok());
        assert_eq!(
            Calibration::new(0.12, 0.05),
            Err(ServoError::InvalidBounds {
                low: 0.12,
                high: 0.05
            })
        );
        assert!(Calibration::new(0.1, 0.1).is_err());
        assert!(Calibration::new(f64::NAN, 0.1).is_err());
    }

    #[test]
    fn test_explicit_zero_low_is_honored() {
        let cal = Calibration::with_defaults(Some(0.0), None).unwrap();
        assert_eq!(cal.low(), 0.0);
        assert_eq!(cal.high(), DEFAULT_HIGH);

        let cal = Calibration::with_defaults(None, None).unwrap();
        assert_eq!(cal, Calibration::default());
    }

    #[test]
    fn test_failed_configure_keeps_previous() {
        let mut store = CalibrationStore::default();
        store.configure(ch(2), 0.05, 0.12).unwrap();
        assert!(store.configure(ch(2), 0.3, 0.3).is_err());
        assert!(store.configure(ch(2), 0.3, 0.1).is_err());
        assert_eq!(store.get(ch(2)), Calibration::new(0.05, 0.12));

        assert!(store.configure(ch(3), 0.3, 0.1).is_err());
        assert_eq!(store.get(ch(3)), Err(ServoError::NotConfigured(3)));
    }

    #[test]
    fn test_resolve_adopts_defaults_once() {
        let defaults = Calibration::new(0.05, 0.2).unwrap();
        let mut store = CalibrationStore::new(defaults);
        assert_eq!(store.get(ch(5)), Err(ServoError::NotConfigured(5)));
        assert_eq!(store.resolve(ch(5)), defaults);
        assert_eq!(store.get(ch(5)), Ok(defaults));

        store.configure(ch(5), 0.01, 0.02).unwrap();
        assert_eq!(store.resolve(ch(5)), Calibration::new(0.01, 0.02).unwrap());
    }

    #[test]
    fn test_position_mapping() {
        let cal = Calibration::new(0.05, 0.12).unwrap();
        assert!((cal.duty_cycle_for(0.5) - 0.085).abs() < 1e-12);
        assert!((cal.position_for(0.085) - 0.5).abs() < 1e-12);
        assert!((cal.duty_cycle_for(0.0) - 0.05).abs() < 1e-12);
        assert!((cal.duty_cycle_for(1.0) - 0.12).abs() < 1e-12);
    }
}
