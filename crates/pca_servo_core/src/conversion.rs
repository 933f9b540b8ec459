//!Conversions between duty cycles, angles and the PCA9685's 12 bit on/off counters.

use crate::error::ServoError;

///counter ticks per pwm period
pub const PWM_RESOLUTION: u16 = 4096;
///internal oscillator frequency of the chip
pub const OSCILLATOR_HZ: f64 = 25_000_000.0;
///the chip forces any prescale below 3 up to 3
pub const PRESCALE_MIN: u8 = 0x03;
pub const PRESCALE_MAX: u8 = 0xFF;
///bit 4 of ON_H / OFF_H, i.e. bit 12 of the counter
pub const FULL_FLAG: u16 = 0x1000;
const COUNTER_MASK: u16 = 0x0FFF;

///Sweep of a typical hobby servo, used when no sweep is configured.
pub const DEFAULT_SWEEP_DEGREES: f64 = 180.0;

///Prescale register value for the requested pwm frequency: `floor(25MHz / 4096 / freq - 1)`.
///
/// Frequencies that would need a prescale outside `3..=255` (about 24 Hz to 1526 Hz) are rejected
/// rather than written to the chip.
pub fn prescale_for(freq_hz: f64) -> Result<u8, ServoError> {
    if !freq_hz.is_finite() || freq_hz <= 0.0 {
        return Err(ServoError::FrequencyOutOfRange(freq_hz));
    }
    let prescale = ((OSCILLATOR_HZ / PWM_RESOLUTION as f64) / freq_hz - 1.0).floor();
    if prescale < PRESCALE_MIN as f64 || prescale > PRESCALE_MAX as f64 {
        Err(ServoError::FrequencyOutOfRange(freq_hz))
    } else {
        Ok(prescale as u8)
    }
}

///The pwm frequency the chip actually produces for a prescale value.
pub fn frequency_for(prescale: u8) -> f64 {
    OSCILLATOR_HZ / (PWM_RESOLUTION as f64 * (prescale as f64 + 1.0))
}

///Maps an angle in `0..=sweep` degrees onto a [0,1] position.
pub fn position_for_degrees(degrees: f64, sweep: f64) -> Result<f64, ServoError> {
    if sweep > 0.0 && (0.0..=sweep).contains(&degrees) {
        Ok(degrees / sweep)
    } else {
        Err(ServoError::AngleOutOfRange { degrees, sweep })
    }
}

///The on/off counter pair of one channel, as stored in its four LEDn registers. `on` is 0 for every
///duty cycle below 1.0, a full duty cycle sets the full on flag in `on` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmCounts {
    pub on: u16,
    pub off: u16,
}

impl PwmCounts {
    ///Output goes high at tick 0 and low at `floor(4096 * duty_cycle)`.
    ///
    /// A duty cycle of exactly 1.0 would need an off count of 4096, which the chip reads as its
    /// "full off" flag. It is encoded with the "full on" flag instead.
    pub fn from_duty_cycle(duty_cycle: f64) -> Result<Self, ServoError> {
        if !(0.0..=1.0).contains(&duty_cycle) {
            return Err(ServoError::DutyCycleOutOfRange(duty_cycle));
        }
        let off = (PWM_RESOLUTION as f64 * duty_cycle).floor() as u16;
        if off >= PWM_RESOLUTION {
            Ok(PwmCounts { on: FULL_FLAG, off: 0 })
        } else {
            Ok(PwmCounts { on: 0, off })
        }
    }

    ///register order: ON_L, ON_H, OFF_L, OFF_H
    pub fn to_bytes(self) -> [u8; 4] {
        [
            self.on as u8,
            (self.on >> 8) as u8,
            self.off as u8,
            (self.off >> 8) as u8,
        ]
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        PwmCounts {
            on: bytes[0] as u16 | ((bytes[1] as u16) << 8),
            off: bytes[2] as u16 | ((bytes[3] as u16) << 8),
        }
    }

    ///Effective duty cycle, `(off - on) / 4096`, honoring the full on / full off flags.
    pub fn duty_cycle(self) -> f64 {
        if self.off & FULL_FLAG != 0 {
            return 0.0;
        }
        if self.on & FULL_FLAG != 0 {
            return 1.0;
        }
        let on = self.on & COUNTER_MASK;
        let off = self.off & COUNTER_MASK;
        //the high phase wraps around the end of the period when off comes before on
        let ticks = if off >= on {
            off - on
        } else {
            off + PWM_RESOLUTION - on
        };
        ticks as f64 / PWM_RESOLUTION as f64
    }
}
