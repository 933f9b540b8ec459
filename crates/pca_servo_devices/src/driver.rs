use embedded_hal::i2c::I2c;
use pca_servo_core::{
    conversion::{frequency_for, position_for_degrees, prescale_for, DEFAULT_SWEEP_DEGREES},
    Calibration, CalibrationStore, Channel, PwmCounts, ServoError,
};
use tracing::{debug, info};

use crate::{
    registers::{channel_registers, RegisterBus, MODE1, MODE1_RESTART, MODE1_SLEEP, PRESCALE},
    straps::AddressStraps,
};

///Construction options for a `ServoDriver`. Unset bounds fall back to 0.05 / 0.2, an explicit
///`Some(0.0)` low bound is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverOptions {
    pub default_low: Option<f64>,
    pub default_high: Option<f64>,
    pub straps: AddressStraps,
    ///angle covered by position 0.0 to 1.0, 180 degrees if unset
    pub sweep_degrees: Option<f64>,
}

///Drives up to 16 servos on one PCA9685.
///
/// The driver exclusively owns its I2C handle and every operation takes `&mut self`, so register
/// chains can't interleave. Channels are 1-indexed. Range checks happen before any I2C traffic.
pub struct ServoDriver<I2C> {
    bus: RegisterBus<I2C>,
    calibration: CalibrationStore,
    sweep_degrees: f64,
    connected: bool,
}

impl<I2C> ServoDriver<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C, options: DriverOptions) -> Result<Self, ServoError> {
        let defaults = Calibration::with_defaults(options.default_low, options.default_high)?;
        let sweep_degrees = options.sweep_degrees.unwrap_or(DEFAULT_SWEEP_DEGREES);
        if !(sweep_degrees.is_finite() && sweep_degrees > 0.0) {
            return Err(ServoError::AngleOutOfRange {
                degrees: sweep_degrees,
                sweep: sweep_degrees,
            });
        }
        Ok(ServoDriver {
            bus: RegisterBus::new(i2c, options.straps.address()),
            calibration: CalibrationStore::new(defaults),
            sweep_degrees,
            connected: false,
        })
    }

    pub fn address(&self) -> u8 {
        self.bus.address()
    }

    ///true once the pwm frequency has been programmed
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn defaults(&self) -> Calibration {
        self.calibration.defaults()
    }

    ///Programs the chip's pwm frequency. Servos normally want 50 Hz.
    ///
    /// PRESCALE can only be changed while the oscillator sleeps, so MODE1 is put to sleep, the
    /// prescale written, the old mode restored and finally the chip restarted with auto-increment
    /// enabled.
    pub fn set_module_frequency(&mut self, freq_hz: f64) -> Result<(), ServoError> {
        let prescale = prescale_for(freq_hz)?;
        let old_mode = self.bus.read_register(MODE1)?;
        self.bus.chain_write(&[
            (MODE1, old_mode | MODE1_SLEEP),
            (PRESCALE, prescale),
            (MODE1, old_mode),
            (MODE1, MODE1_RESTART),
        ])?;
        self.connected = true;
        info!(
            "PCA9685 at 0x{:02X} running at {:.2} Hz (prescale {})",
            self.address(),
            frequency_for(prescale),
            prescale
        );
        Ok(())
    }

    ///Sets the duty cycle bounds for a servo: `low` is used for position 0.0 and `high` for
    ///position 1.0. Only local state changes, nothing is sent to the chip.
    pub fn configure(&mut self, channel: u8, low: f64, high: f64) -> Result<(), ServoError> {
        let channel = Channel::new(channel)?;
        self.calibration.configure(channel, low, high)?;
        debug!("servo {} configured to [{}, {}]", channel, low, high);
        Ok(())
    }

    pub fn get_configuration(&self, channel: u8) -> Result<Calibration, ServoError> {
        self.calibration.get(Channel::new(channel)?)
    }

    ///Moves a servo to `position`, 0.0 being its low bound and 1.0 its high bound. Unconfigured
    ///channels adopt the driver defaults.
    pub fn move_to(&mut self, channel: u8, position: f64) -> Result<(), ServoError> {
        let channel = Channel::new(channel)?;
        if !(0.0..=1.0).contains(&position) {
            return Err(ServoError::PositionOutOfRange(position));
        }
        let calibration = self.calibration.resolve(channel);
        self.write_duty_cycle(channel, calibration.duty_cycle_for(position))
    }

    ///Moves a servo to an angle between 0 and the driver's sweep (180 degrees unless configured
    ///otherwise).
    pub fn move_to_degrees(&mut self, channel: u8, degrees: f64) -> Result<(), ServoError> {
        Channel::new(channel)?;
        let position = position_for_degrees(degrees, self.sweep_degrees)?;
        self.move_to(channel, position)
    }

    ///Sets the raw duty cycle of a channel, bypassing calibration. An unconfigured channel still
    ///adopts the driver defaults so a later `read` can map the counters back to a position.
    ///
    /// The on count is 0 and the off count `floor(4096 * duty_cycle)`, except for a duty cycle of
    /// exactly 1.0: that is written as ON = 0x1000 (the full on flag) and OFF = 0, since an off
    /// count of 4096 would set the full off bit.
    pub fn set_duty_cycle(&mut self, channel: u8, duty_cycle: f64) -> Result<(), ServoError> {
        let channel = Channel::new(channel)?;
        if !(0.0..=1.0).contains(&duty_cycle) {
            return Err(ServoError::DutyCycleOutOfRange(duty_cycle));
        }
        self.calibration.resolve(channel);
        self.write_duty_cycle(channel, duty_cycle)
    }

    ///Reads back the approximate target position of a servo.
    ///
    /// This reads the channel's on/off counters, works out the duty cycle and maps it back through
    /// the channel's calibration. The counters only have 1/4096 resolution, so the result can
    /// undershoot the commanded position by up to `1 / (4096 * (high - low))`. It says nothing
    /// about where the physical servo actually is and must not be used as feedback in a control
    /// loop. A duty cycle set outside the calibration bounds reads back outside [0, 1].
    pub fn read(&mut self, channel: u8) -> Result<f64, ServoError> {
        let channel = Channel::new(channel)?;
        let calibration = self.calibration.get(channel)?;
        let duty_cycle = self.read_counts(channel)?.duty_cycle();
        Ok(calibration.position_for(duty_cycle))
    }

    ///Reads the raw duty cycle of a channel, without calibration.
    pub fn read_duty_cycle(&mut self, channel: u8) -> Result<f64, ServoError> {
        let channel = Channel::new(channel)?;
        Ok(self.read_counts(channel)?.duty_cycle())
    }

    pub fn release(self) -> I2C {
        self.bus.release()
    }

    fn write_duty_cycle(&mut self, channel: Channel, duty_cycle: f64) -> Result<(), ServoError> {
        let counts = PwmCounts::from_duty_cycle(duty_cycle)?;
        let registers = channel_registers(channel);
        let bytes = counts.to_bytes();
        self.bus.chain_write(&[
            (registers[0], bytes[0]),
            (registers[1], bytes[1]),
            (registers[2], bytes[2]),
            (registers[3], bytes[3]),
        ])
    }

    fn read_counts(&mut self, channel: Channel) -> Result<PwmCounts, ServoError> {
        let bytes = self.bus.chain_read(&channel_registers(channel))?;
        Ok(PwmCounts::from_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::BASE_ADDRESS;
    use embedded_hal::i2c::{ErrorKind as I2cErrorKind, NoAcknowledgeSource};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use pca_servo_core::ErrorKind;

    const ADDR: u8 = BASE_ADDRESS;

    fn channel_writes(channel: u8, on: u16, off: u16) -> Vec<I2cTransaction> {
        let registers = channel_registers(Channel::new(channel).unwrap());
        let bytes = PwmCounts { on, off }.to_bytes();
        registers
            .iter()
            .zip(bytes)
            .map(|(register, byte)| I2cTransaction::write(ADDR, vec![*register, byte]))
            .collect()
    }

    fn channel_reads(channel: u8, on: u16, off: u16) -> Vec<I2cTransaction> {
        let registers = channel_registers(Channel::new(channel).unwrap());
        let bytes = PwmCounts { on, off }.to_bytes();
        registers
            .iter()
            .zip(bytes)
            .map(|(register, byte)| I2cTransaction::write_read(ADDR, vec![*register], vec![byte]))
            .collect()
    }

    fn driver(i2c: &I2cMock) -> ServoDriver<I2cMock> {
        ServoDriver::new(i2c.clone(), DriverOptions::default()).unwrap()
    }

    #[test]
    fn test_address_straps() {
        let mut i2c = I2cMock::new(&[]);
        let options = DriverOptions {
            straps: AddressStraps {
                addr_bit2: true,
                addr_bit3: true,
            },
            ..Default::default()
        };
        let dev = ServoDriver::new(i2c.clone(), options).unwrap();
        assert_eq!(dev.address(), 0x7F);
        assert_eq!(driver(&i2c).address(), 0x73);
        i2c.done();
    }

    #[test]
    fn test_invalid_defaults_rejected() {
        let mut i2c = I2cMock::new(&[]);
        let options = DriverOptions {
            default_low: Some(0.3),
            default_high: Some(0.1),
            ..Default::default()
        };
        let res = ServoDriver::new(i2c.clone(), options);
        assert_eq!(res.err().map(|e| e.kind()), Some(ErrorKind::Config));
        i2c.done();
    }

    #[test]
    fn test_set_module_frequency_50hz() {
        let expectations = [
            I2cTransaction::write_read(ADDR, vec![MODE1], vec![0x01]),
            I2cTransaction::write(ADDR, vec![MODE1, 0x11]),
            I2cTransaction::write(ADDR, vec![PRESCALE, 121]),
            I2cTransaction::write(ADDR, vec![MODE1, 0x01]),
            I2cTransaction::write(ADDR, vec![MODE1, 0xA1]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut dev = driver(&i2c);
        assert!(!dev.is_connected());

        dev.set_module_frequency(50.0).unwrap();
        assert!(dev.is_connected());
        i2c.done();
    }

    #[test]
    fn test_set_module_frequency_failure_leaves_disconnected() {
        let expectations = [
            I2cTransaction::write_read(ADDR, vec![MODE1], vec![0x01]),
            I2cTransaction::write(ADDR, vec![MODE1, 0x11]).with_error(I2cErrorKind::Other),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut dev = driver(&i2c);

        let res = dev.set_module_frequency(50.0);
        assert_eq!(
            res,
            Err(ServoError::Io {
                register: MODE1,
                kind: I2cErrorKind::Other
            })
        );
        assert!(!dev.is_connected());
        i2c.done();
    }

    #[test]
    fn test_unreachable_frequency_rejected_without_io() {
        let mut i2c = I2cMock::new(&[]);
        let mut dev = driver(&i2c);
        assert_eq!(
            dev.set_module_frequency(5000.0),
            Err(ServoError::FrequencyOutOfRange(5000.0))
        );
        assert!(!dev.is_connected());
        i2c.done();
    }

    #[test]
    fn test_configured_move_writes_expected_count() {
        let mut i2c = I2cMock::new(&channel_writes(1, 0, 348));
        let mut dev = driver(&i2c);

        dev.configure(1, 0.05, 0.12).unwrap();
        dev.move_to(1, 0.5).unwrap();
        i2c.done();
    }

    #[test]
    fn test_move_is_repeatable() {
        let mut expectations = channel_writes(3, 0, 348);
        expectations.extend(channel_writes(3, 0, 348));
        let mut i2c = I2cMock::new(&expectations);
        let mut dev = driver(&i2c);

        dev.configure(3, 0.05, 0.12).unwrap();
        dev.move_to(3, 0.5).unwrap();
        dev.move_to(3, 0.5).unwrap();
        i2c.done();
    }

    #[test]
    fn test_unconfigured_move_uses_defaults() {
        //0.3 * (0.2 - 0.05) + 0.05 = 0.095 => floor(389.12)
        let mut i2c = I2cMock::new(&channel_writes(5, 0, 389));
        let mut dev = driver(&i2c);

        assert_eq!(dev.get_configuration(5), Err(ServoError::NotConfigured(5)));
        dev.move_to(5, 0.3).unwrap();
        assert_eq!(dev.get_configuration(5), Calibration::new(0.05, 0.2));
        i2c.done();
    }

    #[test]
    fn test_zero_default_low_is_used() {
        let mut i2c = I2cMock::new(&channel_writes(2, 0, 0));
        let options = DriverOptions {
            default_low: Some(0.0),
            ..Default::default()
        };
        let mut dev = ServoDriver::new(i2c.clone(), options).unwrap();

        dev.move_to(2, 0.0).unwrap();
        assert_eq!(dev.get_configuration(2), Calibration::new(0.0, 0.2));
        i2c.done();
    }

    #[test]
    fn test_set_duty_cycle_adopts_defaults() {
        //floor(4096 * 0.1) = 409
        let mut i2c = I2cMock::new(&channel_writes(6, 0, 409));
        let mut dev = driver(&i2c);

        assert_eq!(dev.get_configuration(6), Err(ServoError::NotConfigured(6)));
        dev.set_duty_cycle(6, 0.1).unwrap();
        assert_eq!(dev.get_configuration(6), Calibration::new(0.05, 0.2));
        i2c.done();
    }

    #[test]
    fn test_set_duty_cycle_keeps_zero_default_low() {
        let mut i2c = I2cMock::new(&channel_writes(11, 0, 2048));
        let options = DriverOptions {
            default_low: Some(0.0),
            ..Default::default()
        };
        let mut dev = ServoDriver::new(i2c.clone(), options).unwrap();

        dev.set_duty_cycle(11, 0.5).unwrap();
        let calibration = dev.get_configuration(11).unwrap();
        assert_eq!(calibration.low(), 0.0);
        assert_eq!(calibration.high(), 0.2);
        i2c.done();
    }

    #[test]
    fn test_out_of_range_channels_do_no_io() {
        let mut i2c = I2cMock::new(&[]);
        let mut dev = driver(&i2c);

        for channel in [0u8, 17, 100, 255] {
            assert_eq!(dev.move_to(channel, 0.5).map_err(|e| e.kind()), Err(ErrorKind::Range));
            assert_eq!(
                dev.set_duty_cycle(channel, 0.5).map_err(|e| e.kind()),
                Err(ErrorKind::Range)
            );
            assert_eq!(dev.read(channel).map_err(|e| e.kind()), Err(ErrorKind::Range));
            assert_eq!(
                dev.configure(channel, 0.05, 0.1).map_err(|e| e.kind()),
                Err(ErrorKind::Range)
            );
        }
        i2c.done();
    }

    #[test]
    fn test_out_of_range_values_do_no_io() {
        let mut i2c = I2cMock::new(&[]);
        let mut dev = driver(&i2c);

        for position in [-0.1, 1.0001, f64::NAN, f64::INFINITY] {
            assert_eq!(dev.move_to(1, position).map_err(|e| e.kind()), Err(ErrorKind::Range));
            assert_eq!(
                dev.set_duty_cycle(1, position).map_err(|e| e.kind()),
                Err(ErrorKind::Range)
            );
        }
        assert_eq!(
            dev.move_to_degrees(1, 200.0),
            Err(ServoError::AngleOutOfRange {
                degrees: 200.0,
                sweep: 180.0
            })
        );
        //a rejected move must not adopt the defaults
        assert_eq!(dev.get_configuration(1), Err(ServoError::NotConfigured(1)));
        i2c.done();
    }

    #[test]
    fn test_invalid_configure_keeps_previous() {
        let mut i2c = I2cMock::new(&[]);
        let mut dev = driver(&i2c);

        dev.configure(4, 0.1, 0.2).unwrap();
        assert_eq!(
            dev.configure(4, 0.2, 0.1),
            Err(ServoError::InvalidBounds {
                low: 0.2,
                high: 0.1
            })
        );
        assert_eq!(dev.configure(4, 0.15, 0.15).map_err(|e| e.kind()), Err(ErrorKind::Config));
        assert_eq!(dev.get_configuration(4), Calibration::new(0.1, 0.2));
        i2c.done();
    }

    #[test]
    fn test_read_unconfigured_channel() {
        let mut i2c = I2cMock::new(&[]);
        let mut dev = driver(&i2c);
        assert_eq!(dev.read(7), Err(ServoError::NotConfigured(7)));
        i2c.done();
    }

    #[test]
    fn test_duty_cycle_round_trip() {
        let duties = [0.0, 0.001, 0.05, 0.085, 0.3333, 0.5, 0.75, 0.9999, 1.0];
        let mut expectations = Vec::new();
        for channel in 1..=16u8 {
            for duty in duties {
                let counts = PwmCounts::from_duty_cycle(duty).unwrap();
                expectations.extend(channel_writes(channel, counts.on, counts.off));
                expectations.extend(channel_reads(channel, counts.on, counts.off));
            }
        }
        let mut i2c = I2cMock::new(&expectations);
        let mut dev = driver(&i2c);

        for channel in 1..=16u8 {
            dev.configure(channel, 0.0, 1.0).unwrap();
            for duty in duties {
                dev.set_duty_cycle(channel, duty).unwrap();
                let read = dev.read(channel).unwrap();
                assert!(
                    (read - duty).abs() <= 1.0 / 4096.0 + 1e-9,
                    "channel {} duty {} read back {}",
                    channel,
                    duty,
                    read
                );
            }
        }
        i2c.done();
    }

    #[test]
    fn test_full_duty_uses_full_on_flag() {
        let mut expectations = channel_writes(16, 0x1000, 0);
        expectations.extend(channel_reads(16, 0x1000, 0));
        let mut i2c = I2cMock::new(&expectations);
        let mut dev = driver(&i2c);

        dev.set_duty_cycle(16, 1.0).unwrap();
        assert_eq!(dev.read_duty_cycle(16), Ok(1.0));
        assert_eq!(dev.get_configuration(16), Calibration::new(0.05, 0.2));
        i2c.done();
    }

    #[test]
    fn test_read_maps_through_calibration() {
        let mut expectations = channel_writes(1, 0, 348);
        expectations.extend(channel_reads(1, 0, 348));
        let mut i2c = I2cMock::new(&expectations);
        let mut dev = driver(&i2c);

        dev.configure(1, 0.05, 0.12).unwrap();
        dev.move_to(1, 0.5).unwrap();
        let read = dev.read(1).unwrap();
        assert!(read <= 0.5);
        assert!(0.5 - read < 1.0 / (4096.0 * 0.07));
        i2c.done();
    }

    #[test]
    fn test_read_error_carries_register() {
        let registers = channel_registers(Channel::new(2).unwrap());
        let expectations = [
            I2cTransaction::write_read(ADDR, vec![registers[0]], vec![0]),
            I2cTransaction::write_read(ADDR, vec![registers[1]], vec![0]),
            I2cTransaction::write_read(ADDR, vec![registers[2]], vec![0])
                .with_error(I2cErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut dev = driver(&i2c);

        dev.configure(2, 0.0, 1.0).unwrap();
        assert_eq!(dev.read(2).map_err(|e| e.kind()), Err(ErrorKind::Io));
        i2c.done();
    }

    #[test]
    fn test_move_to_degrees() {
        let mut i2c = I2cMock::new(&channel_writes(9, 0, 2048));
        let mut dev = driver(&i2c);

        dev.configure(9, 0.0, 1.0).unwrap();
        dev.move_to_degrees(9, 90.0).unwrap();
        i2c.done();
    }
}
