use embedded_hal::i2c::I2c;
use pca_servo_core::{Channel, ServoError};

///7 bit address with both strap bits low. Bits 2 and 3 are set by the A2/A3 strap pins.
pub const BASE_ADDRESS: u8 = 0b111_0011;

pub const MODE1: u8 = 0x00;
pub const PRESCALE: u8 = 0xFE;
pub const LED0_ON_L: u8 = 0x06;
pub const LED0_ON_H: u8 = 0x07;
pub const LED0_OFF_L: u8 = 0x08;
pub const LED0_OFF_H: u8 = 0x09;

///MODE1 bit that stops the oscillator. PRESCALE can only be written while it is set.
pub const MODE1_SLEEP: u8 = 0x10;
///MODE1 after frequency programming: restart, auto-increment and all-call.
pub const MODE1_RESTART: u8 = 0xA1;

///The four registers of a channel, in the order they must be accessed: ON_L, ON_H, OFF_L, OFF_H.
pub fn channel_registers(channel: Channel) -> [u8; 4] {
    let offset = channel.slot() as u8 * 4;
    [
        LED0_ON_L + offset,
        LED0_ON_H + offset,
        LED0_OFF_L + offset,
        LED0_OFF_H + offset,
    ]
}

///One PCA9685 on an I2C bus. Every transfer is a single register access, chains are done one
///register at a time in the given order and stop at the first error.
pub struct RegisterBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> RegisterBus<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        RegisterBus { i2c, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn read_register(&mut self, register: u8) -> Result<u8, ServoError> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buffer)
            .map_err(|err| ServoError::io(register, err))?;
        Ok(buffer[0])
    }

    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), ServoError> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|err| ServoError::io(register, err))
    }

    ///Reads each register in turn. A failure part way through returns the error and drops the
    ///replies collected so far.
    pub fn chain_read<const N: usize>(
        &mut self,
        registers: &[u8; N],
    ) -> Result<[u8; N], ServoError> {
        let mut replies = [0u8; N];
        for (reply, register) in replies.iter_mut().zip(registers) {
            *reply = self.read_register(*register)?;
        }
        Ok(replies)
    }

    ///Writes each `(register, value)` pair in turn. A failure aborts the remaining writes, so the
    ///chip may be left with only part of the chain applied.
    pub fn chain_write(&mut self, writes: &[(u8, u8)]) -> Result<(), ServoError> {
        for (register, value) in writes {
            self.write_register(*register, *value)?;
        }
        Ok(())
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}
