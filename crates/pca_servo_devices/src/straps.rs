use embedded_hal::digital::{OutputPin, PinState};

use crate::registers::BASE_ADDRESS;

///Levels of the A2 and A3 address strap pins. Up to four boards can share a bus by strapping them
///differently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressStraps {
    pub addr_bit2: bool,
    pub addr_bit3: bool,
}

impl AddressStraps {
    ///7 bit I2C address selected by these straps
    pub fn address(&self) -> u8 {
        BASE_ADDRESS | ((self.addr_bit2 as u8) << 2) | ((self.addr_bit3 as u8) << 3)
    }

    ///Drives the strap pins to match and pulls the active-low output enable pin low so the outputs
    ///are live. Call this before talking to the chip.
    pub fn apply<P>(&self, output_enable: &mut P, a2: &mut P, a3: &mut P) -> Result<(), P::Error>
    where
        P: OutputPin,
    {
        output_enable.set_low()?;
        a2.set_state(PinState::from(self.addr_bit2))?;
        a3.set_state(PinState::from(self.addr_bit3))?;
        Ok(())
    }
}
