use pca_servo_devices::AddressStraps;
use rppal::gpio::Gpio;
use tracing::debug;

use crate::error::RpiError;

///Drives the strap pins and the output enable pin of the board from the given BCM gpio numbers. The
///pins keep their level after this returns.
pub fn apply_straps(
    straps: &AddressStraps,
    output_enable: u8,
    a2: u8,
    a3: u8,
) -> Result<(), RpiError> {
    let gpio = Gpio::new()?;
    let mut output_enable_pin = gpio.get(output_enable)?.into_output();
    let mut a2_pin = gpio.get(a2)?.into_output();
    let mut a3_pin = gpio.get(a3)?.into_output();

    for pin in [&mut output_enable_pin, &mut a2_pin, &mut a3_pin] {
        pin.set_reset_on_drop(false);
    }

    straps
        .apply(&mut output_enable_pin, &mut a2_pin, &mut a3_pin)
        .map_err(|never| -> RpiError { match never {} })?;

    debug!(
        "address straps set for 0x{:02X} (oe: {}, a2: {}, a3: {})",
        straps.address(),
        output_enable,
        a2,
        a3
    );
    Ok(())
}
