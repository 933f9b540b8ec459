use std::fmt;

use crate::error::ServoError;

///Number of pwm outputs on one PCA9685.
pub const CHANNEL_COUNT: usize = 16;

///A servo output on the chip. Channels are 1-indexed, so the only valid values are 1 through 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(u8);

impl Channel {
    pub fn new(index: u8) -> Result<Self, ServoError> {
        if (1..=CHANNEL_COUNT as u8).contains(&index) {
            Ok(Channel(index))
        } else {
            Err(ServoError::ChannelOutOfRange(index))
        }
    }

    ///the 1-based channel number
    pub fn index(self) -> u8 {
        self.0
    }

    ///position of this channel in 0-based per-channel tables
    pub fn slot(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl TryFrom<u8> for Channel {
    type Error = ServoError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Channel::new(index)
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> u8 {
        channel.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
