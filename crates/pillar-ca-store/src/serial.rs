use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;

pub const SERIAL_NUMBER_BYTES: usize = 20;

/// 160-bit unsigned certificate serial, big-endian.
///
/// Serials are random and never checked against previously issued ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerialNumber([u8; SERIAL_NUMBER_BYTES]);

impl SerialNumber {
    pub fn from_bytes(bytes: [u8; SERIAL_NUMBER_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SERIAL_NUMBER_BYTES] {
        &self.0
    }

    /// Big-endian magnitude without leading zero bytes.
    pub fn significant_bytes(&self) -> &[u8] {
        let first = self
            .0
            .iter()
            .position(|byte| *byte != 0)
            .unwrap_or(SERIAL_NUMBER_BYTES - 1);
        &self.0[first..]
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<SerialNumber> for rcgen::SerialNumber {
    fn from(value: SerialNumber) -> Self {
        rcgen::SerialNumber::from_slice(&value.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SerialNumberGenerator;

impl SerialNumberGenerator {
    pub fn next_serial(&self) -> SerialNumber {
        let mut bytes = [0u8; SERIAL_NUMBER_BYTES];
        OsRng.fill_bytes(&mut bytes);
        SerialNumber(bytes)
    }
}
