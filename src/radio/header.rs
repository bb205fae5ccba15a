//! BasicRF MAC header of a secured frame.
//!
//! ```text
//! | FCF | seq | PAN ID | dest | src | sec ctrl | frame counter |
//! |  2  |  1  |   2    |  2   |  2  |    1     |       4       |
//! ```
//!
//! Multi-byte fields are little-endian on air.

use super::RadioError;

pub const FCF_NOACK: u16 = 0x8841;
pub const FCF_ACK: u16 = 0x8861;
pub const FCF_SECURITY_ENABLED: u16 = 0x0008;
pub const FCF_SECURED_NOACK: u16 = FCF_NOACK | FCF_SECURITY_ENABLED;
pub const FCF_SECURED_ACK: u16 = FCF_ACK | FCF_SECURITY_ENABLED;

/// Security level with encryption and a 64-bit MIC.
pub const SECURITY_LEVEL_ENC_MIC_64: u8 = 0x06;

pub const HEADER_LEN: usize = 9;
pub const AUX_HEADER_LEN: usize = 5;
pub const SECURED_HEADER_LEN: usize = HEADER_LEN + AUX_HEADER_LEN;

mod offset {
    use core::ops::Range;

    pub const FRAME_CONTROL: Range<usize> = 0..2;
    pub const SEQUENCE: usize = 2;
    pub const PAN_ID: Range<usize> = 3..5;
    pub const DEST_ADDR: Range<usize> = 5..7;
    pub const SRC_ADDR: Range<usize> = 7..9;
    pub const SECURITY_CONTROL: usize = 9;
    pub const FRAME_COUNTER: Range<usize> = 10..14;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacHeader {
    pub frame_control: u16,
    pub sequence: u8,
    pub pan_id: u16,
    pub dest_addr: u16,
    pub src_addr: u16,
    pub security_control: u8,
    pub frame_counter: u32,
}

impl Default for MacHeader {
    fn default() -> Self {
        Self {
            frame_control: FCF_SECURED_NOACK,
            sequence: 0,
            pan_id: 0x2007,
            dest_addr: 0xffff,
            src_addr: 0,
            security_control: SECURITY_LEVEL_ENC_MIC_64,
            frame_counter: 0,
        }
    }
}

fn read_u16(data: &[u8], range: core::ops::Range<usize>) -> u16 {
    let mut b = [0u8; 2];
    b.copy_from_slice(&data[range]);
    u16::from_le_bytes(b)
}

impl MacHeader {
    /// Parse the header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self, RadioError> {
        if data.len() < SECURED_HEADER_LEN {
            return Err(RadioError::IncorrectFrame);
        }

        let mut counter = [0u8; 4];
        counter.copy_from_slice(&data[offset::FRAME_COUNTER]);

        Ok(Self {
            frame_control: read_u16(data, offset::FRAME_CONTROL),
            sequence: data[offset::SEQUENCE],
            pan_id: read_u16(data, offset::PAN_ID),
            dest_addr: read_u16(data, offset::DEST_ADDR),
            src_addr: read_u16(data, offset::SRC_ADDR),
            security_control: data[offset::SECURITY_CONTROL],
            frame_counter: u32::from_le_bytes(counter),
        })
    }

    /// Write the header to the start of `out`, returning its length.
    pub fn write(&self, out: &mut [u8]) -> Result<usize, RadioError> {
        if out.len() < SECURED_HEADER_LEN {
            return Err(RadioError::PayloadTooBig);
        }

        out[offset::FRAME_CONTROL].copy_from_slice(&self.frame_control.to_le_bytes());
        out[offset::SEQUENCE] = self.sequence;
        out[offset::PAN_ID].copy_from_slice(&self.pan_id.to_le_bytes());
        out[offset::DEST_ADDR].copy_from_slice(&self.dest_addr.to_le_bytes());
        out[offset::SRC_ADDR].copy_from_slice(&self.src_addr.to_le_bytes());
        out[offset::SECURITY_CONTROL] = self.security_control;
        out[offset::FRAME_COUNTER].copy_from_slice(&self.frame_counter.to_le_bytes());

        Ok(SECURED_HEADER_LEN)
    }

    pub fn is_secured(&self) -> bool {
        self.frame_control & FCF_SECURITY_ENABLED != 0
    }

    pub fn ack_requested(&self) -> bool {
        self.frame_control & (FCF_ACK & !FCF_NOACK) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: [u8; 14] = [
        0x49, 0x88, 0x05, 0x07, 0x20, 0xef, 0xbe, 0x20, 0x25, 0x06, 0x04, 0x03, 0x02, 0x01,
    ];

    #[test]
    fn parse_named_fields() {
        let header = MacHeader::parse(&RAW).unwrap();
        assert_eq!(header.frame_control, FCF_SECURED_NOACK);
        assert_eq!(header.sequence, 5);
        assert_eq!(header.pan_id, 0x2007);
        assert_eq!(header.dest_addr, 0xbeef);
        assert_eq!(header.src_addr, 0x2520);
        assert_eq!(header.security_control, SECURITY_LEVEL_ENC_MIC_64);
        assert_eq!(header.frame_counter, 0x0102_0304);
        assert!(header.is_secured());
        assert!(!header.ack_requested());
    }

    #[test]
    fn write_matches_parse() {
        let header = MacHeader::parse(&RAW).unwrap();
        let mut out = [0u8; 20];
        assert_eq!(header.write(&mut out), Ok(SECURED_HEADER_LEN));
        assert_eq!(out[..14], RAW);
    }

    #[test]
    fn short_input() {
        assert_eq!(MacHeader::parse(&RAW[..13]), Err(RadioError::IncorrectFrame));
        let mut out = [0u8; 13];
        assert_eq!(
            MacHeader::default().write(&mut out),
            Err(RadioError::PayloadTooBig)
        );
    }

    #[test]
    fn ack_flag() {
        let header = MacHeader {
            frame_control: FCF_SECURED_ACK,
            ..MacHeader::default()
        };
        assert!(header.ack_requested());
        assert!(header.is_secured());
    }
}
