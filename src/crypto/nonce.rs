//! CCM* nonces.
//!
//! On the wire a nonce is a 16-byte counter block:
//!
//! | bytes    | field                                     |
//! |----------|-------------------------------------------|
//! | `0`      | flags                                     |
//! | `1..9`   | source extended address, big-endian       |
//! | `9..13`  | frame counter, big-endian                 |
//! | `13`     | security level                            |
//! | `14..16` | block counter                             |
//!
//! BasicRF only has 16-bit addresses and keeps them in bytes `7..9`. The frame counter is
//! kept as a native integer and only serialised when a block is built.

use super::aes_engine::{Block, BLOCK_LEN};
use super::CryptoError;

pub const NONCE_LEN: usize = BLOCK_LEN;
/// The 13 bytes shared by B0 and every counter block.
pub const CCM_NONCE_LEN: usize = 13;
/// Counter block flags: `L' = 1`, a 2-byte block counter.
pub const CTR_FLAGS: u8 = 0x01;

const SOURCE: core::ops::Range<usize> = 1..9;
const FRAME_COUNTER: core::ops::Range<usize> = 9..13;
const SECURITY_LEVEL: usize = 13;
const BLOCK_COUNTER: core::ops::Range<usize> = 14..16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Nonce {
    source: [u8; 8],
    frame_counter: u32,
    security_level: u8,
}

impl Nonce {
    pub const fn new(source: [u8; 8], frame_counter: u32, security_level: u8) -> Self {
        Self {
            source,
            frame_counter,
            security_level,
        }
    }

    /// A nonce for a node that only has a short address.
    pub fn from_short_address(addr: u16, frame_counter: u32, security_level: u8) -> Self {
        let mut nonce = Self::new([0; 8], frame_counter, security_level);
        nonce.set_short_source(addr);
        nonce
    }

    /// Read a nonce from its 16-byte wire layout. Flags and block counter are ignored, they
    /// are rewritten whenever a block is built.
    pub fn from_seed(seed: &[u8; NONCE_LEN]) -> Self {
        let mut source = [0u8; 8];
        source.copy_from_slice(&seed[SOURCE]);
        let mut counter = [0u8; 4];
        counter.copy_from_slice(&seed[FRAME_COUNTER]);

        Self {
            source,
            frame_counter: u32::from_be_bytes(counter),
            security_level: seed[SECURITY_LEVEL],
        }
    }

    #[inline]
    pub fn source(&self) -> &[u8; 8] {
        &self.source
    }

    #[inline]
    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    #[inline]
    pub fn security_level(&self) -> u8 {
        self.security_level
    }

    /// Store a 16-bit source address in the last two source bytes.
    pub fn set_short_source(&mut self, addr: u16) {
        self.source[6..].copy_from_slice(&addr.to_be_bytes());
    }

    pub fn set_frame_counter(&mut self, frame_counter: u32) {
        self.frame_counter = frame_counter;
    }

    /// Advance the frame counter. Returns the new value.
    ///
    /// A wrapped counter would repeat keystreams, so `u32::MAX` is terminal.
    pub fn increment(&mut self) -> Result<u32, CryptoError> {
        self.frame_counter = self
            .frame_counter
            .checked_add(1)
            .ok_or(CryptoError::CounterExhausted)?;
        Ok(self.frame_counter)
    }

    /// The nonce proper: source, frame counter and security level.
    pub fn ccm_nonce(&self) -> [u8; CCM_NONCE_LEN] {
        let mut n = [0u8; CCM_NONCE_LEN];
        n[..8].copy_from_slice(&self.source);
        n[8..12].copy_from_slice(&self.frame_counter.to_be_bytes());
        n[12] = self.security_level;
        n
    }

    /// Counter block `A_i` for the CTR part of CCM*.
    pub fn counter_block(&self, counter: u16) -> Block {
        let mut block = [0u8; BLOCK_LEN];
        block[0] = CTR_FLAGS;
        block[1..1 + CCM_NONCE_LEN].copy_from_slice(&self.ccm_nonce());
        block[BLOCK_COUNTER].copy_from_slice(&counter.to_be_bytes());
        block
    }

    /// The 16-byte wire layout, with counter 0.
    pub fn to_bytes(&self) -> [u8; NONCE_LEN] {
        self.counter_block(0)
    }
}
