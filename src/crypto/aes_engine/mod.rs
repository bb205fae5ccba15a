//! Single-block AES-128 engine and the generic block-iteration driver.
//!
//! An [`AesEngine`] only knows how to latch a key and an IV and how to convert one 16-byte
//! block; chaining state lives inside the engine, the same way the CC2530 coprocessor keeps it
//! in hardware. The provided [`AesEngine::run`] method splits a buffer into zero-padded blocks
//! and collects the output the selected mode produces.

use super::CryptoError;

pub mod ccm;
pub mod emulator;
pub mod enc;
pub mod keys;
pub mod soft;

use keys::AesKey;

pub const BLOCK_LEN: usize = 16;

/// Largest input a single [`AesEngine::run`] call accepts.
///
/// This is the CBC-MAC input of the biggest frame [`ccm::CcmContext`] can secure.
pub const MAX_RUN_LEN: usize = 176;

pub type Block = [u8; BLOCK_LEN];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Chaining modes of the AES coprocessor.
///
/// The discriminants are the `ENCCS.MODE` field encodings.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesMode {
    Cbc = 0x00,
    Cfb = 0x10,
    Ofb = 0x20,
    Ctr = 0x30,
    Ecb = 0x40,
    CbcMac = 0x50,
}

impl AesMode {
    #[inline]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0x70 {
            0x00 => Some(AesMode::Cbc),
            0x10 => Some(AesMode::Cfb),
            0x20 => Some(AesMode::Ofb),
            0x30 => Some(AesMode::Ctr),
            0x40 => Some(AesMode::Ecb),
            0x50 => Some(AesMode::CbcMac),
            _ => None,
        }
    }

    /// Counter, output feedback and cipher feedback are processed 4 bytes at a time.
    #[inline]
    pub const fn is_stream(self) -> bool {
        matches!(self, AesMode::Ctr | AesMode::Cfb | AesMode::Ofb)
    }
}

/// Where a block sits in the current operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPosition {
    pub index: usize,
    pub count: usize,
}

impl BlockPosition {
    #[inline]
    pub const fn is_last(&self) -> bool {
        self.index + 1 == self.count
    }

    #[inline]
    pub const fn is_penultimate(&self) -> bool {
        self.index + 2 == self.count
    }
}

/// Number of 16-byte blocks needed for `length` bytes.
#[inline]
pub const fn block_count(length: usize) -> usize {
    (length + BLOCK_LEN - 1) / BLOCK_LEN
}

/// `length` rounded up to a block boundary.
#[inline]
pub const fn padded_len(length: usize) -> usize {
    block_count(length) * BLOCK_LEN
}

pub trait AesEngine {
    /// Latch a 128-bit key. Must be called before any other operation.
    fn load_key(&mut self, key: &AesKey) -> Result<(), CryptoError>;

    /// Latch the IV or initial counter block for the next operation.
    fn load_iv(&mut self, iv: &Block) -> Result<(), CryptoError>;

    /// Select direction and chaining mode for the next blocks.
    fn set_operation(&mut self, direction: Direction, mode: AesMode) -> Result<(), CryptoError>;

    /// Convert one block. Only the final block of a CBC-MAC is required to produce output.
    fn convert_block(
        &mut self,
        input: &Block,
        output: &mut Block,
        position: BlockPosition,
    ) -> Result<(), CryptoError>;

    /// Run a full operation over `input`, zero-padding the last block.
    ///
    /// `output` must hold `input.len()` bytes in a stream mode, every padded block in ECB and
    /// CBC, and a single block for CBC-MAC.
    fn run(
        &mut self,
        direction: Direction,
        mode: AesMode,
        input: &[u8],
        output: &mut [u8],
        iv: &Block,
    ) -> Result<(), CryptoError> {
        let length = input.len();
        if length > MAX_RUN_LEN {
            return Err(CryptoError::InvalidInput);
        }

        let count = block_count(length);
        let needed = match mode {
            AesMode::CbcMac => BLOCK_LEN,
            m if m.is_stream() => length,
            _ => count * BLOCK_LEN,
        };
        if output.len() < needed || (mode == AesMode::CbcMac && count == 0) {
            return Err(CryptoError::InvalidInput);
        }

        self.load_iv(iv)?;
        self.set_operation(direction, mode)?;

        let mut block = [0u8; BLOCK_LEN];
        let mut converted = [0u8; BLOCK_LEN];
        for index in 0..count {
            let start = index * BLOCK_LEN;
            let end = usize::min(start + BLOCK_LEN, length);

            block.fill(0);
            block[..end - start].copy_from_slice(&input[start..end]);

            let position = BlockPosition { index, count };
            self.convert_block(&block, &mut converted, position)?;

            match mode {
                AesMode::CbcMac => {
                    if position.is_last() {
                        output[..BLOCK_LEN].copy_from_slice(&converted);
                    }
                }
                m if m.is_stream() => {
                    output[start..end].copy_from_slice(&converted[..end - start]);
                }
                _ => output[start..start + BLOCK_LEN].copy_from_slice(&converted),
            }
        }

        Ok(())
    }

    fn encrypt(
        &mut self,
        mode: AesMode,
        input: &[u8],
        output: &mut [u8],
        iv: &Block,
    ) -> Result<(), CryptoError> {
        self.run(Direction::Encrypt, mode, input, output, iv)
    }

    fn decrypt(
        &mut self,
        mode: AesMode,
        input: &[u8],
        output: &mut [u8],
        iv: &Block,
    ) -> Result<(), CryptoError> {
        self.run(Direction::Decrypt, mode, input, output, iv)
    }
}

impl<E: AesEngine + ?Sized> AesEngine for &mut E {
    fn load_key(&mut self, key: &AesKey) -> Result<(), CryptoError> {
        (**self).load_key(key)
    }

    fn load_iv(&mut self, iv: &Block) -> Result<(), CryptoError> {
        (**self).load_iv(iv)
    }

    fn set_operation(&mut self, direction: Direction, mode: AesMode) -> Result<(), CryptoError> {
        (**self).set_operation(direction, mode)
    }

    fn convert_block(
        &mut self,
        input: &Block,
        output: &mut Block,
        position: BlockPosition,
    ) -> Result<(), CryptoError> {
        (**self).convert_block(input, output, position)
    }
}
