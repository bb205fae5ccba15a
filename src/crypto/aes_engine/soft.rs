//! Software AES engine.
//!
//! Uses the table-driven AES-128 of the `aes` crate and keeps the chaining state in memory.
//! This is the engine to use on a host, and the reference the hardware driver is checked
//! against.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;

use super::keys::AesKey;
use super::{AesEngine, AesMode, Block, BlockPosition, Direction, BLOCK_LEN};
use crate::crypto::CryptoError;

pub(crate) fn encrypt_block(cipher: &Aes128, block: &mut Block) {
    cipher.encrypt_block(GenericArray::from_mut_slice(block));
}

pub(crate) fn decrypt_block(cipher: &Aes128, block: &mut Block) {
    cipher.decrypt_block(GenericArray::from_mut_slice(block));
}

pub(crate) fn xor_into(dst: &mut Block, src: &Block) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d ^= *s;
    }
}

/// Chaining state shared by every mode: the CBC chain value, the counter or the feedback
/// register, depending on the mode.
#[derive(Clone, Copy, Default)]
pub(crate) struct Chaining {
    state: Block,
}

impl Chaining {
    pub(crate) fn load(&mut self, iv: &Block) {
        self.state = *iv;
    }

    /// Keystream for the next block of a stream mode.
    pub(crate) fn keystream(&self, cipher: &Aes128) -> Block {
        let mut ks = self.state;
        encrypt_block(cipher, &mut ks);
        ks
    }

    /// Advance the state once a stream-mode block has been converted.
    pub(crate) fn finish_stream(
        &mut self,
        mode: AesMode,
        direction: Direction,
        input: &Block,
        output: &Block,
        keystream: &Block,
    ) {
        match mode {
            AesMode::Ctr => {
                // Big-endian increment of the whole counter block.
                for b in self.state.iter_mut().rev() {
                    *b = b.wrapping_add(1);
                    if *b != 0 {
                        break;
                    }
                }
            }
            AesMode::Ofb => self.state = *keystream,
            AesMode::Cfb => {
                self.state = match direction {
                    Direction::Encrypt => *output,
                    Direction::Decrypt => *input,
                }
            }
            _ => {}
        }
    }

    /// Convert one block in ECB, CBC or CBC-MAC mode.
    pub(crate) fn block(
        &mut self,
        cipher: &Aes128,
        mode: AesMode,
        direction: Direction,
        input: &Block,
        output: &mut Block,
    ) {
        *output = *input;
        match (mode, direction) {
            (AesMode::Ecb, Direction::Encrypt) => encrypt_block(cipher, output),
            (AesMode::Ecb, Direction::Decrypt) => decrypt_block(cipher, output),
            (AesMode::Cbc, Direction::Decrypt) => {
                decrypt_block(cipher, output);
                xor_into(output, &self.state);
                self.state = *input;
            }
            // CBC encryption and CBC-MAC chain identically; a MAC is always an encryption.
            _ => {
                xor_into(output, &self.state);
                encrypt_block(cipher, output);
                self.state = *output;
            }
        }
    }
}

pub struct SoftAes {
    cipher: Option<Aes128>,
    chaining: Chaining,
    direction: Direction,
    mode: AesMode,
}

impl SoftAes {
    pub fn new() -> Self {
        Self {
            cipher: None,
            chaining: Chaining::default(),
            direction: Direction::Encrypt,
            mode: AesMode::Ecb,
        }
    }

    /// Create an engine with `key` already loaded.
    pub fn with_key(key: &AesKey) -> Self {
        let mut this = Self::new();
        this.cipher = Some(Aes128::new(GenericArray::from_slice(key.as_bytes())));
        this
    }
}

impl Default for SoftAes {
    fn default() -> Self {
        Self::new()
    }
}

impl AesEngine for SoftAes {
    fn load_key(&mut self, key: &AesKey) -> Result<(), CryptoError> {
        self.cipher = Some(Aes128::new(GenericArray::from_slice(key.as_bytes())));
        Ok(())
    }

    fn load_iv(&mut self, iv: &Block) -> Result<(), CryptoError> {
        self.chaining.load(iv);
        Ok(())
    }

    fn set_operation(&mut self, direction: Direction, mode: AesMode) -> Result<(), CryptoError> {
        self.direction = direction;
        self.mode = mode;
        Ok(())
    }

    fn convert_block(
        &mut self,
        input: &Block,
        output: &mut Block,
        _position: BlockPosition,
    ) -> Result<(), CryptoError> {
        let cipher = self.cipher.as_ref().ok_or(CryptoError::KeyNotLoaded)?;

        if self.mode.is_stream() {
            let ks = self.chaining.keystream(cipher);
            for i in 0..BLOCK_LEN {
                output[i] = input[i] ^ ks[i];
            }
            self.chaining
                .finish_stream(self.mode, self.direction, input, output, &ks);
        } else {
            self.chaining
                .block(cipher, self.mode, self.direction, input, output);
        }

        Ok(())
    }
}
