//! Register-level model of the CC2530 AES coprocessor.
//!
//! [`EncEmulator`] implements [`EncRegisters`] so the [`Cc2530Aes`](super::enc::Cc2530Aes)
//! driver can run on a host. It follows the coprocessor's observable behaviour:
//!
//! - writing `ENCCS` with `ST` set starts the selected command and clears `RDY`;
//! - key and IV loads take 16 bytes through `ENCDI`;
//! - stream modes produce output byte for byte, the block modes once 16 bytes are in;
//! - CBC-MAC mode chains but never produces output, so the last block has to run in CBC mode.

use aes::cipher::{generic_array::GenericArray, KeyInit};
use aes::Aes128;

use super::enc::{enccs, EncRegisters};
use super::soft::Chaining;
use super::{AesMode, Block, Direction, BLOCK_LEN};

pub struct EncEmulator {
    enccs: u8,
    cipher: Aes128,
    chaining: Chaining,
    input: Block,
    input_len: usize,
    output: Block,
    output_len: usize,
    read_pos: usize,
    keystream: Block,
    busy: bool,
    stalled: bool,
}

impl EncEmulator {
    pub fn new() -> Self {
        Self {
            enccs: 0,
            cipher: Aes128::new(GenericArray::from_slice(&[0u8; BLOCK_LEN])),
            chaining: Chaining::default(),
            input: [0; BLOCK_LEN],
            input_len: 0,
            output: [0; BLOCK_LEN],
            output_len: 0,
            read_pos: 0,
            keystream: [0; BLOCK_LEN],
            busy: false,
            stalled: false,
        }
    }

    /// Keep `RDY` low, as a hung coprocessor would.
    pub fn stall(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    fn command(&self) -> u8 {
        self.enccs & enccs::CMD_MASK
    }

    fn direction(&self) -> Direction {
        if self.command() == enccs::CMD_DECRYPT {
            Direction::Decrypt
        } else {
            Direction::Encrypt
        }
    }

    fn mode(&self) -> Option<AesMode> {
        AesMode::from_bits(self.enccs)
    }

    fn begin(&mut self) {
        self.busy = true;
        self.input_len = 0;
        self.output_len = 0;
        self.read_pos = 0;

        let converting = matches!(self.command(), enccs::CMD_ENCRYPT | enccs::CMD_DECRYPT);
        if converting && self.mode().map_or(false, AesMode::is_stream) {
            self.keystream = self.chaining.keystream(&self.cipher);
        }
    }

    fn finish_block(&mut self) {
        let direction = self.direction();
        let mode = match self.mode() {
            Some(mode) => mode,
            None => {
                self.busy = false;
                return;
            }
        };

        if mode.is_stream() {
            self.chaining.finish_stream(
                mode,
                direction,
                &self.input,
                &self.output,
                &self.keystream,
            );
        } else {
            let mut out = [0u8; BLOCK_LEN];
            self.chaining
                .block(&self.cipher, mode, direction, &self.input, &mut out);
            if mode != AesMode::CbcMac {
                self.output = out;
                self.output_len = BLOCK_LEN;
            }
        }

        self.busy = false;
    }
}

impl Default for EncEmulator {
    fn default() -> Self {
        Self::new()
    }
}

impl EncRegisters for EncEmulator {
    fn read_enccs(&self) -> u8 {
        let ready = if self.busy || self.stalled { 0 } else { enccs::RDY };
        (self.enccs & !(enccs::ST | enccs::RDY)) | ready
    }

    fn write_enccs(&mut self, value: u8) {
        self.enccs = value & !(enccs::ST | enccs::RDY);
        if value & enccs::ST != 0 {
            self.begin();
        }
    }

    fn write_encdi(&mut self, value: u8) {
        if !self.busy || self.input_len >= BLOCK_LEN {
            return;
        }

        let i = self.input_len;
        self.input[i] = value;
        self.input_len += 1;

        match self.command() {
            enccs::CMD_LOAD_KEY => {
                if self.input_len == BLOCK_LEN {
                    self.cipher = Aes128::new(GenericArray::from_slice(&self.input));
                    self.busy = false;
                }
            }
            enccs::CMD_LOAD_IV => {
                if self.input_len == BLOCK_LEN {
                    self.chaining.load(&self.input);
                    self.busy = false;
                }
            }
            _ => {
                if self.mode().map_or(false, AesMode::is_stream) {
                    self.output[i] = value ^ self.keystream[i];
                    self.output_len = i + 1;
                }
                if self.input_len == BLOCK_LEN {
                    self.finish_block();
                }
            }
        }
    }

    fn read_encdo(&mut self) -> u8 {
        if self.read_pos < self.output_len {
            let b = self.output[self.read_pos];
            self.read_pos += 1;
            b
        } else {
            0
        }
    }
}
