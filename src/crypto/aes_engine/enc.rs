//! Driver for the CC2530 AES coprocessor.
//!
//! The coprocessor is controlled through three SFRs: `ENCCS` (control and status), `ENCDI`
//! (data in) and `ENCDO` (data out). Data is streamed one byte at a time. How those registers
//! are reached depends on the board support code, so the driver is generic over
//! [`EncRegisters`].

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use log::{trace, warn};

use super::keys::AesKey;
use super::{AesEngine, AesMode, Block, BlockPosition, Direction};
use crate::crypto::CryptoError;

/// `ENCCS` bit fields.
pub mod enccs {
    /// Start the command selected in `CMD`.
    pub const ST: u8 = 0x01;
    pub const CMD_MASK: u8 = 0x06;
    /// Set when the coprocessor is ready for a new command.
    pub const RDY: u8 = 0x08;
    pub const MODE_MASK: u8 = 0x70;

    pub const CMD_ENCRYPT: u8 = 0x00;
    pub const CMD_DECRYPT: u8 = 0x02;
    pub const CMD_LOAD_KEY: u8 = 0x04;
    pub const CMD_LOAD_IV: u8 = 0x06;
}

/// Access to the AES coprocessor SFRs.
pub trait EncRegisters {
    fn read_enccs(&self) -> u8;
    fn write_enccs(&mut self, value: u8);
    fn write_encdi(&mut self, value: u8);
    fn read_encdo(&mut self) -> u8;
}

impl<R: EncRegisters + ?Sized> EncRegisters for &mut R {
    fn read_enccs(&self) -> u8 {
        (**self).read_enccs()
    }

    fn write_enccs(&mut self, value: u8) {
        (**self).write_enccs(value)
    }

    fn write_encdi(&mut self, value: u8) {
        (**self).write_encdi(value)
    }

    fn read_encdo(&mut self) -> u8 {
        (**self).read_encdo()
    }
}

/// Bytes written to `ENCDI` before `ENCDO` is read in the stream modes.
const STREAM_CHUNK: usize = 4;

pub struct Cc2530Aes<R, D> {
    regs: R,
    delay: D,
    timeout_us: u32,
    mode: AesMode,
    key_loaded: bool,
}

impl<R: EncRegisters, D: DelayNs> Cc2530Aes<R, D> {
    pub const DEFAULT_TIMEOUT_US: u32 = 1000;

    pub fn new(regs: R, delay: D) -> Self {
        Self {
            regs,
            delay,
            timeout_us: Self::DEFAULT_TIMEOUT_US,
            mode: AesMode::Ecb,
            key_loaded: false,
        }
    }

    /// Set how long to wait for `ENCCS.RDY` before giving up.
    pub fn with_timeout(mut self, timeout_us: u32) -> Self {
        self.timeout_us = timeout_us;
        self
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Release the registers and the delay provider.
    pub fn free(self) -> (R, D) {
        (self.regs, self.delay)
    }

    #[inline]
    fn start(&mut self) {
        let cs = self.regs.read_enccs();
        self.regs.write_enccs(cs | enccs::ST);
    }

    #[inline]
    fn set_mode(&mut self, mode: AesMode) {
        let cs = self.regs.read_enccs();
        self.regs
            .write_enccs((cs & !enccs::MODE_MASK) | mode.bits());
    }

    /// Select a command. This also clears `ST`.
    #[inline]
    fn set_command(&mut self, command: u8) {
        let cs = self.regs.read_enccs();
        self.regs
            .write_enccs((cs & !(enccs::CMD_MASK | enccs::ST)) | command);
    }

    fn poll_ready(&mut self) -> nb::Result<(), Infallible> {
        if self.regs.read_enccs() & enccs::RDY != 0 {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Busy-wait on `ENCCS.RDY`, polling once per microsecond.
    fn wait_ready(&mut self) -> Result<(), CryptoError> {
        let mut waited = 0;
        loop {
            match self.poll_ready() {
                Ok(()) => return Ok(()),
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(never)) => match never {},
            }

            if waited >= self.timeout_us {
                warn!("AES coprocessor not ready after {} us", waited);
                return Err(CryptoError::HardwareFault);
            }

            self.delay.delay_us(1);
            waited += 1;
        }
    }

    /// Load a key or an IV.
    fn load_block(&mut self, data: &Block, command: u8) -> Result<(), CryptoError> {
        self.set_command(command);
        self.start();

        for b in data.iter() {
            self.regs.write_encdi(*b);
        }

        self.wait_ready()
    }

    fn write_block(&mut self, input: &Block) {
        for b in input.iter() {
            self.regs.write_encdi(*b);
        }
    }

    fn read_block(&mut self, output: &mut Block) {
        for b in output.iter_mut() {
            *b = self.regs.read_encdo();
        }
    }
}

impl<R: EncRegisters, D: DelayNs> AesEngine for Cc2530Aes<R, D> {
    fn load_key(&mut self, key: &AesKey) -> Result<(), CryptoError> {
        self.load_block(key.as_bytes(), enccs::CMD_LOAD_KEY)?;
        self.key_loaded = true;
        trace!("AES key loaded");
        Ok(())
    }

    fn load_iv(&mut self, iv: &Block) -> Result<(), CryptoError> {
        self.load_block(iv, enccs::CMD_LOAD_IV)
    }

    fn set_operation(&mut self, direction: Direction, mode: AesMode) -> Result<(), CryptoError> {
        self.mode = mode;
        self.set_mode(mode);
        self.set_command(match direction {
            Direction::Encrypt => enccs::CMD_ENCRYPT,
            Direction::Decrypt => enccs::CMD_DECRYPT,
        });
        Ok(())
    }

    fn convert_block(
        &mut self,
        input: &Block,
        output: &mut Block,
        position: BlockPosition,
    ) -> Result<(), CryptoError> {
        if !self.key_loaded {
            return Err(CryptoError::KeyNotLoaded);
        }

        // The coprocessor only outputs a CBC-MAC block in CBC mode. A lone block has no
        // penultimate block to switch after, so switch before it.
        if self.mode == AesMode::CbcMac && position.count == 1 {
            self.set_mode(AesMode::Cbc);
        }

        self.start();

        match self.mode {
            mode if mode.is_stream() => {
                for (inp, out) in input
                    .chunks(STREAM_CHUNK)
                    .zip(output.chunks_mut(STREAM_CHUNK))
                {
                    for b in inp.iter() {
                        self.regs.write_encdi(*b);
                    }
                    for b in out.iter_mut() {
                        *b = self.regs.read_encdo();
                    }
                }
                self.wait_ready()?;
            }
            AesMode::CbcMac => {
                self.write_block(input);
                if position.is_penultimate() {
                    self.set_mode(AesMode::Cbc);
                }
                self.wait_ready()?;
                if position.is_last() {
                    self.read_block(output);
                }
            }
            _ => {
                self.write_block(input);
                self.wait_ready()?;
                self.read_block(output);
            }
        }

        Ok(())
    }
}
