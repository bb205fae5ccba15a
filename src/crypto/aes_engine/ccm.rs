//! CCM* packet transform.
//!
//! Authentication runs CBC-MAC over `B0 ‖ len(a) ‖ a ‖ pad ‖ m ‖ pad` with a zero IV. The MAC
//! is then encrypted in counter mode with counter block `A0`, the payload with `A1, A2, ...`.
//! Only the first `lm` bytes of the encrypted MAC are sent.

use super::{padded_len, AesEngine, AesMode, Block, BLOCK_LEN, MAX_RUN_LEN};
use crate::crypto::nonce::{Nonce, CCM_NONCE_LEN, CTR_FLAGS};
use crate::crypto::CryptoError;

/// Upper bound on header, payload and MIC of one secured frame.
pub const MAX_FRAME_LEN: usize = 128;
pub const SCRATCH_LEN: usize = 128;

const ADATA_FLAG: u8 = 0x40;

/// Length of the integrity code.
///
/// The selector values `m = 1, 2, 3` are the ones BasicRF passes around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicLength {
    Mic32,
    Mic64,
    Mic128,
}

impl MicLength {
    pub const fn from_selector(m: u8) -> Option<Self> {
        match m {
            1 => Some(MicLength::Mic32),
            2 => Some(MicLength::Mic64),
            3 => Some(MicLength::Mic128),
            _ => None,
        }
    }

    pub const fn selector(self) -> u8 {
        match self {
            MicLength::Mic32 => 1,
            MicLength::Mic64 => 2,
            MicLength::Mic128 => 3,
        }
    }

    /// `lm`, the number of MIC bytes on the wire.
    pub const fn byte_len(self) -> usize {
        match self {
            MicLength::Mic32 => 4,
            MicLength::Mic64 => 8,
            MicLength::Mic128 => 16,
        }
    }

    /// `M'` as placed in the B0 flags.
    const fn flag_bits(self) -> u8 {
        (((self.byte_len() - 2) / 2) as u8) << 3
    }
}

/// Output of [`CcmContext::seal`], borrowed from the context scratch buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sealed<'a> {
    pub payload: &'a [u8],
    pub mic: &'a [u8],
}

impl<'a> Sealed<'a> {
    pub fn len(&self) -> usize {
        self.payload.len() + self.mic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scratch state of one CCM* operation.
pub struct CcmContext {
    iv: Block,
    /// B0..Bn, the CBC-MAC input.
    buf: [u8; MAX_RUN_LEN],
    cipher_text: [u8; SCRATCH_LEN],
    mac: Block,
}

impl CcmContext {
    pub const fn new() -> Self {
        Self {
            iv: [0; BLOCK_LEN],
            buf: [0; MAX_RUN_LEN],
            cipher_text: [0; SCRATCH_LEN],
            mac: [0; BLOCK_LEN],
        }
    }

    fn check_lengths(f: usize, c: usize, mic: MicLength) -> Result<(), CryptoError> {
        if f + c + mic.byte_len() > MAX_FRAME_LEN {
            return Err(CryptoError::InvalidInput);
        }
        Ok(())
    }

    /// Lay out B0..Bn in `buf` and return how many bytes are used. The engine pads the tail.
    fn generate_auth_data(
        &mut self,
        nonce: &Nonce,
        adata: &[u8],
        payload: &[u8],
        mic: MicLength,
    ) -> usize {
        let f = adata.len();
        let c = payload.len();

        self.buf.fill(0);

        let mut flags = CTR_FLAGS | mic.flag_bits();
        if f > 0 {
            flags |= ADATA_FLAG;
        }
        self.buf[0] = flags;
        self.buf[1..1 + CCM_NONCE_LEN].copy_from_slice(&nonce.ccm_nonce());
        self.buf[14..16].copy_from_slice(&(c as u16).to_be_bytes());

        let mut i = BLOCK_LEN;
        if f > 0 {
            self.buf[16..18].copy_from_slice(&(f as u16).to_be_bytes());
            self.buf[18..18 + f].copy_from_slice(adata);
            i = padded_len(18 + f);
        }

        self.buf[i..i + c].copy_from_slice(payload);
        i + c
    }

    fn compute_mac<E: AesEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        length: usize,
    ) -> Result<(), CryptoError> {
        self.iv = [0; BLOCK_LEN];
        engine.encrypt(AesMode::CbcMac, &self.buf[..length], &mut self.mac, &self.iv)
    }

    fn wipe(&mut self) {
        self.buf.fill(0);
        self.cipher_text.fill(0);
        self.mac.fill(0);
    }

    /// Authenticate `adata ‖ payload` and encrypt `payload`.
    pub fn seal<E: AesEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        nonce: &Nonce,
        adata: &[u8],
        payload: &[u8],
        mic: MicLength,
    ) -> Result<Sealed<'_>, CryptoError> {
        let c = payload.len();
        Self::check_lengths(adata.len(), c, mic)?;

        let length = self.generate_auth_data(nonce, adata, payload, mic);
        self.compute_mac(engine, length)?;

        let mut tag = [0u8; BLOCK_LEN];
        self.iv = nonce.counter_block(0);
        engine.encrypt(AesMode::Ctr, &self.mac, &mut tag, &self.iv)?;
        self.mac = tag;

        self.iv = nonce.counter_block(1);
        engine.encrypt(AesMode::Ctr, payload, &mut self.cipher_text[..c], &self.iv)?;

        Ok(Sealed {
            payload: &self.cipher_text[..c],
            mic: &self.mac[..mic.byte_len()],
        })
    }

    /// Decrypt `payload` in place and check it, together with `adata`, against `mic_field`.
    ///
    /// On a mismatch the payload is zeroed and [`CryptoError::AuthenticationFailed`] returned.
    pub fn open<E: AesEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        nonce: &Nonce,
        adata: &[u8],
        payload: &mut [u8],
        mic_field: &[u8],
        mic: MicLength,
    ) -> Result<(), CryptoError> {
        let c = payload.len();
        let lm = mic.byte_len();
        if mic_field.len() != lm {
            return Err(CryptoError::InvalidInput);
        }
        Self::check_lengths(adata.len(), c, mic)?;

        let mut received = [0u8; BLOCK_LEN];
        self.iv = nonce.counter_block(0);
        engine.decrypt(AesMode::Ctr, mic_field, &mut received[..lm], &self.iv)?;

        self.iv = nonce.counter_block(1);
        engine.decrypt(AesMode::Ctr, payload, &mut self.cipher_text[..c], &self.iv)?;
        payload.copy_from_slice(&self.cipher_text[..c]);

        let length = self.generate_auth_data(nonce, adata, payload, mic);
        self.compute_mac(engine, length)?;

        let diff = self.mac[..lm]
            .iter()
            .zip(received[..lm].iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));

        if diff != 0 {
            payload.fill(0);
            self.wipe();
            return Err(CryptoError::AuthenticationFailed);
        }

        Ok(())
    }
}

impl Default for CcmContext {
    fn default() -> Self {
        Self::new()
    }
}
