use core::fmt;

pub mod aes_engine;
pub mod nonce;

pub use aes_engine::ccm::{CcmContext, MicLength, Sealed};
pub use aes_engine::keys::AesKey;
pub use aes_engine::{AesEngine, AesMode, Direction};
pub use nonce::Nonce;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// A buffer is too small, or the data does not fit the scratch buffers.
    InvalidInput,
    /// The AES coprocessor never signalled ready.
    HardwareFault,
    /// An operation was started before a key was loaded.
    KeyNotLoaded,
    /// The recomputed MIC does not match the received one.
    AuthenticationFailed,
    /// A second frame was secured without advancing the transmit counter.
    NonceReuse,
    /// The transmit frame counter reached `u32::MAX`.
    CounterExhausted,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CryptoError::InvalidInput => "input does not fit the scratch buffers",
            CryptoError::HardwareFault => "AES coprocessor did not become ready",
            CryptoError::KeyNotLoaded => "no key loaded in the AES engine",
            CryptoError::AuthenticationFailed => "MIC mismatch",
            CryptoError::NonceReuse => "transmit nonce already used",
            CryptoError::CounterExhausted => "transmit frame counter exhausted",
        };
        f.write_str(msg)
    }
}
