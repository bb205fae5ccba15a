//! Radio side of the secured link.
//!
//! The security layer does not drive the radio itself. It writes frames through a [`TxFifo`]
//! and reads them through an [`RxFifo`], the way BasicRF pushes bytes into `RFD`.

use core::fmt;

pub mod header;
pub mod security;
pub mod shared;

pub const CHECKSUM_LEN: usize = 2;
pub const MAX_PACKET_LEN: usize = 127;
/// Size of the radio FIFOs, length byte included.
pub const FIFO_LEN: usize = MAX_PACKET_LEN + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    PayloadTooBig,
    FifoUnderflow,
    IncorrectFrame,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RadioError::PayloadTooBig => "frame does not fit the FIFO",
            RadioError::FifoUnderflow => "read past the end of the FIFO",
            RadioError::IncorrectFrame => "malformed frame",
        };
        f.write_str(msg)
    }
}

pub trait TxFifo {
    /// Flush the TX FIFO, then write `data` to it.
    fn write_tx_buf(&mut self, data: &[u8]) -> Result<(), RadioError>;

    /// Append `data` after what is already in the TX FIFO.
    fn append_tx_buf(&mut self, data: &[u8]) -> Result<(), RadioError>;
}

pub trait RxFifo {
    /// Fill `data` with the next bytes of the RX FIFO.
    fn read_rx_buf(&mut self, data: &mut [u8]) -> Result<(), RadioError>;
}

impl<T: TxFifo + ?Sized> TxFifo for &mut T {
    fn write_tx_buf(&mut self, data: &[u8]) -> Result<(), RadioError> {
        (**self).write_tx_buf(data)
    }

    fn append_tx_buf(&mut self, data: &[u8]) -> Result<(), RadioError> {
        (**self).append_tx_buf(data)
    }
}

impl<R: RxFifo + ?Sized> RxFifo for &mut R {
    fn read_rx_buf(&mut self, data: &mut [u8]) -> Result<(), RadioError> {
        (**self).read_rx_buf(data)
    }
}

/// A FIFO held in memory.
///
/// Frames written through [`TxFifo`] can be read back through [`RxFifo`], which makes it a
/// loopback between two links.
#[derive(Clone)]
pub struct FrameBuffer {
    data: [u8; FIFO_LEN],
    len: usize,
    read_pos: usize,
}

impl FrameBuffer {
    pub const fn new() -> Self {
        Self {
            data: [0; FIFO_LEN],
            len: 0,
            read_pos: 0,
        }
    }

    /// A FIFO that already holds `bytes`, as if they had been received.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RadioError> {
        let mut this = Self::new();
        this.append_tx_buf(bytes)?;
        Ok(this)
    }

    /// Everything written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes not read yet.
    pub fn remaining(&self) -> usize {
        self.len - self.read_pos
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.read_pos = 0;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TxFifo for FrameBuffer {
    fn write_tx_buf(&mut self, data: &[u8]) -> Result<(), RadioError> {
        self.clear();
        self.append_tx_buf(data)
    }

    fn append_tx_buf(&mut self, data: &[u8]) -> Result<(), RadioError> {
        let end = self.len + data.len();
        if end > FIFO_LEN {
            return Err(RadioError::PayloadTooBig);
        }
        self.data[self.len..end].copy_from_slice(data);
        self.len = end;
        Ok(())
    }
}

impl RxFifo for FrameBuffer {
    fn read_rx_buf(&mut self, data: &mut [u8]) -> Result<(), RadioError> {
        let end = self.read_pos + data.len();
        if end > self.len {
            return Err(RadioError::FifoUnderflow);
        }
        data.copy_from_slice(&self.data[self.read_pos..end]);
        self.read_pos = end;
        Ok(())
    }
}
