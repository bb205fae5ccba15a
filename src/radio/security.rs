//! Secured frame transmission and reception.
//!
//! A [`SecureLink`] owns the AES engine, the CCM* scratch context and the two nonces. The
//! transmit nonce carries this node's address and frame counter. The receive nonce is
//! rewritten from the header of every frame that comes in.

use core::fmt;

use log::{debug, trace, warn};

use super::header::{
    MacHeader, FCF_SECURITY_ENABLED, SECURED_HEADER_LEN, SECURITY_LEVEL_ENC_MIC_64,
};
use super::{RadioError, RxFifo, TxFifo, CHECKSUM_LEN, FIFO_LEN, MAX_PACKET_LEN};
use crate::crypto::aes_engine::ccm::MAX_FRAME_LEN;
use crate::crypto::nonce::NONCE_LEN;
use crate::crypto::{AesEngine, AesKey, CcmContext, CryptoError, MicLength, Nonce};

/// Key of the BasicRF light switch demo.
pub const DEMO_KEY: AesKey = AesKey::new([
    0xc0, 0xc1, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xcb, 0xcc, 0xcd, 0xce,
    0xcf,
]);

/// What happens to the transmit frame counter once a frame is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterPolicy {
    /// The caller advances it with [`SecureLink::inc_nonce_tx`].
    Manual,
    /// Advanced after every secured frame.
    Advance,
    /// Like `Manual`, but securing a second frame on the same counter fails.
    RejectReuse,
}

#[derive(Debug, Clone, Copy)]
pub struct SecurityConfig {
    pub key: AesKey,
    pub short_addr: u16,
    pub security_level: u8,
    pub mic: MicLength,
    pub counter_policy: CounterPolicy,
    pub initial_frame_counter: u32,
}

impl SecurityConfig {
    /// BasicRF settings around `key`: level `0x06`, MIC-64, manual counter.
    pub const fn new(key: AesKey) -> Self {
        Self {
            key,
            short_addr: 0,
            security_level: SECURITY_LEVEL_ENC_MIC_64,
            mic: MicLength::Mic64,
            counter_policy: CounterPolicy::Manual,
            initial_frame_counter: 0,
        }
    }

    /// The light switch demo settings, keyed with the published [`DEMO_KEY`].
    pub const fn demo() -> Self {
        Self::new(DEMO_KEY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    Crypto(CryptoError),
    Radio(RadioError),
}

impl From<CryptoError> for LinkError {
    fn from(e: CryptoError) -> Self {
        LinkError::Crypto(e)
    }
}

impl From<RadioError> for LinkError {
    fn from(e: RadioError) -> Self {
        LinkError::Radio(e)
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Crypto(e) => write!(f, "security: {}", e),
            LinkError::Radio(e) => write!(f, "radio: {}", e),
        }
    }
}

pub struct SecureLink<E> {
    engine: E,
    ccm: CcmContext,
    nonce_tx: Nonce,
    nonce_rx: Nonce,
    mic: MicLength,
    policy: CounterPolicy,
    tx_nonce_used: bool,
}

impl<E: AesEngine> SecureLink<E> {
    /// Load `key` into the engine and start from the given nonce seeds.
    ///
    /// The seeds use the 16-byte nonce layout of [`Nonce::from_seed`].
    pub fn secure_init(
        mut engine: E,
        key: &AesKey,
        rx_nonce_seed: &[u8; NONCE_LEN],
        tx_nonce_seed: &[u8; NONCE_LEN],
    ) -> Result<Self, CryptoError> {
        engine.load_key(key)?;

        Ok(Self {
            engine,
            ccm: CcmContext::new(),
            nonce_tx: Nonce::from_seed(tx_nonce_seed),
            nonce_rx: Nonce::from_seed(rx_nonce_seed),
            mic: MicLength::Mic64,
            policy: CounterPolicy::Manual,
            tx_nonce_used: false,
        })
    }

    pub fn new(engine: E, config: &SecurityConfig) -> Result<Self, CryptoError> {
        let tx = Nonce::from_short_address(
            config.short_addr,
            config.initial_frame_counter,
            config.security_level,
        );
        let rx = Nonce::from_short_address(0, 0, config.security_level);

        let mut link = Self::secure_init(engine, &config.key, &rx.to_bytes(), &tx.to_bytes())?;
        link.mic = config.mic;
        link.policy = config.counter_policy;
        Ok(link)
    }

    /// Load a new key. Both nonces are kept.
    pub fn set_key(&mut self, key: &AesKey) -> Result<(), CryptoError> {
        self.engine.load_key(key)
    }

    pub fn set_counter_policy(&mut self, policy: CounterPolicy) {
        self.policy = policy;
    }

    pub fn counter_policy(&self) -> CounterPolicy {
        self.policy
    }

    /// MIC length used by [`send_frame`](Self::send_frame) and
    /// [`receive_frame`](Self::receive_frame).
    pub fn set_mic(&mut self, mic: MicLength) {
        self.mic = mic;
    }

    pub fn mic(&self) -> MicLength {
        self.mic
    }

    pub fn nonce_tx(&self) -> &Nonce {
        &self.nonce_tx
    }

    pub fn nonce_rx(&self) -> &Nonce {
        &self.nonce_rx
    }

    pub fn tx_frame_counter(&self) -> u32 {
        self.nonce_tx.frame_counter()
    }

    /// Short address carried in the transmit nonce.
    pub fn short_addr(&self) -> u16 {
        let source = self.nonce_tx.source();
        u16::from_be_bytes([source[6], source[7]])
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn free(self) -> E {
        self.engine
    }

    /// Advance the transmit frame counter.
    pub fn inc_nonce_tx(&mut self) -> Result<u32, CryptoError> {
        let counter = self.nonce_tx.increment().map_err(|e| {
            warn!("transmit frame counter exhausted");
            e
        })?;
        self.tx_nonce_used = false;
        trace!("tx frame counter now {}", counter);
        Ok(counter)
    }

    /// Make sure the transmit nonce has not secured a frame yet, as far as the policy cares.
    fn claim_tx_nonce(&mut self) -> Result<(), CryptoError> {
        if !self.tx_nonce_used {
            return Ok(());
        }

        match self.policy {
            CounterPolicy::Manual => Ok(()),
            // Covers a frame that was sealed but never left, and a switch from `Manual`.
            CounterPolicy::Advance => self.inc_nonce_tx().map(|_| ()),
            CounterPolicy::RejectReuse => {
                debug!("refusing to reuse tx frame counter {}", self.tx_frame_counter());
                Err(CryptoError::NonceReuse)
            }
        }
    }

    /// Secure `packet` and write it to the TX FIFO.
    ///
    /// `packet[0]` is the length byte, followed by `f` header bytes and `c` payload bytes.
    /// The FIFO receives the length byte, the header in clear, the encrypted payload and the
    /// MIC. Returns the number of bytes written, `1 + f + c + lm`.
    pub fn write_tx_buf_secure<T: TxFifo + ?Sized>(
        &mut self,
        tx: &mut T,
        packet: &[u8],
        c: usize,
        f: usize,
        mic: MicLength,
    ) -> Result<usize, LinkError> {
        if packet.len() < 1 + f + c {
            return Err(CryptoError::InvalidInput.into());
        }
        if 1 + f + c + mic.byte_len() > FIFO_LEN {
            return Err(RadioError::PayloadTooBig.into());
        }
        self.claim_tx_nonce()?;

        let adata = &packet[1..1 + f];
        let sealed = self
            .ccm
            .seal(&mut self.engine, &self.nonce_tx, adata, &packet[1 + f..1 + f + c], mic)?;
        self.tx_nonce_used = true;

        tx.write_tx_buf(&packet[..1])?;
        tx.append_tx_buf(adata)?;
        tx.append_tx_buf(sealed.payload)?;
        tx.append_tx_buf(sealed.mic)?;
        let written = 1 + f + sealed.len();

        trace!(
            "secured frame: {} bytes, counter {}",
            written,
            self.nonce_tx.frame_counter()
        );

        if self.policy == CounterPolicy::Advance {
            // At `u32::MAX` the nonce stays marked as used and the next frame is refused.
            self.inc_nonce_tx().ok();
        }

        Ok(written)
    }

    /// Read `length` bytes from the RX FIFO into `data` and verify them.
    ///
    /// `data` holds the frame without its length byte: `f` header bytes, `c` encrypted payload
    /// bytes and the MIC. On success the payload is decrypted in place. On a MIC mismatch it
    /// is zeroed.
    pub fn read_rx_buf_secure<R: RxFifo + ?Sized>(
        &mut self,
        rx: &mut R,
        data: &mut [u8],
        length: usize,
        c: usize,
        f: usize,
        mic: MicLength,
    ) -> Result<(), LinkError> {
        if data.len() < length || f + c + mic.byte_len() > length {
            return Err(CryptoError::InvalidInput.into());
        }

        rx.read_rx_buf(&mut data[..length])?;
        self.open_frame(&mut data[..length], c, f, mic)
    }

    /// Verify and decrypt a frame that is already in memory.
    pub fn open_frame(
        &mut self,
        frame: &mut [u8],
        c: usize,
        f: usize,
        mic: MicLength,
    ) -> Result<(), LinkError> {
        let lm = mic.byte_len();
        if f + c + lm > frame.len() {
            return Err(CryptoError::InvalidInput.into());
        }

        let header = MacHeader::parse(&frame[..f])?;
        self.nonce_rx.set_short_source(header.src_addr);
        self.nonce_rx.set_frame_counter(header.frame_counter);

        let (adata, rest) = frame.split_at_mut(f);
        let (payload, rest) = rest.split_at_mut(c);
        let mic_field = &rest[..lm];

        let result = self
            .ccm
            .open(&mut self.engine, &self.nonce_rx, adata, payload, mic_field, mic);
        if result == Err(CryptoError::AuthenticationFailed) {
            debug!(
                "dropping frame from {:#06x}, counter {}: MIC mismatch",
                header.src_addr, header.frame_counter
            );
        }

        result.map_err(LinkError::from)
    }

    /// Build a secured frame around `payload` and write it to the TX FIFO.
    ///
    /// The header's frame counter, source address and security fields are taken from the
    /// transmit nonce so the receiver can rebuild it.
    pub fn send_frame<T: TxFifo + ?Sized>(
        &mut self,
        tx: &mut T,
        header: &MacHeader,
        payload: &[u8],
    ) -> Result<usize, LinkError> {
        self.claim_tx_nonce()?;

        let mut header = *header;
        header.frame_control |= FCF_SECURITY_ENABLED;
        header.src_addr = self.short_addr();
        header.security_control = self.nonce_tx.security_level();
        header.frame_counter = self.nonce_tx.frame_counter();

        let c = payload.len();
        let lm = self.mic.byte_len();
        let frame_len = SECURED_HEADER_LEN + c + lm + CHECKSUM_LEN;
        if frame_len > MAX_PACKET_LEN || SECURED_HEADER_LEN + c + lm > MAX_FRAME_LEN {
            return Err(RadioError::PayloadTooBig.into());
        }

        let mut packet = [0u8; 1 + MAX_FRAME_LEN];
        packet[0] = frame_len as u8;
        let f = header.write(&mut packet[1..])?;
        packet[1 + f..1 + f + c].copy_from_slice(payload);

        let mic = self.mic;
        self.write_tx_buf_secure(tx, &packet[..1 + f + c], c, f, mic)
    }

    /// Read one secured frame from the RX FIFO, length byte first.
    ///
    /// `data` receives the frame without its length byte. The decrypted payload starts at
    /// [`SECURED_HEADER_LEN`] and its length is returned. The two FCS bytes stay in the FIFO.
    pub fn receive_frame<R: RxFifo + ?Sized>(
        &mut self,
        rx: &mut R,
        data: &mut [u8],
    ) -> Result<usize, LinkError> {
        let mut len = [0u8; 1];
        rx.read_rx_buf(&mut len)?;
        let len = len[0] as usize;

        let lm = self.mic.byte_len();
        if len > MAX_PACKET_LEN || len < SECURED_HEADER_LEN + lm + CHECKSUM_LEN {
            return Err(RadioError::IncorrectFrame.into());
        }

        let length = len - CHECKSUM_LEN;
        if data.len() < length {
            return Err(RadioError::PayloadTooBig.into());
        }

        let c = length - SECURED_HEADER_LEN - lm;
        let mic = self.mic;
        self.read_rx_buf_secure(rx, data, length, c, SECURED_HEADER_LEN, mic)?;
        Ok(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::aes_engine::soft::SoftAes;
    use crate::radio::FrameBuffer;

    fn link(addr: u16, policy: CounterPolicy) -> SecureLink<SoftAes> {
        let config = SecurityConfig {
            short_addr: addr,
            counter_policy: policy,
            ..SecurityConfig::demo()
        };
        SecureLink::new(SoftAes::new(), &config).unwrap()
    }

    #[test]
    fn config_builds_tx_nonce() {
        let config = SecurityConfig {
            short_addr: 0x2520,
            initial_frame_counter: 7,
            ..SecurityConfig::demo()
        };
        let link = SecureLink::new(SoftAes::new(), &config).unwrap();
        assert_eq!(link.short_addr(), 0x2520);
        assert_eq!(link.tx_frame_counter(), 7);
        assert_eq!(link.nonce_tx().security_level(), SECURITY_LEVEL_ENC_MIC_64);
        assert_eq!(link.mic(), MicLength::Mic64);
    }

    #[test]
    fn written_length() {
        let mut link = link(0x2520, CounterPolicy::Manual);
        let mut fifo = FrameBuffer::new();

        let mut packet = [0u8; 16];
        packet[0] = 9 + 6 + 8 + 2;
        packet[10..16].copy_from_slice(b"secret");

        // A 9-byte header cannot be parsed on receive, but sending does not care.
        let written = link
            .write_tx_buf_secure(&mut fifo, &packet, 6, 9, MicLength::Mic64)
            .unwrap();
        assert_eq!(written, 24);
        assert_eq!(fifo.len(), 24);
        assert_eq!(fifo.as_slice()[..10], packet[..10]);
        assert_ne!(fifo.as_slice()[10..16], *b"secret");
    }

    #[test]
    fn short_packet_is_rejected() {
        let mut link = link(1, CounterPolicy::Manual);
        let mut fifo = FrameBuffer::new();
        assert_eq!(
            link.write_tx_buf_secure(&mut fifo, &[0u8; 10], 6, 9, MicLength::Mic64),
            Err(LinkError::Crypto(CryptoError::InvalidInput))
        );
        assert!(fifo.is_empty());
    }

    #[test]
    fn advance_policy_bumps_counter() {
        let mut link = link(1, CounterPolicy::Advance);
        let mut fifo = FrameBuffer::new();
        link.send_frame(&mut fifo, &MacHeader::default(), b"a").unwrap();
        link.send_frame(&mut fifo, &MacHeader::default(), b"b").unwrap();
        assert_eq!(link.tx_frame_counter(), 2);
    }

    #[test]
    fn advance_policy_stops_at_last_counter() {
        let config = SecurityConfig {
            counter_policy: CounterPolicy::Advance,
            initial_frame_counter: u32::MAX,
            ..SecurityConfig::demo()
        };
        let mut link = SecureLink::new(SoftAes::new(), &config).unwrap();
        let mut fifo = FrameBuffer::new();
        link.send_frame(&mut fifo, &MacHeader::default(), b"a").unwrap();
        assert_eq!(
            link.send_frame(&mut fifo, &MacHeader::default(), b"b"),
            Err(LinkError::Crypto(CryptoError::CounterExhausted))
        );
    }

    #[test]
    fn frame_too_big_for_fifo_leaves_link_usable() {
        let mut link = link(1, CounterPolicy::Advance);
        let mut fifo = FrameBuffer::new();

        // 14 + 106 + 8 fits the CCM* scratch, but not the FIFO once the length byte is added.
        let packet = [0u8; 121];
        assert_eq!(
            link.write_tx_buf_secure(&mut fifo, &packet, 106, 14, MicLength::Mic64),
            Err(LinkError::Radio(RadioError::PayloadTooBig))
        );
        assert!(fifo.is_empty());
        assert_eq!(link.tx_frame_counter(), 0);

        link.send_frame(&mut fifo, &MacHeader::default(), b"on").unwrap();
        assert_eq!(link.tx_frame_counter(), 1);
    }

    #[test]
    fn advance_after_manual_send_moves_on() {
        let mut link = link(1, CounterPolicy::Manual);
        let mut fifo = FrameBuffer::new();
        link.send_frame(&mut fifo, &MacHeader::default(), b"a").unwrap();
        assert_eq!(link.tx_frame_counter(), 0);

        link.set_counter_policy(CounterPolicy::Advance);
        link.send_frame(&mut fifo, &MacHeader::default(), b"b").unwrap();
        assert_eq!(MacHeader::parse(&fifo.as_slice()[1..]).unwrap().frame_counter, 1);
        assert_eq!(link.tx_frame_counter(), 2);
    }

    #[test]
    fn advance_recovers_from_fifo_error() {
        struct FullFifo;

        impl TxFifo for FullFifo {
            fn write_tx_buf(&mut self, _data: &[u8]) -> Result<(), RadioError> {
                Ok(())
            }

            fn append_tx_buf(&mut self, _data: &[u8]) -> Result<(), RadioError> {
                Err(RadioError::PayloadTooBig)
            }
        }

        let mut link = link(1, CounterPolicy::Advance);
        assert_eq!(
            link.send_frame(&mut FullFifo, &MacHeader::default(), b"a"),
            Err(LinkError::Radio(RadioError::PayloadTooBig))
        );

        let mut fifo = FrameBuffer::new();
        link.send_frame(&mut fifo, &MacHeader::default(), b"b").unwrap();
        assert_eq!(MacHeader::parse(&fifo.as_slice()[1..]).unwrap().frame_counter, 1);
    }

    #[test]
    fn demo_config_uses_demo_key() {
        let config = SecurityConfig::demo();
        assert_eq!(config.key, DEMO_KEY);
        assert_eq!(SecurityConfig::new(AesKey::new([7; 16])).key, AesKey::new([7; 16]));
        assert_eq!(config.mic, MicLength::Mic64);
        assert_eq!(config.counter_policy, CounterPolicy::Manual);
    }

    #[test]
    fn reject_reuse_until_incremented() {
        let mut link = link(1, CounterPolicy::RejectReuse);
        let mut fifo = FrameBuffer::new();
        link.send_frame(&mut fifo, &MacHeader::default(), b"a").unwrap();
        assert_eq!(
            link.send_frame(&mut fifo, &MacHeader::default(), b"b"),
            Err(LinkError::Crypto(CryptoError::NonceReuse))
        );
        link.inc_nonce_tx().unwrap();
        link.send_frame(&mut fifo, &MacHeader::default(), b"b").unwrap();
    }

    #[test]
    fn oversized_payload() {
        let mut link = link(1, CounterPolicy::Manual);
        let mut fifo = FrameBuffer::new();
        let payload = [0u8; 104];
        assert_eq!(
            link.send_frame(&mut fifo, &MacHeader::default(), &payload),
            Err(LinkError::Radio(RadioError::PayloadTooBig))
        );
        link.send_frame(&mut fifo, &MacHeader::default(), &payload[..103])
            .unwrap();
    }

    #[test]
    fn receive_rejects_bad_length_byte() {
        let mut link = link(1, CounterPolicy::Manual);
        let mut data = [0u8; 128];

        let mut fifo = FrameBuffer::from_bytes(&[10, 0, 0]).unwrap();
        assert_eq!(
            link.receive_frame(&mut fifo, &mut data),
            Err(LinkError::Radio(RadioError::IncorrectFrame))
        );

        let mut fifo = FrameBuffer::from_bytes(&[0x80]).unwrap();
        assert_eq!(
            link.receive_frame(&mut fifo, &mut data),
            Err(LinkError::Radio(RadioError::IncorrectFrame))
        );
    }

    #[test]
    fn loopback() {
        let mut tx = link(0x0001, CounterPolicy::Advance);
        let mut rx = link(0x0002, CounterPolicy::Manual);
        let mut fifo = FrameBuffer::new();

        let header = MacHeader {
            dest_addr: 0x0002,
            ..MacHeader::default()
        };
        tx.send_frame(&mut fifo, &header, b"toggle").unwrap();

        let mut data = [0u8; 128];
        let c = rx.receive_frame(&mut fifo, &mut data).unwrap();
        assert_eq!(&data[SECURED_HEADER_LEN..SECURED_HEADER_LEN + c], b"toggle");
        assert_eq!(rx.nonce_rx().frame_counter(), 0);

        let received = MacHeader::parse(&data).unwrap();
        assert_eq!(received.src_addr, 0x0001);
        assert_eq!(received.dest_addr, 0x0002);
    }
}
