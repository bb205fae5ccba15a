use cc2530_rf_security::crypto::aes_engine::emulator::EncEmulator;
use cc2530_rf_security::crypto::aes_engine::enc::Cc2530Aes;
use cc2530_rf_security::crypto::aes_engine::soft::SoftAes;
use cc2530_rf_security::crypto::{AesEngine, AesKey, CcmContext, CryptoError, MicLength, Nonce};
use embedded_hal::delay::DelayNs;

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

fn hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

fn rfc_key() -> AesKey {
    AesKey::from_slice(&hex("c0c1c2c3c4c5c6c7c8c9cacbcccdcecf")).unwrap()
}

fn rfc_nonce() -> Nonce {
    // 00000003020100a0 | a1a2a3a4 | a5
    Nonce::new([0x00, 0x00, 0x00, 0x03, 0x02, 0x01, 0x00, 0xa0], 0xa1a2_a3a4, 0xa5)
}

fn hardware() -> Cc2530Aes<EncEmulator, NoDelay> {
    let mut aes = Cc2530Aes::new(EncEmulator::new(), NoDelay);
    aes.load_key(&rfc_key()).unwrap();
    aes
}

fn check_rfc3610_packet_1<E: AesEngine>(engine: &mut E) {
    let adata = hex("0001020304050607");
    let payload = hex("08090a0b0c0d0e0f101112131415161718191a1b1c1d1e");
    let expected = hex("588c979a61c663d2f066d0c2c0f989806d5f6b61dac38417e8d12cfdf926e0");

    let mut ctx = CcmContext::new();
    let sealed = ctx
        .seal(engine, &rfc_nonce(), &adata, &payload, MicLength::Mic64)
        .unwrap();
    assert_eq!(sealed.payload, &expected[..23]);
    assert_eq!(sealed.mic, &expected[23..]);

    let mut received = expected[..23].to_vec();
    ctx.open(
        engine,
        &rfc_nonce(),
        &adata,
        &mut received,
        &expected[23..],
        MicLength::Mic64,
    )
    .unwrap();
    assert_eq!(received, payload);
}

#[test]
fn rfc3610_packet_1_software() {
    check_rfc3610_packet_1(&mut SoftAes::with_key(&rfc_key()));
}

#[test]
fn rfc3610_packet_1_coprocessor() {
    check_rfc3610_packet_1(&mut hardware());
}

#[test]
fn zero_key_full_mic() {
    let mut aes = SoftAes::with_key(&AesKey::new([0; 16]));
    let mut ctx = CcmContext::new();
    let sealed = ctx
        .seal(&mut aes, &Nonce::default(), &[], &[0; 16], MicLength::Mic128)
        .unwrap();
    assert_eq!(sealed.payload, hex("d578f20d00958c6c506e36769eadce6e"));
    assert_eq!(sealed.mic, hex("b64ab32742f111043eab589a8007b90f"));
}

#[test]
fn coprocessor_matches_software() {
    let key = rfc_key();
    let mut soft = SoftAes::with_key(&key);
    let mut hard = hardware();
    let nonce = Nonce::from_short_address(0x2520, 42, 0x06);

    let frame: Vec<u8> = (0..128u8).collect();
    for f in [0usize, 1, 9, 14, 16, 31] {
        for c in [0usize, 1, 4, 15, 16, 17, 33, 60] {
            for mic in [MicLength::Mic32, MicLength::Mic64, MicLength::Mic128] {
                let mut a = CcmContext::new();
                let mut b = CcmContext::new();
                let adata = &frame[..f];
                let payload = &frame[f..f + c];
                let x = a.seal(&mut soft, &nonce, adata, payload, mic).unwrap();
                let y = b.seal(&mut hard, &nonce, adata, payload, mic).unwrap();
                assert_eq!(x, y, "f={} c={} mic={:?}", f, c, mic);
            }
        }
    }
}

#[test]
fn round_trip_every_size() {
    let mut aes = SoftAes::with_key(&rfc_key());
    let nonce = Nonce::from_short_address(0x0001, 7, 0x06);
    let frame: Vec<u8> = (0..128u8).map(|b| b.wrapping_mul(31)).collect();

    for f in (0..=109).step_by(6) {
        for c in 0..=109 - f {
            for mic in [MicLength::Mic32, MicLength::Mic64, MicLength::Mic128] {
                let mut ctx = CcmContext::new();
                let adata = &frame[..f];
                let payload = &frame[f..f + c];

                let sealed = ctx.seal(&mut aes, &nonce, adata, payload, mic).unwrap();
                let mut body = sealed.payload.to_vec();
                let tag = sealed.mic.to_vec();
                assert_eq!(tag.len(), mic.byte_len());

                ctx.open(&mut aes, &nonce, adata, &mut body, &tag, mic)
                    .unwrap();
                assert_eq!(body, payload, "f={} c={}", f, c);
            }
        }
    }
}

#[test]
fn frame_limit() {
    let mut aes = SoftAes::with_key(&rfc_key());
    let mut ctx = CcmContext::new();
    let nonce = Nonce::default();
    let big = [0u8; 128];

    assert!(ctx
        .seal(&mut aes, &nonce, &big[..14], &big[..106], MicLength::Mic64)
        .is_ok());
    assert_eq!(
        ctx.seal(&mut aes, &nonce, &big[..14], &big[..107], MicLength::Mic64),
        Err(CryptoError::InvalidInput)
    );
}

#[test]
fn wrong_key_fails() {
    let nonce = rfc_nonce();
    let mut ctx = CcmContext::new();
    let mut sender = SoftAes::with_key(&rfc_key());
    let sealed = ctx
        .seal(&mut sender, &nonce, b"hdr", b"lights on", MicLength::Mic32)
        .unwrap();
    let mut body = sealed.payload.to_vec();
    let tag = sealed.mic.to_vec();

    let mut receiver = SoftAes::with_key(&AesKey::new([0x11; 16]));
    assert_eq!(
        ctx.open(&mut receiver, &nonce, b"hdr", &mut body, &tag, MicLength::Mic32),
        Err(CryptoError::AuthenticationFailed)
    );
    assert!(body.iter().all(|&b| b == 0));
}
