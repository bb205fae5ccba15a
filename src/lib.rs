//! CCM* link security for the CC2530 BasicRF radio stack.
//!
//! The crate is split the same way the radio firmware is:
//!
//! - [`crypto::aes_engine`] drives a single-block AES-128 primitive in one of the
//!   chaining modes of the CC2530 AES coprocessor. [`crypto::aes_engine::soft::SoftAes`]
//!   computes everything in software, [`crypto::aes_engine::enc::Cc2530Aes`] talks to the
//!   `ENCCS`/`ENCDI`/`ENCDO` registers.
//! - [`crypto::aes_engine::ccm`] builds the CBC-MAC input, computes and encrypts the MIC and
//!   encrypts the payload in counter mode.
//! - [`crypto::nonce`] keeps the per-direction nonces and the transmit frame counter.
//! - [`radio`] ties it together at the frame level: [`radio::security::SecureLink`] writes
//!   secured frames to a TX FIFO and verifies frames read from an RX FIFO.

#![no_std]

pub mod crypto;
pub mod radio;
