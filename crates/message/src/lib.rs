//! Cross-domain messages sent from L2.
//!
//! This crate provides:
//! - The message type and its canonical encoding (the `relayMessage` calldata
//!   the L2 messenger emits)
//! - Message hash and L2 message passer storage slot derivation
//! - Discovery of `SentMessage` events by transaction or by block range

pub mod encode;
pub mod finder;
pub mod types;

pub use encode::{decode, encode, message_hash, storage_slot};
pub use finder::{ChainMessageSource, MessageSource};
pub use types::{CrossChainMessage, MessageError, SentMessage};
