//! # UI Module
//!
//! Embeds de Discord y el notificador que los publica en el canal de texto.

pub mod embeds;
pub mod notifier;

pub use notifier::ChannelNotifier;
