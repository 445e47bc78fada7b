//! # Open Jukebox
//!
//! Bot de música para Discord con una cola y un loop de reproducción
//! independientes por servidor.

pub mod audio;
pub mod bot;
pub mod config;
pub mod sources;
pub mod ui;
