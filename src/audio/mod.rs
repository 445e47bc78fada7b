//! # Audio Module
//!
//! Núcleo de reproducción por guild.
//!
//! ## Componentes
//!
//! ### [`queue`] - Cola
//! - Cola FIFO de [`Track`] con modos de repetición `Off`/`Single`/`Queue`
//!
//! ### [`player`] - Reproductor
//! - Un [`GuildPlayer`] por guild, con un único loop secuencial:
//!   siguiente pista → resolver stream → reproducir → esperar fin o skip
//! - Los errores de resolución y de reproducción se notifican y el loop sigue
//!
//! ### [`registry`] - Registro
//! - Mapa guild → reproductor con creación atómica
//!
//! ### [`voice`] / [`songbird_sink`] - Voz
//! - Contrato del transporte de audio y su implementación con songbird
//!
//! ## Ejemplo
//!
//! ```rust,no_run
//! use open_jukebox::audio::{Notifier, PlayerRegistry, PlayerSettings, Track};
//! use open_jukebox::sources::YtDlpResolver;
//! use serenity::all::GuildId;
//! use std::sync::Arc;
//!
//! # async fn example(notifier: Arc<dyn Notifier>, track: Track) -> anyhow::Result<()> {
//! let resolver = Arc::new(YtDlpResolver::new("yt-dlp", 50));
//! let registry = PlayerRegistry::new(resolver, PlayerSettings::default());
//! let guild_id = GuildId::new(123456789);
//!
//! registry.get_or_create(guild_id, notifier)?;
//! registry.enqueue(guild_id, track)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod notifier;
pub mod player;
pub mod queue;
pub mod registry;
pub mod signal;
pub mod songbird_sink;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{PlayerError, PlayerResult, Precondition};
pub use notifier::{Notification, Notifier};
pub use player::{GuildPlayer, PlayerSettings, PlayerState};
pub use queue::{LoopMode, MusicQueue, QueuePage, QueueSnapshot, Track};
pub use registry::PlayerRegistry;
pub use songbird_sink::SongbirdSink;
pub use voice::{PlaybackCompletion, PlaybackOutcome, VoiceConnection, VoiceSink};
