use async_trait::async_trait;

use super::queue::{LoopMode, Track};

/// Mensajes que el loop del reproductor publica en el canal de texto de la guild
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    NowPlaying { track: Track, loop_mode: LoopMode },
    PlaybackFailed { title: String, reason: String },
    /// Error inesperado dentro de un ciclo; el loop sigue vivo
    LoopError { reason: String },
}

/// Destino de texto de una guild. Envío sin confirmación: los fallos de envío
/// se registran en el log y no afectan al reproductor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}
