use thiserror::Error;

use crate::sources::ResolveError;

/// Condiciones de estado que rechazan un comando de control.
///
/// No son fallos internos: se muestran al usuario tal cual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("No hay nada reproduciéndose")]
    NothingPlaying,
    #[error("La reproducción no está en pausa")]
    NotPaused,
    #[error("El bot no está conectado a un canal de voz")]
    NotConnected,
}

/// Errores del núcleo de reproducción.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// El resolver no devolvió nada utilizable. Se recupera dentro del loop.
    #[error("No se pudo resolver la pista: {0}")]
    Resolution(#[from] ResolveError),

    /// El sink de voz reportó un error al reproducir.
    #[error("Error de reproducción: {0}")]
    Playback(String),

    /// Falló la conexión al canal de voz. Se muestra al comando que la pidió.
    #[error("Error al conectar al canal de voz: {0}")]
    Connection(String),

    #[error(transparent)]
    Precondition(#[from] Precondition),

    #[error("La cola está llena (máximo {0} canciones)")]
    QueueFull(usize),

    /// No se pudo construir el reproductor de la guild.
    #[error("No se pudo iniciar el reproductor: {0}")]
    Runtime(String),
}

impl PlayerError {
    /// Errores que el usuario provocó y que no merecen un log de error.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Precondition(_) | Self::QueueFull(_))
    }
}

pub type PlayerResult<T> = Result<T, PlayerError>;
