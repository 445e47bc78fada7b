use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{fmt, sync::Arc};

use super::error::PlayerResult;
use crate::sources::StreamSource;

/// Cómo terminó una reproducción
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Finished,
    /// Detenida con `stop` (skip o stop)
    Stopped,
    Errored(String),
}

type CompletionFn = Box<dyn FnOnce(PlaybackOutcome) + Send + 'static>;

/// Callback de fin de reproducción que se ejecuta exactamente una vez.
///
/// El sink puede clonarlo y reportar desde varios eventos (fin, error); solo
/// el primero tiene efecto.
#[derive(Clone)]
pub struct PlaybackCompletion {
    inner: Arc<Mutex<Option<CompletionFn>>>,
}

impl PlaybackCompletion {
    pub fn new(on_complete: impl FnOnce(PlaybackOutcome) + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(Box::new(on_complete)))),
        }
    }

    /// Retorna `true` si esta llamada fue la que ejecutó el callback
    pub fn complete(&self, outcome: PlaybackOutcome) -> bool {
        let callback = self.inner.lock().take();
        match callback {
            Some(callback) => {
                callback(outcome);
                true
            }
            None => false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.inner.lock().is_none()
    }
}

impl fmt::Debug for PlaybackCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackCompletion")
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Conexión activa a un canal de voz.
///
/// Es propiedad exclusiva de un [`GuildPlayer`](super::player::GuildPlayer);
/// nadie más llama a `play`/`pause`/`stop` sobre ella.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Reproduce el origen. `completion` debe dispararse una vez al terminar,
    /// con error o al ser detenido.
    async fn play(&self, source: StreamSource, completion: PlaybackCompletion) -> PlayerResult<()>;

    async fn pause(&self) -> PlayerResult<()>;

    async fn resume(&self) -> PlayerResult<()>;

    /// Detiene el stream actual; dispara la completion con `Stopped`
    async fn stop(&self) -> PlayerResult<()>;

    async fn disconnect(&self) -> PlayerResult<()>;

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;

    async fn is_connected(&self) -> bool;
}

/// Fábrica de conexiones de voz
#[async_trait]
pub trait VoiceSink: Send + Sync {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> PlayerResult<Arc<dyn VoiceConnection>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_completion_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let completion = {
            let calls = calls.clone();
            PlaybackCompletion::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        let clone = completion.clone();
        assert!(completion.complete(PlaybackOutcome::Finished));
        assert!(!clone.complete(PlaybackOutcome::Errored("tarde".into())));
        assert!(clone.is_completed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
