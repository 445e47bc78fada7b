use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{File, HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, info, warn};

use super::{
    error::{PlayerError, PlayerResult},
    voice::{PlaybackCompletion, PlaybackOutcome, VoiceConnection, VoiceSink},
};
use crate::sources::StreamSource;

/// Sink de voz sobre el manager de songbird
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    volume: f32,
}

impl SongbirdSink {
    pub fn new(manager: Arc<Songbird>, volume: f32) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
            volume: volume.clamp(0.0, 2.0),
        }
    }
}

#[async_trait]
impl VoiceSink for SongbirdSink {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> PlayerResult<Arc<dyn VoiceConnection>> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| PlayerError::Connection(e.to_string()))?;

        info!("🔊 Conectado al canal de voz en guild {}", guild_id);

        Ok(Arc::new(SongbirdConnection {
            guild_id,
            manager: self.manager.clone(),
            call,
            http: self.http.clone(),
            volume: self.volume,
            current: Mutex::new(None),
            connected: AtomicBool::new(true),
        }))
    }
}

/// Conexión activa de songbird. Solo guarda el handle de la pista actual.
pub struct SongbirdConnection {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<tokio::sync::Mutex<Call>>,
    http: reqwest::Client,
    volume: f32,
    current: Mutex<Option<TrackHandle>>,
    connected: AtomicBool,
}

impl SongbirdConnection {
    fn current(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }

    fn input_for(&self, source: StreamSource) -> Input {
        match source {
            StreamSource::Remote(url) => HttpRequest::new(self.http.clone(), url).into(),
            StreamSource::LocalFile(path) => File::new(path).into(),
        }
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let track = self.current()?;
        track.get_info().await.ok().map(|info| info.playing)
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn play(&self, source: StreamSource, completion: PlaybackCompletion) -> PlayerResult<()> {
        let input = self.input_for(source);

        let track = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        if let Err(e) = track.set_volume(self.volume) {
            debug!("No se pudo ajustar el volumen: {}", e);
        }

        let handlers = track
            .add_event(Event::Track(TrackEvent::End), CompletionHandler(completion.clone()))
            .and_then(|_| track.add_event(Event::Track(TrackEvent::Error), CompletionHandler(completion)));

        if let Err(e) = handlers {
            // Sin eventos nunca sabríamos cuándo termina
            let _ = track.stop();
            return Err(PlayerError::Playback(format!("Error al registrar eventos: {}", e)));
        }

        *self.current.lock() = Some(track);
        Ok(())
    }

    async fn pause(&self) -> PlayerResult<()> {
        let track = self.current().ok_or_else(|| PlayerError::Playback("Sin pista activa".into()))?;
        track.pause().map_err(|e| PlayerError::Playback(e.to_string()))
    }

    async fn resume(&self) -> PlayerResult<()> {
        let track = self.current().ok_or_else(|| PlayerError::Playback("Sin pista activa".into()))?;
        track.play().map_err(|e| PlayerError::Playback(e.to_string()))
    }

    async fn stop(&self) -> PlayerResult<()> {
        let track = self.current.lock().take();
        match track {
            Some(track) => track.stop().map_err(|e| PlayerError::Playback(e.to_string())),
            None => Ok(()),
        }
    }

    async fn disconnect(&self) -> PlayerResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.current.lock().take();

        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| PlayerError::Connection(e.to_string()))?;

        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }

    async fn is_connected(&self) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        self.call.lock().await.current_connection().is_some()
    }
}

/// Reenvía los eventos de fin y error de songbird a la completion
struct CompletionHandler(PlaybackCompletion);

#[async_trait]
impl VoiceEventHandler for CompletionHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let outcome = match ctx {
            EventContext::Track(tracks) => match tracks.first().map(|(state, _)| &state.playing) {
                Some(PlayMode::Errored(e)) => PlaybackOutcome::Errored(format!("{:?}", e)),
                Some(PlayMode::Stop) => PlaybackOutcome::Stopped,
                _ => PlaybackOutcome::Finished,
            },
            _ => PlaybackOutcome::Finished,
        };

        if let PlaybackOutcome::Errored(reason) = &outcome {
            warn!("❌ Error en la pista: {}", reason);
        }

        self.0.complete(outcome);
        Some(Event::Cancel)
    }
}
