//! Dobles de prueba compartidos por los tests del reproductor y del registro

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::sync::Semaphore;

use super::{
    error::{PlayerError, PlayerResult},
    notifier::{Notification, Notifier},
    player::PlayerSettings,
    voice::{PlaybackCompletion, PlaybackOutcome, VoiceConnection, VoiceSink},
};
use crate::sources::{MediaResolver, ResolveError, SourceLabel, StreamSource, TrackCandidate};

pub(crate) fn test_settings() -> PlayerSettings {
    PlayerSettings {
        max_queue_size: 100,
        idle_poll_interval: Duration::from_millis(10),
        error_backoff: Duration::from_millis(10),
        resolve_timeout: Duration::from_secs(1),
    }
}

/// Espera hasta que la condición se cumpla (máximo 2 segundos)
pub(crate) async fn eventually(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "la condición nunca se cumplió");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Da tiempo al loop para hacer algo que no debería hacer
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Conexión de voz en memoria. Registra los locators reproducidos.
#[derive(Default)]
pub(crate) struct FakeConnection {
    auto_finish: bool,
    /// `stop` no dispara la completion; queda pendiente hasta `deliver_late`
    lagging_stop: bool,
    late: Mutex<Option<PlaybackCompletion>>,
    played: Mutex<Vec<String>>,
    active: Mutex<Option<PlaybackCompletion>>,
    fail_next: Mutex<Option<String>>,
    paused: AtomicBool,
    connected: AtomicBool,
}

impl FakeConnection {
    /// Cada reproducción termina sola enseguida
    pub(crate) fn auto_finish() -> Arc<Self> {
        Arc::new(Self {
            auto_finish: true,
            connected: AtomicBool::new(true),
            ..Default::default()
        })
    }

    /// Las reproducciones terminan solo con [`FakeConnection::finish`]
    pub(crate) fn manual() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(true),
            ..Default::default()
        })
    }

    /// Como [`FakeConnection::manual`], pero el evento de fin de un `stop`
    /// llega recién con [`FakeConnection::deliver_late`]
    pub(crate) fn lagging() -> Arc<Self> {
        Arc::new(Self {
            lagging_stop: true,
            connected: AtomicBool::new(true),
            ..Default::default()
        })
    }

    pub(crate) fn deliver_late(&self) {
        let late = self.late.lock().take();
        if let Some(completion) = late {
            completion.complete(PlaybackOutcome::Stopped);
        }
    }

    pub(crate) fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }

    pub(crate) fn fail_next_play(&self, reason: &str) {
        *self.fail_next.lock() = Some(reason.to_string());
    }

    pub(crate) fn finish(&self) {
        let active = self.active.lock().take();
        if let Some(completion) = active {
            completion.complete(PlaybackOutcome::Finished);
        }
    }

    pub(crate) fn is_connected_now(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn play(&self, source: StreamSource, completion: PlaybackCompletion) -> PlayerResult<()> {
        if !self.is_connected_now() {
            return Err(PlayerError::Connection("desconectado".into()));
        }
        if let Some(reason) = self.fail_next.lock().take() {
            return Err(PlayerError::Playback(reason));
        }

        let locator = match source {
            StreamSource::Remote(url) => url,
            StreamSource::LocalFile(path) => path.display().to_string(),
        };
        self.played.lock().push(locator);
        self.paused.store(false, Ordering::SeqCst);

        if self.auto_finish {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                completion.complete(PlaybackOutcome::Finished);
            });
        } else {
            *self.active.lock() = Some(completion);
        }
        Ok(())
    }

    async fn pause(&self) -> PlayerResult<()> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> PlayerResult<()> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> PlayerResult<()> {
        self.paused.store(false, Ordering::SeqCst);
        let active = self.active.lock().take();
        match active {
            Some(completion) if self.lagging_stop => {
                *self.late.lock() = Some(completion);
                Ok(())
            }
            Some(completion) => {
                completion.complete(PlaybackOutcome::Stopped);
                Ok(())
            }
            None => Err(PlayerError::Playback("nada que detener".into())),
        }
    }

    async fn disconnect(&self) -> PlayerResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        self.active.lock().is_some() && !self.paused.load(Ordering::SeqCst)
    }

    async fn is_paused(&self) -> bool {
        self.active.lock().is_some() && self.paused.load(Ordering::SeqCst)
    }

    async fn is_connected(&self) -> bool {
        self.is_connected_now()
    }
}

pub(crate) struct FakeSink {
    connection: Arc<FakeConnection>,
    pub(crate) connects: AtomicUsize,
}

impl FakeSink {
    pub(crate) fn new(connection: Arc<FakeConnection>) -> Self {
        Self {
            connection,
            connects: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VoiceSink for FakeSink {
    async fn connect(&self, _guild_id: GuildId, _channel_id: ChannelId) -> PlayerResult<Arc<dyn VoiceConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connection.connected.store(true, Ordering::SeqCst);
        Ok(self.connection.clone())
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn now_playing_titles(&self) -> Vec<String> {
        self.notifications
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::NowPlaying { track, .. } => Some(track.title.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn failed_titles(&self) -> Vec<String> {
        self.notifications
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::PlaybackFailed { title, .. } => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn loop_errors(&self) -> usize {
        self.notifications
            .lock()
            .iter()
            .filter(|n| matches!(n, Notification::LoopError { .. }))
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

/// Resolver que devuelve la consulta como locator. Un mock de mockall no
/// sirve aquí: su expectativa queda envenenada si el closure entra en pánico.
pub(crate) struct ScriptedResolver {
    panic_on: Option<String>,
}

impl ScriptedResolver {
    pub(crate) fn ok() -> Arc<dyn MediaResolver> {
        Arc::new(Self { panic_on: None })
    }

    pub(crate) fn panicking_on(query: &str) -> Arc<dyn MediaResolver> {
        Arc::new(Self {
            panic_on: Some(query.to_string()),
        })
    }
}

#[async_trait]
impl MediaResolver for ScriptedResolver {
    async fn resolve(&self, query: &str) -> Result<Vec<TrackCandidate>, ResolveError> {
        if self.panic_on.as_deref() == Some(query) {
            panic!("resolver roto para {}", query);
        }
        Ok(vec![TrackCandidate::new(query, query, SourceLabel::Search).with_title(Some(query.to_string()))])
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Resolver que retiene una consulta hasta que el test la libera
pub(crate) struct GatedResolver {
    gated: String,
    gate: Semaphore,
    waiting: AtomicBool,
}

impl GatedResolver {
    pub(crate) fn new(gated: &str) -> Arc<Self> {
        Arc::new(Self {
            gated: gated.to_string(),
            gate: Semaphore::new(0),
            waiting: AtomicBool::new(false),
        })
    }

    pub(crate) fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    pub(crate) fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl MediaResolver for GatedResolver {
    async fn resolve(&self, query: &str) -> Result<Vec<TrackCandidate>, ResolveError> {
        if query == self.gated {
            self.waiting.store(true, Ordering::SeqCst);
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| ResolveError::Extractor(e.to_string()))?;
            permit.forget();
            self.waiting.store(false, Ordering::SeqCst);
        }
        Ok(vec![TrackCandidate::new(query, query, SourceLabel::Search).with_title(Some(query.to_string()))])
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}
