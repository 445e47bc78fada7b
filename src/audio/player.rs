use futures::FutureExt;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    error::{PlayerError, PlayerResult, Precondition},
    notifier::{Notification, Notifier},
    queue::{LoopMode, MusicQueue, QueueSnapshot, Track},
    signal::AdvanceSignal,
    voice::{PlaybackCompletion, PlaybackOutcome, VoiceConnection, VoiceSink},
};
use crate::sources::{MediaResolver, ResolveError, ResolvedStream};

/// Parámetros del reproductor que no dependen de Discord
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub max_queue_size: usize,
    /// Espera máxima con la cola vacía antes de volver a revisarla
    pub idle_poll_interval: Duration,
    /// Pausa tras un error inesperado dentro de un ciclo
    pub error_backoff: Duration,
    pub resolve_timeout: Duration,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            idle_poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(2),
            resolve_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Resolving,
    Playing,
}

/// Resultado de un ciclo del loop, útil para logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    Idle,
    Skipped,
    Played,
}

/// Lo único que toca la completion del sink: el resultado y la señal.
///
/// Cada ciclo crea la suya, así una completion tardía de un ciclo anterior
/// no puede despertar al siguiente.
#[derive(Debug, Default)]
struct Wakeup {
    advance: AdvanceSignal,
    outcome: Mutex<Option<PlaybackOutcome>>,
}

/// Reproductor de una guild.
///
/// Es dueño de su cola, de la pista actual, del modo de repetición y de la
/// conexión de voz. Un único task (ver [`GuildPlayer::spawn`]) drena la cola
/// de forma secuencial durante toda la vida del reproductor.
pub struct GuildPlayer {
    guild_id: GuildId,
    queue: Mutex<MusicQueue>,
    connection: Mutex<Option<Arc<dyn VoiceConnection>>>,
    state: Mutex<PlayerState>,
    wakeup: Mutex<Arc<Wakeup>>,
    /// Se incrementa en cada `stop`; un ciclo de otra generación no reproduce
    generation: AtomicU64,
    queue_changed: Notify,
    resolver: Arc<dyn MediaResolver>,
    notifier: Arc<dyn Notifier>,
    settings: PlayerSettings,
    shutdown: CancellationToken,
}

impl GuildPlayer {
    /// Crea el reproductor y arranca su loop en el runtime actual
    pub fn spawn(
        guild_id: GuildId,
        resolver: Arc<dyn MediaResolver>,
        notifier: Arc<dyn Notifier>,
        settings: PlayerSettings,
    ) -> PlayerResult<Arc<Self>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PlayerError::Runtime(e.to_string()))?;

        let player = Arc::new(Self {
            guild_id,
            queue: Mutex::new(MusicQueue::new(settings.max_queue_size)),
            connection: Mutex::new(None),
            state: Mutex::new(PlayerState::Idle),
            wakeup: Mutex::new(Arc::new(Wakeup::default())),
            generation: AtomicU64::new(0),
            queue_changed: Notify::new(),
            resolver,
            notifier,
            settings,
            shutdown: CancellationToken::new(),
        });

        runtime.spawn(player.clone().run());
        Ok(player)
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn state(&self) -> PlayerState {
        *self.state.lock()
    }

    fn set_state(&self, state: PlayerState) {
        let mut current = self.state.lock();
        if *current != state {
            debug!("🔄 Guild {}: {:?} -> {:?}", self.guild_id, *current, state);
            *current = state;
        }
    }

    // Operaciones de cola

    /// Agrega una pista al final de la cola. Retorna su posición.
    pub fn enqueue(&self, track: Track) -> PlayerResult<usize> {
        let position = self
            .queue
            .lock()
            .push(track)
            .ok_or(PlayerError::QueueFull(self.settings.max_queue_size))?;

        // El loop igual revisa la cola periódicamente; esto solo evita esperar
        self.queue_changed.notify_one();
        Ok(position)
    }

    pub fn peek_queue(&self, limit: usize) -> Vec<Track> {
        self.queue.lock().peek(limit).cloned().collect()
    }

    pub fn snapshot(&self, limit: usize) -> QueueSnapshot {
        self.queue.lock().snapshot(limit)
    }

    /// Pista en reproducción (o en pausa). `None` si el loop está ocioso.
    pub fn now_playing(&self) -> Option<Track> {
        if self.state() != PlayerState::Playing {
            return None;
        }
        self.queue.lock().current().cloned()
    }

    /// Vacía la cola y desactiva la repetición
    pub fn clear(&self) -> usize {
        self.queue.lock().clear()
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.queue.lock().loop_mode()
    }

    pub fn set_loop(&self, mode: LoopMode) {
        self.queue.lock().set_loop_mode(mode);
    }

    // Conexión

    fn connection(&self) -> Option<Arc<dyn VoiceConnection>> {
        self.connection.lock().clone()
    }

    async fn live_connection(&self) -> Option<Arc<dyn VoiceConnection>> {
        let connection = self.connection()?;
        connection.is_connected().await.then_some(connection)
    }

    pub async fn is_connected(&self) -> bool {
        self.live_connection().await.is_some()
    }

    /// Conecta al canal de voz si no hay una conexión viva
    pub async fn connect(&self, sink: &dyn VoiceSink, channel_id: ChannelId) -> PlayerResult<()> {
        if self.is_connected().await {
            return Ok(());
        }

        let connection = sink.connect(self.guild_id, channel_id).await?;
        *self.connection.lock() = Some(connection);
        info!("🔊 Guild {} conectada al canal de voz {}", self.guild_id, channel_id);
        Ok(())
    }

    // Controles

    pub async fn pause(&self) -> PlayerResult<()> {
        let connection = self.connection().ok_or(Precondition::NothingPlaying)?;
        if !connection.is_playing().await {
            return Err(Precondition::NothingPlaying.into());
        }

        connection.pause().await?;
        info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        Ok(())
    }

    pub async fn resume(&self) -> PlayerResult<()> {
        let connection = self.connection().ok_or(Precondition::NotPaused)?;
        if !connection.is_paused().await {
            return Err(Precondition::NotPaused.into());
        }

        connection.resume().await?;
        info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        Ok(())
    }

    /// Abandona la pista actual aunque esté en modo `Single`.
    ///
    /// El avance pasa por la misma completion que un final natural.
    pub async fn skip(&self) -> PlayerResult<Option<Track>> {
        let connection = self.connection().ok_or(Precondition::NothingPlaying)?;
        if !connection.is_playing().await && !connection.is_paused().await {
            return Err(Precondition::NothingPlaying.into());
        }

        let skipped = self.queue.lock().forget_current();
        connection.stop().await?;

        info!(
            "⏭️ Saltada en guild {}: {}",
            self.guild_id,
            skipped.as_ref().map(|t| t.title.as_str()).unwrap_or("Unknown")
        );
        Ok(skipped)
    }

    /// Detiene todo y suelta la conexión. Nunca falla; el loop sigue vivo.
    pub async fn stop(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        let cleared = {
            let mut queue = self.queue.lock();
            queue.forget_current();
            queue.clear()
        };

        let connection = self.connection.lock().take();
        if let Some(connection) = connection {
            if let Err(e) = connection.stop().await {
                debug!("Nada que detener en guild {}: {}", self.guild_id, e);
            }
            if let Err(e) = connection.disconnect().await {
                warn!("⚠️ Error al desconectar guild {}: {}", self.guild_id, e);
            }
        }

        self.wakeup.lock().advance.set();
        info!("⏹️ Reproducción detenida en guild {} ({} en cola)", self.guild_id, cleared);
    }

    /// Cancela el loop. Solo lo usa el registro al eliminar el reproductor.
    pub(crate) fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // Loop

    async fn run(self: Arc<Self>) {
        info!("🎶 Loop de reproducción iniciado para guild {}", self.guild_id);

        loop {
            let cycle = AssertUnwindSafe(self.run_cycle()).catch_unwind();

            let result = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = cycle => result,
            };

            let reason = match result {
                Ok(Ok(outcome)) => {
                    if outcome != CycleOutcome::Idle {
                        debug!("Ciclo terminado en guild {}: {:?}", self.guild_id, outcome);
                    }
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            error!("❌ Error inesperado en el loop de guild {}: {}", self.guild_id, reason);
            // Un ciclo roto cuenta como saltado: `Single` no debe repetirlo
            self.queue.lock().forget_current();
            self.set_state(PlayerState::Idle);
            self.notifier.notify(Notification::LoopError { reason }).await;

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.error_backoff) => {}
            }
        }

        self.set_state(PlayerState::Idle);
        info!("👋 Loop de reproducción terminado para guild {}", self.guild_id);
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) != generation
    }

    async fn run_cycle(&self) -> PlayerResult<CycleOutcome> {
        let generation = self.generation.load(Ordering::Acquire);
        let wakeup = Arc::new(Wakeup::default());
        *self.wakeup.lock() = wakeup.clone();

        let next = self.queue.lock().advance();
        let Some(track) = next else {
            self.set_state(PlayerState::Idle);
            self.idle_wait().await;
            return Ok(CycleOutcome::Idle);
        };

        self.set_state(PlayerState::Resolving);
        let resolved = self.resolve_stream(&track).await;

        if self.is_stale(generation) {
            debug!(
                "🗑️ Guild {}: {} descartada, se detuvo mientras se resolvía",
                self.guild_id, track.title
            );
            self.discard(&track);
            return Ok(CycleOutcome::Skipped);
        }

        let stream = match resolved {
            Ok(stream) => stream,
            Err(e) => {
                warn!("❌ No se pudo resolver {} en guild {}: {}", track.title, self.guild_id, e);
                self.abandon(&track, e.to_string()).await;
                return Ok(CycleOutcome::Skipped);
            }
        };

        let Some(connection) = self.live_connection().await else {
            warn!(
                "🔌 Guild {} sin conexión de voz, se descarta: {}",
                self.guild_id, track.title
            );
            self.queue.lock().forget_current();
            self.set_state(PlayerState::Idle);
            return Ok(CycleOutcome::Skipped);
        };

        let (source, scratch) = stream.into_parts();
        let guild_id = self.guild_id;
        let completion = {
            let wakeup = wakeup.clone();
            PlaybackCompletion::new(move |outcome| {
                debug!("🏁 Reproducción terminada en guild {}: {:?}", guild_id, outcome);
                // Liberar el archivo temporal antes de despertar al loop
                drop(scratch);
                *wakeup.outcome.lock() = Some(outcome);
                wakeup.advance.set();
            })
        };

        match connection.play(source, completion.clone()).await {
            Ok(()) if self.is_stale(generation) => {
                // `stop` llegó entre la revisión y el play: no dejar sonando nada
                if let Err(e) = connection.stop().await {
                    debug!("Nada que detener en guild {}: {}", self.guild_id, e);
                }
                completion.complete(PlaybackOutcome::Stopped);
            }
            Ok(()) => {
                self.set_state(PlayerState::Playing);
                info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, track.title);
                let loop_mode = self.loop_mode();
                self.notifier
                    .notify(Notification::NowPlaying {
                        track: track.clone(),
                        loop_mode,
                    })
                    .await;
            }
            Err(e) => {
                completion.complete(PlaybackOutcome::Errored(e.to_string()));
            }
        }

        wakeup.advance.wait().await;
        self.set_state(PlayerState::Idle);

        let outcome = wakeup.outcome.lock().take();
        if let Some(PlaybackOutcome::Errored(reason)) = outcome {
            warn!("❌ Error de reproducción en guild {}: {}", self.guild_id, reason);
            self.abandon(&track, reason).await;
            return Ok(CycleOutcome::Skipped);
        }

        Ok(CycleOutcome::Played)
    }

    /// Olvida la pista si sigue siendo la actual y vuelve a `Idle`
    fn discard(&self, track: &Track) {
        {
            let mut queue = self.queue.lock();
            if queue.current() == Some(track) {
                queue.forget_current();
            }
        }
        self.set_state(PlayerState::Idle);
    }

    /// Reporta la pista fallida y la olvida para que `Single` no la reintente
    async fn abandon(&self, track: &Track, reason: String) {
        self.discard(track);
        self.notifier
            .notify(Notification::PlaybackFailed {
                title: track.title.clone(),
                reason,
            })
            .await;
    }

    /// Vuelve a resolver justo antes de reproducir: los locators expiran
    async fn resolve_stream(&self, track: &Track) -> Result<ResolvedStream, ResolveError> {
        let timeout = self.settings.resolve_timeout;

        let work = async {
            let candidate = self
                .resolver
                .resolve(&track.source_reference)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| ResolveError::NoResults(track.source_reference.clone()))?;

            self.resolver.materialize(candidate).await
        };

        tokio::time::timeout(timeout, work)
            .await
            .map_err(|_| ResolveError::Timeout(timeout))?
    }

    async fn idle_wait(&self) {
        tokio::select! {
            _ = self.queue_changed.notified() => {}
            _ = tokio::time::sleep(self.settings.idle_poll_interval) => {}
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic sin mensaje".to_string())
}
