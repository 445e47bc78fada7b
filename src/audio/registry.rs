use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::info;

use super::{
    error::{PlayerResult, Precondition},
    notifier::Notifier,
    player::{GuildPlayer, PlayerSettings},
    queue::{LoopMode, QueueSnapshot, Track},
    voice::VoiceSink,
};
use crate::sources::MediaResolver;

/// Mapa guild -> reproductor.
///
/// Lo crea `main` y lo comparte el handler de Discord; no hay estado global.
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    resolver: Arc<dyn MediaResolver>,
    settings: PlayerSettings,
}

impl PlayerRegistry {
    pub fn new(resolver: Arc<dyn MediaResolver>, settings: PlayerSettings) -> Self {
        Self {
            players: DashMap::new(),
            resolver,
            settings,
        }
    }

    /// Obtiene el reproductor de la guild o lo crea (arrancando su loop).
    ///
    /// La creación ocurre bajo el lock del shard de la guild: dos llamadas
    /// concurrentes siempre ven el mismo reproductor.
    pub fn get_or_create(&self, guild_id: GuildId, notifier: Arc<dyn Notifier>) -> PlayerResult<Arc<GuildPlayer>> {
        if let Some(player) = self.get(guild_id) {
            return Ok(player);
        }

        let player = self
            .players
            .entry(guild_id)
            .or_try_insert_with(|| {
                info!("🆕 Creando reproductor para guild {}", guild_id);
                GuildPlayer::spawn(guild_id, self.resolver.clone(), notifier, self.settings.clone())
            })?
            .clone();

        Ok(player)
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.players.get(&guild_id).map(|p| p.clone())
    }

    fn existing(&self, guild_id: GuildId, missing: Precondition) -> PlayerResult<Arc<GuildPlayer>> {
        self.get(guild_id).ok_or_else(|| missing.into())
    }

    /// Conecta el reproductor de la guild al canal de voz
    pub async fn connect(
        &self,
        guild_id: GuildId,
        notifier: Arc<dyn Notifier>,
        sink: &dyn VoiceSink,
        channel_id: ChannelId,
    ) -> PlayerResult<Arc<GuildPlayer>> {
        let player = self.get_or_create(guild_id, notifier)?;
        player.connect(sink, channel_id).await?;
        Ok(player)
    }

    pub fn enqueue(&self, guild_id: GuildId, track: Track) -> PlayerResult<usize> {
        self.existing(guild_id, Precondition::NotConnected)?.enqueue(track)
    }

    pub fn set_loop(&self, guild_id: GuildId, mode: LoopMode) -> PlayerResult<()> {
        self.existing(guild_id, Precondition::NotConnected)?.set_loop(mode);
        Ok(())
    }

    pub async fn pause(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.existing(guild_id, Precondition::NothingPlaying)?.pause().await
    }

    pub async fn resume(&self, guild_id: GuildId) -> PlayerResult<()> {
        self.existing(guild_id, Precondition::NotPaused)?.resume().await
    }

    pub async fn skip(&self, guild_id: GuildId) -> PlayerResult<Option<Track>> {
        self.existing(guild_id, Precondition::NothingPlaying)?.skip().await
    }

    /// Detiene la guild si tiene reproductor. Nunca falla.
    pub async fn stop(&self, guild_id: GuildId) {
        if let Some(player) = self.get(guild_id) {
            player.stop().await;
        }
    }

    /// Detiene, elimina el reproductor del registro y termina su loop.
    ///
    /// Retorna `false` si la guild no tenía reproductor.
    pub async fn clear_and_disconnect(&self, guild_id: GuildId) -> bool {
        let Some((_, player)) = self.players.remove(&guild_id) else {
            return false;
        };

        player.stop().await;
        player.shutdown();
        info!("🧹 Reproductor de guild {} eliminado", guild_id);
        true
    }

    pub fn queue_snapshot(&self, guild_id: GuildId, limit: usize) -> Option<QueueSnapshot> {
        self.get(guild_id).map(|p| p.snapshot(limit))
    }

    pub fn now_playing(&self, guild_id: GuildId) -> Option<Track> {
        self.get(guild_id).and_then(|p| p.now_playing())
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Detiene todos los reproductores (usado al apagar el bot)
    pub async fn shutdown_all(&self) {
        let guilds: Vec<GuildId> = self.players.iter().map(|entry| *entry.key()).collect();
        info!("🛑 Deteniendo {} reproductores", guilds.len());

        for guild_id in guilds {
            self.clear_and_disconnect(guild_id).await;
        }
    }
}
