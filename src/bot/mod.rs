//! # Bot Module
//!
//! Capa de comandos slash sobre serenity.
//!
//! [`JukeboxBot`] implementa el [`EventHandler`] de serenity y traduce cada
//! comando a una operación del [`PlayerRegistry`]. No guarda estado de
//! reproducción propio: todo vive en los reproductores de cada guild.
//!
//! ## Example
//!
//! ```rust,no_run
//! use open_jukebox::{audio::PlayerRegistry, bot::JukeboxBot, config::Config, sources::YtDlpResolver};
//! use std::sync::Arc;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let resolver = Arc::new(YtDlpResolver::new(config.ytdlp_path.clone(), config.max_playlist_size));
//! let registry = Arc::new(PlayerRegistry::new(resolver.clone(), config.player_settings()));
//! let bot = JukeboxBot::new(config, registry, resolver);
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{PlayerRegistry, SongbirdSink},
    config::Config,
    sources::MediaResolver,
};

/// Handler principal de Discord
pub struct JukeboxBot {
    config: Arc<Config>,
    registry: Arc<PlayerRegistry>,
    resolver: Arc<dyn MediaResolver>,
}

impl JukeboxBot {
    pub fn new(config: Config, registry: Arc<PlayerRegistry>, resolver: Arc<dyn MediaResolver>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            resolver,
        }
    }

    /// Registra comandos globales o por guild según configuración
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Sink de voz sobre el manager de songbird registrado en el cliente
    pub async fn voice_sink(&self, ctx: &Context) -> Result<SongbirdSink> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        Ok(SongbirdSink::new(manager, self.config.default_volume))
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Si sacan al bot del canal de voz, el reproductor de la guild se detiene
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot desconectado en guild {}", guild_id);
            self.registry.stop(guild_id).await;
        }
    }
}
