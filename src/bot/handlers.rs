use anyhow::Result;
use serenity::{
    builder::{CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    audio::{LoopMode, Notifier, PlayerError, Track},
    bot::JukeboxBot,
    sources::ResolveError,
    ui::{embeds, ChannelNotifier},
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond_ephemeral(ctx, &command, "❌ Este comando solo funciona dentro de un servidor").await;
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await,
        "loop" => handle_loop(ctx, &command, bot, guild_id).await,
        "join" => handle_join(ctx, &command, bot, guild_id).await,
        "leave" => handle_leave(ctx, &command, bot, guild_id).await,
        "help" => handle_help(ctx, &command).await,
        _ => respond_ephemeral(ctx, &command, "❌ Comando no reconocido").await,
    }
}

async fn handle_play(ctx: &Context, command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Result<()> {
    let query = string_option(command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Defer la respuesta ya que puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return edit_with_error(ctx, command, "Sin canal de voz", "Debes estar en un canal de voz").await;
    };

    if let Err(e) = connect(ctx, command, bot, guild_id, voice_channel_id).await {
        return edit_with_player_error(ctx, command, &e).await;
    }

    let resolve_timeout = bot.config.resolve_timeout;
    let candidates = match tokio::time::timeout(resolve_timeout, bot.resolver.resolve(&query)).await {
        Ok(Ok(candidates)) if !candidates.is_empty() => candidates,
        Ok(Ok(_)) => {
            let e = PlayerError::from(ResolveError::NoResults(query.clone()));
            return edit_with_player_error(ctx, command, &e).await;
        }
        Ok(Err(e)) => return edit_with_player_error(ctx, command, &PlayerError::from(e)).await,
        Err(_) => {
            let e = PlayerError::from(ResolveError::Timeout(resolve_timeout));
            return edit_with_player_error(ctx, command, &e).await;
        }
    };

    let embed = if candidates.len() == 1 {
        let track = candidates
            .into_iter()
            .next()
            .map(|c| Track::from_candidate(c, command.user.id))
            .ok_or_else(|| anyhow::anyhow!("Candidato perdido"))?;

        match bot.registry.enqueue(guild_id, track.clone()) {
            Ok(position) => embeds::create_track_added_embed(&track, position),
            Err(e) => return edit_with_player_error(ctx, command, &e).await,
        }
    } else {
        let (added, rejected) = enqueue_playlist(bot, guild_id, command.user.id, candidates);
        if added == 0 {
            let e = PlayerError::QueueFull(bot.config.max_queue_size);
            return edit_with_player_error(ctx, command, &e).await;
        }
        embeds::create_playlist_added_embed(added, rejected)
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

/// Encola hasta `max_playlist_size` pistas. Retorna (agregadas, rechazadas).
fn enqueue_playlist(
    bot: &JukeboxBot,
    guild_id: GuildId,
    requester: UserId,
    candidates: Vec<crate::sources::TrackCandidate>,
) -> (usize, usize) {
    let total = candidates.len();
    let added = candidates
        .into_iter()
        .take(bot.config.max_playlist_size)
        .map(|c| Track::from_candidate(c, requester))
        .map_while(|track| bot.registry.enqueue(guild_id, track).ok())
        .count();

    info!("📋 Playlist en guild {}: {} de {} agregadas", guild_id, added, total);
    (added, total - added)
}

async fn handle_pause(ctx: &Context, command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Result<()> {
    match bot.registry.pause(guild_id).await {
        Ok(()) => respond(ctx, command, "⏸️ Reproducción pausada").await,
        Err(e) => respond_player_error(ctx, command, &e).await,
    }
}

async fn handle_resume(ctx: &Context, command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Result<()> {
    match bot.registry.resume(guild_id).await {
        Ok(()) => respond(ctx, command, "▶️ Reproducción reanudada").await,
        Err(e) => respond_player_error(ctx, command, &e).await,
    }
}

async fn handle_skip(ctx: &Context, command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Result<()> {
    match bot.registry.skip(guild_id).await {
        Ok(Some(track)) => respond(ctx, command, &format!("⏭️ Saltada: **{}**", track.title)).await,
        Ok(None) => respond(ctx, command, "⏭️ Canción saltada").await,
        Err(e) => respond_player_error(ctx, command, &e).await,
    }
}

async fn handle_stop(ctx: &Context, command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Result<()> {
    bot.registry.stop(guild_id).await;
    respond(ctx, command, "⏹️ Reproducción detenida y cola limpiada").await
}

async fn handle_queue(ctx: &Context, command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Result<()> {
    let page = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "page")
        .and_then(|opt| opt.value.as_i64())
        .unwrap_or(1)
        .max(1) as usize;

    let snapshot = bot
        .registry
        .queue_snapshot(guild_id, bot.config.max_queue_size)
        .unwrap_or_default();
    let embed = embeds::create_queue_embed(&snapshot, page, bot.config.queue_page_size);

    respond_embed(ctx, command, embed, false).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_ephemeral(ctx, command, "❌ No hay nada reproduciéndose actualmente").await;
    };

    match player.now_playing() {
        Some(track) => {
            let embed = embeds::create_now_playing_embed(&track, player.loop_mode());
            respond_embed(ctx, command, embed, false).await
        }
        None => respond_ephemeral(ctx, command, "❌ No hay nada reproduciéndose actualmente").await,
    }
}

async fn handle_loop(ctx: &Context, command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Result<()> {
    let Some(mode) = string_option(command, "mode").and_then(LoopMode::parse) else {
        return respond_ephemeral(ctx, command, "❌ Modo inválido: usa off, single o queue").await;
    };

    if let Err(e) = bot.registry.set_loop(guild_id, mode) {
        return respond_player_error(ctx, command, &e).await;
    }

    let message = match mode {
        LoopMode::Single => "🔂 Repetir canción activado",
        LoopMode::Queue => "🔁 Repetir cola activado",
        LoopMode::Off => "➡️ Repetición desactivada",
    };
    respond(ctx, command, message).await
}

async fn handle_join(ctx: &Context, command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Result<()> {
    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond_ephemeral(ctx, command, "❌ Debes estar en un canal de voz").await;
    };

    match connect(ctx, command, bot, guild_id, voice_channel_id).await {
        Ok(()) => respond(ctx, command, "🔊 Conectado al canal de voz").await,
        Err(e) => respond_player_error(ctx, command, &e).await,
    }
}

async fn handle_leave(ctx: &Context, command: &CommandInteraction, bot: &JukeboxBot, guild_id: GuildId) -> Result<()> {
    if bot.registry.clear_and_disconnect(guild_id).await {
        respond(ctx, command, "👋 Desconectado del canal de voz").await
    } else {
        respond_ephemeral(ctx, command, "❌ El bot no está en un canal de voz").await
    }
}

async fn handle_help(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    respond_embed(ctx, command, embeds::create_help_embed(), true).await
}

// Funciones auxiliares

/// Conecta el reproductor de la guild al canal; las notificaciones van al
/// canal de texto donde se usó el comando
async fn connect(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
    channel_id: ChannelId,
) -> Result<(), PlayerError> {
    let sink = bot
        .voice_sink(ctx)
        .await
        .map_err(|e| PlayerError::Connection(e.to_string()))?;
    let notifier: Arc<dyn Notifier> = Arc::new(ChannelNotifier::new(ctx.http.clone(), command.channel_id));

    bot.registry.connect(guild_id, notifier, &sink, channel_id).await?;
    Ok(())
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn log_player_error(command: &CommandInteraction, e: &PlayerError) {
    if e.is_user_facing() {
        info!("🚫 /{} rechazado: {}", command.data.name, e);
    } else {
        error!("❌ Error en /{}: {}", command.data.name, e);
    }
}

fn player_error_embed(e: &PlayerError) -> CreateEmbed {
    let title = match e {
        PlayerError::Precondition(_) | PlayerError::QueueFull(_) => "No se puede hacer eso ahora",
        PlayerError::Resolution(_) => "No se encontró la canción",
        PlayerError::Connection(_) => "Error de conexión",
        PlayerError::Playback(_) | PlayerError::Runtime(_) => "Error del reproductor",
    };
    embeds::create_error_embed(title, &e.to_string())
}

async fn respond(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().content(content)),
        )
        .await?;
    Ok(())
}

async fn respond_ephemeral(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed, ephemeral: bool) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_player_error(ctx: &Context, command: &CommandInteraction, e: &PlayerError) -> Result<()> {
    log_player_error(command, e);
    respond_embed(ctx, command, player_error_embed(e), true).await
}

async fn edit_with_player_error(ctx: &Context, command: &CommandInteraction, e: &PlayerError) -> Result<()> {
    log_player_error(command, e);
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(player_error_embed(e)))
        .await?;
    Ok(())
}

async fn edit_with_error(ctx: &Context, command: &CommandInteraction, title: &str, description: &str) -> Result<()> {
    warn!("🚫 /{} rechazado: {}", command.data.name, description);
    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::create_error_embed(title, description)),
        )
        .await?;
    Ok(())
}
