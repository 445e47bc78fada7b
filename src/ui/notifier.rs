use async_trait::async_trait;
use serenity::{builder::CreateMessage, http::Http, model::id::ChannelId};
use std::sync::Arc;
use tracing::warn;

use super::embeds;
use crate::audio::{Notification, Notifier};

/// Publica las notificaciones del reproductor en un canal de texto
pub struct ChannelNotifier {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

/// Embed correspondiente a cada notificación
pub fn render(notification: &Notification) -> serenity::builder::CreateEmbed {
    match notification {
        Notification::NowPlaying { track, loop_mode } => embeds::create_now_playing_embed(track, *loop_mode),
        Notification::PlaybackFailed { title, reason } => embeds::create_error_embed(
            "No se pudo reproducir",
            &format!("**{}** se saltó: {}", title, reason),
        ),
        Notification::LoopError { reason } => embeds::create_warning_embed(
            "Error inesperado",
            &format!("El reproductor se recupera en unos segundos.\n`{}`", reason),
        ),
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notification: Notification) {
        let message = CreateMessage::new().embed(render(&notification));

        if let Err(e) = self.channel_id.send_message(&self.http, message).await {
            warn!("⚠️ No se pudo enviar notificación al canal {}: {}", self.channel_id, e);
        }
    }
}
