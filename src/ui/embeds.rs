use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{LoopMode, QueueSnapshot, Track};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Open Jukebox";

fn duration_label(track: &Track) -> String {
    match track.duration() {
        Some(duration) => format_duration(duration),
        None => "🔴 En vivo".to_string(),
    }
}

fn loop_label(mode: LoopMode) -> &'static str {
    match mode {
        LoopMode::Off => "➡️ Desactivada",
        LoopMode::Single => "🔂 Canción",
        LoopMode::Queue => "🔁 Cola",
    }
}

fn loop_icon(mode: LoopMode) -> &'static str {
    match mode {
        LoopMode::Single => "🔂",
        LoopMode::Queue => "🔁",
        LoopMode::Off => "▶️",
    }
}

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &Track, loop_mode: LoopMode) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", duration_label(track), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requester), true)
        .field("🔗 Fuente", track.source_label.as_str(), true)
        .field("🔁 Repetición", loop_label(loop_mode), true);

    if let Some(thumbnail) = &track.thumbnail_url {
        embed = embed.thumbnail(thumbnail);
    }

    if crate::sources::is_url(&track.source_reference) {
        embed = embed.url(&track.source_reference);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!("**{}** se ha agregado a la cola de reproducción", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", duration_label(track), true)
        .field("📍 Posición", position.to_string(), true)
        .field("🔗 Fuente", track.source_label.as_str(), true);

    if let Some(thumbnail) = &track.thumbnail_url {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new("🎵 Se reproducirá automáticamente cuando llegue su turno"))
}

/// Crea un embed para mostrar que una playlist fue agregada
pub fn create_playlist_added_embed(added: usize, rejected: usize) -> CreateEmbed {
    let description = if added == 1 {
        "Se agregó **1 canción** de la playlist a la cola de reproducción".to_string()
    } else {
        format!("Se agregaron **{} canciones** de la playlist a la cola de reproducción", added)
    };

    let mut embed = CreateEmbed::default()
        .title("📋 Playlist Agregada")
        .description(description)
        .color(colors::MUSIC_PURPLE)
        .field("📊 Canciones agregadas", added.to_string(), true);

    if rejected > 0 {
        embed = embed.field("⚠️ Cola llena", format!("{} canciones no entraron", rejected), true);
    }

    embed
        .footer(CreateEmbedFooter::new("🎵 Usa /queue para ver todas las canciones"))
        .timestamp(Timestamp::now())
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(snapshot: &QueueSnapshot, page: usize, items_per_page: usize) -> CreateEmbed {
    let queue_page = snapshot.get_page(page, items_per_page);

    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if snapshot.total_items == 0 && snapshot.current.is_none() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(current) = &snapshot.current {
        embed = embed.field(
            format!("{} Actual", loop_icon(snapshot.loop_mode)),
            format!("**{}**", current.title),
            false,
        );
    }

    if !queue_page.items.is_empty() {
        let description: String = queue_page
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let duration = item
                    .duration()
                    .map(|d| format!(" `[{}]`", format_duration(d)))
                    .unwrap_or_default();
                format!("**{}**. {}{}\n", queue_page.first_position + i, item.title, duration)
            })
            .collect();

        embed = embed.field("Próximas canciones", description, false);
    }

    let mut info = format!("**Total:** {} canciones", snapshot.total_items);
    if snapshot.total_duration > Duration::ZERO {
        info.push_str(&format!(" • **Duración:** {}", format_duration(snapshot.total_duration)));
    }
    info.push_str(&format!(" • **Repetición:** {}", loop_label(snapshot.loop_mode)));
    embed = embed.field("Información", info, false);

    let footer = if queue_page.total_pages > 1 {
        format!(
            "Página {} de {} • Open Jukebox",
            queue_page.current_page, queue_page.total_pages
        )
    } else {
        STANDARD_FOOTER.to_string()
    };

    embed
        .footer(CreateEmbedFooter::new(footer))
        .timestamp(Timestamp::now())
}

/// Crea un embed de ayuda general
pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Open Jukebox - Comandos")
        .color(colors::INFO_BLUE)
        .description("Bot de música con una cola independiente por servidor")
        .field(
            "🎵 Reproducción",
            "• `/play <canción>` - Reproduce o agrega a la cola\n\
            • `/pause` - Pausa la reproducción\n\
            • `/resume` - Reanuda la reproducción\n\
            • `/skip` - Salta la canción actual\n\
            • `/stop` - Detiene y limpia la cola",
            false,
        )
        .field(
            "📜 Cola",
            "• `/queue [página]` - Muestra la cola\n\
            • `/loop <modo>` - off, single o queue\n\
            • `/nowplaying` - Muestra la canción actual",
            false,
        )
        .field(
            "🔊 Conexión",
            "• `/join` - Conecta al canal de voz\n\
            • `/leave` - Desconecta y elimina la cola",
            false,
        )
        .field(
            "🎵 Fuentes Soportadas",
            "• YouTube / YouTube Music\n\
            • SoundCloud\n\
            • URLs directas de audio\n\
            • Búsquedas de texto",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de advertencia
pub fn create_warning_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("⚠️ {}", title))
        .description(description)
        .color(colors::WARNING_ORANGE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{queue::tests::track, MusicQueue};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn to_json(embed: &CreateEmbed) -> Value {
        serde_json::to_value(embed).unwrap()
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "0:05");
        assert_eq!(format_duration(Duration::from_secs(212)), "3:32");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600 + 7)), "3:00:07");
    }

    #[test]
    fn test_live_track_has_no_duration() {
        let mut live = track("radio");
        live.duration_seconds = None;

        let json = to_json(&create_now_playing_embed(&live, LoopMode::Single));
        let fields = json["fields"].as_array().unwrap();

        assert_eq!(fields[0]["value"], "🔴 En vivo");
        assert_eq!(fields[3]["value"], "🔂 Canción");
    }

    #[test]
    fn test_queue_embed_numbers_pages() {
        let mut queue = MusicQueue::new(50);
        for i in 0..12 {
            queue.push(track(&format!("t{}", i)));
        }
        queue.advance();

        let json = to_json(&create_queue_embed(&queue.snapshot(50), 2, 5));
        let upcoming = json["fields"][1]["value"].as_str().unwrap();

        assert!(upcoming.starts_with("**6**. t6"));
        assert_eq!(json["footer"]["text"], "Página 2 de 3 • Open Jukebox");
    }

    #[test]
    fn test_empty_queue_embed() {
        let queue = MusicQueue::new(10);
        let json = to_json(&create_queue_embed(&queue.snapshot(10), 1, 10));

        assert!(json["description"].as_str().unwrap().contains("La cola está vacía"));
    }
}
