use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::audio::PlayerSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub max_playlist_size: usize,
    pub queue_page_size: usize,

    // Loop del reproductor
    pub idle_poll_interval: Duration,
    pub error_backoff: Duration,
    pub resolve_timeout: Duration,

    // Extracción
    pub ytdlp_path: String,
    pub download_before_play: bool,
    pub cache_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        if config.download_before_play {
            std::fs::create_dir_all(&config.cache_dir)
                .with_context(|| format!("No se pudo crear {}", config.cache_dir.display()))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Construye la configuración a partir de una función de búsqueda de
    /// variables; las ausentes toman el valor por defecto
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            // Discord
            discord_token: var("DISCORD_TOKEN").context("DISCORD_TOKEN no definido")?,
            application_id: parse(&var, "APPLICATION_ID")?.context("APPLICATION_ID no definido")?,
            guild_id: var("GUILD_ID").and_then(|s| s.parse().ok()),

            // Audio
            default_volume: parse(&var, "DEFAULT_VOLUME")?.unwrap_or(defaults.default_volume),
            max_queue_size: parse(&var, "MAX_QUEUE_SIZE")?.unwrap_or(defaults.max_queue_size),
            max_playlist_size: parse(&var, "MAX_PLAYLIST_SIZE")?.unwrap_or(defaults.max_playlist_size),
            queue_page_size: parse(&var, "QUEUE_PAGE_SIZE")?.unwrap_or(defaults.queue_page_size),

            // Loop del reproductor
            idle_poll_interval: duration(&var, "IDLE_POLL_INTERVAL")?.unwrap_or(defaults.idle_poll_interval),
            error_backoff: duration(&var, "ERROR_BACKOFF")?.unwrap_or(defaults.error_backoff),
            resolve_timeout: duration(&var, "RESOLVE_TIMEOUT")?.unwrap_or(defaults.resolve_timeout),

            // Extracción
            ytdlp_path: var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            download_before_play: parse(&var, "DOWNLOAD_BEFORE_PLAY")?.unwrap_or(defaults.download_before_play),
            cache_dir: var("CACHE_DIR").map(PathBuf::from).unwrap_or(defaults.cache_dir),
        })
    }

    /// Valida que los valores tengan sentido antes de arrancar el bot.
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!("Default volume must be between 0.0 and 2.0, got: {}", self.default_volume);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.queue_page_size == 0 || self.queue_page_size > 25 {
            anyhow::bail!("Queue page size must be between 1 and 25, got: {}", self.queue_page_size);
        }

        if self.idle_poll_interval.is_zero() {
            anyhow::bail!("Idle poll interval must be greater than 0");
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        Ok(())
    }

    /// Parámetros que necesita el núcleo de reproducción
    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            max_queue_size: self.max_queue_size,
            idle_poll_interval: self.idle_poll_interval,
            error_backoff: self.error_backoff,
            resolve_timeout: self.resolve_timeout,
        }
    }

    /// Resumen para logs, sin el token
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, {} queue, {} playlist\n  \
            Loop: poll {}, backoff {}, resolve timeout {}\n  \
            Extractor: {} (download={}, cache={})",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.max_playlist_size,
            humantime::format_duration(self.idle_poll_interval),
            humantime::format_duration(self.error_backoff),
            humantime::format_duration(self.resolve_timeout),
            self.ytdlp_path,
            self.download_before_play,
            self.cache_dir.display(),
        )
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|value| value.trim().parse::<T>().with_context(|| format!("{} inválido: {}", key, value)))
        .transpose()
}

/// Acepta "500ms", "2s", "1m 30s" o segundos sin unidad
fn duration(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    var(key)
        .map(|value| {
            let value = value.trim();
            match value.parse::<u64>() {
                Ok(secs) => Ok(Duration::from_secs(secs)),
                Err(_) => humantime::parse_duration(value).with_context(|| format!("{} inválido: {}", key, value)),
            }
        })
        .transpose()
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        let player = PlayerSettings::default();

        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            default_volume: 0.5,
            max_queue_size: player.max_queue_size,
            max_playlist_size: 100,
            queue_page_size: 10,

            idle_poll_interval: player.idle_poll_interval,
            error_backoff: player.error_backoff,
            resolve_timeout: player.resolve_timeout,

            ytdlp_path: "yt-dlp".to_string(),
            download_before_play: false,
            cache_dir: "/app/cache".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply() {
        let config = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "token"), ("APPLICATION_ID", "123")])).unwrap();

        assert_eq!(config.application_id, 123);
        assert_eq!(config.guild_id, None);
        assert_eq!(config.max_queue_size, 1000);
        assert_eq!(config.ytdlp_path, "yt-dlp");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations_accept_units_and_seconds() {
        let config = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "token"),
            ("APPLICATION_ID", "1"),
            ("IDLE_POLL_INTERVAL", "250ms"),
            ("ERROR_BACKOFF", "3"),
            ("RESOLVE_TIMEOUT", "1m 30s"),
        ]))
        .unwrap();

        let settings = config.player_settings();
        assert_eq!(settings.idle_poll_interval, Duration::from_millis(250));
        assert_eq!(settings.error_backoff, Duration::from_secs(3));
        assert_eq!(settings.resolve_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_missing_token_fails() {
        assert!(Config::from_lookup(lookup(&[("APPLICATION_ID", "1")])).is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad_number = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "token"),
            ("APPLICATION_ID", "1"),
            ("MAX_QUEUE_SIZE", "muchos"),
        ]));
        assert!(bad_number.is_err());

        let config = Config {
            default_volume: 3.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_hides_token() {
        let config = Config {
            discord_token: "super-secreto".into(),
            ..Config::default()
        };

        assert!(!config.summary().contains("super-secreto"));
    }
}
