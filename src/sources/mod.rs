//! # Sources Module
//!
//! Frontera con los servicios de extracción de medios.
//!
//! Todo lo que sale de aquí ya está validado: un [`TrackCandidate`] siempre
//! tiene título (o el valor por defecto), referencia canónica y un locator de
//! stream fresco. El resto del bot nunca ve el JSON crudo del extractor.

pub mod ytdlp;

use async_trait::async_trait;
use regex::Regex;
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};
use tempfile::TempPath;
use thiserror::Error;

pub use ytdlp::YtDlpResolver;

/// Título usado cuando el extractor no reporta ninguno
pub const UNKNOWN_TITLE: &str = "Unknown Title";

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.|m\.)?(youtube\.com/|youtu\.be/|music\.youtube\.com/)")
        .expect("regex de YouTube válida")
});

static SOUNDCLOUD_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.|m\.)?(soundcloud\.com/|snd\.sc/)")
        .expect("regex de SoundCloud válida")
});

/// Errores al resolver una consulta o referencia
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No se encontraron resultados para: {0}")]
    NoResults(String),

    #[error("yt-dlp error: {0}")]
    Extractor(String),

    #[error("Tiempo de espera agotado tras {0:?}")]
    Timeout(Duration),

    #[error("Error de E/S: {0}")]
    Io(#[from] std::io::Error),
}

/// Plataforma de origen, solo informativa
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLabel {
    YouTube,
    SoundCloud,
    Url,
    Search,
}

impl SourceLabel {
    /// Detecta la plataforma a partir de lo que escribió el usuario
    pub fn detect(query: &str) -> Self {
        let query = query.trim();
        let lower = query.to_lowercase();

        if SOUNDCLOUD_URL.is_match(&lower) {
            SourceLabel::SoundCloud
        } else if YOUTUBE_URL.is_match(&lower) {
            SourceLabel::YouTube
        } else if is_url(query) {
            SourceLabel::Url
        } else {
            SourceLabel::Search
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceLabel::YouTube => "YouTube",
            SourceLabel::SoundCloud => "SoundCloud",
            SourceLabel::Url => "URL",
            SourceLabel::Search => "Search",
        }
    }
}

impl fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verifica si la consulta es una URL http(s) bien formada
pub fn is_url(query: &str) -> bool {
    url::Url::parse(query.trim())
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Candidato devuelto por el resolver, ya validado
#[derive(Debug, Clone, PartialEq)]
pub struct TrackCandidate {
    pub title: String,
    pub duration_seconds: Option<u64>,
    pub thumbnail_url: Option<String>,
    /// Referencia canónica para volver a resolver más tarde
    pub reference: String,
    /// Locator de stream; puede expirar
    pub stream_locator: String,
    pub source_label: SourceLabel,
}

impl TrackCandidate {
    pub fn new(reference: impl Into<String>, stream_locator: impl Into<String>, source_label: SourceLabel) -> Self {
        Self {
            title: UNKNOWN_TITLE.to_string(),
            duration_seconds: None,
            thumbnail_url: None,
            reference: reference.into(),
            stream_locator: stream_locator.into(),
            source_label,
        }
    }

    /// Títulos vacíos o ausentes conservan el valor por defecto
    pub fn with_title(mut self, title: Option<String>) -> Self {
        if let Some(title) = title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            self.title = title;
        }
        self
    }

    /// Duraciones negativas o no finitas se tratan como desconocidas
    pub fn with_duration_secs(mut self, duration: Option<f64>) -> Self {
        self.duration_seconds = duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u64);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        self.thumbnail_url = thumbnail.filter(|t| !t.is_empty());
        self
    }
}

/// Origen que el sink de voz debe abrir
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSource {
    Remote(String),
    LocalFile(PathBuf),
}

/// Stream listo para entregar al sink de voz.
///
/// Si el resolver descargó el audio, `scratch` es dueño del archivo temporal y
/// lo borra al soltarse.
#[derive(Debug)]
pub struct ResolvedStream {
    source: StreamSource,
    scratch: Option<TempPath>,
}

impl ResolvedStream {
    pub fn remote(locator: impl Into<String>) -> Self {
        Self {
            source: StreamSource::Remote(locator.into()),
            scratch: None,
        }
    }

    pub fn local(path: TempPath) -> Self {
        Self {
            source: StreamSource::LocalFile(path.to_path_buf()),
            scratch: Some(path),
        }
    }

    pub fn source(&self) -> &StreamSource {
        &self.source
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.scratch.as_deref()
    }

    /// Separa el origen del recurso temporal: el sink recibe el origen y la
    /// completion de la reproducción se queda con el archivo
    pub fn into_parts(self) -> (StreamSource, Option<TempPath>) {
        (self.source, self.scratch)
    }
}

/// Servicio externo que convierte consultas o URLs en streams reproducibles
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Resuelve una consulta, URL o referencia canónica.
    ///
    /// Debe poder llamarse dos veces para la misma referencia: al encolar y
    /// justo antes de reproducir, porque los locators expiran.
    async fn resolve(&self, query: &str) -> Result<Vec<TrackCandidate>, ResolveError>;

    /// Prepara el stream del candidato. Por defecto usa el locator remoto.
    async fn materialize(&self, candidate: TrackCandidate) -> Result<ResolvedStream, ResolveError> {
        Ok(ResolvedStream::remote(candidate.stream_locator))
    }

    fn name(&self) -> &'static str;
}
