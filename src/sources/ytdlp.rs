use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{is_url, MediaResolver, ResolveError, ResolvedStream, SourceLabel, TrackCandidate};

/// Resolver basado en el binario `yt-dlp`.
///
/// Cada llamada lanza un proceso hijo, así que la extracción nunca bloquea el
/// runtime que atiende al resto de las guilds.
pub struct YtDlpResolver {
    binary: String,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
    max_entries: usize,
    download_dir: Option<PathBuf>,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    /// URL del formato elegido con `-f`
    url: Option<String>,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>, max_entries: usize) -> Self {
        Self {
            binary: binary.into(),
            rate_limiter: Semaphore::new(3),
            max_entries: max_entries.max(1),
            download_dir: None,
        }
    }

    /// Descarga el audio a un archivo temporal en `dir` antes de reproducir
    pub fn with_download_dir(mut self, dir: PathBuf) -> Self {
        self.download_dir = Some(dir);
        self
    }

    /// Si un timeout cancela la resolución, el proceso muere junto con el future
    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.kill_on_drop(true);
        command
    }

    /// Convierte lo que escribió el usuario en un argumento para yt-dlp
    fn search_target(query: &str) -> String {
        let query = query.trim();
        if is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        }
    }

    /// Convierte YtDlpInfo a TrackCandidate; sin URL de stream no hay candidato
    fn info_to_candidate(info: YtDlpInfo, query: &str, label: SourceLabel) -> Option<TrackCandidate> {
        let stream_locator = info.url.filter(|u| !u.is_empty())?;
        let reference = info
            .webpage_url
            .or(info.original_url)
            .unwrap_or_else(|| query.trim().to_string());

        let candidate = TrackCandidate::new(reference, stream_locator, label)
            .with_title(info.title)
            .with_duration_secs(info.duration)
            .with_thumbnail(info.thumbnail);

        Some(candidate)
    }

    /// Parsea la salida de `--dump-json` (un objeto JSON por línea)
    fn parse_output(stdout: &str, query: &str, max_entries: usize) -> Vec<TrackCandidate> {
        let label = SourceLabel::detect(query);

        stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<YtDlpInfo>(line) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!("⚠️ Línea de yt-dlp ignorada: {}", e);
                    None
                }
            })
            .filter_map(|info| Self::info_to_candidate(info, query, label))
            .take(max_entries)
            .collect()
    }

    async fn download(&self, candidate: &TrackCandidate, dir: &Path) -> Result<ResolvedStream, ResolveError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolveError::Extractor(e.to_string()))?;

        let path = tempfile::Builder::new()
            .prefix("open-jukebox-")
            .suffix(".audio")
            .tempfile_in(dir)?
            .into_temp_path();

        debug!("⬇️ Descargando {} en {}", candidate.reference, path.display());

        let output = self
            .command()
            .arg("--no-playlist")
            .args(["-f", "bestaudio/best"])
            .arg("--force-overwrites")
            .arg("--no-part")
            .arg("--no-warnings")
            .arg("--quiet")
            .arg("-o")
            .arg(path.as_os_str())
            .arg(&candidate.reference)
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            // `path` se borra al salir de este scope
            return Err(ResolveError::Extractor(error.trim().to_string()));
        }

        Ok(ResolvedStream::local(path))
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Vec<TrackCandidate>, ResolveError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolveError::Extractor(e.to_string()))?;

        let target = Self::search_target(query);
        info!("🔍 Resolviendo con yt-dlp: {}", target);

        let output = self
            .command()
            .arg("--dump-json")
            .args(["-f", "bestaudio/best"])
            .arg("--playlist-end")
            .arg(self.max_entries.to_string())
            .arg("--no-warnings")
            .arg("--ignore-errors")
            .arg(&target)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let candidates = Self::parse_output(&stdout, query, self.max_entries);

        // Con --ignore-errors una playlist parcial sale con status != 0
        if candidates.is_empty() {
            if !output.status.success() {
                let error = String::from_utf8_lossy(&output.stderr);
                return Err(ResolveError::Extractor(error.trim().to_string()));
            }
            return Err(ResolveError::NoResults(query.to_string()));
        }

        debug!("✅ {} candidatos para {}", candidates.len(), query);
        Ok(candidates)
    }

    async fn materialize(&self, candidate: TrackCandidate) -> Result<ResolvedStream, ResolveError> {
        match &self.download_dir {
            Some(dir) => self.download(&candidate, dir).await,
            None => Ok(ResolvedStream::remote(candidate.stream_locator)),
        }
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::UNKNOWN_TITLE;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_search_target() {
        assert_eq!(YtDlpResolver::search_target("  lofi beats "), "ytsearch1:lofi beats");
        assert_eq!(
            YtDlpResolver::search_target("https://youtu.be/abc"),
            "https://youtu.be/abc"
        );
    }

    #[test]
    fn test_parse_output_applies_defaults() {
        let stdout = r#"{"title": "Song A", "duration": 180.0, "webpage_url": "https://www.youtube.com/watch?v=a", "url": "https://cdn/a"}
not json
{"duration": null, "url": "https://cdn/b"}
{"title": "Sin stream", "webpage_url": "https://www.youtube.com/watch?v=c"}
"#;

        let candidates = YtDlpResolver::parse_output(stdout, "https://www.youtube.com/playlist?list=x", 10);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Song A");
        assert_eq!(candidates[0].duration_seconds, Some(180));
        assert_eq!(candidates[0].reference, "https://www.youtube.com/watch?v=a");
        assert_eq!(candidates[0].source_label, SourceLabel::YouTube);
        assert_eq!(candidates[1].title, UNKNOWN_TITLE);
        assert_eq!(candidates[1].duration_seconds, None);
        assert_eq!(candidates[1].reference, "https://www.youtube.com/playlist?list=x");
        assert_eq!(candidates[1].stream_locator, "https://cdn/b");
    }

    #[cfg(target_os = "linux")]
    fn process_alive(pid: &str) -> bool {
        // Un zombie ya está muerto aunque siga en /proc
        std::fs::read_to_string(format!("/proc/{}/stat", pid))
            .map(|stat| {
                stat.rsplit(')')
                    .next()
                    .is_some_and(|rest| !rest.trim_start().starts_with('Z'))
            })
            .unwrap_or(false)
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_cancelled_resolve_kills_ytdlp() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::{Duration, Instant};

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = dir.path().join("yt-dlp");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho $$ > '{}'\nexec sleep 30\n", pid_file.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolver = YtDlpResolver::new(script.display().to_string(), 1);
        let result = tokio::time::timeout(Duration::from_millis(500), resolver.resolve("lofi")).await;
        assert!(result.is_err());

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let deadline = Instant::now() + Duration::from_secs(2);
        while process_alive(&pid) {
            assert!(Instant::now() < deadline, "yt-dlp sigue vivo tras el timeout");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[test]
    fn test_parse_output_caps_entries() {
        let line = r#"{"title": "x", "url": "https://cdn/x"}"#;
        let stdout = [line; 5].join("\n");

        assert_eq!(YtDlpResolver::parse_output(&stdout, "x", 3).len(), 3);
    }
}
