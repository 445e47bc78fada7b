use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::{collections::VecDeque, fmt, time::Duration};
use tracing::{debug, info};

use crate::sources::{SourceLabel, TrackCandidate};

/// Una pista encolada. Inmutable una vez construida: la misma estructura sirve
/// como pista actual y como pista en espera.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub source_reference: String,
    pub title: String,
    pub duration_seconds: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub requester: UserId,
    pub source_label: SourceLabel,
    pub queued_at: DateTime<Utc>,
}

impl Track {
    pub fn from_candidate(candidate: TrackCandidate, requester: UserId) -> Self {
        Self {
            source_reference: candidate.reference,
            title: candidate.title,
            duration_seconds: candidate.duration_seconds,
            thumbnail_url: candidate.thumbnail_url,
            requester,
            source_label: candidate.source_label,
            queued_at: Utc::now(),
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    /// Repite la pista actual
    Single,
    /// Repite la cola completa
    Queue,
}

impl LoopMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "off" | "none" => Some(LoopMode::Off),
            "single" | "track" | "song" => Some(LoopMode::Single),
            "queue" | "all" => Some(LoopMode::Queue),
            _ => None,
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopMode::Off => "off",
            LoopMode::Single => "single",
            LoopMode::Queue => "queue",
        })
    }
}

/// Cola FIFO de una guild. No es thread-safe por sí misma: el
/// [`GuildPlayer`](super::player::GuildPlayer) la protege con un mutex.
#[derive(Debug)]
pub struct MusicQueue {
    items: VecDeque<Track>,
    current: Option<Track>,
    loop_mode: LoopMode,
    max_size: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            current: None,
            loop_mode: LoopMode::Off,
            max_size,
        }
    }

    /// Agrega una pista al final. Retorna la posición (1 = siguiente).
    pub fn push(&mut self, track: Track) -> Option<usize> {
        if self.items.len() >= self.max_size {
            return None;
        }

        info!("➕ Agregado a la cola: {}", track.title);
        self.items.push_back(track);
        Some(self.items.len())
    }

    /// Avanza un paso del ciclo: reinserta la actual en modo `Single`, saca la
    /// siguiente (FIFO) y la reencola al final en modo `Queue`.
    ///
    /// Retorna `None` si no hay nada que reproducir; en ese caso `current`
    /// conserva la última pista reproducida.
    pub fn advance(&mut self) -> Option<Track> {
        if self.loop_mode == LoopMode::Single {
            if let Some(current) = self.current.take() {
                debug!("🔂 Repitiendo track: {}", current.title);
                self.items.push_front(current);
            }
        }

        let next = self.items.pop_front()?;

        if self.loop_mode == LoopMode::Queue {
            debug!("🔁 Track agregado al final por loop de cola: {}", next.title);
            self.items.push_back(next.clone());
        }

        self.current = Some(next.clone());
        Some(next)
    }

    /// Vista perezosa y reiniciable (el iterador es `Clone`) de las próximas
    /// `limit` pistas
    pub fn peek(&self, limit: usize) -> impl Iterator<Item = &Track> + Clone + '_ {
        self.items.iter().take(limit)
    }

    /// Vacía la cola y desactiva la repetición
    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        self.loop_mode = LoopMode::Off;
        info!("🗑️ Cola limpiada: {} tracks removidos", cleared);
        cleared
    }

    /// Olvida la pista actual para que `Single` no la repita
    pub fn forget_current(&mut self) -> Option<Track> {
        self.current.take()
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
        match mode {
            LoopMode::Off => info!("➡️ Repetición desactivada"),
            LoopMode::Single => info!("🔂 Repetir canción activado"),
            LoopMode::Queue => info!("🔁 Repetir cola activado"),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn snapshot(&self, limit: usize) -> QueueSnapshot {
        QueueSnapshot {
            current: self.current.clone(),
            upcoming: self.peek(limit).cloned().collect(),
            total_items: self.items.len(),
            loop_mode: self.loop_mode,
            total_duration: self.items.iter().filter_map(Track::duration).sum(),
        }
    }
}

/// Copia de solo lectura del estado de la cola, para mostrar
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    pub current: Option<Track>,
    pub upcoming: Vec<Track>,
    pub total_items: usize,
    pub loop_mode: LoopMode,
    pub total_duration: Duration,
}

impl QueueSnapshot {
    /// Obtiene una página (desde 1) de las pistas en espera
    pub fn get_page(&self, page: usize, items_per_page: usize) -> QueuePage<'_> {
        let items_per_page = items_per_page.max(1);
        let total_pages = self.upcoming.len().div_ceil(items_per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * items_per_page;
        let end = (start + items_per_page).min(self.upcoming.len());

        QueuePage {
            items: self.upcoming.get(start..end).unwrap_or_default(),
            first_position: start + 1,
            current_page,
            total_pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage<'a> {
    pub items: &'a [Track],
    pub first_position: usize,
    pub current_page: usize,
    pub total_pages: usize,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn track(title: &str) -> Track {
        let candidate = TrackCandidate::new(title, format!("https://cdn/{}", title), SourceLabel::Search)
            .with_title(Some(title.to_string()))
            .with_duration_secs(Some(60.0));
        Track::from_candidate(candidate, UserId::new(42))
    }

    fn titles<'a>(tracks: impl Iterator<Item = &'a Track>) -> Vec<&'a str> {
        tracks.map(|t| t.title.as_str()).collect()
    }

    fn drain(queue: &mut MusicQueue, steps: usize) -> Vec<String> {
        (0..steps)
            .filter_map(|_| queue.advance())
            .map(|t| t.title)
            .collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = MusicQueue::new(10);
        for title in ["a", "b", "c"] {
            queue.push(track(title));
        }

        assert_eq!(drain(&mut queue, 4), vec!["a", "b", "c"]);
        assert!(queue.is_empty());
        // La última reproducida sigue como actual
        assert_eq!(queue.current().map(|t| t.title.as_str()), Some("c"));
    }

    #[test]
    fn test_single_loop_repeats_current() {
        let mut queue = MusicQueue::new(10);
        queue.push(track("x"));
        queue.push(track("y"));
        queue.advance();
        queue.set_loop_mode(LoopMode::Single);

        assert_eq!(drain(&mut queue, 3), vec!["x", "x", "x"]);
        assert_eq!(titles(queue.peek(10)), vec!["y"]);
    }

    #[test]
    fn test_forget_current_bypasses_single() {
        let mut queue = MusicQueue::new(10);
        queue.push(track("x"));
        queue.push(track("y"));
        queue.set_loop_mode(LoopMode::Single);
        queue.advance();

        queue.forget_current();

        assert_eq!(drain(&mut queue, 2), vec!["y", "y"]);
    }

    #[test]
    fn test_queue_loop_rotates_with_constant_length() {
        let mut queue = MusicQueue::new(10);
        queue.push(track("a"));
        queue.push(track("b"));
        queue.set_loop_mode(LoopMode::Queue);

        let mut played = Vec::new();
        for _ in 0..6 {
            assert_eq!(queue.len(), 2);
            played.push(queue.advance().unwrap().title);
        }

        assert_eq!(played, vec!["a", "b", "a", "b", "a", "b"]);
    }

    #[test]
    fn test_push_respects_max_size() {
        let mut queue = MusicQueue::new(2);
        assert_eq!(queue.push(track("a")), Some(1));
        assert_eq!(queue.push(track("b")), Some(2));
        assert_eq!(queue.push(track("c")), None);
    }

    #[test]
    fn test_clear_resets_loop_mode() {
        let mut queue = MusicQueue::new(10);
        queue.push(track("a"));
        queue.set_loop_mode(LoopMode::Queue);

        assert_eq!(queue.clear(), 1);
        assert!(queue.is_empty());
        assert_eq!(queue.loop_mode(), LoopMode::Off);
    }

    #[test]
    fn test_peek_is_restartable_and_bounded() {
        let mut queue = MusicQueue::new(10);
        for title in ["a", "b", "c", "d"] {
            queue.push(track(title));
        }

        let view = queue.peek(2);
        assert_eq!(titles(view.clone()), vec!["a", "b"]);
        assert_eq!(titles(view), vec!["a", "b"]);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_snapshot_pages() {
        let mut queue = MusicQueue::new(50);
        for i in 0..12 {
            queue.push(track(&format!("t{}", i)));
        }

        let snapshot = queue.snapshot(50);
        assert_eq!(snapshot.total_duration, Duration::from_secs(12 * 60));

        let page = snapshot.get_page(2, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.first_position, 6);
        assert_eq!(titles(page.items.iter()), vec!["t5", "t6", "t7", "t8", "t9"]);

        let last = snapshot.get_page(99, 5);
        assert_eq!(last.current_page, 3);
        assert_eq!(last.items.len(), 2);
    }

    #[test]
    fn test_loop_mode_parse() {
        assert_eq!(LoopMode::parse("track"), Some(LoopMode::Single));
        assert_eq!(LoopMode::parse("QUEUE"), Some(LoopMode::Queue));
        assert_eq!(LoopMode::parse("off"), Some(LoopMode::Off));
        assert_eq!(LoopMode::parse("forever"), None);
    }
}
