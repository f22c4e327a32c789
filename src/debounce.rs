//! Turning bursts of raw file events into reload triggers.
//!
//! ```text
//! notify events → Debouncer (timing, dedup) → Classifier (code or asset) → ReloadTrigger
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::event::ModifyKind;
use notify::EventKind;

/// A debounced request to reload one kind of thing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadTrigger {
    /// A script changed: re-execute the script.
    Code(PathBuf),
    /// A resource bundle changed: load it into the engine.
    Asset(PathBuf),
}

impl ReloadTrigger {
    /// The path that caused this trigger.
    pub fn path(&self) -> &Path {
        match self {
            ReloadTrigger::Code(path) | ReloadTrigger::Asset(path) => path,
        }
    }

    fn same_kind(&self, other: &ReloadTrigger) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Keep only the most recent trigger of each kind, in arrival order.
///
/// Each reload re-reads everything from disk, so an older trigger of the same
/// kind has nothing left to contribute.
pub fn coalesce<I: IntoIterator<Item = ReloadTrigger>>(triggers: I) -> Vec<ReloadTrigger> {
    let mut kept: Vec<ReloadTrigger> = Vec::new();
    for trigger in triggers {
        kept.retain(|t| !t.same_kind(&trigger));
        kept.push(trigger);
    }
    kept
}

/// Groups events into batches that close after `window` of quiet.
///
/// Pure timing: no knowledge of what the paths mean.
pub struct Debouncer {
    window: Duration,
    paths: Vec<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    /// Create a debouncer with the given quiet window.
    pub fn new(window: Duration) -> Self {
        Debouncer {
            window,
            paths: Vec::new(),
            last_event: None,
        }
    }

    /// Add a raw watcher event observed at `now`.
    ///
    /// Only creations and content or name changes count. Metadata-only changes
    /// and removals are ignored, as are editor temp files.
    pub fn add_event(&mut self, event: &notify::Event, now: Instant) {
        match event.kind {
            EventKind::Create(_) => {}
            EventKind::Modify(ModifyKind::Metadata(_)) => return,
            EventKind::Modify(_) => {}
            _ => return,
        }

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            log::debug!("change: {}", path.display());
            // Move repeated paths to the back so the batch stays in recency order.
            self.paths.retain(|p| p != path);
            self.paths.push(path.clone());
            self.last_event = Some(now);
        }
    }

    /// Whether a non-empty batch has been quiet for a full window.
    pub fn is_ready(&self, now: Instant) -> bool {
        match self.last_event {
            Some(last) => !self.paths.is_empty() && now.duration_since(last) >= self.window,
            None => false,
        }
    }

    /// Close and return the current batch if it is ready.
    pub fn take_if_ready(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        if !self.is_ready(now) {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.paths))
    }

    /// How long to wait before the current batch could be ready.
    ///
    /// `None` when there is nothing pending.
    pub fn sleep_duration(&self, now: Instant) -> Option<Duration> {
        let last = self.last_event?;
        Some(
            self.window
                .saturating_sub(now.duration_since(last))
                .max(Duration::from_millis(1)),
        )
    }
}

/// Decides what kind of reload a closed batch calls for.
#[derive(Debug, Clone)]
pub struct Classifier {
    script_extension: String,
    asset_extension: String,
}

impl Classifier {
    /// Create a classifier for the given file extensions (without the dot).
    pub fn new(script_extension: &str, asset_extension: &str) -> Self {
        Classifier {
            script_extension: script_extension.to_string(),
            asset_extension: asset_extension.to_string(),
        }
    }

    /// Classify a batch (ordered oldest to newest).
    ///
    /// Any script in the batch makes it a code reload, since the script loads
    /// its own resources. Otherwise the newest bundle makes it an asset reload.
    /// Batches touching neither produce no trigger.
    pub fn classify(&self, batch: &[PathBuf]) -> Option<ReloadTrigger> {
        if let Some(script) = batch.iter().rev().find(|p| self.is_script(p)) {
            return Some(ReloadTrigger::Code(script.clone()));
        }
        batch
            .iter()
            .rev()
            .find(|p| self.is_asset(p))
            .map(|p| ReloadTrigger::Asset(p.clone()))
    }

    /// Whether `path` has the script extension.
    pub fn is_script(&self, path: &Path) -> bool {
        has_extension(path, &self.script_extension)
    }

    /// Whether `path` has the resource bundle extension.
    pub fn is_asset(&self, path: &Path) -> bool {
        has_extension(path, &self.asset_extension)
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(extension)
}

/// Editor swap files, backups and dotfiles.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(paths: &[&str], kind: EventKind) -> notify::Event {
        notify::Event {
            kind,
            paths: paths.iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    fn modify() -> EventKind {
        EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Any))
    }

    const WINDOW: Duration = Duration::from_millis(50);

    #[test]
    fn empty_debouncer_is_never_ready() {
        let debouncer = Debouncer::new(WINDOW);
        assert!(!debouncer.is_ready(Instant::now() + WINDOW * 10));
        assert_eq!(debouncer.sleep_duration(Instant::now()), None);
    }

    #[test]
    fn burst_closes_after_quiet_window() {
        let mut debouncer = Debouncer::new(WINDOW);
        let start = Instant::now();
        debouncer.add_event(&event(&["/g/game.lua"], modify()), start);
        debouncer.add_event(
            &event(&["/g/game.lua"], modify()),
            start + Duration::from_millis(30),
        );

        // 50ms after the first event but only 20ms after the last.
        assert!(debouncer
            .take_if_ready(start + Duration::from_millis(50))
            .is_none());

        let batch = debouncer
            .take_if_ready(start + Duration::from_millis(80))
            .unwrap();
        assert_eq!(batch, vec![PathBuf::from("/g/game.lua")]);
        assert!(!debouncer.is_ready(start + Duration::from_secs(1)));
    }

    #[test]
    fn ignores_metadata_removals_and_temp_files() {
        let mut debouncer = Debouncer::new(WINDOW);
        let now = Instant::now();
        debouncer.add_event(
            &event(
                &["/g/game.lua"],
                EventKind::Modify(ModifyKind::Metadata(notify::event::MetadataKind::Any)),
            ),
            now,
        );
        debouncer.add_event(
            &event(
                &["/g/game.lua"],
                EventKind::Remove(notify::event::RemoveKind::File),
            ),
            now,
        );
        debouncer.add_event(&event(&["/g/.game.lua.swp", "/g/game.lua~"], modify()), now);
        assert_eq!(debouncer.sleep_duration(now), None);
    }

    #[test]
    fn sleep_duration_counts_down() {
        let mut debouncer = Debouncer::new(WINDOW);
        let start = Instant::now();
        debouncer.add_event(
            &event(&["/g/a.fres"], EventKind::Create(notify::event::CreateKind::File)),
            start,
        );
        assert_eq!(
            debouncer.sleep_duration(start + Duration::from_millis(20)),
            Some(Duration::from_millis(30))
        );
        assert_eq!(
            debouncer.sleep_duration(start + Duration::from_millis(200)),
            Some(Duration::from_millis(1))
        );
    }

    #[test]
    fn code_wins_over_assets() {
        let classifier = Classifier::new("lua", "fres");
        let batch = vec![
            PathBuf::from("/g/art.fres"),
            PathBuf::from("/g/game.lua"),
            PathBuf::from("/g/more.fres"),
        ];
        assert_eq!(
            classifier.classify(&batch),
            Some(ReloadTrigger::Code(PathBuf::from("/g/game.lua")))
        );
    }

    #[test]
    fn newest_asset_is_used() {
        let classifier = Classifier::new("lua", "fres");
        let batch = vec![PathBuf::from("/g/old.fres"), PathBuf::from("/g/new.fres")];
        assert_eq!(
            classifier.classify(&batch),
            Some(ReloadTrigger::Asset(PathBuf::from("/g/new.fres")))
        );
    }

    #[test]
    fn unrelated_batch_is_dropped() {
        let classifier = Classifier::new("lua", "fres");
        let batch = vec![PathBuf::from("/g/README.md")];
        assert_eq!(classifier.classify(&batch), None);
    }

    #[test]
    fn coalesce_keeps_latest_of_each_kind() {
        let triggers = vec![
            ReloadTrigger::Code("a.lua".into()),
            ReloadTrigger::Asset("x.fres".into()),
            ReloadTrigger::Code("b.lua".into()),
        ];
        assert_eq!(
            coalesce(triggers),
            vec![
                ReloadTrigger::Asset("x.fres".into()),
                ReloadTrigger::Code("b.lua".into()),
            ]
        );
    }
}
