//! Transfer planning - from a local media tree to a queue of work items
//!
//! The planner walks a scan root once, classifies every regular file and
//! builds the transfer queue plus the deduplicated set of destination
//! directories to create on the remote side. It is pure local
//! computation: the only I/O is the filesystem walk (and an existence
//! probe for VobSub twins). The walk is taken as a single snapshot
//! sorted by relative path so repeated runs over an unchanged tree
//! produce identical plans.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::classify::{self, ParseResult};
use crate::normalize::{canonical_show_name, AliasTable};

/// Which kind of library the scan root holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Episodic content; only videos with an episode pattern are queued.
    Shows,
    /// Standalone titles; every recognized video is queued to `Movies`.
    Movies,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: ScanMode,
    /// Remote base path the destination directories are built under.
    pub remote_base: String,
    pub aliases: AliasTable,
}

/// One unit of transfer work: a local source file and the remote
/// directory it lands in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferItem {
    pub source: PathBuf,
    pub dest_dir: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Stats {
    /// Videos accepted into the queue.
    pub parsed: usize,
    /// Junk and unrecognized files reported and left behind.
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct Plan {
    pub queue: Vec<TransferItem>,
    /// Deduplicated destination directories, created before any transfer.
    pub directories: BTreeSet<String>,
    pub stats: Stats,
    /// Set when part of the tree could not be enumerated; the run still
    /// proceeds but must exit non-zero.
    pub walk_failed: bool,
}

struct Builder<'a> {
    scan_root: &'a Path,
    settings: &'a Settings,
    siblings: HashMap<PathBuf, HashMap<String, String>>,
    seen: HashSet<PathBuf>,
    plan: Plan,
}

impl Builder<'_> {
    fn push(&mut self, source: PathBuf, dest_dir: &str) -> bool {
        // sources are discovered once; never queue the same file twice
        if !self.seen.insert(source.clone()) {
            return false;
        }
        self.plan.queue.push(TransferItem {
            source,
            dest_dir: dest_dir.to_string(),
        });
        true
    }

    fn queue_video(&mut self, rel: &Path, name: &str, dest_dir: String) {
        self.plan.directories.insert(dest_dir.clone());
        self.push(self.scan_root.join(rel), &dest_dir);
        self.plan.stats.parsed += 1;
        self.queue_companions(rel, name, &dest_dir);
    }

    /// Queue sibling subtitle files sharing the video's base name.
    fn queue_companions(&mut self, rel: &Path, name: &str, dest_dir: &str) {
        let Some((stem, _)) = name.rsplit_once('.') else {
            return;
        };
        let parent = rel.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        let stem_lower = stem.to_ascii_lowercase();
        let mut queued_exts: Vec<&str> = Vec::new();
        for ext in classify::SUBTITLE_EXTENSIONS {
            let key = format!("{stem_lower}.{ext}");
            let actual = self
                .siblings
                .get(&parent)
                .and_then(|names| names.get(&key))
                .cloned();
            if let Some(actual) = actual {
                if self.push(self.scan_root.join(&parent).join(&actual), dest_dir) {
                    tracing::debug!("queued companion subtitle {:?}", actual);
                    queued_exts.push(ext);
                }
            }
        }
        // a .idx never travels without its .sub twin (and vice versa),
        // even when the walk did not discover the twin itself
        for (have, want) in [("idx", "sub"), ("sub", "idx")] {
            if queued_exts.contains(&have) && !queued_exts.contains(&want) {
                let candidate = self.scan_root.join(&parent).join(format!("{stem}.{want}"));
                if candidate.is_file() {
                    tracing::info!("pairing VobSub twin {:?}", candidate);
                    self.push(candidate, dest_dir);
                }
            }
        }
    }
}

/// Build the transfer plan for `scan_root`.
///
/// Junk and unrecognized files are logged with their relative path and
/// counted as skipped; an unreadable subtree is a warning that sets
/// `walk_failed` without aborting the rest of the walk.
pub fn plan(scan_root: &Path, settings: &Settings) -> anyhow::Result<Plan> {
    anyhow::ensure!(
        scan_root.is_dir(),
        "scan root {:?} does not exist or is not a directory",
        scan_root
    );
    let mut walk_failed = false;
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in walkdir::WalkDir::new(scan_root) {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Ok(rel) = entry.path().strip_prefix(scan_root) {
                    files.push(rel.to_path_buf());
                }
            }
            Err(error) => {
                tracing::warn!("cannot enumerate under {:?}: {}", scan_root, &error);
                walk_failed = true;
            }
        }
    }
    files.sort();

    let mut siblings: HashMap<PathBuf, HashMap<String, String>> = HashMap::new();
    for rel in &files {
        let Some(name) = rel.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let parent = rel.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        siblings
            .entry(parent)
            .or_default()
            .insert(name.to_ascii_lowercase(), name.to_string());
    }

    let base = settings.remote_base.trim_end_matches('/').to_string();
    let mut builder = Builder {
        scan_root,
        settings,
        siblings,
        seen: HashSet::new(),
        plan: Plan {
            walk_failed,
            ..Default::default()
        },
    };
    for rel in &files {
        let Some(name) = rel.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!("skipping non-UTF-8 file name {:?}", rel);
            builder.plan.stats.skipped += 1;
            continue;
        };
        let name = name.to_string();
        match classify::classify(&name) {
            ParseResult::Junk => {
                tracing::info!("skipping junk file {:?}", rel);
                builder.plan.stats.skipped += 1;
            }
            ParseResult::Subtitle => {
                // queued only as a video's companion
                tracing::debug!("subtitle {:?} awaits its video", rel);
            }
            ParseResult::Unrecognized => {
                tracing::warn!("skipping unrecognized file {:?}", rel);
                builder.plan.stats.skipped += 1;
            }
            ParseResult::Episode(identity) => match builder.settings.mode {
                ScanMode::Shows => {
                    let show =
                        canonical_show_name(&identity.title, &name, &builder.settings.aliases);
                    let dest_dir = format!("{base}/Shows/{show}/Season {}", identity.season);
                    builder.queue_video(rel, &name, dest_dir);
                }
                ScanMode::Movies => {
                    builder.queue_video(rel, &name, format!("{base}/Movies"));
                }
            },
            ParseResult::Movie => match builder.settings.mode {
                ScanMode::Movies => {
                    builder.queue_video(rel, &name, format!("{base}/Movies"));
                }
                ScanMode::Shows => {
                    tracing::warn!("skipping video without an episode pattern {:?}", rel);
                    builder.plan.stats.skipped += 1;
                }
            },
        }
    }
    Ok(builder.plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "x").unwrap();
    }

    fn shows_settings() -> Settings {
        Settings {
            mode: ScanMode::Shows,
            remote_base: "/srv/media".to_string(),
            aliases: AliasTable::default(),
        }
    }

    fn sources(plan: &Plan) -> Vec<String> {
        plan.queue
            .iter()
            .map(|item| item.source.file_name().unwrap().to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn episodes_and_companions_are_queued() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "Show.Name/Show.Name.S01E02.mkv");
        write(tmp.path(), "Show.Name/Show.Name.S01E02.srt");
        let plan = plan(tmp.path(), &shows_settings()).unwrap();
        assert_eq!(plan.stats.parsed, 1);
        assert_eq!(plan.queue.len(), 2);
        let dir = "/srv/media/Shows/Show Name/Season 1";
        assert!(plan.queue.iter().all(|item| item.dest_dir == dir));
        assert_eq!(plan.directories.len(), 1);
        assert!(plan.directories.contains(dir));
    }

    #[test]
    fn junk_is_reported_but_never_queued() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "The.Show.S01E01.Sample.mkv");
        write(tmp.path(), "The.Show.S01E01.mkv");
        let plan = plan(tmp.path(), &shows_settings()).unwrap();
        assert_eq!(plan.stats.parsed, 1);
        assert_eq!(plan.stats.skipped, 1);
        assert!(!sources(&plan).iter().any(|s| s.contains("Sample")));
    }

    #[test]
    fn unrecognized_files_are_counted_as_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "Show.S01E02.nfo");
        write(tmp.path(), "random-notes.txt");
        let plan = plan(tmp.path(), &shows_settings()).unwrap();
        assert_eq!(plan.stats.parsed, 0);
        assert_eq!(plan.stats.skipped, 2);
        assert!(plan.queue.is_empty());
        assert!(plan.directories.is_empty());
    }

    #[test]
    fn vobsub_pair_travels_together() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "Show.S01E02.mkv");
        write(tmp.path(), "Show.S01E02.idx");
        write(tmp.path(), "Show.S01E02.sub");
        let plan = plan(tmp.path(), &shows_settings()).unwrap();
        let names = sources(&plan);
        assert_eq!(
            names.iter().filter(|n| n.ends_with(".idx")).count(),
            1,
            "exactly one idx"
        );
        assert_eq!(
            names.iter().filter(|n| n.ends_with(".sub")).count(),
            1,
            "exactly one sub"
        );
        assert_eq!(plan.queue.len(), 3);
    }

    #[test]
    fn standalone_subtitles_are_not_queued() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "orphan.srt");
        let plan = plan(tmp.path(), &shows_settings()).unwrap();
        assert!(plan.queue.is_empty());
        assert_eq!(plan.stats.skipped, 0);
    }

    #[test]
    fn x_form_and_season_folding() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "Show_Name.1x02.mkv");
        write(tmp.path(), "Show.Name.S01E03.mkv");
        let plan = plan(tmp.path(), &shows_settings()).unwrap();
        // both spellings normalize into the same destination directory
        assert_eq!(plan.directories.len(), 1);
        assert!(plan
            .directories
            .contains("/srv/media/Shows/Show Name/Season 1"));
    }

    #[test]
    fn movies_mode_queues_any_video_to_one_directory() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "Some.Movie.2019.mkv");
        write(tmp.path(), "Some.Movie.2019.srt");
        write(tmp.path(), "Concert.S01E01.mkv"); // episodic name, still a movie here
        let settings = Settings {
            mode: ScanMode::Movies,
            remote_base: "/srv/media/".to_string(),
            aliases: AliasTable::default(),
        };
        let plan = plan(tmp.path(), &settings).unwrap();
        assert_eq!(plan.stats.parsed, 2);
        assert_eq!(plan.queue.len(), 3);
        assert_eq!(plan.directories.len(), 1);
        assert!(plan.directories.contains("/srv/media/Movies"));
    }

    #[test]
    fn alias_rewrites_destination() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "Show.Name.S02E01.mkv");
        let settings = Settings {
            mode: ScanMode::Shows,
            remote_base: "/srv/media".to_string(),
            aliases: AliasTable::parse("Show Name = Renamed Show"),
        };
        let plan = plan(tmp.path(), &settings).unwrap();
        assert!(plan
            .directories
            .contains("/srv/media/Shows/Renamed Show/Season 2"));
    }

    #[test]
    fn planning_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "A.Show/A.Show.S01E01.mkv");
        write(tmp.path(), "A.Show/A.Show.S01E01.srt");
        write(tmp.path(), "B.Show/B.Show.3x07.mkv");
        write(tmp.path(), "B.Show/B.Show.S02.Sample.mkv");
        let settings = shows_settings();
        let first = plan(tmp.path(), &settings).unwrap();
        let second = plan(tmp.path(), &settings).unwrap();
        assert_eq!(first.queue, second.queue);
        assert_eq!(first.directories, second.directories);
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn missing_scan_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        assert!(plan(&missing, &shows_settings()).is_err());
    }
}
