//! Path policy: every directory and file the system writes derives from one
//! data root here. Nothing else in the tree builds persistent paths.

use std::path::{Path, PathBuf};

/// Resolved path layout under a single data root.
#[derive(Clone, Debug)]
pub struct PathPolicy {
    root: PathBuf,
}

impl PathPolicy {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// SQLite file holding all sessions.
    pub fn sessions_db(&self) -> PathBuf {
        self.root.join("sessions.db")
    }

    /// Provider quota counters.
    pub fn quota_file(&self) -> PathBuf {
        self.root.join("api-quotas.json")
    }

    /// Benchmark report cache directory.
    pub fn benchmark_cache_dir(&self) -> PathBuf {
        self.root.join("benchmark_cache")
    }

    /// Root of all per-session outputs.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    /// Per-session output directory (generated images, videos, composition).
    pub fn session_output_dir(&self, session_id: &str) -> PathBuf {
        self.output_dir().join(session_id)
    }

    /// Per-session voiceover directory.
    pub fn voiceover_dir(&self, session_id: &str) -> PathBuf {
        self.session_output_dir(session_id).join("voiceover")
    }

    /// Voice sample library (precomputed cloning samples).
    pub fn voice_samples_dir(&self) -> PathBuf {
        self.root.join("voices").join("samples")
    }

    /// Index of the voice sample library.
    pub fn voice_samples_index(&self) -> PathBuf {
        self.root.join("voices").join("samples.json")
    }

    /// Output directories whose names contain the session id, for deletion.
    pub fn session_owned_dirs(&self, session_id: &str) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(self.output_dir()) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter(|e| e.file_name().to_string_lossy().contains(session_id))
            .map(|e| e.path())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_paths_stay_under_the_root() {
        let p = PathPolicy::new("/tmp/studio-test");
        for path in [
            p.sessions_db(),
            p.quota_file(),
            p.benchmark_cache_dir(),
            p.session_output_dir("s1"),
            p.voiceover_dir("s1"),
            p.voice_samples_dir(),
        ] {
            assert!(path.starts_with("/tmp/studio-test"));
        }
    }

    #[test]
    fn session_owned_dirs_matches_by_substring() {
        let dir = tempfile::tempdir().unwrap();
        let p = PathPolicy::new(dir.path());
        std::fs::create_dir_all(p.output_dir().join("sess-42")).unwrap();
        std::fs::create_dir_all(p.output_dir().join("other")).unwrap();
        let owned = p.session_owned_dirs("sess-42");
        assert_eq!(owned.len(), 1);
        assert!(owned[0].ends_with("sess-42"));
    }
}
