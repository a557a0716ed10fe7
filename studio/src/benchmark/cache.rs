//! Content-addressed benchmark cache.
//!
//! Reports are keyed by a 16-hex truncated MD5 of the sorted, pipe-joined
//! normalized channel identifiers; a per-URL index file maps each single
//! channel to its report key. Writes are full-file replaces; a missing
//! sibling index reads as a cache miss. There is no time-based eviction;
//! entries live until the user asks for reanalysis.

use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::report::BenchmarkReport;

static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtube\.com/@([^/?]+)").unwrap());
static CHANNEL_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtube\.com/channel/([^/?]+)").unwrap());
static CUSTOM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"youtube\.com/c/([^/?]+)").unwrap());

/// Percent-decodes a URL (UTF-8; invalid sequences are kept verbatim).
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
            if let Ok(b) = u8::from_str_radix(hex, 16) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}

/// Canonical identifier for a channel URL: `@handle` (lowercased),
/// `channel/UC…` id, `c/name` (lowercased), or a lowercased bare handle.
/// Idempotent: normalizing a normalized id returns it unchanged.
pub fn normalize_channel_url(url: &str) -> String {
    let url = percent_decode(url.trim()).trim_end_matches('/').to_string();

    if let Some(m) = HANDLE_RE.captures(&url) {
        return format!("@{}", m[1].to_lowercase());
    }
    if let Some(m) = CHANNEL_ID_RE.captures(&url) {
        return m[1].to_string();
    }
    if let Some(m) = CUSTOM_RE.captures(&url) {
        return format!("c/{}", m[1].to_lowercase());
    }
    if !url.starts_with("http") {
        if url.starts_with('@') || url.starts_with("c/") {
            return url.to_lowercase().replace(' ', "");
        }
        return format!("@{}", url.to_lowercase().replace(' ', ""));
    }
    url
}

fn short_md5(input: &str) -> String {
    let digest = md5::compute(input.as_bytes());
    format!("{digest:x}")[..16].to_string()
}

/// Cache key for a set of channel URLs.
pub fn cache_key(channel_urls: &[String]) -> String {
    let mut normalized: Vec<String> =
        channel_urls.iter().map(|u| normalize_channel_url(u)).collect();
    normalized.sort();
    short_md5(&normalized.join("|"))
}

/// Index key for a single channel URL.
fn single_channel_key(channel_url: &str) -> String {
    short_md5(&normalize_channel_url(channel_url))
}

/// One persisted cache entry: the report plus its addressing metadata.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub cache_key: String,
    pub channel_urls: Vec<String>,
    pub normalized_urls: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub report: BenchmarkReport,
}

#[derive(Serialize, Deserialize)]
struct IndexEntry {
    channel_url: String,
    normalized_url: String,
    cache_key: String,
    updated_at: String,
}

/// File-backed cache under one directory: `<key>.json` report files and
/// `index_<key>.json` per-URL pointers.
pub struct BenchmarkCache {
    dir: PathBuf,
}

impl BenchmarkCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn report_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn index_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("index_{}.json", single_channel_key(url)))
    }

    fn write_json<T: Serialize>(&self, path: &PathBuf, value: &T) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, text)
    }

    /// Stores the report, overwriting any previous entry for these URLs and
    /// repointing every per-URL index at the new key. Returns the key.
    pub fn save(
        &self,
        channel_urls: &[String],
        report: &BenchmarkReport,
    ) -> std::io::Result<String> {
        let key = cache_key(channel_urls);
        let now = Utc::now().to_rfc3339();
        let entry = CacheEntry {
            cache_key: key.clone(),
            channel_urls: channel_urls.to_vec(),
            normalized_urls: channel_urls
                .iter()
                .map(|u| normalize_channel_url(u))
                .collect(),
            created_at: now.clone(),
            updated_at: now.clone(),
            report: report.clone(),
        };
        self.write_json(&self.report_path(&key), &entry)?;

        for url in channel_urls {
            let index = IndexEntry {
                channel_url: url.clone(),
                normalized_url: normalize_channel_url(url),
                cache_key: key.clone(),
                updated_at: now.clone(),
            };
            self.write_json(&self.index_path(url), &index)?;
        }
        debug!(key = %key, "benchmark saved");
        Ok(key)
    }

    /// Looks up the per-URL index and loads the referenced report.
    /// Missing index, missing report or unreadable JSON is a miss.
    pub fn find(&self, channel_url: &str) -> Option<CacheEntry> {
        let index_path = self.index_path(channel_url);
        let index: IndexEntry =
            serde_json::from_str(&std::fs::read_to_string(&index_path).ok()?).ok()?;
        let report_path = self.report_path(&index.cache_key);
        match std::fs::read_to_string(&report_path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(path = %report_path.display(), error = %e, "cache entry unreadable");
                    None
                }
            },
            Err(_) => None,
        }
    }

    /// Removes the report file and the URL's index entry.
    pub fn delete(&self, channel_url: &str) -> bool {
        let index_path = self.index_path(channel_url);
        let Ok(text) = std::fs::read_to_string(&index_path) else {
            return false;
        };
        let Ok(index) = serde_json::from_str::<IndexEntry>(&text) else {
            return false;
        };
        let _ = std::fs::remove_file(self.report_path(&index.cache_key));
        std::fs::remove_file(&index_path).is_ok()
    }

    /// Rewrites every index file from the report files on disk; returns the
    /// number of indexed URLs.
    pub fn rebuild_index(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return 0;
        };
        let mut count = 0;
        for dir_entry in entries.flatten() {
            let name = dir_entry.file_name().to_string_lossy().to_string();
            if name.starts_with("index_") || !name.ends_with(".json") {
                continue;
            }
            let Ok(text) = std::fs::read_to_string(dir_entry.path()) else {
                continue;
            };
            let Ok(entry) = serde_json::from_str::<CacheEntry>(&text) else {
                continue;
            };
            for url in &entry.channel_urls {
                let index = IndexEntry {
                    channel_url: url.clone(),
                    normalized_url: normalize_channel_url(url),
                    cache_key: entry.cache_key.clone(),
                    updated_at: Utc::now().to_rfc3339(),
                };
                if self.write_json(&self.index_path(url), &index).is_ok() {
                    count += 1;
                }
            }
        }
        count
    }

    /// Short human summary of a cached entry: channel names, analysis time,
    /// and a 100-character concept excerpt.
    pub fn summary(entry: &CacheEntry) -> String {
        let date_str = DateTime::parse_from_rfc3339(&entry.created_at)
            .map(|dt| {
                dt.with_timezone(&Local)
                    .format("%Y년 %m월 %d일 %H:%M")
                    .to_string()
            })
            .unwrap_or_else(|_| entry.created_at.clone());

        let channel_names: Vec<String> = entry
            .channel_urls
            .iter()
            .map(|u| {
                let n = normalize_channel_url(u);
                n.strip_prefix('@').map(str::to_string).unwrap_or(n)
            })
            .collect();

        let mut summary = format!(
            "**이미 벤치마킹된 채널입니다!**\n\n**채널:** {}\n**분석 일시:** {}\n",
            channel_names.join(", "),
            date_str
        );

        let concept = &entry.report.channel_concept;
        if concept.chars().count() > 10 {
            let excerpt: String = concept.chars().take(100).collect();
            summary.push_str(&format!("\n**컨셉:** {excerpt}..."));
        }

        summary.push_str(
            "\n\n• **기존 결과 사용:** '확인' 또는 '다음'\n• **새로 분석:** '업데이트' 또는 '다시 분석'",
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_canonical_forms() {
        assert_eq!(
            normalize_channel_url("https://youtube.com/@SomeHandle/"),
            "@somehandle"
        );
        assert_eq!(
            normalize_channel_url("https://www.youtube.com/channel/UCabc123"),
            "UCabc123"
        );
        assert_eq!(
            normalize_channel_url("https://youtube.com/c/MyChannel"),
            "c/mychannel"
        );
        assert_eq!(normalize_channel_url("Bare Name"), "@barename");
    }

    #[test]
    fn normalization_is_idempotent() {
        for input in [
            "https://youtube.com/@Foo",
            "UCabc123",
            "c/mychannel",
            "plain",
        ] {
            let once = normalize_channel_url(input);
            assert_eq!(normalize_channel_url(&once), once);
        }
    }

    #[test]
    fn normalization_percent_decodes() {
        // %EC%9C%A0 = "유"
        let n = normalize_channel_url("https://youtube.com/@%EC%9C%A0");
        assert_eq!(n, "@유");
    }

    #[test]
    fn cache_key_is_order_insensitive() {
        let a = cache_key(&["youtube.com/@a".into(), "youtube.com/@b".into()]);
        let b = cache_key(&["youtube.com/@b".into(), "youtube.com/@a".into()]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    fn sample_report() -> BenchmarkReport {
        BenchmarkReport {
            analyzed_channels: vec!["foo".into()],
            analyzed_videos_count: 12,
            channel_concept: "경제 교육 채널로서 초보자를 위한 쉬운 설명이 핵심".into(),
            ..Default::default()
        }
    }

    #[test]
    fn save_then_find_returns_the_report() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BenchmarkCache::new(dir.path());
        let urls = vec!["https://youtube.com/@foo".to_string()];
        cache.save(&urls, &sample_report()).unwrap();

        let found = cache.find("youtube.com/@FOO").unwrap();
        assert_eq!(found.report, sample_report());
        assert_eq!(found.normalized_urls, vec!["@foo"]);
    }

    #[test]
    fn delete_then_find_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BenchmarkCache::new(dir.path());
        let urls = vec!["https://youtube.com/@foo".to_string()];
        cache.save(&urls, &sample_report()).unwrap();

        assert!(cache.delete("https://youtube.com/@foo"));
        assert!(cache.find("https://youtube.com/@foo").is_none());
        assert!(!cache.delete("https://youtube.com/@foo"));
    }

    #[test]
    fn missing_index_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BenchmarkCache::new(dir.path());
        assert!(cache.find("https://youtube.com/@nobody").is_none());
    }

    #[test]
    fn rebuild_index_restores_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BenchmarkCache::new(dir.path());
        let urls = vec!["https://youtube.com/@foo".to_string()];
        cache.save(&urls, &sample_report()).unwrap();

        // Drop the index file but keep the report.
        let index = dir
            .path()
            .read_dir()
            .unwrap()
            .flatten()
            .find(|e| e.file_name().to_string_lossy().starts_with("index_"))
            .unwrap();
        std::fs::remove_file(index.path()).unwrap();
        assert!(cache.find("https://youtube.com/@foo").is_none());

        assert_eq!(cache.rebuild_index(), 1);
        assert!(cache.find("https://youtube.com/@foo").is_some());
    }

    #[test]
    fn summary_contains_channel_and_concept_excerpt() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BenchmarkCache::new(dir.path());
        let urls = vec!["https://youtube.com/@foo".to_string()];
        cache.save(&urls, &sample_report()).unwrap();
        let entry = cache.find("https://youtube.com/@foo").unwrap();

        let summary = BenchmarkCache::summary(&entry);
        assert!(summary.contains("foo"));
        assert!(summary.contains("컨셉"));
        assert!(summary.contains("다시 분석"));
    }
}
