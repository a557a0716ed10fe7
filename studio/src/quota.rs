//! Per-provider usage quotas with daily/monthly auto-reset.
//!
//! State lives in one JSON file read and rewritten under a process-wide
//! mutex. A provider is blocked once usage would reach 95% of its limit and
//! unblocked when its period rolls over. Durability is best effort: a lost
//! write loses at most the delta since the last write, and a missing or
//! corrupt file reads as zero usage for every provider.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Warn when usage passes this percentage of the limit.
pub const WARN_THRESHOLD: u64 = 80;
/// Block the provider when usage would reach this percentage of the limit.
pub const BLOCK_THRESHOLD: u64 = 95;

/// Per-provider request limits. Daily limits reset at UTC midnight, monthly
/// at the month boundary. Providers absent from both maps are unlimited.
#[derive(Clone, Debug)]
pub struct QuotaLimits {
    pub daily: HashMap<String, u64>,
    pub monthly: HashMap<String, u64>,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        let daily = HashMap::from([
            ("groq".to_string(), 1000),
            ("openrouter".to_string(), 1000),
            ("gemini".to_string(), 1500),
        ]);
        let monthly = HashMap::new();
        Self { daily, monthly }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Counter {
    used: u64,
    /// `YYYY-MM-DD` for daily counters, `YYYY-MM` for monthly ones.
    #[serde(default)]
    period: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct QuotaFile {
    #[serde(default)]
    daily: HashMap<String, Counter>,
    #[serde(default)]
    monthly: HashMap<String, Counter>,
    #[serde(default)]
    blocked: Vec<String>,
}

/// Quota status for one provider.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct QuotaStatus {
    pub used: u64,
    /// `-1` means unlimited.
    pub limit: i64,
    pub remaining: i64,
    pub period_type: PeriodType,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Daily,
    Monthly,
    Unlimited,
}

/// File-backed quota manager. All operations take the internal mutex and
/// perform a read-check-reset-modify-write cycle.
pub struct QuotaManager {
    path: PathBuf,
    limits: QuotaLimits,
    lock: Mutex<()>,
}

impl QuotaManager {
    pub fn new(path: impl Into<PathBuf>, limits: QuotaLimits) -> Self {
        Self {
            path: path.into(),
            limits,
            lock: Mutex::new(()),
        }
    }

    fn today() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    fn this_month() -> String {
        Utc::now().format("%Y-%m").to_string()
    }

    fn read(&self) -> QuotaFile {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "quota file corrupt, resetting");
                QuotaFile::default()
            }),
            Err(_) => QuotaFile::default(),
        }
    }

    fn write(&self, data: &QuotaFile) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(data) {
            Ok(text) => {
                if let Err(e) = std::fs::write(&self.path, text) {
                    warn!(path = %self.path.display(), error = %e, "quota write failed");
                }
            }
            Err(e) => warn!(error = %e, "quota serialize failed"),
        }
    }

    /// Zeroes counters whose period identifier no longer matches the current
    /// date/month and unblocks the corresponding providers.
    fn check_and_reset(&self, data: &mut QuotaFile) -> bool {
        let today = Self::today();
        let month = Self::this_month();
        let mut modified = false;

        for name in self.limits.daily.keys() {
            let counter = data.daily.entry(name.clone()).or_default();
            if counter.period != today {
                *counter = Counter {
                    used: 0,
                    period: today.clone(),
                };
                data.blocked.retain(|b| b != name);
                modified = true;
            }
        }
        for name in self.limits.monthly.keys() {
            let counter = data.monthly.entry(name.clone()).or_default();
            if counter.period != month {
                *counter = Counter {
                    used: 0,
                    period: month.clone(),
                };
                data.blocked.retain(|b| b != name);
                modified = true;
            }
        }
        modified
    }

    fn limit_of(&self, provider: &str) -> Option<(u64, PeriodType)> {
        if let Some(&l) = self.limits.daily.get(provider) {
            return Some((l, PeriodType::Daily));
        }
        if let Some(&l) = self.limits.monthly.get(provider) {
            return Some((l, PeriodType::Monthly));
        }
        None
    }

    fn used_of(data: &QuotaFile, provider: &str, period: PeriodType) -> u64 {
        let map = match period {
            PeriodType::Daily => &data.daily,
            PeriodType::Monthly => &data.monthly,
            PeriodType::Unlimited => return 0,
        };
        map.get(provider).map(|c| c.used).unwrap_or(0)
    }

    /// True when the provider may be called: not blocked and below the block
    /// threshold. Unlimited providers always pass.
    pub fn can_use(&self, provider: &str) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut data = self.read();
        if self.check_and_reset(&mut data) {
            self.write(&data);
        }
        if data.blocked.iter().any(|b| b == provider) {
            return false;
        }
        match self.limit_of(provider) {
            Some((limit, period)) => {
                let used = Self::used_of(&data, provider, period);
                used * 100 < limit * BLOCK_THRESHOLD
            }
            None => true,
        }
    }

    /// Records `amount` uses. When the new total would reach the block
    /// threshold the provider is marked blocked and the call returns `false`
    /// without incrementing past the threshold.
    pub fn use_n(&self, provider: &str, amount: u64) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut data = self.read();
        self.check_and_reset(&mut data);

        if data.blocked.iter().any(|b| b == provider) {
            return false;
        }

        let Some((limit, period)) = self.limit_of(provider) else {
            return true; // unlimited
        };

        let used = Self::used_of(&data, provider, period);
        let new_total = used + amount;
        if new_total * 100 >= limit * BLOCK_THRESHOLD {
            data.blocked.push(provider.to_string());
            self.write(&data);
            return false;
        }

        let (map, period_id) = match period {
            PeriodType::Daily => (&mut data.daily, Self::today()),
            PeriodType::Monthly => (&mut data.monthly, Self::this_month()),
            PeriodType::Unlimited => unreachable!(),
        };
        let counter = map.entry(provider.to_string()).or_default();
        counter.used = new_total;
        counter.period = period_id;
        self.write(&data);

        if new_total * 100 >= limit * WARN_THRESHOLD {
            warn!(provider, used = new_total, limit, "quota above warn threshold");
        }
        true
    }

    /// Records one use. See [`Self::use_n`].
    pub fn use_one(&self, provider: &str) -> bool {
        self.use_n(provider, 1)
    }

    pub fn status(&self, provider: &str) -> QuotaStatus {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut data = self.read();
        if self.check_and_reset(&mut data) {
            self.write(&data);
        }
        match self.limit_of(provider) {
            Some((limit, period)) => {
                let used = Self::used_of(&data, provider, period);
                QuotaStatus {
                    used,
                    limit: limit as i64,
                    remaining: limit as i64 - used as i64,
                    period_type: period,
                }
            }
            None => QuotaStatus {
                used: 0,
                limit: -1,
                remaining: -1,
                period_type: PeriodType::Unlimited,
            },
        }
    }

    /// Status for every provider with a configured limit.
    pub fn status_all(&self) -> HashMap<String, QuotaStatus> {
        self.limits
            .daily
            .keys()
            .chain(self.limits.monthly.keys())
            .map(|name| (name.clone(), self.status(name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dir: &tempfile::TempDir) -> QuotaManager {
        let mut limits = QuotaLimits::default();
        limits.daily.insert("tiny".into(), 10);
        QuotaManager::new(dir.path().join("quotas.json"), limits)
    }

    #[test]
    fn fresh_manager_allows_use() {
        let dir = tempfile::tempdir().unwrap();
        let q = manager(&dir);
        assert!(q.can_use("groq"));
        assert!(q.use_one("groq"));
        assert_eq!(q.status("groq").used, 1);
    }

    #[test]
    fn unknown_provider_is_unlimited() {
        let dir = tempfile::tempdir().unwrap();
        let q = manager(&dir);
        assert!(q.can_use("local_vllm"));
        assert!(q.use_one("local_vllm"));
        assert_eq!(q.status("local_vllm").period_type, PeriodType::Unlimited);
    }

    #[test]
    fn blocks_at_95_percent_without_incrementing_past() {
        let dir = tempfile::tempdir().unwrap();
        let q = manager(&dir);
        // limit 10: 95% threshold reached when the new total hits 9.5, i.e. 10.
        for _ in 0..9 {
            assert!(q.use_one("tiny"));
        }
        assert!(!q.use_one("tiny"));
        assert!(!q.can_use("tiny"));
        assert_eq!(q.status("tiny").used, 9);
    }

    #[test]
    fn used_is_monotonic_within_period() {
        let dir = tempfile::tempdir().unwrap();
        let q = manager(&dir);
        let mut last = 0;
        for _ in 0..5 {
            q.use_one("groq");
            let used = q.status("groq").used;
            assert!(used >= last);
            last = used;
        }
    }

    #[test]
    fn stale_period_resets_counter_and_unblocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quotas.json");
        let stale = serde_json::json!({
            "daily": {"tiny": {"used": 9, "period": "2000-01-01"}},
            "monthly": {},
            "blocked": ["tiny"]
        });
        std::fs::write(&path, stale.to_string()).unwrap();

        let mut limits = QuotaLimits::default();
        limits.daily.insert("tiny".into(), 10);
        let q = QuotaManager::new(&path, limits);
        assert!(q.can_use("tiny"));
        assert_eq!(q.status("tiny").used, 0);
    }

    #[test]
    fn corrupt_file_reads_as_zero_usage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quotas.json");
        std::fs::write(&path, "not json at all").unwrap();
        let q = QuotaManager::new(&path, QuotaLimits::default());
        assert!(q.can_use("groq"));
        assert_eq!(q.status("groq").used, 0);
    }
}
