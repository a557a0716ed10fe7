//! User intent recognition shared by every agent: skip, confirmation, and
//! list selection (bare integer, `N번`, or a Korean ordinal word).

use once_cell::sync::Lazy;
use regex::Regex;

const SKIP_TOKENS: &[&str] = &["스킵", "skip", "없어", "패스", "pass", "넘어가", "건너뛰"];

const CONFIRM_TOKENS: &[&str] = &[
    "확정", "확인", "좋아", "이걸로", "다음", "ok", "완료", "할께", "할게", "네",
];

const REANALYZE_TOKENS: &[&str] = &[
    "다시 분석", "다시분석", "재분석", "업데이트", "새로 분석", "update", "refresh",
];

static NUMBERED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*번").unwrap());

const KOREAN_ORDINALS: &[(&str, usize)] = &[
    ("첫", 1),
    ("두", 2),
    ("세", 3),
    ("네", 4),
    ("다섯", 5),
    ("여섯", 6),
    ("일곱", 7),
    ("여덟", 8),
    ("아홉", 9),
    ("열", 10),
];

pub fn is_skip(message: &str) -> bool {
    let lower = message.to_lowercase();
    SKIP_TOKENS.iter().any(|t| lower.contains(t))
}

/// The orchestrator's stage-skip gate. Narrower than [`is_skip`]: "없어"
/// stays out because it is a meaningful in-stage answer (e.g. "no more
/// channels" during benchmark collection) that the active agent interprets.
pub fn is_stage_skip(message: &str) -> bool {
    let lower = message.to_lowercase();
    SKIP_TOKENS
        .iter()
        .filter(|t| **t != "없어")
        .any(|t| lower.contains(t))
}

pub fn is_confirmation(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONFIRM_TOKENS.iter().any(|t| lower.contains(t))
}

/// Cached-benchmark invalidation request ("다시 분석" and friends).
pub fn is_reanalyze(message: &str) -> bool {
    let lower = message.to_lowercase();
    REANALYZE_TOKENS.iter().any(|t| lower.contains(t))
}

/// Extracts a 1-based list selection. Bare integers win, then `N번`, then
/// Korean ordinal words (첫/두/…/열 → 1..10).
pub fn extract_selection(message: &str) -> Option<usize> {
    let trimmed = message.trim();
    if let Ok(n) = trimmed.parse::<usize>() {
        return Some(n);
    }
    if let Some(caps) = NUMBERED_RE.captures(trimmed) {
        if let Ok(n) = caps[1].parse::<usize>() {
            return Some(n);
        }
    }
    // "네" alone is a confirmation, not the ordinal four.
    if trimmed == "네" {
        return None;
    }
    KOREAN_ORDINALS
        .iter()
        .find(|(word, _)| trimmed.contains(word))
        .map(|(_, n)| *n)
}

pub fn is_selection(message: &str) -> bool {
    extract_selection(message).is_some()
}

/// `"N번 <instruction>"` → scene number plus the modification text.
pub fn extract_scene_instruction(message: &str) -> Option<(usize, String)> {
    static SCENE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)번?\s+(.+)$").unwrap());
    let caps = SCENE_RE.captures(message.trim())?;
    let n = caps[1].parse().ok()?;
    Some((n, caps[2].trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_tokens_match_korean_and_english() {
        for msg in ["스킵", "skip", "이건 패스할게요", "넘어가자", "건너뛰기"] {
            assert!(is_skip(msg), "{msg}");
        }
        assert!(!is_skip("좋아요"));
    }

    #[test]
    fn confirmation_tokens_match() {
        for msg in ["확정", "확인했어요", "좋아", "다음", "OK", "네"] {
            assert!(is_confirmation(msg), "{msg}");
        }
        assert!(!is_confirmation("다른 걸로"));
    }

    #[test]
    fn selection_parses_integer_and_numbered_forms() {
        assert_eq!(extract_selection("2"), Some(2));
        assert_eq!(extract_selection(" 3번 "), Some(3));
        assert_eq!(extract_selection("10번으로"), Some(10));
    }

    #[test]
    fn selection_parses_korean_ordinals() {
        assert_eq!(extract_selection("첫 번째"), Some(1));
        assert_eq!(extract_selection("두번째로 할게"), Some(2));
        assert_eq!(extract_selection("열"), Some(10));
    }

    #[test]
    fn bare_ne_is_confirmation_not_four() {
        assert!(is_confirmation("네"));
        assert_eq!(extract_selection("네"), None);
    }

    #[test]
    fn scene_instruction_splits_number_and_text() {
        assert_eq!(
            extract_scene_instruction("3번 더 밝은 표정으로"),
            Some((3, "더 밝은 표정으로".into()))
        );
        assert_eq!(extract_scene_instruction("확인"), None);
    }

    #[test]
    fn reanalyze_tokens_match() {
        assert!(is_reanalyze("다시 분석해줘"));
        assert!(is_reanalyze("업데이트"));
        assert!(!is_reanalyze("분석 결과 보여줘"));
    }
}
