//! Annotation-driven segmentation.
//!
//! Turns a recording's sparse, noisy annotation timeline into a canonical
//! sequence of named, non-overlapping segments. Labels are cleaned of
//! bracketed qualifiers, checked against an exclusion set (non-content
//! markers never start or end a segment) and translated to short canonical
//! tags via an ordered substring table.
use crate::recording::Annotation;

/// A named, contiguous span of a recording derived from its annotation
/// timeline. Never constructed directly by users.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: String,
    /// Start in seconds on the (cropped) recording timeline.
    pub start: f64,
    pub duration: f64,
}

/// Annotation-to-segment converter.
///
/// The translation table is an *ordered* list of `(pattern, tag)` pairs
/// matched by substring against the cleaned label; the first match wins, so
/// table order is part of the contract. Exclusion matching is exact, against
/// both the raw and the cleaned text.
#[derive(Debug, Clone)]
pub struct Segmenter {
    exclusions: Vec<String>,
    translations: Vec<(String, String)>,
}

/// Annotation texts that mark non-content events (artifact and stimulation
/// markers, print bookkeeping, recording gaps) in the clinical vocabulary
/// this pipeline was deployed against.
pub fn default_exclusions() -> Vec<String> {
    [
        "stimFlash",
        "stimAudio",
        "Артефакт",
        "Начало печати",
        "Окончание печати",
        "Эпилептиформная активность",
        "Комплекс \"острая волна - медленная волна\"",
        "Множественные спайки и острые волны",
        "Разрыв записи",
    ]
    .map(String::from)
    .to_vec()
}

/// Default phrase-to-tag table. Matched in this order, first match wins.
pub fn default_translations() -> Vec<(String, String)> {
    [
        ("Фоновая запись", "Baseline"),
        ("Открывание глаз", "EyesOpen"),
        ("Закрывание глаз", "EyesClosed"),
        ("Без стимуляции", "AfterStim"),
        ("Фотостимуляция", "PhoticStim"),
        ("После фотостимуляции", "PostPhotic"),
        ("Встроенный фотостимулятор", "Photic"),
        ("Встроенный слуховой стимулятор", "Auditory"),
        ("Остановка стимуляции", "AfterStim"),
        ("Гипервентиляция", "Hypervent"),
        ("После гипервентиляции", "PostHypervent"),
        ("Бодрствование", "Awake"),
    ]
    .map(|(p, t)| (p.to_string(), t.to_string()))
    .to_vec()
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(default_exclusions(), default_translations())
    }
}

impl Segmenter {
    pub fn new(exclusions: Vec<String>, translations: Vec<(String, String)>) -> Self {
        Self { exclusions, translations }
    }

    /// Canonical label for a raw annotation text, or `None` when the
    /// annotation is excluded and must be skipped entirely.
    ///
    /// Unmatched text passes through (bracket-stripped and trimmed)
    /// unchanged.
    pub fn canonical_label(&self, raw: &str) -> Option<String> {
        let cleaned = strip_brackets(raw);
        let cleaned = cleaned.trim();
        if self.exclusions.iter().any(|e| e == cleaned || e == raw) {
            return None;
        }
        for (pattern, tag) in &self.translations {
            if cleaned.contains(pattern.as_str()) {
                return Some(tag.clone());
            }
        }
        Some(cleaned.to_string())
    }

    /// Collapse the annotation timeline into named segments.
    ///
    /// Segment `k` begins at the onset of the first non-excluded annotation
    /// after segment `k-1`'s end, carries that annotation's canonical label,
    /// and ends at the onset of the next non-excluded annotation — or at
    /// `total_duration` when none remains — no matter how many excluded
    /// annotations fall in between. A recording with zero non-excluded
    /// annotations yields zero segments.
    pub fn segments(&self, annotations: &[Annotation], total_duration: f64) -> Vec<Segment> {
        let mut ordered: Vec<&Annotation> = annotations.iter().collect();
        ordered.sort_by(|a, b| a.onset.total_cmp(&b.onset));

        let mut segments = Vec::new();
        let mut i = 0;
        while i < ordered.len() {
            let Some(name) = self.canonical_label(&ordered[i].label) else {
                i += 1;
                continue;
            };
            let start = ordered[i].onset;

            let mut j = i + 1;
            while j < ordered.len() && self.canonical_label(&ordered[j].label).is_none() {
                j += 1;
            }
            let end = if j < ordered.len() { ordered[j].onset } else { total_duration };

            segments.push(Segment { name, start, duration: end - start });
            i = j;
        }
        segments
    }
}

/// Remove `[...]` and `(...)` substrings (shortest match, unnested).
/// An unmatched opening bracket is kept verbatim.
fn strip_brackets(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(open) = rest.find(['[', '(']) {
        let close = match rest.as_bytes()[open] {
            b'[' => rest[open..].find(']'),
            _ => rest[open..].find(')'),
        };
        match close {
            Some(off) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + off + 1..];
            }
            None => {
                // No closing bracket: nothing left to strip.
                out.push_str(rest);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

// ── Time formatting ──────────────────────────────────────────────────────
//
// Segment tables are exported as CSV with MM:SS.mmm timestamps.

/// Format seconds as `MM:SS.mmm` (minutes unpadded past 99).
pub fn seconds_to_min_sec_ms(seconds: f64) -> String {
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    let millis = ((seconds % 1.0) * 1000.0).floor() as u64;
    format!("{minutes:02}:{secs:02}.{millis:03}")
}

/// Parse a `MM:SS.mmm` timestamp back to seconds.
pub fn parse_min_sec_ms(s: &str) -> anyhow::Result<f64> {
    let (minutes, rest) = s
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("bad timestamp {s:?}: missing ':'"))?;
    let (secs, millis) = rest
        .split_once('.')
        .ok_or_else(|| anyhow::anyhow!("bad timestamp {s:?}: missing '.'"))?;
    Ok(minutes.parse::<u64>()? as f64 * 60.0
        + secs.parse::<u64>()? as f64
        + millis.parse::<u64>()? as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann(onset: f64, label: &str) -> Annotation {
        Annotation::new(onset, 0.0, label)
    }

    #[test]
    fn bracket_stripping() {
        assert_eq!(strip_brackets("Фоновая запись [10 Гц]"), "Фоновая запись ");
        assert_eq!(strip_brackets("a (x) b [y] c"), "a  b  c");
        assert_eq!(strip_brackets("no brackets"), "no brackets");
        assert_eq!(strip_brackets("open [only"), "open [only");
    }

    #[test]
    fn excluded_raw_and_cleaned_text() {
        let seg = Segmenter::default();
        assert_eq!(seg.canonical_label("Артефакт"), None);
        // Exclusion also applies when only the cleaned text matches.
        assert_eq!(seg.canonical_label("Артефакт (мышечный)"), None);
        assert_eq!(seg.canonical_label("stimFlash"), None);
    }

    #[test]
    fn translation_is_substring_match_in_order() {
        let seg = Segmenter::default();
        assert_eq!(seg.canonical_label("Фоновая запись").as_deref(), Some("Baseline"));
        assert_eq!(
            seg.canonical_label("Проба: Открывание глаз").as_deref(),
            Some("EyesOpen")
        );
        // First matching pattern wins when several could match.
        let custom = Segmenter::new(vec![], vec![
            ("запись".into(), "First".into()),
            ("Фоновая запись".into(), "Second".into()),
        ]);
        assert_eq!(custom.canonical_label("Фоновая запись").as_deref(), Some("First"));
    }

    #[test]
    fn unmatched_text_passes_through() {
        let seg = Segmenter::default();
        assert_eq!(seg.canonical_label("Сон [N2]").as_deref(), Some("Сон"));
    }

    #[test]
    fn excluded_runs_collapse_into_one_segment() {
        let seg = Segmenter::new(
            vec!["[Artifact]".into(), "Разрыв записи".into()],
            default_translations(),
        );
        let anns = vec![
            ann(0.0, "Фоновая запись"),
            ann(30.0, "[Artifact]"),
            ann(31.0, "Открывание глаз"),
            ann(60.0, "Разрыв записи"),
        ];
        let got = seg.segments(&anns, 60.0);
        assert_eq!(got, vec![
            Segment { name: "Baseline".into(), start: 0.0, duration: 31.0 },
            Segment { name: "EyesOpen".into(), start: 31.0, duration: 29.0 },
        ]);
    }

    #[test]
    fn zero_meaningful_annotations_yield_zero_segments() {
        let seg = Segmenter::default();
        let anns = vec![ann(1.0, "stimFlash"), ann(2.0, "Артефакт")];
        assert!(seg.segments(&anns, 30.0).is_empty());
    }

    #[test]
    fn segments_are_contiguous_and_cover_to_the_end() {
        let seg = Segmenter::default();
        let anns = vec![
            ann(2.0, "Фоновая запись"),
            ann(10.0, "stimFlash"),
            ann(20.0, "Закрывание глаз"),
            ann(45.5, "Гипервентиляция"),
        ];
        let got = seg.segments(&anns, 90.0);
        assert_eq!(got.len(), 3);
        for pair in got.windows(2) {
            approx::assert_abs_diff_eq!(
                pair[0].start + pair[0].duration,
                pair[1].start,
                epsilon = 1e-12
            );
        }
        let last = got.last().unwrap();
        approx::assert_abs_diff_eq!(last.start + last.duration, 90.0, epsilon = 1e-12);
    }

    #[test]
    fn segmentation_is_deterministic() {
        let seg = Segmenter::default();
        let anns = vec![
            ann(0.0, "Фоновая запись"),
            ann(12.0, "Артефакт"),
            ann(30.0, "Открывание глаз"),
        ];
        assert_eq!(seg.segments(&anns, 60.0), seg.segments(&anns, 60.0));
    }

    #[test]
    fn timestamp_round_trip() {
        for s in [0.0, 1.5, 59.999, 61.25, 3723.042] {
            let text = seconds_to_min_sec_ms(s);
            let back = parse_min_sec_ms(&text).unwrap();
            assert!((back - s).abs() < 1e-3, "{s} → {text} → {back}");
        }
        assert_eq!(seconds_to_min_sec_ms(91.5), "01:31.500");
    }
}
