//! Offset-histogram matching.
//!
//! Every query landmark votes for the reference songs that contain its
//! frequency, binned by the time offset between the two occurrences at
//! 100 ms resolution. A genuine match piles votes onto one offset bin;
//! noise spreads them thin.

use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::fingerprint::KeyPoint;
use crate::index::InvertedIndex;

/// Minimum confidence (percent) for a positive verdict.
pub const CONFIDENCE_THRESHOLD: f64 = 3.0;
/// Minimum smoothed score for a positive verdict.
pub const MIN_SCORE: u32 = 5;

/// Outcome of matching one query against an index.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub query_file: String,
    /// Winning song, `None` when the query produced no votes at all.
    pub best_match: Option<String>,
    /// Estimated start of the query inside the matched song, seconds.
    pub offset_sec: f64,
    /// Smoothed vote count at the winning offset bin.
    pub score: u32,
    /// Landmarks in the query.
    pub total_points: usize,
    /// `100 * score / total_points`, 0 when the query was empty.
    pub confidence: f64,
    pub elapsed: Duration,
}

/// Row status in batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Match,
    NoMatch,
    Error,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Match => write!(f, "MATCH"),
            MatchStatus::NoMatch => write!(f, "NO MATCH"),
            MatchStatus::Error => write!(f, "ERROR"),
        }
    }
}

impl MatchResult {
    /// A query that yielded nothing to vote with (decode failure or silence).
    pub fn empty(query_file: String) -> Self {
        MatchResult {
            query_file,
            best_match: None,
            offset_sec: 0.0,
            score: 0,
            total_points: 0,
            confidence: 0.0,
            elapsed: Duration::ZERO,
        }
    }

    /// The canonical decision rule.
    pub fn is_match(&self) -> bool {
        self.confidence > CONFIDENCE_THRESHOLD && self.score > MIN_SCORE
    }

    pub fn status(&self) -> MatchStatus {
        if self.total_points == 0 {
            MatchStatus::Error
        } else if self.is_match() {
            MatchStatus::Match
        } else {
            MatchStatus::NoMatch
        }
    }
}

/// Vote counts keyed by `(song, offset bin)`, offset bin being
/// `round((t_ref - t_query) * 10)`.
pub type OffsetHistogram = HashMap<(u32, i32), u32>;

/// Accumulate the offset histogram for a query against the index.
pub fn vote(points: &[KeyPoint], index: &InvertedIndex) -> OffsetHistogram {
    let mut histogram = OffsetHistogram::new();

    for point in points {
        let freq = point.freq_hz.round() as i32;
        let Some(postings) = index.lookup(freq) else {
            continue;
        };
        for posting in postings {
            let offset = posting.time_sec - point.time_sec;
            let bin = (offset * 10.0).round() as i32;
            *histogram.entry((posting.song, bin)).or_insert(0) += 1;
        }
    }

    histogram
}

/// Find the `(song, bin)` with the highest neighbor-smoothed score: the
/// bin's own count plus its left and right neighbors. Ties go to the
/// smallest `(song, bin)` pair, which makes the result independent of
/// hash-map iteration order.
pub fn best_candidate(histogram: &OffsetHistogram) -> Option<(u32, i32, u32)> {
    let mut best: Option<(u32, i32, u32)> = None;

    for (&(song, bin), &count) in histogram {
        let smoothed = count
            + histogram.get(&(song, bin - 1)).copied().unwrap_or(0)
            + histogram.get(&(song, bin + 1)).copied().unwrap_or(0);

        best = match best {
            None => Some((song, bin, smoothed)),
            Some((bs, bb, bscore)) => {
                if smoothed > bscore || (smoothed == bscore && (song, bin) < (bs, bb)) {
                    Some((song, bin, smoothed))
                } else {
                    Some((bs, bb, bscore))
                }
            }
        };
    }

    best
}

/// Match a query landmark set against the index. `elapsed` is left at zero;
/// callers that time the full decode-to-match pipeline stamp it themselves.
pub fn match_points(query_file: &str, points: &[KeyPoint], index: &InvertedIndex) -> MatchResult {
    if points.is_empty() {
        return MatchResult::empty(query_file.to_string());
    }

    let histogram = vote(points, index);
    let best = best_candidate(&histogram);

    let (best_match, offset_sec, score) = match best {
        Some((song, bin, smoothed)) => (
            Some(index.song_name(song).to_string()),
            bin as f64 / 10.0,
            smoothed,
        ),
        None => (None, 0.0, 0),
    };

    MatchResult {
        query_file: query_file.to_string(),
        best_match,
        offset_sec,
        score,
        total_points: points.len(),
        confidence: 100.0 * score as f64 / points.len() as f64,
        elapsed: Duration::ZERO,
    }
}

/// One row of the exported histogram dump.
#[derive(Debug, Serialize)]
pub struct HistogramBin {
    pub offset: f64,
    pub count: u32,
}

/// Flatten a single-song histogram for inspection: bins with more than one
/// vote, sorted by offset.
pub fn histogram_bins(histogram: &OffsetHistogram) -> Vec<HistogramBin> {
    let mut bins: Vec<HistogramBin> = histogram
        .iter()
        .filter(|(_, &count)| count > 1)
        .map(|(&(_, bin), &count)| HistogramBin {
            offset: bin as f64 / 10.0,
            count,
        })
        .collect();
    bins.sort_by(|a, b| a.offset.total_cmp(&b.offset));
    bins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;

    fn point(t: f64, f: f64) -> KeyPoint {
        KeyPoint { time_sec: t, freq_hz: f, mag_db: -12.0 }
    }

    /// A landmark stream with real temporal structure: a distinct
    /// frequency every 100 ms, so offsets are unambiguous.
    fn melody_points(start_sec: f64, count: usize) -> Vec<KeyPoint> {
        (0..count)
            .map(|i| point(start_sec + i as f64 * 0.1, 400.0 + i as f64 * 37.0))
            .collect()
    }

    fn index_of(fingerprints: &[Fingerprint]) -> InvertedIndex {
        let mut index = InvertedIndex::default();
        for fp in fingerprints {
            index.insert(fp);
        }
        index
    }

    fn fingerprint(name: &str, points: Vec<KeyPoint>) -> Fingerprint {
        Fingerprint {
            filename: name.into(),
            duration: 0.0,
            sample_rate: 44_100,
            points,
        }
    }

    #[test]
    fn self_match_hits_offset_zero() {
        let points = melody_points(0.0, 30);
        let index = index_of(&[fingerprint("song", points.clone())]);

        let result = match_points("query", &points, &index);
        assert_eq!(result.best_match.as_deref(), Some("song"));
        assert_eq!(result.offset_sec, 0.0);
        assert!(result.is_match());
        assert!(result.confidence >= 80.0);
    }

    #[test]
    fn shifted_fragment_recovers_the_offset() {
        let reference = melody_points(0.0, 60);
        let index = index_of(&[fingerprint("song", reference.clone())]);

        // the fragment covers reference landmarks 20..40, restamped at t=0
        let fragment: Vec<KeyPoint> = reference[20..40]
            .iter()
            .map(|p| point(p.time_sec - 2.0, p.freq_hz))
            .collect();

        let result = match_points("fragment", &fragment, &index);
        assert_eq!(result.best_match.as_deref(), Some("song"));
        assert!((result.offset_sec - 2.0).abs() <= 0.1, "offset {}", result.offset_sec);
    }

    #[test]
    fn picks_the_right_song_among_several() {
        let target = melody_points(0.0, 40);
        let decoy: Vec<KeyPoint> = (0..40).map(|i| point(i as f64 * 0.1, 5000.0 + (i % 7) as f64 * 91.0)).collect();
        let index = index_of(&[
            fingerprint("decoy", decoy),
            fingerprint("target", target.clone()),
        ]);

        let result = match_points("query", &target, &index);
        assert_eq!(result.best_match.as_deref(), Some("target"));
    }

    #[test]
    fn empty_query_reports_error_status() {
        let index = index_of(&[fingerprint("song", melody_points(0.0, 10))]);
        let result = match_points("silent", &[], &index);

        assert_eq!(result.total_points, 0);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.best_match, None);
        assert_eq!(result.status(), MatchStatus::Error);
    }

    #[test]
    fn no_shared_frequencies_is_no_match() {
        let index = index_of(&[fingerprint("song", melody_points(0.0, 10))]);
        let query = vec![point(0.0, 9000.0), point(0.1, 9100.0)];

        let result = match_points("query", &query, &index);
        assert_eq!(result.best_match, None);
        assert_eq!(result.score, 0);
        assert_eq!(result.status(), MatchStatus::NoMatch);
    }

    #[test]
    fn matching_is_deterministic() {
        let reference = melody_points(0.0, 50);
        let index = index_of(&[
            fingerprint("a", reference.clone()),
            fingerprint("b", reference.clone()),
        ]);

        let first = match_points("q", &reference, &index);
        for _ in 0..10 {
            assert_eq!(match_points("q", &reference, &index), first);
        }
        // both songs tie perfectly; the smaller id (first inserted) wins
        assert_eq!(first.best_match.as_deref(), Some("a"));
    }

    #[test]
    fn neighbor_bins_count_once_each() {
        let mut histogram = OffsetHistogram::new();
        histogram.insert((0, 4), 2);
        histogram.insert((0, 5), 10);
        histogram.insert((0, 6), 3);

        let (song, bin, score) = best_candidate(&histogram).unwrap();
        assert_eq!((song, bin), (0, 5));
        assert_eq!(score, 15);
    }

    #[test]
    fn decision_rule_needs_both_thresholds() {
        let mut result = MatchResult::empty("q".into());
        result.total_points = 100;

        result.score = 6;
        result.confidence = 6.0;
        assert!(result.is_match());

        result.confidence = 3.0; // not strictly above
        assert!(!result.is_match());

        result.confidence = 50.0;
        result.score = 5; // not strictly above
        assert!(!result.is_match());
    }

    #[test]
    fn histogram_dump_is_sorted_and_filtered() {
        let mut histogram = OffsetHistogram::new();
        histogram.insert((0, 7), 4);
        histogram.insert((0, -3), 2);
        histogram.insert((0, 1), 1); // dropped, count <= 1

        let bins = histogram_bins(&histogram);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].offset, -0.3);
        assert_eq!(bins[1].offset, 0.7);
        assert_eq!(bins[1].count, 4);
    }
}
