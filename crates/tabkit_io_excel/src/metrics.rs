//! Display width and line count of cell text.

use std::collections::HashMap;

use unicode_width::UnicodeWidthChar;

use crate::conf::N_LEN_METRICS_CACHE_KEY_MAX;
use crate::util::split_lines;

/// Width/line calculator with a cache for short texts.
///
/// Texts longer than [`N_LEN_METRICS_CACHE_KEY_MAX`] chars are recomputed on every call.
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    n_ambiguous_width: usize,
    dict_cache: HashMap<String, (usize, usize)>,
    n_scans: usize,
}

impl MetricsCalculator {
    /// Create a calculator; `n_ambiguous_width` is 2 for CJK locales, else 1.
    pub fn new(n_ambiguous_width: usize) -> Self {
        Self {
            n_ambiguous_width,
            dict_cache: HashMap::new(),
            n_scans: 0,
        }
    }

    /// Width assigned to East-Asian ambiguous glyphs.
    pub fn ambiguous_width(&self) -> usize {
        self.n_ambiguous_width
    }

    /// Number of texts scanned so far (cache hits excluded).
    pub fn n_scans(&self) -> usize {
        self.n_scans
    }

    /// Number of cached texts.
    pub fn n_cached(&self) -> usize {
        self.dict_cache.len()
    }

    /// Return `(width, lines)` of a text value; empty or missing text is `(0, 1)`.
    pub fn get_metrics(&mut self, value: Option<&str>) -> (usize, usize) {
        let Some(value) = value.filter(|c_value| !c_value.is_empty()) else {
            return (0, 1);
        };

        let if_cacheable = value.chars().count() <= N_LEN_METRICS_CACHE_KEY_MAX;
        if if_cacheable && let Some(metrics) = self.dict_cache.get(value) {
            return *metrics;
        }

        let metrics = self.scan_metrics(value);
        if if_cacheable {
            self.dict_cache.insert(value.to_string(), metrics);
        }
        metrics
    }

    fn scan_metrics(&mut self, value: &str) -> (usize, usize) {
        self.n_scans += 1;
        let l_lines = split_lines(value);
        let n_width = l_lines
            .iter()
            .map(|line| calculate_text_width(line, self.n_ambiguous_width))
            .max()
            .unwrap_or(0);
        (n_width, usize::max(l_lines.len(), 1))
    }
}

/// Width of a single glyph: 2 for wide/fullwidth, `n_ambiguous_width` for ambiguous, else 1.
pub fn calculate_char_width(c: char, n_ambiguous_width: usize) -> usize {
    if c.width() == Some(2) {
        return 2;
    }
    if n_ambiguous_width == 2 && c.width_cjk() == Some(2) {
        return 2;
    }
    1
}

/// Sum of glyph widths of one line.
pub fn calculate_text_width(line: &str, n_ambiguous_width: usize) -> usize {
    line.chars()
        .map(|c| calculate_char_width(c, n_ambiguous_width))
        .sum()
}
