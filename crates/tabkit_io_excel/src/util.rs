//! Stateless helper utilities used by the workbook writers.

use std::borrow::Cow;
use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use chrono_tz::Tz;

use crate::conf::{
    N_HEIGHT_FONT_BASE_TWIPS, N_HEIGHT_ROW_UNIT_TWIPS, N_LEN_EXCEL_SHEET_NAME_MAX,
    N_LINES_ROW_HEIGHT_MAX, N_WIDTH_COL_MAX, N_WIDTH_COL_PADDING, TUP_EXCEL_ILLEGAL,
};

////////////////////////////////////////////////////////////////////////////////
// #region TextNormalization

const C_ELLIPSIS: char = '\u{2026}';
const C_REPLACEMENT: char = '\u{FFFD}';

/// Whether `c` cannot be stored in a spreadsheet cell.
pub fn if_invalid_cell_char(c: char) -> bool {
    let n_code = c as u32;
    matches!(
        n_code,
        0x00..=0x08 | 0x0B..=0x0C | 0x0E..=0x1F | 0x7F..=0x84 | 0x86..=0x9F | 0xFDD0..=0xFDDF
    ) || (n_code & 0xFFFE) == 0xFFFE
}

/// Replace control and non-character code points with U+FFFD.
pub fn replace_invalid_chars(value: &str) -> Cow<'_, str> {
    if !value.chars().any(if_invalid_cell_char) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(
        value
            .chars()
            .map(|c| if if_invalid_cell_char(c) { C_REPLACEMENT } else { c })
            .collect(),
    )
}

fn if_line_boundary(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split text on universal line boundaries.
///
/// A trailing line break does not produce an empty final line; empty input yields no lines.
pub fn split_lines(value: &str) -> Vec<&str> {
    let mut l_lines = Vec::new();
    let mut n_start = 0;
    let mut iter_chars = value.char_indices().peekable();
    while let Some((n_idx, c)) = iter_chars.next() {
        if !if_line_boundary(c) {
            continue;
        }
        l_lines.push(&value[n_start..n_idx]);
        n_start = n_idx + c.len_utf8();
        if c == '\r'
            && let Some((n_idx_next, '\n')) = iter_chars.peek().copied()
        {
            iter_chars.next();
            n_start = n_idx_next + 1;
        }
    }
    if n_start < value.len() {
        l_lines.push(&value[n_start..]);
    }
    l_lines
}

/// Normalize cell text: scrub invalid chars, strip line ends, cap length.
///
/// Text longer than `n_chars_max` keeps at most `n_chars_max - 1` chars, right-trimmed,
/// plus an ellipsis.
pub fn normalize_text(value: &str, n_chars_max: usize) -> String {
    let c_scrubbed = replace_invalid_chars(value);
    let c_text = split_lines(&c_scrubbed)
        .into_iter()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    if c_text.chars().count() <= n_chars_max {
        return c_text;
    }
    log::debug!(
        "Truncate cell text to {n_chars_max} chars (was {}).",
        c_text.chars().count()
    );
    let c_kept: String = c_text
        .chars()
        .take(n_chars_max.saturating_sub(1))
        .collect();
    let mut c_truncated = c_kept.trim_end().to_string();
    c_truncated.push(C_ELLIPSIS);
    c_truncated
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    // Excel rejects names starting or ending with an apostrophe.
    let derive_trimmed = |c_value: &str| c_value.trim().trim_matches('\'').trim().to_string();
    c_name = derive_trimmed(&c_name);
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    let c_name_capped: String = c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect();
    derive_trimmed(&c_name_capped)
}

/// Create suffixed sheet name (`base__2`, `base__3`, ...), respecting length cap.
pub fn create_sheet_identifier(base_name: &str, n_idx: usize) -> String {
    let c_sheet_name_suffix = format!("__{n_idx}");
    let n_len_base_name_max = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_sheet_name_suffix.len());

    let c_sheet_name_base: String = base_name
        .chars()
        .take(usize::max(1, n_len_base_name_max))
        .collect();

    format!("{c_sheet_name_base}{c_sheet_name_suffix}")
}

/// Sanitize `title` and make it unique among `set_sheet_names_existing`.
///
/// The chosen name is registered in the set. Comparison is case-insensitive, as in Excel.
pub fn derive_unique_sheet_name(title: &str, set_sheet_names_existing: &mut BTreeSet<String>) -> String {
    let c_name = sanitize_sheet_name(title, "_");
    if c_name != title {
        log::warn!("Sheet title {title:?} sanitized to {c_name:?}.");
    }
    if set_sheet_names_existing.insert(c_name.to_lowercase()) {
        return c_name;
    }

    let mut n_idx = 2usize;
    loop {
        let candidate = create_sheet_identifier(&c_name, n_idx);
        if set_sheet_names_existing.insert(candidate.to_lowercase()) {
            log::warn!("Sheet title {c_name:?} already used; renamed to {candidate:?}.");
            return candidate;
        }
        n_idx += 1;
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ValueRendering

const N_DAYS_EXCEL_EPOCH_TO_UNIX: f64 = 25_569.0;
const N_SECONDS_PER_DAY: f64 = 86_400.0;
const N_SERIAL_FIRST_MARCH_1900: f64 = 61.0;
const N_INTEGRAL_FLOAT_MAX: f64 = 1e15;

/// Convert a timestamp into naive local time of `tz`, dropping sub-seconds.
pub fn derive_local_timestamp(value: &DateTime<Utc>, tz: &Tz) -> NaiveDateTime {
    value.with_timezone(tz).naive_local().trunc_subsecs(0)
}

/// Excel 1900-system serial number of a naive timestamp.
pub fn calculate_excel_serial(value: &NaiveDateTime) -> f64 {
    let n_secs = value.and_utc().timestamp() as f64;
    let n_serial = N_DAYS_EXCEL_EPOCH_TO_UNIX + n_secs / N_SECONDS_PER_DAY;
    // Excel counts the nonexistent 1900-02-29.
    if n_serial < N_SERIAL_FIRST_MARCH_1900 {
        n_serial - 1.0
    } else {
        n_serial
    }
}

/// Replacement text for `NaN`/`Inf`; `None` for finite values.
pub fn convert_nan_inf_to_str(x: f64) -> Option<&'static str> {
    if x.is_nan() {
        return Some("NaN");
    }
    if x.is_infinite() {
        return Some(if x.is_sign_positive() { "Inf" } else { "-Inf" });
    }
    None
}

/// Default decimal text of a number, used for width derivation.
pub fn derive_number_text(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < N_INTEGRAL_FLOAT_MAX {
        return format!("{}", x as i64);
    }
    x.to_string()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region LayoutMetrics

/// Final column width from a running max width.
pub fn calculate_col_width(width: f64) -> f64 {
    N_WIDTH_COL_PADDING + f64::min(width, N_WIDTH_COL_MAX)
}

/// Explicit row height (twips) from line count and tallest font height (twips).
pub fn calculate_row_height(n_lines_max: usize, n_height_font_max: u32) -> u32 {
    let n_lines = usize::min(usize::max(n_lines_max, 1), N_LINES_ROW_HEIGHT_MAX) as u32;
    let n_height_line = u32::max(
        n_height_font_max * N_HEIGHT_ROW_UNIT_TWIPS / N_HEIGHT_FONT_BASE_TWIPS,
        N_HEIGHT_ROW_UNIT_TWIPS,
    );
    n_lines * n_height_line
}

/// Width of East-Asian ambiguous glyphs for a locale tag: 2 for CJK, else 1.
pub fn derive_ambiguous_width(locale: Option<&str>) -> usize {
    let Some(locale) = locale else {
        return 1;
    };
    let c_lang: String = locale.chars().take(2).collect::<String>().to_ascii_lowercase();
    match c_lang.as_str() {
        "ja" | "ko" | "kr" | "zh" => 2,
        _ => 1,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
