//! Shared Excel writer specification models and top-level error types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::conf::{
    C_BACKEND_XLS, C_BACKEND_XLSX, C_FORMAT_AUTO, C_MIMETYPE_XLS, C_MIMETYPE_XLSX,
    N_CHARS_CELL_MAX, N_NCOLS_XLS_MAX, N_NCOLS_XLSX_MAX, N_NROWS_XLS_MAX, N_NROWS_XLSX_MAX,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Backend-neutral cell format specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,
    /// Single underline.
    pub underline: Option<bool>,
    /// Font color (`#RRGGBB`).
    pub font_color: Option<String>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Border color for all sides (`#RRGGBB`).
    pub border_color: Option<String>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Solid background fill color (`#RRGGBB`).
    pub bg_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            underline: other.underline.or(self.underline),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            border_color: other
                .border_color
                .clone()
                .or_else(|| self.border_color.clone()),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StyleNameSpecification

/// Canonical style palette keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumStyleKey {
    /// Sheet title (`header`).
    Header,
    /// Sheet subtitle (`header2`).
    Header2,
    /// Table header row (`thead`).
    Thead,
    /// Ticket id (`id`).
    Id,
    /// Milestone label (`milestone`).
    Milestone,
    /// Time of day (`[time]`).
    Time,
    /// Calendar date (`[date]`).
    Date,
    /// Date and time (`[datetime]`).
    Datetime,
    /// Default body text (`*`).
    Default,
}

impl EnumStyleKey {
    /// Every canonical key, in palette order.
    pub const ALL: [EnumStyleKey; 9] = [
        EnumStyleKey::Header,
        EnumStyleKey::Header2,
        EnumStyleKey::Thead,
        EnumStyleKey::Id,
        EnumStyleKey::Milestone,
        EnumStyleKey::Time,
        EnumStyleKey::Date,
        EnumStyleKey::Datetime,
        EnumStyleKey::Default,
    ];

    /// Style name text as supplied by callers.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnumStyleKey::Header => "header",
            EnumStyleKey::Header2 => "header2",
            EnumStyleKey::Thead => "thead",
            EnumStyleKey::Id => "id",
            EnumStyleKey::Milestone => "milestone",
            EnumStyleKey::Time => "[time]",
            EnumStyleKey::Date => "[date]",
            EnumStyleKey::Datetime => "[datetime]",
            EnumStyleKey::Default => "*",
        }
    }

    /// Whether the palette defines a `:change` overlay for this key.
    pub fn if_has_change_variant(&self) -> bool {
        !matches!(
            self,
            EnumStyleKey::Header | EnumStyleKey::Header2 | EnumStyleKey::Thead
        )
    }

    /// Fixed number format of date/time keys.
    pub fn num_format(&self) -> Option<&'static str> {
        match self {
            EnumStyleKey::Time => Some("HH:MM:SS"),
            EnumStyleKey::Date => Some("YYYY-MM-DD"),
            EnumStyleKey::Datetime => Some("YYYY-MM-DD HH:MM:SS"),
            _ => None,
        }
    }

    fn from_base_name(name: &str) -> Option<EnumStyleKey> {
        EnumStyleKey::ALL
            .into_iter()
            .find(|key| key.as_str() == name)
    }
}

/// Resolved palette entry name: key plus optional `:change` overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecStyleName {
    /// Canonical key.
    pub key: EnumStyleKey,
    /// Highlight overlay.
    pub if_change: bool,
}

impl Default for SpecStyleName {
    fn default() -> Self {
        Self::new(EnumStyleKey::Default, false)
    }
}

impl SpecStyleName {
    /// Suffix marking the highlighted variant.
    pub const C_CHANGE_SUFFIX: &'static str = ":change";

    /// Create a style name from its parts.
    pub fn new(key: EnumStyleKey, if_change: bool) -> Self {
        Self { key, if_change }
    }

    /// Resolve caller-supplied style text to a palette entry.
    ///
    /// Unknown names fall back to `*`, or `*:change` when the name ends in `:change`.
    pub fn resolve(name: &str) -> Self {
        let (c_base, if_change) = match name.strip_suffix(Self::C_CHANGE_SUFFIX) {
            Some(c_base) => (c_base, true),
            None => (name, false),
        };
        match EnumStyleKey::from_base_name(c_base) {
            Some(key) if !if_change || key.if_has_change_variant() => Self::new(key, if_change),
            _ => Self::new(EnumStyleKey::Default, if_change),
        }
    }

    /// All names every palette must define.
    pub fn derive_canonical_names() -> Vec<SpecStyleName> {
        let mut l_names = Vec::new();
        for key in EnumStyleKey::ALL {
            l_names.push(Self::new(key, false));
            if key.if_has_change_variant() {
                l_names.push(Self::new(key, true));
            }
        }
        l_names
    }
}

impl fmt::Display for SpecStyleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.if_change {
            write!(f, "{}{}", self.key.as_str(), Self::C_CHANGE_SUFFIX)
        } else {
            f.write_str(self.key.as_str())
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellSpecification

/// Typed cell value supplied by callers.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Integer value.
    Integer(i64),
    /// Decimal value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
    /// Point in time; rendered in the writer's timezone.
    Timestamp(DateTime<Utc>),
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        EnumCellValue::String(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        EnumCellValue::String(value)
    }
}

impl From<i64> for EnumCellValue {
    fn from(value: i64) -> Self {
        EnumCellValue::Integer(value)
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        EnumCellValue::Number(value)
    }
}

impl From<bool> for EnumCellValue {
    fn from(value: bool) -> Self {
        EnumCellValue::Boolean(value)
    }
}

impl<T: TimeZone> From<DateTime<T>> for EnumCellValue {
    fn from(value: DateTime<T>) -> Self {
        EnumCellValue::Timestamp(value.with_timezone(&Utc))
    }
}

impl<T: Into<EnumCellValue>> From<Option<T>> for EnumCellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(EnumCellValue::None, Into::into)
    }
}

/// One cell of a row: value, style name and optional precomputed metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecCellEntry {
    /// Cell value.
    pub value: EnumCellValue,
    /// Style name; unknown names fall back at write time.
    pub style: String,
    /// Display width override.
    pub width: Option<f64>,
    /// Line-count override.
    pub line: Option<usize>,
}

impl SpecCellEntry {
    /// Create an entry without metric overrides.
    pub fn new(value: impl Into<EnumCellValue>, style: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            style: style.into(),
            width: None,
            line: None,
        }
    }

    /// Override derived display width.
    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    /// Override derived line count.
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormatSpecification

/// Per-sheet resource limits of one output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecWorksheetLimits {
    /// Maximum rows per sheet.
    pub n_rows_max: usize,
    /// Maximum columns per sheet.
    pub n_cols_max: usize,
    /// Maximum characters per cell.
    pub n_chars_max: usize,
}

/// Concrete output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumExcelFormat {
    /// Zipped OOXML (`.xlsx`), buffered writer.
    Xlsx,
    /// Legacy BIFF8 (`.xls`), streaming writer.
    Xls,
}

impl EnumExcelFormat {
    /// File extension without dot.
    pub fn ext(&self) -> &'static str {
        match self {
            EnumExcelFormat::Xlsx => "xlsx",
            EnumExcelFormat::Xls => "xls",
        }
    }

    /// Fixed MIME type.
    pub fn mimetype(&self) -> &'static str {
        match self {
            EnumExcelFormat::Xlsx => C_MIMETYPE_XLSX,
            EnumExcelFormat::Xls => C_MIMETYPE_XLS,
        }
    }

    /// Sheet limits enforced by the writer of this format.
    pub fn limits(&self) -> SpecWorksheetLimits {
        match self {
            EnumExcelFormat::Xlsx => SpecWorksheetLimits {
                n_rows_max: N_NROWS_XLSX_MAX,
                n_cols_max: N_NCOLS_XLSX_MAX,
                n_chars_max: N_CHARS_CELL_MAX,
            },
            EnumExcelFormat::Xls => SpecWorksheetLimits {
                n_rows_max: N_NROWS_XLS_MAX,
                n_cols_max: N_NCOLS_XLS_MAX,
                n_chars_max: N_CHARS_CELL_MAX,
            },
        }
    }

    /// Name of the backend crate behind this format.
    pub fn backend(&self) -> &'static str {
        match self {
            EnumExcelFormat::Xlsx => C_BACKEND_XLSX,
            EnumExcelFormat::Xls => C_BACKEND_XLS,
        }
    }

    /// Whether the backend was compiled in.
    pub fn if_available(&self) -> bool {
        match self {
            EnumExcelFormat::Xlsx => cfg!(feature = "xlsx"),
            EnumExcelFormat::Xls => cfg!(feature = "xls"),
        }
    }
}

impl fmt::Display for EnumExcelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ext())
    }
}

impl FromStr for EnumExcelFormat {
    type Err = ExcelWriterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xlsx" => Ok(EnumExcelFormat::Xlsx),
            "xls" => Ok(EnumExcelFormat::Xls),
            _ => Err(ExcelWriterError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Configured format preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumFormatPreference {
    /// Prefer XLSX, then XLS, whichever backend is available.
    #[default]
    Auto,
    /// Require one concrete format.
    Exact(EnumExcelFormat),
}

impl FromStr for EnumFormatPreference {
    type Err = ExcelWriterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == C_FORMAT_AUTO {
            return Ok(EnumFormatPreference::Auto);
        }
        s.parse::<EnumExcelFormat>().map(EnumFormatPreference::Exact)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ConfigSpecification

/// `[exceldownload]` configuration section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecExcelDownloadConfig {
    /// One of `(auto)`, `xlsx`, `xls`.
    pub format: String,
}

impl Default for SpecExcelDownloadConfig {
    fn default() -> Self {
        Self {
            format: C_FORMAT_AUTO.to_string(),
        }
    }
}

impl SpecExcelDownloadConfig {
    /// Parse the configured format preference.
    pub fn preference(&self) -> Result<EnumFormatPreference, ExcelWriterError> {
        self.format.trim().parse()
    }
}

/// Request-scoped rendering context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRequestContext {
    /// Timezone used to render timestamps.
    pub tz: Tz,
    /// Locale tag (`ja`, `zh_CN`, `en-US`, ...).
    pub locale: Option<String>,
}

impl Default for SpecRequestContext {
    fn default() -> Self {
        Self {
            tz: Tz::UTC,
            locale: None,
        }
    }
}

impl SpecRequestContext {
    /// Build context from an IANA timezone name and optional locale tag.
    pub fn from_names(tz_name: &str, locale: Option<&str>) -> Result<Self, ExcelWriterError> {
        let tz = tz_name
            .parse::<Tz>()
            .map_err(|_| ExcelWriterError::InvalidTimezone(tz_name.to_string()))?;
        Ok(Self {
            tz,
            locale: locale.map(ToString::to_string),
        })
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Coarse error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumErrorKind {
    /// Bad format preference or missing backend; raised before any row is written.
    Configuration,
    /// A sheet limit was exceeded.
    ResourceLimit,
    /// Backend encoding or output failure.
    Backend,
}

/// Top-level error for writer operations.
#[derive(Debug, Error)]
pub enum ExcelWriterError {
    /// Backend for an explicitly requested format is not compiled in.
    #[error("Require {0} library")]
    MissingBackend(&'static str),
    /// `(auto)` found no backend at all.
    #[error("Require {} or {} library", C_BACKEND_XLSX, C_BACKEND_XLS)]
    NoBackendAvailable,
    /// Unknown format preference or extension.
    #[error("Unsupported format: '{0}'")]
    UnsupportedFormat(String),
    /// Unknown timezone name.
    #[error("Unknown timezone: '{0}'")]
    InvalidTimezone(String),
    /// Row cursor reached the sheet row limit.
    #[error("{}", derive_limit_message("row", .n_limit))]
    WorksheetLimitExceeded {
        /// Row limit of the sheet.
        n_limit: usize,
    },
    /// Row has more cells than the sheet column limit.
    #[error("{}", derive_limit_message("column", .n_limit))]
    ColumnLimitExceeded {
        /// Column limit of the sheet.
        n_limit: usize,
    },
    /// Workbook was already serialized.
    #[error("Cannot write after the workbook was dumped.")]
    WorkbookClosed,
    /// Worksheet index out of range.
    #[error("Worksheet not found: {0}")]
    SheetNotFound(usize),
    /// Workbook encoding failure reported by a backend.
    #[error("{0}")]
    Backend(String),
    /// Output stream failure.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ExcelWriterError {
    /// Classify the error.
    pub fn kind(&self) -> EnumErrorKind {
        match self {
            Self::MissingBackend(_)
            | Self::NoBackendAvailable
            | Self::UnsupportedFormat(_)
            | Self::InvalidTimezone(_) => EnumErrorKind::Configuration,
            Self::WorksheetLimitExceeded { .. } | Self::ColumnLimitExceeded { .. } => {
                EnumErrorKind::ResourceLimit
            }
            Self::WorkbookClosed | Self::SheetNotFound(_) | Self::Backend(_) | Self::Io(_) => {
                EnumErrorKind::Backend
            }
        }
    }
}

fn derive_limit_message(c_unit: &str, n_limit: &usize) -> String {
    let c_suffix = if *n_limit == 1 { "" } else { "s" };
    format!("Number of {c_unit}s in the Excel sheet exceeded the limit of {n_limit} {c_unit}{c_suffix}")
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
