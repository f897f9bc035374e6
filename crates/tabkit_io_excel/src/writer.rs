//! Format-agnostic workbook/worksheet writer contracts and shared cell pipeline.
//!
//! Both bindings run every cell through [`derive_cell_plan`] so styling, width
//! derivation and text normalization behave identically; they differ only in
//! how planned cells reach the output (buffered matrix vs. streamed records).

use std::collections::BTreeMap;
use std::io::Write;

use chrono_tz::Tz;

use crate::conf::N_RATIO_CHAR_TO_WIDTH;
use crate::metrics::MetricsCalculator;
use crate::spec::{
    EnumCellValue, EnumExcelFormat, EnumStyleKey, ExcelWriterError, SpecCellEntry,
    SpecRequestContext, SpecStyleName, SpecWorksheetLimits,
};
use crate::util::{
    calculate_col_width, calculate_excel_serial, convert_nan_inf_to_str, derive_ambiguous_width,
    derive_local_timestamp, derive_number_text, normalize_text,
};

////////////////////////////////////////////////////////////////////////////////
// #region WriterContracts

/// Incremental writer of one sheet.
pub trait WorksheetWriter {
    /// Write one row of cells at the row cursor and advance the cursor.
    fn write_row(&mut self, cells: &[SpecCellEntry]) -> Result<(), ExcelWriterError>;

    /// Advance the row cursor without writing cells.
    fn move_row(&mut self) -> Result<(), ExcelWriterError>;

    /// Apply `1 + min(max_width, 50)` to every column seen so far.
    fn set_col_widths(&mut self) -> Result<(), ExcelWriterError>;

    /// Current row cursor.
    fn row_idx(&self) -> usize;

    /// Final sheet title.
    fn title(&self) -> &str;

    /// Limits enforced on this sheet.
    fn limits(&self) -> SpecWorksheetLimits;

    /// Running max width of a column, if any cell was written to it.
    fn col_width(&self, col_idx: usize) -> Option<f64>;
}

/// Workbook writer bound to one output format.
pub trait WorkbookWriter {
    /// Output format.
    fn format(&self) -> EnumExcelFormat;

    /// File extension without dot.
    fn ext(&self) -> &'static str {
        self.format().ext()
    }

    /// MIME type of the serialized workbook.
    fn mimetype(&self) -> &'static str {
        self.format().mimetype()
    }

    /// Create and register a new sheet; the title is sanitized and made unique.
    fn create_sheet(
        &mut self,
        title: &str,
    ) -> Result<Box<dyn WorksheetWriter + '_>, ExcelWriterError>;

    /// Reopen the writer of an existing sheet by creation order.
    fn worksheet(
        &mut self,
        sheet_idx: usize,
    ) -> Result<Box<dyn WorksheetWriter + '_>, ExcelWriterError>;

    /// Number of sheets created so far.
    fn sheet_count(&self) -> usize;

    /// Finalize every sheet and serialize the workbook. Allowed once.
    fn dump(&mut self, out: &mut dyn Write) -> Result<(), ExcelWriterError>;

    /// Serialize the workbook into memory.
    fn dumps(&mut self) -> Result<Vec<u8>, ExcelWriterError> {
        let mut v_out = Vec::new();
        self.dump(&mut v_out)?;
        Ok(v_out)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SharedState

/// Per-workbook state shared by all of its sheets.
#[derive(Debug, Clone)]
pub struct WriterContext {
    /// Output format.
    pub format: EnumExcelFormat,
    /// Timezone timestamps are rendered in.
    pub tz: Tz,
    /// Shared metrics calculator.
    pub metrics: MetricsCalculator,
    /// Per-sheet limits.
    pub limits: SpecWorksheetLimits,
}

impl WriterContext {
    /// Derive writer state from the request context.
    pub fn new(format: EnumExcelFormat, request_ctx: &SpecRequestContext) -> Self {
        let n_ambiguous_width = derive_ambiguous_width(request_ctx.locale.as_deref());
        log::debug!(
            "Create {format} workbook writer (tz={}, ambiguous_width={n_ambiguous_width}).",
            request_ctx.tz
        );
        Self {
            format,
            tz: request_ctx.tz,
            metrics: MetricsCalculator::new(n_ambiguous_width),
            limits: format.limits(),
        }
    }
}

/// Row cursor and running column widths of one sheet.
#[derive(Debug, Clone)]
pub struct WorksheetCursor {
    /// Final sheet title.
    pub title: String,
    /// Next row to write.
    pub row_idx: usize,
    /// Running max width per column.
    pub dict_col_widths: BTreeMap<usize, f64>,
    /// Sheet limits.
    pub limits: SpecWorksheetLimits,
}

impl WorksheetCursor {
    /// Create a cursor at row 0.
    pub fn new(title: String, limits: SpecWorksheetLimits) -> Self {
        Self {
            title,
            row_idx: 0,
            dict_col_widths: BTreeMap::new(),
            limits,
        }
    }

    /// Fail when the cursor already sits past the last writable row.
    pub fn validate_row_available(&self) -> Result<(), ExcelWriterError> {
        if self.row_idx >= self.limits.n_rows_max {
            return Err(ExcelWriterError::WorksheetLimitExceeded {
                n_limit: self.limits.n_rows_max,
            });
        }
        Ok(())
    }

    /// Fail when a row carries more cells than the column limit.
    pub fn validate_col_count(&self, n_cols: usize) -> Result<(), ExcelWriterError> {
        if n_cols > self.limits.n_cols_max {
            return Err(ExcelWriterError::ColumnLimitExceeded {
                n_limit: self.limits.n_cols_max,
            });
        }
        Ok(())
    }

    /// Advance the row cursor by one.
    pub fn advance(&mut self) -> Result<(), ExcelWriterError> {
        self.validate_row_available()?;
        self.row_idx += 1;
        Ok(())
    }

    /// Raise the running width of a column; columns start at width 1.
    pub fn update_col_width(&mut self, col_idx: usize, width: f64) {
        let n_width = self.dict_col_widths.entry(col_idx).or_insert(1.0);
        if *n_width < width {
            *n_width = width;
        }
    }

    /// Final `(column, width)` pairs.
    pub fn plan_col_widths(&self) -> Vec<(usize, f64)> {
        self.dict_col_widths
            .iter()
            .map(|(col_idx, width)| (*col_idx, calculate_col_width(*width)))
            .collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellPipeline

/// Cell value after conversion, ready for a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellPayload {
    /// Styled empty cell.
    Blank,
    /// Normalized text.
    Text(String),
    /// Number.
    Number(f64),
    /// Boolean.
    Boolean(bool),
    /// Excel serial date in the writer's timezone.
    Serial(f64),
}

/// One converted cell: payload, resolved style and derived metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecCellPlan {
    /// Value to emit.
    pub payload: EnumCellPayload,
    /// Resolved palette entry.
    pub style: SpecStyleName,
    /// Display width in Excel width units.
    pub width: f64,
    /// Line count.
    pub line: usize,
}

const N_WIDTH_BOOLEAN: f64 = 1.0;

/// Convert one cell entry: resolve style, render value, derive width/lines.
///
/// Explicit `width`/`line` on the entry always win over derived metrics.
pub fn derive_cell_plan(entry: &SpecCellEntry, ctx: &mut WriterContext) -> SpecCellPlan {
    let style = SpecStyleName::resolve(&entry.style);

    let (payload, width_derived, line_derived) = match &entry.value {
        EnumCellValue::Timestamp(ts) => {
            let dt_local = derive_local_timestamp(ts, &ctx.tz);
            // Only the exact `[date]`/`[time]` names narrow the width; `:change` variants do not.
            let n_chars = match entry.style.as_str() {
                c_style if c_style == EnumStyleKey::Date.as_str() => "YYYY-MM-DD".len(),
                c_style if c_style == EnumStyleKey::Time.as_str() => "HH:MM:SS".len(),
                _ => "YYYY-MM-DD HH:MM:SS".len(),
            };
            (
                EnumCellPayload::Serial(calculate_excel_serial(&dt_local)),
                Some(n_chars as f64 / N_RATIO_CHAR_TO_WIDTH),
                Some(1),
            )
        }
        EnumCellValue::Integer(n) => (
            EnumCellPayload::Number(*n as f64),
            Some(n.to_string().len() as f64 / N_RATIO_CHAR_TO_WIDTH),
            Some(1),
        ),
        EnumCellValue::Number(x) => match convert_nan_inf_to_str(*x) {
            Some(c_text) => (EnumCellPayload::Text(c_text.to_string()), None, None),
            None => (
                EnumCellPayload::Number(*x),
                Some(derive_number_text(*x).len() as f64 / N_RATIO_CHAR_TO_WIDTH),
                Some(1),
            ),
        },
        EnumCellValue::Boolean(b) => (EnumCellPayload::Boolean(*b), Some(N_WIDTH_BOOLEAN), Some(1)),
        EnumCellValue::String(c_value) => {
            let c_text = normalize_text(c_value, ctx.limits.n_chars_max);
            if c_text.is_empty() {
                (EnumCellPayload::Blank, None, None)
            } else {
                (EnumCellPayload::Text(c_text), None, None)
            }
        }
        EnumCellValue::None => (EnumCellPayload::Blank, None, None),
    };

    let mut width = entry.width.or(width_derived);
    let mut line = entry.line.or(line_derived);
    if width.is_none() || line.is_none() {
        let c_text = match &payload {
            EnumCellPayload::Text(c_text) => Some(c_text.as_str()),
            _ => None,
        };
        let (n_width, n_lines) = ctx.metrics.get_metrics(c_text);
        width = width.or(Some(n_width as f64));
        line = line.or(Some(n_lines));
    }

    SpecCellPlan {
        payload,
        style,
        width: width.unwrap_or(0.0),
        line: line.unwrap_or(1),
    }
}

/// Check limits and convert a whole row, updating running column widths.
///
/// Does not advance the cursor.
pub fn plan_row(
    cells: &[SpecCellEntry],
    cursor: &mut WorksheetCursor,
    ctx: &mut WriterContext,
) -> Result<Vec<SpecCellPlan>, ExcelWriterError> {
    cursor.validate_row_available()?;
    cursor.validate_col_count(cells.len())?;

    let mut l_plans = Vec::with_capacity(cells.len());
    for (col_idx, entry) in cells.iter().enumerate() {
        let plan = derive_cell_plan(entry, ctx);
        cursor.update_col_width(col_idx, plan.width);
        l_plans.push(plan);
    }
    Ok(l_plans)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
