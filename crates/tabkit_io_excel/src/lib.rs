//! `tabkit_io_excel` v1:
//! Incremental XLSX/XLS workbook writer kernel.
//!
//! Layout:
//! - `conf`    : limits, thresholds and the default style palette
//! - `spec`    : cell/style/config models and errors
//! - `util`    : pure helper functions
//! - `metrics` : display width/line metrics with cache
//! - `writer`  : writer contracts and the shared cell pipeline
//! - `xlsx`    : buffered binding (`rust_xlsxwriter`)
//! - `biff`    : BIFF8 records and OLE2 packaging (`cfb`)
//! - `xls`     : streaming binding on top of `biff`
//! - `format`  : output format selection
pub mod conf;
pub mod format;
pub mod metrics;
pub mod spec;
pub mod util;
pub mod writer;

#[cfg(feature = "xls")]
pub mod biff;
#[cfg(feature = "xls")]
pub mod xls;
#[cfg(feature = "xlsx")]
pub mod xlsx;

pub use conf::{
    C_FORMAT_AUTO, C_MIMETYPE_XLS, C_MIMETYPE_XLSX, N_CHARS_CELL_MAX, N_LEN_EXCEL_SHEET_NAME_MAX,
    N_NCOLS_XLS_MAX, N_NCOLS_XLSX_MAX, N_NROWS_XLS_MAX, N_NROWS_XLSX_MAX, TUP_EXCEL_ILLEGAL,
    derive_default_style_palette,
};
pub use format::{
    create_workbook_writer, get_excel_format, get_excel_mimetype, get_workbook_writer,
    resolve_format, writer_for,
};
pub use metrics::MetricsCalculator;
pub use spec::{
    EnumCellValue, EnumErrorKind, EnumExcelFormat, EnumFormatPreference, EnumStyleKey,
    ExcelWriterError, SpecCellEntry, SpecCellFormat, SpecExcelDownloadConfig, SpecRequestContext,
    SpecStyleName, SpecWorksheetLimits,
};
pub use util::{normalize_text, sanitize_sheet_name};
pub use writer::{WorkbookWriter, WorksheetWriter};
#[cfg(feature = "xls")]
pub use xls::XlsWorkbookWriter;
#[cfg(feature = "xlsx")]
pub use xlsx::XlsxWorkbookWriter;
