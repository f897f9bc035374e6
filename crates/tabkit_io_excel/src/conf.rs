//! Excel writer constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::{EnumExcelFormat, EnumStyleKey, SpecCellFormat, SpecStyleName};

/// XLSX worksheet maximum row count.
pub const N_NROWS_XLSX_MAX: usize = 1_048_576;
/// XLSX worksheet maximum column count.
pub const N_NCOLS_XLSX_MAX: usize = 16_384;
/// XLS (BIFF8) worksheet maximum row count.
pub const N_NROWS_XLS_MAX: usize = 65_536;
/// XLS (BIFF8) worksheet maximum column count.
pub const N_NCOLS_XLS_MAX: usize = 255;
/// Maximum characters stored in one cell, shared by both formats.
pub const N_CHARS_CELL_MAX: usize = 32_767;

/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Texts longer than this many characters bypass the metrics cache.
pub const N_LEN_METRICS_CACHE_KEY_MAX: usize = 64;
/// Character count to Excel column-width unit divisor.
pub const N_RATIO_CHAR_TO_WIDTH: f64 = 1.2;
/// Cap on the running column width before padding.
pub const N_WIDTH_COL_MAX: f64 = 50.0;
/// Padding added to every finalized column width.
pub const N_WIDTH_COL_PADDING: f64 = 1.0;

/// Streaming writer flushes whenever the row cursor is a multiple of this.
pub const N_ROWS_FLUSH_INTERVAL: usize = 512;
/// Streaming writer flushes once this many cells are pending.
pub const N_CELLS_FLUSH_THRESHOLD: usize = 4_096;
/// Line count cap used by the row height hint.
pub const N_LINES_ROW_HEIGHT_MAX: usize = 10;
/// Base row height unit in twips (one 9pt line).
pub const N_HEIGHT_ROW_UNIT_TWIPS: u32 = 255;
/// Font height (twips) that maps to one base row height unit.
pub const N_HEIGHT_FONT_BASE_TWIPS: u32 = 180;

/// Configuration value selecting automatic format resolution.
pub const C_FORMAT_AUTO: &str = "(auto)";
/// MIME type of legacy binary workbooks.
pub const C_MIMETYPE_XLS: &str = "application/vnd.ms-excel";
/// MIME type of OOXML spreadsheet workbooks.
pub const C_MIMETYPE_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Backend crate that implements XLSX output.
pub const C_BACKEND_XLSX: &str = "rust_xlsxwriter";
/// Backend crate that implements XLS container output.
pub const C_BACKEND_XLS: &str = "cfb";

/// Highlight fill overlaid by every `:change` style.
pub const C_COLOR_CHANGE_FILL: &str = "#FF9900";
/// Font color of link-like styles.
pub const C_COLOR_LINK: &str = "#0000FF";

/// Build the default style palette for one output format.
///
/// Every [`SpecStyleName::derive_canonical_names`] entry is present.
pub fn derive_default_style_palette(
    format: EnumExcelFormat,
) -> BTreeMap<SpecStyleName, SpecCellFormat> {
    let cfg_font_spec = SpecCellFormat {
        font_name: Some("Arial".to_string()),
        ..Default::default()
    };
    let cfg_base_fmt_spec = cfg_font_spec.with_(SpecCellFormat {
        font_size: Some(9),
        valign: Some("top".to_string()),
        text_wrap: Some(true),
        border: Some(1),
        ..Default::default()
    });
    let cfg_link_patch = SpecCellFormat {
        underline: Some(true),
        font_color: Some(C_COLOR_LINK.to_string()),
        ..Default::default()
    };

    let mut dict_fmt = BTreeMap::new();
    for key in EnumStyleKey::ALL {
        let fmt_spec = match key {
            EnumStyleKey::Header => cfg_font_spec.with_(SpecCellFormat {
                font_size: Some(20),
                ..Default::default()
            }),
            EnumStyleKey::Header2 => cfg_font_spec.with_(SpecCellFormat {
                font_size: Some(16),
                ..Default::default()
            }),
            EnumStyleKey::Thead => cfg_base_fmt_spec.with_(SpecCellFormat {
                bold: Some(true),
                font_color: Some("#FFFFFF".to_string()),
                bg_color: Some("#000000".to_string()),
                border_color: Some("#FFFFFF".to_string()),
                ..Default::default()
            }),
            EnumStyleKey::Id => cfg_base_fmt_spec
                .with_(cfg_link_patch.clone())
                .with_(SpecCellFormat {
                    align: Some("right".to_string()),
                    num_format: Some("\"#\"0".to_string()),
                    ..Default::default()
                }),
            EnumStyleKey::Milestone => {
                let fmt_milestone = cfg_base_fmt_spec.with_(SpecCellFormat {
                    num_format: Some("@".to_string()),
                    ..Default::default()
                });
                match format {
                    EnumExcelFormat::Xls => fmt_milestone.with_(cfg_link_patch.clone()),
                    EnumExcelFormat::Xlsx => fmt_milestone,
                }
            }
            EnumStyleKey::Time | EnumStyleKey::Date | EnumStyleKey::Datetime => cfg_base_fmt_spec
                .with_(SpecCellFormat {
                    num_format: key.num_format().map(ToString::to_string),
                    ..Default::default()
                }),
            EnumStyleKey::Default => cfg_base_fmt_spec.with_(SpecCellFormat {
                num_format: Some("@".to_string()),
                ..Default::default()
            }),
        };

        if key.if_has_change_variant() {
            dict_fmt.insert(
                SpecStyleName::new(key, true),
                fmt_spec.with_(SpecCellFormat {
                    bg_color: Some(C_COLOR_CHANGE_FILL.to_string()),
                    ..Default::default()
                }),
            );
        }
        dict_fmt.insert(SpecStyleName::new(key, false), fmt_spec);
    }

    dict_fmt
}
