//! Buffered XLSX binding on top of `rust_xlsxwriter`.
//!
//! Rows are kept as `(payload, style)` matrices and only materialized into the
//! workbook when [`WorksheetWriter::set_col_widths`] finalizes the sheet. Sheets
//! use constant-memory mode: widths are set first, then rows stream out in order.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, FormatPattern, FormatUnderline, Workbook, Worksheet,
    XlsxError,
};

use crate::conf::derive_default_style_palette;
use crate::spec::{
    EnumExcelFormat, ExcelWriterError, SpecCellEntry, SpecCellFormat, SpecRequestContext,
    SpecStyleName, SpecWorksheetLimits,
};
use crate::util::derive_unique_sheet_name;
use crate::writer::{
    EnumCellPayload, WorkbookWriter, WorksheetCursor, WorksheetWriter, WriterContext, plan_row,
};

type BufferedRow = (usize, Vec<(EnumCellPayload, SpecStyleName)>);

struct XlsxSheetState {
    cursor: WorksheetCursor,
    l_rows: Vec<BufferedRow>,
}

/// Workbook writer producing `.xlsx` output.
pub struct XlsxWorkbookWriter {
    workbook: Workbook,
    ctx: WriterContext,
    dict_formats: BTreeMap<SpecStyleName, Format>,
    l_sheets: Vec<XlsxSheetState>,
    set_sheet_names_existing: BTreeSet<String>,
    if_closed: bool,
}

impl XlsxWorkbookWriter {
    /// Create a writer; every palette style is registered up front.
    pub fn new(request_ctx: &SpecRequestContext) -> Self {
        let dict_formats = derive_default_style_palette(EnumExcelFormat::Xlsx)
            .iter()
            .map(|(name, fmt_spec)| (*name, derive_rust_xlsx_format(fmt_spec)))
            .collect();
        Self {
            workbook: Workbook::new(),
            ctx: WriterContext::new(EnumExcelFormat::Xlsx, request_ctx),
            dict_formats,
            l_sheets: Vec::new(),
            set_sheet_names_existing: BTreeSet::new(),
            if_closed: false,
        }
    }

    fn create_worksheet_writer(
        &mut self,
        sheet_idx: usize,
    ) -> Result<XlsxWorksheetWriter<'_>, ExcelWriterError> {
        let state = self
            .l_sheets
            .get_mut(sheet_idx)
            .ok_or(ExcelWriterError::SheetNotFound(sheet_idx))?;
        let worksheet = self
            .workbook
            .worksheet_from_index(sheet_idx)
            .map_err(derive_xlsx_error)?;
        Ok(XlsxWorksheetWriter {
            worksheet,
            ctx: &mut self.ctx,
            dict_formats: &self.dict_formats,
            state,
        })
    }
}

impl WorkbookWriter for XlsxWorkbookWriter {
    fn format(&self) -> EnumExcelFormat {
        EnumExcelFormat::Xlsx
    }

    fn create_sheet(
        &mut self,
        title: &str,
    ) -> Result<Box<dyn WorksheetWriter + '_>, ExcelWriterError> {
        if self.if_closed {
            return Err(ExcelWriterError::WorkbookClosed);
        }
        let c_title = derive_unique_sheet_name(title, &mut self.set_sheet_names_existing);
        // A rejected name must leave the workbook untouched.
        if let Err(err) = Worksheet::new().set_name(&c_title) {
            self.set_sheet_names_existing.remove(&c_title.to_lowercase());
            return Err(derive_xlsx_error(err));
        }
        self.workbook
            .add_worksheet_with_constant_memory()
            .set_name(&c_title)
            .map_err(derive_xlsx_error)?;
        log::debug!("Create xlsx sheet {c_title:?}.");

        self.l_sheets.push(XlsxSheetState {
            cursor: WorksheetCursor::new(c_title, self.ctx.limits),
            l_rows: Vec::new(),
        });
        let sheet_idx = self.l_sheets.len() - 1;
        Ok(Box::new(self.create_worksheet_writer(sheet_idx)?))
    }

    fn worksheet(
        &mut self,
        sheet_idx: usize,
    ) -> Result<Box<dyn WorksheetWriter + '_>, ExcelWriterError> {
        if self.if_closed {
            return Err(ExcelWriterError::WorkbookClosed);
        }
        Ok(Box::new(self.create_worksheet_writer(sheet_idx)?))
    }

    fn sheet_count(&self) -> usize {
        self.l_sheets.len()
    }

    fn dump(&mut self, out: &mut dyn Write) -> Result<(), ExcelWriterError> {
        if self.if_closed {
            return Err(ExcelWriterError::WorkbookClosed);
        }
        for sheet_idx in 0..self.l_sheets.len() {
            self.create_worksheet_writer(sheet_idx)?.set_col_widths()?;
        }
        if self.l_sheets.is_empty() {
            self.workbook.add_worksheet_with_constant_memory();
        }

        let v_bytes = self.workbook.save_to_buffer().map_err(derive_xlsx_error)?;
        out.write_all(&v_bytes)?;
        self.if_closed = true;
        log::debug!("Dump xlsx workbook ({} bytes).", v_bytes.len());
        Ok(())
    }
}

/// Buffered writer of one `.xlsx` sheet.
pub struct XlsxWorksheetWriter<'a> {
    worksheet: &'a mut Worksheet,
    ctx: &'a mut WriterContext,
    dict_formats: &'a BTreeMap<SpecStyleName, Format>,
    state: &'a mut XlsxSheetState,
}

impl WorksheetWriter for XlsxWorksheetWriter<'_> {
    fn write_row(&mut self, cells: &[SpecCellEntry]) -> Result<(), ExcelWriterError> {
        let l_plans = plan_row(cells, &mut self.state.cursor, self.ctx)?;
        if !l_plans.is_empty() {
            let l_cells = l_plans
                .into_iter()
                .map(|plan| (plan.payload, plan.style))
                .collect();
            self.state.l_rows.push((self.state.cursor.row_idx, l_cells));
        }
        self.state.cursor.advance()
    }

    fn move_row(&mut self) -> Result<(), ExcelWriterError> {
        self.state.cursor.advance()
    }

    fn set_col_widths(&mut self) -> Result<(), ExcelWriterError> {
        for (col_idx, width) in self.state.cursor.plan_col_widths() {
            self.worksheet
                .set_column_width(cast_col_num(col_idx)?, width)
                .map_err(derive_xlsx_error)?;
        }

        for (row_idx, l_cells) in std::mem::take(&mut self.state.l_rows) {
            for (col_idx, (payload, style)) in l_cells.iter().enumerate() {
                let format = self
                    .dict_formats
                    .get(style)
                    .or_else(|| self.dict_formats.get(&SpecStyleName::default()));
                write_cell_with_format(self.worksheet, row_idx, col_idx, payload, format)?;
            }
        }
        Ok(())
    }

    fn row_idx(&self) -> usize {
        self.state.cursor.row_idx
    }

    fn title(&self) -> &str {
        &self.state.cursor.title
    }

    fn limits(&self) -> SpecWorksheetLimits {
        self.state.cursor.limits
    }

    fn col_width(&self, col_idx: usize) -> Option<f64> {
        self.state.cursor.dict_col_widths.get(&col_idx).copied()
    }
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    payload: &EnumCellPayload,
    format: Option<&Format>,
) -> Result<(), ExcelWriterError> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    let fmt_default = Format::new();
    let format = format.unwrap_or(&fmt_default);

    match payload {
        EnumCellPayload::Blank => worksheet.write_blank(n_row, n_col, format),
        EnumCellPayload::Text(val) => worksheet.write_string_with_format(n_row, n_col, val, format),
        EnumCellPayload::Number(val) | EnumCellPayload::Serial(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)
        }
        EnumCellPayload::Boolean(val) => {
            worksheet.write_boolean_with_format(n_row, n_col, *val, format)
        }
    }
    .map_err(derive_xlsx_error)?;
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }
    if spec.underline.unwrap_or(false) {
        format = format.set_underline(FormatUnderline::Single);
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if let Some(val) = &spec.border_color {
        format = format.set_border_color(Color::from(val.as_str()));
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format
            .set_pattern(FormatPattern::Solid)
            .set_background_color(val.as_str());
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, ExcelWriterError> {
    u32::try_from(value)
        .map_err(|_| ExcelWriterError::Backend(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16, ExcelWriterError> {
    u16::try_from(value)
        .map_err(|_| ExcelWriterError::Backend(format!("column index overflow: {value}")))
}

fn derive_xlsx_error(err: XlsxError) -> ExcelWriterError {
    ExcelWriterError::Backend(format!("xlsx write error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xlsx_writer_registers_every_palette_style() {
        let writer = XlsxWorkbookWriter::new(&SpecRequestContext::default());
        assert_eq!(writer.dict_formats.len(), SpecStyleName::derive_canonical_names().len());
    }

    #[test]
    fn test_xlsx_rows_are_buffered_until_finalized() {
        let mut writer = XlsxWorkbookWriter::new(&SpecRequestContext::default());
        {
            let mut sheet = writer.create_sheet("Tickets").unwrap();
            sheet.write_row(&[SpecCellEntry::new("a", "*")]).unwrap();
            sheet.move_row().unwrap();
            sheet.write_row(&[]).unwrap();
            sheet.write_row(&[SpecCellEntry::new(1_i64, "id")]).unwrap();
            assert_eq!(sheet.row_idx(), 4);
        }
        assert_eq!(writer.l_sheets[0].l_rows.len(), 2);
        assert_eq!(writer.l_sheets[0].l_rows[1].0, 3);

        writer.worksheet(0).unwrap().set_col_widths().unwrap();
        assert!(writer.l_sheets[0].l_rows.is_empty());
    }

    #[test]
    fn test_xlsx_dump_signature_and_close() {
        let mut writer = XlsxWorkbookWriter::new(&SpecRequestContext::default());
        writer.create_sheet("Empty").unwrap();
        let v_bytes = writer.dumps().unwrap();
        assert_eq!(&v_bytes[..4], b"PK\x03\x04");

        assert!(matches!(
            writer.dumps().unwrap_err(),
            ExcelWriterError::WorkbookClosed
        ));
        assert!(matches!(
            writer.create_sheet("Late").err(),
            Some(ExcelWriterError::WorkbookClosed)
        ));
    }

    #[test]
    fn test_xlsx_worksheet_index_out_of_range() {
        let mut writer = XlsxWorkbookWriter::new(&SpecRequestContext::default());
        assert!(matches!(
            writer.worksheet(3).err(),
            Some(ExcelWriterError::SheetNotFound(3))
        ));
    }
}
