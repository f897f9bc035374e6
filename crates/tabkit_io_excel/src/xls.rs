//! Streaming XLS binding: BIFF8 records written per row and packed into OLE2 on dump.
//!
//! Cell records are produced as rows arrive; pending rows are flushed into the
//! sheet record buffer every [`N_ROWS_FLUSH_INTERVAL`] rows or once
//! [`N_CELLS_FLUSH_THRESHOLD`] cells are pending.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use crate::biff::{
    BOF_DT_WORKBOOK_GLOBALS, BOF_DT_WORKSHEET, BiffStyleTable, N_COLOR_AUTOMATIC,
    N_COLOR_BORDER_AUTOMATIC, RECORD_BLANK, RECORD_BOF, RECORD_BOOLERR, RECORD_BOUNDSHEET,
    RECORD_CODEPAGE, RECORD_COLINFO, RECORD_DATEMODE, RECORD_DIMENSIONS, RECORD_EOF,
    RECORD_LABELSST, RECORD_NUMBER, RECORD_ROW, RECORD_WINDOW1, RECORD_WINDOW2, RECORD_WSBOOL,
    SharedStringTable, SpecBiffStyle, derive_color_index, encode_blank, encode_bof,
    encode_boolerr, encode_boundsheet, encode_codepage, encode_colinfo, encode_datemode,
    encode_dimensions, encode_labelsst, encode_number, encode_row, encode_window1, encode_window2,
    encode_wsbool, push_record, wrap_compound_file,
};
use crate::conf::{N_CELLS_FLUSH_THRESHOLD, N_ROWS_FLUSH_INTERVAL, derive_default_style_palette};
use crate::spec::{
    EnumExcelFormat, ExcelWriterError, SpecCellEntry, SpecCellFormat, SpecRequestContext,
    SpecStyleName, SpecWorksheetLimits,
};
use crate::util::{calculate_row_height, derive_unique_sheet_name};
use crate::writer::{
    EnumCellPayload, WorkbookWriter, WorksheetCursor, WorksheetWriter, WriterContext, plan_row,
};

////////////////////////////////////////////////////////////////////////////////
// #region SheetState

#[derive(Debug, Clone, PartialEq)]
enum EnumBiffCell {
    Blank,
    Number(f64),
    Boolean(bool),
    Label(u32),
}

#[derive(Debug, Clone)]
struct PendingRow {
    n_row: u16,
    n_height: u16,
    l_cells: Vec<(u16, BiffCell)>,
}

/// `(xf index, value)` of one cell.
type BiffCell = (u16, EnumBiffCell);

#[derive(Debug, Clone)]
struct XlsSheetState {
    cursor: WorksheetCursor,
    l_rows_pending: Vec<PendingRow>,
    n_cells_pending: usize,
    v_cell_records: Vec<u8>,
    l_col_widths: Vec<(usize, f64)>,
    n_rows_used: u32,
    n_cols_used: u16,
    n_flushes: usize,
}

impl XlsSheetState {
    fn new(cursor: WorksheetCursor) -> Self {
        Self {
            cursor,
            l_rows_pending: Vec::new(),
            n_cells_pending: 0,
            v_cell_records: Vec::new(),
            l_col_widths: Vec::new(),
            n_rows_used: 0,
            n_cols_used: 0,
            n_flushes: 0,
        }
    }

    fn flush_rows(&mut self) {
        if self.l_rows_pending.is_empty() {
            self.n_cells_pending = 0;
            return;
        }
        let l_rows = std::mem::take(&mut self.l_rows_pending);
        for row in &l_rows {
            let v_row = encode_row(row.n_row, row.l_cells.len() as u16, row.n_height);
            push_record(&mut self.v_cell_records, RECORD_ROW, &v_row);
        }
        for row in &l_rows {
            for (n_col, cell) in &row.l_cells {
                self.push_cell_record(row.n_row, *n_col, cell);
            }
        }
        log::debug!(
            "Flush xls rows of sheet {:?} (row_idx={}, cells={}).",
            self.cursor.title,
            self.cursor.row_idx,
            self.n_cells_pending
        );
        self.n_cells_pending = 0;
        self.n_flushes += 1;
    }

    fn push_cell_record(&mut self, n_row: u16, n_col: u16, cell: &BiffCell) {
        let (n_xf, value) = cell;
        let out = &mut self.v_cell_records;
        match value {
            EnumBiffCell::Blank => push_record(out, RECORD_BLANK, &encode_blank(n_row, n_col, *n_xf)),
            EnumBiffCell::Number(x) => {
                push_record(out, RECORD_NUMBER, &encode_number(n_row, n_col, *n_xf, *x))
            }
            EnumBiffCell::Boolean(b) => {
                push_record(out, RECORD_BOOLERR, &encode_boolerr(n_row, n_col, *n_xf, *b))
            }
            EnumBiffCell::Label(n_isst) => push_record(
                out,
                RECORD_LABELSST,
                &encode_labelsst(n_row, n_col, *n_xf, *n_isst),
            ),
        }
    }

    fn flush_if_needed(&mut self) {
        if self.cursor.row_idx % N_ROWS_FLUSH_INTERVAL == 0
            || self.n_cells_pending >= N_CELLS_FLUSH_THRESHOLD
        {
            self.flush_rows();
        }
    }

    /// Worksheet substream: BOF through EOF.
    fn encode_substream(&self, if_selected: bool) -> Vec<u8> {
        let mut out = Vec::new();
        push_record(&mut out, RECORD_BOF, &encode_bof(BOF_DT_WORKSHEET));
        push_record(&mut out, RECORD_WSBOOL, &encode_wsbool());
        for (col_idx, width) in &self.l_col_widths {
            let n_width = (width * 256.0).round() as u16;
            push_record(&mut out, RECORD_COLINFO, &encode_colinfo(*col_idx as u16, n_width));
        }
        push_record(
            &mut out,
            RECORD_DIMENSIONS,
            &encode_dimensions(self.n_rows_used, self.n_cols_used),
        );
        out.extend_from_slice(&self.v_cell_records);
        push_record(&mut out, RECORD_WINDOW2, &encode_window2(if_selected));
        push_record(&mut out, RECORD_EOF, &[]);
        out
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StyleResolver

/// Palette styles mapped lazily onto XF records.
#[derive(Debug, Clone)]
struct XlsStyleResolver {
    dict_formats: BTreeMap<SpecStyleName, SpecCellFormat>,
    dict_resolved: BTreeMap<SpecStyleName, (u16, u16)>,
    table: BiffStyleTable,
}

impl XlsStyleResolver {
    fn new() -> Self {
        Self {
            dict_formats: derive_default_style_palette(EnumExcelFormat::Xls),
            dict_resolved: BTreeMap::new(),
            table: BiffStyleTable::new(),
        }
    }

    /// `(xf index, font height in twips)` of a palette style.
    fn resolve(&mut self, style: SpecStyleName) -> (u16, u16) {
        if let Some(resolved) = self.dict_resolved.get(&style) {
            return *resolved;
        }
        let fmt_spec = self
            .dict_formats
            .get(&style)
            .or_else(|| self.dict_formats.get(&SpecStyleName::default()))
            .cloned()
            .unwrap_or_default();
        let biff_style = derive_biff_style(&fmt_spec);
        let resolved = (self.table.resolve_xf(&biff_style), biff_style.font.n_height);
        self.dict_resolved.insert(style, resolved);
        resolved
    }
}

fn derive_biff_style(spec: &SpecCellFormat) -> SpecBiffStyle {
    let mut style = SpecBiffStyle::default();

    if let Some(val) = &spec.font_name {
        style.font.c_name = val.clone();
    }
    if let Some(val) = spec.font_size {
        style.font.n_height = (val.clamp(1, 409) * 20) as u16;
    }
    style.font.if_bold = spec.bold.unwrap_or(false);
    style.font.if_italic = spec.italic.unwrap_or(false);
    style.font.if_underline = spec.underline.unwrap_or(false);
    style.font.n_color = spec
        .font_color
        .as_deref()
        .and_then(derive_color_index)
        .map_or(N_COLOR_AUTOMATIC, u16::from);

    if let Some(val) = &spec.align {
        style.n_halign = derive_biff_halign(val);
    }
    if let Some(val) = &spec.valign {
        style.n_valign = derive_biff_valign(val);
    }
    style.if_wrap = spec.text_wrap.unwrap_or(false);

    if let Some(val) = spec.border {
        style.n_border = val.clamp(0, 13) as u8;
    }
    style.n_border_color = spec
        .border_color
        .as_deref()
        .and_then(derive_color_index)
        .unwrap_or(N_COLOR_BORDER_AUTOMATIC);

    style.num_format = spec.num_format.clone();
    style.n_fill_color = spec.bg_color.as_deref().and_then(derive_color_index);
    style
}

fn derive_biff_halign(align: &str) -> u8 {
    match align.trim().to_ascii_lowercase().as_str() {
        "left" => 1,
        "center" => 2,
        "right" => 3,
        _ => 0,
    }
}

fn derive_biff_valign(align: &str) -> u8 {
    match align.trim().to_ascii_lowercase().as_str() {
        "top" => 0,
        "center" | "vcenter" | "vertical_center" => 1,
        _ => 2,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WorkbookWriter

/// Workbook writer producing `.xls` (BIFF8) output.
pub struct XlsWorkbookWriter {
    ctx: WriterContext,
    styles: XlsStyleResolver,
    sst: SharedStringTable,
    l_sheets: Vec<XlsSheetState>,
    set_sheet_names_existing: BTreeSet<String>,
    if_closed: bool,
}

impl XlsWorkbookWriter {
    /// Create a writer; palette styles become XF records on first use.
    pub fn new(request_ctx: &SpecRequestContext) -> Self {
        Self {
            ctx: WriterContext::new(EnumExcelFormat::Xls, request_ctx),
            styles: XlsStyleResolver::new(),
            sst: SharedStringTable::new(),
            l_sheets: Vec::new(),
            set_sheet_names_existing: BTreeSet::new(),
            if_closed: false,
        }
    }

    fn create_worksheet_writer(
        &mut self,
        sheet_idx: usize,
    ) -> Result<XlsWorksheetWriter<'_>, ExcelWriterError> {
        let state = self
            .l_sheets
            .get_mut(sheet_idx)
            .ok_or(ExcelWriterError::SheetNotFound(sheet_idx))?;
        Ok(XlsWorksheetWriter {
            ctx: &mut self.ctx,
            styles: &mut self.styles,
            sst: &mut self.sst,
            state,
        })
    }

    fn push_sheet(&mut self, title: &str) -> usize {
        let c_title = derive_unique_sheet_name(title, &mut self.set_sheet_names_existing);
        log::debug!("Create xls sheet {c_title:?}.");
        self.l_sheets.push(XlsSheetState::new(WorksheetCursor::new(
            c_title,
            self.ctx.limits,
        )));
        self.l_sheets.len() - 1
    }

    /// Assemble the complete BIFF8 workbook stream.
    fn encode_workbook_stream(&self) -> Vec<u8> {
        let mut v_globals = Vec::new();
        push_record(&mut v_globals, RECORD_BOF, &encode_bof(BOF_DT_WORKBOOK_GLOBALS));
        push_record(&mut v_globals, RECORD_CODEPAGE, &encode_codepage());
        push_record(&mut v_globals, RECORD_WINDOW1, &encode_window1());
        push_record(&mut v_globals, RECORD_DATEMODE, &encode_datemode());
        self.styles.table.write_records(&mut v_globals);

        let l_substreams: Vec<Vec<u8>> = self
            .l_sheets
            .iter()
            .enumerate()
            .map(|(sheet_idx, sheet)| sheet.encode_substream(sheet_idx == 0))
            .collect();

        // BOUNDSHEET sizes do not depend on the offsets they carry.
        let n_len_boundsheets: usize = self
            .l_sheets
            .iter()
            .map(|sheet| 4 + encode_boundsheet(0, &sheet.cursor.title).len())
            .sum();
        let n_pos_sst = v_globals.len() + n_len_boundsheets;
        let v_sst = self.sst.encode(n_pos_sst);
        let n_len_globals = n_pos_sst + v_sst.len() + 4;

        let mut n_pos_sheet = n_len_globals;
        for (sheet, v_substream) in self.l_sheets.iter().zip(&l_substreams) {
            push_record(
                &mut v_globals,
                RECORD_BOUNDSHEET,
                &encode_boundsheet(n_pos_sheet as u32, &sheet.cursor.title),
            );
            n_pos_sheet += v_substream.len();
        }
        v_globals.extend_from_slice(&v_sst);
        push_record(&mut v_globals, RECORD_EOF, &[]);

        for v_substream in l_substreams {
            v_globals.extend_from_slice(&v_substream);
        }
        v_globals
    }
}

impl WorkbookWriter for XlsWorkbookWriter {
    fn format(&self) -> EnumExcelFormat {
        EnumExcelFormat::Xls
    }

    fn create_sheet(
        &mut self,
        title: &str,
    ) -> Result<Box<dyn WorksheetWriter + '_>, ExcelWriterError> {
        if self.if_closed {
            return Err(ExcelWriterError::WorkbookClosed);
        }
        let sheet_idx = self.push_sheet(title);
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
        if self.l_sheets.is_empty() {
            self.push_sheet("Sheet1");
        }
        for sheet_idx in 0..self.l_sheets.len() {
            self.create_worksheet_writer(sheet_idx)?.set_col_widths()?;
            self.l_sheets[sheet_idx].flush_rows();
        }

        let v_stream = self.encode_workbook_stream();
        let v_bytes = wrap_compound_file(&v_stream)?;
        out.write_all(&v_bytes)?;
        self.if_closed = true;
        log::debug!("Dump xls workbook ({} bytes).", v_bytes.len());
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WorksheetWriter

/// Streaming writer of one `.xls` sheet.
pub struct XlsWorksheetWriter<'a> {
    ctx: &'a mut WriterContext,
    styles: &'a mut XlsStyleResolver,
    sst: &'a mut SharedStringTable,
    state: &'a mut XlsSheetState,
}

impl WorksheetWriter for XlsWorksheetWriter<'_> {
    fn write_row(&mut self, cells: &[SpecCellEntry]) -> Result<(), ExcelWriterError> {
        let l_plans = plan_row(cells, &mut self.state.cursor, self.ctx)?;
        let n_row = cast_row_num(self.state.cursor.row_idx)?;

        let mut n_lines_max = 1;
        let mut n_height_font_max = 0;
        let mut l_cells = Vec::with_capacity(l_plans.len());
        for (col_idx, plan) in l_plans.into_iter().enumerate() {
            let (n_xf, n_height_font) = self.styles.resolve(plan.style);
            n_lines_max = usize::max(n_lines_max, plan.line);
            n_height_font_max = u32::max(n_height_font_max, n_height_font as u32);

            let value = match plan.payload {
                EnumCellPayload::Blank => EnumBiffCell::Blank,
                EnumCellPayload::Text(c_text) => EnumBiffCell::Label(self.sst.intern(&c_text)),
                EnumCellPayload::Number(x) | EnumCellPayload::Serial(x) => EnumBiffCell::Number(x),
                EnumCellPayload::Boolean(b) => EnumBiffCell::Boolean(b),
            };
            l_cells.push((cast_col_num(col_idx)?, (n_xf, value)));
        }

        let n_height = calculate_row_height(n_lines_max, n_height_font_max);
        self.state.n_rows_used = u32::from(n_row) + 1;
        self.state.n_cols_used = u16::max(self.state.n_cols_used, l_cells.len() as u16);
        self.state.n_cells_pending += l_cells.len();
        self.state.l_rows_pending.push(PendingRow {
            n_row,
            n_height: u16::try_from(n_height).unwrap_or(u16::MAX),
            l_cells,
        });

        self.state.cursor.advance()?;
        self.state.flush_if_needed();
        Ok(())
    }

    fn move_row(&mut self) -> Result<(), ExcelWriterError> {
        self.state.cursor.advance()?;
        self.state.flush_if_needed();
        Ok(())
    }

    fn set_col_widths(&mut self) -> Result<(), ExcelWriterError> {
        self.state.l_col_widths = self.state.cursor.plan_col_widths();
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

fn cast_row_num(value: usize) -> Result<u16, ExcelWriterError> {
    u16::try_from(value)
        .map_err(|_| ExcelWriterError::Backend(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16, ExcelWriterError> {
    u16::try_from(value)
        .map_err(|_| ExcelWriterError::Backend(format!("column index overflow: {value}")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::N_NROWS_XLS_MAX;

    fn create_writer() -> XlsWorkbookWriter {
        XlsWorkbookWriter::new(&SpecRequestContext::default())
    }

    #[test]
    fn test_xls_rows_flush_every_512_rows() {
        let mut writer = create_writer();
        {
            let mut sheet = writer.create_sheet("Rows").unwrap();
            for _ in 0..511 {
                sheet.write_row(&[SpecCellEntry::new("x", "*")]).unwrap();
            }
        }
        assert_eq!(writer.l_sheets[0].n_flushes, 0);
        assert_eq!(writer.l_sheets[0].l_rows_pending.len(), 511);

        writer
            .worksheet(0)
            .unwrap()
            .write_row(&[SpecCellEntry::new("x", "*")])
            .unwrap();
        assert_eq!(writer.l_sheets[0].n_flushes, 1);
        assert!(writer.l_sheets[0].l_rows_pending.is_empty());
        assert_eq!(writer.l_sheets[0].n_cells_pending, 0);
    }

    #[test]
    fn test_xls_rows_flush_on_cell_threshold() {
        let mut writer = create_writer();
        let l_cells: Vec<SpecCellEntry> = (0..250_i64).map(|n| SpecCellEntry::new(n, "*")).collect();
        {
            let mut sheet = writer.create_sheet("Cells").unwrap();
            for _ in 0..16 {
                sheet.write_row(&l_cells).unwrap();
            }
        }
        assert_eq!(writer.l_sheets[0].n_flushes, 0);
        assert_eq!(writer.l_sheets[0].n_cells_pending, 4000);

        writer.worksheet(0).unwrap().write_row(&l_cells).unwrap();
        assert_eq!(writer.l_sheets[0].n_flushes, 1);
        assert_eq!(writer.l_sheets[0].n_cells_pending, 0);
    }

    #[test]
    fn test_xls_move_row_also_flushes() {
        let mut writer = create_writer();
        {
            let mut sheet = writer.create_sheet("Gaps").unwrap();
            sheet.write_row(&[SpecCellEntry::new("x", "*")]).unwrap();
            for _ in 0..511 {
                sheet.move_row().unwrap();
            }
            assert_eq!(sheet.row_idx(), 512);
        }
        assert_eq!(writer.l_sheets[0].n_flushes, 1);
    }

    #[test]
    fn test_xls_row_limit_is_enforced() {
        let mut writer = create_writer();
        let mut sheet = writer.create_sheet("Full").unwrap();
        for _ in 0..N_NROWS_XLS_MAX - 1 {
            sheet.move_row().unwrap();
        }
        sheet.write_row(&[SpecCellEntry::new("last", "*")]).unwrap();
        assert_eq!(sheet.row_idx(), N_NROWS_XLS_MAX);

        let err = sheet.write_row(&[SpecCellEntry::new("x", "*")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Number of rows in the Excel sheet exceeded the limit of 65536 rows"
        );
        assert!(matches!(
            sheet.move_row().unwrap_err(),
            ExcelWriterError::WorksheetLimitExceeded { n_limit: 65_536 }
        ));
    }

    #[test]
    fn test_xls_column_limit_is_enforced() {
        let mut writer = create_writer();
        let mut sheet = writer.create_sheet("Wide").unwrap();
        let l_cells: Vec<SpecCellEntry> = (0..256_i64).map(|n| SpecCellEntry::new(n, "*")).collect();
        assert!(matches!(
            sheet.write_row(&l_cells).unwrap_err(),
            ExcelWriterError::ColumnLimitExceeded { n_limit: 255 }
        ));
        assert_eq!(sheet.row_idx(), 0);
    }

    #[test]
    fn test_xls_row_height_follows_lines_and_font() {
        let mut writer = create_writer();
        {
            let mut sheet = writer.create_sheet("Heights").unwrap();
            sheet.write_row(&[SpecCellEntry::new("a\nb\nc", "*")]).unwrap();
            sheet
                .write_row(&[SpecCellEntry::new("Title", "header"), SpecCellEntry::new("x", "*")])
                .unwrap();
            sheet
                .write_row(&[SpecCellEntry::new("x", "*").with_line(40)])
                .unwrap();
        }
        let l_heights: Vec<u16> = writer.l_sheets[0]
            .l_rows_pending
            .iter()
            .map(|row| row.n_height)
            .collect();
        assert_eq!(l_heights, vec![765, 566, 2550]);
    }

    #[test]
    fn test_xls_styles_resolve_once_with_fallback() {
        let mut writer = create_writer();
        {
            let mut sheet = writer.create_sheet("Styles").unwrap();
            sheet
                .write_row(&[
                    SpecCellEntry::new("a", "*"),
                    SpecCellEntry::new("b", "unknown"),
                    SpecCellEntry::new("c", "thead:change"),
                ])
                .unwrap();
        }
        let l_xfs: Vec<u16> = writer.l_sheets[0].l_rows_pending[0]
            .l_cells
            .iter()
            .map(|(_, (n_xf, _))| *n_xf)
            .collect();
        assert_eq!(l_xfs, vec![16, 16, 17]);
        assert_eq!(writer.styles.table.n_cell_xfs(), 2);
    }

    #[test]
    fn test_xls_dump_empty_workbook_adds_default_sheet() {
        let mut writer = create_writer();
        let v_bytes = writer.dumps().unwrap();
        assert_eq!(&v_bytes[..8], &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
        assert_eq!(writer.sheet_count(), 1);
        assert_eq!(writer.l_sheets[0].cursor.title, "Sheet1");

        assert!(matches!(
            writer.dumps().unwrap_err(),
            ExcelWriterError::WorkbookClosed
        ));
        assert!(matches!(
            writer.worksheet(0).err(),
            Some(ExcelWriterError::WorkbookClosed)
        ));
    }

    #[test]
    fn test_xls_boundsheet_offsets_point_at_sheet_bof() {
        let mut writer = create_writer();
        writer
            .create_sheet("A")
            .unwrap()
            .write_row(&[SpecCellEntry::new("hello", "*")])
            .unwrap();
        writer.create_sheet("B").unwrap();
        for sheet_idx in 0..2 {
            writer.worksheet(sheet_idx).unwrap().set_col_widths().unwrap();
            writer.l_sheets[sheet_idx].flush_rows();
        }

        let v_stream = writer.encode_workbook_stream();
        let mut l_offsets = Vec::new();
        let mut n_pos = 0;
        while n_pos + 4 <= v_stream.len() {
            let n_id = u16::from_le_bytes([v_stream[n_pos], v_stream[n_pos + 1]]);
            let n_len = u16::from_le_bytes([v_stream[n_pos + 2], v_stream[n_pos + 3]]) as usize;
            if n_id == RECORD_BOUNDSHEET {
                let v = &v_stream[n_pos + 4..n_pos + 8];
                l_offsets.push(u32::from_le_bytes([v[0], v[1], v[2], v[3]]) as usize);
            }
            n_pos += 4 + n_len;
        }
        assert_eq!(l_offsets.len(), 2);
        for n_offset in l_offsets {
            assert_eq!(&v_stream[n_offset..n_offset + 2], &RECORD_BOF.to_le_bytes());
            assert_eq!(&v_stream[n_offset + 6..n_offset + 8], &BOF_DT_WORKSHEET.to_le_bytes());
        }
    }
}
