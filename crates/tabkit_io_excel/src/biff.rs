//! BIFF8 record encoders, style/string tables and OLE2 packaging for `.xls` output.

use std::collections::HashMap;
use std::io::{self, Cursor, Write};

////////////////////////////////////////////////////////////////////////////////
// #region RecordIds

/// Beginning of a workbook globals or sheet substream.
pub const RECORD_BOF: u16 = 0x0809;
/// End of a substream.
pub const RECORD_EOF: u16 = 0x000A;
/// Text encoding of the file.
pub const RECORD_CODEPAGE: u16 = 0x0042;
/// Workbook window position and active tab.
pub const RECORD_WINDOW1: u16 = 0x003D;
/// 1900 vs 1904 date system.
pub const RECORD_DATEMODE: u16 = 0x0022;
/// One font entry.
pub const RECORD_FONT: u16 = 0x0031;
/// Custom number format string.
pub const RECORD_FORMAT: u16 = 0x041E;
/// Extended format, the cell or style record.
pub const RECORD_XF: u16 = 0x00E0;
/// Named style bound to a style XF.
pub const RECORD_STYLE: u16 = 0x0293;
/// Sheet name, type and stream offset of its BOF.
pub const RECORD_BOUNDSHEET: u16 = 0x0085;
/// Shared string table.
pub const RECORD_SST: u16 = 0x00FC;
/// Overflow payload of the previous record.
pub const RECORD_CONTINUE: u16 = 0x003C;
/// Bucket index into the SST.
pub const RECORD_EXTSST: u16 = 0x00FF;
/// Sheet option flags.
pub const RECORD_WSBOOL: u16 = 0x0081;
/// Width and format of a column range.
pub const RECORD_COLINFO: u16 = 0x007D;
/// Used cell range of a sheet.
pub const RECORD_DIMENSIONS: u16 = 0x0200;
/// Row height and cell span.
pub const RECORD_ROW: u16 = 0x0208;
/// Floating point cell.
pub const RECORD_NUMBER: u16 = 0x0203;
/// Cell referencing a shared string.
pub const RECORD_LABELSST: u16 = 0x00FD;
/// Boolean or error cell.
pub const RECORD_BOOLERR: u16 = 0x0205;
/// Empty cell that carries only a format.
pub const RECORD_BLANK: u16 = 0x0201;
/// Sheet window settings.
pub const RECORD_WINDOW2: u16 = 0x023E;

const BOF_VERSION_BIFF8: u16 = 0x0600;
/// BOF substream type of the workbook globals.
pub const BOF_DT_WORKBOOK_GLOBALS: u16 = 0x0005;
/// BOF substream type of a worksheet.
pub const BOF_DT_WORKSHEET: u16 = 0x0010;

const N_CODEPAGE_UTF16: u16 = 1200;
const N_RECORD_DATA_MAX: usize = 8224;
const N_LEN_WORKBOOK_STREAM_MIN: usize = 4096;

/// Font color meaning "automatic".
pub const N_COLOR_AUTOMATIC: u16 = 0x7FFF;
/// Border color meaning "window text".
pub const N_COLOR_BORDER_AUTOMATIC: u8 = 0x40;
const N_COLOR_FILL_BACK_AUTOMATIC: u8 = 0x41;

/// First XF index available for cell styles (0-14 style XFs, 15 default cell XF).
pub const N_XF_CELL_FIRST: u16 = 16;
/// Default cell XF index.
pub const N_XF_DEFAULT: u16 = 15;
const N_FONTS_DEFAULT: usize = 4;
const N_FORMAT_CUSTOM_FIRST: u16 = 164;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RecordEncoders

/// Append one record (`id`, `len`, payload).
pub fn push_record(out: &mut Vec<u8>, id: u16, data: &[u8]) {
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
}

/// BOF payload for globals or worksheet substreams.
pub fn encode_bof(dt: u16) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..2].copy_from_slice(&BOF_VERSION_BIFF8.to_le_bytes());
    out[2..4].copy_from_slice(&dt.to_le_bytes());
    out[4..6].copy_from_slice(&0x0DBBu16.to_le_bytes());
    out[6..8].copy_from_slice(&0x07CCu16.to_le_bytes());
    out[12..16].copy_from_slice(&6u32.to_le_bytes());
    out
}

/// CODEPAGE payload (UTF-16 workbook).
pub fn encode_codepage() -> [u8; 2] {
    N_CODEPAGE_UTF16.to_le_bytes()
}

/// DATEMODE payload (1900 date system).
pub fn encode_datemode() -> [u8; 2] {
    0u16.to_le_bytes()
}

/// WINDOW1 payload.
pub fn encode_window1() -> [u8; 18] {
    let mut out = [0u8; 18];
    out[0..2].copy_from_slice(&0x01E0u16.to_le_bytes());
    out[2..4].copy_from_slice(&0x005Au16.to_le_bytes());
    out[4..6].copy_from_slice(&0x3FCFu16.to_le_bytes());
    out[6..8].copy_from_slice(&0x2A4Eu16.to_le_bytes());
    out[8..10].copy_from_slice(&0x0038u16.to_le_bytes());
    out[14..16].copy_from_slice(&1u16.to_le_bytes());
    out[16..18].copy_from_slice(&0x0258u16.to_le_bytes());
    out
}

/// WINDOW2 payload; the first sheet is the selected tab.
pub fn encode_window2(if_selected: bool) -> [u8; 18] {
    let grbit: u16 = if if_selected { 0x06B6 } else { 0x00B6 };
    let mut out = [0u8; 18];
    out[0..2].copy_from_slice(&grbit.to_le_bytes());
    out[6..8].copy_from_slice(&0x0040u16.to_le_bytes());
    out
}

/// WSBOOL payload.
pub fn encode_wsbool() -> [u8; 2] {
    0x04C1u16.to_le_bytes()
}

/// STYLE payload for the built-in Normal style.
pub fn encode_style_normal() -> [u8; 4] {
    let mut out = [0u8; 4];
    out[0..2].copy_from_slice(&0x8000u16.to_le_bytes());
    out[3] = 0xFF;
    out
}

/// BOUNDSHEET payload pointing at a worksheet BOF.
pub fn encode_boundsheet(n_pos: u32, name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&n_pos.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    write_short_unicode_string(&mut out, name);
    out
}

/// DIMENSIONS payload for `n_rows` x `n_cols` used cells starting at A1.
pub fn encode_dimensions(n_rows: u32, n_cols: u16) -> [u8; 14] {
    let mut out = [0u8; 14];
    out[4..8].copy_from_slice(&n_rows.to_le_bytes());
    out[10..12].copy_from_slice(&n_cols.to_le_bytes());
    out
}

/// ROW payload with an explicit height in twips.
pub fn encode_row(n_row: u16, n_cols: u16, n_height: u16) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..2].copy_from_slice(&n_row.to_le_bytes());
    out[4..6].copy_from_slice(&n_cols.to_le_bytes());
    out[6..8].copy_from_slice(&(n_height & 0x7FFF).to_le_bytes());
    // Bit 8 is reserved-set; 0x40 marks a custom height.
    out[12..14].copy_from_slice(&0x0140u16.to_le_bytes());
    out[14..16].copy_from_slice(&N_XF_DEFAULT.to_le_bytes());
    out
}

/// COLINFO payload for one column; `n_width` is in 1/256 character units.
pub fn encode_colinfo(n_col: u16, n_width: u16) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[0..2].copy_from_slice(&n_col.to_le_bytes());
    out[2..4].copy_from_slice(&n_col.to_le_bytes());
    out[4..6].copy_from_slice(&n_width.to_le_bytes());
    out[6..8].copy_from_slice(&N_XF_DEFAULT.to_le_bytes());
    out
}

fn encode_cell_head(out: &mut [u8], n_row: u16, n_col: u16, n_xf: u16) {
    out[0..2].copy_from_slice(&n_row.to_le_bytes());
    out[2..4].copy_from_slice(&n_col.to_le_bytes());
    out[4..6].copy_from_slice(&n_xf.to_le_bytes());
}

/// NUMBER payload.
pub fn encode_number(n_row: u16, n_col: u16, n_xf: u16, value: f64) -> [u8; 14] {
    let mut out = [0u8; 14];
    encode_cell_head(&mut out, n_row, n_col, n_xf);
    out[6..14].copy_from_slice(&value.to_le_bytes());
    out
}

/// LABELSST payload.
pub fn encode_labelsst(n_row: u16, n_col: u16, n_xf: u16, n_isst: u32) -> [u8; 10] {
    let mut out = [0u8; 10];
    encode_cell_head(&mut out, n_row, n_col, n_xf);
    out[6..10].copy_from_slice(&n_isst.to_le_bytes());
    out
}

/// BOOLERR payload holding a boolean.
pub fn encode_boolerr(n_row: u16, n_col: u16, n_xf: u16, value: bool) -> [u8; 8] {
    let mut out = [0u8; 8];
    encode_cell_head(&mut out, n_row, n_col, n_xf);
    out[6] = u8::from(value);
    out
}

/// BLANK payload.
pub fn encode_blank(n_row: u16, n_col: u16, n_xf: u16) -> [u8; 6] {
    let mut out = [0u8; 6];
    encode_cell_head(&mut out, n_row, n_col, n_xf);
    out
}

fn if_compressible(value: &str) -> bool {
    value.chars().all(|c| (c as u32) <= 0xFF)
}

/// Character count and bytes of a BIFF8 string body, plus its high-byte flag.
fn derive_string_body(value: &str) -> (usize, Vec<u8>, u8) {
    if if_compressible(value) {
        let v_bytes: Vec<u8> = value.chars().map(|c| c as u32 as u8).collect();
        (v_bytes.len(), v_bytes, 0x00)
    } else {
        let l_units: Vec<u16> = value.encode_utf16().collect();
        let v_bytes = l_units.iter().flat_map(|unit| unit.to_le_bytes()).collect();
        (l_units.len(), v_bytes, 0x01)
    }
}

/// Append a ShortXLUnicodeString (u8 length).
pub fn write_short_unicode_string(out: &mut Vec<u8>, value: &str) {
    let (n_cch, v_body, n_flags) = derive_string_body(value);
    out.push(n_cch.min(u8::MAX as usize) as u8);
    out.push(n_flags);
    out.extend_from_slice(&v_body);
}

/// Append an XLUnicodeString (u16 length).
pub fn write_unicode_string(out: &mut Vec<u8>, value: &str) {
    let (n_cch, v_body, n_flags) = derive_string_body(value);
    out.extend_from_slice(&(n_cch.min(u16::MAX as usize) as u16).to_le_bytes());
    out.push(n_flags);
    out.extend_from_slice(&v_body);
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StyleTable

/// Standard BIFF8 palette (indices 8..=63).
const TUP_PALETTE_DEFAULT: [u32; 56] = [
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF, 0x800000,
    0x008000, 0x000080, 0x808000, 0x800080, 0x008080, 0xC0C0C0, 0x808080, 0x9999FF, 0x993366,
    0xFFFFCC, 0xCCFFFF, 0x660066, 0xFF8080, 0x0066CC, 0xCCCCFF, 0x000080, 0xFF00FF, 0xFFFF00,
    0x00FFFF, 0x800080, 0x800000, 0x008080, 0x0000FF, 0x00CCFF, 0xCCFFFF, 0xCCFFCC, 0xFFFF99,
    0x99CCFF, 0xFF99CC, 0xCC99FF, 0xFFCC99, 0x3366FF, 0x33CCCC, 0x99CC00, 0xFFCC00, 0xFF9900,
    0xFF6600, 0x666699, 0x969696, 0x003366, 0x339966, 0x003300, 0x333300, 0x993300, 0x993366,
    0x333399, 0x333333,
];
const N_PALETTE_FIRST: u8 = 8;

/// Map `#RRGGBB` to the closest standard palette index.
pub fn derive_color_index(c_hex: &str) -> Option<u8> {
    let n_rgb = u32::from_str_radix(c_hex.trim().trim_start_matches('#'), 16).ok()?;
    let derive_channels = |n: u32| [(n >> 16) & 0xFF, (n >> 8) & 0xFF, n & 0xFF];
    let l_target = derive_channels(n_rgb);

    TUP_PALETTE_DEFAULT
        .iter()
        .enumerate()
        .min_by_key(|(_, n_entry)| {
            derive_channels(**n_entry)
                .iter()
                .zip(l_target.iter())
                .map(|(a, b)| (*a as i64 - *b as i64).pow(2))
                .sum::<i64>()
        })
        .map(|(idx, _)| N_PALETTE_FIRST + idx as u8)
}

/// FONT record contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecBiffFont {
    /// Font family.
    pub c_name: String,
    /// Height in twips.
    pub n_height: u16,
    /// Weight 700 instead of 400.
    pub if_bold: bool,
    /// Italic flag in the font attributes.
    pub if_italic: bool,
    /// Single underline.
    pub if_underline: bool,
    /// Palette index or [`N_COLOR_AUTOMATIC`].
    pub n_color: u16,
}

impl Default for SpecBiffFont {
    fn default() -> Self {
        Self {
            c_name: "Arial".to_string(),
            n_height: 200,
            if_bold: false,
            if_italic: false,
            if_underline: false,
            n_color: N_COLOR_AUTOMATIC,
        }
    }
}

impl SpecBiffFont {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.n_height.to_le_bytes());
        let grbit: u16 = if self.if_italic { 0x0002 } else { 0 };
        out.extend_from_slice(&grbit.to_le_bytes());
        out.extend_from_slice(&self.n_color.to_le_bytes());
        let n_weight: u16 = if self.if_bold { 700 } else { 400 };
        out.extend_from_slice(&n_weight.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.push(u8::from(self.if_underline));
        out.extend_from_slice(&[0, 0, 0]);
        write_short_unicode_string(&mut out, &self.c_name);
        out
    }
}

/// Complete cell style as stored in one cell XF.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecBiffStyle {
    /// Font, deduplicated into the FONT table.
    pub font: SpecBiffFont,
    /// Number format code; `None` is General.
    pub num_format: Option<String>,
    /// 0 general, 1 left, 2 center, 3 right.
    pub n_halign: u8,
    /// 0 top, 1 center, 2 bottom.
    pub n_valign: u8,
    /// Wrap text at the column edge.
    pub if_wrap: bool,
    /// Line style on all four sides (0 none, 1 thin, ...).
    pub n_border: u8,
    /// Border palette index.
    pub n_border_color: u8,
    /// Solid fill palette index.
    pub n_fill_color: Option<u8>,
}

impl Default for SpecBiffStyle {
    fn default() -> Self {
        Self {
            font: SpecBiffFont::default(),
            num_format: None,
            n_halign: 0,
            n_valign: 2,
            if_wrap: false,
            n_border: 0,
            n_border_color: N_COLOR_BORDER_AUTOMATIC,
            n_fill_color: None,
        }
    }
}

fn encode_xf(
    n_font: u16,
    n_format: u16,
    if_style_xf: bool,
    style: &SpecBiffStyle,
    n_used_attrs: u8,
) -> [u8; 20] {
    let mut out = [0u8; 20];
    out[0..2].copy_from_slice(&n_font.to_le_bytes());
    out[2..4].copy_from_slice(&n_format.to_le_bytes());
    let n_type: u16 = if if_style_xf { 0xFFF5 } else { 0x0001 };
    out[4..6].copy_from_slice(&n_type.to_le_bytes());
    let n_wrap: u8 = if style.if_wrap { 0x08 } else { 0 };
    out[6] = (style.n_halign & 0x07) | n_wrap | ((style.n_valign & 0x07) << 4);
    out[9] = n_used_attrs;

    let n_line = (style.n_border & 0x0F) as u16;
    let n_lines = n_line | (n_line << 4) | (n_line << 8) | (n_line << 12);
    out[10..12].copy_from_slice(&n_lines.to_le_bytes());
    let n_border_color = if style.n_border == 0 {
        0
    } else {
        (style.n_border_color & 0x7F) as u32
    };
    out[12..14].copy_from_slice(&((n_border_color | (n_border_color << 7)) as u16).to_le_bytes());

    let (n_fls, n_fore) = match style.n_fill_color {
        Some(n_color) => (1u32, n_color & 0x7F),
        None => (0u32, N_COLOR_BORDER_AUTOMATIC),
    };
    let n_border2 = n_border_color | (n_border_color << 7) | (n_fls << 26);
    out[14..18].copy_from_slice(&n_border2.to_le_bytes());
    let n_pattern = n_fore as u16 | ((N_COLOR_FILL_BACK_AUTOMATIC as u16) << 7);
    out[18..20].copy_from_slice(&n_pattern.to_le_bytes());
    out
}

/// Font/format/XF tables with deduplicated cell XFs.
#[derive(Debug, Clone)]
pub struct BiffStyleTable {
    l_fonts: Vec<SpecBiffFont>,
    l_formats: Vec<(u16, String)>,
    l_xfs: Vec<[u8; 20]>,
    dict_xf_idx: HashMap<SpecBiffStyle, u16>,
}

impl Default for BiffStyleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BiffStyleTable {
    /// Create tables holding only the mandatory default fonts and XFs.
    pub fn new() -> Self {
        Self {
            l_fonts: vec![SpecBiffFont::default(); N_FONTS_DEFAULT],
            l_formats: Vec::new(),
            l_xfs: Vec::new(),
            dict_xf_idx: HashMap::new(),
        }
    }

    /// Number of distinct cell XFs registered.
    pub fn n_cell_xfs(&self) -> usize {
        self.l_xfs.len()
    }

    fn resolve_font(&mut self, font: &SpecBiffFont) -> u16 {
        let n_pos = match self.l_fonts.iter().position(|f| f == font) {
            Some(n_pos) => n_pos,
            None => {
                self.l_fonts.push(font.clone());
                self.l_fonts.len() - 1
            }
        };
        // FONT index 4 is never used.
        if n_pos >= N_FONTS_DEFAULT {
            n_pos as u16 + 1
        } else {
            n_pos as u16
        }
    }

    fn resolve_num_format(&mut self, code: Option<&str>) -> u16 {
        match code {
            None | Some("General") => return 0,
            Some("0") => return 1,
            Some("0.00") => return 2,
            Some("@") => return 49,
            _ => {}
        }
        let code = code.unwrap_or_default();
        if let Some((n_idx, _)) = self.l_formats.iter().find(|(_, c)| c == code) {
            return *n_idx;
        }
        let n_idx = N_FORMAT_CUSTOM_FIRST + self.l_formats.len() as u16;
        self.l_formats.push((n_idx, code.to_string()));
        n_idx
    }

    /// Return the XF index of `style`, registering it on first use.
    pub fn resolve_xf(&mut self, style: &SpecBiffStyle) -> u16 {
        if let Some(n_xf) = self.dict_xf_idx.get(style) {
            return *n_xf;
        }
        let n_font = self.resolve_font(&style.font);
        let n_format = self.resolve_num_format(style.num_format.as_deref());
        let n_xf = N_XF_CELL_FIRST + self.l_xfs.len() as u16;
        self.l_xfs
            .push(encode_xf(n_font, n_format, false, style, 0xFC));
        self.dict_xf_idx.insert(style.clone(), n_xf);
        n_xf
    }

    /// Append FONT, FORMAT, XF and STYLE records.
    pub fn write_records(&self, out: &mut Vec<u8>) {
        for font in &self.l_fonts {
            push_record(out, RECORD_FONT, &font.encode());
        }
        for (n_idx, code) in &self.l_formats {
            let mut v_data = n_idx.to_le_bytes().to_vec();
            write_unicode_string(&mut v_data, code);
            push_record(out, RECORD_FORMAT, &v_data);
        }

        let style_default = SpecBiffStyle::default();
        for n_idx in 0..N_XF_DEFAULT {
            let n_used_attrs = if n_idx == 0 { 0x00 } else { 0xF4 };
            push_record(
                out,
                RECORD_XF,
                &encode_xf(0, 0, true, &style_default, n_used_attrs),
            );
        }
        push_record(out, RECORD_XF, &encode_xf(0, 0, false, &style_default, 0x00));
        for v_xf in &self.l_xfs {
            push_record(out, RECORD_XF, v_xf);
        }

        push_record(out, RECORD_STYLE, &encode_style_normal());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SharedStrings

/// Shared string table with interning.
#[derive(Debug, Clone, Default)]
pub struct SharedStringTable {
    l_strings: Vec<String>,
    dict_idx: HashMap<String, u32>,
    n_refs: u32,
}

impl SharedStringTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one reference to `value` and return its SST index.
    pub fn intern(&mut self, value: &str) -> u32 {
        self.n_refs = self.n_refs.saturating_add(1);
        if let Some(n_idx) = self.dict_idx.get(value) {
            return *n_idx;
        }
        let n_idx = self.l_strings.len() as u32;
        self.l_strings.push(value.to_string());
        self.dict_idx.insert(value.to_string(), n_idx);
        n_idx
    }

    /// Number of unique strings.
    pub fn len(&self) -> usize {
        self.l_strings.len()
    }

    /// Whether no string was interned.
    pub fn is_empty(&self) -> bool {
        self.l_strings.is_empty()
    }

    /// Encode SST (+ CONTINUE) and EXTSST records.
    ///
    /// `n_pos_stream` is the stream offset at which the SST record will start.
    pub fn encode(&self, n_pos_stream: usize) -> Vec<u8> {
        let mut v_out = Vec::new();
        let mut v_buf = Vec::with_capacity(N_RECORD_DATA_MAX);
        let mut n_record_id = RECORD_SST;
        let n_bucket_size = usize::max(8, self.l_strings.len() / 128 + 1);
        let mut l_buckets: Vec<(u32, u16)> = Vec::new();

        v_buf.extend_from_slice(&self.n_refs.to_le_bytes());
        v_buf.extend_from_slice(&(self.l_strings.len() as u32).to_le_bytes());

        for (n_idx, value) in self.l_strings.iter().enumerate() {
            let (n_cch, v_body, n_flags) = derive_string_body(value);
            let n_unit = if n_flags == 0 { 1 } else { 2 };

            // Header and first character stay in one record.
            if N_RECORD_DATA_MAX - v_buf.len() < 3 + n_unit.min(v_body.len()) {
                push_record(&mut v_out, n_record_id, &v_buf);
                n_record_id = RECORD_CONTINUE;
                v_buf.clear();
            }
            if n_idx % n_bucket_size == 0 {
                l_buckets.push((
                    (n_pos_stream + v_out.len() + 4 + v_buf.len()) as u32,
                    (4 + v_buf.len()) as u16,
                ));
            }
            v_buf.extend_from_slice(&(n_cch as u16).to_le_bytes());
            v_buf.push(n_flags);

            let mut n_written = 0;
            while n_written < v_body.len() {
                let n_avail = N_RECORD_DATA_MAX - v_buf.len();
                if n_avail < n_unit {
                    push_record(&mut v_out, n_record_id, &v_buf);
                    n_record_id = RECORD_CONTINUE;
                    v_buf.clear();
                    v_buf.push(n_flags);
                    continue;
                }
                let n_take = usize::min(n_avail - n_avail % n_unit, v_body.len() - n_written);
                v_buf.extend_from_slice(&v_body[n_written..n_written + n_take]);
                n_written += n_take;
            }
        }
        push_record(&mut v_out, n_record_id, &v_buf);

        let mut v_extsst = (n_bucket_size as u16).to_le_bytes().to_vec();
        for (n_pos, n_offset) in l_buckets {
            v_extsst.extend_from_slice(&n_pos.to_le_bytes());
            v_extsst.extend_from_slice(&n_offset.to_le_bytes());
            v_extsst.extend_from_slice(&0u16.to_le_bytes());
        }
        push_record(&mut v_out, RECORD_EXTSST, &v_extsst);
        v_out
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Container

/// Wrap a BIFF8 workbook stream into an OLE2 compound document.
pub fn wrap_compound_file(v_workbook: &[u8]) -> io::Result<Vec<u8>> {
    let mut ole =
        cfb::CompoundFile::create_with_version(cfb::Version::V3, Cursor::new(Vec::new()))?;
    {
        let mut stream = ole.create_stream("Workbook")?;
        stream.write_all(v_workbook)?;
        if v_workbook.len() < N_LEN_WORKBOOK_STREAM_MIN {
            stream.write_all(&vec![0u8; N_LEN_WORKBOOK_STREAM_MIN - v_workbook.len()])?;
        }
        stream.flush()?;
    }
    ole.flush()?;
    Ok(ole.into_inner().into_inner())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn read_records(v_stream: &[u8]) -> Vec<(u16, Vec<u8>)> {
        let mut l_records = Vec::new();
        let mut n_pos = 0;
        while n_pos + 4 <= v_stream.len() {
            let n_id = u16::from_le_bytes([v_stream[n_pos], v_stream[n_pos + 1]]);
            let n_len = u16::from_le_bytes([v_stream[n_pos + 2], v_stream[n_pos + 3]]) as usize;
            l_records.push((n_id, v_stream[n_pos + 4..n_pos + 4 + n_len].to_vec()));
            n_pos += 4 + n_len;
        }
        l_records
    }

    #[test]
    fn test_derive_color_index() {
        assert_eq!(derive_color_index("#000000"), Some(0x08));
        assert_eq!(derive_color_index("#FFFFFF"), Some(0x09));
        assert_eq!(derive_color_index("#0000FF"), Some(0x0C));
        assert_eq!(derive_color_index("#FF9900"), Some(0x34));
        assert_eq!(derive_color_index("#FE9A01"), Some(0x34));
        assert_eq!(derive_color_index("orange"), None);
    }

    #[test]
    fn test_style_table_dedupes_xfs_and_skips_font_index_four() {
        let mut table = BiffStyleTable::new();
        let style = SpecBiffStyle {
            font: SpecBiffFont {
                n_height: 180,
                ..Default::default()
            },
            num_format: Some("YYYY-MM-DD".to_string()),
            ..Default::default()
        };
        assert_eq!(table.resolve_xf(&style), 16);
        assert_eq!(table.resolve_xf(&style.clone()), 16);
        assert_eq!(table.n_cell_xfs(), 1);

        let style_text = SpecBiffStyle {
            num_format: Some("@".to_string()),
            ..style.clone()
        };
        assert_eq!(table.resolve_xf(&style_text), 17);

        let mut v_out = Vec::new();
        table.write_records(&mut v_out);
        let l_records = read_records(&v_out);
        let l_xfs: Vec<&Vec<u8>> = l_records
            .iter()
            .filter(|(n_id, _)| *n_id == RECORD_XF)
            .map(|(_, v)| v)
            .collect();
        assert_eq!(l_xfs.len(), 18);
        assert_eq!(u16::from_le_bytes([l_xfs[16][0], l_xfs[16][1]]), 5);
        assert_eq!(u16::from_le_bytes([l_xfs[16][2], l_xfs[16][3]]), 164);
        assert_eq!(u16::from_le_bytes([l_xfs[17][2], l_xfs[17][3]]), 49);
        assert_eq!(
            l_records.iter().filter(|(n_id, _)| *n_id == RECORD_FONT).count(),
            5
        );
    }

    #[test]
    fn test_sst_splits_long_strings_into_continue_records() {
        let mut sst = SharedStringTable::new();
        let c_long = "x".repeat(10_000);
        assert_eq!(sst.intern("head"), 0);
        assert_eq!(sst.intern(&c_long), 1);
        assert_eq!(sst.intern("head"), 0);
        assert_eq!(sst.len(), 2);

        let l_records = read_records(&sst.encode(100));
        let l_ids: Vec<u16> = l_records.iter().map(|(n_id, _)| *n_id).collect();
        assert_eq!(l_ids, vec![RECORD_SST, RECORD_CONTINUE, RECORD_EXTSST]);

        let v_sst = &l_records[0].1;
        assert_eq!(v_sst.len(), N_RECORD_DATA_MAX);
        assert_eq!(u32::from_le_bytes([v_sst[0], v_sst[1], v_sst[2], v_sst[3]]), 3);
        assert_eq!(u32::from_le_bytes([v_sst[4], v_sst[5], v_sst[6], v_sst[7]]), 2);

        let v_continue = &l_records[1].1;
        assert_eq!(v_continue[0], 0x00);
        let n_chars_first = N_RECORD_DATA_MAX - 8 - 7 - 3;
        assert_eq!(v_continue.len(), 1 + 10_000 - n_chars_first);

        let v_extsst = &l_records[2].1;
        assert_eq!(u16::from_le_bytes([v_extsst[0], v_extsst[1]]), 8);
        assert_eq!(
            u32::from_le_bytes([v_extsst[2], v_extsst[3], v_extsst[4], v_extsst[5]]),
            100 + 4 + 8
        );
    }

    #[test]
    fn test_sst_keeps_utf16_chars_whole_across_records() {
        let mut sst = SharedStringTable::new();
        sst.intern(&"x".repeat(N_RECORD_DATA_MAX - 8 - 3 - 1));
        sst.intern("漢字");

        let l_records = read_records(&sst.encode(0));
        assert_eq!(l_records[0].0, RECORD_SST);
        assert_eq!(l_records[1].0, RECORD_CONTINUE);
        let v_continue = &l_records[1].1;
        assert_eq!(&v_continue[..3], &[2, 0, 0x01]);
        assert_eq!(v_continue.len(), 3 + 4);
    }

    #[test]
    fn test_wrap_compound_file_signature() {
        let mut v_stream = Vec::new();
        push_record(&mut v_stream, RECORD_BOF, &encode_bof(BOF_DT_WORKBOOK_GLOBALS));
        push_record(&mut v_stream, RECORD_EOF, &[]);
        let v_bytes = wrap_compound_file(&v_stream).unwrap();
        assert_eq!(&v_bytes[..8], &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
    }
}
