#![cfg(all(feature = "xlsx", feature = "xls"))]

use std::io::{Cursor, Read, Seek};

use calamine::{Data, Range, Reader, Xls, Xlsx, open_workbook_from_rs};
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tabkit_io_excel::{
    EnumExcelFormat, ExcelWriterError, SpecCellEntry, SpecExcelDownloadConfig,
    SpecRequestContext, WorkbookWriter, create_workbook_writer, get_excel_mimetype,
    get_workbook_writer,
};

const TUP_XLS_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

fn create_writer(format: EnumExcelFormat, tz_name: &str) -> Box<dyn WorkbookWriter> {
    let ctx = SpecRequestContext::from_names(tz_name, None).expect("request context");
    create_workbook_writer(format, &ctx).expect("workbook writer")
}

fn read_ranges_in_order<RS, R>(mut workbook: R) -> Vec<(String, Range<Data>)>
where
    RS: Read + Seek,
    R: Reader<RS>,
{
    workbook
        .sheet_names()
        .into_iter()
        .map(|c_name| {
            let range = workbook.worksheet_range(&c_name).expect("sheet range");
            (c_name, range)
        })
        .collect()
}

fn read_sheets(format: EnumExcelFormat, v_bytes: Vec<u8>) -> Vec<(String, Range<Data>)> {
    match format {
        EnumExcelFormat::Xls => {
            let workbook: Xls<_> = open_workbook_from_rs(Cursor::new(v_bytes)).expect("open xls");
            read_ranges_in_order(workbook)
        }
        EnumExcelFormat::Xlsx => {
            let workbook: Xlsx<_> =
                open_workbook_from_rs(Cursor::new(v_bytes)).expect("open xlsx");
            read_ranges_in_order(workbook)
        }
    }
}

fn read_sheet_names(format: EnumExcelFormat, v_bytes: Vec<u8>) -> Vec<String> {
    match format {
        EnumExcelFormat::Xls => {
            let workbook: Xls<_> = open_workbook_from_rs(Cursor::new(v_bytes)).expect("open xls");
            workbook.sheet_names()
        }
        EnumExcelFormat::Xlsx => {
            let workbook: Xlsx<_> =
                open_workbook_from_rs(Cursor::new(v_bytes)).expect("open xlsx");
            workbook.sheet_names()
        }
    }
}

fn calculate_serial(ts: &chrono::DateTime<Utc>) -> f64 {
    25_569.0 + ts.timestamp() as f64 / 86_400.0
}

fn read_number(data: Option<&Data>) -> Option<f64> {
    match data? {
        Data::Float(x) => Some(*x),
        Data::Int(n) => Some(*n as f64),
        Data::DateTime(dt) => Some(dt.as_f64()),
        _ => None,
    }
}

fn read_text(data: Option<&Data>) -> Option<String> {
    match data? {
        Data::String(c_value) => Some(c_value.clone()),
        _ => None,
    }
}

fn derive_ticket_timestamp(n_row: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 7 + n_row, 8, 9).unwrap()
}

fn write_ticket_report(format: EnumExcelFormat) -> Vec<u8> {
    let mut writer = create_writer(format, "UTC");
    {
        let mut sheet = writer.create_sheet("Tickets: open/closed").expect("sheet");
        sheet
            .write_row(&[
                SpecCellEntry::new("Ticket", "thead"),
                SpecCellEntry::new("Summary", "thead"),
                SpecCellEntry::new("Closed", "thead"),
                SpecCellEntry::new("Hours", "thead"),
                SpecCellEntry::new("Updated", "thead"),
            ])
            .expect("thead");
        sheet
            .write_row(&[
                SpecCellEntry::new(42_i64, "id"),
                SpecCellEntry::new("Crash on\r\nstartup  ", "*"),
                SpecCellEntry::new(true, "*"),
                SpecCellEntry::new(1.5, "*:change"),
                SpecCellEntry::new(derive_ticket_timestamp(1), "[datetime]"),
            ])
            .expect("row 1");
        sheet
            .write_row(&[
                SpecCellEntry::new(43_i64, "id"),
                SpecCellEntry::new("漢字の説明", "unknown-style"),
                SpecCellEntry::new(false, "*"),
                SpecCellEntry::new(None::<f64>, "*"),
                SpecCellEntry::new(derive_ticket_timestamp(2), "[datetime]:change"),
            ])
            .expect("row 2");
        assert_eq!(sheet.row_idx(), 3);
    }
    writer.dumps().expect("dump")
}

fn validate_ticket_report(format: EnumExcelFormat) {
    let l_sheets = read_sheets(format, write_ticket_report(format));
    assert_eq!(l_sheets.len(), 1);
    let (c_name, range) = &l_sheets[0];
    assert_eq!(c_name, "Tickets_ open_closed");

    assert_eq!(read_text(range.get_value((0, 0))).as_deref(), Some("Ticket"));
    assert_eq!(read_text(range.get_value((0, 3))).as_deref(), Some("Hours"));
    assert_eq!(read_number(range.get_value((1, 0))), Some(42.0));
    assert_eq!(
        read_text(range.get_value((1, 1))).as_deref(),
        Some("Crash on\nstartup")
    );
    assert_eq!(range.get_value((1, 2)), Some(&Data::Bool(true)));
    assert_eq!(read_number(range.get_value((1, 3))), Some(1.5));
    assert_eq!(read_number(range.get_value((2, 0))), Some(43.0));
    assert_eq!(read_text(range.get_value((2, 1))).as_deref(), Some("漢字の説明"));
    assert_eq!(range.get_value((2, 2)), Some(&Data::Bool(false)));
    for n_row in [1_u32, 2] {
        let n_serial = read_number(range.get_value((n_row, 4))).expect("timestamp cell");
        let n_expected = calculate_serial(&derive_ticket_timestamp(n_row));
        assert!((n_serial - n_expected).abs() < 1e-6, "{n_serial} != {n_expected}");
    }
}

#[test]
fn test_xlsx_round_trip_mixed_values() {
    validate_ticket_report(EnumExcelFormat::Xlsx);
}

#[test]
fn test_xls_round_trip_mixed_values() {
    validate_ticket_report(EnumExcelFormat::Xls);
}

#[test]
fn test_output_signatures() {
    let v_xls = create_writer(EnumExcelFormat::Xls, "UTC").dumps().unwrap();
    assert_eq!(&v_xls[..8], &TUP_XLS_SIGNATURE);

    let v_xlsx = create_writer(EnumExcelFormat::Xlsx, "UTC").dumps().unwrap();
    assert_eq!(&v_xlsx[..4], b"PK\x03\x04");
}

#[test]
fn test_empty_workbook_has_default_sheet() {
    for format in [EnumExcelFormat::Xls, EnumExcelFormat::Xlsx] {
        let v_bytes = create_writer(format, "UTC").dumps().unwrap();
        assert_eq!(read_sheet_names(format, v_bytes), vec!["Sheet1".to_string()]);
    }
}

#[test]
fn test_timestamps_render_in_request_timezone() {
    let ts = Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap();
    for format in [EnumExcelFormat::Xls, EnumExcelFormat::Xlsx] {
        let mut writer = create_writer(format, "Asia/Tokyo");
        writer
            .create_sheet("Dates")
            .unwrap()
            .write_row(&[
                SpecCellEntry::new(ts, "[datetime]"),
                SpecCellEntry::new(ts, "[date]"),
            ])
            .unwrap();
        let l_sheets = read_sheets(format, writer.dumps().unwrap());
        let range = &l_sheets[0].1;
        assert_eq!(read_number(range.get_value((0, 0))), Some(45294.0));
        assert_eq!(read_number(range.get_value((0, 1))), Some(45294.0));
    }
}

#[test]
fn test_long_text_is_truncated_to_cell_limit() {
    let c_long = "a".repeat(40_000);
    for format in [EnumExcelFormat::Xls, EnumExcelFormat::Xlsx] {
        let mut writer = create_writer(format, "UTC");
        writer
            .create_sheet("Long")
            .unwrap()
            .write_row(&[SpecCellEntry::new(c_long.as_str(), "*")])
            .unwrap();
        let l_sheets = read_sheets(format, writer.dumps().unwrap());
        let c_text = read_text(l_sheets[0].1.get_value((0, 0))).expect("text cell");
        assert_eq!(c_text.chars().count(), 32_767);
        assert!(c_text.ends_with('…'));
        assert!(c_text.starts_with("aaaa"));
    }
}

#[test]
fn test_sheet_names_are_unique() {
    for format in [EnumExcelFormat::Xls, EnumExcelFormat::Xlsx] {
        let mut writer = create_writer(format, "UTC");
        for c_title in ["Report", "report", "Report"] {
            writer.create_sheet(c_title).unwrap();
        }
        assert_eq!(
            read_sheet_names(format, writer.dumps().unwrap()),
            vec!["Report", "report__2", "Report__3"]
        );
    }
}

#[test]
fn test_apostrophe_titles_behave_the_same_in_both_formats() {
    for format in [EnumExcelFormat::Xls, EnumExcelFormat::Xlsx] {
        let mut writer = create_writer(format, "UTC");
        assert_eq!(writer.create_sheet("'quoted'").unwrap().title(), "quoted");
        writer
            .create_sheet("Data")
            .unwrap()
            .write_row(&[SpecCellEntry::new("payload", "*")])
            .unwrap();
        assert_eq!(writer.sheet_count(), 2);

        let l_sheets = read_sheets(format, writer.dumps().unwrap());
        let l_names: Vec<&str> = l_sheets.iter().map(|(c_name, _)| c_name.as_str()).collect();
        assert_eq!(l_names, vec!["quoted", "Data"]);
        assert_eq!(read_text(l_sheets[0].1.get_value((0, 0))), None);
        assert_eq!(
            read_text(l_sheets[1].1.get_value((0, 0))).as_deref(),
            Some("payload")
        );
    }
}

#[test]
fn test_xlsx_column_widths_are_capped() {
    let mut writer = create_writer(EnumExcelFormat::Xlsx, "UTC");
    writer
        .create_sheet("Widths")
        .unwrap()
        .write_row(&[
            SpecCellEntry::new("x".repeat(80).as_str(), "*"),
            SpecCellEntry::new("abc", "*"),
        ])
        .unwrap();
    let v_bytes = writer.dumps().unwrap();

    let mut archive = zip::ZipArchive::new(Cursor::new(v_bytes)).expect("open zip");
    let mut c_sheet_xml = String::new();
    archive
        .by_name("xl/worksheets/sheet1.xml")
        .expect("sheet part")
        .read_to_string(&mut c_sheet_xml)
        .expect("read sheet part");

    let l_widths: Vec<f64> = c_sheet_xml
        .split("<col ")
        .skip(1)
        .filter_map(|c_col| {
            let c_rest = c_col.split("width=\"").nth(1)?;
            c_rest.split('"').next()?.parse::<f64>().ok()
        })
        .collect();
    let l_chars: Vec<f64> = l_widths.iter().map(|width| width.floor()).collect();
    assert_eq!(l_chars, vec![51.0, 4.0]);
}

#[test]
fn test_xls_column_widths_are_capped() {
    let mut writer = create_writer(EnumExcelFormat::Xls, "UTC");
    {
        let mut sheet = writer.create_sheet("Widths").unwrap();
        sheet
            .write_row(&[
                SpecCellEntry::new("x".repeat(80).as_str(), "*"),
                SpecCellEntry::new("abc", "*"),
            ])
            .unwrap();
        assert_eq!(sheet.col_width(0), Some(80.0));
        assert_eq!(sheet.col_width(1), Some(3.0));
    }
    let v_bytes = writer.dumps().unwrap();

    let mut ole = cfb::CompoundFile::open(Cursor::new(v_bytes)).expect("open cfb");
    let mut v_stream = Vec::new();
    ole.open_stream("/Workbook")
        .expect("workbook stream")
        .read_to_end(&mut v_stream)
        .expect("read stream");

    let mut l_widths = Vec::new();
    let mut n_pos = 0;
    while n_pos + 4 <= v_stream.len() {
        let n_id = u16::from_le_bytes([v_stream[n_pos], v_stream[n_pos + 1]]);
        let n_len = u16::from_le_bytes([v_stream[n_pos + 2], v_stream[n_pos + 3]]) as usize;
        if n_id == 0x007D {
            let v = &v_stream[n_pos + 4..n_pos + 4 + n_len];
            l_widths.push(u16::from_le_bytes([v[4], v[5]]));
        }
        n_pos += 4 + n_len;
    }
    assert_eq!(l_widths, vec![51 * 256, 4 * 256]);
}

#[test]
fn test_xls_shared_strings_span_continue_records() {
    let mut writer = create_writer(EnumExcelFormat::Xls, "UTC");
    let l_texts: Vec<String> = (0..2_000).map(|n| format!("ticket summary number {n:05}")).collect();
    {
        let mut sheet = writer.create_sheet("Strings").unwrap();
        for c_text in &l_texts {
            sheet.write_row(&[SpecCellEntry::new(c_text.as_str(), "*")]).unwrap();
        }
    }
    let l_sheets = read_sheets(EnumExcelFormat::Xls, writer.dumps().unwrap());
    let range = &l_sheets[0].1;
    for n_idx in [0_usize, 511, 512, 1_337, 1_999] {
        assert_eq!(
            read_text(range.get_value((n_idx as u32, 0))),
            Some(l_texts[n_idx].clone())
        );
    }
}

#[test]
fn test_xls_row_limit_error_message() {
    let mut writer = create_writer(EnumExcelFormat::Xls, "UTC");
    let mut sheet = writer.create_sheet("Limit").unwrap();
    for _ in 0..65_536 {
        sheet.move_row().unwrap();
    }
    let err = sheet.write_row(&[SpecCellEntry::new("x", "*")]).unwrap_err();
    assert!(matches!(err, ExcelWriterError::WorksheetLimitExceeded { n_limit: 65_536 }));
}

#[test]
fn test_configured_writer_and_mimetype() {
    let ctx = SpecRequestContext::from_names("Europe/Paris", Some("ja_JP")).unwrap();
    let config = SpecExcelDownloadConfig {
        format: "xls".to_string(),
    };
    let mut writer = get_workbook_writer(&config, &ctx).unwrap();
    assert_eq!(writer.ext(), "xls");
    assert_eq!(get_excel_mimetype(writer.ext()).unwrap(), writer.mimetype());
    assert_eq!(&writer.dumps().unwrap()[..8], &TUP_XLS_SIGNATURE);

    let err = SpecRequestContext::from_names("Mars/Olympus", None).unwrap_err();
    assert_eq!(err.to_string(), "Unknown timezone: 'Mars/Olympus'");
}
