use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use pyo3::create_exception;
use pyo3::exceptions::{PyException, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyBool, PyBytes, PyFloat, PyInt, PyString, PyTuple};
use tabkit_io_excel::{
    EnumCellValue, EnumErrorKind, ExcelWriterError, SpecCellEntry, SpecExcelDownloadConfig,
    SpecRequestContext, WorkbookWriter as RsWorkbookWriter, get_workbook_writer,
};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "tabkit.io.excel.writer.v1";

create_exception!(_tabkit_io_excel_rs, WorksheetWriterError, PyException);

#[pyclass(name = "WorkbookWriter", unsendable)]
struct PyWorkbookWriter {
    inner: Box<dyn RsWorkbookWriter>,
}

#[pymethods]
impl PyWorkbookWriter {
    #[new]
    #[pyo3(signature = (format = "(auto)", tz = "UTC", locale = None))]
    fn new(format: &str, tz: &str, locale: Option<&str>) -> PyResult<Self> {
        let request_ctx = SpecRequestContext::from_names(tz, locale).map_err(derive_py_error)?;
        let config = SpecExcelDownloadConfig {
            format: format.to_string(),
        };
        let inner = get_workbook_writer(&config, &request_ctx).map_err(derive_py_error)?;
        Ok(Self { inner })
    }

    #[getter]
    fn ext(&self) -> &'static str {
        self.inner.ext()
    }

    #[getter]
    fn mimetype(&self) -> &'static str {
        self.inner.mimetype()
    }

    /// Create a sheet and return its index.
    fn create_sheet(&mut self, title: &str) -> PyResult<usize> {
        self.inner.create_sheet(title).map_err(derive_py_error)?;
        Ok(self.inner.sheet_count() - 1)
    }

    fn sheet_title(&mut self, sheet_idx: usize) -> PyResult<String> {
        let sheet = self.inner.worksheet(sheet_idx).map_err(derive_py_error)?;
        Ok(sheet.title().to_string())
    }

    /// Write one row of `(value, style[, width[, line]])` tuples.
    fn write_row(&mut self, sheet_idx: usize, cells: &Bound<'_, PyAny>) -> PyResult<()> {
        let mut l_cells = Vec::new();
        for cell in cells.try_iter()? {
            l_cells.push(parse_cell_entry(&cell?)?);
        }
        self.inner
            .worksheet(sheet_idx)
            .and_then(|mut sheet| sheet.write_row(&l_cells))
            .map_err(derive_py_error)
    }

    fn move_row(&mut self, sheet_idx: usize) -> PyResult<()> {
        self.inner
            .worksheet(sheet_idx)
            .and_then(|mut sheet| sheet.move_row())
            .map_err(derive_py_error)
    }

    fn set_col_widths(&mut self, sheet_idx: usize) -> PyResult<()> {
        self.inner
            .worksheet(sheet_idx)
            .and_then(|mut sheet| sheet.set_col_widths())
            .map_err(derive_py_error)
    }

    fn row_idx(&mut self, sheet_idx: usize) -> PyResult<usize> {
        let sheet = self.inner.worksheet(sheet_idx).map_err(derive_py_error)?;
        Ok(sheet.row_idx())
    }

    fn dumps<'py>(&mut self, py: Python<'py>) -> PyResult<Bound<'py, PyBytes>> {
        let v_bytes = self.inner.dumps().map_err(derive_py_error)?;
        Ok(PyBytes::new(py, &v_bytes))
    }
}

fn parse_cell_entry(cell: &Bound<'_, PyAny>) -> PyResult<SpecCellEntry> {
    let tup_cell = cell.downcast::<PyTuple>()?;
    if !(2..=4).contains(&tup_cell.len()) {
        return Err(PyValueError::new_err(
            "Cell must be a tuple of (value, style[, width[, line]]).",
        ));
    }

    let value = parse_cell_value(&tup_cell.get_item(0)?)?;
    let style = tup_cell.get_item(1)?.extract::<String>()?;
    let mut entry = SpecCellEntry::new(value, style);
    if tup_cell.len() > 2 {
        entry.width = tup_cell.get_item(2)?.extract::<Option<f64>>()?;
    }
    if tup_cell.len() > 3 {
        entry.line = tup_cell.get_item(3)?.extract::<Option<usize>>()?;
    }
    Ok(entry)
}

fn parse_cell_value(value: &Bound<'_, PyAny>) -> PyResult<EnumCellValue> {
    if value.is_none() {
        return Ok(EnumCellValue::None);
    }
    // `bool` is a subclass of `int`.
    if value.is_instance_of::<PyBool>() {
        return Ok(EnumCellValue::Boolean(value.extract::<bool>()?));
    }
    if value.is_instance_of::<PyInt>() {
        if let Ok(n) = value.extract::<i64>() {
            return Ok(EnumCellValue::Integer(n));
        }
        return Ok(EnumCellValue::Number(value.extract::<f64>()?));
    }
    if value.is_instance_of::<PyFloat>() {
        return Ok(EnumCellValue::Number(value.extract::<f64>()?));
    }
    if let Ok(dt) = value.extract::<DateTime<FixedOffset>>() {
        return Ok(EnumCellValue::Timestamp(dt.with_timezone(&Utc)));
    }
    if let Ok(dt) = value.extract::<NaiveDateTime>() {
        return Ok(EnumCellValue::Timestamp(dt.and_utc()));
    }
    if value.is_instance_of::<PyString>() {
        return Ok(EnumCellValue::String(value.extract::<String>()?));
    }
    Ok(EnumCellValue::String(value.str()?.to_string()))
}

fn derive_py_error(err: ExcelWriterError) -> PyErr {
    match err.kind() {
        EnumErrorKind::Configuration => PyValueError::new_err(err.to_string()),
        EnumErrorKind::ResourceLimit => WorksheetWriterError::new_err(err.to_string()),
        EnumErrorKind::Backend => PyRuntimeError::new_err(err.to_string()),
    }
}

#[pyfunction]
#[pyo3(signature = (format = "(auto)"))]
fn get_excel_format(format: &str) -> PyResult<String> {
    let config = SpecExcelDownloadConfig {
        format: format.to_string(),
    };
    tabkit_io_excel::get_excel_format(&config)
        .map(|format| format.ext().to_string())
        .map_err(derive_py_error)
}

#[pyfunction]
fn get_excel_mimetype(ext: &str) -> PyResult<&'static str> {
    tabkit_io_excel::get_excel_mimetype(ext).map_err(derive_py_error)
}

#[pymodule]
fn _tabkit_io_excel_rs(py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyWorkbookWriter>()?;
    module.add_function(wrap_pyfunction!(get_excel_format, module)?)?;
    module.add_function(wrap_pyfunction!(get_excel_mimetype, module)?)?;
    module.add("WorksheetWriterError", py.get_type::<WorksheetWriterError>())?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    Ok(())
}
