//! Output format selection by configuration and compiled backends.

use crate::spec::{
    EnumExcelFormat, EnumFormatPreference, ExcelWriterError, SpecExcelDownloadConfig,
    SpecRequestContext,
};
use crate::writer::WorkbookWriter;

/// Resolve a format preference against the compiled backends.
pub fn resolve_format(
    preference: EnumFormatPreference,
) -> Result<EnumExcelFormat, ExcelWriterError> {
    plan_format(
        preference,
        EnumExcelFormat::Xlsx.if_available(),
        EnumExcelFormat::Xls.if_available(),
    )
}

fn plan_format(
    preference: EnumFormatPreference,
    if_xlsx_available: bool,
    if_xls_available: bool,
) -> Result<EnumExcelFormat, ExcelWriterError> {
    match preference {
        EnumFormatPreference::Auto if if_xlsx_available => Ok(EnumExcelFormat::Xlsx),
        EnumFormatPreference::Auto if if_xls_available => Ok(EnumExcelFormat::Xls),
        EnumFormatPreference::Auto => Err(ExcelWriterError::NoBackendAvailable),
        EnumFormatPreference::Exact(format) => {
            let if_available = match format {
                EnumExcelFormat::Xlsx => if_xlsx_available,
                EnumExcelFormat::Xls => if_xls_available,
            };
            if if_available {
                Ok(format)
            } else {
                Err(ExcelWriterError::MissingBackend(format.backend()))
            }
        }
    }
}

/// Resolved output format of an `[exceldownload]` section.
pub fn get_excel_format(
    config: &SpecExcelDownloadConfig,
) -> Result<EnumExcelFormat, ExcelWriterError> {
    let format = resolve_format(config.preference()?)?;
    log::debug!("Resolve excel format {:?} -> {format}.", config.format);
    Ok(format)
}

/// Format bound to a file extension.
pub fn writer_for(ext: &str) -> Result<EnumExcelFormat, ExcelWriterError> {
    ext.trim_start_matches('.').parse()
}

/// MIME type of a file extension.
pub fn get_excel_mimetype(ext: &str) -> Result<&'static str, ExcelWriterError> {
    Ok(writer_for(ext)?.mimetype())
}

/// Instantiate the workbook writer of one format.
pub fn create_workbook_writer(
    format: EnumExcelFormat,
    request_ctx: &SpecRequestContext,
) -> Result<Box<dyn WorkbookWriter>, ExcelWriterError> {
    match format {
        EnumExcelFormat::Xlsx => {
            #[cfg(feature = "xlsx")]
            {
                Ok(Box::new(crate::xlsx::XlsxWorkbookWriter::new(request_ctx)))
            }
            #[cfg(not(feature = "xlsx"))]
            {
                let _ = request_ctx;
                Err(ExcelWriterError::MissingBackend(format.backend()))
            }
        }
        EnumExcelFormat::Xls => {
            #[cfg(feature = "xls")]
            {
                Ok(Box::new(crate::xls::XlsWorkbookWriter::new(request_ctx)))
            }
            #[cfg(not(feature = "xls"))]
            {
                let _ = request_ctx;
                Err(ExcelWriterError::MissingBackend(format.backend()))
            }
        }
    }
}

/// Writer bound to the configured format and request context.
pub fn get_workbook_writer(
    config: &SpecExcelDownloadConfig,
    request_ctx: &SpecRequestContext,
) -> Result<Box<dyn WorkbookWriter>, ExcelWriterError> {
    create_workbook_writer(get_excel_format(config)?, request_ctx)
}
