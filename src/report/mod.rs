//! Report rendering: spreadsheet workbooks for the document reports and
//! fixed-width `<pre>` blocks for the chat reports.

pub mod message;
pub mod workbook;

use rust_xlsxwriter::XlsxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("workbook: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("nothing to render")]
    Empty,
}

/// A rendered file ready for upload.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub caption: String,
    pub bytes: Vec<u8>,
}

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
