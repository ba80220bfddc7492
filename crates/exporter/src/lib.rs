use chrono::NaiveDate;
use collector::VideoRecord;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to export data: {0}")]
    ExportFailed(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] XlsxError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Column headers of the tabular exports, in output order.
pub const COLUMNS: [&str; 7] = [
    "Account",
    "Video URL",
    "Title",
    "Views",
    "Likes",
    "Comments",
    "Shares",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn from_extension(extension: &str) -> Result<Self, ExportError> {
        match extension.to_ascii_lowercase().as_str() {
            "xlsx" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// `<handle>_videos_<YYYYMMDD>.<ext>`
pub fn export_filename(handle: &str, date: NaiveDate, format: ExportFormat) -> String {
    format!(
        "{}_videos_{}.{}",
        handle,
        date.format("%Y%m%d"),
        format.extension()
    )
}

pub struct Exporter;

impl Exporter {
    pub fn new() -> Self {
        Self
    }

    pub fn export_to_xlsx<P: AsRef<Path>>(
        &self,
        records: &[VideoRecord],
        path: P,
    ) -> Result<(), ExportError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let header = Format::new().set_bold();

        for (col, title) in COLUMNS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *title, &header)?;
        }

        for (index, record) in records.iter().enumerate() {
            let row = index as u32 + 1;
            worksheet.write_string(row, 0, &record.account)?;
            worksheet.write_string(row, 1, &record.video_url)?;
            worksheet.write_string(row, 2, &record.title)?;
            worksheet.write_number(row, 3, record.views as f64)?;
            worksheet.write_number(row, 4, record.likes as f64)?;
            worksheet.write_number(row, 5, record.comments as f64)?;
            worksheet.write_number(row, 6, record.shares as f64)?;
        }

        workbook.save(path.as_ref())?;
        Ok(())
    }

    pub fn export_to_csv<P: AsRef<Path>>(
        &self,
        records: &[VideoRecord],
        path: P,
    ) -> Result<(), ExportError> {
        let mut wtr = csv::Writer::from_path(path)?;

        wtr.write_record(COLUMNS)?;

        for record in records {
            let counts = [record.views, record.likes, record.comments, record.shares]
                .map(|count| count.to_string());
            wtr.write_record([
                record.account.as_str(),
                record.video_url.as_str(),
                record.title.as_str(),
                counts[0].as_str(),
                counts[1].as_str(),
                counts[2].as_str(),
                counts[3].as_str(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }

    pub fn export_to_json<P: AsRef<Path>>(
        &self,
        records: &[VideoRecord],
        path: P,
    ) -> Result<(), ExportError> {
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| ExportError::ExportFailed(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn export<P: AsRef<Path>>(
        &self,
        records: &[VideoRecord],
        path: P,
        format: ExportFormat,
    ) -> Result<(), ExportError> {
        match format {
            ExportFormat::Xlsx => self.export_to_xlsx(records, path),
            ExportFormat::Csv => self.export_to_csv(records, path),
            ExportFormat::Json => self.export_to_json(records, path),
        }
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}
