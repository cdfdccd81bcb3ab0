//! Tabular file seam: format detection, reader/writer traits, CSV codec.

use crate::error::{AppError, AppResult};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Ods,
    Xlsx,
    Unknown,
}

impl FileFormat {
    pub fn label(self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Ods => "ods",
            FileFormat::Xlsx => "xlsx",
            FileFormat::Unknown => "unknown",
        }
    }
}

/// Detect the format from the file extension.
pub fn detect_file_format(path: &Path) -> FileFormat {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("csv") => FileFormat::Csv,
        Some("ods") => FileFormat::Ods,
        Some("xlsx") | Some("xls") => FileFormat::Xlsx,
        _ => FileFormat::Unknown,
    }
}

/// A rectangular grid of string cells.
pub type Grid = Vec<Vec<String>>;

pub trait TabularReader {
    fn sheet_names(&self, path: &Path) -> AppResult<Vec<String>>;

    /// Read one sheet; `None` means the first.
    fn read_sheet(&self, path: &Path, sheet: Option<&str>) -> AppResult<Grid>;
}

pub trait TabularWriter {
    fn write_grid(&self, path: &Path, grid: &Grid) -> AppResult<()>;
}

/// Built-in CSV codec. A CSV file has a single sheet named after the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvCodec;

impl CsvCodec {
    fn codec_err(path: &Path, err: csv::Error) -> AppError {
        AppError::Codec {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl TabularReader for CsvCodec {
    fn sheet_names(&self, path: &Path) -> AppResult<Vec<String>> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Sheet1")
            .to_string();
        Ok(vec![stem])
    }

    fn read_sheet(&self, path: &Path, _sheet: Option<&str>) -> AppResult<Grid> {
        let file = std::fs::File::open(path).map_err(|e| AppError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut grid = Grid::new();
        for record in reader.records() {
            let record = record.map_err(|e| Self::codec_err(path, e))?;
            grid.push(record.iter().map(str::to_string).collect());
        }
        Ok(grid)
    }
}

impl CsvCodec {
    /// Write `grid` as CSV to any sink; `target` names it in errors.
    pub fn write_to<W: std::io::Write>(&self, out: W, target: &Path, grid: &Grid) -> AppResult<()> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);
        for row in grid {
            writer
                .write_record(row)
                .map_err(|e| Self::codec_err(target, e))?;
        }
        writer.flush().map_err(|e| AppError::FileWrite {
            path: target.to_path_buf(),
            source: e,
        })
    }
}

impl TabularWriter for CsvCodec {
    fn write_grid(&self, path: &Path, grid: &Grid) -> AppResult<()> {
        let file = std::fs::File::create(path).map_err(|e| AppError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.write_to(file, path, grid)
    }
}
