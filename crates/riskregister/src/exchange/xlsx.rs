//! XLSX workbooks with a `Meta` sheet and a `Risks` sheet.

use std::io::Cursor;

use calamine::{Data, DataType, Range, Reader, Xlsx};
use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format as CellFormat, Workbook};

use super::{
    is_blank_row, meta_from_row, meta_to_row, risk_from_row, risk_to_row, zip_row, Exporter,
    ImportBundle, Importer, Row, META_COLUMNS, RISK_COLUMNS,
};
use crate::dates::format_date;
use crate::error::{Error, Result};
use crate::project::Project;

/// Name of the metadata sheet.
pub const META_SHEET: &str = "Meta";

/// Name of the risk sheet.
pub const RISKS_SHEET: &str = "Risks";

/// Risk columns written as numbers rather than text.
const NUMERIC_COLUMNS: &[&str] = &["probability", "impact", "score"];

/// XLSX exporter and importer.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxFormat;

impl XlsxFormat {
    /// Create an XLSX exporter/importer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Exporter for XlsxFormat {
    fn export(&self, project: &Project) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();

        write_sheet(
            &mut workbook,
            META_SHEET,
            META_COLUMNS,
            vec![meta_to_row(&project.meta)],
        )?;

        let rows = project
            .risks
            .iter()
            .map(risk_to_row)
            .collect::<Result<Vec<_>>>()?;
        write_sheet(&mut workbook, RISKS_SHEET, RISK_COLUMNS, rows)?;

        Ok(workbook.save_to_buffer()?)
    }
}

fn write_sheet(
    workbook: &mut Workbook,
    name: &str,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> Result<()> {
    let header_format = CellFormat::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;

    for (col, header) in (0u16..).zip(headers) {
        sheet.write_string_with_format(0, col, *header, &header_format)?;
    }
    for (row_idx, cells) in (1u32..).zip(rows) {
        for ((col, header), cell) in (0u16..).zip(headers).zip(cells) {
            match cell.parse::<f64>() {
                Ok(number) if NUMERIC_COLUMNS.contains(header) => {
                    sheet.write_number(row_idx, col, number)?;
                }
                _ if cell.is_empty() => {}
                _ => {
                    sheet.write_string(row_idx, col, cell)?;
                }
            }
        }
    }
    Ok(())
}

impl Importer for XlsxFormat {
    fn import(&self, data: &[u8], now: DateTime<Utc>) -> Result<ImportBundle> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(data))?;
        let names = workbook.sheet_names();

        let risk_sheet = names
            .iter()
            .find(|n| n.as_str() == RISKS_SHEET)
            .or_else(|| names.first())
            .cloned()
            .ok_or_else(|| Error::import("workbook has no sheets"))?;

        let meta = if names.iter().any(|n| n == META_SHEET) {
            let range = workbook.worksheet_range(META_SHEET)?;
            sheet_rows(&range)
                .into_iter()
                .next()
                .map(|row| meta_from_row(&row))
        } else {
            None
        };

        let range = workbook.worksheet_range(&risk_sheet)?;
        let risks = sheet_rows(&range)
            .iter()
            .map(|row| risk_from_row(row, now))
            .collect();

        Ok(ImportBundle {
            meta,
            risks,
            ..ImportBundle::default()
        })
    }
}

/// Data rows of a sheet keyed by the header row. Blank rows are skipped.
fn sheet_rows(range: &Range<Data>) -> Vec<Row> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header.iter().map(cell_text).collect();

    rows.map(|cells| zip_row(&headers, cells.iter().map(cell_text)))
        .filter(|row| !is_blank_row(row))
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) => cell.as_date().map(format_date).unwrap_or_default(),
    }
}
