//! `.xlsx` bytes ↔ [`Workbook`].
//!
//! Reading goes through `calamine`, writing through `rust_xlsxwriter`. Only
//! strings and numbers survive; formulas are read as their cached values.

use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook as XlsxWorkbook;
use std::io::Cursor;
use tracing::debug;
use wallcost_core::error::{Error, Result};
use wallcost_core::workbook::{Cell, Sheet, Workbook};

fn workbook_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Workbook(format!("{context}: {e}"))
}

fn to_cell(value: &Data) -> Cell {
    match value {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::text(b.to_string()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.clone()),
        Data::Error(e) => Cell::text(e.to_string()),
    }
}

/// Parse every worksheet of an `.xlsx` file. Cell positions are absolute.
pub fn read_workbook(bytes: &[u8]) -> Result<Workbook> {
    let mut xlsx: Xlsx<Cursor<&[u8]>> =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| workbook_error("cannot open workbook", e))?;

    let names: Vec<String> = xlsx.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = xlsx
            .worksheet_range(&name)
            .map_err(|e| workbook_error(&format!("cannot read sheet '{name}'"), e))?;

        let mut sheet = Sheet::new(name);
        // The range starts at the first used cell, not at A1
        if let Some((row0, col0)) = range.start() {
            for (r, row) in range.rows().enumerate() {
                for (c, value) in row.iter().enumerate() {
                    let cell = to_cell(value);
                    if cell != Cell::Empty {
                        sheet.set(row0 as usize + r, col0 as usize + c, cell);
                    }
                }
            }
        }
        debug!(sheet = %sheet.name, rows = sheet.row_count(), "Sheet read");
        sheets.push(sheet);
    }
    Ok(Workbook::new(sheets))
}

/// Serialize `workbook` as `.xlsx` bytes. Empty cells are not written.
pub fn write_workbook(workbook: &Workbook) -> Result<Vec<u8>> {
    let mut xlsx = XlsxWorkbook::new();
    for sheet in &workbook.sheets {
        let worksheet = xlsx.add_worksheet();
        worksheet
            .set_name(&sheet.name)
            .map_err(|e| workbook_error(&format!("invalid sheet name '{}'", sheet.name), e))?;

        for (r, row) in sheet.rows.iter().enumerate() {
            let r = u32::try_from(r).map_err(|e| workbook_error("row out of range", e))?;
            for (c, cell) in row.iter().enumerate() {
                let c = u16::try_from(c).map_err(|e| workbook_error("column out of range", e))?;
                match cell {
                    Cell::Empty => continue,
                    Cell::Text(s) => {
                        worksheet
                            .write_string(r, c, s.as_str())
                            .map_err(|e| workbook_error("cannot write cell", e))?;
                    }
                    Cell::Number(n) => {
                        worksheet
                            .write_number(r, c, *n)
                            .map_err(|e| workbook_error("cannot write cell", e))?;
                    }
                }
            }
        }
    }
    xlsx.save_to_buffer()
        .map_err(|e| workbook_error("cannot save workbook", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_preserves_cells() {
        let mut sheet = Sheet::new("mapping");
        sheet.set(0, 0, Cell::text("_assemblyName"));
        sheet.set(0, 1, Cell::text("structure"));
        sheet.set(2, 0, Cell::text("W-01"));
        sheet.set(2, 1, Cell::text("cstud_65형"));
        sheet.set(2, 3, Cell::Number(17000.0));
        let mut other = Sheet::new("assembly");
        other.set(1, 1, Cell::text("offset"));

        let bytes = write_workbook(&Workbook::new(vec![other, sheet])).unwrap();
        let back = read_workbook(&bytes).unwrap();

        assert_eq!(back.sheets.len(), 2);
        assert_eq!(back.sheets[0].name, "assembly");
        assert_eq!(back.sheets[0].cell(1, 1).as_text(), "offset");
        assert!(back.sheets[0].cell(0, 0).is_blank());

        let mapping = back.sheet("mapping").unwrap();
        assert_eq!(mapping.cell(0, 0).as_text(), "_assemblyName");
        assert_eq!(mapping.cell(2, 1).as_text(), "cstud_65형");
        assert_eq!(mapping.cell(2, 3), &Cell::Number(17000.0));
        assert!(mapping.cell(1, 0).is_blank());
    }

    #[test]
    fn garbage_bytes_are_a_workbook_error() {
        assert!(matches!(
            read_workbook(b"not a spreadsheet"),
            Err(Error::Workbook(_))
        ));
    }
}
