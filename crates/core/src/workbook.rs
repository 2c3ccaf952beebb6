//! In-memory spreadsheet model shared by the price-list upload and the
//! assembly interchange codec.
//!
//! Rows and columns are 0-based and absolute: `rows[0]` is spreadsheet row 1.
//! Rows may be ragged; a missing cell reads as [`Cell::Empty`].

use serde::{Deserialize, Serialize};

/// A single cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() { Cell::Empty } else { Cell::Text(s) }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Trimmed textual form. Integral numbers print without a fraction.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
        }
    }
}

/// One named grid of cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Set a cell, growing the grid as needed.
    pub fn set(&mut self, row: usize, col: usize, value: Cell) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut self.rows[row];
        if cells.len() <= col {
            cells.resize(col + 1, Cell::Empty);
        }
        cells[col] = value;
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// An ordered list of sheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn first_sheet(&self) -> Option<&Sheet> {
        self.sheets.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cells_read_as_empty() {
        let mut sheet = Sheet::new("s");
        sheet.push_row(vec![Cell::text("a")]);
        assert_eq!(sheet.cell(0, 0), &Cell::Text("a".into()));
        assert_eq!(sheet.cell(0, 5), &Cell::Empty);
        assert_eq!(sheet.cell(9, 0), &Cell::Empty);
    }

    #[test]
    fn set_grows_grid() {
        let mut sheet = Sheet::new("s");
        sheet.set(2, 3, Cell::Number(1.5));
        assert_eq!(sheet.row_count(), 3);
        assert_eq!(sheet.cell(2, 3), &Cell::Number(1.5));
        assert!(sheet.cell(2, 0).is_blank());
    }

    #[test]
    fn as_text_formats_integral_numbers() {
        assert_eq!(Cell::Number(9000.0).as_text(), "9000");
        assert_eq!(Cell::Number(9.5).as_text(), "9.5");
        assert_eq!(Cell::text("  x ").as_text(), "x");
        assert!(Cell::text("").is_blank());
    }
}
