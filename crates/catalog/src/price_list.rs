//! One-sheet price-list upload.
//!
//! The header row is found by scanning the first few rows for cells that
//! match a fixed vocabulary (Korean estimating terms and English names).
//! Rows below it become [`NewPricedItem`]s; rows without a name or spec, or
//! with both prices zero, are skipped.

use std::collections::HashMap;
use tracing::{debug, warn};
use wallcost_core::error::{Error, Result};
use wallcost_core::item::{NewPricedItem, normalize};
use wallcost_core::workbook::{Cell, Sheet, Workbook};

/// Default number of leading rows searched for the header.
pub const DEFAULT_HEADER_SCAN_ROWS: usize = 10;

/// Canonical item fields a price-list column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemField {
    Location,
    Name,
    Spec,
    Unit,
    Thickness,
    Quantity,
    MaterialPrice,
    LaborPrice,
    TotalPrice,
    MaterialWorkType,
    LaborWorkType,
}

impl ItemField {
    pub const ALL: [ItemField; 11] = [
        ItemField::Location,
        ItemField::Name,
        ItemField::Spec,
        ItemField::Unit,
        ItemField::Thickness,
        ItemField::Quantity,
        ItemField::MaterialPrice,
        ItemField::LaborPrice,
        ItemField::TotalPrice,
        ItemField::MaterialWorkType,
        ItemField::LaborWorkType,
    ];

    pub const REQUIRED: [ItemField; 4] = [
        ItemField::Name,
        ItemField::Spec,
        ItemField::MaterialPrice,
        ItemField::LaborPrice,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ItemField::Location => "location",
            ItemField::Name => "name",
            ItemField::Spec => "spec",
            ItemField::Unit => "unit",
            ItemField::Thickness => "thickness",
            ItemField::Quantity => "quantity",
            ItemField::MaterialPrice => "materialPrice",
            ItemField::LaborPrice => "laborPrice",
            ItemField::TotalPrice => "totalPrice",
            ItemField::MaterialWorkType => "materialWorkType",
            ItemField::LaborWorkType => "laborWorkType",
        }
    }

    /// Accepted header spellings, already normalized.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            ItemField::Location => &["위치", "구분", "부위", "location"],
            ItemField::Name => &["품명", "품목", "명칭", "name", "item"],
            ItemField::Spec => &["규격", "spec", "specification"],
            ItemField::Unit => &["단위", "unit"],
            ItemField::Thickness => &["두께", "두께(mm)", "thickness"],
            ItemField::Quantity => &["수량", "quantity", "qty"],
            ItemField::MaterialPrice => {
                &["재료비", "자재비", "재료비단가", "materialprice", "material"]
            }
            ItemField::LaborPrice => &["노무비", "인건비", "노무비단가", "laborprice", "labor"],
            ItemField::TotalPrice => &["합계", "합계단가", "총액", "totalprice", "total"],
            ItemField::MaterialWorkType => &["재료공종", "자재공종", "materialworktype"],
            ItemField::LaborWorkType => &["노무공종", "laborworktype"],
        }
    }

    pub fn from_header(text: &str) -> Option<Self> {
        let header = normalize(text);
        if header.is_empty() {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|field| field.aliases().contains(&header.as_str()))
    }
}

/// Result of parsing an upload, before anything touches the catalog.
#[derive(Debug, Clone, Default)]
pub struct ParsedPriceList {
    pub header_row: usize,
    pub items: Vec<NewPricedItem>,
    pub skipped_rows: usize,
}

/// Parse a numeric cell, tolerating thousands separators and currency marks.
/// Unparseable text and non-finite values (`NaN`, `inf`) read as zero.
pub fn parse_number(cell: &Cell) -> f64 {
    let value = match cell {
        Cell::Number(n) => *n,
        Cell::Empty => 0.0,
        Cell::Text(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '₩' | '원' | '$'))
                .collect();
            cleaned.parse().unwrap_or(0.0)
        }
    };
    if value.is_finite() { value } else { 0.0 }
}

fn header_columns(sheet: &Sheet, row: usize) -> HashMap<ItemField, usize> {
    let mut columns = HashMap::new();
    let width = sheet.rows.get(row).map_or(0, Vec::len);
    for col in 0..width {
        if let Some(field) = ItemField::from_header(&sheet.cell(row, col).as_text()) {
            // First occurrence wins
            columns.entry(field).or_insert(col);
        }
    }
    columns
}

/// Find the header row within the first `scan_rows` rows.
fn detect_header(sheet: &Sheet, scan_rows: usize) -> Result<(usize, HashMap<ItemField, usize>)> {
    let mut best: Option<HashMap<ItemField, usize>> = None;

    for row in 0..scan_rows.min(sheet.row_count()) {
        let columns = header_columns(sheet, row);
        if ItemField::REQUIRED.iter().all(|f| columns.contains_key(f)) {
            debug!(row, columns = columns.len(), "Price-list header detected");
            return Ok((row, columns));
        }
        if best.as_ref().is_none_or(|b| columns.len() > b.len()) {
            best = Some(columns);
        }
    }

    let best = best.unwrap_or_default();
    let missing: Vec<&str> = ItemField::REQUIRED
        .iter()
        .filter(|f| !best.contains_key(f))
        .map(|f| f.name())
        .collect();
    Err(Error::Validation(format!(
        "price list is missing required columns: {}",
        missing.join(", ")
    )))
}

/// Parse the first sheet of `workbook` as a price list.
pub fn parse_price_list(workbook: &Workbook, scan_rows: usize) -> Result<ParsedPriceList> {
    let sheet = workbook
        .first_sheet()
        .ok_or_else(|| Error::Validation("price list workbook has no sheets".into()))?;
    let (header_row, columns) = detect_header(sheet, scan_rows)?;

    let text = |row: usize, field: ItemField| -> String {
        columns
            .get(&field)
            .map(|&col| sheet.cell(row, col).as_text())
            .unwrap_or_default()
    };
    let number = |row: usize, field: ItemField| -> f64 {
        columns
            .get(&field)
            .map(|&col| parse_number(sheet.cell(row, col)))
            .unwrap_or(0.0)
    };

    let mut parsed = ParsedPriceList {
        header_row,
        ..Default::default()
    };

    for row in header_row + 1..sheet.row_count() {
        if sheet.rows[row].iter().all(Cell::is_blank) {
            continue;
        }

        let name = text(row, ItemField::Name);
        let spec = text(row, ItemField::Spec);
        if name.is_empty() || spec.is_empty() {
            debug!(row = row + 1, "Skipping row without name or spec");
            parsed.skipped_rows += 1;
            continue;
        }

        let material_price = number(row, ItemField::MaterialPrice);
        let labor_price = number(row, ItemField::LaborPrice);
        if material_price == 0.0 && labor_price == 0.0 {
            debug!(row = row + 1, %name, "Skipping row without prices");
            parsed.skipped_rows += 1;
            continue;
        }

        parsed.items.push(NewPricedItem {
            location: text(row, ItemField::Location),
            name,
            spec,
            unit: text(row, ItemField::Unit),
            thickness: number(row, ItemField::Thickness),
            quantity: number(row, ItemField::Quantity),
            material_price,
            labor_price,
            material_work_type: text(row, ItemField::MaterialWorkType),
            labor_work_type: text(row, ItemField::LaborWorkType),
        });
    }

    if parsed.items.is_empty() {
        warn!(skipped = parsed.skipped_rows, "Price list contained no usable rows");
    }
    Ok(parsed)
}
