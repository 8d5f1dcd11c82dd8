// Spreadsheet reader for source B (xls, xlsx, xlsb, ods)

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets};
use reconbot_recon::model::{Cell, RawTable};

/// Read the first worksheet of an in-memory workbook.
///
/// Column positions are absolute: a sheet whose data starts at column C
/// still reports that data at index 2. Rows with no content are dropped.
pub fn parse_workbook(bytes: &[u8], has_header: bool) -> Result<RawTable, String> {
    let mut workbook: Sheets<_> = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| format!("Failed to open workbook: {}", e))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "Workbook contains no sheets".to_string())?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

    let start_col = range.start().map(|(_, c)| c as usize).unwrap_or(0);

    let mut header: Option<Vec<String>> = None;
    let mut rows: Vec<Vec<Cell>> = Vec::new();

    for data_row in range.rows() {
        let mut row: Vec<Cell> = vec![Cell::Empty; start_col];
        row.extend(data_row.iter().map(data_to_cell));

        if row.iter().all(Cell::is_empty) {
            continue;
        }

        if has_header && header.is_none() {
            header = Some(row.iter().map(|c| c.to_text().trim().to_string()).collect());
            continue;
        }

        rows.push(row);
    }

    log::debug!("sheet '{}': {} data row(s)", sheet_name, rows.len());

    Ok(RawTable { header, rows, rejected_rows: 0 })
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from(s.as_str()),
        Data::Float(n) => Cell::Float(*n),
        Data::Int(n) => Cell::Int(*n),
        // Store as TRUE/FALSE text, never as a number
        Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.into()),
        // #N/A, #VALUE! and friends carry no amount
        Data::Error(_) => Cell::Empty,
        // Serial number; the export has no date columns we read
        Data::DateTime(dt) => Cell::Float(dt.as_f64()),
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn export_bytes() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Meter Number").unwrap();
        sheet.write_string(0, 1, "Description").unwrap();
        sheet.write_string(0, 2, "Amount").unwrap();
        sheet.write_number(1, 0, 1001.0).unwrap();
        sheet.write_string(1, 1, "desc").unwrap();
        sheet.write_number(1, 2, 495.0).unwrap();
        sheet.write_string(2, 0, "1002").unwrap();
        sheet.write_string(2, 1, "desc").unwrap();
        sheet.write_number(2, 2, 10.0).unwrap();
        sheet.write_string(4, 1, "Report generated by exporter").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn reads_header_and_typed_cells() {
        let table = parse_workbook(&export_bytes(), true).unwrap();
        assert_eq!(
            table.header,
            Some(vec!["Meter Number".to_string(), "Description".into(), "Amount".into()])
        );
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.cell(0, 0), &Cell::Float(1001.0));
        assert_eq!(table.cell(0, 2), &Cell::Float(495.0));
        assert_eq!(table.cell(1, 0), &Cell::Text("1002".into()));
        // footer line survives the reader; the normalizer drops it
        assert_eq!(table.cell(2, 1), &Cell::Text("Report generated by exporter".into()));
    }

    #[test]
    fn offset_sheet_keeps_absolute_columns() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 2, "Amount").unwrap();
        sheet.write_number(1, 2, 7.5).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = parse_workbook(&bytes, true).unwrap();
        assert_eq!(table.header.as_ref().unwrap()[2], "Amount");
        assert_eq!(table.cell(0, 2), &Cell::Float(7.5));
    }

    #[test]
    fn rejects_non_workbook_bytes() {
        let err = parse_workbook(b"Meter,Desc,Amount\n1001,x,1\n", true).unwrap_err();
        assert!(err.contains("Failed to open workbook"));
    }
}
