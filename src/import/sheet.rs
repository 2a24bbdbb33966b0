//! Delimited text sheets (CSV / TSV).
//!
//! Row 1 is a header and is dropped. Quoted cells may contain the
//! delimiter, doubled quotes and line breaks. Blank lines inside the sheet
//! stay as blank rows so the reconciler counts them as skipped; blank lines
//! after the last row with content are ignored.

use std::path::Path;

use super::RawRow;
use crate::error::Result;

/// A parsed sheet: the header plus its data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelimitedSheet {
    pub header: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl DelimitedSheet {
    /// Read and parse a sheet file.
    ///
    /// `.tsv` and `.tab` files are tab separated; anything else is tab
    /// separated when its first line contains a tab, comma separated
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read as UTF-8.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let by_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("tsv") || e.eq_ignore_ascii_case("tab"));
        let delimiter = if by_extension { '\t' } else { sniff_delimiter(&text) };
        Ok(Self::parse(&text, delimiter))
    }

    /// Parse sheet text with an explicit delimiter.
    #[must_use]
    pub fn parse(text: &str, delimiter: char) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut records = split_records(text, delimiter).into_iter();

        let header = records.next().unwrap_or_default();
        let rows = records.map(|cells| RawRow::from_cells(&cells)).collect();
        Self { header, rows }
    }
}

fn sniff_delimiter(text: &str) -> char {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.contains('\t') { '\t' } else { ',' }
}

/// Split text into records of cells, dropping trailing all-blank records.
///
/// A `"` opens a quoted section only at the start of a cell; elsewhere it
/// is kept as a literal character.
fn split_records(text: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    cell.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => cell.push(c),
            }
            continue;
        }

        match c {
            '"' if cell.is_empty() => in_quotes = true,
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut cell));
                finish_record(&mut record, &mut records);
            }
            c if c == delimiter => record.push(std::mem::take(&mut cell)),
            _ => cell.push(c),
        }
    }

    if !cell.is_empty() || !record.is_empty() {
        record.push(cell);
        finish_record(&mut record, &mut records);
    }

    while records.last().is_some_and(|r| is_blank(r)) {
        records.pop();
    }
    records
}

fn finish_record(record: &mut Vec<String>, records: &mut Vec<Vec<String>>) {
    records.push(std::mem::take(record));
}

fn is_blank(record: &[String]) -> bool {
    record.iter().all(|c| c.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::import::Reconciler;
    use crate::storage::SqliteStorage;
    use tempfile::TempDir;

    #[test]
    fn test_parse_keeps_interior_blank_rows() {
        let text = "Time,Panel_ID,LOT_ID,Carrier_ID\r\n\
                    2024/05/20 08:00:00,100,10,1\r\n\
                    \r\n\
                    ,,,\n\
                    2024/05/20 09:00:00, 200 ,20,2,Y\n\
                    \n\
                    ,,,\n";
        let sheet = DelimitedSheet::parse(text, ',');

        assert_eq!(sheet.header, vec!["Time", "Panel_ID", "LOT_ID", "Carrier_ID"]);
        assert_eq!(sheet.rows.len(), 4);
        assert_eq!(sheet.rows[0].panel_id, "100");
        assert_eq!(sheet.rows[1], RawRow::default());
        assert_eq!(sheet.rows[2], RawRow::default());
        assert_eq!(sheet.rows[3].panel_id, "200");
        assert_eq!(sheet.rows[3].delete_flag, "Y");
    }

    #[test]
    fn test_blank_row_counts_as_skipped() {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(
            &dir.path().join("missing.db"),
            &dir.path().join("operations.log"),
        );
        let mut store = SqliteStorage::open_memory().unwrap();
        let sheet = DelimitedSheet::parse(
            "Time,Panel_ID,LOT_ID,Carrier_ID\n\
             2024/05/20 08:00:00,1,1,1\n\
             ,,,\n\
             2024/05/20 09:00:00,2,2,2\n",
            ',',
        );

        let outcome = Reconciler::new(&mut store, &audit).reconcile(sheet.rows, "sheet.csv");
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_quote_inside_unquoted_cell_is_literal() {
        let sheet = DelimitedSheet::parse("h\n2024/05/20 08:00:00,ab\"c,2,3\n", ',');

        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].panel_id, "ab\"c");
        assert_eq!(sheet.rows[0].lot_id, "2");
        assert_eq!(sheet.rows[0].carrier_id, "3");
    }

    #[test]
    fn test_parse_quoted_cells() {
        let text = "h\n\"2024/05/20 08:00:00\",\"1\"\"0\",\"a,b\",\"multi\nline\"\n";
        let sheet = DelimitedSheet::parse(text, ',');

        assert_eq!(sheet.rows.len(), 1);
        let row = &sheet.rows[0];
        assert_eq!(row.time, "2024/05/20 08:00:00");
        assert_eq!(row.panel_id, "1\"0");
        assert_eq!(row.lot_id, "a,b");
        assert_eq!(row.carrier_id, "multi\nline");
    }

    #[test]
    fn test_last_line_without_newline() {
        let sheet = DelimitedSheet::parse("h\n2024/05/20 08:00:00,1,2,3", ',');
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].carrier_id, "3");
    }

    #[test]
    fn test_empty_text() {
        let sheet = DelimitedSheet::parse("", ',');
        assert!(sheet.header.is_empty());
        assert!(sheet.rows.is_empty());
    }

    #[test]
    fn test_from_path_detects_tabs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sheet.txt");
        std::fs::write(
            &path,
            "\u{feff}Time\tPanel_ID\tLOT_ID\tCarrier_ID\n2024/05/20 08:00:00\t1\t2\t3\n",
        )
        .unwrap();

        let sheet = DelimitedSheet::from_path(&path).unwrap();
        assert_eq!(sheet.header[0], "Time");
        assert_eq!(sheet.rows[0].lot_id, "2");
    }
}
