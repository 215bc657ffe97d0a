//! Line-item reconstruction from document tables.

use crate::models::invoice::LineItem;
use crate::models::raw::Table;

const DESCRIPTION_HEADERS: &[&str] = &["description", "item", "product", "service"];
const AMOUNT_HEADERS: &[&str] = &["amount", "price", "cost", "total"];

/// Rebuild line items from every table, in table then row order.
pub fn line_items(tables: &[Table]) -> Vec<LineItem> {
    tables.iter().flat_map(table_items).collect()
}

fn table_items(table: &Table) -> Vec<LineItem> {
    let headers = table.headers();
    table
        .body_rows
        .iter()
        .filter_map(|row| row_item(headers, row))
        .collect()
}

/// Headers and cells are zipped, so a row shorter than the header only
/// sees the columns it actually has.
fn row_item(headers: &[String], row: &[String]) -> Option<LineItem> {
    let columns: Vec<(String, &str)> = headers
        .iter()
        .zip(row)
        .map(|(header, cell)| (header.to_lowercase(), cell.trim()))
        .collect();

    let description = find_column(&columns, DESCRIPTION_HEADERS, None);
    let amount = description.and_then(|d| find_column(&columns, AMOUNT_HEADERS, Some(d)));

    let (desc, amt) = match (description, amount) {
        (Some(d), Some(a)) => (columns[d].1, columns[a].1),
        _ => {
            // Positional: first cell describes, last cell prices.
            let (first, last) = (row.first()?, row.last()?);
            (first.trim(), last.trim())
        }
    };

    (!desc.is_empty() && !amt.is_empty()).then(|| LineItem::new(desc, amt))
}

/// Index of the first lowercased header containing one of `keywords`.
fn find_column(columns: &[(String, &str)], keywords: &[&str], skip: Option<usize>) -> Option<usize> {
    columns
        .iter()
        .enumerate()
        .find(|(i, (header, _))| Some(*i) != skip && keywords.iter().any(|k| header.contains(k)))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        let strings = |cells: &[&str]| cells.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        Table {
            header_rows: if headers.is_empty() {
                Vec::new()
            } else {
                vec![strings(headers)]
            },
            body_rows: rows.iter().map(|r| strings(r)).collect(),
        }
    }

    #[test]
    fn test_description_and_price_columns() {
        let tables = [table(&["Description", "Price"], &[&["Widget", "10.00"]])];
        assert_eq!(line_items(&tables), vec![LineItem::new("Widget", "10.00")]);
    }

    #[test]
    fn test_all_empty_row_yields_nothing() {
        let tables = [table(&["Description", "Price"], &[&["", ""], &["  ", " "]])];
        assert!(line_items(&tables).is_empty());
    }

    #[test]
    fn test_columns_found_anywhere_in_header() {
        let tables = [table(
            &["Qty", "Item Code", "Unit Price", "Line Total"],
            &[&["2", "WID-1", "5.00", "10.00"], &["1", "", "3.00", "3.00"]],
        )];
        // "Item Code" is the description column and "Unit Price" the first amount column.
        assert_eq!(line_items(&tables), vec![LineItem::new("WID-1", "5.00")]);
    }

    #[test]
    fn test_amount_column_differs_from_description() {
        // "Total description" matches both keyword sets; amount must take another column.
        let tables = [table(
            &["Total description", "Cost"],
            &[&["Consulting", "400.00"]],
        )];
        assert_eq!(line_items(&tables), vec![LineItem::new("Consulting", "400.00")]);
    }

    #[test]
    fn test_positional_fallback_without_headers() {
        let tables = [table(
            &[],
            &[&["Shipping", "x", "12.00"], &[], &["Lonely"]],
        )];
        assert_eq!(
            line_items(&tables),
            vec![
                LineItem::new("Shipping", "12.00"),
                LineItem::new("Lonely", "Lonely"),
            ]
        );
    }

    #[test]
    fn test_short_row_falls_back_to_positions() {
        // Zipping drops the Amount header, so keyword matching fails for this row.
        let tables = [table(&["Description", "Qty", "Amount"], &[&["Widget", "2"]])];
        assert_eq!(line_items(&tables), vec![LineItem::new("Widget", "2")]);
    }

    #[test]
    fn test_resolved_columns_with_blank_amount_do_not_fall_back() {
        let tables = [table(&["Description", "Amount"], &[&["Widget", ""]])];
        assert!(line_items(&tables).is_empty());
    }
}
