use std::collections::HashSet;

use super::model::{CellValue, DataError, Dataset};

/// Columns offered in the filter-column selector.  Fixed, not derived from
/// the schema.
pub const FILTERABLE_COLUMNS: [&str; 2] = ["Receipt_ID", "analysisjobs_getRegion"];

// ---------------------------------------------------------------------------
// Column enumeration
// ---------------------------------------------------------------------------

/// Names of the integer and floating-point columns, in table order.
pub fn numeric_columns(dataset: &Dataset) -> Vec<String> {
    dataset
        .columns()
        .iter()
        .filter(|c| c.dtype.is_numeric())
        .map(|c| c.name.clone())
        .collect()
}

pub fn filterable_columns() -> Vec<String> {
    FILTERABLE_COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// Distinct values of `column` in order of first appearance.
pub fn distinct_values(dataset: &Dataset, column: &str) -> Result<Vec<CellValue>, DataError> {
    let idx = dataset.require_column(column)?;
    let mut seen = HashSet::new();
    Ok(dataset
        .rows()
        .iter()
        .map(|row| &row[idx])
        .filter(|value| seen.insert(*value))
        .cloned()
        .collect())
}

// ---------------------------------------------------------------------------
// FilteredView – the row subset passing the active filter
// ---------------------------------------------------------------------------

/// Row positions of the dataset that pass the filter, in dataset order.
/// Positions within the view (0-based) are what chart selections refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredView {
    rows: Vec<usize>,
}

impl FilteredView {
    /// The unfiltered view over every row.
    pub fn all(dataset: &Dataset) -> Self {
        Self {
            rows: (0..dataset.len()).collect(),
        }
    }

    /// Dataset row index for each view position.
    pub fn row_indices(&self) -> &[usize] {
        &self.rows
    }

    /// Dataset row index backing view position `position`.
    pub fn dataset_row(&self, position: usize) -> Option<usize> {
        self.rows.get(position).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Rows whose `column` value is one of `selected`.
///
/// An empty `selected` means "no filter chosen" and yields every row, not an
/// empty view.
pub fn apply_filter(
    dataset: &Dataset,
    column: &str,
    selected: &[CellValue],
) -> Result<FilteredView, DataError> {
    if selected.is_empty() {
        return Ok(FilteredView::all(dataset));
    }
    let idx = dataset.require_column(column)?;
    let wanted: HashSet<&CellValue> = selected.iter().collect();
    let rows = dataset
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| wanted.contains(&row[idx]))
        .map(|(i, _)| i)
        .collect();
    Ok(FilteredView { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{ColumnInfo, ColumnType};

    fn sample() -> Dataset {
        let columns = vec![
            ColumnInfo::new("Receipt_ID", ColumnType::Text),
            ColumnInfo::new("A", ColumnType::Float),
            ColumnInfo::new("note", ColumnType::Text),
            ColumnInfo::new("B", ColumnType::Integer),
            ColumnInfo::new("analysisjobs_getRegion", ColumnType::Text),
        ];
        let receipts = ["R1", "R1", "R2", "R3", "R2", "R1", "R3", "R2", "R1", "R3"];
        let rows = receipts
            .iter()
            .enumerate()
            .map(|(i, r)| {
                vec![
                    CellValue::Text(r.to_string()),
                    CellValue::Float(i as f64 * 0.5),
                    CellValue::Text(format!("n{i}")),
                    CellValue::Integer(i as i64 * 10),
                    CellValue::Text(if i % 2 == 0 { "north" } else { "south" }.into()),
                ]
            })
            .collect();
        Dataset::new(columns, rows).unwrap()
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_numeric_columns_in_table_order() {
        assert_eq!(numeric_columns(&sample()), vec!["A", "B"]);
    }

    #[test]
    fn test_filterable_columns_are_fixed() {
        assert_eq!(
            filterable_columns(),
            vec!["Receipt_ID", "analysisjobs_getRegion"]
        );
    }

    #[test]
    fn test_distinct_values_first_appearance_order() {
        let values = distinct_values(&sample(), "Receipt_ID").unwrap();
        assert_eq!(values, vec![text("R1"), text("R2"), text("R3")]);
    }

    #[test]
    fn test_distinct_values_unknown_column() {
        assert_eq!(
            distinct_values(&sample(), "nope"),
            Err(DataError::UnknownColumn("nope".into()))
        );
    }

    #[test]
    fn test_empty_selection_is_the_whole_table() {
        let ds = sample();
        let view = apply_filter(&ds, "Receipt_ID", &[]).unwrap();
        assert_eq!(view.row_indices(), (0..ds.len()).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn test_filter_keeps_exactly_matching_rows_in_order() {
        let ds = sample();
        let selected = vec![text("R1"), text("R3")];
        let view = apply_filter(&ds, "Receipt_ID", &selected).unwrap();

        let expected: Vec<usize> = ds
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| selected.contains(&row[0]))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(view.row_indices(), expected.as_slice());
        for &row in view.row_indices() {
            assert!(selected.contains(&ds.row(row).unwrap()[0]));
        }
    }

    #[test]
    fn test_single_receipt_scenario() {
        let ds = sample();
        let view = apply_filter(&ds, "Receipt_ID", &[text("R1")]).unwrap();
        assert_eq!(view.row_indices(), &[0, 1, 5, 8]);
        assert_eq!(view.dataset_row(2), Some(5));
        assert_eq!(view.dataset_row(4), None);
    }

    #[test]
    fn test_duplicate_selected_values_do_not_duplicate_rows() {
        let ds = sample();
        let view = apply_filter(&ds, "analysisjobs_getRegion", &[text("north"), text("north")])
            .unwrap();
        assert_eq!(view.row_indices(), &[0, 2, 4, 6, 8]);
    }
}
