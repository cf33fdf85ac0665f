use eframe::egui::{self, RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::model::{CellValue, Dataset};

/// Render `rows` of `dataset` as a striped table.  Each entry is
/// `(label, dataset_row)`; the label fills the leading index column.
pub fn data_table(
    ui: &mut Ui,
    id: &str,
    dataset: &Dataset,
    index_header: &str,
    rows: &[(usize, usize)],
    max_height: f32,
) {
    let columns = dataset.columns();

    ui.push_id(id, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
            .column(Column::auto().at_least(48.0))
            .columns(Column::auto().at_least(80.0).clip(true), columns.len())
            .min_scrolled_height(0.0)
            .max_scroll_height(max_height)
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong(index_header);
                });
                for col in columns {
                    header.col(|ui| {
                        ui.strong(&col.name).on_hover_text(col.dtype.to_string());
                    });
                }
            })
            .body(|body| {
                body.rows(18.0, rows.len(), |mut row| {
                    let (label, ds_row) = rows[row.index()];
                    row.col(|ui| {
                        ui.label(RichText::new(label.to_string()).weak());
                    });
                    let Some(cells) = dataset.row(ds_row) else {
                        return;
                    };
                    for cell in cells {
                        row.col(|ui| {
                            let text = RichText::new(cell.to_string());
                            match cell {
                                CellValue::Null => ui.label(text.weak()),
                                _ => ui.label(text),
                            };
                        });
                    }
                });
            });
    });
}

/// Rows of the filtered view at the selected positions, labelled by position.
pub fn selected_points_table(ui: &mut Ui, dataset: &Dataset, selection: &[(usize, usize)]) {
    ui.strong(format!("Selected points ({})", selection.len()));
    data_table(ui, "selected_points", dataset, "point", selection, 240.0);
}

/// Every row of the dataset, labelled by row index.
pub fn full_dataset_table(ui: &mut Ui, dataset: &Dataset) {
    ui.strong(format!(
        "Full dataset ({} rows x {} columns)",
        dataset.len(),
        dataset.columns().len()
    ));
    if dataset.is_empty() {
        ui.label(RichText::new("The table has no rows.").weak());
        return;
    }
    let rows: Vec<(usize, usize)> = (0..dataset.len()).map(|i| (i, i)).collect();
    data_table(ui, "full_dataset", dataset, "", &rows, 400.0);
}
