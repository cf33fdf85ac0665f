use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::config::MARKER_SIZE_RANGE;
use crate::state::{AppState, PageModel, ViewState};

pub const PAGE_TITLE: &str = "DCEG HALO Metadata Viewer";

// ---------------------------------------------------------------------------
// Left side panel – column and filter widgets
// ---------------------------------------------------------------------------

/// Render the controls column.  Changes go straight into `view`; the page is
/// recomposed from it on the next frame.
pub fn side_panel(ui: &mut Ui, view: &mut ViewState, page: &PageModel) {
    ui.heading("Controls");
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            if page.numeric_columns.is_empty() {
                ui.label(
                    RichText::new("The table has no numeric columns.").color(Color32::RED),
                );
            }

            let axes = &page.numeric_columns;
            if let Some(col) = column_combo(ui, "x_axis", "X axis:", axes, page.x_column.as_deref()) {
                view.set_x_column(col);
            }
            if let Some(col) = column_combo(ui, "y_axis", "Y axis:", axes, page.y_column.as_deref()) {
                view.set_y_column(col);
            }
            ui.separator();

            if let Some(col) = column_combo(
                ui,
                "filter_column",
                "Filter column:",
                &page.filterable_columns,
                Some(page.filter_column.as_str()),
            ) {
                view.set_filter_column(col);
            }

            if let Some(warning) = &page.filter_warning {
                ui.label(RichText::new(warning).color(Color32::RED));
            }

            filter_values(ui, view, page);

            ui.separator();
            let mut color_by = view.color_by_filter;
            if ui
                .checkbox(&mut color_by, "Colour points by filter column")
                .changed()
            {
                view.set_color_by_filter(color_by);
            }
        });
}

/// Labelled combo box over `options`.  Returns the newly picked option.
fn column_combo(
    ui: &mut Ui,
    id: &str,
    label: &str,
    options: &[String],
    current: Option<&str>,
) -> Option<String> {
    let mut picked = None;
    ui.label(label);
    egui::ComboBox::from_id_salt(id)
        .width(ui.available_width() - 8.0)
        .selected_text(current.unwrap_or("—"))
        .show_ui(ui, |ui: &mut Ui| {
            for opt in options {
                let is_current = current == Some(opt.as_str());
                if ui.selectable_label(is_current, opt).clicked() && !is_current {
                    picked = Some(opt.clone());
                }
            }
        });
    picked
}

/// Multi-select over the distinct values of the filter column.  Nothing
/// checked means no filtering.
fn filter_values(ui: &mut Ui, view: &mut ViewState, page: &PageModel) {
    let n_selected = page.filter_values.len();
    let n_total = page.filter_options.len();
    let header_text = if n_selected == 0 {
        format!("Filter values:  (all {n_total})")
    } else {
        format!("Filter values:  ({n_selected}/{n_total})")
    };

    egui::CollapsingHeader::new(RichText::new(header_text).strong())
        .id_salt(("filter_values", page.filter_column.as_str()))
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            ui.horizontal(|ui: &mut Ui| {
                if ui.small_button("All").clicked() {
                    view.select_all_values(&page.filter_options);
                }
                if ui.small_button("None").clicked() {
                    view.clear_filter_values();
                }
            });

            for val in &page.filter_options {
                let mut checked = page.filter_values.contains(val);
                if ui.checkbox(&mut checked, val.to_string()).changed() {
                    view.toggle_filter_value(val);
                }
            }
        });
}

/// Marker size input, in pixels.
pub fn marker_size_input(ui: &mut Ui, view: &mut ViewState) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Marker size:");
        let mut size = view.marker_size;
        let resp = ui.add(
            egui::DragValue::new(&mut size)
                .range(MARKER_SIZE_RANGE)
                .speed(0.25)
                .suffix(" px"),
        );
        if resp.changed() && size != view.marker_size {
            view.set_marker_size(size);
        }
    });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the menu bar and page heading.
pub fn top_bar(ui: &mut Ui, state: &mut AppState, page: Option<&PageModel>) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui.button("Reload").clicked() {
                state.reload();
                ui.close_menu();
            }
        });

        ui.separator();
        ui.label(RichText::new(state.cache.source().to_string()).weak());

        if let Some(page) = page {
            ui.separator();
            ui.label(format!(
                "{} rows, {} visible, {} selected",
                page.total_rows,
                page.view.len(),
                page.selection.len()
            ));
        }
    });

    ui.heading(format!("📊 {PAGE_TITLE}"));
}

/// Shown instead of the page body when the dataset cannot be loaded.
pub fn load_failure(ui: &mut Ui, state: &AppState) {
    ui.add_space(12.0);
    ui.label(
        RichText::new("The dataset could not be loaded.")
            .strong()
            .color(Color32::RED),
    );
    if let Some(msg) = &state.load_error {
        ui.label(RichText::new(msg).monospace());
    }
    ui.add_space(8.0);
    ui.label("Use File → Open… to pick a table, or File → Reload to try again.");
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open metadata table")
        .add_filter("Supported files", &["csv", "parquet", "pq", "json"])
        .add_filter("CSV", &["csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .pick_file();

    if let Some(path) = file {
        state.open_local(path);
    }
}
