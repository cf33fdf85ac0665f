use eframe::egui::{self, RichText};

use crate::state::{AppState, compose};
use crate::ui::chart::{self, ChartInteraction};
use crate::ui::{panels, table};

const CHART_HEIGHT: f32 = 420.0;

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct HaloViewerApp {
    pub state: AppState,
    interaction: ChartInteraction,
}

impl HaloViewerApp {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            interaction: ChartInteraction::default(),
        }
    }
}

impl eframe::App for HaloViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let before = self.state.view.clone();

        // The whole page is recomposed from (dataset, view state) every frame.
        let dataset = self.state.dataset();
        let page = dataset.as_deref().map(|ds| compose(ds, &self.state.view));

        // ---- Top panel: menu bar and title ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state, page.as_ref());
        });

        let (Some(dataset), Some(page)) = (dataset, page) else {
            egui::CentralPanel::default().show(ctx, |ui| {
                panels::load_failure(ui, &self.state);
            });
            return;
        };

        // ---- Left side panel: column and filter selectors ----
        egui::SidePanel::left("controls")
            .default_width(280.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state.view, &page);
            });

        // ---- Central panel: chart, selection, full table ----
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .drag_to_scroll(false)
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    panels::marker_size_input(ui, &mut self.state.view);

                    match (&page.chart, page.empty_notice()) {
                        (_, Some(notice)) => {
                            ui.add_space(8.0);
                            ui.label(RichText::new(notice).italics());
                        }
                        (Some(spec), None) => {
                            let event = chart::scatter_chart(
                                ui,
                                spec,
                                &page.selection,
                                &mut self.interaction,
                                CHART_HEIGHT,
                            );
                            if let Some(event) = event {
                                self.state.view.set_selection(event.point_indices);
                            }
                        }
                        (None, None) => {
                            ui.label("Nothing to plot: pick two numeric columns.");
                        }
                    }

                    if !page.selection.is_empty() {
                        ui.add_space(8.0);
                        let rows: Vec<(usize, usize)> = page
                            .selection
                            .iter()
                            .copied()
                            .zip(page.selected_rows())
                            .collect();
                        table::selected_points_table(ui, &dataset, &rows);
                    }

                    ui.add_space(8.0);
                    ui.separator();
                    table::full_dataset_table(ui, &dataset);
                });
        });

        if self.state.view != before {
            ctx.request_repaint();
        }
    }
}
