use eframe::egui::{Color32, Pos2, Rect, Stroke, StrokeKind, Ui};
use egui_plot::{Legend, MarkerShape, Plot, PlotPoint, PlotPoints, Points};

use crate::color::{BASE_COLOR, SELECTED_COLOR, ColorMap};
use crate::data::filter::FilteredView;
use crate::data::model::{CellValue, DataError, Dataset};

/// Extra pick tolerance around a marker, in screen pixels.
const PICK_SLACK: f32 = 4.0;

// ---------------------------------------------------------------------------
// ChartSpec – what the scatter plot draws
// ---------------------------------------------------------------------------

/// One legend entry: the view positions drawn in one colour.
#[derive(Debug, Clone, PartialEq)]
pub struct PointGroup {
    pub label: Option<String>,
    pub color: Color32,
    pub positions: Vec<usize>,
}

/// A fully resolved scatter plot.  `points[i]` is view position `i`; missing
/// coordinates are NaN and are not drawn but keep their position.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<[f64; 2]>,
    /// Marker diameter in pixels, shared by every point.
    pub marker_size: f32,
    pub groups: Vec<PointGroup>,
}

pub fn chart_title(x_column: &str, y_column: &str) -> String {
    format!("{y_column} vs. {x_column}")
}

/// Build the scatter plot of `view`.  `x_column == y_column` is allowed and
/// gives a diagonal.  With `color_by` set, points are grouped by that
/// column's value.
pub fn build_chart(
    dataset: &Dataset,
    view: &FilteredView,
    x_column: &str,
    y_column: &str,
    marker_size: f32,
    color_by: Option<(&str, &ColorMap)>,
) -> Result<ChartSpec, DataError> {
    let xi = dataset.require_column(x_column)?;
    let yi = dataset.require_column(y_column)?;

    let points: Vec<[f64; 2]> = view
        .row_indices()
        .iter()
        .filter_map(|&row| dataset.row(row))
        .map(|cells| {
            [
                cells[xi].as_f64().unwrap_or(f64::NAN),
                cells[yi].as_f64().unwrap_or(f64::NAN),
            ]
        })
        .collect();

    let groups = match color_by {
        None => vec![PointGroup {
            label: None,
            color: BASE_COLOR,
            positions: (0..points.len()).collect(),
        }],
        Some((column, colors)) => {
            let ci = dataset.require_column(column)?;
            let mut groups: Vec<(CellValue, PointGroup)> = Vec::new();
            for (pos, &row) in view.row_indices().iter().enumerate() {
                let Some(value) = dataset.row(row).map(|cells| &cells[ci]) else {
                    continue;
                };
                match groups.iter_mut().find(|(v, _)| v == value) {
                    Some((_, group)) => group.positions.push(pos),
                    None => groups.push((
                        value.clone(),
                        PointGroup {
                            label: Some(value.to_string()),
                            color: colors.color_for(value),
                            positions: vec![pos],
                        },
                    )),
                }
            }
            groups.into_iter().map(|(_, g)| g).collect()
        }
    };

    Ok(ChartSpec {
        title: chart_title(x_column, y_column),
        x_label: x_column.to_string(),
        y_label: y_column.to_string(),
        points,
        marker_size,
        groups,
    })
}

// ---------------------------------------------------------------------------
// Selection geometry
// ---------------------------------------------------------------------------

/// Positions of the finite points inside the rectangle spanned by `a`, `b`.
pub fn points_in_rect(points: &[[f64; 2]], a: [f64; 2], b: [f64; 2]) -> Vec<usize> {
    let (x0, x1) = (a[0].min(b[0]), a[0].max(b[0]));
    let (y0, y1) = (a[1].min(b[1]), a[1].max(b[1]));
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| p[0] >= x0 && p[0] <= x1 && p[1] >= y0 && p[1] <= y1)
        .map(|(i, _)| i)
        .collect()
}

/// The point closest to `pointer` in screen space, if within `max_dist`.
pub fn nearest_point(
    points: &[[f64; 2]],
    pointer: Pos2,
    to_screen: impl Fn([f64; 2]) -> Pos2,
    max_dist: f32,
) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| p[0].is_finite() && p[1].is_finite())
        .map(|(i, p)| (i, to_screen(*p).distance(pointer)))
        .filter(|(_, d)| *d <= max_dist)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Ascending, de-duplicated union of `current` and `picked`; with `toggle`,
/// a single picked point already selected is removed instead.
pub fn merge_selection(current: &[usize], picked: &[usize], toggle: bool) -> Vec<usize> {
    let mut out: Vec<usize> = current.to_vec();
    if toggle && picked.len() == 1 && current.contains(&picked[0]) {
        out.retain(|&i| i != picked[0]);
        return out;
    }
    out.extend_from_slice(picked);
    out.sort_unstable();
    out.dedup();
    out
}

/// Point positions the user selected in the chart, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionEvent {
    pub point_indices: Vec<usize>,
}

/// Screen rectangle spanned by a drag that started at plot value `origin` and
/// is now at screen position `pointer`.
pub fn selection_rect(
    origin: PlotPoint,
    pointer: Pos2,
    to_screen: impl Fn(PlotPoint) -> Pos2,
) -> Rect {
    Rect::from_two_pos(to_screen(origin), pointer)
}

/// Drag state carried between frames.
#[derive(Debug, Default)]
pub struct ChartInteraction {
    drag_origin: Option<PlotPoint>,
}

// ---------------------------------------------------------------------------
// Scatter plot widget
// ---------------------------------------------------------------------------

/// Draw the scatter plot.  Click picks the nearest point, shift-click adds or
/// removes one, dragging a box selects everything inside it, clicking empty
/// space clears.  Returns the new selection when it changed.
pub fn scatter_chart(
    ui: &mut Ui,
    spec: &ChartSpec,
    selection: &[usize],
    interaction: &mut ChartInteraction,
    height: f32,
) -> Option<SelectionEvent> {
    ui.vertical_centered(|ui: &mut Ui| {
        ui.strong(&spec.title);
    });

    let radius = spec.marker_size / 2.0;
    let shown_groups = spec.groups.iter().filter(|g| g.label.is_some()).count();

    let mut plot = Plot::new("scatter_chart")
        .height(height)
        .x_axis_label(spec.x_label.clone())
        .y_axis_label(spec.y_label.clone())
        .allow_drag(false)
        .allow_boxed_zoom(false)
        .allow_scroll(true)
        .allow_zoom(true);
    if shown_groups > 0 {
        plot = plot.legend(Legend::default());
    }

    let response = plot.show(ui, |plot_ui| {
        for group in &spec.groups {
            let series: PlotPoints = group
                .positions
                .iter()
                .filter_map(|&pos| spec.points.get(pos).copied())
                .filter(|p| p[0].is_finite() && p[1].is_finite())
                .collect();
            let mut points = Points::new(series)
                .shape(MarkerShape::Circle)
                .filled(true)
                .radius(radius)
                .color(group.color);
            if let Some(label) = &group.label {
                points = points.name(label);
            }
            plot_ui.points(points);
        }

        if !selection.is_empty() {
            let picked: PlotPoints = selection
                .iter()
                .filter_map(|&pos| spec.points.get(pos).copied())
                .filter(|p| p[0].is_finite() && p[1].is_finite())
                .collect();
            plot_ui.points(
                Points::new(picked)
                    .shape(MarkerShape::Circle)
                    .filled(true)
                    .radius(radius + 1.0)
                    .color(SELECTED_COLOR),
            );
        }
    });

    let shift = ui.input(|i| i.modifiers.shift);
    let transform = response.transform;
    let resp = &response.response;

    // Rubber band: screen-space overlay, not a plot item.
    if let (Some(origin), Some(pointer)) = (interaction.drag_origin, resp.interact_pointer_pos()) {
        let band = selection_rect(origin, pointer, |p| transform.position_from_point(&p));
        let painter = ui.painter_at(resp.rect);
        painter.rect_filled(band, 0.0, SELECTED_COLOR.gamma_multiply(0.15));
        painter.rect_stroke(band, 0.0, Stroke::new(1.0, SELECTED_COLOR), StrokeKind::Inside);
    }

    if resp.drag_started() {
        interaction.drag_origin = resp
            .interact_pointer_pos()
            .map(|pos| transform.value_from_position(pos));
        return None;
    }

    if resp.drag_stopped() {
        let origin = interaction.drag_origin.take()?;
        let end = resp
            .interact_pointer_pos()
            .or_else(|| resp.hover_pos())
            .map(|pos| transform.value_from_position(pos))?;
        let boxed = points_in_rect(&spec.points, [origin.x, origin.y], [end.x, end.y]);
        let next = if shift {
            merge_selection(selection, &boxed, false)
        } else {
            boxed
        };
        log::debug!("box selection: {} points", next.len());
        return Some(SelectionEvent {
            point_indices: next,
        });
    }

    if resp.clicked() {
        let pointer = resp.interact_pointer_pos()?;
        let hit = nearest_point(
            &spec.points,
            pointer,
            |p| transform.position_from_point(&PlotPoint::new(p[0], p[1])),
            radius + PICK_SLACK,
        );
        let next = match (hit, shift) {
            (Some(i), true) => merge_selection(selection, &[i], true),
            (Some(i), false) => vec![i],
            (None, true) => selection.to_vec(),
            (None, false) => Vec::new(),
        };
        if next.as_slice() != selection {
            log::debug!("click selection: {next:?}");
            return Some(SelectionEvent {
                point_indices: next,
            });
        }
    }

    None
}
