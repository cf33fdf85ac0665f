use std::path::PathBuf;
use std::sync::Arc;

use crate::color::ColorMap;
use crate::config::{DEFAULT_MARKER_SIZE, MARKER_SIZE_RANGE};
use crate::data::filter::{
    FilteredView, apply_filter, distinct_values, filterable_columns, numeric_columns,
};
use crate::data::model::{CellValue, Dataset};
use crate::data::source::{DataSource, DatasetCache, DefaultFetcher, Fetcher};
use crate::ui::chart::{ChartSpec, build_chart};

// ---------------------------------------------------------------------------
// View state: every user input, explicit
// ---------------------------------------------------------------------------

/// All widget values.  `None` column choices fall back to the first option.
/// Every input change clears `selection`, which refers to the chart drawn
/// from the previous inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub x_column: Option<String>,
    pub y_column: Option<String>,
    pub filter_column: Option<String>,
    pub filter_values: Vec<CellValue>,
    pub marker_size: f32,
    pub color_by_filter: bool,
    /// Selected view positions, ascending.
    pub selection: Vec<usize>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::with_marker_size(DEFAULT_MARKER_SIZE)
    }
}

impl ViewState {
    pub fn with_marker_size(marker_size: f32) -> Self {
        Self {
            x_column: None,
            y_column: None,
            filter_column: None,
            filter_values: Vec::new(),
            marker_size: marker_size.clamp(*MARKER_SIZE_RANGE.start(), *MARKER_SIZE_RANGE.end()),
            color_by_filter: false,
            selection: Vec::new(),
        }
    }

    pub fn set_x_column(&mut self, column: String) {
        self.x_column = Some(column);
        self.selection.clear();
    }

    pub fn set_y_column(&mut self, column: String) {
        self.y_column = Some(column);
        self.selection.clear();
    }

    /// Switching the filter column drops values chosen for the old one.
    pub fn set_filter_column(&mut self, column: String) {
        if self.filter_column.as_deref() != Some(column.as_str()) {
            log::debug!("filter column -> {column}");
            self.filter_values.clear();
        }
        self.filter_column = Some(column);
        self.selection.clear();
    }

    pub fn toggle_filter_value(&mut self, value: &CellValue) {
        if let Some(pos) = self.filter_values.iter().position(|v| v == value) {
            self.filter_values.remove(pos);
        } else {
            self.filter_values.push(value.clone());
        }
        self.selection.clear();
    }

    pub fn select_all_values(&mut self, options: &[CellValue]) {
        self.filter_values = options.to_vec();
        self.selection.clear();
    }

    pub fn clear_filter_values(&mut self) {
        self.filter_values.clear();
        self.selection.clear();
    }

    pub fn set_marker_size(&mut self, size: f32) {
        self.marker_size = size.clamp(*MARKER_SIZE_RANGE.start(), *MARKER_SIZE_RANGE.end());
        self.selection.clear();
    }

    pub fn set_color_by_filter(&mut self, on: bool) {
        self.color_by_filter = on;
        self.selection.clear();
    }

    /// Replace the point selection (view positions).
    pub fn set_selection(&mut self, mut positions: Vec<usize>) {
        positions.sort_unstable();
        positions.dedup();
        self.selection = positions;
    }
}

// ---------------------------------------------------------------------------
// PageModel: everything the page shows, computed from (dataset, state)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PageModel {
    pub total_rows: usize,
    pub numeric_columns: Vec<String>,
    pub filterable_columns: Vec<String>,
    pub x_column: Option<String>,
    pub y_column: Option<String>,
    pub filter_column: String,
    /// Distinct values of the filter column, first-appearance order.
    pub filter_options: Vec<CellValue>,
    /// The chosen values that are still options.
    pub filter_values: Vec<CellValue>,
    pub filter_warning: Option<String>,
    pub view: FilteredView,
    /// `None` when the table has no numeric column.
    pub chart: Option<ChartSpec>,
    /// Selected view positions that exist in `view`, ascending.
    pub selection: Vec<usize>,
}

impl PageModel {
    /// Dataset rows backing the selected points, in selection order.
    pub fn selected_rows(&self) -> Vec<usize> {
        self.selection
            .iter()
            .filter_map(|&pos| self.view.dataset_row(pos))
            .collect()
    }

    /// Why the chart area has nothing to show, if it doesn't.
    pub fn empty_notice(&self) -> Option<&'static str> {
        if !self.view.is_empty() {
            None
        } else if self.total_rows == 0 {
            Some("The table has no rows.")
        } else {
            Some("No rows match the current filter.")
        }
    }
}

/// Compute the page for `state`.  Pure: called every frame, nothing cached
/// besides the dataset itself.
pub fn compose(dataset: &Dataset, state: &ViewState) -> PageModel {
    let numeric = numeric_columns(dataset);
    let filterable = filterable_columns();

    let pick = |chosen: &Option<String>| {
        chosen
            .as_ref()
            .filter(|c| numeric.contains(*c))
            .or_else(|| numeric.first())
            .cloned()
    };
    let x_column = pick(&state.x_column);
    let y_column = pick(&state.y_column);

    let filter_column = state
        .filter_column
        .clone()
        .filter(|c| filterable.contains(c))
        .unwrap_or_else(|| filterable[0].clone());

    let (filter_options, filter_warning) = match distinct_values(dataset, &filter_column) {
        Ok(values) => (values, None),
        Err(e) => {
            log::debug!("filter column unavailable: {e}");
            (Vec::new(), Some(e.to_string()))
        }
    };
    let filter_values: Vec<CellValue> = state
        .filter_values
        .iter()
        .filter(|v| filter_options.contains(*v))
        .cloned()
        .collect();

    let view = apply_filter(dataset, &filter_column, &filter_values)
        .unwrap_or_else(|_| FilteredView::all(dataset));

    let colors = (state.color_by_filter && filter_warning.is_none())
        .then(|| ColorMap::new(&filter_options));
    let chart = match (&x_column, &y_column) {
        (Some(x), Some(y)) => build_chart(
            dataset,
            &view,
            x,
            y,
            state.marker_size,
            colors.as_ref().map(|c| (filter_column.as_str(), c)),
        )
        .map_err(|e| log::debug!("cannot draw chart: {e}"))
        .ok(),
        _ => None,
    };

    let selection = state
        .selection
        .iter()
        .copied()
        .filter(|&pos| pos < view.len())
        .collect();

    PageModel {
        total_rows: dataset.len(),
        numeric_columns: numeric,
        filterable_columns: filterable,
        x_column,
        y_column,
        filter_column,
        filter_options,
        filter_values,
        filter_warning,
        view,
        chart,
        selection,
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The session: the dataset cache plus the view inputs.
pub struct AppState<F = DefaultFetcher> {
    pub cache: DatasetCache<F>,
    pub view: ViewState,
    /// Set when the last load failed.  Loading is not retried until the
    /// user reloads or opens another file.
    pub load_error: Option<String>,
}

impl AppState<DefaultFetcher> {
    pub fn new(source: DataSource, marker_size: f32) -> Self {
        Self::with_cache(DatasetCache::new(source), marker_size)
    }
}

impl<F: Fetcher> AppState<F> {
    pub fn with_cache(cache: DatasetCache<F>, marker_size: f32) -> Self {
        Self {
            cache,
            view: ViewState::with_marker_size(marker_size),
            load_error: None,
        }
    }

    /// The dataset, loading it on first use.  `None` after a failed load.
    pub fn dataset(&mut self) -> Option<Arc<Dataset>> {
        if self.load_error.is_some() {
            return None;
        }
        if !self.cache.is_loaded() {
            log::info!("loading dataset from {}", self.cache.source());
        }
        match self.cache.get_or_load() {
            Ok(ds) => Some(ds),
            Err(e) => {
                self.load_error = Some(format!("{e}"));
                None
            }
        }
    }

    /// Drop the cached dataset and read the same source again.
    pub fn reload(&mut self) {
        self.cache.invalidate();
        self.load_error = None;
        self.view.selection.clear();
    }

    /// Switch to a local file.  Column choices from the old table are reset.
    pub fn open_local(&mut self, path: PathBuf) {
        log::info!("switching data source to {}", path.display());
        self.cache.switch_source(DataSource::Local(path));
        self.load_error = None;
        self.view = ViewState::with_marker_size(self.view.marker_size);
    }
}
