//! Responsive grid layout for menu screens.
//!
//! A tablet-width viewport lays items out in a fixed-column grid; when the
//! last row is short it is padded with invisible placeholders so every real
//! cell keeps the same width.

/// Grid tuning knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    /// Columns on a tablet-class viewport.
    pub columns: usize,
    /// Columns on a phone-class viewport.
    pub phone_columns: usize,
    /// Minimum width (logical pixels) treated as tablet.
    pub tablet_min_width: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: 3,
            phone_columns: 2,
            tablet_min_width: 768.0,
        }
    }
}

/// Logical viewport dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_tablet(&self, config: &GridConfig) -> bool {
        self.width >= config.tablet_min_width
    }
}

/// One slot in the laid-out grid.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell<T> {
    Item(T),
    /// Invisible filler keeping the last row's cells at full column width.
    Placeholder,
}

impl<T> Cell<T> {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Cell::Placeholder)
    }
}

/// Items arranged row-major into `columns` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout<T> {
    pub columns: usize,
    pub cells: Vec<Cell<T>>,
}

impl<T> GridLayout<T> {
    pub fn rows(&self) -> usize {
        self.cells.len() / self.columns.max(1)
    }
}

/// Lay `items` out for the given viewport. Tablet widths use the full column
/// count; narrower viewports drop to the phone column count.
pub fn layout<T>(items: Vec<T>, viewport: Viewport, config: &GridConfig) -> GridLayout<T> {
    let columns = if viewport.is_tablet(config) {
        config.columns.max(1)
    } else {
        config.phone_columns.max(1)
    };

    let mut cells: Vec<Cell<T>> = items.into_iter().map(Cell::Item).collect();
    let padding = (columns - cells.len() % columns) % columns;
    for _ in 0..padding {
        cells.push(Cell::Placeholder);
    }

    GridLayout { columns, cells }
}

// ===========================================================================
// Tests
// ===========================================================================
