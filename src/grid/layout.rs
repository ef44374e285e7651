use super::CellCoord;
use eframe::egui::{pos2, vec2, Pos2, Rect, Vec2};

pub const TOP_PADDING: f32 = 30.0;
pub const LEFT_PADDING: f32 = 20.0;
/// Gap under each icon, which also holds the label.
pub const VERTICAL_PADDING: f32 = 30.0;
pub const HORIZONTAL_PADDING: f32 = 10.0;

/// Cell geometry plus the currently visible extent of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub icon_size: f32,
    pub max_rows: u32,
    pub max_cols: u32,
    visible_rows: u32,
    visible_cols: u32,
}

impl GridLayout {
    pub fn new(icon_size: u32, max_rows: u32, max_cols: u32) -> Self {
        Self {
            icon_size: icon_size as f32,
            max_rows,
            max_cols,
            visible_rows: 0,
            visible_cols: 0,
        }
    }

    pub fn pitch(&self) -> Vec2 {
        vec2(
            self.icon_size + HORIZONTAL_PADDING,
            self.icon_size + VERTICAL_PADDING,
        )
    }

    pub fn visible_rows(&self) -> u32 {
        self.visible_rows
    }

    pub fn visible_cols(&self) -> u32 {
        self.visible_cols
    }

    /// Rows and columns that fit in `viewport`, capped by the grid bounds.
    pub fn visible_extent(&self, viewport: Vec2) -> (u32, u32) {
        let pitch = self.pitch();
        let fit = |avail: f32, step: f32, cap: u32| -> u32 {
            if !avail.is_finite() || avail <= 0.0 || step <= 0.0 {
                return 0;
            }
            ((avail / step).floor() as u32).min(cap)
        };
        (
            fit(viewport.y - TOP_PADDING, pitch.y, self.max_rows),
            fit(viewport.x - LEFT_PADDING, pitch.x, self.max_cols),
        )
    }

    /// Returns true when the visible extent changed.
    pub fn resize(&mut self, viewport: Vec2) -> bool {
        let (rows, cols) = self.visible_extent(viewport);
        let changed = rows != self.visible_rows || cols != self.visible_cols;
        self.visible_rows = rows;
        self.visible_cols = cols;
        changed
    }

    pub fn in_bounds(&self, cell: CellCoord) -> bool {
        cell.row < self.max_rows && cell.col < self.max_cols
    }

    pub fn is_visible(&self, cell: CellCoord) -> bool {
        cell.row < self.visible_rows && cell.col < self.visible_cols
    }

    /// Top-left of the cell relative to the grid origin.
    pub fn cell_origin(&self, cell: CellCoord) -> Pos2 {
        let pitch = self.pitch();
        pos2(
            LEFT_PADDING + cell.col as f32 * pitch.x,
            TOP_PADDING + cell.row as f32 * pitch.y,
        )
    }

    pub fn icon_rect(&self, origin: Pos2, cell: CellCoord) -> Rect {
        Rect::from_min_size(
            origin + self.cell_origin(cell).to_vec2(),
            vec2(self.icon_size, self.icon_size),
        )
    }

    /// Icon plus label area.
    pub fn cell_rect(&self, origin: Pos2, cell: CellCoord) -> Rect {
        Rect::from_min_size(
            origin + self.cell_origin(cell).to_vec2(),
            vec2(self.icon_size, self.icon_size + VERTICAL_PADDING),
        )
    }

    /// Maps a point relative to the grid origin to a visible cell.
    pub fn hit_test(&self, point: Pos2) -> Option<CellCoord> {
        let x = point.x - LEFT_PADDING;
        let y = point.y - TOP_PADDING;
        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return None;
        }
        let pitch = self.pitch();
        let cell = CellCoord::new((y / pitch.y).floor() as u32, (x / pitch.x).floor() as u32);
        self.is_visible(cell).then_some(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport_for(layout: &GridLayout, rows: u32, cols: u32) -> Vec2 {
        let pitch = layout.pitch();
        vec2(
            LEFT_PADDING + cols as f32 * pitch.x,
            TOP_PADDING + rows as f32 * pitch.y,
        )
    }

    #[test]
    fn exact_fit_viewport_shows_exactly_n_by_m() {
        let mut layout = GridLayout::new(100, 20, 40);
        layout.resize(viewport_for(&layout, 3, 5));
        assert_eq!((layout.visible_rows(), layout.visible_cols()), (3, 5));
        assert!(layout.is_visible(CellCoord::new(2, 4)));
        assert!(!layout.is_visible(CellCoord::new(3, 5)));
        assert!(!layout.is_visible(CellCoord::new(3, 0)));
        assert!(!layout.is_visible(CellCoord::new(0, 5)));
    }

    #[test]
    fn visible_extent_is_capped_by_bounds() {
        let layout = GridLayout::new(64, 2, 3);
        assert_eq!(layout.visible_extent(vec2(4000.0, 4000.0)), (2, 3));
        assert_eq!(layout.visible_extent(vec2(10.0, 10.0)), (0, 0));
    }

    #[test]
    fn hit_test_matches_layout_and_rejects_hidden_cells() {
        let mut layout = GridLayout::new(100, 20, 40);
        layout.resize(viewport_for(&layout, 2, 2));

        let inside = layout.cell_origin(CellCoord::new(1, 1)) + vec2(5.0, 5.0);
        assert_eq!(layout.hit_test(inside), Some(CellCoord::new(1, 1)));

        let beyond = layout.cell_origin(CellCoord::new(2, 0)) + vec2(5.0, 5.0);
        assert_eq!(layout.hit_test(beyond), None);
        assert_eq!(layout.hit_test(pos2(1.0, 1.0)), None);
    }

    #[test]
    fn resize_reports_changes_only() {
        let mut layout = GridLayout::new(100, 20, 40);
        assert!(layout.resize(vec2(800.0, 600.0)));
        assert!(!layout.resize(vec2(801.0, 601.0)));
    }
}
