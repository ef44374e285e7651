use super::layout::GridLayout;
use super::CellCoord;
use eframe::egui::{Pos2, Vec2};

/// Pointer travel before a press on an icon turns into a drag.
pub const DRAG_THRESHOLD: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Pressed { cell: CellCoord, origin: Pos2 },
    Dragging { cell: CellCoord, grab: Vec2, current: Pos2 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    None,
    Click(CellCoord),
    Drop { from: CellCoord, to: CellCoord },
    /// Released outside any visible cell, or back on the source cell.
    DropCancelled(CellCoord),
}

/// Toolkit-independent press/drag/release tracking over grid coordinates.
/// Points are relative to the grid origin.
#[derive(Debug, Clone)]
pub struct PointerTracker {
    phase: Phase,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self { phase: Phase::Idle }
    }
}

impl PointerTracker {
    pub fn on_pointer_down(
        &mut self,
        layout: &GridLayout,
        point: Pos2,
        occupied: impl Fn(CellCoord) -> bool,
    ) {
        self.phase = match layout.hit_test(point) {
            Some(cell) if occupied(cell) => Phase::Pressed {
                cell,
                origin: point,
            },
            _ => Phase::Idle,
        };
    }

    pub fn on_pointer_move(&mut self, layout: &GridLayout, point: Pos2) {
        match self.phase {
            Phase::Pressed { cell, origin } if point.distance(origin) > DRAG_THRESHOLD => {
                let grab = origin - layout.cell_origin(cell);
                self.phase = Phase::Dragging {
                    cell,
                    grab,
                    current: point,
                };
            }
            Phase::Dragging { cell, grab, .. } => {
                self.phase = Phase::Dragging {
                    cell,
                    grab,
                    current: point,
                };
            }
            _ => {}
        }
    }

    pub fn on_pointer_up(&mut self, layout: &GridLayout, point: Pos2) -> PointerOutcome {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        match phase {
            Phase::Idle => PointerOutcome::None,
            Phase::Pressed { cell, .. } => PointerOutcome::Click(cell),
            Phase::Dragging { cell, .. } => match layout.hit_test(point) {
                Some(to) if to != cell => PointerOutcome::Drop { from: cell, to },
                _ => PointerOutcome::DropCancelled(cell),
            },
        }
    }

    pub fn cancel(&mut self) {
        self.phase = Phase::Idle;
    }

    /// The dragged cell and where its icon's top-left currently sits.
    pub fn drag_preview(&self) -> Option<(CellCoord, Pos2)> {
        match self.phase {
            Phase::Dragging {
                cell,
                grab,
                current,
            } => Some((cell, current - grab)),
            _ => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, Phase::Dragging { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::vec2;

    fn layout() -> GridLayout {
        let mut layout = GridLayout::new(100, 10, 10);
        layout.resize(vec2(2000.0, 2000.0));
        layout
    }

    fn center(layout: &GridLayout, cell: CellCoord) -> Pos2 {
        layout.cell_origin(cell) + vec2(50.0, 50.0)
    }

    #[test]
    fn small_motion_is_a_click() {
        let layout = layout();
        let cell = CellCoord::new(1, 2);
        let mut tracker = PointerTracker::default();
        tracker.on_pointer_down(&layout, center(&layout, cell), |_| true);
        tracker.on_pointer_move(&layout, center(&layout, cell) + vec2(3.0, 0.0));
        assert!(!tracker.is_dragging());
        assert_eq!(
            tracker.on_pointer_up(&layout, center(&layout, cell)),
            PointerOutcome::Click(cell)
        );
    }

    #[test]
    fn drag_onto_other_cell_drops() {
        let layout = layout();
        let from = CellCoord::new(0, 0);
        let to = CellCoord::new(2, 3);
        let mut tracker = PointerTracker::default();
        tracker.on_pointer_down(&layout, center(&layout, from), |_| true);
        tracker.on_pointer_move(&layout, center(&layout, to));
        let (dragged, top_left) = tracker.drag_preview().expect("dragging");
        assert_eq!(dragged, from);
        assert_eq!(top_left, layout.cell_origin(to));
        assert_eq!(
            tracker.on_pointer_up(&layout, center(&layout, to)),
            PointerOutcome::Drop { from, to }
        );
        assert!(tracker.drag_preview().is_none());
    }

    #[test]
    fn empty_cells_do_not_start_drags() {
        let layout = layout();
        let mut tracker = PointerTracker::default();
        tracker.on_pointer_down(&layout, center(&layout, CellCoord::new(0, 0)), |_| false);
        tracker.on_pointer_move(&layout, center(&layout, CellCoord::new(3, 3)));
        assert_eq!(
            tracker.on_pointer_up(&layout, center(&layout, CellCoord::new(3, 3))),
            PointerOutcome::None
        );
    }

    #[test]
    fn release_back_home_cancels() {
        let layout = layout();
        let from = CellCoord::new(1, 1);
        let mut tracker = PointerTracker::default();
        tracker.on_pointer_down(&layout, center(&layout, from), |_| true);
        tracker.on_pointer_move(&layout, center(&layout, from) + vec2(30.0, 0.0));
        assert_eq!(
            tracker.on_pointer_up(&layout, center(&layout, from)),
            PointerOutcome::DropCancelled(from)
        );
    }
}
