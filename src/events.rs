use crate::grid::CellCoord;
use crate::icon_gen::{GenerateRequest, IconCandidate};

#[derive(Debug)]
pub enum UserEvent {
    Show,
    Hide,
    Quit,
    IconsGenerated(IconResult),
}

/// Work item for the icon worker. `ticket` ties the answer back to the
/// editor session that asked for it.
#[derive(Debug, Clone)]
pub struct IconRequest {
    pub ticket: u64,
    pub request: GenerateRequest,
}

#[derive(Debug)]
pub struct IconResult {
    pub ticket: u64,
    pub cell: CellCoord,
    pub candidates: Vec<IconCandidate>,
}
