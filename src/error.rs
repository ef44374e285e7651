use crate::grid::CellCoord;
use std::path::PathBuf;
use thiserror::Error;

pub type DeskResult<T> = std::result::Result<T, DeskError>;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Swap(#[from] SwapError),
    #[error("cell {0} is outside the grid bounds")]
    OutOfBounds(CellCoord),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("a move involving cell {0} is already in progress")]
    Busy(CellCoord),
    #[error("cannot move cell {0} onto itself")]
    SameCell(CellCoord),
    #[error("no icon at cell {0}")]
    EmptySource(CellCoord),
    #[error("renaming {from} to {to} failed after {attempts} attempt(s): {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("cell {0} is open in a dialog or waiting for an icon")]
    Held(CellCoord),
    #[error("config could not be saved, folders were restored: {0}")]
    Commit(#[source] ConfigError),
}

/// Why a single icon strategy produced nothing. Logged, never surfaced.
#[derive(Debug, Error)]
pub enum IconGenError {
    #[error("{0} does not exist")]
    Missing(PathBuf),
    #[error("no icon found in {0}")]
    NoIcon(PathBuf),
    #[error("could not decode {0}")]
    Decode(String),
    #[error("could not write {0}")]
    Write(PathBuf),
    #[error("favicon request failed: {0}")]
    Fetch(String),
    #[error("{0} is not a usable website address")]
    BadUrl(String),
}
