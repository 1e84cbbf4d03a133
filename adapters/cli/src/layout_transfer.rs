use std::{error::Error, fmt};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use egg_merge_core::{CellId, TokenKind};
use egg_merge_world::{query, Board};
use serde::{Deserialize, Serialize};

const SNAPSHOT_DOMAIN: &str = "egg";
const SNAPSHOT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded snapshot payload.
const SNAPSHOT_HEADER: &str = "egg:v1";
/// Delimiter used to separate the prefix, board dimensions and payload.
const FIELD_DELIMITER: char = ':';

/// Tokens on the board together with the board shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct BoardSnapshot {
    pub(crate) columns: u32,
    pub(crate) rows: u32,
    pub(crate) tokens: Vec<SnapshotToken>,
}

/// One occupied cell captured by a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SnapshotToken {
    pub(crate) cell: CellId,
    pub(crate) kind: TokenKind,
}

#[derive(Serialize, Deserialize)]
struct SerializableSnapshot {
    tokens: Vec<SnapshotToken>,
}

impl BoardSnapshot {
    /// Captures the occupied cells of a board.
    pub(crate) fn from_board(board: &Board) -> Self {
        let grid = query::grid(board);
        Self {
            columns: grid.columns(),
            rows: grid.rows(),
            tokens: query::tokens(board)
                .into_iter()
                .map(|(cell, kind)| SnapshotToken { cell, kind })
                .collect(),
        }
    }

    /// Cell/kind pairs ready to be laid out on a board.
    pub(crate) fn placements(&self) -> Vec<(CellId, TokenKind)> {
        self.tokens
            .iter()
            .map(|token| (token.cell, token.kind))
            .collect()
    }

    /// Encodes the snapshot into a single-line string suitable for clipboard transfer.
    pub(crate) fn encode(&self) -> Result<String, LayoutTransferError> {
        let payload = SerializableSnapshot {
            tokens: self.tokens.clone(),
        };
        let json =
            serde_json::to_vec(&payload).map_err(LayoutTransferError::InvalidPayload)?;
        let encoded = STANDARD_NO_PAD.encode(json);
        Ok(format!(
            "{SNAPSHOT_HEADER}:{}x{}:{encoded}",
            self.columns, self.rows
        ))
    }

    /// Decodes a snapshot from the provided string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, LayoutTransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(LayoutTransferError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(LayoutTransferError::MissingPrefix)?;
        let version = parts.next().ok_or(LayoutTransferError::MissingVersion)?;
        let dimensions = parts.next().ok_or(LayoutTransferError::MissingDimensions)?;
        let payload = parts.next().ok_or(LayoutTransferError::MissingPayload)?;

        if domain != SNAPSHOT_DOMAIN {
            return Err(LayoutTransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != SNAPSHOT_VERSION {
            return Err(LayoutTransferError::UnsupportedVersion(version.to_owned()));
        }

        let (columns, rows) = parse_dimensions(dimensions)?;
        let bytes = STANDARD_NO_PAD
            .decode(payload.as_bytes())
            .map_err(LayoutTransferError::InvalidEncoding)?;
        let decoded: SerializableSnapshot =
            serde_json::from_slice(&bytes).map_err(LayoutTransferError::InvalidPayload)?;

        let cell_count = columns.saturating_mul(rows);
        for token in &decoded.tokens {
            if token.cell.get() >= cell_count {
                return Err(LayoutTransferError::CellOutOfRange(token.cell.get()));
            }
        }

        Ok(Self {
            columns,
            rows,
            tokens: decoded.tokens,
        })
    }
}

/// Errors that can occur while encoding or decoding layout transfer strings.
#[derive(Debug)]
pub(crate) enum LayoutTransferError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing from the encoded snapshot.
    MissingPrefix,
    /// The encoded snapshot did not contain a version segment.
    MissingVersion,
    /// The encoded snapshot did not include board dimensions.
    MissingDimensions,
    /// The encoded snapshot did not include the payload segment.
    MissingPayload,
    /// The encoded snapshot used an unexpected prefix segment.
    InvalidPrefix(String),
    /// The encoded snapshot used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The board dimensions could not be parsed from the encoded snapshot.
    InvalidDimensions(String),
    /// A token references a cell outside the declared board.
    CellOutOfRange(u32),
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The payload could not be (de)serialised.
    InvalidPayload(serde_json::Error),
}

impl fmt::Display for LayoutTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "layout string was empty"),
            Self::MissingPrefix => write!(f, "layout string is missing the prefix"),
            Self::MissingVersion => write!(f, "layout string is missing the version"),
            Self::MissingDimensions => write!(f, "layout string is missing the board dimensions"),
            Self::MissingPayload => write!(f, "layout string is missing the payload"),
            Self::InvalidPrefix(prefix) => write!(f, "layout prefix '{prefix}' is not supported"),
            Self::UnsupportedVersion(version) => {
                write!(f, "layout version '{version}' is not supported")
            }
            Self::InvalidDimensions(dimensions) => {
                write!(f, "could not parse board dimensions '{dimensions}'")
            }
            Self::CellOutOfRange(cell) => {
                write!(f, "layout places a token on cell {cell}, outside the board")
            }
            Self::InvalidEncoding(error) => {
                write!(f, "could not decode layout payload: {error}")
            }
            Self::InvalidPayload(error) => {
                write!(f, "could not parse layout payload: {error}")
            }
        }
    }
}

impl Error for LayoutTransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            Self::InvalidPayload(error) => Some(error),
            _ => None,
        }
    }
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), LayoutTransferError> {
    let invalid = || LayoutTransferError::InvalidDimensions(dimensions.to_owned());
    let (columns, rows) = dimensions.split_once(['x', 'X']).ok_or_else(invalid)?;

    let columns = columns.trim().parse::<u32>().map_err(|_| invalid())?;
    let rows = rows.trim().parse::<u32>().map_err(|_| invalid())?;

    if columns == 0 || rows == 0 {
        return Err(invalid());
    }

    Ok((columns, rows))
}
