//! Cell codec for the jetton ledger.
//!
//! Every message body and every persisted contract record in this
//! workspace is a tree of cells. A cell holds up to 1023 bits of
//! big-endian bit-packed data and up to 4 references to other cells,
//! forming a DAG. The representation hash of a cell identifies its whole
//! subtree and is what account addresses are derived from, so field
//! order inside a cell is part of the compatibility contract.
//!
//! # Example
//!
//! ```
//! use jetton_cell::{CellBuilder, CellSlice};
//!
//! let mut builder = CellBuilder::new();
//! builder.store_u32(0x0f8a7ea5).unwrap();
//! builder.store_coins(1_000_000_000).unwrap();
//! let cell = builder.build().unwrap();
//!
//! let mut slice = CellSlice::new(&cell);
//! assert_eq!(slice.load_u32().unwrap(), 0x0f8a7ea5);
//! assert_eq!(slice.load_coins().unwrap(), 1_000_000_000);
//! ```

use sha2::{Digest, Sha256};
use thiserror::Error;

mod address;
mod builder;
mod cell;
mod slice;

pub use address::MsgAddress;
pub use builder::CellBuilder;
pub use cell::Cell;
pub use slice::CellSlice;

/// Errors that can occur during cell operations.
#[derive(Debug, Error)]
pub enum CellError {
    /// The cell data exceeds the maximum of 1023 bits.
    #[error("cell data overflow: {0} bits (max 1023)")]
    DataOverflow(usize),

    /// The cell has too many references (max 4).
    #[error("too many cell references: {0} (max 4)")]
    TooManyRefs(usize),

    /// Not enough bits left in the slice.
    #[error("not enough bits: need {need}, have {have}")]
    NotEnoughBits { need: usize, have: usize },

    /// Not enough references left in the slice.
    #[error("not enough refs: need {need}, have {have}")]
    NotEnoughRefs { need: usize, have: usize },

    /// Integer width outside the supported 0..=64 bit range.
    #[error("invalid bit width: {0}")]
    InvalidBitWidth(usize),

    /// Value does not fit the requested encoding.
    #[error("value out of range: {0}")]
    ValueOutOfRange(String),

    /// Invalid address format.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid base64 encoding.
    #[error("invalid base64: {0}")]
    InvalidBase64(String),
}

/// Result type for cell operations.
pub type CellResult<T> = Result<T, CellError>;

/// Maximum number of data bits in a cell.
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references a cell can have.
pub const MAX_CELL_REFS: usize = 4;

/// Compute SHA256 over the input.
fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
