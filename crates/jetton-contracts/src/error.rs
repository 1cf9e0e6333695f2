//! Error types for ledger operations.
//!
//! Every variant corresponds to a whole-message abort: the handler that
//! returns one of these has made no state change, and the host bounces
//! the attached value back to the sender. `exit_code` reports the code
//! the aborted transaction would carry on chain.

use jetton_cell::{CellError, MsgAddress};
use thiserror::Error;

/// Errors that abort a ledger message handler.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Sender does not hold the role the operation requires.
    #[error("unauthorized: sender is not the {role}")]
    Unauthorized {
        /// Required role: "owner", "admin" or "pending admin".
        role: &'static str,
    },

    /// Sender claims a sibling-wallet identity that does not derive to
    /// its actual address.
    #[error("untrusted sender {sender}: not the wallet of {claimed_owner}")]
    UntrustedSender {
        /// Owner the message claims to act for.
        claimed_owner: MsgAddress,
        /// Actual sender of the message.
        sender: MsgAddress,
    },

    /// Debit larger than the wallet balance.
    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: u128, required: u128 },

    /// Burn larger than the recorded total supply.
    #[error("insufficient supply: have {supply}, burning {burned}")]
    InsufficientSupply { supply: u128, burned: u128 },

    /// Attached value cannot cover forwarding plus gas.
    #[error("insufficient attached value: have {attached}, need more than {required}")]
    InsufficientValue { attached: u128, required: u128 },

    /// Attached value cannot cover the discovery reply.
    #[error("discovery fee not matched: have {attached}, need more than {required}")]
    DiscoveryFeeNotMatched { attached: u128, required: u128 },

    /// Message body violates the wire layout contract.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Message body ran out of bits or references mid-parse.
    #[error("cell underflow: {0}")]
    CellUnderflow(#[from] CellError),

    /// Destination outside the ledger's supported workchain.
    #[error("destination outside supported workchain: {destination}")]
    WrongWorkchain { destination: MsgAddress },

    /// A recognized wrapper carries an inner operation it cannot carry.
    #[error("invalid inner operation: 0x{op:08x}")]
    InvalidOperation { op: u32 },

    /// The 32-bit op code is not part of the protocol.
    #[error("unknown operation: 0x{op:08x}")]
    UnknownOperation { op: u32 },
}

impl LedgerError {
    /// TVM exit code of the aborted transaction.
    pub fn exit_code(&self) -> u32 {
        match self {
            LedgerError::InvalidOperation { .. } => 72,
            LedgerError::Unauthorized { .. } => 73,
            LedgerError::UntrustedSender { .. } => 74,
            LedgerError::DiscoveryFeeNotMatched { .. } => 75,
            LedgerError::InsufficientBalance { .. } => 47,
            LedgerError::InsufficientSupply { .. } => 47,
            LedgerError::InsufficientValue { .. } => 48,
            LedgerError::Malformed(_) => 49,
            LedgerError::CellUnderflow(_) => 9,
            LedgerError::WrongWorkchain { .. } => 333,
            LedgerError::UnknownOperation { .. } => 0xffff,
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
