//! # jetton-contracts
//!
//! The jetton (fungible token) ledger: a minter contract tracking total
//! supply and admin rights, and one wallet contract per owner tracking
//! a balance. The two coordinate only through asynchronous, bounceable
//! messages; there is no shared state and no cross-account transaction.
//!
//! ## Model
//!
//! Each contract is a state machine processing one [`IncomingMessage`]
//! at a time, to completion, and returning the [`OutgoingMessage`]s for
//! the host to route. An error return means the message aborted with no
//! state change and its value bounces back to the sender.
//!
//! Cross-account atomicity is compensation, not commitment: a wallet
//! debits (and the minter raises supply) before knowing the counterpart
//! accepted, and restores the exact amount when the host bounces the
//! message back. In between, "total supply equals the sum of balances"
//! holds only up to the amounts in flight.
//!
//! Trust between accounts is address-as-capability: wallet addresses
//! are a pure function of (owner, minter, wallet code), so any inbound
//! claim of sibling identity is checked by re-deriving the address and
//! comparing it to the actual sender. The minter mints by sending the
//! very same `internal_transfer` a sibling would; the receiving wallet
//! has no separate mint path.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use jetton_cell::{CellBuilder, MsgAddress};
//! use jetton_contracts::{
//!     IncomingMessage, InternalTransfer, JettonMinter, Mint, TokenContent,
//! };
//! use jetton_fees::FeePolicy;
//!
//! let admin = MsgAddress::internal(0, [0xAD; 32]);
//! let mut wallet_code = CellBuilder::new();
//! wallet_code.store_u32(0xC0DE).unwrap();
//! let wallet_code = Arc::new(wallet_code.build().unwrap());
//!
//! let mut minter = JettonMinter::new(
//!     MsgAddress::internal(0, [0xEE; 32]),
//!     admin.clone(),
//!     Arc::new(TokenContent::offchain("https://example.com/j.json").to_cell().unwrap()),
//!     wallet_code.clone(),
//!     wallet_code,
//!     FeePolicy::default(),
//! );
//!
//! let credit = InternalTransfer {
//!     query_id: 1,
//!     amount: 1_000_000_000,
//!     from: MsgAddress::Null,
//!     response_destination: MsgAddress::Null,
//!     forward_ton_amount: 0,
//!     forward_payload: jetton_contracts::ForwardPayload::none(),
//! };
//! let mint = Mint {
//!     query_id: 1,
//!     destination: MsgAddress::internal(0, [0x01; 32]),
//!     total_ton_amount: 100_000_000,
//!     master_msg: Arc::new(credit.to_cell().unwrap()),
//! };
//!
//! let msg = IncomingMessage::new(admin, 1_000_000_000, Arc::new(mint.to_cell().unwrap()));
//! let outgoing = minter.handle(&msg).unwrap();
//! assert_eq!(minter.total_supply(), 1_000_000_000);
//! assert_eq!(outgoing.len(), 1);
//! ```

pub mod envelope;
pub mod error;
pub mod metadata;
pub mod minter;
pub mod ops;
pub mod state_init;
pub mod wallet;

pub use envelope::{IncomingMessage, OutgoingMessage, SendMode};
pub use error::{LedgerError, LedgerResult};
pub use metadata::TokenContent;
pub use minter::{AdminState, JettonMinter};
pub use ops::{
    opcodes, BouncedBody, Burn, BurnNotification, CallTo, ChangeAdmin, ClaimAdmin, DropAdmin,
    Excesses, ForwardPayload, InternalTransfer, Mint, ProvideWalletAddress, TakeWalletAddress,
    TopUp, Transfer, TransferNotification, Upgrade, BOUNCE_TAG,
};
pub use state_init::{derive_wallet_address, wallet_state_init, StateInit, BASECHAIN};
pub use wallet::JettonWallet;
