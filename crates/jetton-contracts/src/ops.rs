//! Wire protocol: op codes and typed message bodies.
//!
//! Every body starts with a 32-bit op code and a 64-bit query id that
//! responses echo verbatim. Amounts are `VarUInteger 16` coins,
//! addresses use the compact TL-B forms, and optional payloads are
//! either `Maybe ^Cell` (presence bit + reference) or `Either Cell
//! ^Cell` (inline remainder or a single referenced cell).
//!
//! Parsing is strict: a presence bit without its reference, a trailing
//! remainder where none is allowed, or an either-bit whose physical
//! encoding does not match is rejected before any state is touched.
//!
//! `parse` functions assume the dispatcher has already consumed the op
//! code; `to_cell` writes the complete body including it.

use std::sync::Arc;

use jetton_cell::{Cell, CellBuilder, CellResult, CellSlice, MsgAddress};

use crate::error::{LedgerError, LedgerResult};

/// Protocol op codes.
pub mod opcodes {
    /// Owner-initiated transfer out of a wallet.
    pub const TRANSFER: u32 = 0x0f8a7ea5;

    /// Wallet-to-wallet credit (also the shape a mint arrives in).
    pub const INTERNAL_TRANSFER: u32 = 0x178d4519;

    /// Notification to the receiving owner.
    pub const TRANSFER_NOTIFICATION: u32 = 0x7362d09c;

    /// Leftover value refund.
    pub const EXCESSES: u32 = 0xd53276db;

    /// Owner-initiated burn.
    pub const BURN: u32 = 0x595f07bc;

    /// Wallet-to-minter supply reduction.
    pub const BURN_NOTIFICATION: u32 = 0x7bdd97de;

    /// Wallet-address discovery request.
    pub const PROVIDE_WALLET_ADDRESS: u32 = 0x2c76b973;

    /// Wallet-address discovery response.
    pub const TAKE_WALLET_ADDRESS: u32 = 0xd1735400;

    /// Admin-initiated supply increase.
    pub const MINT: u32 = 0x642b7d07;

    /// First phase of the admin handoff.
    pub const CHANGE_ADMIN: u32 = 0x6501f354;

    /// Second phase of the admin handoff.
    pub const CLAIM_ADMIN: u32 = 0xfb88e119;

    /// Irreversible admin removal.
    pub const DROP_ADMIN: u32 = 0x7431f221;

    /// Admin wrapper forwarding a call to a wallet.
    pub const CALL_TO: u32 = 0x235caf52;

    /// Minter code/data replacement.
    pub const UPGRADE: u32 = 0x2508d66a;

    /// Value deposit with no other effect.
    pub const TOP_UP: u32 = 0xd372158c;
}

/// Prefix the host puts on a bounced body.
pub const BOUNCE_TAG: u32 = 0xffffffff;

/// An `Either Cell ^Cell` payload.
///
/// The either-bit selects the physical form: 0 means the payload is the
/// inline remainder of the body (possibly empty), 1 means it sits in
/// exactly one referenced cell with nothing else left in the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardPayload {
    /// Inline remainder of the enclosing body.
    Inline(Arc<Cell>),
    /// A single referenced cell.
    Ref(Arc<Cell>),
}

impl ForwardPayload {
    /// The empty payload (inline, zero bits).
    pub fn none() -> Self {
        ForwardPayload::Inline(Arc::new(Cell::empty()))
    }

    /// A payload carried in its own cell.
    pub fn reference(cell: Arc<Cell>) -> Self {
        ForwardPayload::Ref(cell)
    }

    /// True when there is nothing to forward.
    pub fn is_empty(&self) -> bool {
        match self {
            ForwardPayload::Inline(cell) => cell.bit_len() == 0 && cell.reference_count() == 0,
            ForwardPayload::Ref(_) => false,
        }
    }

    fn write(&self, builder: &mut CellBuilder) -> CellResult<()> {
        match self {
            ForwardPayload::Inline(cell) => {
                builder.store_bit(false)?;
                builder.store_slice(&CellSlice::new(cell))?;
            }
            ForwardPayload::Ref(cell) => {
                builder.store_bit(true)?;
                builder.store_ref(cell.clone())?;
            }
        }
        Ok(())
    }

    /// Strict parse: consumes the rest of the body.
    fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        if slice.load_bit()? {
            // Referenced form: the bit and one reference must be all
            // that was left.
            if slice.bits_left() != 0 || slice.refs_left() != 1 {
                return Err(LedgerError::Malformed(format!(
                    "forward payload in ref must end the body, {} bits and {} refs left",
                    slice.bits_left(),
                    slice.refs_left()
                )));
            }
            Ok(ForwardPayload::Ref(slice.load_ref()?.clone()))
        } else {
            let mut remainder = CellBuilder::new();
            remainder.store_slice(slice)?;
            // Consume what was copied so the body reads as fully parsed.
            slice.skip_bits(slice.bits_left())?;
            while slice.refs_left() > 0 {
                slice.load_ref()?;
            }
            Ok(ForwardPayload::Inline(Arc::new(remainder.build()?)))
        }
    }
}

/// Reject trailing data after a fixed-layout body.
fn expect_done(slice: &CellSlice<'_>) -> LedgerResult<()> {
    if slice.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::Malformed(format!(
            "trailing data: {} bits, {} refs",
            slice.bits_left(),
            slice.refs_left()
        )))
    }
}

/// `transfer`: owner moves tokens to another owner's wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub query_id: u64,
    pub amount: u128,
    pub destination: MsgAddress,
    pub response_destination: MsgAddress,
    pub custom_payload: Option<Arc<Cell>>,
    pub forward_ton_amount: u128,
    pub forward_payload: ForwardPayload,
}

impl Transfer {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::TRANSFER)?;
        builder.store_u64(self.query_id)?;
        builder.store_coins(self.amount)?;
        builder.store_address(&self.destination)?;
        builder.store_address(&self.response_destination)?;
        builder.store_maybe_ref(self.custom_payload.clone())?;
        builder.store_coins(self.forward_ton_amount)?;
        self.forward_payload.write(&mut builder)?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        let amount = slice.load_coins()?;
        let destination = slice.load_address()?;
        let response_destination = slice.load_address()?;
        let custom_payload = slice.load_maybe_ref()?.cloned();
        let forward_ton_amount = slice.load_coins()?;
        let forward_payload = ForwardPayload::parse(slice)?;
        Ok(Self {
            query_id,
            amount,
            destination,
            response_destination,
            custom_payload,
            forward_ton_amount,
            forward_payload,
        })
    }
}

/// `internal_transfer`: credit from a sibling wallet (or the minter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalTransfer {
    pub query_id: u64,
    pub amount: u128,
    pub from: MsgAddress,
    pub response_destination: MsgAddress,
    pub forward_ton_amount: u128,
    pub forward_payload: ForwardPayload,
}

impl InternalTransfer {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::INTERNAL_TRANSFER)?;
        builder.store_u64(self.query_id)?;
        builder.store_coins(self.amount)?;
        builder.store_address(&self.from)?;
        builder.store_address(&self.response_destination)?;
        builder.store_coins(self.forward_ton_amount)?;
        self.forward_payload.write(&mut builder)?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        let amount = slice.load_coins()?;
        let from = slice.load_address()?;
        let response_destination = slice.load_address()?;
        let forward_ton_amount = slice.load_coins()?;
        let forward_payload = ForwardPayload::parse(slice)?;
        Ok(Self {
            query_id,
            amount,
            from,
            response_destination,
            forward_ton_amount,
            forward_payload,
        })
    }
}

/// `transfer_notification`: tells the receiving owner about a credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferNotification {
    pub query_id: u64,
    pub amount: u128,
    pub sender: MsgAddress,
    pub forward_payload: ForwardPayload,
}

impl TransferNotification {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::TRANSFER_NOTIFICATION)?;
        builder.store_u64(self.query_id)?;
        builder.store_coins(self.amount)?;
        builder.store_address(&self.sender)?;
        self.forward_payload.write(&mut builder)?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        let amount = slice.load_coins()?;
        let sender = slice.load_address()?;
        let forward_payload = ForwardPayload::parse(slice)?;
        Ok(Self {
            query_id,
            amount,
            sender,
            forward_payload,
        })
    }
}

/// `burn`: owner destroys part of its balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Burn {
    pub query_id: u64,
    pub amount: u128,
    pub response_destination: MsgAddress,
    pub custom_payload: Option<Arc<Cell>>,
}

impl Burn {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::BURN)?;
        builder.store_u64(self.query_id)?;
        builder.store_coins(self.amount)?;
        builder.store_address(&self.response_destination)?;
        builder.store_maybe_ref(self.custom_payload.clone())?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        let amount = slice.load_coins()?;
        let response_destination = slice.load_address()?;
        let custom_payload = slice.load_maybe_ref()?.cloned();
        expect_done(slice)?;
        Ok(Self {
            query_id,
            amount,
            response_destination,
            custom_payload,
        })
    }
}

/// `burn_notification`: wallet reports a burn to the minter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnNotification {
    pub query_id: u64,
    pub amount: u128,
    pub sender: MsgAddress,
    pub response_destination: MsgAddress,
}

impl BurnNotification {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::BURN_NOTIFICATION)?;
        builder.store_u64(self.query_id)?;
        builder.store_coins(self.amount)?;
        builder.store_address(&self.sender)?;
        builder.store_address(&self.response_destination)?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        let amount = slice.load_coins()?;
        let sender = slice.load_address()?;
        let response_destination = slice.load_address()?;
        expect_done(slice)?;
        Ok(Self {
            query_id,
            amount,
            sender,
            response_destination,
        })
    }
}

/// `excesses`: leftover value returned to the response destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Excesses {
    pub query_id: u64,
}

impl Excesses {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::EXCESSES)?;
        builder.store_u64(self.query_id)?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        Ok(Self { query_id })
    }
}

/// `mint`: admin orders a supply increase delivered to a wallet.
///
/// The embedded message must be `internal_transfer`-shaped; the minter
/// forwards it verbatim so the destination wallet cannot tell a mint
/// from a sibling transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mint {
    pub query_id: u64,
    pub destination: MsgAddress,
    pub total_ton_amount: u128,
    pub master_msg: Arc<Cell>,
}

impl Mint {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::MINT)?;
        builder.store_u64(self.query_id)?;
        builder.store_address(&self.destination)?;
        builder.store_coins(self.total_ton_amount)?;
        builder.store_ref(self.master_msg.clone())?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        let destination = slice.load_address()?;
        let total_ton_amount = slice.load_coins()?;
        let master_msg = slice.load_ref()?.clone();
        expect_done(slice)?;
        Ok(Self {
            query_id,
            destination,
            total_ton_amount,
            master_msg,
        })
    }
}

/// `change_admin`: first phase of the two-phase admin handoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeAdmin {
    pub query_id: u64,
    pub new_admin: MsgAddress,
}

impl ChangeAdmin {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::CHANGE_ADMIN)?;
        builder.store_u64(self.query_id)?;
        builder.store_address(&self.new_admin)?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        let new_admin = slice.load_address()?;
        expect_done(slice)?;
        Ok(Self { query_id, new_admin })
    }
}

/// `claim_admin`: candidate completes the handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimAdmin {
    pub query_id: u64,
}

impl ClaimAdmin {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::CLAIM_ADMIN)?;
        builder.store_u64(self.query_id)?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        expect_done(slice)?;
        Ok(Self { query_id })
    }
}

/// `drop_admin`: admin renounces control, irreversibly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropAdmin {
    pub query_id: u64,
}

impl DropAdmin {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::DROP_ADMIN)?;
        builder.store_u64(self.query_id)?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        expect_done(slice)?;
        Ok(Self { query_id })
    }
}

/// `top_up`: plain value deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopUp {
    pub query_id: u64,
}

impl TopUp {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::TOP_UP)?;
        builder.store_u64(self.query_id)?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        Ok(Self { query_id })
    }
}

/// `provide_wallet_address`: ask the minter for an owner's wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvideWalletAddress {
    pub query_id: u64,
    pub owner: MsgAddress,
    pub include_address: bool,
}

impl ProvideWalletAddress {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::PROVIDE_WALLET_ADDRESS)?;
        builder.store_u64(self.query_id)?;
        builder.store_address(&self.owner)?;
        builder.store_bit(self.include_address)?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        let owner = slice.load_address()?;
        let include_address = slice.load_bit()?;
        expect_done(slice)?;
        Ok(Self {
            query_id,
            owner,
            include_address,
        })
    }
}

/// `take_wallet_address`: discovery reply.
///
/// `wallet_address` is the null address when the queried owner lives
/// outside the ledger's workchain; the queried owner itself is echoed
/// back in a reference iff the request asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeWalletAddress {
    pub query_id: u64,
    pub wallet_address: MsgAddress,
    pub owner: Option<MsgAddress>,
}

impl TakeWalletAddress {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::TAKE_WALLET_ADDRESS)?;
        builder.store_u64(self.query_id)?;
        builder.store_address(&self.wallet_address)?;
        match &self.owner {
            Some(owner) => {
                let mut inner = CellBuilder::new();
                inner.store_address(owner)?;
                builder.store_maybe_ref(Some(Arc::new(inner.build()?)))?;
            }
            None => {
                builder.store_maybe_ref(None)?;
            }
        }
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        let wallet_address = slice.load_address()?;
        let owner = match slice.load_maybe_ref()? {
            Some(cell) => Some(CellSlice::new(cell).load_address()?),
            None => None,
        };
        expect_done(slice)?;
        Ok(Self {
            query_id,
            wallet_address,
            owner,
        })
    }
}

/// `call_to`: admin wrapper forwarding an inner message to a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTo {
    pub query_id: u64,
    pub target: MsgAddress,
    pub value: u128,
    pub message: Arc<Cell>,
}

impl CallTo {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::CALL_TO)?;
        builder.store_u64(self.query_id)?;
        builder.store_address(&self.target)?;
        builder.store_coins(self.value)?;
        builder.store_ref(self.message.clone())?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        let target = slice.load_address()?;
        let value = slice.load_coins()?;
        let message = slice.load_ref()?.clone();
        expect_done(slice)?;
        Ok(Self {
            query_id,
            target,
            value,
            message,
        })
    }
}

/// `upgrade`: replace the minter's code and data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upgrade {
    pub query_id: u64,
    pub new_data: Arc<Cell>,
    pub new_code: Arc<Cell>,
}

impl Upgrade {
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(opcodes::UPGRADE)?;
        builder.store_u64(self.query_id)?;
        builder.store_ref(self.new_data.clone())?;
        builder.store_ref(self.new_code.clone())?;
        builder.build()
    }

    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let query_id = slice.load_u64()?;
        let new_data = slice.load_ref()?.clone();
        let new_code = slice.load_ref()?.clone();
        expect_done(slice)?;
        Ok(Self {
            query_id,
            new_data,
            new_code,
        })
    }
}

/// The recoverable prefix of a bounced body.
///
/// The host truncates bounced bodies, but the op, query id and amount
/// always survive; that is exactly what the rollback handlers key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BouncedBody {
    pub op: u32,
    pub query_id: u64,
    pub amount: u128,
}

impl BouncedBody {
    pub fn parse(slice: &mut CellSlice<'_>) -> LedgerResult<Self> {
        let tag = slice.load_u32()?;
        if tag != BOUNCE_TAG {
            return Err(LedgerError::Malformed(format!(
                "bounced body must start with 0xffffffff, got 0x{tag:08x}"
            )));
        }
        let op = slice.load_u32()?;
        let query_id = slice.load_u64()?;
        let amount = slice.load_coins()?;
        Ok(Self {
            op,
            query_id,
            amount,
        })
    }
}
