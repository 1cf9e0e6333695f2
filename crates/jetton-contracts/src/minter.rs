//! The minter ledger: total supply and admin rights.
//!
//! The minter is the single account that may create supply. It records
//! the admin role as an explicit little state machine so that the
//! two-phase handoff and the irreversible drop cannot be shortcut:
//! `Active` → `PendingHandoff` → `Active`, or → `Dropped`, which no
//! operation leaves.

use std::sync::Arc;

use jetton_cell::{Cell, CellBuilder, CellResult, CellSlice, MsgAddress};
use jetton_fees::{collect_stats, FeePolicy};
use tracing::debug;

use crate::envelope::{IncomingMessage, OutgoingMessage, SendMode};
use crate::error::{LedgerError, LedgerResult};
use crate::ops::{
    opcodes, BouncedBody, Burn, BurnNotification, CallTo, ChangeAdmin, ClaimAdmin, DropAdmin,
    InternalTransfer, Mint, ProvideWalletAddress, TakeWalletAddress, TopUp, Transfer, Upgrade,
};
use crate::state_init::{derive_wallet_address, wallet_state_init, BASECHAIN};

/// The admin role over its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminState {
    /// One address holds the role.
    Active { admin: MsgAddress },
    /// A handoff is in flight: the current admin still holds the role,
    /// the candidate may claim it.
    PendingHandoff {
        admin: MsgAddress,
        candidate: MsgAddress,
    },
    /// The role was renounced. Terminal: minting and every admin
    /// operation stay unauthorized forever.
    Dropped,
}

impl AdminState {
    /// The current admin, if the role still exists.
    pub fn admin(&self) -> Option<&MsgAddress> {
        match self {
            AdminState::Active { admin } | AdminState::PendingHandoff { admin, .. } => Some(admin),
            AdminState::Dropped => None,
        }
    }

    /// The handoff candidate, if one is recorded.
    pub fn pending(&self) -> Option<&MsgAddress> {
        match self {
            AdminState::PendingHandoff { candidate, .. } => Some(candidate),
            _ => None,
        }
    }

    /// True once the role has been renounced.
    pub fn is_dropped(&self) -> bool {
        matches!(self, AdminState::Dropped)
    }
}

/// Supply and admin-rights state machine, one instance per ledger.
#[derive(Debug, Clone)]
pub struct JettonMinter {
    /// This minter's own account address; wallets reference it and the
    /// trust checks derive against it.
    address: MsgAddress,
    total_supply: u128,
    admin: AdminState,
    content: Arc<Cell>,
    wallet_code: Arc<Cell>,
    minter_code: Arc<Cell>,
    fees: FeePolicy,
}

impl JettonMinter {
    /// A fresh ledger with zero supply.
    pub fn new(
        address: MsgAddress,
        admin: MsgAddress,
        content: Arc<Cell>,
        wallet_code: Arc<Cell>,
        minter_code: Arc<Cell>,
        fees: FeePolicy,
    ) -> Self {
        let admin = match admin {
            MsgAddress::Null => AdminState::Dropped,
            admin => AdminState::Active { admin },
        };
        Self {
            address,
            total_supply: 0,
            admin,
            content,
            wallet_code,
            minter_code,
            fees,
        }
    }

    /// Restore a minter from its persisted record.
    pub fn from_data(
        address: MsgAddress,
        data: &Cell,
        minter_code: Arc<Cell>,
        fees: FeePolicy,
    ) -> LedgerResult<Self> {
        let (total_supply, admin, wallet_code, content) = parse_minter_data(data)?;
        Ok(Self {
            address,
            total_supply,
            admin,
            content,
            wallet_code,
            minter_code,
            fees,
        })
    }

    /// This minter's account address.
    pub fn address(&self) -> &MsgAddress {
        &self.address
    }

    /// Total supply across every wallet of this ledger (plus any amount
    /// still in flight toward one).
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// The admin role state.
    pub fn admin_state(&self) -> &AdminState {
        &self.admin
    }

    /// Current admin address, if any.
    pub fn admin(&self) -> Option<&MsgAddress> {
        self.admin.admin()
    }

    /// True while an admin exists to authorize minting.
    pub fn mintable(&self) -> bool {
        self.admin.admin().is_some()
    }

    /// Token metadata cell.
    pub fn content(&self) -> &Arc<Cell> {
        &self.content
    }

    /// Wallet code template new wallets deploy with.
    pub fn wallet_code(&self) -> &Arc<Cell> {
        &self.wallet_code
    }

    /// The minter's own code cell.
    pub fn code(&self) -> &Arc<Cell> {
        &self.minter_code
    }

    /// The persisted record:
    /// `supply:Coins admin:MsgAddress pending_admin:MsgAddress
    ///  wallet_code:^Cell content:^Cell`.
    pub fn data_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_coins(self.total_supply)?;
        builder.store_address(self.admin.admin().unwrap_or(&MsgAddress::Null))?;
        builder.store_address(self.admin.pending().unwrap_or(&MsgAddress::Null))?;
        builder.store_ref(self.wallet_code.clone())?;
        builder.store_ref(self.content.clone())?;
        builder.build()
    }

    /// Deterministic wallet address for `owner` under this ledger.
    pub fn wallet_address_of(&self, owner: &MsgAddress) -> CellResult<MsgAddress> {
        derive_wallet_address(owner, &self.address, &self.wallet_code)
    }

    /// Process one inbound message to completion.
    pub fn handle(&mut self, msg: &IncomingMessage) -> LedgerResult<Vec<OutgoingMessage>> {
        if msg.bounced {
            return self.on_bounce(msg);
        }

        let mut slice = CellSlice::new(&msg.body);
        let op = slice.load_u32()?;
        match op {
            opcodes::TOP_UP => {
                let _ = TopUp::parse(&mut slice)?;
                Ok(Vec::new())
            }
            opcodes::MINT => self.mint(msg, &mut slice),
            opcodes::BURN_NOTIFICATION => self.burn_notification(msg, &mut slice),
            opcodes::PROVIDE_WALLET_ADDRESS => self.provide_wallet_address(msg, &mut slice),
            opcodes::CHANGE_ADMIN => self.change_admin(msg, &mut slice),
            opcodes::CLAIM_ADMIN => self.claim_admin(msg, &mut slice),
            opcodes::DROP_ADMIN => self.drop_admin(msg, &mut slice),
            opcodes::CALL_TO => self.call_to(msg, &mut slice),
            opcodes::UPGRADE => self.upgrade(msg, &mut slice),
            op => Err(LedgerError::UnknownOperation { op }),
        }
    }

    fn require_admin(&self, sender: &MsgAddress) -> LedgerResult<MsgAddress> {
        match self.admin.admin() {
            Some(admin) if admin == sender => Ok(admin.clone()),
            _ => Err(LedgerError::Unauthorized { role: "admin" }),
        }
    }

    /// `mint`: raise the supply and push the embedded credit to the
    /// destination owner's wallet.
    ///
    /// The embedded message is forwarded verbatim, so the receiving
    /// wallet processes a mint through the same `internal_transfer`
    /// path as any sibling transfer.
    fn mint(
        &mut self,
        msg: &IncomingMessage,
        slice: &mut CellSlice<'_>,
    ) -> LedgerResult<Vec<OutgoingMessage>> {
        let mint = Mint::parse(slice)?;
        self.require_admin(&msg.source)?;

        if mint.destination.workchain() != Some(BASECHAIN) {
            return Err(LedgerError::WrongWorkchain {
                destination: mint.destination.clone(),
            });
        }

        let mut inner = CellSlice::new(&mint.master_msg);
        let inner_op = inner.load_u32()?;
        if inner_op != opcodes::INTERNAL_TRANSFER {
            return Err(LedgerError::InvalidOperation { op: inner_op });
        }
        let credit = InternalTransfer::parse(&mut inner)?;

        // The attached value funds the forwarded total; the forwarded
        // total in turn funds the wallet's credit handling.
        let required = mint
            .total_ton_amount
            .saturating_add(self.fees.gas_consumption);
        if msg.value <= required {
            return Err(LedgerError::InsufficientValue {
                attached: msg.value,
                required,
            });
        }
        let fwd_fee = self.fees.fwd.fwd_fee(collect_stats(&mint.master_msg));
        let forwarded_needs = credit
            .forward_ton_amount
            .saturating_add(2 * fwd_fee)
            .saturating_add(self.fees.gas_consumption);
        if mint.total_ton_amount <= forwarded_needs {
            return Err(LedgerError::InsufficientValue {
                attached: mint.total_ton_amount,
                required: forwarded_needs,
            });
        }

        self.total_supply = self.total_supply.saturating_add(credit.amount);
        debug!(
            amount = credit.amount,
            destination = %mint.destination,
            total_supply = self.total_supply,
            "mint accepted"
        );

        let destination_init =
            wallet_state_init(&mint.destination, &self.address, &self.wallet_code)?;
        let destination = destination_init.address(BASECHAIN)?;

        Ok(vec![OutgoingMessage::new(
            destination,
            mint.total_ton_amount,
            mint.master_msg.clone(),
        )
        .with_state_init(destination_init)])
    }

    /// `burn_notification`: a wallet reports a burn; shrink the supply.
    fn burn_notification(
        &mut self,
        msg: &IncomingMessage,
        slice: &mut CellSlice<'_>,
    ) -> LedgerResult<Vec<OutgoingMessage>> {
        let note = BurnNotification::parse(slice)?;

        let expected = self.wallet_address_of(&note.sender)?;
        if msg.source != expected {
            return Err(LedgerError::UntrustedSender {
                claimed_owner: note.sender.clone(),
                sender: msg.source.clone(),
            });
        }
        if note.amount > self.total_supply {
            return Err(LedgerError::InsufficientSupply {
                supply: self.total_supply,
                burned: note.amount,
            });
        }

        self.total_supply -= note.amount;
        debug!(
            amount = note.amount,
            owner = %note.sender,
            total_supply = self.total_supply,
            "burn recorded"
        );

        // This revision keeps the burned value in the minter; no excess
        // message goes back to the response destination.
        Ok(Vec::new())
    }

    /// `provide_wallet_address`: pure derivation, replied to the sender.
    fn provide_wallet_address(
        &mut self,
        msg: &IncomingMessage,
        slice: &mut CellSlice<'_>,
    ) -> LedgerResult<Vec<OutgoingMessage>> {
        let request = ProvideWalletAddress::parse(slice)?;

        let required = msg.fwd_fee.saturating_add(self.fees.provide_address_gas);
        if msg.value <= required {
            return Err(LedgerError::DiscoveryFeeNotMatched {
                attached: msg.value,
                required,
            });
        }

        // Foreign or malformed owners get the null-address sentinel but
        // are still echoed back when asked for.
        let wallet_address = if request.owner.workchain() == Some(BASECHAIN) {
            self.wallet_address_of(&request.owner)?
        } else {
            MsgAddress::Null
        };

        let reply = TakeWalletAddress {
            query_id: request.query_id,
            wallet_address,
            owner: request.include_address.then(|| request.owner.clone()),
        };

        Ok(vec![OutgoingMessage::new(
            msg.source.clone(),
            msg.value - self.fees.provide_address_gas,
            Arc::new(reply.to_cell()?),
        )
        .non_bounceable()
        .with_mode(SendMode::CarryRemainingValue)])
    }

    /// `change_admin`: record a handoff candidate. The role itself does
    /// not move yet.
    fn change_admin(
        &mut self,
        msg: &IncomingMessage,
        slice: &mut CellSlice<'_>,
    ) -> LedgerResult<Vec<OutgoingMessage>> {
        let change = ChangeAdmin::parse(slice)?;
        let admin = self.require_admin(&msg.source)?;

        debug!(candidate = %change.new_admin, "admin handoff started");
        self.admin = AdminState::PendingHandoff {
            admin,
            candidate: change.new_admin,
        };
        Ok(Vec::new())
    }

    /// `claim_admin`: only the recorded candidate may complete the
    /// handoff. Knowing the candidate address is not enough; the claim
    /// must come from it.
    fn claim_admin(
        &mut self,
        msg: &IncomingMessage,
        slice: &mut CellSlice<'_>,
    ) -> LedgerResult<Vec<OutgoingMessage>> {
        let _ = ClaimAdmin::parse(slice)?;

        let candidate = match &self.admin {
            AdminState::PendingHandoff { candidate, .. } if *candidate == msg.source => {
                candidate.clone()
            }
            _ => {
                return Err(LedgerError::Unauthorized {
                    role: "pending admin",
                })
            }
        };

        debug!(admin = %candidate, "admin handoff completed");
        self.admin = AdminState::Active { admin: candidate };
        Ok(Vec::new())
    }

    /// `drop_admin`: renounce the role. Terminal by construction: no
    /// admin address can ever match an absent one.
    fn drop_admin(
        &mut self,
        msg: &IncomingMessage,
        slice: &mut CellSlice<'_>,
    ) -> LedgerResult<Vec<OutgoingMessage>> {
        let _ = DropAdmin::parse(slice)?;
        self.require_admin(&msg.source)?;

        debug!("admin dropped");
        self.admin = AdminState::Dropped;
        Ok(Vec::new())
    }

    /// `call_to`: forward an inner `transfer` or `burn` to a wallet on
    /// the admin's behalf.
    ///
    /// The wrapper stays fully wired, fee checks included, but the
    /// wallet honors `transfer` and `burn` only from its recorded
    /// owner, and the minter's address never is one, so the forwarded
    /// call is always rejected there. Earlier revisions used this as a
    /// governance override; the capability has been removed at the
    /// wallet and must stay removed.
    fn call_to(
        &mut self,
        msg: &IncomingMessage,
        slice: &mut CellSlice<'_>,
    ) -> LedgerResult<Vec<OutgoingMessage>> {
        let call = CallTo::parse(slice)?;
        self.require_admin(&msg.source)?;

        let mut inner = CellSlice::new(&call.message);
        let inner_op = inner.load_u32()?;
        let fwd_fee = self.fees.fwd.fwd_fee(collect_stats(&call.message));
        match inner_op {
            opcodes::TRANSFER => {
                let transfer = Transfer::parse(&mut inner)?;
                if transfer.destination.workchain() != Some(BASECHAIN) {
                    return Err(LedgerError::WrongWorkchain {
                        destination: transfer.destination.clone(),
                    });
                }
                let required = transfer
                    .forward_ton_amount
                    .saturating_add(2 * fwd_fee)
                    .saturating_add(2 * self.fees.gas_consumption)
                    .saturating_add(self.fees.min_tons_for_storage);
                if call.value <= required {
                    return Err(LedgerError::InsufficientValue {
                        attached: call.value,
                        required,
                    });
                }
            }
            opcodes::BURN => {
                let _ = Burn::parse(&mut inner)?;
                let required = fwd_fee.saturating_add(2 * self.fees.gas_consumption);
                if call.value <= required {
                    return Err(LedgerError::InsufficientValue {
                        attached: call.value,
                        required,
                    });
                }
            }
            op => return Err(LedgerError::InvalidOperation { op }),
        }

        debug!(wallet_owner = %call.target, op = %format_args!("0x{inner_op:08x}"), "forced call forwarded");
        Ok(vec![OutgoingMessage::new(
            self.wallet_address_of(&call.target)?,
            call.value,
            call.message.clone(),
        )])
    }

    /// `upgrade`: replace code and data wholesale. The data cell is
    /// re-parsed as a complete minter record; a malformed one aborts
    /// with nothing applied.
    fn upgrade(
        &mut self,
        msg: &IncomingMessage,
        slice: &mut CellSlice<'_>,
    ) -> LedgerResult<Vec<OutgoingMessage>> {
        let upgrade = Upgrade::parse(slice)?;
        self.require_admin(&msg.source)?;

        let (total_supply, admin, wallet_code, content) = parse_minter_data(&upgrade.new_data)?;
        debug!(total_supply, "minter upgraded");
        self.total_supply = total_supply;
        self.admin = admin;
        self.wallet_code = wallet_code;
        self.content = content;
        self.minter_code = upgrade.new_code;
        Ok(Vec::new())
    }

    /// A mint credit came back: roll the supply increase back.
    fn on_bounce(&mut self, msg: &IncomingMessage) -> LedgerResult<Vec<OutgoingMessage>> {
        let body = BouncedBody::parse(&mut CellSlice::new(&msg.body))?;
        match body.op {
            opcodes::INTERNAL_TRANSFER => {
                self.total_supply = self.total_supply.saturating_sub(body.amount);
                debug!(
                    amount = body.amount,
                    total_supply = self.total_supply,
                    "mint bounce rolled back supply"
                );
                Ok(Vec::new())
            }
            op => Err(LedgerError::UnknownOperation { op }),
        }
    }
}

/// Parse the minter record shared by deployment and upgrade.
fn parse_minter_data(data: &Cell) -> LedgerResult<(u128, AdminState, Arc<Cell>, Arc<Cell>)> {
    let mut slice = CellSlice::new(data);
    let total_supply = slice.load_coins()?;
    let admin_address = slice.load_address()?;
    let pending_address = slice.load_address()?;
    let wallet_code = slice.load_ref()?.clone();
    let content = slice.load_ref()?.clone();

    let admin = match (admin_address, pending_address) {
        (MsgAddress::Null, _) => AdminState::Dropped,
        (admin, MsgAddress::Null) => AdminState::Active { admin },
        (admin, candidate) => AdminState::PendingHandoff { admin, candidate },
    };

    Ok((total_supply, admin, wallet_code, content))
}
