//! The wallet ledger: one balance register per owner.
//!
//! A wallet accepts exactly three requests (`transfer` and `burn` from
//! its owner, `internal_transfer` from a trusted sibling wallet or the
//! minter) plus bounces of its own outbound messages. Everything else
//! aborts. A handler validates the whole request before touching the
//! balance, so an error always leaves the wallet exactly as it was.

use std::sync::Arc;

use jetton_cell::{Cell, CellResult, CellSlice, MsgAddress};
use jetton_fees::FeePolicy;
use tracing::debug;

use crate::envelope::{IncomingMessage, OutgoingMessage, SendMode};
use crate::error::{LedgerError, LedgerResult};
use crate::ops::{
    opcodes, BouncedBody, Burn, BurnNotification, Excesses, InternalTransfer, Transfer,
    TransferNotification,
};
use crate::state_init::{derive_wallet_address, wallet_data_cell, wallet_state_init, BASECHAIN};

/// Per-owner wallet state machine.
#[derive(Debug, Clone)]
pub struct JettonWallet {
    balance: u128,
    owner: MsgAddress,
    minter: MsgAddress,
    wallet_code: Arc<Cell>,
    fees: FeePolicy,
}

impl JettonWallet {
    /// A fresh wallet with zero balance, as the first inbound credit
    /// deploys it.
    pub fn new(
        owner: MsgAddress,
        minter: MsgAddress,
        wallet_code: Arc<Cell>,
        fees: FeePolicy,
    ) -> Self {
        Self {
            balance: 0,
            owner,
            minter,
            wallet_code,
            fees,
        }
    }

    /// Restore a wallet from its persisted record.
    pub fn from_data(data: &Cell, fees: FeePolicy) -> LedgerResult<Self> {
        let mut slice = CellSlice::new(data);
        let balance = slice.load_coins()?;
        let owner = slice.load_address()?;
        let minter = slice.load_address()?;
        let wallet_code = slice.load_ref()?.clone();
        Ok(Self {
            balance,
            owner,
            minter,
            wallet_code,
            fees,
        })
    }

    /// Current token balance.
    pub fn balance(&self) -> u128 {
        self.balance
    }

    /// Owner of this wallet.
    pub fn owner(&self) -> &MsgAddress {
        &self.owner
    }

    /// Minter this wallet belongs to.
    pub fn minter(&self) -> &MsgAddress {
        &self.minter
    }

    /// Wallet code template of the ledger.
    pub fn wallet_code(&self) -> &Arc<Cell> {
        &self.wallet_code
    }

    /// The persisted record:
    /// `balance:Coins owner:MsgAddress minter:MsgAddress wallet_code:^Cell`.
    pub fn data_cell(&self) -> CellResult<Cell> {
        wallet_data_cell(self.balance, &self.owner, &self.minter, &self.wallet_code)
    }

    /// This wallet's own deterministic address.
    pub fn address(&self) -> CellResult<MsgAddress> {
        derive_wallet_address(&self.owner, &self.minter, &self.wallet_code)
    }

    /// Process one inbound message to completion.
    ///
    /// Returns the messages to send on success; on error no state was
    /// changed and the host bounces the attached value.
    pub fn handle(&mut self, msg: &IncomingMessage) -> LedgerResult<Vec<OutgoingMessage>> {
        if msg.bounced {
            return self.on_bounce(msg);
        }

        let mut slice = CellSlice::new(&msg.body);
        let op = slice.load_u32()?;
        match op {
            opcodes::TRANSFER => self.send_tokens(msg, &mut slice),
            opcodes::INTERNAL_TRANSFER => self.receive_tokens(msg, &mut slice),
            opcodes::BURN => self.burn_tokens(msg, &mut slice),
            op => Err(LedgerError::UnknownOperation { op }),
        }
    }

    /// `transfer`: debit the balance and hand the amount to the
    /// destination owner's wallet.
    fn send_tokens(
        &mut self,
        msg: &IncomingMessage,
        slice: &mut CellSlice<'_>,
    ) -> LedgerResult<Vec<OutgoingMessage>> {
        let transfer = Transfer::parse(slice)?;

        if msg.source != self.owner {
            return Err(LedgerError::Unauthorized { role: "owner" });
        }
        if transfer.destination.workchain() != Some(BASECHAIN) {
            return Err(LedgerError::WrongWorkchain {
                destination: transfer.destination.clone(),
            });
        }
        if transfer.amount > self.balance {
            return Err(LedgerError::InsufficientBalance {
                available: self.balance,
                required: transfer.amount,
            });
        }

        // The attached value must fund the credit hop, the notification
        // hop when one is requested, both handlers' gas, and leave the
        // storage reserve untouched.
        let fwd_count: u128 = if transfer.forward_ton_amount > 0 { 2 } else { 1 };
        let required = transfer
            .forward_ton_amount
            .saturating_add(fwd_count.saturating_mul(msg.fwd_fee))
            .saturating_add(2 * self.fees.gas_consumption)
            .saturating_add(self.fees.min_tons_for_storage);
        if msg.value <= required {
            return Err(LedgerError::InsufficientValue {
                attached: msg.value,
                required,
            });
        }

        self.balance -= transfer.amount;
        debug!(
            amount = transfer.amount,
            destination = %transfer.destination,
            balance = self.balance,
            "transfer accepted"
        );

        let destination_init =
            wallet_state_init(&transfer.destination, &self.minter, &self.wallet_code)?;
        let destination = destination_init.address(BASECHAIN)?;
        let credit = InternalTransfer {
            query_id: transfer.query_id,
            amount: transfer.amount,
            from: self.owner.clone(),
            response_destination: transfer.response_destination.clone(),
            forward_ton_amount: transfer.forward_ton_amount,
            forward_payload: transfer.forward_payload.clone(),
        };

        Ok(vec![OutgoingMessage::new(
            destination,
            msg.value - self.fees.gas_consumption,
            Arc::new(credit.to_cell()?),
        )
        .with_state_init(destination_init)
        .with_mode(SendMode::CarryRemainingValue)])
    }

    /// `internal_transfer`: credit from a sibling wallet or the minter.
    fn receive_tokens(
        &mut self,
        msg: &IncomingMessage,
        slice: &mut CellSlice<'_>,
    ) -> LedgerResult<Vec<OutgoingMessage>> {
        let credit = InternalTransfer::parse(slice)?;

        // Trust is by address derivation: the sender must be the wallet
        // the claimed originator would deploy at, or the minter itself.
        // A mint travels this exact path; there is no separate case.
        let sibling = derive_wallet_address(&credit.from, &self.minter, &self.wallet_code)?;
        if msg.source != self.minter && msg.source != sibling {
            return Err(LedgerError::UntrustedSender {
                claimed_owner: credit.from.clone(),
                sender: msg.source.clone(),
            });
        }

        self.balance = self.balance.saturating_add(credit.amount);
        debug!(
            amount = credit.amount,
            from = %credit.from,
            balance = self.balance,
            "credit accepted"
        );

        let mut outgoing = Vec::new();
        let mut remaining = msg.value;

        if credit.forward_ton_amount > 0 {
            remaining = remaining.saturating_sub(credit.forward_ton_amount + msg.fwd_fee);
            let notification = TransferNotification {
                query_id: credit.query_id,
                amount: credit.amount,
                sender: credit.from.clone(),
                forward_payload: credit.forward_payload.clone(),
            };
            outgoing.push(
                OutgoingMessage::new(
                    self.owner.clone(),
                    credit.forward_ton_amount,
                    Arc::new(notification.to_cell()?),
                )
                .non_bounceable(),
            );
        }

        if !credit.response_destination.is_null() {
            let keep = self
                .fees
                .gas_consumption
                .saturating_add(self.fees.min_tons_for_storage);
            let excess = remaining.saturating_sub(keep);
            if excess > 0 {
                let refund = Excesses {
                    query_id: credit.query_id,
                };
                outgoing.push(
                    OutgoingMessage::new(
                        credit.response_destination.clone(),
                        excess,
                        Arc::new(refund.to_cell()?),
                    )
                    .non_bounceable()
                    .with_mode(SendMode::CarryAllBalance),
                );
            }
        }

        Ok(outgoing)
    }

    /// `burn`: debit the balance and report to the minter.
    fn burn_tokens(
        &mut self,
        msg: &IncomingMessage,
        slice: &mut CellSlice<'_>,
    ) -> LedgerResult<Vec<OutgoingMessage>> {
        let burn = Burn::parse(slice)?;

        if msg.source != self.owner {
            return Err(LedgerError::Unauthorized { role: "owner" });
        }
        if burn.amount > self.balance {
            return Err(LedgerError::InsufficientBalance {
                available: self.balance,
                required: burn.amount,
            });
        }
        let required = msg
            .fwd_fee
            .saturating_add(2 * self.fees.gas_consumption);
        if msg.value <= required {
            return Err(LedgerError::InsufficientValue {
                attached: msg.value,
                required,
            });
        }

        self.balance -= burn.amount;
        debug!(amount = burn.amount, balance = self.balance, "burn accepted");

        let notification = BurnNotification {
            query_id: burn.query_id,
            amount: burn.amount,
            sender: self.owner.clone(),
            response_destination: burn.response_destination.clone(),
        };

        Ok(vec![OutgoingMessage::new(
            self.minter.clone(),
            msg.value - self.fees.gas_consumption,
            Arc::new(notification.to_cell()?),
        )
        .with_mode(SendMode::CarryRemainingValue)])
    }

    /// A debit we sent came back: restore it.
    ///
    /// Only `internal_transfer` and `burn_notification` ever leave this
    /// wallet carrying a speculative debit, and the host delivers each
    /// bounce at most once, so the restore cannot double-apply.
    fn on_bounce(&mut self, msg: &IncomingMessage) -> LedgerResult<Vec<OutgoingMessage>> {
        let body = BouncedBody::parse(&mut CellSlice::new(&msg.body))?;
        match body.op {
            opcodes::INTERNAL_TRANSFER | opcodes::BURN_NOTIFICATION => {
                self.balance = self.balance.saturating_add(body.amount);
                debug!(
                    op = %format_args!("0x{:08x}", body.op),
                    amount = body.amount,
                    balance = self.balance,
                    "bounce restored balance"
                );
                Ok(Vec::new())
            }
            op => Err(LedgerError::UnknownOperation { op }),
        }
    }
}
