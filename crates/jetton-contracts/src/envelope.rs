//! Message envelopes: what a handler receives and what it emits.
//!
//! The host delivers one `IncomingMessage` at a time per account and
//! routes every `OutgoingMessage` a handler returns. There is no other
//! channel between accounts.

use std::sync::Arc;

use jetton_cell::{Cell, MsgAddress};

use crate::state_init::StateInit;

/// How an outgoing message is funded.
///
/// Handlers always compute the exact `value` to attach; the mode
/// records which chain-level send flag that computation corresponds to
/// (pay-fees-separately 1, carry-remaining 64, carry-all 128).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// A fixed amount, fees paid on top by the sending account.
    WithValue,
    /// The remainder of the inbound message's value after the
    /// handler's own costs.
    CarryRemainingValue,
    /// Everything above the account's reserve.
    CarryAllBalance,
}

/// An inbound message as the handler sees it.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Account that sent the message. Authorization decisions key on
    /// this; the host guarantees it cannot be forged.
    pub source: MsgAddress,
    /// Value attached, in nanotons.
    pub value: u128,
    /// In-transit forward fee the host observed for this message; used
    /// to size required attached value, never for conservation.
    pub fwd_fee: u128,
    /// True when this is a bounce of a message this account sent.
    pub bounced: bool,
    /// Message body.
    pub body: Arc<Cell>,
}

impl IncomingMessage {
    /// A plain message with no observed forward fee.
    pub fn new(source: MsgAddress, value: u128, body: Arc<Cell>) -> Self {
        Self {
            source,
            value,
            fwd_fee: 0,
            bounced: false,
            body,
        }
    }

    /// Attach the forward fee the host observed.
    pub fn with_fwd_fee(mut self, fwd_fee: u128) -> Self {
        self.fwd_fee = fwd_fee;
        self
    }

    /// Mark the message as a bounce.
    pub fn bounced(mut self) -> Self {
        self.bounced = true;
        self
    }
}

/// An outbound message a handler asks the host to send.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// Destination account.
    pub destination: MsgAddress,
    /// Value to attach, in nanotons (interpreted per `mode`).
    pub value: u128,
    /// Request a bounce back if the destination aborts. State-mutating
    /// sends set this; notifications and refunds do not.
    pub bounce: bool,
    /// Deploy-if-absent payload for the destination.
    pub state_init: Option<StateInit>,
    /// Message body.
    pub body: Arc<Cell>,
    /// Funding mode.
    pub mode: SendMode,
}

impl OutgoingMessage {
    /// A bounceable message with an exact value.
    pub fn new(destination: MsgAddress, value: u128, body: Arc<Cell>) -> Self {
        Self {
            destination,
            value,
            bounce: true,
            state_init: None,
            body,
            mode: SendMode::WithValue,
        }
    }

    /// Disable the bounce request.
    pub fn non_bounceable(mut self) -> Self {
        self.bounce = false;
        self
    }

    /// Attach a state-init so an absent destination gets deployed.
    pub fn with_state_init(mut self, state_init: StateInit) -> Self {
        self.state_init = Some(state_init);
        self
    }

    /// Set the funding mode.
    pub fn with_mode(mut self, mode: SendMode) -> Self {
        self.mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jetton_cell::CellBuilder;

    #[test]
    fn test_incoming_defaults() {
        let body = Arc::new(CellBuilder::new().build().unwrap());
        let msg = IncomingMessage::new(MsgAddress::Null, 100, body);
        assert_eq!(msg.fwd_fee, 0);
        assert!(!msg.bounced);
    }

    #[test]
    fn test_outgoing_builder_chain() {
        let body = Arc::new(CellBuilder::new().build().unwrap());
        let msg = OutgoingMessage::new(MsgAddress::internal(0, [1; 32]), 5, body)
            .non_bounceable()
            .with_mode(SendMode::CarryAllBalance);
        assert!(!msg.bounce);
        assert_eq!(msg.mode, SendMode::CarryAllBalance);
    }
}
