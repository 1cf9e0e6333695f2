//! End-to-end ledger flows over a deterministic in-test host.
//!
//! The harness models the execution environment the contracts are
//! written for: one message at a time per account, deploy-on-state-init,
//! and bounce-on-abort with a truncated body. Values attach exactly as
//! computed by the handlers; fees are the advisory estimates from
//! `jetton-fees`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use jetton_cell::{Cell, CellBuilder, CellSlice, MsgAddress};
use jetton_contracts::{
    derive_wallet_address, opcodes, Burn, CallTo, ChangeAdmin, ClaimAdmin, DropAdmin,
    ForwardPayload, IncomingMessage, InternalTransfer, JettonMinter, JettonWallet, LedgerResult,
    Mint, OutgoingMessage, ProvideWalletAddress, TakeWalletAddress, TokenContent, Transfer,
    BOUNCE_TAG,
};
use jetton_fees::{collect_stats, FeePolicy};

const TON: u128 = 1_000_000_000;

fn addr(byte: u8) -> MsgAddress {
    MsgAddress::internal(0, [byte; 32])
}

/// A delivery that ended at a non-contract account.
struct ExternalDelivery {
    from: MsgAddress,
    message: OutgoingMessage,
}

/// Deterministic host: the minter, its wallets, and a routing queue.
struct TestLedger {
    minter: JettonMinter,
    minter_address: MsgAddress,
    admin: MsgAddress,
    wallets: HashMap<MsgAddress, JettonWallet>,
    fees: FeePolicy,
    /// Messages that reached plain (non-contract) accounts.
    external: Vec<ExternalDelivery>,
    /// Aborted deliveries inside a cascade: (account, exit code).
    failures: Vec<(MsgAddress, u32)>,
}

impl TestLedger {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let admin = addr(0xAD);
        let minter_address = addr(0xEE);
        let mut wallet_code = CellBuilder::new();
        wallet_code.store_u32(0x77A11E7).unwrap();
        let wallet_code = Arc::new(wallet_code.build().unwrap());
        let mut minter_code = CellBuilder::new();
        minter_code.store_u32(0x317733).unwrap();
        let minter_code = Arc::new(minter_code.build().unwrap());

        let content = TokenContent::onchain([
            ("name", "TestJetton"),
            ("description", "Jetton description"),
            ("symbol", "TJT"),
            ("decimals", "9"),
        ]);
        let fees = FeePolicy::default();
        let minter = JettonMinter::new(
            minter_address.clone(),
            admin.clone(),
            Arc::new(content.to_cell().unwrap()),
            wallet_code,
            minter_code,
            fees.clone(),
        );

        Self {
            minter,
            minter_address,
            admin,
            wallets: HashMap::new(),
            fees,
            external: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn in_transit_fee(&self, body: &Cell) -> u128 {
        self.fees.fwd.fwd_fee_components(collect_stats(body)).in_transit
    }

    /// Host-style bounce body: tag plus the truncated original.
    fn bounce_body(original: &Cell) -> Cell {
        let mut builder = CellBuilder::new();
        builder.store_u32(BOUNCE_TAG).unwrap();
        let mut slice = CellSlice::new(original);
        let take = slice.bits_left().min(256);
        for _ in 0..take {
            builder.store_bit(slice.load_bit().unwrap()).unwrap();
        }
        builder.build().unwrap()
    }

    fn contract_handle(
        &mut self,
        account: &MsgAddress,
        msg: IncomingMessage,
    ) -> Option<LedgerResult<Vec<OutgoingMessage>>> {
        if *account == self.minter_address {
            Some(self.minter.handle(&msg))
        } else {
            self.wallets.get_mut(account).map(|wallet| wallet.handle(&msg))
        }
    }

    /// Inject a message from an external actor and run the cascade to
    /// completion. The first hop's abort is returned to the caller the
    /// way the chain surfaces it; downstream aborts become bounces.
    fn send(
        &mut self,
        from: &MsgAddress,
        to: &MsgAddress,
        value: u128,
        body: Cell,
    ) -> LedgerResult<()> {
        let fwd_fee = self.in_transit_fee(&body);
        let incoming = IncomingMessage::new(from.clone(), value, Arc::new(body)).with_fwd_fee(fwd_fee);
        let outgoing = self
            .contract_handle(to, incoming)
            .expect("send target must be a contract")?;
        self.route(to.clone(), outgoing);
        Ok(())
    }

    fn route(&mut self, first_sender: MsgAddress, outgoing: Vec<OutgoingMessage>) {
        let mut queue: VecDeque<(MsgAddress, OutgoingMessage)> = outgoing
            .into_iter()
            .map(|message| (first_sender.clone(), message))
            .collect();

        while let Some((sender, message)) = queue.pop_front() {
            let destination = message.destination.clone();

            // Deploy-on-state-init for absent wallets.
            let is_contract = destination == self.minter_address
                || self.wallets.contains_key(&destination);
            if !is_contract {
                match &message.state_init {
                    Some(init) => {
                        let wallet = JettonWallet::from_data(&init.data, self.fees.clone())
                            .expect("state init data must parse");
                        self.wallets.insert(destination.clone(), wallet);
                    }
                    None => {
                        self.external.push(ExternalDelivery {
                            from: sender,
                            message,
                        });
                        continue;
                    }
                }
            }

            let fwd_fee = self.in_transit_fee(&message.body);
            let incoming = IncomingMessage::new(sender.clone(), message.value, message.body.clone())
                .with_fwd_fee(fwd_fee);
            match self.contract_handle(&destination, incoming) {
                Some(Ok(next)) => {
                    queue.extend(next.into_iter().map(|out| (destination.clone(), out)));
                }
                Some(Err(err)) => {
                    self.failures.push((destination.clone(), err.exit_code()));
                    if message.bounce {
                        let bounce = IncomingMessage::new(
                            destination.clone(),
                            message.value,
                            Arc::new(Self::bounce_body(&message.body)),
                        )
                        .bounced();
                        if let Some(Err(err)) = self.contract_handle(&sender, bounce) {
                            // A bounce that itself aborts is absorbed;
                            // the host never re-bounces a bounce.
                            self.failures.push((sender.clone(), err.exit_code()));
                        }
                    }
                }
                None => unreachable!("destination was just deployed"),
            }
        }
    }

    fn wallet_address(&self, owner: &MsgAddress) -> MsgAddress {
        self.minter.wallet_address_of(owner).unwrap()
    }

    fn balance_of(&self, owner: &MsgAddress) -> u128 {
        self.wallets
            .get(&self.wallet_address(owner))
            .map(|wallet| wallet.balance())
            .unwrap_or(0)
    }

    fn wallet_sum(&self) -> u128 {
        self.wallets.values().map(|wallet| wallet.balance()).sum()
    }

    fn mint_body(&self, to: &MsgAddress, amount: u128) -> Cell {
        let credit = InternalTransfer {
            query_id: 0,
            amount,
            from: MsgAddress::Null,
            response_destination: MsgAddress::Null,
            forward_ton_amount: 0,
            forward_payload: ForwardPayload::none(),
        };
        Mint {
            query_id: 0,
            destination: to.clone(),
            total_ton_amount: TON / 10,
            master_msg: Arc::new(credit.to_cell().unwrap()),
        }
        .to_cell()
        .unwrap()
    }

    fn mint(&mut self, to: &MsgAddress, amount: u128) {
        let admin = self.admin.clone();
        let minter = self.minter_address.clone();
        let body = self.mint_body(to, amount);
        self.send(&admin, &minter, TON, body).unwrap();
    }

    fn transfer_body(
        amount: u128,
        destination: &MsgAddress,
        response: &MsgAddress,
        forward_ton_amount: u128,
    ) -> Cell {
        Transfer {
            query_id: 0,
            amount,
            destination: destination.clone(),
            response_destination: response.clone(),
            custom_payload: None,
            forward_ton_amount,
            forward_payload: ForwardPayload::none(),
        }
        .to_cell()
        .unwrap()
    }

    fn transfer(
        &mut self,
        owner: &MsgAddress,
        to: &MsgAddress,
        amount: u128,
        forward_ton_amount: u128,
    ) -> LedgerResult<()> {
        let wallet = self.wallet_address(owner);
        let body = Self::transfer_body(amount, to, owner, forward_ton_amount);
        self.send(owner, &wallet, TON, body)
    }

    fn burn(&mut self, owner: &MsgAddress, amount: u128) -> LedgerResult<()> {
        let wallet = self.wallet_address(owner);
        let body = Burn {
            query_id: 0,
            amount,
            response_destination: owner.clone(),
            custom_payload: None,
        }
        .to_cell()
        .unwrap();
        self.send(owner, &wallet, TON / 10, body)
    }
}

#[test]
fn mint_deploys_wallet_and_credits_it() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);

    ledger.mint(&alice, 1000);

    assert_eq!(ledger.minter.total_supply(), 1000);
    assert_eq!(ledger.balance_of(&alice), 1000);
    assert!(ledger.failures.is_empty());
}

#[test]
fn supply_is_conserved_across_mint_transfer_burn() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);
    let bob = addr(0x02);

    ledger.mint(&alice, 1_000_000);
    ledger.transfer(&alice, &bob, 400_000, 0).unwrap();
    ledger.burn(&bob, 150_000).unwrap();
    ledger.mint(&bob, 50_000);

    assert_eq!(ledger.minter.total_supply(), 900_000);
    assert_eq!(ledger.wallet_sum(), ledger.minter.total_supply());
    assert_eq!(ledger.balance_of(&alice), 600_000);
    assert_eq!(ledger.balance_of(&bob), 300_000);
    assert!(ledger.failures.is_empty());
}

#[test]
fn transfer_to_fresh_destination_forwards_and_refunds() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);
    let carol = addr(0x03);

    ledger.mint(&alice, 1000);
    ledger.transfer(&alice, &carol, 500, 50).unwrap();

    assert_eq!(ledger.balance_of(&alice), 500);
    assert_eq!(ledger.balance_of(&carol), 500);

    // Carol's owner account got the notification carrying exactly the
    // forward amount.
    let carol_wallet = ledger.wallet_address(&carol);
    let notification = ledger
        .external
        .iter()
        .find(|delivery| {
            delivery.message.destination == carol
                && CellSlice::new(&delivery.message.body).load_u32().unwrap()
                    == opcodes::TRANSFER_NOTIFICATION
        })
        .expect("notification delivered");
    assert_eq!(notification.from, carol_wallet);
    assert_eq!(notification.message.value, 50);

    // Alice's response address got the excess refund.
    let excess = ledger
        .external
        .iter()
        .find(|delivery| {
            delivery.message.destination == alice
                && CellSlice::new(&delivery.message.body).load_u32().unwrap() == opcodes::EXCESSES
        })
        .expect("excess refund delivered");
    assert!(excess.message.value > 0);
}

#[test]
fn zero_forward_amount_sends_no_notification() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);
    let bob = addr(0x02);

    ledger.mint(&alice, 1000);
    ledger.transfer(&alice, &bob, 100, 0).unwrap();

    assert!(ledger.external.iter().all(|delivery| {
        CellSlice::new(&delivery.message.body).load_u32().unwrap()
            != opcodes::TRANSFER_NOTIFICATION
    }));
    assert_eq!(ledger.balance_of(&bob), 100);
}

#[test]
fn non_owner_cannot_transfer() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);
    let mallory = addr(0x66);

    ledger.mint(&alice, 1000);
    let wallet = ledger.wallet_address(&alice);
    let body = TestLedger::transfer_body(100, &mallory, &mallory, 0);
    let err = ledger.send(&mallory, &wallet, TON, body).unwrap_err();

    assert_eq!(err.exit_code(), 73);
    assert_eq!(ledger.balance_of(&alice), 1000);
    assert_eq!(ledger.balance_of(&mallory), 0);
}

#[test]
fn overdraft_is_rejected_and_state_unchanged() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);
    let bob = addr(0x02);

    ledger.mint(&alice, 1000);
    let err = ledger.transfer(&alice, &bob, 1001, 0).unwrap_err();

    assert_eq!(err.exit_code(), 47);
    assert_eq!(ledger.balance_of(&alice), 1000);
    assert_eq!(ledger.balance_of(&bob), 0);
    assert_eq!(ledger.minter.total_supply(), 1000);
}

#[test]
fn burn_more_than_balance_is_rejected() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);

    ledger.mint(&alice, 100);
    let err = ledger.burn(&alice, 101).unwrap_err();

    assert_eq!(err.exit_code(), 47);
    assert_eq!(ledger.balance_of(&alice), 100);
    assert_eq!(ledger.minter.total_supply(), 100);
}

#[test]
fn masterchain_destination_is_rejected() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);

    ledger.mint(&alice, 1000);
    let foreign = MsgAddress::internal(-1, [0x0F; 32]);
    let err = ledger.transfer(&alice, &foreign, 100, 0).unwrap_err();

    assert_eq!(err.exit_code(), 333);
    assert_eq!(ledger.balance_of(&alice), 1000);
}

#[test]
fn wallet_rejects_internal_transfer_from_non_sibling() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);
    let mallory = addr(0x66);

    ledger.mint(&alice, 1000);
    let wallet = ledger.wallet_address(&alice);
    let forged = InternalTransfer {
        query_id: 0,
        amount: 1_000_000,
        from: mallory.clone(),
        response_destination: mallory.clone(),
        forward_ton_amount: 0,
        forward_payload: ForwardPayload::none(),
    }
    .to_cell()
    .unwrap();

    let err = ledger.send(&mallory, &wallet, TON, forged).unwrap_err();
    assert_eq!(err.exit_code(), 74);
    assert_eq!(ledger.balance_of(&alice), 1000);
}

#[test]
fn minter_rejects_forged_burn_notification() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);
    let mallory = addr(0x66);

    ledger.mint(&alice, 1000);
    let forged = jetton_contracts::BurnNotification {
        query_id: 0,
        amount: 1000,
        sender: alice.clone(),
        response_destination: mallory.clone(),
    }
    .to_cell()
    .unwrap();

    // Right message shape, wrong sender account.
    let minter = ledger.minter_address.clone();
    let err = ledger.send(&mallory, &minter, TON / 10, forged).unwrap_err();
    assert_eq!(err.exit_code(), 74);
    assert_eq!(ledger.minter.total_supply(), 1000);
}

#[test]
fn transfer_bounce_restores_sender_balance() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);
    let bob = addr(0x02);

    ledger.mint(&alice, 1000);
    let wallet_address = ledger.wallet_address(&alice);
    let body = TestLedger::transfer_body(400, &bob, &alice, 0);
    let fwd_fee = ledger.in_transit_fee(&body);

    // First step only: run the wallet by hand instead of routing, as if
    // the credit then failed downstream.
    let wallet = ledger.wallets.get_mut(&wallet_address).unwrap();
    let incoming =
        IncomingMessage::new(alice.clone(), TON, Arc::new(body)).with_fwd_fee(fwd_fee);
    let outgoing = wallet.handle(&incoming).unwrap();
    assert_eq!(wallet.balance(), 600);

    let bounce = IncomingMessage::new(
        outgoing[0].destination.clone(),
        outgoing[0].value,
        Arc::new(TestLedger::bounce_body(&outgoing[0].body)),
    )
    .bounced();
    wallet.handle(&bounce).unwrap();

    assert_eq!(wallet.balance(), 1000);
}

#[test]
fn burn_notification_bounce_restores_wallet_balance() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);

    ledger.mint(&alice, 1000);
    let wallet_address = ledger.wallet_address(&alice);
    let body = Burn {
        query_id: 0,
        amount: 250,
        response_destination: alice.clone(),
        custom_payload: None,
    }
    .to_cell()
    .unwrap();

    let wallet = ledger.wallets.get_mut(&wallet_address).unwrap();
    let incoming = IncomingMessage::new(alice.clone(), TON / 10, Arc::new(body));
    let outgoing = wallet.handle(&incoming).unwrap();
    assert_eq!(wallet.balance(), 750);

    let bounce = IncomingMessage::new(
        outgoing[0].destination.clone(),
        outgoing[0].value,
        Arc::new(TestLedger::bounce_body(&outgoing[0].body)),
    )
    .bounced();
    wallet.handle(&bounce).unwrap();

    assert_eq!(wallet.balance(), 1000);
}

#[test]
fn admin_handoff_moves_minting_rights() {
    let mut ledger = TestLedger::new();
    let new_admin = addr(0xA2);
    let alice = addr(0x01);
    let minter = ledger.minter_address.clone();
    let old_admin = ledger.admin.clone();

    let change = ChangeAdmin {
        query_id: 0,
        new_admin: new_admin.clone(),
    }
    .to_cell()
    .unwrap();
    ledger.send(&old_admin, &minter, TON / 10, change).unwrap();

    // Until the claim, the old admin still mints.
    ledger.mint(&alice, 10);
    assert_eq!(ledger.minter.total_supply(), 10);

    let claim = ClaimAdmin { query_id: 0 }.to_cell().unwrap();
    ledger.send(&new_admin, &minter, TON / 10, claim).unwrap();
    assert_eq!(ledger.minter.admin(), Some(&new_admin));

    // Rights moved: the old admin is rejected, the new one mints.
    let body = ledger.mint_body(&alice, 10);
    let err = ledger.send(&old_admin, &minter, TON, body).unwrap_err();
    assert_eq!(err.exit_code(), 73);

    let body = ledger.mint_body(&alice, 10);
    ledger.send(&new_admin, &minter, TON, body).unwrap();
    assert_eq!(ledger.minter.total_supply(), 20);
}

#[test]
fn dropped_admin_cannot_mint_or_return() {
    let mut ledger = TestLedger::new();
    let minter = ledger.minter_address.clone();
    let admin = ledger.admin.clone();

    let drop = DropAdmin { query_id: 0 }.to_cell().unwrap();
    ledger.send(&admin, &minter, TON / 10, drop).unwrap();
    assert!(!ledger.minter.mintable());

    let body = ledger.mint_body(&addr(0x01), 10);
    assert_eq!(
        ledger.send(&admin, &minter, TON, body).unwrap_err().exit_code(),
        73
    );

    let change = ChangeAdmin {
        query_id: 0,
        new_admin: admin.clone(),
    }
    .to_cell()
    .unwrap();
    assert_eq!(
        ledger
            .send(&admin, &minter, TON / 10, change)
            .unwrap_err()
            .exit_code(),
        73
    );
}

#[test]
fn forced_transfer_is_accepted_by_minter_but_rejected_by_wallet() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);
    let bob = addr(0x02);

    ledger.mint(&alice, 1000);
    let minter = ledger.minter_address.clone();
    let admin = ledger.admin.clone();
    let alice_wallet = ledger.wallet_address(&alice);

    let inner = TestLedger::transfer_body(100, &bob, &bob, 0);
    let call = CallTo {
        query_id: 0,
        target: alice.clone(),
        value: TON / 2,
        message: Arc::new(inner),
    }
    .to_cell()
    .unwrap();

    // The minter forwards the call; the wallet turns it away because
    // the minter is not its owner.
    ledger.send(&admin, &minter, TON, call).unwrap();

    assert!(ledger.failures.contains(&(alice_wallet, 73)));
    assert_eq!(ledger.balance_of(&alice), 1000);
    assert_eq!(ledger.balance_of(&bob), 0);

    // The owner-initiated equivalent succeeds.
    ledger.transfer(&alice, &bob, 100, 0).unwrap();
    assert_eq!(ledger.balance_of(&alice), 900);
    assert_eq!(ledger.balance_of(&bob), 100);
}

#[test]
fn forced_burn_is_accepted_by_minter_but_rejected_by_wallet() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);

    ledger.mint(&alice, 1000);
    let minter = ledger.minter_address.clone();
    let admin = ledger.admin.clone();
    let alice_wallet = ledger.wallet_address(&alice);

    let inner = Burn {
        query_id: 0,
        amount: 100,
        response_destination: admin.clone(),
        custom_payload: None,
    }
    .to_cell()
    .unwrap();
    let call = CallTo {
        query_id: 0,
        target: alice.clone(),
        value: TON / 2,
        message: Arc::new(inner),
    }
    .to_cell()
    .unwrap();

    ledger.send(&admin, &minter, TON, call).unwrap();

    assert!(ledger.failures.contains(&(alice_wallet, 73)));
    assert_eq!(ledger.balance_of(&alice), 1000);
    assert_eq!(ledger.minter.total_supply(), 1000);

    ledger.burn(&alice, 100).unwrap();
    assert_eq!(ledger.balance_of(&alice), 900);
    assert_eq!(ledger.minter.total_supply(), 900);
}

#[test]
fn discovery_is_deterministic_and_externally_derivable() {
    let mut ledger = TestLedger::new();
    let dave = addr(0x04);
    let minter = ledger.minter_address.clone();

    let mut replies = Vec::new();
    for _ in 0..2 {
        let request = ProvideWalletAddress {
            query_id: 7,
            owner: dave.clone(),
            include_address: true,
        }
        .to_cell()
        .unwrap();
        ledger.send(&dave, &minter, TON / 10, request).unwrap();

        let delivery = ledger.external.pop().expect("discovery reply");
        assert_eq!(delivery.message.destination, dave);
        let mut slice = CellSlice::new(&delivery.message.body);
        assert_eq!(slice.load_u32().unwrap(), opcodes::TAKE_WALLET_ADDRESS);
        let reply = TakeWalletAddress::parse(&mut slice).unwrap();
        assert_eq!(reply.query_id, 7);
        assert_eq!(reply.owner, Some(dave.clone()));
        replies.push(reply.wallet_address);
    }

    assert_eq!(replies[0], replies[1]);
    // Any party can derive the same address from public inputs.
    let independent =
        derive_wallet_address(&dave, &ledger.minter_address, ledger.minter.wallet_code()).unwrap();
    assert_eq!(replies[0], independent);
}

#[test]
fn discovery_of_foreign_owner_returns_null_sentinel() {
    let mut ledger = TestLedger::new();
    let dave = addr(0x04);
    let minter = ledger.minter_address.clone();
    let foreign = MsgAddress::internal(-1, [0x0F; 32]);

    let request = ProvideWalletAddress {
        query_id: 0,
        owner: foreign.clone(),
        include_address: true,
    }
    .to_cell()
    .unwrap();
    ledger.send(&dave, &minter, TON / 10, request).unwrap();

    let delivery = ledger.external.pop().unwrap();
    let mut slice = CellSlice::new(&delivery.message.body);
    slice.load_u32().unwrap();
    let reply = TakeWalletAddress::parse(&mut slice).unwrap();
    assert_eq!(reply.wallet_address, MsgAddress::Null);
    assert_eq!(reply.owner, Some(foreign));
}

#[test]
fn malformed_transfer_payloads_are_rejected_before_any_debit() {
    let mut ledger = TestLedger::new();
    let alice = addr(0x01);
    let bob = addr(0x02);

    ledger.mint(&alice, 1000);
    let wallet = ledger.wallet_address(&alice);

    let mut payload = CellBuilder::new();
    payload.store_u64(0x1234_5678_90ab_cdef).unwrap();
    let payload = Arc::new(payload.build().unwrap());

    let prefix = |builder: &mut CellBuilder| {
        builder.store_u32(opcodes::TRANSFER).unwrap();
        builder.store_u64(0).unwrap();
        builder.store_coins(500).unwrap();
        builder.store_address(&bob).unwrap();
        builder.store_address(&alice).unwrap();
    };

    // Custom-payload presence bit set, no reference behind it.
    let mut case_a = CellBuilder::new();
    prefix(&mut case_a);
    case_a.store_bit(true).unwrap();
    case_a.store_coins(50).unwrap();
    case_a.store_bit(true).unwrap();
    case_a.store_ref(payload.clone()).unwrap();

    // Presence bit clear but a stray reference stored.
    let mut case_b = CellBuilder::new();
    prefix(&mut case_b);
    case_b.store_bit(false).unwrap();
    case_b.store_ref(payload.clone()).unwrap();
    case_b.store_coins(50).unwrap();
    case_b.store_bit(true).unwrap();
    case_b.store_ref(payload.clone()).unwrap();

    // Body ends without the either bit.
    let mut case_c = CellBuilder::new();
    prefix(&mut case_c);
    case_c.store_bit(false).unwrap();
    case_c.store_coins(50).unwrap();

    for case in [case_a, case_b, case_c] {
        let err = ledger
            .send(&alice, &wallet, TON, case.build().unwrap())
            .unwrap_err();
        assert!(matches!(err.exit_code(), 9 | 49), "got {err}");
        assert_eq!(ledger.balance_of(&alice), 1000);
        assert_eq!(ledger.balance_of(&bob), 0);
    }

    // The bit-correct equivalent with the same logical content passes.
    let mut good = CellBuilder::new();
    prefix(&mut good);
    good.store_bit(true).unwrap();
    good.store_ref(payload.clone()).unwrap();
    good.store_coins(50).unwrap();
    good.store_bit(true).unwrap();
    good.store_ref(payload).unwrap();
    ledger.send(&alice, &wallet, TON, good.build().unwrap()).unwrap();

    assert_eq!(ledger.balance_of(&alice), 500);
    assert_eq!(ledger.balance_of(&bob), 500);
}

#[test]
fn conservation_holds_across_randomized_activity() {
    let mut ledger = TestLedger::new();
    let owners: Vec<MsgAddress> = (1..=5).map(addr).collect();

    ledger.mint(&owners[0], 1_000_000);
    for step in 0..60 {
        let actor = owners[step % owners.len()].clone();
        let other = owners[(step * 7 + 3) % owners.len()].clone();
        let balance = ledger.balance_of(&actor);
        let amount = rand::random::<u64>() as u128 % 10_000 + 1;

        match step % 4 {
            0 => ledger.mint(&actor, amount),
            1 if actor != other && amount <= balance => {
                ledger.transfer(&actor, &other, amount, 0).unwrap();
            }
            2 if amount <= balance => ledger.burn(&actor, amount).unwrap(),
            _ => {
                // Overdrafts must fail without moving anything. Only
                // meaningful once the actor's wallet exists.
                let wallet = ledger.wallet_address(&actor);
                if ledger.wallets.contains_key(&wallet) {
                    let before = ledger.balance_of(&actor);
                    if ledger.transfer(&actor, &other, before + 1, 0).is_ok() {
                        panic!("overdraft accepted");
                    }
                    assert_eq!(ledger.balance_of(&actor), before);
                }
            }
        }

        assert_eq!(
            ledger.minter.total_supply(),
            ledger.wallet_sum(),
            "conservation broken at step {step}"
        );
    }
}
