//! Deterministic account addresses from code and initial data.
//!
//! An account's address is the hash of its initial (code, data) pair,
//! which is why a wallet can be referenced, paid, and trusted before it
//! exists: any party can recompute the address from the owner, the
//! minter and the wallet code template. Field order in the data cell is
//! therefore part of the compatibility contract.

use std::sync::Arc;

use jetton_cell::{Cell, CellBuilder, CellResult, MsgAddress};

/// The workchain this ledger lives in.
pub const BASECHAIN: i32 = 0;

/// Initial code and data of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInit {
    pub code: Arc<Cell>,
    pub data: Arc<Cell>,
}

impl StateInit {
    pub fn new(code: Arc<Cell>, data: Arc<Cell>) -> Self {
        Self { code, data }
    }

    /// Serialize per TL-B:
    /// `_ split_depth:(Maybe (## 5)) special:(Maybe TickTock)
    ///    code:(Maybe ^Cell) data:(Maybe ^Cell) library:(HashmapE 256 SimpleLib)`
    /// with no split depth, no tick-tock and no libraries.
    pub fn to_cell(&self) -> CellResult<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_bit(false)?; // split_depth
        builder.store_bit(false)?; // special
        builder.store_maybe_ref(Some(self.code.clone()))?;
        builder.store_maybe_ref(Some(self.data.clone()))?;
        builder.store_bit(false)?; // library
        builder.build()
    }

    /// The address an account with this state-init deploys at.
    pub fn address(&self, workchain: i32) -> CellResult<MsgAddress> {
        Ok(MsgAddress::internal(workchain, self.to_cell()?.hash()))
    }
}

/// Persisted wallet record:
/// `balance:Coins owner:MsgAddress minter:MsgAddress wallet_code:^Cell`.
pub fn wallet_data_cell(
    balance: u128,
    owner: &MsgAddress,
    minter: &MsgAddress,
    wallet_code: &Arc<Cell>,
) -> CellResult<Cell> {
    let mut builder = CellBuilder::new();
    builder.store_coins(balance)?;
    builder.store_address(owner)?;
    builder.store_address(minter)?;
    builder.store_ref(wallet_code.clone())?;
    builder.build()
}

/// State-init of the wallet owned by `owner` under `minter`.
///
/// Wallets always start with a zero balance; the first credit deploys
/// them.
pub fn wallet_state_init(
    owner: &MsgAddress,
    minter: &MsgAddress,
    wallet_code: &Arc<Cell>,
) -> CellResult<StateInit> {
    let data = wallet_data_cell(0, owner, minter, wallet_code)?;
    Ok(StateInit::new(wallet_code.clone(), Arc::new(data)))
}

/// The deterministic wallet address for `owner` under `minter`.
///
/// This is the trust anchor of the whole protocol: every inbound message
/// that claims to come from a sibling wallet is checked by recomputing
/// this address and comparing it to the actual sender.
pub fn derive_wallet_address(
    owner: &MsgAddress,
    minter: &MsgAddress,
    wallet_code: &Arc<Cell>,
) -> CellResult<MsgAddress> {
    wallet_state_init(owner, minter, wallet_code)?.address(BASECHAIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> Arc<Cell> {
        let mut builder = CellBuilder::new();
        builder.store_u32(0xC0DE).unwrap();
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let owner = MsgAddress::internal(0, [0x11; 32]);
        let minter = MsgAddress::internal(0, [0x22; 32]);
        let a = derive_wallet_address(&owner, &minter, &code()).unwrap();
        let b = derive_wallet_address(&owner, &minter, &code()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.workchain(), Some(BASECHAIN));
    }

    #[test]
    fn test_derivation_depends_on_every_input() {
        let owner = MsgAddress::internal(0, [0x11; 32]);
        let minter = MsgAddress::internal(0, [0x22; 32]);
        let base = derive_wallet_address(&owner, &minter, &code()).unwrap();

        let other_owner = MsgAddress::internal(0, [0x12; 32]);
        assert_ne!(
            derive_wallet_address(&other_owner, &minter, &code()).unwrap(),
            base
        );

        let other_minter = MsgAddress::internal(0, [0x23; 32]);
        assert_ne!(
            derive_wallet_address(&owner, &other_minter, &code()).unwrap(),
            base
        );

        let mut other_code = CellBuilder::new();
        other_code.store_u32(0xD0D0).unwrap();
        let other_code = Arc::new(other_code.build().unwrap());
        assert_ne!(
            derive_wallet_address(&owner, &minter, &other_code).unwrap(),
            base
        );
    }

    #[test]
    fn test_state_init_layout() {
        let init = wallet_state_init(
            &MsgAddress::internal(0, [0x11; 32]),
            &MsgAddress::internal(0, [0x22; 32]),
            &code(),
        )
        .unwrap();
        let cell = init.to_cell().unwrap();
        // 2 maybe bits + 2 presence bits + 1 library bit
        assert_eq!(cell.bit_len(), 5);
        assert_eq!(cell.reference_count(), 2);
    }
}
