//! Fee estimation for the jetton ledger.
//!
//! The ledger contracts never learn real chain fees; they size outgoing
//! value and reject underfunded requests using the tables in this crate.
//! Fees here are advisory: conservation of supply never depends on them.
//!
//! Three tables mirror the chain configuration: forward-message prices,
//! gas prices and storage prices. All divisions round up, matching the
//! chain's own fee arithmetic, and fractions are expressed in 1/65536
//! units.

use std::collections::HashSet;

use jetton_cell::Cell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from fee table validation.
#[derive(Debug, Error)]
pub enum FeeError {
    /// A fee fraction must stay below 65536 (the whole).
    #[error("fee fraction out of range: {0} (max 65535)")]
    FractionOutOfRange(u32),
}

/// Result type for fee operations.
pub type FeeResult<T> = Result<T, FeeError>;

/// Fraction denominator used throughout the chain fee config.
const FRAC_DENOM: u128 = 65536;

/// Size of a cell tree as the fee config counts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellStats {
    /// Distinct cells in the tree.
    pub cells: u64,
    /// Data bits across those cells.
    pub bits: u64,
}

impl CellStats {
    /// Stats for an explicitly sized payload.
    pub fn new(cells: u64, bits: u64) -> Self {
        Self { cells, bits }
    }

    /// Combine two measurements.
    pub fn add(self, other: CellStats) -> Self {
        Self {
            cells: self.cells + other.cells,
            bits: self.bits + other.bits,
        }
    }
}

/// Measure a cell tree, counting each distinct subtree once.
///
/// Shared subtrees are deduplicated by representation hash, the same way
/// the chain serializer would store them.
pub fn collect_stats(root: &Cell) -> CellStats {
    fn walk(cell: &Cell, seen: &mut HashSet<[u8; 32]>, stats: &mut CellStats) {
        if !seen.insert(cell.hash()) {
            return;
        }
        stats.cells += 1;
        stats.bits += cell.bit_len() as u64;
        for reference in cell.references() {
            walk(reference, seen, stats);
        }
    }

    let mut stats = CellStats::default();
    walk(root, &mut HashSet::new(), &mut stats);
    stats
}

/// Forward-message prices from the chain config.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MsgForwardPrices {
    /// Flat price per message.
    pub lump_price: u64,
    /// Price per bit, in 1/65536 nanotons.
    pub bit_price: u64,
    /// Price per cell, in 1/65536 nanotons.
    pub cell_price: u64,
    /// Share of the fee charged in the sender's action phase, /65536.
    pub first_frac: u32,
    /// Share charged at each further hop, /65536.
    pub next_frac: u32,
}

impl Default for MsgForwardPrices {
    fn default() -> Self {
        // Basechain values.
        Self {
            lump_price: 400_000,
            bit_price: 26_214_400,
            cell_price: 2_621_440_000,
            first_frac: 21845,
            next_frac: 21845,
        }
    }
}

/// A forward fee split into where its parts are charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FwdFee {
    /// The whole fee.
    pub total: u128,
    /// Part retained during the sender's action phase.
    pub action: u128,
    /// Part carried with the message; this is what a receiving contract
    /// observes as the incoming forward fee.
    pub in_transit: u128,
}

impl MsgForwardPrices {
    /// Check the fractions are representable.
    pub fn validate(&self) -> FeeResult<()> {
        if self.first_frac >= FRAC_DENOM as u32 {
            return Err(FeeError::FractionOutOfRange(self.first_frac));
        }
        if self.next_frac >= FRAC_DENOM as u32 {
            return Err(FeeError::FractionOutOfRange(self.next_frac));
        }
        Ok(())
    }

    /// Forward fee for a message of the given size.
    pub fn fwd_fee(&self, stats: CellStats) -> u128 {
        let weighted = self.bit_price as u128 * stats.bits as u128
            + self.cell_price as u128 * stats.cells as u128;
        self.lump_price as u128 + weighted.div_ceil(FRAC_DENOM)
    }

    /// Forward fee for a message, split into action-phase and in-transit
    /// parts.
    pub fn fwd_fee_components(&self, stats: CellStats) -> FwdFee {
        let total = self.fwd_fee(stats);
        let action = total * self.first_frac as u128 / FRAC_DENOM;
        FwdFee {
            total,
            action,
            in_transit: total - action,
        }
    }

    /// Reconstruct the full forward fee from the in-transit part a
    /// contract observed on an incoming message. Rounds up, so the
    /// estimate never undershoots the real fee.
    pub fn reverse_fwd_fee(&self, in_transit: u128) -> u128 {
        (in_transit * FRAC_DENOM).div_ceil(FRAC_DENOM - self.first_frac as u128)
    }
}

/// Gas prices from the chain config.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GasPrices {
    /// Price per gas unit, in 1/65536 nanotons.
    pub gas_price: u64,
    /// Gas covered by the flat price.
    pub flat_gas_limit: u64,
    /// Flat price for the first `flat_gas_limit` units.
    pub flat_gas_price: u64,
}

impl Default for GasPrices {
    fn default() -> Self {
        Self {
            gas_price: 26_214_400,
            flat_gas_limit: 100,
            flat_gas_price: 40_000,
        }
    }
}

impl GasPrices {
    /// Fee for the given amount of gas.
    pub fn gas_fee(&self, gas_used: u64) -> u128 {
        if gas_used <= self.flat_gas_limit {
            return self.flat_gas_price as u128;
        }
        let metered = (gas_used - self.flat_gas_limit) as u128 * self.gas_price as u128;
        self.flat_gas_price as u128 + metered.div_ceil(FRAC_DENOM)
    }
}

/// Storage prices from the chain config.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StoragePrices {
    /// Price per bit-second, in 1/65536 nanotons.
    pub bit_price_ps: u64,
    /// Price per cell-second, in 1/65536 nanotons.
    pub cell_price_ps: u64,
}

impl Default for StoragePrices {
    fn default() -> Self {
        Self {
            bit_price_ps: 1,
            cell_price_ps: 500,
        }
    }
}

impl StoragePrices {
    /// Storage fee for keeping `stats` persisted for `seconds`.
    pub fn storage_fee(&self, stats: CellStats, seconds: u64) -> u128 {
        let weighted = self.bit_price_ps as u128 * stats.bits as u128
            + self.cell_price_ps as u128 * stats.cells as u128;
        (weighted * seconds as u128).div_ceil(FRAC_DENOM)
    }
}

/// The fee bundle the ledger contracts consult.
///
/// The gas and storage constants are the amounts the contracts reserve
/// out of incoming value before forwarding the rest; they bound real
/// costs from above rather than tracking them exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeePolicy {
    /// Forward-message prices.
    pub fwd: MsgForwardPrices,
    /// Gas prices.
    pub gas: GasPrices,
    /// Storage prices.
    pub storage: StoragePrices,
    /// Gas budget reserved per handler run, in nanotons.
    pub gas_consumption: u128,
    /// Balance a wallet keeps for its own storage fees, in nanotons.
    pub min_tons_for_storage: u128,
    /// Gas budget of the wallet-address discovery handler, in nanotons.
    pub provide_address_gas: u128,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            fwd: MsgForwardPrices::default(),
            gas: GasPrices::default(),
            storage: StoragePrices::default(),
            gas_consumption: 15_000_000,
            min_tons_for_storage: 10_000_000,
            provide_address_gas: 10_000_000,
        }
    }
}
