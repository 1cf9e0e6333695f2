//! Token metadata content cells.
//!
//! The minter stores its content as an opaque cell; this module builds
//! and reads the two standard layouts. On-chain content is a 0x00 tag
//! followed by a sha256-keyed dictionary of snake-format strings;
//! off-chain content is a 0x01 tag followed by a snake-format URI.
//! Metadata is immutable business data, never consulted by any
//! authorization or balance rule.

use std::collections::BTreeMap;
use std::sync::Arc;

use jetton_cell::{Cell, CellBuilder, CellResult, CellSlice};
use sha2::{Digest, Sha256};

use crate::error::{LedgerError, LedgerResult};

/// Tag byte of on-chain content.
pub const ONCHAIN_TAG: u8 = 0x00;

/// Tag byte of off-chain content.
pub const OFFCHAIN_TAG: u8 = 0x01;

/// Dictionary keys are sha256 of the field name.
const KEY_BITS: usize = 256;

/// Field names this module maps back from their hashes when parsing.
const KNOWN_FIELDS: &[&str] = &[
    "uri",
    "name",
    "description",
    "image",
    "image_data",
    "symbol",
    "decimals",
];

/// Token content in either standard layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenContent {
    /// Metadata stored in the contract itself.
    Onchain {
        /// Field name to value, e.g. "symbol" → "TJT".
        fields: BTreeMap<String, String>,
    },
    /// URI pointing at external JSON metadata.
    Offchain { uri: String },
}

impl TokenContent {
    /// On-chain content from (field, value) pairs.
    pub fn onchain<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        TokenContent::Onchain {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Off-chain content pointing at `uri`.
    pub fn offchain(uri: impl Into<String>) -> Self {
        TokenContent::Offchain { uri: uri.into() }
    }

    /// Serialize to the content cell the minter persists.
    pub fn to_cell(&self) -> CellResult<Cell> {
        match self {
            TokenContent::Onchain { fields } => {
                let mut entries = BTreeMap::new();
                for (key, value) in fields {
                    let mut cell = CellBuilder::new();
                    cell.store_u8(0x00)?; // snake-format marker
                    store_snake(&mut cell, value.as_bytes())?;
                    entries.insert(sha256_key(key), Arc::new(cell.build()?));
                }

                let mut builder = CellBuilder::new();
                builder.store_u8(ONCHAIN_TAG)?;
                match build_dict(&entries)? {
                    Some(root) => builder.store_maybe_ref(Some(root))?,
                    None => builder.store_maybe_ref(None)?,
                };
                builder.build()
            }
            TokenContent::Offchain { uri } => {
                let mut builder = CellBuilder::new();
                builder.store_u8(OFFCHAIN_TAG)?;
                store_snake(&mut builder, uri.as_bytes())?;
                builder.build()
            }
        }
    }

    /// Parse a persisted content cell.
    ///
    /// Dictionary keys whose hash matches no known field name are
    /// skipped; the protocol never depends on them.
    pub fn from_cell(cell: &Cell) -> LedgerResult<Self> {
        let mut slice = CellSlice::new(cell);
        match slice.load_u8()? {
            ONCHAIN_TAG => {
                let mut fields = BTreeMap::new();
                if let Some(root) = slice.load_maybe_ref()? {
                    let known: BTreeMap<[u8; 32], &str> = KNOWN_FIELDS
                        .iter()
                        .map(|name| (sha256_key(name), *name))
                        .collect();
                    for (key, value) in parse_dict(root)? {
                        if let Some(name) = known.get(&key) {
                            let mut value_slice = CellSlice::new(&value);
                            if value_slice.load_u8()? != 0x00 {
                                return Err(LedgerError::Malformed(
                                    "content value without snake marker".into(),
                                ));
                            }
                            let bytes = load_snake(&mut value_slice)?;
                            let text = String::from_utf8(bytes).map_err(|e| {
                                LedgerError::Malformed(format!("content not utf-8: {e}"))
                            })?;
                            fields.insert(name.to_string(), text);
                        }
                    }
                }
                Ok(TokenContent::Onchain { fields })
            }
            OFFCHAIN_TAG => {
                let bytes = load_snake(&mut slice)?;
                let uri = String::from_utf8(bytes)
                    .map_err(|e| LedgerError::Malformed(format!("uri not utf-8: {e}")))?;
                Ok(TokenContent::Offchain { uri })
            }
            tag => Err(LedgerError::Malformed(format!(
                "unknown content tag 0x{tag:02x}"
            ))),
        }
    }
}

fn sha256_key(name: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.finalize().into()
}

/// Store bytes in snake format: fill the current cell, continue in a
/// single reference chain.
fn store_snake(builder: &mut CellBuilder, bytes: &[u8]) -> CellResult<()> {
    let fits = builder.bits_left() / 8;
    if bytes.len() <= fits {
        builder.store_bytes(bytes)?;
        return Ok(());
    }
    builder.store_bytes(&bytes[..fits])?;
    let mut tail = CellBuilder::new();
    store_snake(&mut tail, &bytes[fits..])?;
    builder.store_ref(Arc::new(tail.build()?))?;
    Ok(())
}

/// Read a snake-format byte string: the remainder of this cell, then
/// the reference chain.
fn load_snake(slice: &mut CellSlice<'_>) -> LedgerResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut current = slice.clone();
    loop {
        while current.bits_left() >= 8 {
            bytes.push(current.load_u8()?);
        }
        match current.refs_left() {
            0 => break,
            _ => {
                let next = current.load_ref()?;
                current = CellSlice::new(next);
            }
        }
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// HashmapE 256 ^Cell
//
// A binary trie over the 256-bit key space. Each node carries an edge
// label; a node whose label exhausts the key holds the value reference,
// any other node forks into a 0-child and a 1-child.
// ---------------------------------------------------------------------------

/// Build the dictionary root. `None` for an empty dictionary.
fn build_dict(entries: &BTreeMap<[u8; 32], Arc<Cell>>) -> CellResult<Option<Arc<Cell>>> {
    if entries.is_empty() {
        return Ok(None);
    }
    let items: Vec<(Vec<bool>, Arc<Cell>)> = entries
        .iter()
        .map(|(key, value)| (key_to_bits(key), value.clone()))
        .collect();
    Ok(Some(Arc::new(build_node(&items, KEY_BITS)?)))
}

fn key_to_bits(key: &[u8; 32]) -> Vec<bool> {
    (0..KEY_BITS)
        .map(|i| key[i / 8] >> (7 - i % 8) & 1 == 1)
        .collect()
}

fn bits_to_key(bits: &[bool]) -> [u8; 32] {
    let mut key = [0u8; 32];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            key[i / 8] |= 1 << (7 - i % 8);
        }
    }
    key
}

/// Bits needed for a length field covering 0..=n.
fn len_bits(n: usize) -> usize {
    (usize::BITS - n.leading_zeros()) as usize
}

fn build_node(items: &[(Vec<bool>, Arc<Cell>)], n: usize) -> CellResult<Cell> {
    debug_assert!(!items.is_empty());

    // Longest common prefix of the remaining key bits.
    let first = &items[0].0;
    let mut lcp = first.len();
    for (bits, _) in &items[1..] {
        let common = first
            .iter()
            .zip(bits.iter())
            .take_while(|(a, b)| a == b)
            .count();
        lcp = lcp.min(common);
    }

    let mut builder = CellBuilder::new();
    store_label(&mut builder, &first[..lcp], n)?;

    if items.len() == 1 {
        // Leaf: the label consumed the whole key.
        debug_assert_eq!(lcp, n);
        builder.store_ref(items[0].1.clone())?;
        return builder.build();
    }

    let strip = |keep_bit: bool| -> Vec<(Vec<bool>, Arc<Cell>)> {
        items
            .iter()
            .filter(|(bits, _)| bits[lcp] == keep_bit)
            .map(|(bits, value)| (bits[lcp + 1..].to_vec(), value.clone()))
            .collect()
    };
    let left = strip(false);
    let right = strip(true);

    builder.store_ref(Arc::new(build_node(&left, n - lcp - 1)?))?;
    builder.store_ref(Arc::new(build_node(&right, n - lcp - 1)?))?;
    builder.build()
}

/// Write an edge label in the `hml_long` form: the `10` tag, the
/// length field, then the label bits.
fn store_label(builder: &mut CellBuilder, label: &[bool], n: usize) -> CellResult<()> {
    builder.store_bit(true)?;
    builder.store_bit(false)?;
    builder.store_uint(label.len() as u64, len_bits(n))?;
    for &bit in label {
        builder.store_bit(bit)?;
    }
    Ok(())
}

/// Read an edge label in any of the three standard forms.
fn load_label(slice: &mut CellSlice<'_>, n: usize) -> LedgerResult<Vec<bool>> {
    if !slice.load_bit()? {
        // hml_short$0: unary length, then the bits.
        let mut len = 0;
        while slice.load_bit()? {
            len += 1;
        }
        return load_bits(slice, len);
    }
    if !slice.load_bit()? {
        // hml_long$10: binary length, then the bits.
        let len = slice.load_uint(len_bits(n))? as usize;
        return load_bits(slice, len);
    }
    // hml_same$11: one bit repeated.
    let bit = slice.load_bit()?;
    let len = slice.load_uint(len_bits(n))? as usize;
    Ok(vec![bit; len])
}

fn load_bits(slice: &mut CellSlice<'_>, len: usize) -> LedgerResult<Vec<bool>> {
    let mut bits = Vec::with_capacity(len);
    for _ in 0..len {
        bits.push(slice.load_bit()?);
    }
    Ok(bits)
}

/// Collect every (key, value) leaf of a dictionary.
fn parse_dict(root: &Arc<Cell>) -> LedgerResult<Vec<([u8; 32], Arc<Cell>)>> {
    fn walk(
        cell: &Arc<Cell>,
        prefix: Vec<bool>,
        n: usize,
        out: &mut Vec<([u8; 32], Arc<Cell>)>,
    ) -> LedgerResult<()> {
        let mut slice = CellSlice::new(cell);
        let label = load_label(&mut slice, n)?;
        if label.len() > n {
            return Err(LedgerError::Malformed("dictionary label too long".into()));
        }

        let mut prefix = prefix;
        prefix.extend_from_slice(&label);
        let remaining = n - label.len();

        if remaining == 0 {
            let value = slice.load_ref()?.clone();
            out.push((bits_to_key(&prefix), value));
            return Ok(());
        }

        let left = slice.load_ref()?.clone();
        let right = slice.load_ref()?.clone();

        let mut left_prefix = prefix.clone();
        left_prefix.push(false);
        walk(&left, left_prefix, remaining - 1, out)?;

        prefix.push(true);
        walk(&right, prefix, remaining - 1, out)
    }

    let mut out = Vec::new();
    walk(root, Vec::new(), KEY_BITS, &mut out)?;
    Ok(out)
}
