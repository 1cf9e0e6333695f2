//! CellSlice: sequential reading of cell data.

use crate::{Cell, CellError, CellResult, MsgAddress};

use std::sync::Arc;

/// A read cursor over a cell.
///
/// Tracks the current bit and reference position; every `load_*` either
/// returns the decoded value or fails without advancing past the end.
///
/// # Example
///
/// ```
/// use jetton_cell::{CellBuilder, CellSlice};
///
/// let mut builder = CellBuilder::new();
/// builder.store_u32(0x178d4519).unwrap();
/// let cell = builder.build().unwrap();
///
/// let mut slice = CellSlice::new(&cell);
/// assert_eq!(slice.load_u32().unwrap(), 0x178d4519);
/// ```
#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_offset: usize,
    ref_offset: usize,
}

impl<'a> CellSlice<'a> {
    /// Create a slice positioned at the start of `cell`.
    pub fn new(cell: &'a Cell) -> Self {
        CellSlice {
            cell,
            bit_offset: 0,
            ref_offset: 0,
        }
    }

    /// Read a single bit.
    pub fn load_bit(&mut self) -> CellResult<bool> {
        if self.bits_left() == 0 {
            return Err(CellError::NotEnoughBits { need: 1, have: 0 });
        }
        let byte = self.cell.data()[self.bit_offset / 8];
        let bit = byte >> (7 - self.bit_offset % 8) & 1 == 1;
        self.bit_offset += 1;
        Ok(bit)
    }

    /// Read an unsigned integer of the given bit width (big-endian).
    pub fn load_uint(&mut self, bits: usize) -> CellResult<u64> {
        if bits > 64 {
            return Err(CellError::InvalidBitWidth(bits));
        }
        if bits > self.bits_left() {
            return Err(CellError::NotEnoughBits {
                need: bits,
                have: self.bits_left(),
            });
        }

        let mut value = 0u64;
        for _ in 0..bits {
            value = (value << 1) | self.load_bit()? as u64;
        }
        Ok(value)
    }

    /// Read a signed integer of the given bit width (two's complement).
    pub fn load_int(&mut self, bits: usize) -> CellResult<i64> {
        if bits == 0 {
            return Ok(0);
        }
        let unsigned = self.load_uint(bits)?;
        if bits < 64 && unsigned >> (bits - 1) & 1 == 1 {
            // Sign-extend.
            Ok((unsigned | !((1u64 << bits) - 1)) as i64)
        } else {
            Ok(unsigned as i64)
        }
    }

    /// Read an unsigned 8-bit integer.
    pub fn load_u8(&mut self) -> CellResult<u8> {
        self.load_uint(8).map(|v| v as u8)
    }

    /// Read an unsigned 16-bit integer.
    pub fn load_u16(&mut self) -> CellResult<u16> {
        self.load_uint(16).map(|v| v as u16)
    }

    /// Read an unsigned 32-bit integer.
    pub fn load_u32(&mut self) -> CellResult<u32> {
        self.load_uint(32).map(|v| v as u32)
    }

    /// Read an unsigned 64-bit integer.
    pub fn load_u64(&mut self) -> CellResult<u64> {
        self.load_uint(64)
    }

    /// Read a signed 8-bit integer.
    pub fn load_i8(&mut self) -> CellResult<i8> {
        self.load_int(8).map(|v| v as i8)
    }

    /// Read a signed 32-bit integer.
    pub fn load_i32(&mut self) -> CellResult<i32> {
        self.load_int(32).map(|v| v as i32)
    }

    /// Read a byte string of the given length.
    pub fn load_bytes(&mut self, len: usize) -> CellResult<Vec<u8>> {
        if len * 8 > self.bits_left() {
            return Err(CellError::NotEnoughBits {
                need: len * 8,
                have: self.bits_left(),
            });
        }
        (0..len).map(|_| self.load_u8()).collect()
    }

    /// Read a coin amount (`VarUInteger 16`).
    pub fn load_coins(&mut self) -> CellResult<u128> {
        let byte_len = self.load_uint(4)? as usize;
        let mut amount = 0u128;
        for _ in 0..byte_len {
            amount = (amount << 8) | self.load_u8()? as u128;
        }
        Ok(amount)
    }

    /// Read a message address in its TL-B form.
    ///
    /// `addr_var$11` is folded into the standard internal form; anycast
    /// prefixes are skipped.
    pub fn load_address(&mut self) -> CellResult<MsgAddress> {
        match self.load_uint(2)? {
            0b00 => Ok(MsgAddress::Null),
            0b01 => {
                let len = self.load_uint(9)? as u16;
                let mut data = vec![0u8; (len as usize).div_ceil(8)];
                for i in 0..len as usize {
                    if self.load_bit()? {
                        data[i / 8] |= 1 << (7 - i % 8);
                    }
                }
                Ok(MsgAddress::External { len, data })
            }
            0b10 => {
                self.skip_anycast()?;
                let workchain = self.load_int(8)? as i32;
                let bytes = self.load_bytes(32)?;
                let mut address = [0u8; 32];
                address.copy_from_slice(&bytes);
                Ok(MsgAddress::Internal { workchain, address })
            }
            _ => {
                // addr_var$11 addr_len:(## 9) workchain_id:int32 address:(bits addr_len)
                self.skip_anycast()?;
                let addr_len = self.load_uint(9)? as usize;
                let workchain = self.load_int(32)?;
                let mut address = [0u8; 32];
                for i in 0..addr_len.min(256) {
                    if self.load_bit()? {
                        address[i / 8] |= 1 << (7 - i % 8);
                    }
                }
                if addr_len > 256 {
                    self.skip_bits(addr_len - 256)?;
                }
                Ok(MsgAddress::Internal {
                    workchain: workchain as i32,
                    address,
                })
            }
        }
    }

    fn skip_anycast(&mut self) -> CellResult<()> {
        if self.load_bit()? {
            let depth = self.load_uint(5)? as usize;
            self.skip_bits(depth)?;
        }
        Ok(())
    }

    /// Read the next reference.
    pub fn load_ref(&mut self) -> CellResult<&'a Arc<Cell>> {
        let reference = self
            .cell
            .reference(self.ref_offset)
            .ok_or(CellError::NotEnoughRefs { need: 1, have: 0 })?;
        self.ref_offset += 1;
        Ok(reference)
    }

    /// Read a `Maybe ^Cell`: presence bit, then the reference if set.
    ///
    /// A set presence bit with no reference behind it is an underflow,
    /// which the protocol layer surfaces as a malformed message.
    pub fn load_maybe_ref(&mut self) -> CellResult<Option<&'a Arc<Cell>>> {
        if self.load_bit()? {
            self.load_ref().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Skip `count` bits.
    pub fn skip_bits(&mut self, count: usize) -> CellResult<()> {
        if count > self.bits_left() {
            return Err(CellError::NotEnoughBits {
                need: count,
                have: self.bits_left(),
            });
        }
        self.bit_offset += count;
        Ok(())
    }

    /// Bits not yet read.
    pub fn bits_left(&self) -> usize {
        self.cell.bit_len() - self.bit_offset
    }

    /// References not yet read.
    pub fn refs_left(&self) -> usize {
        self.cell.reference_count() - self.ref_offset
    }

    /// True when neither bits nor references remain.
    pub fn is_empty(&self) -> bool {
        self.bits_left() == 0 && self.refs_left() == 0
    }

    /// The underlying cell.
    pub fn cell(&self) -> &'a Cell {
        self.cell
    }
}
