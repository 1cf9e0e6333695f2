//! CellBuilder: sequential construction of cells.

use std::sync::Arc;

use crate::{Cell, CellError, CellResult, CellSlice, MsgAddress, MAX_CELL_BITS, MAX_CELL_REFS};

/// Builder for cells.
///
/// Values are appended most-significant-bit first; `build` finalizes the
/// cell and computes its representation hash.
///
/// # Example
///
/// ```
/// use jetton_cell::CellBuilder;
///
/// let mut builder = CellBuilder::new();
/// builder.store_u32(0x595f07bc).unwrap();
/// builder.store_u64(42).unwrap();
/// let cell = builder.build().unwrap();
/// assert_eq!(cell.bit_len(), 96);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
}

impl CellBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single bit.
    pub fn store_bit(&mut self, bit: bool) -> CellResult<&mut Self> {
        if self.bit_len >= MAX_CELL_BITS {
            return Err(CellError::DataOverflow(self.bit_len + 1));
        }

        let byte_index = self.bit_len / 8;
        if byte_index >= self.data.len() {
            self.data.push(0);
        }
        if bit {
            self.data[byte_index] |= 1 << (7 - self.bit_len % 8);
        }
        self.bit_len += 1;
        Ok(self)
    }

    /// Append an unsigned integer of the given bit width (big-endian).
    pub fn store_uint(&mut self, value: u64, bits: usize) -> CellResult<&mut Self> {
        if bits > 64 {
            return Err(CellError::InvalidBitWidth(bits));
        }
        if bits < 64 && value >> bits != 0 {
            return Err(CellError::ValueOutOfRange(format!(
                "{value} does not fit in {bits} bits"
            )));
        }
        if self.bit_len + bits > MAX_CELL_BITS {
            return Err(CellError::DataOverflow(self.bit_len + bits));
        }

        for i in (0..bits).rev() {
            self.store_bit((value >> i) & 1 == 1)?;
        }
        Ok(self)
    }

    /// Append a signed integer of the given bit width (two's complement).
    pub fn store_int(&mut self, value: i64, bits: usize) -> CellResult<&mut Self> {
        if bits > 64 {
            return Err(CellError::InvalidBitWidth(bits));
        }
        if bits == 0 {
            return Ok(self);
        }
        // Mask to the requested width; the sign bit survives truncation.
        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        let truncated = (value as u64) & mask;
        for i in (0..bits).rev() {
            self.store_bit((truncated >> i) & 1 == 1)?;
        }
        Ok(self)
    }

    /// Append an unsigned 8-bit integer.
    pub fn store_u8(&mut self, value: u8) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 8)
    }

    /// Append an unsigned 16-bit integer.
    pub fn store_u16(&mut self, value: u16) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 16)
    }

    /// Append an unsigned 32-bit integer.
    pub fn store_u32(&mut self, value: u32) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 32)
    }

    /// Append an unsigned 64-bit integer.
    pub fn store_u64(&mut self, value: u64) -> CellResult<&mut Self> {
        self.store_uint(value, 64)
    }

    /// Append a signed 8-bit integer.
    pub fn store_i8(&mut self, value: i8) -> CellResult<&mut Self> {
        self.store_int(value as i64, 8)
    }

    /// Append a signed 32-bit integer.
    pub fn store_i32(&mut self, value: i32) -> CellResult<&mut Self> {
        self.store_int(value as i64, 32)
    }

    /// Append a byte string.
    pub fn store_bytes(&mut self, bytes: &[u8]) -> CellResult<&mut Self> {
        for &byte in bytes {
            self.store_u8(byte)?;
        }
        Ok(self)
    }

    /// Append a coin amount (`VarUInteger 16`): 4 length bits, then the
    /// value in that many bytes, big-endian. Zero is the bare length 0.
    pub fn store_coins(&mut self, amount: u128) -> CellResult<&mut Self> {
        if amount == 0 {
            return self.store_uint(0, 4);
        }

        let byte_len = ((128 - amount.leading_zeros() as usize) + 7) / 8;
        if byte_len > 15 {
            return Err(CellError::ValueOutOfRange(format!(
                "coin amount needs {byte_len} bytes (max 15)"
            )));
        }

        self.store_uint(byte_len as u64, 4)?;
        for i in (0..byte_len).rev() {
            self.store_u8((amount >> (i * 8)) as u8)?;
        }
        Ok(self)
    }

    /// Append a message address in its TL-B form.
    pub fn store_address(&mut self, address: &MsgAddress) -> CellResult<&mut Self> {
        match address {
            MsgAddress::Null => {
                // addr_none$00
                self.store_uint(0b00, 2)
            }
            MsgAddress::External { len, data } => {
                // addr_extern$01 len:(## 9) external_address:(bits len)
                self.store_uint(0b01, 2)?;
                self.store_uint(*len as u64, 9)?;
                for i in 0..*len as usize {
                    let bit = data
                        .get(i / 8)
                        .map(|byte| byte >> (7 - i % 8) & 1 == 1)
                        .unwrap_or(false);
                    self.store_bit(bit)?;
                }
                Ok(self)
            }
            MsgAddress::Internal { workchain, address } => {
                // addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256
                self.store_uint(0b10, 2)?;
                self.store_bit(false)?;
                self.store_int(*workchain as i64, 8)?;
                self.store_bytes(address)
            }
        }
    }

    /// Append a reference to another cell.
    pub fn store_ref(&mut self, cell: Arc<Cell>) -> CellResult<&mut Self> {
        if self.references.len() >= MAX_CELL_REFS {
            return Err(CellError::TooManyRefs(self.references.len() + 1));
        }
        self.references.push(cell);
        Ok(self)
    }

    /// Append a `Maybe ^Cell`: presence bit, then the reference if any.
    pub fn store_maybe_ref(&mut self, cell: Option<Arc<Cell>>) -> CellResult<&mut Self> {
        match cell {
            Some(cell) => {
                self.store_bit(true)?;
                self.store_ref(cell)
            }
            None => self.store_bit(false),
        }
    }

    /// Append everything remaining in a slice: its unread bits followed
    /// by its unread references.
    pub fn store_slice(&mut self, slice: &CellSlice<'_>) -> CellResult<&mut Self> {
        let mut copy = slice.clone();
        while copy.bits_left() > 0 {
            let bit = copy.load_bit()?;
            self.store_bit(bit)?;
        }
        while copy.refs_left() > 0 {
            let reference = copy.load_ref()?;
            self.store_ref(reference.clone())?;
        }
        Ok(self)
    }

    /// Bits that can still be stored.
    pub fn bits_left(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    /// References that can still be added.
    pub fn refs_left(&self) -> usize {
        MAX_CELL_REFS - self.references.len()
    }

    /// Bits stored so far.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// References stored so far.
    pub fn ref_count(&self) -> usize {
        self.references.len()
    }

    /// Finalize the cell.
    pub fn build(self) -> CellResult<Cell> {
        Ok(Cell::assemble(self.data, self.bit_len, self.references))
    }
}
