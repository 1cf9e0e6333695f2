//! Message addresses.

use crate::{CellError, CellResult};

/// A message address.
///
/// The ledger protocol deals with three forms: no address (used for
/// "none of" optional response destinations and the null-address reply
/// sentinel), external addresses (only ever echoed back, never routed
/// to), and standard internal addresses identifying accounts by
/// workchain and 256-bit hash.
///
/// # Example
///
/// ```
/// use jetton_cell::MsgAddress;
///
/// let addr = MsgAddress::from_string(
///     "0:0000000000000000000000000000000000000000000000000000000000000000",
/// )
/// .unwrap();
/// assert!(addr.is_internal());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum MsgAddress {
    /// No address (`addr_none$00`).
    #[default]
    Null,

    /// External address (`addr_extern$01`).
    External {
        /// Length in bits.
        len: u16,
        /// Address data, most significant bit first.
        data: Vec<u8>,
    },

    /// Internal account address (`addr_std$10`).
    Internal {
        /// Workchain: -1 masterchain, 0 basechain.
        workchain: i32,
        /// 256-bit account hash.
        address: [u8; 32],
    },
}

impl MsgAddress {
    /// Build an internal address.
    pub fn internal(workchain: i32, address: [u8; 32]) -> Self {
        MsgAddress::Internal { workchain, address }
    }

    /// Parse an address from a string.
    ///
    /// Accepts the raw `workchain:hex` form and the 48-character
    /// user-friendly base64 form with CRC16 checksum.
    pub fn from_string(s: &str) -> CellResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(MsgAddress::Null);
        }

        if let Some((workchain, hex)) = s.split_once(':') {
            let workchain: i32 = workchain
                .parse()
                .map_err(|_| CellError::InvalidAddress(format!("bad workchain: {workchain}")))?;
            if hex.len() != 64 {
                return Err(CellError::InvalidAddress(format!(
                    "account hex must be 64 characters, got {}",
                    hex.len()
                )));
            }
            let mut address = [0u8; 32];
            for (i, byte) in address.iter_mut().enumerate() {
                *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                    .map_err(|_| CellError::InvalidAddress(format!("bad hex: {hex}")))?;
            }
            return Ok(MsgAddress::Internal { workchain, address });
        }

        if s.len() == 48 {
            return Self::from_user_friendly(s);
        }

        Err(CellError::InvalidAddress(format!(
            "unrecognized address format: {s}"
        )))
    }

    /// Parse a user-friendly address: base64(tag ‖ workchain ‖ hash ‖ crc16).
    fn from_user_friendly(s: &str) -> CellResult<Self> {
        let normalized: String = s
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                c => c,
            })
            .collect();

        let bytes = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            normalized.as_bytes(),
        )
        .map_err(|e| CellError::InvalidBase64(e.to_string()))?;

        if bytes.len() != 36 {
            return Err(CellError::InvalidAddress(format!(
                "user-friendly address must decode to 36 bytes, got {}",
                bytes.len()
            )));
        }

        let expected = u16::from_be_bytes([bytes[34], bytes[35]]);
        let actual = crc16_xmodem(&bytes[..34]);
        if expected != actual {
            return Err(CellError::InvalidAddress(format!(
                "checksum mismatch: expected {expected:04x}, got {actual:04x}"
            )));
        }

        let workchain = bytes[1] as i8 as i32;
        let mut address = [0u8; 32];
        address.copy_from_slice(&bytes[2..34]);
        Ok(MsgAddress::Internal { workchain, address })
    }

    /// Format as the raw `workchain:hex` string.
    pub fn to_raw_string(&self) -> String {
        match self {
            MsgAddress::Null => String::new(),
            MsgAddress::External { len, data } => {
                let hex: String = data.iter().map(|b| format!("{b:02x}")).collect();
                format!("extern:{len}:{hex}")
            }
            MsgAddress::Internal { workchain, address } => {
                let hex: String = address.iter().map(|b| format!("{b:02x}")).collect();
                format!("{workchain}:{hex}")
            }
        }
    }

    /// Format as the user-friendly base64 form. Internal addresses only.
    pub fn to_user_friendly(&self, bounceable: bool) -> Option<String> {
        let MsgAddress::Internal { workchain, address } = self else {
            return None;
        };

        let mut bytes = Vec::with_capacity(36);
        bytes.push(if bounceable { 0x11 } else { 0x51 });
        bytes.push(*workchain as i8 as u8);
        bytes.extend_from_slice(address);
        let crc = crc16_xmodem(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());

        Some(base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            bytes,
        ))
    }

    /// Workchain of an internal address.
    pub fn workchain(&self) -> Option<i32> {
        match self {
            MsgAddress::Internal { workchain, .. } => Some(*workchain),
            _ => None,
        }
    }

    /// 256-bit account hash of an internal address.
    pub fn hash_part(&self) -> Option<&[u8; 32]> {
        match self {
            MsgAddress::Internal { address, .. } => Some(address),
            _ => None,
        }
    }

    /// True for `addr_none`.
    pub fn is_null(&self) -> bool {
        matches!(self, MsgAddress::Null)
    }

    /// True for an internal account address.
    pub fn is_internal(&self) -> bool {
        matches!(self, MsgAddress::Internal { .. })
    }

    /// True for a masterchain (workchain -1) address.
    pub fn is_masterchain(&self) -> bool {
        self.workchain() == Some(-1)
    }
}

impl std::fmt::Display for MsgAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_raw_string())
    }
}

/// CRC16-XMODEM, the checksum of the user-friendly address form.
fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
