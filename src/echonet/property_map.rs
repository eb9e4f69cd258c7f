//! Property map EDT codec (EPC 0x9D, 0x9E, 0x9F).
//!
//! The first byte is the number of properties. Below 16 the codes follow as
//! a plain list; from 16 on, 16 bitmap bytes follow where bit `i` of byte
//! `j` (1-based) stands for the code `((i + 8) << 4) | (j - 1)`.

use crate::constants::PROPERTY_MAP_BITMAP_THRESHOLD;
use crate::error::EchonetError;

const BITMAP_BYTES: usize = 16;

/// Decodes a property map EDT into its property codes.
pub fn decode_property_map(edt: &[u8]) -> Result<Vec<u8>, EchonetError> {
    let (&count, body) = edt
        .split_first()
        .ok_or_else(|| EchonetError::SchemaMismatch("empty property map".to_string()))?;
    let declared = count as usize;

    let codes: Vec<u8> = if declared < PROPERTY_MAP_BITMAP_THRESHOLD {
        if body.len() < declared {
            return Err(EchonetError::InvalidPropertyMap {
                declared,
                decoded: body.len(),
            });
        }
        body[..declared].to_vec()
    } else {
        if body.len() < BITMAP_BYTES {
            return Err(EchonetError::SchemaMismatch(format!(
                "bitmap property map needs {BITMAP_BYTES} bytes, got {}",
                body.len()
            )));
        }
        let mut codes = Vec::with_capacity(declared);
        for (low, byte) in body[..BITMAP_BYTES].iter().enumerate() {
            for bit in 0..8u8 {
                if byte & (1 << bit) != 0 {
                    codes.push(((bit + 8) << 4) | low as u8);
                }
            }
        }
        codes
    };

    if codes.len() != declared {
        return Err(EchonetError::InvalidPropertyMap {
            declared,
            decoded: codes.len(),
        });
    }
    Ok(codes)
}

/// Encodes property codes as a property map EDT.
///
/// Only 0x80..=0xFF are property codes; anything below is dropped before the
/// form is chosen, so the count byte always matches the encoded body.
pub fn encode_property_map(codes: &[u8]) -> Vec<u8> {
    let mut codes: Vec<u8> = codes.iter().copied().filter(|&code| code >= 0x80).collect();
    codes.sort_unstable();
    codes.dedup();

    if codes.len() < PROPERTY_MAP_BITMAP_THRESHOLD {
        let mut edt = Vec::with_capacity(codes.len() + 1);
        edt.push(codes.len() as u8);
        edt.extend_from_slice(&codes);
        return edt;
    }

    let mut edt = vec![0u8; BITMAP_BYTES + 1];
    edt[0] = codes.len() as u8;
    for code in codes {
        let low = (code & 0x0F) as usize;
        let bit = (code >> 4) - 8;
        edt[low + 1] |= 1 << bit;
    }
    edt
}
