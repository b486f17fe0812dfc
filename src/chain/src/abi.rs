//! Minimal ABI encoding for the token calls the gate needs
//!
//! Only two call shapes are supported: `balanceOf(address)` (ERC20 and
//! ERC721) and `ownerOf(uint256)` (ERC721). Return values are single
//! 32-byte words.

use num_bigint::BigUint;
use sha3::{Digest, Keccak256};

use crate::address::{Address, ADDRESS_LEN};
use crate::error::{ChainError, Result};

/// Size of one ABI word
pub const WORD_LEN: usize = 32;

/// `keccak256("balanceOf(address)")[..4]`
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// `keccak256("ownerOf(uint256)")[..4]`
pub const OWNER_OF_SELECTOR: [u8; 4] = [0x63, 0x52, 0x21, 0x1e];

/// Compute the 4-byte function selector for a canonical signature
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// Encode `balanceOf(holder)`
pub fn encode_balance_of(holder: &Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD_LEN);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    data.extend_from_slice(&[0u8; WORD_LEN - ADDRESS_LEN]);
    data.extend_from_slice(holder.as_bytes());
    data
}

/// Encode `ownerOf(token_id)`
pub fn encode_owner_of(token_id: &BigUint) -> Result<Vec<u8>> {
    let word = uint256_word(token_id)?;
    let mut data = Vec::with_capacity(4 + WORD_LEN);
    data.extend_from_slice(&OWNER_OF_SELECTOR);
    data.extend_from_slice(&word);
    Ok(data)
}

/// Left-pad a value into a big-endian uint256 word
pub fn uint256_word(value: &BigUint) -> Result<[u8; WORD_LEN]> {
    let bytes = value.to_bytes_be();
    if bytes.len() > WORD_LEN {
        return Err(ChainError::Validation(format!(
            "value {value} does not fit in uint256"
        )));
    }
    let mut word = [0u8; WORD_LEN];
    word[WORD_LEN - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

/// Decode the first return word as an unsigned 256-bit integer
pub fn decode_uint256(raw: &[u8]) -> Result<BigUint> {
    let word = first_word(raw)?;
    Ok(BigUint::from_bytes_be(word))
}

/// Decode the first return word as a right-aligned address
///
/// The 12 leading bytes must be zero; anything else is not an ABI-encoded
/// address.
pub fn decode_address(raw: &[u8]) -> Result<Address> {
    let word = first_word(raw)?;
    let (padding, body) = word.split_at(WORD_LEN - ADDRESS_LEN);
    if padding.iter().any(|b| *b != 0) {
        return Err(ChainError::Decode(format!(
            "address word has non-zero padding: 0x{}",
            hex::encode(word)
        )));
    }
    let mut bytes = [0u8; ADDRESS_LEN];
    bytes.copy_from_slice(body);
    Ok(Address::from_bytes(bytes))
}

fn first_word(raw: &[u8]) -> Result<&[u8]> {
    if raw.len() < WORD_LEN {
        return Err(ChainError::Decode(format!(
            "expected at least {WORD_LEN} bytes, got {}",
            raw.len()
        )));
    }
    Ok(&raw[..WORD_LEN])
}
