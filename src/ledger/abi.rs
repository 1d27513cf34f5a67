//! Solidity ABI codec for the handful of types the registry contract uses
//!
//! Only `string`, `uint256`, `bool` and `address` are supported, encoded with
//! the standard head/tail layout. Everything the gateway sends or reads from
//! the contract fits in that set.

use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

const WORD: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("return data truncated: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("offset {0} out of bounds")]
    OffsetOutOfBounds(usize),

    #[error("integer does not fit in {0}")]
    Overflow(&'static str),

    #[error("invalid bool word")]
    InvalidBool,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("expected {0} token")]
    UnexpectedToken(&'static str),

    #[error("unsupported ABI type: {0}")]
    UnsupportedType(String),
}

/// ABI parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Uint256,
    Bool,
    Address,
}

impl ParamKind {
    pub fn parse(ty: &str) -> Result<Self, AbiError> {
        match ty {
            "string" => Ok(Self::String),
            "uint256" | "uint" => Ok(Self::Uint256),
            "bool" => Ok(Self::Bool),
            "address" => Ok(Self::Address),
            other => Err(AbiError::UnsupportedType(other.to_string())),
        }
    }

    /// Canonical type name used in function signatures
    pub const fn canonical(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Uint256 => "uint256",
            Self::Bool => "bool",
            Self::Address => "address",
        }
    }
}

/// A decoded or to-be-encoded ABI value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    String(String),
    Uint(u128),
    Bool(bool),
    Address([u8; 20]),
}

impl Token {
    pub fn into_string(self) -> Result<String, AbiError> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(AbiError::UnexpectedToken("string")),
        }
    }

    pub fn as_u64(&self) -> Result<u64, AbiError> {
        match self {
            Self::Uint(v) => u64::try_from(*v).map_err(|_| AbiError::Overflow("u64")),
            _ => Err(AbiError::UnexpectedToken("uint256")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, AbiError> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(AbiError::UnexpectedToken("bool")),
        }
    }

    pub fn as_address(&self) -> Result<[u8; 20], AbiError> {
        match self {
            Self::Address(a) => Ok(*a),
            _ => Err(AbiError::UnexpectedToken("address")),
        }
    }
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut out = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut out);
    out
}

/// First four bytes of the keccak-256 of a canonical function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Calldata for `signature` called with `args`
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend(encode_args(args));
    data
}

/// Head/tail encoding of an argument tuple
pub fn encode_args(args: &[Token]) -> Vec<u8> {
    let head_len = args.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in args {
        match token {
            Token::String(s) => {
                // Offsets are relative to the start of the tuple
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
                tail.extend_from_slice(&uint_word(s.len() as u128));
                tail.extend_from_slice(s.as_bytes());
                tail.resize(tail.len() + padding(s.len()), 0);
            }
            Token::Uint(v) => head.extend_from_slice(&uint_word(*v)),
            Token::Bool(b) => head.extend_from_slice(&uint_word(u128::from(*b))),
            Token::Address(a) => {
                let mut word = [0u8; WORD];
                word[12..].copy_from_slice(a);
                head.extend_from_slice(&word);
            }
        }
    }

    head.extend(tail);
    head
}

/// Decode a return tuple of the given shape
pub fn decode(kinds: &[ParamKind], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    let needed = kinds.len() * WORD;
    if data.len() < needed {
        return Err(AbiError::Truncated {
            needed,
            got: data.len(),
        });
    }

    kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            let word = read_word(data, i * WORD)?;
            match kind {
                ParamKind::Uint256 => word_to_u128(word).map(Token::Uint),
                ParamKind::Bool => match word_to_u128(word)? {
                    0 => Ok(Token::Bool(false)),
                    1 => Ok(Token::Bool(true)),
                    _ => Err(AbiError::InvalidBool),
                },
                ParamKind::Address => {
                    if word[..12].iter().any(|b| *b != 0) {
                        return Err(AbiError::InvalidAddress(hex::encode(word)));
                    }
                    let mut address = [0u8; 20];
                    address.copy_from_slice(&word[12..]);
                    Ok(Token::Address(address))
                }
                ParamKind::String => decode_string(data, word_to_usize(word)?),
            }
        })
        .collect()
}

fn decode_string(data: &[u8], offset: usize) -> Result<Token, AbiError> {
    let len = word_to_usize(read_word(data, offset)?)?;
    let start = offset + WORD;
    let end = start
        .checked_add(len)
        .ok_or(AbiError::OffsetOutOfBounds(start))?;
    let bytes = data.get(start..end).ok_or(AbiError::Truncated {
        needed: end,
        got: data.len(),
    })?;
    String::from_utf8(bytes.to_vec())
        .map(Token::String)
        .map_err(|_| AbiError::InvalidUtf8)
}

/// EIP-55 mixed-case rendering of an address
pub fn to_checksum_address(address: &[u8; 20]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse a `0x`-prefixed (or bare) 20-byte hex address, any case
pub fn parse_address(s: &str) -> Result<[u8; 20], AbiError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.len() != 40 {
        return Err(AbiError::InvalidAddress(s.to_string()));
    }
    let bytes = hex::decode(digits).map_err(|_| AbiError::InvalidAddress(s.to_string()))?;
    let mut address = [0u8; 20];
    address.copy_from_slice(&bytes);
    Ok(address)
}

fn read_word(data: &[u8], offset: usize) -> Result<&[u8; WORD], AbiError> {
    let end = offset
        .checked_add(WORD)
        .ok_or(AbiError::OffsetOutOfBounds(offset))?;
    data.get(offset..end)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(AbiError::OffsetOutOfBounds(offset))
}

fn word_to_u128(word: &[u8; WORD]) -> Result<u128, AbiError> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow("u128"));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

fn word_to_usize(word: &[u8; WORD]) -> Result<usize, AbiError> {
    usize::try_from(word_to_u128(word)?).map_err(|_| AbiError::Overflow("usize"))
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

const fn padding(len: usize) -> usize {
    (WORD - len % WORD) % WORD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(value: u128) -> Vec<u8> {
        uint_word(value).to_vec()
    }

    #[test]
    fn test_selector_known_vectors() {
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn test_encode_single_string() {
        let data = encode_args(&[Token::String("hello".to_string())]);
        assert_eq!(data.len(), 96);
        assert_eq!(&data[..32], word(0x20).as_slice());
        assert_eq!(&data[32..64], word(5).as_slice());
        assert_eq!(&data[64..69], b"hello");
        assert!(data[69..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_mixed_static_and_dynamic() {
        let data = encode_args(&[
            Token::String("ab".to_string()),
            Token::Uint(7),
            Token::String("c".to_string()),
        ]);
        // head: 3 words, tail: (len + data) for each string
        assert_eq!(data.len(), 3 * 32 + 2 * 64);
        assert_eq!(&data[..32], word(0x60).as_slice());
        assert_eq!(&data[32..64], word(7).as_slice());
        assert_eq!(&data[64..96], word(0xa0).as_slice());
        assert_eq!(&data[96..128], word(2).as_slice());
        assert_eq!(&data[128..130], b"ab");
        assert_eq!(&data[160..192], word(1).as_slice());
        assert_eq!(data[192], b'c');
    }

    #[test]
    fn test_encode_call_prefixes_selector() {
        let data = encode_call("certificateExists(string)", &[Token::String("X".into())]);
        assert_eq!(&data[..4], &selector("certificateExists(string)"));
        assert_eq!(data.len(), 4 + 96);
    }

    #[test]
    fn test_encode_empty_string_has_no_data_words() {
        let data = encode_args(&[Token::String(String::new())]);
        assert_eq!(data.len(), 64);
        assert_eq!(&data[32..64], word(0).as_slice());
    }

    #[test]
    fn test_decode_hash_lookup_tuple() {
        let mut data = Vec::new();
        data.extend(word(1)); // exists
        data.extend(word(0x60)); // offset of id
        data.extend(word(42)); // a uint
        data.extend(word(8));
        let mut id = b"CERT-001".to_vec();
        id.resize(32, 0);
        data.extend(id);

        let tokens = decode(
            &[ParamKind::Bool, ParamKind::String, ParamKind::Uint256],
            &data,
        )
        .unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Bool(true),
                Token::String("CERT-001".to_string()),
                Token::Uint(42)
            ]
        );
    }

    #[test]
    fn test_decode_address() {
        let mut data = vec![0u8; 12];
        data.extend([0xab; 20]);
        let tokens = decode(&[ParamKind::Address], &data).unwrap();
        assert_eq!(tokens[0].as_address().unwrap(), [0xab; 20]);
    }

    #[test]
    fn test_decode_rejects_dirty_address_word() {
        let mut data = vec![0u8; 32];
        data[0] = 1;
        assert!(matches!(
            decode(&[ParamKind::Address], &data),
            Err(AbiError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_bool() {
        assert_eq!(
            decode(&[ParamKind::Bool], &word(2)),
            Err(AbiError::InvalidBool)
        );
    }

    #[test]
    fn test_decode_rejects_truncated_head() {
        assert_eq!(
            decode(&[ParamKind::Bool, ParamKind::Uint256], &word(1)),
            Err(AbiError::Truncated {
                needed: 64,
                got: 32
            })
        );
    }

    #[test]
    fn test_decode_rejects_string_past_end() {
        let mut data = word(0x20);
        data.extend(word(100));
        data.extend(b"short".to_vec());
        assert!(matches!(
            decode(&[ParamKind::String], &data),
            Err(AbiError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_offset_out_of_bounds() {
        assert_eq!(
            decode(&[ParamKind::String], &word(0x1000)),
            Err(AbiError::OffsetOutOfBounds(0x1000))
        );
    }

    #[test]
    fn test_token_narrowing() {
        assert_eq!(Token::Uint(1_700_000_000).as_u64().unwrap(), 1_700_000_000);
        assert_eq!(
            Token::Uint(u128::from(u64::MAX) + 1).as_u64(),
            Err(AbiError::Overflow("u64"))
        );
        assert_eq!(
            Token::Bool(true).into_string(),
            Err(AbiError::UnexpectedToken("string"))
        );
    }

    #[test]
    fn test_checksum_address_eip55_vectors() {
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        ] {
            let parsed = parse_address(&expected.to_lowercase()).unwrap();
            assert_eq!(to_checksum_address(&parsed), expected);
        }
    }

    #[test]
    fn test_parse_address_rejects_bad_input() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("0xzz6916095ca1df60bb79ce92ce3ea74c37c5d359").is_err());
    }

    #[test]
    fn test_param_kind_parse() {
        assert_eq!(ParamKind::parse("uint256").unwrap(), ParamKind::Uint256);
        assert_eq!(ParamKind::parse("uint").unwrap().canonical(), "uint256");
        assert!(ParamKind::parse("bytes32").is_err());
    }
}
