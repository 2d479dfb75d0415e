use crypto_bigint::U256;
use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;

/// A scalar value stored in a model member.
///
/// Ordering is only meaningful between values of the same variant.
#[derive(
    Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy,
)]
pub enum Primitive {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    U256(U256),
    Bool(bool),
    Felt252(Felt),
    ClassHash(Felt),
    ContractAddress(Felt),
    EthAddress(Felt),
}

impl Primitive {
    /// Returns the value as an unsigned integer, if it is one that fits in a `u128`.
    pub fn as_unsigned(&self) -> Option<u128> {
        match *self {
            Primitive::U8(v) => Some(v as u128),
            Primitive::U16(v) => Some(v as u128),
            Primitive::U32(v) => Some(v as u128),
            Primitive::U64(v) => Some(v as u128),
            Primitive::U128(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_unsigned(&self) -> bool {
        self.as_unsigned().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_variant_ordering() {
        assert!(Primitive::U32(3) < Primitive::U32(10));
        assert!(Primitive::Felt252(Felt::ONE) < Primitive::Felt252(Felt::TWO));
        assert!(Primitive::I64(-4) < Primitive::I64(0));
    }

    #[test]
    fn test_as_unsigned() {
        assert_eq!(Primitive::U8(7).as_unsigned(), Some(7));
        assert_eq!(Primitive::U128(u128::MAX).as_unsigned(), Some(u128::MAX));
        assert_eq!(Primitive::I8(7).as_unsigned(), None);
        assert_eq!(Primitive::Bool(true).as_unsigned(), None);
    }
}
