//! # ModExp (0x05, Byzantium)
//!
//! Arbitrary-precision modular exponentiation, priced per EIP-198 and
//! repriced by EIP-2565 from Berlin.
//!
//! Input layout:
//! - bytes 0-31: base length
//! - bytes 32-63: exponent length
//! - bytes 64-95: modulus length
//! - then base, exponent, modulus back to back, zero-extended on read.

use super::{precompile_address, Precompile, PrecompileOutput};
use crate::errors::PrecompileError;
use shared_types::{Address, Bytes, Fork, U256};

const MODEXP_MIN_GAS_EIP2565: u64 = 200;
const MODEXP_QUAD_DIVISOR_EIP198: u128 = 20;
const MODEXP_DIVISOR_EIP2565: u128 = 3;

/// Upper bound on operand lengths; anything longer prices far past any
/// block gas limit, so the cap only guards allocation.
const MAX_OPERAND_LEN: usize = 1_048_576;

/// The modexp precompile, priced per the active fork.
pub struct ModExp {
    /// Active fork; selects EIP-198 or EIP-2565 pricing.
    pub fork: Fork,
}

impl Precompile for ModExp {
    fn execute(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        let base_len = read_length(input, 0)?;
        let exp_len = read_length(input, 32)?;
        let mod_len = read_length(input, 64)?;

        let exp_head = read_padded(input, 96 + base_len, exp_len.min(32));
        let iterations = iteration_count(exp_len, &exp_head);

        let gas = self.gas_cost(base_len.max(mod_len), iterations);
        if gas > gas_limit {
            return Err(PrecompileError::OutOfGas);
        }

        if mod_len == 0 {
            return Ok(PrecompileOutput {
                gas_used: gas,
                output: Bytes::new(),
            });
        }

        let base = read_padded(input, 96, base_len);
        let exponent = read_padded(input, 96 + base_len, exp_len);
        let modulus = read_padded(input, 96 + base_len + exp_len, mod_len);

        let result = BigUint::from_be_bytes(&base)
            .modpow(&BigUint::from_be_bytes(&exponent), &BigUint::from_be_bytes(&modulus));

        Ok(PrecompileOutput {
            gas_used: gas,
            output: Bytes::from_vec(result.to_be_bytes(mod_len)),
        })
    }

    fn address(&self) -> Address {
        precompile_address(5)
    }
}

impl ModExp {
    fn gas_cost(&self, max_len: usize, iterations: u128) -> u64 {
        let max_len = max_len as u128;
        let gas = if self.fork >= Fork::Berlin {
            // EIP-2565
            let words = max_len.div_ceil(8);
            let complexity = words.saturating_mul(words);
            complexity
                .saturating_mul(iterations.max(1))
                .checked_div(MODEXP_DIVISOR_EIP2565)
                .unwrap_or(u128::MAX)
                .max(u128::from(MODEXP_MIN_GAS_EIP2565))
        } else {
            // EIP-198
            let complexity = if max_len <= 64 {
                max_len * max_len
            } else if max_len <= 1024 {
                max_len * max_len / 4 + 96 * max_len - 3072
            } else {
                max_len
                    .saturating_mul(max_len)
                    .checked_div(16)
                    .unwrap_or(u128::MAX)
                    .saturating_add(480 * max_len)
                    .saturating_sub(199_680)
            };
            complexity
                .saturating_mul(iterations.max(1))
                .checked_div(MODEXP_QUAD_DIVISOR_EIP198)
                .unwrap_or(u128::MAX)
        };
        u64::try_from(gas).unwrap_or(u64::MAX)
    }
}

fn read_length(input: &[u8], offset: usize) -> Result<usize, PrecompileError> {
    let word = read_padded(input, offset, 32);
    let value = U256::from_big_endian(&word);
    if value > U256::from(MAX_OPERAND_LEN) {
        // Out of any realistic gas budget; refuse the allocation.
        return Err(PrecompileError::OutOfGas);
    }
    Ok(value.low_u64() as usize)
}

/// Read `len` bytes at `offset`, zero-extending past the input's end.
fn read_padded(input: &[u8], offset: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    if offset < input.len() {
        let available = (input.len() - offset).min(len);
        out[..available].copy_from_slice(&input[offset..offset + available]);
    }
    out
}

/// Bit length of the adjusted exponent per EIP-198.
fn iteration_count(exp_len: usize, exp_head: &[u8]) -> u128 {
    let head = U256::from_big_endian(exp_head);
    let head_bits = if head.is_zero() {
        0
    } else {
        u128::from(256 - head.leading_zeros()) - 1
    };
    if exp_len <= 32 {
        head_bits
    } else {
        8 * (exp_len as u128 - 32) + head_bits
    }
}

// =============================================================================
// MINIMAL BIG UNSIGNED INTEGER
// =============================================================================

/// Little-endian u64 limbs; just enough arithmetic for modpow.
#[derive(Clone, Debug, PartialEq, Eq)]
struct BigUint {
    limbs: Vec<u64>,
}

impl BigUint {
    fn zero() -> Self {
        Self { limbs: Vec::new() }
    }

    fn one() -> Self {
        Self { limbs: vec![1] }
    }

    fn from_be_bytes(bytes: &[u8]) -> Self {
        let mut limbs = Vec::with_capacity(bytes.len() / 8 + 1);
        for chunk in bytes.rchunks(8) {
            let mut limb = 0u64;
            for &byte in chunk {
                limb = (limb << 8) | u64::from(byte);
            }
            limbs.push(limb);
        }
        let mut out = Self { limbs };
        out.normalize();
        out
    }

    fn to_be_bytes(&self, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        let mut index = len;
        'outer: for &limb in &self.limbs {
            for shift in 0..8 {
                if index == 0 {
                    break 'outer;
                }
                index -= 1;
                out[index] = ((limb >> (shift * 8)) & 0xFF) as u8;
            }
        }
        out
    }

    fn normalize(&mut self) {
        while self.limbs.last() == Some(&0) {
            self.limbs.pop();
        }
    }

    fn is_zero(&self) -> bool {
        self.limbs.is_empty()
    }

    fn bits(&self) -> usize {
        match self.limbs.last() {
            None => 0,
            Some(&top) => (self.limbs.len() - 1) * 64 + (64 - top.leading_zeros() as usize),
        }
    }

    fn bit(&self, index: usize) -> bool {
        self.limbs
            .get(index / 64)
            .is_some_and(|limb| limb >> (index % 64) & 1 == 1)
    }

    fn cmp_limbs(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match self.limbs.len().cmp(&other.limbs.len()) {
            Ordering::Equal => {}
            order => return order,
        }
        for (a, b) in self.limbs.iter().rev().zip(other.limbs.iter().rev()) {
            match a.cmp(b) {
                Ordering::Equal => {}
                order => return order,
            }
        }
        Ordering::Equal
    }

    /// `self -= other`; requires `self >= other`.
    fn sub_assign(&mut self, other: &Self) {
        let mut borrow = 0u64;
        for (i, limb) in self.limbs.iter_mut().enumerate() {
            let rhs = other.limbs.get(i).copied().unwrap_or(0);
            let (first, b1) = limb.overflowing_sub(rhs);
            let (second, b2) = first.overflowing_sub(borrow);
            *limb = second;
            borrow = u64::from(b1) + u64::from(b2);
        }
        self.normalize();
    }

    fn mul(&self, other: &Self) -> Self {
        if self.is_zero() || other.is_zero() {
            return Self::zero();
        }
        let mut limbs = vec![0u64; self.limbs.len() + other.limbs.len()];
        for (i, &a) in self.limbs.iter().enumerate() {
            let mut carry = 0u128;
            for (j, &b) in other.limbs.iter().enumerate() {
                let acc = u128::from(a) * u128::from(b) + u128::from(limbs[i + j]) + carry;
                limbs[i + j] = acc as u64;
                carry = acc >> 64;
            }
            limbs[i + other.limbs.len()] = carry as u64;
        }
        let mut out = Self { limbs };
        out.normalize();
        out
    }

    fn shl_bits(&self, shift: usize) -> Self {
        if self.is_zero() {
            return Self::zero();
        }
        let limb_shift = shift / 64;
        let bit_shift = shift % 64;
        let mut limbs = vec![0u64; limb_shift];
        if bit_shift == 0 {
            limbs.extend_from_slice(&self.limbs);
        } else {
            let mut carry = 0u64;
            for &limb in &self.limbs {
                limbs.push((limb << bit_shift) | carry);
                carry = limb >> (64 - bit_shift);
            }
            limbs.push(carry);
        }
        let mut out = Self { limbs };
        out.normalize();
        out
    }

    fn shr1(&mut self) {
        let mut carry = 0u64;
        for limb in self.limbs.iter_mut().rev() {
            let next_carry = *limb & 1;
            *limb = (*limb >> 1) | (carry << 63);
            carry = next_carry;
        }
        self.normalize();
    }

    /// Shift-subtract reduction: `self mod modulus`.
    fn reduce(mut self, modulus: &Self) -> Self {
        use std::cmp::Ordering;
        if modulus.is_zero() {
            return Self::zero();
        }
        if self.cmp_limbs(modulus) == Ordering::Less {
            return self;
        }
        let shift = self.bits() - modulus.bits();
        let mut shifted = modulus.shl_bits(shift);
        for _ in 0..=shift {
            if self.cmp_limbs(&shifted) != Ordering::Less {
                self.sub_assign(&shifted);
            }
            shifted.shr1();
        }
        self
    }

    /// `self ^ exponent mod modulus` by square-and-multiply.
    fn modpow(&self, exponent: &Self, modulus: &Self) -> Self {
        if modulus.is_zero() {
            return Self::zero();
        }
        if modulus == &Self::one() {
            return Self::zero();
        }
        let mut result = Self::one();
        let mut base = self.clone().reduce(modulus);
        for index in 0..exponent.bits() {
            if exponent.bit(index) {
                result = result.mul(&base).reduce(modulus);
            }
            base = base.mul(&base).reduce(modulus);
        }
        result
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn build_input(base: &[u8], exp: &[u8], modulus: &[u8]) -> Vec<u8> {
        let mut input = vec![0u8; 96];
        input[24..32].copy_from_slice(&(base.len() as u64).to_be_bytes());
        input[56..64].copy_from_slice(&(exp.len() as u64).to_be_bytes());
        input[88..96].copy_from_slice(&(modulus.len() as u64).to_be_bytes());
        input.extend_from_slice(base);
        input.extend_from_slice(exp);
        input.extend_from_slice(modulus);
        input
    }

    #[test]
    fn test_small_modexp() {
        // 2^3 mod 5 = 3
        let input = build_input(&[2], &[3], &[5]);
        let result = ModExp { fork: Fork::Berlin }.execute(&input, 100_000).unwrap();
        assert_eq!(result.output.as_slice(), &[3]);
    }

    #[test]
    fn test_eip198_vector_fermat() {
        // 3 ^ (p - 1) mod p = 1 for the secp256k1 prime p (Fermat)
        let mut modulus = [0xffu8; 32];
        modulus[27] = 0xfe;
        modulus[30] = 0xfc;
        modulus[31] = 0x2f;
        let mut exp = modulus;
        exp[31] = 0x2e;

        let input = build_input(&[3], &exp, &modulus);
        let result = ModExp {
            fork: Fork::Byzantium,
        }
        .execute(&input, 100_000)
        .unwrap();

        let mut expected = vec![0u8; 32];
        expected[31] = 1;
        assert_eq!(result.output.as_slice(), &expected[..]);
        // EIP-198: 32^2 * 255 / 20
        assert_eq!(result.gas_used, 13_056);
    }

    #[test]
    fn test_eip2565_pricing_floor() {
        let input = build_input(&[2], &[1], &[5]);
        let result = ModExp { fork: Fork::Berlin }.execute(&input, 100_000).unwrap();
        assert_eq!(result.gas_used, 200);
    }

    #[test]
    fn test_zero_modulus_length() {
        let input = build_input(&[2], &[3], &[]);
        let result = ModExp { fork: Fork::Berlin }.execute(&input, 100_000).unwrap();
        assert!(result.output.is_empty());
    }

    #[test]
    fn test_output_width_matches_modulus() {
        // 2^10 mod 100 = 24, padded to the 2-byte modulus width
        let input = build_input(&[2], &[10], &[0, 100]);
        let result = ModExp { fork: Fork::Berlin }.execute(&input, 100_000).unwrap();
        assert_eq!(result.output.as_slice(), &[0, 24]);
    }

    #[test]
    fn test_large_operand_modpow() {
        // (2^64)^2 mod (2^127 - 1): exercises multi-limb reduction
        let mut base = vec![0u8; 9];
        base[0] = 1;
        let modulus = {
            let mut m = vec![0xffu8; 16];
            m[0] = 0x7f;
            m
        };
        let input = build_input(&base, &[2], &modulus);
        let result = ModExp { fork: Fork::Berlin }.execute(&input, 1_000_000).unwrap();
        // 2^128 mod (2^127 - 1) = 2
        let mut expected = vec![0u8; 16];
        expected[15] = 2;
        assert_eq!(result.output.as_slice(), &expected[..]);
    }

    #[test]
    fn test_out_of_gas() {
        let input = build_input(&[2], &[3], &[5]);
        assert!(matches!(
            ModExp { fork: Fork::Berlin }.execute(&input, 100),
            Err(PrecompileError::OutOfGas)
        ));
    }
}
