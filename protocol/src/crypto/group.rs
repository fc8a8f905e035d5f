//! # Group Parameters
//!
//! The finite-field group every ticket key lives in: a safe prime modulus
//! `p`, a generator `g`, and the nominal scalar order `q` that bounds
//! signing nonces and reduces challenges.
//!
//! ## Two orders
//!
//! `q` is a fixed 256-bit prime and is *not* the order of `g`. The
//! generator's real order is `(p - 1) / 2` for a safe prime with a
//! quadratic-residue generator; that value is kept as
//! [`GroupParameters::subgroup_order`] and is what exponent arithmetic
//! (the `S` response) is reduced by. With the production group the
//! reduction never triggers, since `n + acc * c` stays far below a 2047-bit
//! order, so the bytes on the wire are the unreduced sum.

use std::sync::OnceLock;

use num_bigint::BigUint;
use num_traits::{One, Zero};
use thiserror::Error;

use crate::config;

/// Errors when building a custom parameter set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupError {
    #[error("modulus must be an odd integer greater than 3")]
    InvalidModulus,

    #[error("generator must lie in [2, p - 1)")]
    InvalidGenerator,

    #[error("scalar order must be at least 2")]
    InvalidOrder,
}

/// Modulus, generator, and scalar orders of the signature group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupParameters {
    modulus: BigUint,
    generator: BigUint,
    order: BigUint,
    subgroup_order: BigUint,
}

static RFC3526: OnceLock<GroupParameters> = OnceLock::new();

impl GroupParameters {
    /// Build a parameter set from explicit values.
    ///
    /// `modulus` is assumed to be a safe prime and `generator` a quadratic
    /// residue, so the subgroup order is taken as `(p - 1) / 2`. Small sets
    /// such as `p = 23, g = 4, q = 11` are handy in tests.
    pub fn new(modulus: BigUint, generator: BigUint, order: BigUint) -> Result<Self, GroupError> {
        let three = BigUint::from(3u32);
        if modulus <= three || (&modulus % 2u32).is_zero() {
            return Err(GroupError::InvalidModulus);
        }
        let one = BigUint::one();
        if generator <= one || generator >= &modulus - &one {
            return Err(GroupError::InvalidGenerator);
        }
        if order <= one {
            return Err(GroupError::InvalidOrder);
        }

        let subgroup_order = (&modulus - &one) >> 1;
        Ok(Self {
            modulus,
            generator,
            order,
            subgroup_order,
        })
    }

    /// The production parameters: RFC 3526 group 14, `g = 2`, and the fixed
    /// 256-bit scalar order. Built once per process.
    pub fn rfc3526() -> &'static GroupParameters {
        RFC3526.get_or_init(|| {
            let modulus = parse_hex_constant(config::GROUP_MODULUS_HEX);
            let order = parse_hex_constant(config::SCALAR_ORDER_HEX);
            let generator = BigUint::from(config::GROUP_GENERATOR);
            let subgroup_order = (&modulus - BigUint::one()) >> 1;
            GroupParameters {
                modulus,
                generator,
                order,
                subgroup_order,
            }
        })
    }

    /// Field modulus `p`.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Generator `g`.
    pub fn generator(&self) -> &BigUint {
        &self.generator
    }

    /// Nominal scalar order `q`.
    pub fn order(&self) -> &BigUint {
        &self.order
    }

    /// Order of the subgroup generated by `g`, `(p - 1) / 2`.
    pub fn subgroup_order(&self) -> &BigUint {
        &self.subgroup_order
    }

    /// `g^exponent mod p`.
    pub fn exp(&self, exponent: &BigUint) -> BigUint {
        self.generator.modpow(exponent, &self.modulus)
    }

    /// True if `value` is a usable group element: in `[1, p)`.
    pub fn contains(&self, value: &BigUint) -> bool {
        !value.is_zero() && value < &self.modulus
    }
}

// The constants are compile-time literals checked by the config tests; an
// unparsable one is a build defect, not a runtime condition.
fn parse_hex_constant(hex: &str) -> BigUint {
    BigUint::parse_bytes(hex.as_bytes(), 16).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> GroupParameters {
        GroupParameters::new(23u32.into(), 4u32.into(), 11u32.into()).unwrap()
    }

    #[test]
    fn rfc3526_parameters_are_well_formed() {
        let params = GroupParameters::rfc3526();
        assert_eq!(params.modulus().bits(), 2048);
        assert_eq!(params.order().bits(), 256);
        assert_eq!(params.generator(), &BigUint::from(2u32));
        assert_eq!(params.subgroup_order().bits(), 2047);
    }

    #[test]
    fn rfc3526_generator_has_subgroup_order() {
        // 2 is a quadratic residue mod p, so 2^((p-1)/2) == 1.
        let params = GroupParameters::rfc3526();
        assert!(params.exp(params.subgroup_order()).is_one());
    }

    #[test]
    fn rfc3526_is_a_singleton() {
        assert!(std::ptr::eq(
            GroupParameters::rfc3526(),
            GroupParameters::rfc3526()
        ));
    }

    #[test]
    fn toy_group_has_order_eleven() {
        let params = toy();
        assert_eq!(params.subgroup_order(), &BigUint::from(11u32));
        assert!(params.exp(&BigUint::from(11u32)).is_one());
        assert_eq!(params.exp(&BigUint::from(7u32)), BigUint::from(8u32));
    }

    #[test]
    fn rejects_degenerate_values() {
        assert_eq!(
            GroupParameters::new(22u32.into(), 4u32.into(), 11u32.into()),
            Err(GroupError::InvalidModulus)
        );
        assert_eq!(
            GroupParameters::new(23u32.into(), 1u32.into(), 11u32.into()),
            Err(GroupError::InvalidGenerator)
        );
        assert_eq!(
            GroupParameters::new(23u32.into(), 22u32.into(), 11u32.into()),
            Err(GroupError::InvalidGenerator)
        );
        assert_eq!(
            GroupParameters::new(23u32.into(), 4u32.into(), 1u32.into()),
            Err(GroupError::InvalidOrder)
        );
    }

    #[test]
    fn contains_checks_range() {
        let params = toy();
        assert!(!params.contains(&BigUint::zero()));
        assert!(params.contains(&BigUint::one()));
        assert!(params.contains(&BigUint::from(22u32)));
        assert!(!params.contains(&BigUint::from(23u32)));
    }
}
