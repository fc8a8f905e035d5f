//! # Schnorr Challenge-Response
//!
//! The holder proves knowledge of `acc` behind `P = g^acc mod p` by answering
//! a verifier-chosen challenge `c`:
//!
//! ```text
//! holder:    n  <-$ [1, q - 1]
//!            R  =  g^n mod p
//!            S  =  n + acc * c          (reduced by the subgroup order)
//!
//! verifier:  g^S  ==  R * P^c   (mod p)
//! ```
//!
//! `n` must be fresh for every signature. Two signatures under the same `acc`
//! with the same `n` and different challenges reveal `acc` by simple algebra,
//! so [`sign`] always pulls `n` from the OS RNG. [`sign_with_nonce`] exists
//! for fixed test vectors and is the only way to pick `n` by hand.
//!
//! Everything here is pure: no I/O, no logging of secret values.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::group::GroupParameters;
use super::hash::hash_to_uint;

/// A challenge-response signature `(S, R)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Response scalar `S`.
    pub s: BigUint,
    /// Commitment `R = g^n mod p`.
    pub r: BigUint,
}

/// Sign `challenge` with `acc` using a fresh nonce from the OS RNG.
pub fn sign(params: &GroupParameters, acc: &BigUint, challenge: &BigUint) -> Signature {
    sign_with_rng(params, acc, challenge, &mut OsRng)
}

/// Sign with a caller-supplied CSPRNG.
pub fn sign_with_rng<R: RngCore + CryptoRng>(
    params: &GroupParameters,
    acc: &BigUint,
    challenge: &BigUint,
    rng: &mut R,
) -> Signature {
    let nonce = draw_nonce(params, rng);
    sign_with_nonce(params, acc, challenge, &nonce)
}

/// Deterministic signing core with an explicit nonce `n`.
///
/// Never reuse `n` across challenges for the same `acc`.
pub fn sign_with_nonce(
    params: &GroupParameters,
    acc: &BigUint,
    challenge: &BigUint,
    nonce: &BigUint,
) -> Signature {
    let r = params.exp(nonce);
    let s = (nonce + acc * challenge) % params.subgroup_order();
    Signature { s, r }
}

/// Uniform draw from `[1, q - 1]`. Zero cannot come out of the range, but
/// the loop keeps the redraw-on-zero rule explicit.
fn draw_nonce<R: RngCore + CryptoRng>(params: &GroupParameters, rng: &mut R) -> BigUint {
    let low = BigUint::one();
    loop {
        let n = rng.gen_biguint_range(&low, params.order());
        if !n.is_zero() {
            return n;
        }
    }
}

/// Check `g^S == R * P^c (mod p)`.
///
/// Returns `false` for any input that is not a proper group element
/// (`P` or `R` outside `[1, p)`); never panics.
pub fn verify(
    params: &GroupParameters,
    public_key: &BigUint,
    challenge: &BigUint,
    s: &BigUint,
    r: &BigUint,
) -> bool {
    if !params.contains(public_key) || !params.contains(r) {
        return false;
    }

    let modulus = params.modulus();
    let left = params.exp(s);
    let right = (r * public_key.modpow(challenge, modulus)) % modulus;
    left == right
}

/// Verify a [`Signature`] value.
pub fn verify_signature(
    params: &GroupParameters,
    public_key: &BigUint,
    challenge: &BigUint,
    signature: &Signature,
) -> bool {
    verify(params, public_key, challenge, &signature.s, &signature.r)
}

/// Challenge from time and place: `SHA-256("{timestamp}|{lat}|{lon}")` as
/// an unsigned integer. Not secret; only loosely binds freshness.
pub fn compute_challenge(timestamp: i64, latitude: f64, longitude: f64) -> BigUint {
    let data = format!("{timestamp}|{latitude:?}|{longitude:?}");
    hash_to_uint(data.as_bytes())
}

/// `c mod q`, the form both sides sign and verify with.
pub fn reduce_challenge(params: &GroupParameters, challenge: &BigUint) -> BigUint {
    challenge % params.order()
}
