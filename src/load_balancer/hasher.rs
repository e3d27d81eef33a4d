//! Client key hashing.
//!
//! Keys are hashed with 128-bit FNV-1a and folded down to a 16-bit bucket.
//! The 16-bit space is a capacity limit of the routing layer: unrelated keys
//! collide with probability ~1/65536 per pair, so a few hundred distinct keys
//! are enough to expect a shared bucket. Keys that collide share one sticky
//! assignment.

/// A client key's position in the 65536-bucket hash space.
pub type KeyHash = u16;

const FNV_OFFSET_BASIS: u128 = 0x6c62272e07bb014262b821756295c58d;
const FNV_PRIME: u128 = 0x0000000001000000000000000000013b;

/// Hash a client key. Deterministic across runs and platforms.
pub fn hash_key(key: &str) -> KeyHash {
    let state = key.bytes().fold(FNV_OFFSET_BASIS, |acc, byte| {
        (acc ^ u128::from(byte)).wrapping_mul(FNV_PRIME)
    });

    // XOR-fold the eight 16-bit lanes so every byte reaches the bucket.
    (0..8).fold(0u16, |acc, lane| acc ^ (state >> (lane * 16)) as u16)
}
