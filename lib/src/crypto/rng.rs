use rand_core::{CryptoRng, OsRng, RngCore};
use uuid::Uuid;

#[inline]
pub fn get_rng() -> impl RngCore + CryptoRng {
    OsRng
}

#[inline]
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut array = [0u8; N];
    get_rng().fill_bytes(&mut array);

    array
}

/// A version 4 UUID drawn from the OS rng, used as a challenge value.
#[inline]
pub fn random_uuid() -> Uuid {
    uuid::Builder::from_random_bytes(random_bytes::<16>()).into_uuid()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Doesn't check whether the RNG is safe/truly random,
    /// only that we never hand back zero bytes
    fn sanity_rng_check() {
        let zero_bytes = [0u8; 24];
        let bytes = random_bytes::<24>();
        let other_bytes = random_bytes::<24>();

        assert_ne!(
            bytes, zero_bytes,
            "random_bytes() should never give back zero bytes"
        );
        assert_ne!(
            bytes, other_bytes,
            "random_bytes() should generate a unique output"
        );
    }

    #[test]
    fn challenge_uuids_are_v4() {
        let first = random_uuid();

        assert_eq!(
            first.get_version_num(),
            4,
            "challenge values must be random UUIDs"
        );
        assert_ne!(first, random_uuid(), "challenge values must not repeat");
    }
}
