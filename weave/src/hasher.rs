use blake3;
use std::hash::{Hash, Hasher};

pub trait DigestHasher {
    fn input<I: Hash>(&mut self, input: I);
}

impl DigestHasher for blake3::Hasher {
    fn input<I: Hash>(&mut self, input: I) {
        struct StdHasher<'a>(&'a mut blake3::Hasher);

        impl<'a> Hasher for StdHasher<'a> {
            fn finish(&self) -> u64 {
                panic!();
            }

            fn write(&mut self, bytes: &[u8]) {
                self.0.update(bytes);
            }
        }

        input.hash(&mut StdHasher(self))
    }
}

/// Hex encoded blake3 digest of any hashable value.
pub fn digest<I: Hash>(input: I) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.input(input);
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_for_equal_values() {
        let a = vec!["tail".to_string(), "-f".to_string()];
        let b = vec!["tail".to_string(), "-f".to_string()];

        assert_eq!(digest(&a), digest(&b));
        assert_eq!(digest(&a).len(), 64);
    }

    #[test]
    fn digest_separates_adjacent_strings() {
        let split = ("ab".to_string(), "c".to_string());
        let joined = ("a".to_string(), "bc".to_string());

        assert_ne!(digest(&split), digest(&joined));
    }
}
