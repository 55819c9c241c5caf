//! Property-based tests for identities, channels and envelopes.
//!
//! - Identity derivation is deterministic in the seed
//! - Secure channels decrypt what the opposite channel encrypted
//! - Any single-character change to a channel message is rejected
//! - Sealed envelopes recover arbitrary payloads

use proptest::prelude::*;

use crate::crypto::{ready, Identity, Seed};
use crate::utils::{CryptoError, PeercryptError};

fn identity(seed: [u8; 32]) -> Identity {
    Identity::create(&ready().unwrap(), Seed::Bytes(seed))
}

// ==================== Identity Property Tests ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The same seed always yields the same keys and identifier.
    #[test]
    fn seed_determinism(seed in any::<[u8; 32]>()) {
        let first = identity(seed);
        let second = identity(seed);
        prop_assert_eq!(first.public_identifier(), second.public_identifier());
        prop_assert!(first.export() == second.export());
    }

    /// Different phrases give different identifiers.
    #[test]
    fn distinct_phrases_distinct_ids(a in ".{1,40}", b in ".{1,40}") {
        prop_assume!(a != b);
        let context = ready().unwrap();
        let first = Identity::create(&context, Seed::from(a.as_str()));
        let second = Identity::create(&context, Seed::from(b.as_str()));
        prop_assert_ne!(first.public_identifier(), second.public_identifier());
    }

    /// JSON export restores an equal identity.
    #[test]
    fn identity_json_round_trip(seed in any::<[u8; 32]>()) {
        let original = identity(seed);
        let restored = Identity::from_json(&ready().unwrap(), &original.to_json().unwrap()).unwrap();
        prop_assert_eq!(original, restored);
    }
}

// ==================== Channel Property Tests ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A.channel(B) encrypts what B.channel(A) decrypts.
    #[test]
    fn channel_symmetry(
        a in any::<[u8; 32]>(),
        b in any::<[u8; 32]>(),
        text in ".{0,200}",
        numbers in prop::collection::vec(any::<i64>(), 0..16),
    ) {
        let alice = identity(a);
        let bob = identity(b);
        let value = serde_json::json!({ "text": text, "numbers": numbers });

        let encrypted = alice.init_secure_channel(bob.public_identifier()).unwrap().encrypt(&value).unwrap();
        let decrypted: serde_json::Value = bob
            .init_secure_channel(alice.public_identifier())
            .unwrap()
            .decrypt(&encrypted)
            .unwrap();
        prop_assert_eq!(decrypted, value);
    }

    /// Replacing any character of a channel message makes decryption fail.
    #[test]
    fn channel_tampering_rejected(text in ".{0,64}", position in any::<prop::sample::Index>()) {
        let alice = identity([1u8; 32]);
        let bob = identity([2u8; 32]);
        let encrypted = alice.init_secure_channel(bob.public_identifier()).unwrap().encrypt(&text).unwrap();

        let index = position.index(encrypted.len());
        let mut chars: Vec<char> = encrypted.chars().collect();
        chars[index] = if chars[index] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        let result = bob
            .init_secure_channel(alice.public_identifier())
            .unwrap()
            .decrypt::<String>(&tampered);
        prop_assert!(matches!(
            result,
            Err(PeercryptError::Crypto(CryptoError::IncorrectSecretKey))
        ));
    }
}

// ==================== Envelope Property Tests ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Sealed envelopes recover arbitrary strings.
    #[test]
    fn sealed_round_trip(text in ".{0,300}") {
        let alice = identity([3u8; 32]);
        let bob = identity([4u8; 32]);
        let sealed = alice.seal(&text, bob.public_identifier()).unwrap();
        prop_assert_eq!(sealed.decrypt(&bob).unwrap(), text);
    }
}
