use aegis_domain::RECOVERY_CODE_COUNT;

use crate::crypto::hash_token;

/// Generates [`RECOVERY_CODE_COUNT`] random recovery codes, each 8
/// alphanumeric characters drawn from an alphabet excluding visually
/// ambiguous characters (`0`, `1`, `i`, `l`, `o`).
pub(super) fn generate_recovery_codes() -> Vec<String> {
    const CODE_LENGTH: usize = 8;
    const ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";

    let mut codes = Vec::with_capacity(RECOVERY_CODE_COUNT);

    for _ in 0..RECOVERY_CODE_COUNT {
        let mut bytes = [0u8; CODE_LENGTH];
        // An OS RNG failure must never degrade to predictable codes.
        getrandom::fill(&mut bytes).unwrap_or_else(|error| panic!("system RNG unavailable: {error}"));

        let code: String = bytes
            .iter()
            .map(|byte| {
                let index = (*byte as usize) % ALPHABET.len();
                ALPHABET[index] as char
            })
            .collect();

        codes.push(code);
    }

    codes
}

/// Hashes a single recovery code for at-rest storage, normalizing case so
/// lookups are insensitive to how the user typed it.
pub(super) fn hash_single_code(code: &str) -> String {
    hash_token(&code.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_the_configured_code_count() {
        assert_eq!(generate_recovery_codes().len(), RECOVERY_CODE_COUNT);
    }

    #[test]
    fn hash_is_case_insensitive() {
        assert_eq!(hash_single_code("ABCD1234"), hash_single_code("abcd1234"));
    }
}
