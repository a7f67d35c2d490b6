//! Password policy checks.
//!
//! The password is the only secret a user holds; it determines their key
//! pair forever. These checks run before registration and are reported
//! individually so the UI can tick them off as the user types.

use serde::{Deserialize, Serialize};

/// Minimum length, counted in UTF-16 code units as browsers count it
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Characters that satisfy the special-character requirement
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Outcome of checking a password against each requirement
///
/// Serializes with the keys the registration form reads:
/// `length, uppercase, lowercase, number, special, valid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordRequirements {
    /// At least [`MIN_PASSWORD_LENGTH`] UTF-16 code units
    pub length: bool,
    /// At least one ASCII uppercase letter
    pub uppercase: bool,
    /// At least one ASCII lowercase letter
    pub lowercase: bool,
    /// At least one ASCII digit
    pub number: bool,
    /// At least one of [`SPECIAL_CHARACTERS`]
    pub special: bool,
    /// All of the above
    pub valid: bool,
}

impl PasswordRequirements {
    /// Names of the requirements that are not met, in display order
    pub fn unmet(&self) -> Vec<&'static str> {
        [
            (self.length, "at least 12 characters"),
            (self.uppercase, "an uppercase letter"),
            (self.lowercase, "a lowercase letter"),
            (self.number, "a number"),
            (self.special, "a special character"),
        ]
        .into_iter()
        .filter(|(met, _)| !met)
        .map(|(_, name)| name)
        .collect()
    }
}

/// Check a password against the policy
///
/// Pure; the password is not stored or logged.
pub fn validate_password(password: &str) -> PasswordRequirements {
    // An astral-plane character (emoji) counts as two, as in the browser
    let length = password.encode_utf16().count() >= MIN_PASSWORD_LENGTH;
    let uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let number = password.chars().any(|c| c.is_ascii_digit());
    let special = password.chars().any(|c| SPECIAL_CHARACTERS.contains(c));

    PasswordRequirements {
        length,
        uppercase,
        lowercase,
        number,
        special,
        valid: length && uppercase && lowercase && number && special,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_password() {
        let result = validate_password("Abcdefgh123!");

        assert!(result.valid);
        assert!(result.unmet().is_empty());
    }

    #[test]
    fn test_one_short() {
        let result = validate_password("Abcdefg123!");

        assert!(!result.length);
        assert!(result.uppercase && result.lowercase);
        assert!(result.number && result.special);
        assert!(!result.valid);
        assert_eq!(result.unmet(), vec!["at least 12 characters"]);
    }

    #[test]
    fn test_missing_uppercase_only() {
        let result = validate_password("abcdefgh123!");

        assert!(!result.uppercase);
        assert!(result.length && result.lowercase);
        assert!(result.number && result.special);
        assert!(!result.valid);
    }

    #[test]
    fn test_empty_fails_everything() {
        let result = validate_password("");

        assert!(!result.valid);
        assert_eq!(result.unmet().len(), 5);
    }

    #[test]
    fn test_space_is_not_special() {
        let result = validate_password("Abcdefgh 1234");

        assert!(result.length);
        assert!(!result.special);
        assert!(!result.valid);
    }

    #[test]
    fn test_non_ascii_letters_do_not_count() {
        // 12 characters but only non-ASCII letters for the case checks
        let result = validate_password("ÄÖÜäöüßéèê1!");

        assert!(result.length);
        assert!(!result.uppercase);
        assert!(!result.lowercase);
    }

    #[test]
    fn test_length_counts_utf16_units() {
        // 10 ASCII characters plus one emoji: 11 chars, 12 UTF-16 units
        let result = validate_password("Abcdefg12!\u{1F600}");

        assert_eq!("Abcdefg12!\u{1F600}".chars().count(), 11);
        assert!(result.length);
        assert!(result.valid);

        let result = validate_password("Abcdefg1!\u{1F600}");
        assert!(!result.length);
    }

    #[test]
    fn test_serialized_keys() {
        let json = serde_json::to_value(validate_password("abcdefgh123!")).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "length": true,
                "uppercase": false,
                "lowercase": true,
                "number": true,
                "special": true,
                "valid": false
            })
        );
    }
}
