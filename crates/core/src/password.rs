use thiserror::Error;

/// Characters accepted as the "special" class of the password policy.
pub const SPECIAL_CHARACTERS: &str = "@#$%^&+=";

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 3;

/// Raised when a registration password does not satisfy the policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Password must contain atleast 1 alphabet, 1 number & 1 special character")]
pub struct PasswordPolicyViolation;

/// Check a candidate password against the registration policy: at least
/// one ASCII letter, one digit and one of [`SPECIAL_CHARACTERS`], and at
/// least [`MIN_PASSWORD_LEN`] characters overall.
pub fn validate_password(candidate: &str) -> Result<(), PasswordPolicyViolation> {
    let has_letter = candidate.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = candidate.chars().any(|c| c.is_ascii_digit());
    let has_special = candidate.chars().any(|c| SPECIAL_CHARACTERS.contains(c));
    let long_enough = candidate.chars().count() >= MIN_PASSWORD_LEN;

    if has_letter && has_digit && has_special && long_enough {
        Ok(())
    } else {
        Err(PasswordPolicyViolation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_only_is_rejected() {
        assert_eq!(validate_password("abc"), Err(PasswordPolicyViolation));
    }

    #[test]
    fn letter_digit_special_is_accepted() {
        assert!(validate_password("abc#1").is_ok());
        assert!(validate_password("A1@").is_ok());
    }

    #[test]
    fn missing_digit_is_rejected() {
        assert!(validate_password("abc#").is_err());
    }

    #[test]
    fn missing_special_is_rejected() {
        assert!(validate_password("abc1").is_err());
    }

    #[test]
    fn unlisted_special_does_not_count() {
        assert!(validate_password("abc1!").is_err());
    }

    #[test]
    fn empty_is_rejected() {
        assert!(validate_password("").is_err());
    }

    #[test]
    fn message_matches_form_text() {
        assert_eq!(
            PasswordPolicyViolation.to_string(),
            "Password must contain atleast 1 alphabet, 1 number & 1 special character"
        );
    }
}
