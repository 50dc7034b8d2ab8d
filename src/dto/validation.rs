//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted player name, in characters, after trimming.
pub const MAX_PLAYER_NAME_CHARS: usize = 40;

/// Validates that a player name has visible content and a bounded length.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("Alice")  // Ok
/// validate_player_name("   ")    // Err - blank
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("Player name must not be blank".into());
        return Err(err);
    }

    let count = trimmed.chars().count();
    if count > MAX_PLAYER_NAME_CHARS {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be at most {MAX_PLAYER_NAME_CHARS} characters (got {count})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a question carries exactly four options.
pub fn validate_options(options: &[String]) -> Result<(), ValidationError> {
    if options.len() != 4 {
        let mut err = ValidationError::new("options_count");
        err.message = Some(format!("Exactly 4 options are required (got {})", options.len()).into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a string has visible content.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_name_accepts_regular_names() {
        assert!(validate_player_name("Alice").is_ok());
        assert!(validate_player_name("  Bob ").is_ok());
        assert!(validate_player_name("Zoë").is_ok());
    }

    #[test]
    fn player_name_rejects_blank_and_long_names() {
        assert!(validate_player_name("").is_err());
        assert!(validate_player_name(" \t ").is_err());
        assert!(validate_player_name(&"x".repeat(MAX_PLAYER_NAME_CHARS + 1)).is_err());
    }

    #[test]
    fn options_need_exactly_four_entries() {
        let four: Vec<String> = ["a", "b", "c", "d"].map(String::from).to_vec();
        assert!(validate_options(&four).is_ok());
        assert!(validate_options(&four[..3]).is_err());
        assert!(validate_options(&[]).is_err());
    }
}
