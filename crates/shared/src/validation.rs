use crate::constants::*;

/// Group names are counted in characters after trimming.
pub fn validate_group_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("The group needs a name".into());
    }
    if trimmed.chars().count() > MAX_GROUP_NAME_LENGTH {
        return Err(format!(
            "Conversation name cannot exceed {} characters",
            MAX_GROUP_NAME_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_message_content(content: &str) -> Result<(), String> {
    if content.trim().is_empty() {
        return Err("Message content is required".into());
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(format!(
            "Message cannot exceed {} characters",
            MAX_MESSAGE_LENGTH
        ));
    }
    Ok(())
}

/// A new message needs text, an image, or both.
pub fn validate_message_payload(content: Option<&str>, image_url: Option<&str>) -> Result<(), String> {
    let has_image = image_url.is_some_and(|u| !u.trim().is_empty());
    match content {
        Some(c) if !c.trim().is_empty() => validate_message_content(c),
        _ if has_image => Ok(()),
        _ => Err("You need to provide content or an image".into()),
    }
}

pub fn validate_username(username: &str) -> Result<(), String> {
    if username.len() < MIN_USERNAME_LENGTH {
        return Err(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LENGTH
        ));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LENGTH
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(
            "Username can only contain letters, numbers, hyphens, and underscores".into(),
        );
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");
    let valid = !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace);
    if !valid {
        return Err("Email address is invalid".into());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_display_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name cannot be empty".into());
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(format!(
            "Name must be at most {} characters",
            MAX_DISPLAY_NAME_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_bio(bio: &str) -> Result<(), String> {
    if bio.chars().count() > MAX_BIO_LENGTH {
        return Err(format!("Bio must be at most {} characters", MAX_BIO_LENGTH));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_name_boundaries() {
        assert!(validate_group_name(&"a".repeat(100)).is_ok());
        assert!(validate_group_name(&"a".repeat(101)).is_err());
        assert!(validate_group_name("   ").is_err());
        // Surrounding whitespace does not count toward the limit
        assert!(validate_group_name(&format!("  {}  ", "b".repeat(100))).is_ok());
    }

    #[test]
    fn group_name_counts_characters_not_bytes() {
        assert!(validate_group_name(&"é".repeat(100)).is_ok());
    }

    #[test]
    fn message_payload_needs_text_or_image() {
        assert!(validate_message_payload(Some("hi"), None).is_ok());
        assert!(validate_message_payload(None, Some("https://cdn/x.png")).is_ok());
        assert!(validate_message_payload(Some("  "), Some("https://cdn/x.png")).is_ok());
        assert!(validate_message_payload(Some(""), None).is_err());
        assert!(validate_message_payload(None, Some(" ")).is_err());
        assert!(validate_message_payload(None, None).is_err());
    }

    #[test]
    fn message_length_limit() {
        assert!(validate_message_content(&"x".repeat(MAX_MESSAGE_LENGTH)).is_ok());
        assert!(validate_message_content(&"x".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
    }

    #[test]
    fn usernames() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("a").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }

    #[test]
    fn emails() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice@localhost").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("alice@@example.com").is_err());
        assert!(validate_email("al ice@example.com").is_err());
    }

    #[test]
    fn passwords_and_profile_fields() {
        assert!(validate_password("password123").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_display_name("Alice").is_ok());
        assert!(validate_display_name(" ").is_err());
        assert!(validate_bio(&"b".repeat(MAX_BIO_LENGTH)).is_ok());
        assert!(validate_bio(&"b".repeat(MAX_BIO_LENGTH + 1)).is_err());
    }
}
