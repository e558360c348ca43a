use crate::error::{Error, Result};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 32;
pub const NICKNAME_MAX: usize = 64;
pub const PASSWORD_MIN: usize = 8;
pub const CONTENT_MAX: usize = 10_000;

pub fn username(value: &str) -> Result<()> {
    let len = value.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(Error::validation(format!(
            "username must be {USERNAME_MIN}-{USERNAME_MAX} characters"
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(Error::validation(
            "username may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(())
}

pub fn nickname(value: &str) -> Result<()> {
    let len = value.trim().chars().count();
    if len == 0 || value.chars().count() > NICKNAME_MAX {
        return Err(Error::validation(format!(
            "nickname must be 1-{NICKNAME_MAX} characters"
        )));
    }
    Ok(())
}

pub fn password(value: &str) -> Result<()> {
    if value.chars().count() < PASSWORD_MIN {
        return Err(Error::validation(format!(
            "password must be at least {PASSWORD_MIN} characters"
        )));
    }
    Ok(())
}

pub fn content(value: &str) -> Result<()> {
    if value.is_empty() || value.chars().count() > CONTENT_MAX {
        return Err(Error::validation(format!(
            "content must be 1-{CONTENT_MAX} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(username("alice_01").is_ok());
        assert!(username("a.b-c").is_ok());
        assert!(username("ab").is_err());
        assert!(username(&"x".repeat(33)).is_err());
        assert!(username("has space").is_err());
        assert!(username("ünïcode").is_err());
    }

    #[test]
    fn nicknames() {
        assert!(nickname("Alice").is_ok());
        assert!(nickname("   ").is_err());
        assert!(nickname(&"n".repeat(65)).is_err());
    }

    #[test]
    fn passwords_and_content() {
        assert!(password("12345678").is_ok());
        assert!(password("short").is_err());
        assert!(content("hi").is_ok());
        assert!(content("").is_err());
        assert!(content(&"c".repeat(10_001)).is_err());
    }
}
