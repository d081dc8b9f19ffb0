//! Client-side checks on account forms, applied before any request is sent.

use shared::protocol::RegisterRequest;

use crate::error::{GalleryError, GalleryResult};

pub const MIN_PASSWORD_LEN: usize = 8;
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=20;
const PASSWORD_SPECIALS: &[char] = &['@', '$', '!', '%', '*', '?', '&'];

fn invalid(message: &str) -> GalleryError {
    GalleryError::Validation(message.to_string())
}

/// Loose `local@domain.tld` shape check.
pub fn validate_email(email: &str) -> GalleryResult<()> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(invalid("invalid email address"));
    };
    let domain_ok = domain
        .rsplit_once('.')
        .is_some_and(|(host, tld)| !host.is_empty() && tld.len() >= 2);
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(invalid("invalid email address"));
    }
    Ok(())
}

pub fn validate_login(email: &str, password: &str) -> GalleryResult<()> {
    validate_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid("password must be at least 8 characters"));
    }
    Ok(())
}

/// Mixed case, a digit and one of `@$!%*?&`, nothing else.
pub fn validate_strong_password(password: &str) -> GalleryResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid("password must be at least 8 characters"));
    }
    let allowed = password
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(&ch));
    let strong = password.chars().any(|ch| ch.is_ascii_lowercase())
        && password.chars().any(|ch| ch.is_ascii_uppercase())
        && password.chars().any(|ch| ch.is_ascii_digit())
        && password.chars().any(|ch| PASSWORD_SPECIALS.contains(&ch));
    if !(allowed && strong) {
        return Err(invalid(
            "password must include uppercase, lowercase, number, and special character",
        ));
    }
    Ok(())
}

pub fn validate_registration(registration: &RegisterRequest) -> GalleryResult<()> {
    if !USERNAME_LEN.contains(&registration.username.trim().chars().count()) {
        return Err(invalid("username must be 3 to 20 characters"));
    }
    validate_email(&registration.email)?;
    let phone = registration.phone.trim();
    if phone.len() != 10 || !phone.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(invalid("phone number must be 10 digits"));
    }
    validate_strong_password(&registration.password)
}

pub fn validate_password_change(old_password: &str, new_password: &str) -> GalleryResult<()> {
    if old_password.is_empty() {
        return Err(invalid("old password is required"));
    }
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid("password must be at least 8 characters"));
    }
    if new_password == old_password {
        return Err(invalid("new password must be different from old password"));
    }
    Ok(())
}
