//! Field validation and normalization shared by create and update.

/// Trim a name and require at least two characters.
pub fn normalize_name(name: &str) -> Result<String, String> {
    let name = name.trim();
    if name.chars().count() < 2 {
        return Err("Name must be at least 2 characters long".into());
    }
    Ok(name.to_string())
}

/// Trim and lowercase an email, requiring a `local@domain.tld` shape.
pub fn normalize_email(email: &str) -> Result<String, String> {
    let email = email.trim().to_lowercase();
    if is_email_shaped(&email) {
        Ok(email)
    } else {
        Err("Please enter a valid email".into())
    }
}

/// Trim a phone number and require ten or more digits and nothing else.
pub fn normalize_phone(phone: &str) -> Result<String, String> {
    let phone = phone.trim();
    if phone.len() >= 10 && phone.chars().all(|c| c.is_ascii_digit()) {
        Ok(phone.to_string())
    } else {
        Err("Please enter a valid phone number".into())
    }
}

// Matches `\S+@\S+\.\S+`, anchored
fn is_email_shaped(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    // Some '@' must have a non-empty local part before it and a '.' with
    // non-empty text on both sides after it.
    email.match_indices('@').any(|(at, _)| {
        let (local, rest) = (&email[..at], &email[at + 1..]);
        !local.is_empty()
            && rest
                .match_indices('.')
                .any(|(dot, _)| dot > 0 && dot + 1 < rest.len())
    })
}
