use crate::{Error, Result};

/// Validate a brew formula/service name before it reaches a command line.
pub(crate) fn validate_service_name(input: &str) -> Result<()> {
    validate_no_control("service name", input)?;
    if input.trim().is_empty() {
        return Err(Error::invalid_input("service name must not be empty"));
    }
    if input != input.trim() {
        return Err(Error::invalid_input(
            "service name must not have surrounding whitespace",
        ));
    }
    if input.starts_with('-') {
        return Err(Error::invalid_input("service name must not start with '-'"));
    }
    if input.contains('/') || input.contains('\\') {
        return Err(Error::invalid_input(
            "service name must not contain path separators",
        ));
    }
    Ok(())
}

/// Normalize the optional `--sudo-service-user` value.
///
/// Blank input means "no user". Anything else must be a single token.
pub(crate) fn normalize_sudo_user(input: Option<&str>) -> Result<Option<String>> {
    let Some(raw) = input else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    validate_no_control("sudo service user", trimmed)?;
    if trimmed.chars().any(char::is_whitespace) {
        return Err(Error::invalid_input(
            "sudo service user must not contain whitespace",
        ));
    }
    if trimmed.starts_with('-') {
        return Err(Error::invalid_input(
            "sudo service user must not start with '-'",
        ));
    }
    Ok(Some(trimmed.to_string()))
}

pub(crate) fn validate_no_control(context: &'static str, input: &str) -> Result<()> {
    if input.contains('\0') {
        return Err(Error::invalid_input(format!(
            "{context} must not contain NUL"
        )));
    }
    if input.contains('\n') || input.contains('\r') {
        return Err(Error::invalid_input(format!(
            "{context} must not contain newlines"
        )));
    }
    if input.chars().any(|c| c.is_control()) {
        return Err(Error::invalid_input(format!(
            "{context} must not contain control characters"
        )));
    }
    Ok(())
}
