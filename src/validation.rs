//! Request validation for the public form, admin patches and content updates.
//!
//! Everything here runs before a request reaches the lead or content services;
//! failures become `AppError::BadRequest`.

use regex::Regex;
use std::sync::OnceLock;

use crate::errors::AppError;
use crate::models::{ContentUpdate, ContactPatch, LeadPatch, PublicLeadForm, StatusUpdate};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_TEXT_LEN: usize = 2000;
pub const MAX_CONTENT_MESSAGE_LEN: usize = 1000;
pub const MAX_STATUS_LEN: usize = 50;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    // RFC 5322 simplified: local@domain.tld
    EMAIL.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
        )
        .expect("email regex is valid")
    })
}

/// Validate email address format.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    email.len() >= 5 && email.len() <= 254 && email_regex().is_match(email)
}

/// Number of digits in a phone number, ignoring formatting.
pub fn phone_digit_count(phone: &str) -> usize {
    phone.chars().filter(|c| c.is_ascii_digit()).count()
}

fn require_text(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("'{}' is required", field)));
    }
    check_length(field, value, max)
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.chars().count() > max {
        return Err(AppError::BadRequest(format!(
            "'{}' must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

fn check_optional(field: &str, value: Option<&String>, max: usize) -> Result<(), AppError> {
    match value {
        Some(v) => check_length(field, v, max),
        None => Ok(()),
    }
}

fn check_flag(field: &str, value: Option<&String>) -> Result<(), AppError> {
    match value.map(|v| v.trim().to_lowercase()) {
        None => Ok(()),
        Some(v) if v.is_empty() || v == "yes" || v == "no" => Ok(()),
        Some(_) => Err(AppError::BadRequest(format!(
            "'{}' must be \"yes\" or \"no\"",
            field
        ))),
    }
}

fn check_phone(phone: &str) -> Result<(), AppError> {
    if phone_digit_count(phone) < 4 {
        return Err(AppError::BadRequest(
            "'phone' must contain at least 4 digits".to_string(),
        ));
    }
    if phone
        .chars()
        .any(|c| !(c.is_ascii_digit() || " +-().".contains(c)))
    {
        return Err(AppError::BadRequest(
            "'phone' contains invalid characters".to_string(),
        ));
    }
    check_length("phone", phone, 40)
}

pub fn validate_public_form(form: &PublicLeadForm) -> Result<(), AppError> {
    require_text("first_name", &form.first_name, MAX_NAME_LEN)?;
    require_text("last_name", &form.last_name, MAX_NAME_LEN)?;

    if !is_valid_email(&form.email) {
        return Err(AppError::BadRequest("'email' must be a valid email".to_string()));
    }
    check_phone(&form.phone)?;

    check_optional("preferred_contact", form.preferred_contact.as_ref(), MAX_NAME_LEN)?;
    check_optional("suburb", form.suburb.as_ref(), MAX_NAME_LEN)?;
    check_optional("address", form.address.as_ref(), MAX_TEXT_LEN)?;
    check_optional("timeframe", form.timeframe.as_ref(), MAX_NAME_LEN)?;
    check_optional("description", form.description.as_ref(), MAX_TEXT_LEN)?;

    check_flag("interested", form.interested.as_ref())?;
    check_flag("interested_buying", form.interested_buying.as_ref())?;
    check_flag("buying", form.buying.as_ref())?;
    Ok(())
}

fn validate_contact_patch(contact: &ContactPatch) -> Result<(), AppError> {
    if let Some(ref v) = contact.first_name {
        require_text("contact.first_name", v, MAX_NAME_LEN)?;
    }
    if let Some(ref v) = contact.last_name {
        require_text("contact.last_name", v, MAX_NAME_LEN)?;
    }
    if let Some(ref email) = contact.email {
        if !is_valid_email(email) {
            return Err(AppError::BadRequest(
                "'contact.email' must be a valid email".to_string(),
            ));
        }
    }
    if let Some(ref phone) = contact.phone {
        check_phone(phone)?;
    }
    check_optional("contact.preferred_contact", contact.preferred_contact.as_ref(), MAX_NAME_LEN)?;
    check_optional("contact.suburb", contact.suburb.as_ref(), MAX_NAME_LEN)?;
    check_optional("contact.address", contact.address.as_ref(), MAX_TEXT_LEN)?;
    check_optional("contact.timeframe", contact.timeframe.as_ref(), MAX_NAME_LEN)?;
    check_optional("contact.description", contact.description.as_ref(), MAX_TEXT_LEN)?;
    Ok(())
}

pub fn validate_lead_patch(patch: &LeadPatch) -> Result<(), AppError> {
    if patch.contact.is_none() && patch.status.is_none() && patch.metadata.is_none() {
        return Err(AppError::BadRequest(
            "Patch must include contact, status or metadata".to_string(),
        ));
    }
    if let Some(ref contact) = patch.contact {
        validate_contact_patch(contact)?;
    }
    if let Some(ref status) = patch.status {
        if let Some(ref current) = status.current {
            require_text("status.current", current, MAX_STATUS_LEN)?;
        }
        check_optional("status.notes", status.notes.as_ref(), MAX_TEXT_LEN)?;
        check_optional("status.changed_by", status.changed_by.as_ref(), MAX_NAME_LEN)?;
    }
    if let Some(ref metadata) = patch.metadata {
        if let Some(ref tags) = metadata.tags {
            for tag in tags {
                require_text("metadata.tags[]", tag, MAX_NAME_LEN)?;
            }
        }
    }
    Ok(())
}

pub fn validate_status_update(update: &StatusUpdate) -> Result<(), AppError> {
    require_text("status", &update.status, MAX_STATUS_LEN)?;
    check_optional("notes", update.notes.as_ref(), MAX_TEXT_LEN)?;
    check_optional("changed_by", update.changed_by.as_ref(), MAX_NAME_LEN)
}

pub fn validate_content_update(update: &ContentUpdate) -> Result<(), AppError> {
    if update.message.is_none() && update.active.is_none() {
        return Err(AppError::BadRequest(
            "Body must include 'message' or 'active'".to_string(),
        ));
    }
    check_optional("message", update.message.as_ref(), MAX_CONTENT_MESSAGE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> PublicLeadForm {
        PublicLeadForm {
            first_name: "A".into(),
            last_name: "B".into(),
            email: "x@y.com".into(),
            phone: "0400000000".into(),
            interested: Some("yes".into()),
            timeframe: Some("asap".into()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_minimal_form() {
        assert!(validate_public_form(&form()).is_ok());
    }

    #[test]
    fn rejects_missing_names_and_bad_email() {
        let mut f = form();
        f.first_name = "  ".into();
        assert!(validate_public_form(&f).is_err());

        let mut f = form();
        f.email = "not-an-email".into();
        assert!(validate_public_form(&f).is_err());
    }

    #[test]
    fn rejects_short_or_garbled_phone() {
        let mut f = form();
        f.phone = "12".into();
        assert!(validate_public_form(&f).is_err());

        let mut f = form();
        f.phone = "0400abc000".into();
        assert!(validate_public_form(&f).is_err());

        let mut f = form();
        f.phone = "+61 (0)400 000-000".into();
        assert!(validate_public_form(&f).is_ok());
    }

    #[test]
    fn interest_flags_must_be_yes_or_no() {
        let mut f = form();
        f.interested_buying = Some("maybe".into());
        assert!(validate_public_form(&f).is_err());
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user+tag@example.co.uk"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user @example.com"));
    }

    #[test]
    fn content_update_needs_a_field_and_bounded_message() {
        assert!(validate_content_update(&ContentUpdate::default()).is_err());
        assert!(validate_content_update(&ContentUpdate {
            message: Some("x".repeat(1001)),
            active: None,
        })
        .is_err());
        assert!(validate_content_update(&ContentUpdate {
            message: None,
            active: Some(false),
        })
        .is_ok());
    }

    #[test]
    fn empty_patch_is_rejected() {
        assert!(validate_lead_patch(&LeadPatch::default()).is_err());
    }
}
