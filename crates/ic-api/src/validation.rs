//! Request payloads and boundary validation

use std::sync::OnceLock;

use ic_common::{ItemDraft, ItemStatus};
use regex::Regex;
use serde::Deserialize;
use tracing::error;
use utoipa::ToSchema;

use crate::error::FieldError;

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9]{2,}@[A-Za-z0-9]{2,}\.[A-Za-z]{2,}$";

static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn email_regex() -> Option<&'static Regex> {
    EMAIL_REGEX
        .get_or_init(|| match Regex::new(EMAIL_PATTERN) {
            Ok(re) => Some(re),
            Err(e) => {
                error!(error = %e, "Email pattern failed to compile");
                None
            }
        })
        .as_ref()
}

/// Create or replace an item.
///
/// Every field is optional at the JSON level so that a missing field is
/// reported as a validation error instead of a deserialization failure.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ItemRequest {
    /// Item name, must not be blank
    pub name: Option<String>,

    /// Item description, must not be blank
    pub description: Option<String>,

    /// One of `unprocessed`, `processed`
    pub status: Option<String>,

    /// Contact email
    pub email: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl ItemRequest {
    /// Collects every field error rather than stopping at the first
    pub fn validate(&self) -> Result<ItemDraft, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = non_blank(&self.name);
        if name.is_none() {
            errors.push(FieldError::new("name", "Name required"));
        }

        let description = non_blank(&self.description);
        if description.is_none() {
            errors.push(FieldError::new("description", "Description required"));
        }

        let status = match non_blank(&self.status) {
            None => {
                errors.push(FieldError::new("status", "Status required"));
                None
            }
            Some(raw) => match raw.parse::<ItemStatus>() {
                Ok(status) => Some(status),
                Err(_) => {
                    let allowed: Vec<&str> = ItemStatus::ALL.iter().map(|s| s.as_str()).collect();
                    errors.push(FieldError::new(
                        "status",
                        format!("Status must be one of: {}", allowed.join(", ")),
                    ));
                    None
                }
            },
        };

        let email = match non_blank(&self.email) {
            None => {
                errors.push(FieldError::new("email", "Email required"));
                None
            }
            Some(email) if !email_regex().is_some_and(|re| re.is_match(email)) => {
                errors.push(FieldError::new("email", "Email format is invalid"));
                None
            }
            Some(email) => Some(email),
        };

        match (name, description, status, email) {
            (Some(name), Some(description), Some(status), Some(email)) if errors.is_empty() => {
                Ok(ItemDraft::new(name, description, email).with_status(status))
            }
            _ => Err(errors),
        }
    }
}
