//! Typed binding of client input.
//!
//! Raw inputs arrive with every field optional and untyped; `validate` checks
//! all of them and reports every violation at once.

use domains::{CommentId, Result, ValidationErrors};
use serde::Deserialize;

use crate::tree::Paging;

pub const MIN_TEXT_CHARS: usize = 3;
pub const MAX_TEXT_CHARS: usize = 65_535;
pub const MAX_FIELD_CHARS: usize = 254;

/// Query string of a listing request, as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchParams {
    pub parent: Option<String>,
    pub limit: Option<String>,
    pub nested_limit: Option<String>,
    pub after: Option<String>,
    pub plain: Option<String>,
}

/// A validated listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchQuery {
    /// `None` lists the whole thread.
    pub parent: Option<CommentId>,
    pub paging: Paging,
    pub plain: bool,
}

impl FetchParams {
    pub fn validate(&self) -> Result<FetchQuery> {
        let mut errors = ValidationErrors::new();

        let parent = parse_non_negative(&mut errors, "parent", self.parent.as_deref());
        let limit = parse_non_negative(&mut errors, "limit", self.limit.as_deref());
        let nested_limit =
            parse_non_negative(&mut errors, "nested_limit", self.nested_limit.as_deref());

        let after = match present(self.after.as_deref()) {
            None => 0.0,
            Some(raw) => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => {
                    errors.push("after", "must be a number of seconds since the epoch");
                    0.0
                }
            },
        };

        let plain = match present(self.plain.as_deref()) {
            None | Some("0") => false,
            Some("1") => true,
            Some(_) => {
                errors.push("plain", "must be 0 or 1");
                false
            }
        };

        errors.into_result(FetchQuery {
            parent,
            paging: Paging {
                limit: page_size(limit),
                nested_limit: page_size(nested_limit),
                after,
            },
            plain,
        })
    }
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_non_negative(
    errors: &mut ValidationErrors,
    field: &'static str,
    raw: Option<&str>,
) -> Option<i64> {
    let raw = present(raw)?;
    match raw.parse::<i64>() {
        Ok(v) if v >= 0 => Some(v),
        Ok(_) => {
            errors.push(field, "must not be negative");
            None
        }
        Err(_) => {
            errors.push(field, "must be an integer");
            None
        }
    }
}

// 0 or absent means unlimited.
fn page_size(limit: Option<i64>) -> Option<usize> {
    limit.filter(|&n| n > 0).map(|n| n as usize)
}

/// JSON body of a new comment, as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentSubmission {
    pub text: Option<String>,
    pub author: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub parent: Option<i64>,
    pub title: Option<String>,
    #[serde(default)]
    pub notification: Option<Flag>,
}

/// Clients send the notification opt-in either as a boolean or as 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(n) => n != 0,
        }
    }
}

/// A submission that passed every local check. Whether `parent` belongs to the
/// target thread still needs storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    pub text: String,
    pub author: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub parent: Option<CommentId>,
    pub title: Option<String>,
    pub notification: bool,
}

impl CommentSubmission {
    pub fn validate(self) -> Result<ValidSubmission> {
        let mut errors = ValidationErrors::new();

        let text = self.text.as_deref().map(str::trim).unwrap_or_default();
        let chars = text.chars().count();
        if chars < MIN_TEXT_CHARS {
            errors.push(
                "text",
                format!("must be at least {MIN_TEXT_CHARS} characters"),
            );
        } else if chars > MAX_TEXT_CHARS {
            errors.push("text", format!("must be at most {MAX_TEXT_CHARS} characters"));
        }

        let author = optional_field(&mut errors, "author", self.author);
        let email = optional_field(&mut errors, "email", self.email);
        let website = optional_field(&mut errors, "website", self.website);
        if let Some(site) = &website {
            if !(site.starts_with("http://") || site.starts_with("https://")) {
                errors.push("website", "must start with http:// or https://");
            }
        }

        if let Some(parent) = self.parent {
            if parent <= 0 {
                errors.push("parent", "must be a positive comment id");
            }
        }

        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        errors.into_result(ValidSubmission {
            text: text.to_string(),
            author,
            email,
            website,
            parent: self.parent,
            title,
            notification: self.notification.is_some_and(Flag::is_set),
        })
    }
}

fn optional_field(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<String>,
) -> Option<String> {
    let value = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())?;
    if value.chars().count() > MAX_FIELD_CHARS {
        errors.push(field, format!("must be at most {MAX_FIELD_CHARS} characters"));
    }
    Some(value)
}
