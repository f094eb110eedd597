use crate::domain::Document;

pub const EMAIL_FIELD: &str = "email";

/// Trims surrounding whitespace and lowercases.
///
/// Lowercasing maps each character on its own, with no context rules: a
/// final `Σ` becomes `σ`, and `İ` becomes a plain `i`. A whitespace-only value
/// becomes the empty string rather than being rejected.
pub fn normalize_email(value: &str) -> String {
    let trimmed = value.trim();
    let mut normalized = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        match ch {
            DOTTED_CAPITAL_I => normalized.push('i'),
            _ => normalized.extend(ch.to_lowercase()),
        }
    }
    normalized
}

// Full case mapping would turn this into `i` plus a combining dot.
const DOTTED_CAPITAL_I: char = '\u{130}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailCheck {
    Missing,
    NotString { type_name: &'static str },
    Normalized,
    Changed { original: String, normalized: String },
}

impl EmailCheck {
    pub fn needs_update(&self) -> bool {
        matches!(self, EmailCheck::Changed { .. })
    }
}

pub fn inspect_email(document: &Document) -> EmailCheck {
    let Some(value) = document.field(EMAIL_FIELD) else {
        return EmailCheck::Missing;
    };
    let Some(raw) = value.as_str() else {
        return EmailCheck::NotString {
            type_name: value.type_name(),
        };
    };
    let normalized = normalize_email(raw);
    if normalized == raw {
        EmailCheck::Normalized
    } else {
        EmailCheck::Changed {
            original: raw.to_string(),
            normalized,
        }
    }
}
