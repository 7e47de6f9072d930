// Copyright 2025 Cowboy AI, LLC.

//! Naming rules for axioms and derived class constants

use crate::errors::{AxiomError, AxiomResult};

/// Derive the class constant name for a property (`firstName` → `FIRST_NAME`).
///
/// An underscore is inserted after every lowercase letter that is followed
/// by a character other than a lowercase letter, digit or underscore, and
/// the result is upper-cased.
pub fn constant_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut chars = name.chars().peekable();
    while let Some(ch) = chars.next() {
        out.push(ch.to_ascii_uppercase());
        if ch.is_ascii_lowercase() {
            if let Some(next) = chars.peek() {
                if !(next.is_ascii_lowercase() || next.is_ascii_digit() || *next == '_') {
                    out.push('_');
                }
            }
        }
    }
    out
}

/// Validate a property name against the reserved suffix and identifier rules
pub fn validate_property_name(name: &str, reserved_suffix: &str) -> AxiomResult<()> {
    let reject = |reason: &str| {
        Err(AxiomError::IllegalPropertyName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };
    if name.is_empty() {
        return reject("name is empty");
    }
    if !reserved_suffix.is_empty() && name.ends_with(reserved_suffix) {
        return reject("suffix is reserved for slot accessors");
    }
    if name.starts_with("__") {
        return reject("double underscore prefix is reserved for the runtime");
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('_');
    if first.is_ascii_digit() {
        return reject("name must not start with a digit");
    }
    if !name.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
        return reject("name must be an identifier");
    }
    Ok(())
}

/// Last segment of a dotted class id (`demo.bank.Account` → `Account`)
pub fn short_name(id: &str) -> &str {
    id.rsplit('.').next().unwrap_or(id)
}

/// Package part of a dotted class id (`demo.bank.Account` → `demo.bank`)
pub fn package(id: &str) -> &str {
    match id.rfind('.') {
        Some(idx) => &id[..idx],
        None => "",
    }
}
