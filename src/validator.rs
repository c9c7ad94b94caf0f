//! Translation quality checks.
//!
//! A translated message must keep the same Fluent structure as its source:
//! the same variables, the same message and term references, and the same
//! attributes. Problems are reported but never fail a translation.

use crate::ftl::ResourceFile;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Validation report containing errors and warnings about a translation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Missing or invented variables; the message will misrender
    pub errors: Vec<String>,

    /// Structural differences that may be intentional
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// No errors and no warnings
    pub fn is_clean(&self) -> bool {
        !self.has_errors() && !self.has_warnings()
    }
}

/// Validator for translated resource files.
pub struct TranslationValidator;

static VARIABLE_REGEX: OnceLock<Regex> = OnceLock::new();
static REFERENCE_REGEX: OnceLock<Regex> = OnceLock::new();
static ATTRIBUTE_REGEX: OnceLock<Regex> = OnceLock::new();

impl TranslationValidator {
    /// Compare every message of `translated` against the same key in `base`.
    pub fn validate(base: &ResourceFile, translated: &ResourceFile) -> ValidationReport {
        let mut report = ValidationReport::new();

        for (key, body) in translated.messages() {
            let Some(original) = base.get(key) else {
                continue;
            };
            Self::validate_message(key, original, body, &mut report);
        }

        report
    }

    /// Check one message body against its source
    pub fn validate_message(
        key: &str,
        original: &str,
        translated: &str,
        report: &mut ValidationReport,
    ) {
        let orig_vars = Self::extract_variables(original);
        let trans_vars = Self::extract_variables(translated);
        if orig_vars != trans_vars {
            report.errors.push(format!(
                "`{}`: variable mismatch: original has {:?}, translation has {:?}",
                key, orig_vars, trans_vars
            ));
        }

        let orig_refs = Self::extract_references(original);
        let trans_refs = Self::extract_references(translated);
        if orig_refs != trans_refs {
            report.warnings.push(format!(
                "`{}`: reference mismatch: original has {:?}, translation has {:?}",
                key, orig_refs, trans_refs
            ));
        }

        let orig_attrs = Self::extract_attributes(original);
        let trans_attrs = Self::extract_attributes(translated);
        if orig_attrs != trans_attrs {
            report.warnings.push(format!(
                "`{}`: attribute mismatch: original has {:?}, translation has {:?}",
                key, orig_attrs, trans_attrs
            ));
        }
    }

    /// Extract `$variable` names used inside placeables
    fn extract_variables(text: &str) -> BTreeSet<String> {
        let regex = VARIABLE_REGEX
            .get_or_init(|| Regex::new(r"\$([A-Za-z][A-Za-z0-9_-]*)").expect("Invalid regex"));

        regex
            .captures_iter(text)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }

    /// Extract message (`{ other }`) and term (`{ -brand }`) references
    fn extract_references(text: &str) -> BTreeSet<String> {
        let regex = REFERENCE_REGEX.get_or_init(|| {
            Regex::new(r"\{\s*(-?[A-Za-z][A-Za-z0-9_-]*(?:\.[A-Za-z][A-Za-z0-9_-]*)?)\s*[}(]")
                .expect("Invalid regex")
        });

        regex
            .captures_iter(text)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
            .filter(|name| !name.chars().all(|c| c.is_ascii_uppercase()))
            .collect()
    }

    /// Extract `.attribute` names declared at the start of a line
    fn extract_attributes(text: &str) -> BTreeSet<String> {
        let regex = ATTRIBUTE_REGEX.get_or_init(|| {
            Regex::new(r"(?m)^\s*\.([A-Za-z][A-Za-z0-9_-]*)\s*=").expect("Invalid regex")
        });

        regex
            .captures_iter(text)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }
}
