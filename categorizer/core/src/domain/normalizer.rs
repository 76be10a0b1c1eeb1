// Copyright (c) 2026 SpendLens Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Text Normalizer Domain Service
//!
//! Turns noisy bank narration ("UPI/12JAN/8812345678/SWIGGY*ORDER") into the
//! canonical string the caches are keyed on ("upi swiggy order").
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure, deterministic text canonicalization

use once_cell::sync::Lazy;
use regex::Regex;

/// Short date-like tokens such as `12jan` or `3mar`
static DATE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,2}[a-z]{3}").unwrap());

/// Standalone digit runs of four or more (reference numbers)
static REFERENCE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4,}\b").unwrap());

static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").unwrap());

/// Canonicalize transaction text.
///
/// Lowercases, strips date-like tokens and reference numbers, replaces
/// everything outside `[a-z0-9]` with spaces and collapses whitespace.
/// The pass is repeated until the output stops changing, which makes the
/// function idempotent even when a removal glues two fragments into a new
/// strippable token.
pub fn normalize(raw: &str) -> String {
    let mut current = normalize_pass(raw);
    loop {
        let next = normalize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_pass(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let text = raw.to_lowercase();
    let text = DATE_TOKEN.replace_all(&text, "");
    let text = REFERENCE_NUMBER.replace_all(&text, "");
    let text = NON_ALPHANUMERIC.replace_all(&text, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text fed to the normalizer for a transaction.
///
/// Uses the raw description when present; otherwise joins beneficiary name
/// and remarks, skipping missing parts.
pub fn description_source(
    raw_description: Option<&str>,
    beneficiary_name: Option<&str>,
    remarks: Option<&str>,
) -> String {
    if let Some(raw) = raw_description.filter(|r| !r.trim().is_empty()) {
        return raw.to_string();
    }
    [beneficiary_name, remarks]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_noise() {
        assert_eq!(normalize("UPI/12JAN/8812345678/SWIGGY*ORDER"), "upi swiggy order");
        assert_eq!(normalize("AMZN MKTPLACE PMTS  #4471"), "amzn mktplace pmts");
        assert_eq!(normalize("Cafe   Coffee  Day 123"), "cafe coffee day 123");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  ***  "), "");
    }

    #[test]
    fn test_idempotent_on_tricky_inputs() {
        let inputs = [
            "1ab12cdec",
            "ab_1234",
            "1234é",
            "Sitaram Temple Payment",
            "NEFT-HDFC0001234-RENT APR",
            "ÀÉÎ ñ 99999 x",
            "POS 05FEB 4321 STARBUCKS",
            "",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_output_alphabet() {
        let out = normalize("Ünïcode & Symbols!! 12/34 -- ok");
        assert!(out.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' '));
        assert!(!out.contains("  "));
    }

    #[test]
    fn test_description_source() {
        assert_eq!(description_source(Some("POS STARBUCKS"), Some("x"), Some("y")), "POS STARBUCKS");
        assert_eq!(description_source(None, Some("Sitaram Temple"), Some("Payment")), "Sitaram Temple Payment");
        assert_eq!(description_source(Some("   "), None, Some("Payment")), "Payment");
        assert_eq!(description_source(None, None, None), "");
    }
}
