// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text normalization and structured intent detection.

/// Structured commands recognized by substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent<'a> {
    Catalog,
    /// Order command with the text following the `order` keyword.
    Order(&'a str),
    Status,
}

/// Trim and lowercase inbound text.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Detect a structured intent in already-normalized text.
///
/// Checked in order: `catalog`, `order`, `status`.
pub fn detect(normalized: &str) -> Option<Intent<'_>> {
    if normalized.contains("catalog") {
        return Some(Intent::Catalog);
    }
    if let Some(pos) = normalized.find("order") {
        return Some(Intent::Order(normalized[pos + "order".len()..].trim()));
    }
    if normalized.contains("status") {
        return Some(Intent::Status);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  HeLLo \n"), "hello");
    }

    #[test]
    fn detects_intents_by_substring() {
        assert_eq!(detect("show me the catalog please"), Some(Intent::Catalog));
        assert_eq!(detect("status?"), Some(Intent::Status));
        assert_eq!(
            detect("order gaming laptop:1, mouse:2"),
            Some(Intent::Order("gaming laptop:1, mouse:2"))
        );
        assert_eq!(detect("i want to order"), Some(Intent::Order("")));
        assert_eq!(detect("good morning"), None);
    }

    #[test]
    fn catalog_wins_over_order() {
        assert_eq!(detect("order from catalog"), Some(Intent::Catalog));
    }
}
