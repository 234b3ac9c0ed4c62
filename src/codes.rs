//! Code-indexed line extraction. SCVS filings print a stable registry code
//! next to each line item (`9501  FLUJOS DE EFECTIVO ...  (1.500,00)`);
//! scanning for `<code> ... <value>` pairs gives a deterministic extraction
//! path that needs no retrieval or completion call.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::PageText;
use crate::numeral;

// A 4-6 digit code, then up to 40 characters containing no digit or sign,
// then a value-like token. The window is lazy and the value must contain a
// digit: a greedy window would steal the opening parenthesis of a negative
// amount, and without the digit requirement a parenthesized word inside the
// label ("INCREMENTO (DISMINUCIÓN) ...") would become the value token.
static CODE_VALUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<code>\b\d{4,6}\b)[^\-+\d]{0,40}?(?P<val>[\(\)\-\d\.,]*\d[\(\)\-\d\.,]*)")
        .unwrap()
});

/// Winning value for one registry code, with every page it was printed on
/// and the line that supplied the value.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeIndexEntry {
    pub value: f64,
    pub pages: BTreeSet<u32>,
    pub raw_line: String,
}

/// Index from registry code to its last printed value. Tables often repeat
/// a running total, so the last occurrence of a code overwrites earlier
/// ones; pages accumulate across occurrences.
#[derive(Debug, Clone, Default)]
pub struct CodeIndex {
    entries: BTreeMap<String, CodeIndexEntry>,
}

impl CodeIndex {
    /// Scan every page line by line. A line contributes at most one
    /// code/value pair; lines whose value token has no parseable numeral are
    /// skipped rather than indexed as zero.
    pub fn from_pages(pages: &[PageText]) -> Self {
        let mut index = CodeIndex::default();
        for page in pages {
            for line in page.text.lines() {
                index.scan_line(line, page.page);
            }
        }
        index
    }

    fn scan_line(&mut self, line: &str, page: u32) {
        let captures = match CODE_VALUE_RE.captures(line) {
            Some(captures) => captures,
            None => return,
        };
        let value = match numeral::normalize_numeral(&captures["val"]) {
            Some(value) => value,
            None => return,
        };
        let code = captures["code"].to_string();

        let entry = self.entries.entry(code).or_insert_with(|| CodeIndexEntry {
            value,
            pages: BTreeSet::new(),
            raw_line: line.to_string(),
        });
        entry.value = value;
        entry.raw_line = line.to_string();
        entry.pages.insert(page);
    }

    /// Exact full-string lookup: `"9501"` never matches an entry for
    /// `"950105"` or vice versa.
    pub fn get(&self, code: &str) -> Option<&CodeIndexEntry> {
        self.entries.get(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CodeIndexEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page: u32, text: &str) -> PageText {
        PageText::new(page, text)
    }

    #[test]
    fn test_code_and_value_on_one_line() {
        let index = CodeIndex::from_pages(&[page(1, "9501 FLUJO NETO DE OPERACION 1.234,56")]);
        let entry = index.get("9501").unwrap();
        assert_eq!(entry.value, 1234.56);
        assert_eq!(entry.pages.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert!(entry.raw_line.contains("FLUJO NETO"));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let text = "9501 SUBTOTAL 100,00\nOTRA LINEA\n9501 TOTAL 250,00";
        let index = CodeIndex::from_pages(&[page(1, text)]);
        let entry = index.get("9501").unwrap();
        assert_eq!(entry.value, 250.0);
        assert!(entry.raw_line.contains("TOTAL"));
    }

    #[test]
    fn test_pages_accumulate_across_occurrences() {
        let pages = vec![
            page(1, "9505 INCREMENTO NETO 10,00"),
            page(3, "9505 INCREMENTO NETO 20,00"),
        ];
        let index = CodeIndex::from_pages(&pages);
        let entry = index.get("9505").unwrap();
        assert_eq!(entry.value, 20.0);
        assert_eq!(entry.pages.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_exact_code_equality() {
        let text = "950105 INTERESES PAGADOS 500,00\n9501 FLUJO DE OPERACION 9.000,00";
        let index = CodeIndex::from_pages(&[page(1, text)]);
        assert_eq!(index.get("950105").unwrap().value, 500.0);
        assert_eq!(index.get("9501").unwrap().value, 9000.0);
        assert!(index.get("95010").is_none());
    }

    #[test]
    fn test_parenthesized_negative_value() {
        let index = CodeIndex::from_pages(&[page(2, "9507 EFECTIVO AL FINAL (1.500,00)")]);
        let entry = index.get("9507").unwrap();
        assert_eq!(entry.value, -1500.0);
        assert_eq!(entry.pages.iter().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_parenthesized_negative_after_label() {
        // The label must not swallow the opening parenthesis of the amount.
        let index = CodeIndex::from_pages(&[page(1, "9501 FLUJO NETO DE OPERACION (1.500,00)")]);
        assert_eq!(index.get("9501").unwrap().value, -1500.0);
    }

    #[test]
    fn test_parentheses_inside_label_keep_positive_value() {
        let index =
            CodeIndex::from_pages(&[page(1, "9505 INCREMENTO (DISMINUCION) NETO 2.000,00")]);
        assert_eq!(index.get("9505").unwrap().value, 2000.0);
    }

    #[test]
    fn test_parenthesized_label_beyond_window_is_skipped() {
        // 43 label characters: over the window, so the line is dropped
        // instead of indexing the label's parenthesis as a value.
        let text = "9505 INCREMENTO (DISMINUCIÓN) NETO DE EFECTIVO 2.000,00";
        let index = CodeIndex::from_pages(&[page(1, text)]);
        assert!(index.get("9505").is_none());
    }

    #[test]
    fn test_line_without_value_is_skipped() {
        let index = CodeIndex::from_pages(&[page(1, "9506 EFECTIVO AL PRINCIPIO DEL PERIODO")]);
        assert!(index.get("9506").is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_label_window_respected() {
        // More than 40 label characters between code and amount: no match.
        let long_label = format!("9501 {} 1.000,00", "X".repeat(60));
        let index = CodeIndex::from_pages(&[page(1, &long_label)]);
        assert!(index.get("9501").is_none());
    }

    #[test]
    fn test_short_and_long_numbers_are_not_codes() {
        let text = "123 RUBRO 10,00\n12345678 RUBRO 20,00";
        let index = CodeIndex::from_pages(&[page(1, text)]);
        assert!(index.is_empty());
    }
}
