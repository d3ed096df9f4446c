//! Recognizers for reference formats that predate the standardized one.
//!
//! Existing documents still carry these strings. They are recognized so
//! migration tooling can count and list them, never rewritten.

use crate::types::{DocumentType, SEPARATOR};

/// Historical reference layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyKind {
    /// A bare number: `42`.
    Numeric,
    /// Two-letter prefix and three digits: `DV001`.
    ShortCode,
    /// Supplier order number and year: `BC16/2025`.
    SupplierOrderYear,
    /// Prefix and six random hex characters: `MAT-ABC123`.
    HexCode,
    /// Prefix, year and counter: `DEV-2025-001`.
    YearCounter,
}

impl LegacyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyKind::Numeric => "numeric",
            LegacyKind::ShortCode => "short_code",
            LegacyKind::SupplierOrderYear => "supplier_order_year",
            LegacyKind::HexCode => "hex_code",
            LegacyKind::YearCounter => "year_counter",
        }
    }
}

impl std::fmt::Display for LegacyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recognized legacy reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyReference {
    /// The text exactly as stored.
    pub raw: String,
    pub kind: LegacyKind,
    /// Recovered from the prefix when it is a known one.
    pub document_type: Option<DocumentType>,
}

/// Tries every legacy layout in turn.
pub(crate) fn recognize(text: &str) -> Option<LegacyReference> {
    let (kind, document_type) = numeric(text)
        .or_else(|| short_code(text))
        .or_else(|| supplier_order_year(text))
        .or_else(|| hex_code(text))
        .or_else(|| year_counter(text))?;

    Some(LegacyReference {
        raw: text.to_string(),
        kind,
        document_type,
    })
}

type Match = (LegacyKind, Option<DocumentType>);

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn all_uppercase(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_uppercase())
}

fn numeric(text: &str) -> Option<Match> {
    all_digits(text).then_some((LegacyKind::Numeric, None))
}

fn short_code(text: &str) -> Option<Match> {
    if text.len() != 5 || !text.is_ascii() {
        return None;
    }
    let (prefix, digits) = text.split_at(2);
    if !all_uppercase(prefix) || !all_digits(digits) {
        return None;
    }
    let document_type = DocumentType::from_legacy_short_prefix(prefix)?;
    Some((LegacyKind::ShortCode, Some(document_type)))
}

fn supplier_order_year(text: &str) -> Option<Match> {
    let rest = text.strip_prefix("BC")?;
    let (number, year) = rest.split_once('/')?;
    (all_digits(number) && all_digits(year) && year.len() == 4)
        .then_some((LegacyKind::SupplierOrderYear, Some(DocumentType::SupplierOrder)))
}

fn hex_code(text: &str) -> Option<Match> {
    let (prefix, code) = text.split_once(SEPARATOR)?;
    if !(2..=4).contains(&prefix.len()) || !all_uppercase(prefix) {
        return None;
    }
    let is_hex = code.len() == 6
        && code
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b));
    is_hex.then(|| (LegacyKind::HexCode, DocumentType::from_prefix(prefix)))
}

fn year_counter(text: &str) -> Option<Match> {
    let mut parts = text.splitn(3, SEPARATOR);
    let (prefix, year, counter) = (parts.next()?, parts.next()?, parts.next()?);
    (all_uppercase(prefix) && year.len() == 4 && all_digits(year) && all_digits(counter))
        .then(|| (LegacyKind::YearCounter, DocumentType::from_prefix(prefix)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("7", LegacyKind::Numeric, None)]
    #[case("000123", LegacyKind::Numeric, None)]
    #[case("DV001", LegacyKind::ShortCode, Some(DocumentType::Quotation))]
    #[case("CM042", LegacyKind::ShortCode, Some(DocumentType::ClientOrder))]
    #[case("BC012", LegacyKind::ShortCode, Some(DocumentType::SupplierOrder))]
    #[case("BC16/2025", LegacyKind::SupplierOrderYear, Some(DocumentType::SupplierOrder))]
    #[case("DEV-1A2B3C", LegacyKind::HexCode, Some(DocumentType::Quotation))]
    #[case("MAT-ABC123", LegacyKind::HexCode, None)]
    #[case("BL-FFFFFF", LegacyKind::HexCode, None)]
    #[case("DEV-2025-001", LegacyKind::YearCounter, Some(DocumentType::Quotation))]
    #[case("CLI-2024-17", LegacyKind::YearCounter, None)]
    fn test_recognized(
        #[case] text: &str,
        #[case] kind: LegacyKind,
        #[case] document_type: Option<DocumentType>,
    ) {
        let legacy = recognize(text).unwrap();
        assert_eq!(legacy.kind, kind);
        assert_eq!(legacy.document_type, document_type);
    }

    #[rstest]
    #[case("XX001")]
    #[case("DV0001")]
    #[case("BC16/25")]
    #[case("MAT-abc123")]
    #[case("MATERIAL-ABC123")]
    #[case("DEV-2025-")]
    #[case("hello")]
    #[case("DEV-20250902-143027-0001")]
    fn test_not_recognized(#[case] text: &str) {
        assert_eq!(recognize(text), None);
    }
}
