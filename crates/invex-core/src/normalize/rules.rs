//! Mapping tables: entity types to record fields, and the regex fallback.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::invoice::InvoiceRecord;
use crate::models::raw::Entity;

/// Header field a rule writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Date,
    InvoiceNumber,
    VendorName,
    TotalAmount,
    Currency,
}

impl Field {
    fn slot(self, record: &mut InvoiceRecord) -> &mut Option<String> {
        match self {
            Field::Date => &mut record.date,
            Field::InvoiceNumber => &mut record.invoice_number,
            Field::VendorName => &mut record.vendor_name,
            Field::TotalAmount => &mut record.total_amount,
            Field::Currency => &mut record.currency,
        }
    }
}

/// Entity types that may fill a field, highest priority first.
#[derive(Debug, Clone, Copy)]
pub struct EntityRule {
    pub field: Field,
    pub candidates: &'static [&'static str],
}

pub const ENTITY_RULES: &[EntityRule] = &[
    EntityRule {
        field: Field::Date,
        candidates: &["invoice_date", "due_date", "date", "receipt_date"],
    },
    EntityRule {
        field: Field::InvoiceNumber,
        candidates: &["invoice_id", "invoice_number"],
    },
    EntityRule {
        field: Field::VendorName,
        candidates: &["supplier_name", "vendor_name", "remit_to_name"],
    },
    EntityRule {
        field: Field::TotalAmount,
        candidates: &["total_amount", "amount_due"],
    },
    EntityRule {
        field: Field::Currency,
        candidates: &["currency"],
    },
];

/// Fill empty header fields from typed entities.
///
/// Candidates are tried in rule order, not document order, so an
/// `invoice_date` anywhere beats a `due_date` that appears before it.
pub fn apply_entity_rules(entities: &[Entity], record: &mut InvoiceRecord) {
    for rule in ENTITY_RULES {
        let slot = rule.field.slot(record);
        if slot.is_some() {
            continue;
        }
        *slot = rule.candidates.iter().find_map(|kind| {
            entities
                .iter()
                .filter(|e| e.kind == *kind)
                .map(|e| e.mention_text.trim())
                .find(|m| !m.is_empty())
                .map(str::to_string)
        });
    }
}

/// Grouped thousands first, then plain digits; must end on a digit boundary.
const NUMBER: &str = r"(?:\d{1,3}(?:[,. ]\d{3})+|\d+)(?:[.,]\d{2})?\b";
const CURRENCY: &str = r"[$€£¥]|\b(?:USD|EUR|GBP|PLN|CHF|CAD|AUD|JPY|SEK|NOK|DKK)\b";
const MONTH: &str = r"(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?";

lazy_static! {
    /// Date patterns, tried in order.
    pub static ref DATE_RULES: Vec<Regex> = vec![
        // 15/01/2024, 15.01.24, 1-2-2024
        Regex::new(r"\b(\d{1,2}[/.\-]\d{1,2}[/.\-](?:\d{4}|\d{2}))\b").unwrap(),
        // 2024-01-15, 2024/1/15
        Regex::new(r"\b(\d{4}[/.\-]\d{1,2}[/.\-]\d{1,2})\b").unwrap(),
        // 15 January 2024, Jan 15, 2024
        Regex::new(&format!(
            r"(?i)\b(\d{{1,2}}\s+{m},?\s+\d{{4}}|{m}\s+\d{{1,2}},?\s+\d{{4}})\b",
            m = MONTH
        ))
        .unwrap(),
    ];

    /// Amount patterns, tried in order.
    ///
    /// Each has an `amount` group and optionally a `currency` group.
    pub static ref AMOUNT_RULES: Vec<Regex> = vec![
        // Total: $1,250.00 / Amount due 99.90
        Regex::new(&format!(
            r"(?i)\b(?:grand\s+total|total\s+due|amount\s+due|balance\s+due|total)\b[\s:]*(?:(?P<currency>{c})\s?)?(?P<amount>{n})",
            c = CURRENCY,
            n = NUMBER
        ))
        .unwrap(),
        // $1,250.00 / EUR 99,90
        Regex::new(&format!(
            r"(?P<currency>{c})\s?(?P<amount>{n})",
            c = CURRENCY,
            n = NUMBER
        ))
        .unwrap(),
        // 1.250,00 € / 99.90 USD
        Regex::new(&format!(
            r"\b(?P<amount>{n})\s?(?P<currency>{c})",
            c = CURRENCY,
            n = NUMBER
        ))
        .unwrap(),
    ];
}

/// First date found by [`DATE_RULES`].
pub fn find_date(text: &str) -> Option<String> {
    DATE_RULES.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Amount found by [`AMOUNT_RULES`], with its currency when adjacent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountMatch {
    pub amount: String,
    pub currency: Option<String>,
}

/// First amount found by [`AMOUNT_RULES`].
pub fn find_amount(text: &str) -> Option<AmountMatch> {
    AMOUNT_RULES.iter().find_map(|re| {
        let captures = re.captures(text)?;
        let amount = captures.name("amount")?.as_str().trim().to_string();
        Some(AmountMatch {
            amount,
            currency: captures.name("currency").map(|m| m.as_str().to_string()),
        })
    })
}

/// Fill date, total and currency from free text.
///
/// Only runs when date, total and vendor are all still empty.
pub fn apply_text_fallback(text: &str, record: &mut InvoiceRecord) {
    if record.date.is_some() || record.total_amount.is_some() || record.vendor_name.is_some() {
        return;
    }

    record.date = find_date(text);
    if let Some(found) = find_amount(text) {
        record.total_amount = Some(found.amount);
        if record.currency.is_none() {
            record.currency = found.currency;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_invoice_date_beats_due_date() {
        let entities = vec![
            Entity::new("due_date", "2024-02-15"),
            Entity::new("invoice_date", "2024-01-15"),
        ];
        let mut record = InvoiceRecord::new(1);
        apply_entity_rules(&entities, &mut record);
        assert_eq!(record.date.as_deref(), Some("2024-01-15"));
    }

    #[test]
    fn test_due_date_used_when_alone() {
        let entities = vec![Entity::new("due_date", "2024-02-15")];
        let mut record = InvoiceRecord::new(1);
        apply_entity_rules(&entities, &mut record);
        assert_eq!(record.date.as_deref(), Some("2024-02-15"));
    }

    #[test]
    fn test_blank_mentions_are_skipped() {
        let entities = vec![
            Entity::new("supplier_name", "   "),
            Entity::new("supplier_name", " ACME Corp "),
            Entity::new("invoice_id", ""),
            Entity::new("invoice_number", "INV-7"),
            Entity::new("amount_due", "99.00"),
            Entity::new("currency", "EUR"),
            Entity::new("line_item", "Widget 10.00"),
        ];
        let mut record = InvoiceRecord::new(1);
        apply_entity_rules(&entities, &mut record);

        assert_eq!(record.vendor_name.as_deref(), Some("ACME Corp"));
        assert_eq!(record.invoice_number.as_deref(), Some("INV-7"));
        assert_eq!(record.total_amount.as_deref(), Some("99.00"));
        assert_eq!(record.currency.as_deref(), Some("EUR"));
        assert_eq!(record.date, None);
    }

    #[test]
    fn test_find_date_formats() {
        assert_eq!(find_date("Date: 15/01/2024").as_deref(), Some("15/01/2024"));
        assert_eq!(find_date("Issued 2024-01-15").as_deref(), Some("2024-01-15"));
        assert_eq!(find_date("Issued 15 January 2024").as_deref(), Some("15 January 2024"));
        assert_eq!(find_date("Issued Jan 15, 2024").as_deref(), Some("Jan 15, 2024"));
        assert_eq!(find_date("no dates here"), None);
    }

    #[test]
    fn test_find_date_prefers_numeric() {
        let text = "March 3, 2024 ... 04/03/2024";
        assert_eq!(find_date(text).as_deref(), Some("04/03/2024"));
    }

    #[test]
    fn test_find_amount_labelled_total_first() {
        let found = find_amount("Shipping $5.00\nTotal: $1,250.00").unwrap();
        assert_eq!(found.amount, "1,250.00");
        assert_eq!(found.currency.as_deref(), Some("$"));
    }

    #[test]
    fn test_find_amount_bare_currency() {
        let found = find_amount("Pay EUR 99.90 by Friday").unwrap();
        assert_eq!(
            found,
            AmountMatch {
                amount: "99.90".into(),
                currency: Some("EUR".into())
            }
        );

        let found = find_amount("Due 1.250,00 €").unwrap();
        assert_eq!(found.amount, "1.250,00");
        assert_eq!(found.currency.as_deref(), Some("€"));
    }

    #[test]
    fn test_find_amount_ungrouped_digits() {
        let found = find_amount("Total: 1250.00").unwrap();
        assert_eq!(found.amount, "1250.00");

        let found = find_amount("Total $12345.67").unwrap();
        assert_eq!(found.amount, "12345.67");
        assert_eq!(found.currency.as_deref(), Some("$"));

        let found = find_amount("Pay USD 1500.00 now").unwrap();
        assert_eq!(
            found,
            AmountMatch {
                amount: "1500.00".into(),
                currency: Some("USD".into())
            }
        );

        let found = find_amount("Amount due 2500").unwrap();
        assert_eq!(found.amount, "2500");
    }

    #[test]
    fn test_subtotal_is_not_a_total() {
        let found = find_amount("Subtotal 80.00\nUSD 96.00");
        assert_eq!(found.map(|f| f.amount).as_deref(), Some("96.00"));
    }

    #[test]
    fn test_fallback_skipped_when_total_known() {
        let mut record = InvoiceRecord::new(1);
        record.total_amount = Some("10.00".into());
        apply_text_fallback("Date 01/02/2024 Total $99.00", &mut record);

        assert_eq!(record.date, None);
        assert_eq!(record.total_amount.as_deref(), Some("10.00"));
    }

    #[test]
    fn test_fallback_keeps_existing_currency() {
        let mut record = InvoiceRecord::new(1);
        record.currency = Some("USD".into());
        apply_text_fallback("Invoice 01/02/2024\nTotal £42.00", &mut record);

        assert_eq!(record.date.as_deref(), Some("01/02/2024"));
        assert_eq!(record.total_amount.as_deref(), Some("42.00"));
        assert_eq!(record.currency.as_deref(), Some("USD"));
    }
}
