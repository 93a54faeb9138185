//! Numbering, totals and line-item plumbing shared by estimates and
//! invoices (and assessment numbering).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};

use crate::database::models::LineItem;

/// Format a prefixed sequential document number, e.g. `EST0001`.
pub fn format_document_number(prefix: &str, sequence: i64) -> String {
    format!("{}{:04}", prefix, sequence)
}

/// Parse the sequence out of a prefixed document number.
pub fn parse_document_number(number: &str, prefix: &str) -> Option<i64> {
    let digits = number.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Next number in a tenant's `<prefix>NNNN` sequence: max existing + 1.
/// Table, column and prefix are compile-time constants at every call site.
pub async fn next_document_number(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    column: &str,
    prefix: &str,
) -> Result<String, sqlx::Error> {
    let sql = format!(
        "SELECT COALESCE(MAX(CAST(SUBSTRING({column} FROM {start}) AS BIGINT)), 0) \
         FROM {table} WHERE {column} ~ '^{prefix}[0-9]+$'",
        start = prefix.len() + 1,
    );
    let (max,): (i64,) = sqlx::query_as(&sql).fetch_one(&mut **tx).await?;
    Ok(format_document_number(prefix, max + 1))
}

/// Receipt numbers restart daily: `REC-YYYYMMDD-NNN`.
pub fn format_receipt_number(date: NaiveDate, sequence: i64) -> String {
    format!("REC-{}-{:03}", date.format("%Y%m%d"), sequence)
}

pub async fn next_receipt_number(
    tx: &mut Transaction<'_, Postgres>,
    date: NaiveDate,
) -> Result<String, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM receipts WHERE receipt_date = $1")
            .bind(date)
            .fetch_one(&mut **tx)
            .await?;
    Ok(format_receipt_number(date, count + 1))
}

fn default_quantity() -> Decimal {
    Decimal::ONE
}

/// Incoming line item on estimate/invoice create and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: Decimal,
    #[serde(default)]
    pub rate: Decimal,
}

impl LineItemInput {
    pub fn amount(&self) -> Decimal {
        (self.rate * self.quantity).round_dp(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub vat_amount: Decimal,
    pub total: Decimal,
}

/// subtotal = sum of line amounts; VAT on the subtotal; rounded to pennies.
pub fn compute_totals(items: &[LineItemInput], vat_rate: Decimal) -> Totals {
    let subtotal: Decimal = items.iter().map(LineItemInput::amount).sum();
    let subtotal = subtotal.round_dp(2);
    let vat_amount = (subtotal * vat_rate / Decimal::from(100)).round_dp(2);
    Totals {
        subtotal,
        vat_amount,
        total: subtotal + vat_amount,
    }
}

/// Replace a document's line items wholesale, preserving input order.
pub async fn replace_line_items(
    tx: &mut Transaction<'_, Postgres>,
    document_type: &str,
    document_id: i32,
    items: &[LineItemInput],
) -> Result<Vec<LineItem>, sqlx::Error> {
    sqlx::query("DELETE FROM line_items WHERE document_type = $1 AND document_id = $2")
        .bind(document_type)
        .bind(document_id)
        .execute(&mut **tx)
        .await?;

    let mut inserted = Vec::with_capacity(items.len());
    for (sort_order, item) in items.iter().enumerate() {
        let row = sqlx::query_as::<_, LineItem>(
            r#"
            INSERT INTO line_items (document_type, document_id, description, quantity, rate, amount, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(document_type)
        .bind(document_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.rate)
        .bind(item.amount())
        .bind(sort_order as i32)
        .fetch_one(&mut **tx)
        .await?;
        inserted.push(row);
    }

    Ok(inserted)
}

pub async fn fetch_line_items(
    tx: &mut Transaction<'_, Postgres>,
    document_type: &str,
    document_id: i32,
) -> Result<Vec<LineItem>, sqlx::Error> {
    sqlx::query_as::<_, LineItem>(
        r#"
        SELECT * FROM line_items
        WHERE document_type = $1 AND document_id = $2
        ORDER BY sort_order
        "#,
    )
    .bind(document_type)
    .bind(document_id)
    .fetch_all(&mut **tx)
    .await
}

/// Batch fetch for a list page; callers group by `document_id`.
pub async fn fetch_line_items_for(
    tx: &mut Transaction<'_, Postgres>,
    document_type: &str,
    document_ids: &[i32],
) -> Result<Vec<LineItem>, sqlx::Error> {
    if document_ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, LineItem>(
        r#"
        SELECT * FROM line_items
        WHERE document_type = $1 AND document_id = ANY($2)
        ORDER BY document_id, sort_order
        "#,
    )
    .bind(document_type)
    .bind(document_ids)
    .fetch_all(&mut **tx)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn formats_and_parses_document_numbers() {
        assert_eq!(format_document_number("EST", 1), "EST0001");
        assert_eq!(format_document_number("INV", 42), "INV0042");
        assert_eq!(format_document_number("DMG", 12345), "DMG12345");

        assert_eq!(parse_document_number("EST0012", "EST"), Some(12));
        assert_eq!(parse_document_number("EST12345", "EST"), Some(12345));
        assert_eq!(parse_document_number("INV0012", "EST"), None);
        assert_eq!(parse_document_number("EST", "EST"), None);
        assert_eq!(parse_document_number("ESTx1", "EST"), None);
    }

    #[test]
    fn formats_receipt_numbers() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        assert_eq!(format_receipt_number(date, 1), "REC-20260830-001");
        assert_eq!(format_receipt_number(date, 117), "REC-20260830-117");
    }

    #[test]
    fn line_amount_is_rate_times_quantity() {
        let item = LineItemInput {
            description: "Brake pads".into(),
            quantity: dec("2"),
            rate: dec("34.99"),
        };
        assert_eq!(item.amount(), dec("69.98"));
    }

    #[test]
    fn totals_add_vat_on_subtotal() {
        let items = vec![
            LineItemInput {
                description: "Labour".into(),
                quantity: dec("1.5"),
                rate: dec("60"),
            },
            LineItemInput {
                description: "Parts".into(),
                quantity: dec("1"),
                rate: dec("110.00"),
            },
        ];
        let totals = compute_totals(&items, dec("20"));
        assert_eq!(totals.subtotal, dec("200.00"));
        assert_eq!(totals.vat_amount, dec("40.00"));
        assert_eq!(totals.total, dec("240.00"));
    }

    #[test]
    fn zero_vat_rate_means_total_equals_subtotal() {
        let items = vec![LineItemInput {
            description: "Callout".into(),
            quantity: dec("1"),
            rate: dec("80"),
        }];
        let totals = compute_totals(&items, dec("0"));
        assert_eq!(totals.vat_amount, dec("0"));
        assert_eq!(totals.total, totals.subtotal);
    }

    #[test]
    fn vat_rounds_to_pennies() {
        let items = vec![LineItemInput {
            description: "Misc".into(),
            quantity: dec("1"),
            rate: dec("0.33"),
        }];
        let totals = compute_totals(&items, dec("20"));
        assert_eq!(totals.subtotal, dec("0.33"));
        assert_eq!(totals.vat_amount, dec("0.07"));
        assert_eq!(totals.total, dec("0.40"));
    }
}
