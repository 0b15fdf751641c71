//! Resource purchase extraction
//!
//! Converts raw PayPal transactions into `Purchase` records. Checkout embeds
//! `resource_purchase|...|<resource id>` in the transaction's custom field;
//! everything else on the account is unrelated and skipped.

use chrono::{DateTime, Utc};
use log::trace;

use super::RawTransaction;
use crate::models::Purchase;

/// Prefix of the custom field on resource purchases
pub const RESOURCE_PURCHASE_MARKER: &str = "resource_purchase";

/// Separator before the resource id inside the custom field
const RESOURCE_ID_SEPARATOR: char = '|';

/// Extract a purchase from a raw transaction
///
/// Returns `None` for transactions that are not resource purchases and for
/// purchases missing any required field. Partial transactions are expected
/// (refunds, holds, fee entries), so this never fails.
pub fn extract_purchase(raw: &RawTransaction) -> Option<Purchase> {
    let custom_field = raw.str_at("/transaction_info/custom_field")?;
    if !custom_field.starts_with(RESOURCE_PURCHASE_MARKER) {
        return None;
    }

    let resource_id = match parse_resource_id(custom_field) {
        Some(id) => id,
        None => {
            trace!("Skipping transaction {:?}: no resource id in {:?}", raw.transaction_id(), custom_field);
            return None;
        }
    };

    let price = raw.str_at("/transaction_info/transaction_amount/value");
    let purchased_at = raw
        .str_at("/transaction_info/transaction_initiation_date")
        .and_then(parse_transaction_time);
    let (price, purchased_at) = match (price, purchased_at) {
        (Some(price), Some(purchased_at)) => (price, purchased_at),
        _ => {
            trace!("Skipping transaction {:?}: missing amount or date", raw.transaction_id());
            return None;
        }
    };

    let payer_email = match raw.str_at("/payer_info/email_address") {
        Some(email) => email,
        None => {
            trace!("Skipping transaction {:?}: missing payer email", raw.transaction_id());
            return None;
        }
    };

    Some(Purchase::new(resource_id, price, purchased_at, payer_email))
}

/// The resource id is everything after the last separator, possibly empty
fn parse_resource_id(custom_field: &str) -> Option<&str> {
    custom_field
        .rsplit_once(RESOURCE_ID_SEPARATOR)
        .map(|(_, id)| id)
}

/// Parse a transaction timestamp (`2019-12-10T00:00:00+0000`)
fn parse_transaction_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn transaction(custom: Option<&str>, amount: Option<&str>, date: Option<&str>, email: Option<&str>) -> RawTransaction {
        let mut info = json!({ "transaction_id": "9XJ12345AB678901C" });
        if let Some(custom) = custom {
            info["custom_field"] = json!(custom);
        }
        if let Some(amount) = amount {
            info["transaction_amount"] = json!({ "currency_code": "USD", "value": amount });
        }
        if let Some(date) = date {
            info["transaction_initiation_date"] = json!(date);
        }

        let mut raw = json!({ "transaction_info": info, "payer_info": {} });
        if let Some(email) = email {
            raw["payer_info"]["email_address"] = json!(email);
        }
        RawTransaction(raw)
    }

    fn full(custom: &str) -> RawTransaction {
        transaction(
            Some(custom),
            Some("9.99"),
            Some("2019-12-10T00:00:00+0000"),
            Some("a@b.com"),
        )
    }

    #[test]
    fn test_extracts_full_purchase() {
        let purchase = extract_purchase(&full("resource_purchase|abc123")).unwrap();
        assert_eq!(purchase.resource_id, "abc123");
        assert_eq!(purchase.price, "9.99");
        assert_eq!(purchase.payer_email, "a@b.com");
        assert_eq!(
            purchase.purchased_at,
            Utc.with_ymd_and_hms(2019, 12, 10, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_resource_id_after_last_separator() {
        let purchase = extract_purchase(&full("resource_purchase|user 42|plugin|xyz-9")).unwrap();
        assert_eq!(purchase.resource_id, "xyz-9");
    }

    #[test]
    fn test_not_a_resource_purchase() {
        assert!(extract_purchase(&full("donation|abc123")).is_none());
        assert!(extract_purchase(&full("")).is_none());
        assert!(
            extract_purchase(&transaction(None, Some("1.00"), Some("2019-12-10T00:00:00+0000"), Some("a@b.com")))
                .is_none()
        );
    }

    #[test]
    fn test_missing_separator_is_absent() {
        assert!(extract_purchase(&full("resource_purchase")).is_none());
    }

    #[test]
    fn test_empty_resource_id_is_still_a_purchase() {
        let purchase = extract_purchase(&full("resource_purchase|")).unwrap();
        assert_eq!(purchase.resource_id, "");
        assert_eq!(purchase.price, "9.99");
        assert_eq!(purchase.payer_email, "a@b.com");
    }

    #[test]
    fn test_missing_amount_or_date() {
        let no_amount = transaction(
            Some("resource_purchase|abc"),
            None,
            Some("2019-12-10T00:00:00+0000"),
            Some("a@b.com"),
        );
        let no_date = transaction(Some("resource_purchase|abc"), Some("9.99"), None, Some("a@b.com"));
        let bad_date = transaction(
            Some("resource_purchase|abc"),
            Some("9.99"),
            Some("last tuesday"),
            Some("a@b.com"),
        );
        assert!(extract_purchase(&no_amount).is_none());
        assert!(extract_purchase(&no_date).is_none());
        assert!(extract_purchase(&bad_date).is_none());
    }

    #[test]
    fn test_missing_email() {
        let raw = transaction(
            Some("resource_purchase|abc"),
            Some("9.99"),
            Some("2019-12-10T00:00:00+0000"),
            None,
        );
        assert!(extract_purchase(&raw).is_none());
    }

    #[test]
    fn test_missing_payer_info_entirely() {
        let raw = RawTransaction(json!({
            "transaction_info": {
                "custom_field": "resource_purchase|abc",
                "transaction_amount": { "value": "5.00" },
                "transaction_initiation_date": "2019-12-10T00:00:00+0000"
            }
        }));
        assert!(extract_purchase(&raw).is_none());
    }

    #[test]
    fn test_non_string_fields_are_absent() {
        let raw = RawTransaction(json!({
            "transaction_info": {
                "custom_field": 12,
                "transaction_amount": { "value": "5.00" },
                "transaction_initiation_date": "2019-12-10T00:00:00+0000"
            },
            "payer_info": { "email_address": "a@b.com" }
        }));
        assert!(extract_purchase(&raw).is_none());
    }

    #[test]
    fn test_parse_transaction_time_offsets() {
        let expected = Utc.with_ymd_and_hms(2019, 12, 10, 5, 0, 0).unwrap();
        assert_eq!(parse_transaction_time("2019-12-10T00:00:00-0500"), Some(expected));
        assert_eq!(parse_transaction_time("2019-12-10T05:00:00Z"), Some(expected));
    }
}
