//! Payment links
//!
//! Format: `cash:<recipient hex>?amount=<u64>[&memo=<text>]`. The query is
//! `application/x-www-form-urlencoded`, so a space in the memo becomes `+`.

use crate::error::{ClientError, Result};
use cash_ledger::Identity;
use url::form_urlencoded;
use url::Url;

/// Link scheme, without the colon
pub const SCHEME: &str = "cash";

/// Decoded payment link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLink {
    /// Party to pay
    pub recipient: Identity,
    /// Amount to pay
    pub amount: u64,
    /// Free-form note
    pub memo: Option<String>,
}

impl PaymentLink {
    /// Encoded form of this link
    pub fn encode(&self) -> String {
        encode(&self.recipient, self.amount, self.memo.as_deref())
    }
}

/// Build a payment link
pub fn encode(recipient: &Identity, amount: u64, memo: Option<&str>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("amount", &amount.to_string());
    if let Some(memo) = memo {
        query.append_pair("memo", memo);
    }
    format!("{}:{}?{}", SCHEME, recipient.to_hex(), query.finish())
}

/// Parse a payment link
pub fn decode(link: &str) -> Result<PaymentLink> {
    let url = Url::parse(link).map_err(|e| invalid(format!("{}: {}", link, e)))?;
    if url.scheme() != SCHEME {
        return Err(invalid(format!("scheme {} is not {}", url.scheme(), SCHEME)));
    }
    if url.query().is_none() {
        return Err(invalid("missing query".to_string()));
    }
    let recipient: Identity = url
        .path()
        .parse()
        .map_err(|_| invalid(format!("bad recipient {}", url.path())))?;

    let mut amount = None;
    let mut memo = None;
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "amount" => {
                if amount.is_some() {
                    return Err(invalid("duplicate amount".to_string()));
                }
                let parsed: u64 = value
                    .parse()
                    .map_err(|_| invalid(format!("bad amount {}", value)))?;
                if parsed == 0 {
                    return Err(invalid("amount must be positive".to_string()));
                }
                amount = Some(parsed);
            }
            "memo" => {
                if memo.is_some() {
                    return Err(invalid("duplicate memo".to_string()));
                }
                memo = Some(value.into_owned());
            }
            // Forward compatible: unknown parameters are ignored
            _ => {}
        }
    }

    Ok(PaymentLink {
        recipient,
        amount: amount.ok_or_else(|| invalid("missing amount".to_string()))?,
        memo,
    })
}

fn invalid(message: String) -> ClientError {
    ClientError::InvalidLink(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alice() -> Identity {
        Identity::new([0xab; 32])
    }

    #[test]
    fn test_encode_format() {
        let link = encode(&alice(), 1_500, Some("rent & pizza"));
        assert_eq!(
            link,
            format!("cash:{}?amount=1500&memo=rent+%26+pizza", alice().to_hex())
        );
        assert_eq!(
            encode(&alice(), 1, None),
            format!("cash:{}?amount=1", alice().to_hex())
        );
    }

    #[test]
    fn test_decode_unicode_memo() {
        let link = PaymentLink {
            recipient: alice(),
            amount: 42,
            memo: Some("café ☕ 50/50".to_string()),
        };
        assert_eq!(decode(&link.encode()).unwrap(), link);
    }

    #[test]
    fn test_decode_form_encoded_memo() {
        let link = format!("cash:{}?amount=3&memo=tacos+%2B+tips", alice().to_hex());
        assert_eq!(decode(&link).unwrap().memo.as_deref(), Some("tacos + tips"));
    }

    #[test]
    fn test_decode_parameter_order_and_unknowns() {
        let link = format!("cash:{}?memo=hi&v=2&amount=7", alice().to_hex());
        let decoded = decode(&link).unwrap();
        assert_eq!(decoded.amount, 7);
        assert_eq!(decoded.memo.as_deref(), Some("hi"));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let hex = alice().to_hex();
        for bad in [
            format!("pay:{}?amount=1", hex),
            format!("cash:{}", hex),
            "cash:abcd?amount=1".to_string(),
            format!("cash:{}?amount=0", hex),
            format!("cash:{}?amount=-5", hex),
            format!("cash:{}?memo=x", hex),
            format!("cash:{}?amount=1&amount=2", hex),
            format!("cash:{}?amount=1&memo=a&memo=b", hex),
            "not a link".to_string(),
        ] {
            assert!(
                matches!(decode(&bad), Err(ClientError::InvalidLink(_))),
                "accepted {}",
                bad
            );
        }
    }

    proptest! {
        #[test]
        fn prop_encoded_memo_is_query_safe(memo in "\\PC*", amount in 1u64..) {
            let link = encode(&alice(), amount, Some(&memo));
            let query = link.split_once('?').unwrap().1;
            prop_assert_eq!(query.matches('&').count(), 1);
            prop_assert!(query.is_ascii());
            prop_assert_eq!(decode(&link).unwrap().memo, Some(memo));
        }

        #[test]
        fn prop_decode_never_panics(input in "cash:[0-9a-f]{0,70}\\?[ -~]{0,40}") {
            let _ = decode(&input);
        }
    }
}
