//! Visa fee table and currency regions

use crate::payments::types::{Currency, Money, VisaDuration};

/// Nationality codes billed in EUR
const EUR_REGION: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT",
    "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
];

/// Currency for a two-letter nationality code; anything unknown bills in USD
pub fn currency_for_nationality(nationality: Option<&str>) -> Currency {
    let code = match nationality {
        Some(code) => code.trim().to_uppercase(),
        None => return Currency::Usd,
    };

    match code.as_str() {
        "US" => Currency::Usd,
        "GB" | "UK" => Currency::Gbp,
        c if EUR_REGION.contains(&c) => Currency::Eur,
        _ => Currency::Usd,
    }
}

/// Base fee in minor units per (tier, currency)
const PRICE_TABLE: &[(VisaDuration, Currency, i64)] = &[
    (VisaDuration::ThirtyDays, Currency::Usd, 4490),
    (VisaDuration::ThirtyDays, Currency::Gbp, 3490),
    (VisaDuration::ThirtyDays, Currency::Eur, 3990),
    (VisaDuration::OneYear, Currency::Usd, 7990),
    (VisaDuration::OneYear, Currency::Gbp, 6490),
    (VisaDuration::OneYear, Currency::Eur, 6990),
    (VisaDuration::FiveYears, Currency::Usd, 11990),
    (VisaDuration::FiveYears, Currency::Gbp, 9990),
    (VisaDuration::FiveYears, Currency::Eur, 10990),
];

fn table_price(duration: VisaDuration, currency: Currency) -> Option<i64> {
    PRICE_TABLE
        .iter()
        .find(|(d, c, _)| *d == duration && *c == currency)
        .map(|(_, _, cents)| *cents)
}

/// Breakdown of what the applicant pays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub duration: VisaDuration,
    pub amount: Money,
    pub convenience_fee: Money,
    pub tax: Money,
    pub total: Money,
}

/// Price for a free-text duration and a currency.
///
/// Total over every input: an unrecognised duration falls back to the 30-day
/// tier, and a pair missing from the table falls back to USD pricing.
pub fn quote(duration: &str, currency: Currency) -> Quote {
    let duration = VisaDuration::normalize(duration).unwrap_or(VisaDuration::ThirtyDays);
    quote_for(duration, currency)
}

pub fn quote_for(duration: VisaDuration, currency: Currency) -> Quote {
    let amount = match table_price(duration, currency) {
        Some(cents) => Money::new(cents, currency),
        None => {
            let usd = table_price(duration, Currency::Usd)
                .or_else(|| table_price(VisaDuration::ThirtyDays, Currency::Usd))
                .unwrap_or(0);
            Money::new(usd, Currency::Usd)
        }
    };

    // Fee and tax are carried on the order but currently zero
    let convenience_fee = Money::zero(amount.currency);
    let tax = Money::zero(amount.currency);

    Quote {
        duration,
        amount,
        convenience_fee,
        tax,
        total: amount,
    }
}
