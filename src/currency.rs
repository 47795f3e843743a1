use lazy_static::lazy_static;
use std::collections::HashMap;

/// ISO 4217 alphabetic code for "currency unknown".
pub const UNKNOWN_CURRENCY: &str = "XXX";

lazy_static! {
    /// ISO 4217 numeric code to alphabetic code, for the currencies that
    /// actually show up in card transaction logs.
    static ref CURRENCIES: HashMap<u16, &'static str> = HashMap::from([
        (36, "AUD"),
        (124, "CAD"),
        (156, "CNY"),
        (203, "CZK"),
        (208, "DKK"),
        (348, "HUF"),
        (356, "INR"),
        (392, "JPY"),
        (410, "KRW"),
        (484, "MXN"),
        (554, "NZD"),
        (578, "NOK"),
        (643, "RUB"),
        (702, "SGD"),
        (710, "ZAR"),
        (752, "SEK"),
        (756, "CHF"),
        (764, "THB"),
        (784, "AED"),
        (826, "GBP"),
        (840, "USD"),
        (901, "TWD"),
        (946, "RON"),
        (949, "TRY"),
        (978, "EUR"),
        (985, "PLN"),
        (986, "BRL"),
    ]);
}

/// Alphabetic code for an ISO 4217 numeric code, `"XXX"` when unknown.
pub fn alpha_code(numeric: u16) -> &'static str {
    CURRENCIES.get(&numeric).copied().unwrap_or(UNKNOWN_CURRENCY)
}
