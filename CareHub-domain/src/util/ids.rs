use chrono::{DateTime, Utc};
use rand::Rng;

/// Random string of `len` decimal digits; leading zeros allowed
pub fn generate_numeric_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Order number: `CH` + `YYYYMMDDHHMMSS` + six random digits
pub fn generate_order_no(now: DateTime<Utc>) -> String {
    format!("CH{}{}", now.format("%Y%m%d%H%M%S"), generate_numeric_code(6))
}

/// Membership card number: `MC` + twelve random digits
pub fn generate_card_no() -> String {
    format!("MC{}", generate_numeric_code(12))
}
