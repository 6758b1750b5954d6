use chrono::{DateTime, FixedOffset, Utc};

const CHINA_OFFSET_SECONDS: i32 = 8 * 3600;

/// Render cents as yuan, e.g. `1250` -> `¥12.50`
pub fn format_price_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}¥{}.{:02}", sign, abs / 100, abs % 100)
}

/// Price after a percentage discount, rounded half up to the cent.
///
/// Percent is clamped to 0..=100. The product is taken in `i128`, so any
/// `i64` price is accepted.
pub fn apply_discount(cents: i64, percent: i32) -> i64 {
    let percent = i128::from(percent.clamp(0, 100));
    let payable = i128::from(cents) * (100 - percent);
    // Half up: add 50 before the integer division by 100
    let discounted = (payable + 50).div_euclid(100);
    // |discounted| <= |cents| + 1, so only the rounding step can leave the range
    i64::try_from(discounted).unwrap_or(if discounted > 0 { i64::MAX } else { i64::MIN })
}

/// Strip spaces, dashes and a `+86` / `86` country prefix
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let digits = digits.strip_prefix("+86").unwrap_or(digits.as_str());
    match digits.strip_prefix("86") {
        Some(rest) if rest.len() == 11 => rest.to_string(),
        _ => digits.to_string(),
    }
}

/// Mainland mobile number: `1`, then `3`-`9`, then nine digits
pub fn is_valid_phone(phone: &str) -> bool {
    let bytes = phone.as_bytes();
    bytes.len() == 11
        && bytes[0] == b'1'
        && (b'3'..=b'9').contains(&bytes[1])
        && bytes.iter().all(u8::is_ascii_digit)
}

/// `13812345678` -> `138****5678`; anything else is returned unchanged
pub fn mask_phone(phone: &str) -> String {
    if phone.len() == 11 && phone.is_ascii() {
        format!("{}****{}", &phone[..3], &phone[7..])
    } else {
        phone.to_string()
    }
}

/// Wall-clock time in China (UTC+8) as `YYYY-MM-DD HH:MM`
pub fn format_china_time(at: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(CHINA_OFFSET_SECONDS) {
        Some(offset) => at.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string(),
        None => at.format("%Y-%m-%d %H:%M").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price_cents(1250), "¥12.50");
        assert_eq!(format_price_cents(5), "¥0.05");
        assert_eq!(format_price_cents(26800), "¥268.00");
        assert_eq!(format_price_cents(-300), "-¥3.00");
    }

    #[test]
    fn test_apply_discount_rounds_half_up() {
        assert_eq!(apply_discount(5000, 10), 4500);
        // 1999 * 0.85 = 1699.15
        assert_eq!(apply_discount(1999, 15), 1699);
        // 1990 * 0.85 = 1691.5
        assert_eq!(apply_discount(1990, 15), 1692);
        assert_eq!(apply_discount(1000, 0), 1000);
        assert_eq!(apply_discount(1000, 150), 0);
        assert_eq!(apply_discount(1000, -5), 1000);
    }

    #[test]
    fn test_apply_discount_large_prices() {
        assert_eq!(apply_discount(i64::MAX / 50, 10), 166_020_696_663_385_964);
        assert_eq!(apply_discount(i64::MAX, 0), i64::MAX);
        assert_eq!(apply_discount(i64::MIN, 0), i64::MIN);
        assert_eq!(apply_discount(i64::MAX, 100), 0);
    }

    #[test]
    fn test_phone_helpers() {
        assert_eq!(normalize_phone("+86 138-1234-5678"), "13812345678");
        assert_eq!(normalize_phone("8613812345678"), "13812345678");
        assert_eq!(normalize_phone("13812345678"), "13812345678");

        assert!(is_valid_phone("13812345678"));
        assert!(is_valid_phone("19912345678"));
        assert!(!is_valid_phone("12812345678"));
        assert!(!is_valid_phone("1381234567"));
        assert!(!is_valid_phone("1381234567a"));

        assert_eq!(mask_phone("13812345678"), "138****5678");
        assert_eq!(mask_phone("12345"), "12345");
    }

    #[test]
    fn test_china_time() {
        let at = Utc.with_ymd_and_hms(2026, 1, 31, 17, 30, 0).unwrap();
        assert_eq!(format_china_time(at), "2026-02-01 01:30");
    }
}
