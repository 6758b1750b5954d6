//! Small helpers shared by the auth and service layers

pub mod format;
pub mod hashing;
pub mod ids;

pub use format::{
    apply_discount, format_china_time, format_price_cents, is_valid_phone, mask_phone, normalize_phone,
};
pub use hashing::{hash_otp, sha256_hex};
pub use ids::{generate_card_no, generate_numeric_code, generate_order_no};
