use chrono::Utc;
use uuid::Uuid;

const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const TOKEN_LEN: usize = 9;

/// Builds a record id of the form `<prefix>_<unix millis>_<9 base36 chars>`.
pub fn generate_record_id(prefix: &str) -> String {
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), random_token())
}

/// Nine base36 characters drawn from a v4 UUID.
fn random_token() -> String {
    let mut n = Uuid::new_v4().as_u128();
    let mut token = String::with_capacity(TOKEN_LEN);
    for _ in 0..TOKEN_LEN {
        token.push(TOKEN_ALPHABET[(n % 36) as usize] as char);
        n /= 36;
    }
    token
}

/// Trims a form value and maps blank input to `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
