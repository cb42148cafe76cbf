//! Order-number admissibility (Luhn mod-10 checksum).
//!
//! Pure and allocation-free. Anything that is not a non-empty run of ASCII
//! decimal digits is rejected before the checksum runs.

/// `true` iff `number` is all ASCII digits and passes the Luhn checksum.
///
/// Digits are scanned from least- to most-significant; every second digit,
/// starting with the one just left of the check digit, is doubled and
/// reduced by 9 when it exceeds 9.
pub fn is_admissible(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    checksum(number) % 10 == 0
}

/// The digit that makes `payload` followed by it admissible.
///
/// `None` when `payload` is empty or contains a non-digit.
pub fn check_digit(payload: &str) -> Option<u8> {
    if payload.is_empty() || !payload.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let with_zero = format!("{payload}0");
    Some(((10 - checksum(&with_zero) % 10) % 10) as u8)
}

fn checksum(digits: &str) -> u64 {
    digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u64::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum()
}
