use num::Num;

/// Length of the longest prefix of text made of hexadecimal digits
fn hex_digits_len(text: &str) -> usize {
    text.find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(text.len())
}

/// Parse a whole token of the form 0x1234 (case insensitive digits).
/// Returns None if the token has any other shape or does not fit in
/// T.
pub fn parse_hex<T: Num>(token: &str) -> Option<T> {
    let digits = token.strip_prefix("0x")?;
    if digits.is_empty() || hex_digits_len(digits) != digits.len() {
        return None;
    }
    T::from_str_radix(digits, 16).ok()
}

/// Parse a 0x-prefixed hexadecimal number from the start of text,
/// returning the value and the rest of the text after the last digit.
pub fn split_hex_prefix<T: Num>(text: &str) -> Option<(T, &str)> {
    let digits = text.strip_prefix("0x")?;
    let len = hex_digits_len(digits);
    if len == 0 {
        return None;
    }
    let value = T::from_str_radix(&digits[..len], 16).ok()?;
    Some((value, &digits[len..]))
}

/// Parse a token made only of decimal digits
pub fn parse_decimal<T: Num>(token: &str) -> Option<T> {
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    T::from_str_radix(token, 10).ok()
}

/// Parse a token of the form <0x1234> (a hexadecimal value in angle
/// brackets), returning the value and the rest of the text.
pub fn split_bracketed_hex<T: Num>(text: &str) -> Option<(T, &str)> {
    let (value, rest) = split_hex_prefix(text.strip_prefix('<')?)?;
    Some((value, rest.strip_prefix('>')?))
}
