//! Turkish price text normalization.
//!
//! Accepts the formats sellers actually type: "25 bin", "2.5M",
//! "54,999 TL", "45.000", "otuz beş bin". Returns the integer TRY amount,
//! or `None` when no price can be read from the text.

use crate::intent::normalize;

/// Normalize a free-form price string to integer TRY.
pub fn clean_price(price_text: &str) -> Option<i64> {
    let text = normalize(price_text);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(value) = parse_number_words(text) {
        return Some(value);
    }

    parse_numeric(text)
}

/// Spelled-out numbers: "otuz beş bin" → 35000, "iki milyon" → 2000000.
fn parse_number_words(text: &str) -> Option<i64> {
    let mut total: i64 = 0;
    let mut current: i64 = 0;
    let mut saw_word = false;

    for word in text.split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if word.is_empty() || word == "tl" || word == "₺" || word == "lira" {
            continue;
        }
        match word {
            "sifir" => saw_word = true,
            "bir" => {
                current += 1;
                saw_word = true;
            }
            "iki" => {
                current += 2;
                saw_word = true;
            }
            "uc" => {
                current += 3;
                saw_word = true;
            }
            "dort" => {
                current += 4;
                saw_word = true;
            }
            "bes" => {
                current += 5;
                saw_word = true;
            }
            "alti" => {
                current += 6;
                saw_word = true;
            }
            "yedi" => {
                current += 7;
                saw_word = true;
            }
            "sekiz" => {
                current += 8;
                saw_word = true;
            }
            "dokuz" => {
                current += 9;
                saw_word = true;
            }
            "on" => {
                current += 10;
                saw_word = true;
            }
            "yirmi" => {
                current += 20;
                saw_word = true;
            }
            "otuz" => {
                current += 30;
                saw_word = true;
            }
            "kirk" => {
                current += 40;
                saw_word = true;
            }
            "elli" => {
                current += 50;
                saw_word = true;
            }
            "altmis" => {
                current += 60;
                saw_word = true;
            }
            "yetmis" => {
                current += 70;
                saw_word = true;
            }
            "seksen" => {
                current += 80;
                saw_word = true;
            }
            "doksan" => {
                current += 90;
                saw_word = true;
            }
            "yuz" => {
                // "yüz" alone is 100, "beş yüz" is 500
                current = current.max(1) * 100;
                saw_word = true;
            }
            "bin" => {
                total += current.max(1) * 1_000;
                current = 0;
                saw_word = true;
            }
            "milyon" => {
                total += current.max(1) * 1_000_000;
                current = 0;
                saw_word = true;
            }
            // Digits mixed into a word phrase ("35 bin") ride along.
            _ if word.chars().all(|c| c.is_ascii_digit()) => {
                current += word.parse::<i64>().ok()?;
            }
            _ => return None,
        }
    }

    if saw_word {
        Some(total + current)
    } else {
        None
    }
}

/// Digit forms with optional scale suffix: "25 bin", "2.5M", "54,999 TL",
/// "45.000", "1,5 milyon".
fn parse_numeric(text: &str) -> Option<i64> {
    let mut multiplier: f64 = 1.0;
    let mut body = text.to_string();

    if let Some(stripped) = strip_scale(&body, &["milyon"]) {
        multiplier = 1_000_000.0;
        body = stripped;
    } else if let Some(stripped) = strip_scale(&body, &["bin"]) {
        multiplier = 1_000.0;
        body = stripped;
    }

    // Compact suffixes: "2.5m", "300k"
    let digits_part: String = body
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == 'm' || *c == 'k')
        .collect();
    let mut digits = digits_part.trim().to_string();
    if multiplier == 1.0 {
        if digits.ends_with('m') {
            multiplier = 1_000_000.0;
            digits.pop();
        } else if digits.ends_with('k') {
            multiplier = 1_000.0;
            digits.pop();
        }
    }
    digits.retain(|c| c.is_ascii_digit() || c == ',' || c == '.');
    if digits.is_empty() {
        return None;
    }

    let value = if multiplier > 1.0 {
        // With a scale word a single short separator group is a decimal:
        // "2.5 milyon" is 2.5, not 25.
        parse_scaled_decimal(&digits)?
    } else {
        // Plain amounts use separators as thousands marks: "54,999", "45.000".
        digits
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse::<f64>()
            .ok()?
    };

    let amount = (value * multiplier).round() as i64;
    if amount <= 0 {
        None
    } else {
        Some(amount)
    }
}

fn strip_scale(text: &str, words: &[&str]) -> Option<String> {
    for word in words {
        if let Some(pos) = text.find(word) {
            let mut out = String::with_capacity(text.len());
            out.push_str(&text[..pos]);
            out.push_str(&text[pos + word.len()..]);
            return Some(out);
        }
    }
    None
}

fn parse_scaled_decimal(digits: &str) -> Option<f64> {
    let separators = digits.chars().filter(|c| *c == ',' || *c == '.').count();
    if separators == 1 {
        let normalized = digits.replace(',', ".");
        let (_, frac) = normalized.split_once('.')?;
        if frac.len() <= 2 {
            return normalized.parse::<f64>().ok();
        }
    }
    digits
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse::<f64>()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_thousands_separators_are_stripped() {
        assert_eq!(clean_price("54,999 TL"), Some(54_999));
        assert_eq!(clean_price("45.000"), Some(45_000));
        assert_eq!(clean_price("500.000 TL"), Some(500_000));
    }

    #[test]
    fn scale_words_multiply() {
        assert_eq!(clean_price("25 bin"), Some(25_000));
        assert_eq!(clean_price("22 bin TL"), Some(22_000));
        assert_eq!(clean_price("2 milyon"), Some(2_000_000));
    }

    #[test]
    fn decimals_under_scale_words_are_fractions() {
        assert_eq!(clean_price("1,5 milyon"), Some(1_500_000));
        assert_eq!(clean_price("2.5M"), Some(2_500_000));
        assert_eq!(clean_price("300k"), Some(300_000));
    }

    #[test]
    fn spelled_out_numbers_parse() {
        assert_eq!(clean_price("otuz beş bin"), Some(35_000));
        assert_eq!(clean_price("yirmi bin TL"), Some(20_000));
        assert_eq!(clean_price("iki milyon"), Some(2_000_000));
        assert_eq!(clean_price("beş yüz bin"), Some(500_000));
    }

    #[test]
    fn garbage_yields_none() {
        assert_eq!(clean_price(""), None);
        assert_eq!(clean_price("pahalı"), None);
        assert_eq!(clean_price("TL"), None);
    }
}
