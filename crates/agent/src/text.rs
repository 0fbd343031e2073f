//! Text helpers shared by the scope filter and the classifier.

/// Matches part numbers such as `LZA406103A`: 2-4 letters, a digit, then 4-7 letters or digits.
pub const PRODUCT_CODE_PATTERN: &str = r"(?i)\b[a-z]{2,4}[0-9][a-z0-9]{4,7}\b";

pub fn normalize_text(text: &str) -> String {
    text.replace(['\u{2018}', '\u{2019}'], "'").to_lowercase()
}

pub fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_alphanumeric() {
            sanitized.extend(character.to_lowercase());
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.to_string()).collect()
}

/// Light suffix stripping so "pumps", "pumping" and "pump" compare equal.
pub fn stem(token: &str) -> String {
    let mut word = token;
    for suffix in ["ing", "ed", "es", "s"] {
        if let Some(base) = word.strip_suffix(suffix) {
            if base.len() >= 3 {
                word = base;
                break;
            }
        }
    }
    if word.len() > 3 {
        word = word.strip_suffix('e').unwrap_or(word);
    }
    word.to_string()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::{stem, tokenize};

    #[test]
    fn stemming_folds_common_inflections() {
        assert_eq!(stem("pumps"), stem("pump"));
        assert_eq!(stem("prices"), stem("price"));
        assert_eq!(stem("pricing"), stem("price"));
        assert_eq!(stem("stores"), stem("store"));
        assert_eq!(stem("spas"), "spa");
        assert_eq!(stem("is"), "is");
    }

    #[test]
    fn tokenize_splits_on_punctuation() {
        assert_eq!(tokenize("What's the PRICE, of LZA406103A?"), vec![
            "what", "s", "the", "price", "of", "lza406103a"
        ]);
    }
}
