//! Identifier case conversion used when deriving table, column and junction
//! names from entity declarations.

/// Splits an identifier into lowercase words. Word boundaries are `_`, `-`,
/// `.`, whitespace and lower-to-upper case transitions (`authorId` ->
/// `author`, `id`).
pub fn words(src: &str) -> Vec<String> {
    let mut words = vec![];
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in src.chars() {
        if ch == '_' || ch == '-' || ch == '.' || ch.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }

        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }

        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }

    words
}

pub fn snake_case(src: &str) -> String {
    words(src).join("_")
}

pub fn upper_snake_case(src: &str) -> String {
    snake_case(src).to_uppercase()
}

pub fn camel_case(src: &str) -> String {
    let mut ret = String::new();

    for (i, word) in words(src).iter().enumerate() {
        if i == 0 {
            ret.push_str(word);
        } else {
            ret.push_str(&capitalize(word));
        }
    }

    ret
}

pub fn upper_camel_case(src: &str) -> String {
    words(src).iter().map(|word| capitalize(word)).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
