//! Term extraction for the BM25 index: lowercase, split on
//! non-alphanumeric boundaries, discard single-character tokens. No
//! stemming, no stopword list beyond that length cut.

pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|tok| tok.chars().count() > 1)
        .map(|tok| tok.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_punctuation_and_lowercases() {
        let toks = tokenize("Fetch-User, then Save_User!");
        assert_eq!(toks, vec!["fetch", "user", "then", "save", "user"]);
    }

    #[test]
    fn discards_single_character_tokens() {
        let toks = tokenize("a b go to x");
        assert_eq!(toks, vec!["go", "to"]);
    }

    #[test]
    fn empty_text_yields_no_tokens() {
        assert!(tokenize("   ").is_empty());
    }
}
