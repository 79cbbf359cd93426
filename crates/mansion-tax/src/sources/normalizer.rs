/// Strips byte-order marks and zero-width spaces and collapses internal whitespace.
pub(crate) fn clean_text(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Join key for unit codes: cleaned and upper-cased.
pub(crate) fn code_key(value: &str) -> String {
    clean_text(value).to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_removes_invisible_characters_and_extra_space() {
        assert_eq!(
            clean_text("\u{feff}  Edinburgh\u{200b}   Central  "),
            "Edinburgh Central"
        );
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn code_key_ignores_case() {
        assert_eq!(code_key(" s16000104 "), "S16000104");
        assert_eq!(code_key("City of  Edinburgh"), code_key("CITY OF EDINBURGH"));
    }
}
