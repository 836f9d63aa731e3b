//! Storage key normalization.

use regex::Regex;
use std::sync::OnceLock;

const MAX_KEY_CHARS: usize = 200;

const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

fn invalid_chars() -> &'static Regex {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    INVALID.get_or_init(|| {
        Regex::new(r#"[\\/:*?"<>|\x00-\x1f\x7f]"#).expect("static pattern compiles")
    })
}

/// Normalize a query or dish name into a filesystem-safe storage key.
///
/// Lowercases, turns whitespace into `_`, strips characters that are not
/// allowed in file names and trailing dots. Idempotent.
pub fn normalize_key(input: &str) -> String {
    let lowered: String = input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();

    let cleaned = invalid_chars().replace_all(&lowered, "");
    let truncated: String = cleaned.chars().take(MAX_KEY_CHARS).collect();
    let trimmed = truncated.trim_end_matches('.');

    if trimmed.is_empty() {
        return "unnamed".to_string();
    }
    if RESERVED_NAMES.contains(&trimmed) {
        return format!("{}_", trimmed);
    }
    trimmed.to_string()
}

/// Storage keys to try for a dish name given in URL form (`jollof-rice`)
/// or storage form (`jollof_rice`).
pub fn dish_key_candidates(dish: &str) -> Vec<String> {
    let mut keys = vec![normalize_key(dish)];
    let underscored = normalize_key(&dish.replace('-', "_"));
    if !keys.contains(&underscored) {
        keys.push(underscored);
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize_key("Fried Rice"), "fried_rice");
        assert_eq!(normalize_key("Jollof Rice"), "jollof_rice");
        assert_eq!(normalize_key("Rice"), "rice");
    }

    #[test]
    fn test_normalize_strips_unsafe_chars() {
        assert_eq!(normalize_key("Mac/Cheese?"), "maccheese");
        assert_eq!(normalize_key("a:b*c|d<e>f\"g"), "abcdefg");
        assert_eq!(normalize_key("dumplings..."), "dumplings");
    }

    #[test]
    fn test_normalize_degenerate_inputs() {
        assert_eq!(normalize_key(""), "unnamed");
        assert_eq!(normalize_key(".."), "unnamed");
        assert_eq!(normalize_key("CON"), "con_");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "Rice",
            "  Pad Thai  ",
            "Crème Brûlée",
            "CON",
            "a/b\\c",
            "",
            "Phở bò\ttái",
            "x.",
            "Ärtsoppa med Pannkakor",
        ];
        for sample in samples {
            let once = normalize_key(sample);
            assert_eq!(normalize_key(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_dish_key_candidates() {
        assert_eq!(
            dish_key_candidates("jollof-rice"),
            vec!["jollof-rice".to_string(), "jollof_rice".to_string()]
        );
        assert_eq!(dish_key_candidates("Jollof Rice"), vec!["jollof_rice".to_string()]);
    }
}
