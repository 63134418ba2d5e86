//! Filename sanitization for cross-platform output paths.
//!
//! Titles are kept verbatim (Arabic, CJK and any other Unicode text
//! included); only characters that common filesystems reject are replaced.

/// Characters rejected by Windows (and `/` everywhere).
const INVALID_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Substitute for each rejected character.
const REPLACEMENT: char = '_';

/// Windows reserved filenames (case-insensitive)
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Sanitize a title for use as a file stem.
///
/// Each invalid or control character becomes one `_`, leading/trailing
/// spaces and dots are trimmed, Windows reserved names get a `_` prefix,
/// and an empty result becomes `"unnamed"`.
///
/// ```
/// use atd_engine::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("a/b:c"), "a_b_c");
/// assert_eq!(sanitize_filename("اسطورة طرزان الحلقة 5"), "اسطورة طرزان الحلقة 5");
/// assert_eq!(sanitize_filename(""), "unnamed");
/// ```
pub fn sanitize_filename(input: &str) -> String {
    let replaced: String = input
        .chars()
        .map(|c| {
            if c.is_control() || INVALID_CHARS.contains(&c) {
                REPLACEMENT
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }

    let upper = trimmed.to_uppercase();
    let base = upper.split('.').next().unwrap_or_default();
    if WINDOWS_RESERVED_NAMES.contains(&base) {
        return format!("_{trimmed}");
    }

    trimmed.to_string()
}

/// Derive a file stem from a page URL: last path segment, query and
/// fragment removed, `.html`/`.htm` extension dropped, then sanitized.
pub fn stem_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let last = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let stem = last
        .strip_suffix(".html")
        .or_else(|| last.strip_suffix(".htm"))
        .unwrap_or(last);
    sanitize_filename(&urlencoding::decode(stem).unwrap_or_else(|_| stem.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_invalid_characters_survive() {
        let out = sanitize_filename(r#"a/b:c\d*e?f"g<h>i|j"#);
        assert!(!out.contains(INVALID_CHARS));
        assert_eq!(out, "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn test_non_ascii_preserved_unchanged() {
        assert_eq!(sanitize_filename("الحديقة السرية الحلقة 18"), "الحديقة السرية الحلقة 18");
        assert_eq!(sanitize_filename("観看一只青蛙"), "観看一只青蛙");
        assert_eq!(sanitize_filename("داي الشجاع: الحلقة 39"), "داي الشجاع_ الحلقة 39");
    }

    #[test]
    fn test_each_invalid_char_is_replaced_individually() {
        assert_eq!(sanitize_filename("a??b"), "a__b");
    }

    #[test]
    fn test_trim_and_empty() {
        assert_eq!(sanitize_filename("  title. "), "title");
        assert_eq!(sanitize_filename(" ... "), "unnamed");
        assert_eq!(sanitize_filename(""), "unnamed");
    }

    #[test]
    fn test_reserved_names() {
        assert_eq!(sanitize_filename("con"), "_con");
        assert_eq!(sanitize_filename("NUL.txt"), "_NUL.txt");
        assert_eq!(sanitize_filename("CONSOLE"), "CONSOLE");
    }

    #[test]
    fn test_control_characters() {
        assert_eq!(sanitize_filename("tab\there"), "tab_here");
    }

    #[test]
    fn test_idempotency() {
        for input in ["a/b:c", "اسطورة طرزان", "CON", "  x  ", "q?"] {
            let once = sanitize_filename(input);
            assert_eq!(once, sanitize_filename(&once), "input: {input}");
        }
    }

    #[test]
    fn test_stem_from_url() {
        assert_eq!(
            stem_from_url("http://www.arabic-toons.com/dai-1405896719-24551.html?x=1"),
            "dai-1405896719-24551"
        );
        assert_eq!(stem_from_url("http://host/path/episode-3/"), "episode-3");
        assert_eq!(stem_from_url("http://host/a%3Ab"), "a_b");
    }
}
