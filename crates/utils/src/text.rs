/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Show only the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(8), tail)
}

/// Lowercase ASCII letters, digits and single inner hyphens (`my-page-2`).
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Current month as `YYYY-MM` (UTC), the key for monthly usage accounting.
pub fn current_month() -> String {
    chrono::Utc::now().format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-ant-abcdefgh1234"), "********1234");
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(mask_secret(""), "");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("pricing"));
        assert!(is_valid_slug("bmi-calculator-2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("Pricing"));
        assert!(!is_valid_slug("-lead"));
        assert!(!is_valid_slug("a--b"));
        assert!(!is_valid_slug("with space"));
    }
}
