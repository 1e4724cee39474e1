//! Input validation, applied before any write.

use url::Url;

use crate::defaults::{CONTENT_MAX_LEN, TAG_NAME_MAX_LEN, TITLE_MAX_LEN, URL_MAX_LEN};
use crate::error::{Error, Result};

/// Trim, validate and lower-case a tag name.
///
/// Rules:
/// - 1 to 64 characters after trimming
/// - Letters, digits, spaces, hyphens (-), underscores (_), forward slashes (/) and dots (.)
///
/// The returned form is the canonical stored name, so `"Work"` and
/// `" work "` normalise to the same key.
pub fn normalize_tag_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::Validation("Tag name cannot be empty".to_string()));
    }
    if name.chars().count() > TAG_NAME_MAX_LEN {
        return Err(Error::Validation(format!(
            "Tag name must be {} characters or less",
            TAG_NAME_MAX_LEN
        )));
    }

    let invalid_chars: Vec<char> = name
        .chars()
        .filter(|c| !c.is_alphanumeric() && !matches!(c, ' ' | '-' | '_' | '/' | '.'))
        .collect();

    if !invalid_chars.is_empty() {
        let chars_display: String = invalid_chars
            .iter()
            .take(5)
            .map(|c| format!("'{}'", c.escape_default()))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(Error::Validation(format!(
            "Tag contains invalid characters: {}. Only letters, digits, spaces, hyphens, underscores, slashes and dots are allowed",
            chars_display
        )));
    }

    Ok(name.to_lowercase())
}

/// Validate a `#rrggbb` colour.
pub fn validate_color(color: &str) -> Result<()> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Color '{}' must be of the form #rrggbb",
            color
        )))
    }
}

/// Validate a title and return its trimmed form.
pub fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("Title cannot be empty".to_string()));
    }
    if trimmed.chars().count() > TITLE_MAX_LEN {
        return Err(Error::Validation(format!(
            "Title must be {} characters or less",
            TITLE_MAX_LEN
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_content(content: &str) -> Result<()> {
    if content.chars().count() > CONTENT_MAX_LEN {
        return Err(Error::Validation(format!(
            "Content must be {} characters or less",
            CONTENT_MAX_LEN
        )));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<()> {
    validate_content(description)
}

/// Validate an absolute http(s) URL and return its trimmed form.
pub fn validate_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.len() > URL_MAX_LEN {
        return Err(Error::Validation(format!(
            "URL must be {} bytes or less",
            URL_MAX_LEN
        )));
    }
    let parsed =
        Url::parse(trimmed).map_err(|e| Error::Validation(format!("Invalid URL: {}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        scheme => Err(Error::Validation(format!(
            "URL scheme '{}' is not allowed, use http or https",
            scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize_tag_name("  Work ").unwrap(), "work");
        assert_eq!(normalize_tag_name("Deep Work").unwrap(), "deep work");
        assert_eq!(
            normalize_tag_name("projects/Quire-v2.1").unwrap(),
            "projects/quire-v2.1"
        );
    }

    #[test]
    fn test_normalize_case_insensitive_identity() {
        assert_eq!(
            normalize_tag_name("Work").unwrap(),
            normalize_tag_name("work").unwrap()
        );
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(matches!(normalize_tag_name(""), Err(Error::Validation(_))));
        assert!(matches!(
            normalize_tag_name("   "),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_normalize_rejects_too_long() {
        let name = "a".repeat(TAG_NAME_MAX_LEN + 1);
        assert!(normalize_tag_name(&name).is_err());
        assert!(normalize_tag_name(&"a".repeat(TAG_NAME_MAX_LEN)).is_ok());
    }

    #[test]
    fn test_normalize_rejects_invalid_chars() {
        let err = normalize_tag_name("rust;drop").unwrap_err();
        assert!(err.to_string().contains("';'"));
        assert!(normalize_tag_name("tab\there").is_err());
        assert!(normalize_tag_name("#hash").is_err());
    }

    #[test]
    fn test_normalize_accepts_unicode_letters() {
        assert_eq!(normalize_tag_name("Café").unwrap(), "café");
    }

    #[test]
    fn test_validate_color() {
        assert!(validate_color("#a1b2c3").is_ok());
        assert!(validate_color("#A1B2C3").is_ok());
        assert!(validate_color("a1b2c3").is_err());
        assert!(validate_color("#a1b2c").is_err());
        assert!(validate_color("#zzzzzz").is_err());
    }

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title(" Plan ").unwrap(), "Plan");
        assert!(validate_title("").is_err());
        assert!(validate_title(&"x".repeat(TITLE_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_content_limit() {
        assert!(validate_content("").is_ok());
        assert!(validate_content(&"x".repeat(CONTENT_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_url() {
        assert_eq!(
            validate_url(" https://example.com/a ").unwrap(),
            "https://example.com/a"
        );
        assert!(validate_url("http://localhost:8080").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
        assert!(validate_url("not a url").is_err());
    }
}
