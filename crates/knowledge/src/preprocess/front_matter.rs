//! YAML front-matter for query text.
//!
//! Rendered form: `---\n<yaml>---\n\n<text>`. Text without tags is left as is.
//! Only rendering happens at runtime; `parse` exists to check the layout in tests.

use super::types::QueryMetadata;
use ragprompt_core::AppResult;

const FENCE: &str = "---\n";

/// Prefix `text` with `metadata` as front-matter, unless there is none.
pub fn render(text: &str, metadata: &QueryMetadata) -> AppResult<String> {
    if metadata.is_empty() {
        return Ok(text.to_string());
    }

    let yaml = serde_yaml::to_string(metadata)?;
    let yaml = yaml.strip_prefix(FENCE).unwrap_or(&yaml);
    Ok(format!("{}{}{}\n{}", FENCE, yaml, FENCE, text))
}

/// Split rendered text back into metadata and body.
///
/// Text without a leading fence parses as empty metadata and the full text.
#[cfg(test)]
pub fn parse(text: &str) -> AppResult<(QueryMetadata, &str)> {
    let Some(rest) = text.strip_prefix(FENCE) else {
        return Ok((QueryMetadata::default(), text));
    };

    let (yaml, body) = if let Some(body) = rest.strip_prefix(FENCE) {
        ("", body)
    } else {
        let end = rest
            .find("\n---\n")
            .ok_or_else(|| ragprompt_core::AppError::Serialization("Unterminated front-matter".to_string()))?;
        (&rest[..=end], &rest[end + 1 + FENCE.len()..])
    };

    let metadata = if yaml.trim().is_empty() {
        QueryMetadata::default()
    } else {
        serde_yaml::from_str(yaml)?
    };

    Ok((metadata, body.strip_prefix('\n').unwrap_or(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> QueryMetadata {
        QueryMetadata::from_tags(
            Some(vec!["python".to_string()]),
            Some(vec!["Atlas".to_string(), "Atlas Search".to_string()]),
        )
    }

    #[test]
    fn test_render_without_tags_is_identity() {
        let rendered = render("how do I connect?", &QueryMetadata::default()).unwrap();
        assert_eq!(rendered, "how do I connect?");
    }

    #[test]
    fn test_render_layout() {
        let rendered = render("how do I connect?", &metadata()).unwrap();

        assert_eq!(
            rendered,
            "---\nprogrammingLanguages:\n- python\nproducts:\n- Atlas\n- Atlas Search\n---\n\nhow do I connect?"
        );
    }

    #[test]
    fn test_parse_rendered() {
        let rendered = render("multi\nline question", &metadata()).unwrap();
        let (parsed, body) = parse(&rendered).unwrap();

        assert_eq!(parsed, metadata());
        assert_eq!(body, "multi\nline question");
    }

    #[test]
    fn test_parse_plain_text() {
        let (parsed, body) = parse("no front matter here").unwrap();
        assert!(parsed.is_empty());
        assert_eq!(body, "no front matter here");
    }

    #[test]
    fn test_parse_unterminated() {
        assert!(parse("---\nproducts:\n- Atlas\nquestion").is_err());
    }
}
