#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("no viewer found")]
    NoViewer,
    #[error("viewer found but its source carries no document URL: {0}")]
    Unparsable(String),
}

/// Recover the object-storage URL from a viewer source of the form
/// `<viewer-path>?file=<percent-encoded-url>[#fragment]`.
///
/// The value is percent-decoded exactly once. `+` is kept literally.
pub fn parse_viewer_source(source: &str) -> Option<String> {
    let source = source.trim();
    let without_fragment = source.split('#').next().unwrap_or("");
    let (_, query) = without_fragment.split_once('?')?;

    let encoded = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("file="))?;
    if encoded.is_empty() {
        return None;
    }

    let decoded = urlencoding::decode(encoded).ok()?;
    let decoded = decoded.trim();
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.to_string())
    }
}

/// Like [`parse_viewer_source`] but keeps "no viewer at all" apart from
/// "viewer present, URL unreadable".
pub fn extract_signed_url(source: Option<&str>) -> Result<String, ExtractionError> {
    let source = source.ok_or(ExtractionError::NoViewer)?;
    parse_viewer_source(source).ok_or_else(|| ExtractionError::Unparsable(redact(source)))
}

/// Host and path only. Signed URLs carry credentials in the query string.
pub fn redact(url: &str) -> String {
    url.split(['?', '#']).next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_file_parameter_and_drops_fragment() {
        assert_eq!(
            parse_viewer_source("viewer.html?file=https%3A%2F%2Fs3.example.com%2Fa.pdf#view=fitH"),
            Some("https://s3.example.com/a.pdf".to_string())
        );
    }

    #[test]
    fn missing_file_parameter_yields_none() {
        assert_eq!(parse_viewer_source("viewer.html?page=2"), None);
        assert_eq!(parse_viewer_source("viewer.html"), None);
        assert_eq!(parse_viewer_source(""), None);
        assert_eq!(parse_viewer_source("viewer.html?file="), None);
    }

    #[test]
    fn finds_file_among_other_parameters() {
        assert_eq!(
            parse_viewer_source("/pdfjs/web/viewer.html?locale=en&file=https%3A%2F%2Fb.s3.amazonaws.com%2Fx.pdf%3FX-Amz-Expires%3D86400%26X-Amz-Signature%3Dabc"),
            Some("https://b.s3.amazonaws.com/x.pdf?X-Amz-Expires=86400&X-Amz-Signature=abc".to_string())
        );
    }

    #[test]
    fn decodes_only_once() {
        assert_eq!(
            parse_viewer_source("viewer.html?file=https%3A%2F%2Fh%2Fa%2520b.pdf"),
            Some("https://h/a%20b.pdf".to_string())
        );
    }

    #[test]
    fn distinguishes_missing_viewer_from_bad_source() {
        assert_eq!(extract_signed_url(None), Err(ExtractionError::NoViewer));
        assert!(matches!(
            extract_signed_url(Some("viewer.html?zoom=1")),
            Err(ExtractionError::Unparsable(_))
        ));
        assert_eq!(
            extract_signed_url(Some("viewer.html?file=https%3A%2F%2Fs3.example.com%2Fa.pdf")),
            Ok("https://s3.example.com/a.pdf".to_string())
        );
    }

    #[test]
    fn redact_strips_query() {
        assert_eq!(
            redact("https://s3.example.com/a.pdf?X-Amz-Signature=secret"),
            "https://s3.example.com/a.pdf"
        );
    }
}
