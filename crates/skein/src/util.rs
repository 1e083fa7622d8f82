use cow_utils::CowUtils;

/// Normalize line endings to LF (\n) for cross-platform consistency
/// This ensures reproducible output regardless of the platform where aggregation occurs
pub fn normalize_line_endings(content: String) -> String {
    // Replace Windows CRLF (\r\n) and Mac CR (\r) with Unix LF (\n)
    content
        .cow_replace("\r\n", "\n")
        .cow_replace('\r', "\n")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_crlf_and_bare_cr() {
        let input = "a = 1\r\nb = 2\rc = 3\n".to_owned();
        assert_eq!(normalize_line_endings(input), "a = 1\nb = 2\nc = 3\n");
    }

    #[test]
    fn lf_input_is_unchanged() {
        let input = "a = 1\nb = 2\n".to_owned();
        assert_eq!(normalize_line_endings(input.clone()), input);
    }
}
