/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <p>) are preserved, dangerous tags
/// (like <script>, <iframe>) and attributes (like onclick) are stripped.
/// Applied to course, lesson and exam descriptions before they are stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Cleans an optional description, mapping blank input to `None`.
pub fn clean_optional(input: Option<&str>) -> Option<String> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(clean_html)
}
