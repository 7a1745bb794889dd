// src/utils/html.rs

/// Sanitizes model-generated text before it is stored or returned.
///
/// Whitelist-based: safe inline tags survive, `<script>` and its content and
/// event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input.trim())
}
