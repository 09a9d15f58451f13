/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <p>) survive, dangerous tags (like
/// <script>, <iframe>) and attributes (like onclick) are stripped.
/// Applied to quiz titles and question text before they are stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        assert_eq!(clean_html("Capital?<script>alert(1)</script>"), "Capital?");
        assert_eq!(clean_html("<b>bold</b>"), "<b>bold</b>");
    }
}
