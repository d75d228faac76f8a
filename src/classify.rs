//! Content classification.
//!
//! Maps raw clipboard content onto one of the four [`Category`] cases. The
//! checks run in a fixed order and the first match wins, so the result only
//! depends on the content.

use crate::types::Category;
use regex::Regex;
use std::sync::OnceLock;

/// Prefix marking embedded image data.
pub const IMAGE_DATA_PREFIX: &str = "data:image/";

/// Indicator score at which content counts as code.
const CODE_SCORE_THRESHOLD: usize = 3;

/// Substrings that suggest source code. Each one present adds one point.
const CODE_INDICATORS: &[&str] = &[
    "{",
    "}",
    "=>",
    "->",
    "();",
    "function ",
    "function(",
    "const ",
    "let ",
    "var ",
    "return ",
    "import ",
    "export ",
    "class ",
    "def ",
    "fn ",
    "if (",
    "for (",
    "while (",
    "public ",
    "private ",
    "#include",
    "</",
    "/>",
    "#!/",
    "// ",
    "/*",
    "*/",
];

static URL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn url_pattern() -> Option<&'static Regex> {
    URL_PATTERN
        .get_or_init(|| Regex::new(r"^(?i:https?://|www\.)\S+$").ok())
        .as_ref()
}

/// Classify content into a category.
pub fn classify(content: &str) -> Category {
    let trimmed = content.trim();

    if trimmed.is_empty() {
        return Category::Text;
    }

    if content.starts_with(IMAGE_DATA_PREFIX) {
        return Category::Image;
    }

    if is_url(trimmed) {
        return Category::Url;
    }

    if looks_like_code(content) {
        return Category::Code;
    }

    Category::Text
}

fn is_url(trimmed: &str) -> bool {
    url_pattern().is_some_and(|re| re.is_match(trimmed))
}

fn looks_like_code(content: &str) -> bool {
    let score = CODE_INDICATORS
        .iter()
        .filter(|indicator| content.contains(*indicator))
        .count();
    if score >= CODE_SCORE_THRESHOLD {
        return true;
    }

    let lines: Vec<&str> = content.lines().collect();
    if lines.len() > 3 {
        let indented = lines
            .iter()
            .filter(|line| {
                !line.trim().is_empty() && (line.starts_with("  ") || line.starts_with('\t'))
            })
            .count();
        if indented > 1 {
            return true;
        }
    }

    false
}

/// Size metric used for admission limits: chars for textual content, KB of
/// decoded payload (rounded up) for images.
pub fn size_metric(content: &str, category: Category) -> u64 {
    match category {
        Category::Image => {
            let payload = content
                .split_once(',')
                .map(|(_, data)| data)
                .unwrap_or(content);
            let decoded_bytes = (payload.len() as u64) * 3 / 4;
            decoded_bytes.div_ceil(1024)
        }
        Category::Text | Category::Url | Category::Code => content.chars().count() as u64,
    }
}
