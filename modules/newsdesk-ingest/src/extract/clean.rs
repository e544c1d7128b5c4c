// Content cleaning: HTML → readable body text.
//
// The boilerplate removals live in one ordered rule table so individual
// rules can be tested and tuned without touching control flow. Rules run
// after tag stripping and entity decoding, then metadata-shaped lines are
// dropped and whitespace is normalized.

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script>").expect("valid script regex"));
static STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b.*?</style>").expect("valid style regex"));
static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));
static LINE_BREAK_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</p>|</div>|</h[1-6]>|</li>|</blockquote>")
        .expect("valid break-tag regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

/// Ordered boilerplate removals applied to stripped text.
static CLEANING_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    const MONTHS: &str = "Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|Jun(?:e)?|\
Jul(?:y)?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?";

    let rules: Vec<(String, &'static str)> = vec![
        // Standalone date stamp lines.
        (format!(r"(?m)^[ \t]*(?:{MONTHS})\.?\s+\d{{1,2}},?\s+\d{{4}}[ \t]*$"), ""),
        // "Published on ..." / "Posted ..." / "Updated ..." lines.
        (
            r"(?im)^[ \t]*(?:published|posted|updated|last updated)(?:\s+on)?\b[^\n]*$".to_string(),
            "",
        ),
        // Byline lines: "By Jane Doe", optionally with a trailing date.
        (
            r"(?m)^[ \t]*By\s+[A-Z][\w.'-]*(?:\s+[A-Z][\w.'-]*){0,3}(?:\s*[,|–—-][^\n]*)?$"
                .to_string(),
            "",
        ),
        // Read-more tails, with or without an arrow.
        (r"(?i)read more\s*(?:→|›|»|>{1,2}|\.\.\.|…)".to_string(), ""),
        (r"(?im)^[ \t]*(?:read|learn) more[ \t]*$".to_string(), ""),
        // Social share boilerplate.
        (
            r"(?im)^[ \t]*share(?:\s+(?:this|the))?(?:\s+(?:post|article|story))?[ \t:]*$"
                .to_string(),
            "",
        ),
        (
            r"(?i)share\s+on\s+(?:facebook|twitter|x|linkedin|pinterest|reddit|whatsapp|email)"
                .to_string(),
            "",
        ),
        // Newsletter / follow prompts, ads, comment chrome.
        (
            concat!(
                r"(?im)^[ \t]*(?:subscribe(?:\s+to\s+(?:our|the)\s+newsletter)?",
                r"|sign up for[^\n]*|follow us(?:\s+on[^\n]*)?|advertisement",
                r"|sponsored(?:\s+content)?|related (?:posts|articles|stories):?",
                r"|continue reading|leave a (?:comment|reply)|no comments?",
                r"|comments? \(\d+\))[ \t]*$"
            )
            .to_string(),
            "",
        ),
        // Reading-time badges.
        (r"(?i)\b\d+\s+min(?:ute)?s?\s+read\b".to_string(), ""),
        // Photo credits.
        (
            r"(?im)^[ \t]*(?:photo|image|credit)s?(?:\s+(?:credit|by|courtesy of))?\s*:[^\n]*$"
                .to_string(),
            "",
        ),
    ];

    rules
        .into_iter()
        .map(|(pattern, replacement)| {
            (
                Regex::new(&pattern).expect("valid cleaning rule"),
                replacement,
            )
        })
        .collect()
});

/// Navigation/metadata-shaped lines dropped wholesale.
static NAV_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:home|menu|search|login|sign in|previous|next|back to top",
        r"|skip to (?:main )?content|share:?|tags?:.*|categories?:.*",
        r"|filed under:?.*|posted in .*)$"
    ))
    .expect("valid nav-line regex")
});

const ENTITIES: &[(&str, &str)] = &[
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#34;", "\""),
    ("&apos;", "'"),
    ("&#39;", "'"),
    ("&nbsp;", " "),
    ("&#160;", " "),
    ("&lsquo;", "\u{2018}"),
    ("&rsquo;", "\u{2019}"),
    ("&#8216;", "\u{2018}"),
    ("&#8217;", "\u{2019}"),
    ("&ldquo;", "\u{201C}"),
    ("&rdquo;", "\u{201D}"),
    ("&#8220;", "\u{201C}"),
    ("&#8221;", "\u{201D}"),
    ("&ndash;", "\u{2013}"),
    ("&mdash;", "\u{2014}"),
    ("&#8211;", "\u{2013}"),
    ("&#8212;", "\u{2014}"),
    ("&hellip;", "\u{2026}"),
    ("&#8230;", "\u{2026}"),
    // &amp; decodes last so "&amp;lt;" renders as a literal "&lt;".
    ("&amp;", "&"),
    ("&#38;", "&"),
];

/// Strip tags and decode common entities, preserving paragraph breaks.
pub fn strip_html(html: &str) -> String {
    let text = SCRIPT_RE.replace_all(html, "");
    let text = STYLE_RE.replace_all(&text, "");
    let text = COMMENT_RE.replace_all(&text, "");
    let text = LINE_BREAK_TAG_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, "");

    let mut decoded = text.into_owned();
    for (entity, replacement) in ENTITIES {
        if decoded.contains(entity) {
            decoded = decoded.replace(entity, replacement);
        }
    }
    decoded
}

/// Full cleaning pass: strip markup, apply the rule table, drop
/// metadata-shaped lines, collapse repeats, normalize whitespace.
/// Cleaning already-clean text is a no-op.
pub fn clean_content(raw: &str) -> String {
    let text = strip_html(raw);

    let mut text = text;
    for (pattern, replacement) in CLEANING_RULES.iter() {
        if pattern.is_match(&text) {
            text = pattern.replace_all(&text, *replacement).into_owned();
        }
    }

    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            // Preserve at most one blank between content lines; the final
            // normalization collapses longer runs anyway.
            if lines.last().is_some_and(|l| !l.is_empty()) {
                lines.push("");
            }
            continue;
        }
        if NAV_LINE_RE.is_match(trimmed) {
            continue;
        }
        // Collapse consecutive duplicate lines (repeated headings, doubled
        // titles from templating bugs).
        if lines.last() == Some(&trimmed) {
            continue;
        }
        lines.push(trimmed);
    }

    let joined = lines.join("\n");
    normalize_whitespace(&joined)
}

fn normalize_whitespace(s: &str) -> String {
    static SPACES_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("valid spaces regex"));
    static BREAKS_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\n{3,}").expect("valid breaks regex"));

    let s = SPACES_RE.replace_all(s, " ");
    let s = BREAKS_RE.replace_all(&s, "\n\n");
    s.trim().to_string()
}
