//! Mention detection: is a known character referenced in a passage, and
//! which unregistered names does a passage introduce?
//!
//! Everything here is heuristic. Known-name matching sits behind the
//! `MentionMatcher` trait so a smarter matcher can replace the literal one
//! without touching the relevance analyzer. Alias extraction and new-name
//! detection are pattern-based and knowingly low-precision.

use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Finds which of a set of known names are mentioned in a text.
pub trait MentionMatcher: Send + Sync {
    /// Return the subset of `known_names` mentioned in `text`, in the
    /// order they appear in `known_names`, without duplicates.
    fn find_mentions(&self, text: &str, known_names: &[String]) -> Vec<String>;
}

/// Case-insensitive literal matching.
///
/// Names whose first or last character is an ASCII letter or digit must
/// sit on a word boundary at that end ("Al" does not match "also").
/// Ideographic names match as plain substrings, since such text has no
/// word separators.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralMentionMatcher;

impl MentionMatcher for LiteralMentionMatcher {
    fn find_mentions(&self, text: &str, known_names: &[String]) -> Vec<String> {
        let haystack = text.to_lowercase();
        let mut seen = HashSet::new();
        known_names
            .iter()
            .filter(|name| contains_name_lower(&haystack, name))
            .filter(|name| seen.insert(name.to_lowercase()))
            .cloned()
            .collect()
    }
}

/// Whether `name` is mentioned in `text` (see `LiteralMentionMatcher`).
pub fn contains_name(text: &str, name: &str) -> bool {
    contains_name_lower(&text.to_lowercase(), name)
}

fn contains_name_lower(haystack: &str, name: &str) -> bool {
    let needle = name.trim().to_lowercase();
    let (Some(first), Some(last)) = (needle.chars().next(), needle.chars().next_back()) else {
        return false;
    };

    haystack.match_indices(needle.as_str()).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + needle.len()..].chars().next();
        let start_ok = !first.is_ascii_alphanumeric() || !before.is_some_and(char::is_alphanumeric);
        let end_ok = !last.is_ascii_alphanumeric() || !after.is_some_and(char::is_alphanumeric);
        start_ok && end_ok
    })
}

// ── Alias extraction ──────────────────────────────────────────────────────

static LATIN_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:aliases|alias|nickname|also known as|a\.k\.a\.?|aka)\s*:?\s*["']?(?:the\s+)?([^\s,;.!?"'()]{1,20})"#,
    )
    .expect("LATIN_ALIAS regex should compile")
});

static CJK_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(?:外号|绰号|别名|昵称|人称)\\s*[:：]?\\s*[\"“「]?([^\\s,;.，。；、\"”」]{1,10})")
        .expect("CJK_ALIAS regex should compile")
});

/// Pull alias tokens out of free-text descriptions such as
/// `"nickname: Red"` or `"外号：小白"`. May miss or over-match.
pub fn extract_aliases<'a>(name: &str, descriptions: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let own = name.trim().to_lowercase();
    let mut seen = HashSet::new();
    let mut aliases = Vec::new();

    for text in descriptions {
        for re in [&*LATIN_ALIAS, &*CJK_ALIAS] {
            for caps in re.captures_iter(text) {
                let Some(m) = caps.get(1) else { continue };
                let alias = m.as_str().trim();
                let key = alias.to_lowercase();
                if alias.is_empty() || key == own || !seen.insert(key) {
                    continue;
                }
                aliases.push(alias.to_string());
            }
        }
    }

    aliases
}

// ── New-name detection ────────────────────────────────────────────────────

/// Runs of capitalized words ("Lord Varen", "Mira").
static CAPITALIZED_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)*\b").expect("CAPITALIZED_RUN regex should compile")
});

/// Two to four ideographs immediately followed by a speech or action verb.
static IDEOGRAPH_SPEAKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        "([\u{4e00}-\u{9fa5}]{2,4}?)(?:说道|问道|笑道|喊道|叫道|答道|说|问|道|喊|想|看着|走向|点头|摇头|转身)",
    )
    .expect("IDEOGRAPH_SPEAKER regex should compile")
});

/// Names introduced by a cue phrase ("a girl named Ysolde").
static LATIN_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[Nn]amed|[Cc]alled|[Nn]ame is|[Nn]ame was)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)")
        .expect("LATIN_CUE regex should compile")
});

static CJK_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(?:名叫|叫做|名为|名字是)([\u{4e00}-\u{9fa5}]{2,4}?)(?:的|，|。|、|,|\\.|\\s|$)")
        .expect("CJK_CUE regex should compile")
});

/// Capitalized words that start sentences far more often than they name
/// anyone.
const STOP_WORDS: &[&str] = &[
    "A", "About", "After", "Again", "All", "Also", "An", "And", "As", "At", "Before", "But", "By",
    "Chapter", "Each", "Even", "Every", "For", "From", "He", "Her", "Here", "His", "How", "I",
    "If", "In", "It", "Its", "Just", "Later", "Maybe", "My", "No", "Not", "Now", "Of", "Oh", "On",
    "Once", "One", "Or", "Our", "She", "So", "Some", "Still", "Suddenly", "That", "The", "Their",
    "Then", "There", "These", "They", "This", "Those", "To", "Too", "Two", "Under", "Until", "We",
    "Well", "What", "When", "Where", "While", "Who", "Why", "With", "Yes", "Yet", "You", "Your",
];

/// Leading ideographs that mark a pronoun or connective rather than a name.
const CJK_NON_NAME_CHARS: &[char] = &['他', '她', '它', '我', '你', '们', '这', '那', '于', '就', '却', '又'];

fn strip_leading_stop_words(run: &str) -> Option<&str> {
    let mut rest = run.trim();
    loop {
        let (word, tail) = match rest.split_once(char::is_whitespace) {
            Some((w, t)) => (w, t.trim_start()),
            None => (rest, ""),
        };
        if !STOP_WORDS.contains(&word) {
            return (!rest.is_empty()).then_some(rest);
        }
        if tail.is_empty() {
            return None;
        }
        rest = tail;
    }
}

/// Scan a passage for name-like tokens that could be new characters.
///
/// Combines capitalized-word runs, ideographic speaker patterns, and
/// cue phrases. Results are de-duplicated and ordered by first
/// appearance. Intended for human review, not for updating a roster.
pub fn detect_name_candidates(content: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for m in CAPITALIZED_RUN.find_iter(content) {
        if let Some(name) = strip_leading_stop_words(m.as_str()) {
            let offset = m.end() - name.len();
            found.push((offset, name.to_string()));
        }
    }

    for re in [&*LATIN_CUE, &*CJK_CUE] {
        for caps in re.captures_iter(content) {
            if let Some(m) = caps.get(1) {
                found.push((m.start(), m.as_str().to_string()));
            }
        }
    }

    for caps in IDEOGRAPH_SPEAKER.captures_iter(content) {
        let Some(m) = caps.get(1) else { continue };
        if m.as_str().chars().any(|c| CJK_NON_NAME_CHARS.contains(&c)) {
            continue;
        }
        found.push((m.start(), m.as_str().to_string()));
    }

    found.sort_by_key(|(offset, _)| *offset);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter(|(_, name)| seen.insert(name.clone()))
        .map(|(_, name)| name)
        .collect()
}
