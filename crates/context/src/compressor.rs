//! Budget-driven compression of an assembled context.
//!
//! # Algorithm
//!
//! 1. If the whole context already fits `max_tokens`, return it unchanged.
//! 2. Reserve each section's floor: its header line plus room for `\n…`.
//!    While the floors and separators exceed `4 * max_tokens`, drop the
//!    least important section.
//! 3. Split the remaining characters over the kept sections in proportion
//!    to importance, on top of their floors.
//! 4. Compress every section that exceeds its limit with the strategy for
//!    its kind:
//!    - project, world, chapter info: keep the headline, then whole lines
//!      while they fit, then an ellipsis line
//!    - characters: keep entry lines and personality/relationship lines,
//!      then cut by lines like above
//!    - content: truncate, backing off to a sentence end near the cut
//! 5. Rejoin in kind order.
//!
//! Header lines are never cut, so the output always parses back into the
//! kept sections in order. Every present section survives once
//! `4 * max_tokens` covers all floors and separators (73 characters for a
//! full five-section context, i.e. 19 tokens). The output never exceeds
//! `4 * max_tokens` characters.
//!
//! Compression is pure and deterministic.

use crate::relevance::{ENTRY_PREFIX, PERSONALITY_LABEL, RELATIONSHIP_LABEL};
use crate::section::{AssembledContext, ContextSection, SectionKind, SECTION_SEPARATOR};
use crate::token::{self, char_len, take_chars};
use tracing::debug;

/// Marks text removed by compression.
pub const ELLIPSIS: char = '…';

/// Characters that end a sentence.
pub(crate) const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// Share of the content window, from its end, searched for a sentence end.
const SENTENCE_BACKOFF_DIVISOR: usize = 5;

/// Compresses contexts toward a token budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextCompressor;

impl ContextCompressor {
    pub fn new() -> Self {
        Self
    }

    /// Compress a flattened context. Text under the budget is returned
    /// unchanged; otherwise it is split into sections by header lines.
    pub fn compress_context(&self, context: &str, max_tokens: usize) -> String {
        if token::estimate_tokens(context) <= max_tokens {
            return context.to_string();
        }
        self.compress_over_budget(&AssembledContext::parse(context), max_tokens)
    }

    /// Compress an already-typed context and render it.
    pub fn compress_sections(&self, context: &AssembledContext, max_tokens: usize) -> String {
        let rendered = context.render();
        if token::estimate_tokens(&rendered) <= max_tokens {
            return rendered;
        }
        self.compress_over_budget(context, max_tokens)
    }

    fn compress_over_budget(&self, context: &AssembledContext, max_tokens: usize) -> String {
        let sections = context.sections();
        let limits = Self::allocate(sections, max_tokens);

        let mut parts: Vec<String> = Vec::with_capacity(sections.len());
        for (section, limit) in sections.iter().zip(limits) {
            let Some(limit) = limit else {
                debug!(section = section.kind.name(), "Section dropped, header does not fit");
                continue;
            };
            let before = char_len(&section.text);
            let Some(compressed) = Self::compress_section(section, limit) else {
                continue;
            };
            if before > limit {
                debug!(
                    section = section.kind.name(),
                    limit_chars = limit,
                    before_chars = before,
                    after_chars = char_len(&compressed),
                    "Section compressed"
                );
            }
            parts.push(compressed);
        }

        let output = parts.join(SECTION_SEPARATOR);
        debug!(
            max_tokens,
            sections = sections.len(),
            kept = parts.len(),
            final_tokens = token::estimate_tokens(&output),
            "Context compressed"
        );
        output
    }

    /// Characters a section can never be compressed below: its header
    /// plus `\n…`, or a lone `…` without a header. Shorter sections are
    /// their own floor.
    pub fn floor(section: &ContextSection) -> usize {
        let header = char_len(section.header_line());
        let minimal = if header == 0 { 1 } else { header + 2 };
        char_len(&section.text).min(minimal)
    }

    /// Character limit per section, in section order. `None` marks a
    /// section dropped because the floors did not fit `4 * max_tokens`;
    /// the least important sections go first.
    pub fn allocate(sections: &[ContextSection], max_tokens: usize) -> Vec<Option<usize>> {
        let budget = token::tokens_to_chars(max_tokens);
        let mut kept: Vec<bool> = vec![true; sections.len()];

        let reserved = |kept: &[bool]| -> usize {
            let count = kept.iter().filter(|k| **k).count();
            let floors: usize = sections
                .iter()
                .zip(kept)
                .filter(|(_, k)| **k)
                .map(|(s, _)| Self::floor(s))
                .sum();
            floors + SECTION_SEPARATOR.len() * count.saturating_sub(1)
        };

        while reserved(&kept) > budget {
            let least = sections
                .iter()
                .enumerate()
                .filter(|(i, _)| kept[*i])
                .min_by_key(|(_, s)| s.importance())
                .map(|(i, _)| i);
            match least {
                Some(i) => kept[i] = false,
                None => break,
            }
        }

        let spare = (budget - reserved(&kept)) as u128;
        let total_importance: u128 = sections
            .iter()
            .zip(&kept)
            .filter(|(_, k)| **k)
            .map(|(s, _)| u128::from(s.importance()))
            .sum();

        sections
            .iter()
            .zip(&kept)
            .map(|(s, k)| {
                if !*k {
                    return None;
                }
                let share = spare * u128::from(s.importance()) / total_importance.max(1);
                Some(Self::floor(s) + usize::try_from(share).unwrap_or(0))
            })
            .collect()
    }

    /// Compress one section to at most `limit` characters, keeping its
    /// header line intact. Sections already within `limit` are unchanged;
    /// `None` when `limit` is below the section's floor.
    pub fn compress_section(section: &ContextSection, limit: usize) -> Option<String> {
        let text = section.text.as_str();
        if char_len(text) <= limit {
            return Some(text.to_string());
        }
        if limit < Self::floor(section) {
            return None;
        }

        let compressed = match section.kind {
            SectionKind::Project | SectionKind::World | SectionKind::ChapterInfo => {
                keep_lines(text, limit)
            }
            SectionKind::Characters => keep_character_lines(text, limit),
            SectionKind::Content => cut_at_sentence(text, limit),
        };

        if compressed.trim().is_empty() {
            Some(truncate_with_ellipsis(text.trim(), limit))
        } else {
            Some(compressed)
        }
    }
}

/// First `limit - 1` characters plus an ellipsis; a lone ellipsis when
/// nothing else fits.
fn truncate_with_ellipsis(text: &str, limit: usize) -> String {
    if char_len(text) <= limit {
        return text.to_string();
    }
    let mut out = take_chars(text, limit.saturating_sub(1)).to_string();
    out.push(ELLIPSIS);
    out
}

/// Headline, then whole lines while they fit, then `\n…`.
fn keep_lines(text: &str, limit: usize) -> String {
    if char_len(text) <= limit {
        return text.to_string();
    }

    let mut lines = text.lines();
    let headline = lines.next().unwrap_or_default();
    let headline_len = char_len(headline);
    if headline_len > limit {
        return truncate_with_ellipsis(headline, limit);
    }

    let mut out = headline.to_string();
    let mut used = headline_len;
    // Room for "\n…" is reserved on every line so the marker always fits.
    for line in lines {
        let cost = 1 + char_len(line);
        if used + cost + 2 > limit {
            if used + 2 <= limit {
                out.push('\n');
                out.push(ELLIPSIS);
            }
            break;
        }
        out.push('\n');
        out.push_str(line);
        used += cost;
    }
    out
}

fn keep_character_lines(text: &str, limit: usize) -> String {
    let mut lines = text.lines();
    let header = lines.next().unwrap_or_default();
    let personality = PERSONALITY_LABEL.to_lowercase();
    let relationship = RELATIONSHIP_LABEL.to_lowercase();

    let mut kept = vec![header];
    kept.extend(lines.filter(|line| {
        if line.starts_with(ENTRY_PREFIX) {
            return true;
        }
        let lower = line.to_lowercase();
        lower.contains(&personality) || lower.contains(&relationship)
    }));

    keep_lines(&kept.join("\n"), limit)
}

/// Truncate to `limit` characters, ending on a sentence terminator in the
/// last fifth of the window when there is one.
fn cut_at_sentence(text: &str, limit: usize) -> String {
    if char_len(text) <= limit {
        return text.to_string();
    }
    if limit == 0 {
        return ELLIPSIS.to_string();
    }

    let window = take_chars(text, limit);
    let floor = limit - limit / SENTENCE_BACKOFF_DIVISOR;
    let sentence_end = window
        .char_indices()
        .enumerate()
        .filter(|(pos, (_, c))| *pos >= floor && SENTENCE_TERMINATORS.contains(c))
        .last()
        .map(|(_, (byte_idx, c))| byte_idx + c.len_utf8());

    match sentence_end {
        Some(end) => window[..end].to_string(),
        None => truncate_with_ellipsis(text, limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_context() -> AssembledContext {
        AssembledContext::from_sections([
            ContextSection::new(SectionKind::Project, "Name: Test\nGenre: Isekai"),
            ContextSection::new(SectionKind::World, &"Islands drift over the sea. ".repeat(20)),
            ContextSection::new(
                SectionKind::Characters,
                "- Hero (age 18, male)\n  Appearance: tall\n  Personality: brave\n  Background: farm boy\n  Relationship (rival → Mira): old feud\n- Mira\n  Appearance: short",
            ),
            ContextSection::new(SectionKind::ChapterInfo, "Title: Chapter 1\nPosition: 1"),
            ContextSection::new(
                SectionKind::Content,
                &"The hero walked on. It rained all day! ".repeat(40),
            ),
        ])
    }

    #[test]
    fn under_budget_is_identity() {
        let c = ContextCompressor::new();
        assert_eq!(c.compress_context("short text", 100), "short text");
        assert_eq!(c.compress_context("", 0), "");
    }

    #[test]
    fn long_unstructured_text_is_truncated() {
        let c = ContextCompressor::new();
        let out = c.compress_context(&"A".repeat(4000), 10);
        assert!(char_len(&out) <= 44, "got {} chars", char_len(&out));
        assert!(out.starts_with("AAA"));
        assert!(out.ends_with(ELLIPSIS));
    }

    #[test]
    fn allocation_is_floor_plus_proportional_share() {
        let ctx = sample_context();
        let alloc = ContextCompressor::allocate(ctx.sections(), 330);
        // Floors 11, 9, 14, 11, 20 and four separators leave 1247 of 1320
        // characters, split by importances 6, 5, 8, 4, 10.
        assert_eq!(
            alloc,
            vec![Some(237), Some(197), Some(316), Some(162), Some(397)]
        );
    }

    #[test]
    fn allocation_drops_least_important_when_headers_do_not_fit() {
        let ctx = sample_context();
        let alloc = ContextCompressor::allocate(ctx.sections(), 5);
        assert_eq!(alloc, vec![None, None, None, None, Some(20)]);

        let alloc = ContextCompressor::allocate(ctx.sections(), 13);
        // 52 characters: chapter info and world go, 3 spare characters
        // are shared by importances 6, 8, 10.
        assert_eq!(alloc, vec![Some(11), None, Some(15), None, Some(21)]);
    }

    #[test]
    fn allocation_of_nothing_is_empty() {
        assert!(ContextCompressor::allocate(&[], 100).is_empty());
    }

    #[test]
    fn compressed_context_keeps_order_and_budget() {
        let ctx = sample_context();
        let c = ContextCompressor::new();
        let out = c.compress_sections(&ctx, 200);
        assert!(char_len(&out) <= 800 + 16);
        assert_eq!(AssembledContext::parse(&out).kinds(), ctx.kinds());
    }

    #[test]
    fn string_and_typed_paths_agree() {
        let ctx = sample_context();
        let c = ContextCompressor::new();
        assert_eq!(
            c.compress_context(&ctx.render(), 150),
            c.compress_sections(&ctx, 150)
        );
    }

    #[test]
    fn line_strategy_keeps_headline_and_marks_cut() {
        let section = ContextSection::new(SectionKind::World, "Line one.\nLine two.\nLine three.");
        let out = ContextCompressor::compress_section(&section, 30).unwrap();
        assert_eq!(out, "[World]\nLine one.\nLine two.\n…");
    }

    #[test]
    fn character_strategy_drops_minor_attributes() {
        let section = sample_context().get(SectionKind::Characters).unwrap().clone();
        let out = ContextCompressor::compress_section(&section, 120).unwrap();
        assert!(out.starts_with("[Characters]\n- Hero"));
        assert!(out.contains("Personality: brave"));
        assert!(out.contains("Relationship (rival → Mira)"));
        assert!(out.contains("- Mira"));
        assert!(!out.contains("Appearance"));
        assert!(!out.contains("Background"));
        assert!(char_len(&out) <= 120);
    }

    #[test]
    fn content_backs_off_to_sentence_end() {
        let section = ContextSection::raw(
            SectionKind::Content,
            "First sentence here. Second sentence is longer than the window.",
        );
        let out = ContextCompressor::compress_section(&section, 22).unwrap();
        assert_eq!(out, "First sentence here.");
    }

    #[test]
    fn content_without_nearby_terminator_gets_ellipsis() {
        let section = ContextSection::raw(SectionKind::Content, "Short. and then a very long clause");
        let out = ContextCompressor::compress_section(&section, 20).unwrap();
        assert_eq!(char_len(&out), 20);
        assert!(out.ends_with(ELLIPSIS));
    }

    #[test]
    fn ideographic_sentence_ends_are_recognized() {
        let section = ContextSection::raw(SectionKind::Content, "勇者拔出了剑。魔王笑了起来，然后");
        let out = ContextCompressor::compress_section(&section, 7).unwrap();
        assert_eq!(out, "勇者拔出了剑。");
    }

    #[test]
    fn header_survives_at_its_floor() {
        for kind in SectionKind::ALL {
            let section = ContextSection::new(kind, "Some text that cannot fit.");
            let floor = ContextCompressor::floor(&section);
            assert_eq!(floor, char_len(kind.header()) + 2);
            let out = ContextCompressor::compress_section(&section, floor).unwrap();
            assert!(out.starts_with(kind.header()), "{out}");
            assert!(char_len(&out) <= floor);
            assert!(ContextCompressor::compress_section(&section, floor - 1).is_none());
        }
    }

    #[test]
    fn headerless_text_shrinks_to_lone_ellipsis() {
        let section = ContextSection::raw(SectionKind::Content, "Some text that cannot fit.");
        assert_eq!(ContextCompressor::floor(&section), 1);
        assert_eq!(ContextCompressor::compress_section(&section, 1).unwrap(), "…");
        assert!(ContextCompressor::compress_section(&section, 0).is_none());
    }

    #[test]
    fn small_budget_keeps_every_label() {
        let ctx = AssembledContext::from_sections([
            ContextSection::new(SectionKind::Project, "Name: Test\nGenre: Isekai"),
            ContextSection::new(SectionKind::World, &"Islands drift. ".repeat(10)),
            ContextSection::new(SectionKind::ChapterInfo, "Title: Chapter 1\nPosition: 1"),
            ContextSection::new(SectionKind::Content, &"The hero walked on. ".repeat(10)),
        ]);
        let out = ContextCompressor::new().compress_sections(&ctx, 16);
        assert!(out.contains("[Chapter]\n"));
        assert!(char_len(&out) <= 64);
        assert_eq!(AssembledContext::parse(&out).kinds(), ctx.kinds());
    }

    #[test]
    fn zero_budget_drops_everything() {
        let out = ContextCompressor::new().compress_sections(&sample_context(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn preamble_is_kept_ahead_of_later_content() {
        let text = format!(
            "Preface line first.\n\n[Relevant Content]\n{}",
            "Body sentence here. ".repeat(10)
        );
        let out = ContextCompressor::new().compress_context(&text, 30);
        let preface = out.find("Preface").unwrap();
        let body = out.find("Body").unwrap();
        assert!(out.starts_with("[Relevant Content]\n"));
        assert!(preface < body);
    }

    fn body() -> impl Strategy<Value = String> {
        "[a-zA-Z .!?\n-]{0,600}"
    }

    fn context_strategy() -> impl Strategy<Value = AssembledContext> {
        proptest::collection::vec(
            (proptest::sample::select(SectionKind::ALL.to_vec()), body()),
            0..6,
        )
        .prop_map(|parts| {
            AssembledContext::from_sections(
                parts
                    .into_iter()
                    .map(|(kind, body)| ContextSection::new(kind, &body)),
            )
        })
    }

    fn is_ordered_subset(kept: &[SectionKind], all: &[SectionKind]) -> bool {
        let mut rest = all.iter();
        kept.iter().all(|k| rest.any(|a| a == k))
    }

    proptest! {
        #[test]
        fn output_respects_budget(ctx in context_strategy(), max_tokens in 0usize..400) {
            let out = ContextCompressor::new().compress_sections(&ctx, max_tokens);
            prop_assert!(char_len(&out) <= 4 * max_tokens + 16);
        }

        #[test]
        fn string_path_respects_budget(text in "[a-zA-Z .\n]{0,3000}", max_tokens in 0usize..400) {
            let out = ContextCompressor::new().compress_context(&text, max_tokens);
            prop_assert!(char_len(&out) <= 4 * max_tokens + 16);
        }

        #[test]
        fn fitting_input_is_unchanged(ctx in context_strategy()) {
            let rendered = ctx.render();
            let budget = token::estimate_tokens(&rendered);
            prop_assert_eq!(ContextCompressor::new().compress_context(&rendered, budget), rendered);
        }

        #[test]
        fn section_order_is_preserved(ctx in context_strategy(), max_tokens in 0usize..600) {
            let out = ContextCompressor::new().compress_sections(&ctx, max_tokens);
            let kinds = AssembledContext::parse(&out).kinds();
            prop_assert!(is_ordered_subset(&kinds, &ctx.kinds()));

            let floors: usize = ctx.sections().iter().map(ContextCompressor::floor).sum();
            let needed = floors + 2 * ctx.sections().len().saturating_sub(1);
            if 4 * max_tokens >= needed {
                prop_assert_eq!(kinds, ctx.kinds());
            }
        }
    }
}
