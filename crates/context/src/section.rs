//! Typed context sections.
//!
//! An assembled context is an ordered list of labeled sections. Inside the
//! engine the list travels as `AssembledContext`; it is flattened to a
//! string only at the edge. `AssembledContext::parse` recovers the
//! structure from a flattened string for callers that only have text.
//!
//! # Rendered format
//!
//! | Kind | Header | Importance |
//! |------|--------|-----------|
//! | Project | `[Project]` | 6 |
//! | World | `[World]` | 5 |
//! | Characters | `[Characters]` | 8 |
//! | ChapterInfo | `[Chapter]` | 4 |
//! | Content | `[Relevant Content]` | 10 |
//!
//! Sections are separated by one blank line and always appear in the
//! order above.

use serde::{Deserialize, Serialize};

/// Separator placed between rendered sections.
pub const SECTION_SEPARATOR: &str = "\n\n";

/// The kind of a context section. Declaration order is render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Project,
    World,
    Characters,
    ChapterInfo,
    Content,
}

impl SectionKind {
    /// Every kind, in render order.
    pub const ALL: [SectionKind; 5] = [
        SectionKind::Project,
        SectionKind::World,
        SectionKind::Characters,
        SectionKind::ChapterInfo,
        SectionKind::Content,
    ];

    /// The header line that opens a rendered section of this kind.
    pub fn header(self) -> &'static str {
        match self {
            SectionKind::Project => "[Project]",
            SectionKind::World => "[World]",
            SectionKind::Characters => "[Characters]",
            SectionKind::ChapterInfo => "[Chapter]",
            SectionKind::Content => "[Relevant Content]",
        }
    }

    /// Fixed budget weight (1–10).
    pub fn importance(self) -> u32 {
        match self {
            SectionKind::Project => 6,
            SectionKind::World => 5,
            SectionKind::Characters => 8,
            SectionKind::ChapterInfo => 4,
            SectionKind::Content => 10,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SectionKind::Project => "project",
            SectionKind::World => "world",
            SectionKind::Characters => "characters",
            SectionKind::ChapterInfo => "chapter_info",
            SectionKind::Content => "content",
        }
    }

    /// Recognize a header line. Only an exact (whitespace-trimmed) match
    /// counts, so prose that merely mentions "[World]" mid-line is safe.
    pub fn from_header(line: &str) -> Option<Self> {
        let line = line.trim();
        Self::ALL.into_iter().find(|k| k.header() == line)
    }
}

/// One labeled block of context. `text` includes the header line when the
/// section was rendered by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSection {
    pub kind: SectionKind,
    pub text: String,
}

impl ContextSection {
    /// Render a section from its body: header line, then the body.
    pub fn new(kind: SectionKind, body: &str) -> Self {
        let body = body.trim_end();
        let text = if body.is_empty() {
            kind.header().to_string()
        } else {
            format!("{}\n{}", kind.header(), body)
        };
        Self { kind, text }
    }

    /// Wrap already-rendered text without adding a header.
    pub fn raw(kind: SectionKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn importance(&self) -> u32 {
        self.kind.importance()
    }

    /// The header line, or `""` when the text does not open with this
    /// kind's header.
    pub fn header_line(&self) -> &str {
        let first = self.text.split('\n').next().unwrap_or_default();
        if SectionKind::from_header(first) == Some(self.kind) {
            first
        } else {
            ""
        }
    }

    /// The text after the header line (all of it if there is no header).
    pub fn body(&self) -> &str {
        match self.text.split_once('\n') {
            Some((first, rest)) if SectionKind::from_header(first) == Some(self.kind) => rest,
            None if SectionKind::from_header(&self.text) == Some(self.kind) => "",
            _ => &self.text,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// An ordered, de-duplicated list of sections.
///
/// Invariant: sections are sorted by kind and each kind appears at most
/// once; pushing a kind that is already present appends to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledContext {
    sections: Vec<ContextSection>,
}

impl AssembledContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sections(sections: impl IntoIterator<Item = ContextSection>) -> Self {
        let mut ctx = Self::new();
        for section in sections {
            ctx.push(section);
        }
        ctx
    }

    /// Insert a section at its kind position. Blank sections are ignored.
    pub fn push(&mut self, section: ContextSection) {
        if section.is_blank() {
            return;
        }
        match self.sections.binary_search_by_key(&section.kind, |s| s.kind) {
            Ok(idx) => {
                let existing = &mut self.sections[idx];
                existing.text.push('\n');
                existing.text.push_str(&section.text);
            }
            Err(idx) => self.sections.insert(idx, section),
        }
    }

    pub fn sections(&self) -> &[ContextSection] {
        &self.sections
    }

    pub fn get(&self, kind: SectionKind) -> Option<&ContextSection> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    pub fn kinds(&self) -> Vec<SectionKind> {
        self.sections.iter().map(|s| s.kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Flatten to the prompt string.
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR)
    }

    /// Recover sections from a flattened context.
    ///
    /// A line that is exactly a section header starts a new section.
    /// Text with no header at all becomes a single content section. Text
    /// before the first header is treated as content, and a repeated
    /// header merges into the earlier section of the same kind.
    pub fn parse(text: &str) -> Self {
        let mut ctx = Self::new();
        let mut preamble: Vec<&str> = Vec::new();
        let mut current: Option<(SectionKind, Vec<&str>)> = None;

        for line in text.lines() {
            if let Some(kind) = SectionKind::from_header(line) {
                if let Some((prev_kind, lines)) = current.take() {
                    ctx.push(ContextSection::raw(prev_kind, join_trimmed(&lines)));
                }
                current = Some((kind, vec![line.trim()]));
                continue;
            }
            match current.as_mut() {
                Some((_, lines)) => lines.push(line),
                None => preamble.push(line),
            }
        }

        if let Some((kind, lines)) = current {
            ctx.push(ContextSection::raw(kind, join_trimmed(&lines)));
        }

        let preamble = join_trimmed(&preamble);
        if !preamble.trim().is_empty() {
            ctx.prepend_body(SectionKind::Content, &preamble);
        }

        ctx
    }

    /// Insert `text` at the start of a section's body, right after its
    /// header. Creates the section when it is absent.
    fn prepend_body(&mut self, kind: SectionKind, text: &str) {
        match self.sections.binary_search_by_key(&kind, |s| s.kind) {
            Ok(idx) => {
                let section = &mut self.sections[idx];
                let (header, rest) = section.text.split_at(section.header_line().len());
                section.text = if header.is_empty() {
                    format!("{text}\n{rest}")
                } else {
                    format!("{header}\n{text}{rest}")
                };
            }
            Err(idx) => self
                .sections
                .insert(idx, ContextSection::raw(kind, text.to_string())),
        }
    }
}

/// Join lines and drop surrounding blank lines.
fn join_trimmed(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    }
}
