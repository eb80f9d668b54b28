use chrono::{DateTime, Local};

use crate::remote::Flavor;
use crate::sequence::ScanView;

pub type EntryId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone { Plain, Accent, Muted, Bright, Directory, Error, Warning }

#[derive(Clone, Debug, PartialEq)]
pub struct Span { pub text: String, pub tone: Tone }

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Line { pub spans: Vec<Span> }

impl Line {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self { spans: vec![Span { text: text.into(), tone }] }
    }
    pub fn plain(text: impl Into<String>) -> Self { Self::new(text, Tone::Plain) }
    pub fn error(text: impl Into<String>) -> Self { Self::new(text, Tone::Error) }
    pub fn span(mut self, text: impl Into<String>, tone: Tone) -> Self {
        self.spans.push(Span { text: text.into(), tone });
        self
    }
    #[cfg(test)]
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Multi-line text block, one `Line` per `\n`.
pub fn block(text: &str, tone: Tone) -> Vec<Line> {
    text.lines().map(|l| Line::new(l, tone)).collect()
}

#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Echo(String),
    Lines(Vec<Line>),
    Remote { flavor: Flavor, text: String, live: bool },
    Scan(ScanView),
}

#[derive(Clone, Debug)]
pub struct Entry {
    pub id:   EntryId,
    pub at:   DateTime<Local>,
    pub body: Body,
}

/// Append-only display history of one widget session.
///
/// Ids increase monotonically for the life of the value and survive `clear`, so a
/// writer holding the id of a cleared entry can never hit a newer one.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_id: EntryId,
}

impl Transcript {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, body: Body) -> EntryId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry { id, at: Local::now(), body });
        id
    }

    pub fn push_lines(&mut self, lines: Vec<Line>) -> Option<EntryId> {
        if lines.is_empty() { return None; }
        Some(self.push(Body::Lines(lines)))
    }

    pub fn push_line(&mut self, line: Line) -> EntryId {
        self.push(Body::Lines(vec![line]))
    }

    /// Returns false when the entry is gone.
    pub fn update(&mut self, id: EntryId, f: impl FnOnce(&mut Body)) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => { f(&mut entry.body); true }
            None        => false,
        }
    }

    pub fn replace(&mut self, id: EntryId, body: Body) -> bool {
        self.update(id, |b| *b = body)
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[Entry] { &self.entries }
    #[cfg(test)]
    pub fn len(&self) -> usize { self.entries.len() }
    #[cfg(test)]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn clear(&mut self) { self.entries.clear(); }

    #[cfg(test)]
    pub fn last_text(&self) -> Option<String> {
        self.entries.last().map(|e| match &e.body {
            Body::Echo(s)               => s.clone(),
            Body::Lines(lines)          => lines.iter().map(Line::text).collect::<Vec<_>>().join("\n"),
            Body::Remote { text, .. }   => text.clone(),
            Body::Scan(view)            => view.title.to_string(),
        })
    }
}
