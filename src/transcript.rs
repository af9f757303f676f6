//! Conversation transcript export
//!
//! [`Transcript`] is a renderer-neutral document built from a conversation.
//! Page layout belongs to a [`TranscriptRenderer`]; a plain-text renderer is
//! included.

use crate::model::{Conversation, Role};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::convert::Infallible;
use std::fmt::Write as _;

const DEFAULT_TITLE: &str = "Chat Conversation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    LegalAssistant,
}

impl Speaker {
    pub fn label(self) -> &'static str {
        match self {
            Speaker::User => "USER",
            Speaker::LegalAssistant => "LEGAL ASSISTANT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    /// Cleaned, non-empty lines of the message body
    pub lines: Vec<String>,
    pub attachment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<TranscriptEntry>,
    /// Title exactly as stored, used for the file name
    raw_title: String,
}

impl Transcript {
    /// Build a transcript of every finalized message
    pub fn from_conversation(conversation: &Conversation, generated_at: DateTime<Utc>) -> Self {
        let raw_title = conversation.title.clone();
        let title = match clean_text(&raw_title) {
            t if t.is_empty() => DEFAULT_TITLE.to_string(),
            t => t,
        };

        let entries = conversation
            .messages
            .iter()
            .filter(|m| !m.streaming)
            .map(|m| TranscriptEntry {
                speaker: match m.role {
                    Role::User => Speaker::User,
                    Role::Assistant => Speaker::LegalAssistant,
                },
                lines: m
                    .content
                    .lines()
                    .map(clean_text)
                    .filter(|l| !l.is_empty())
                    .collect(),
                attachment: m.attachment_name.as_deref().map(clean_text),
            })
            .collect();

        Self {
            title,
            generated_at,
            entries,
            raw_title,
        }
    }

    /// e.g. `lease_review_2024-06-01.pdf`
    pub fn file_name(&self) -> String {
        let base = if self.raw_title.is_empty() {
            "chat"
        } else {
            &self.raw_title
        };
        let stem: String = base
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{stem}_{}.pdf", self.generated_at.format("%Y-%m-%d"))
    }
}

/// Output backend for transcripts, such as a PDF engine
pub trait TranscriptRenderer {
    type Error;

    fn render(&self, transcript: &Transcript) -> Result<Bytes, Self::Error>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl TranscriptRenderer for PlainTextRenderer {
    type Error = Infallible;

    fn render(&self, transcript: &Transcript) -> Result<Bytes, Self::Error> {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = writeln!(out, "{}", transcript.title);
        let _ = writeln!(
            out,
            "Generated on {}",
            transcript.generated_at.format("%B %-d, %Y %H:%M")
        );
        for entry in &transcript.entries {
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", entry.speaker.label());
            for line in &entry.lines {
                let _ = writeln!(out, "{line}");
            }
            if let Some(name) = &entry.attachment {
                let _ = writeln!(out, "Attachment: {name}");
            }
        }
        Ok(Bytes::from(out))
    }
}

/// Fold text to plain ASCII for fixed-font output.
///
/// Typographic punctuation and accented Latin letters map to ASCII, known
/// mis-decoded UTF-8 sequences are repaired, anything else outside ASCII is
/// dropped and runs of whitespace collapse to one space.
pub fn clean_text(text: &str) -> String {
    let repaired = text
        .replace("\u{e2}\u{20ac}\u{2122}", "'")
        .replace("\u{e2}\u{20ac}\u{153}", "\"")
        .replace("\u{e2}\u{20ac}\u{a2}", "* ")
        .replace("\u{e2}\u{20ac}", "\"");

    let mut folded = String::with_capacity(repaired.len());
    for c in repaired.chars() {
        match c {
            '\u{b9}' | '\u{b2}' | '\u{b3}' | '\u{bc}' | '\u{bd}' | '\u{be}' => {}
            '\u{c0}'..='\u{c6}' => folded.push('A'),
            '\u{e0}'..='\u{e6}' => folded.push('a'),
            '\u{c8}'..='\u{cb}' => folded.push('E'),
            '\u{e8}'..='\u{eb}' => folded.push('e'),
            '\u{cc}'..='\u{cf}' => folded.push('I'),
            '\u{ec}'..='\u{ef}' => folded.push('i'),
            '\u{d2}'..='\u{d6}' | '\u{d8}' => folded.push('O'),
            '\u{f2}'..='\u{f6}' | '\u{f8}' => folded.push('o'),
            '\u{d9}'..='\u{dc}' => folded.push('U'),
            '\u{f9}'..='\u{fc}' => folded.push('u'),
            '\u{dd}' | '\u{178}' => folded.push('Y'),
            '\u{fd}' | '\u{ff}' => folded.push('y'),
            '\u{d1}' => folded.push('N'),
            '\u{f1}' => folded.push('n'),
            '\u{c7}' => folded.push('C'),
            '\u{e7}' => folded.push('c'),
            '\u{d0}' => folded.push('D'),
            '\u{f0}' => folded.push('d'),
            '\u{de}' => folded.push_str("TH"),
            '\u{fe}' => folded.push_str("th"),
            '\u{df}' => folded.push_str("ss"),
            '\u{2018}' | '\u{2019}' => folded.push('\''),
            '\u{201c}' | '\u{201d}' => folded.push('"'),
            '\u{2013}' | '\u{2014}' => folded.push('-'),
            '\u{2026}' => folded.push_str("..."),
            '\u{2022}' => folded.push_str("* "),
            '\u{a0}' => folded.push(' '),
            c if c.is_ascii() => folded.push(c),
            _ => {}
        }
    }

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}
