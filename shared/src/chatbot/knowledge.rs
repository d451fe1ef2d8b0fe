//! Keyword-scored FAQ matching

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: i64,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Higher wins when scores tie
    #[serde(default)]
    pub priority: i32,
    pub is_active: bool,
}

/// Lowercase, fold full-width ASCII to half-width and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let folded = text.chars().map(|c| match c {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    });
    let lowered: String = folded.flat_map(char::to_lowercase).collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone)]
struct Prepared {
    entry: KnowledgeEntry,
    question: String,
    keywords: Vec<String>,
}

/// Active knowledge entries with their normalized keywords
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: Vec<Prepared>,
}

impl KnowledgeBase {
    pub fn new(entries: impl IntoIterator<Item = KnowledgeEntry>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|e| e.is_active)
            .map(|entry| {
                let mut keywords: Vec<String> = entry
                    .keywords
                    .iter()
                    .map(|k| normalize(k))
                    .filter(|k| !k.is_empty())
                    .collect();
                keywords.sort();
                keywords.dedup();
                Prepared {
                    question: normalize(&entry.question),
                    keywords,
                    entry,
                }
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn score(prepared: &Prepared, text: &str) -> usize {
        let hits = prepared
            .keywords
            .iter()
            .filter(|k| text.contains(k.as_str()))
            .count();
        let whole = !prepared.question.is_empty() && text.contains(prepared.question.as_str());
        hits + usize::from(whole)
    }

    /// Best entry for `text`: most keyword hits (+1 when the whole question
    /// appears), then higher priority, then lower id. `None` when nothing scores.
    pub fn best_match(&self, text: &str) -> Option<&KnowledgeEntry> {
        let text = normalize(text);
        if text.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .map(|p| (Self::score(p, &text), p))
            .filter(|(score, _)| *score > 0)
            .max_by(|(sa, a), (sb, b)| {
                sa.cmp(sb)
                    .then(a.entry.priority.cmp(&b.entry.priority))
                    .then(b.entry.id.cmp(&a.entry.id))
            })
            .map(|(_, p)| &p.entry)
    }

    /// Answer for `text`, or the fallback reply
    pub fn reply_for<'a>(&'a self, text: &str, fallback: &'a str) -> &'a str {
        self.best_match(text)
            .map(|e| e.answer.as_str())
            .unwrap_or(fallback)
    }
}
