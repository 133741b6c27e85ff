/*
    toyboxtool - A Toybox save container parser, verifier and editor
    Copyright (C) 2025 toyboxtool contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! Editable records inside the decompressed payload text.

use {
    crate::{
        error::{Error, Result},
        utils::fmt,
    },
    lazy_static::lazy_static,
    regex::Regex,
    std::ops::Range,
};

pub const NAME_KEY: &str = "AUTHOREDNAME";
pub const DESC_KEY: &str = "AUTHOREDDESC";
pub const SCREENSHOT_KEY: &str = "SCREENSHOT";

pub const TEXT_INPUT_LINES: usize = 10;
pub const CHALLENGE_TITLE_MARKER: &str = "@AR_ChallengeMaker_Title";
pub const CHALLENGE_DESC_MARKER: &str = "@AR_ChallengeMaker_Description";
pub const PROMPT_MARKER: &str = "@AR_InputToy_Prompt";

lazy_static! {
    // "" inside a value is an escaped quote
    static ref QUOTED: Regex = Regex::new(r#""((?:[^"]|"")*)""#).unwrap();
    static ref NAME_FIELD: Regex = Regex::new(r#"AUTHOREDNAME\s*=\s*"((?:[^"]|"")*)""#).unwrap();
    static ref DESC_FIELD: Regex = Regex::new(r#"AUTHOREDDESC\s*=\s*"((?:[^"]|"")*)""#).unwrap();
    static ref SCREENSHOT_FIELD: Regex = Regex::new(r"(?s)SCREENSHOT\s*=\s*\$(.*?)\$").unwrap();
    static ref TEXT_INPUT_MARKERS: Vec<String> = (1..=TEXT_INPUT_LINES)
        .map(|n| format!("@AR_TextInput{n}_Default"))
        .collect();
}

fn field_regex(key: &str) -> Option<&'static Regex> {
    match key {
        NAME_KEY => Some(&*NAME_FIELD),
        DESC_KEY => Some(&*DESC_FIELD),
        _ => None,
    }
}

#[must_use]
pub fn escape_value(value: &str) -> String {
    value.replace('"', "\"\"")
}

#[must_use]
pub fn unescape_value(value: &str) -> String {
    value.replace("\"\"", "\"")
}

/// How the payload bytes were turned into text, so they can be written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

impl TextEncoding {
    #[must_use]
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).ok())
                .collect::<Option<Vec<u8>>>()
                // an edit brought in a char Latin-1 can't hold
                .unwrap_or_else(|| text.as_bytes().to_vec()),
        }
    }
}

/// Decodes payload bytes as UTF-8, falling back to Latin-1. Never fails.
#[must_use]
pub fn decode_text(content: &[u8]) -> (String, TextEncoding) {
    match std::str::from_utf8(content) {
        Ok(s) => (s.to_owned(), TextEncoding::Utf8),
        Err(_) => (content.iter().map(|&b| char::from(b)).collect(), TextEncoding::Latin1),
    }
}

/// Unescaped value of `KEY = "..."`, first occurrence.
#[must_use]
pub fn read_field(text: &str, key: &str) -> Option<String> {
    field_regex(key)?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| unescape_value(m.as_str()))
}

/// Replaces the value of the first `KEY = "..."` with `value`, escaping quotes.
///
/// # Errors
/// `Error::FieldNotFound` if the field is absent.
pub fn replace_field(text: &str, key: &'static str, value: &str) -> Result<String> {
    let span = field_regex(key)
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .ok_or(Error::FieldNotFound(key))?
        .range();
    Ok(splice(text, span, &escape_value(value)))
}

/// Span of the hex blob between `SCREENSHOT = $` and the next `$`.
#[must_use]
pub fn find_screenshot(text: &str) -> Option<Range<usize>> {
    SCREENSHOT_FIELD
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.range())
}

fn splice(text: &str, span: Range<usize>, with: &str) -> String {
    let mut out = String::with_capacity(text.len() - span.len() + with.len());
    out.push_str(&text[..span.start]);
    out.push_str(with);
    out.push_str(&text[span.end..]);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Metadata,
    TextCreator,
    ChallengeMaker,
    InputToy,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Metadata => "Metadata",
            Self::TextCreator => "Text Creator",
            Self::ChallengeMaker => "Challenge Maker",
            Self::InputToy => "Input Toy",
        })
    }
}

/// One editable element of the payload. Line indices point into
/// [`ToyText::lines`] and never overlap between records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToyRecord {
    Metadata { name: String, description: String },
    TextCreatorBlock { id: u32, lines: [usize; TEXT_INPUT_LINES] },
    ChallengeMakerPair { id: u32, title_line: usize, description_line: usize },
    InputToyPrompt { id: u32, line: usize },
}

impl ToyRecord {
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Metadata { .. } => RecordKind::Metadata,
            Self::TextCreatorBlock { .. } => RecordKind::TextCreator,
            Self::ChallengeMakerPair { .. } => RecordKind::ChallengeMaker,
            Self::InputToyPrompt { .. } => RecordKind::InputToy,
        }
    }

    #[must_use]
    pub const fn id(&self) -> u32 {
        match self {
            Self::Metadata { .. } => 1,
            Self::TextCreatorBlock { id, .. }
            | Self::ChallengeMakerPair { id, .. }
            | Self::InputToyPrompt { id, .. } => *id,
        }
    }

    /// `(kind, id)`, the key callers use to remember which records they edited.
    #[must_use]
    pub const fn key(&self) -> (RecordKind, u32) {
        (self.kind(), self.id())
    }

    #[must_use]
    pub fn line_indices(&self) -> Vec<usize> {
        match self {
            Self::Metadata { .. } => Vec::new(),
            Self::TextCreatorBlock { lines, .. } => lines.to_vec(),
            Self::ChallengeMakerPair { title_line, description_line, .. } => vec![*title_line, *description_line],
            Self::InputToyPrompt { line, .. } => vec![*line],
        }
    }
}

/// Payload text split into owned lines, with the records found in it.
#[derive(Debug, Clone)]
pub struct ToyText {
    pub lines: Vec<String>,
    pub records: Vec<ToyRecord>,
    pub encoding: TextEncoding,
}

impl ToyText {
    #[must_use]
    pub fn parse(content: &[u8]) -> Self {
        let (text, encoding) = decode_text(content);
        Self::from_text(&text, encoding)
    }

    fn from_text(text: &str, encoding: TextEncoding) -> Self {
        let lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
        let records = scan(text, &lines);
        Self { lines, records, encoding }
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encoding.encode(&self.text())
    }

    #[must_use]
    pub fn find(&self, kind: RecordKind, id: u32) -> Option<&ToyRecord> {
        self.records.iter().find(|r| r.key() == (kind, id))
    }

    /// Unescaped value of the first quoted string on a line.
    #[must_use]
    pub fn line_value(&self, line: usize) -> Option<String> {
        let line = self.lines.get(line)?;
        QUOTED.captures(line).and_then(|c| c.get(1)).map(|m| unescape_value(m.as_str()))
    }

    /// Current values of a record, in line order.
    #[must_use]
    pub fn values(&self, record: &ToyRecord) -> Vec<String> {
        match record {
            ToyRecord::Metadata { name, description } => vec![name.clone(), description.clone()],
            _ => record
                .line_indices()
                .into_iter()
                .map(|i| self.line_value(i).unwrap_or_default())
                .collect(),
        }
    }

    /// Replaces the first quoted string on `line`, leaving the rest of the
    /// line untouched. Newlines in `value` become spaces.
    ///
    /// # Errors
    /// `Error::Format` if the line does not exist, `Error::FieldNotFound` if it
    /// has no quoted value.
    pub fn set_line_value(&mut self, line: usize, value: &str) -> Result<()> {
        let text = self
            .lines
            .get(line)
            .ok_or_else(|| Error::format(format!("line {line} out of range")))?;
        let span = QUOTED
            .captures(text)
            .and_then(|c| c.get(1))
            .ok_or(Error::FieldNotFound("quoted value"))?
            .range();
        let value = escape_value(&value.replace(['\r', '\n'], " "));
        self.lines[line] = splice(text, span, &value);
        Ok(())
    }

    /// Writes up to ten lines into a text creator block; missing lines are
    /// cleared.
    ///
    /// # Errors
    /// `Error::FieldNotFound` if no such block exists.
    pub fn set_text_block(&mut self, id: u32, text: &[&str]) -> Result<()> {
        let Some(ToyRecord::TextCreatorBlock { lines, .. }) = self.find(RecordKind::TextCreator, id).cloned() else {
            return Err(Error::FieldNotFound("text creator block"));
        };
        for (n, line) in lines.into_iter().enumerate() {
            self.set_line_value(line, text.get(n).copied().unwrap_or_default())?;
        }
        Ok(())
    }

    /// # Errors
    /// `Error::FieldNotFound` if no such challenge exists.
    pub fn set_challenge(&mut self, id: u32, title: &str, description: &str) -> Result<()> {
        let Some(ToyRecord::ChallengeMakerPair { title_line, description_line, .. }) =
            self.find(RecordKind::ChallengeMaker, id).cloned()
        else {
            return Err(Error::FieldNotFound("challenge maker pair"));
        };
        self.set_line_value(title_line, title)?;
        self.set_line_value(description_line, description)
    }

    /// # Errors
    /// `Error::FieldNotFound` if no such prompt exists.
    pub fn set_prompt(&mut self, id: u32, prompt: &str) -> Result<()> {
        let Some(ToyRecord::InputToyPrompt { line, .. }) = self.find(RecordKind::InputToy, id).cloned() else {
            return Err(Error::FieldNotFound("input toy prompt"));
        };
        self.set_line_value(line, prompt)
    }

    /// Sets the authored name and/or description, then rescans since the
    /// values may span lines.
    ///
    /// # Errors
    /// `Error::FieldNotFound` if a key to be set is absent.
    pub fn set_metadata(&mut self, name: Option<&str>, description: Option<&str>) -> Result<()> {
        let mut text = self.text();
        if let Some(name) = name {
            text = replace_field(&text, NAME_KEY, name)?;
        }
        if let Some(description) = description {
            text = replace_field(&text, DESC_KEY, description)?;
        }
        *self = Self::from_text(&text, self.encoding);
        Ok(())
    }
}

fn scan(text: &str, lines: &[String]) -> Vec<ToyRecord> {
    let mut records = Vec::new();

    if let (Some(name), Some(description)) = (read_field(text, NAME_KEY), read_field(text, DESC_KEY)) {
        records.push(ToyRecord::Metadata { name, description });
    }

    let (mut text_ids, mut challenge_ids, mut prompt_ids) = (0, 0, 0);
    let mut i = 0;
    while i < lines.len() {
        if is_text_block(lines, i) {
            text_ids += 1;
            records.push(ToyRecord::TextCreatorBlock {
                id: text_ids,
                lines: std::array::from_fn(|n| i + n),
            });
            i += TEXT_INPUT_LINES;
        } else if lines[i].contains(CHALLENGE_TITLE_MARKER)
            && lines.get(i + 1).is_some_and(|l| l.contains(CHALLENGE_DESC_MARKER))
        {
            challenge_ids += 1;
            records.push(ToyRecord::ChallengeMakerPair {
                id: challenge_ids,
                title_line: i,
                description_line: i + 1,
            });
            i += 2;
        } else if lines[i].contains(PROMPT_MARKER) {
            prompt_ids += 1;
            records.push(ToyRecord::InputToyPrompt { id: prompt_ids, line: i });
            i += 1;
        } else {
            i += 1;
        }
    }
    records
}

fn is_text_block(lines: &[String], start: usize) -> bool {
    lines.len() >= start + TEXT_INPUT_LINES
        && TEXT_INPUT_MARKERS
            .iter()
            .zip(&lines[start..])
            .all(|(marker, line)| line.contains(marker.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> String {
        let mut text = String::from("AUTHOREDNAME = \"Castle\"\nAUTHOREDDESC = \"Say \"\"hi\"\"\"\n");
        text.push_str("Toy {\n");
        for n in 1..=10 {
            text.push_str(&format!("  @AR_TextInput{n}_Default = \"line {n}\" Tag = \"keep\"\n"));
        }
        text.push_str("  @AR_ChallengeMaker_Title = \"Race\"\n");
        text.push_str("  @AR_ChallengeMaker_Description = \"Go fast\"\n");
        text.push_str("  @AR_InputToy_Prompt = \"Press A\"\n");
        text.push_str("}\nSCREENSHOT = $abcd$\n");
        text
    }

    #[test]
    fn finds_all_four_kinds() {
        let toy = ToyText::parse(sample().as_bytes());
        assert_eq!(toy.records.len(), 4);
        assert_eq!(
            toy.records[0],
            ToyRecord::Metadata { name: "Castle".into(), description: "Say \"hi\"".into() }
        );
        assert_eq!(toy.records[1], ToyRecord::TextCreatorBlock { id: 1, lines: std::array::from_fn(|n| 3 + n) });
        assert_eq!(toy.records[2], ToyRecord::ChallengeMakerPair { id: 1, title_line: 13, description_line: 14 });
        assert_eq!(toy.records[3], ToyRecord::InputToyPrompt { id: 1, line: 15 });

        let mut seen: Vec<usize> = toy.records.iter().flat_map(ToyRecord::line_indices).collect();
        let total = seen.len();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), total);
    }

    #[test]
    fn metadata_needs_both_keys() {
        let toy = ToyText::parse(b"AUTHOREDNAME = \"Only name\"\n");
        assert!(toy.records.is_empty());
    }

    #[test]
    fn broken_text_block_is_not_a_record() {
        let mut text = String::new();
        for n in 1..=9 {
            text.push_str(&format!("@AR_TextInput{n}_Default = \"x\"\n"));
        }
        text.push_str("@AR_TextInput3_Default = \"x\"\n");
        let toy = ToyText::parse(text.as_bytes());
        assert!(toy.records.iter().all(|r| r.kind() != RecordKind::TextCreator));
    }

    #[test]
    fn ids_are_per_kind() {
        let text = "@AR_InputToy_Prompt = \"a\"\n@AR_ChallengeMaker_Title = \"t\"\n\
                    @AR_ChallengeMaker_Description = \"d\"\n@AR_InputToy_Prompt = \"b\"\n";
        let toy = ToyText::parse(text.as_bytes());
        let keys: Vec<_> = toy.records.iter().map(ToyRecord::key).collect();
        assert_eq!(
            keys,
            [(RecordKind::InputToy, 1), (RecordKind::ChallengeMaker, 1), (RecordKind::InputToy, 2)]
        );
        assert_eq!(toy.values(&toy.records[2]), ["b"]);
    }

    #[test]
    fn title_without_description_is_skipped() {
        let toy = ToyText::parse(b"@AR_ChallengeMaker_Title = \"t\"\nnothing\n");
        assert!(toy.records.is_empty());
    }

    #[test]
    fn quote_round_trip() {
        let mut toy = ToyText::parse(sample().as_bytes());
        toy.set_prompt(1, "Press \"A\" now").unwrap();
        assert_eq!(toy.lines[15], "  @AR_InputToy_Prompt = \"Press \"\"A\"\" now\"");

        let reparsed = ToyText::parse(&toy.to_bytes());
        let prompt = reparsed.find(RecordKind::InputToy, 1).unwrap();
        assert_eq!(reparsed.values(prompt), ["Press \"A\" now"]);
    }

    #[test]
    fn edit_touches_only_first_quote() {
        let mut toy = ToyText::parse(sample().as_bytes());
        toy.set_text_block(1, &["hello", "world"]).unwrap();
        assert_eq!(toy.lines[3], "  @AR_TextInput1_Default = \"hello\" Tag = \"keep\"");
        assert_eq!(toy.lines[5], "  @AR_TextInput3_Default = \"\" Tag = \"keep\"");
        let block = toy.find(RecordKind::TextCreator, 1).unwrap();
        assert_eq!(toy.values(block)[..3], ["hello", "world", ""]);
    }

    #[test]
    fn challenge_and_metadata_edits() {
        let mut toy = ToyText::parse(sample().as_bytes());
        toy.set_challenge(1, "Lap\nrace", "Win").unwrap();
        assert_eq!(toy.line_value(13).unwrap(), "Lap race");

        toy.set_metadata(Some("New \"Castle\""), None).unwrap();
        assert_eq!(read_field(&toy.text(), NAME_KEY).unwrap(), "New \"Castle\"");
        assert_eq!(read_field(&toy.text(), DESC_KEY).unwrap(), "Say \"hi\"");
        assert_eq!(toy.records.len(), 4);
        assert_eq!(toy.line_value(14).unwrap(), "Win");
    }

    #[test]
    fn missing_record() {
        let mut toy = ToyText::parse(sample().as_bytes());
        assert!(matches!(toy.set_prompt(2, "x"), Err(Error::FieldNotFound(_))));
    }

    #[test]
    fn latin1_fallback() {
        let bytes = b"AUTHOREDNAME = \"Caf\xe9\"\nAUTHOREDDESC = \"\"\n";
        let toy = ToyText::parse(bytes);
        assert_eq!(toy.encoding, TextEncoding::Latin1);
        assert_eq!(
            toy.records[0],
            ToyRecord::Metadata { name: "Caf\u{e9}".into(), description: String::new() }
        );
        assert_eq!(toy.to_bytes(), bytes);
    }

    #[test]
    fn screenshot_span() {
        let text = sample();
        let span = find_screenshot(&text).unwrap();
        assert_eq!(&text[span], "abcd");
        assert!(find_screenshot("SCREENSHOT = nothing").is_none());
    }

    #[test]
    fn replace_missing_field() {
        assert!(matches!(replace_field("x = 1", NAME_KEY, "y"), Err(Error::FieldNotFound(NAME_KEY))));
    }
}
