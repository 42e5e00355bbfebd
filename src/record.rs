//! Fixed 12-column label margin; a blank margin continues the field above.
//!
//! ```text
//! NAME        polyphosphate polyphosphohydrolase
//! PATHWAY     rn00190  Oxidative phosphorylation
//!             rn03018  RNA degradation
//! ```

use std::collections::BTreeMap;

pub const LABEL_WIDTH: usize = 12;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatRecord {
    unlabeled: Vec<String>,
    fields: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field<'a> {
    Missing,
    Lines(&'a [String]),
}

impl<'a> Field<'a> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Field::Missing)
    }

    pub fn lines(&self) -> &'a [String] {
        match self {
            Field::Missing => &[],
            Field::Lines(lines) => lines,
        }
    }

    pub fn first(&self) -> Option<&'a str> {
        self.lines().first().map(String::as_str)
    }

    pub fn first_or_empty(&self) -> &'a str {
        self.first().unwrap_or("")
    }
}

impl FlatRecord {
    pub fn field(&self, label: &str) -> Field<'_> {
        match self.fields.get(label) {
            Some(lines) => Field::Lines(lines),
            None => Field::Missing,
        }
    }

    pub fn unlabeled(&self) -> &[String] {
        &self.unlabeled
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn push(&mut self, label: Option<&str>, value: impl Into<String>) {
        match label {
            Some(label) => self
                .fields
                .entry(label.to_string())
                .or_default()
                .push(value.into()),
            None => self.unlabeled.push(value.into()),
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for value in &self.unlabeled {
            push_line(&mut out, "", value);
        }
        for (label, values) in &self.fields {
            for (idx, value) in values.iter().enumerate() {
                let margin = if idx == 0 { label.as_str() } else { "" };
                push_line(&mut out, margin, value);
            }
        }
        out
    }
}

fn push_line(out: &mut String, margin: &str, value: &str) {
    out.push_str(&format!("{margin:<LABEL_WIDTH$}{value}"));
    out.push('\n');
}

pub fn parse_record(text: &str) -> FlatRecord {
    let mut record = FlatRecord::default();
    let mut label: Option<String> = None;

    for line in text.lines() {
        let (margin, value) = split_margin(line);
        let margin = margin.trim_matches(' ');
        if !margin.is_empty() {
            label = Some(margin.to_string());
        }
        record.push(label.as_deref(), value);
    }

    record
}

fn split_margin(line: &str) -> (&str, &str) {
    match line.char_indices().nth(LABEL_WIDTH) {
        Some((offset, _)) => line.split_at(offset),
        None => (line, ""),
    }
}
