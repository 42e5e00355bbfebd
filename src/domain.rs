use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Ortholog,
    Reaction,
    Pathway,
    Module,
    Compound,
    Glycan,
}

impl EntityKind {
    pub fn api_code(self) -> &'static str {
        match self {
            EntityKind::Ortholog => "ko",
            EntityKind::Reaction => "rn",
            EntityKind::Pathway => "path",
            EntityKind::Module => "md",
            EntityKind::Compound => "cpd",
            EntityKind::Glycan => "gl",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Ortholog => "ortholog",
            EntityKind::Reaction => "reaction",
            EntityKind::Pathway => "pathway",
            EntityKind::Module => "module",
            EntityKind::Compound => "compound",
            EntityKind::Glycan => "glycan",
        }
    }

    pub fn for_compound_id(id: &str) -> Option<Self> {
        match id.chars().next() {
            Some('C') => Some(EntityKind::Compound),
            Some('G') => Some(EntityKind::Glycan),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for EntityKind {
    type Err = GraphError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ko" | "ortholog" | "orthology" => Ok(EntityKind::Ortholog),
            "rn" | "reaction" => Ok(EntityKind::Reaction),
            "path" | "pathway" => Ok(EntityKind::Pathway),
            "md" | "module" => Ok(EntityKind::Module),
            "cpd" | "compound" => Ok(EntityKind::Compound),
            "gl" | "glycan" => Ok(EntityKind::Glycan),
            _ => Err(GraphError::InvalidKind(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Reversible,
    ForwardOnly,
    BackwardOnly,
    Unknown,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Reversible => "reversible",
            Direction::ForwardOnly => "forward-only",
            Direction::BackwardOnly => "backward-only",
            Direction::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "L",
            Side::Right => "R",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntrySpecifier {
    pub kind: EntityKind,
    pub id: String,
}

impl fmt::Display for EntrySpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.api_code(), self.id)
    }
}

impl FromStr for EntrySpecifier {
    type Err = GraphError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (kind, id) = trimmed
            .split_once(':')
            .ok_or_else(|| GraphError::InvalidId(value.to_string()))?;
        let kind: EntityKind = kind.parse()?;
        if !is_valid_id(id) {
            return Err(GraphError::InvalidId(value.to_string()));
        }
        Ok(Self {
            kind,
            id: id.to_string(),
        })
    }
}

pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.')
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_entry_specifier() {
        let entry: EntrySpecifier = "rn:R00001".parse().unwrap();
        assert_eq!(entry.kind, EntityKind::Reaction);
        assert_eq!(entry.id, "R00001");
        assert_eq!(entry.to_string(), "rn:R00001");
    }

    #[test]
    fn parse_entry_specifier_invalid() {
        assert_matches!(
            "R00001".parse::<EntrySpecifier>(),
            Err(GraphError::InvalidId(_))
        );
        assert_matches!(
            "xx:R00001".parse::<EntrySpecifier>(),
            Err(GraphError::InvalidKind(_))
        );
        assert_matches!(
            "rn:R0 001".parse::<EntrySpecifier>(),
            Err(GraphError::InvalidId(_))
        );
    }

    #[test]
    fn compound_kind_by_prefix() {
        assert_eq!(
            EntityKind::for_compound_id("C00031"),
            Some(EntityKind::Compound)
        );
        assert_eq!(
            EntityKind::for_compound_id("G00001"),
            Some(EntityKind::Glycan)
        );
        assert_eq!(EntityKind::for_compound_id("D00001"), None);
    }
}
