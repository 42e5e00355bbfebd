use serde::Serialize;

use crate::domain::{Direction, EntityKind, Side, is_valid_id};
use crate::equation::{EquationError, parse_equation};
use crate::record::FlatRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrthologRecord {
    pub id: String,
    pub name: String,
    pub definition: String,
    pub reactions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionCompound {
    pub compound_id: String,
    pub side: Side,
    pub stoichiometry: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EquationStatus {
    Parsed,
    Missing,
    Invalid(EquationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionRecord {
    pub id: String,
    pub definition: String,
    pub equation: Option<String>,
    pub enzyme: String,
    pub direction: Option<Direction>,
    pub compounds: Vec<ReactionCompound>,
    pub pathways: Vec<String>,
    #[serde(skip)]
    pub equation_status: EquationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathwayRecord {
    pub id: String,
    pub name: String,
    pub class: String,
    pub description: String,
    pub reactions: Vec<String>,
    pub compounds: Vec<String>,
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleRecord {
    pub id: String,
    pub name: String,
    pub class: String,
    pub compounds: Vec<String>,
    pub reactions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompoundRecord {
    pub id: String,
    pub formula: String,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityRecord {
    Ortholog(OrthologRecord),
    Reaction(ReactionRecord),
    Pathway(PathwayRecord),
    Module(ModuleRecord),
    Compound(CompoundRecord),
}

impl EntityRecord {
    pub fn from_record(kind: EntityKind, id: &str, record: &FlatRecord) -> Self {
        match kind {
            EntityKind::Ortholog => EntityRecord::Ortholog(OrthologRecord::from_record(id, record)),
            EntityKind::Reaction => EntityRecord::Reaction(ReactionRecord::from_record(id, record)),
            EntityKind::Pathway => EntityRecord::Pathway(PathwayRecord::from_record(id, record)),
            EntityKind::Module => EntityRecord::Module(ModuleRecord::from_record(id, record)),
            EntityKind::Compound | EntityKind::Glycan => {
                EntityRecord::Compound(CompoundRecord::from_record(kind, id, record))
            }
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EntityRecord::Ortholog(record) => &record.id,
            EntityRecord::Reaction(record) => &record.id,
            EntityRecord::Pathway(record) => &record.id,
            EntityRecord::Module(record) => &record.id,
            EntityRecord::Compound(record) => &record.id,
        }
    }
}

impl OrthologRecord {
    pub fn from_record(id: &str, record: &FlatRecord) -> Self {
        let mut reactions = Vec::new();
        for line in record.field("DBLINKS").lines() {
            if let Some(ids) = line.strip_prefix("RN: ") {
                push_ids(&mut reactions, ids.split_whitespace());
            }
        }
        Self {
            id: id.to_string(),
            name: record.field("NAME").first_or_empty().to_string(),
            definition: record.field("DEFINITION").first_or_empty().to_string(),
            reactions,
        }
    }
}

impl ReactionRecord {
    pub fn from_record(id: &str, record: &FlatRecord) -> Self {
        let equation = record.field("EQUATION").first().map(str::to_string);
        let (direction, compounds, equation_status) = match equation.as_deref() {
            None => (None, Vec::new(), EquationStatus::Missing),
            Some(text) => match parse_equation(text) {
                Ok(parsed) => {
                    let compounds = parsed
                        .terms()
                        .map(|(side, term)| ReactionCompound {
                            compound_id: term.compound_id.clone(),
                            side,
                            stoichiometry: term.stoichiometry,
                        })
                        .collect();
                    (Some(parsed.direction), compounds, EquationStatus::Parsed)
                }
                Err(err) => (None, Vec::new(), EquationStatus::Invalid(err)),
            },
        };

        let mut pathways = Vec::new();
        push_ids(
            &mut pathways,
            record.field("PATHWAY").lines().iter().filter_map(|line| first_token(line)),
        );

        Self {
            id: id.to_string(),
            definition: record.field("DEFINITION").first_or_empty().to_string(),
            equation,
            enzyme: record.field("ENZYME").first_or_empty().to_string(),
            direction,
            compounds,
            pathways,
            equation_status,
        }
    }
}

impl PathwayRecord {
    pub fn from_record(id: &str, record: &FlatRecord) -> Self {
        Self {
            id: id.to_string(),
            name: record.field("NAME").first_or_empty().to_string(),
            class: record.field("CLASS").first_or_empty().to_string(),
            description: record.field("DESCRIPTION").first_or_empty().to_string(),
            reactions: reaction_list(record),
            compounds: leading_ids(record, "COMPOUND"),
            modules: leading_ids(record, "MODULE"),
        }
    }
}

impl ModuleRecord {
    pub fn from_record(id: &str, record: &FlatRecord) -> Self {
        Self {
            id: id.to_string(),
            name: record.field("NAME").first_or_empty().to_string(),
            class: record.field("CLASS").first_or_empty().to_string(),
            compounds: leading_ids(record, "COMPOUND"),
            reactions: reaction_list(record),
        }
    }
}

impl CompoundRecord {
    pub fn from_record(kind: EntityKind, id: &str, record: &FlatRecord) -> Self {
        let formula_label = match kind {
            EntityKind::Glycan => "COMPOSITION",
            _ => "FORMULA",
        };
        let names = record
            .field("NAME")
            .lines()
            .iter()
            .map(|name| name.replace(';', "").trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        Self {
            id: id.to_string(),
            formula: record.field(formula_label).first_or_empty().to_string(),
            names,
        }
    }
}

fn first_token(line: &str) -> Option<&str> {
    line.split_whitespace().next()
}

fn leading_ids(record: &FlatRecord, label: &str) -> Vec<String> {
    let mut ids = Vec::new();
    push_ids(
        &mut ids,
        record.field(label).lines().iter().filter_map(|line| first_token(line)),
    );
    ids
}

// REACTION lines start with one or more ids joined by `,` (or `+` for complexes).
fn reaction_list(record: &FlatRecord) -> Vec<String> {
    let mut ids = Vec::new();
    for line in record.field("REACTION").lines() {
        if let Some(token) = first_token(line) {
            push_ids(&mut ids, token.split([',', '+']));
        }
    }
    ids
}

fn push_ids<'a>(out: &mut Vec<String>, ids: impl Iterator<Item = &'a str>) {
    for id in ids {
        let id = id.trim();
        if is_valid_id(id) && !out.iter().any(|existing| existing == id) {
            out.push(id.to_string());
        }
    }
}
