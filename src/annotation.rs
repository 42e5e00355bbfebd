use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::domain::is_valid_id;
use crate::error::GraphError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationColumns {
    pub preamble_lines: usize,
    pub query: String,
    pub orthologs: String,
}

impl Default for AnnotationColumns {
    fn default() -> Self {
        Self {
            preamble_lines: 3,
            query: "#query_name".to_string(),
            orthologs: "KEGG_KOs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationTable {
    queries: BTreeMap<String, BTreeSet<String>>,
    skipped_rows: usize,
}

impl AnnotationTable {
    pub fn open(path: &Path, columns: &AnnotationColumns) -> Result<Self, GraphError> {
        let file = File::open(path).map_err(|err| {
            GraphError::InvalidInput(format!("cannot open {}: {err}", path.display()))
        })?;
        if path.extension().is_some_and(|ext| ext == "gz") {
            Self::from_reader(BufReader::new(MultiGzDecoder::new(file)), columns)
        } else {
            Self::from_reader(BufReader::new(file), columns)
        }
    }

    pub fn from_reader<R: BufRead>(reader: R, columns: &AnnotationColumns) -> Result<Self, GraphError> {
        let mut lines = reader.lines().skip(columns.preamble_lines);
        let header = match lines.next() {
            Some(line) => line.map_err(|err| GraphError::InvalidInput(err.to_string()))?,
            None => return Err(GraphError::InvalidInput("missing header row".to_string())),
        };
        let header: Vec<&str> = header.trim_end_matches('\r').split('\t').collect();
        let position = |name: &str| {
            header
                .iter()
                .position(|column| *column == name)
                .ok_or_else(|| GraphError::InvalidInput(format!("missing column {name}")))
        };
        let query_idx = position(&columns.query)?;
        let orthologs_idx = position(&columns.orthologs)?;

        let mut table = AnnotationTable::default();
        for line in lines {
            let line = line.map_err(|err| GraphError::InvalidInput(err.to_string()))?;
            let line = line.trim_end_matches('\r');
            if line.starts_with("##") {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < header.len() {
                table.skipped_rows += 1;
                continue;
            }
            let orthologs = table
                .queries
                .entry(fields[query_idx].to_string())
                .or_default();
            orthologs.extend(parse_ortholog_list(fields[orthologs_idx]));
        }
        Ok(table)
    }

    pub fn query_orthologs(&self) -> Vec<(String, String)> {
        self.queries
            .iter()
            .flat_map(|(query, orthologs)| {
                orthologs
                    .iter()
                    .map(move |ortholog| (query.clone(), ortholog.clone()))
            })
            .collect()
    }

    pub fn ortholog_ids(&self) -> BTreeSet<String> {
        self.queries.values().flatten().cloned().collect()
    }

    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

fn parse_ortholog_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(|entry| entry.trim())
        .map(|entry| entry.strip_prefix("ko:").unwrap_or(entry))
        .filter(|entry| *entry != "-" && is_valid_id(entry))
        .map(str::to_string)
}
