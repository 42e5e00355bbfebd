use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::annotation::AnnotationTable;
use crate::domain::EntityKind;
use crate::entity::{EntityRecord, EquationStatus};
use crate::error::GraphError;
use crate::fetch::{CancelToken, FetchDriver, FetchSettings};
use crate::kegg::KeggClient;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::store::{GraphStore, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SeedOrthologs,
    FetchOrthologs,
    FetchReactions(usize),
    FetchPathways(usize),
    FetchModules(usize),
    FetchCompounds(EntityKind),
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::SeedOrthologs => write!(f, "SeedOrthologs"),
            Stage::FetchOrthologs => write!(f, "FetchOrthologs"),
            Stage::FetchReactions(pass) => write!(f, "FetchReactions({pass})"),
            Stage::FetchPathways(round) => write!(f, "FetchPathways({round})"),
            Stage::FetchModules(round) => write!(f, "FetchModules({round})"),
            Stage::FetchCompounds(kind) => write!(f, "FetchCompounds({kind})"),
            Stage::Done => write!(f, "Done"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlOptions {
    pub fetch: FetchSettings,
    pub reaction_passes: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            reaction_passes: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub kind: EntityKind,
    pub needed: usize,
    pub fetched: usize,
    pub failed: usize,
    pub rows_written: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub seed_queries: usize,
    pub seed_orthologs: usize,
    pub stages: Vec<StageReport>,
    pub tables: BTreeMap<String, usize>,
}

impl CrawlSummary {
    pub fn fetch_requests(&self) -> usize {
        self.stages.iter().map(|stage| stage.needed).sum()
    }

    pub fn failures(&self) -> usize {
        self.stages.iter().map(|stage| stage.failed).sum()
    }
}

pub fn needed_ids(
    referenced: &BTreeSet<String>,
    linked: &BTreeSet<String>,
    existing: &BTreeSet<String>,
) -> Vec<String> {
    referenced
        .union(linked)
        .filter(|id| !existing.contains(*id))
        .cloned()
        .collect()
}

#[derive(Debug, Default)]
struct Referenced {
    reactions: BTreeSet<String>,
    pathways: BTreeSet<String>,
    modules: BTreeSet<String>,
}

impl Referenced {
    fn collect(&mut self, record: &EntityRecord) {
        match record {
            EntityRecord::Ortholog(ortholog) => {
                self.reactions.extend(ortholog.reactions.iter().cloned())
            }
            EntityRecord::Reaction(reaction) => {
                self.pathways.extend(reaction.pathways.iter().cloned())
            }
            EntityRecord::Pathway(pathway) => {
                self.reactions.extend(pathway.reactions.iter().cloned());
                self.modules.extend(pathway.modules.iter().cloned());
            }
            EntityRecord::Module(module) => self.reactions.extend(module.reactions.iter().cloned()),
            EntityRecord::Compound(_) => {}
        }
    }
}

struct StageOutput {
    report: StageReport,
    referenced: Referenced,
}

pub struct Crawler<C: KeggClient> {
    store: GraphStore,
    client: C,
    options: CrawlOptions,
    cancel: CancelToken,
}

impl<C: KeggClient> Crawler<C> {
    pub fn new(store: GraphStore, client: C, options: CrawlOptions) -> Self {
        Self {
            store,
            client,
            options: CrawlOptions {
                fetch: options.fetch,
                reaction_passes: options.reaction_passes.max(1),
            },
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_store(self) -> GraphStore {
        self.store
    }

    pub fn run(
        &mut self,
        seeds: &AnnotationTable,
        sink: &dyn ProgressSink,
    ) -> Result<CrawlSummary, GraphError> {
        let started_at = Utc::now();
        let mut stages = Vec::new();

        let seed_ids = seeds.ortholog_ids();
        sink.event(ProgressEvent::info(
            Stage::SeedOrthologs,
            format!(
                "There are {} KEGG ids across {} queries in the input",
                seed_ids.len(),
                seeds.query_count()
            ),
        ));
        if seeds.skipped_rows() > 0 {
            sink.event(ProgressEvent::warn(
                Stage::SeedOrthologs,
                format!("Skipped {} short input rows", seeds.skipped_rows()),
            ));
        }
        self.store
            .upsert_query_orthologs(&seeds.query_orthologs())
            .map_err(|err| fail(Stage::SeedOrthologs, err, sink))?;

        let needed = self.plan(
            Stage::FetchOrthologs,
            EntityKind::Ortholog,
            &seed_ids,
            &[Table::QueryOrtholog],
            sink,
        )?;
        let orthologs = self.run_stage(Stage::FetchOrthologs, EntityKind::Ortholog, needed, sink)?;
        stages.push(orthologs.report);

        let needed = self.plan(
            Stage::FetchReactions(1),
            EntityKind::Reaction,
            &orthologs.referenced.reactions,
            &[Table::OrthologReaction],
            sink,
        )?;
        let mut reactions =
            self.run_stage(Stage::FetchReactions(1), EntityKind::Reaction, needed, sink)?;
        stages.push(reactions.report);

        // Pathways and modules named by the last pass are linked but not fetched.
        for pass in 2..=self.options.reaction_passes {
            let round = pass - 1;
            let needed = self.plan(
                Stage::FetchPathways(round),
                EntityKind::Pathway,
                &reactions.referenced.pathways,
                &[Table::PathwayReaction],
                sink,
            )?;
            let pathways =
                self.run_stage(Stage::FetchPathways(round), EntityKind::Pathway, needed, sink)?;
            stages.push(pathways.report);

            let needed = self.plan(
                Stage::FetchModules(round),
                EntityKind::Module,
                &pathways.referenced.modules,
                &[Table::ModulePathway],
                sink,
            )?;
            let modules =
                self.run_stage(Stage::FetchModules(round), EntityKind::Module, needed, sink)?;
            stages.push(modules.report);

            let mut referenced = pathways.referenced.reactions;
            referenced.extend(modules.referenced.reactions);
            let needed = self.plan(
                Stage::FetchReactions(pass),
                EntityKind::Reaction,
                &referenced,
                &[Table::PathwayReaction, Table::ModuleReaction],
                sink,
            )?;
            if needed.is_empty() {
                sink.event(ProgressEvent::info(
                    Stage::FetchReactions(pass),
                    "No further reactions referenced; closure is complete",
                ));
                break;
            }
            reactions =
                self.run_stage(Stage::FetchReactions(pass), EntityKind::Reaction, needed, sink)?;
            stages.push(reactions.report);
        }

        let needed = self.plan(
            Stage::FetchCompounds(EntityKind::Compound),
            EntityKind::Compound,
            &BTreeSet::new(),
            &[Table::ReactionCompound],
            sink,
        )?;
        let (compounds, glycans): (Vec<String>, Vec<String>) = needed
            .into_iter()
            .filter(|id| EntityKind::for_compound_id(id).is_some())
            .partition(|id| EntityKind::for_compound_id(id) == Some(EntityKind::Compound));
        for (kind, ids) in [(EntityKind::Compound, compounds), (EntityKind::Glycan, glycans)] {
            let output = self.run_stage(Stage::FetchCompounds(kind), kind, ids, sink)?;
            stages.push(output.report);
        }

        let mut tables = BTreeMap::new();
        for table in Table::ALL {
            tables.insert(table.name().to_string(), self.store.count(table)?);
        }
        let summary = CrawlSummary {
            started_at,
            finished_at: Utc::now(),
            seed_queries: seeds.query_count(),
            seed_orthologs: seed_ids.len(),
            stages,
            tables,
        };
        sink.event(ProgressEvent::info(
            Stage::Done,
            format!(
                "Crawl finished: {} requests, {} failed",
                summary.fetch_requests(),
                summary.failures()
            ),
        ));
        Ok(summary)
    }

    fn plan(
        &self,
        stage: Stage,
        kind: EntityKind,
        referenced: &BTreeSet<String>,
        links: &[Table],
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, GraphError> {
        let mut linked = BTreeSet::new();
        for table in links {
            linked.extend(self.store.linked_ids(kind, *table)?);
        }
        let existing = self.store.existing_ids(kind)?;
        let needed = needed_ids(referenced, &linked, &existing);
        sink.event(ProgressEvent::info(
            stage,
            format!(
                "{} {kind} ids already stored, {} to download",
                existing.len(),
                needed.len()
            ),
        ));
        Ok(needed)
    }

    fn run_stage(
        &mut self,
        stage: Stage,
        kind: EntityKind,
        needed: Vec<String>,
        sink: &dyn ProgressSink,
    ) -> Result<StageOutput, GraphError> {
        let mut output = StageOutput {
            report: StageReport {
                stage: stage.to_string(),
                kind,
                needed: needed.len(),
                fetched: 0,
                failed: 0,
                rows_written: 0,
            },
            referenced: Referenced::default(),
        };
        if needed.is_empty() {
            return Ok(output);
        }
        sink.event(ProgressEvent::info(
            stage,
            format!("Downloading {} {kind} records", needed.len()),
        ));

        let driver = FetchDriver::new(&self.client, self.options.fetch, self.cancel.clone(), sink);
        for chunk in driver.chunks(stage, kind, &needed) {
            let chunk = chunk.map_err(|err| fail(stage, err, sink))?;
            let mut records = Vec::with_capacity(chunk.results.len());
            for (id, result) in chunk.results {
                match result {
                    Ok(flat) => {
                        let record = EntityRecord::from_record(kind, &id, &flat);
                        report_equation(stage, &record, sink);
                        output.referenced.collect(&record);
                        records.push(record);
                    }
                    Err(err) if !err.is_recoverable() => return Err(fail(stage, err, sink)),
                    Err(err) => {
                        output.report.failed += 1;
                        sink.event(ProgressEvent::warn(
                            stage,
                            format!("Skipping {kind} {id}: {err}"),
                        ));
                    }
                }
            }

            let written = self
                .store
                .upsert_batch(&records)
                .map_err(|err| fail(stage, relabel(stage, err), sink))?;
            output.report.fetched += records.len();
            output.report.rows_written += written;
            sink.event(ProgressEvent::info(
                stage,
                format!(
                    "Inserted {} {kind} records ({written} rows) from chunk {} of {}",
                    records.len(),
                    chunk.index,
                    chunk.total
                ),
            ));
        }
        Ok(output)
    }
}

fn report_equation(stage: Stage, record: &EntityRecord, sink: &dyn ProgressSink) {
    let EntityRecord::Reaction(reaction) = record else {
        return;
    };
    match &reaction.equation_status {
        EquationStatus::Parsed => {}
        EquationStatus::Missing => sink.event(ProgressEvent::warn(
            stage,
            format!("{} has no equation", reaction.id),
        )),
        EquationStatus::Invalid(source) => {
            let err = GraphError::Equation {
                id: reaction.id.clone(),
                source: source.clone(),
            };
            sink.event(ProgressEvent::warn(
                stage,
                format!("{err}: {source}; stored without compound links"),
            ));
        }
    }
}

fn relabel(stage: Stage, err: GraphError) -> GraphError {
    match err {
        GraphError::Persistence { ids, message, .. } => GraphError::Persistence {
            stage: stage.to_string(),
            ids,
            message,
        },
        other => other,
    }
}

fn fail(stage: Stage, err: GraphError, sink: &dyn ProgressSink) -> GraphError {
    sink.event(ProgressEvent::error(stage, err.to_string()));
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn needed_excludes_existing() {
        let needed = needed_ids(
            &set(&["R1", "R2"]),
            &set(&["R2", "R3"]),
            &set(&["R1", "R9"]),
        );
        assert_eq!(needed, vec!["R2", "R3"]);
    }

    #[test]
    fn stage_labels() {
        assert_eq!(Stage::FetchReactions(2).to_string(), "FetchReactions(2)");
        assert_eq!(
            Stage::FetchCompounds(EntityKind::Glycan).to_string(),
            "FetchCompounds(glycan)"
        );
    }
}
