use std::io::{self, Write};

use serde::Serialize;

use crate::pipeline::CrawlSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &CrawlSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_summary(summary: &CrawlSummary) -> io::Result<()> {
        let mut stdout = io::stdout();
        Self::write_summary(&mut stdout, summary)
    }

    pub fn write_summary<W: Write>(out: &mut W, summary: &CrawlSummary) -> io::Result<()> {
        let elapsed = summary.finished_at - summary.started_at;
        writeln!(
            out,
            "kegg-graph: {} queries, {} seed orthologs, {} requests ({} failed) in {}s",
            summary.seed_queries,
            summary.seed_orthologs,
            summary.fetch_requests(),
            summary.failures(),
            elapsed.num_seconds()
        )?;
        for stage in &summary.stages {
            writeln!(
                out,
                "  {:<26} needed {:>6}  fetched {:>6}  failed {:>4}",
                stage.stage, stage.needed, stage.fetched, stage.failed
            )?;
        }
        writeln!(out, "tables:")?;
        for (table, rows) in &summary.tables {
            writeln!(out, "  {table:<20} {rows:>8}")?;
        }
        Ok(())
    }
}
