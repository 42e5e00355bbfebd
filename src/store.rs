use std::collections::BTreeSet;
use std::fs;

use camino::Utf8Path;
use rusqlite::{Connection, Transaction, params};

use crate::domain::EntityKind;
use crate::entity::{
    CompoundRecord, EntityRecord, ModuleRecord, OrthologRecord, PathwayRecord, ReactionRecord,
};
use crate::error::GraphError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Ortholog,
    Reaction,
    Compound,
    CompoundName,
    Pathway,
    Module,
    QueryOrtholog,
    OrthologReaction,
    ReactionCompound,
    PathwayReaction,
    PathwayCompound,
    ModulePathway,
    ModuleCompound,
    ModuleReaction,
}

impl Table {
    pub const ALL: [Table; 14] = [
        Table::Ortholog,
        Table::Reaction,
        Table::Compound,
        Table::CompoundName,
        Table::Pathway,
        Table::Module,
        Table::QueryOrtholog,
        Table::OrthologReaction,
        Table::ReactionCompound,
        Table::PathwayReaction,
        Table::PathwayCompound,
        Table::ModulePathway,
        Table::ModuleCompound,
        Table::ModuleReaction,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Ortholog => "ortholog",
            Table::Reaction => "reaction",
            Table::Compound => "compound",
            Table::CompoundName => "compound_name",
            Table::Pathway => "pathway",
            Table::Module => "module",
            Table::QueryOrtholog => "query_ortholog",
            Table::OrthologReaction => "ortholog_reaction",
            Table::ReactionCompound => "reaction_compound",
            Table::PathwayReaction => "pathway_reaction",
            Table::PathwayCompound => "pathway_compound",
            Table::ModulePathway => "module_pathway",
            Table::ModuleCompound => "module_compound",
            Table::ModuleReaction => "module_reaction",
        }
    }

    fn id_columns(self) -> &'static [&'static str] {
        match self {
            Table::Ortholog => &["ortholog_id"],
            Table::Reaction => &["reaction_id"],
            Table::Compound | Table::CompoundName => &["compound_id"],
            Table::Pathway => &["pathway_id"],
            Table::Module => &["module_id"],
            Table::QueryOrtholog => &["query_id", "ortholog_id"],
            Table::OrthologReaction => &["ortholog_id", "reaction_id"],
            Table::ReactionCompound => &["reaction_id", "compound_id"],
            Table::PathwayReaction => &["pathway_id", "reaction_id"],
            Table::PathwayCompound => &["pathway_id", "compound_id"],
            Table::ModulePathway => &["module_id", "pathway_id"],
            Table::ModuleCompound => &["module_id", "compound_id"],
            Table::ModuleReaction => &["module_id", "reaction_id"],
        }
    }

    pub fn primary(kind: EntityKind) -> Table {
        match kind {
            EntityKind::Ortholog => Table::Ortholog,
            EntityKind::Reaction => Table::Reaction,
            EntityKind::Pathway => Table::Pathway,
            EntityKind::Module => Table::Module,
            EntityKind::Compound | EntityKind::Glycan => Table::Compound,
        }
    }
}

fn id_column(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Ortholog => "ortholog_id",
        EntityKind::Reaction => "reaction_id",
        EntityKind::Pathway => "pathway_id",
        EntityKind::Module => "module_id",
        EntityKind::Compound | EntityKind::Glycan => "compound_id",
    }
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS ortholog (
        ortholog_id TEXT PRIMARY KEY,
        name TEXT,
        definition TEXT
    );

    CREATE TABLE IF NOT EXISTS reaction (
        reaction_id TEXT PRIMARY KEY,
        definition TEXT,
        equation TEXT,
        enzyme TEXT,
        direction TEXT CHECK (
            direction IN ('reversible', 'forward-only', 'backward-only', 'unknown')
        )
    );

    CREATE TABLE IF NOT EXISTS compound (
        compound_id TEXT PRIMARY KEY,
        formula TEXT
    );

    CREATE TABLE IF NOT EXISTS compound_name (
        compound_id TEXT NOT NULL,
        name TEXT NOT NULL,
        UNIQUE (compound_id, name)
    );

    CREATE TABLE IF NOT EXISTS pathway (
        pathway_id TEXT PRIMARY KEY,
        name TEXT,
        class TEXT,
        description TEXT
    );

    CREATE TABLE IF NOT EXISTS module (
        module_id TEXT PRIMARY KEY,
        name TEXT,
        class TEXT
    );

    CREATE TABLE IF NOT EXISTS query_ortholog (
        query_id TEXT NOT NULL,
        ortholog_id TEXT NOT NULL,
        UNIQUE (query_id, ortholog_id)
    );
    CREATE INDEX IF NOT EXISTS idx_query_ortholog_ortholog ON query_ortholog(ortholog_id);

    CREATE TABLE IF NOT EXISTS ortholog_reaction (
        ortholog_id TEXT NOT NULL,
        reaction_id TEXT NOT NULL,
        UNIQUE (ortholog_id, reaction_id)
    );
    CREATE INDEX IF NOT EXISTS idx_ortholog_reaction_reaction ON ortholog_reaction(reaction_id);

    CREATE TABLE IF NOT EXISTS reaction_compound (
        reaction_id TEXT NOT NULL,
        compound_id TEXT NOT NULL,
        side TEXT NOT NULL CHECK (side IN ('L', 'R')),
        stoichiometry INTEGER NOT NULL DEFAULT 1 CHECK (stoichiometry > 0),
        UNIQUE (reaction_id, compound_id, side)
    );
    CREATE INDEX IF NOT EXISTS idx_reaction_compound_compound ON reaction_compound(compound_id);

    CREATE TABLE IF NOT EXISTS pathway_reaction (
        pathway_id TEXT NOT NULL,
        reaction_id TEXT NOT NULL,
        UNIQUE (pathway_id, reaction_id)
    );
    CREATE INDEX IF NOT EXISTS idx_pathway_reaction_reaction ON pathway_reaction(reaction_id);

    CREATE TABLE IF NOT EXISTS pathway_compound (
        pathway_id TEXT NOT NULL,
        compound_id TEXT NOT NULL,
        UNIQUE (pathway_id, compound_id)
    );

    CREATE TABLE IF NOT EXISTS module_pathway (
        module_id TEXT NOT NULL,
        pathway_id TEXT NOT NULL,
        UNIQUE (module_id, pathway_id)
    );
    CREATE INDEX IF NOT EXISTS idx_module_pathway_pathway ON module_pathway(pathway_id);

    CREATE TABLE IF NOT EXISTS module_compound (
        module_id TEXT NOT NULL,
        compound_id TEXT NOT NULL,
        UNIQUE (module_id, compound_id)
    );

    CREATE TABLE IF NOT EXISTS module_reaction (
        module_id TEXT NOT NULL,
        reaction_id TEXT NOT NULL,
        UNIQUE (module_id, reaction_id)
    );
    CREATE INDEX IF NOT EXISTS idx_module_reaction_reaction ON module_reaction(reaction_id);
"#;

pub struct GraphStore {
    conn: Connection,
}

impl GraphStore {
    pub fn open(path: &Utf8Path) -> Result<Self, GraphError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| GraphError::Filesystem(err.to_string()))?;
        }
        let conn = Connection::open(path.as_std_path())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, GraphError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, GraphError> {
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn init_schema(&self) -> Result<(), GraphError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn existing_ids(&self, kind: EntityKind) -> Result<BTreeSet<String>, GraphError> {
        let table = Table::primary(kind);
        self.select_ids(&format!(
            "SELECT {} FROM {}",
            id_column(kind),
            table.name()
        ))
    }

    pub fn linked_ids(&self, kind: EntityKind, table: Table) -> Result<BTreeSet<String>, GraphError> {
        let column = id_column(kind);
        if !table.id_columns().contains(&column) {
            return Err(GraphError::InvalidLink {
                table: table.name(),
                column,
            });
        }
        self.select_ids(&format!("SELECT DISTINCT {column} FROM {}", table.name()))
    }

    fn select_ids(&self, sql: &str) -> Result<BTreeSet<String>, GraphError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = BTreeSet::new();
        for id in rows {
            ids.insert(id?);
        }
        Ok(ids)
    }

    pub fn count(&self, table: Table) -> Result<usize, GraphError> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table.name()), [], |row| {
                    row.get(0)
                })?;
        Ok(count as usize)
    }

    pub fn upsert_query_orthologs(&mut self, pairs: &[(String, String)]) -> Result<usize, GraphError> {
        let ids = pairs.iter().map(|(query, _)| query.clone()).collect::<Vec<_>>();
        let result = (|| -> Result<usize, rusqlite::Error> {
            let tx = self.conn.transaction()?;
            let mut written = 0;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT OR REPLACE INTO query_ortholog (query_id, ortholog_id) VALUES (?1, ?2)",
                )?;
                for (query, ortholog) in pairs {
                    written += stmt.execute(params![query, ortholog])?;
                }
            }
            tx.commit()?;
            Ok(written)
        })();
        result.map_err(|err| persistence_error("query_ortholog", ids, err))
    }

    pub fn upsert_batch(&mut self, records: &[EntityRecord]) -> Result<usize, GraphError> {
        let result = (|| -> Result<usize, rusqlite::Error> {
            let tx = self.conn.transaction()?;
            let mut written = 0;
            for record in records {
                written += match record {
                    EntityRecord::Ortholog(ortholog) => write_ortholog(&tx, ortholog)?,
                    EntityRecord::Reaction(reaction) => write_reaction(&tx, reaction)?,
                    EntityRecord::Pathway(pathway) => write_pathway(&tx, pathway)?,
                    EntityRecord::Module(module) => write_module(&tx, module)?,
                    EntityRecord::Compound(compound) => write_compound(&tx, compound)?,
                };
            }
            tx.commit()?;
            Ok(written)
        })();
        result.map_err(|err| {
            let stage = match records.first() {
                Some(EntityRecord::Ortholog(_)) => "ortholog",
                Some(EntityRecord::Reaction(_)) => "reaction",
                Some(EntityRecord::Pathway(_)) => "pathway",
                Some(EntityRecord::Module(_)) => "module",
                Some(EntityRecord::Compound(_)) => "compound",
                None => "batch",
            };
            let ids = records.iter().map(|record| record.id().to_string()).collect();
            persistence_error(stage, ids, err)
        })
    }
}

fn persistence_error(stage: &str, ids: Vec<String>, err: rusqlite::Error) -> GraphError {
    GraphError::Persistence {
        stage: stage.to_string(),
        ids,
        message: err.to_string(),
    }
}

fn write_ortholog(tx: &Transaction<'_>, ortholog: &OrthologRecord) -> rusqlite::Result<usize> {
    let mut written = tx
        .prepare_cached(
            "INSERT OR REPLACE INTO ortholog (ortholog_id, name, definition) VALUES (?1, ?2, ?3)",
        )?
        .execute(params![ortholog.id, ortholog.name, ortholog.definition])?;
    tx.prepare_cached("DELETE FROM ortholog_reaction WHERE ortholog_id = ?1")?
        .execute(params![ortholog.id])?;
    written += insert_pairs(
        tx,
        "INSERT OR REPLACE INTO ortholog_reaction (ortholog_id, reaction_id) VALUES (?1, ?2)",
        &ortholog.id,
        &ortholog.reactions,
    )?;
    Ok(written)
}

fn write_reaction(tx: &Transaction<'_>, reaction: &ReactionRecord) -> rusqlite::Result<usize> {
    let mut written = tx
        .prepare_cached(
            "INSERT OR REPLACE INTO reaction (reaction_id, definition, equation, enzyme, direction)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?
        .execute(params![
            reaction.id,
            reaction.definition,
            reaction.equation,
            reaction.enzyme,
            reaction.direction.map(|direction| direction.as_str()),
        ])?;

    tx.prepare_cached("DELETE FROM reaction_compound WHERE reaction_id = ?1")?
        .execute(params![reaction.id])?;
    let mut stmt = tx.prepare_cached(
        "INSERT OR REPLACE INTO reaction_compound (reaction_id, compound_id, side, stoichiometry)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for compound in &reaction.compounds {
        written += stmt.execute(params![
            reaction.id,
            compound.compound_id,
            compound.side.as_str(),
            compound.stoichiometry,
        ])?;
    }

    // Pathway links are shared with pathway records, so they are only added.
    let mut stmt = tx.prepare_cached(
        "INSERT OR REPLACE INTO pathway_reaction (pathway_id, reaction_id) VALUES (?1, ?2)",
    )?;
    for pathway in &reaction.pathways {
        written += stmt.execute(params![pathway, reaction.id])?;
    }
    Ok(written)
}

fn write_pathway(tx: &Transaction<'_>, pathway: &PathwayRecord) -> rusqlite::Result<usize> {
    let mut written = tx
        .prepare_cached(
            "INSERT OR REPLACE INTO pathway (pathway_id, name, class, description)
             VALUES (?1, ?2, ?3, ?4)",
        )?
        .execute(params![
            pathway.id,
            pathway.name,
            pathway.class,
            pathway.description
        ])?;
    tx.prepare_cached("DELETE FROM pathway_compound WHERE pathway_id = ?1")?
        .execute(params![pathway.id])?;
    tx.prepare_cached("DELETE FROM module_pathway WHERE pathway_id = ?1")?
        .execute(params![pathway.id])?;

    written += insert_pairs(
        tx,
        "INSERT OR REPLACE INTO pathway_reaction (pathway_id, reaction_id) VALUES (?1, ?2)",
        &pathway.id,
        &pathway.reactions,
    )?;
    written += insert_pairs(
        tx,
        "INSERT OR REPLACE INTO pathway_compound (pathway_id, compound_id) VALUES (?1, ?2)",
        &pathway.id,
        &pathway.compounds,
    )?;
    written += insert_pairs(
        tx,
        "INSERT OR REPLACE INTO module_pathway (pathway_id, module_id) VALUES (?1, ?2)",
        &pathway.id,
        &pathway.modules,
    )?;
    Ok(written)
}

fn write_module(tx: &Transaction<'_>, module: &ModuleRecord) -> rusqlite::Result<usize> {
    let mut written = tx
        .prepare_cached("INSERT OR REPLACE INTO module (module_id, name, class) VALUES (?1, ?2, ?3)")?
        .execute(params![module.id, module.name, module.class])?;
    tx.prepare_cached("DELETE FROM module_compound WHERE module_id = ?1")?
        .execute(params![module.id])?;
    tx.prepare_cached("DELETE FROM module_reaction WHERE module_id = ?1")?
        .execute(params![module.id])?;

    written += insert_pairs(
        tx,
        "INSERT OR REPLACE INTO module_compound (module_id, compound_id) VALUES (?1, ?2)",
        &module.id,
        &module.compounds,
    )?;
    written += insert_pairs(
        tx,
        "INSERT OR REPLACE INTO module_reaction (module_id, reaction_id) VALUES (?1, ?2)",
        &module.id,
        &module.reactions,
    )?;
    Ok(written)
}

fn write_compound(tx: &Transaction<'_>, compound: &CompoundRecord) -> rusqlite::Result<usize> {
    let mut written = tx
        .prepare_cached("INSERT OR REPLACE INTO compound (compound_id, formula) VALUES (?1, ?2)")?
        .execute(params![compound.id, compound.formula])?;
    tx.prepare_cached("DELETE FROM compound_name WHERE compound_id = ?1")?
        .execute(params![compound.id])?;
    written += insert_pairs(
        tx,
        "INSERT OR REPLACE INTO compound_name (compound_id, name) VALUES (?1, ?2)",
        &compound.id,
        &compound.names,
    )?;
    Ok(written)
}

fn insert_pairs(
    tx: &Transaction<'_>,
    sql: &str,
    owner: &str,
    targets: &[String],
) -> rusqlite::Result<usize> {
    let mut stmt = tx.prepare_cached(sql)?;
    let mut written = 0;
    for target in targets {
        written += stmt.execute(params![owner, target])?;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn schema_creation_is_repeatable() {
        let store = GraphStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        for table in Table::ALL {
            assert_eq!(store.count(table).unwrap(), 0, "{}", table.name());
        }
    }

    #[test]
    fn linked_ids_rejects_tables_without_the_column() {
        let store = GraphStore::open_in_memory().unwrap();
        assert_matches!(
            store.linked_ids(EntityKind::Compound, Table::ModulePathway),
            Err(GraphError::InvalidLink { table: "module_pathway", column: "compound_id" })
        );
    }
}
