use std::collections::BTreeSet;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use tempfile::TempDir;

use kegg_graph::domain::{Direction, EntityKind, Side};
use kegg_graph::entity::{
    CompoundRecord, EntityRecord, EquationStatus, OrthologRecord, PathwayRecord, ReactionCompound,
    ReactionRecord,
};
use kegg_graph::error::GraphError;
use kegg_graph::store::{GraphStore, Table};

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn ortholog(id: &str, name: &str, reactions: &[&str]) -> EntityRecord {
    EntityRecord::Ortholog(OrthologRecord {
        id: id.to_string(),
        name: name.to_string(),
        definition: String::new(),
        reactions: ids(reactions),
    })
}

fn reaction(id: &str, compounds: &[(&str, Side, u32)], pathways: &[&str]) -> EntityRecord {
    EntityRecord::Reaction(ReactionRecord {
        id: id.to_string(),
        definition: String::new(),
        equation: Some("stub".to_string()),
        enzyme: String::new(),
        direction: Some(Direction::ForwardOnly),
        compounds: compounds
            .iter()
            .map(|(compound_id, side, stoichiometry)| ReactionCompound {
                compound_id: compound_id.to_string(),
                side: *side,
                stoichiometry: *stoichiometry,
            })
            .collect(),
        pathways: ids(pathways),
        equation_status: EquationStatus::Parsed,
    })
}

fn pathway(id: &str, reactions: &[&str]) -> EntityRecord {
    EntityRecord::Pathway(PathwayRecord {
        id: id.to_string(),
        name: format!("{id} name"),
        class: String::new(),
        description: String::new(),
        reactions: ids(reactions),
        compounds: Vec::new(),
        modules: Vec::new(),
    })
}

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn later_upsert_replaces_the_row() {
    let mut store = GraphStore::open_in_memory().unwrap();
    store.upsert_batch(&[ortholog("K1", "first", &[])]).unwrap();
    store.upsert_batch(&[ortholog("K1", "second", &[])]).unwrap();

    assert_eq!(store.count(Table::Ortholog).unwrap(), 1);
    let name: String = store
        .connection()
        .query_row("SELECT name FROM ortholog WHERE ortholog_id = 'K1'", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(name, "second");
}

#[test]
fn repeated_batches_do_not_duplicate_links() {
    let mut store = GraphStore::open_in_memory().unwrap();
    let batch = [
        ortholog("K1", "k1", &["R1", "R2"]),
        ortholog("K2", "k2", &["R2"]),
    ];
    store.upsert_batch(&batch).unwrap();
    store.upsert_batch(&batch).unwrap();

    assert_eq!(store.count(Table::Ortholog).unwrap(), 2);
    assert_eq!(store.count(Table::OrthologReaction).unwrap(), 3);
    assert_eq!(
        store
            .linked_ids(EntityKind::Reaction, Table::OrthologReaction)
            .unwrap(),
        set(&["R1", "R2"])
    );
}

#[test]
fn failed_batch_leaves_no_rows() {
    let mut store = GraphStore::open_in_memory().unwrap();
    let err = store
        .upsert_batch(&[
            reaction("R1", &[("C1", Side::Left, 1)], &[]),
            reaction("R2", &[("C2", Side::Left, 0)], &[]),
        ])
        .unwrap_err();

    assert_matches!(
        &err,
        GraphError::Persistence { stage, ids, .. }
            if stage == "reaction" && ids == &vec!["R1".to_string(), "R2".to_string()]
    );
    assert_eq!(store.count(Table::Reaction).unwrap(), 0);
    assert_eq!(store.count(Table::ReactionCompound).unwrap(), 0);
}

#[test]
fn refetched_reaction_replaces_its_compounds_but_keeps_pathway_links() {
    let mut store = GraphStore::open_in_memory().unwrap();
    store.upsert_batch(&[pathway("P1", &["R1"])]).unwrap();
    store
        .upsert_batch(&[reaction(
            "R1",
            &[("C1", Side::Left, 2), ("C2", Side::Right, 1)],
            &["P2"],
        )])
        .unwrap();
    store
        .upsert_batch(&[reaction("R1", &[("C3", Side::Right, 1)], &[])])
        .unwrap();

    assert_eq!(
        store
            .linked_ids(EntityKind::Compound, Table::ReactionCompound)
            .unwrap(),
        set(&["C3"])
    );
    assert_eq!(
        store
            .linked_ids(EntityKind::Pathway, Table::PathwayReaction)
            .unwrap(),
        set(&["P1", "P2"])
    );
}

#[test]
fn compound_appears_once_per_side() {
    let mut store = GraphStore::open_in_memory().unwrap();
    store
        .upsert_batch(&[reaction(
            "R1",
            &[("C1", Side::Left, 1), ("C1", Side::Right, 1)],
            &[],
        )])
        .unwrap();
    assert_eq!(store.count(Table::ReactionCompound).unwrap(), 2);
}

#[test]
fn glycans_share_the_compound_table() {
    let mut store = GraphStore::open_in_memory().unwrap();
    store
        .upsert_batch(&[
            EntityRecord::Compound(CompoundRecord {
                id: "C00001".to_string(),
                formula: "H2O".to_string(),
                names: ids(&["H2O", "Water"]),
            }),
            EntityRecord::Compound(CompoundRecord {
                id: "G00001".to_string(),
                formula: "(GlcNAc)1".to_string(),
                names: Vec::new(),
            }),
        ])
        .unwrap();

    assert_eq!(
        store.existing_ids(EntityKind::Glycan).unwrap(),
        set(&["C00001", "G00001"])
    );
    assert_eq!(store.count(Table::CompoundName).unwrap(), 2);
}

#[test]
fn query_links_are_idempotent() {
    let mut store = GraphStore::open_in_memory().unwrap();
    let pairs = vec![
        ("gene1".to_string(), "K1".to_string()),
        ("gene2".to_string(), "K1".to_string()),
    ];
    store.upsert_query_orthologs(&pairs).unwrap();
    store.upsert_query_orthologs(&pairs).unwrap();

    assert_eq!(store.count(Table::QueryOrtholog).unwrap(), 2);
    assert_eq!(
        store
            .linked_ids(EntityKind::Ortholog, Table::QueryOrtholog)
            .unwrap(),
        set(&["K1"])
    );
}

#[test]
fn reopening_a_database_keeps_its_rows() {
    let dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("nested").join("kegg.db")).unwrap();

    {
        let mut store = GraphStore::open(&path).unwrap();
        store
            .upsert_batch(&[ortholog("K1", "k1", &["R1"])])
            .unwrap();
    }

    let store = GraphStore::open(&path).unwrap();
    assert_eq!(store.existing_ids(EntityKind::Ortholog).unwrap(), set(&["K1"]));
    assert_eq!(store.count(Table::OrthologReaction).unwrap(), 1);
}
