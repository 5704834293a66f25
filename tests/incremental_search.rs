//! End-to-end tests: graph -> projector -> store -> query pipeline,
//! including incremental edits and the scheduler.

use oxi::engine::{EngineConfig, SearchEngine};
use oxi::ontology::{
    AnnotationValue, Axiom, AxiomChange, ClassExpression, Entity, EntityKind, Iri, MemoryOntology,
};
use oxi::progress::NullProgress;
use oxi::query::{compile, parse_keywords, KeywordTree};
use oxi::scheduler::{Checkpoint, SearchScheduler};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

const NS: &str = "http://example.org/animals#";
const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";

fn iri(name: &str) -> Iri {
    Iri::new(format!("{NS}{name}"))
}

fn class(name: &str) -> Entity {
    Entity::new(iri(name), name, EntityKind::Class)
}

fn annotation_property(iri: &str, label: &str) -> Entity {
    Entity::new(iri, label, EntityKind::AnnotationProperty)
}

fn assertion(subject: &str, property_iri: &str, property_label: &str, text: &str) -> Axiom {
    Axiom::AnnotationAssertion {
        subject: iri(subject),
        property: annotation_property(property_iri, property_label),
        value: AnnotationValue::Literal(text.to_string()),
    }
}

fn restriction(subject: &str, property: &str, filler: &str) -> Axiom {
    Axiom::SubClassOf {
        subclass: iri(subject),
        superclass: ClassExpression::Intersection(vec![
            ClassExpression::Named(iri("Marsupial")),
            ClassExpression::Restriction {
                property: iri(property),
                filler: Some(iri(filler)),
            },
        ]),
    }
}

/// The pizza-tutorial-sized fixture the tests share.
fn animals() -> MemoryOntology {
    let mut o = MemoryOntology::new();
    for name in ["Koala", "Kangaroo", "Marsupial", "Eucalyptus", "Grass"] {
        o.declare(class(name));
    }
    o.declare(Entity::new(iri("eats"), "eats", EntityKind::ObjectProperty));
    o.declare(annotation_property(RDFS_LABEL, "label"));
    o.declare(annotation_property(RDFS_COMMENT, "comment"));

    o.assert_axiom(assertion("Koala", RDFS_LABEL, "label", "Koala"));
    o.assert_axiom(assertion(
        "Koala",
        RDFS_COMMENT,
        "comment",
        "An arboreal herbivorous marsupial",
    ));
    o.assert_axiom(assertion("Kangaroo", RDFS_LABEL, "label", "Kangaroo"));
    o.assert_axiom(restriction("Koala", "eats", "Eucalyptus"));
    o.assert_axiom(restriction("Kangaroo", "eats", "Grass"));
    o
}

fn engine_for(source: MemoryOntology) -> SearchEngine {
    let mut engine = SearchEngine::open(Arc::new(source), EngineConfig::default()).unwrap();
    assert!(engine
        .rebuild(&Checkpoint::unfenced(), &mut NullProgress)
        .unwrap());
    engine
}

fn names(engine: &mut SearchEngine, query: &str) -> Vec<String> {
    engine
        .search(query)
        .unwrap()
        .into_iter()
        .map(|r| r.display_name)
        .collect()
}

#[test]
fn bare_term_matches_names_and_annotations() {
    let mut engine = engine_for(animals());
    assert_eq!(names(&mut engine, "koala"), ["Koala"]);
    assert_eq!(names(&mut engine, "arboreal"), ["Koala"]);
}

#[test]
fn term_search_never_matches_inside_words() {
    let mut engine = engine_for(animals());
    assert!(names(&mut engine, "oala").is_empty());
    assert!(names(&mut engine, "arbor").is_empty());
}

#[test]
fn qualified_search_is_scoped_to_one_annotation() {
    let mut engine = engine_for(animals());
    assert_eq!(names(&mut engine, "comment:marsupial"), ["Koala"]);
    // "marsupial" appears in Koala's comment only, not in any label
    assert!(names(&mut engine, "label:marsupial").is_empty());
}

#[test]
fn or_groups_union_and_sort_results() {
    let mut engine = engine_for(animals());
    assert_eq!(
        names(&mut engine, "koala, kangaroo"),
        ["Kangaroo", "Koala"]
    );
}

#[test]
fn exclusion_complements_against_the_signature() {
    let mut engine = engine_for(animals());
    let excluded = names(&mut engine, "-koala");
    // All eight declared entities minus Koala
    assert_eq!(excluded.len(), 7);
    assert!(!excluded.contains(&"Koala".to_string()));
}

#[test]
fn edit_batch_is_searchable_after_apply() {
    let mut source = animals();
    let batch = vec![
        AxiomChange::Remove(assertion(
            "Koala",
            RDFS_COMMENT,
            "comment",
            "An arboreal herbivorous marsupial",
        )),
        AxiomChange::Add(assertion(
            "Koala",
            RDFS_COMMENT,
            "comment",
            "A tree-dwelling herbivore",
        )),
    ];
    source.apply(&batch);

    // Index the pre-edit graph, then fold in the batch
    let mut engine = engine_for(animals());
    let before = engine.doc_count();
    let post_edit = SearchEngine::open(Arc::new(source), EngineConfig::default()).unwrap();
    drop(post_edit);

    engine.apply_edits(&batch).unwrap();
    assert_eq!(engine.doc_count(), before);
    assert!(names(&mut engine, "arboreal").is_empty());
    assert_eq!(names(&mut engine, "dwelling"), ["Koala"]);
}

#[test]
fn replayed_edit_batch_is_idempotent() {
    let mut engine = engine_for(animals());
    let before = engine.doc_count();
    let batch = vec![
        AxiomChange::Remove(assertion("Koala", RDFS_LABEL, "label", "Koala")),
        AxiomChange::Add(assertion("Koala", RDFS_LABEL, "label", "Koala")),
    ];

    engine.apply_edits(&batch).unwrap();
    engine.apply_edits(&batch).unwrap();
    assert_eq!(engine.doc_count(), before);
    assert_eq!(names(&mut engine, "label:koala"), ["Koala"]);
}

#[test]
fn edits_touching_unknown_subjects_are_skipped() {
    let mut engine = engine_for(animals());
    let before = engine.doc_count();
    let batch = vec![AxiomChange::Add(Axiom::AnnotationAssertion {
        subject: Iri::new("http://example.org/elsewhere#Dropbear"),
        property: annotation_property(RDFS_LABEL, "label"),
        value: AnnotationValue::Literal("Drop bear".to_string()),
    })];

    engine.apply_edits(&batch).unwrap();
    assert_eq!(engine.doc_count(), before);
}

#[test]
fn restriction_query_follows_the_filler() {
    let mut engine = engine_for(animals());
    let compiled = compile(&KeywordTree::Nested {
        property: iri("eats"),
        filler: Box::new(parse_keywords("grass")),
    });
    let results = engine
        .execute(&compiled, &Checkpoint::unfenced(), &mut NullProgress)
        .unwrap()
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].display_name, "Kangaroo");
}

#[test]
fn restriction_absent_excludes_restricted_entities() {
    let mut engine = engine_for(animals());
    let compiled = compile(&KeywordTree::RestrictionAbsent {
        property: iri("eats"),
    });
    let results = engine
        .execute(&compiled, &Checkpoint::unfenced(), &mut NullProgress)
        .unwrap()
        .unwrap();
    let names: Vec<&str> = results.iter().map(|r| r.display_name.as_str()).collect();
    assert!(!names.contains(&"Koala"));
    assert!(!names.contains(&"Kangaroo"));
    assert!(names.contains(&"Eucalyptus"));
}

#[test]
fn disk_index_survives_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        index_dir: Some(dir.path().to_path_buf()),
        memory_threshold: 0,
    };

    {
        let mut engine = SearchEngine::open(Arc::new(animals()), config.clone()).unwrap();
        engine
            .rebuild(&Checkpoint::unfenced(), &mut NullProgress)
            .unwrap();
        engine.dispose().unwrap();
    }

    let mut engine = SearchEngine::open(Arc::new(animals()), config).unwrap();
    // No rebuild needed; the committed segment is reloaded
    assert!(engine.doc_count() > 0);
    assert_eq!(names(&mut engine, "arboreal"), ["Koala"]);
    engine.dispose().unwrap();
}

#[test]
fn scheduler_delivers_results_for_the_latest_query() {
    let engine = SearchEngine::open(Arc::new(animals()), EngineConfig::default()).unwrap();
    let scheduler = SearchScheduler::spawn(engine).unwrap();

    let (build_tx, build_rx) = mpsc::channel();
    scheduler.submit_rebuild(Box::new(NullProgress), move |completed| {
        build_tx.send(completed).unwrap();
    });
    assert!(build_rx.recv_timeout(Duration::from_secs(5)).unwrap());

    let (tx, rx) = mpsc::channel();
    scheduler.submit_search(
        compile(&parse_keywords("kangaroo")),
        Box::new(NullProgress),
        move |results| {
            tx.send(results).unwrap();
        },
    );
    let results = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].display_name, "Kangaroo");

    scheduler.shutdown();
}

#[test]
fn scheduler_applies_edit_batches_in_order() {
    let engine = SearchEngine::open(Arc::new(animals()), EngineConfig::default()).unwrap();
    let scheduler = SearchScheduler::spawn(engine).unwrap();

    let (build_tx, build_rx) = mpsc::channel();
    scheduler.submit_rebuild(Box::new(NullProgress), move |completed| {
        build_tx.send(completed).unwrap();
    });
    assert!(build_rx.recv_timeout(Duration::from_secs(5)).unwrap());

    scheduler.submit_edits(vec![AxiomChange::Remove(assertion(
        "Kangaroo",
        RDFS_LABEL,
        "label",
        "Kangaroo",
    ))]);

    let (tx, rx) = mpsc::channel();
    scheduler.submit_search(
        compile(&parse_keywords("label:kangaroo")),
        Box::new(NullProgress),
        move |results| {
            tx.send(results).unwrap();
        },
    );
    let results = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(results.is_empty());

    scheduler.shutdown();
}

#[test]
fn cancelled_search_is_never_delivered() {
    let engine = SearchEngine::open(Arc::new(animals()), EngineConfig::default()).unwrap();
    let scheduler = SearchScheduler::spawn(engine).unwrap();

    // Hold the worker inside the rebuild-done callback so the cancel
    // below always lands before the search starts.
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    scheduler.submit_rebuild(Box::new(NullProgress), move |_| {
        let _ = gate_rx.recv();
    });

    let (tx, rx) = mpsc::channel::<Vec<oxi::engine::SearchResult>>();
    let handle = scheduler.submit_search(
        compile(&parse_keywords("koala")),
        Box::new(NullProgress),
        move |results| {
            tx.send(results).unwrap();
        },
    );
    handle.cancel();
    gate_tx.send(()).unwrap();
    scheduler.shutdown();

    // Either the worker saw the stop flag before starting or at its first
    // checkpoint; the callback must not have fired with results.
    if let Ok(results) = rx.try_recv() {
        panic!("cancelled search delivered {} results", results.len());
    }
}
