//! Integration tests for the index, scanner and query engine on real vaults.

use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use vaultgraph::note::FileMeta;
use vaultgraph::parser::NoteParser;
use vaultgraph::query::{DateRange, TagQueryOptions};
use vaultgraph::{ChangeEvent, IndexConfig, Indexer, NoteId, Resolution, VaultIndex};

fn write(dir: &TempDir, path: &str, content: &str) {
    let full = dir.path().join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(full, content).unwrap();
}

fn id(path: &str) -> NoteId {
    NoteId::from_str_path(path, Default::default())
}

/// Forward resolutions of every note, as plain strings.
fn resolutions(index: &VaultIndex) -> BTreeMap<String, Vec<Option<String>>> {
    let snapshot = index.snapshot();
    snapshot
        .iter()
        .map(|note| {
            let targets = snapshot
                .forward_links(&note.id)
                .iter()
                .map(|l| l.resolution.target().map(|t| t.to_string()))
                .collect();
            (note.id.to_string(), targets)
        })
        .collect()
}

mod scenarios {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dangling_link_resolves_when_target_appears() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.md", "Links to [[b]].\n");
        let (indexer, report) = Indexer::build(dir.path(), IndexConfig::default()).unwrap();
        assert_eq!(report.notes_indexed, 1);

        let query = indexer.query();
        let broken = query.broken_links();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].source, id("a.md"));
        assert_eq!(broken[0].link.target, "b");

        write(&dir, "b.md", "I am b.\n");
        indexer.apply_change(&ChangeEvent::created("b.md")).unwrap();

        assert!(query.broken_links().is_empty());
        assert_eq!(query.backward_links(&id("b.md")).unwrap(), vec![id("a.md")]);
        indexer.index().verify().unwrap();
    }

    #[test]
    fn front_matter_and_inline_tags_merge() {
        let dir = TempDir::new().unwrap();
        write(&dir, "n.md", "---\ntags: [proj/x]\n---\nWorking on #proj/y today.\n");
        let (indexer, _) = Indexer::build(dir.path(), IndexConfig::default()).unwrap();

        let note = indexer.index().get(&id("n.md")).unwrap();
        let tags: Vec<&str> = note.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["proj/x", "proj/y"]);

        let hits = indexer
            .query()
            .tags("proj/*", &TagQueryOptions::default())
            .unwrap();
        assert_eq!(hits, vec![id("n.md")]);
    }

    #[test]
    fn date_range_on_created_field() {
        let dir = TempDir::new().unwrap();
        write(&dir, "n.md", "---\ncreated: 2024-01-05\n---\n");
        let (indexer, _) = Indexer::build(dir.path(), IndexConfig::default()).unwrap();
        let query = indexer.query();

        let day = |s: &str| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
        let january = DateRange::days(day("2024-01-01"), day("2024-01-31"));
        assert_eq!(query.date_range("created", &january), vec![id("n.md")]);

        let february = DateRange::days(day("2024-02-01"), day("2024-02-28"));
        assert!(query.date_range("created", &february).is_empty());
    }

    #[test]
    fn deleting_target_leaves_dangling_reference() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.md", "Links to [[b]].\n");
        write(&dir, "b.md", "I am b.\n");
        let (indexer, _) = Indexer::build(dir.path(), IndexConfig::default()).unwrap();
        let query = indexer.query();
        assert!(query.broken_links().is_empty());

        fs::remove_file(dir.path().join("b.md")).unwrap();
        indexer.apply_change(&ChangeEvent::deleted("b.md")).unwrap();

        let forward = query.forward_links(&id("a.md")).unwrap();
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].reference.target, "b");
        assert_eq!(forward[0].resolution, Resolution::Unresolved);
        assert_eq!(query.broken_links().len(), 1);
        indexer.index().verify().unwrap();
    }
}

mod properties {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    /// One mutation in a random update sequence.
    #[derive(Debug, Clone)]
    enum Step {
        Upsert { path: String, content: String },
        /// Remove the n-th indexed note, modulo the note count.
        Remove(usize),
    }

    fn note_path() -> impl Strategy<Value = String> {
        (prop::sample::select(vec!["", "a/", "a/b/", "c/"]), 0u8..8)
            .prop_map(|(folder, n)| format!("{folder}n{n}.md"))
    }

    fn link_target() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u8..10).prop_map(|n| format!("n{n}")),
            (0u8..5).prop_map(|n| format!("alias{n}")),
            (0u8..10).prop_map(|n| format!("a/n{n}")),
        ]
    }

    fn note_content() -> impl Strategy<Value = String> {
        (prop::option::of(0u8..4), prop::collection::vec(link_target(), 0..4)).prop_map(
            |(alias, targets)| {
                let mut content = String::new();
                if let Some(alias) = alias {
                    content.push_str(&format!("---\naliases: [alias{alias}]\n---\n"));
                }
                for target in targets {
                    content.push_str(&format!("See [[{target}]].\n"));
                }
                content
            },
        )
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            3 => (note_path(), note_content()).prop_map(|(path, content)| Step::Upsert { path, content }),
            1 => any::<usize>().prop_map(Step::Remove),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn graph_stays_symmetric_under_random_updates(steps in prop::collection::vec(step(), 1..120)) {
            let config = IndexConfig::default();
            let parser = NoteParser::new(&config);
            let index = VaultIndex::new(config.clone());

            for (i, step) in steps.iter().enumerate() {
                match step {
                    Step::Upsert { path, content } => {
                        let note = parser
                            .parse(content.as_bytes(), Path::new(path), FileMeta::default())
                            .unwrap();
                        index.upsert(note).unwrap();
                    }
                    Step::Remove(pick) => {
                        let ids: Vec<NoteId> = index.snapshot().iter().map(|n| n.id.clone()).collect();
                        if !ids.is_empty() {
                            index.remove(&ids[pick % ids.len()]).unwrap();
                        }
                    }
                }
                if let Err(e) = index.verify() {
                    prop_assert!(false, "step {}: {}", i, e);
                }
            }

            // incremental updates end where a fresh build from the same notes does
            let fresh = VaultIndex::new(config);
            for note in index.notes() {
                fresh.upsert((*note).clone()).unwrap();
            }
            prop_assert_eq!(resolutions(&index), resolutions(&fresh));
        }
    }

    #[test]
    fn reapplying_a_change_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.md", "[[b]] and #tag\n");
        write(&dir, "b.md", "---\naliases: [bee]\n---\n[[a]]\n");
        let (indexer, _) = Indexer::build(dir.path(), IndexConfig::default()).unwrap();
        let before = resolutions(indexer.index());
        let generation = indexer.index().snapshot().generation();

        for _ in 0..3 {
            indexer.apply_change(&ChangeEvent::modified("a.md")).unwrap();
            indexer.apply_change(&ChangeEvent::modified("b.md")).unwrap();
        }

        assert_eq!(resolutions(indexer.index()), before);
        assert_eq!(indexer.index().snapshot().generation(), generation);
    }

    #[test]
    fn dangling_links_resolve_without_rescan() {
        let config = IndexConfig::default();
        let parser = NoteParser::new(&config);
        let index = VaultIndex::new(config);
        let parse = |path: &str, content: &str| {
            parser
                .parse(content.as_bytes(), Path::new(path), FileMeta::default())
                .unwrap()
        };

        for i in 0..20 {
            index
                .upsert(parse(&format!("src{i}.md"), "[[Target Note]] [[target note#Intro]]\n"))
                .unwrap();
        }
        assert_eq!(index.snapshot().graph().link_counts(), (0, 40));

        index.upsert(parse("deep/Target Note.md", "")).unwrap();
        assert_eq!(index.snapshot().graph().link_counts(), (40, 0));
        assert_eq!(index.snapshot().backward_links(&id("deep/target note.md")).len(), 20);
    }

    #[test]
    fn results_do_not_depend_on_insertion_order() {
        let config = IndexConfig::default();
        let parser = NoteParser::new(&config);
        let files = [
            ("x/dup.md", "[[other]]\n#t\n"),
            ("y/dup.md", "#t/sub\n"),
            ("other.md", "[[dup]] [[missing]]\n"),
            ("x/other.md", "[[dup]]\n"),
        ];

        let build = |order: &[usize]| {
            let index = VaultIndex::new(config.clone());
            for &i in order {
                let (path, content) = files[i];
                let note = parser
                    .parse(content.as_bytes(), Path::new(path), FileMeta::default())
                    .unwrap();
                index.upsert(note).unwrap();
            }
            index
        };

        let forward = build(&[0, 1, 2, 3]);
        let backward = build(&[3, 2, 1, 0]);
        assert_eq!(resolutions(&forward), resolutions(&backward));

        let q1 = vaultgraph::QueryEngine::new(forward);
        let q2 = vaultgraph::QueryEngine::new(backward);
        let opts = TagQueryOptions { hierarchical: true };
        assert_eq!(q1.tags("t", &opts).unwrap(), q2.tags("t", &opts).unwrap());
        assert_eq!(
            serde_json::to_string(&q1.broken_links()).unwrap(),
            serde_json::to_string(&q2.broken_links()).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&q1.export_edges()).unwrap(),
            serde_json::to_string(&q2.export_edges()).unwrap()
        );
    }

    #[test]
    fn front_matter_round_trips() {
        let text = "---\ntitle: Plan\npriority: 2\nratio: 0.5\ndone: false\ndue: 2024-01-05\ntags:\n  - proj/x\nowner:\n  name: Ann\n---\n# Body\n\ntext\n";
        let parser = NoteParser::default();
        let note = parser
            .parse(text.as_bytes(), Path::new("plan.md"), FileMeta::default())
            .unwrap();

        // untouched notes reproduce the file byte for byte
        assert_eq!(note.content(), text);

        // typed values survive a trip through YAML
        let mapping = serde_yaml::Mapping::from_iter(
            note.front_matter
                .fields()
                .iter()
                .map(|(k, v)| (serde_yaml::Value::String(k.clone()), v.to_yaml())),
        );
        let yaml = serde_yaml::to_string(&mapping).unwrap();
        let rewritten = format!("---\n{}---\n{}", yaml, note.body);
        let reparsed = parser
            .parse(rewritten.as_bytes(), Path::new("plan.md"), FileMeta::default())
            .unwrap();
        assert_eq!(reparsed.front_matter.fields(), note.front_matter.fields());
        assert_eq!(reparsed.body, note.body);
    }
}
