/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

extern crate relstore;

use relstore::{Dataset, RelationSchema, StorageError};
use std::fs;
use std::path::PathBuf;

fn scratch_dataset(tag: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("relstore_{}_{}", tag, std::process::id()));
    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(root.join("toy").join("relation")).unwrap();
    fs::create_dir_all(root.join("toy").join("sql")).unwrap();
    root
}

fn write(root: &PathBuf, relative: &str, contents: &str) {
    fs::write(root.join("toy").join(relative), contents).unwrap();
}

#[test]
fn test_load_dataset_relations_in_query_order() {
    let root = scratch_dataset("order");
    write(&root, "relation/R.desc", "R 3 2 a b\n");
    write(&root, "relation/R", "1 2 3\n10 20 30\n");
    write(&root, "relation/S.desc", "S 2 1\nb\n");
    write(&root, "relation/S", "20\n30\n");
    write(&root, "sql/q1", "S R\na b\n");

    let dataset = Dataset::open(&root, "toy");
    let query = dataset.query("q1").unwrap();
    assert_eq!(query.relations, vec!["S", "R"]);

    let relations = dataset.load_relations(&query).unwrap();
    assert_eq!(relations[0].name(), "S");
    assert_eq!(relations[1].column("b").unwrap().values(), &[10, 20, 30]);
    assert!(relations[1].has_attribute("a"));
    assert_eq!(RelationSchema::len(&relations[0]), 2);

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn test_missing_relation_is_io_error() {
    let root = scratch_dataset("missing");
    write(&root, "sql/q1", "Nope\na\n");

    let dataset = Dataset::open(&root, "toy");
    let query = dataset.query("q1").unwrap();
    let err = dataset.load_relations(&query).unwrap_err();
    assert!(matches!(err, StorageError::Io { .. }));

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn test_truncated_data_file_is_parse_error() {
    let root = scratch_dataset("truncated");
    write(&root, "relation/R.desc", "R 3 2 a b\n");
    write(&root, "relation/R", "1 2 3\n10 x 30\n");

    let err = Dataset::open(&root, "toy").load_relation("R").unwrap_err();
    assert!(matches!(err, StorageError::Parse { .. }));

    fs::remove_dir_all(&root).unwrap();
}
