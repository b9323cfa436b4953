/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

extern crate agmjoin;
extern crate criterion;

use agmjoin::{JoinConfig, QueryEngine, Strategy};
use criterion::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use relstore::{Relation, RelationStats};

fn random_relation(rng: &mut StdRng, name: &str, attributes: &[&str], rows: usize, domain: i32) -> Relation {
    let columns = attributes
        .iter()
        .map(|a| (*a, (0..rows).map(|_| rng.gen_range(0..domain)).collect::<Vec<i32>>()))
        .collect();
    Relation::from_columns(name, columns).unwrap()
}

fn triangle(rows: usize, domain: i32) -> Vec<Relation> {
    let mut rng = StdRng::seed_from_u64(7);
    vec![
        random_relation(&mut rng, "R", &["a", "b"], rows, domain),
        random_relation(&mut rng, "S", &["b", "c"], rows, domain),
        random_relation(&mut rng, "T", &["c", "a"], rows, domain),
    ]
}

fn attributes(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn bench_triangle_join(c: &mut Criterion) {
    let relations = triangle(10_000, 500);
    let query = attributes(&["a", "b", "c"]);
    let mut group = c.benchmark_group("triangle_join");
    for strategy in Strategy::ALL {
        let engine = QueryEngine::new(JoinConfig::with_strategy(strategy)).unwrap();
        group.bench_function(strategy.as_str(), |b| {
            b.iter_batched(
                || relations.clone(),
                |mut relations| engine.run(&mut relations, &query).unwrap().cardinality,
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

/// Planning cost alone on a ring of `n` binary relations.
fn bench_cycle_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_planning");
    for n in [4usize, 6, 8] {
        let names: Vec<String> = (0..n).map(|i| format!("x{}", i)).collect();
        let stats: Vec<RelationStats> = (0..n)
            .map(|i| {
                RelationStats::new(
                    format!("R{}", i),
                    1_000 * (i + 1),
                    vec![names[i].clone(), names[(i + 1) % n].clone()],
                )
            })
            .collect();
        for strategy in Strategy::ALL {
            let engine = QueryEngine::new(JoinConfig::with_strategy(strategy)).unwrap();
            group.bench_with_input(BenchmarkId::new(strategy.as_str(), n), &stats, |b, stats| {
                b.iter(|| engine.plan_only(black_box(stats), &names).unwrap())
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_triangle_join, bench_cycle_planning);
criterion_main!(benches);
