/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Connected components of the join hypergraph.
//!
//! Attributes are vertices and every relation is a hyperedge over the
//! attributes it carries. Two attributes end up in the same component when a
//! chain of relations links them.

use relstore::RelationSchema;

/// One connected component: relation indices and the attributes they span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub relations: Vec<usize>,
    pub attributes: Vec<String>,
}

impl Component {
    /// False for attributes no candidate relation carries
    pub fn has_relations(&self) -> bool {
        !self.relations.is_empty()
    }
}

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        match self.rank[a].cmp(&self.rank[b]) {
            std::cmp::Ordering::Less => self.parent[a] = b,
            std::cmp::Ordering::Greater => self.parent[b] = a,
            std::cmp::Ordering::Equal => {
                self.parent[b] = a;
                self.rank[a] += 1;
            }
        }
    }
}

/// Partitions `attributes` and the candidate relations touching them into connected components.
///
/// Components come back ordered by their first attribute in `attributes`;
/// attributes and relations keep their input order inside a component.
/// Attributes carried by no candidate form relation-less components, and
/// candidates carrying none of `attributes` are left out.
pub fn split<R: RelationSchema>(
    relations: &[R],
    candidates: &[usize],
    attributes: &[String],
) -> Vec<Component> {
    let mut sets = DisjointSet::new(attributes.len());
    let mut anchors = Vec::with_capacity(candidates.len());

    for &relation in candidates {
        let mut carried = attributes
            .iter()
            .enumerate()
            .filter(|(_, a)| relations[relation].has_attribute(a))
            .map(|(position, _)| position);
        if let Some(first) = carried.next() {
            for other in carried {
                sets.union(first, other);
            }
            anchors.push((relation, first));
        }
    }

    let mut group_of_root = vec![usize::MAX; attributes.len()];
    let mut components: Vec<Component> = Vec::new();
    for (position, attribute) in attributes.iter().enumerate() {
        let root = sets.find(position);
        if group_of_root[root] == usize::MAX {
            group_of_root[root] = components.len();
            components.push(Component {
                relations: Vec::new(),
                attributes: Vec::new(),
            });
        }
        components[group_of_root[root]].attributes.push(attribute.clone());
    }

    for (relation, first) in anchors {
        let root = sets.find(first);
        components[group_of_root[root]].relations.push(relation);
    }
    components
}
