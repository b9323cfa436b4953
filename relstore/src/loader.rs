/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::error::{Result, StorageError};
use crate::relation::{Relation, RelationStats};
use log::{debug, info, warn};
use nom::bytes::complete::take_while1;
use nom::character::complete::{char, digit1, multispace0, multispace1, space0, space1};
use nom::combinator::{all_consuming, map_res, opt, recognize};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;
use std::fs;
use std::path::{Path, PathBuf};

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

fn count(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse::<usize>)(input)
}

fn integer(input: &str) -> IResult<&str, i32> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i32>)(input)
}

/// A whitespace-separated list of names on a single line
fn name_line(input: &str) -> IResult<&str, Vec<&str>> {
    all_consuming(delimited(space0, separated_list0(space1, identifier), space0))(input)
}

fn descriptor(input: &str) -> IResult<&str, (&str, usize, usize, Vec<&str>)> {
    let (rest, (_, name, _, tuples, _, attribute_count, attributes, _)) = all_consuming(tuple((
        multispace0,
        identifier,
        multispace1,
        count,
        multispace1,
        count,
        many0(preceded(multispace1, identifier)),
        multispace0,
    )))(input)?;
    Ok((rest, (name, tuples, attribute_count, attributes)))
}

fn line_of(text: &str, rest: &str) -> usize {
    let offset = text.len() - rest.len();
    text[..offset].matches('\n').count() + 1
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn owned(names: Vec<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}

/// The relations a query joins and the attributes it binds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub relations: Vec<String>,
    pub attributes: Vec<String>,
}

impl QuerySpec {
    /// Parses the two-line query format: relation names, then attributes.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut lines = text.lines();
        let mut next_line = |what: &str| -> Result<Vec<String>> {
            let line = lines
                .next()
                .ok_or_else(|| StorageError::parse(path, format!("missing {} line", what)))?;
            let (_, names) = name_line(line)
                .map_err(|e| StorageError::parse(path, format!("bad {} line: {}", what, e)))?;
            Ok(owned(names))
        };

        let relations = next_line("relation")?;
        let attributes = next_line("attribute")?;
        if relations.is_empty() {
            return Err(StorageError::parse(path, "query names no relations"));
        }
        Ok(QuerySpec { relations, attributes })
    }

    pub fn load(path: &Path) -> Result<Self> {
        QuerySpec::parse(&read_file(path)?, path)
    }
}

/// Contents of a `<name>.desc` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDesc {
    pub name: String,
    pub tuple_count: usize,
    pub attributes: Vec<String>,
    /// Column-major data file next to the descriptor
    pub data_path: PathBuf,
}

impl RelationDesc {
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let (_, (name, tuple_count, attribute_count, attributes)) = descriptor(text)
            .map_err(|e| StorageError::parse(path, format!("bad relation descriptor: {}", e)))?;
        if attributes.len() != attribute_count {
            return Err(StorageError::parse(
                path,
                format!(
                    "descriptor declares {} attributes but lists {}",
                    attribute_count,
                    attributes.len()
                ),
            ));
        }
        Ok(RelationDesc {
            name: name.to_string(),
            tuple_count,
            attributes: owned(attributes),
            data_path: path.with_file_name(name),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        RelationDesc::parse(&read_file(path)?, path)
    }

    /// Reads the data file and builds the relation.
    pub fn load_relation(&self) -> Result<Relation> {
        let text = read_file(&self.data_path)?;
        let columns = parse_columns(&text, &self.data_path, self.attributes.len(), self.tuple_count)?;

        let mut relation = Relation::new(self.name.clone(), self.tuple_count);
        for (attribute, values) in self.attributes.iter().zip(columns) {
            relation.add_column(attribute.clone(), values)?;
        }
        debug!(
            "Loaded relation {} ({} rows, attributes {:?})",
            self.name, self.tuple_count, self.attributes
        );
        Ok(relation)
    }
}

/// Splits a column-major integer stream into `width` columns of `rows` values.
fn parse_columns(text: &str, path: &Path, width: usize, rows: usize) -> Result<Vec<Vec<i32>>> {
    let mut columns = Vec::with_capacity(width);
    let mut rest = text;
    for column in 0..width {
        let mut values = Vec::with_capacity(rows);
        for row in 0..rows {
            let (next, value) = preceded(multispace0, integer)(rest).map_err(|_: nom::Err<nom::error::Error<&str>>| {
                StorageError::parse(
                    path,
                    format!(
                        "expected integer for column {} row {} at line {}",
                        column,
                        row,
                        line_of(text, rest)
                    ),
                )
            })?;
            values.push(value);
            rest = next;
        }
        columns.push(values);
    }
    if !rest.trim().is_empty() {
        warn!(
            "Ignoring trailing data in {} after line {}",
            path.display(),
            line_of(text, rest)
        );
    }
    Ok(columns)
}

/// Relation sizes and attributes for planning without data.
///
/// Line 1 lists the query attributes, each following line is
/// `<relation> <tupleCount> <attribute>...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsCatalog {
    pub attributes: Vec<String>,
    pub relations: Vec<RelationStats>,
}

impl StatsCatalog {
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut lines = text.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());
        let (_, header) = lines
            .next()
            .ok_or_else(|| StorageError::parse(path, "empty statistics catalog"))?;
        let (_, attributes) = name_line(header)
            .map_err(|e| StorageError::parse(path, format!("bad attribute line: {}", e)))?;

        let mut relations = Vec::new();
        for (number, line) in lines {
            let (_, (name, tuple_count, attrs)) = all_consuming(tuple((
                preceded(space0, identifier),
                preceded(space1, count),
                delimited(space0, separated_list0(space1, identifier), space0),
            )))(line)
            .map_err(|e| StorageError::parse(path, format!("line {}: {}", number + 1, e)))?;
            relations.push(RelationStats::new(name, tuple_count, attrs));
        }
        Ok(StatsCatalog {
            attributes: owned(attributes),
            relations,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        StatsCatalog::parse(&read_file(path)?, path)
    }
}

/// A dataset directory holding `relation/` descriptors and `sql/` queries
#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
}

impl Dataset {
    pub fn open(data_root: impl AsRef<Path>, name: &str) -> Self {
        Dataset {
            root: data_root.as_ref().join(name),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn relation_dir(&self) -> PathBuf {
        self.root.join("relation")
    }

    pub fn query_dir(&self) -> PathBuf {
        self.root.join("sql")
    }

    pub fn query(&self, file: &str) -> Result<QuerySpec> {
        QuerySpec::load(&self.query_dir().join(file))
    }

    pub fn describe(&self, relation: &str) -> Result<RelationDesc> {
        RelationDesc::load(&self.relation_dir().join(format!("{}.desc", relation)))
    }

    pub fn load_relation(&self, relation: &str) -> Result<Relation> {
        self.describe(relation)?.load_relation()
    }

    /// Loads every relation of the query in query order.
    pub fn load_relations(&self, query: &QuerySpec) -> Result<Vec<Relation>> {
        let relations = query
            .relations
            .iter()
            .map(|name| self.load_relation(name))
            .collect::<Result<Vec<_>>>()?;
        info!(
            "Loaded {} relations from {}",
            relations.len(),
            self.root.display()
        );
        Ok(relations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> PathBuf {
        PathBuf::from("test")
    }

    #[test]
    fn test_parse_query_spec() {
        let spec = QuerySpec::parse("R S  T\n a b c \n", &path()).unwrap();
        assert_eq!(spec.relations, vec!["R", "S", "T"]);
        assert_eq!(spec.attributes, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_query_spec_requires_two_lines() {
        assert!(matches!(
            QuerySpec::parse("R S\n", &path()),
            Err(StorageError::Parse { .. })
        ));
        assert!(QuerySpec::parse("\na b\n", &path()).is_err());
    }

    #[test]
    fn test_parse_descriptor() {
        let desc = RelationDesc::parse("edge 4 2\nsrc dst\n", Path::new("/data/g/relation/edge.desc")).unwrap();
        assert_eq!(desc.name, "edge");
        assert_eq!(desc.tuple_count, 4);
        assert_eq!(desc.attributes, vec!["src", "dst"]);
        assert_eq!(desc.data_path, PathBuf::from("/data/g/relation/edge"));
    }

    #[test]
    fn test_descriptor_attribute_count_mismatch() {
        assert!(RelationDesc::parse("edge 4 3 src dst", &path()).is_err());
        assert!(RelationDesc::parse("edge four 2 src dst", &path()).is_err());
    }

    #[test]
    fn test_parse_columns_column_major() {
        let columns = parse_columns("1 2 3\n-4 5 6\n", &path(), 2, 3).unwrap();
        assert_eq!(columns, vec![vec![1, 2, 3], vec![-4, 5, 6]]);
    }

    #[test]
    fn test_parse_columns_short_input() {
        let err = parse_columns("1 2 3\n4 5", &path(), 2, 3).unwrap_err();
        assert!(err.to_string().contains("column 1 row 2"));
    }

    #[test]
    fn test_parse_stats_catalog() {
        let catalog = StatsCatalog::parse("a b c\nR 10 a b\n\nS 20 b c\nE 5\n", &path()).unwrap();
        assert_eq!(catalog.attributes, vec!["a", "b", "c"]);
        assert_eq!(catalog.relations.len(), 3);
        assert_eq!(catalog.relations[1], RelationStats::new("S", 20, vec!["b", "c"]));
        assert!(catalog.relations[2].attributes.is_empty());
    }
}
