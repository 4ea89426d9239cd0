// Shared fixtures for the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use consolectl::fields::{Field, FieldSource, Setter, Value};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

/// Small target type exercising every field kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub age: i64,
    pub admin: bool,
    pub tags: Vec<String>,
    pub scores: Vec<i64>,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            name: String::new(),
            age: 30,
            admin: false,
            tags: Vec::new(),
            scores: Vec::new(),
        }
    }
}

pub fn account_fields() -> Vec<Field> {
    vec![
        Field::string("name", "account name").mandatory(),
        Field::int("age", "age in years", 30).validate_int(|age| {
            if *age >= 0 {
                Ok(())
            } else {
                Err("age cannot be negative".to_string())
            }
        }),
        Field::bool("admin", "administrator", false),
        Field::string_list("tags", "tags"),
        Field::int_list("scores", "scores"),
    ]
}

pub fn account_setters() -> Vec<Setter<Account>> {
    vec![
        Setter::string(|a: &mut Account, v| a.name = v),
        Setter::int(|a: &mut Account, v| a.age = v),
        Setter::bool(|a: &mut Account, v| a.admin = v),
        Setter::string_list(|a: &mut Account, v| a.tags = v),
        Setter::int_list(|a: &mut Account, v| a.scores = v),
    ]
}

/// Explicit field values keyed by field name
#[derive(Default)]
pub struct MapSource(pub HashMap<&'static str, Value>);

impl MapSource {
    pub fn with(mut self, name: &'static str, value: Value) -> Self {
        self.0.insert(name, value);
        self
    }
}

impl FieldSource for MapSource {
    fn explicit(&self, field: &Field) -> Option<Value> {
        self.0.get(field.name).cloned()
    }
}

/// Writes `contents` to `name` inside a fresh temporary directory
pub fn write_input(name: &str, contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write input file");
    (dir, path)
}
