#![allow(dead_code)]

use shapeopt::{DataGraph, Query, ShapeModel};
use std::error::Error;
use std::fs;
use std::path::PathBuf;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn read_fixture(name: &str) -> Result<String, Box<dyn Error>> {
    let path = fixture(name);
    fs::read_to_string(&path).map_err(|e| format!("Failed to read {}: {}", path.display(), e).into())
}

pub fn shapes() -> Result<ShapeModel, Box<dyn Error>> {
    Ok(ShapeModel::from_file(&fixture("shapes.ttl"))?)
}

pub fn data() -> Result<DataGraph, Box<dyn Error>> {
    Ok(DataGraph::from_file(&fixture("data.ttl"))?)
}

pub fn query(name: &str) -> Result<Query, Box<dyn Error>> {
    Ok(Query::parse(&read_fixture(&format!("queries/{}", name))?)?)
}

/// Every query fixture that has no `.expected` suffix.
pub const QUERIES: &[&str] = &[
    "work_mail.rq",
    "youngest.rq",
    "english_bios.rq",
    "phones.rq",
    "any_mailbox.rq",
];
