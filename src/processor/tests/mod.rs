//! Integration tests for the processor module
//!
//! Runs the complete livdb pipeline against small files written to a
//! temporary directory.


use std::path::{Path, PathBuf};

/// Header line for a specimen block
pub fn header(specimen: &str, experiment: &str) -> String {
    format!(
        "{},10,20,1.5,1,0.1,0,0,32.1,35.2,{},rs,2G,oven,test,1,1.0,10,2700",
        specimen, experiment
    )
}

/// Measurement line with the treatment in the TH peak column
pub fn body(treatment: &str, field: &str, step_type: &str) -> String {
    format!(
        "0,0,0,1.0,2.0,3.0,1,{},0,90,11-05-2013,14:00:00,,1,{},1,0,0,0,0,0,{}",
        field, step_type, treatment
    )
}

/// A zero-field-first thermal experiment
pub fn coe_block(specimen: &str) -> Vec<String> {
    vec![
        header(specimen, "TH-PI-C"),
        body("0", "0", "NRM"),
        body("100", "50", "I"),
        body("100", "0", "Z"),
        body("200", "50", "I"),
        "END".to_string(),
    ]
}

pub fn write_livdb(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}
