//! End-to-end tests for livdb conversion
//!
//! Write small livdb exports to a temporary directory, run the batch
//! converter and read the resulting MagIC tables back.

use magic_converter::config::{ConverterConfig, DataModel};
use magic_converter::models::LabTreatment;
use magic_converter::processor::LivdbProcessor;
use magic_converter::table::MagicTable;
use std::path::Path;
use tempfile::TempDir;

fn header(specimen: &str, experiment: &str) -> String {
    format!(
        "{},10,20,1.5,1,0.1,0,0,32.1,35.2,{},rs,2G,oven,test,1,1.0,10,2700",
        specimen, experiment
    )
}

/// Measurement line: thermal treatment, lab field (µT), step type and AF peak (mT)
fn measurement(temperature: &str, field: &str, step_type: &str, af_peak: &str) -> String {
    format!(
        "0,0,0,1.0,2.0,3.0,1,{},0,90,11-05-2013,14:00:00,,1,{},1,0,0,0,0,{},{}",
        field, step_type, af_peak, temperature
    )
}

async fn convert(lines: &[String], config: ConverterConfig) -> MagicTable {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.livdb");
    std::fs::write(&input, lines.join("\n")).unwrap();
    let output_dir = temp_dir.path().join("magic");
    let model = config.data_model;

    LivdbProcessor::new(vec![input], config.with_output_dir(&output_dir))
        .process()
        .await
        .expect("conversion should succeed");

    let name = match model {
        DataModel::V2 => "magic_measurements.txt",
        DataModel::V3 => "measurements.txt",
    };
    MagicTable::read_file(&output_dir.join(name)).unwrap()
}

fn treatments(table: &MagicTable, column: &str) -> Vec<Option<LabTreatment>> {
    table
        .column(column)
        .into_iter()
        .map(|codes| LabTreatment::from_method_codes(codes, false))
        .collect()
}

/// Purpose: IZZI experiment with AF cleaning and an alteration check
#[tokio::test]
async fn test_izzi_experiment_with_af_cleaning() {
    let lines = vec![
        header("TG01a1", "TH-PI-IZZI+"),
        measurement("0", "0", "NRM", "0"),
        measurement("0", "0", "", "20"),
        measurement("100", "0", "Z", "0"),
        measurement("100", "50", "I", "0"),
        measurement("200", "50", "I", "0"),
        measurement("200", "0", "Z", "0"),
        measurement("100", "50", "P", "0"),
        "END".to_string(),
    ];

    let table = convert(&lines, ConverterConfig::default()).await;
    assert_eq!(
        treatments(&table, "method_codes"),
        vec![
            Some(LabTreatment::NoTreatment),
            Some(LabTreatment::AfDemag),
            Some(LabTreatment::ZeroField),
            Some(LabTreatment::InField),
            Some(LabTreatment::InField),
            Some(LabTreatment::ZeroField),
            Some(LabTreatment::PtrmCheck),
        ]
    );

    assert_eq!(table.column("treat_ac_field")[1], "2.000e-02");
    assert_eq!(table.column("treat_temp")[2], "373.15");
    assert_eq!(table.column("treat_dc_field")[3], "5.000e-05");
    assert_eq!(table.column("treat_step_num"), vec!["0", "1", "2", "3", "4", "5", "6"]);
    assert!(table
        .column("method_codes")
        .iter()
        .all(|codes| codes.ends_with("LP-PI-TRM:LP-PI-BT-IZZI:LP-PI-ALT-PTRM")));
    assert_eq!(
        table.column("measurement")[0],
        "TG01a1:LP-PI-TRM:LP-PI-BT-IZZI:LP-PI-ALT-PTRM_0"
    );
}

/// Purpose: thermal demagnetization writes a zero lab field on every row
#[tokio::test]
async fn test_thermal_demagnetization() {
    let lines = vec![
        header("s1", "TH-D"),
        measurement("0", "0", "NRM", "0"),
        measurement("150", "0", "", "0"),
        measurement("300", "0", "", "0"),
        "END".to_string(),
    ];

    let table = convert(&lines, ConverterConfig::default()).await;
    let codes = table.column("method_codes");
    assert_eq!(codes, vec!["LT-NO:LP-DIR-T", "LT-T-Z:LP-DIR-T", "LT-T-Z:LP-DIR-T"]);
    assert_eq!(table.column("treat_dc_field"), vec!["0", "0", "0"]);
    assert_eq!(table.column("treat_temp")[2], "573.15");
}

/// Purpose: data model 2 output uses the 2.5 column names
#[tokio::test]
async fn test_data_model_two_output() {
    let lines = vec![
        header("s1", "TH-PI-C"),
        measurement("0", "0", "NRM", "0"),
        measurement("100", "0", "Z", "0"),
        measurement("100", "50", "I", "0"),
        "END".to_string(),
    ];

    let table = convert(
        &lines,
        ConverterConfig::default().with_data_model(DataModel::V2),
    )
    .await;
    assert_eq!(table.table_type, "magic_measurements");
    assert_eq!(
        treatments(&table, "magic_method_codes"),
        vec![
            Some(LabTreatment::NoTreatment),
            Some(LabTreatment::ZeroField),
            Some(LabTreatment::InField),
        ]
    );
    assert!(table.columns.iter().all(|column| column != "measurement"));
}

/// Purpose: the CLI configuration file feeds the converter
#[tokio::test]
async fn test_config_file_layering() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("magic.toml");
    std::fs::write(
        &config_path,
        "location = \"Timna\"\nsample_naming = { trim_trailing = 1 }\n",
    )
    .unwrap();

    let config = ConverterConfig::from_file(Path::new(&config_path)).unwrap();
    let lines = vec![
        header("TG01a1", "TH-D"),
        measurement("0", "0", "NRM", "0"),
        "END".to_string(),
    ];
    let table = convert(&lines, config).await;
    assert_eq!(table.column("sample"), vec!["TG01a"]);
    assert_eq!(table.column("location"), vec!["Timna"]);
}
