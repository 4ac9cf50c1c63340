use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use feedgen_algo::test_utils::{grid_roads, loads_along_grid, DEG_PER_M};
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::tempdir;

const TRANSFORMERS: &str = "\
name,kva,ht_kv,lt_kv,scope,pct_resistance,pct_reactance,pct_no_load_loss
dt-25,25,11,0.415,,1.2,4.5,0.3
dt-100,100,11,0.415,,1.2,4.5,0.3
dt-400,400,11,0.415,,1.2,4.5,0.3
st-5000,5000,33,11,substation,0.6,8.0,0.1
";

const CONDUCTORS: &str = "\
name,ampacity_a,resistance_ohm_per_km,gmr_m,diameter_m,scope
weasel,95,0.9116,0.00198,0.00777,acsr
rabbit,135,0.5449,0.00256,0.01005,acsr
dog,205,0.2745,0.0039,0.01413,acsr
wolf,260,0.1828,0.00564,0.01813,acsr
panther,300,0.1363,0.00709,0.021,acsr
";

const CONFIG: &str = r#"
max_pole_span_m = 40.0

[clustering]
count = { fixed = 2 }

[loads.consumption]
kind = "constant"
kw = 2.5
"#;

fn write_inputs(dir: &Path) {
    let roads = grid_roads(3, 3, 90.0);
    let nodes: Vec<Value> = roads
        .nodes()
        .map(|(id, p)| json!({"id": id.value(), "latitude": p.latitude(), "longitude": p.longitude()}))
        .collect();
    let edges: Vec<Value> = roads
        .edges()
        .iter()
        .map(|e| json!({"from": e.from.value(), "to": e.to.value()}))
        .collect();
    fs::write(
        dir.join("roads.json"),
        json!({"nodes": nodes, "edges": edges}).to_string(),
    )
    .unwrap();

    let mut csv = String::from("id,latitude,longitude,area\n");
    for (index, load) in loads_along_grid(&roads, 2, 2.5).iter().enumerate() {
        writeln!(
            csv,
            "house-{index},{},{},90",
            load.location.latitude(),
            load.location.longitude()
        )
        .unwrap();
    }
    fs::write(dir.join("loads.csv"), csv).unwrap();
    fs::write(dir.join("transformers.csv"), TRANSFORMERS).unwrap();
    fs::write(dir.join("conductors.csv"), CONDUCTORS).unwrap();
    fs::write(dir.join("feedgen.toml"), CONFIG).unwrap();
}

fn synth_command(dir: &Path, out: &Path) -> Command {
    let mut cmd = Command::cargo_bin("feedgen").unwrap();
    let substation = (-30.0 * DEG_PER_M).to_string();
    cmd.arg("synth")
        .arg("--config")
        .arg(dir.join("feedgen.toml"))
        .arg("--loads")
        .arg(dir.join("loads.csv"))
        .arg("--roads")
        .arg(dir.join("roads.json"))
        .arg("--transformers")
        .arg(dir.join("transformers.csv"))
        .arg("--conductors")
        .arg(dir.join("conductors.csv"))
        .arg("--substation-lat")
        .arg(&substation)
        .arg("--substation-lon")
        .arg(&substation)
        .arg("--threads")
        .arg("2")
        .arg("-o")
        .arg(out);
    cmd
}

#[test]
fn feedgen_synth_writes_topology() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    let out = dir.path().join("feeder.json");

    synth_command(dir.path(), &out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Transformers    : 2"))
        .stdout(predicate::str::contains("Loads           : 16"));

    let document: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(document["loads"].as_array().unwrap().len(), 16);
    assert_eq!(
        document["edges"].as_array().unwrap().len(),
        document["vertices"].as_array().unwrap().len() - 1
    );
}

#[test]
fn feedgen_synth_reports_missing_input() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    fs::remove_file(dir.path().join("loads.csv")).unwrap();

    synth_command(dir.path(), &dir.path().join("feeder.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("loads.csv"));
}

#[test]
fn feedgen_config_default_prints_toml() {
    Command::cargo_bin("feedgen")
        .unwrap()
        .args(["config", "default"])
        .assert()
        .success()
        .stdout(predicate::str::contains("frequency_hz = 50"))
        .stdout(predicate::str::contains("[secondary]"));
}

#[test]
fn feedgen_config_check_rejects_bad_frequency() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "frequency_hz = 55.0\n").unwrap();

    Command::cargo_bin("feedgen")
        .unwrap()
        .args(["config", "check"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("frequency"));
}

#[test]
fn feedgen_catalog_lists_scope() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());

    Command::cargo_bin("feedgen")
        .unwrap()
        .args(["catalog", "transformers"])
        .arg(dir.path().join("transformers.csv"))
        .args(["--scope", "substation"])
        .assert()
        .success()
        .stdout(predicate::str::contains("st-5000"))
        .stdout(predicate::str::contains("dt-25").not());
}
