mod common;

use assert_cmd::Command;
use std::fs;

use common::{BAG_START_NS, COUNTER_TOPIC, write_fixture_bag};

#[test]
fn summary_of_folder_is_keyed_by_bag_path() {
    let dir = tempfile::tempdir().unwrap();
    let bags = dir.path().join("bags");
    fs::create_dir_all(bags.join("day2")).unwrap();
    write_fixture_bag(&bags, "a.bag", 4);
    write_fixture_bag(&bags.join("day2"), "b.bag", 2);
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();

    let mut cmd = Command::cargo_bin("bag2media").unwrap();
    cmd.arg("summary").arg("-i").arg(&bags).arg("-o").arg(&out).assert().success();

    let text = fs::read_to_string(out.join("rosbag_metadata.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    let map = json.as_object().unwrap();
    assert_eq!(map.len(), 2);

    let (_, a) = map.iter().find(|(k, _)| k.ends_with("a.bag")).unwrap();
    assert_eq!(a["file_name"], "a.bag");
    let start = a["start_time"].as_f64().unwrap();
    assert!((start - BAG_START_NS as f64 / 1e9).abs() < 1e-6);
    let topics = a["topics"].as_array().unwrap();
    let counter = topics.iter().find(|t| t["topic"] == COUNTER_TOPIC).unwrap();
    assert_eq!(counter["message_count"], 8);
}

#[test]
fn split_summary_writes_hidden_file_next_to_bag() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture_bag(dir.path(), "a.bag", 3);

    let mut cmd = Command::cargo_bin("bag2media").unwrap();
    cmd.arg("summary")
        .arg("-i")
        .arg(dir.path())
        .args(["--split", "--hidden"])
        .assert()
        .success();
    assert!(dir.path().join(".a.bag.json").is_file());
}

#[test]
fn split_summary_mirrors_input_tree_under_output() {
    let dir = tempfile::tempdir().unwrap();
    let bags = dir.path().join("bags");
    fs::create_dir_all(bags.join("day2")).unwrap();
    write_fixture_bag(&bags, "a.bag", 2);
    write_fixture_bag(&bags.join("day2"), "b.bag", 2);
    let out = dir.path().join("out");

    let mut cmd = Command::cargo_bin("bag2media").unwrap();
    cmd.arg("summary")
        .arg("-i")
        .arg(&bags)
        .arg("-o")
        .arg(&out)
        .arg("-s")
        .assert()
        .success();

    assert!(out.join("a.bag.json").is_file());
    let nested = out.join("day2").join("b.bag.json");
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&nested).unwrap()).unwrap();
    assert_eq!(json["file_name"], "b.bag");
    assert!(!bags.join("a.bag.json").exists());
}

#[test]
fn summary_without_output_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture_bag(dir.path(), "a.bag", 1);

    let mut cmd = Command::cargo_bin("bag2media").unwrap();
    cmd.arg("summary").arg("-i").arg(dir.path()).assert().failure();
}

#[test]
fn csv_export_flattens_messages() {
    let dir = tempfile::tempdir().unwrap();
    let bag = write_fixture_bag(dir.path(), "run.bag", 3);
    let out = dir.path().join("csv");

    let mut cmd = Command::cargo_bin("bag2media").unwrap();
    cmd.arg("csv")
        .arg("-i")
        .arg(&bag)
        .arg("-o")
        .arg(&out)
        .args(["--topics", "/counter"])
        .assert()
        .success();

    let table = out.join("run").join("counter.csv");
    let text = fs::read_to_string(&table).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Time,data");
    assert_eq!(lines.len(), 7);
    assert!(lines[2].ends_with(",1"));
    assert!(!out.join("run").join("camera-image_raw.csv").exists());
}

#[test]
fn csv_export_of_images_has_header_columns() {
    let dir = tempfile::tempdir().unwrap();
    let bag = write_fixture_bag(dir.path(), "run.bag", 2);
    let out = dir.path().join("csv");

    let written = bag2media::export_csv(&bag2media::CsvOptions {
        input: bag,
        output_dir: out.clone(),
        topics: None,
    })
    .unwrap();
    assert_eq!(written.len(), 2);

    let text = fs::read_to_string(out.join("run").join("camera-image_raw.csv")).unwrap();
    let header = text.lines().next().unwrap();
    assert!(header.starts_with("Time,header.seq,header.stamp.secs,header.stamp.nsecs,header.frame_id,height,width"));
}

#[test]
fn split_command_writes_numbered_parts() {
    let dir = tempfile::tempdir().unwrap();
    let bag = write_fixture_bag(dir.path(), "run.bag", 10);
    let out = dir.path().join("parts");

    let mut cmd = Command::cargo_bin("bag2media").unwrap();
    cmd.arg("split")
        .arg("-i")
        .arg(&bag)
        .arg("-o")
        .arg(&out)
        .args(["-c", "2"])
        .assert()
        .success();

    let first = out.join("run_part0001.bag");
    let second = out.join("run_part0002.bag");
    assert!(first.is_file());
    assert!(second.is_file());
    assert!(!out.join("run_part0003.bag").exists());

    let mut total = 0;
    for part in [&first, &second] {
        let summary = bag2media::summary::bag_info_from_file(part).unwrap().unwrap();
        total += summary.topics.iter().map(|t| t.message_count).sum::<u64>();
    }
    assert_eq!(total, 30);
}
