mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

use bag2media::manifest::ImageManifest;
use bag2media::{ExtractOptions, Naming, extract_images};
use common::{BAG_START_NS, CAMERA_TOPIC, write_compressed_bag, write_fixture_bag};

fn files_with_ext(folder: &std::path::Path, ext: &str) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(folder)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(ext))
        .collect();
    names.sort();
    names
}

#[test]
fn inspect_lists_topics() {
    let dir = tempfile::tempdir().unwrap();
    let bag = write_fixture_bag(dir.path(), "run.bag", 5);

    let mut cmd = Command::cargo_bin("bag2media").unwrap();
    cmd.arg("inspect")
        .arg(&bag)
        .assert()
        .success()
        .stdout(predicate::str::contains("Topic"))
        .stdout(predicate::str::contains(CAMERA_TOPIC))
        .stdout(predicate::str::contains("std_msgs/UInt32"))
        .stdout(predicate::str::contains("Total messages: 15"));
}

#[test]
fn images_command_writes_frames_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let bag = write_fixture_bag(dir.path(), "run.bag", 6);
    let out = dir.path().join("frames");

    let mut cmd = Command::cargo_bin("bag2media").unwrap();
    cmd.args(["images", "--no-progress", "-i"])
        .arg(&bag)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let folder = out.join("camera_image_raw");
    assert!(folder.join("camera_image_raw_000000.jpg").is_file());
    assert!(folder.join("camera_image_raw_000005.jpg").is_file());

    let manifest = ImageManifest::read(&folder).unwrap();
    assert_eq!(manifest.images.len(), 6);
    let topic = manifest.topic.as_ref().unwrap();
    assert_eq!(topic.message_count, 6);
    assert_eq!(manifest.frame_rate(), Some(10.0));
}

#[test]
fn sampling_and_timestamp_naming() {
    let dir = tempfile::tempdir().unwrap();
    let bag = write_fixture_bag(dir.path(), "run.bag", 10);
    let out = dir.path().join("frames");

    let options = ExtractOptions {
        bag_path: bag,
        output_folder: out.clone(),
        file_format: "png".parse().unwrap(),
        naming: Naming::RosbagTimestamp,
        sample: Some(3),
        show_progress: false,
        ..Default::default()
    };
    let folders = extract_images(&options).unwrap();
    assert_eq!(folders, vec![out.join("camera_image_raw")]);

    let mut names: Vec<String> = fs::read_dir(&folders[0])
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".png"))
        .collect();
    names.sort();
    // messages 0, 3, 6, 9
    assert_eq!(names.len(), 4);
    assert_eq!(names[0], format!("camera_image_raw_{BAG_START_NS}.png"));
}

#[test]
fn time_window_limits_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let bag = write_fixture_bag(dir.path(), "run.bag", 10);
    let out = dir.path().join("frames");

    let options = ExtractOptions {
        bag_path: bag,
        output_folder: out.clone(),
        start_time: Some(0.25),
        end_time: Some(0.55),
        show_progress: false,
        ..Default::default()
    };
    extract_images(&options).unwrap();
    let manifest = ImageManifest::read(&out.join("camera_image_raw")).unwrap();
    let mut indices: Vec<u64> = manifest.images.values().map(|e| e.msg_index).collect();
    indices.sort();
    assert_eq!(indices, vec![3, 4, 5]);
}

#[test]
fn unknown_topic_extracts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let bag = write_fixture_bag(dir.path(), "run.bag", 2);

    let options = ExtractOptions {
        bag_path: bag,
        output_folder: dir.path().join("frames"),
        topics: Some(vec!["/does/not/exist".to_string(), "/counter".to_string()]),
        show_progress: false,
        ..Default::default()
    };
    assert!(extract_images(&options).unwrap().is_empty());
    assert!(!dir.path().join("frames").exists());
}

#[test]
fn compressed_and_depth_topics_are_extracted() {
    let dir = tempfile::tempdir().unwrap();
    let bag = write_compressed_bag(dir.path(), "compressed.bag", 3);
    let out = dir.path().join("frames");

    let options = ExtractOptions {
        bag_path: bag,
        output_folder: out.clone(),
        file_format: "png".parse().unwrap(),
        show_progress: false,
        ..Default::default()
    };
    let folders = extract_images(&options).unwrap();
    assert_eq!(
        folders,
        vec![out.join("camera_compressed"), out.join("depth_compressedDepth")]
    );

    let colour = folders[0].join("camera_compressed_000000.png");
    assert_eq!(files_with_ext(&folders[0], ".png").len(), 3);
    let img = image::open(&colour).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (4, 3));
    assert_eq!(img.get_pixel(1, 2).0, [50, 160, 0]);

    assert_eq!(files_with_ext(&folders[1], ".png").len(), 3);
    let depth = image::open(folders[1].join("depth_compressedDepth_000001.png")).unwrap();
    assert_eq!(depth.color(), image::ColorType::Rgb8);
    // lowest depth maps to the dark blue end of the jet ramp
    assert_eq!(depth.to_rgb8().get_pixel(0, 0).0, [0, 0, 128]);
}

#[test]
fn msg_timestamp_naming_uses_header_stamp() {
    let dir = tempfile::tempdir().unwrap();
    let bag = write_fixture_bag(dir.path(), "run.bag", 2);
    let out = dir.path().join("frames");

    let options = ExtractOptions {
        bag_path: bag,
        output_folder: out.clone(),
        naming: Naming::MsgTimestamp,
        show_progress: false,
        ..Default::default()
    };
    extract_images(&options).unwrap();
    assert_eq!(
        files_with_ext(&out.join("camera_image_raw"), ".jpg"),
        vec![
            "camera_image_raw_100000000000.jpg".to_string(),
            "camera_image_raw_101000000000.jpg".to_string()
        ]
    );
}

#[test]
fn existing_manifest_survives_a_second_run() {
    let dir = tempfile::tempdir().unwrap();
    let bag = write_fixture_bag(dir.path(), "run.bag", 6);
    let out = dir.path().join("frames");
    let folder = out.join("camera_image_raw");

    let mut options = ExtractOptions {
        bag_path: bag,
        output_folder: out,
        show_progress: false,
        ..Default::default()
    };
    extract_images(&options).unwrap();
    let before = fs::read(folder.join("img_manifest.json")).unwrap();

    options.sample = Some(2);
    extract_images(&options).unwrap();
    let after = fs::read(folder.join("img_manifest.json")).unwrap();
    assert_eq!(before, after);
    assert_eq!(ImageManifest::read(&folder).unwrap().images.len(), 6);
}

#[cfg(unix)]
#[test]
fn images_with_video_replaces_frames() {
    let dir = tempfile::tempdir().unwrap();
    let bag = write_fixture_bag(dir.path(), "run.bag", 4);
    let ffmpeg = common::fake_ffmpeg(dir.path());
    let out = dir.path().join("frames");

    let mut cmd = Command::cargo_bin("bag2media").unwrap();
    cmd.env("BAG2MEDIA_FFMPEG", &ffmpeg)
        .args(["images", "--no-progress", "--video", "--keep-images", "false", "-i"])
        .arg(&bag)
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let folder = out.join("camera_image_raw");
    assert!(folder.join("video.mp4").is_file());
    assert!(!folder.join("temp.mp4").exists());
    assert!(files_with_ext(&folder, ".jpg").is_empty());
    assert!(folder.join("img_manifest.json").is_file());
}

#[cfg(unix)]
#[test]
fn video_command_keeps_frames_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let bag = write_fixture_bag(dir.path(), "run.bag", 3);
    let ffmpeg = common::fake_ffmpeg(dir.path());
    let out = dir.path().join("frames");
    extract_images(&ExtractOptions {
        bag_path: bag,
        output_folder: out.clone(),
        show_progress: false,
        ..Default::default()
    })
    .unwrap();
    let folder = out.join("camera_image_raw");

    let mut cmd = Command::cargo_bin("bag2media").unwrap();
    cmd.env("BAG2MEDIA_FFMPEG", &ffmpeg)
        .args(["video", "-i"])
        .arg(&folder)
        .assert()
        .success();
    assert!(folder.join("video.mp4").is_file());
    assert_eq!(files_with_ext(&folder, ".jpg").len(), 3);

    fs::remove_file(folder.join("video.mp4")).unwrap();
    let mut cmd = Command::cargo_bin("bag2media").unwrap();
    cmd.env("BAG2MEDIA_FFMPEG", &ffmpeg)
        .args(["video", "--keep-images", "false", "-i"])
        .arg(&folder)
        .assert()
        .success();
    assert!(folder.join("video.mp4").is_file());
    assert!(files_with_ext(&folder, ".jpg").is_empty());
}
