// ABOUTME: End-to-end tests for the threadset binary.
// ABOUTME: Runs make and curate against temp directories and checks outputs and exit codes.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use threadset_corpus::{read_corpus, TreeState};

const CAFE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rows>
  <row>
    <title>전세 보증금</title>
    <detail_content>집주인이 보증금을 안 돌려줍니다</detail_content>
    <registered_date>2024.03.05. 09:00</registered_date>
    <comment_html><![CDATA[
      <ul data-v-7db6cb9f class="comment_list">
        <li data-v-49558ed9 data-v-7db6cb9f><p class="comment_content">지급명령을 신청하세요</p><span class="date">2024.03.05. 10:00</span></li>
        <li data-v-49558ed9 data-v-7db6cb9f class="reply"><p class="comment_content">감사합니다</p><span class="date">2024.03.05. 11:00</span></li>
      </ul>]]></comment_html>
  </row>
  <row>
    <title>댓글 없는 글</title>
    <detail_content>아무도 답이 없네요</detail_content>
  </row>
</rows>"#;

const LAWTALK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rows>
  <row>
    <title>임대차 분쟁 해결</title>
    <detail_content>보증금을 돌려받은 사례입니다</detail_content>
    <link>https://www.lawtalk.co.kr/solutions/12</link>
    <lawyer_name>김변호사</lawyer_name>
    <comment_html><![CDATA[<div class="solution-card__content">내용증명 후 전액 반환받았습니다</div>]]></comment_html>
  </row>
</rows>"#;

fn threadset() -> Command {
    Command::cargo_bin("threadset").unwrap()
}

/// Writes the cafe document and runs `make` into `rows.csv`.
fn made_dataset(dir: &Path) -> std::path::PathBuf {
    let xml = dir.join("cafe.xml");
    fs::write(&xml, CAFE_XML).unwrap();
    let rows = dir.join("rows.csv");
    threadset()
        .args(["make", "--source", "naver_cafe", "--input"])
        .arg(&xml)
        .arg("--output")
        .arg(&rows)
        .assert()
        .success();
    rows
}

fn denylist(dir: &Path, terms: &[&str]) -> std::path::PathBuf {
    let path = dir.join("deny.csv");
    let mut body = String::from("term\n");
    for term in terms {
        body.push_str(term);
        body.push('\n');
    }
    fs::write(&path, body).unwrap();
    path
}

fn working_dirs(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".threadset-work-"))
        .count()
}

#[test]
fn make_builds_rows_from_cafe_document() {
    let dir = tempfile::tempdir().unwrap();
    let xml = dir.path().join("cafe.xml");
    fs::write(&xml, CAFE_XML).unwrap();
    let out = dir.path().join("rows.jsonl");

    threadset()
        .args(["make", "--source", "naver_cafe", "--input"])
        .arg(&xml)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rows\": 4"))
        .stdout(predicate::str::contains("\"trees\": 2"));

    let (nodes, _) = read_corpus(&out).unwrap();
    let ids: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["naver_cafe-0-0", "naver_cafe-0-1", "naver_cafe-0-2", "naver_cafe-1-0"]);
}

#[test]
fn make_rejects_unknown_profile() {
    let dir = tempfile::tempdir().unwrap();
    let xml = dir.path().join("cafe.xml");
    fs::write(&xml, CAFE_XML).unwrap();
    let out = dir.path().join("rows.csv");

    threadset()
        .args(["make", "--source", "daum_cafe", "--input"])
        .arg(&xml)
        .arg("--output")
        .arg(&out)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("daum_cafe"));
    assert!(!out.exists());
}

#[test]
fn curate_filters_rows_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let rows = made_dataset(dir.path());
    let deny = denylist(dir.path(), &["감사합니다"]);
    let out = dir.path().join("curated.csv");

    threadset()
        .args(["curate", "--undersample", "1.5", "--workers", "2", "--input"])
        .arg(&rows)
        .arg("--output")
        .arg(&out)
        .arg("--filter")
        .arg(&deny)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stage\": \"filter\""))
        .stdout(predicate::str::contains("\"rows\": 3"));

    let (nodes, encoding) = read_corpus(&out).unwrap();
    assert!(encoding.is_utf8());
    let ids: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["naver_cafe-0-0", "naver_cafe-0-1", "naver_cafe-1-0"]);
    assert!(nodes.iter().all(|n| n.tree_state == TreeState::ReadyForExport));
    assert_eq!(working_dirs(dir.path()), 0);
    assert!(rows.is_file());
}

#[test]
fn curate_writes_tree_documents() {
    let dir = tempfile::tempdir().unwrap();
    let rows = made_dataset(dir.path());
    let deny = denylist(dir.path(), &[]);
    let out = dir.path().join("trees.json");

    threadset()
        .args(["curate", "--undersample", "2", "--input"])
        .arg(&rows)
        .arg("--output")
        .arg(&out)
        .arg("--filter")
        .arg(&deny)
        .assert()
        .success();

    let docs: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(docs.as_array().map(Vec::len), Some(2));
    assert_eq!(docs[0]["prompt"]["replies"][0]["replies"][0]["text"], "감사합니다");
}

#[test]
fn curate_rejects_ratio_below_one() {
    let dir = tempfile::tempdir().unwrap();
    let rows = made_dataset(dir.path());
    let deny = denylist(dir.path(), &["감사합니다"]);
    let out = dir.path().join("curated.csv");

    threadset()
        .args(["curate", "--undersample", "0.5", "--input"])
        .arg(&rows)
        .arg("--output")
        .arg(&out)
        .arg("--filter")
        .arg(&deny)
        .assert()
        .code(2);
    assert!(!out.exists());
    assert_eq!(working_dirs(dir.path()), 0);
}

#[test]
fn curate_writes_spreadsheet_output() {
    let dir = tempfile::tempdir().unwrap();
    let rows = made_dataset(dir.path());
    let deny = denylist(dir.path(), &["감사합니다"]);
    let out = dir.path().join("curated.xlsx");

    threadset()
        .args(["curate", "--undersample", "2", "--input"])
        .arg(&rows)
        .arg("--output")
        .arg(&out)
        .arg("--filter")
        .arg(&deny)
        .assert()
        .success();

    let (nodes, _) = read_corpus(&out).unwrap();
    let ids: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["naver_cafe-0-0", "naver_cafe-0-1", "naver_cafe-1-0"]);
    assert_eq!(nodes[1].text, "지급명령을 신청하세요");
    assert_eq!(nodes[1].parent_id.as_deref(), Some("naver_cafe-0-0"));
}

#[test]
fn curate_rejects_unknown_output_extension() {
    let dir = tempfile::tempdir().unwrap();
    let rows = made_dataset(dir.path());
    let deny = denylist(dir.path(), &["감사합니다"]);
    let out = dir.path().join("curated.parquet");

    threadset()
        .args(["curate", "--undersample", "2", "--input"])
        .arg(&rows)
        .arg("--output")
        .arg(&out)
        .arg("--filter")
        .arg(&deny)
        .assert()
        .code(2);
    assert!(!out.exists());
}

#[test]
fn curate_balances_sources_made_separately() {
    let dir = tempfile::tempdir().unwrap();
    let cafe_xml = dir.path().join("cafe.xml");
    fs::write(&cafe_xml, CAFE_XML).unwrap();
    let cafe = dir.path().join("cafe.jsonl");
    threadset()
        .args(["make", "--source", "naver_cafe", "--input"])
        .arg(&cafe_xml)
        .arg("--output")
        .arg(&cafe)
        .assert()
        .success();

    let lawtalk_xml = dir.path().join("lawtalk.xml");
    fs::write(&lawtalk_xml, LAWTALK_XML).unwrap();
    let lawtalk = dir.path().join("lawtalk.jsonl");
    threadset()
        .args(["make", "--source", "lawtalk_success", "--input"])
        .arg(&lawtalk_xml)
        .arg("--output")
        .arg(&lawtalk)
        .assert()
        .success();

    let mut combined = fs::read_to_string(&cafe).unwrap();
    if !combined.ends_with('\n') {
        combined.push('\n');
    }
    combined.push_str(&fs::read_to_string(&lawtalk).unwrap());
    let input = dir.path().join("combined.jsonl");
    fs::write(&input, combined).unwrap();
    let deny = denylist(dir.path(), &[]);
    let out = dir.path().join("balanced.jsonl");

    threadset()
        .args(["curate", "--undersample", "1.0", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .arg("--filter")
        .arg(&deny)
        .assert()
        .success();

    let (nodes, _) = read_corpus(&out).unwrap();
    let ids: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["naver_cafe-0-0", "naver_cafe-0-1", "lawtalk_success-0-0", "lawtalk_success-0-1"]
    );
}

#[test]
fn curate_missing_filter_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let rows = made_dataset(dir.path());
    let out = dir.path().join("curated.csv");

    threadset()
        .args(["curate", "--undersample", "2", "--input"])
        .arg(&rows)
        .arg("--output")
        .arg(&out)
        .arg("--filter")
        .arg(dir.path().join("missing.csv"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("filter file not found"));
    assert!(!out.exists());
}

#[test]
fn curate_that_removes_everything_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let rows = made_dataset(dir.path());
    let deny = denylist(dir.path(), &["보증금", "댓글"]);
    let out = dir.path().join("curated.csv");

    threadset()
        .args(["curate", "--undersample", "2", "--input"])
        .arg(&rows)
        .arg("--output")
        .arg(&out)
        .arg("--filter")
        .arg(&deny)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("filter"));
    assert!(!out.exists());
    assert_eq!(working_dirs(dir.path()), 0);
}
