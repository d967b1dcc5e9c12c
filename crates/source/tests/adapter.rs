// ABOUTME: Integration tests for the source adapter from XML file to conversation trees.
// ABOUTME: Covers record reading, selector extraction, tree shape and charset handling.

use std::fs;

use pretty_assertions::assert_eq;
use threadset_corpus::{validate_forest, Role, TextEncoding, TreeBuilder, TreeState};
use threadset_source::{load_document, ProfileRegistry};

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

#[test]
fn cafe_document_becomes_three_level_tree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cafe.xml");
    fs::write(&path, CAFE_XML).unwrap();

    let registry = ProfileRegistry::load_builtin().unwrap();
    let profile = registry.get("naver_cafe").unwrap();
    let trees = load_document(&path, profile, &TreeBuilder::default()).unwrap();
    assert_eq!(trees.len(), 2);

    let first = &trees[0].nodes;
    let shape: Vec<_> = first.iter().map(|n| (n.id.as_str(), n.depth, n.role)).collect();
    assert_eq!(
        shape,
        vec![
            ("naver_cafe-0-0", 0, Role::Prompter),
            ("naver_cafe-0-1", 1, Role::Assistant),
            ("naver_cafe-0-2", 2, Role::Prompter),
        ]
    );
    assert_eq!(first[0].title.as_deref(), Some("전세 보증금"));
    assert_eq!(first[0].created_date.as_deref(), Some("2024-03-05 09:00:00"));
    assert_eq!(first[2].created_date.as_deref(), Some("2024-03-05 11:00:00"));
    assert_eq!(first[0].tree_state, TreeState::Growing);

    assert_eq!(trees[1].nodes.len(), 1);
    assert_eq!(trees[1].nodes[0].tree_state, TreeState::Initial);

    let all: Vec<_> = trees.into_iter().flat_map(|t| t.nodes).collect();
    assert!(validate_forest(&all).is_ok());
}

#[test]
fn lawtalk_document_keeps_link_and_lawyer() {
    let xml = r#"<rows><row>
        <title>상속 포기</title>
        <detail_content>빚만 있는 상속</detail_content>
        <link>https://www.lawtalk.co.kr/qna/77</link>
        <lawyer_name>이변호사</lawyer_name>
        <comment_html>&lt;div class="solution-card__content"&gt;한정승인을 검토하세요&lt;/div&gt;</comment_html>
    </row></rows>"#;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lawtalk.xml");
    fs::write(&path, xml).unwrap();

    let registry = ProfileRegistry::load_builtin().unwrap();
    let trees = load_document(&path, registry.get("lawtalk_성공사례").unwrap(), &TreeBuilder::default()).unwrap();
    let nodes = &trees[0].nodes;
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].link.as_deref(), Some("https://www.lawtalk.co.kr/qna/77"));
    assert_eq!(nodes[0].author_ref.as_deref(), Some("이변호사"));
    assert_eq!(nodes[1].text, "한정승인을 검토하세요");
    assert_eq!(nodes[1].created_date, None);
}

#[test]
fn euc_kr_documents_are_decoded() {
    let euc_kr = TextEncoding::for_label("euc-kr").unwrap();
    let xml = "<rows><row><title>임대차 분쟁 상담 요청드립니다</title><detail_content>계약 기간이 끝났는데 보증금을 돌려받지 못하고 있습니다. 어떻게 해야 하나요?</detail_content></row></rows>";
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.xml");
    fs::write(&path, euc_kr.encode(xml)).unwrap();

    let registry = ProfileRegistry::load_builtin().unwrap();
    let trees = load_document(&path, registry.get("naver_kin").unwrap(), &TreeBuilder::default()).unwrap();
    assert_eq!(trees[0].nodes[0].title.as_deref(), Some("임대차 분쟁 상담 요청드립니다"));
}
