// ABOUTME: Streaming XML reader for scraped post records.
// ABOUTME: Any element holding known field tags is one record; embedded markup is kept verbatim.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{Result, SourceError};

/// Child tags recognised inside a record.
pub const FIELD_TAGS: &[&str] = &[
    "comment_html",
    "title",
    "registered_date",
    "detail_content",
    "link",
    "lawyer_name",
];

/// One scraped post with its comment section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlRecord {
    pub comment_html: Option<String>,
    pub title: Option<String>,
    pub registered_date: Option<String>,
    pub detail_content: Option<String>,
    pub link: Option<String>,
    pub lawyer_name: Option<String>,
}

impl XmlRecord {
    fn set(&mut self, tag: &str, value: String) {
        let value = value.trim().to_string();
        let value = (!value.is_empty()).then_some(value);
        match tag {
            "comment_html" => self.comment_html = value,
            "title" => self.title = value,
            "registered_date" => self.registered_date = value,
            "detail_content" => self.detail_content = value,
            "link" => self.link = value,
            "lawyer_name" => self.lawyer_name = value,
            _ => {}
        }
    }
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Field currently being captured.
struct Capture {
    tag: String,
    depth: usize,
    text: String,
}

/// Reads every record of an XML document in document order.
pub fn read_records(xml: &str) -> Result<Vec<XmlRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut records = Vec::new();

    let mut depth = 0usize;
    let mut record: Option<(usize, XmlRecord)> = None;
    let mut capture: Option<Capture> = None;

    loop {
        let event = reader.read_event().map_err(|e| SourceError::Xml {
            position: reader.buffer_position(),
            message: e.to_string(),
        })?;
        match event {
            Event::Start(ref e) => {
                depth += 1;
                if let Some(cap) = capture.as_mut() {
                    cap.text.push('<');
                    cap.text.push_str(&String::from_utf8_lossy(e));
                    cap.text.push('>');
                    continue;
                }
                let name = local_name(e);
                if FIELD_TAGS.contains(&name.as_str()) {
                    if record.is_none() {
                        record = Some((depth - 1, XmlRecord::default()));
                    }
                    capture = Some(Capture { tag: name, depth, text: String::new() });
                }
            }
            Event::Empty(ref e) => {
                if let Some(cap) = capture.as_mut() {
                    cap.text.push('<');
                    cap.text.push_str(&String::from_utf8_lossy(e));
                    cap.text.push_str("/>");
                }
            }
            Event::End(ref e) => {
                if let Some(cap) = capture.take() {
                    if cap.depth == depth {
                        if let Some((_, rec)) = record.as_mut() {
                            rec.set(&cap.tag, cap.text);
                        }
                    } else {
                        let mut cap = cap;
                        cap.text.push_str("</");
                        cap.text.push_str(&String::from_utf8_lossy(e.name().as_ref()));
                        cap.text.push('>');
                        capture = Some(cap);
                    }
                } else if record.as_ref().is_some_and(|(d, _)| *d == depth) {
                    if let Some((_, rec)) = record.take() {
                        records.push(rec);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(ref e) => {
                if let Some(cap) = capture.as_mut() {
                    let text = e.decode().map_err(|err| SourceError::Xml {
                        position: reader.buffer_position(),
                        message: err.to_string(),
                    })?;
                    cap.text.push_str(&text);
                }
            }
            Event::CData(ref e) => {
                if let Some(cap) = capture.as_mut() {
                    cap.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::GeneralRef(ref e) => {
                if let Some(cap) = capture.as_mut() {
                    let name = String::from_utf8_lossy(e).into_owned();
                    match e.resolve_char_ref() {
                        Ok(Some(ch)) => cap.text.push(ch),
                        _ => match quick_xml::escape::resolve_predefined_entity(&name) {
                            Some(resolved) => cap.text.push_str(resolved),
                            None => {
                                cap.text.push('&');
                                cap.text.push_str(&name);
                                cap.text.push(';');
                            }
                        },
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some((_, rec)) = record {
        records.push(rec);
    }
    tracing::info!(records = records.len(), "read xml records");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_each_record_element() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rows>
  <row>
    <title>보증금 문의</title>
    <detail_content>전세 보증금을 못 받았습니다</detail_content>
    <registered_date>2024.03.05. 21:07</registered_date>
    <comment_html><![CDATA[<ul class="comment_list"><li>답변</li></ul>]]></comment_html>
  </row>
  <row>
    <title>두번째</title>
    <link>https://www.lawtalk.co.kr/qna/2</link>
    <lawyer_name>김변호사</lawyer_name>
  </row>
</rows>"#;
        let records = read_records(xml).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title.as_deref(), Some("보증금 문의"));
        assert_eq!(
            records[0].comment_html.as_deref(),
            Some(r#"<ul class="comment_list"><li>답변</li></ul>"#)
        );
        assert_eq!(records[1].lawyer_name.as_deref(), Some("김변호사"));
        assert_eq!(records[1].comment_html, None);
    }

    #[test]
    fn escaped_markup_is_unescaped() {
        let xml = "<rows><row><comment_html>&lt;p class=&quot;c&quot;&gt;a &amp; b&lt;/p&gt;</comment_html></row></rows>";
        let records = read_records(xml).unwrap();
        assert_eq!(records[0].comment_html.as_deref(), Some(r#"<p class="c">a & b</p>"#));
    }

    #[test]
    fn inline_markup_is_kept_verbatim() {
        let xml = r#"<rows><row><comment_html><div class="x"><span>hi</span><br/></div></comment_html><title>t</title></row></rows>"#;
        let records = read_records(xml).unwrap();
        assert_eq!(
            records[0].comment_html.as_deref(),
            Some(r#"<div class="x"><span>hi</span><br/></div>"#)
        );
        assert_eq!(records[0].title.as_deref(), Some("t"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let err = read_records("<rows><row><title>x</row></rows>").unwrap_err();
        assert!(matches!(err, SourceError::Xml { .. }));
    }

    #[test]
    fn document_without_fields_has_no_records() {
        assert!(read_records("<rows><row><other>x</other></row></rows>").unwrap().is_empty());
    }
}
