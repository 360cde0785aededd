//! Export answered questions as a DOCX file.
//!
//! The archive carries the minimal OOXML parts a word processor needs:
//! `[Content_Types].xml`, the package relationships, and
//! `word/document.xml` holding a title followed by one Q/A/Sources block
//! per history record.

use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use sqlx::{Row, SqlitePool};
use std::io::Write as _;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::models::QaRecord;

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>
"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>
"#;

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// History records for the given ids, in id order.
///
/// Ids with no matching record are silently skipped; the caller decides
/// whether an empty result is an error.
pub async fn fetch_qa_by_ids(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<QaRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(",");
    let sql = format!(
        "SELECT id, question, answer, score, source_chunk_ids, created_at \
         FROM qa_history WHERE id IN ({}) ORDER BY id ASC",
        placeholders
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(pool).await?;

    Ok(rows
        .iter()
        .map(|row| QaRecord {
            id: row.get("id"),
            question: row.get("question"),
            answer: row.get("answer"),
            score: row.get("score"),
            source_chunk_ids: row.get("source_chunk_ids"),
            created_at: row.get("created_at"),
        })
        .collect())
}

/// Assemble the complete DOCX archive in memory.
pub fn build_docx(records: &[QaRecord], title: &str) -> Result<Vec<u8>> {
    let document_xml = build_document_xml(records, title)?;

    let cursor = std::io::Cursor::new(Vec::new());
    let mut archive = zip::ZipWriter::new(cursor);
    let options = zip::write::SimpleFileOptions::default();

    archive.start_file("[Content_Types].xml", options)?;
    archive.write_all(CONTENT_TYPES_XML.as_bytes())?;
    archive.start_file("_rels/.rels", options)?;
    archive.write_all(RELS_XML.as_bytes())?;
    archive.start_file("word/document.xml", options)?;
    archive.write_all(&document_xml)?;

    let cursor = archive.finish()?;
    Ok(cursor.into_inner())
}

fn build_document_xml(records: &[QaRecord], title: &str) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut document = BytesStart::new("w:document");
    document.push_attribute(("xmlns:w", WORD_NS));
    writer.write_event(Event::Start(document))?;
    writer.write_event(Event::Start(BytesStart::new("w:body")))?;

    write_title(&mut writer, title)?;
    write_paragraph(&mut writer, "", false)?;

    for record in records {
        write_paragraph(&mut writer, &format!("Q: {}", record.question), true)?;
        let answer = if record.answer.is_empty() {
            "(no answer)"
        } else {
            record.answer.as_str()
        };
        write_paragraph(&mut writer, &format!("A: {}", answer), false)?;
        let sources = if record.source_chunk_ids.is_empty() {
            "none".to_string()
        } else {
            format!("chunks {}", record.source_chunk_ids)
        };
        write_paragraph(
            &mut writer,
            &format!("Sources: {} (score {:.3})", sources, record.score),
            false,
        )?;
        write_paragraph(&mut writer, "", false)?;
    }

    writer.write_event(Event::End(BytesEnd::new("w:body")))?;
    writer.write_event(Event::End(BytesEnd::new("w:document")))?;

    Ok(writer.into_inner())
}

fn write_title(writer: &mut Writer<Vec<u8>>, title: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;
    writer.write_event(Event::Start(BytesStart::new("w:pPr")))?;
    let mut jc = BytesStart::new("w:jc");
    jc.push_attribute(("w:val", "center"));
    writer.write_event(Event::Empty(jc))?;
    writer.write_event(Event::End(BytesEnd::new("w:pPr")))?;

    writer.write_event(Event::Start(BytesStart::new("w:r")))?;
    writer.write_event(Event::Start(BytesStart::new("w:rPr")))?;
    writer.write_event(Event::Empty(BytesStart::new("w:b")))?;
    let mut sz = BytesStart::new("w:sz");
    sz.push_attribute(("w:val", "32"));
    writer.write_event(Event::Empty(sz))?;
    writer.write_event(Event::End(BytesEnd::new("w:rPr")))?;
    write_text(writer, title)?;
    writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}

fn write_paragraph(writer: &mut Writer<Vec<u8>>, text: &str, bold: bool) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;
    if !text.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("w:r")))?;
        if bold {
            writer.write_event(Event::Start(BytesStart::new("w:rPr")))?;
            writer.write_event(Event::Empty(BytesStart::new("w:b")))?;
            writer.write_event(Event::End(BytesEnd::new("w:rPr")))?;
        }
        write_text(writer, text)?;
        writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}

fn write_text(writer: &mut Writer<Vec<u8>>, text: &str) -> Result<()> {
    let mut t = BytesStart::new("w:t");
    t.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(t))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("w:t")))?;
    Ok(())
}

/// Export history records to a DOCX file on disk.
pub async fn run_export(
    config: &Config,
    ids: &[i64],
    title: Option<String>,
    out: &Path,
) -> Result<()> {
    if ids.is_empty() {
        anyhow::bail!("no history ids given");
    }

    let pool = db::connect(config).await?;
    let records = fetch_qa_by_ids(&pool, ids).await?;
    if records.is_empty() {
        anyhow::bail!("no history records found for the given ids");
    }

    let title = title.unwrap_or_else(|| "Q&A Export".to_string());
    let bytes = build_docx(&records, &title)?;
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(out, &bytes).with_context(|| format!("Failed to write {}", out.display()))?;

    eprintln!("Exported {} records to {}", records.len(), out.display());

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, question: &str, answer: &str) -> QaRecord {
        QaRecord {
            id,
            question: question.to_string(),
            answer: answer.to_string(),
            score: 0.87,
            source_chunk_ids: "1,5,7".to_string(),
            created_at: "2024-05-01T10:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn built_docx_reads_back_as_text() {
        let records = vec![
            record(1, "what is the weight & size?", "0.209 kg"),
            record(2, "battery?", ""),
        ];
        let bytes = build_docx(&records, "Product Answers").unwrap();
        let text = crate::extract::extract_docx(&bytes).unwrap();

        assert!(text.contains("Product Answers"));
        assert!(text.contains("Q: what is the weight & size?"));
        assert!(text.contains("A: 0.209 kg"));
        assert!(text.contains("A: (no answer)"));
        assert!(text.contains("Sources: chunks 1,5,7 (score 0.870)"));
    }

    #[test]
    fn empty_record_list_still_builds_valid_archive() {
        let bytes = build_docx(&[], "Empty Export").unwrap();
        let text = crate::extract::extract_docx(&bytes).unwrap();
        assert_eq!(text, "Empty Export");
    }
}
