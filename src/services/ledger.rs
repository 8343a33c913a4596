//! 账本（CSV）追加
//!
//! 追加时保留原文件的全部字节，只在末尾写新行；新文件才写表头。
//! 已有表头决定新行的列顺序，未知列写空值。

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::models::LedgerRow;

/// 在已有账本后追加一行，返回新文件内容
pub fn append_row(existing: Option<&[u8]>, row: &LedgerRow) -> Result<Vec<u8>, csv::Error> {
    let existing = existing.filter(|bytes| bytes.iter().any(|b| !b.is_ascii_whitespace()));

    let Some(existing) = existing else {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(LedgerRow::COLUMNS)?;
        writer.write_record(LedgerRow::COLUMNS.iter().map(|col| row.field(col)))?;
        return into_bytes(writer);
    };

    let header = read_header(existing)?;
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(header.iter().map(|col| row.field(col.trim())))?;
    let new_line = into_bytes(writer)?;

    let mut content = Vec::with_capacity(existing.len() + new_line.len() + 1);
    content.extend_from_slice(existing);
    if !existing.ends_with(b"\n") {
        content.push(b'\n');
    }
    content.extend_from_slice(&new_line);
    Ok(content)
}

/// 数据行数（不含表头）
pub fn count_rows(content: &[u8]) -> Result<usize, csv::Error> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(content);
    let mut count = 0;
    for record in reader.records() {
        record?;
        count += 1;
    }
    Ok(count)
}

/// 读取所有数据行
pub fn read_rows(content: &[u8]) -> Result<Vec<StringRecord>, csv::Error> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(content);
    reader.records().collect()
}

fn read_header(content: &[u8]) -> Result<StringRecord, csv::Error> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(content);
    Ok(reader.headers()?.clone())
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, csv::Error> {
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, answer: &str) -> LedgerRow {
        LedgerRow {
            id: id.to_string(),
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            user: "anonymous".to_string(),
            language: "Bengali".to_string(),
            script: "native".to_string(),
            input_mode: "text".to_string(),
            question: "আপনি কী খান?".to_string(),
            answer: answer.to_string(),
            has_audio: "false".to_string(),
            has_image: "false".to_string(),
        }
    }

    #[test]
    fn test_new_ledger_gets_header() {
        let content = append_row(None, &row("1", "ভাত")).unwrap();
        let text = String::from_utf8(content.clone()).unwrap();
        assert!(text.starts_with("id,timestamp,user,language,script,input_mode,question,answer,has_audio,has_image\n"));
        assert_eq!(count_rows(&content).unwrap(), 1);
    }

    #[test]
    fn test_blank_existing_is_treated_as_new() {
        let content = append_row(Some(&b"\n  \n"[..]), &row("1", "ভাত")).unwrap();
        assert!(content.starts_with(b"id,"));
        assert_eq!(count_rows(&content).unwrap(), 1);
    }

    #[test]
    fn test_quoted_fields_roundtrip() {
        let content = append_row(None, &row("1", "ভাত, মাছ\nআর \"ডাল\"")).unwrap();
        let rows = read_rows(&content).unwrap();
        assert_eq!(&rows[0][7], "ভাত, মাছ\nআর \"ডাল\"");
    }

    #[test]
    fn test_existing_header_order_is_followed() {
        let existing = b"answer,id,extra\nold,0,x\n";
        let content = append_row(Some(&existing[..]), &row("7", "new")).unwrap();
        assert_eq!(content, b"answer,id,extra\nold,0,x\nnew,7,\n");
    }

    #[test]
    fn test_missing_trailing_newline_is_fixed() {
        let existing = b"id,answer\n1,a";
        let content = append_row(Some(&existing[..]), &row("2", "b")).unwrap();
        assert_eq!(content, b"id,answer\n1,a\n2,b\n");
    }
}
