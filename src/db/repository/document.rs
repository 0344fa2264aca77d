use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::DocumentStatus;
use crate::models::Document;

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, name, mime_type, content, size_bytes, status, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            doc.id.to_string(),
            doc.name,
            doc.mime_type,
            doc.content,
            doc.size_bytes,
            doc.status.as_str(),
            doc.uploaded_at.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, mime_type, content, size_bytes, status, uploaded_at
         FROM documents WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok(DocumentRow {
                id: row.get(0)?,
                name: row.get(1)?,
                mime_type: row.get(2)?,
                content: row.get(3)?,
                size_bytes: row.get(4)?,
                status: row.get(5)?,
                uploaded_at: row.get(6)?,
            })
        },
    );

    match result {
        Ok(row) => Ok(Some(document_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// List documents in upload order (oldest first), optionally filtered by a
/// case-insensitive name substring.
pub fn list_documents(
    conn: &Connection,
    name_query: Option<&str>,
) -> Result<Vec<Document>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, mime_type, content, size_bytes, status, uploaded_at
         FROM documents
         WHERE ?1 IS NULL OR instr(lower(name), lower(?1)) > 0
         ORDER BY uploaded_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map(params![name_query], |row| {
        Ok(DocumentRow {
            id: row.get(0)?,
            name: row.get(1)?,
            mime_type: row.get(2)?,
            content: row.get(3)?,
            size_bytes: row.get(4)?,
            status: row.get(5)?,
            uploaded_at: row.get(6)?,
        })
    })?;

    let mut documents = Vec::new();
    for row in rows {
        documents.push(document_from_row(row?)?);
    }
    Ok(documents)
}

/// Documents with status `ready`, in upload order. The only set the
/// context builder and citation resolver ever see.
pub fn ready_documents(conn: &Connection) -> Result<Vec<Document>, DatabaseError> {
    let docs = list_documents(conn, None)?;
    Ok(docs
        .into_iter()
        .filter(|d| d.status == DocumentStatus::Ready)
        .collect())
}

/// Transition a document to `ready` with its decoded content.
pub fn mark_document_ready(
    conn: &Connection,
    id: &Uuid,
    content: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE documents SET status = 'ready', content = ?1 WHERE id = ?2",
        params![content, id.to_string()],
    )?;
    Ok(())
}

/// Transition a document to `error` (content stays empty).
pub fn mark_document_error(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE documents SET status = 'error' WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(())
}

pub fn delete_document(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let rows_affected = conn.execute(
        "DELETE FROM documents WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(rows_affected > 0)
}

/// Knowledge base counters for the stats card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStats {
    pub total: i64,
    pub ready: i64,
}

pub fn document_stats(conn: &Connection) -> Result<DocumentStats, DatabaseError> {
    let stats = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(status = 'ready'), 0) FROM documents",
        [],
        |row| {
            Ok(DocumentStats {
                total: row.get(0)?,
                ready: row.get(1)?,
            })
        },
    )?;
    Ok(stats)
}

struct DocumentRow {
    id: String,
    name: String,
    mime_type: String,
    content: String,
    size_bytes: i64,
    status: String,
    uploaded_at: String,
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    Ok(Document {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        name: row.name,
        mime_type: row.mime_type,
        content: row.content,
        size_bytes: row.size_bytes,
        status: DocumentStatus::from_str(&row.status)?,
        uploaded_at: NaiveDateTime::parse_from_str(&row.uploaded_at, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::{Local, Timelike};

    fn make_document(name: &str, status: DocumentStatus) -> Document {
        let now = Local::now().naive_local().with_nanosecond(0).unwrap();
        Document {
            id: Uuid::new_v4(),
            name: name.to_string(),
            mime_type: "text/plain".to_string(),
            content: String::new(),
            size_bytes: 0,
            status,
            uploaded_at: now,
        }
    }

    #[test]
    fn insert_and_get_document() {
        let conn = open_memory_database().unwrap();
        let doc = make_document("notes.txt", DocumentStatus::Processing);
        insert_document(&conn, &doc).unwrap();

        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.name, "notes.txt");
        assert_eq!(loaded.status, DocumentStatus::Processing);
    }

    #[test]
    fn mark_ready_populates_content() {
        let conn = open_memory_database().unwrap();
        let doc = make_document("notes.txt", DocumentStatus::Processing);
        insert_document(&conn, &doc).unwrap();

        mark_document_ready(&conn, &doc.id, "file body").unwrap();

        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Ready);
        assert_eq!(loaded.content, "file body");
    }

    #[test]
    fn mark_error_keeps_content_empty() {
        let conn = open_memory_database().unwrap();
        let doc = make_document("broken.bin", DocumentStatus::Processing);
        insert_document(&conn, &doc).unwrap();

        mark_document_error(&conn, &doc.id).unwrap();

        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Error);
        assert!(loaded.content.is_empty());
    }

    #[test]
    fn search_is_case_insensitive_contains() {
        let conn = open_memory_database().unwrap();
        insert_document(&conn, &make_document("Quarterly Report.md", DocumentStatus::Ready))
            .unwrap();
        insert_document(&conn, &make_document("notes.txt", DocumentStatus::Ready)).unwrap();

        let hits = list_documents(&conn, Some("report")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Quarterly Report.md");

        let all = list_documents(&conn, None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn ready_documents_excludes_processing_and_error() {
        let conn = open_memory_database().unwrap();
        insert_document(&conn, &make_document("a.txt", DocumentStatus::Ready)).unwrap();
        insert_document(&conn, &make_document("b.txt", DocumentStatus::Processing)).unwrap();
        insert_document(&conn, &make_document("c.txt", DocumentStatus::Error)).unwrap();

        let ready = ready_documents(&conn).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].name, "a.txt");
    }

    #[test]
    fn stats_count_total_and_ready() {
        let conn = open_memory_database().unwrap();
        insert_document(&conn, &make_document("a.txt", DocumentStatus::Ready)).unwrap();
        insert_document(&conn, &make_document("b.txt", DocumentStatus::Ready)).unwrap();
        insert_document(&conn, &make_document("c.txt", DocumentStatus::Error)).unwrap();

        let stats = document_stats(&conn).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.ready, 2);
    }

    #[test]
    fn delete_document_removes_row() {
        let conn = open_memory_database().unwrap();
        let doc = make_document("a.txt", DocumentStatus::Ready);
        insert_document(&conn, &doc).unwrap();

        assert!(delete_document(&conn, &doc.id).unwrap());
        assert!(get_document(&conn, &doc.id).unwrap().is_none());
        assert!(!delete_document(&conn, &doc.id).unwrap());
    }
}
