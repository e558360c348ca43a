use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (document table)");
        conn.execute_batch(
            "
            CREATE TABLE documents (
                seq     INTEGER PRIMARY KEY AUTOINCREMENT,
                kind    TEXT NOT NULL,
                id      TEXT NOT NULL,
                body    TEXT NOT NULL,
                UNIQUE (kind, id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (username index)");
        conn.execute_batch(
            "
            CREATE UNIQUE INDEX idx_documents_username
                ON documents (json_extract(body, '$.username'))
                WHERE kind = 'users';

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    Ok(())
}
