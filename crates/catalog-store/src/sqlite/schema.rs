//! Table layout, connection setup and row mapping.

use std::time::Duration;

use catalog_tree::{CategoryId, CategoryName, CategoryNode};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};

use crate::error::{StoreError, StoreResult};

const MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS category (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  parent_id INTEGER NOT NULL,
  tree_id INTEGER NOT NULL,
  lft INTEGER NOT NULL,
  rgt INTEGER NOT NULL,
  name_primary TEXT NOT NULL,
  name_alias TEXT,
  name_mnemonic TEXT,
  description TEXT,
  icon TEXT
);

CREATE INDEX IF NOT EXISTS idx_category_tree_lft ON category(tree_id, lft);
CREATE INDEX IF NOT EXISTS idx_category_tree_rgt ON category(tree_id, rgt);
CREATE INDEX IF NOT EXISTS idx_category_parent ON category(parent_id);

CREATE TABLE IF NOT EXISTS store_meta (
  key TEXT PRIMARY KEY,
  value INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (key, value) VALUES ('revision', 0);
"#;

/// Column list matching [`map_row`].
pub(crate) const COLUMNS: &str =
    "id, parent_id, tree_id, lft, rgt, name_primary, name_alias, name_mnemonic, description, icon";

/// Per-connection settings.
pub(crate) fn configure(conn: &Connection, busy_timeout: Duration, file_backed: bool) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    if file_backed {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::trace!(%mode, "journal mode set");
        conn.pragma_update(None, "synchronous", "NORMAL")?;
    }
    Ok(())
}

/// Creates tables and indexes if missing.
pub(crate) fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(MIGRATION)
}

/// Maps a row selected with [`COLUMNS`].
pub(crate) fn map_row(row: &Row<'_>) -> rusqlite::Result<CategoryNode> {
    let primary: String = row.get(5)?;
    let name = CategoryName::from_parts(primary, row.get(6)?, row.get(7)?)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(err)))?;
    Ok(CategoryNode {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        tree_id: row.get(2)?,
        left: row.get(3)?,
        right: row.get(4)?,
        name,
        description: row.get(8)?,
        icon: row.get(9)?,
    })
}

/// Runs a node query and collects every row.
pub(crate) fn query_nodes<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> StoreResult<Vec<CategoryNode>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, map_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Loads one node by id.
pub(crate) fn load_node(conn: &Connection, id: CategoryId) -> StoreResult<Option<CategoryNode>> {
    let sql = format!("SELECT {COLUMNS} FROM category WHERE id = ?1");
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.query_row(params![id], map_row).optional()?)
}

/// Loads one node by id or fails with `NotFound`.
pub(crate) fn require_node(conn: &Connection, id: CategoryId) -> StoreResult<CategoryNode> {
    load_node(conn, id)?.ok_or(StoreError::NotFound(id))
}

/// Tree ids of `ids`, in the same order. Fails with `NotFound` on the first
/// unknown id.
pub(crate) fn tree_ids_of(conn: &Connection, ids: &[CategoryId]) -> StoreResult<Vec<CategoryId>> {
    let mut stmt = conn.prepare_cached("SELECT tree_id FROM category WHERE id = ?1")?;
    ids.iter()
        .map(|&id| {
            stmt.query_row(params![id], |row| row.get(0))
                .optional()?
                .ok_or(StoreError::NotFound(id))
        })
        .collect()
}

/// Every row of a tree, ascending `lft`.
pub(crate) fn load_tree(conn: &Connection, tree_id: CategoryId) -> StoreResult<Vec<CategoryNode>> {
    let sql = format!("SELECT {COLUMNS} FROM category WHERE tree_id = ?1 ORDER BY lft");
    query_nodes(conn, &sql, params![tree_id])
}

/// Current commit counter.
pub(crate) fn current_revision(conn: &Connection) -> StoreResult<u64> {
    let value: i64 = conn.query_row(
        "SELECT value FROM store_meta WHERE key = 'revision'",
        [],
        |row| row.get(0),
    )?;
    Ok(value.max(0) as u64)
}

/// Increments the commit counter inside the caller's transaction.
pub(crate) fn bump_revision(conn: &Connection) -> StoreResult<u64> {
    conn.execute(
        "UPDATE store_meta SET value = value + 1 WHERE key = 'revision'",
        [],
    )?;
    current_revision(conn)
}

/// Replaces the name columns of one row. Returns false if no row matched.
pub(crate) fn update_name(conn: &Connection, id: CategoryId, name: &CategoryName) -> StoreResult<bool> {
    let changed = conn
        .prepare_cached(
            "UPDATE category SET name_primary = ?2, name_alias = ?3, name_mnemonic = ?4 WHERE id = ?1",
        )?
        .execute(params![id, name.primary(), name.alias(), name.mnemonic()])?;
    Ok(changed == 1)
}

/// Replaces description and icon of one row. Returns false if no row matched.
pub(crate) fn update_details(
    conn: &Connection,
    id: CategoryId,
    description: Option<&str>,
    icon: Option<&str>,
) -> StoreResult<bool> {
    let changed = conn
        .prepare_cached("UPDATE category SET description = ?2, icon = ?3 WHERE id = ?1")?
        .execute(params![id, description, icon])?;
    Ok(changed == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        configure(&conn, Duration::from_millis(100), false).unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = migrated();
        migrate(&conn).unwrap();
        assert_eq!(current_revision(&conn).unwrap(), 0);
    }

    #[test]
    fn test_bump_revision() {
        let conn = migrated();
        assert_eq!(bump_revision(&conn).unwrap(), 1);
        assert_eq!(bump_revision(&conn).unwrap(), 2);
    }

    #[test]
    fn test_row_round_trip() {
        let conn = migrated();
        conn.execute(
            "INSERT INTO category (id, parent_id, tree_id, lft, rgt, name_primary, name_alias, name_mnemonic, description, icon)
             VALUES (1, 1, 1, 1, 2, 'Toys', 'Games', NULL, 'Fun', 'toy.png')",
            [],
        )
        .unwrap();
        let node = require_node(&conn, 1).unwrap();
        assert!(node.is_root());
        assert_eq!(node.name.primary(), "Toys");
        assert_eq!(node.name.alias(), Some("Games"));
        assert_eq!(node.description.as_deref(), Some("Fun"));
        assert_eq!(node.icon.as_deref(), Some("toy.png"));
        assert_eq!(tree_ids_of(&conn, &[1]).unwrap(), vec![1]);
    }

    #[test]
    fn test_unknown_ids() {
        let conn = migrated();
        assert!(load_node(&conn, 5).unwrap().is_none());
        assert!(matches!(require_node(&conn, 5), Err(StoreError::NotFound(5))));
        assert!(matches!(tree_ids_of(&conn, &[5]), Err(StoreError::NotFound(5))));
    }

    #[test]
    fn test_blank_primary_is_a_conversion_error() {
        let conn = migrated();
        conn.execute(
            "INSERT INTO category (id, parent_id, tree_id, lft, rgt, name_primary) VALUES (1, 1, 1, 1, 2, '  ')",
            [],
        )
        .unwrap();
        assert!(matches!(
            load_node(&conn, 1),
            Err(StoreError::Backend(rusqlite::Error::FromSqlConversionFailure(5, _, _)))
        ));
    }
}
