//! Boundary arithmetic for the nested-set table.
//!
//! Each function is one or two range `UPDATE`s scoped to a single tree and
//! must run inside the caller's transaction. None of them checks invariants;
//! callers combine them so the tree is consistent again before commit.
//!
//! Boundaries are unique within a tree, so no `lft` ever equals a `rgt`.
//! Detached rows carry negated boundaries and are skipped by every range
//! predicate here, which only matches positive values.

use catalog_tree::{CategoryId, NewCategory};
use rusqlite::{params, Connection};

use crate::error::StoreResult;

/// Makes room for `width` boundaries at `at` (a right boundary of the
/// destination parent): `rgt >= at` and `lft > at` shift right by `width`.
pub(crate) fn open_gap(conn: &Connection, tree_id: CategoryId, at: i64, width: i64) -> StoreResult<()> {
    conn.prepare_cached("UPDATE category SET rgt = rgt + ?3 WHERE tree_id = ?1 AND rgt >= ?2")?
        .execute(params![tree_id, at, width])?;
    conn.prepare_cached("UPDATE category SET lft = lft + ?3 WHERE tree_id = ?1 AND lft > ?2")?
        .execute(params![tree_id, at, width])?;
    Ok(())
}

/// Closes the hole left by a removed or detached range ending at `after`:
/// `lft > after` and `rgt > after` shift left by `width`.
pub(crate) fn close_gap(conn: &Connection, tree_id: CategoryId, after: i64, width: i64) -> StoreResult<()> {
    conn.prepare_cached("UPDATE category SET lft = lft - ?3 WHERE tree_id = ?1 AND lft > ?2")?
        .execute(params![tree_id, after, width])?;
    conn.prepare_cached("UPDATE category SET rgt = rgt - ?3 WHERE tree_id = ?1 AND rgt > ?2")?
        .execute(params![tree_id, after, width])?;
    Ok(())
}

/// Negates the boundaries of every row inside `[left, right]`, taking the
/// subtree out of reach of later range shifts. Returns the row count.
pub(crate) fn detach(conn: &Connection, tree_id: CategoryId, left: i64, right: i64) -> StoreResult<usize> {
    let count = conn
        .prepare_cached(
            "UPDATE category SET lft = -lft, rgt = -rgt
             WHERE tree_id = ?1 AND lft >= ?2 AND rgt <= ?3",
        )?
        .execute(params![tree_id, left, right])?;
    Ok(count)
}

/// Restores detached rows of `from_tree`, shifted by `offset` and moved into
/// `to_tree`. Returns the row count.
pub(crate) fn reattach(
    conn: &Connection,
    from_tree: CategoryId,
    to_tree: CategoryId,
    offset: i64,
) -> StoreResult<usize> {
    let count = conn
        .prepare_cached(
            "UPDATE category SET lft = -lft + ?3, rgt = -rgt + ?3, tree_id = ?2
             WHERE tree_id = ?1 AND lft < 0",
        )?
        .execute(params![from_tree, to_tree, offset])?;
    Ok(count)
}

/// Deletes every row inside `[left, right]`. Returns the row count.
pub(crate) fn delete_range(conn: &Connection, tree_id: CategoryId, left: i64, right: i64) -> StoreResult<usize> {
    let count = conn
        .prepare_cached("DELETE FROM category WHERE tree_id = ?1 AND lft BETWEEN ?2 AND ?3")?
        .execute(params![tree_id, left, right])?;
    Ok(count)
}

/// Re-reads a node's right boundary (it may have shifted earlier in the
/// same transaction).
pub(crate) fn right_of(conn: &Connection, id: CategoryId) -> StoreResult<i64> {
    Ok(conn
        .prepare_cached("SELECT rgt FROM category WHERE id = ?1")?
        .query_row(params![id], |row| row.get(0))?)
}

/// Sets a node's parent pointer.
pub(crate) fn set_parent(conn: &Connection, id: CategoryId, parent_id: CategoryId) -> StoreResult<()> {
    conn.prepare_cached("UPDATE category SET parent_id = ?2 WHERE id = ?1")?
        .execute(params![id, parent_id])?;
    Ok(())
}

/// Inserts a row at `[left, right]`. A `None` parent makes the row its own
/// root (parent and tree set to the new id). Returns the new id.
pub(crate) fn insert_row(
    conn: &Connection,
    parent: Option<(CategoryId, CategoryId)>,
    left: i64,
    right: i64,
    new: &NewCategory,
) -> StoreResult<CategoryId> {
    let (parent_id, tree_id) = parent.unwrap_or((0, 0));
    conn.prepare_cached(
        "INSERT INTO category
           (parent_id, tree_id, lft, rgt, name_primary, name_alias, name_mnemonic, description, icon)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?
    .execute(params![
        parent_id,
        tree_id,
        left,
        right,
        new.name.primary(),
        new.name.alias(),
        new.name.mnemonic(),
        new.description,
        new.icon,
    ])?;
    let id = conn.last_insert_rowid();
    if parent.is_none() {
        conn.prepare_cached("UPDATE category SET parent_id = ?1, tree_id = ?1 WHERE id = ?1")?
            .execute(params![id])?;
    }
    Ok(id)
}
