use crate::Database;
use crate::models::{RequestRow, RequestWithOwnerRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

const REQUEST_COLUMNS: &str =
    "r.id, r.created_at, r.user_id, r.from_user, r.plan, r.text, r.status, r.answer, r.viewed_by_user";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        full_name: &str,
        password_hash: &str,
        role: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, full_name, password, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (id, email, full_name, password_hash, role, created_at),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// All users, newest signup first.
    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, full_name, password, role, created_at
                 FROM users
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false when no such user existed. Their requests go with them.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Requests --

    /// Inserts a pending request and returns its id.
    pub fn insert_request(
        &self,
        user_id: &str,
        from_user: &str,
        plan: &str,
        text: &str,
        created_at: &str,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO requests (created_at, user_id, from_user, plan, text)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (created_at, user_id, from_user, plan, text),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_request(&self, id: i64) -> Result<Option<RequestRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM requests r WHERE r.id = ?1", REQUEST_COLUMNS);
            let row = conn.query_row(&sql, [id], map_request).optional()?;
            Ok(row)
        })
    }

    pub fn list_requests_for_user(&self, user_id: &str) -> Result<Vec<RequestRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM requests r WHERE r.user_id = ?1 ORDER BY r.created_at DESC, r.id DESC",
                REQUEST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_request)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn request_ids_for_user(&self, user_id: &str) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM requests WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    /// Every request with its owner's profile, in one query.
    pub fn list_requests_with_owners(&self) -> Result<Vec<RequestWithOwnerRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, u.email, u.full_name
                 FROM requests r
                 LEFT JOIN users u ON r.user_id = u.id
                 ORDER BY r.created_at DESC, r.id DESC",
                REQUEST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(RequestWithOwnerRow {
                        request: map_request(row)?,
                        owner_email: row.get(9)?,
                        owner_name: row.get(10)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// pending -> answered. The viewed flag is reset so the owner sees the
    /// new answer as unread. Returns false when the request was not pending.
    pub fn answer_request(&self, id: i64, signed_answer: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE requests
                 SET status = 'answered', answer = ?2, viewed_by_user = 'false'
                 WHERE id = ?1 AND status = 'pending'",
                rusqlite::params![id, signed_answer],
            )?;
            Ok(n > 0)
        })
    }

    /// Flips the viewed flag on an answered request owned by `user_id`.
    /// Returns false when nothing changed.
    pub fn mark_viewed(&self, id: i64, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE requests SET viewed_by_user = 'true'
                 WHERE id = ?1 AND user_id = ?2
                   AND status = 'answered' AND viewed_by_user = 'false'",
                rusqlite::params![id, user_id],
            )?;
            Ok(n > 0)
        })
    }

    /// Deletes a request only while it is pending and owned by `user_id`.
    pub fn delete_pending_request(&self, id: i64, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM requests WHERE id = ?1 AND user_id = ?2 AND status = 'pending'",
                rusqlite::params![id, user_id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn count_pending(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM requests WHERE status = 'pending'",
                [],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
    }

    pub fn count_unviewed_answers(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM requests
                 WHERE user_id = ?1 AND status = 'answered' AND viewed_by_user = 'false'",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, email, full_name, password, role, created_at FROM users WHERE {} = ?1",
        column
    );
    let row = conn.query_row(&sql, [value], map_user).optional()?;
    Ok(row)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        password: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_request(row: &Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        created_at: row.get(1)?,
        user_id: row.get(2)?,
        from_user: row.get(3)?,
        plan: row.get(4)?,
        text: row.get(5)?,
        status: row.get(6)?,
        answer: row.get(7)?,
        viewed_by_user: row.get(8)?,
    })
}
