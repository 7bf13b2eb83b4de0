use crate::Database;
use crate::models::{
    ClubChanges, ClubRow, MessageRow, NewClub, NewMessage, UserRow, moment_column, tags_column,
};
use anyhow::Result;
use moari_types::Moment;
use rusqlite::{Connection, Row};

const CLUB_COLUMNS: &str = "id, name, one_line_intro, description, interview_date, image_url, \
     owner_id, tags, club_link, created_at, updated_at";

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, body, club_id, club_name, created_at, read";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        display_name: &str,
        password_hash: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, display_name, password) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, email, display_name, password_hash],
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

    // -- Clubs --

    pub fn insert_club(&self, club: &NewClub<'_>) -> Result<()> {
        let tags = serde_json::to_string(club.tags)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO clubs (id, name, one_line_intro, description, interview_date, image_url,
                                    owner_id, tags, club_link, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    club.id,
                    club.name,
                    club.one_line_intro,
                    club.description,
                    club.interview_date,
                    club.image_url,
                    club.owner_id,
                    tags,
                    club.club_link,
                    club.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_club(&self, id: &str) -> Result<Option<ClubRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM clubs WHERE id = ?1", CLUB_COLUMNS);
            conn.query_row(&sql, [id], club_from_row).optional()
        })
    }

    /// All clubs, newest first.
    pub fn list_clubs(&self) -> Result<Vec<ClubRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM clubs ORDER BY created_at DESC, rowid DESC",
                CLUB_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], club_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Clubs registered by `owner_id`, newest first.
    pub fn list_clubs_by_owner(&self, owner_id: &str) -> Result<Vec<ClubRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM clubs WHERE owner_id = ?1 ORDER BY created_at DESC, rowid DESC",
                CLUB_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], club_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply `changes` and stamp `updated_at`. Returns false if no such club.
    pub fn update_club(&self, id: &str, changes: &ClubChanges<'_>, updated_at: Moment) -> Result<bool> {
        let tags = changes.tags.map(serde_json::to_string).transpose()?;
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE clubs SET
                    name           = COALESCE(?2, name),
                    one_line_intro = COALESCE(?3, one_line_intro),
                    description    = COALESCE(?4, description),
                    interview_date = COALESCE(?5, interview_date),
                    image_url      = COALESCE(?6, image_url),
                    tags           = COALESCE(?7, tags),
                    club_link      = COALESCE(?8, club_link),
                    updated_at     = ?9
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    changes.name,
                    changes.one_line_intro,
                    changes.description,
                    changes.interview_date,
                    changes.image_url,
                    tags,
                    changes.club_link,
                    updated_at.to_rfc3339(),
                ],
            )?;
            Ok(updated > 0)
        })
    }

    /// Returns false if no such club.
    pub fn delete_club(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM clubs WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, msg: &NewMessage<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, body, club_id, club_name, created_at, read)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
                rusqlite::params![
                    msg.id,
                    msg.sender_id,
                    msg.receiver_id,
                    msg.body,
                    msg.club_id,
                    msg.club_name,
                    msg.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Every message addressed to `user_id`.
    pub fn messages_received_by(&self, user_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, "receiver_id = ?1", &[user_id]))
    }

    /// Every message sent by `user_id`.
    pub fn messages_sent_by(&self, user_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, "sender_id = ?1", &[user_id]))
    }

    /// Both directions of the conversation between `a` and `b`, unordered.
    pub fn conversation_between(&self, a: &str, b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_conversation(conn, a, b))
    }

    /// Load the conversation between `reader` and `peer`, then mark the
    /// peer's unread messages to `reader` as read, in one transaction.
    ///
    /// The returned rows carry the read flags as they were before marking.
    pub fn open_conversation(&self, reader: &str, peer: &str) -> Result<(Vec<MessageRow>, usize)> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;
            let rows = query_conversation(&tx, reader, peer)?;
            let marked = mark_read(&tx, peer, reader)?;
            tx.commit()?;
            Ok((rows, marked))
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, email, display_name, password, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    stmt.query_row([value], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            email: row.get(1)?,
            display_name: row.get(2)?,
            password: row.get(3)?,
            created_at: row.get(4)?,
        })
    })
    .optional()
}

fn query_messages(conn: &Connection, filter: &str, params: &[&str]) -> Result<Vec<MessageRow>> {
    let sql = format!("SELECT {} FROM messages WHERE {}", MESSAGE_COLUMNS, filter);
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_conversation(conn: &Connection, a: &str, b: &str) -> Result<Vec<MessageRow>> {
    query_messages(
        conn,
        "(sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)",
        &[a, b],
    )
}

fn mark_read(conn: &Connection, sender_id: &str, receiver_id: &str) -> Result<usize> {
    let n = conn.execute(
        "UPDATE messages SET read = 1 WHERE sender_id = ?1 AND receiver_id = ?2 AND read = 0",
        [sender_id, receiver_id],
    )?;
    Ok(n)
}

fn club_from_row(row: &Row<'_>) -> rusqlite::Result<ClubRow> {
    Ok(ClubRow {
        id: row.get(0)?,
        name: row.get(1)?,
        one_line_intro: row.get(2)?,
        description: row.get(3)?,
        interview_date: row.get(4)?,
        image_url: row.get(5)?,
        owner_id: row.get(6)?,
        tags: tags_column(row, 7)?,
        club_link: row.get(8)?,
        created_at: moment_column(row, 9)?,
        updated_at: moment_column(row, 10)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        body: row.get(3)?,
        club_id: row.get(4)?,
        club_name: row.get(5)?,
        created_at: moment_column(row, 6)?,
        read: row.get(7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn send(db: &Database, from: &str, to: &str, body: &str, at: i64) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        db.insert_message(&NewMessage {
            id: &id,
            sender_id: from,
            receiver_id: to,
            body,
            club_id: None,
            club_name: None,
            created_at: Moment::At(at),
        })
        .unwrap();
        id
    }

    fn new_club<'a>(id: &'a str, owner: &'a str, tags: &'a [String], at: i64) -> NewClub<'a> {
        NewClub {
            id,
            name: "Chess Club",
            one_line_intro: "",
            description: "We play chess",
            interview_date: "2024-03-01",
            image_url: "https://example.com/img.png",
            owner_id: owner,
            tags,
            club_link: "",
            created_at: Moment::At(at),
        }
    }

    #[test]
    fn users_round_trip() {
        let db = db();
        db.create_user("u1", "kim@example.com", "kim", Some("hash")).unwrap();

        let by_email = db.get_user_by_email("kim@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, "u1");
        assert_eq!(by_email.password.as_deref(), Some("hash"));

        assert!(db.get_user_by_id("u1").unwrap().is_some());
        assert!(db.get_user_by_id("nope").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = db();
        db.create_user("u1", "kim@example.com", "kim", None).unwrap();
        let err = db.create_user("u2", "kim@example.com", "kim2", None).unwrap_err();
        assert!(crate::is_unique_violation(&err));

        let other = anyhow::anyhow!("disk on fire");
        assert!(!crate::is_unique_violation(&other));
    }

    #[test]
    fn file_database_reads_through_pool() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::open(&dir.path().join("moari.db")).unwrap();

        db.create_user("u1", "kim@example.com", "kim", None).unwrap();
        send(&db, "b", "a", "hello", 1);

        // More reads than pooled connections, so every reader is used.
        for _ in 0..8 {
            assert!(db.get_user_by_id("u1").unwrap().is_some());
            assert_eq!(db.messages_received_by("a").unwrap().len(), 1);
        }

        let (rows, marked) = db.open_conversation("a", "b").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(marked, 1);

        let after = db.conversation_between("a", "b").unwrap();
        assert!(after.iter().all(|r| r.read));
    }

    #[test]
    fn pooled_readers_refuse_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::open(&dir.path().join("moari.db")).unwrap();

        let res = db.with_conn(|conn| {
            conn.execute("DELETE FROM users", [])?;
            Ok(())
        });
        assert!(res.is_err());
    }

    #[test]
    fn clubs_list_newest_first() {
        let db = db();
        let tags = vec!["board".to_string()];
        db.insert_club(&new_club("c1", "o1", &tags, 1_000)).unwrap();
        db.insert_club(&new_club("c2", "o2", &tags, 3_000)).unwrap();
        db.insert_club(&new_club("c3", "o1", &tags, 2_000)).unwrap();

        let ids: Vec<String> = db.list_clubs().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, ["c2", "c3", "c1"]);

        let ids: Vec<String> = db
            .list_clubs_by_owner("o1")
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, ["c3", "c1"]);

        let club = db.get_club("c1").unwrap().unwrap();
        assert_eq!(club.tags, tags);
        assert_eq!(club.created_at, Moment::At(1_000));
        assert_eq!(club.updated_at, Moment::Unknown);
    }

    #[test]
    fn update_club_keeps_absent_fields() {
        let db = db();
        db.insert_club(&new_club("c1", "o1", &[], 1_000)).unwrap();

        let tags = vec!["go".to_string(), "shogi".to_string()];
        let changes = ClubChanges {
            name: Some("Board Games"),
            tags: Some(&tags),
            ..Default::default()
        };
        assert!(db.update_club("c1", &changes, Moment::At(5_000)).unwrap());

        let club = db.get_club("c1").unwrap().unwrap();
        assert_eq!(club.name, "Board Games");
        assert_eq!(club.description, "We play chess");
        assert_eq!(club.tags, tags);
        assert_eq!(club.updated_at, Moment::At(5_000));

        assert!(!db.update_club("missing", &changes, Moment::At(5_000)).unwrap());
    }

    #[test]
    fn delete_club_reports_missing() {
        let db = db();
        db.insert_club(&new_club("c1", "o1", &[], 1_000)).unwrap();
        assert!(db.delete_club("c1").unwrap());
        assert!(!db.delete_club("c1").unwrap());
        assert!(db.get_club("c1").unwrap().is_none());
    }

    #[test]
    fn open_conversation_marks_only_inbound() {
        let db = db();
        send(&db, "a", "b", "a to b", 1);
        send(&db, "b", "a", "b to a", 2);
        send(&db, "b", "a", "b to a again", 3);
        send(&db, "c", "a", "unrelated", 4);

        let (rows, marked) = db.open_conversation("a", "b").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(marked, 2);
        assert!(rows.iter().all(|r| !r.read), "rows reflect state before marking");

        let after = db.conversation_between("a", "b").unwrap();
        for row in &after {
            if row.sender_id == "b" {
                assert!(row.read);
            } else {
                assert!(!row.read, "a's own messages stay unread for b");
            }
        }

        let unrelated = db.messages_received_by("a").unwrap();
        assert!(unrelated.iter().any(|r| r.sender_id == "c" && !r.read));
    }

    #[test]
    fn malformed_timestamps_read_as_unknown() {
        let db = db();
        db.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, body, created_at)
                 VALUES ('m1', 'a', 'b', 'x', 'garbage'), ('m2', 'a', 'b', 'y', NULL)",
                [],
            )?;
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, body, created_at)
                 VALUES ('m3', 'a', 'b', 'z', 1700000000000)",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let mut rows = db.messages_sent_by("a").unwrap();
        rows.sort_by(|x, y| x.id.cmp(&y.id));
        assert_eq!(rows[0].created_at, Moment::Unknown);
        assert_eq!(rows[1].created_at, Moment::Unknown);
        assert_eq!(rows[2].created_at, Moment::At(1_700_000_000_000));
    }
}
