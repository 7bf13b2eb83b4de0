//! Database row types — these map directly to SQLite rows.
//! Distinct from moari-types API models to keep the DB layer independent.

use moari_types::Moment;
use moari_types::models::{Club, Message};
use rusqlite::Row;
use rusqlite::types::ValueRef;
use tracing::warn;

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    /// Argon2 PHC string. `None` for accounts that only sign in through Google.
    pub password: Option<String>,
    pub created_at: String,
}

pub struct ClubRow {
    pub id: String,
    pub name: String,
    pub one_line_intro: String,
    pub description: String,
    pub interview_date: String,
    pub image_url: String,
    pub owner_id: String,
    pub tags: Vec<String>,
    pub club_link: String,
    pub created_at: Moment,
    pub updated_at: Moment,
}

pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub club_id: Option<String>,
    pub club_name: Option<String>,
    pub created_at: Moment,
    pub read: bool,
}

/// Insert payload for a club. Defaults are already applied by the caller.
pub struct NewClub<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub one_line_intro: &'a str,
    pub description: &'a str,
    pub interview_date: &'a str,
    pub image_url: &'a str,
    pub owner_id: &'a str,
    pub tags: &'a [String],
    pub club_link: &'a str,
    pub created_at: Moment,
}

/// Partial update of a club's mutable fields; `None` keeps the stored value.
#[derive(Default)]
pub struct ClubChanges<'a> {
    pub name: Option<&'a str>,
    pub one_line_intro: Option<&'a str>,
    pub description: Option<&'a str>,
    pub interview_date: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub tags: Option<&'a [String]>,
    pub club_link: Option<&'a str>,
}

pub struct NewMessage<'a> {
    pub id: &'a str,
    pub sender_id: &'a str,
    pub receiver_id: &'a str,
    pub body: &'a str,
    pub club_id: Option<&'a str>,
    pub club_name: Option<&'a str>,
    pub created_at: Moment,
}

impl From<ClubRow> for Club {
    fn from(row: ClubRow) -> Self {
        Club {
            id: row.id,
            name: row.name,
            one_line_intro: row.one_line_intro,
            description: row.description,
            interview_date: row.interview_date,
            image_url: row.image_url,
            owner_id: row.owner_id,
            tags: row.tags,
            club_link: row.club_link,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            body: row.body,
            club_id: row.club_id,
            club_name: row.club_name,
            created_at: row.created_at,
            read: row.read,
        }
    }
}

/// Read a timestamp column in whatever shape it was stored: integer epoch
/// millis, text, or NULL.
pub(crate) fn moment_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Moment> {
    let moment = match row.get_ref(idx)? {
        ValueRef::Null => Moment::Unknown,
        ValueRef::Integer(ms) => Moment::At(ms),
        ValueRef::Real(ms) => Moment::At(ms as i64),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            Moment::parse(&text).unwrap_or_else(|| {
                warn!("Unparseable timestamp '{}' in column {}", text, idx);
                Moment::Unknown
            })
        }
        ValueRef::Blob(_) => {
            warn!("Blob stored in timestamp column {}", idx);
            Moment::Unknown
        }
    };
    Ok(moment)
}

/// Tags are stored as a JSON array. A corrupt value reads as no tags.
pub(crate) fn tags_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!("Corrupt tags '{}': {}", raw, e);
        Vec::new()
    }))
}
