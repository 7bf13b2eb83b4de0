//! Derives per-peer conversation summaries from flat message records.

use std::collections::HashMap;

use moari_types::Moment;
use moari_types::models::{ConversationSummary, Message};

/// Summary under construction, plus the id of its current last message so
/// equal timestamps still resolve the same way every time.
struct Draft<'a> {
    summary: ConversationSummary,
    last_id: &'a str,
}

impl<'a> Draft<'a> {
    fn seed(peer: &str, msg: &'a Message) -> Self {
        Self {
            summary: ConversationSummary {
                peer_id: peer.to_string(),
                last_message: msg.body.clone(),
                last_message_time: msg.created_at,
                club_id: msg.club_id.clone(),
                club_name: msg.club_name.clone(),
                unread_count: 0,
            },
            last_id: &msg.id,
        }
    }

    fn key(&self) -> (Moment, &str) {
        (self.summary.last_message_time, self.last_id)
    }

    /// Take `msg` as the last message if it is strictly newer.
    fn offer(&mut self, msg: &'a Message) {
        if msg.order_key() > self.key() {
            self.summary.last_message = msg.body.clone();
            self.summary.last_message_time = msg.created_at;
            self.summary.club_id = msg.club_id.clone();
            self.summary.club_name = msg.club_name.clone();
            self.last_id = &msg.id;
        }
    }
}

/// Build `user_id`'s conversation list from the messages they received and
/// the messages they sent.
///
/// One summary per peer, newest first. Unread counts come only from
/// `received`; sending never changes them.
pub fn summarize(user_id: &str, received: &[Message], sent: &[Message]) -> Vec<ConversationSummary> {
    let mut drafts: HashMap<&str, Draft<'_>> = HashMap::new();

    for msg in received.iter().filter(|m| m.receiver_id == user_id) {
        let peer = msg.sender_id.as_str();
        let draft = drafts
            .entry(peer)
            .and_modify(|d| d.offer(msg))
            .or_insert_with(|| Draft::seed(peer, msg));
        if !msg.read {
            draft.summary.unread_count += 1;
        }
    }

    for msg in sent.iter().filter(|m| m.sender_id == user_id) {
        let peer = msg.receiver_id.as_str();
        drafts
            .entry(peer)
            .and_modify(|d| d.offer(msg))
            .or_insert_with(|| Draft::seed(peer, msg));
    }

    let mut summaries: Vec<ConversationSummary> = drafts.into_values().map(|d| d.summary).collect();
    summaries.sort_by(|a, b| {
        b.last_message_time
            .cmp(&a.last_message_time)
            .then_with(|| a.peer_id.cmp(&b.peer_id))
    });
    summaries
}

/// Oldest first, ties broken by id.
pub fn sort_chronologically(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, from: &str, to: &str, body: &str, at: Moment, read: bool) -> Message {
        Message {
            id: id.into(),
            sender_id: from.into(),
            receiver_id: to.into(),
            body: body.into(),
            club_id: None,
            club_name: None,
            created_at: at,
            read,
        }
    }

    #[test]
    fn first_message_creates_unread_conversation() {
        let received = vec![msg("m1", "u1", "u2", "hello", Moment::At(10), false)];
        let list = summarize("u2", &received, &[]);

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].peer_id, "u1");
        assert_eq!(list[0].last_message, "hello");
        assert_eq!(list[0].unread_count, 1);
    }

    #[test]
    fn newest_message_wins_across_directions() {
        let received = vec![
            msg("m1", "p", "me", "first", Moment::At(10), true),
            msg("m3", "p", "me", "third", Moment::At(30), false),
        ];
        let sent = vec![msg("m2", "me", "p", "second", Moment::At(20), false)];

        let list = summarize("me", &received, &sent);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].last_message, "third");
        assert_eq!(list[0].last_message_time, Moment::At(30));
        assert_eq!(list[0].unread_count, 1);

        let sent = vec![msg("m4", "me", "p", "fourth", Moment::At(40), false)];
        let list = summarize("me", &received, &sent);
        assert_eq!(list[0].last_message, "fourth");
        assert_eq!(list[0].unread_count, 1, "sent messages never count as unread");
    }

    #[test]
    fn unread_counts_older_messages_too() {
        let received = vec![
            msg("m2", "p", "me", "new", Moment::At(20), false),
            msg("m1", "p", "me", "old", Moment::At(10), false),
        ];
        let list = summarize("me", &received, &[]);
        assert_eq!(list[0].last_message, "new");
        assert_eq!(list[0].unread_count, 2);
    }

    #[test]
    fn sorted_newest_first_with_unknown_last() {
        let received = vec![
            msg("m1", "a", "me", "a", Moment::At(10), true),
            msg("m2", "b", "me", "b", Moment::Unknown, true),
            msg("m3", "c", "me", "c", Moment::At(30), true),
        ];
        let list = summarize("me", &received, &[]);
        let peers: Vec<&str> = list.iter().map(|s| s.peer_id.as_str()).collect();
        assert_eq!(peers, ["c", "a", "b"]);
    }

    #[test]
    fn known_time_beats_unknown() {
        let received = vec![
            msg("m9", "p", "me", "no time", Moment::Unknown, true),
            msg("m1", "p", "me", "timed", Moment::At(0), true),
        ];
        let list = summarize("me", &received, &[]);
        assert_eq!(list[0].last_message, "timed");
    }

    #[test]
    fn equal_timestamps_resolve_regardless_of_order() {
        let a = msg("m1", "p", "me", "one", Moment::At(5), true);
        let b = msg("m2", "p", "me", "two", Moment::At(5), true);

        let forward = summarize("me", &[a.clone(), b.clone()], &[]);
        let backward = summarize("me", &[b, a], &[]);
        assert_eq!(forward, backward);
        assert_eq!(forward[0].last_message, "two");
    }

    #[test]
    fn last_message_carries_its_club() {
        let mut old = msg("m1", "p", "me", "about chess", Moment::At(1), true);
        old.club_id = Some("c1".into());
        old.club_name = Some("Chess".into());
        let mut new = msg("m2", "me", "p", "about go", Moment::At(2), false);
        new.club_id = Some("c2".into());
        new.club_name = Some("Go".into());

        let list = summarize("me", &[old], &[new]);
        assert_eq!(list[0].club_id.as_deref(), Some("c2"));
        assert_eq!(list[0].club_name.as_deref(), Some("Go"));
    }

    #[test]
    fn ignores_records_not_involving_user() {
        let received = vec![msg("m1", "x", "someone-else", "stray", Moment::At(1), false)];
        assert!(summarize("me", &received, &[]).is_empty());
    }

    #[test]
    fn chronological_sort_is_total() {
        let mut messages = vec![
            msg("b", "p", "me", "", Moment::At(2), true),
            msg("c", "p", "me", "", Moment::Unknown, true),
            msg("a", "me", "p", "", Moment::At(2), true),
            msg("d", "me", "p", "", Moment::At(1), true),
        ];
        sort_chronologically(&mut messages);
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["c", "d", "a", "b"]);
    }
}
