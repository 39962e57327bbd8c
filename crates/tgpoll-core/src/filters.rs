//! Chat/user restriction matching for incoming updates.

use std::{collections::HashSet, sync::OnceLock};

use regex::Regex;

use crate::domain::Update;

static SEPARATORS: OnceLock<Regex> = OnceLock::new();

/// Parse a free-form id list ("1, 2 3,,4") into a set of ids.
///
/// Splits on runs of whitespace and/or commas; empty tokens are dropped.
pub fn parse_id_list(raw: &str) -> HashSet<String> {
    // Literal pattern; compiling it cannot fail.
    let re = SEPARATORS.get_or_init(|| Regex::new(r"[\s,]+").expect("valid regex"));
    re.split(raw)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Chat the update belongs to, if its kind carries one.
pub fn extract_chat_id(update: &Update) -> Option<String> {
    update.kind.chat_id().map(str::to_string)
}

/// User that caused the update, if its kind carries one.
pub fn extract_user_id(update: &Update) -> Option<String> {
    update.kind.user_id().map(str::to_string)
}

/// Whether `update` passes both allow-lists. An empty list does not restrict;
/// an update without the relevant id never passes a non-empty list.
pub fn matches_restrictions(
    update: &Update,
    restrict_chat_ids: &HashSet<String>,
    restrict_user_ids: &HashSet<String>,
) -> bool {
    if !restrict_chat_ids.is_empty() {
        match update.kind.chat_id() {
            Some(id) if restrict_chat_ids.contains(id) => {}
            _ => return false,
        }
    }

    if !restrict_user_ids.is_empty() {
        match update.kind.user_id() {
            Some(id) if restrict_user_ids.contains(id) => {}
            _ => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn update(value: Value) -> Update {
        Update::from_value(value).unwrap()
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_id_list_splits_on_commas_and_whitespace() {
        assert_eq!(parse_id_list("1, 2 3,,4\n\t5"), set(&["1", "2", "3", "4", "5"]));
        assert_eq!(parse_id_list("123,123,456"), set(&["123", "456"]));
        assert_eq!(parse_id_list("  -1001  "), set(&["-1001"]));
    }

    #[test]
    fn parse_id_list_empty_inputs() {
        assert!(parse_id_list("").is_empty());
        assert!(parse_id_list(" , ,\n ").is_empty());
    }

    #[test]
    fn parse_id_list_is_idempotent() {
        let first = parse_id_list("7 8,9, 7");
        let joined = first.iter().cloned().collect::<Vec<_>>().join(",");
        assert_eq!(parse_id_list(&joined), first);
    }

    #[test]
    fn extracts_chat_id_by_kind() {
        let cases = [
            (json!({"update_id": 1, "message": {"chat": {"id": 1}}}), Some("1")),
            (json!({"update_id": 1, "edited_message": {"chat": {"id": 2}}}), Some("2")),
            (json!({"update_id": 1, "channel_post": {"chat": {"id": -1001}}}), Some("-1001")),
            (json!({"update_id": 1, "edited_channel_post": {"chat": {"id": 4}}}), Some("4")),
            (
                json!({"update_id": 1, "callback_query": {"from": {"id": 9}, "message": {"chat": {"id": 5}}}}),
                Some("5"),
            ),
            (json!({"update_id": 1, "chat_member": {"chat": {"id": 6}}}), Some("6")),
            (json!({"update_id": 1, "my_chat_member": {"chat": {"id": 7}}}), Some("7")),
            (json!({"update_id": 1, "chat_join_request": {"chat": {"id": 8}}}), Some("8")),
            (json!({"update_id": 1, "poll": {"id": "p"}}), None),
            (json!({"update_id": 1, "inline_query": {"from": {"id": 3}}}), None),
            (json!({"update_id": 1, "callback_query": {"from": {"id": 9}}}), None),
        ];

        for (raw, expected) in cases {
            let u = update(raw.clone());
            assert_eq!(extract_chat_id(&u).as_deref(), expected, "update: {raw}");
        }
    }

    #[test]
    fn extracts_user_id_by_kind() {
        let cases = [
            (json!({"update_id": 1, "message": {"from": {"id": 1}}}), Some("1")),
            (json!({"update_id": 1, "callback_query": {"from": {"id": 2}}}), Some("2")),
            (json!({"update_id": 1, "inline_query": {"from": {"id": 3}}}), Some("3")),
            (json!({"update_id": 1, "chosen_inline_result": {"from": {"id": 4}}}), Some("4")),
            (json!({"update_id": 1, "shipping_query": {"from": {"id": 5}}}), Some("5")),
            (json!({"update_id": 1, "pre_checkout_query": {"from": {"id": 6}}}), Some("6")),
            (json!({"update_id": 1, "poll_answer": {"user": {"id": 7}}}), Some("7")),
            (json!({"update_id": 1, "poll_answer": {"from": {"id": 7}}}), None),
            (json!({"update_id": 1, "chat_join_request": {"from": {"id": 8}}}), Some("8")),
            (json!({"update_id": 1, "channel_post": {"chat": {"id": 1}}}), None),
            (json!({"update_id": 1, "poll": {}}), None),
        ];

        for (raw, expected) in cases {
            let u = update(raw.clone());
            assert_eq!(extract_user_id(&u).as_deref(), expected, "update: {raw}");
        }
    }

    #[test]
    fn empty_restrictions_always_match() {
        let empty = HashSet::new();
        for raw in [
            json!({"update_id": 1, "poll": {}}),
            json!({"update_id": 1, "message": {"chat": {"id": 1}, "from": {"id": 2}}}),
            json!({"update_id": 1, "something_new": {}}),
        ] {
            assert!(matches_restrictions(&update(raw), &empty, &empty));
        }
    }

    #[test]
    fn missing_ids_fail_active_restrictions() {
        let poll = update(json!({"update_id": 1, "poll": {}}));
        assert!(!matches_restrictions(&poll, &set(&["1"]), &HashSet::new()));
        assert!(!matches_restrictions(&poll, &HashSet::new(), &set(&["1"])));
    }

    #[test]
    fn both_restrictions_must_match() {
        let chats = set(&["1"]);
        let users = set(&["2"]);
        let msg = |chat: i64, user: i64| {
            update(json!({"update_id": 1, "message": {"chat": {"id": chat}, "from": {"id": user}}}))
        };

        assert!(matches_restrictions(&msg(1, 2), &chats, &users));
        assert!(!matches_restrictions(&msg(999, 2), &chats, &users));
        assert!(!matches_restrictions(&msg(1, 555), &chats, &users));
        assert!(matches_restrictions(&msg(1, 555), &chats, &HashSet::new()));
    }

    #[test]
    fn negative_group_ids_match_their_string_form() {
        let u = update(json!({"update_id": 1, "message": {"chat": {"id": -1001}}}));
        assert!(matches_restrictions(&u, &parse_id_list("-1001"), &HashSet::new()));
    }
}
