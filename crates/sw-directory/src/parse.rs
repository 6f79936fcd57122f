use std::collections::{BTreeMap, BTreeSet};

use sw_schemas::{user_key, StoredItem};
use tracing::warn;

use crate::DirectoryData;

#[derive(Clone, Copy)]
enum PostKind {
    Dir,
    Block,
}

fn kind_of(header: &str) -> Option<PostKind> {
    if header.starts_with("dir") {
        Some(PostKind::Dir)
    } else if header.starts_with("block") {
        Some(PostKind::Block)
    } else {
        None
    }
}

/// Parse directory posts as returned by `list_recent` (newest first).
///
/// Posts apply oldest to newest, so a later declaration replaces an earlier
/// one. Duplicates and malformed lines are logged; neither stops the parse.
pub fn parse_posts(posts: &[StoredItem]) -> DirectoryData {
    let mut registered: BTreeMap<String, String> = BTreeMap::new();
    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    let mut blocked: BTreeSet<String> = BTreeSet::new();

    for post in posts.iter().rev() {
        let mut lines = post.text.lines();
        let Some(kind) = lines.next().map(str::trim).and_then(kind_of) else {
            continue;
        };

        for line in lines.map(str::trim).filter(|l| !l.is_empty()) {
            match kind {
                PostKind::Dir => {
                    let Some((discord_id, twitch_user)) = line.split_once(char::is_whitespace)
                    else {
                        warn!(position = %post.position, line, "directory line without a twitch user");
                        continue;
                    };
                    let user = user_key(twitch_user.trim());
                    if let Some(prev) = registered.insert(user.clone(), discord_id.to_string()) {
                        warn!(user = %user, previous = %prev, "twitch user declared multiple times");
                    }
                    if let Some(prev) = owners.insert(discord_id.to_string(), user.clone()) {
                        if prev != user {
                            warn!(discord_id, previous = %prev, "discord user declared multiple times");
                        }
                    }
                }
                PostKind::Block => {
                    if !blocked.insert(user_key(line)) {
                        warn!(user = line, "user blocked multiple times");
                    }
                }
            }
        }
    }

    DirectoryData::new(registered, blocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sw_schemas::Position;

    fn post(position: u64, text: &str) -> StoredItem {
        StoredItem {
            position: Position::new(position),
            text: text.to_string(),
            cards: vec![],
        }
    }

    #[test]
    fn parses_dir_and_block_posts() {
        let posts = vec![
            post(3, "block list\nTroll\n"),
            post(2, "hello everyone"),
            post(1, "dir (batch 1)\n111 Sunshiner\n222 bo\n\n"),
        ];
        let d = parse_posts(&posts);
        assert_eq!(d.registered_count(), 2);
        assert!(d.is_registered("sunshiner"));
        assert!(d.is_registered("BO"));
        assert!(d.is_blocked("troll"));
        assert_eq!(d.blocked_count(), 1);
    }

    #[test]
    fn newer_declaration_wins() {
        let posts = vec![post(9, "dir\n999 ana"), post(1, "dir\n111 ana")];
        let d = parse_posts(&posts);
        let expected = DirectoryData::new(
            [("ana".to_string(), "999".to_string())].into_iter().collect(),
            BTreeSet::new(),
        );
        assert_eq!(d, expected);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let posts = vec![post(1, "dir\njustoneword\n333 cy")];
        let d = parse_posts(&posts);
        assert_eq!(d.registered_count(), 1);
        assert!(d.is_registered("cy"));
    }

    #[test]
    fn header_must_lead_the_post() {
        let posts = vec![post(1, "see dir below\n111 ana")];
        assert_eq!(parse_posts(&posts), DirectoryData::default());
    }
}
