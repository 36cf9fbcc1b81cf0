// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Diff event synthesis from pre/post shared-state snapshots.
//!
//! Update-shaped diffs require both sides; delete-shaped diffs (channel,
//! role) require only the old side. Nothing is emitted for a first-time
//! observation or when both sides are equal.

use crate::event::{DeleteDiff, Diff, Event, EventKind, EventPayload, InvitesDiff};
use crate::types::{Channel, Emoji, Guild, GuildMember, Invite, RoleObject, Webhook};

pub fn guild_diff(bot_user_id: &str, old: Option<Guild>, new: Option<Guild>) -> Option<Event> {
    let (old, new) = (old?, new?);
    if old == new {
        return None;
    }

    let guild_id = old.id.clone();
    let mut event = Event::new(
        EventKind::DiffGuild,
        bot_user_id,
        EventPayload::DiffGuild(Diff { old, new }),
    );
    event.guild_id = Some(guild_id);
    Some(event)
}

pub fn member_diff(
    bot_user_id: &str,
    guild_id: &str,
    old: Option<GuildMember>,
    new: Option<GuildMember>,
) -> Option<Event> {
    let (old, new) = (old?, new?);
    if old == new {
        return None;
    }

    let mut event = Event::new(
        EventKind::DiffMember,
        bot_user_id,
        EventPayload::DiffMember(Diff { old, new }),
    );
    event.guild_id = Some(guild_id.to_string());
    Some(event)
}

pub fn channel_diff(
    bot_user_id: &str,
    old: Option<Channel>,
    new: Option<Channel>,
) -> Option<Event> {
    let old = old?;
    if new.as_ref() == Some(&old) {
        return None;
    }

    let guild_id = old.guild_id.clone();
    let channel_id = old.id.clone();
    let mut event = Event::new(
        EventKind::DiffChannel,
        bot_user_id,
        EventPayload::DiffChannel(DeleteDiff { old, new }),
    );
    event.guild_id = guild_id;
    event.channel_id = Some(channel_id);
    Some(event)
}

pub fn role_diff(
    bot_user_id: &str,
    guild_id: &str,
    old: Option<RoleObject>,
    new: Option<RoleObject>,
) -> Option<Event> {
    let old = old?;
    if new.as_ref() == Some(&old) {
        return None;
    }

    let mut event = Event::new(
        EventKind::DiffRole,
        bot_user_id,
        EventPayload::DiffRole(DeleteDiff { old, new }),
    );
    event.guild_id = Some(guild_id.to_string());
    Some(event)
}

pub fn emoji_diff(
    bot_user_id: &str,
    guild_id: &str,
    old: Option<Vec<Emoji>>,
    new: Option<Vec<Emoji>>,
) -> Option<Event> {
    let (old, new) = (old?, new?);
    if old == new {
        return None;
    }

    let mut event = Event::new(
        EventKind::DiffEmoji,
        bot_user_id,
        EventPayload::DiffEmoji(Diff { old, new }),
    );
    event.guild_id = Some(guild_id.to_string());
    Some(event)
}

pub fn webhooks_diff(
    bot_user_id: &str,
    guild_id: &str,
    old: Vec<Webhook>,
    new: Vec<Webhook>,
) -> Option<Event> {
    if old == new {
        return None;
    }

    let mut event = Event::new(
        EventKind::DiffWebhooks,
        bot_user_id,
        EventPayload::DiffWebhooks(Diff { old, new }),
    );
    event.guild_id = Some(guild_id.to_string());
    Some(event)
}

pub fn invites_diff(
    bot_user_id: &str,
    guild_id: &str,
    old: Vec<Invite>,
    new: Vec<Invite>,
) -> Option<Event> {
    let used = find_used_invite(&old, &new);
    let structurally_changed = old.len() != new.len()
        || old
            .iter()
            .zip(new.iter())
            .any(|(a, b)| !a.same_shape(b));
    if used.is_none() && !structurally_changed {
        return None;
    }

    let mut event = Event::new(
        EventKind::DiffInvites,
        bot_user_id,
        EventPayload::DiffInvites(InvitesDiff { old, new, used }),
    );
    event.guild_id = Some(guild_id.to_string());
    Some(event)
}

fn find_invite<'a>(code: &str, list: &'a [Invite]) -> Option<&'a Invite> {
    list.iter().find(|invite| invite.code == code)
}

/// The invite whose use count incremented by exactly one: the candidate
/// attribution for "someone joined through this invite". Zero or more than
/// one candidate means no attribution.
pub fn find_used_invite(old: &[Invite], new: &[Invite]) -> Option<Invite> {
    let mut matches = 0;
    let mut found = None;

    for new_invite in new {
        let Some(old_invite) = find_invite(&new_invite.code, old) else {
            continue;
        };

        if new_invite.uses == old_invite.uses + 1 {
            matches += 1;
            found = Some(new_invite.clone());
        }
        if matches > 1 {
            return None;
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guild(id: &str, name: &str) -> Guild {
        Guild {
            id: id.to_string(),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn invite(code: &str, uses: i32) -> Invite {
        Invite {
            code: code.to_string(),
            uses,
            ..Default::default()
        }
    }

    #[test]
    fn test_guild_diff_requires_both_sides() {
        assert!(guild_diff("B1", None, Some(guild("100", "B"))).is_none());
        assert!(guild_diff("B1", Some(guild("100", "A")), None).is_none());
        assert!(guild_diff("B1", Some(guild("100", "A")), Some(guild("100", "A"))).is_none());

        let event = guild_diff("B1", Some(guild("100", "A")), Some(guild("100", "B"))).unwrap();
        assert_eq!(event.kind, EventKind::DiffGuild);
        assert_eq!(event.guild_id.as_deref(), Some("100"));
        match event.payload {
            EventPayload::DiffGuild(diff) => {
                assert_eq!(diff.old.name.as_deref(), Some("A"));
                assert_eq!(diff.new.name.as_deref(), Some("B"));
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn test_channel_diff_allows_missing_new_side() {
        let old = Channel {
            id: "C1".to_string(),
            guild_id: Some("100".to_string()),
            ..Default::default()
        };

        assert!(channel_diff("B1", None, None).is_none());
        assert!(channel_diff("B1", Some(old.clone()), Some(old.clone())).is_none());

        let event = channel_diff("B1", Some(old), None).unwrap();
        match event.payload {
            EventPayload::DiffChannel(diff) => assert!(diff.new.is_none()),
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn test_find_used_invite() {
        let old = vec![invite("a", 3), invite("b", 1)];

        // exactly one incremented by one
        let new = vec![invite("a", 4), invite("b", 1)];
        assert_eq!(find_used_invite(&old, &new).unwrap().code, "a");

        // none incremented
        let new = vec![invite("a", 3), invite("b", 1)];
        assert!(find_used_invite(&old, &new).is_none());

        // two candidates are ambiguous
        let new = vec![invite("a", 4), invite("b", 2)];
        assert!(find_used_invite(&old, &new).is_none());

        // +2 is not a single use
        let new = vec![invite("a", 5), invite("b", 1)];
        assert!(find_used_invite(&old, &new).is_none());
    }

    #[test]
    fn test_invites_diff_ignores_use_count_churn_without_attribution() {
        // Use counts moved by more than one: not structural, no attribution.
        let old = vec![invite("a", 3)];
        let new = vec![invite("a", 6)];
        assert!(invites_diff("B1", "100", old, new).is_none());

        let old = vec![invite("a", 3)];
        let new = vec![invite("a", 4)];
        let event = invites_diff("B1", "100", old, new).unwrap();
        match event.payload {
            EventPayload::DiffInvites(diff) => {
                assert_eq!(diff.used.unwrap().code, "a");
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }
}
