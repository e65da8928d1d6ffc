//! Which subscribers are entitled to which events.

use std::collections::HashSet;

use staytuned_core::types::{NotificationLevel, Subscriber, UserId};

use super::event::EventKind;

/// Whether a subscriber at `level` should receive an event of `kind`.
pub fn accepts(level: NotificationLevel, kind: EventKind) -> bool {
    match level {
        NotificationLevel::None => false,
        NotificationLevel::All => true,
        NotificationLevel::Important => kind == EventKind::Post,
    }
}

/// The eligible set for an event: every subscriber whose level accepts it.
pub fn eligible_users(subscribers: &[Subscriber], kind: EventKind) -> HashSet<UserId> {
    subscribers
        .iter()
        .filter(|s| accepts(s.level, kind))
        .map(|s| s.user_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_matrix() {
        use EventKind::*;
        use NotificationLevel as L;

        for kind in [Post, Reaction, ChannelUpdate] {
            assert!(accepts(L::All, kind));
            assert!(!accepts(L::None, kind));
        }
        assert!(accepts(L::Important, Post));
        assert!(!accepts(L::Important, Reaction));
        assert!(!accepts(L::Important, ChannelUpdate));
    }

    #[test]
    fn eligible_set_filters_by_level() {
        let all = UserId::new();
        let important = UserId::new();
        let muted = UserId::new();
        let subscribers = vec![
            Subscriber::new(all, NotificationLevel::All),
            Subscriber::new(important, NotificationLevel::Important),
            Subscriber::new(muted, NotificationLevel::None),
        ];

        let posts = eligible_users(&subscribers, EventKind::Post);
        assert_eq!(posts, HashSet::from([all, important]));

        let reactions = eligible_users(&subscribers, EventKind::Reaction);
        assert_eq!(reactions, HashSet::from([all]));
    }
}
