//! Topic name parsing

use proptest::prelude::*;
use uuid::Uuid;

use bazaar_sync::shared::Topic;

proptest! {
    #[test]
    fn prop_room_topics_parse_back(room_id in 0i64..i64::MAX) {
        prop_assert_eq!(Topic::parse(&Topic::room(room_id)), Topic::Room(room_id));
    }

    #[test]
    fn prop_presence_topics_parse_back(
        kind in "[a-z]{1,12}",
        id in "[a-zA-Z0-9:_-]{1,24}",
    ) {
        // Resource ids may themselves contain ':'; only the first one splits.
        prop_assert_eq!(
            Topic::parse(&Topic::presence(&kind, &id)),
            Topic::Presence { kind, id }
        );
    }

    #[test]
    fn prop_follow_topics_parse_back(bytes in any::<[u8; 16]>()) {
        let target = Uuid::from_bytes(bytes);
        prop_assert_eq!(Topic::parse(&Topic::follow(target)), Topic::Follow(target));
    }

    #[test]
    fn prop_parse_never_panics(name in ".{0,64}") {
        let _ = Topic::parse(&name);
    }
}
