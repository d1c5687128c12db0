//! Chat view convergence under arbitrary delivery

use std::collections::BTreeSet;

use proptest::prelude::*;
use uuid::Uuid;

use bazaar_sync::client::ChatRoomView;
use bazaar_sync::shared::Message;

use crate::common::message;

#[derive(Debug, Clone)]
enum Delivery {
    /// Broadcast envelope of message `n`
    Message(usize),
    /// Read receipt naming some messages
    Read(Vec<usize>),
    /// History refetch
    Resync,
}

fn deliveries(len: usize) -> impl Strategy<Value = Vec<Delivery>> {
    let one = prop_oneof![
        4 => (0..len).prop_map(Delivery::Message),
        2 => prop::collection::vec(0..len, 1..4).prop_map(Delivery::Read),
        1 => Just(Delivery::Resync),
    ];
    prop::collection::vec(one, 1..60)
}

fn history(len: usize) -> Vec<Message> {
    let senders = [Uuid::new_v4(), Uuid::new_v4()];
    (0..len)
        .map(|i| message(100 + i as i64, senders[i % 2], (i as i64) / 2))
        .collect()
}

proptest! {
    #[test]
    fn prop_view_is_sorted_deduplicated_and_read_monotonic(
        events in deliveries(12),
    ) {
        let messages = history(12);
        let view = ChatRoomView::new(1);
        let mut read: BTreeSet<i64> = BTreeSet::new();

        for event in events {
            match event {
                Delivery::Message(n) => {
                    view.insert(messages[n].clone());
                }
                Delivery::Read(ns) => {
                    let ids: Vec<i64> = ns.iter().map(|n| messages[*n].id).collect();
                    view.apply_read(&ids);
                    read.extend(ids);
                }
                Delivery::Resync => {
                    // A stale refetch reports everything unread.
                    view.merge(messages.clone());
                }
            }

            let shown = view.messages();
            let ids: Vec<i64> = shown.iter().map(|m| m.id).collect();
            let unique: BTreeSet<i64> = ids.iter().copied().collect();
            prop_assert_eq!(unique.len(), ids.len());
            prop_assert!(shown.windows(2).all(|w| w[0].sort_key() <= w[1].sort_key()));
            for message in &shown {
                // Once a receipt named a message it never reads as unread,
                // whether the receipt came before or after the message.
                if read.contains(&message.id) {
                    prop_assert!(message.is_read);
                }
            }
        }
    }

    #[test]
    fn prop_order_of_arrival_does_not_matter(
        order in Just((0..10usize).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let messages = history(10);
        let view = ChatRoomView::new(1);
        for n in &order {
            view.insert(messages[*n].clone());
            view.insert(messages[*n].clone());
        }
        prop_assert_eq!(view.messages(), messages);
    }
}
