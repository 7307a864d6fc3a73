//! Property tests for history replay and global ordering.

mod common;

use common::{Person, store};
use eventide::{
    Aggregate, Repository,
    store::GloballyOrderedStore,
};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    /// However tracked changes are split into saves, loading rebuilds the
    /// same state and counters.
    #[test]
    fn replay_matches_tracked_state(
        name in "[A-Za-z]{1,12}",
        batches in prop::collection::vec(0usize..4, 1..12),
    ) {
        runtime().block_on(async {
            let repo = Repository::new(store());
            let mut person = Person::create(&name).unwrap();
            for years in &batches {
                for _ in 0..*years {
                    person.grow_older().unwrap();
                }
                repo.save(&mut person).await.unwrap();
            }

            let loaded: Person = repo.load(person.root().id()).await.unwrap();
            prop_assert_eq!(&loaded.name, &person.name);
            prop_assert_eq!(loaded.age, person.age);
            prop_assert_eq!(loaded.root().version(), person.root().version());
            prop_assert_eq!(loaded.root().global_version(), person.root().global_version());

            let total: usize = batches.iter().sum();
            prop_assert_eq!(loaded.root().version(), total as u64 + 1);
            Ok(())
        })?;
    }

    /// Interleaved saves across aggregates yield a gap-free global feed in
    /// which each stream's versions still ascend.
    #[test]
    fn global_feed_is_totally_ordered(
        schedule in prop::collection::vec((0usize..3, 1usize..3), 1..15),
    ) {
        runtime().block_on(async {
            let repo = Repository::new(store());
            let mut people = vec![
                Person::create("Kalle").unwrap(),
                Person::create("Pelle").unwrap(),
                Person::create("Olle").unwrap(),
            ];
            for person in &mut people {
                repo.save(person).await.unwrap();
            }
            for (who, years) in &schedule {
                let person = &mut people[*who];
                for _ in 0..*years {
                    person.grow_older().unwrap();
                }
                repo.save(person).await.unwrap();
            }

            let feed = repo.event_store().global_events(1, usize::MAX).await.unwrap();
            let total = 3 + schedule.iter().map(|(_, years)| years).sum::<usize>();
            prop_assert_eq!(feed.len(), total);
            for (position, event) in feed.iter().enumerate() {
                prop_assert_eq!(event.global_version, position as u64 + 1);
            }
            for person in &people {
                let versions: Vec<_> = feed
                    .iter()
                    .filter(|event| event.aggregate_id == person.root().id())
                    .map(|event| event.version)
                    .collect();
                let expected: Vec<_> = (1..=person.root().version()).collect();
                prop_assert_eq!(versions, expected);
            }
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn global_feed_pages_from_start() {
    let repo = Repository::new(store());
    let mut person = Person::create("Kalle").unwrap();
    for _ in 0..4 {
        person.grow_older().unwrap();
    }
    repo.save(&mut person).await.unwrap();

    let page = repo.event_store().global_events(3, 2).await.unwrap();
    let positions: Vec<_> = page.iter().map(|event| event.global_version).collect();
    assert_eq!(positions, [3, 4]);

    let tail = repo.event_store().global_events(6, 10).await.unwrap();
    assert!(tail.is_empty());
}
