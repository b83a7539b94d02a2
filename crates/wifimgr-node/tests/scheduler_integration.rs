//! Integration tests for the connection scheduler's failover lifecycle.
//!
//! # Purpose
//!
//! These tests exercise the scheduler through its *public* API, wired to a
//! real credential store over in-memory storage and the scripted radio
//! driver – the same shape the firmware uses.  They verify:
//!
//! - The happy path: the rotation walks the saved networks in rank order and
//!   the network that finally delivers an address is promoted to the top.
//! - The failure path: a rotation in which every candidate fails parks the
//!   machine in the exhausted state, and the cool-down (or an external
//!   reset) restarts it from the top-ranked network.
//! - Durability: every promotion is persisted, so a rebooted store sees the
//!   re-ranked order.
//!
//! # Driving the machine
//!
//! The scripted driver queues the events each planned outcome implies; the
//! tests pump them into `handle_event` by hand, which keeps every transition
//! deterministic and avoids timing dependence:
//!
//! ```text
//! tick()        → scheduler dispatches associate() to the driver
//! drain_events()→ the planned verdict (failed / dropped / acquired)
//! handle_event()→ scheduler reacts: retry, advance, or connect
//! ```

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use wifimgr_node::application::credential_store::{CredentialStore, KvStore};
use wifimgr_node::application::radio::RadioDriver;
use wifimgr_node::application::scheduler::{
    ConnectionPhase, ConnectionScheduler, SchedulerConfig, CONNECTION_FAILED_KEY, STATE_NAMESPACE,
};
use wifimgr_node::infrastructure::radio::{AssociateOutcome, MockRadioDriver};
use wifimgr_node::infrastructure::storage::MemoryKvStore;

struct Rig {
    scheduler: ConnectionScheduler,
    store: Arc<CredentialStore>,
    radio: Arc<MockRadioDriver>,
    state_kv: Arc<MemoryKvStore>,
}

/// Builds a scheduler over a freshly provisioned store.  `ssids` are saved
/// in order, so the *last* one holds the highest rank.
fn rig(ssids: &[&str], config: SchedulerConfig) -> Rig {
    let store = Arc::new(CredentialStore::new(Arc::new(MemoryKvStore::new())));
    for ssid in ssids {
        store.upsert(ssid, "pw").unwrap();
    }
    let radio = Arc::new(MockRadioDriver::new());
    let state_kv = Arc::new(MemoryKvStore::new());
    let scheduler = ConnectionScheduler::new(
        Arc::clone(&store),
        Arc::clone(&radio) as Arc<dyn RadioDriver>,
        Arc::clone(&state_kv) as Arc<dyn KvStore>,
        config,
    );
    Rig {
        scheduler,
        store,
        radio,
        state_kv,
    }
}

/// One tick followed by pumping driver events until none remain.  Handling
/// an event can re-dispatch (a retry), which queues further events, so the
/// pump loops until the driver falls silent.
fn step(rig: &mut Rig) {
    rig.scheduler.tick();
    loop {
        let events = rig.radio.drain_events();
        if events.is_empty() {
            break;
        }
        for event in events {
            rig.scheduler.handle_event(event);
        }
    }
}

/// The canonical failover run: candidates `[C, A, B]` by rank; the driver
/// rejects the first two associations and accepts the third, which must end
/// `Connected` with `B` re-ranked above `C` and `A`.
#[test]
fn test_failover_walks_ranks_and_promotes_the_winner() {
    // Saved in order A, B, C with explicit promotes to pin ranks: C highest.
    let mut r = rig(&["B", "A", "C"], SchedulerConfig::default());
    r.store.promote("A").unwrap();
    r.store.promote("C").unwrap();
    let order: Vec<String> = r
        .store
        .list()
        .unwrap()
        .into_iter()
        .map(|c| c.ssid)
        .collect();
    assert_eq!(order, vec!["C", "A", "B"], "precondition: rank order");

    r.radio.plan(AssociateOutcome::Fail); // C
    r.radio.plan(AssociateOutcome::Fail); // A
    r.radio.plan(AssociateOutcome::Acquire(Ipv4Addr::new(10, 1, 1, 20))); // B

    step(&mut r); // C fails
    step(&mut r); // A fails
    step(&mut r); // B connects

    assert_eq!(r.scheduler.phase(), ConnectionPhase::Connected);
    let status = r.scheduler.status();
    assert_eq!(status.ssid.as_deref(), Some("B"));
    assert_eq!(status.address, Some(Ipv4Addr::new(10, 1, 1, 20)));

    let attempted: Vec<String> = r
        .radio
        .associate_calls()
        .into_iter()
        .map(|(ssid, _)| ssid)
        .collect();
    assert_eq!(attempted, vec!["C", "A", "B"], "attempts follow rank order");

    // B's rank is now strictly higher than C's and A's.
    let list = r.store.list().unwrap();
    assert_eq!(list[0].ssid, "B");
    let rank_of = |s: &str| list.iter().find(|c| c.ssid == s).unwrap().success_rank;
    assert!(rank_of("B") > rank_of("C"));
    assert!(rank_of("B") > rank_of("A"));
}

/// The exhaustion run: all three candidates fail, the machine parks
/// in `AllExhausted`, and once the cool-down elapses the next tick restarts
/// the rotation at the top-ranked candidate.
#[test]
fn test_exhaustion_then_cooldown_restarts_at_top_rank() {
    let config = SchedulerConfig {
        cooldown: Some(Duration::ZERO),
        ..SchedulerConfig::default()
    };
    let mut r = rig(&["a", "b", "c"], config);
    for _ in 0..3 {
        r.radio.plan(AssociateOutcome::Fail);
    }

    step(&mut r); // c (top rank) fails
    step(&mut r); // b fails
    step(&mut r); // a fails
    assert_eq!(r.scheduler.phase(), ConnectionPhase::Disconnected);

    r.scheduler.tick(); // index past the end → AllExhausted
    assert_eq!(r.scheduler.phase(), ConnectionPhase::AllExhausted);
    assert_eq!(
        r.state_kv.raw(STATE_NAMESPACE, CONNECTION_FAILED_KEY),
        Some(vec![1]),
        "the failed rotation is recorded in stable storage"
    );

    r.scheduler.tick(); // zero cool-down has elapsed
    assert_eq!(r.scheduler.phase(), ConnectionPhase::Disconnected);

    r.scheduler.tick(); // fresh rotation
    assert_eq!(
        r.radio.associate_calls().last().unwrap().0,
        "c",
        "restart begins at the top-ranked candidate"
    );
}

/// A retry budget of N means a flapping candidate is attempted 1 + N times
/// before the rotation moves on.
#[test]
fn test_flapping_candidate_consumes_exactly_the_retry_budget() {
    let config = SchedulerConfig {
        max_retries: 3,
        ..SchedulerConfig::default()
    };
    let mut r = rig(&["flappy", "stable"], config);
    r.store.promote("flappy").unwrap();

    // Initial attempt plus three retries, all dropped by the AP.
    for _ in 0..4 {
        r.radio.plan(AssociateOutcome::Drop { reason_code: 2 });
    }
    r.radio.plan(AssociateOutcome::Acquire(Ipv4Addr::new(10, 1, 1, 9)));

    // The drop events chain retries without needing ticks in between.
    step(&mut r);
    assert_eq!(
        r.radio
            .associate_calls()
            .iter()
            .filter(|(ssid, _)| ssid == "flappy")
            .count(),
        4,
        "one attempt plus max_retries"
    );

    step(&mut r); // rotation advanced: "stable" connects
    assert_eq!(r.scheduler.phase(), ConnectionPhase::Connected);
    assert_eq!(r.scheduler.status().ssid.as_deref(), Some("stable"));
}

/// With automatic retry disabled (negative cool-down in the config, `None`
/// here), only an external reset releases the parked machine.
#[test]
fn test_reset_is_the_only_way_out_of_a_parked_exhaustion() {
    let config = SchedulerConfig {
        cooldown: None,
        ..SchedulerConfig::default()
    };
    let mut r = rig(&["only"], config);
    r.radio.plan(AssociateOutcome::Fail);

    step(&mut r);
    r.scheduler.tick();
    assert_eq!(r.scheduler.phase(), ConnectionPhase::AllExhausted);

    // Ticks do nothing while parked.
    for _ in 0..10 {
        r.scheduler.tick();
    }
    assert_eq!(r.scheduler.phase(), ConnectionPhase::AllExhausted);
    assert_eq!(r.radio.associate_calls().len(), 1);

    r.scheduler.reset();
    assert_eq!(r.scheduler.phase(), ConnectionPhase::Disconnected);
    assert_eq!(
        r.state_kv.raw(STATE_NAMESPACE, CONNECTION_FAILED_KEY),
        Some(vec![0]),
        "reset clears the recorded failure"
    );

    r.scheduler.tick();
    assert_eq!(r.radio.associate_calls().len(), 2, "rotation resumed");
}

/// Promotions are durable: a store reopened over the same storage sees the
/// order the last successful connection produced.
#[test]
fn test_promotion_survives_store_reopen() {
    let backing = Arc::new(MemoryKvStore::new());
    {
        let store = Arc::new(CredentialStore::new(
            Arc::clone(&backing) as Arc<dyn KvStore>
        ));
        store.upsert("loser", "pw").unwrap();
        store.upsert("winner", "pw").unwrap();
        store.promote("loser").unwrap(); // "loser" now outranks "winner"

        let radio = Arc::new(MockRadioDriver::new());
        let mut scheduler = ConnectionScheduler::new(
            Arc::clone(&store),
            Arc::clone(&radio) as Arc<dyn RadioDriver>,
            Arc::new(MemoryKvStore::new()) as Arc<dyn KvStore>,
            SchedulerConfig::default(),
        );

        radio.plan(AssociateOutcome::Fail); // "loser" fails this time
        radio.plan(AssociateOutcome::Acquire(Ipv4Addr::new(10, 0, 0, 3)));

        scheduler.tick();
        for event in radio.drain_events() {
            scheduler.handle_event(event);
        }
        scheduler.tick();
        for event in radio.drain_events() {
            scheduler.handle_event(event);
        }
        assert_eq!(scheduler.phase(), ConnectionPhase::Connected);
    }

    // Reboot: a fresh store over the same flash.
    let reopened = CredentialStore::new(backing as Arc<dyn KvStore>);
    assert_eq!(reopened.list().unwrap()[0].ssid, "winner");
}
