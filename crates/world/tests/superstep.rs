//! Superstep semantics: visibility timing, counter reset, and the fatal
//! error paths reachable without breaking the group.

use transport::Mesh;
use world::{Environment, Queue, Var, World, WorldError};

const PEERS: usize = 4;

fn run(f: impl Fn(World) + Send + Sync + 'static) {
    let _ = env_logger::builder().is_test(true).try_init();
    Environment::new(PEERS).spawn(f).unwrap();
}

/// A group of one, running inline on the caller's thread.
fn solo() -> World {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut endpoints = Mesh::endpoints(1).unwrap();
    World::new(Box::new(endpoints.remove(0)))
}

#[test]
fn remote_put_is_invisible_before_sync() {
    run(|w| {
        let a = Var::new(&w).unwrap();
        a.put(w.next_rank(), 7u32).unwrap();
        // The engine only touches local regions inside sync, so whatever
        // the network did so far, the local image still reads zero.
        assert_eq!(a.value(), 0);
        w.sync().unwrap();
        assert_eq!(a.value(), 7);
    });
}

#[test]
fn messages_live_for_exactly_one_superstep() {
    run(|w| {
        let q = Queue::<u32, u32>::new(&w);
        q.send(w.rank(), 1, 2).unwrap();
        assert!(q.messages().unwrap().is_empty());
        w.sync().unwrap();
        assert_eq!(q.messages().unwrap().len(), 1);
        w.sync().unwrap();
        assert!(q.messages().unwrap().is_empty());
    });
}

#[test]
fn empty_syncs_are_idempotent() {
    run(|w| {
        let a = Var::with_value(&w, w.rank() as u32).unwrap();
        for _ in 0..3 {
            w.sync().unwrap();
            assert_eq!(a.value(), w.rank() as u32);
        }
        // Counters were reset each round; a real operation still works.
        a.put(w.next_rank(), 99u32).unwrap();
        w.sync().unwrap();
        assert_eq!(a.value(), 99);
    });
}

#[test]
fn operations_stage_per_superstep_not_cumulatively() {
    run(|w| {
        let a = Var::new(&w).unwrap();
        a.put(w.next_rank(), 1u32).unwrap();
        w.sync().unwrap();
        assert_eq!(a.value(), 1);
        // Nothing staged this superstep: the previous put must not be
        // replayed.
        w.sync().unwrap();
        assert_eq!(a.value(), 1);
    });
}

#[test]
fn barrier_alone_delivers_nothing() {
    run(|w| {
        let a = Var::new(&w).unwrap();
        a.put(w.next_rank(), 5u32).unwrap();
        w.barrier().unwrap();
        assert_eq!(a.value(), 0);
        w.sync().unwrap();
        assert_eq!(a.value(), 5);
    });
}

#[test]
fn single_peer_group_works() {
    let w = solo();
    assert_eq!(w.rank(), 0);
    assert_eq!(w.size(), 1);
    assert_eq!(w.next_rank(), 0);
    assert_eq!(w.prev_rank(), 0);

    let a = Var::with_value(&w, 11u32).unwrap();
    a.put(0, 13).unwrap();
    // Self-puts short-circuit and are visible immediately.
    assert_eq!(a.value(), 13);

    let q = Queue::<u32, u32>::new(&w);
    q.send(0, 3, 4).unwrap();
    assert!(q.messages().unwrap().is_empty());
    w.sync().unwrap();
    assert_eq!(q.messages().unwrap().len(), 1);
}

#[test]
fn put_to_rank_outside_group_fails() {
    let w = solo();
    let a = Var::with_value(&w, 0u32).unwrap();
    let err = a.put(3, 1).unwrap_err();
    assert!(matches!(err, WorldError::Transport(_)));
}

#[test]
fn get_from_rank_outside_group_fails() {
    let w = solo();
    let a = Var::with_value(&w, 0u32).unwrap();
    assert!(a.get(9).is_err());
}
