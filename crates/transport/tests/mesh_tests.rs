//! Mesh backend integration tests.
//! Exercises tagged delivery order, blocking probes, the collectives, and
//! the error paths of a small in-process group.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use transport::{Category, Mesh, MeshEndpoint, Transport, TransportError};

fn group(size: usize) -> Vec<MeshEndpoint> {
    let _ = env_logger::builder().is_test(true).try_init();
    Mesh::endpoints(size).unwrap()
}

#[test]
fn delivery_is_fifo_per_source() {
    let mut peers = group(3);
    let receiver = peers.remove(0);
    let senders: Vec<_> = peers
        .into_iter()
        .map(|endpoint| {
            thread::spawn(move || {
                for i in 0..50u8 {
                    endpoint
                        .send(0, Category::Message, &[endpoint.rank() as u8, i])
                        .unwrap();
                }
            })
        })
        .collect();

    let mut next_expected = [0u8; 3];
    for _ in 0..100 {
        let (src, len) = receiver.probe(Category::Message).unwrap();
        assert_eq!(len, 2);
        let frame = receiver.recv(src, Category::Message).unwrap();
        assert_eq!(frame[0] as usize, src);
        assert_eq!(frame[1], next_expected[src]);
        next_expected[src] += 1;
    }
    for sender in senders {
        sender.join().unwrap();
    }
}

#[test]
fn categories_are_independent_queues() {
    let mut peers = group(2);
    let receiver = peers.remove(0);
    let sender = peers.remove(0);

    sender.send(0, Category::Get, b"get").unwrap();
    sender.send(0, Category::Put, b"put").unwrap();

    // Draining Put first must not disturb the pending Get.
    assert_eq!(receiver.recv(1, Category::Put).unwrap(), b"put");
    assert_eq!(receiver.recv(1, Category::Get).unwrap(), b"get");
}

#[test]
fn probe_blocks_until_a_frame_arrives() {
    let mut peers = group(2);
    let receiver = peers.remove(0);
    let sender = peers.remove(0);

    let delayed = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        sender.send(0, Category::Put, &[7]).unwrap();
    });

    let (src, len) = receiver.probe(Category::Put).unwrap();
    assert_eq!((src, len), (1, 1));
    assert_eq!(receiver.recv(src, Category::Put).unwrap(), vec![7]);
    delayed.join().unwrap();
}

#[test]
fn recv_selects_by_source() {
    let peers = group(3);
    peers[1].send(0, Category::Put, &[1]).unwrap();
    peers[2].send(0, Category::Put, &[2]).unwrap();

    // Ask for rank 2's frame first even though rank 1's is older.
    assert_eq!(peers[0].recv(2, Category::Put).unwrap(), vec![2]);
    assert_eq!(peers[0].recv(1, Category::Put).unwrap(), vec![1]);
}

#[test]
fn barrier_orders_side_effects() {
    let size = 4;
    let counter = Arc::new(AtomicU64::new(0));
    let handles: Vec<_> = group(size)
        .into_iter()
        .map(|endpoint| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                endpoint.barrier().unwrap();
                // Every increment happens before any peer passes the barrier.
                assert_eq!(counter.load(Ordering::SeqCst), size as u64);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn reduce_scatter_sums_contributions_per_rank() {
    let size = 4;
    let handles: Vec<_> = group(size)
        .into_iter()
        .map(|endpoint| {
            thread::spawn(move || {
                // Peer s contributes s*10 + t toward peer t.
                let contributions: Vec<u64> =
                    (0..size).map(|t| (endpoint.rank() * 10 + t) as u64).collect();
                let total = endpoint.reduce_scatter_sum(&contributions).unwrap();
                let expected: u64 = (0..size).map(|s| (s * 10 + endpoint.rank()) as u64).sum();
                assert_eq!(total, expected);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn empty_group_is_rejected() {
    assert!(matches!(
        Mesh::endpoints(0),
        Err(TransportError::EmptyGroup)
    ));
}

#[test]
fn out_of_range_destination_is_rejected() {
    let peers = group(2);
    let err = peers[0].send(5, Category::Put, &[0]).unwrap_err();
    assert!(matches!(
        err,
        TransportError::RankOutOfRange {
            rank: 0,
            target: 5,
            size: 2
        }
    ));
}

#[test]
fn short_contribution_vector_is_rejected() {
    let peers = group(2);
    let err = peers[0].reduce_scatter_sum(&[1]).unwrap_err();
    assert!(matches!(
        err,
        TransportError::ContributionMismatch {
            rank: 0,
            got: 1,
            size: 2
        }
    ));
}
