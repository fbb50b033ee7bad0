use savak::{make, Recv, TrySendError};
use std::thread;
use std::time::Duration;

#[test]
fn test_buffered_fifo() {
    let c = make(2);
    c.send(1).unwrap();
    c.send(2).unwrap();

    assert_eq!(c.recv(), Recv::Msg(1));
    assert_eq!(c.recv(), Recv::Msg(2));
}

#[test]
fn test_ring_wraparound() {
    let c = make(2);
    for i in 0..10 {
        c.send(i).unwrap();
        assert_eq!(c.recv(), Recv::Msg(i));
    }
    c.send(10).unwrap();
    c.send(11).unwrap();
    assert_eq!(c.recv(), Recv::Msg(10));
    assert_eq!(c.recv(), Recv::Msg(11));
}

#[test]
fn test_try_send_full() {
    let c = make(1);
    assert!(c.try_send(1).is_ok());
    match c.try_send(2) {
        Err(TrySendError::Full(2)) => {}
        other => panic!("expected Full(2), got {:?}", other),
    }
    assert_eq!(c.len(), 1);
    assert!(c.is_full());
}

#[test]
fn test_try_recv_empty_leaves_state() {
    let c = make::<i32>(2);
    assert!(c.try_recv().is_none());
    assert_eq!(c.len(), 0);
    assert_eq!(c.capacity(), 2);
    assert!(c.is_empty());
    assert!(!c.is_closed());
    // A second attempt observes identical state.
    assert!(c.try_recv().is_none());
    assert_eq!(c.len(), 0);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_send_blocks_when_full() {
    let c = make(1);
    c.send(1).unwrap();

    let c2 = c.clone();
    let t = thread::spawn(move || {
        c2.send(2).unwrap();
    });

    // Give the sender time to park
    thread::sleep(Duration::from_millis(50));

    assert_eq!(c.recv(), Recv::Msg(1));
    t.join().unwrap();
    assert_eq!(c.recv(), Recv::Msg(2));
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_parked_senders_are_fifo() {
    let c = make(1);
    c.send(0).unwrap();

    let mut handles = vec![];
    for i in 1..=3 {
        let c = c.clone();
        handles.push(thread::spawn(move || {
            c.send(i).unwrap();
        }));
        // Stagger the senders so they park in order
        thread::sleep(Duration::from_millis(50));
    }

    let mut received = vec![];
    for _ in 0..4 {
        received.push(c.recv().msg().unwrap());
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(received, vec![0, 1, 2, 3]);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_multi_producer_per_producer_order() {
    let c = make(4);
    let producers: usize = 2;
    let per: usize = 500;

    let mut handles = vec![];
    for p in 0..producers {
        let c = c.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per {
                c.send((p, i)).unwrap();
            }
        }));
    }

    let mut next = [0usize; 2];
    for _ in 0..producers * per {
        let (p, i) = c.recv().msg().unwrap();
        // Each producer's values arrive in the order it sent them
        assert_eq!(i, next[p]);
        next[p] += 1;
    }

    for h in handles {
        h.join().unwrap();
    }
}
