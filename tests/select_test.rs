use savak::{make, select, select_or, Case, Recv};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_select_default() {
    let c = make::<i32>(1);

    let out = select_or(vec![Case::recv(&c, |_| "recv")], || "default");
    assert_eq!(out, "default");
}

#[test]
fn test_select_picks_ready_case() {
    let c1 = make(1);
    let c2 = make::<i32>(1);
    c1.send(7).unwrap();

    let out = select(vec![
        Case::recv(&c1, |m| ("a", m.msg().unwrap())),
        Case::recv(&c2, |m| ("b", m.msg().unwrap())),
    ]);
    assert_eq!(out, ("a", 7));
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_select_race() {
    let c1 = make::<i32>(1);
    let c2 = make::<i32>(1);

    let tx = c2.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        tx.send(20).unwrap();
    });

    let out = select(vec![
        Case::recv(&c1, |_| panic!("c1 is never fed")),
        Case::recv(&c2, |m| m.msg().unwrap()),
    ]);
    assert_eq!(out, 20);
}

#[test]
fn test_select_send_case() {
    let c = make::<i32>(1);

    let out = select(vec![Case::send(&c, 5, || "sent")]);
    assert_eq!(out, "sent");
    assert_eq!(c.try_recv(), Some(Recv::Msg(5)));
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_select_blocked_send_completes() {
    let c = make(1);
    c.send(1).unwrap();

    let c2 = c.clone();
    let t = thread::spawn(move || select(vec![Case::send(&c2, 2, || "sent")]));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(c.recv(), Recv::Msg(1));

    assert_eq!(t.join().unwrap(), "sent");
    assert_eq!(c.recv(), Recv::Msg(2));
}

#[test]
fn test_select_exactly_one_handler() {
    // Both cases ready on every trial; exactly one handler may run
    let c1 = make(1);
    let c2 = make(1);
    for _ in 0..100 {
        let _ = c1.try_send(1);
        let _ = c2.try_send(2);

        let fired = Arc::new(AtomicUsize::new(0));
        let (f1, f2) = (fired.clone(), fired.clone());
        select(vec![
            Case::recv(&c1, move |_| {
                f1.fetch_add(1, Ordering::SeqCst);
            }),
            Case::recv(&c2, move |_| {
                f2.fetch_add(1, Ordering::SeqCst);
            }),
        ]);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_select_fairness() {
    let c1 = make(1);
    let c2 = make(1);
    let trials = 400;

    let mut counts = [0usize; 2];
    for _ in 0..trials {
        let _ = c1.try_send(1);
        let _ = c2.try_send(2);

        let winner = select(vec![Case::recv(&c1, |_| 0usize), Case::recv(&c2, |_| 1usize)]);
        counts[winner] += 1;
    }

    // Both cases were ready every trial; neither may starve
    assert!(counts[0] > trials / 8, "case 0 won {} of {}", counts[0], trials);
    assert!(counts[1] > trials / 8, "case 1 won {} of {}", counts[1], trials);
}

#[test]
fn test_select_same_channel_twice() {
    let c = make(1);
    c.send(3).unwrap();

    let out = select(vec![
        Case::recv(&c, |m| m.msg().unwrap()),
        Case::recv(&c, |m| m.msg().unwrap()),
    ]);
    assert_eq!(out, 3);
    assert!(c.try_recv().is_none());
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_select_sees_close() {
    let c1 = make::<i32>(0);
    let c2 = make::<i32>(0);

    let (d1, d2) = (c1.clone(), c2.clone());
    let t = thread::spawn(move || {
        select(vec![
            Case::recv(&d1, |m| (0, m.is_closed())),
            Case::recv(&d2, |m| (1, m.is_closed())),
        ])
    });

    thread::sleep(Duration::from_millis(50));
    c1.close().unwrap();

    assert_eq!(t.join().unwrap(), (0, true));
}

#[test]
#[should_panic(expected = "send on closed channel")]
fn test_select_send_on_closed_panics() {
    let c = make::<i32>(1);
    c.close().unwrap();
    select(vec![Case::send(&c, 1, || ())]);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_select_blocked_send_sees_close() {
    let c = make::<i32>(0);
    let c2 = c.clone();

    let t = thread::spawn(move || select(vec![Case::send(&c2, 1, || ())]));

    thread::sleep(Duration::from_millis(50));
    c.close().unwrap();

    // The parked send case reruns, observes the close and panics
    assert!(t.join().is_err());
}

#[test]
#[should_panic(expected = "select with no cases")]
fn test_select_empty_panics() {
    select::<i32>(vec![]);
}

#[test]
fn test_select_or_empty_runs_default() {
    let cases: Vec<Case<i32>> = Vec::new();
    let out = select_or(cases, || 9);
    assert_eq!(out, 9);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_overlapping_selects_progress() {
    let c1 = make::<i32>(0);
    let c2 = make::<i32>(0);

    let (a1, a2) = (c1.clone(), c2.clone());
    let t1 = thread::spawn(move || {
        select(vec![
            Case::send(&a1, 1, || "sent c1"),
            Case::recv(&a2, |_| "recv c2"),
        ])
    });

    let (b1, b2) = (c1.clone(), c2.clone());
    let t2 = thread::spawn(move || {
        select(vec![
            Case::send(&b2, 2, || "sent c2"),
            Case::recv(&b1, |_| "recv c1"),
        ])
    });

    // The two selects overlap on both channels; each must commit one case
    let r1 = t1.join().unwrap();
    let r2 = t2.join().unwrap();
    assert!(
        (r1 == "sent c1" && r2 == "recv c1") || (r1 == "recv c2" && r2 == "sent c2"),
        "inconsistent pairing: {:?} / {:?}",
        r1,
        r2
    );
}

#[test]
fn test_select_macro() {
    let a = make::<i32>(1);
    let b = make::<i32>(1);
    a.send(10).unwrap();

    savak::select! {
        m = a => assert_eq!(m, Recv::Msg(10)),
        _m = b => panic!("b is empty"),
    }
}

#[test]
fn test_select_macro_default() {
    let a = make::<i32>(1);
    let b = make::<i32>(1);

    let out = savak::select! {
        _m = a => "a",
        _m = b => "b";
        default => "idle",
    };
    assert_eq!(out, "idle");
}
