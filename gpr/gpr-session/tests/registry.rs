use gpr_packet::HeapIndex;
use gpr_session::{Registry, SessionError, Strategy};
use std::sync::{Arc, Barrier};
use std::thread;

const STRATEGIES: [Strategy; 2] = [Strategy::Linear, Strategy::Hashed];

fn registry(strategy: Strategy, slots: usize) -> Registry<&'static str> {
    Registry::new(HeapIndex::Default, strategy, slots).unwrap()
}

#[test]
fn duplicate_registration_is_rejected_until_deregistered() {
    for strategy in STRATEGIES {
        let r = registry(strategy, 8);
        assert_eq!(r.register(0x1000, "first"), Ok(()), "{strategy:?}");
        assert_eq!(
            r.register(0x1000, "second"),
            Err(SessionError::AlreadyExists(0x1000)),
            "{strategy:?}"
        );
        assert_eq!(r.get(0x1000), Ok("first"));

        assert_eq!(r.deregister(0x1000), Ok("first"));
        assert_eq!(r.register(0x1000, "again"), Ok(()), "{strategy:?}");
        assert_eq!(r.get(0x1000), Ok("again"));
    }
}

#[test]
fn lookup_of_absent_port_has_no_side_effects() {
    for strategy in STRATEGIES {
        let r = registry(strategy, 4);
        r.register(1, "one").unwrap();
        assert_eq!(r.get(2), Err(SessionError::NotFound(2)));
        assert_eq!(r.len(), 1);
        assert!(r.contains(1));
        assert!(!r.contains(2));
    }
}

#[test]
fn double_deregister_is_reported_not_fatal() {
    for strategy in STRATEGIES {
        let r = registry(strategy, 4);
        r.register(7, "seven").unwrap();
        assert_eq!(r.deregister(7), Ok("seven"));
        assert_eq!(r.deregister(7), Err(SessionError::NotFound(7)));
        assert!(r.is_empty());
    }
}

#[test]
fn linear_table_is_bounded_hashed_is_not() {
    let linear = registry(Strategy::Linear, 3);
    let hashed = registry(Strategy::Hashed, 3);
    for port in 0..3 {
        linear.register(port, "x").unwrap();
        hashed.register(port, "x").unwrap();
    }
    assert_eq!(linear.register(3, "x"), Err(SessionError::NoFreeSlot));
    assert_eq!(hashed.register(3, "x"), Ok(()));

    // a hole left by deregistration is reused
    linear.deregister(1).unwrap();
    assert_eq!(linear.register(3, "x"), Ok(()));
}

#[test]
fn duplicate_behind_a_hole_is_still_found() {
    let r = registry(Strategy::Linear, 4);
    r.register(1, "a").unwrap();
    r.register(2, "b").unwrap();
    r.deregister(1).unwrap();
    // slot 0 is free now, port 2 still lives in slot 1
    assert_eq!(r.register(2, "c"), Err(SessionError::AlreadyExists(2)));
}

#[test]
fn ports_lists_every_registration() {
    for strategy in STRATEGIES {
        let r = registry(strategy, 16);
        for port in [3, 40, 17, 5] {
            r.register(port, "p").unwrap();
        }
        let mut ports = r.ports();
        ports.sort_unstable();
        assert_eq!(ports, [3, 5, 17, 40], "{strategy:?}");
    }
}

#[test]
fn bad_sizes_are_config_errors() {
    assert!(matches!(
        Registry::<()>::new(HeapIndex::Default, Strategy::Linear, 0),
        Err(SessionError::BadConfig { .. })
    ));
    assert!(matches!(
        Registry::<()>::new(HeapIndex::Alternate, Strategy::Hashed, 1),
        Err(SessionError::BadConfig { .. })
    ));
}

#[test]
fn concurrent_registration_of_one_port_has_one_winner() {
    for strategy in STRATEGIES {
        let r = Arc::new(Registry::new(HeapIndex::Default, strategy, 64).unwrap());
        let start = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let r = Arc::clone(&r);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    r.register(42, i).is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(winners, 1, "{strategy:?}");
        assert_eq!(r.len(), 1);
    }
}
