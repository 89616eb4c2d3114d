use gpr_sync::{IsrGuard, IsrMutex, TaskMutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::{panic, thread};

#[test]
fn task_lock_basic_raii() {
    let l = TaskMutex::new(0_u32);

    // take the lock, mutate, and drop
    {
        let mut g = l.lock();
        *g = 41;
        assert!(l.is_locked());
    }
    assert!(!l.is_locked());

    // lock again; previous drop must have unlocked
    {
        let mut g = l.lock();
        *g += 1;
        assert_eq!(*g, 42);
    }
}

#[test]
fn try_lock_fails_while_held() {
    let task = TaskMutex::new(1u8);
    let g1 = task.try_lock();
    assert!(g1.is_some());
    assert!(task.try_lock().is_none());
    drop(g1);
    assert!(task.try_lock().is_some());

    let isr = IsrMutex::new(1u8);
    let g1 = isr.lock_isr();
    assert!(isr.try_lock().is_none());
    drop(g1);
    assert!(isr.try_lock().is_some());
}

#[test]
fn with_isr_lock_unlocks() {
    let l = IsrMutex::new(vec![1, 2]);
    let len = l.with_isr_lock(|v| {
        v.push(3);
        v.len()
    });
    assert_eq!(len, 3);
    assert!(!l.is_locked());
    assert_eq!(l.lock().as_slice(), &[1, 2, 3]);
}

#[test]
fn isr_guard_is_noop_without_irq_mask() {
    let g = IsrGuard::new();
    assert!(!g.masked());
}

#[test]
fn get_mut_and_into_inner() {
    let mut l = TaskMutex::new(String::from("a"));
    l.get_mut().push('b');
    assert_eq!(l.into_inner(), "ab");
}

fn hammer<F>(threads: usize, iters: usize, f: F) -> usize
where
    F: Fn(&dyn Fn(&mut usize)) + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let in_cs = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));
    let total = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(threads);
    for _ in 0..threads {
        let f = Arc::clone(&f);
        let in_cs = Arc::clone(&in_cs);
        let start = Arc::clone(&start);
        let total = Arc::clone(&total);
        handles.push(thread::spawn(move || {
            start.wait();
            for _ in 0..iters {
                f(&|v: &mut usize| {
                    let prev = in_cs.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(prev, 0, "mutual exclusion violated");
                    *v += 1;
                    total.store(*v, Ordering::SeqCst);
                    in_cs.fetch_sub(1, Ordering::SeqCst);
                });
                // yield only AFTER releasing the lock to reduce convoy effects
                thread::yield_now();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    total.load(Ordering::SeqCst)
}

#[test]
fn contended_task_lock_is_exclusive() {
    let lock = Arc::new(TaskMutex::new(0usize));
    let l = Arc::clone(&lock);
    let last = hammer(8, 2_000, move |cs| l.with_lock(|v| cs(v)));
    assert_eq!(last, 8 * 2_000);
    assert_eq!(*lock.lock(), 8 * 2_000);
}

#[test]
fn contended_isr_lock_is_exclusive() {
    let lock = Arc::new(IsrMutex::new(0usize));
    let l = Arc::clone(&lock);
    let last = hammer(8, 2_000, move |cs| l.with_isr_lock(|v| cs(v)));
    assert_eq!(last, 8 * 2_000);
    assert_eq!(*lock.lock_isr(), 8 * 2_000);
}

#[test]
fn lock_is_released_on_panic() {
    let l = IsrMutex::new(0u32);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        l.with_isr_lock(|v| {
            *v = 123;
            panic!("boom");
        });
    }));
    assert!(res.is_err(), "expected panic");

    // We should be able to lock again right away.
    assert_eq!(l.with_lock(|v| *v), 123);
}

/// Spot-check that both lock domains are Sync for Send payloads.
#[test]
fn lock_domains_are_sync_for_send_t() {
    fn takes_sync<S: Sync>(_s: &S) {}
    takes_sync(&TaskMutex::new(0u8));
    takes_sync(&IsrMutex::new(Vec::<u8>::new()));
}
