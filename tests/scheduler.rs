use std::cell::{Cell, RefCell};
use std::num::NonZeroUsize;
use std::rc::Rc;

use costack::{Config, CoroutineId, Scheduler, Status, Yielder};

fn yield_forever(yielder: &Yielder) {
    loop {
        yielder.yield_now().unwrap();
    }
}

#[test]
fn local_survives_suspension() {
    let mut scheduler = Scheduler::open().unwrap();
    let recorded = Rc::new(Cell::new(None));

    let id = scheduler
        .spawn({
            let recorded = recorded.clone();
            move |yielder| {
                let mut x = std::hint::black_box(1);
                yielder.yield_now().unwrap();
                x += 1;
                recorded.set(Some(x));
            }
        })
        .unwrap();

    scheduler.resume(id).unwrap();
    assert_eq!(scheduler.status(id), Status::Suspended);
    assert_eq!(recorded.get(), None);

    scheduler.resume(id).unwrap();
    assert_eq!(recorded.get(), Some(2));
    assert_eq!(scheduler.status(id), Status::Dead);
}

#[test]
fn status_follows_lifecycle() {
    let mut scheduler = Scheduler::open().unwrap();
    let observed = Rc::new(RefCell::new(Vec::new()));

    let id = scheduler
        .spawn({
            let observed = observed.clone();
            move |yielder| {
                observed.borrow_mut().push(yielder.status(yielder.id()));
                yielder.yield_now().unwrap();
                observed.borrow_mut().push(yielder.status(yielder.id()));
            }
        })
        .unwrap();

    let mut statuses = vec![scheduler.status(id)];
    scheduler.resume(id).unwrap();
    statuses.push(scheduler.status(id));
    scheduler.resume(id).unwrap();
    statuses.push(scheduler.status(id));

    assert_eq!(statuses, [Status::Ready, Status::Suspended, Status::Dead]);
    assert_eq!(*observed.borrow(), [Status::Running, Status::Running]);
}

#[test]
fn at_most_one_coroutine_runs() {
    let mut scheduler = Scheduler::open().unwrap();
    let running_counts = Rc::new(RefCell::new(Vec::new()));
    let ids: Rc<RefCell<Vec<CoroutineId>>> = Rc::default();

    for _ in 0..8 {
        let running_counts = running_counts.clone();
        let ids_seen = ids.clone();
        let id = scheduler
            .spawn(move |yielder| {
                for _ in 0..4 {
                    let running = ids_seen
                        .borrow()
                        .iter()
                        .filter(|&&id| yielder.status(id) == Status::Running)
                        .count();
                    running_counts.borrow_mut().push(running);
                    yielder.yield_now().unwrap();
                }
            })
            .unwrap();
        ids.borrow_mut().push(id);
    }

    let all: Vec<_> = ids.borrow().clone();
    while !scheduler.is_empty() {
        for &id in &all {
            scheduler.resume(id).unwrap();
            assert_eq!(scheduler.running(), None);
            assert!(all.iter().all(|&id| scheduler.status(id) != Status::Running));
        }
    }

    assert_eq!(running_counts.borrow().len(), 8 * 4);
    assert!(running_counts.borrow().iter().all(|&count| count == 1));
}

#[test]
fn interleaved_coroutines_keep_their_stacks() {
    fn accumulate(yielder: &Yielder, (seed, sink): (u64, Rc<RefCell<Vec<(u64, u64)>>>)) {
        let mut values = [0u64; 64];
        for (i, value) in values.iter_mut().enumerate() {
            *value = seed * 1000 + i as u64;
        }
        let mut sum = 0;
        for round in 0..10 {
            sum += std::hint::black_box(values[round]);
            yielder.yield_now().unwrap();
        }
        sink.borrow_mut().push((seed, sum));
    }

    let mut scheduler = Scheduler::open().unwrap();
    let sink = Rc::new(RefCell::new(Vec::new()));
    let ids: Vec<_> = (0..20)
        .map(|seed| scheduler.spawn_with(accumulate, (seed, sink.clone())).unwrap())
        .collect();

    while !scheduler.is_empty() {
        for &id in ids.iter().rev() {
            scheduler.resume(id).unwrap();
        }
    }

    let mut results = sink.borrow().clone();
    results.sort();
    let expected: Vec<(u64, u64)> = (0..20).map(|seed| (seed, seed * 1000 * 10 + 45)).collect();
    assert_eq!(results, expected);
}

#[test]
fn completed_id_is_reused_by_new_coroutine() {
    let mut scheduler = Scheduler::open().unwrap();
    let first = scheduler.spawn(|_| {}).unwrap();
    scheduler.resume(first).unwrap();
    assert_eq!(scheduler.status(first), Status::Dead);

    let second = scheduler.spawn(yield_forever).unwrap();

    assert_eq!(second, first);
    assert_eq!(scheduler.status(second), Status::Ready);
    scheduler.resume(second).unwrap();
    assert_eq!(scheduler.status(second), Status::Suspended);
}

#[test]
fn table_doubles_once_when_full() {
    let mut scheduler = Scheduler::open().unwrap();
    let capacity = scheduler.capacity();
    for _ in 0..capacity {
        scheduler.spawn(yield_forever).unwrap();
    }
    assert_eq!(scheduler.capacity(), capacity);

    let id = scheduler.spawn(yield_forever).unwrap();

    assert_eq!(id.index(), capacity);
    assert_eq!(scheduler.capacity(), 2 * capacity);
    assert_eq!(scheduler.len(), capacity + 1);
    for index in capacity + 1..2 * capacity {
        assert_eq!(scheduler.status(CoroutineId::from(index)), Status::Dead);
    }
}

#[test]
fn resuming_empty_slot_is_a_no_op() {
    let mut scheduler = Scheduler::open().unwrap();
    let suspended = scheduler.spawn(yield_forever).unwrap();
    scheduler.resume(suspended).unwrap();
    let backup_size = scheduler.backup_size(suspended);

    scheduler.resume(CoroutineId::from(7)).unwrap();

    assert_eq!(scheduler.running(), None);
    assert_eq!(scheduler.len(), 1);
    assert_eq!(scheduler.status(suspended), Status::Suspended);
    assert_eq!(scheduler.backup_size(suspended), backup_size);
    assert_eq!(scheduler.status(CoroutineId::from(7)), Status::Dead);
}

#[test]
fn close_releases_live_coroutines() {
    let mut scheduler = Scheduler::open().unwrap();
    let token = Rc::new(());
    for n in 0..10 {
        let token = token.clone();
        let id = scheduler
            .spawn(move |yielder| {
                let _token = token;
                yield_forever(yielder);
            })
            .unwrap();
        if n % 2 == 0 {
            scheduler.resume(id).unwrap();
        }
    }
    assert_eq!(scheduler.len(), 10);

    scheduler.close();

    // the five that never ran drop their closure, the suspended ones leak it along with their frames
    assert_eq!(Rc::strong_count(&token), 1 + 5);
}

#[test]
fn schedulers_are_independent() {
    let mut left = Scheduler::open().unwrap();
    let mut right = Scheduler::open().unwrap();
    let trace = Rc::new(RefCell::new(Vec::new()));

    let spawn = |scheduler: &mut Scheduler, name: &'static str| {
        let trace = trace.clone();
        scheduler
            .spawn(move |yielder| {
                trace.borrow_mut().push((name, 0));
                yielder.yield_now().unwrap();
                trace.borrow_mut().push((name, 1));
            })
            .unwrap()
    };
    let l = spawn(&mut left, "left");
    let r = spawn(&mut right, "right");

    left.resume(l).unwrap();
    right.resume(r).unwrap();
    right.resume(r).unwrap();
    left.resume(l).unwrap();

    assert_eq!(
        *trace.borrow(),
        [("left", 0), ("right", 0), ("right", 1), ("left", 1)]
    );
}

#[test]
fn scheduler_nests_inside_coroutine() {
    let mut outer = Scheduler::open().unwrap();
    let total = Rc::new(Cell::new(0));

    let id = outer
        .spawn({
            let total = total.clone();
            move |yielder| {
                let config = Config::default().stack_size(NonZeroUsize::new(64 * 1024).unwrap());
                let mut inner = Scheduler::with_config(config).unwrap();
                let inner_id = inner
                    .spawn({
                        let total = total.clone();
                        move |inner_yielder| {
                            total.set(total.get() + 1);
                            inner_yielder.yield_now().unwrap();
                            total.set(total.get() + 10);
                        }
                    })
                    .unwrap();

                inner.resume(inner_id).unwrap();
                yielder.yield_now().unwrap();
                inner.resume(inner_id).unwrap();
                assert_eq!(inner.status(inner_id), Status::Dead);
            }
        })
        .unwrap();

    outer.resume(id).unwrap();
    assert_eq!(total.get(), 1);
    outer.resume(id).unwrap();
    assert_eq!(total.get(), 11);
    assert_eq!(outer.status(id), Status::Dead);
}

#[test]
fn deep_call_chain_survives_suspension() {
    fn descend(yielder: &Yielder, depth: u32) -> u32 {
        let frame = std::hint::black_box([depth; 32]);
        if depth == 0 {
            yielder.yield_now().unwrap();
            return 0;
        }
        descend(yielder, depth - 1) + std::hint::black_box(frame)[0]
    }

    let mut scheduler = Scheduler::open().unwrap();
    let result = Rc::new(Cell::new(0));
    let id = scheduler
        .spawn({
            let result = result.clone();
            move |yielder| result.set(descend(yielder, 1000))
        })
        .unwrap();

    scheduler.resume(id).unwrap();
    assert!(scheduler.backup_size(id).unwrap() > 1000 * 128);
    scheduler.resume(id).unwrap();

    assert_eq!(result.get(), (1..=1000u32).sum::<u32>());
}

#[test]
#[should_panic]
fn status_rejects_out_of_range() {
    let scheduler = Scheduler::open().unwrap();

    scheduler.status(CoroutineId::from(scheduler.capacity()));
}

#[test]
#[should_panic(expected = "panicked in body")]
fn panic_reaches_host() {
    let mut scheduler = Scheduler::open().unwrap();
    let id = scheduler.spawn(|_| panic!("panicked in body")).unwrap();

    let _ = scheduler.resume(id);
}

#[test]
#[ignore = "aborts process"]
fn overflowing_shared_stack_faults() {
    #[allow(unconditional_recursion)]
    fn descend(depth: u64) -> u64 {
        let frame = std::hint::black_box([depth; 512]);
        descend(depth + 1) + std::hint::black_box(frame)[0]
    }

    let config = Config::default().stack_size(NonZeroUsize::new(16 * 1024).unwrap());
    let mut scheduler = Scheduler::with_config(config).unwrap();
    let id = scheduler
        .spawn(|_| {
            descend(0);
        })
        .unwrap();

    let _ = scheduler.resume(id);
}
