//! Two producers and a consumer taking turns on one shared stack.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use costack::{Scheduler, Status, Yielder};

fn produce(yielder: &Yielder, (name, queue): (&'static str, Rc<RefCell<VecDeque<String>>>)) {
    for n in 0..3 {
        queue.borrow_mut().push_back(format!("{name} #{n}"));
        yielder.yield_now().unwrap();
    }
}

fn main() {
    let mut scheduler = Scheduler::open().unwrap();
    let queue = Rc::new(RefCell::new(VecDeque::new()));

    let producers = [
        scheduler.spawn_with(produce, ("left", queue.clone())).unwrap(),
        scheduler.spawn_with(produce, ("right", queue.clone())).unwrap(),
    ];
    let consumer = scheduler
        .spawn({
            let queue = queue.clone();
            move |yielder| loop {
                while let Some(item) = queue.borrow_mut().pop_front() {
                    println!("{} consumed {item}", yielder.id());
                }
                yielder.yield_now().unwrap();
            }
        })
        .unwrap();

    while producers.iter().any(|&id| scheduler.status(id) != Status::Dead) {
        for &id in &producers {
            scheduler.resume(id).unwrap();
            if let Some(size) = scheduler.backup_size(id) {
                println!("{id} suspended with {size} bytes of stack");
            }
        }
        scheduler.resume(consumer).unwrap();
    }

    println!("{scheduler:?}");
    scheduler.close();
}
