use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cim_axiom::{listener, ObserverBus, Subscription, Value};
use pretty_assertions::assert_eq;
use test_case::test_case;

fn counting(bus: &ObserverBus, topic: &[&str], hits: &Rc<Cell<usize>>) -> Subscription {
    let hits = hits.clone();
    bus.sub(
        topic,
        listener(move |_, _| {
            hits.set(hits.get() + 1);
            Ok(())
        }),
    )
}

#[test]
fn each_publish_invokes_a_listener_once() {
    let bus = ObserverBus::new();
    let hits = Rc::new(Cell::new(0));
    let _sub = counting(&bus, &["saved"], &hits);

    bus.publish(&["saved"], Vec::new()).unwrap();
    bus.publish(&["saved"], Vec::new()).unwrap();
    bus.publish(&["other"], Vec::new()).unwrap();

    assert_eq!(hits.get(), 2);
}

#[test_case(&[0, 1, 2] ; "leading")]
#[test_case(&[0, 2, 4] ; "alternating")]
#[test_case(&[4, 3, 1] ; "trailing")]
#[test_case(&[1, 2, 3] ; "middle")]
fn detaching_during_publish_skips_exactly_the_detached(detached: &[usize]) {
    let bus = ObserverBus::new();
    let fired = Rc::new(RefCell::new(Vec::new()));

    let subs: Vec<Subscription> = (0..5)
        .map(|i| {
            let fired = fired.clone();
            bus.sub(
                &["tick"],
                listener(move |_, _| {
                    fired.borrow_mut().push(i);
                    Ok(())
                }),
            )
        })
        .collect();

    // Subscribed last, so it runs before every counted listener
    let victims: Vec<Subscription> = detached.iter().map(|&i| subs[i].clone()).collect();
    let controller = bus.sub(
        &["tick"],
        listener(move |own, _| {
            for victim in &victims {
                victim.detach();
            }
            own.detach();
            Ok(())
        }),
    );

    bus.publish(&["tick"], Vec::new()).unwrap();

    let mut expected: Vec<usize> = (0..5).filter(|i| !detached.contains(i)).collect();
    expected.reverse();
    assert_eq!(*fired.borrow(), expected);
    assert!(controller.is_detached());

    fired.borrow_mut().clear();
    bus.publish(&["tick"], Vec::new()).unwrap();
    assert_eq!(*fired.borrow(), expected);
}

#[test]
fn listener_added_during_publish_waits_for_the_next_one() {
    let bus = Rc::new(ObserverBus::new());
    let late_hits = Rc::new(Cell::new(0));

    let inner_bus = Rc::downgrade(&bus);
    let late = late_hits.clone();
    let added = Rc::new(Cell::new(false));
    let _adder = bus.sub(
        &["go"],
        listener(move |_, _| {
            if !added.replace(true) {
                if let Some(bus) = inner_bus.upgrade() {
                    let _ = counting(&bus, &["go"], &late);
                }
            }
            Ok(())
        }),
    );

    bus.publish(&["go"], Vec::new()).unwrap();
    assert_eq!(late_hits.get(), 0);
    bus.publish(&["go"], Vec::new()).unwrap();
    assert_eq!(late_hits.get(), 1);
}

#[test]
fn prefix_delivery_stops_at_the_first_missing_bucket() {
    let bus = ObserverBus::new();
    let root = Rc::new(Cell::new(0));
    let mid = Rc::new(Cell::new(0));
    let _r = counting(&bus, &[], &root);
    let _m = counting(&bus, &["a", "b"], &mid);

    bus.publish(&["a", "b", "c"], Vec::new()).unwrap();
    bus.publish(&["x", "y"], Vec::new()).unwrap();

    assert_eq!(root.get(), 2);
    assert_eq!(mid.get(), 1);
}

#[test]
fn events_carry_topic_and_args() {
    let bus = ObserverBus::new();
    let seen = Rc::new(RefCell::new(None));
    let sink = seen.clone();
    let _sub = bus.sub(
        &["io"],
        listener(move |_, event| {
            *sink.borrow_mut() = Some((event.topic_str(), event.arg(0), event.arg(5)));
            Ok(())
        }),
    );

    let delivered = bus.publish(&["io", "read"], vec![Value::from(3)]).unwrap();

    assert_eq!(delivered, 1);
    assert_eq!(
        seen.borrow().clone(),
        Some(("io.read".to_string(), Value::from(3), Value::Undefined))
    );
}

#[test]
fn listener_error_stops_the_publish() {
    let bus = ObserverBus::new();
    let later = Rc::new(Cell::new(0));
    let _first = counting(&bus, &["e"], &later);
    let _failing = bus.sub(
        &["e"],
        listener(|_, _| Err(cim_axiom::AxiomError::generic("listener failed"))),
    );

    assert!(bus.publish(&["e"], Vec::new()).is_err());
    assert_eq!(later.get(), 0);
}
