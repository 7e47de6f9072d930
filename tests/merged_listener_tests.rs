use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use cim_axiom::{
    AxiomError, ClassRegistry, Context, ListenerAxiom, ManualScheduler, Model, Obj, TokioScheduler,
    Value, PROPERTY_CHANGE,
};
use pretty_assertions::assert_eq;

fn counter_model(seen: Rc<RefCell<Vec<Value>>>, failing: bool) -> Model {
    let immediate = seen.clone();
    Model::new("demo.Counter")
        .property(("x", 0))
        .listener(
            ListenerAxiom::new("onChangeMerged", move |_, event| {
                seen.borrow_mut().push(event.arg(2));
                if failing {
                    return Err(AxiomError::generic("merged listener failed"));
                }
                Ok(())
            })
            .merge_delay(Duration::from_millis(10)),
        )
        .listener(ListenerAxiom::new("onChange", move |_, event| {
            immediate.borrow_mut().push(event.arg(1));
            Ok(())
        }))
}

fn wire(obj: &Obj, name: &str) {
    let bound = obj.listener(name).unwrap();
    obj.on_detach(obj.sub(&[PROPERTY_CHANGE, "x"], bound));
}

#[test]
fn bursts_collapse_into_one_call_with_the_latest_event() {
    let registry = ClassRegistry::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let class = registry.build(counter_model(seen.clone(), false)).unwrap();
    let scheduler = Rc::new(ManualScheduler::new());
    let ctx = Context::with_scheduler(registry, scheduler.clone());
    let obj = class.create_in(Vec::<(&str, Value)>::new(), &ctx).unwrap();
    wire(&obj, "onChangeMerged");
    assert!(class.find_listener("onChangeMerged").unwrap().is_merged());

    obj.set("x", 1).unwrap();
    obj.set("x", 2).unwrap();
    obj.set("x", 3).unwrap();
    assert_eq!(scheduler.pending(), 1);
    assert!(seen.borrow().is_empty());

    assert_eq!(scheduler.advance(Duration::from_millis(5)), 0);
    assert_eq!(scheduler.advance(Duration::from_millis(5)), 1);
    assert_eq!(*seen.borrow(), vec![Value::from(3)]);

    obj.set("x", 4).unwrap();
    assert_eq!(scheduler.pending(), 1);
    scheduler.run_all();
    assert_eq!(*seen.borrow(), vec![Value::from(3), Value::from(4)]);
}

#[test]
fn plain_listeners_run_synchronously() {
    let registry = ClassRegistry::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let class = registry.build(counter_model(seen.clone(), false)).unwrap();
    let obj = class
        .create_in(Vec::<(&str, Value)>::new(), &Context::new(registry))
        .unwrap();
    wire(&obj, "onChange");

    obj.set("x", 5).unwrap();
    obj.set("x", 6).unwrap();
    assert_eq!(*seen.borrow(), vec![Value::from(0), Value::from(5)]);
}

#[test]
fn deferred_failures_do_not_escape_the_scheduler() {
    let registry = ClassRegistry::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let class = registry.build(counter_model(seen.clone(), true)).unwrap();
    let scheduler = Rc::new(ManualScheduler::new());
    let ctx = Context::with_scheduler(registry, scheduler.clone());
    let obj = class.create_in(Vec::<(&str, Value)>::new(), &ctx).unwrap();
    wire(&obj, "onChangeMerged");

    obj.set("x", 1).unwrap();
    assert_eq!(scheduler.run_all(), 1);
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn detach_cancels_pending_merged_calls() {
    let registry = ClassRegistry::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let class = registry.build(counter_model(seen.clone(), false)).unwrap();
    let scheduler = Rc::new(ManualScheduler::new());
    let ctx = Context::with_scheduler(registry, scheduler.clone());
    let obj = class.create_in(Vec::<(&str, Value)>::new(), &ctx).unwrap();
    wire(&obj, "onChangeMerged");

    obj.set("x", 1).unwrap();
    obj.detach();
    scheduler.run_all();
    assert!(seen.borrow().is_empty());
}

#[tokio::test(start_paused = true)]
async fn tokio_scheduler_delivers_after_the_merge_window() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let registry = ClassRegistry::new();
            let seen = Rc::new(RefCell::new(Vec::new()));
            let class = registry.build(counter_model(seen.clone(), false)).unwrap();
            let ctx = Context::with_scheduler(registry, Rc::new(TokioScheduler));
            let obj = class.create_in(Vec::<(&str, Value)>::new(), &ctx).unwrap();
            wire(&obj, "onChangeMerged");

            obj.set("x", 1).unwrap();
            obj.set("x", 2).unwrap();
            assert!(seen.borrow().is_empty());

            tokio::time::sleep(Duration::from_millis(20)).await;
            assert_eq!(*seen.borrow(), vec![Value::from(2)]);
        })
        .await;
}
