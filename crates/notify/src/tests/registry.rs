use std::sync::{Arc, Mutex};

use crate::{CallbackRegistry, ChangedFlags, NotifyError, StateChangedCallback};

struct Node;

type Calls = Arc<Mutex<Vec<(char, u32, u32)>>>;

fn recording(name: char, tag: u32, calls: &Calls) -> StateChangedCallback<Node, u32> {
    let calls = Arc::clone(calls);
    StateChangedCallback::from_fn(
        move |flags, _node, tag| calls.lock().unwrap().push((name, flags.bits(), *tag)),
        tag,
    )
}

#[test]
fn dispatch_follows_registration_order() {
    let registry = CallbackRegistry::<Node, u32>::new();
    let calls = Calls::default();

    let _a = registry.register(recording('A', 1, &calls)).unwrap();
    let b = registry.register(recording('B', 2, &calls)).unwrap();
    let _c = registry.register(recording('C', 3, &calls)).unwrap();

    assert_eq!(registry.dispatch(ChangedFlags::from_bits(0x01), &Node), 3);
    assert_eq!(
        *calls.lock().unwrap(),
        vec![('A', 0x01, 1), ('B', 0x01, 2), ('C', 0x01, 3)]
    );

    calls.lock().unwrap().clear();
    registry.unregister(b).unwrap();

    assert_eq!(registry.dispatch(ChangedFlags::from_bits(0x02), &Node), 2);
    assert_eq!(*calls.lock().unwrap(), vec![('A', 0x02, 1), ('C', 0x02, 3)]);
}

#[test]
fn missing_observer_is_rejected() {
    let registry = CallbackRegistry::<Node, u32>::new();
    let calls = Calls::default();
    registry.register(recording('A', 1, &calls)).unwrap();
    let before = registry.handles();

    let empty = StateChangedCallback::<Node, u32>::builder().user_data(7).build();
    assert!(!empty.has_observer());
    assert_eq!(registry.register(empty), Err(NotifyError::InvalidArgument));

    assert_eq!(registry.handles(), before);
}

#[test]
fn unregister_twice_reports_not_found() {
    let registry = CallbackRegistry::<Node, u32>::new();
    let calls = Calls::default();
    let a = registry.register(recording('A', 1, &calls)).unwrap();
    let b = registry.register(recording('B', 2, &calls)).unwrap();

    registry.unregister(a).unwrap();
    assert_eq!(registry.unregister(a), Err(NotifyError::NotFound));
    assert_eq!(registry.handles(), vec![b]);
}

#[test]
fn stale_handle_does_not_remove_slot_reuser() {
    let registry = CallbackRegistry::<Node, u32>::new();
    let calls = Calls::default();
    let a = registry.register(recording('A', 1, &calls)).unwrap();
    registry.unregister(a).unwrap();

    // The freed slot is reused by the next registration.
    let b = registry.register(recording('B', 2, &calls)).unwrap();
    assert_eq!(registry.unregister(a), Err(NotifyError::NotFound));
    assert!(registry.contains(b));
    assert!(!registry.contains(a));
}

#[test]
fn foreign_handle_is_invalid() {
    let first = CallbackRegistry::<Node, u32>::new();
    let second = CallbackRegistry::<Node, u32>::new();
    let calls = Calls::default();
    let handle = first.register(recording('A', 1, &calls)).unwrap();

    assert_eq!(second.unregister(handle), Err(NotifyError::InvalidArgument));
    assert!(first.contains(handle));
}

#[test]
fn duplicate_registration_delivers_twice() {
    let registry = CallbackRegistry::<Node, u32>::new();
    let calls = Calls::default();
    let probe = Arc::clone(&calls);
    let shared: crate::ObserverRef<Node, u32> = Arc::new(
        move |flags: ChangedFlags, _: &Node, tag: &u32| {
            probe.lock().unwrap().push(('X', flags.bits(), *tag))
        },
    );

    let first = registry
        .register(StateChangedCallback::from_shared(Arc::clone(&shared), 1))
        .unwrap();
    let second = registry
        .register(StateChangedCallback::from_shared(shared, 2))
        .unwrap();
    assert_ne!(first, second);

    registry.dispatch(ChangedFlags::THREAD_ROLE, &Node);
    assert_eq!(
        *calls.lock().unwrap(),
        vec![('X', 1 << 2, 1), ('X', 1 << 2, 2)]
    );
}

#[test]
fn interleaved_register_unregister_keeps_survivors_in_order() {
    let registry = CallbackRegistry::<Node, u32>::new();
    let calls = Calls::default();
    let mut handles = Vec::new();
    for tag in 0..8 {
        handles.push(registry.register(recording('N', tag, &calls)).unwrap());
    }

    // Remove head, tail and two in the middle.
    for index in [0, 7, 3, 4] {
        registry.unregister(handles[index]).unwrap();
    }
    let late = registry.register(recording('N', 99, &calls)).unwrap();

    let expected = vec![handles[1], handles[2], handles[5], handles[6], late];
    assert_eq!(registry.handles(), expected);
    assert_eq!(registry.len(), 5);

    registry.dispatch(ChangedFlags::NONE, &Node);
    let tags: Vec<u32> = calls.lock().unwrap().iter().map(|call| call.2).collect();
    assert_eq!(tags, vec![1, 2, 5, 6, 99]);
}

#[test]
fn observer_may_unregister_itself_during_dispatch() {
    let registry = Arc::new(CallbackRegistry::<Node, u32>::new());
    let calls = Calls::default();
    let own_handle = Arc::new(Mutex::new(None));

    let reg = Arc::clone(&registry);
    let slot = Arc::clone(&own_handle);
    let probe = Arc::clone(&calls);
    let handle = registry
        .register(StateChangedCallback::from_fn(
            move |flags, _node, tag| {
                probe.lock().unwrap().push(('S', flags.bits(), *tag));
                if let Some(handle) = slot.lock().unwrap().take() {
                    reg.unregister(handle).unwrap();
                }
            },
            1,
        ))
        .unwrap();
    *own_handle.lock().unwrap() = Some(handle);
    registry.register(recording('T', 2, &calls)).unwrap();

    assert_eq!(registry.dispatch(ChangedFlags::from_bits(0x10), &Node), 2);
    assert_eq!(registry.dispatch(ChangedFlags::from_bits(0x20), &Node), 1);
    assert_eq!(
        *calls.lock().unwrap(),
        vec![('S', 0x10, 1), ('T', 0x10, 2), ('T', 0x20, 2)]
    );
}

#[test]
fn panicking_observer_does_not_stop_delivery() {
    let registry = CallbackRegistry::<Node, u32>::new();
    let calls = Calls::default();
    registry
        .register(StateChangedCallback::from_fn(
            |_flags, _node, _tag| panic!("observer failure"),
            0,
        ))
        .unwrap();
    registry.register(recording('B', 2, &calls)).unwrap();

    assert_eq!(registry.dispatch(ChangedFlags::from_bits(0x04), &Node), 2);
    assert_eq!(*calls.lock().unwrap(), vec![('B', 0x04, 2)]);
}

#[test]
fn clear_invalidates_handles() {
    let registry = CallbackRegistry::<Node, u32>::new();
    let calls = Calls::default();
    let a = registry.register(recording('A', 1, &calls)).unwrap();
    registry.register(recording('B', 2, &calls)).unwrap();

    registry.clear();
    assert!(registry.is_empty());
    assert_eq!(registry.unregister(a), Err(NotifyError::NotFound));

    let c = registry.register(recording('C', 3, &calls)).unwrap();
    assert_eq!(registry.handles(), vec![c]);
    assert_eq!(registry.dispatch(ChangedFlags::NONE, &Node), 1);
}
