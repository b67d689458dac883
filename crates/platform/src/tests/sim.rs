use std::sync::Arc;

use ot_worker::{Scheduler, SchedulerConfig, WorkerState};
use parking_lot::Mutex;

use crate::{
    ChangedFlags, DeviceRole, EngineError, EngineResult, JoinerParams, MessageKind, SimEngine,
    SimOp, ThreadEngine,
};

fn scheduled(engine: SimEngine) -> Scheduler<SimEngine> {
    let scheduler = Scheduler::new(engine, SchedulerConfig::default());
    scheduler.lock().attach_waker(scheduler.waker());
    scheduler
}

fn joiner(pskd: &str) -> JoinerParams {
    JoinerParams {
        pskd: pskd.to_owned(),
        provisioning_url: None,
        vendor_name: "acme".to_owned(),
        vendor_model: "sim".to_owned(),
        vendor_sw_version: "0.1.0".to_owned(),
        vendor_data: None,
    }
}

#[test]
fn dataset_setters_validate_input() {
    let engine = SimEngine::new();

    assert_eq!(engine.set_channel(10), Err(EngineError::InvalidArgs));
    assert_eq!(engine.set_channel(27), Err(EngineError::InvalidArgs));
    assert_eq!(engine.set_channel(26), Ok(()));

    assert_eq!(
        engine.set_network_name("a-name-longer-than-16"),
        Err(EngineError::InvalidArgs)
    );
    assert_eq!(engine.set_network_name("sixteen-chars-ok"), Ok(()));
    assert_eq!(engine.network_name(), "sixteen-chars-ok");
}

#[test]
fn dataset_is_locked_while_enabled() {
    let engine = SimEngine::new();
    engine.set_enabled(true).unwrap();

    assert_eq!(engine.set_pan_id(0x1234), Err(EngineError::InvalidState));
    assert_eq!(engine.pan_id(), 0xffff);
    assert_eq!(engine.set_enabled(true), Ok(()));

    engine.set_enabled(false).unwrap();
    assert_eq!(engine.set_enabled(false), Err(EngineError::InvalidState));
    assert_eq!(engine.set_pan_id(0x1234), Ok(()));
}

#[test]
fn injected_failure_applies_once() {
    let engine = SimEngine::new();
    engine.fail_next(SimOp::Channel, EngineError::Busy);

    assert_eq!(engine.set_channel(15), Err(EngineError::Busy));
    assert_eq!(engine.channel(), 11);
    assert_eq!(engine.set_channel(15), Ok(()));
}

#[test]
fn pskd_format_is_checked() {
    let engine = SimEngine::new();
    let done = |_: &SimEngine, _: EngineResult<()>| {};
    let too_long = "A".repeat(33);

    for bad in ["", "ABC12", "lower1", "J01NMEQ", "OOOOOO", too_long.as_str()] {
        assert_eq!(
            engine.joiner_start(&joiner(bad), Box::new(done)),
            Err(EngineError::InvalidArgs),
            "{bad}"
        );
    }
    assert_eq!(engine.joiner_start(&joiner("J01NME"), Box::new(done)), Ok(()));
    assert_eq!(
        engine.joiner_start(&joiner("J01NME"), Box::new(done)),
        Err(EngineError::Busy)
    );
}

#[test]
fn changes_are_reported_in_one_notification() {
    let scheduler = scheduled(SimEngine::new());
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);

    scheduler.lock_and_call(|engine| {
        engine
            .set_state_changed_hook(Arc::new(move |flags, engine: &SimEngine| {
                sink.lock().push((flags, engine.device_role()))
            }))
            .unwrap();
        engine.set_network_name("mesh").unwrap();
        engine.set_channel(20).unwrap();
        engine.raise_state_change(ChangedFlags::IP6_ADDRESS_ADDED);
    });

    assert_eq!(scheduler.state(), WorkerState::Scheduled);
    assert_eq!(scheduler.stats().wakes_coalesced, 2);
    assert_eq!(scheduler.run_until_idle(), 1);
    assert_eq!(
        *reports.lock(),
        vec![(
            ChangedFlags::THREAD_NETWORK_NAME
                | ChangedFlags::THREAD_CHANNEL
                | ChangedFlags::IP6_ADDRESS_ADDED,
            DeviceRole::Disabled
        )]
    );
}

#[test]
fn enabled_device_becomes_leader_on_the_next_driver_poll() {
    let scheduler = scheduled(SimEngine::new());

    scheduler.lock_and_call(|engine| engine.set_enabled(true)).unwrap();
    assert_eq!(scheduler.lock().role(), DeviceRole::Detached);

    assert_eq!(scheduler.run_until_idle(), 2);
    let engine = scheduler.lock();
    assert_eq!(engine.role(), DeviceRole::Leader);
    assert!(engine.is_commissioned());
    assert_eq!(engine.driver_polls(), 2);
}

#[test]
fn messages_without_a_handler_are_dropped() {
    let scheduler = scheduled(SimEngine::new());

    scheduler.lock().inject_rx(MessageKind::Datagram, vec![1, 2, 3]);
    assert_eq!(scheduler.run_until_idle(), 1);
    assert_eq!(scheduler.lock().delivered(), 0);
}
