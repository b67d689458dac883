//! Brings up a simulated node, prints every state change and tears it down.
//!
//! ```sh
//! RUST_LOG=debug cargo run -p ot-platform --example sim_node
//! ```

use std::sync::Arc;
use std::time::Duration;

use ot_platform::{
    MessageKind, Platform, PlatformConfig, PlatformResult, ReceiveHandler, SimEngine, SimMessage,
    StateChangedCallback, ThreadEngine,
};

fn main() -> PlatformResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = PlatformConfig::builder()
        .network_name("ot_zephyr")
        .channel(11)
        .pan_id(0xabcd)
        .extended_pan_id("dead00beef00cafe")
        .network_key("00112233445566778899aabbccddeeff")
        .nat64_cidr("192.168.255.0/24")
        .build();

    let rx: ReceiveHandler<SimMessage> = Arc::new(|message| {
        log::info!("rx {:?}: {} byte(s)", message.kind, message.payload.len());
    });

    let platform: Platform<SimEngine, &'static str> =
        Platform::init(SimEngine::new(), config, Some(rx))?;

    let handle = platform.register_state_callback(StateChangedCallback::from_fn(
        |flags, engine: &SimEngine, tag: &&'static str| {
            println!("[{tag}] flags {flags} role {}", engine.device_role());
        },
        "console",
    ))?;

    platform.run()?;
    platform.scheduler().wait_idle(Duration::from_secs(1));

    platform.lock_and_call(|engine| {
        engine.inject_rx(MessageKind::Datagram, *b"hello");
        engine.inject_rx(MessageKind::Nat64, *b"ipv4");
    });
    platform.scheduler().wait_idle(Duration::from_secs(1));

    platform.stop()?;
    platform.scheduler().wait_idle(Duration::from_secs(1));
    platform.unregister_state_callback(handle)?;

    println!("{:?}", platform.scheduler().stats());
    platform.shutdown();
    Ok(())
}
