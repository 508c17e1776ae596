use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hive_kernel::{
    build_caps, pump, require_cap, ByteStream, Capability, ChaosConfig, Clock, ErrorCode, Kernel,
    KernelConfig, KernelError, LogFilter, ManualClock, RegisterOptions, ServiceHandler, Signal,
    TenantId, TenantOptions, TRACE_TENANT_CREATED, TRACE_TENANT_DESTROYED,
};
use serde_json::{json, Value};

fn manual_kernel(seed: u64) -> (Arc<ManualClock>, Kernel) {
    let clock = Arc::new(ManualClock::new());
    let kernel = Kernel::builder()
        .config(KernelConfig::seeded(seed))
        .clock(clock.clone())
        .build()
        .unwrap();
    (clock, kernel)
}

struct Listener(&'static str);

#[async_trait]
impl ServiceHandler for Listener {
    async fn call(&self, request: Value) -> Value {
        json!({ "listener": self.0, "request": request })
    }
}

#[test]
fn destroy_releases_owned_resources_but_not_transferred_ones() {
    let (_clock, kernel) = manual_kernel(1);
    let ws1 = kernel.create_tenant(TenantOptions::new().with_id("ws1")).unwrap();
    kernel.create_tenant(TenantOptions::new().with_id("ws2")).unwrap();
    let table = kernel.resources();

    let h1 = table.allocate("socket", 1u32, "ws1").unwrap();
    let h2 = table.allocate("socket", 2u32, "ws1").unwrap();
    let h3 = table.allocate("file", 3u32, "ws1").unwrap();
    table.transfer(h2, "ws2").unwrap();

    let teardown = kernel.destroy_tenant(&ws1.id).unwrap();
    assert_eq!(teardown.released_handles, vec![h1, h3]);

    assert!(table.list_by_owner(&TenantId::new("ws1")).is_empty());
    assert_eq!(table.list_by_owner(&TenantId::new("ws2")), vec![h2]);
    assert_eq!(table.size(), 1);
    assert!(kernel.tenant(&ws1.id).is_none());
    assert_eq!(*table.get_as::<u32>(h2, "socket").unwrap(), 2);
    table.check_invariants().unwrap();
}

#[test]
fn destroy_twice_is_not_found() {
    let (_clock, kernel) = manual_kernel(1);
    let tenant = kernel.create_tenant(TenantOptions::new()).unwrap();

    kernel.destroy_tenant(&tenant.id).unwrap();
    let err = kernel.destroy_tenant(&tenant.id).unwrap_err();
    assert!(matches!(err, KernelError::TenantNotFound(_)));
    assert_eq!(err.code(), Some(ErrorCode::NotFound));
}

#[tokio::test]
async fn duplicate_service_keeps_first_listener() {
    let (_clock, kernel) = manual_kernel(1);
    let services = kernel.services();

    services
        .register("svcA", Arc::new(Listener("A")), RegisterOptions::default())
        .unwrap();
    let err = services
        .register("svcA", Arc::new(Listener("B")), RegisterOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyExists);

    let reply = services.invoke("svcA", json!(1)).await.unwrap();
    assert_eq!(reply["listener"], "A");
}

#[test]
fn build_caps_attaches_kernel_subsystems() {
    let (clock, kernel) = manual_kernel(1);
    let caps = build_caps(&kernel, ["net", "clock"]).unwrap();

    assert!(caps.has(Capability::Net));
    let granted_clock = caps.require_clock().unwrap();
    clock.advance(Duration::from_secs(3));
    assert_eq!(granted_clock.now_monotonic(), Duration::from_secs(3));

    let err = require_cap(&caps, Capability::Fs).unwrap_err();
    assert_eq!(err.code(), ErrorCode::CapabilityDenied);
}

#[test]
fn regrant_swaps_in_new_caps() {
    let (_clock, kernel) = manual_kernel(1);
    let before = kernel
        .create_tenant(TenantOptions::new().with_id("t").grant("clock"))
        .unwrap();

    let after = kernel.regrant(&before.id, ["clock", "net"]).unwrap();
    assert!(after.caps.has(Capability::Net));
    assert!(!before.caps.has(Capability::Net));
    assert!(kernel.tenant(&before.id).unwrap().caps.has(Capability::Net));
    assert!(Arc::ptr_eq(&before.signals, &after.signals));

    let err = kernel.regrant(&TenantId::new("ghost"), ["net"]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NotFound));
}

#[tokio::test]
async fn destroy_cancels_tenant_waits() {
    let (_clock, kernel) = manual_kernel(1);
    let tenant = kernel.create_tenant(TenantOptions::new()).unwrap();
    let shutdown = tenant.signals.shutdown_signal();
    let kernel_token = kernel.signals().abort_signal(Signal::Term);

    let waiter = tokio::spawn(async move { shutdown.cancelled().await });
    tokio::task::yield_now().await;

    kernel.destroy_tenant(&tenant.id).unwrap();
    assert_eq!(waiter.await.unwrap(), "SIGTERM");
    // tenant teardown does not signal the kernel
    assert!(!kernel_token.is_aborted());
}

#[tokio::test(start_paused = true)]
async fn destroy_interrupts_chaos_delay() {
    let config = KernelConfig {
        chaos: ChaosConfig::enabled().with_latency_ms(60_000),
        ..KernelConfig::seeded(1)
    };
    let kernel = Kernel::with_config(config).unwrap();
    let tenant = kernel
        .create_tenant(TenantOptions::new().grant("chaos"))
        .unwrap();

    let chaos = tenant.caps.require_chaos().unwrap();
    let token = tenant.signals.abort_signal(Signal::Term);
    let delayed =
        tokio::spawn(async move { chaos.maybe_delay_or_abort(Some("net"), &token).await });
    tokio::task::yield_now().await;

    kernel.destroy_tenant(&tenant.id).unwrap();
    let err = delayed.await.unwrap().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Signal);
}

#[test]
fn destroy_unregisters_owned_services_and_traces() {
    let (_clock, kernel) = manual_kernel(1);
    let tenant = kernel.create_tenant(TenantOptions::new().with_id("svc-owner")).unwrap();
    kernel
        .services()
        .register("mine", Arc::new(Listener("m")), RegisterOptions::owned_by(tenant.id.clone()))
        .unwrap();
    kernel
        .services()
        .register("shared", Arc::new(Listener("s")), RegisterOptions::default())
        .unwrap();

    let teardown = kernel.destroy_tenant(&tenant.id).unwrap();
    assert_eq!(teardown.released_services, vec!["mine".to_string()]);
    assert!(kernel.services().contains("shared"));

    let destroyed = kernel.tracer().snapshot_kind(TRACE_TENANT_DESTROYED);
    assert_eq!(destroyed.len(), 1);
    assert_eq!(destroyed[0].tenant, Some(tenant.id.clone()));
    assert_eq!(destroyed[0].data["services"], json!(["mine"]));
}

#[tokio::test]
async fn tracer_subscriber_sees_later_lifecycle_events() {
    let (_clock, kernel) = manual_kernel(1);
    kernel.create_tenant(TenantOptions::new().with_id("early")).unwrap();

    let mut created = kernel.tracer().events_of_kind(TRACE_TENANT_CREATED);
    kernel.create_tenant(TenantOptions::new().with_id("late")).unwrap();

    let event = created.next().await.unwrap();
    assert_eq!(event.tenant, Some(TenantId::new("late")));
    assert!(created.try_next().is_none());
    assert_eq!(kernel.tracer().snapshot_kind(TRACE_TENANT_CREATED).len(), 2);
}

#[test]
fn kernel_logger_records_lifecycle() {
    let (_clock, kernel) = manual_kernel(1);
    let tenant = kernel.create_tenant(TenantOptions::new().with_id("logged")).unwrap();
    kernel.destroy_tenant(&tenant.id).unwrap();

    let entries = kernel.logger().snapshot(&LogFilter::all().module("kernel"));
    assert_eq!(entries.len(), 2);
    assert!(entries[1].message.contains("logged destroyed"));
}

#[tokio::test]
async fn tenant_stdio_defaults_and_pipes() {
    let (_clock, kernel) = manual_kernel(1);
    let quiet = kernel.create_tenant(TenantOptions::new()).unwrap();
    assert_eq!(quiet.stdio.stdin.read().await.unwrap(), None);

    let (stdio, host) = kernel.piped_stdio();
    let piped = kernel.create_tenant(TenantOptions::new().stdio(stdio)).unwrap();

    host.stdin.write(Bytes::from_static(b"cmd")).await.unwrap();
    host.stdin.close();
    let forwarded = pump(&*piped.stdio.stdin, &*piped.stdio.stdout)
        .await
        .unwrap();
    assert_eq!(forwarded, 1);
    assert_eq!(host.stdout.read().await.unwrap(), Some(Bytes::from_static(b"cmd")));
}

#[test]
fn tenant_environment_is_isolated() {
    let (_clock, kernel) = manual_kernel(1);
    let a = kernel
        .create_tenant(TenantOptions::new().env_var("HOME", "/a"))
        .unwrap();
    let b = kernel.create_tenant(TenantOptions::new()).unwrap();

    let extended = a.env.with_var("PATH", "/bin");
    assert_eq!(a.env.get("HOME"), Some("/a"));
    assert!(!a.env.contains("PATH"));
    assert_eq!(extended.len(), 2);
    assert!(b.env.is_empty());
}

#[test]
fn seeded_kernels_are_reproducible() {
    let config = KernelConfig {
        chaos: ChaosConfig::enabled().with_drop_rate(0.5),
        ..KernelConfig::seeded(99)
    };
    let run = || {
        let kernel = Kernel::builder()
            .config(config.clone())
            .clock(Arc::new(ManualClock::new()))
            .build()
            .unwrap();
        let ids: Vec<TenantId> = (0..3)
            .map(|_| kernel.create_tenant(TenantOptions::new()).unwrap().id)
            .collect();
        let drops: Vec<bool> = (0..64).map(|_| kernel.chaos().should_drop(None)).collect();
        (ids, drops)
    };
    assert_eq!(run(), run());
}

#[test]
fn close_tears_everything_down() {
    let (_clock, kernel) = manual_kernel(1);
    let tenant = kernel.create_tenant(TenantOptions::new().grant("*")).unwrap();
    kernel.resources().allocate("buf", vec![0u8; 4], tenant.id.clone()).unwrap();
    kernel
        .services()
        .register("svc", Arc::new(Listener("x")), RegisterOptions::default())
        .unwrap();
    kernel.chaos().set_scope("net", ChaosConfig::enabled());
    let kernel_shutdown = kernel.signals().shutdown_signal();
    let tenant_term = tenant.signals.abort_signal(Signal::Term);

    kernel.close();
    kernel.close();

    assert!(kernel.is_closed());
    assert!(kernel_shutdown.is_aborted());
    assert!(tenant_term.is_aborted());
    assert_eq!(kernel.tenant_count(), 0);
    assert!(kernel.resources().is_empty());
    assert!(kernel.services().is_empty());
    assert!(kernel.tracer().is_empty());
    assert!(kernel.logger().is_empty());
    assert_eq!(kernel.chaos().scope_count(), 0);

    let err = kernel.create_tenant(TenantOptions::new()).unwrap_err();
    assert!(matches!(err, KernelError::Closed));
}

#[test]
fn table_full_leaves_state_unchanged() {
    let mut config = KernelConfig::seeded(1);
    config.resources.max_handles = 2;
    let kernel = Kernel::with_config(config).unwrap();
    let table = kernel.resources();

    table.allocate("a", (), "t").unwrap();
    table.allocate("a", (), "t").unwrap();
    let before = table.stats();

    let err = table.allocate("a", (), "t").unwrap_err();
    assert_eq!(err.code(), ErrorCode::TableFull);
    assert_eq!(table.stats(), before);
}
