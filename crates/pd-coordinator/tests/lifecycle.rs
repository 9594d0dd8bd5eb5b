//! Lifecycle operation integration tests
//!
//! Drives the coordinator's public surface against a scripted in-memory
//! gateway. Time-sensitive cases run under a paused clock so deadline
//! behavior is exercised without real sleeps.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use pd_api::{ClusterGateway, GatewayError, GatewayResult};
use pd_core::config::ClientConfig;
use pd_core::{OperationKind, Session, TaskStatus, VirtualMachine, VmStatus};
use pd_coordinator::{LifecycleCoordinator, Notification, OperationError};

const UPID: &str = "UPID:pve1:0000C530:10A9B5:642F1E7C:qmstart:100:root@pam:";

fn test_session() -> Session {
    Session {
        host: "pve.lan".to_string(),
        port: 8006,
        username: "root@pam".to_string(),
        ticket: "PVE:root@pam:TICKET".to_string(),
        csrf_token: "CSRF".to_string(),
    }
}

fn vm(vmid: u32, name: &str, status: VmStatus) -> VirtualMachine {
    VirtualMachine {
        vmid,
        name: name.to_string(),
        status,
        node: "pve1".to_string(),
        cpus: Some(2),
        mem: None,
        maxmem: None,
        disk: None,
        maxdisk: None,
        uptime: None,
        tags: Vec::new(),
        console_capable: true,
        guest_ip: None,
    }
}

fn task(status: &str, exit: Option<&str>) -> TaskStatus {
    TaskStatus {
        status: status.to_string(),
        exitstatus: exit.map(str::to_string),
    }
}

/// Scripted gateway: listings and task statuses are consumed from
/// queues, with a fallback once a queue runs dry.
#[derive(Default)]
struct FakeGateway {
    /// Successive `list_vms` responses; `fallback_listing` repeats after
    /// the queue drains
    listings: Mutex<VecDeque<Vec<VirtualMachine>>>,
    fallback_listing: Mutex<Vec<VirtualMachine>>,
    /// Successive `task_status` responses; "running" repeats after the
    /// queue drains
    task_statuses: Mutex<VecDeque<TaskStatus>>,
    /// Error returned by the next `vm_command`, if set
    command_error: Mutex<Option<GatewayError>>,
    fail_cluster_name: AtomicBool,

    commands: Mutex<Vec<(String, u32, OperationKind)>>,
    list_calls: AtomicUsize,
    task_calls: AtomicUsize,
    console_calls: AtomicUsize,
}

impl FakeGateway {
    fn new() -> Self {
        Self::default()
    }

    fn push_listing(&self, vms: Vec<VirtualMachine>) {
        self.listings.lock().unwrap().push_back(vms);
    }

    fn set_fallback_listing(&self, vms: Vec<VirtualMachine>) {
        *self.fallback_listing.lock().unwrap() = vms;
    }

    fn push_task_status(&self, status: TaskStatus) {
        self.task_statuses.lock().unwrap().push_back(status);
    }

    fn set_command_error(&self, error: GatewayError) {
        *self.command_error.lock().unwrap() = Some(error);
    }

    fn commands(&self) -> Vec<(String, u32, OperationKind)> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterGateway for FakeGateway {
    async fn authenticate(
        &self,
        host: &str,
        port: u16,
        username: &str,
        _password: &str,
    ) -> GatewayResult<Session> {
        Ok(Session {
            host: host.to_string(),
            port,
            username: username.to_string(),
            ticket: "TICKET".to_string(),
            csrf_token: "CSRF".to_string(),
        })
    }

    async fn list_vms(&self, _session: &Session) -> GatewayResult<Vec<VirtualMachine>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(vms) = self.listings.lock().unwrap().pop_front() {
            return Ok(vms);
        }
        Ok(self.fallback_listing.lock().unwrap().clone())
    }

    async fn vm_command(
        &self,
        _session: &Session,
        node: &str,
        vmid: u32,
        kind: OperationKind,
    ) -> GatewayResult<String> {
        if let Some(error) = self.command_error.lock().unwrap().take() {
            return Err(error);
        }
        self.commands
            .lock()
            .unwrap()
            .push((node.to_string(), vmid, kind));
        Ok(UPID.to_string())
    }

    async fn task_status(
        &self,
        _session: &Session,
        _node: &str,
        _upid: &str,
    ) -> GatewayResult<TaskStatus> {
        self.task_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.task_statuses.lock().unwrap().pop_front() {
            return Ok(status);
        }
        Ok(task("running", None))
    }

    async fn console_config(
        &self,
        _session: &Session,
        _node: &str,
        _vmid: u32,
    ) -> GatewayResult<String> {
        self.console_calls.fetch_add(1, Ordering::SeqCst);
        Ok("[virt-viewer]\ntype=spice\nhost=pve.lan\n".to_string())
    }

    async fn cluster_name(&self, _session: &Session) -> GatewayResult<String> {
        if self.fail_cluster_name.load(Ordering::SeqCst) {
            return Err(GatewayError::Remote {
                status: 500,
                message: "internal error".to_string(),
            });
        }
        Ok("testlab".to_string())
    }
}

fn coordinator(gateway: Arc<FakeGateway>) -> LifecycleCoordinator {
    let mut config = ClientConfig::default();
    config.console.viewer = "true".to_string();
    LifecycleCoordinator::new(gateway, &config)
}

async fn loaded_coordinator(
    gateway: Arc<FakeGateway>,
    initial: Vec<VirtualMachine>,
) -> LifecycleCoordinator {
    gateway.push_listing(initial);
    let coordinator = coordinator(gateway);
    coordinator.set_session(test_session()).await;
    coordinator.load_vms().await.unwrap();
    coordinator
}

#[tokio::test]
async fn test_scenario_start_stopped_vm() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.push_task_status(task("stopped", Some("OK")));
    gateway.set_fallback_listing(vec![vm(100, "web-01", VmStatus::Running)]);

    let coordinator =
        loaded_coordinator(Arc::clone(&gateway), vec![vm(100, "web-01", VmStatus::Stopped)]).await;
    let mut rx = coordinator.subscribe();

    coordinator.start_vm(100).await.unwrap();

    assert_eq!(coordinator.vm(100).unwrap().status, VmStatus::Running);
    assert!(!coordinator.is_in_flight(100));
    assert_eq!(gateway.commands(), vec![("pve1".to_string(), 100, OperationKind::Start)]);

    let note = rx.try_recv().unwrap();
    match note {
        Notification::OperationSucceeded { vmid, name, kind } => {
            assert_eq!(vmid, 100);
            assert_eq!(name, "web-01");
            assert_eq!(kind, OperationKind::Start);
        }
        other => panic!("unexpected notification: {:?}", other),
    }
}

#[tokio::test]
async fn test_scenario_task_failure_leaves_entity_unchanged() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.push_task_status(task("stopped", Some("ERROR")));
    gateway.set_fallback_listing(vec![vm(101, "db-01", VmStatus::Running)]);

    let coordinator =
        loaded_coordinator(Arc::clone(&gateway), vec![vm(101, "db-01", VmStatus::Running)]).await;
    let mut rx = coordinator.subscribe();

    let err = coordinator.stop_vm(101).await.unwrap_err();
    assert!(matches!(err, OperationError::TaskFailed(ref exit) if exit == "ERROR"));

    assert!(!coordinator.is_in_flight(101));
    assert_eq!(coordinator.vm(101).unwrap().status, VmStatus::Running);

    match rx.try_recv().unwrap() {
        Notification::OperationFailed { vmid, kind, .. } => {
            assert_eq!(vmid, 101);
            assert_eq!(kind, OperationKind::Stop);
        }
        other => panic!("unexpected notification: {:?}", other),
    }
}

#[tokio::test]
async fn test_scenario_console_unavailable_makes_no_network_call() {
    let gateway = Arc::new(FakeGateway::new());
    let mut no_console = vm(102, "legacy", VmStatus::Running);
    no_console.console_capable = false;

    let coordinator = loaded_coordinator(Arc::clone(&gateway), vec![no_console]).await;

    let err = coordinator.connect_vm(102).await.unwrap_err();
    assert!(matches!(err, OperationError::ConsoleUnavailable(102)));
    assert_eq!(gateway.console_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_scenario_concurrent_operations_on_distinct_vms() {
    let gateway = Arc::new(FakeGateway::new());
    // Both tasks report terminal success immediately.
    gateway.push_task_status(task("stopped", Some("OK")));
    gateway.push_task_status(task("stopped", Some("OK")));
    gateway.set_fallback_listing(vec![
        vm(200, "alpha", VmStatus::Running),
        vm(201, "beta", VmStatus::Stopped),
    ]);

    let coordinator = loaded_coordinator(
        Arc::clone(&gateway),
        vec![
            vm(200, "alpha", VmStatus::Stopped),
            vm(201, "beta", VmStatus::Running),
        ],
    )
    .await;

    let (start, stop) = tokio::join!(coordinator.start_vm(200), coordinator.stop_vm(201));
    start.unwrap();
    stop.unwrap();

    // Neither final write was lost.
    assert_eq!(coordinator.vm(200).unwrap().status, VmStatus::Running);
    assert_eq!(coordinator.vm(201).unwrap().status, VmStatus::Stopped);
    assert!(!coordinator.is_in_flight(200));
    assert!(!coordinator.is_in_flight(201));

    let mut issued: Vec<(u32, OperationKind)> = gateway
        .commands()
        .into_iter()
        .map(|(_, vmid, kind)| (vmid, kind))
        .collect();
    issued.sort_unstable_by_key(|(vmid, _)| *vmid);
    assert_eq!(
        issued,
        vec![(200, OperationKind::Start), (201, OperationKind::Stop)]
    );
}

#[tokio::test]
async fn test_start_on_paused_vm_issues_resume() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.push_task_status(task("stopped", Some("OK")));
    gateway.set_fallback_listing(vec![vm(103, "pausey", VmStatus::Running)]);

    let coordinator =
        loaded_coordinator(Arc::clone(&gateway), vec![vm(103, "pausey", VmStatus::Paused)]).await;

    coordinator.start_vm(103).await.unwrap();

    assert_eq!(
        gateway.commands(),
        vec![("pve1".to_string(), 103, OperationKind::Resume)]
    );
}

#[tokio::test]
async fn test_no_session_fails_before_any_network_call() {
    let gateway = Arc::new(FakeGateway::new());
    let coordinator = coordinator(Arc::clone(&gateway));

    assert!(matches!(
        coordinator.load_vms().await.unwrap_err(),
        OperationError::NoSession
    ));
    assert!(matches!(
        coordinator.start_vm(100).await.unwrap_err(),
        OperationError::NoSession
    ));

    assert_eq!(gateway.list_calls.load(Ordering::SeqCst), 0);
    assert!(gateway.commands().is_empty());
}

#[tokio::test]
async fn test_command_rejection_clears_in_flight() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.set_command_error(GatewayError::Remote {
        status: 500,
        message: "node offline".to_string(),
    });
    gateway.set_fallback_listing(vec![vm(104, "flaky", VmStatus::Stopped)]);

    let coordinator =
        loaded_coordinator(Arc::clone(&gateway), vec![vm(104, "flaky", VmStatus::Stopped)]).await;

    let err = coordinator.start_vm(104).await.unwrap_err();
    assert!(matches!(
        err,
        OperationError::Gateway(GatewayError::Remote { status: 500, .. })
    ));
    assert!(!coordinator.is_in_flight(104));
    // The published entity is untouched by the failed attempt.
    assert_eq!(coordinator.vm(104).unwrap().status, VmStatus::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_poller_times_out_within_deadline_plus_interval() {
    let gateway = Arc::new(FakeGateway::new());
    // Task status queue stays empty: the task never leaves "running".
    gateway.set_fallback_listing(vec![vm(105, "stuck", VmStatus::Stopped)]);

    let coordinator =
        loaded_coordinator(Arc::clone(&gateway), vec![vm(105, "stuck", VmStatus::Stopped)]).await;

    let started = tokio::time::Instant::now();
    let err = coordinator.start_vm(105).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, OperationError::TaskTimeout(_)));
    // Bounded: deadline (120s) + one interval (2s) of slack.
    assert!(elapsed <= Duration::from_secs(123), "took {:?}", elapsed);
    assert!(!coordinator.is_in_flight(105));
}

#[tokio::test(start_paused = true)]
async fn test_reconciliation_is_best_effort_on_unchanged_status() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.push_task_status(task("stopped", Some("OK")));
    // The listing keeps reporting the pre-command status; a quick resume
    // can land back in the same display bucket.
    gateway.set_fallback_listing(vec![vm(106, "laggy", VmStatus::Running)]);

    let coordinator =
        loaded_coordinator(Arc::clone(&gateway), vec![vm(106, "laggy", VmStatus::Running)]).await;
    let mut rx = coordinator.subscribe();

    // Succeeds despite the status never visibly changing.
    coordinator.resume_vm(106).await.unwrap();

    assert!(!coordinator.is_in_flight(106));
    assert_eq!(coordinator.vm(106).unwrap().status, VmStatus::Running);
    assert!(matches!(
        rx.try_recv().unwrap(),
        Notification::OperationSucceeded { vmid: 106, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_reconciliation_waits_for_divergence_from_original_status() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.push_task_status(task("stopped", Some("OK")));
    // First reconcile fetch still shows the pre-command status; only the
    // second shows the transition.
    gateway.push_listing(vec![vm(107, "slow", VmStatus::Running)]);
    gateway.set_fallback_listing(vec![vm(107, "slow", VmStatus::Stopped)]);

    let coordinator =
        loaded_coordinator(Arc::clone(&gateway), vec![vm(107, "slow", VmStatus::Running)]).await;

    coordinator.stop_vm(107).await.unwrap();

    assert_eq!(coordinator.vm(107).unwrap().status, VmStatus::Stopped);
    // Initial load plus at least two reconcile fetches: the stale first
    // read did not complete reconciliation.
    assert!(gateway.list_calls.load(Ordering::SeqCst) >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_second_operation_on_same_vm_is_rejected() {
    let gateway = Arc::new(FakeGateway::new());
    // Task never terminates; the first operation stays in flight until
    // its deadline.
    let coordinator = Arc::new(
        loaded_coordinator(Arc::clone(&gateway), vec![vm(108, "busy", VmStatus::Stopped)]).await,
    );

    let running = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.start_vm(108).await })
    };

    // Let the spawned operation claim its slot and reach the first poll.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(coordinator.is_in_flight(108));
    assert_eq!(coordinator.pending_kind(108), Some(OperationKind::Start));

    let err = coordinator.stop_vm(108).await.unwrap_err();
    assert!(matches!(
        err,
        OperationError::OperationPending {
            vmid: 108,
            kind: OperationKind::Start
        }
    ));

    // The first operation still settles (timeout) and clears its marker.
    let result = running.await.unwrap();
    assert!(matches!(result, Err(OperationError::TaskTimeout(_))));
    assert!(!coordinator.is_in_flight(108));
}

#[tokio::test(start_paused = true)]
async fn test_bulk_refresh_preserves_in_flight_markers() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.set_fallback_listing(vec![
        vm(109, "busy", VmStatus::Stopped),
        vm(110, "other", VmStatus::Running),
    ]);
    let coordinator = Arc::new(
        loaded_coordinator(Arc::clone(&gateway), vec![vm(109, "busy", VmStatus::Stopped)]).await,
    );

    let running = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.start_vm(109).await })
    };
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(coordinator.is_in_flight(109));

    coordinator.load_vms().await.unwrap();

    // The refresh neither cancelled nor hid the pending operation.
    assert!(coordinator.is_in_flight(109));
    assert_eq!(coordinator.in_flight(OperationKind::Start), vec![109]);
    assert!(coordinator.vm(110).is_some());

    let _ = running.await.unwrap();
    assert!(!coordinator.is_in_flight(109));
}

#[tokio::test]
async fn test_connect_vm_launches_viewer_and_notifies() {
    let gateway = Arc::new(FakeGateway::new());
    let coordinator =
        loaded_coordinator(Arc::clone(&gateway), vec![vm(111, "desk", VmStatus::Running)]).await;
    let mut rx = coordinator.subscribe();

    coordinator.connect_vm(111).await.unwrap();

    assert_eq!(gateway.console_calls.load(Ordering::SeqCst), 1);
    assert!(matches!(
        rx.try_recv().unwrap(),
        Notification::ConsoleLaunched { vmid: 111, .. }
    ));

    let _ = std::fs::remove_file(std::env::temp_dir().join("proxdeck-spice-111.vv"));
}

#[tokio::test]
async fn test_cluster_label_falls_back_to_host() {
    let gateway = Arc::new(FakeGateway::new());
    let coordinator = coordinator(Arc::clone(&gateway));
    coordinator.set_session(test_session()).await;

    assert_eq!(coordinator.cluster_label().await, "testlab");

    gateway.fail_cluster_name.store(true, Ordering::SeqCst);
    assert_eq!(coordinator.cluster_label().await, "pve.lan");
}

#[tokio::test]
async fn test_operation_on_unknown_vm_fails_fast() {
    let gateway = Arc::new(FakeGateway::new());
    let coordinator = loaded_coordinator(Arc::clone(&gateway), vec![]).await;

    let err = coordinator.start_vm(999).await.unwrap_err();
    assert!(matches!(err, OperationError::VmNotFound(999)));
    assert!(gateway.commands().is_empty());
}
