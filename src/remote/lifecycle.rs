//! Start/stop orchestration for cloud autonomous databases.
//!
//! The operator never trusts a cached state: every mutating call first
//! re-reads the resource through the [`Executor`] and only then decides
//! whether the transition is allowed. The remote state machine is
//!
//! ```text
//! STOPPED ──▶ STARTING ──▶ AVAILABLE ──▶ STOPPING ──▶ STOPPED
//! ```
//!
//! plus provisioning, maintenance and terminal states which are reported
//! verbatim. Only `STOPPED` and `AVAILABLE` accept a start or stop request.
//!
//! A fresh [`DatabaseClient`] is built for every operation through the
//! injected [`ClientFactory`]; a factory failure is reported as an `"error"`
//! response, never a panic.

use super::executor::Executor;
use crate::error::{LifecycleError, RemoteError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Environment variable holding the default database name.
pub const NAME_ENV: &str = "ADB_NAME";
/// Environment variable holding the default compartment OCID.
pub const CONTAINER_ENV: &str = "OCI_COMPARTMENT_OCID";

// ── Remote model ─────────────────────────────────────────────────────────

/// Lifecycle state as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LifecycleState {
    Provisioning,
    Starting,
    Available,
    Stopping,
    Stopped,
    Updating,
    Unavailable,
    Terminating,
    Terminated,
    /// Any state this crate does not model, kept as reported.
    Other(String),
}

impl LifecycleState {
    pub fn as_str(&self) -> &str {
        match self {
            LifecycleState::Provisioning => "PROVISIONING",
            LifecycleState::Starting => "STARTING",
            LifecycleState::Available => "AVAILABLE",
            LifecycleState::Stopping => "STOPPING",
            LifecycleState::Stopped => "STOPPED",
            LifecycleState::Updating => "UPDATING",
            LifecycleState::Unavailable => "UNAVAILABLE",
            LifecycleState::Terminating => "TERMINATING",
            LifecycleState::Terminated => "TERMINATED",
            LifecycleState::Other(s) => s,
        }
    }

    /// Whether a start or stop request may be issued from this state.
    pub fn accepts_transition(&self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Available)
    }
}

impl From<&str> for LifecycleState {
    fn from(s: &str) -> Self {
        match s {
            "PROVISIONING" => LifecycleState::Provisioning,
            "STARTING" => LifecycleState::Starting,
            "AVAILABLE" => LifecycleState::Available,
            "STOPPING" => LifecycleState::Stopping,
            "STOPPED" => LifecycleState::Stopped,
            "UPDATING" => LifecycleState::Updating,
            "UNAVAILABLE" => LifecycleState::Unavailable,
            "TERMINATING" => LifecycleState::Terminating,
            "TERMINATED" => LifecycleState::Terminated,
            other => LifecycleState::Other(other.to_string()),
        }
    }
}

impl From<String> for LifecycleState {
    fn from(s: String) -> Self {
        LifecycleState::from(s.as_str())
    }
}

impl From<LifecycleState> for String {
    fn from(state: LifecycleState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of one autonomous database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutonomousDatabase {
    pub id: String,
    pub display_name: String,
    pub db_name: String,
    pub lifecycle_state: LifecycleState,
}

/// Control-plane operations the operator relies on.
///
/// Implemented by the cloud SDK wrapper; tests use an in-memory fake.
pub trait DatabaseClient {
    fn list_autonomous_databases(
        &self,
        compartment_id: &str,
    ) -> Result<Vec<AutonomousDatabase>, RemoteError>;

    fn get_autonomous_database(&self, id: &str) -> Result<AutonomousDatabase, RemoteError>;

    /// Request a start. Returns once the request is accepted, not when the
    /// database is `AVAILABLE`.
    fn start_autonomous_database(&self, id: &str) -> Result<(), RemoteError>;

    /// Request a stop. Returns once the request is accepted.
    fn stop_autonomous_database(&self, id: &str) -> Result<(), RemoteError>;
}

/// Builds a fresh [`DatabaseClient`] from the current credentials.
pub trait ClientFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn DatabaseClient>, RemoteError>;
}

impl<F> ClientFactory for F
where
    F: Fn() -> Result<Box<dyn DatabaseClient>, RemoteError> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn DatabaseClient>, RemoteError> {
        self()
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────

/// Fallback resource name and container used when a caller passes empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceDefaults {
    pub name: Option<String>,
    pub container_id: Option<String>,
}

impl ResourceDefaults {
    /// Read [`NAME_ENV`] and [`CONTAINER_ENV`]. Empty values count as unset.
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            name: read(NAME_ENV),
            container_id: read(CONTAINER_ENV),
        }
    }

    fn resolve(&self, name: &str, container_id: &str) -> Option<(String, String)> {
        let pick = |given: &str, fallback: &Option<String>| {
            if given.trim().is_empty() {
                fallback.clone()
            } else {
                Some(given.to_string())
            }
        };
        Some((pick(name, &self.name)?, pick(container_id, &self.container_id)?))
    }
}

// ── Responses ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Accepted,
    Error,
}

/// Result of an administrative operation.
///
/// `reason` carries the typed failure for programmatic callers; it is not
/// serialised, `kind` is.
#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub status: OperationStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle_state: Option<LifecycleState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip)]
    pub reason: Option<LifecycleError>,
}

impl OperationResponse {
    fn accepted(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Accepted,
            message: message.into(),
            id: None,
            display_name: None,
            lifecycle_state: None,
            kind: None,
            reason: None,
        }
    }

    fn describing(db: AutonomousDatabase) -> Self {
        Self {
            id: Some(db.id),
            display_name: Some(db.display_name),
            lifecycle_state: Some(db.lifecycle_state),
            ..Self::accepted("Database information retrieved")
        }
    }

    fn failed(reason: LifecycleError) -> Self {
        Self {
            status: OperationStatus::Error,
            message: reason.to_string(),
            id: None,
            display_name: None,
            lifecycle_state: None,
            kind: Some(reason.kind()),
            reason: Some(reason),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == OperationStatus::Accepted
    }
}

// ── Operator ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Transition {
    Start,
    Stop,
}

impl Transition {
    fn verb(self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Stop => "stop",
        }
    }

    /// The state in which this transition would be a no-op.
    fn target(self) -> LifecycleState {
        match self {
            Transition::Start => LifecycleState::Available,
            Transition::Stop => LifecycleState::Stopped,
        }
    }

    fn already_there(self) -> LifecycleError {
        match self {
            Transition::Start => LifecycleError::AlreadyRunning,
            Transition::Stop => LifecycleError::AlreadyStopped,
        }
    }
}

/// Locates, starts and stops autonomous databases.
pub struct LifecycleOperator {
    factory: Arc<dyn ClientFactory>,
    executor: Executor,
    defaults: ResourceDefaults,
}

impl fmt::Debug for LifecycleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleOperator")
            .field("factory", &"<dyn ClientFactory>")
            .field("executor", &self.executor)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl LifecycleOperator {
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        executor: Executor,
        defaults: ResourceDefaults,
    ) -> Self {
        Self {
            factory,
            executor,
            defaults,
        }
    }

    fn client(&self) -> Result<Box<dyn DatabaseClient>, LifecycleError> {
        self.factory.create().map_err(|e| {
            error!(error = %e, "Failed to create database client");
            LifecycleError::ClientUnavailable(e.to_string())
        })
    }

    /// Find a database by display name or db name inside a compartment.
    ///
    /// Empty arguments fall back to [`ResourceDefaults`]. Missing values are
    /// reported before any client is built.
    pub fn locate(&self, name: &str, container_id: &str) -> OperationResponse {
        match self.try_locate(name, container_id) {
            Ok(db) => OperationResponse::describing(db),
            Err(e) => OperationResponse::failed(e),
        }
    }

    fn try_locate(
        &self,
        name: &str,
        container_id: &str,
    ) -> Result<AutonomousDatabase, LifecycleError> {
        let (name, container_id) =
            self.defaults
                .resolve(name, container_id)
                .ok_or(LifecycleError::MissingDefaults {
                    name_var: NAME_ENV,
                    container_var: CONTAINER_ENV,
                })?;

        let client = self.client()?;
        let databases = self
            .executor
            .execute(|| client.list_autonomous_databases(&container_id))
            .map_err(|e| LifecycleError::Remote {
                action: "lookup",
                detail: e.to_string(),
            })?;

        let found = databases
            .into_iter()
            .find(|db| db.display_name == name || db.db_name == name)
            .ok_or_else(|| LifecycleError::NotFound { name: name.clone() })?;

        info!(name = %name, id = %found.id, state = %found.lifecycle_state, "Located database");
        Ok(found)
    }

    /// Request a start. Returns `"accepted"` once the control plane took the request.
    pub fn start(&self, id: &str) -> OperationResponse {
        self.transition(id, Transition::Start)
    }

    /// Request a stop. Returns `"accepted"` once the control plane took the request.
    pub fn stop(&self, id: &str) -> OperationResponse {
        self.transition(id, Transition::Stop)
    }

    fn transition(&self, id: &str, transition: Transition) -> OperationResponse {
        match self.try_transition(id, transition) {
            Ok(display_name) => {
                let verb = transition.verb();
                info!(id, action = verb, "Lifecycle request accepted");
                OperationResponse {
                    id: Some(id.to_string()),
                    display_name: Some(display_name.clone()),
                    ..OperationResponse::accepted(format!(
                        "Request to {verb} database '{display_name}' accepted"
                    ))
                }
            }
            Err(e) => {
                error!(id, action = transition.verb(), error = %e, "Lifecycle request rejected");
                OperationResponse::failed(e)
            }
        }
    }

    fn try_transition(&self, id: &str, transition: Transition) -> Result<String, LifecycleError> {
        let action = transition.verb();
        let client = self.client()?;

        let current = self
            .executor
            .execute(|| client.get_autonomous_database(id))
            .map_err(|e| LifecycleError::Remote {
                action,
                detail: e.to_string(),
            })?;

        if current.lifecycle_state == transition.target() {
            return Err(transition.already_there());
        }
        if !current.lifecycle_state.accepts_transition() {
            return Err(LifecycleError::InvalidState {
                action,
                state: current.lifecycle_state,
            });
        }

        self.executor
            .execute(|| match transition {
                Transition::Start => client.start_autonomous_database(id),
                Transition::Stop => client.stop_autonomous_database(id),
            })
            .map_err(|e| LifecycleError::Remote {
                action,
                detail: e.to_string(),
            })?;

        Ok(current.display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::backoff::RetryPolicy;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Calls {
        list: AtomicUsize,
        get: AtomicUsize,
        start: AtomicUsize,
        stop: AtomicUsize,
    }

    struct FakeClient {
        databases: Vec<AutonomousDatabase>,
        calls: Arc<Calls>,
        /// Errors returned by `get` before it succeeds.
        get_failures: Arc<Mutex<Vec<String>>>,
    }

    impl DatabaseClient for FakeClient {
        fn list_autonomous_databases(
            &self,
            _: &str,
        ) -> Result<Vec<AutonomousDatabase>, RemoteError> {
            self.calls.list.fetch_add(1, Ordering::SeqCst);
            Ok(self.databases.clone())
        }

        fn get_autonomous_database(&self, id: &str) -> Result<AutonomousDatabase, RemoteError> {
            self.calls.get.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = self.get_failures.lock().unwrap().pop() {
                return Err(msg.into());
            }
            self.databases
                .iter()
                .find(|db| db.id == id)
                .cloned()
                .ok_or_else(|| "404 NotAuthorizedOrNotFound".into())
        }

        fn start_autonomous_database(&self, _: &str) -> Result<(), RemoteError> {
            self.calls.start.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop_autonomous_database(&self, _: &str) -> Result<(), RemoteError> {
            self.calls.stop.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn db(id: &str, display: &str, db_name: &str, state: &str) -> AutonomousDatabase {
        AutonomousDatabase {
            id: id.into(),
            display_name: display.into(),
            db_name: db_name.into(),
            lifecycle_state: state.into(),
        }
    }

    struct Harness {
        operator: LifecycleOperator,
        calls: Arc<Calls>,
        get_failures: Arc<Mutex<Vec<String>>>,
    }

    fn harness(databases: Vec<AutonomousDatabase>, defaults: ResourceDefaults) -> Harness {
        let calls = Arc::new(Calls::default());
        let get_failures = Arc::new(Mutex::new(Vec::new()));
        let (c, f) = (Arc::clone(&calls), Arc::clone(&get_failures));
        let factory = move || -> Result<Box<dyn DatabaseClient>, RemoteError> {
            Ok(Box::new(FakeClient {
                databases: databases.clone(),
                calls: Arc::clone(&c),
                get_failures: Arc::clone(&f),
            }))
        };
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(1));
        let executor = Executor::new(policy);
        Harness {
            operator: LifecycleOperator::new(Arc::new(factory), executor, defaults),
            calls,
            get_failures,
        }
    }

    /// One database named Sales, no environment defaults.
    fn sales(state: &str) -> Harness {
        harness(
            vec![db("ocid1", "Sales", "SALESDB", state)],
            ResourceDefaults::default(),
        )
    }

    #[test]
    fn start_on_available_is_rejected_without_start_call() {
        let h = sales("AVAILABLE");
        let resp = h.operator.start("ocid1");
        assert_eq!(resp.status, OperationStatus::Error);
        assert!(matches!(resp.reason, Some(LifecycleError::AlreadyRunning)));
        assert_eq!(h.calls.start.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_on_starting_is_a_precondition_failure() {
        let h = sales("STARTING");
        let resp = h.operator.stop("ocid1");
        assert_eq!(resp.status, OperationStatus::Error);
        assert_eq!(resp.kind, Some("precondition_failed"));
        assert!(resp.message.contains("STARTING"), "got: {}", resp.message);
        assert_eq!(h.calls.stop.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_on_stopped_is_a_no_op_error() {
        let h = sales("STOPPED");
        let resp = h.operator.stop("ocid1");
        assert!(matches!(resp.reason, Some(LifecycleError::AlreadyStopped)));
        assert_eq!(h.calls.stop.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_on_stopped_is_accepted() {
        let h = sales("STOPPED");
        let resp = h.operator.start("ocid1");
        assert!(resp.is_accepted(), "got: {}", resp.message);
        assert!(resp.message.contains("Sales"));
        assert_eq!(h.calls.get.load(Ordering::SeqCst), 1);
        assert_eq!(h.calls.start.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_on_available_is_accepted() {
        let h = sales("AVAILABLE");
        assert!(h.operator.stop("ocid1").is_accepted());
        assert_eq!(h.calls.stop.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_state_is_reported_verbatim() {
        let h = harness(
            vec![db("ocid1", "Sales", "SALESDB", "RESTORE_IN_PROGRESS")],
            ResourceDefaults::default(),
        );
        let resp = h.operator.start("ocid1");
        assert!(resp.message.contains("RESTORE_IN_PROGRESS"));
        assert_eq!(h.calls.start.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn state_read_is_retried_on_throttling() {
        let h = sales("STOPPED");
        h.get_failures
            .lock()
            .unwrap()
            .push("429 TooManyRequests".to_string());
        assert!(h.operator.start("ocid1").is_accepted());
        assert_eq!(h.calls.get.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn exhausted_retries_surface_remote_error() {
        let h = harness(vec![], ResourceDefaults::default());
        let resp = h.operator.start("missing");
        assert_eq!(resp.kind, Some("remote"));
        assert!(resp.message.contains("NotAuthorizedOrNotFound"));
        assert_eq!(h.calls.get.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn locate_matches_display_or_db_name() {
        let h = harness(
            vec![
                db("ocid1", "Sales", "SALESDB", "AVAILABLE"),
                db("ocid2", "Hr", "HRDB", "STOPPED"),
            ],
            ResourceDefaults::default(),
        );
        let by_db_name = h.operator.locate("HRDB", "ocid1.compartment");
        assert!(by_db_name.is_accepted());
        assert_eq!(by_db_name.id.as_deref(), Some("ocid2"));
        assert_eq!(by_db_name.lifecycle_state, Some(LifecycleState::Stopped));

        let by_display = h.operator.locate("Sales", "ocid1.compartment");
        assert_eq!(by_display.id.as_deref(), Some("ocid1"));
    }

    #[test]
    fn locate_reports_not_found() {
        let h = sales("AVAILABLE");
        let resp = h.operator.locate("Finance", "ocid1.compartment");
        assert!(matches!(resp.reason, Some(LifecycleError::NotFound { .. })));
    }

    #[test]
    fn locate_falls_back_to_defaults() {
        let defaults = ResourceDefaults {
            name: Some("Sales".into()),
            container_id: Some("ocid1.compartment".into()),
        };
        let h = harness(vec![db("ocid1", "Sales", "SALESDB", "AVAILABLE")], defaults);
        assert!(h.operator.locate("", "").is_accepted());
    }

    #[test]
    fn locate_without_defaults_makes_no_remote_call() {
        let h = sales("AVAILABLE");
        let resp = h.operator.locate("", "ocid1.compartment");
        assert_eq!(resp.kind, Some("configuration"));
        assert_eq!(h.calls.list.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn factory_failure_is_reported_not_panicked() {
        let factory = || -> Result<Box<dyn DatabaseClient>, RemoteError> {
            Err("config file ~/.oci/config not found".into())
        };
        let operator = LifecycleOperator::new(
            Arc::new(factory),
            Executor::default(),
            ResourceDefaults::default(),
        );
        let resp = operator.start("ocid1");
        assert_eq!(resp.kind, Some("client_unavailable"));
        assert!(resp.message.contains("not found"));
    }

    #[test]
    fn response_serialises_status_lowercase() {
        let h = sales("AVAILABLE");
        let v = serde_json::to_value(h.operator.locate("Sales", "c")).unwrap();
        assert_eq!(v["status"], "accepted");
        assert_eq!(v["lifecycle_state"], "AVAILABLE");
        assert!(v.get("kind").is_none());

        let v = serde_json::to_value(h.operator.start("ocid1")).unwrap();
        assert_eq!(v["status"], "error");
        assert_eq!(v["kind"], "no_op");
    }
}
