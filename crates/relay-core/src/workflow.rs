//! Workflow executor: the uniform pipeline behind every actor operation.
//!
//! Each DSL operation on a concrete actor is described by an [`Operation`]
//! (or [`BatchOperation`]) value supplying these capabilities:
//!
//! - `validate_args`: a check over the caller's arguments (default: accept)
//! - `plugin`: the backend I/O, returning raw backend-native data
//! - `validate`: a shape check over the raw data (default: accept)
//! - `transform`: pure conversion from raw data to a canonical value
//!
//! [`Workflow`] drives them in a fixed order and turns everything into an
//! [`Outcome`]:
//!
//! ```text
//! initialized? ──no──► *_NOT_INITIALIZED
//!      │
//! select client ──none──► NO_CLIENT            (plugin never runs)
//!      │
//! validate_args ──err──► VALIDATION_FAILED     (plugin never runs)
//!      │
//! plugin().await ──err──► <OP>_FAILED          (errors += 1)
//!      │
//! validate ──false──► VALIDATION_FAILED        (single)
//!          ──all invalid──► NO_VALID_DATA      (batch, errors += 1)
//!      │
//! transform ──err──► <OP>_FAILED               (errors += 1)
//!      │
//! Success(value)                               (ops += 1, last_activity = now)
//! ```
//!
//! A panic inside a plugin or transform is caught and reported as
//! `<OP>_FAILED` with the `System` category.
//!
//! The executor never retries and imposes no timeout; both belong to the
//! plugin. The only suspension point is the plugin call, so no lock is ever
//! held across an `.await`.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Serialize;
use tracing::{debug, warn};

use crate::activity::{ActivityTracker, ActorStatus};
use crate::error::{DomainError, categorize, codes, failed_code};
use crate::outcome::Outcome;
use crate::registry::{ClientAssociation, ClientConfig, ClientRegistry};
use crate::types::ActorRole;

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// A single-item operation against a backend handle of type `H`.
#[async_trait]
pub trait Operation<H: Send + Sync + 'static>: Send + Sync {
    /// Caller arguments. Serialized into the failure context.
    type Args: Serialize + Send + Sync;
    /// Backend-native payload returned by the plugin.
    type Raw: Send;
    /// Canonical value handed back to the caller.
    type Output: Send;

    /// snake_case operation name, e.g. `"get_current_price"`.
    fn name(&self) -> &'static str;

    /// Reject arguments the backend must never see.
    fn validate_args(&self, _args: &Self::Args) -> Result<(), String> {
        Ok(())
    }

    /// Perform the backend call.
    async fn plugin(&self, client: &H, args: &Self::Args) -> anyhow::Result<Self::Raw>;

    fn validate(&self, _raw: &Self::Raw) -> bool {
        true
    }

    /// Convert raw data into the canonical value. Must not perform I/O.
    fn transform(&self, raw: Self::Raw, args: &Self::Args) -> anyhow::Result<Self::Output>;
}

/// A batch operation: the plugin returns a collection and invalid items are
/// dropped instead of failing the whole call.
#[async_trait]
pub trait BatchOperation<H: Send + Sync + 'static>: Send + Sync {
    type Args: Serialize + Send + Sync;
    type Item: Send;
    type Output: Send;

    fn name(&self) -> &'static str;

    fn validate_args(&self, _args: &Self::Args) -> Result<(), String> {
        Ok(())
    }

    async fn plugin(&self, client: &H, args: &Self::Args) -> anyhow::Result<Vec<Self::Item>>;

    fn validate_item(&self, _item: &Self::Item) -> bool {
        true
    }

    fn transform_item(&self, item: Self::Item, args: &Self::Args) -> anyhow::Result<Self::Output>;
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// Shared engine state embedded in every concrete actor: client registry,
/// activity counters and the initialized flag.
pub struct Workflow<H> {
    name: String,
    role: ActorRole,
    registry: RwLock<ClientRegistry<H>>,
    activity: ActivityTracker,
    initialized: AtomicBool,
}

impl<H: Send + Sync + 'static> Workflow<H> {
    pub fn new(name: impl Into<String>, role: ActorRole) -> Self {
        Self {
            name: name.into(),
            role,
            registry: RwLock::new(ClientRegistry::new()),
            activity: ActivityTracker::new(),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ActorRole {
        self.role
    }

    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    // -- registry access ----------------------------------------------------

    /// Read access to the registry. Do not hold the guard across an `.await`.
    pub fn registry(&self) -> RwLockReadGuard<'_, ClientRegistry<H>> {
        self.registry.read()
    }

    pub fn registry_mut(&self) -> RwLockWriteGuard<'_, ClientRegistry<H>> {
        self.registry.write()
    }

    /// Register a handle as connected.
    pub fn add_connected_client(&self, key: impl Into<String>, client: Arc<H>, config: ClientConfig) {
        let key = key.into();
        let mut registry = self.registry.write();
        registry.add_client(key.clone(), client, config);
        registry.set_connected(&key, true);
    }

    pub fn mark_connected(&self, key: &str, connected: bool) -> bool {
        self.registry.write().set_connected(key, connected)
    }

    pub fn is_connected(&self) -> bool {
        self.registry.read().first_connected().is_some()
    }

    // -- lifecycle ----------------------------------------------------------

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    /// Mark the actor uninitialized, empty the registry and reset counters.
    ///
    /// Returns the removed associations so the actor can disconnect the
    /// handles it owns.
    pub fn teardown(&self) -> Vec<ClientAssociation<H>> {
        self.initialized.store(false, Ordering::Release);
        let drained = self.registry.write().drain();
        self.activity.reset();
        drained
    }

    /// Fresh status snapshot.
    pub fn status(&self) -> ActorStatus {
        let registry = self.registry.read();
        ActorStatus {
            name: self.name.clone(),
            role: self.role,
            is_initialized: self.is_initialized(),
            is_connected: registry.first_connected().is_some(),
            total_operations: self.activity.total_operations(),
            error_count: self.activity.error_count(),
            last_activity: self.activity.last_activity(),
            registered_clients: registry.summaries(),
            metadata: serde_json::Map::new(),
        }
    }

    // -- execution ----------------------------------------------------------

    /// Run a single-item operation. `client_key` addresses a specific
    /// association; `None` picks the first connected one.
    pub async fn execute<O>(&self, op: &O, args: O::Args, client_key: Option<&str>) -> Outcome<O::Output>
    where
        O: Operation<H>,
    {
        let name = op.name();
        let (key, client) = match self.prepare(name, client_key) {
            Ok(selected) => selected,
            Err(e) => return Outcome::Failure(e),
        };
        if let Err(reason) = op.validate_args(&args) {
            return Outcome::Failure(self.invalid_args(&key, name, &args, &reason));
        }
        debug!("[{}] {name} via '{key}'", self.name);

        let raw = match guarded(op.plugin(&client, &args)).await {
            Ok(raw) => raw,
            Err(e) => return Outcome::Failure(self.fail(&key, name, &args, &e)),
        };

        if !op.validate(&raw) {
            warn!("[{}] {name}: raw payload failed validation", self.name);
            return Outcome::Failure(
                DomainError::business(codes::VALIDATION_FAILED, format!("{name}: backend returned an invalid payload"))
                    .with_context("actor", &self.name)
                    .with_context("operation", name)
                    .with_context("client", &key)
                    .with_context("args", &args),
            );
        }

        match guarded_sync(|| op.transform(raw, &args)) {
            Ok(value) => {
                self.activity.record_success();
                Outcome::Success(value)
            }
            Err(e) => Outcome::Failure(self.fail(&key, name, &args, &e)),
        }
    }

    /// Run a batch operation. Invalid raw items are dropped; the call only
    /// fails with `NO_VALID_DATA` when nothing survives validation.
    pub async fn execute_batch<O>(&self, op: &O, args: O::Args, client_key: Option<&str>) -> Outcome<Vec<O::Output>>
    where
        O: BatchOperation<H>,
    {
        let name = op.name();
        let (key, client) = match self.prepare(name, client_key) {
            Ok(selected) => selected,
            Err(e) => return Outcome::Failure(e),
        };
        if let Err(reason) = op.validate_args(&args) {
            return Outcome::Failure(self.invalid_args(&key, name, &args, &reason));
        }
        debug!("[{}] {name} (batch) via '{key}'", self.name);

        let items = match guarded(op.plugin(&client, &args)).await {
            Ok(items) => items,
            Err(e) => return Outcome::Failure(self.fail(&key, name, &args, &e)),
        };

        let received = items.len();
        let valid: Vec<O::Item> = items.into_iter().filter(|item| op.validate_item(item)).collect();
        if valid.is_empty() {
            self.activity.record_error();
            warn!("[{}] {name}: none of {received} item(s) passed validation", self.name);
            return Outcome::Failure(
                DomainError::business(codes::NO_VALID_DATA, format!("{name}: no valid items in batch of {received}"))
                    .with_context("actor", &self.name)
                    .with_context("operation", name)
                    .with_context("client", &key)
                    .with_context("received", received)
                    .with_context("args", &args),
            );
        }
        if valid.len() < received {
            debug!("[{}] {name}: dropped {} invalid item(s)", self.name, received - valid.len());
        }

        let transformed: anyhow::Result<Vec<O::Output>> =
            guarded_sync(|| valid.into_iter().map(|item| op.transform_item(item, &args)).collect());

        match transformed {
            Ok(values) => {
                self.activity.record_success();
                Outcome::Success(values)
            }
            Err(e) => Outcome::Failure(self.fail(&key, name, &args, &e)),
        }
    }

    /// Initialized check followed by client selection.
    fn prepare(&self, operation: &str, client_key: Option<&str>) -> Result<(String, Arc<H>), DomainError> {
        if !self.is_initialized() {
            return Err(DomainError::not_initialized(self.role.not_initialized_code(), &self.name, operation));
        }

        let registry = self.registry.read();
        let selected = match client_key {
            Some(key) => registry.get_client(key).filter(|a| a.is_connected),
            None => registry.first_connected(),
        };

        match selected {
            Some(a) => Ok((a.key.clone(), Arc::clone(&a.client))),
            None => {
                let mut err = DomainError::business(
                    codes::NO_CLIENT,
                    format!("actor '{}' has no connected client for {operation}", self.name),
                )
                .with_context("actor", &self.name)
                .with_context("operation", operation);
                if let Some(key) = client_key {
                    err = err.with_context("client", key);
                }
                Err(err)
            }
        }
    }

    fn invalid_args(&self, key: &str, operation: &str, args: &impl Serialize, reason: &str) -> DomainError {
        debug!("[{}] {operation}: rejected arguments: {reason}", self.name);
        DomainError::business(codes::VALIDATION_FAILED, format!("{operation}: {reason}"))
            .with_context("actor", &self.name)
            .with_context("operation", operation)
            .with_context("client", key)
            .with_context("args", args)
    }

    /// Record a caught plugin/transform error and build the failure.
    fn fail(&self, key: &str, operation: &str, args: &impl Serialize, err: &anyhow::Error) -> DomainError {
        self.activity.record_error();
        self.registry.write().record_error(key);
        warn!("[{}] {operation} failed via '{key}': {err:#}", self.name);

        DomainError::new(failed_code(operation), format!("{operation} failed: {err:#}"), categorize(err))
            .with_context("actor", &self.name)
            .with_context("operation", operation)
            .with_context("client", key)
            .with_context("args", args)
            .with_context("cause", format!("{err:#}"))
    }
}

/// Await a plugin future, turning a panic into an error.
async fn guarded<T>(fut: impl Future<Output = anyhow::Result<T>>) -> anyhow::Result<T> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn guarded_sync<T>(f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use anyhow::anyhow;
    use serde_json::{Value, json};

    use super::*;
    use crate::error::{ErrorCategory, RelayError};
    use crate::types::ClientType;

    /// Mock backend whose price payload can be swapped between calls.
    struct MockApi {
        calls: AtomicUsize,
        response: parking_lot::Mutex<Result<Value, String>>,
    }

    impl MockApi {
        fn returning(v: Value) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), response: parking_lot::Mutex::new(Ok(v)) })
        }

        fn fail_with(&self, msg: &str) {
            *self.response.lock() = Err(msg.to_string());
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    struct CurrentPrice;

    #[async_trait]
    impl Operation<MockApi> for CurrentPrice {
        type Args = (String, String);
        type Raw = Value;
        type Output = f64;

        fn name(&self) -> &'static str {
            "get_current_price"
        }

        async fn plugin(&self, client: &MockApi, _args: &Self::Args) -> anyhow::Result<Value> {
            client.calls.fetch_add(1, Ordering::SeqCst);
            client.response.lock().clone().map_err(|e| anyhow!(e))
        }

        fn validate(&self, raw: &Value) -> bool {
            raw.get("price").is_some()
        }

        fn transform(&self, raw: Value, _args: &Self::Args) -> anyhow::Result<f64> {
            raw["price"].as_f64().ok_or_else(|| anyhow!("price is not a number"))
        }
    }

    struct Prices;

    #[async_trait]
    impl BatchOperation<MockApi> for Prices {
        type Args = Vec<String>;
        type Item = Value;
        type Output = f64;

        fn name(&self) -> &'static str {
            "get_current_prices"
        }

        async fn plugin(&self, client: &MockApi, _args: &Self::Args) -> anyhow::Result<Vec<Value>> {
            client.calls.fetch_add(1, Ordering::SeqCst);
            let v = client.response.lock().clone().map_err(|e| anyhow!(e))?;
            Ok(v.as_array().cloned().unwrap_or_default())
        }

        fn validate_item(&self, item: &Value) -> bool {
            item.get("price").and_then(Value::as_f64).is_some()
        }

        fn transform_item(&self, item: Value, _args: &Self::Args) -> anyhow::Result<f64> {
            item["price"].as_f64().ok_or_else(|| anyhow!("price is not a number"))
        }
    }

    fn ready(api: &Arc<MockApi>) -> Workflow<MockApi> {
        let wf = Workflow::new("mock-reader", ActorRole::Reader);
        wf.add_connected_client("api", Arc::clone(api), ClientConfig::new("Mock", ClientType::DataSource));
        wf.mark_initialized();
        wf
    }

    fn args() -> (String, String) {
        ("bitcoin".into(), "usd".into())
    }

    #[tokio::test]
    async fn success_then_failure() {
        let api = MockApi::returning(json!({"price": 50000}));
        let wf = ready(&api);

        let out = wf.execute(&CurrentPrice, args(), None).await;
        assert_eq!(out, Outcome::Success(50000.0));
        assert_eq!(wf.activity().total_operations(), 1);

        api.fail_with("boom");
        let out = wf.execute(&CurrentPrice, args(), None).await;
        let err = out.error().unwrap();
        assert_eq!(err.code, "GET_CURRENT_PRICE_FAILED");
        assert_eq!(err.category, ErrorCategory::System);
        assert!(err.message.contains("boom"));
        assert_eq!(err.context["cause"], "boom");
        assert_eq!(err.context["args"], json!(["bitcoin", "usd"]));
        assert_eq!(wf.activity().error_count(), 1);
        assert_eq!(wf.registry().get_client("api").unwrap().error_count, 1);
        assert_eq!(wf.activity().total_operations(), 1);
    }

    /// Panics in the plugin when asked for "plugin", in the transform otherwise.
    struct Explode;

    #[async_trait]
    impl Operation<MockApi> for Explode {
        type Args = String;
        type Raw = Value;
        type Output = f64;

        fn name(&self) -> &'static str {
            "get_market_analytics"
        }

        async fn plugin(&self, _client: &MockApi, args: &String) -> anyhow::Result<Value> {
            if args == "plugin" {
                panic!("backend exploded");
            }
            Ok(json!({}))
        }

        fn transform(&self, _raw: Value, _args: &String) -> anyhow::Result<f64> {
            panic!("bad payload {}", 42);
        }
    }

    #[tokio::test]
    async fn panics_become_failed_outcomes() {
        let api = MockApi::returning(json!({"price": 1}));
        let wf = ready(&api);

        let out = wf.execute(&Explode, "plugin".to_string(), None).await;
        let err = out.error().unwrap();
        assert_eq!(err.code, "GET_MARKET_ANALYTICS_FAILED");
        assert_eq!(err.category, ErrorCategory::System);
        assert!(err.message.contains("backend exploded"));

        let out = wf.execute(&Explode, "transform".to_string(), None).await;
        assert!(out.error().unwrap().message.contains("bad payload 42"));
        assert_eq!(wf.activity().error_count(), 2);

        assert_eq!(wf.registry().get_client("api").unwrap().error_count, 2);

        // the workflow stays usable afterwards
        assert!(wf.execute(&CurrentPrice, args(), None).await.is_success());
    }

    #[tokio::test]
    async fn each_failure_counts_once() {
        let api = MockApi::returning(json!({}));
        api.fail_with("down");
        let wf = ready(&api);
        for i in 1..=3 {
            assert!(wf.execute(&CurrentPrice, args(), None).await.is_failure());
            assert_eq!(wf.activity().error_count(), i);
        }
    }

    #[tokio::test]
    async fn no_client_short_circuits() {
        let api = MockApi::returning(json!({"price": 1}));
        let wf = ready(&api);
        wf.mark_connected("api", false);

        let out = wf.execute(&CurrentPrice, args(), None).await;
        assert_eq!(out.code(), Some(codes::NO_CLIENT));
        assert_eq!(out.error().unwrap().category, ErrorCategory::Business);
        let out = wf.execute_batch(&Prices, vec![], None).await;
        assert_eq!(out.code(), Some(codes::NO_CLIENT));

        assert_eq!(api.calls(), 0);
        assert_eq!(wf.activity().error_count(), 0);
        assert!(wf.activity().last_activity().is_none());
    }

    #[tokio::test]
    async fn addressed_client_must_exist() {
        let api = MockApi::returning(json!({"price": 1}));
        let wf = ready(&api);
        let out = wf.execute(&CurrentPrice, args(), Some("other")).await;
        assert_eq!(out.code(), Some(codes::NO_CLIENT));
        assert!(wf.execute(&CurrentPrice, args(), Some("api")).await.is_success());
    }

    #[tokio::test]
    async fn not_initialized_before_and_after_lifecycle() {
        let api = MockApi::returning(json!({"price": 1}));
        let wf: Workflow<MockApi> = Workflow::new("mock-reader", ActorRole::Reader);
        let out = wf.execute(&CurrentPrice, args(), None).await;
        assert_eq!(out.code(), Some(codes::READER_NOT_INITIALIZED));

        let wf = ready(&api);
        assert!(wf.execute(&CurrentPrice, args(), None).await.is_success());
        assert_eq!(wf.teardown().len(), 1);
        let out = wf.execute(&CurrentPrice, args(), None).await;
        assert_eq!(out.code(), Some(codes::READER_NOT_INITIALIZED));
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn single_validation_failure_is_business() {
        let api = MockApi::returning(json!({"last": 1}));
        let wf = ready(&api);
        let out = wf.execute(&CurrentPrice, args(), None).await;
        assert_eq!(out.code(), Some(codes::VALIDATION_FAILED));
        assert_eq!(out.error().unwrap().category, ErrorCategory::Business);
        assert_eq!(wf.activity().total_operations(), 0);
        assert!(wf.activity().last_activity().is_none());
    }

    #[tokio::test]
    async fn rejected_args_never_reach_the_plugin() {
        struct Strict;

        #[async_trait]
        impl Operation<MockApi> for Strict {
            type Args = String;
            type Raw = Value;
            type Output = Value;

            fn name(&self) -> &'static str {
                "get_top_of_book"
            }

            fn validate_args(&self, ticker: &String) -> Result<(), String> {
                if ticker.is_empty() { Err("ticker must not be empty".into()) } else { Ok(()) }
            }

            async fn plugin(&self, client: &MockApi, _args: &String) -> anyhow::Result<Value> {
                client.calls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }

            fn transform(&self, raw: Value, _args: &String) -> anyhow::Result<Value> {
                Ok(raw)
            }
        }

        let api = MockApi::returning(Value::Null);
        let wf = ready(&api);
        let out = wf.execute(&Strict, String::new(), None).await;
        assert_eq!(out.code(), Some(codes::VALIDATION_FAILED));
        assert!(out.error().unwrap().message.contains("ticker must not be empty"));
        assert_eq!(api.calls(), 0);
        assert_eq!(wf.activity().error_count(), 0);
    }

    #[tokio::test]
    async fn transform_error_is_treated_like_plugin_error() {
        let api = MockApi::returning(json!({"price": "not-a-number"}));
        let wf = ready(&api);
        let out = wf.execute(&CurrentPrice, args(), None).await;
        assert_eq!(out.code(), Some("GET_CURRENT_PRICE_FAILED"));
        assert!(out.error().unwrap().message.contains("price is not a number"));
        assert_eq!(wf.activity().error_count(), 1);
    }

    #[tokio::test]
    async fn batch_drops_invalid_items() {
        let api = MockApi::returning(json!([{"price": 1.0}, {"price": null}, {"price": 3.0}, {}]));
        let wf = ready(&api);
        let out = wf.execute_batch(&Prices, vec!["a".into()], None).await;
        assert_eq!(out, Outcome::Success(vec![1.0, 3.0]));
        assert_eq!(wf.activity().error_count(), 0);
    }

    #[tokio::test]
    async fn batch_with_nothing_valid_fails() {
        let api = MockApi::returning(json!([{"price": null}, {}]));
        let wf = ready(&api);
        let out = wf.execute_batch(&Prices, vec![], None).await;
        assert_eq!(out.code(), Some(codes::NO_VALID_DATA));
        assert_eq!(out.error().unwrap().context["received"], 2);
        assert_eq!(wf.activity().error_count(), 1);
        assert_eq!(wf.activity().total_operations(), 0);
    }

    #[tokio::test]
    async fn last_activity_only_moves_on_success() {
        let api = MockApi::returning(json!({"price": 1}));
        let wf = ready(&api);
        assert!(wf.execute(&CurrentPrice, args(), None).await.is_success());
        let first = wf.activity().last_activity().unwrap();
        assert!(wf.execute(&CurrentPrice, args(), None).await.is_success());
        let second = wf.activity().last_activity().unwrap();
        assert!(second >= first);

        wf.mark_connected("api", false);
        let _ = wf.execute(&CurrentPrice, args(), None).await;
        assert_eq!(wf.activity().last_activity(), Some(second));
    }

    #[tokio::test]
    async fn network_errors_keep_their_category() {
        struct Unreachable;

        #[async_trait]
        impl Operation<MockApi> for Unreachable {
            type Args = ();
            type Raw = ();
            type Output = ();

            fn name(&self) -> &'static str {
                "get_market_analytics"
            }

            async fn plugin(&self, _client: &MockApi, _args: &()) -> anyhow::Result<()> {
                Err(RelayError::Network("connection refused".into()).into())
            }

            fn transform(&self, _raw: (), _args: &()) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let api = MockApi::returning(Value::Null);
        let wf = ready(&api);
        let out = wf.execute(&Unreachable, (), None).await;
        assert_eq!(out.error().unwrap().category, ErrorCategory::Network);
        assert!(out.error().unwrap().is_retryable());
    }

    #[test]
    fn status_snapshot() {
        let api = MockApi::returning(Value::Null);
        let wf = ready(&api);
        let status = wf.status();
        assert!(status.is_initialized);
        assert!(status.is_connected);
        assert_eq!(status.registered_clients.len(), 1);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["registeredClients"][0]["type"], "data-source");
        assert_eq!(json["role"], "reader");
    }
}
