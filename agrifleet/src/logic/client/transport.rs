use crate::logic::client::session::{FileSessionStorage, SessionStorage};
use crate::logic::client::url_utils::{build_api_url, robot_path, with_session};
use crate::logic::config::ClientConfig;
use crate::logic::error::{SessionError, TransportError};
use crate::logic::types::TaskAssignment;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Raw access to the fleet service. Payloads are returned before adaptation.
#[async_trait]
pub trait FleetTransport: Send + Sync {
    /// Start a new session and remember it for later calls
    async fn start_session(&self) -> Result<String, SessionError>;

    async fn get_fleet_raw(&self) -> Result<Value, TransportError>;

    /// Status and sensor data for one robot, merged into a single object
    async fn get_robot_raw(&self, robot_id: &str) -> Result<Value, TransportError>;

    async fn assign_task(&self, robot_id: &str, task: &str)
        -> Result<TaskAssignment, TransportError>;
}

#[derive(Deserialize)]
struct SessionResponse {
    session_id: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct TaskPayload<'a> {
    task: &'a str,
}

/// `FleetTransport` over HTTP with a lazily started, persisted session
pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
    session: Mutex<Option<String>>,
    storage: Arc<dyn SessionStorage>,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let cached = storage.load();
        if let Some(id) = &cached {
            debug!(session_id = %id, "reusing stored session");
        }
        Ok(Self {
            client,
            base_url: base_url.into(),
            timeout,
            session: Mutex::new(cached),
            storage,
        })
    }

    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(FileSessionStorage::new(config.session_path()?));
        Ok(Self::new(
            config.base_url.clone(),
            config.request_timeout(),
            storage,
        )?)
    }

    pub async fn current_session(&self) -> Option<String> {
        self.session.lock().await.clone()
    }

    /// Drop the cached session both in memory and in storage
    pub async fn forget_session(&self) -> io::Result<()> {
        let mut guard = self.session.lock().await;
        *guard = None;
        self.storage.clear()
    }

    async fn request_session(&self) -> Result<String, SessionError> {
        let url = build_api_url(&self.base_url, "/session/start");
        debug!(%url, "starting session");
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(SessionError::Status(resp.status().as_u16()));
        }

        let body: SessionResponse = resp.json().await?;
        let session_id = body
            .session_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(SessionError::MissingSessionId)?;
        self.storage.save(&session_id)?;
        info!(session_id = %session_id, message = %body.message, "fleet session started");
        Ok(session_id)
    }

    async fn ensure_session(&self) -> Result<String, SessionError> {
        let mut guard = self.session.lock().await;
        if let Some(id) = guard.as_ref() {
            return Ok(id.clone());
        }
        let id = self.request_session().await?;
        *guard = Some(id.clone());
        Ok(id)
    }

    /// Replace a rejected session unless a concurrent call already did
    async fn renew_session(&self, rejected: &str) -> Result<String, SessionError> {
        let mut guard = self.session.lock().await;
        if let Some(id) = guard.as_ref().filter(|id| id.as_str() != rejected) {
            return Ok(id.clone());
        }
        let id = self.request_session().await?;
        *guard = Some(id.clone());
        Ok(id)
    }

    /// Session-scoped call; a 401 renews the session and retries once
    async fn call(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, TransportError> {
        let session = self.ensure_session().await?;
        match self
            .call_once(operation, method.clone(), path, body, &session)
            .await
        {
            Err(e) if e.is_unauthorized() => {
                warn!(operation, "session rejected by fleet service, starting a new one");
                let session = self.renew_session(&session).await?;
                self.call_once(operation, method, path, body, &session).await
            }
            other => other,
        }
    }

    async fn call_once(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
        session: &str,
    ) -> Result<Value, TransportError> {
        let url = with_session(&build_api_url(&self.base_url, path), session)
            .map_err(|source| TransportError::InvalidUrl { operation, source })?;
        debug!(operation, %method, %url, "sending request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(operation, e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Status {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        let text = resp
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(operation, e, self.timeout))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|source| TransportError::Decode { operation, source })
    }
}

#[async_trait]
impl FleetTransport for HttpTransport {
    async fn start_session(&self) -> Result<String, SessionError> {
        let mut guard = self.session.lock().await;
        let id = self.request_session().await?;
        *guard = Some(id.clone());
        Ok(id)
    }

    async fn get_fleet_raw(&self) -> Result<Value, TransportError> {
        self.call("fleet status", Method::GET, "/fleet/status", None)
            .await
    }

    async fn get_robot_raw(&self, robot_id: &str) -> Result<Value, TransportError> {
        let status_path = robot_path(robot_id, "status");
        let sensor_path = robot_path(robot_id, "sensor-data");
        let (status, sensors) = tokio::try_join!(
            self.call("robot status", Method::GET, &status_path, None),
            self.call("robot sensor data", Method::GET, &sensor_path, None),
        )?;
        Ok(merge_objects(status, sensors))
    }

    async fn assign_task(
        &self,
        robot_id: &str,
        task: &str,
    ) -> Result<TaskAssignment, TransportError> {
        let operation = "task assignment";
        let body = serde_json::to_value(TaskPayload { task })
            .map_err(|source| TransportError::Decode { operation, source })?;
        let reply = self
            .call(operation, Method::POST, &robot_path(robot_id, "task"), Some(&body))
            .await?;
        if reply.is_null() {
            return Ok(TaskAssignment {
                success: true,
                message: String::new(),
            });
        }
        serde_json::from_value(reply).map_err(|source| TransportError::Decode { operation, source })
    }
}

/// Shallow merge; keys from `overlay` win. Non-object inputs contribute nothing.
pub fn merge_objects(base: Value, overlay: Value) -> Value {
    let mut merged = match base {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            debug!(payload = %other, "ignoring non-object status payload");
            Map::new()
        }
    };
    match overlay {
        Value::Object(map) => merged.extend(map),
        Value::Null => {}
        other => debug!(payload = %other, "ignoring non-object sensor payload"),
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::client::session::MemorySessionStorage;
    use crate::logic::mock::{self, MockOptions};
    use serde_json::json;

    async fn transport_for(options: MockOptions) -> (HttpTransport, Arc<MemorySessionStorage>, mock::MockServer) {
        let server = mock::spawn_ephemeral(options).await;
        let storage = Arc::new(MemorySessionStorage::default());
        let transport = HttpTransport::new(
            server.base_url(),
            Duration::from_millis(500),
            storage.clone(),
        )
        .unwrap();
        (transport, storage, server)
    }

    #[test]
    fn test_merge_prefers_overlay() {
        let merged = merge_objects(
            json!({"id": "A", "battery": 10, "sensors": {"temperature": 1}}),
            json!({"sensors": {"temperature": 2}, "sensor_history": []}),
        );
        assert_eq!(
            merged,
            json!({"id": "A", "battery": 10, "sensors": {"temperature": 2}, "sensor_history": []})
        );
        assert_eq!(merge_objects(json!([1]), json!("x")), json!({}));
    }

    #[tokio::test]
    async fn test_fleet_call_starts_session_lazily() {
        let (transport, storage, server) = transport_for(MockOptions::default()).await;
        assert_eq!(transport.current_session().await, None);

        let raw = transport.get_fleet_raw().await.unwrap();
        assert_eq!(raw["robots"].as_array().map(Vec::len), Some(5));

        let session = transport.current_session().await.unwrap();
        assert_eq!(storage.load(), Some(session.clone()));
        assert!(server.fleet().has_session(&session));
    }

    #[tokio::test]
    async fn test_stale_stored_session_is_renewed_once() {
        let (_, _, server) = transport_for(MockOptions::default()).await;
        let storage = Arc::new(MemorySessionStorage::default());
        storage.save("expired-session").unwrap();
        let transport =
            HttpTransport::new(server.base_url(), Duration::from_millis(500), storage.clone()).unwrap();

        transport.get_fleet_raw().await.unwrap();

        let renewed = storage.load().unwrap();
        assert_ne!(renewed, "expired-session");
        assert_eq!(transport.current_session().await, Some(renewed));
    }

    #[tokio::test]
    async fn test_expired_session_recovers_mid_run() {
        let (transport, storage, server) = transport_for(MockOptions::default()).await;
        transport.get_fleet_raw().await.unwrap();
        let first = transport.current_session().await.unwrap();

        server.fleet().expire_sessions();
        transport.assign_task("SB003", "Irrigate Zone C").await.unwrap();

        let second = transport.current_session().await.unwrap();
        assert_ne!(first, second);
        assert_eq!(storage.load(), Some(second));
    }

    #[tokio::test]
    async fn test_forget_session_clears_storage() {
        let (transport, storage, _server) = transport_for(MockOptions::default()).await;
        transport.get_fleet_raw().await.unwrap();
        assert!(storage.load().is_some());

        transport.forget_session().await.unwrap();

        assert_eq!(transport.current_session().await, None);
        assert_eq!(storage.load(), None);
    }

    #[tokio::test]
    async fn test_robot_raw_merges_status_and_sensor_data() {
        let (transport, _, _server) = transport_for(MockOptions::default()).await;
        let raw = transport.get_robot_raw("SB003").await.unwrap();

        assert_eq!(raw["id"], "SB003");
        assert_eq!(raw["name"], "AgriBot 3");
        assert!(raw["sensors"].is_object());
        assert_eq!(raw["sensor_history"].as_array().map(Vec::len), Some(10));
        assert!(raw["maintenance_history"].is_array());
    }

    #[tokio::test]
    async fn test_unknown_robot_is_transport_error() {
        let (transport, _, _server) = transport_for(MockOptions::default()).await;
        let err = transport.get_robot_raw("NOPE").await.unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 404, .. }), "{err}");
    }

    #[tokio::test]
    async fn test_assign_task_reaches_queue() {
        let (transport, _, _server) = transport_for(MockOptions::default()).await;
        let reply = transport.assign_task("SB001", "Scout Zone E").await.unwrap();
        assert!(reply.success);
        assert!(reply.message.contains("SB001"));

        let raw = transport.get_fleet_raw().await.unwrap();
        let queue = raw["robots"][0]["tasks"]["queue"].as_array().unwrap();
        assert_eq!(queue.last(), Some(&json!("Scout Zone E")));
    }

    #[tokio::test]
    async fn test_session_endpoint_failure_is_session_error() {
        let (_, _, server) = transport_for(MockOptions::default()).await;
        let transport = HttpTransport::new(
            format!("{}/missing", server.base_url()),
            Duration::from_millis(500),
            Arc::new(MemorySessionStorage::default()),
        )
        .unwrap();

        let err = transport.get_fleet_raw().await.unwrap_err();
        assert!(
            matches!(err, TransportError::Session(SessionError::Status(404))),
            "{err}"
        );
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let (transport, _, _server) = transport_for(MockOptions {
            latency: Duration::from_secs(2),
            ..Default::default()
        })
        .await;

        let err = transport.get_fleet_raw().await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { operation: "fleet status", .. }), "{err}");
    }
}
