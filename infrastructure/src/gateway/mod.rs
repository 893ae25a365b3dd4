//! RPC + event fan-out layer over one or more transports. Owns app
//! registration, client authentication, built-in/custom method dispatch, and
//! subscription fan-out of `StreamEvent`s through `ClientEventBuffer`.

pub mod auth;
pub mod client_event_buffer;
pub mod error;

pub use auth::{AuthMode, AuthResult};
pub use client_event_buffer::{ClientEventBuffer, ClientSink, OverflowPolicy};
pub use error::{GatewayError, GatewayErrorCode};

use crate::rate_limiter::RateLimiter;
use async_trait::async_trait;
use futures::future::BoxFuture;
use relaykit_application::ports::delivery::{DeliveryError, DeliverySink};
use relaykit_application::{App, AppError, ContentPipeline, ContentPipelineConfig};
use relaykit_domain::{ContentBlock, ContentPolicy, MediaSource, Message, Role, StreamEvent};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::Mutex;

/// Parsed `[app:]name` session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    pub app: String,
    pub name: String,
}

pub fn parse_session_key(raw: &str, default_app: &str) -> SessionKey {
    match raw.split_once(':') {
        Some((app, name)) => SessionKey { app: app.to_string(), name: name.to_string() },
        None => SessionKey { app: default_app.to_string(), name: raw.to_string() },
    }
}

struct ClientState {
    authenticated: bool,
    user: Option<String>,
    metadata: Option<serde_json::Value>,
    subscriptions: HashSet<String>,
    buffer: Arc<ClientEventBuffer<serde_json::Value>>,
}

type CustomHandler =
    Arc<dyn Fn(serde_json::Value, Arc<App>) -> BoxFuture<'static, Result<serde_json::Value, GatewayError>> + Send + Sync>;

struct CustomMethod {
    schema: Option<serde_json::Value>,
    handler: CustomHandler,
}

pub struct Gateway {
    apps: HashMap<String, Arc<App>>,
    default_app: String,
    auth: AuthMode,
    clients: Mutex<HashMap<String, ClientState>>,
    custom_methods: HashMap<String, CustomMethod>,
    buffer_max: usize,
    overflow_policy: OverflowPolicy,
    rate_limit: Option<(u32, u32)>,
    /// One content pipeline per session, built the first time `resolve_session`
    /// sees that session's id.
    pipelines: Mutex<HashMap<String, ContentPipeline>>,
    /// Populated right after construction (see `set_self_ref`) so a session's
    /// `GatewayDeliverySink` and event-forwarding task can hold a `Weak`
    /// back-reference without `dispatch`/`resolve_session` needing `Arc<Self>`
    /// receivers.
    self_ref: OnceLock<Weak<Gateway>>,
}

impl Gateway {
    pub fn new(default_app: impl Into<String>, default_app_handle: Arc<App>) -> Self {
        let default_app = default_app.into();
        let mut apps = HashMap::new();
        apps.insert(default_app.clone(), default_app_handle);
        Self {
            apps,
            default_app,
            auth: AuthMode::None,
            clients: Mutex::new(HashMap::new()),
            custom_methods: HashMap::new(),
            buffer_max: 256,
            overflow_policy: OverflowPolicy::DropOldest,
            rate_limit: None,
            pipelines: Mutex::new(HashMap::new()),
            self_ref: OnceLock::new(),
        }
    }

    /// Lets the gateway obtain an `Arc<Self>` for wiring a session's delivery
    /// sink without changing any existing method's receiver. Call once, right
    /// after wrapping the gateway in an `Arc`.
    pub fn set_self_ref(&self, weak: Weak<Gateway>) {
        let _ = self.self_ref.set(weak);
    }

    fn self_arc(&self) -> Option<Arc<Gateway>> {
        self.self_ref.get().and_then(Weak::upgrade)
    }

    pub fn with_auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_buffer_limits(mut self, max: usize, policy: OverflowPolicy) -> Self {
        self.buffer_max = max;
        self.overflow_policy = policy;
        self
    }

    /// Every connecting client gets its own `per_minute`/`per_day` budget on
    /// the `send` method once this is set.
    pub fn with_rate_limit(mut self, per_minute: u32, per_day: u32) -> Self {
        self.rate_limit = Some((per_minute, per_day));
        self
    }

    pub fn register_app(&mut self, app_id: impl Into<String>, app: Arc<App>) {
        self.apps.insert(app_id.into(), app);
    }

    pub fn register_custom_method(
        &mut self,
        namespace: &str,
        name: &str,
        schema: Option<serde_json::Value>,
        handler: impl Fn(serde_json::Value, Arc<App>) -> BoxFuture<'static, Result<serde_json::Value, GatewayError>>
            + Send
            + Sync
            + 'static,
    ) {
        self.custom_methods.insert(format!("{namespace}:{name}"), CustomMethod { schema, handler: Arc::new(handler) });
    }

    fn resolve_app(&self, app_id: &str) -> Result<Arc<App>, GatewayError> {
        self.apps.get(app_id).cloned().ok_or_else(|| GatewayError::internal(format!("unknown app: {app_id}")))
    }

    fn session_key(&self, raw: &str) -> SessionKey {
        parse_session_key(raw, &self.default_app)
    }

    /// Register a connecting client and run the `connect` frame's token
    /// through the configured `AuthMode`. `client_id` is the one the `connect`
    /// frame names, which replaces any server-assigned id.
    pub async fn connect(
        &self,
        client_id: &str,
        token: Option<&str>,
        sink: Arc<dyn ClientSink<serde_json::Value>>,
    ) -> Result<(), GatewayError> {
        let auth = self
            .auth
            .authenticate(token)
            .map_err(|_| GatewayError::auth_failed("invalid or missing token"))?;
        let buffer = Arc::new(ClientEventBuffer::new(sink, self.buffer_max, self.overflow_policy));
        self.clients.lock().await.insert(
            client_id.to_string(),
            ClientState {
                authenticated: true,
                user: auth.user,
                metadata: auth.metadata,
                subscriptions: HashSet::new(),
                buffer,
            },
        );
        Ok(())
    }

    pub async fn disconnect(&self, client_id: &str) {
        self.clients.lock().await.remove(client_id);
    }

    /// Dispatch one RPC call. `method` is either a built-in name or a
    /// `namespace:name` custom method.
    pub async fn dispatch(
        &self,
        client_id: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        {
            let clients = self.clients.lock().await;
            match clients.get(client_id) {
                Some(state) if state.authenticated => {}
                _ => return Err(GatewayError::unauthorized("client is not authenticated")),
            }
        }

        if let Some(custom) = self.custom_methods.get(method) {
            if let Some(schema) = &custom.schema {
                validate_against_schema(&params, schema)?;
            }
            let app = self.resolve_app(&self.default_app)?;
            return (custom.handler)(params, app).await;
        }

        match method {
            "send" => self.handle_send(params).await,
            "abort" => self.handle_abort(params).await,
            "status" => self.handle_status(params).await,
            "history" => self.handle_history(params).await,
            "reset" => self.handle_reset(params).await,
            "close" => self.handle_close(params).await,
            "apps" => Ok(self.handle_apps()),
            "sessions" => self.handle_sessions().await,
            "subscribe" => self.handle_subscribe(client_id, params).await,
            "unsubscribe" => self.handle_unsubscribe(client_id, params).await,
            other => Err(GatewayError::unknown_method(other)),
        }
    }

    fn require_str<'a>(params: &'a serde_json::Value, key: &str) -> Result<&'a str, GatewayError> {
        params
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::invalid_params(format!("missing required string field: {key}")))
    }

    async fn resolve_session(&self, session_id: &str) -> Result<(Arc<App>, Arc<relaykit_application::SessionHandle>), GatewayError> {
        let key = self.session_key(session_id);
        let app = self.resolve_app(&key.app)?;
        let handle = app.session(key.name).await.map_err(map_app_error)?;
        self.ensure_session_wired(session_id, &handle).await;
        Ok((app, handle))
    }

    /// The first time a session id is seen, build its `ContentPipeline`
    /// (carrying the gateway-wide rate limit, if configured), attach it to
    /// the session handle, and spawn the one task that drains the handle's
    /// event buffer into `publish_event`. A no-op on every later call for the
    /// same session.
    async fn ensure_session_wired(&self, session_id: &str, handle: &Arc<relaykit_application::SessionHandle>) {
        {
            let pipelines = self.pipelines.lock().await;
            if pipelines.contains_key(session_id) {
                return;
            }
        }
        let Some(gateway) = self.self_arc() else {
            // Not yet wired up via `set_self_ref` (e.g. a unit test building a
            // bare `Gateway`): fall back to no delivery pipeline/forwarding.
            return;
        };

        let sink = Arc::new(GatewayDeliverySink { gateway: Arc::downgrade(&gateway), session_id: session_id.to_string() });
        let rate_limiter: Option<Arc<dyn relaykit_application::RateLimiter>> = self
            .rate_limit
            .map(|(per_minute, per_day)| Arc::new(RateLimiter::new(per_minute, per_day)) as Arc<dyn relaykit_application::RateLimiter>);
        let pipeline = ContentPipeline::new(
            ContentPolicy::Full,
            sink,
            ContentPipelineConfig { rate_limiter, ..Default::default() },
        );

        let mut pipelines = self.pipelines.lock().await;
        if pipelines.contains_key(session_id) {
            return;
        }
        pipelines.insert(session_id.to_string(), pipeline.clone());
        drop(pipelines);
        handle.set_content_pipeline(pipeline);

        let events = handle.events();
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            let mut subscriber = events.subscribe();
            loop {
                match subscriber.next().await {
                    Ok(Some(event)) => gateway.publish_event(&session_id, &event).await,
                    Ok(None) | Err(_) => break,
                }
            }
        });
    }

    async fn handle_send(&self, params: serde_json::Value) -> Result<serde_json::Value, GatewayError> {
        let session_id = Self::require_str(&params, "sessionId")?;
        let text = Self::require_str(&params, "message")?;
        let (app, handle) = self.resolve_session(session_id).await?;

        if let Some(pipeline) = handle.content_pipeline() {
            if let Some(decision) = pipeline.check_rate_limit().await {
                if !decision.allowed {
                    if let Some(reply) = decision.reply {
                        pipeline.offer(Message::new(Role::Assistant, vec![ContentBlock::text(reply)])).await;
                    }
                    return Ok(serde_json::json!({"accepted": false, "throttled": true}));
                }
            }
        }

        let mut content = vec![ContentBlock::text(text)];
        if let Some(attachments) = params.get("attachments").and_then(|v| v.as_array()) {
            for attachment in attachments {
                if let Some(block) = attachment_to_block(attachment) {
                    content.push(block);
                }
            }
        }
        let message = Message::new(Role::User, content);
        let message_id = uuid::Uuid::new_v4().to_string();
        app.engine().send(handle, message).await.map_err(|e| GatewayError::internal(e.to_string()))?;
        Ok(serde_json::json!({"messageId": message_id, "accepted": true}))
    }

    async fn handle_abort(&self, params: serde_json::Value) -> Result<serde_json::Value, GatewayError> {
        let session_id = Self::require_str(&params, "sessionId")?;
        let (app, handle) = self.resolve_session(session_id).await?;
        app.engine().abort(&handle, "client requested abort");
        Ok(serde_json::json!({"ok": true}))
    }

    async fn handle_status(&self, params: serde_json::Value) -> Result<serde_json::Value, GatewayError> {
        if let Some(session_id) = params.get("sessionId").and_then(|v| v.as_str()) {
            let (_, handle) = self.resolve_session(session_id).await?;
            let status = handle.status().await;
            let usage = handle.cumulative_usage().await;
            return Ok(serde_json::json!({
                "sessionId": session_id,
                "status": format!("{status:?}"),
                "tick": handle.tick().await,
                "usage": usage,
            }));
        }
        let client_count = self.clients.lock().await.len();
        Ok(serde_json::json!({"apps": self.apps.len(), "clients": client_count}))
    }

    async fn handle_history(&self, params: serde_json::Value) -> Result<serde_json::Value, GatewayError> {
        let session_id = Self::require_str(&params, "sessionId")?;
        let (_, handle) = self.resolve_session(session_id).await?;
        let timeline = handle.timeline().await;
        let before = params.get("before").and_then(|v| v.as_u64()).map(|n| n as usize).unwrap_or(timeline.len());
        let limit = params.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize).unwrap_or(50);
        let start = before.saturating_sub(limit);
        let page: Vec<_> = timeline.into_iter().skip(start).take(before - start).collect();
        Ok(serde_json::json!({"entries": page}))
    }

    async fn handle_reset(&self, params: serde_json::Value) -> Result<serde_json::Value, GatewayError> {
        let session_id = Self::require_str(&params, "sessionId")?;
        let key = self.session_key(session_id);
        let app = self.resolve_app(&key.app)?;
        let _ = app.close(&key.name).await;
        Ok(serde_json::json!({"ok": true}))
    }

    async fn handle_close(&self, params: serde_json::Value) -> Result<serde_json::Value, GatewayError> {
        let session_id = Self::require_str(&params, "sessionId")?;
        let key = self.session_key(session_id);
        let app = self.resolve_app(&key.app)?;
        app.close(&key.name).await.map_err(map_app_error)?;
        Ok(serde_json::json!({"ok": true}))
    }

    fn handle_apps(&self) -> serde_json::Value {
        let apps: Vec<_> = self
            .apps
            .keys()
            .map(|id| serde_json::json!({"id": id, "name": id, "isDefault": id == &self.default_app}))
            .collect();
        serde_json::json!({"apps": apps})
    }

    async fn handle_sessions(&self) -> Result<serde_json::Value, GatewayError> {
        let mut sessions = Vec::new();
        for (app_id, app) in &self.apps {
            for id in app.list_ids().await {
                sessions.push(serde_json::json!({"app": app_id, "name": id, "hibernated": false}));
            }
            for id in app.hibernated_sessions().await {
                sessions.push(serde_json::json!({"app": app_id, "name": id, "hibernated": true}));
            }
        }
        Ok(serde_json::json!({"sessions": sessions}))
    }

    async fn handle_subscribe(&self, client_id: &str, params: serde_json::Value) -> Result<serde_json::Value, GatewayError> {
        let session_id = Self::require_str(&params, "sessionId")?;
        let mut clients = self.clients.lock().await;
        let state = clients.get_mut(client_id).ok_or_else(|| GatewayError::unauthorized("unknown client"))?;
        state.subscriptions.insert(session_id.to_string());
        Ok(serde_json::json!({"ok": true}))
    }

    async fn handle_unsubscribe(&self, client_id: &str, params: serde_json::Value) -> Result<serde_json::Value, GatewayError> {
        let session_id = Self::require_str(&params, "sessionId")?;
        let mut clients = self.clients.lock().await;
        let state = clients.get_mut(client_id).ok_or_else(|| GatewayError::unauthorized("unknown client"))?;
        state.subscriptions.remove(session_id);
        Ok(serde_json::json!({"ok": true}))
    }

    /// Wrap one session event and fan it out to every authenticated client
    /// subscribed to `session_id`.
    pub async fn publish_event(&self, session_id: &str, event: &StreamEvent) {
        let payload = serde_json::json!({
            "type": "event",
            "event": event.type_name(),
            "sessionId": session_id,
            "data": event,
        });
        self.broadcast(session_id, payload).await;
    }

    /// Wrap one content-pipeline delivery batch and fan it out the same way
    /// `publish_event` does, for transports that want the filtered/batched
    /// assistant reply rather than the raw tick-by-tick event stream.
    async fn publish_delivery(&self, session_id: &str, messages: &[Message], is_complete: bool) {
        let payload = serde_json::json!({
            "type": "delivery",
            "sessionId": session_id,
            "messages": messages,
            "isComplete": is_complete,
        });
        self.broadcast(session_id, payload).await;
    }

    async fn broadcast(&self, session_id: &str, payload: serde_json::Value) {
        let clients = self.clients.lock().await;
        for state in clients.values() {
            if state.authenticated && state.subscriptions.contains(session_id) {
                state.buffer.push(payload.clone()).await;
            }
        }
    }
}

/// Routes a session's `ContentPipeline` deliveries back through the
/// gateway's own client-subscription fan-out, the same path `publish_event`
/// uses for raw stream events.
struct GatewayDeliverySink {
    gateway: Weak<Gateway>,
    session_id: String,
}

#[async_trait]
impl DeliverySink for GatewayDeliverySink {
    async fn deliver(&self, messages: Vec<Message>, is_complete: bool) -> Result<(), DeliveryError> {
        let Some(gateway) = self.gateway.upgrade() else {
            return Err(DeliveryError("gateway has shut down".into()));
        };
        gateway.publish_delivery(&self.session_id, &messages, is_complete).await;
        Ok(())
    }
}

fn map_app_error(err: AppError) -> GatewayError {
    match err {
        AppError::NotFound(id) => GatewayError::session_not_found(&id),
        other => GatewayError::internal(other.to_string()),
    }
}

fn attachment_to_block(attachment: &serde_json::Value) -> Option<ContentBlock> {
    let media_type = attachment.get("mediaType").and_then(|v| v.as_str())?.to_string();
    if let Some(url) = attachment.get("url").and_then(|v| v.as_str()) {
        return Some(ContentBlock::Image { source: MediaSource::Url { media_type: Some(media_type), url: url.to_string() } });
    }
    if let Some(data) = attachment.get("data").and_then(|v| v.as_str()) {
        return Some(ContentBlock::Image { source: MediaSource::Base64 { media_type, data: data.to_string() } });
    }
    None
}

/// Minimal required-field check, mirroring `DefaultToolValidator`'s flat
/// object-schema validation rather than a full JSON-Schema implementation.
fn validate_against_schema(params: &serde_json::Value, schema: &serde_json::Value) -> Result<(), GatewayError> {
    let Some(required) = schema.get("required").and_then(|v| v.as_array()) else { return Ok(()) };
    let obj = params.as_object().ok_or_else(|| GatewayError::invalid_params("params must be an object"))?;
    for field in required {
        let Some(name) = field.as_str() else { continue };
        if !obj.contains_key(name) {
            return Err(GatewayError::invalid_params(format!("missing required field: {name}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::EchoAdapter;
    use crate::renderer::SimpleRenderer;
    use crate::tools::registry::ToolRegistry;
    use relaykit_application::SessionEngine;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    struct TestClientSink {
        sent: AsyncMutex<Vec<serde_json::Value>>,
        connected: AtomicBool,
    }

    impl TestClientSink {
        fn new() -> Self {
            Self { sent: AsyncMutex::new(Vec::new()), connected: AtomicBool::new(true) }
        }
    }

    #[async_trait]
    impl ClientSink<serde_json::Value> for TestClientSink {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
        async fn send(&self, event: serde_json::Value) {
            self.sent.lock().await.push(event);
        }
        fn close(&self, _code: u16, _reason: &str) {
            self.connected.store(false, Ordering::SeqCst);
        }
    }

    fn test_app() -> Arc<App> {
        let adapter = Arc::new(EchoAdapter::new());
        let renderer = Arc::new(SimpleRenderer::new());
        let tool_runner = Arc::new(ToolRegistry::new());
        Arc::new(App::new(SessionEngine::new(adapter, tool_runner, renderer)))
    }

    /// Scenario C: a denied send never surfaces as an RPC error — the caller
    /// gets a non-error "throttled" ack instead. With no `on_limited` reply
    /// configured, the denial is silently dropped rather than delivered.
    #[tokio::test]
    async fn rate_limited_send_is_a_throttled_ack_not_an_rpc_error() {
        let gateway = Arc::new(Gateway::new("default", test_app()).with_rate_limit(1, 1000));
        gateway.set_self_ref(Arc::downgrade(&gateway));

        let sink = Arc::new(TestClientSink::new());
        gateway.connect("client1", None, sink).await.unwrap();

        let first = gateway
            .dispatch("client1", "send", serde_json::json!({"sessionId": "s1", "message": "hi"}))
            .await
            .unwrap();
        assert_eq!(first["accepted"], serde_json::json!(true));

        let second = gateway
            .dispatch("client1", "send", serde_json::json!({"sessionId": "s1", "message": "hi again"}))
            .await
            .unwrap();
        assert_eq!(second["accepted"], serde_json::json!(false));
        assert_eq!(second["throttled"], serde_json::json!(true));
    }

    #[test]
    fn parses_bare_name_against_default_app() {
        let key = parse_session_key("alice", "default");
        assert_eq!(key, SessionKey { app: "default".into(), name: "alice".into() });
    }

    #[test]
    fn parses_app_prefixed_name_with_embedded_colon() {
        let key = parse_session_key("billing:alice:thread-1", "default");
        assert_eq!(key, SessionKey { app: "billing".into(), name: "alice:thread-1".into() });
    }

    #[test]
    fn schema_validation_rejects_missing_required_field() {
        let schema = serde_json::json!({"required": ["id"]});
        assert!(validate_against_schema(&serde_json::json!({}), &schema).is_err());
        assert!(validate_against_schema(&serde_json::json!({"id": 1}), &schema).is_ok());
    }
}
