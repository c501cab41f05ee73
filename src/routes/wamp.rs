//! WAMP publish route
//!
//! Publishes every entry as `[method, args, meta]` the moment it is logged.
//! Nothing is published until output is enabled; enabling it later sends
//! the request meta and replays what was logged so far.

use super::wamp_crate::WampCrate;
use super::render_section;
use crate::core::{
    BootstrapContext, ConfigChange, ConsoleError, Environment, EventKind, LogEntry, Meta, Method,
    OutputContext, RenderScope, ReplayContext, Result, Route, RouteBase, RouteConfig, Subscription,
    Value, DEFAULT_CHANNEL,
};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde_json::{json, Map, Value as Json};
use std::sync::Arc;

pub const DEFAULT_TOPIC: &str = "bdk.debug";
const NOT_CONNECTED: &str = "WAMP publisher not connected";

/// A published `(topic, message)` pair
pub type WampMessage = (String, Json);

/// Client side of a WAMP router session
pub trait WampPublisher: Send {
    fn connected(&self) -> bool;

    fn publish(&self, topic: &str, message: Json) -> Result<()>;
}

/// Keeps published messages in memory; clones share the buffer
#[derive(Debug, Clone)]
pub struct MemoryPublisher {
    connected: bool,
    messages: Arc<Mutex<Vec<WampMessage>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self {
            connected: true,
            messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A publisher whose session is down
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::new()
        }
    }

    pub fn messages(&self) -> Vec<WampMessage> {
        self.messages.lock().clone()
    }

    /// Published messages without their topic
    pub fn payloads(&self) -> Vec<Json> {
        self.messages.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl Default for MemoryPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl WampPublisher for MemoryPublisher {
    fn connected(&self) -> bool {
        self.connected
    }

    fn publish(&self, topic: &str, message: Json) -> Result<()> {
        self.messages.lock().push((topic.to_string(), message));
        Ok(())
    }
}

/// Hands messages to another thread (for example the one owning the socket)
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: Sender<WampMessage>,
}

impl ChannelPublisher {
    pub fn new(sender: Sender<WampMessage>) -> Self {
        Self { sender }
    }

    pub fn unbounded() -> (Self, Receiver<WampMessage>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self::new(sender), receiver)
    }

    pub fn bounded(capacity: usize) -> (Self, Receiver<WampMessage>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self::new(sender), receiver)
    }
}

impl WampPublisher for ChannelPublisher {
    fn connected(&self) -> bool {
        true
    }

    fn publish(&self, topic: &str, message: Json) -> Result<()> {
        self.sender
            .send((topic.to_string(), message))
            .map_err(|_| ConsoleError::transport("wamp", "receiver disconnected"))
    }
}

#[derive(Debug, Clone)]
pub struct WampConfig {
    pub route: RouteConfig,
    pub topic: String,
}

impl Default for WampConfig {
    fn default() -> Self {
        Self {
            route: RouteConfig::default(),
            topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

impl WampConfig {
    #[must_use]
    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.route = route;
        self
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }
}

pub struct WampRoute {
    base: RouteBase,
    topic: String,
    publisher: Box<dyn WampPublisher>,
    crater: WampCrate,
    connected: bool,
    request_id: String,
    meta_published: bool,
}

impl WampRoute {
    pub fn new<P: WampPublisher + 'static>(publisher: P, config: WampConfig) -> Self {
        let connected = publisher.connected();
        Self {
            base: RouteBase::new("wamp", &config.route),
            topic: config.topic,
            publisher: Box::new(publisher),
            crater: WampCrate::new(),
            connected,
            request_id: String::new(),
            meta_published: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&self, method: &str, args: Vec<Json>, meta: Map<String, Json>) -> Result<()> {
        self.publisher
            .publish(&self.topic, json!([method, args, meta]))
    }

    fn base_meta(&self) -> Map<String, Json> {
        let mut meta = Map::new();
        meta.insert("requestId".to_string(), json!(self.request_id));
        meta
    }

    fn publish_meta(&mut self, env: &dyn Environment) -> Result<()> {
        self.request_id = env.request_id().to_string();
        let mut meta = self.base_meta();
        meta.insert("debugVersion".to_string(), json!(env!("CARGO_PKG_VERSION")));
        meta.insert("interface".to_string(), json!(env.interface().as_str()));
        meta.insert("requestMethod".to_string(), json!(env.request_method()));
        meta.insert("requestUri".to_string(), json!(env.request_uri()));
        let server = json!(env.redacted_server_params());
        self.publish("meta", vec![server], meta)?;
        self.meta_published = true;
        tracing::debug!(route = self.name(), request_id = %self.request_id, "meta published");
        Ok(())
    }
}

fn meta_json(meta: &Meta) -> Map<String, Json> {
    meta.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}

impl Route for WampRoute {
    fn base(&self) -> &RouteBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RouteBase {
        &mut self.base
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        if !self.connected {
            return Vec::new();
        }
        vec![
            Subscription::new(EventKind::Bootstrap, 0),
            Subscription::new(EventKind::Config, 0),
            Subscription::new(EventKind::Log, 0),
            Subscription::output(),
        ]
    }

    fn attach(&mut self) -> Vec<LogEntry> {
        if self.connected {
            return Vec::new();
        }
        tracing::warn!(route = self.name(), "publisher not connected, route disabled");
        vec![LogEntry::new(DEFAULT_CHANNEL, Method::Alert, vec![Value::from(NOT_CONNECTED)])
            .with_meta(Meta::new().with("level", "error"))]
    }

    fn on_bootstrap(&mut self, ctx: &BootstrapContext<'_>) -> Result<()> {
        self.request_id = ctx.env.request_id().to_string();
        if ctx.output && !self.meta_published {
            self.publish_meta(ctx.env)?;
        }
        Ok(())
    }

    fn on_config(&mut self, change: &ConfigChange, ctx: &ReplayContext<'_>) -> Result<()> {
        if change.output != Some(true) || self.meta_published {
            return Ok(());
        }
        self.publish_meta(ctx.env)?;
        let snapshot = ctx.snapshot;
        render_section(self, snapshot.alerts().iter(), &ctx.scope);
        render_section(self, snapshot.summary_entries(), &ctx.scope);
        render_section(self, snapshot.log().iter(), &ctx.scope);
        Ok(())
    }

    fn on_log(&mut self, entry: &LogEntry, scope: &RenderScope<'_>) -> Result<()> {
        if self.meta_published {
            self.render_entry(entry, scope);
        }
        Ok(())
    }

    fn process_log_entries(&mut self, ctx: &mut OutputContext<'_>) -> Result<()> {
        if !self.meta_published {
            return Ok(());
        }
        let mut meta = self.base_meta();
        if let Some(code) = ctx.env.response_code() {
            meta.insert("responseCode".to_string(), json!(code));
        }
        self.publish("endOutput", Vec::new(), meta)
    }

    fn process_log_entry(&mut self, entry: &LogEntry) -> Result<Option<String>> {
        let crated = self.crater.crate_entry(entry);
        for definition in crated.class_definitions {
            self.publish(
                "meta",
                vec![json!({ "classDefinition": definition })],
                self.base_meta(),
            )?;
        }
        let mut meta = meta_json(&entry.meta);
        meta.insert("requestId".to_string(), json!(self.request_id));
        meta.insert("channel".to_string(), json!(entry.channel_name()));
        if !crated.found_files.is_empty() {
            meta.insert("foundFiles".to_string(), json!(crated.found_files));
        }
        self.publish(entry.method.as_str(), crated.args, meta)?;
        Ok(None)
    }
}
