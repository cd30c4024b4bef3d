//! The Message Bus: pub/sub with literal-or-regex pattern subscriptions,
//! `from`-scoped routing rules, and a bounded FIFO log.
//!
//! Event-emitter/listener patterns from the source become this explicit
//! fan-out-to-subscribers structure: a list of `(pattern, handler)` pairs
//! with its own dispatch loop inside `publish`, rather than agents calling
//! `.on(...)` against each other directly.

use crate::error::OrchestratorError;
use crate::model::{AgentMessage, MessageType, BROADCAST};
use async_trait::async_trait;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

/// A subscription pattern. A literal tag matches `action`, `from`, or `to`
/// verbatim (plus the three synthesized channels `message`,
/// `message:<type>`, and `message:<from>:<to>`); a regex matches the same
/// three fields.
#[derive(Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn literal(tag: impl Into<String>) -> Self {
        Self::Literal(tag.into())
    }

    pub fn regex(expr: &str) -> Result<Self, regex::Error> {
        Ok(Self::Regex(Regex::new(expr)?))
    }

    fn matches(&self, msg: &AgentMessage) -> bool {
        match self {
            Pattern::Literal(tag) => {
                if tag == "message" {
                    return true;
                }
                if let Some(rest) = tag.strip_prefix("message:") {
                    if let Some((from, to)) = rest.split_once(':') {
                        return msg.from == from && msg.to == to;
                    }
                    return message_type_tag(msg.message_type) == rest;
                }
                tag == &msg.action || tag == &msg.from || tag == &msg.to
            }
            Pattern::Regex(re) => re.is_match(&msg.action) || re.is_match(&msg.from) || re.is_match(&msg.to),
        }
    }
}

fn message_type_tag(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Request => "request",
        MessageType::Response => "response",
        MessageType::Status => "status",
        MessageType::Error => "error",
    }
}

/// Handler invoked when a published message matches a subscription.
/// Handler errors are logged but never propagated into `publish`.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, msg: &AgentMessage) -> Result<(), OrchestratorError>;
}

#[async_trait]
impl<F> MessageHandler for F
where
    F: Fn(&AgentMessage) -> Result<(), OrchestratorError> + Send + Sync,
{
    async fn handle(&self, msg: &AgentMessage) -> Result<(), OrchestratorError> {
        self(msg)
    }
}

struct Subscription {
    id: u64,
    pattern: Pattern,
    handler: std::sync::Arc<dyn MessageHandler>,
}

/// `{ to?, action?, type? }` — an optional-field filter against a published
/// message's own fields (missing = wildcard). A matching route delivers an
/// additional copy of the message as though addressed to `to` (or to every
/// agent, if `to` is absent or `"*"`), on top of the message's normal
/// pub/sub delivery.
#[derive(Clone)]
pub struct RoutingRule {
    pub to: Option<String>,
    pub action: Option<String>,
    pub message_type: Option<MessageType>,
}

impl RoutingRule {
    fn matches(&self, msg: &AgentMessage) -> bool {
        let to_ok = self.to.as_deref().map(|to| to == msg.to).unwrap_or(true);
        let action_ok = self.action.as_deref().map(|a| a == msg.action).unwrap_or(true);
        let type_ok = self.message_type.map(|t| t == msg.message_type).unwrap_or(true);
        to_ok && action_ok && type_ok
    }
}

/// Conjunctive filter for `log(filter)`.
#[derive(Clone, Default)]
pub struct LogFilter {
    pub from: Option<String>,
    pub to: Option<String>,
    pub action: Option<String>,
    pub message_type: Option<MessageType>,
}

impl LogFilter {
    fn accepts(&self, msg: &AgentMessage) -> bool {
        self.from.as_deref().map(|f| f == msg.from).unwrap_or(true)
            && self.to.as_deref().map(|t| t == msg.to).unwrap_or(true)
            && self.action.as_deref().map(|a| a == msg.action).unwrap_or(true)
            && self.message_type.map(|t| t == msg.message_type).unwrap_or(true)
    }
}

struct BusState {
    subscriptions: Vec<Subscription>,
    routes: HashMap<String, Vec<RoutingRule>>,
    log: VecDeque<AgentMessage>,
}

/// Pub/sub message bus with a bounded, FIFO-evicted log.
pub struct MessageBus {
    state: Mutex<BusState>,
    next_handler_id: AtomicU64,
    max_log_size: usize,
    dropped_messages: AtomicU64,
}

impl MessageBus {
    pub fn new(max_log_size: usize) -> Self {
        Self {
            state: Mutex::new(BusState {
                subscriptions: Vec::new(),
                routes: HashMap::new(),
                log: VecDeque::new(),
            }),
            next_handler_id: AtomicU64::new(1),
            max_log_size,
            dropped_messages: AtomicU64::new(0),
        }
    }

    pub fn dropped_message_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    pub fn log_len(&self) -> usize {
        self.state.lock().unwrap().log.len()
    }

    /// Appends to the bounded log, then notifies matching subscribers in
    /// registration order, then applies `from`-scoped routing rules. The
    /// bus itself never suspends between append and notification; only an
    /// async handler's own body may suspend.
    pub async fn publish(&self, msg: AgentMessage) {
        let (matching, routed): (Vec<std::sync::Arc<dyn MessageHandler>>, Vec<AgentMessage>) = {
            let mut state = self.state.lock().unwrap();

            if state.log.len() >= self.max_log_size {
                state.log.pop_front();
            }
            state.log.push_back(msg.clone());

            let matching: Vec<_> = state
                .subscriptions
                .iter()
                .filter(|sub| sub.pattern.matches(&msg))
                .map(|sub| sub.handler.clone())
                .collect();

            let routed = state
                .routes
                .get(&msg.from)
                .map(|rules| {
                    rules
                        .iter()
                        .filter(|rule| rule.matches(&msg))
                        .map(|rule| {
                            let to = rule.to.clone().unwrap_or_else(|| BROADCAST.to_string());
                            AgentMessage {
                                id: uuid::Uuid::new_v4(),
                                to,
                                ..msg.clone()
                            }
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            (matching, routed)
        };

        for handler in matching {
            if let Err(err) = handler.handle(&msg).await {
                warn!(error = %err, "message handler failed");
            }
        }

        for route_msg in routed {
            debug!(from = %route_msg.from, to = %route_msg.to, "routing rule fired");
            // Routed deliveries are logged as part of the original publish
            // and do not themselves trigger further routing rules, avoiding
            // unbounded routing cascades.
            let state = self.state.lock().unwrap();
            let matching: Vec<_> = state
                .subscriptions
                .iter()
                .filter(|sub| sub.pattern.matches(&route_msg))
                .map(|sub| sub.handler.clone())
                .collect();
            drop(state);
            for handler in matching {
                if let Err(err) = handler.handle(&route_msg).await {
                    warn!(error = %err, "routed message handler failed");
                }
            }
        }
    }

    pub fn subscribe(&self, pattern: Pattern, handler: std::sync::Arc<dyn MessageHandler>) -> u64 {
        let id = self.next_handler_id.fetch_add(1, Ordering::Relaxed);
        self.state.lock().unwrap().subscriptions.push(Subscription {
            id,
            pattern,
            handler,
        });
        id
    }

    /// Idempotent: removing an id that is not (or no longer) registered is
    /// not an error.
    pub fn unsubscribe(&self, handler_id: u64) {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .retain(|sub| sub.id != handler_id);
    }

    pub fn add_route(&self, from_agent: impl Into<String>, rule: RoutingRule) {
        self.state
            .lock()
            .unwrap()
            .routes
            .entry(from_agent.into())
            .or_default()
            .push(rule);
    }

    pub fn log(&self, filter: LogFilter) -> Vec<AgentMessage> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|msg| filter.accepts(msg))
            .cloned()
            .collect()
    }

    /// Delivery target used by the orchestrator when a message addresses
    /// neither a live agent nor `"orchestrator"`: dropped silently, with
    /// the dropped-message counter incremented.
    pub fn record_dropped(&self) {
        self.dropped_messages.fetch_add(1, Ordering::Relaxed);
    }
}
