//! Tracing utilities for asserting on engine behavior.
//!
//! [`SpanCaptureLayer`] records the spans and events emitted by the restbox
//! crates so tests can check which path a query took (hit, miss, join)
//! without inspecting internals.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::Dispatch;
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

const TARGET_PREFIX: &str = "restbox";

/// Captured span information.
#[derive(Debug, Clone)]
pub struct CapturedSpan {
    /// Unique span ID
    pub id: u64,
    /// The span name (e.g., "query")
    pub name: String,
    /// Captured field values as strings
    pub fields: Vec<(String, String)>,
}

impl CapturedSpan {
    /// Returns the value recorded for `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Captured event information.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    /// Name of the innermost span the event was emitted in.
    pub span: Option<String>,
    /// The event message.
    pub message: String,
    /// Other fields as strings.
    pub fields: Vec<(String, String)>,
}

#[derive(Default)]
struct Captured {
    spans: Vec<CapturedSpan>,
    events: Vec<CapturedEvent>,
}

/// A tracing layer that captures restbox spans and events.
pub struct SpanCaptureLayer {
    captured: Arc<Mutex<Captured>>,
}

struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn new() -> Self {
        Self {
            message: None,
            fields: Vec::new(),
        }
    }

    fn push(&mut self, field: &tracing::field::Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.push(field, value.to_string());
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.push(field, value.to_string());
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.push(field, value.to_string());
    }
}

impl<S> Layer<S> for SpanCaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, _ctx: Context<'_, S>) {
        let metadata = attrs.metadata();
        if !metadata.target().starts_with(TARGET_PREFIX) {
            return;
        }

        let mut visitor = FieldVisitor::new();
        attrs.record(&mut visitor);

        self.captured.lock().spans.push(CapturedSpan {
            id: id.into_u64(),
            name: metadata.name().to_string(),
            fields: visitor.fields,
        });
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::new();
        values.record(&mut visitor);

        let span_id = id.into_u64();
        let mut captured = self.captured.lock();
        if let Some(span) = captured.spans.iter_mut().find(|s| s.id == span_id) {
            for (key, value) in visitor.fields {
                if let Some(existing) = span.fields.iter_mut().find(|(k, _)| k == &key) {
                    existing.1 = value;
                } else {
                    span.fields.push((key, value));
                }
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if !event.metadata().target().starts_with(TARGET_PREFIX) {
            return;
        }

        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);
        let span = ctx.event_span(event).map(|s| s.name().to_string());

        self.captured.lock().events.push(CapturedEvent {
            span,
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        });
    }
}

/// Collector for captured spans and events.
#[derive(Clone)]
pub struct SpanCollector {
    captured: Arc<Mutex<Captured>>,
    dispatch: Dispatch,
}

/// Creates a new collector with its associated dispatch.
///
/// Install the dispatch with `tracing::dispatcher::set_default` (or
/// `with_default`) for the code under test. Tasks spawned by the engine
/// inherit it on a current-thread runtime.
pub fn create_span_collector() -> SpanCollector {
    let captured = Arc::new(Mutex::new(Captured::default()));
    let layer = SpanCaptureLayer {
        captured: captured.clone(),
    };
    let subscriber = Registry::default().with(layer);
    let dispatch = Dispatch::new(subscriber);
    SpanCollector { captured, dispatch }
}

impl SpanCollector {
    /// Returns the dispatch to install.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Returns all captured spans.
    pub fn spans(&self) -> Vec<CapturedSpan> {
        self.captured.lock().spans.clone()
    }

    /// Returns captured span names in order.
    pub fn span_names(&self) -> Vec<String> {
        self.captured
            .lock()
            .spans
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Returns all captured events.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.captured.lock().events.clone()
    }

    /// Returns captured event messages in order.
    pub fn messages(&self) -> Vec<String> {
        self.captured
            .lock()
            .events
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    /// Returns how many events carried `message`.
    pub fn count(&self, message: &str) -> usize {
        self.captured
            .lock()
            .events
            .iter()
            .filter(|e| e.message == message)
            .count()
    }

    /// Clears everything captured so far.
    pub fn clear(&self) {
        let mut captured = self.captured.lock();
        captured.spans.clear();
        captured.events.clear();
    }
}
