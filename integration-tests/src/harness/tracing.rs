use std::fmt;
use std::sync::{Arc, Mutex, Once};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Events recorded by the capture layer, shared with the tests.
pub type EventLog = Arc<Mutex<Vec<CapturedEvent>>>;

/// One `tracing` event with its fields rendered as strings.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find_map(|(k, v)| (k == name).then_some(v.as_str()))
    }

    pub fn message(&self) -> Option<&str> {
        self.field("message")
    }
}

/// Install the capture layer as the global subscriber. Only the first call
/// in a test binary has any effect.
pub fn capture_events(log: EventLog) {
    static INSTALL: Once = Once::new();

    INSTALL.call_once(move || {
        let subscriber = tracing_subscriber::registry().with(CaptureLayer { log });
        tracing::subscriber::set_global_default(subscriber)
            .expect("a global subscriber is already installed");
    });
}

struct CaptureLayer {
    log: EventLog,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = FieldRecorder::default();
        event.record(&mut fields);

        let meta = event.metadata();
        self.log.lock().unwrap().push(CapturedEvent {
            level: *meta.level(),
            target: meta.target().to_string(),
            fields: fields.0,
        });
    }
}

#[derive(Default)]
struct FieldRecorder(Vec<(String, String)>);

impl Visit for FieldRecorder {
    // Strings are kept unquoted; everything else goes through `Debug`.
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }
}
