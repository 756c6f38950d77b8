use crate::harness::engine::{RuleEngine, RuleEngineBuilder};
use crate::harness::{EventLog, capture_events};
use bytes::Bytes;
use http::{Request, Response};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use wafgate_core::{Body, Handler, RequestCtx, ResponseBuffer, WafConfig, WafMiddleware};

/// Peer address every test request appears to come from.
pub const TEST_PEER: &str = "127.0.0.1:40000";

/// In-process host running the middleware the way a server would, error
/// layer included: a failed request is answered with the error's page.
pub struct TestHost {
    middleware: WafMiddleware<RuleEngine>,
}

impl TestHost {
    /// Provision from `fixtures/config/<name>.toml`. Include entries are
    /// resolved against `fixtures/`.
    pub fn start(fixture: &str) -> Self {
        let path = fixtures_dir().join("config").join(format!("{fixture}.toml"));
        assert!(path.exists(), "fixture config does not exist: {path:?}");

        let cfg = WafConfig::from_file(&path).expect("failed to load fixture config");
        Self::from_config(&cfg)
    }

    pub fn from_config(cfg: &WafConfig) -> Self {
        capture_events(events());

        let builder = RuleEngineBuilder::new(fixtures_dir());
        let middleware =
            WafMiddleware::provision(cfg, builder).expect("failed to provision middleware");
        Self { middleware }
    }

    pub fn from_directives(directives: &str) -> Self {
        Self::from_config(&WafConfig {
            directives: directives.to_string(),
            ..WafConfig::default()
        })
    }

    pub fn engine(&self) -> &RuleEngine {
        self.middleware.waf()
    }

    /// Run `req` through the middleware and `next`, returning what the client
    /// would receive.
    pub fn send(&self, req: Request<Option<Body>>, next: &dyn Handler) -> Response<Bytes> {
        let mut ctx = RequestCtx::from_request(req, TEST_PEER);
        let mut out = ResponseBuffer::new();

        if let Err(err) = self.middleware.handle(&mut ctx, &mut out, next) {
            err.write_response(&mut out)
                .expect("failed to write error page");
        }

        out.into_response()
    }

    pub fn get(&self, path: &str, next: &dyn Handler) -> Response<Bytes> {
        let req = Request::get(path)
            .header("host", "localhost:8080")
            .body(None)
            .expect("failed to build request");
        self.send(req, next)
    }

    pub fn post(
        &self,
        path: &str,
        content_type: &str,
        body: impl Into<Vec<u8>>,
        next: &dyn Handler,
    ) -> Response<Bytes> {
        let body: Body = Box::new(std::io::Cursor::new(body.into()));
        let req = Request::post(path)
            .header("host", "localhost:8080")
            .header("content-type", content_type)
            .body(Some(body))
            .expect("failed to build request");
        self.send(req, next)
    }
}

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

static EVENTS: OnceLock<EventLog> = OnceLock::new();

/// Every event captured in this test binary so far.
pub fn events() -> EventLog {
    EVENTS.get_or_init(EventLog::default).clone()
}
