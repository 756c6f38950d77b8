//! A small rule engine speaking a subset of the SecLang directives, enough to
//! drive the middleware end to end.
//!
//! Supported directives:
//! - `SecRuleEngine On|Off|DetectionOnly`
//! - `SecRequestBodyAccess On|Off`, `SecResponseBodyAccess On|Off`
//! - `SecRequestBodyLimit <bytes>`, `SecResponseBodyLimit <bytes>`
//! - `SecRequestBodyLimitAction` / `SecResponseBodyLimitAction`
//!   `Reject|ProcessPartial`
//! - `SecResponseBodyMimeType <type> [<type> ...]`
//! - `SecRule VARIABLES "OPERATOR" "ACTIONS"`
//!
//! Rules match on `REQUEST_URI`, `REQUEST_METHOD`, `REQUEST_HEADERS[:name]`,
//! `REQUEST_BODY`, `ARGS`, `RESPONSE_HEADERS[:name]` and `RESPONSE_BODY` with
//! `@contains` (the default), `@streq` or `@beginsWith`. Actions understood:
//! `id`, `phase`, `deny`, `pass`, `status`, `msg`, `severity`.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use wafgate_core::engine::log::TracingDebugLogger;
use wafgate_core::engine::{
    DebugLevel, DebugLogger, EngineError, ErrorCallback, FieldValue, Interruption, MatchedRule,
    RuleSeverity, Transaction, Waf, WafBuilder,
};

pub const DEFAULT_REQUEST_BODY_LIMIT: usize = 13_107_200;
pub const DEFAULT_RESPONSE_BODY_LIMIT: usize = 524_288;

//-----------------------------------------------------------------------------
// Settings
//-----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    On,
    Off,
    DetectionOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitAction {
    Reject,
    ProcessPartial,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: EngineMode,
    pub request_body_access: bool,
    pub response_body_access: bool,
    pub request_body_limit: usize,
    pub response_body_limit: usize,
    pub request_body_limit_action: LimitAction,
    pub response_body_limit_action: LimitAction,
    pub response_mime_types: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: EngineMode::On,
            request_body_access: false,
            response_body_access: false,
            request_body_limit: DEFAULT_REQUEST_BODY_LIMIT,
            response_body_limit: DEFAULT_RESPONSE_BODY_LIMIT,
            request_body_limit_action: LimitAction::Reject,
            response_body_limit_action: LimitAction::Reject,
            response_mime_types: vec!["text/html".to_string(), "text/plain".to_string()],
        }
    }
}

//-----------------------------------------------------------------------------
// Rules
//-----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variable {
    RequestUri,
    RequestMethod,
    RequestHeaders(Option<String>),
    RequestBody,
    Args,
    ResponseHeaders(Option<String>),
    ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Contains(String),
    StrEq(String),
    BeginsWith(String),
}

impl Operator {
    fn matches(&self, value: &str) -> bool {
        match self {
            Self::Contains(needle) => value.contains(needle.as_str()),
            Self::StrEq(expected) => value == expected,
            Self::BeginsWith(prefix) => value.starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: u32,
    pub phase: u8,
    pub variables: Vec<Variable>,
    pub operator: Operator,
    pub deny: bool,
    pub status: u16,
    pub msg: String,
    pub severity: RuleSeverity,
}

//-----------------------------------------------------------------------------
// Builder
//-----------------------------------------------------------------------------

/// Compiles directives into a [`RuleEngine`].
///
/// Relative include paths are resolved against `base_dir`.
#[derive(Default)]
pub struct RuleEngineBuilder {
    base_dir: PathBuf,
    settings: Settings,
    rules: Vec<Rule>,
    callback: Option<ErrorCallback>,
    debug_log: Option<Arc<dyn DebugLogger>>,
}

impl RuleEngineBuilder {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    fn apply_line(&mut self, line: &str) -> Result<(), EngineError> {
        let tokens = tokenize(line)?;
        let Some((directive, args)) = tokens.split_first() else {
            return Ok(());
        };

        match (directive.as_str(), args) {
            ("SecRuleEngine", [mode]) => {
                self.settings.mode = match mode.as_str() {
                    "On" => EngineMode::On,
                    "Off" => EngineMode::Off,
                    "DetectionOnly" => EngineMode::DetectionOnly,
                    other => return Err(EngineError::directive(format!("bad engine mode {other}"))),
                };
            }
            ("SecRequestBodyAccess", [flag]) => self.settings.request_body_access = on_off(flag)?,
            ("SecResponseBodyAccess", [flag]) => self.settings.response_body_access = on_off(flag)?,
            ("SecRequestBodyLimit", [n]) => self.settings.request_body_limit = number(n)?,
            ("SecResponseBodyLimit", [n]) => self.settings.response_body_limit = number(n)?,
            ("SecRequestBodyLimitAction", [action]) => {
                self.settings.request_body_limit_action = limit_action(action)?;
            }
            ("SecResponseBodyLimitAction", [action]) => {
                self.settings.response_body_limit_action = limit_action(action)?;
            }
            ("SecResponseBodyMimeType", types) if !types.is_empty() => {
                self.settings.response_mime_types = types.to_vec();
            }
            ("SecRule", [variables, operator, actions]) => {
                let rule = parse_rule(variables, operator, actions)?;
                self.rules.push(rule);
            }
            _ => {
                return Err(EngineError::directive(format!("unsupported directive: {line}")));
            }
        }

        Ok(())
    }
}

impl WafBuilder for RuleEngineBuilder {
    type Waf = RuleEngine;

    fn with_error_callback(&mut self, callback: ErrorCallback) {
        self.callback = Some(callback);
    }

    fn with_debug_logger(&mut self, logger: Arc<dyn DebugLogger>) {
        self.debug_log = Some(logger);
    }

    fn with_directives(&mut self, directives: &str) -> Result<(), EngineError> {
        for line in join_continuations(directives) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.apply_line(line)?;
        }
        Ok(())
    }

    fn with_directives_from_path(&mut self, path: &str) -> Result<(), EngineError> {
        let pattern = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.base_dir.join(path)
        };

        let entries = glob::glob(&pattern.to_string_lossy())
            .map_err(|e| EngineError::directive(format!("bad include pattern {path}: {e}")))?;

        let mut files = Vec::new();
        for entry in entries {
            let file = entry.map_err(|e| EngineError::Io(e.into_error()))?;
            files.push(file);
        }
        if files.is_empty() {
            return Err(EngineError::other(format!("no rule files match {path}")));
        }

        files.sort();
        if let Some(log) = &self.debug_log {
            log.debug()
                .str("pattern", path)
                .uint("files", files.len() as u64)
                .msg("Include expanded");
        }
        for file in files {
            let contents = fs::read_to_string(&file)?;
            self.with_directives(&contents)?;
        }
        Ok(())
    }

    fn build(self) -> Result<RuleEngine, EngineError> {
        let debug_log = self
            .debug_log
            .unwrap_or_else(|| Arc::new(TracingDebugLogger::new(DebugLevel::NoLog)));
        debug_log
            .debug()
            .uint("rules", self.rules.len() as u64)
            .bool("enforcing", self.settings.mode == EngineMode::On)
            .msg("Rule set compiled");

        Ok(RuleEngine {
            settings: Arc::new(self.settings),
            rules: Arc::new(self.rules),
            callback: self.callback,
            debug_log,
            stats: Arc::default(),
        })
    }
}

//-----------------------------------------------------------------------------
// Engine
//-----------------------------------------------------------------------------

/// Lifecycle counters, shared by every transaction of an engine.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub opened: usize,
    pub logged: usize,
    pub closed: usize,
    pub interrupted: usize,
}

pub struct RuleEngine {
    settings: Arc<Settings>,
    rules: Arc<Vec<Rule>>,
    callback: Option<ErrorCallback>,
    debug_log: Arc<dyn DebugLogger>,
    stats: Arc<Mutex<EngineStats>>,
}

impl RuleEngine {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.lock().unwrap().clone()
    }
}

impl Waf for RuleEngine {
    type Transaction = RuleTransaction;

    fn new_transaction(&self, id: &str) -> RuleTransaction {
        self.stats.lock().unwrap().opened += 1;

        RuleTransaction {
            id: id.to_string(),
            settings: Arc::clone(&self.settings),
            rules: Arc::clone(&self.rules),
            callback: self.callback.clone(),
            debug_log: self
                .debug_log
                .with_fields(vec![("tx_id".to_string(), FieldValue::Str(id.to_string()))]),
            stats: Arc::clone(&self.stats),
            uri: String::new(),
            method: String::new(),
            request_headers: Vec::new(),
            request_body: Vec::new(),
            response_headers: Vec::new(),
            response_body: Vec::new(),
            interruption: None,
            closed: false,
        }
    }
}

pub struct RuleTransaction {
    id: String,
    settings: Arc<Settings>,
    rules: Arc<Vec<Rule>>,
    callback: Option<ErrorCallback>,
    debug_log: Arc<dyn DebugLogger>,
    stats: Arc<Mutex<EngineStats>>,
    uri: String,
    method: String,
    request_headers: Vec<(String, String)>,
    request_body: Vec<u8>,
    response_headers: Vec<(String, String)>,
    response_body: Vec<u8>,
    interruption: Option<Interruption>,
    closed: bool,
}

impl RuleTransaction {
    fn values(&self, variable: &Variable, phase: u8) -> Vec<String> {
        match variable {
            Variable::RequestUri => vec![self.uri.clone()],
            Variable::RequestMethod => vec![self.method.clone()],
            Variable::RequestHeaders(name) => header_values(&self.request_headers, name.as_deref()),
            Variable::RequestBody => vec![String::from_utf8_lossy(&self.request_body).into_owned()],
            Variable::Args => self.args(),
            Variable::ResponseHeaders(name) => {
                header_values(&self.response_headers, name.as_deref())
            }
            Variable::ResponseBody if phase >= 4 => {
                let limit = self.response_body.len().min(self.settings.response_body_limit);
                vec![String::from_utf8_lossy(&self.response_body[..limit]).into_owned()]
            }
            Variable::ResponseBody => Vec::new(),
        }
    }

    /// Query arguments plus urlencoded body arguments, values only.
    fn args(&self) -> Vec<String> {
        let mut values = Vec::new();
        if let Some((_, query)) = self.uri.split_once('?') {
            values.extend(pair_values(query));
        }

        let urlencoded = header_values(&self.request_headers, Some("content-type"))
            .iter()
            .any(|v| v.contains("x-www-form-urlencoded"));
        if urlencoded {
            values.extend(pair_values(&String::from_utf8_lossy(&self.request_body)));
        }
        values
    }

    fn evaluate(&mut self, phase: u8) -> Option<Interruption> {
        if self.settings.mode == EngineMode::Off {
            return None;
        }
        if self.interruption.is_some() {
            return self.interruption.clone();
        }

        let rules = Arc::clone(&self.rules);
        for rule in rules.iter().filter(|r| r.phase == phase) {
            let matched = rule
                .variables
                .iter()
                .flat_map(|v| self.values(v, phase))
                .any(|value| rule.operator.matches(&value));
            self.debug_log
                .trace()
                .uint("rule_id", u64::from(rule.id))
                .uint("phase", u64::from(phase))
                .bool("matched", matched)
                .msg("Rule evaluated");
            if !matched {
                continue;
            }

            self.debug_log
                .debug()
                .uint("rule_id", u64::from(rule.id))
                .uint("phase", u64::from(phase))
                .msg("Rule matched");

            if let Some(callback) = &self.callback {
                callback(&MatchedRule {
                    id: rule.id,
                    severity: rule.severity,
                    transaction_id: self.id.clone(),
                    message: rule.msg.clone(),
                });
            }

            if rule.deny && self.settings.mode == EngineMode::On {
                return self.interrupt(Interruption::new(rule.id, "deny", rule.status));
            }
        }
        None
    }

    fn interrupt(&mut self, it: Interruption) -> Option<Interruption> {
        self.stats.lock().unwrap().interrupted += 1;
        self.interruption = Some(it);
        self.interruption.clone()
    }
}

impl Transaction for RuleTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    fn process_connection(
        &mut self,
        _client_ip: &str,
        _client_port: u16,
        _server_ip: &str,
        _server_port: u16,
    ) {
    }

    fn process_uri(&mut self, uri: &str, method: &str, _protocol: &str) {
        self.uri = uri.to_string();
        self.method = method.to_string();
    }

    fn add_request_header(&mut self, key: &str, value: &str) {
        self.request_headers
            .push((key.to_ascii_lowercase(), value.to_string()));
    }

    fn set_server_name(&mut self, _name: &str) {}

    fn process_request_headers(&mut self) -> Option<Interruption> {
        self.evaluate(1)
    }

    fn is_request_body_accessible(&self) -> bool {
        self.settings.mode != EngineMode::Off && self.settings.request_body_access
    }

    fn read_request_body_from(
        &mut self,
        body: &mut dyn Read,
    ) -> Result<(Option<Interruption>, u64), EngineError> {
        let limit = self.settings.request_body_limit;
        let partial = self.settings.request_body_limit_action == LimitAction::ProcessPartial;

        let mut consumed = 0u64;
        let mut chunk = vec![0u8; 8192];
        loop {
            let room = limit.saturating_sub(self.request_body.len());
            if room == 0 && partial {
                break;
            }
            // One byte past the limit is enough to know it was exceeded.
            let want = chunk.len().min(if partial { room } else { room + 1 });
            let n = body.read(&mut chunk[..want])?;
            if n == 0 {
                break;
            }
            consumed += n as u64;
            self.request_body.extend_from_slice(&chunk[..n]);

            if self.request_body.len() > limit {
                let it = self.interrupt(Interruption::new(0, "deny", 413));
                return Ok((it, consumed));
            }
        }

        Ok((None, consumed))
    }

    fn request_body_reader(&mut self) -> Result<Box<dyn Read + Send>, EngineError> {
        Ok(Box::new(Cursor::new(self.request_body.clone())))
    }

    fn process_request_body(&mut self) -> Result<Option<Interruption>, EngineError> {
        Ok(self.evaluate(2))
    }

    fn add_response_header(&mut self, key: &str, value: &str) {
        self.response_headers
            .push((key.to_ascii_lowercase(), value.to_string()));
    }

    fn process_response_headers(&mut self, _status: u16, _protocol: &str) -> Option<Interruption> {
        self.evaluate(3)
    }

    fn is_response_body_processable(&self) -> bool {
        if self.settings.mode == EngineMode::Off || !self.settings.response_body_access {
            return false;
        }

        header_values(&self.response_headers, Some("content-type"))
            .first()
            .map(|ct| {
                let mime = ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
                self.settings.response_mime_types.iter().any(|m| *m == mime)
            })
            .unwrap_or(false)
    }

    fn interruption(&self) -> Option<&Interruption> {
        self.interruption.as_ref()
    }

    fn write_response_body(
        &mut self,
        data: &[u8],
    ) -> Result<(Option<Interruption>, usize), EngineError> {
        if self.interruption.is_some() {
            return Ok((self.interruption.clone(), 0));
        }

        let limit = self.settings.response_body_limit;
        let reject = self.settings.response_body_limit_action == LimitAction::Reject;
        if reject && self.response_body.len() + data.len() > limit {
            let it = self.interrupt(Interruption::new(0, "deny", 500));
            return Ok((it, 0));
        }

        // With ProcessPartial everything is kept; only the first `limit`
        // bytes are inspected.
        self.response_body.extend_from_slice(data);
        Ok((None, data.len()))
    }

    fn response_body_reader(&mut self) -> Result<Box<dyn Read + Send>, EngineError> {
        Ok(Box::new(Cursor::new(self.response_body.clone())))
    }

    fn process_response_body(&mut self) -> Result<Option<Interruption>, EngineError> {
        if !self.is_response_body_processable() {
            return Ok(None);
        }
        Ok(self.evaluate(4))
    }

    fn process_logging(&mut self) {
        self.evaluate(5);
        self.stats.lock().unwrap().logged += 1;
    }

    fn close(&mut self) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::other("transaction already closed"));
        }
        self.closed = true;
        self.stats.lock().unwrap().closed += 1;
        Ok(())
    }
}

//-----------------------------------------------------------------------------
// Parsing
//-----------------------------------------------------------------------------

/// Merge lines ending in `\` with the next one.
fn join_continuations(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for raw in text.lines() {
        let trimmed = raw.trim_end();
        if let Some(head) = trimmed.strip_suffix('\\') {
            current.push_str(head);
            current.push(' ');
        } else {
            current.push_str(trimmed);
            lines.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Split on whitespace, keeping double-quoted strings together.
fn tokenize(line: &str) -> Result<Vec<String>, EngineError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if quoted => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '"' => {
                if quoted {
                    tokens.push(std::mem::take(&mut current));
                }
                quoted = !quoted;
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if quoted {
        return Err(EngineError::directive(format!("unterminated quote: {line}")));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn on_off(flag: &str) -> Result<bool, EngineError> {
    match flag {
        "On" => Ok(true),
        "Off" => Ok(false),
        other => Err(EngineError::directive(format!("expected On or Off, got {other}"))),
    }
}

fn number(n: &str) -> Result<usize, EngineError> {
    n.parse()
        .map_err(|_| EngineError::directive(format!("expected a number, got {n}")))
}

fn limit_action(action: &str) -> Result<LimitAction, EngineError> {
    match action {
        "Reject" => Ok(LimitAction::Reject),
        "ProcessPartial" => Ok(LimitAction::ProcessPartial),
        other => Err(EngineError::directive(format!("bad limit action {other}"))),
    }
}

fn parse_variable(raw: &str) -> Result<Variable, EngineError> {
    let (name, key) = match raw.split_once(':') {
        Some((name, key)) => (name, Some(key.to_ascii_lowercase())),
        None => (raw, None),
    };

    Ok(match (name, key) {
        ("REQUEST_URI", None) => Variable::RequestUri,
        ("REQUEST_METHOD", None) => Variable::RequestMethod,
        ("REQUEST_HEADERS", key) => Variable::RequestHeaders(key),
        ("REQUEST_BODY", None) => Variable::RequestBody,
        ("ARGS", None) => Variable::Args,
        ("RESPONSE_HEADERS", key) => Variable::ResponseHeaders(key),
        ("RESPONSE_BODY", None) => Variable::ResponseBody,
        _ => return Err(EngineError::directive(format!("unsupported variable {raw}"))),
    })
}

fn parse_operator(raw: &str) -> Result<Operator, EngineError> {
    let Some(rest) = raw.strip_prefix('@') else {
        return Ok(Operator::Contains(raw.to_string()));
    };
    let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));

    match name {
        "contains" => Ok(Operator::Contains(arg.to_string())),
        "streq" => Ok(Operator::StrEq(arg.to_string())),
        "beginsWith" => Ok(Operator::BeginsWith(arg.to_string())),
        other => Err(EngineError::directive(format!("unsupported operator @{other}"))),
    }
}

fn parse_rule(variables: &str, operator: &str, actions: &str) -> Result<Rule, EngineError> {
    let variables = variables
        .split('|')
        .map(parse_variable)
        .collect::<Result<Vec<_>, _>>()?;

    let mut rule = Rule {
        id: 0,
        phase: 2,
        variables,
        operator: parse_operator(operator)?,
        deny: false,
        status: 0,
        msg: String::new(),
        severity: RuleSeverity::from_level(2),
    };

    for action in split_actions(actions) {
        let (name, value) = match action.split_once(':') {
            Some((name, value)) => (name.trim(), value.trim().trim_matches('\'')),
            None => (action.trim(), ""),
        };
        match name {
            "id" => rule.id = value.parse().map_err(|_| bad_action(&action))?,
            "phase" => rule.phase = value.parse().map_err(|_| bad_action(&action))?,
            "status" => rule.status = value.parse().map_err(|_| bad_action(&action))?,
            "severity" => {
                rule.severity = RuleSeverity::from_level(value.parse().map_err(|_| bad_action(&action))?);
            }
            "msg" => rule.msg = value.to_string(),
            "deny" => rule.deny = true,
            "pass" => rule.deny = false,
            "log" | "nolog" | "auditlog" | "noauditlog" => {}
            _ => return Err(bad_action(&action)),
        }
    }

    if rule.id == 0 {
        return Err(EngineError::directive("rules must have an id"));
    }
    if !(1..=5).contains(&rule.phase) {
        return Err(EngineError::directive(format!("rule {} has invalid phase {}", rule.id, rule.phase)));
    }
    Ok(rule)
}

/// Split an action list on commas outside single quotes.
fn split_actions(actions: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in actions.chars() {
        match c {
            '\'' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => out.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        out.push(current);
    }
    out
}

fn bad_action(action: &str) -> EngineError {
    EngineError::directive(format!("unsupported action {action}"))
}

fn header_values(headers: &[(String, String)], name: Option<&str>) -> Vec<String> {
    headers
        .iter()
        .filter(|(k, _)| name.is_none_or(|n| k == n))
        .map(|(_, v)| v.clone())
        .collect()
}

fn pair_values(encoded: &str) -> Vec<String> {
    encoded
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').map(|(_, v)| v).unwrap_or_default().to_string())
        .collect()
}
