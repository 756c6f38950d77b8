use crate::engine::{EngineError, Interruption, Transaction, Waf};
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};

//-----------------------------------------------------------------------------
// Scripted engine
//-----------------------------------------------------------------------------

/// What the scripted transaction does at each phase.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub block_request_headers: Option<Interruption>,
    pub request_body_access: bool,
    /// Stop consuming the request body after this many bytes (no interruption).
    pub request_body_read_cap: Option<usize>,
    /// Interrupt when the request body grows past this many bytes.
    pub request_body_limit: Option<usize>,
    pub fail_request_body: bool,
    pub block_request_body: Option<Interruption>,
    pub block_response_headers: Option<Interruption>,
    pub response_body_processable: bool,
    /// Interrupt when the buffered response body grows past this many bytes.
    pub response_body_limit: Option<usize>,
    pub fail_response_body_write: bool,
    /// Interrupt in the response body phase when the body contains this.
    pub block_response_body_containing: Option<String>,
    pub fail_close: bool,
}

/// Everything the adapter fed to the transaction.
#[derive(Debug, Default)]
pub struct Recorded {
    pub connection: Option<(String, u16, String, u16)>,
    pub uri: Option<(String, String, String)>,
    pub request_headers: Vec<(String, String)>,
    pub server_name: Option<String>,
    pub request_body: Vec<u8>,
    pub request_body_processed: bool,
    pub response_headers: Vec<(String, String)>,
    pub response_status: Option<u16>,
    pub response_header_calls: usize,
    pub response_body: Vec<u8>,
    pub response_body_writes: usize,
    pub response_body_processed: bool,
    /// Response phases in the order they ran.
    pub phases: Vec<&'static str>,
    pub logged: bool,
    pub closed: bool,
}

#[derive(Clone, Default)]
pub struct ScriptedWaf {
    pub script: Script,
    pub recorded: Arc<Mutex<Recorded>>,
}

impl ScriptedWaf {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            recorded: Arc::default(),
        }
    }

    pub fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }

    pub fn transaction(&self) -> ScriptedTransaction {
        self.new_transaction("test-tx")
    }
}

impl Waf for ScriptedWaf {
    type Transaction = ScriptedTransaction;

    fn new_transaction(&self, id: &str) -> ScriptedTransaction {
        ScriptedTransaction {
            id: id.to_string(),
            script: self.script.clone(),
            recorded: Arc::clone(&self.recorded),
            interruption: None,
        }
    }
}

pub struct ScriptedTransaction {
    id: String,
    script: Script,
    recorded: Arc<Mutex<Recorded>>,
    interruption: Option<Interruption>,
}

impl ScriptedTransaction {
    fn rec(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }

    fn interrupt(&mut self, it: Option<Interruption>) -> Option<Interruption> {
        if self.interruption.is_none() {
            self.interruption = it;
        }
        self.interruption.clone()
    }
}

impl Transaction for ScriptedTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    fn process_connection(
        &mut self,
        client_ip: &str,
        client_port: u16,
        server_ip: &str,
        server_port: u16,
    ) {
        self.rec().connection = Some((
            client_ip.to_string(),
            client_port,
            server_ip.to_string(),
            server_port,
        ));
    }

    fn process_uri(&mut self, uri: &str, method: &str, protocol: &str) {
        self.rec().uri = Some((uri.to_string(), method.to_string(), protocol.to_string()));
    }

    fn add_request_header(&mut self, key: &str, value: &str) {
        self.rec()
            .request_headers
            .push((key.to_string(), value.to_string()));
    }

    fn set_server_name(&mut self, name: &str) {
        self.rec().server_name = Some(name.to_string());
    }

    fn process_request_headers(&mut self) -> Option<Interruption> {
        let it = self.script.block_request_headers.clone();
        if it.is_some() { self.interrupt(it) } else { None }
    }

    fn is_request_body_accessible(&self) -> bool {
        self.script.request_body_access
    }

    fn read_request_body_from(
        &mut self,
        body: &mut dyn Read,
    ) -> Result<(Option<Interruption>, u64), EngineError> {
        if self.script.fail_request_body {
            return Err(EngineError::other("request body storage failed"));
        }

        let cap = self.script.request_body_read_cap.unwrap_or(usize::MAX);
        let mut consumed = 0u64;
        let mut chunk = [0u8; 7];
        loop {
            let already = self.rec().request_body.len();
            if already >= cap {
                break;
            }
            let want = chunk.len().min(cap - already);
            let n = body.read(&mut chunk[..want])?;
            if n == 0 {
                break;
            }
            consumed += n as u64;
            self.rec().request_body.extend_from_slice(&chunk[..n]);

            if let Some(limit) = self.script.request_body_limit {
                if self.rec().request_body.len() > limit {
                    let it = self.interrupt(Some(Interruption::new(0, "deny", 413)));
                    return Ok((it, consumed));
                }
            }
        }

        Ok((None, consumed))
    }

    fn request_body_reader(&mut self) -> Result<Box<dyn Read + Send>, EngineError> {
        Ok(Box::new(Cursor::new(self.rec().request_body.clone())))
    }

    fn process_request_body(&mut self) -> Result<Option<Interruption>, EngineError> {
        self.rec().request_body_processed = true;
        let it = self.script.block_request_body.clone();
        Ok(if it.is_some() { self.interrupt(it) } else { None })
    }

    fn add_response_header(&mut self, key: &str, value: &str) {
        self.rec()
            .response_headers
            .push((key.to_string(), value.to_string()));
    }

    fn process_response_headers(&mut self, status: u16, _protocol: &str) -> Option<Interruption> {
        {
            let mut rec = self.rec();
            rec.response_status = Some(status);
            rec.response_header_calls += 1;
            rec.phases.push("response_headers");
        }
        let it = self.script.block_response_headers.clone();
        if it.is_some() { self.interrupt(it) } else { None }
    }

    fn is_response_body_processable(&self) -> bool {
        self.script.response_body_processable
    }

    fn interruption(&self) -> Option<&Interruption> {
        self.interruption.as_ref()
    }

    fn write_response_body(
        &mut self,
        data: &[u8],
    ) -> Result<(Option<Interruption>, usize), EngineError> {
        if self.script.fail_response_body_write {
            return Err(EngineError::Limit {
                message: "response body bookkeeping failed".to_string(),
            });
        }

        let len = {
            let mut rec = self.rec();
            rec.response_body_writes += 1;
            rec.response_body.extend_from_slice(data);
            rec.response_body.len()
        };

        if let Some(limit) = self.script.response_body_limit {
            if len > limit {
                let it = self.interrupt(Some(Interruption::new(0, "deny", 500)));
                return Ok((it, 0));
            }
        }

        Ok((None, data.len()))
    }

    fn response_body_reader(&mut self) -> Result<Box<dyn Read + Send>, EngineError> {
        Ok(Box::new(Cursor::new(self.rec().response_body.clone())))
    }

    fn process_response_body(&mut self) -> Result<Option<Interruption>, EngineError> {
        let body = {
            let mut rec = self.rec();
            rec.response_body_processed = true;
            rec.phases.push("response_body");
            rec.response_body.clone()
        };

        if let Some(needle) = self.script.block_response_body_containing.clone() {
            let haystack = String::from_utf8_lossy(&body);
            if haystack.contains(&needle) {
                return Ok(self.interrupt(Some(Interruption::new(95, "deny", 403))));
            }
        }
        Ok(None)
    }

    fn process_logging(&mut self) {
        self.rec().logged = true;
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.rec().closed = true;
        if self.script.fail_close {
            return Err(EngineError::other("close failed"));
        }
        Ok(())
    }
}

pub fn deny(rule_id: u32, status: u16) -> Interruption {
    Interruption::new(rule_id, "deny", status)
}

//-----------------------------------------------------------------------------
// Bodies
//-----------------------------------------------------------------------------

/// Body that only supports plain reads and counts them.
pub struct PlainBody {
    inner: Cursor<Vec<u8>>,
    pub reads: Arc<Mutex<usize>>,
}

impl PlainBody {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Cursor::new(data.into()),
            reads: Arc::default(),
        }
    }
}

impl Read for PlainBody {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        *self.reads.lock().unwrap() += 1;
        self.inner.read(buf)
    }
}

impl crate::ctx::BodyStream for PlainBody {}

/// Body with a direct-copy path that records whether it was used.
pub struct DirectCopyBody {
    inner: Cursor<Vec<u8>>,
    pub direct_copies: Arc<Mutex<usize>>,
}

impl DirectCopyBody {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Cursor::new(data.into()),
            direct_copies: Arc::default(),
        }
    }
}

impl Read for DirectCopyBody {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl crate::ctx::BodyStream for DirectCopyBody {
    fn supports_write_to(&self) -> bool {
        true
    }

    fn write_to(&mut self, sink: &mut dyn std::io::Write) -> std::io::Result<u64> {
        *self.direct_copies.lock().unwrap() += 1;
        std::io::copy(&mut self.inner, sink)
    }
}

/// Body whose reads always fail.
pub struct BrokenBody;

impl Read for BrokenBody {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "client went away",
        ))
    }
}

impl crate::ctx::BodyStream for BrokenBody {}
