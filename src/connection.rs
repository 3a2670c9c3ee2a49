use crate::error::Result;
use crate::transport::Transport;
use crate::wire::Envelope;
use log::debug;
use std::fmt;
use std::time::Instant;

/// Identifies a connection in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Outbound,
    Inbound(usize),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Outbound => write!(f, "outbound"),
            Role::Inbound(index) => write!(f, "inbound-{}", index),
        }
    }
}

/// One pipe to the tracker. The write-then-read call cycle lives here;
/// callers must never start a second cycle before the first returns, which
/// the adapter enforces by keeping each connection behind a mutex or a
/// single thread.
pub(crate) struct Connection {
    transport: Box<dyn Transport>,
    role: Role,
}

impl Connection {
    pub fn new(transport: Box<dyn Transport>, role: Role) -> Self {
        Self { transport, role }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn shutdown_handle(&self) -> Option<Box<dyn Fn() + Send + Sync>> {
        self.transport.shutdown_handle()
    }

    /// One call cycle: write the request, then block for the paired
    /// response. The response id is not checked against the request id;
    /// success is decided by the error field alone.
    pub fn call(&mut self, request: &Envelope) -> Result<Envelope> {
        let text = request.encode()?;
        debug!("[CLIENT] {} request: {}", self.role, text);
        let started = Instant::now();
        self.transport.send(text.as_bytes())?;
        let raw = self.receive_text()?;
        debug!(
            "[CLIENT] {} response ({} ms): {}",
            self.role,
            started.elapsed().as_millis(),
            raw
        );
        Ok(Envelope::decode(&raw)?)
    }

    /// Read one message as text. Invalid UTF-8 is replaced rather than
    /// rejected; sanitization decides what happens to the result.
    pub fn receive_text(&mut self) -> Result<String> {
        let bytes = self.transport.receive()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Write a response envelope on this connection.
    pub fn respond(&mut self, response: &Envelope) -> Result<()> {
        let text = response.encode()?;
        debug!("[SERVER] {} response: {}", self.role, text);
        self.transport.send(text.as_bytes())?;
        Ok(())
    }
}
