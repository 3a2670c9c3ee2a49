// Byte-stream transports to the tracker process.
//
// The protocol has no length prefix: the peer writes each JSON document with
// a single flush and one read is assumed to return exactly one document. Two
// documents packed into one read, or one document split across reads, would
// desynchronize the stream; the protocol accepts that fragility and bounds
// message size with MAX_FRAME instead of framing.

pub mod pipe;

pub use pipe::PipeConnector;

use std::io;

/// Upper bound on a single message; also the per-connection read buffer size.
pub const MAX_FRAME: usize = 16 * 1024 * 1024;

pub trait Transport: Send {
    /// Write one complete message.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read one message. Blocks until the peer writes or disconnects; a
    /// disconnect surfaces as `UnexpectedEof`.
    fn receive(&mut self) -> io::Result<Vec<u8>>;

    /// Handle that can unblock a pending `receive` from another thread, when
    /// the platform supports it.
    fn shutdown_handle(&self) -> Option<Box<dyn Fn() + Send + Sync>> {
        None
    }
}

/// Opens transports by endpoint name (`pt4_api` / `hm3_api`).
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &str) -> io::Result<Box<dyn Transport>>;
}

/// One read, up to the frame ceiling. Zero bytes means the peer closed.
pub(crate) fn read_frame<R: io::Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<Vec<u8>> {
    let n = reader.read(buf)?;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "peer closed the connection",
        ));
    }
    Ok(buf[..n].to_vec())
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory duplex transport for tests: each end is a Transport, and
    //! whatever one end sends the other receives as a single frame.

    use super::Transport;
    use std::io;
    use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

    pub struct MemoryTransport {
        tx: Sender<Vec<u8>>,
        rx: Receiver<Vec<u8>>,
    }

    pub fn pair() -> (MemoryTransport, MemoryTransport) {
        let (a_tx, a_rx) = channel();
        let (b_tx, b_rx) = channel();
        (
            MemoryTransport { tx: a_tx, rx: b_rx },
            MemoryTransport { tx: b_tx, rx: a_rx },
        )
    }

    impl MemoryTransport {
        /// Non-blocking receive used to assert that no response was written.
        pub fn try_receive(&mut self) -> Option<Vec<u8>> {
            match self.rx.try_recv() {
                Ok(bytes) => Some(bytes),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
            }
        }
    }

    impl Transport for MemoryTransport {
        fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.tx
                .send(bytes.to_vec())
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer dropped"))
        }

        fn receive(&mut self) -> io::Result<Vec<u8>> {
            self.rx.recv().map_err(|_| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed the connection")
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::pair;
    use super::*;

    #[test]
    fn frames_pass_between_the_two_ends() {
        let (mut client, mut server) = pair();
        client.send(br#"{"id":1}"#).unwrap();
        assert_eq!(server.receive().unwrap(), br#"{"id":1}"#.to_vec());
    }

    #[test]
    fn receive_fails_once_the_peer_is_gone() {
        let (client, mut server) = pair();
        drop(client);
        let err = server.receive().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn read_frame_rejects_eof() {
        let mut empty: &[u8] = &[];
        let mut buf = [0u8; 16];
        let err = read_frame(&mut empty, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
