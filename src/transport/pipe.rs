use super::{Connector, Transport};
use std::io;

/// Default connector: the tracker's named pipe on Windows, a Unix domain
/// socket of the same name elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipeConnector;

impl Connector for PipeConnector {
    fn connect(&self, endpoint: &str) -> io::Result<Box<dyn Transport>> {
        #[cfg(windows)]
        {
            Ok(Box::new(windows_pipe::NamedPipeTransport::connect(
                endpoint,
            )?))
        }
        #[cfg(unix)]
        {
            Ok(Box::new(unix_socket::UnixSocketTransport::connect(
                endpoint,
            )?))
        }
    }
}

#[cfg(windows)]
mod windows_pipe {
    use crate::transport::{read_frame, Transport, MAX_FRAME};
    use std::fs::{File, OpenOptions};
    use std::io::{self, Write};

    /// Client end of the tracker's pipe, opened as a plain duplex file
    /// handle so reads and writes block the calling thread.
    pub struct NamedPipeTransport {
        file: File,
        buf: Vec<u8>,
    }

    impl NamedPipeTransport {
        pub fn connect(endpoint: &str) -> io::Result<Self> {
            let path = format!(r"\\.\pipe\{}", endpoint);
            let file = OpenOptions::new().read(true).write(true).open(path)?;
            Ok(Self {
                file,
                buf: vec![0u8; MAX_FRAME],
            })
        }
    }

    impl Transport for NamedPipeTransport {
        fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.file.write_all(bytes)?;
            self.file.flush()
        }

        fn receive(&mut self) -> io::Result<Vec<u8>> {
            read_frame(&mut self.file, &mut self.buf)
        }

        // No shutdown handle: closing a duplicated pipe handle does not
        // cancel a read already blocked on the original. Disconnect relies
        // on the tracker closing its end.
    }
}

#[cfg(unix)]
mod unix_socket {
    use crate::transport::{read_frame, Transport, MAX_FRAME};
    use std::io::{self, Write};
    use std::net::Shutdown;
    use std::os::unix::net::UnixStream;
    use std::path::PathBuf;

    /// Stand-in for the tracker pipe on Unix: a socket named after the
    /// endpoint in the user's runtime directory.
    pub struct UnixSocketTransport {
        stream: UnixStream,
        buf: Vec<u8>,
    }

    pub fn endpoint_path(endpoint: &str) -> PathBuf {
        let dir = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);
        dir.join(format!("{}.sock", endpoint))
    }

    impl UnixSocketTransport {
        pub fn connect(endpoint: &str) -> io::Result<Self> {
            let stream = UnixStream::connect(endpoint_path(endpoint))?;
            Ok(Self {
                stream,
                buf: vec![0u8; MAX_FRAME],
            })
        }
    }

    impl Transport for UnixSocketTransport {
        fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.stream.write_all(bytes)?;
            self.stream.flush()
        }

        fn receive(&mut self) -> io::Result<Vec<u8>> {
            read_frame(&mut self.stream, &mut self.buf)
        }

        fn shutdown_handle(&self) -> Option<Box<dyn Fn() + Send + Sync>> {
            let stream = self.stream.try_clone().ok()?;
            Some(Box::new(move || {
                let _ = stream.shutdown(Shutdown::Both);
            }))
        }
    }
}
