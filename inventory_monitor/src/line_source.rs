//! Line source over the serial link to the loadcell controller
//!
//! The controller prints one text line per weight change. Reads are
//! timeout-bounded: a line cut by the read timeout is kept and completed on
//! a later poll. Lines that are not valid UTF-8 are dropped.

use serialport::SerialPort;
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::time::Duration;
use thiserror::Error;

/// Serial transport failures; both end the current run
#[derive(Debug, Error)]
pub enum TransportError {
    /// Port could not be opened
    #[error("Cannot open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    /// Connection lost while reading or writing
    #[error("Serial connection lost: {0}")]
    Lost(#[source] io::Error),
}

/// Byte stream carrying newline-terminated text
pub trait LineTransport {
    /// Number of bytes that can be read without waiting
    fn bytes_waiting(&mut self) -> io::Result<usize>;

    /// Append bytes up to and including the next `\n` to `buf`
    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;

    /// Write a command to the controller
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Port name for log lines
    fn name(&self) -> &str;
}

/// Serial port connection; closed when dropped
pub struct SerialTransport {
    name: String,
    reader: BufReader<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn open(port: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self, TransportError> {
        let serial = serialport::new(port, baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|source| TransportError::Open {
                port: port.to_string(),
                source,
            })?;

        log::info!("Connected to {} at {} baud", port, baud_rate);
        Ok(Self {
            name: port.to_string(),
            reader: BufReader::new(serial),
        })
    }
}

impl LineTransport for SerialTransport {
    fn bytes_waiting(&mut self) -> io::Result<usize> {
        let buffered = self.reader.buffer().len();
        let pending = self.reader.get_ref().bytes_to_read()?;
        Ok(buffered + pending as usize)
    }

    fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        self.reader.read_until(b'\n', buf)
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let port = self.reader.get_mut();
        port.write_all(bytes)?;
        port.flush()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        log::info!("Serial port {} closed", self.name);
    }
}

/// Longest partial line kept while waiting for its `\n`
const MAX_PENDING_BYTES: usize = 4096;

/// Decoded, non-empty lines from a transport
pub struct LineSource<T: LineTransport> {
    transport: T,
    pending: Vec<u8>,
}

impl<T: LineTransport> LineSource<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            pending: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.transport.name()
    }

    /// Send a raw command (e.g. `t` to tare all loadcells)
    pub fn send_command(&mut self, command: &[u8]) -> Result<(), TransportError> {
        self.transport.send(command).map_err(TransportError::Lost)
    }

    fn has_data(&mut self) -> Result<bool, TransportError> {
        let waiting = self.transport.bytes_waiting().map_err(TransportError::Lost)?;
        Ok(waiting > 0)
    }

    /// Return the next line if one is available right now
    pub fn poll_line(&mut self) -> Result<Option<String>, TransportError> {
        if !self.has_data()? {
            return Ok(None);
        }
        self.read_waiting()
    }

    /// Wait for the next line, sleeping `poll_interval` whenever nothing is waiting
    pub async fn next_line(&mut self, poll_interval: Duration) -> Result<String, TransportError> {
        loop {
            if !self.has_data()? {
                tokio::time::sleep(poll_interval).await;
                continue;
            }
            match self.read_waiting()? {
                Some(line) => return Ok(line),
                None => tokio::task::yield_now().await,
            }
        }
    }

    fn read_waiting(&mut self) -> Result<Option<String>, TransportError> {
        match self.transport.read_line(&mut self.pending) {
            Ok(0) => {
                return Err(TransportError::Lost(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "serial stream ended",
                )))
            }
            Ok(_) => {}
            Err(e) if is_retryable(&e) => {}
            Err(e) => return Err(TransportError::Lost(e)),
        }

        if !self.pending.ends_with(b"\n") {
            if self.pending.len() > MAX_PENDING_BYTES {
                log::warn!(
                    "Dropping {} bytes without a line break from {}",
                    self.pending.len(),
                    self.transport.name()
                );
                self.pending.clear();
            }
            return Ok(None);
        }

        let bytes = std::mem::take(&mut self.pending);
        Ok(decode_line(bytes))
    }
}

fn is_retryable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

/// UTF-8 decode and trim; undecodable and blank lines yield `None`
fn decode_line(bytes: Vec<u8>) -> Option<String> {
    match String::from_utf8(bytes) {
        Ok(text) => {
            let line = text.trim();
            if line.is_empty() {
                None
            } else {
                Some(line.to_string())
            }
        }
        Err(e) => {
            log::debug!(
                "Dropping undecodable line ({} bytes): {}",
                e.as_bytes().len(),
                e.utf8_error()
            );
            None
        }
    }
}

#[cfg(test)]
pub use tests::ScriptedTransport;

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Transport replaying scripted reads, then reporting a disconnect
    pub struct ScriptedTransport {
        reads: VecDeque<io::Result<Vec<u8>>>,
        pub sent: Vec<u8>,
        drops: Rc<Cell<u32>>,
    }

    impl ScriptedTransport {
        pub fn new(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                reads: reads.into(),
                sent: Vec::new(),
                drops: Rc::new(Cell::new(0)),
            }
        }

        /// One read per line, each terminated with `\n`
        pub fn from_lines(lines: &[&str]) -> Self {
            Self::new(
                lines
                    .iter()
                    .map(|line| Ok(format!("{}\n", line).into_bytes()))
                    .collect(),
            )
        }

        pub fn drop_counter(&self) -> Rc<Cell<u32>> {
            Rc::clone(&self.drops)
        }
    }

    impl LineTransport for ScriptedTransport {
        fn bytes_waiting(&mut self) -> io::Result<usize> {
            match self.reads.front() {
                Some(Ok(bytes)) => Ok(bytes.len().max(1)),
                Some(Err(_)) => Ok(1),
                None => Err(io::Error::new(ErrorKind::BrokenPipe, "device unplugged")),
            }
        }

        fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    buf.extend_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }

        fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.sent.extend_from_slice(bytes);
            Ok(())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    impl Drop for ScriptedTransport {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    /// Transport that is idle for a number of polls before yielding one line
    struct IdleTransport {
        idle_polls: u32,
        line: Option<Vec<u8>>,
    }

    impl LineTransport for IdleTransport {
        fn bytes_waiting(&mut self) -> io::Result<usize> {
            if self.idle_polls > 0 {
                self.idle_polls -= 1;
                return Ok(0);
            }
            Ok(self.line.as_ref().map_or(0, Vec::len))
        }

        fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
            let line = self.line.take().unwrap_or_default();
            buf.extend_from_slice(&line);
            Ok(line.len())
        }

        fn send(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "idle"
        }
    }

    #[test]
    fn yields_trimmed_lines() {
        let mut source = LineSource::new(ScriptedTransport::from_lines(&[
            "로드셀 1 무게: 245.30 g\r",
            "  hello  ",
        ]));

        assert_eq!(
            source.poll_line().unwrap(),
            Some("로드셀 1 무게: 245.30 g".to_string())
        );
        assert_eq!(source.poll_line().unwrap(), Some("hello".to_string()));
    }

    #[test]
    fn skips_blank_lines() {
        let mut source = LineSource::new(ScriptedTransport::from_lines(&["", "   ", "x"]));
        assert_eq!(source.poll_line().unwrap(), None);
        assert_eq!(source.poll_line().unwrap(), None);
        assert_eq!(source.poll_line().unwrap(), Some("x".to_string()));
    }

    #[test]
    fn drops_undecodable_line_and_continues() {
        let mut source = LineSource::new(ScriptedTransport::new(vec![
            Ok(vec![0xff, 0xfe, b'\n']),
            Ok(b"next\n".to_vec()),
        ]));

        assert_eq!(source.poll_line().unwrap(), None);
        assert_eq!(source.poll_line().unwrap(), Some("next".to_string()));
    }

    #[test]
    fn completes_line_split_by_read_timeout() {
        let mut source = LineSource::new(ScriptedTransport::new(vec![
            Ok("로드셀 2 무".as_bytes().to_vec()),
            Err(io::Error::new(ErrorKind::TimedOut, "timeout")),
            Ok("게: 10.0 g\n".as_bytes().to_vec()),
        ]));

        assert_eq!(source.poll_line().unwrap(), None);
        assert_eq!(source.poll_line().unwrap(), None);
        assert_eq!(
            source.poll_line().unwrap(),
            Some("로드셀 2 무게: 10.0 g".to_string())
        );
    }

    #[test]
    fn oversized_partial_line_is_dropped() {
        let mut source = LineSource::new(ScriptedTransport::new(vec![
            Ok(vec![b'x'; MAX_PENDING_BYTES]),
            Err(io::Error::new(ErrorKind::TimedOut, "timeout")),
            Ok(vec![b'x'; 8]),
            Ok("로드셀 1 무게: 5.0 g\n".as_bytes().to_vec()),
        ]));

        assert_eq!(source.poll_line().unwrap(), None);
        assert_eq!(source.poll_line().unwrap(), None);
        assert_eq!(source.pending.len(), MAX_PENDING_BYTES);
        assert_eq!(source.poll_line().unwrap(), None);
        assert!(source.pending.is_empty());
        assert_eq!(
            source.poll_line().unwrap(),
            Some("로드셀 1 무게: 5.0 g".to_string())
        );
    }

    #[test]
    fn disconnect_is_transport_lost() {
        let mut source = LineSource::new(ScriptedTransport::from_lines(&["a"]));
        assert!(source.poll_line().unwrap().is_some());
        assert!(matches!(source.poll_line(), Err(TransportError::Lost(_))));
    }

    #[test]
    fn end_of_stream_is_transport_lost() {
        let mut source = LineSource::new(ScriptedTransport::new(vec![Ok(Vec::new())]));
        let err = source.poll_line().unwrap_err();
        match err {
            TransportError::Lost(e) => assert_eq!(e.kind(), ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn hard_read_error_is_transport_lost() {
        let mut source = LineSource::new(ScriptedTransport::new(vec![Err(io::Error::new(
            ErrorKind::PermissionDenied,
            "gone",
        ))]));
        assert!(matches!(source.poll_line(), Err(TransportError::Lost(_))));
    }

    #[test]
    fn transport_released_once_on_drop() {
        let transport = ScriptedTransport::from_lines(&["a"]);
        let drops = transport.drop_counter();
        let source = LineSource::new(transport);
        assert_eq!(drops.get(), 0);
        drop(source);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn send_command_reaches_transport() {
        let mut source = LineSource::new(ScriptedTransport::from_lines(&[]));
        source.send_command(b"t").unwrap();
        assert_eq!(source.transport.sent, b"t".to_vec());
    }

    #[tokio::test]
    async fn next_line_waits_while_idle() {
        let mut source = LineSource::new(IdleTransport {
            idle_polls: 3,
            line: Some(b"ready\n".to_vec()),
        });
        let line = source.next_line(Duration::from_millis(1)).await.unwrap();
        assert_eq!(line, "ready");
    }

    #[tokio::test]
    async fn next_line_skips_dropped_lines() {
        let mut source = LineSource::new(ScriptedTransport::new(vec![
            Ok(vec![0xc3, b'\n']),
            Ok(b"\n".to_vec()),
            Ok(b"ok\n".to_vec()),
        ]));
        let line = source.next_line(Duration::from_millis(1)).await.unwrap();
        assert_eq!(line, "ok");
    }
}
