//! Per-connection reader.
//!
//! A [`ConnectionWorker`] owns one actor's inbound byte stream. It reads
//! newline-terminated lines, trims them, and submits them on the
//! best-effort input path. When the stream ends, errors, or sits idle
//! past its read deadline, the worker queues a [`PlayerQuit`] on the
//! system lane and returns why it stopped.

use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::net::TcpStream;
use std::sync::Arc;

use hearth_core::{ActorId, Input, PlayerQuit, SendPrompt};

use crate::world::World;

/// Why a connection worker stopped reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disconnect {
    /// The peer closed the stream.
    Eof,
    /// No input arrived before the read deadline.
    IdleTimeout,
    /// Any other read failure.
    Error(io::ErrorKind),
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => f.write_str("connection closed"),
            Self::IdleTimeout => f.write_str("idle timeout"),
            Self::Error(kind) => write!(f, "read error: {kind}"),
        }
    }
}

/// Reads one actor's input stream into the world.
pub struct ConnectionWorker {
    actor: ActorId,
    world: Arc<World>,
}

impl ConnectionWorker {
    /// A worker feeding input for `actor` into `world`.
    pub fn new(actor: ActorId, world: Arc<World>) -> Self {
        Self { actor, world }
    }

    /// The actor this worker reads for.
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Read lines from `reader` until it ends or fails.
    ///
    /// Lines are read as raw bytes and decoded lossily, so telnet option
    /// bytes or stray non-UTF-8 input never end the session. Blank lines
    /// ask for a fresh prompt on the system lane instead of going through
    /// the throttle. Read timeouts (`WouldBlock` or `TimedOut`) count as an
    /// idle disconnect.
    pub fn run<R: BufRead>(&self, mut reader: R) -> Disconnect {
        let input = self.world.input_sender();
        let mut buf = Vec::new();
        let reason = loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break Disconnect::Eof,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let text = line.trim();
                    if text.is_empty() {
                        self.world
                            .queue_system(self.actor, SendPrompt { actor: self.actor });
                    } else {
                        input.try_send(Input::new(self.actor, text));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    break Disconnect::IdleTimeout
                }
                Err(e) => break Disconnect::Error(e.kind()),
            }
        };

        tracing::debug!(actor = %self.actor, %reason, "connection worker stopping");
        self.world
            .queue_system(self.actor, PlayerQuit { actor: self.actor });
        reason
    }

    /// Arm the configured idle timeout on `stream` and read it to the end.
    pub fn run_stream(&self, stream: TcpStream) -> io::Result<Disconnect> {
        stream.set_read_timeout(self.world.config().idle_timeout())?;
        Ok(self.run(BufReader::new(stream)))
    }
}
