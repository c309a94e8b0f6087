#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mysql_middleware::{ConnectionManager, ConnectionState};
use tracing_subscriber::fmt::writer::MakeWriter;

/// In-memory log sink for asserting on formatted tracing output.
#[derive(Clone, Default)]
pub struct LogWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogWriter {
    pub fn contents(&self) -> String {
        let buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

pub struct LogWriterGuard {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriterGuard {
            buf: Arc::clone(&self.buf),
        }
    }
}

impl Write for LogWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Subscriber writing INFO and above into `writer`, without colors.
pub fn capture_subscriber(writer: LogWriter) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish()
}

/// Poll until the manager reaches `state`; panics after one second.
pub async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while manager.state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("manager stuck in {} waiting for {state}", manager.state()));
}
