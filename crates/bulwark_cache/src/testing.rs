// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;

/// Plain-text log lines written while [`capture`] ran.
#[derive(Debug)]
pub(crate) struct CapturedLog(String);

impl CapturedLog {
    pub fn assert_contains(&self, expected: &str) {
        assert!(self.0.contains(expected), "expected '{expected}' in log output:\n{}", self.0);
    }
}

pub(crate) fn capture(f: impl FnOnce()) -> CapturedLog {
    let buffer = Buffer::default();
    let layer = tracing_subscriber::fmt::layer().with_writer(buffer.clone()).with_ansi(false);
    tracing::subscriber::with_default(tracing_subscriber::registry().with(layer), f);
    CapturedLog(String::from_utf8_lossy(&buffer.0.lock()).into_owned())
}

#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for Buffer {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl MakeWriter<'_> for Buffer {
    type Writer = Self;

    fn make_writer(&self) -> Self::Writer {
        self.clone()
    }
}
