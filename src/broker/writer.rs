//! Lifecycle-safe byte writer over a [`BrokerProducer`]
//!
//! States are open, closing and closed. `close` marks the writer closed and
//! then waits for every in-flight `write` to return. A `write` that starts
//! after the mark fails with [`LoggerError::InvalidState`].

use super::producer::BrokerProducer;
use crate::core::{LoggerError, Result};
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct WriterState {
    in_flight: usize,
    closed: bool,
}

/// Streaming `write` contract for sinks that only deal in byte buffers
///
/// Each buffer must hold exactly one JSON record.
///
/// # Example
///
/// ```
/// use rust_kafka_logger::broker::{BrokerProducer, BrokerWriter, ChannelClient, ProducerConfig};
/// use std::sync::Arc;
///
/// let (client, broker) = ChannelClient::bounded(4);
/// let producer = BrokerProducer::with_client(ProducerConfig::default(), None, Box::new(client)).unwrap();
/// let writer = BrokerWriter::new(Arc::new(producer));
///
/// writer.write(br#"{"message":"hi","level":"info"}"#).unwrap();
/// writer.close().unwrap();
/// assert!(writer.write(b"{}").is_err());
/// assert_eq!(broker.len(), 1);
/// ```
pub struct BrokerWriter {
    producer: Arc<BrokerProducer>,
    state: Mutex<WriterState>,
    drained: Condvar,
}

/// Decrements the in-flight count when a write returns, on any path
struct InFlight<'a> {
    writer: &'a BrokerWriter,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.writer.state.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.writer.drained.notify_all();
        }
    }
}

impl BrokerWriter {
    pub fn new(producer: Arc<BrokerProducer>) -> Self {
        Self {
            producer,
            state: Mutex::new(WriterState::default()),
            drained: Condvar::new(),
        }
    }

    pub fn producer(&self) -> &Arc<BrokerProducer> {
        &self.producer
    }

    /// Send one record; returns the number of bytes consumed
    pub fn write(&self, payload: &[u8]) -> Result<usize> {
        let _in_flight = self.begin()?;
        self.producer.send_message(payload)?;
        Ok(payload.len())
    }

    /// Mark the writer closed and wait for in-flight writes
    ///
    /// A second call fails with [`LoggerError::AlreadyClosed`].
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(LoggerError::AlreadyClosed);
        }
        state.closed = true;
        while state.in_flight > 0 {
            self.drained.wait(&mut state);
        }
        Ok(())
    }

    /// Like [`close`](Self::close), giving up on stragglers after `timeout`
    ///
    /// The writer stays closed either way; a timeout is reported as an error
    /// naming how many writes were still running.
    pub fn close_with_timeout(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        if state.closed {
            return Err(LoggerError::AlreadyClosed);
        }
        state.closed = true;
        while state.in_flight > 0 {
            if self.drained.wait_until(&mut state, deadline).timed_out() {
                return Err(LoggerError::writer(format!(
                    "close timed out with {} writes in flight",
                    state.in_flight
                )));
            }
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    fn begin(&self) -> Result<InFlight<'_>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(LoggerError::InvalidState);
        }
        state.in_flight += 1;
        Ok(InFlight { writer: self })
    }
}

impl io::Write for &BrokerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        BrokerWriter::write(*self, buf).map_err(|e| match e {
            LoggerError::InvalidState => io::Error::new(io::ErrorKind::InvalidInput, e),
            other => io::Error::other(other),
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for BrokerWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BrokerWriter")
            .field("in_flight", &state.in_flight)
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerClient, ChannelClient, ProducerConfig, ProducerMessage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    /// Client that takes a while to accept each message
    struct SlowClient {
        delay: Duration,
        accepted: Arc<AtomicUsize>,
    }

    impl BrokerClient for SlowClient {
        fn enqueue(&self, _message: ProducerMessage) -> Result<()> {
            thread::sleep(self.delay);
            self.accepted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn slow_writer(delay: Duration) -> (Arc<BrokerWriter>, Arc<AtomicUsize>) {
        let accepted = Arc::new(AtomicUsize::new(0));
        let client = SlowClient {
            delay,
            accepted: Arc::clone(&accepted),
        };
        let producer =
            BrokerProducer::with_client(ProducerConfig::default(), None, Box::new(client)).unwrap();
        (Arc::new(BrokerWriter::new(Arc::new(producer))), accepted)
    }

    #[test]
    fn test_close_waits_for_in_flight_writes() {
        const WRITERS: usize = 8;
        let (writer, accepted) = slow_writer(Duration::from_millis(100));
        let barrier = Arc::new(Barrier::new(WRITERS + 1));

        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                let writer = Arc::clone(&writer);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    writer.write(format!(r#"{{"message":"m{}"}}"#, i).as_bytes())
                })
            })
            .collect();

        barrier.wait();
        while writer.in_flight() < WRITERS {
            thread::yield_now();
        }

        writer.close().unwrap();
        assert_eq!(accepted.load(Ordering::SeqCst), WRITERS);
        assert_eq!(writer.in_flight(), 0);

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
    }

    #[test]
    fn test_write_during_close_is_rejected() {
        let (writer, accepted) = slow_writer(Duration::from_millis(150));

        let busy = {
            let writer = Arc::clone(&writer);
            thread::spawn(move || writer.write(br#"{"message":"slow"}"#))
        };
        while writer.in_flight() == 0 {
            thread::yield_now();
        }

        let closer = {
            let writer = Arc::clone(&writer);
            thread::spawn(move || writer.close())
        };
        while !writer.is_closed() {
            thread::yield_now();
        }

        assert!(matches!(
            writer.write(br#"{"message":"late"}"#),
            Err(LoggerError::InvalidState)
        ));
        closer.join().unwrap().unwrap();
        busy.join().unwrap().unwrap();
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_second_close_fails() {
        let (writer, _) = slow_writer(Duration::ZERO);
        writer.close().unwrap();
        assert!(matches!(writer.close(), Err(LoggerError::AlreadyClosed)));
        assert!(matches!(
            writer.close_with_timeout(Duration::from_millis(1)),
            Err(LoggerError::AlreadyClosed)
        ));
    }

    #[test]
    fn test_failed_write_still_releases_slot() {
        let (client, _broker) = ChannelClient::bounded(4);
        let producer =
            BrokerProducer::with_client(ProducerConfig::default(), None, Box::new(client)).unwrap();
        let writer = BrokerWriter::new(Arc::new(producer));

        assert!(writer.write(b"not json").is_err());
        assert_eq!(writer.in_flight(), 0);
        writer.close().unwrap();
    }

    #[test]
    fn test_close_with_timeout_reports_stragglers() {
        let (writer, _) = slow_writer(Duration::from_millis(300));
        let busy = {
            let writer = Arc::clone(&writer);
            thread::spawn(move || writer.write(br#"{"message":"slow"}"#))
        };
        while writer.in_flight() == 0 {
            thread::yield_now();
        }

        assert!(matches!(
            writer.close_with_timeout(Duration::from_millis(10)),
            Err(LoggerError::WriterError(_))
        ));
        assert!(writer.is_closed());
        busy.join().unwrap().unwrap();
    }

    #[test]
    fn test_io_write_maps_invalid_state() {
        use std::io::Write;

        let (writer, _) = slow_writer(Duration::ZERO);
        let mut handle: &BrokerWriter = &writer;
        handle.write_all(br#"{"message":"ok"}"#).unwrap();
        writer.close().unwrap();

        let err = Write::write(&mut handle, b"{}").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
