//! Consumer thread pumping a sample channel into a sink
//!
//! Background producers push into a shared [`SampleChannel`]; one collector
//! thread drains it into whatever [`SampleSink`] the daemon wired up (the
//! data cache in production, stdout in the headless smoke binary).

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::channel::SampleChannel;
use crate::ports::SampleSink;

/// Owns the consumer thread for one channel/sink pair.
pub struct Collector<T> {
    channel: Arc<SampleChannel<T>>,
    handle: Option<JoinHandle<u64>>,
}

impl<T: Send + 'static> Collector<T> {
    /// Spawn the named consumer thread. It pops until the channel finishes.
    ///
    /// # Errors
    /// Propagates the OS error if the thread cannot be spawned.
    pub fn spawn(
        channel: Arc<SampleChannel<T>>,
        sink: Arc<dyn SampleSink<T>>,
    ) -> io::Result<Self> {
        let worker = Arc::clone(&channel);
        let handle = thread::Builder::new().name("sample-collector".to_string()).spawn(
            move || {
                let mut forwarded: u64 = 0;
                while let Some(sample) = worker.pop() {
                    sink.accept(sample);
                    forwarded += 1;
                }
                log::debug!("sample channel finished, collector exiting after {forwarded} samples");
                forwarded
            },
        )?;
        Ok(Self { channel, handle: Some(handle) })
    }

    /// Finish the channel and join the consumer thread. Returns how many
    /// samples were forwarded over the collector's lifetime.
    pub fn shutdown(mut self) -> u64 {
        self.channel.finish();
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(forwarded)) => forwarded,
            Some(Err(_)) => {
                log::error!("sample collector thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl<T> Drop for Collector<T> {
    fn drop(&mut self) {
        // A dropped collector must not leave its thread blocked forever.
        self.channel.finish();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
