//! Batch pipeline: one dispatcher thread, a bounded task queue and a fixed
//! pool of decode workers.
//!
//! Workers share nothing but the queue and the outcome channel. Every task
//! ends as exactly one [`TaskOutcome`], collected on the calling thread into a
//! [`BatchReport`]. Clearing the `running` flag stops dispatch; workers finish
//! the file in hand and exit.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use crate::config::{prepare_output_dir, DecodeConfig};
use crate::decoder::{decode_stream, StreamError};
use crate::dispatch::{DecodeTask, Dispatcher};
use crate::error::{BatchError, TaskError};
use crate::recovery::find_decode_key;
use crate::report::{BatchReport, DecodedFile, TaskOutcome};
use crate::signatures::SignatureSet;

const OUTCOME_CHANNEL_CAPACITY: usize = 256;
const SEND_POLL_INTERVAL: Duration = Duration::from_millis(50);
const STAGING_PREFIX: &str = ".dexor-";

/// Decodes every eligible file of one input directory.
pub struct BatchDecoder<'a> {
    config: DecodeConfig,
    signatures: &'a SignatureSet,
}

impl<'a> BatchDecoder<'a> {
    pub fn new(config: DecodeConfig, signatures: &'a SignatureSet) -> Result<Self, BatchError> {
        config.validate(signatures)?;
        Ok(Self { config, signatures })
    }

    /// Opens the input directory, prepares the output directory and runs the batch.
    ///
    /// Only configuration problems are errors; per-file failures land in the report.
    pub fn run<F>(&self, running: &AtomicBool, observer: F) -> Result<BatchReport, BatchError>
    where
        F: FnMut(&TaskOutcome),
    {
        let mut dispatcher =
            Dispatcher::open(&self.config.input_dir, &self.config.input_extension)?;
        prepare_output_dir(&self.config.output_dir)?;

        let mut report = self.run_tasks(&mut dispatcher, running, observer)?;
        report.skipped = dispatcher.skipped();
        Ok(report)
    }

    /// Runs the pool over an arbitrary task source.
    ///
    /// The output directory must already exist.
    pub fn run_tasks<I, F>(
        &self,
        tasks: I,
        running: &AtomicBool,
        mut observer: F,
    ) -> Result<BatchReport, BatchError>
    where
        I: IntoIterator<Item = DecodeTask>,
        I::IntoIter: Send,
        F: FnMut(&TaskOutcome),
    {
        let start_time = Instant::now();
        let mut report =
            BatchReport::new(self.config.input_dir.clone(), self.config.output_dir.clone());

        info!(
            "decoding {} with {} workers into {}",
            self.config.input_dir.display(),
            self.config.parallelism,
            self.config.output_dir.display()
        );

        let (task_tx, task_rx) = bounded::<DecodeTask>(self.config.queue_capacity);
        let (outcome_tx, outcome_rx) = bounded::<TaskOutcome>(OUTCOME_CHANNEL_CAPACITY);
        let tasks = tasks.into_iter();
        let mut interrupted = false;

        thread::scope(|scope| -> Result<(), BatchError> {
            let mut worker_handles = Vec::with_capacity(self.config.parallelism);
            for worker_id in 0..self.config.parallelism {
                let rx = task_rx.clone();
                let tx = outcome_tx.clone();
                let name = format!("decode-worker-{}", worker_id);

                let handle = thread::Builder::new()
                    .name(name.clone())
                    .spawn_scoped(scope, move || self.worker_loop(rx, tx, running))
                    .map_err(|source| BatchError::Spawn { name, source })?;
                worker_handles.push(handle);
            }

            drop(task_rx);
            drop(outcome_tx);

            let producer_handle = thread::Builder::new()
                .name("decode-dispatch".to_string())
                .spawn_scoped(scope, move || feed_queue(tasks, task_tx, running))
                .map_err(|source| BatchError::Spawn {
                    name: "decode-dispatch".to_string(),
                    source,
                })?;

            for outcome in outcome_rx.iter() {
                observer(&outcome);
                report.record(outcome);
            }

            match producer_handle.join() {
                Ok((sent, was_interrupted)) => {
                    report.dispatched = sent;
                    interrupted = was_interrupted;
                }
                Err(e) => error!("dispatch thread panicked: {:?}", e),
            }

            for (i, handle) in worker_handles.into_iter().enumerate() {
                if let Err(e) = handle.join() {
                    error!("worker thread {} panicked: {:?}", i, e);
                }
            }

            Ok(())
        })?;

        // A flag cleared after the last outcome does not count as a cancellation.
        report.cancelled = !running.load(Ordering::SeqCst)
            && (interrupted || report.processed() < report.dispatched);
        report.duration = start_time.elapsed();

        info!(
            "batch finished: {} decoded, {} failed in {:.2}s{}",
            report.decoded.len(),
            report.failed.len(),
            report.duration.as_secs_f64(),
            if report.cancelled { " (cancelled)" } else { "" }
        );

        Ok(report)
    }

    fn worker_loop(&self, rx: Receiver<DecodeTask>, tx: Sender<TaskOutcome>, running: &AtomicBool) {
        for task in rx.iter() {
            if !running.load(Ordering::SeqCst) {
                break;
            }

            let result = decode_file(
                &task,
                self.signatures,
                &self.config.output_dir,
                self.config.prefix_probe_size,
            );

            if let Err(e) = &result {
                debug!("skipping {}: {}", task.source_path.display(), e);
            }

            let outcome = TaskOutcome {
                source: task.source_path,
                result,
            };
            if tx.send(outcome).is_err() {
                break;
            }
        }
    }
}

/// Pushes tasks into the queue until the source is exhausted or `running` is cleared.
///
/// Returns the number of tasks sent and whether the flag cut dispatch short.
fn feed_queue<I>(tasks: I, tx: Sender<DecodeTask>, running: &AtomicBool) -> (usize, bool)
where
    I: Iterator<Item = DecodeTask>,
{
    let mut sent = 0usize;
    let mut interrupted = false;

    'outer: for task in tasks {
        let mut pending = task;
        loop {
            if !running.load(Ordering::SeqCst) {
                interrupted = true;
                break 'outer;
            }
            match tx.send_timeout(pending, SEND_POLL_INTERVAL) {
                Ok(()) => {
                    sent += 1;
                    break;
                }
                Err(SendTimeoutError::Timeout(returned)) => pending = returned,
                Err(SendTimeoutError::Disconnected(_)) => break 'outer,
            }
        }
    }

    debug!("dispatcher finished after {} tasks", sent);
    (sent, interrupted)
}

/// Recovers the key of one file and writes its decoded copy.
///
/// The output is staged in a temporary file inside `output_dir` and renamed
/// into place only once fully written, so a failed task leaves nothing behind.
pub fn decode_file(
    task: &DecodeTask,
    signatures: &SignatureSet,
    output_dir: &Path,
    probe_size: usize,
) -> Result<DecodedFile, TaskError> {
    let path = &task.source_path;
    let read_err = |source: io::Error| TaskError::Read {
        path: path.clone(),
        source,
    };

    let mut source = File::open(path).map_err(read_err)?;

    let mut prefix = Vec::new();
    (&mut source)
        .take(probe_size as u64)
        .read_to_end(&mut prefix)
        .map_err(read_err)?;

    let found = find_decode_key(&prefix, signatures)?;
    debug!(
        "{}: key {:#04x}, format {}",
        path.display(),
        found.key,
        found.extension()
    );

    source.rewind().map_err(read_err)?;

    let output = output_dir.join(task.output_name(found.extension()));
    let write_err = |source: io::Error| TaskError::Write {
        path: output.clone(),
        source,
    };

    let staging = staging_file(output_dir).map_err(write_err)?;
    let mut writer = DigestWriter::new(BufWriter::new(staging));

    let bytes = decode_stream(&mut source, &mut writer, found.key).map_err(|e| match e {
        StreamError::Read(source) => read_err(source),
        StreamError::Write(source) => write_err(source),
    })?;

    let (buffered, digest) = writer.finish();
    let staging = buffered
        .into_inner()
        .map_err(|e| write_err(e.into_error()))?;
    staging.as_file().sync_all().map_err(write_err)?;
    staging.persist(&output).map_err(|e| write_err(e.error))?;

    debug!("output file: {}", output.display());

    Ok(DecodedFile {
        source: path.clone(),
        output,
        key: found.key,
        extension: found.extension().to_string(),
        bytes,
        sha256: hex::encode(digest),
    })
}

/// Creates the temporary file an output is written to before the final rename.
///
/// On Unix the file is opened with mode 0666 (less the umask), the same as a
/// freshly created regular file.
fn staging_file(dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(STAGING_PREFIX);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}

/// Hashes everything written through it.
struct DigestWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> DigestWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finish(self) -> (W, [u8; 32]) {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&self.hasher.finalize());
        (self.inner, digest)
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
