//! Background entity reader.
//!
//! A worker thread polls the target: it runs a requested one-shot class-name
//! scan, then (if enabled and a chain is configured) one entity read cycle,
//! then sleeps for the configured interval. Results are published as a whole
//! under one lock; callers only ever get copies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::heap::{EntityData, EntityOffsets, OopConfig, read_entities};
use crate::memory::QueryMemory;
use crate::memory::layout::timing::{LOG_EVERY_CYCLES, READ_INTERVAL_MS};
use crate::scan::{CLASS_SIGNATURES, MemoryScanner, StringFind, scan_strings};
use crate::shutdown::ShutdownSignal;

/// Published while the class-name scan runs.
const STRING_SCAN_STATUS: &str = "Scanning for JVM class strings...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ReaderState {
    Idle,
    Running,
    Stopped,
}

/// Configuration read by the worker at the top of every iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderSettings {
    pub oop: OopConfig,
    pub offsets: EntityOffsets,
    pub interval: Duration,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            oop: OopConfig::default(),
            offsets: EntityOffsets::default(),
            interval: Duration::from_millis(READ_INTERVAL_MS),
        }
    }
}

/// Everything the worker publishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub entities: Vec<EntityData>,
    pub string_finds: Vec<StringFind>,
    pub status: String,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            string_finds: Vec::new(),
            status: ReaderState::Idle.to_string(),
        }
    }
}

struct Shared {
    snapshot: Mutex<Snapshot>,
    settings: Mutex<ReaderSettings>,
    string_scan_requested: AtomicBool,
    entity_read_enabled: AtomicBool,
    signal: ShutdownSignal,
}

impl Shared {
    fn snapshot(&self) -> MutexGuard<'_, Snapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn settings(&self) -> MutexGuard<'_, ReaderSettings> {
        self.settings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_status(&self, status: impl Into<String>) {
        self.snapshot().status = status.into();
    }
}

/// Owns the worker thread and the state it publishes.
///
/// `Idle -> Running -> Stopped`. `Stopped` is terminal; a new reader is
/// needed to attach again.
pub struct EntityReader {
    shared: Arc<Shared>,
    state: ReaderState,
    worker: Option<JoinHandle<()>>,
}

impl EntityReader {
    pub fn new(settings: ReaderSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                snapshot: Mutex::new(Snapshot::default()),
                settings: Mutex::new(settings),
                string_scan_requested: AtomicBool::new(false),
                entity_read_enabled: AtomicBool::new(false),
                signal: ShutdownSignal::new(),
            }),
            state: ReaderState::Idle,
            worker: None,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Spawn the worker against `reader`. No-op unless `Idle`.
    pub fn start<R>(&mut self, reader: Arc<R>) -> Result<()>
    where
        R: QueryMemory + Send + Sync + 'static,
    {
        match self.state {
            ReaderState::Running => return Ok(()),
            ReaderState::Stopped => {
                warn!("Entity reader already stopped, ignoring start");
                return Ok(());
            }
            ReaderState::Idle => {}
        }

        self.shared.set_status(ReaderState::Running.to_string());
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("entity-reader".to_string())
            .spawn(move || run(reader.as_ref(), &shared))?;

        self.worker = Some(handle);
        self.state = ReaderState::Running;
        Ok(())
    }

    /// Stop the worker and wait for it to exit. Nothing is published after
    /// this returns. No-op unless `Running`.
    pub fn stop(&mut self) {
        if self.state != ReaderState::Running {
            return;
        }

        self.shared.signal.trigger();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("Entity reader thread panicked");
            }
        }

        self.state = ReaderState::Stopped;
        self.shared.set_status(ReaderState::Stopped.to_string());
    }

    pub fn set_entity_read_enabled(&self, enabled: bool) {
        self.shared
            .entity_read_enabled
            .store(enabled, Ordering::SeqCst);
    }

    pub fn is_entity_read_enabled(&self) -> bool {
        self.shared.entity_read_enabled.load(Ordering::SeqCst)
    }

    /// Ask the worker to run the class-name scan on its next iteration.
    pub fn request_string_scan(&self) {
        self.shared
            .string_scan_requested
            .store(true, Ordering::SeqCst);
        self.shared.signal.wake();
    }

    pub fn settings(&self) -> ReaderSettings {
        self.shared.settings().clone()
    }

    /// Replace the settings; the worker picks them up on its next iteration.
    pub fn set_settings(&self, settings: ReaderSettings) {
        *self.shared.settings() = settings;
    }

    pub fn update_settings(&self, f: impl FnOnce(&mut ReaderSettings)) {
        f(&mut self.shared.settings());
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.snapshot().clone()
    }

    pub fn entities(&self) -> Vec<EntityData> {
        self.shared.snapshot().entities.clone()
    }

    pub fn string_finds(&self) -> Vec<StringFind> {
        self.shared.snapshot().string_finds.clone()
    }

    pub fn status(&self) -> String {
        self.shared.snapshot().status.clone()
    }
}

impl Default for EntityReader {
    fn default() -> Self {
        Self::new(ReaderSettings::default())
    }
}

impl Drop for EntityReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<R: QueryMemory>(reader: &R, shared: &Shared) {
    info!("Entity reader started");
    let mut cycles = 0u32;

    while !shared.signal.is_shutdown() {
        let generation = shared.signal.wake_count();
        let settings = shared.settings().clone();

        if shared.string_scan_requested.swap(false, Ordering::SeqCst) {
            string_scan(reader, shared);
        }

        if shared.entity_read_enabled.load(Ordering::SeqCst) && settings.offsets.chain.is_configured()
        {
            cycles = cycles.wrapping_add(1);
            entity_cycle(reader, shared, &settings, cycles % LOG_EVERY_CYCLES == 0);
        }

        if shared.signal.wait_since(generation, settings.interval) {
            break;
        }
    }

    info!("Entity reader stopped");
}

fn string_scan<R: QueryMemory>(reader: &R, shared: &Shared) {
    shared.set_status(STRING_SCAN_STATUS);

    let scanner = MemoryScanner::new(reader).with_cancel(shared.signal.as_atomic());
    let finds = scan_strings(&scanner, CLASS_SIGNATURES);

    let mut snapshot = shared.snapshot();
    snapshot.status = format!("String scan done ({} hits)", finds.len());
    snapshot.string_finds = finds;
}

fn entity_cycle<R: QueryMemory>(reader: &R, shared: &Shared, settings: &ReaderSettings, dump: bool) {
    match read_entities(reader, &settings.oop, &settings.offsets) {
        Ok(list) => {
            if dump {
                for e in list.entities.iter().filter(|e| e.valid) {
                    debug!("Entity #{} at X:{:.2} Y:{:.2} Z:{:.2}", e.index, e.x, e.y, e.z);
                }
                debug!("--- {}/{} entities valid ---", list.valid_count(), list.count);
            }

            let status = list.status();
            let mut snapshot = shared.snapshot();
            snapshot.entities = list.entities;
            snapshot.status = status;
        }
        Err(e) => {
            debug!("Entity read failed: {}", e);
            let mut snapshot = shared.snapshot();
            snapshot.entities.clear();
            snapshot.status = e.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::PointerChain;
    use crate::memory::{MemoryRegion, MockMemoryBuilder, MockMemoryReader, ReadMemory};
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::time::Instant;

    /// Blocks the first region query until released, so a test can observe
    /// the worker mid-scan.
    struct PausedScan {
        inner: MockMemoryReader,
        entered: Mutex<Option<Sender<()>>>,
        release: Mutex<Receiver<()>>,
    }

    impl ReadMemory for PausedScan {
        fn read_into(&self, address: u64, buf: &mut [u8]) -> Result<usize> {
            self.inner.read_into(address, buf)
        }
    }

    impl QueryMemory for PausedScan {
        fn address_bounds(&self) -> (u64, u64) {
            self.inner.address_bounds()
        }

        fn query_region(&self, address: u64) -> Option<MemoryRegion> {
            if let Some(entered) = self.entered.lock().unwrap().take() {
                entered.send(()).unwrap();
                let _ = self.release.lock().unwrap().recv();
            }
            self.inner.query_region(address)
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn settings(chain_base: u64) -> ReaderSettings {
        ReaderSettings {
            offsets: EntityOffsets {
                chain: PointerChain::new(chain_base, vec![0]),
                ..EntityOffsets::default()
            },
            interval: Duration::from_millis(5),
            ..ReaderSettings::default()
        }
    }

    /// One valid entity at 0x4000 reachable from a chain based at 0x1000.
    fn world() -> Arc<MockMemoryReader> {
        Arc::new(
            MockMemoryBuilder::new()
                .write_u64(0x1000, 0x2000)
                .write_i32(0x2010, 1)
                .write_u32(0x2014, 0x3000 >> 3)
                .write_u32(0x3010, 0x4000 >> 3)
                .write_f64(0x4098, 12.0)
                .write_f64(0x40A0, 64.0)
                .write_f64(0x40A8, -7.5)
                .build(),
        )
    }

    #[test]
    fn test_lifecycle() {
        let mut reader = EntityReader::new(settings(0x1000));
        assert_eq!(reader.state(), ReaderState::Idle);
        assert_eq!(reader.status(), "Idle");

        reader.stop();
        assert_eq!(reader.state(), ReaderState::Idle);

        let mock = world();
        reader.start(Arc::clone(&mock)).unwrap();
        assert_eq!(reader.state(), ReaderState::Running);
        reader.start(Arc::clone(&mock)).unwrap();
        assert_eq!(reader.state(), ReaderState::Running);

        reader.stop();
        assert_eq!(reader.state(), ReaderState::Stopped);
        assert_eq!(reader.status(), "Stopped");

        reader.start(mock).unwrap();
        assert_eq!(reader.state(), ReaderState::Stopped);
    }

    #[test]
    fn test_reads_entities_when_enabled() {
        let mut reader = EntityReader::new(settings(0x1000));
        reader.start(world()).unwrap();
        reader.set_entity_read_enabled(true);

        assert!(wait_until(|| !reader.entities().is_empty()));
        let entities = reader.entities();
        assert_eq!(entities.len(), 1);
        assert!(entities[0].valid);
        assert_eq!(entities[0].position().to_array(), [12.0, 64.0, -7.5]);
        assert_eq!(reader.status(), "Reading 1 entities (1 valid) @ 0x2000");

        reader.stop();
    }

    #[test]
    fn test_disabled_reader_does_not_read() {
        let mock = world();
        let mut reader = EntityReader::new(settings(0x1000));
        reader.start(Arc::clone(&mock)).unwrap();

        thread::sleep(Duration::from_millis(50));
        reader.stop();
        assert!(mock.read_log().is_empty());
        assert!(reader.entities().is_empty());
    }

    #[test]
    fn test_unconfigured_chain_is_idle() {
        let mock = world();
        let mut reader = EntityReader::new(settings(0));
        reader.start(Arc::clone(&mock)).unwrap();
        reader.set_entity_read_enabled(true);

        thread::sleep(Duration::from_millis(50));
        reader.stop();
        assert!(mock.read_log().is_empty());
    }

    #[test]
    fn test_chain_failure_clears_snapshot() {
        let mut reader = EntityReader::new(settings(0x1000));
        reader.start(world()).unwrap();
        reader.set_entity_read_enabled(true);
        assert!(wait_until(|| !reader.entities().is_empty()));

        // Base now points at unmapped memory
        reader.update_settings(|s| s.offsets.chain.base = 0x9000);
        assert!(wait_until(|| reader.status() == "Chain resolved to null"));
        assert!(reader.entities().is_empty());

        reader.stop();
    }

    #[test]
    fn test_string_scan_request() {
        let mock = Arc::new(
            MockMemoryBuilder::new()
                .write_bytes(0x1000, b"net/minecraft/entity/Entity")
                .build(),
        );
        let mut reader = EntityReader::new(ReaderSettings {
            interval: Duration::from_secs(60),
            ..ReaderSettings::default()
        });
        reader.start(mock).unwrap();
        reader.request_string_scan();

        assert!(wait_until(|| !reader.string_finds().is_empty()));
        let finds = reader.string_finds();
        assert_eq!(finds.len(), 1);
        assert_eq!(finds[0].address, 0x1000);
        assert_eq!(finds[0].text, "net/minecraft/entity/Entity");
        assert_eq!(reader.status(), "String scan done (1 hits)");

        reader.stop();
    }

    #[test]
    fn test_status_while_string_scan_runs() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let memory = Arc::new(PausedScan {
            inner: MockMemoryBuilder::new()
                .write_bytes(0x1000, b"net/minecraft/entity/Entity")
                .build(),
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(release_rx),
        });

        let mut reader = EntityReader::new(ReaderSettings {
            interval: Duration::from_secs(60),
            ..ReaderSettings::default()
        });
        reader.start(memory).unwrap();
        reader.request_string_scan();

        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(reader.status(), STRING_SCAN_STATUS);
        assert!(reader.string_finds().is_empty());

        release_tx.send(()).unwrap();
        assert!(wait_until(|| reader.status() == "String scan done (1 hits)"));
        assert_eq!(reader.string_finds().len(), 1);

        reader.stop();
    }

    #[test]
    fn test_no_reads_after_stop() {
        let mock = world();
        let mut reader = EntityReader::new(settings(0x1000));
        reader.start(Arc::clone(&mock)).unwrap();
        reader.set_entity_read_enabled(true);
        assert!(wait_until(|| !mock.read_log().is_empty()));

        reader.stop();
        let reads = mock.read_log().len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(mock.read_log().len(), reads);
    }

    #[test]
    fn test_settings_roundtrip() {
        let reader = EntityReader::default();
        let mut updated = reader.settings();
        updated.oop.compressed = false;
        reader.set_settings(updated.clone());
        assert_eq!(reader.settings(), updated);
    }
}
