//! A log sink that calls back into the driver must not find a pool lock held.
//!
//! Runs in its own test binary because it installs the global logger.

use gpr_drv::{Driver, DriverConfig, DynamicPoolConfig, Error, StaticPoolConfig};
use gpr_packet::{HeapIndex, Packet};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::{Mutex, OnceLock};

/// On every error line, reads the pool state through the driver it logs for.
struct InspectingLogger {
    driver: OnceLock<Driver>,
    seen: Mutex<Vec<(String, Vec<usize>)>>,
}

impl InspectingLogger {
    const fn new() -> Self {
        Self {
            driver: OnceLock::new(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn take(&self) -> Vec<(String, Vec<usize>)> {
        std::mem::take(&mut *self.seen.lock().unwrap())
    }
}

impl Log for InspectingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Error
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(drv) = self.driver.get() else {
            return;
        };
        let pools = drv.pool_info();
        let free: Vec<_> = pools.iter().map(|p| p.free_count).collect();
        for info in &pools {
            let _ = drv.owner_report(info);
        }
        self.seen
            .lock()
            .unwrap()
            .push((record.args().to_string(), free));
    }

    fn flush(&self) {}
}

static LOGGER: InspectingLogger = InspectingLogger::new();

#[test]
fn error_sink_may_query_the_driver() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Error);

    let config = DriverConfig::default()
        .with_static_pools([StaticPoolConfig::units(64, 1, HeapIndex::Default)])
        .with_dynamic_pools([DynamicPoolConfig {
            unit_size: 64,
            max_count: 1,
            heap_index: HeapIndex::Default,
        }]);
    assert!(LOGGER.driver.set(Driver::init(config, []).unwrap()).is_ok());
    let drv = LOGGER.driver.get().unwrap();

    let in_static = drv.alloc(8, HeapIndex::Default).unwrap();
    let in_dynamic = drv.alloc(8, HeapIndex::Default).unwrap();
    LOGGER.take();

    // both pools run dry and report their owners
    assert_eq!(drv.alloc(8, HeapIndex::Default).err(), Some(Error::ResourceExhausted));
    let seen = LOGGER.take();
    assert!(seen.iter().any(|(line, _)| line.starts_with("memq: all 1 units of 64 bytes")));
    assert!(seen.iter().any(|(line, _)| line.starts_with("drv: dynamic pool 0: all 1 packets")));
    assert!(seen.iter().all(|(_, free)| free == &[0, 0]));

    // rejected frees are logged too
    for held in [&in_static, &in_dynamic] {
        let forged = Packet::stamped(Vec::with_capacity(64), 8, held.origin()).unwrap();
        assert_eq!(drv.free(forged), Err(Error::BadParameter));
    }
    assert_eq!(LOGGER.take().len(), 2);

    drv.free(in_static).unwrap();
    drv.free(in_dynamic).unwrap();
    assert!(LOGGER.take().is_empty());
    assert!(drv.pool_info().iter().all(|p| p.free_count == p.max_count));
}
