//! Pool exhaustion must name the owners of the outstanding packets.
//!
//! Runs in its own test binary because it installs the global logger.

use gpr_drv::{AllocArgs, Driver, DriverConfig, DynamicPoolConfig, Error, PoolKind, StaticPoolConfig};
use gpr_memq::OwnerCount;
use gpr_packet::{DomainId, HeapIndex};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::Mutex;

struct CaptureLogger {
    lines: Mutex<Vec<(Level, String)>>,
}

impl CaptureLogger {
    const fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
        }
    }

    fn take(&self) -> Vec<(Level, String)> {
        std::mem::take(&mut *self.lines.lock().unwrap())
    }
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.lines
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger::new();

/// Both scenarios share the global logger, so they run in one test.
#[test]
fn exhaustion_reports_every_owner() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Warn);

    static_pool_names_its_owners();
    dynamic_pool_names_its_owners();
}

fn args(src_port: u32, payload_size: usize) -> AllocArgs {
    AllocArgs {
        src_domain: DomainId::APPS,
        src_port,
        dst_domain: DomainId::ADSP,
        dst_port: 0x99,
        payload_size,
        ..AllocArgs::default()
    }
}

fn static_pool_names_its_owners() {
    let config = DriverConfig::default()
        .with_static_pools([StaticPoolConfig::units(128, 4, HeapIndex::Default)])
        .with_dynamic_pools([]);
    let drv = Driver::init(config, []).unwrap();

    let held: Vec<_> = (1..=4)
        .map(|port| drv.alloc_ext(&args(0x1000 + port, 16)).unwrap())
        .collect();
    LOGGER.take();

    assert_eq!(drv.alloc_ext(&args(0x2000, 16)).err(), Some(Error::ResourceExhausted));

    let lines = LOGGER.take();
    let errors: Vec<_> = lines
        .iter()
        .filter(|(level, _)| *level == Level::Error)
        .map(|(_, line)| line.as_str())
        .collect();
    assert_eq!(
        errors,
        [
            "memq: all 4 units of 128 bytes in use by 4 owner(s)",
            "memq: owner 0x00001001 holds 1 unit(s)",
            "memq: owner 0x00001002 holds 1 unit(s)",
            "memq: owner 0x00001003 holds 1 unit(s)",
            "memq: owner 0x00001004 holds 1 unit(s)",
        ]
    );
    assert!(
        lines
            .iter()
            .any(|(level, line)| *level == Level::Warn && line.contains("no pool can serve"))
    );

    let info = drv.pool_info()[0];
    assert_eq!(info.kind, PoolKind::Static);
    assert_eq!(
        drv.owner_report(&info),
        (0x1001..=0x1004)
            .map(|owner| OwnerCount { owner, count: 1 })
            .collect::<Vec<_>>()
    );

    for p in held {
        drv.free(p).unwrap();
    }
}

fn dynamic_pool_names_its_owners() {
    let config = DriverConfig::default()
        .with_static_pools([])
        .with_dynamic_pools([DynamicPoolConfig {
            unit_size: 256,
            max_count: 3,
            heap_index: HeapIndex::Default,
        }]);
    let drv = Driver::init(config, []).unwrap();

    let held: Vec<_> = [0x30, 0x30, 0x31]
        .into_iter()
        .map(|port| drv.alloc_ext(&args(port, 64)).unwrap())
        .collect();
    LOGGER.take();

    assert_eq!(drv.alloc(64, HeapIndex::Default).err(), Some(Error::ResourceExhausted));

    let errors: Vec<_> = LOGGER
        .take()
        .into_iter()
        .filter(|(level, _)| *level == Level::Error)
        .map(|(_, line)| line)
        .collect();
    assert_eq!(
        errors,
        [
            "drv: dynamic pool 0: all 3 packets of up to 256 bytes in use by 2 owner(s)",
            "drv: owner 0x00000030 holds 2 packet(s)",
            "drv: owner 0x00000031 holds 1 packet(s)",
        ]
    );

    for p in held {
        drv.free(p).unwrap();
    }
}
