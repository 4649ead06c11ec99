mod common;

use common::{RecordingHypervisor, RejectingRegistry};
use ps3vram_rs::config::{DDR_SIZE, SKIP_SIZE};
use ps3vram_rs::lv1::Hypervisor;
use ps3vram_rs::lv1::call::LV1_RESOURCE_SHORTAGE;
use ps3vram_rs::mtd::{EraseInfo, EraseState, MtdOps, MtdTable};
use ps3vram_rs::{VramConfig, VramDevice, VramDriver, VramError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn small_config() -> VramConfig {
    VramConfig::new().with_grant_size(8192).with_skip_size(2048)
}

#[test]
fn initialize_with_reference_sizing() {
    let hv = RecordingHypervisor::new();
    let device = VramDevice::initialize(hv.clone(), &VramConfig::default()).unwrap();

    assert_eq!(device.total_size(), DDR_SIZE);
    assert_eq!(device.usable_size(), DDR_SIZE - SKIP_SIZE);
    assert_eq!(
        device.usable_base() as usize,
        device.real_base() as usize + SKIP_SIZE as usize
    );

    drop(device);
    assert_eq!(hv.counts(), (1, 1, 1, 1));
}

#[test]
fn failed_grant_acquires_nothing() {
    let hv = RecordingHypervisor::failing_allocate();
    let err = VramDevice::initialize(hv.clone(), &small_config()).unwrap_err();

    assert!(matches!(err, VramError::Grant(status) if status.0 == LV1_RESOURCE_SHORTAGE));
    assert_eq!(hv.counts(), (1, 0, 0, 0));
}

#[test]
fn failed_map_releases_grant_without_unmapping() {
    let hv = RecordingHypervisor::failing_ioremap();
    let err = VramDevice::initialize(hv.clone(), &small_config()).unwrap_err();

    assert!(matches!(err, VramError::Map(_)));
    assert_eq!(hv.counts(), (1, 1, 1, 0));
    assert_eq!(hv.inner.live_grants(), 0);
}

#[test]
fn driver_failed_map_releases_grant_without_unmapping() {
    let hv = RecordingHypervisor::failing_ioremap();
    let table = Arc::new(MtdTable::new());
    let mut driver = VramDriver::new(hv.clone(), table.clone(), small_config());

    assert!(matches!(driver.start(), Err(VramError::Map(_))));
    assert_eq!(hv.counts(), (1, 1, 1, 0));
    assert!(table.is_empty());

    driver.stop();
    assert_eq!(hv.counts(), (1, 1, 1, 0));
}

#[test]
fn failed_registration_unmaps_and_releases_once() {
    let hv = RecordingHypervisor::new();
    let registry = Arc::new(RejectingRegistry::default());
    let mut driver = VramDriver::new(hv.clone(), registry.clone(), small_config());

    assert!(matches!(driver.start(), Err(VramError::Registration(_))));
    assert_eq!(hv.counts(), (1, 1, 1, 1));
    assert_eq!(registry.adds.load(Ordering::SeqCst), 1);
    assert_eq!(registry.dels.load(Ordering::SeqCst), 0);
    assert!(!driver.is_registered());

    // Nothing left to tear down.
    drop(driver);
    assert_eq!(hv.counts(), (1, 1, 1, 1));
    assert_eq!(hv.inner.live_grants(), 0);
}

#[test]
fn stop_releases_in_reverse_order_exactly_once() {
    let hv = RecordingHypervisor::new();
    let table = Arc::new(MtdTable::new());
    let mut driver = VramDriver::new(hv.clone(), table.clone(), small_config());

    driver.start().unwrap();
    assert_eq!(hv.counts(), (1, 0, 1, 0));

    driver.stop();
    driver.stop();
    drop(driver);
    assert_eq!(hv.counts(), (1, 1, 1, 1));
    assert!(table.is_empty());
}

#[test]
fn driver_can_start_again_after_stop() {
    let hv = RecordingHypervisor::new();
    let table = Arc::new(MtdTable::new());
    let mut driver = VramDriver::new(hv.clone(), table.clone(), small_config());

    driver.start().unwrap();
    driver.stop();
    let index = driver.start().unwrap();
    assert_eq!(table.find("ps3vram"), Some(index));
    assert_eq!(hv.counts(), (2, 1, 2, 1));
}

#[test]
fn only_one_full_size_device_fits_in_ddr() {
    let hv = RecordingHypervisor::new();
    let table = Arc::new(MtdTable::new());

    let mut first = VramDriver::new(hv.clone(), table.clone(), VramConfig::default());
    let mut second = VramDriver::new(
        hv.clone(),
        table.clone(),
        VramConfig::default().with_name("ps3vram1"),
    );

    first.start().unwrap();
    assert!(matches!(second.start(), Err(VramError::Grant(_))));
    assert_eq!(table.len(), 1);
}

#[test]
fn scenario_clamped_write_then_refused_erase() {
    let table = Arc::new(MtdTable::new());
    let mut driver = VramDriver::new(RecordingHypervisor::new(), table.clone(), small_config());
    let index = driver.start().unwrap();
    assert_eq!(table.info(index).unwrap().size, 6144);

    let mtd = table.get(index).unwrap();
    assert_eq!(mtd.write(6000, &[0xAA; 200]).unwrap(), 144);

    let mut instr = EraseInfo::new(6000, 200);
    assert!(matches!(
        mtd.erase(&mut instr),
        Err(VramError::OutOfRange { offset: 6000, len: 200, size: 6144 })
    ));
    assert_eq!(instr.state, EraseState::Pending);

    let mut back = [0u8; 144];
    assert_eq!(mtd.read(6000, &mut back).unwrap(), 144);
    assert!(back.iter().all(|&b| b == 0xAA));
}

#[test]
fn erase_callback_runs_before_erase_returns() {
    let table = Arc::new(MtdTable::new());
    let mut driver = VramDriver::new(RecordingHypervisor::new(), table.clone(), small_config());
    let index = driver.start().unwrap();
    let mtd = table.get(index).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let flag = done.clone();
    let mut instr = EraseInfo::new(0, 4096).with_callback(move |e| {
        flag.store(e.state == EraseState::Done, Ordering::SeqCst);
    });

    mtd.erase(&mut instr).unwrap();
    assert!(done.load(Ordering::SeqCst));

    let mut back = vec![0u8; 4096];
    mtd.read(0, &mut back).unwrap();
    assert!(back.iter().all(|&b| b == 0xFF));
}

#[test]
fn skip_prefix_is_never_touched() {
    let hv = RecordingHypervisor::new();
    let device = VramDevice::initialize(hv.clone(), &small_config()).unwrap();

    device.write(0, &vec![0x11; 6144]).unwrap();
    device.erase(0, 6144).unwrap();

    // Observe the whole grant through an independent mapping.
    let whole = hv.inner.ioremap(device.ddr_lpar(), 8192).unwrap();
    let raw = unsafe { std::slice::from_raw_parts(whole.as_ptr(), 8192) };
    assert!(raw[..2048].iter().all(|&b| b == 0));
    assert!(raw[2048..].iter().all(|&b| b == 0xFF));
    hv.inner.iounmap(whole, 8192);
}

#[test]
fn concurrent_readers_and_writers_share_the_window() {
    let table = Arc::new(MtdTable::new());
    let mut driver = VramDriver::new(RecordingHypervisor::new(), table.clone(), small_config());
    let index = driver.start().unwrap();

    let handles: Vec<_> = (0..4u8)
        .map(|i| {
            let mtd = table.get(index).unwrap();
            std::thread::spawn(move || {
                let offset = u64::from(i) * 1024;
                let data = vec![i + 1; 1024];
                assert_eq!(mtd.write(offset, &data).unwrap(), 1024);
                let mut back = vec![0u8; 1024];
                mtd.read(offset, &mut back).unwrap();
                assert_eq!(back, data);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
