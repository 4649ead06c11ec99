use ps3vram_rs::lv1::MemfdHypervisor;
use ps3vram_rs::mtd::MtdTable;
use ps3vram_rs::vram::init_module;
use ps3vram_rs::{VramConfig, VramError};
use std::sync::Arc;

fn main() -> Result<(), VramError> {
    println!("--- PS3 VRAM MTD Device ---");

    // Sizing comes from PS3VRAM_* variables when set, the reference defaults otherwise.
    let config = VramConfig::from_env()?;
    config.validate()?;

    let hv = Arc::new(MemfdHypervisor::new());
    let table = Arc::new(MtdTable::new());

    let driver = init_module(hv.clone(), table.clone(), config);
    let Some(device) = driver.device() else {
        eprintln!("Device did not come up (see log output for the failing step).");
        return Ok(());
    };

    let index = driver.index().unwrap_or_default();
    let info = table.info(index).unwrap_or_else(|| device.mtd_info(driver.config()));

    println!("mtd{index}: \"{}\"", info.name);
    println!("  Type:           {:?}", info.mtd_type);
    println!("  Flags:          0x{:x} ({:?})", info.flags.bits(), info.flags);
    println!("  Grant:          {} MB", device.total_size() / 1024 / 1024);
    println!("  Memory handle:  0x{:x}", device.memory_handle());
    println!("  DDR LPAR:       0x{:x}", device.ddr_lpar());
    println!("  Real base:      {:p}", device.real_base());
    println!("  Usable base:    {:p}", device.usable_base());
    println!("  Skipped:        {} bytes", device.skip_size());
    println!("  Usable size:    {} bytes", info.size);
    println!("  Erase size:     {} bytes", info.erasesize);
    println!("  Write size:     {} bytes", info.writesize);
    println!(
        "  DDR remaining:  {} of {} bytes",
        hv.available(),
        hv.capacity()
    );

    Ok(())
}
