use ps3vram_rs::lv1::MemfdHypervisor;
use ps3vram_rs::mtd::{EraseInfo, EraseState, MtdTable};
use ps3vram_rs::{MtdOps, VramConfig, VramDriver, VramError};
use std::sync::Arc;

fn main() -> Result<(), VramError> {
    // A small grant keeps the demo light; the skip follows a 640x480 32bpp double buffer.
    let config = VramConfig::new()
        .with_grant_size(4 * 1024 * 1024)
        .for_video_mode(640, 480, 4, 2);

    let table = Arc::new(MtdTable::new());
    let mut driver = VramDriver::new(Arc::new(MemfdHypervisor::new()), table.clone(), config);
    let index = driver.start()?;

    let Some(mtd) = table.get(index) else {
        eprintln!("mtd{index} vanished from the table");
        return Ok(());
    };
    let size = table.info(index).map_or(0, |info| info.size);
    println!("mtd{index}: {size} usable bytes");

    let message = b"hello from video memory";
    let written = mtd.write(0, message)?;
    println!("Wrote {written} bytes at offset 0");

    let mut back = vec![0u8; message.len()];
    let read = mtd.read(0, &mut back)?;
    println!("Read {read} bytes: {:?}", String::from_utf8_lossy(&back));

    let tail = mtd.write(size - 8, &[0xAA; 32])?;
    println!("Write of 32 bytes at size-8 was clamped to {tail}");

    let mut instr = EraseInfo::new(0, 4096)
        .with_callback(|e| println!("Erase of {} bytes at {} -> {:?}", e.len, e.addr, e.state));
    mtd.erase(&mut instr)?;
    assert_eq!(instr.state, EraseState::Done);

    let mut erased = [0u8; 8];
    mtd.read(0, &mut erased)?;
    println!("After erase: {erased:02x?}");

    match mtd.erase(&mut EraseInfo::new(size - 8, 4096)) {
        Err(e) => println!("Erase past the end refused: {e}"),
        Ok(()) => println!("Erase past the end unexpectedly succeeded"),
    }

    drop(mtd);
    driver.stop();
    println!("Device stopped, {} devices registered", table.len());
    Ok(())
}
