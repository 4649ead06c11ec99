use super::{MAX_MTD_DEVICES, MtdInfo, MtdOps, MtdRegistry};
use crate::error::{VramError, VramResult};
use std::sync::{Arc, Mutex};

struct MtdEntry {
    info: MtdInfo,
    ops: Arc<dyn MtdOps>,
}

/// In-process device table: the framework side of `add_mtd_device` / `del_mtd_device`.
///
/// Registered devices are handed out as `Arc<dyn MtdOps>`, so a caller can keep
/// issuing reads and writes without holding the table lock.
pub struct MtdTable {
    slots: Mutex<Vec<Option<MtdEntry>>>,
}

impl Default for MtdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MtdTable {
    #[must_use]
    pub fn new() -> Self {
        Self::with_slots(MAX_MTD_DEVICES)
    }

    #[must_use]
    pub fn with_slots(count: usize) -> Self {
        let mut slots = Vec::with_capacity(count);
        slots.resize_with(count, || None);
        Self {
            slots: Mutex::new(slots),
        }
    }

    /// Handlers of the device registered under `index`.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn get(&self, index: usize) -> Option<Arc<dyn MtdOps>> {
        let slots = self.slots.lock().unwrap();
        slots.get(index)?.as_ref().map(|e| e.ops.clone())
    }

    /// Descriptor of the device registered under `index`.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn info(&self, index: usize) -> Option<MtdInfo> {
        let slots = self.slots.lock().unwrap();
        slots.get(index)?.as_ref().map(|e| e.info.clone())
    }

    /// Index of the device registered as `name`.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn find(&self, name: &str) -> Option<usize> {
        let slots = self.slots.lock().unwrap();
        slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| e.info.name == name))
    }

    /// Number of registered devices.
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_descriptor(info: &MtdInfo) -> VramResult<()> {
        if info.name.is_empty() {
            return Err(VramError::Registration("empty device name".into()));
        }
        if info.size == 0 {
            return Err(VramError::Registration(format!(
                "{}: zero-sized device",
                info.name
            )));
        }
        if !info.erasesize.is_power_of_two() {
            return Err(VramError::Registration(format!(
                "{}: erasesize {} is not a power of two",
                info.name, info.erasesize
            )));
        }
        if info.writesize == 0 {
            return Err(VramError::Registration(format!(
                "{}: zero writesize",
                info.name
            )));
        }
        Ok(())
    }
}

impl MtdRegistry for MtdTable {
    fn add_mtd_device(&self, info: MtdInfo, ops: Arc<dyn MtdOps>) -> VramResult<usize> {
        Self::check_descriptor(&info)?;

        let mut slots = self.slots.lock().unwrap();
        if slots
            .iter()
            .flatten()
            .any(|e| e.info.name == info.name)
        {
            return Err(VramError::Registration(format!(
                "{}: name already registered",
                info.name
            )));
        }

        let Some(index) = slots.iter().position(Option::is_none) else {
            return Err(VramError::Registration(format!(
                "{}: no free MTD slots",
                info.name
            )));
        };

        log::debug!("mtd{index}: \"{}\" added ({} bytes)", info.name, info.size);
        slots[index] = Some(MtdEntry { info, ops });
        Ok(index)
    }

    fn del_mtd_device(&self, index: usize) -> VramResult<()> {
        let mut slots = self.slots.lock().unwrap();
        match slots.get_mut(index).and_then(Option::take) {
            Some(entry) => {
                log::debug!("mtd{index}: \"{}\" removed", entry.info.name);
                Ok(())
            }
            None => Err(VramError::Registration(format!(
                "mtd{index}: no such device"
            ))),
        }
    }
}
