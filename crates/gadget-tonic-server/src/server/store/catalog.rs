//! Concurrent device-record store with create-once semantics.

use std::collections::HashMap;

use gadget_tonic_core::{
    Error, Result,
    proto::{Device, Filter},
};
use parking_lot::RwLock;

/// Map from device id to device record.
///
/// `save` is the single source of create-once atomicity: the duplicate
/// check and the insert happen under one exclusive lock, so of any number
/// of concurrent saves with the same id exactly one succeeds.
#[derive(Debug, Default)]
pub struct CatalogStore {
    devices: RwLock<HashMap<String, Device>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the device, failing with `AlreadyExists` when the id is taken.
    pub fn save(&self, device: Device) -> Result<()> {
        let mut devices = self.devices.write();

        if devices.contains_key(&device.id) {
            return Err(Error::AlreadyExists { id: device.id });
        }

        devices.insert(device.id.clone(), device);
        Ok(())
    }

    /// Looks up a device by id; an unknown id is not an error.
    pub fn find(&self, id: &str) -> Option<Device> {
        self.devices.read().get(id).cloned()
    }

    /// Shared-lock snapshot traversal in the map's natural (unordered)
    /// iteration order. `found` is invoked with a copy of every device
    /// matching `filter`; its failure stops the traversal and propagates.
    /// `cancelled` is polled before each record; once it reports true the
    /// traversal stops early without error.
    pub fn search<F>(&self, filter: &Filter, cancelled: impl Fn() -> bool, mut found: F) -> Result<()>
    where
        F: FnMut(Device) -> Result<()>,
    {
        let devices = self.devices.read();

        for device in devices.values() {
            if cancelled() {
                tracing::debug!("search stopped before completion");
                return Ok(());
            }

            if filter.matches(device) {
                found(device.clone())?;
            }
        }

        Ok(())
    }
}
