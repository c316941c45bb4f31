//! Editing session: the draft, the selection cursor, and every command an
//! editor surface can apply.
//!
//! Commands keep the structural invariants intact: datapoint ids stay
//! unique across the whole document, renames cascade to derived ids, and
//! the cursor never points at a node that is gone. Invalid input is
//! rejected with an error instead of corrupting the draft.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::addr::{self, AddressFormat};
use crate::draft::{
    DraftBus, DraftDatapoint, DraftDevice, PLACEHOLDER_DATAPOINT_NAME, PLACEHOLDER_DEVICE_NAME,
};
use crate::ident;
use crate::mapper;
use crate::schema::{self, ConfigDocument, Parity, RegisterSlice, SerialFormat};

/// Errors commands report back to the editor surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("Unknown device: {0}")]
    UnknownDevice(String),
    #[error("Unknown datapoint: {0}")]
    UnknownDatapoint(String),
    /// The rename would collide with an existing datapoint id.
    #[error("Duplicate datapoint id: {0}")]
    DuplicateId(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Which node the editor is focused on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    Bus,
    Device { device_id: String },
    Datapoint { device_id: String, datapoint_id: String },
}

/// Nodes matched by a tree filter query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TreeMatches {
    pub device_ids: Vec<String>,
    /// `(device id, datapoint id)` pairs; a datapoint can match even when
    /// its device does not.
    pub datapoint_ids: Vec<(String, String)>,
}

/// An editable draft plus the selection cursor.
#[derive(Debug, Clone)]
pub struct DraftSession {
    bus: DraftBus,
    selection: Selection,
}

impl DraftSession {
    /// Blank but immediately editable session.
    pub fn new() -> Self {
        DraftSession { bus: DraftBus::new(), selection: Selection::Bus }
    }

    /// Session seeded from a persisted document via the tolerant mapper.
    pub fn from_document(document: &Value) -> Self {
        DraftSession { bus: mapper::to_draft(document), selection: Selection::Bus }
    }

    pub fn bus(&self) -> &DraftBus {
        &self.bus
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Wire document for the current draft.
    pub fn to_document(&self) -> ConfigDocument {
        mapper::to_document(&self.bus)
    }

    pub fn select_bus(&mut self) {
        self.selection = Selection::Bus;
    }

    pub fn select_device(&mut self, device_id: &str) -> Result<(), DraftError> {
        if self.bus.device(device_id).is_none() {
            return Err(DraftError::UnknownDevice(device_id.to_string()));
        }
        self.selection = Selection::Device { device_id: device_id.to_string() };
        Ok(())
    }

    pub fn select_datapoint(&mut self, device_id: &str, datapoint_id: &str) -> Result<(), DraftError> {
        let device = self
            .bus
            .device(device_id)
            .ok_or_else(|| DraftError::UnknownDevice(device_id.to_string()))?;
        if device.datapoint(datapoint_id).is_none() {
            return Err(DraftError::UnknownDatapoint(datapoint_id.to_string()));
        }
        self.selection = Selection::Datapoint {
            device_id: device_id.to_string(),
            datapoint_id: datapoint_id.to_string(),
        };
        Ok(())
    }

    /// Append a placeholder device and move the cursor onto it. Returns
    /// the generated device id.
    pub fn add_device(&mut self) -> String {
        let mut counter = self.bus.devices.len() + 1;
        let mut id = format!("dev_{counter}");
        while self.bus.device(&id).is_some() {
            counter += 1;
            id = format!("dev_{counter}");
        }
        debug!(device = %id, "adding device");
        self.bus.devices.push(DraftDevice::new(id.clone()));
        self.selection = Selection::Device { device_id: id.clone() };
        id
    }

    /// Rename a device. Every child datapoint id is re-derived from the
    /// new name and the cursor follows a renamed datapoint.
    pub fn rename_device(&mut self, device_id: &str, new_name: &str) -> Result<(), DraftError> {
        let name = new_name.trim();
        let name = if name.is_empty() { PLACEHOLDER_DEVICE_NAME } else { name };
        if ident::slugify(name).is_empty() {
            return Err(DraftError::InvalidValue(format!(
                "cannot derive datapoint ids from name {name:?}"
            )));
        }
        let device_index = self.device_index(device_id)?;
        self.bus.devices[device_index].name = name.to_string();
        self.recompute_datapoint_ids(device_index);
        Ok(())
    }

    /// Rename a datapoint. The id is re-derived from the owning device's
    /// name; a collision with any other datapoint id is a blocking error
    /// and leaves the draft untouched.
    pub fn rename_datapoint(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
        new_name: &str,
    ) -> Result<String, DraftError> {
        let device_index = self.device_index(device_id)?;
        let point_index = self.datapoint_index(device_index, datapoint_id)?;

        let trimmed = new_name.trim();
        let effective = if trimmed.is_empty() { PLACEHOLDER_DATAPOINT_NAME } else { trimmed };
        let device_name = self.bus.devices[device_index].name.clone();
        let desired = ident::datapoint_id(&device_name, effective).ok_or_else(|| {
            DraftError::InvalidValue(format!("cannot derive an id from name {new_name:?}"))
        })?;

        if desired != datapoint_id && self.bus.has_datapoint_id(&desired) {
            return Err(DraftError::DuplicateId(desired));
        }

        let point = &mut self.bus.devices[device_index].datapoints[point_index];
        point.name = effective.to_string();
        point.id = desired.clone();
        if let Selection::Datapoint { datapoint_id: selected, .. } = &mut self.selection {
            if selected == datapoint_id {
                *selected = desired.clone();
            }
        }
        Ok(desired)
    }

    /// Append a placeholder datapoint to a device, derive a unique id for
    /// it, and move the cursor onto it.
    pub fn add_datapoint(&mut self, device_id: &str) -> Result<String, DraftError> {
        let device_index = self.device_index(device_id)?;
        let device_name = {
            let device = &self.bus.devices[device_index];
            if ident::slugify(&device.name).is_empty() {
                PLACEHOLDER_DEVICE_NAME.to_string()
            } else {
                device.name.clone()
            }
        };
        let base = ident::datapoint_id(&device_name, PLACEHOLDER_DATAPOINT_NAME)
            .unwrap_or_else(|| "device.datapoint".to_string());
        let id = {
            let bus = &self.bus;
            ident::unique_id(&base, |candidate| bus.has_datapoint_id(candidate))
        };
        let point = DraftDatapoint::new(id.clone(), PLACEHOLDER_DATAPOINT_NAME);
        self.bus.devices[device_index].datapoints.push(point);
        self.selection = Selection::Datapoint {
            device_id: device_id.to_string(),
            datapoint_id: id.clone(),
        };
        Ok(id)
    }

    /// Move a datapoint to another device. Its id is re-derived against
    /// the destination device's name, probing suffixes on collision, and
    /// the cursor follows. Moving onto the same device is a no-op.
    pub fn move_datapoint(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
        new_device_id: &str,
    ) -> Result<String, DraftError> {
        if device_id == new_device_id {
            let device_index = self.device_index(device_id)?;
            self.datapoint_index(device_index, datapoint_id)?;
            return Ok(datapoint_id.to_string());
        }
        let source_index = self.device_index(device_id)?;
        let target_index = self.device_index(new_device_id)?;
        let point_index = self.datapoint_index(source_index, datapoint_id)?;

        let target_name = {
            let target = &self.bus.devices[target_index];
            if target.name.is_empty() { PLACEHOLDER_DEVICE_NAME.to_string() } else { target.name.clone() }
        };
        let point_name = {
            let point = &self.bus.devices[source_index].datapoints[point_index];
            if point.name.is_empty() {
                PLACEHOLDER_DATAPOINT_NAME.to_string()
            } else {
                point.name.clone()
            }
        };
        let base = ident::datapoint_id(&target_name, &point_name).ok_or_else(|| {
            DraftError::InvalidValue(format!(
                "cannot derive an id under device {new_device_id:?}"
            ))
        })?;
        let id = {
            let bus = &self.bus;
            ident::unique_id(&base, |candidate| bus.has_datapoint_id(candidate))
        };
        debug!(from = %device_id, to = %new_device_id, datapoint = %id, "moving datapoint");

        let mut point = self.bus.devices[source_index].datapoints.remove(point_index);
        point.id = id.clone();
        self.bus.devices[target_index].datapoints.push(point);
        self.selection = Selection::Datapoint {
            device_id: new_device_id.to_string(),
            datapoint_id: id.clone(),
        };
        Ok(id)
    }

    /// Delete a device and all its datapoints. A cursor inside the device
    /// resets to the bus.
    pub fn delete_device(&mut self, device_id: &str) -> Result<(), DraftError> {
        let index = self.device_index(device_id)?;
        self.bus.devices.remove(index);
        let affected = match &self.selection {
            Selection::Device { device_id: selected }
            | Selection::Datapoint { device_id: selected, .. } => selected == device_id,
            Selection::Bus => false,
        };
        if affected {
            self.selection = Selection::Bus;
        }
        Ok(())
    }

    /// Delete a datapoint. A cursor on it moves to the parent device.
    pub fn delete_datapoint(&mut self, device_id: &str, datapoint_id: &str) -> Result<(), DraftError> {
        let device_index = self.device_index(device_id)?;
        let point_index = self.datapoint_index(device_index, datapoint_id)?;
        self.bus.devices[device_index].datapoints.remove(point_index);
        if let Selection::Datapoint { device_id: sel_device, datapoint_id: sel_point } = &self.selection
        {
            if sel_device == device_id && sel_point == datapoint_id {
                self.selection = Selection::Device { device_id: device_id.to_string() };
            }
        }
        Ok(())
    }

    pub fn set_bus_baud(&mut self, baud: u32) {
        self.bus.baud = baud;
    }

    /// Collapse a framing tuple onto the nearest legal serial format.
    pub fn set_bus_framing(&mut self, data_bits: u8, parity: Parity, stop_bits: u8) {
        self.bus.serial_format = SerialFormat::from_parts(data_bits, parity, stop_bits);
    }

    pub fn set_bus_enabled(&mut self, enabled: bool) {
        self.bus.enabled = enabled;
    }

    pub fn set_device_slave_id(&mut self, device_id: &str, slave_id: u16) -> Result<(), DraftError> {
        self.device_entry(device_id)?.slave_id = slave_id;
        Ok(())
    }

    pub fn set_device_notes(&mut self, device_id: &str, notes: &str) -> Result<(), DraftError> {
        self.device_entry(device_id)?.notes = notes.to_string();
        Ok(())
    }

    pub fn set_device_mqtt_enabled(&mut self, device_id: &str, enabled: bool) -> Result<(), DraftError> {
        self.device_entry(device_id)?.mqtt_enabled = enabled;
        Ok(())
    }

    pub fn set_device_discovery_enabled(
        &mut self,
        device_id: &str,
        enabled: bool,
    ) -> Result<(), DraftError> {
        self.device_entry(device_id)?.discovery_enabled = enabled;
        Ok(())
    }

    /// Change the function code. Switching to a write code clears the
    /// read-side fields: unit and poll interval reset, and single-register
    /// writes pin the count to 1.
    pub fn set_datapoint_function(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
        function: u8,
    ) -> Result<(), DraftError> {
        let point = self.datapoint_entry(device_id, datapoint_id)?;
        point.function = if function == 0 { schema::DEFAULT_FUNCTION } else { function };
        if point.is_write() {
            point.unit.clear();
            point.poll_secs = 0;
        }
        if matches!(point.function, 5 | 6) {
            point.count = 1;
        }
        Ok(())
    }

    /// Parse and store an operator-entered address in the datapoint's
    /// current notation.
    pub fn set_datapoint_address(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
        raw: &str,
    ) -> Result<u32, DraftError> {
        let point = self.datapoint_entry(device_id, datapoint_id)?;
        let format = point.addr_format;
        let parsed = addr::parse_address(raw, Some(format)).ok_or_else(|| {
            DraftError::InvalidValue(format!("address {raw:?} is not valid {} input", format.as_str()))
        })?;
        point.address = parsed;
        Ok(parsed)
    }

    /// Switch display notation; the stored integer is untouched.
    pub fn set_datapoint_address_format(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
        format: AddressFormat,
    ) -> Result<(), DraftError> {
        self.datapoint_entry(device_id, datapoint_id)?.addr_format = format;
        Ok(())
    }

    pub fn set_datapoint_slice(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
        slice: RegisterSlice,
    ) -> Result<(), DraftError> {
        self.datapoint_entry(device_id, datapoint_id)?.slice = slice;
        Ok(())
    }

    pub fn set_datapoint_count(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
        count: u16,
    ) -> Result<(), DraftError> {
        if count == 0 {
            return Err(DraftError::InvalidValue("register count must be positive".to_string()));
        }
        self.datapoint_entry(device_id, datapoint_id)?.count = count;
        Ok(())
    }

    pub fn set_datapoint_data_type(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
        data_type: &str,
    ) -> Result<(), DraftError> {
        self.datapoint_entry(device_id, datapoint_id)?.data_type = data_type.trim().to_string();
        Ok(())
    }

    pub fn set_datapoint_scale(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
        scale: f64,
    ) -> Result<(), DraftError> {
        if !scale.is_finite() {
            return Err(DraftError::InvalidValue("scale must be a finite number".to_string()));
        }
        self.datapoint_entry(device_id, datapoint_id)?.scale = scale;
        Ok(())
    }

    pub fn set_datapoint_unit(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
        unit: &str,
    ) -> Result<(), DraftError> {
        self.datapoint_entry(device_id, datapoint_id)?.unit = unit.to_string();
        Ok(())
    }

    pub fn set_datapoint_topic(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
        topic: &str,
    ) -> Result<(), DraftError> {
        self.datapoint_entry(device_id, datapoint_id)?.topic = topic.trim().to_string();
        Ok(())
    }

    pub fn set_datapoint_poll_secs(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
        seconds: u32,
    ) -> Result<(), DraftError> {
        self.datapoint_entry(device_id, datapoint_id)?.poll_secs = seconds;
        Ok(())
    }

    pub fn set_datapoint_precision(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
        precision: Option<i32>,
    ) -> Result<(), DraftError> {
        self.datapoint_entry(device_id, datapoint_id)?.precision = precision;
        Ok(())
    }

    /// Case-insensitive substring filter over the tree. Devices match on
    /// name, slave id, or the bus name; datapoints on id, name, function
    /// code, or address. An empty query matches everything.
    pub fn search(&self, query: &str) -> TreeMatches {
        let needle = query.trim().to_lowercase();
        let mut matches = TreeMatches::default();
        for device in &self.bus.devices {
            let device_fields = [
                device.name.to_lowercase(),
                device.slave_id.to_string(),
                self.bus.name.to_lowercase(),
            ];
            if needle.is_empty() || device_fields.iter().any(|f| f.contains(&needle)) {
                matches.device_ids.push(device.id.clone());
            }
            for point in &device.datapoints {
                let point_fields = [
                    point.id.to_lowercase(),
                    point.name.to_lowercase(),
                    point.function.to_string(),
                    point.address.to_string(),
                ];
                if needle.is_empty() || point_fields.iter().any(|f| f.contains(&needle)) {
                    matches.datapoint_ids.push((device.id.clone(), point.id.clone()));
                }
            }
        }
        matches
    }

    fn device_index(&self, device_id: &str) -> Result<usize, DraftError> {
        self.bus
            .devices
            .iter()
            .position(|d| d.id == device_id)
            .ok_or_else(|| DraftError::UnknownDevice(device_id.to_string()))
    }

    fn datapoint_index(&self, device_index: usize, datapoint_id: &str) -> Result<usize, DraftError> {
        self.bus.devices[device_index]
            .datapoints
            .iter()
            .position(|p| p.id == datapoint_id)
            .ok_or_else(|| DraftError::UnknownDatapoint(datapoint_id.to_string()))
    }

    fn device_entry(&mut self, device_id: &str) -> Result<&mut DraftDevice, DraftError> {
        self.bus
            .device_mut(device_id)
            .ok_or_else(|| DraftError::UnknownDevice(device_id.to_string()))
    }

    fn datapoint_entry(
        &mut self,
        device_id: &str,
        datapoint_id: &str,
    ) -> Result<&mut DraftDatapoint, DraftError> {
        let device = self
            .bus
            .device_mut(device_id)
            .ok_or_else(|| DraftError::UnknownDevice(device_id.to_string()))?;
        device
            .datapoint_mut(datapoint_id)
            .ok_or_else(|| DraftError::UnknownDatapoint(datapoint_id.to_string()))
    }

    /// Re-derive every datapoint id under one device, keeping ids unique
    /// across the whole document and the cursor in lockstep. A datapoint
    /// whose id cannot be derived keeps its current one.
    fn recompute_datapoint_ids(&mut self, device_index: usize) {
        let device_id = self.bus.devices[device_index].id.clone();
        let device_name = self.bus.devices[device_index].name.clone();
        for point_index in 0..self.bus.devices[device_index].datapoints.len() {
            let (old_id, point_name) = {
                let point = &self.bus.devices[device_index].datapoints[point_index];
                (point.id.clone(), point.name.clone())
            };
            let effective = if point_name.is_empty() { PLACEHOLDER_DATAPOINT_NAME } else { point_name.as_str() };
            let Some(base) = ident::datapoint_id(&device_name, effective) else {
                continue;
            };
            if old_id == base {
                continue;
            }
            let candidate = {
                let bus = &self.bus;
                ident::unique_id(&base, |id| id != old_id && bus.has_datapoint_id(id))
            };
            if candidate == old_id {
                continue;
            }
            debug!(old = %old_id, new = %candidate, "datapoint id follows device rename");
            self.bus.devices[device_index].datapoints[point_index].id = candidate.clone();
            if let Selection::Datapoint { device_id: sel_device, datapoint_id: sel_point } =
                &mut self.selection
            {
                if *sel_device == device_id && *sel_point == old_id {
                    *sel_point = candidate;
                }
            }
        }
    }
}

impl Default for DraftSession {
    fn default() -> Self {
        Self::new()
    }
}
