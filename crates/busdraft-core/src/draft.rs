//! Editable in-memory model of the bus configuration.
//!
//! The draft is what the operator actually edits: one serial bus, its
//! devices, and their datapoints, always in a usable state no matter how
//! malformed the loaded document was. The mapper module copies between
//! this model and the wire schema.

use serde::{Deserialize, Serialize};

use crate::addr::AddressFormat;
use crate::schema::{self, RegisterSlice, SerialFormat};

/// Display name of the singleton bus node.
pub const BUS_NAME: &str = "RS485 Bus";

/// Placeholder names for freshly added nodes.
pub const PLACEHOLDER_DEVICE_NAME: &str = "device";
pub const PLACEHOLDER_DATAPOINT_NAME: &str = "datapoint";

fn default_bus_name() -> String {
    BUS_NAME.to_string()
}

fn default_baud() -> u32 {
    schema::DEFAULT_BAUD
}

fn default_slave_id() -> u16 {
    schema::DEFAULT_SLAVE_ID
}

fn default_function() -> u8 {
    schema::DEFAULT_FUNCTION
}

fn default_count() -> u16 {
    1
}

fn default_scale() -> f64 {
    1.0
}

fn default_data_type() -> String {
    "uint16".to_string()
}

/// The serial bus and everything attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftBus {
    #[serde(default = "default_bus_name")]
    pub name: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default)]
    pub serial_format: SerialFormat,
    /// Firmware-side gate; carried through edits untouched.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub devices: Vec<DraftDevice>,
}

impl DraftBus {
    pub fn new() -> Self {
        DraftBus {
            name: default_bus_name(),
            baud: default_baud(),
            serial_format: SerialFormat::default(),
            enabled: false,
            devices: Vec::new(),
        }
    }

    pub fn device(&self, device_id: &str) -> Option<&DraftDevice> {
        self.devices.iter().find(|d| d.id == device_id)
    }

    pub fn device_mut(&mut self, device_id: &str) -> Option<&mut DraftDevice> {
        self.devices.iter_mut().find(|d| d.id == device_id)
    }

    /// Look a datapoint id up across every device.
    pub fn has_datapoint_id(&self, datapoint_id: &str) -> bool {
        self.devices
            .iter()
            .any(|d| d.datapoints.iter().any(|p| p.id == datapoint_id))
    }

    /// Find a datapoint and its owning device anywhere on the bus.
    pub fn find_datapoint(&self, datapoint_id: &str) -> Option<(&DraftDevice, &DraftDatapoint)> {
        self.devices.iter().find_map(|device| {
            device
                .datapoints
                .iter()
                .find(|p| p.id == datapoint_id)
                .map(|point| (device, point))
        })
    }
}

impl Default for DraftBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One Modbus RTU slave on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftDevice {
    pub id: String,
    pub name: String,
    #[serde(default = "default_slave_id")]
    pub slave_id: u16,
    /// Free-form operator notes; never persisted to the wire document.
    #[serde(default)]
    pub notes: String,
    /// Bridge readings onto the MQTT broker.
    #[serde(default)]
    pub mqtt_enabled: bool,
    /// Announce the device for Home Assistant auto-discovery.
    #[serde(default)]
    pub discovery_enabled: bool,
    #[serde(default)]
    pub datapoints: Vec<DraftDatapoint>,
}

impl DraftDevice {
    /// Placeholder device as created by the add-device command.
    pub fn new(id: impl Into<String>) -> Self {
        DraftDevice {
            id: id.into(),
            name: PLACEHOLDER_DEVICE_NAME.to_string(),
            slave_id: default_slave_id(),
            notes: String::new(),
            mqtt_enabled: false,
            discovery_enabled: false,
            datapoints: Vec::new(),
        }
    }

    pub fn datapoint(&self, datapoint_id: &str) -> Option<&DraftDatapoint> {
        self.datapoints.iter().find(|p| p.id == datapoint_id)
    }

    pub fn datapoint_mut(&mut self, datapoint_id: &str) -> Option<&mut DraftDatapoint> {
        self.datapoints.iter_mut().find(|p| p.id == datapoint_id)
    }
}

/// One named register (or register range) on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftDatapoint {
    pub id: String,
    pub name: String,
    #[serde(default = "default_function")]
    pub function: u8,
    #[serde(default)]
    pub address: u32,
    /// Display notation for the address; not persisted to the wire.
    #[serde(default)]
    pub addr_format: AddressFormat,
    #[serde(default)]
    pub slice: RegisterSlice,
    #[serde(default = "default_count")]
    pub count: u16,
    #[serde(default = "default_data_type")]
    pub data_type: String,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub topic: String,
    /// Whole seconds between periodic reads; 0 disables polling.
    #[serde(default)]
    pub poll_secs: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i32>,
}

impl DraftDatapoint {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        DraftDatapoint {
            id: id.into(),
            name: name.into(),
            function: default_function(),
            address: 0,
            addr_format: AddressFormat::Dec,
            slice: RegisterSlice::Full,
            count: default_count(),
            data_type: default_data_type(),
            scale: default_scale(),
            unit: String::new(),
            topic: String::new(),
            poll_secs: 0,
            precision: None,
        }
    }

    /// Write datapoints have no periodic read semantics.
    pub fn is_write(&self) -> bool {
        schema::is_write_code(self.function)
    }
}
