//! Mapping between the wire document and the draft model.
//!
//! `to_draft` is total: malformed or missing fields take their documented
//! defaults so the editor stays usable against a corrupt or hand-edited
//! document. `to_document` goes the other way and emits optional fields
//! only when they differ from their defaults. Round-tripping a document
//! through both directions is stable after the first pass.

use serde_json::Value;
use tracing::warn;

use crate::addr::{self, AddressFormat};
use crate::draft::{DraftBus, DraftDatapoint, DraftDevice, PLACEHOLDER_DEVICE_NAME};
use crate::schema::{
    self, ConfigDocument, RegisterSlice, SerialFormat, WireBus, WireDatapoint, WireDevice,
};

/// Read a JSON value as an integer the way a lenient numeric field is
/// read: whole-valued floats count, everything else does not.
pub(crate) fn json_integer(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(int) = number.as_i64() {
        return Some(int);
    }
    let float = number.as_f64()?;
    if float.is_finite()
        && float.fract() == 0.0
        && (i64::MIN as f64..=i64::MAX as f64).contains(&float)
    {
        Some(float as i64)
    } else {
        None
    }
}

fn trimmed_str(value: Option<&Value>) -> Option<&str> {
    value?.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// Map a persisted document into an editable draft. Never fails.
pub fn to_draft(document: &Value) -> DraftBus {
    let mut bus = DraftBus::new();

    if let Some(wire_bus) = document.get("bus") {
        if let Some(baud) = wire_bus.get("baud").and_then(json_integer) {
            if baud > 0 && baud <= u32::MAX as i64 {
                bus.baud = baud as u32;
            }
        }
        if let Some(code) = wire_bus.get("serialFormat").and_then(Value::as_str) {
            bus.serial_format = SerialFormat::parse_or_default(code);
        }
        bus.enabled = wire_bus.get("enabled").and_then(Value::as_bool).unwrap_or(false);
    }

    match document.get("devices") {
        Some(Value::Array(devices)) => {
            for (index, wire_device) in devices.iter().enumerate() {
                bus.devices.push(device_to_draft(wire_device, index));
            }
        }
        Some(_) => warn!("devices field is not an array, starting with an empty device list"),
        None => {}
    }
    bus
}

fn device_to_draft(wire: &Value, position: usize) -> DraftDevice {
    let id = trimmed_str(wire.get("id"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("dev_{}", position + 1));
    let mut device = DraftDevice::new(id);
    device.name = trimmed_str(wire.get("name"))
        .unwrap_or(PLACEHOLDER_DEVICE_NAME)
        .to_string();
    device.slave_id = wire
        .get("slaveId")
        .and_then(json_integer)
        .and_then(|n| u16::try_from(n).ok())
        .filter(|n| *n != 0)
        .unwrap_or(schema::DEFAULT_SLAVE_ID);
    device.notes = wire
        .get("notes")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    device.mqtt_enabled = wire.get("mqttEnabled").and_then(Value::as_bool).unwrap_or(false);
    device.discovery_enabled = wire
        .get("homeassistantDiscoveryEnabled")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if let Some(points) = wire.get("dataPoints").and_then(Value::as_array) {
        for point in points {
            device.datapoints.push(datapoint_to_draft(point));
        }
    }
    device
}

fn datapoint_to_draft(wire: &Value) -> DraftDatapoint {
    let id = wire.get("id").and_then(Value::as_str).unwrap_or_default();
    let name = wire.get("name").and_then(Value::as_str).unwrap_or_default();
    let mut point = DraftDatapoint::new(id, name);

    if let Some(code) = wire.get("function").and_then(json_integer) {
        if let Ok(code) = u8::try_from(code) {
            if code != 0 {
                point.function = code;
            }
        }
    }

    match wire.get("address") {
        Some(Value::String(raw)) => {
            point.addr_format = AddressFormat::infer(raw);
            point.address = addr::parse_address(raw, None).unwrap_or(0);
        }
        Some(value) => {
            if let Some(number) = value.as_f64() {
                if number.is_finite() && (0.0..=u32::MAX as f64).contains(&number) {
                    point.address = number.trunc() as u32;
                }
            }
        }
        None => {}
    }

    if let Some(value) = wire.get("registerSlice") {
        point.slice = RegisterSlice::normalize(value);
    }
    if let Some(count) = wire.get("numOfRegisters").and_then(json_integer) {
        if let Ok(count) = u16::try_from(count) {
            if count != 0 {
                point.count = count;
            }
        }
    }
    if let Some(value) = wire.get("dataType") {
        point.data_type = schema::normalize_data_type(value);
    }
    if let Some(scale) = wire.get("scale").and_then(Value::as_f64) {
        if scale.is_finite() && scale != 0.0 {
            point.scale = scale;
        }
    }
    point.unit = wire
        .get("unit")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    point.topic = wire
        .get("topic")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    point.poll_secs = poll_seconds(wire);
    point.precision = wire
        .get("precision")
        .and_then(json_integer)
        .and_then(|n| i32::try_from(n).ok());
    point
}

/// Poll interval arrives as whole seconds, or as milliseconds in older
/// documents (divided by 1000 and rounded).
fn poll_seconds(wire: &Value) -> u32 {
    if let Some(secs) = wire.get("poll_interval").and_then(json_integer) {
        return u32::try_from(secs).unwrap_or(0);
    }
    if let Some(ms) = wire.get("poll_interval_ms").and_then(json_integer) {
        if ms > 0 {
            return (ms as f64 / 1000.0).round() as u32;
        }
    }
    0
}

/// Project the draft back onto the wire schema.
pub fn to_document(bus: &DraftBus) -> ConfigDocument {
    ConfigDocument {
        version: schema::SCHEMA_VERSION,
        bus: WireBus {
            baud: if bus.baud == 0 { schema::DEFAULT_BAUD } else { bus.baud },
            serial_format: bus.serial_format,
            enabled: bus.enabled,
        },
        devices: bus.devices.iter().map(device_to_wire).collect(),
    }
}

fn device_to_wire(device: &DraftDevice) -> WireDevice {
    let name = device.name.trim();
    let id = device.id.trim();
    WireDevice {
        name: if name.is_empty() { PLACEHOLDER_DEVICE_NAME.to_string() } else { name.to_string() },
        slave_id: if device.slave_id == 0 { schema::DEFAULT_SLAVE_ID } else { device.slave_id },
        id: (!id.is_empty()).then(|| id.to_string()),
        mqtt_enabled: device.mqtt_enabled,
        discovery_enabled: device.discovery_enabled,
        data_points: device.datapoints.iter().map(datapoint_to_wire).collect(),
    }
}

fn datapoint_to_wire(point: &DraftDatapoint) -> WireDatapoint {
    let data_type = point.data_type.trim();
    let topic = point.topic.trim();
    WireDatapoint {
        id: point.id.clone(),
        name: point.name.clone(),
        function: if point.function == 0 { schema::DEFAULT_FUNCTION } else { point.function },
        address: point.address,
        num_of_registers: if point.count == 0 { 1 } else { point.count },
        data_type: if data_type.is_empty() { "uint16".to_string() } else { data_type.to_string() },
        scale: if point.scale == 0.0 || !point.scale.is_finite() { 1.0 } else { point.scale },
        unit: point.unit.clone(),
        poll_interval: (point.poll_secs > 0).then_some(point.poll_secs),
        precision: point.precision,
        register_slice: (point.slice != RegisterSlice::Full).then_some(point.slice),
        topic: (!topic.is_empty()).then(|| topic.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_draft_from_null() {
        for document in [Value::Null, json!("garbage"), json!(42), json!([1, 2])] {
            let bus = to_draft(&document);
            assert_eq!(bus.baud, 9600);
            assert_eq!(bus.serial_format.code(), "8N1");
            assert!(bus.devices.is_empty());
        }
    }

    #[test]
    fn test_malformed_fields_take_defaults() {
        let document = json!({
            "bus": { "baud": "fast", "serialFormat": "9X9" },
            "devices": [{
                "name": "  Boiler  ",
                "slaveId": 0,
                "dataPoints": [{
                    "name": "flow",
                    "function": "three",
                    "address": "garbage",
                    "numOfRegisters": 0,
                    "dataType": 99,
                    "scale": 0
                }]
            }]
        });
        let bus = to_draft(&document);
        assert_eq!(bus.baud, 9600);
        assert_eq!(bus.serial_format.code(), "8N1");

        let device = &bus.devices[0];
        assert_eq!(device.name, "Boiler");
        assert_eq!(device.id, "dev_1");
        assert_eq!(device.slave_id, 1);

        let point = &device.datapoints[0];
        assert_eq!(point.function, 3);
        assert_eq!(point.address, 0);
        assert_eq!(point.count, 1);
        assert_eq!(point.data_type, "uint16");
        assert_eq!(point.scale, 1.0);
    }

    #[test]
    fn test_hex_address_string_sets_notation() {
        let document = json!({
            "bus": { "baud": 19200, "serialFormat": "8E1" },
            "devices": [{
                "name": "meter",
                "slaveId": 7,
                "dataPoints": [
                    { "name": "a", "address": "0x10" },
                    { "name": "b", "address": "16" },
                    { "name": "c", "address": 16 }
                ]
            }]
        });
        let bus = to_draft(&document);
        let points = &bus.devices[0].datapoints;
        assert_eq!(points[0].address, 16);
        assert_eq!(points[0].addr_format, AddressFormat::Hex);
        assert_eq!(points[1].address, 16);
        assert_eq!(points[1].addr_format, AddressFormat::Dec);
        assert_eq!(points[2].address, 16);
        assert_eq!(points[2].addr_format, AddressFormat::Dec);
    }

    #[test]
    fn test_poll_interval_fallbacks() {
        let seconds = json!({ "poll_interval": 30 });
        assert_eq!(poll_seconds(&seconds), 30);

        let millis = json!({ "poll_interval_ms": 2500 });
        assert_eq!(poll_seconds(&millis), 3);

        let both = json!({ "poll_interval": 10, "poll_interval_ms": 99000 });
        assert_eq!(poll_seconds(&both), 10);

        let junk = json!({ "poll_interval": "soon" });
        assert_eq!(poll_seconds(&junk), 0);
    }

    #[test]
    fn test_to_document_minimal_emission() {
        let mut bus = DraftBus::new();
        bus.baud = 19200;
        let mut device = DraftDevice::new("dev_1");
        device.name = "Boiler".to_string();
        device.slave_id = 7;
        device.notes = "left rack".to_string();
        device.datapoints.push(DraftDatapoint::new("boiler.flow", "flow"));
        bus.devices.push(device);

        let value = to_document(&bus).to_value();
        assert_eq!(value["version"], json!(1));
        assert_eq!(value["bus"]["baud"], json!(19200));
        assert_eq!(value["bus"]["serialFormat"], json!("8N1"));
        assert!(value["bus"].get("enabled").is_none());

        let device = &value["devices"][0];
        assert_eq!(device["name"], json!("Boiler"));
        assert_eq!(device["slaveId"], json!(7));
        assert_eq!(device["id"], json!("dev_1"));
        assert!(device.get("mqttEnabled").is_none());
        assert!(device.get("notes").is_none());

        let point = &device["dataPoints"][0];
        assert_eq!(point["function"], json!(3));
        assert_eq!(point["numOfRegisters"], json!(1));
        assert!(point.get("poll_interval").is_none());
        assert!(point.get("registerSlice").is_none());
        assert!(point.get("topic").is_none());
    }

    #[test]
    fn test_round_trip_is_stable() {
        let original = json!({
            "version": 1,
            "bus": { "baud": 19200, "serialFormat": "8E1", "enabled": true },
            "devices": [{
                "name": "Boiler",
                "slaveId": 7,
                "id": "boiler",
                "mqttEnabled": true,
                "dataPoints": [{
                    "id": "boiler.flow",
                    "name": "flow",
                    "function": 4,
                    "address": "0x10",
                    "numOfRegisters": 2,
                    "dataType": "float32",
                    "scale": 0.1,
                    "unit": "m3/h",
                    "poll_interval": 30,
                    "precision": 2
                }]
            }]
        });
        let first = to_document(&to_draft(&original)).to_value();
        let second = to_document(&to_draft(&first)).to_value();
        assert_eq!(first, second);
        // the hex string is canonicalized to an integer on first pass
        assert_eq!(first["devices"][0]["dataPoints"][0]["address"], json!(16));
    }
}
