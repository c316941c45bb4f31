//! Validation of wire documents against protocol constraints.
//!
//! Runs over the raw JSON shape rather than the typed draft so imported
//! and hand-edited documents get judged too. Rules are independent and
//! collected in one pass; the report carries one human-readable line per
//! violation, attributed to the offending device or datapoint.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::mapper::json_integer;
use crate::schema::{self, FunctionCode, RegisterSlice, SerialFormat};

/// Which generation of schema rules to enforce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationProfile {
    /// First-generation documents: read functions only, short names.
    Legacy,
    /// Current documents: function 16, register slices, topics, polling.
    #[default]
    Extended,
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        ValidationReport { ok: errors.is_empty(), errors }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok {
            write!(f, "ok")
        } else {
            write!(f, "{}", self.errors.join("; "))
        }
    }
}

/// Validate a document, collecting every violation instead of stopping at
/// the first.
pub fn validate_document(document: &Value, profile: ValidationProfile) -> ValidationReport {
    let mut errors = Vec::new();
    validate_bus(document, &mut errors);
    if let Some(devices) = document.get("devices").and_then(Value::as_array) {
        for (index, device) in devices.iter().enumerate() {
            validate_device(device, index, profile, &mut errors);
        }
    }
    ValidationReport::from_errors(errors)
}

fn validate_bus(document: &Value, errors: &mut Vec<String>) {
    let Some(bus) = document.get("bus").filter(|v| v.is_object()) else {
        errors.push("Missing bus".to_string());
        return;
    };
    match bus.get("baud").and_then(json_integer) {
        Some(baud) if baud > 0 => {}
        _ => errors.push("Bus baud must be a positive integer".to_string()),
    }
    match bus.get("serialFormat") {
        Some(Value::String(code)) if SerialFormat::parse(code).is_some() => {}
        Some(Value::String(code)) => errors.push(format!("Invalid serialFormat {code}")),
        Some(other) => errors.push(format!("Invalid serialFormat {other}")),
        None => errors.push("Invalid serialFormat missing".to_string()),
    }
}

fn validate_device(device: &Value, index: usize, profile: ValidationProfile, errors: &mut Vec<String>) {
    let name = device.get("name").and_then(Value::as_str).unwrap_or_default();
    if name.is_empty() {
        errors.push(format!("Device #{}: name required", index + 1));
    }
    let label = if name.is_empty() { (index + 1).to_string() } else { name.to_string() };

    match device.get("slaveId").and_then(json_integer) {
        Some(id)
            if (schema::SLAVE_ID_MIN as i64..=schema::SLAVE_ID_MAX as i64).contains(&id) => {}
        _ => errors.push(format!("Device {label}: slaveId 1-247")),
    }

    if profile == ValidationProfile::Extended {
        if let Some(id) = device.get("id") {
            if !id.is_null() && !id.is_string() {
                errors.push(format!("Device {label}: id must be a string"));
            }
        }
        for flag in ["mqttEnabled", "homeassistantDiscoveryEnabled"] {
            if let Some(value) = device.get(flag) {
                if !value.is_null() && !value.is_boolean() {
                    errors.push(format!("Device {label}: {flag} must be boolean"));
                }
            }
        }
    }

    if let Some(points) = device.get("dataPoints").and_then(Value::as_array) {
        for (position, point) in points.iter().enumerate() {
            validate_datapoint(point, position, name, profile, errors);
        }
    }
}

fn validate_datapoint(
    point: &Value,
    index: usize,
    device_name: &str,
    profile: ValidationProfile,
    errors: &mut Vec<String>,
) {
    let extended = profile == ValidationProfile::Extended;

    let name = point.get("name").and_then(Value::as_str).unwrap_or_default();
    if name.is_empty() {
        errors.push(format!("Datapoint #{} on {}: name required", index + 1, device_name));
    }
    let id = point.get("id").and_then(Value::as_str).unwrap_or_default();
    if id.is_empty() {
        let name_label = if name.is_empty() { (index + 1).to_string() } else { name.to_string() };
        errors.push(format!("Datapoint {name_label} on {device_name}: id required"));
    }
    let label = if !id.is_empty() {
        id.to_string()
    } else if !name.is_empty() {
        name.to_string()
    } else {
        format!("#{}", index + 1)
    };

    if extended {
        if let Some(value) = point.get("registerSlice").filter(|v| !v.is_null()) {
            if value.as_str().and_then(RegisterSlice::parse).is_none() {
                errors.push(format!("Datapoint {label}: registerSlice invalid"));
            }
            if slice_restricts_count(value)
                && point.get("numOfRegisters").and_then(json_integer) != Some(1)
            {
                errors.push(format!("Datapoint {label}: registerSlice requires numOfRegisters = 1"));
            }
        }
    }

    let function = point
        .get("function")
        .and_then(json_integer)
        .and_then(|code| u8::try_from(code).ok())
        .and_then(FunctionCode::from_code);
    let function_ok = match function {
        Some(FunctionCode::WriteMultipleHolding) => extended,
        Some(_) => true,
        None => false,
    };
    if !function_ok {
        if extended {
            errors.push(format!("Datapoint {label}: function 1-6 or 16"));
        } else {
            errors.push(format!("Datapoint {label}: function 1-6"));
        }
    }

    if extended {
        if let Some(value) = point.get("topic").filter(|v| !v.is_null()) {
            match value.as_str() {
                Some(topic) => {
                    if topic.chars().count() > schema::TOPIC_MAX_LEN {
                        errors.push(format!("Datapoint {label}: topic too long"));
                    }
                }
                None => errors.push(format!("Datapoint {label}: topic must be a string")),
            }
        }
    }

    match point.get("address").and_then(json_integer) {
        Some(address) if (0..=schema::ADDRESS_MAX as i64).contains(&address) => {}
        _ => errors.push(format!("Datapoint {label}: address 0-65535")),
    }

    if extended {
        if let Some(value) = point.get("poll_interval").filter(|v| !v.is_null()) {
            match json_integer(value) {
                Some(secs) if secs >= 0 => {}
                _ => errors.push(format!("Datapoint {label}: poll_interval must be >= 0 seconds")),
            }
        }
    }

    let count = point.get("numOfRegisters").and_then(json_integer);
    match count {
        Some(n) if (1..=schema::REGISTER_COUNT_MAX as i64).contains(&n) => {}
        _ => errors.push(format!("Datapoint {label}: numOfRegisters 1-125")),
    }

    if extended {
        if let Some(code) = function {
            if code.is_single_write() && count != Some(1) {
                errors.push(format!("Datapoint {label}: write functions must use numOfRegisters = 1"));
            }
            if code == FunctionCode::WriteMultipleHolding {
                match count {
                    Some(n) if (1..=schema::MULTI_WRITE_COUNT_MAX as i64).contains(&n) => {}
                    _ => errors.push(format!(
                        "Datapoint {label}: function 16 supports numOfRegisters 1-123"
                    )),
                }
            }
        }
    }

    if let Some(unit) = point.get("unit").and_then(Value::as_str) {
        if unit.chars().count() > schema::UNIT_MAX_LEN {
            errors.push(format!("Datapoint {label}: unit max length 5"));
        }
    }

    if let Some(name) = point.get("name").and_then(Value::as_str) {
        let cap = if extended { schema::NAME_MAX_LEN } else { schema::LEGACY_NAME_MAX_LEN };
        if name.chars().count() > cap {
            errors.push(format!("Datapoint {label}: name max length {cap}"));
        }
    }
}

/// A slice value restricts the register count when it is "truthy" and not
/// the full register, mirroring how stored documents have historically
/// been judged.
fn slice_restricts_count(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty() && s != "full",
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::Null => false,
        _ => true,
    }
}
