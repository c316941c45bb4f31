//! Wire schema for the persisted configuration document.
//!
//! The firmware consumes one JSON document keyed by `version`, `bus` and
//! `devices[]`. Field naming is historical and mixed (`slaveId` next to
//! `poll_interval`); the serde renames below reproduce it exactly. Optional
//! fields are emitted only when they carry a non-default value, keeping the
//! stored document minimal.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document schema version emitted on save.
pub const SCHEMA_VERSION: u32 = 1;

/// Inclusive Modbus RTU slave address range.
pub const SLAVE_ID_MIN: u16 = 1;
pub const SLAVE_ID_MAX: u16 = 247;

/// Highest addressable register.
pub const ADDRESS_MAX: u32 = 65_535;

/// Most registers a single datapoint may span.
pub const REGISTER_COUNT_MAX: u16 = 125;

/// Most registers one write-multiple (function 16) transaction carries.
pub const MULTI_WRITE_COUNT_MAX: u16 = 123;

/// Length caps enforced by validation.
pub const TOPIC_MAX_LEN: usize = 128;
pub const UNIT_MAX_LEN: usize = 5;
pub const NAME_MAX_LEN: usize = 64;
pub const LEGACY_NAME_MAX_LEN: usize = 16;

/// Defaults applied when mapping malformed or missing fields.
pub const DEFAULT_BAUD: u32 = 9600;
pub const DEFAULT_SLAVE_ID: u16 = 1;
pub const DEFAULT_FUNCTION: u8 = 3;

/// Parity letter inside a serial format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    #[serde(rename = "N")]
    None,
    #[serde(rename = "E")]
    Even,
    #[serde(rename = "O")]
    Odd,
}

impl Parity {
    pub fn letter(&self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'N' => Some(Parity::None),
            'E' => Some(Parity::Even),
            'O' => Some(Parity::Odd),
            _ => None,
        }
    }
}

/// Serial framing code: data bits, parity letter, stop bits.
///
/// Only the twelve combinations of `(7|8)(N|E|O)(1|2)` exist; the
/// constructors collapse anything else onto the `8N1` default, so a value
/// of this type is always a legal code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialFormat {
    data_bits: u8,
    parity: Parity,
    stop_bits: u8,
}

impl SerialFormat {
    /// Build a format from parts, coercing each invalid part to its
    /// default (8 data bits, 1 stop bit).
    pub fn from_parts(data_bits: u8, parity: Parity, stop_bits: u8) -> Self {
        SerialFormat {
            data_bits: if data_bits == 7 { 7 } else { 8 },
            parity,
            stop_bits: if stop_bits == 2 { 2 } else { 1 },
        }
    }

    /// Strict parse of a three-character code; used by validation.
    pub fn parse(code: &str) -> Option<Self> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 {
            return None;
        }
        let data_bits = match bytes[0] {
            b'7' => 7,
            b'8' => 8,
            _ => return None,
        };
        let parity = Parity::from_letter(bytes[1] as char)?;
        let stop_bits = match bytes[2] {
            b'1' => 1,
            b'2' => 2,
            _ => return None,
        };
        Some(SerialFormat { data_bits, parity, stop_bits })
    }

    /// Tolerant parse used when mapping documents into a draft: reads the
    /// first three characters and falls back to `8N1` as a whole when any
    /// of them is off.
    pub fn parse_or_default(code: &str) -> Self {
        let bytes = code.as_bytes();
        if bytes.len() < 3 {
            return Self::default();
        }
        let data_bits = match bytes[0] {
            b'7' => 7,
            b'8' => 8,
            _ => return Self::default(),
        };
        let parity = match Parity::from_letter(bytes[1] as char) {
            Some(parity) => parity,
            None => return Self::default(),
        };
        let stop_bits = match bytes[2] {
            b'1' => 1,
            b'2' => 2,
            _ => return Self::default(),
        };
        SerialFormat { data_bits, parity, stop_bits }
    }

    pub fn data_bits(&self) -> u8 {
        self.data_bits
    }

    pub fn parity(&self) -> Parity {
        self.parity
    }

    pub fn stop_bits(&self) -> u8 {
        self.stop_bits
    }

    /// Canonical code string, e.g. `"8N1"`.
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl Default for SerialFormat {
    fn default() -> Self {
        SerialFormat { data_bits: 8, parity: Parity::None, stop_bits: 1 }
    }
}

impl fmt::Display for SerialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.data_bits, self.parity.letter(), self.stop_bits)
    }
}

impl Serialize for SerialFormat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.code())
    }
}

impl<'de> Deserialize<'de> for SerialFormat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = String::deserialize(deserializer)?;
        Ok(SerialFormat::parse_or_default(&code))
    }
}

/// Effective portion of a 16-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterSlice {
    #[default]
    Full,
    LowByte,
    HighByte,
}

impl RegisterSlice {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterSlice::Full => "full",
            RegisterSlice::LowByte => "low_byte",
            RegisterSlice::HighByte => "high_byte",
        }
    }

    /// Strict membership over the canonical names; used by validation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "full" => Some(RegisterSlice::Full),
            "low_byte" => Some(RegisterSlice::LowByte),
            "high_byte" => Some(RegisterSlice::HighByte),
            _ => None,
        }
    }

    /// Tolerant normalization for document loading. Accepts historical
    /// aliases (`full_register`, numeric `1`/`2` markers, `low`,
    /// `highbyte`, ...); anything unrecognized maps to `Full`.
    pub fn normalize(value: &Value) -> Self {
        let raw = match value {
            Value::Null => return RegisterSlice::Full,
            Value::String(s) => s.trim().to_ascii_lowercase(),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f == 1.0 => return RegisterSlice::LowByte,
                Some(f) if f == 2.0 => return RegisterSlice::HighByte,
                _ => return RegisterSlice::Full,
            },
            other => other.to_string(),
        };
        match raw.as_str() {
            "full" | "full_register" => RegisterSlice::Full,
            "low_byte" | "low" | "lowbyte" | "1" => RegisterSlice::LowByte,
            "high_byte" | "high" | "highbyte" | "2" => RegisterSlice::HighByte,
            _ => RegisterSlice::Full,
        }
    }
}

/// Value interpretations the firmware knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
    Int16,
    Int32,
    Int64,
    #[default]
    Uint16,
    Uint32,
    Uint64,
    Float32,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Uint16 => "uint16",
            DataType::Uint32 => "uint32",
            DataType::Uint64 => "uint64",
            DataType::Float32 => "float32",
        }
    }

    /// Case-insensitive parse of a type name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Some(DataType::Text),
            "int16" => Some(DataType::Int16),
            "int32" => Some(DataType::Int32),
            "int64" => Some(DataType::Int64),
            "uint16" => Some(DataType::Uint16),
            "uint32" => Some(DataType::Uint32),
            "uint64" => Some(DataType::Uint64),
            "float32" => Some(DataType::Float32),
            _ => None,
        }
    }

    /// Numeric codes used by first-generation documents.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(DataType::Text),
            2 => Some(DataType::Int16),
            3 => Some(DataType::Int32),
            4 => Some(DataType::Int64),
            5 => Some(DataType::Uint16),
            6 => Some(DataType::Uint32),
            7 => Some(DataType::Uint64),
            8 => Some(DataType::Float32),
            _ => None,
        }
    }
}

/// Normalize a raw `dataType` field to its canonical spelling.
///
/// Known names are canonicalized, legacy numeric codes are translated,
/// and unknown non-empty strings pass through untouched so plugin-defined
/// types survive a round trip.
pub fn normalize_data_type(value: &Value) -> String {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(DataType::from_code)
            .unwrap_or_default()
            .as_str()
            .to_string(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return DataType::default().as_str().to_string();
            }
            match DataType::parse(trimmed) {
                Some(known) => known.as_str().to_string(),
                None => trimmed.to_string(),
            }
        }
        _ => DataType::default().as_str().to_string(),
    }
}

/// Modbus function codes the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    ReadCoil,
    ReadDiscreteInput,
    ReadHoldingRegister,
    ReadInputRegister,
    WriteCoil,
    WriteHoldingRegister,
    WriteMultipleHolding,
}

impl FunctionCode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FunctionCode::ReadCoil),
            2 => Some(FunctionCode::ReadDiscreteInput),
            3 => Some(FunctionCode::ReadHoldingRegister),
            4 => Some(FunctionCode::ReadInputRegister),
            5 => Some(FunctionCode::WriteCoil),
            6 => Some(FunctionCode::WriteHoldingRegister),
            16 => Some(FunctionCode::WriteMultipleHolding),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            FunctionCode::ReadCoil => 1,
            FunctionCode::ReadDiscreteInput => 2,
            FunctionCode::ReadHoldingRegister => 3,
            FunctionCode::ReadInputRegister => 4,
            FunctionCode::WriteCoil => 5,
            FunctionCode::WriteHoldingRegister => 6,
            FunctionCode::WriteMultipleHolding => 16,
        }
    }

    /// Single-register writes pin the register count to 1.
    pub fn is_single_write(&self) -> bool {
        matches!(self, FunctionCode::WriteCoil | FunctionCode::WriteHoldingRegister)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FunctionCode::ReadCoil => "read coils",
            FunctionCode::ReadDiscreteInput => "read discrete inputs",
            FunctionCode::ReadHoldingRegister => "read holding registers",
            FunctionCode::ReadInputRegister => "read input registers",
            FunctionCode::WriteCoil => "write coil",
            FunctionCode::WriteHoldingRegister => "write holding register",
            FunctionCode::WriteMultipleHolding => "write multiple holding registers",
        }
    }
}

/// True for the raw write codes 5, 6 and 16.
pub fn is_write_code(code: u8) -> bool {
    matches!(code, 5 | 6 | 16)
}

fn is_false(value: &bool) -> bool {
    !value
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

fn default_wire_baud() -> u32 {
    DEFAULT_BAUD
}

fn default_wire_scale() -> f64 {
    1.0
}

fn default_wire_count() -> u16 {
    1
}

fn default_wire_function() -> u8 {
    DEFAULT_FUNCTION
}

fn default_wire_slave_id() -> u16 {
    DEFAULT_SLAVE_ID
}

fn default_wire_data_type() -> String {
    DataType::default().as_str().to_string()
}

/// Complete document as persisted by the firmware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    pub bus: WireBus,
    #[serde(default)]
    pub devices: Vec<WireDevice>,
}

impl ConfigDocument {
    /// The document as a raw JSON value, for validation and transport.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Serial bus settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireBus {
    #[serde(default = "default_wire_baud")]
    pub baud: u32,
    #[serde(rename = "serialFormat", default)]
    pub serial_format: SerialFormat,
    /// Firmware-side gate for the whole bus; emitted only when on.
    #[serde(default, skip_serializing_if = "is_false")]
    pub enabled: bool,
}

/// One slave device entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDevice {
    pub name: String,
    #[serde(rename = "slaveId", default = "default_wire_slave_id")]
    pub slave_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "mqttEnabled", default, skip_serializing_if = "is_false")]
    pub mqtt_enabled: bool,
    #[serde(
        rename = "homeassistantDiscoveryEnabled",
        default,
        skip_serializing_if = "is_false"
    )]
    pub discovery_enabled: bool,
    #[serde(rename = "dataPoints", default)]
    pub data_points: Vec<WireDatapoint>,
}

/// One named register range on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDatapoint {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_wire_function")]
    pub function: u8,
    #[serde(default)]
    pub address: u32,
    #[serde(rename = "numOfRegisters", default = "default_wire_count")]
    pub num_of_registers: u16,
    #[serde(rename = "dataType", default = "default_wire_data_type")]
    pub data_type: String,
    #[serde(default = "default_wire_scale")]
    pub scale: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i32>,
    #[serde(rename = "registerSlice", default, skip_serializing_if = "Option::is_none")]
    pub register_slice: Option<RegisterSlice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}
