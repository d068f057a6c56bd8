//! Exposed device registry
//!
//! The hub keeps a list of controls ("devices") the jam session currently
//! exposes: the cc they answer to, how a frontend should render them, and a
//! free-text description. Managed remotely over the `/devices` endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a frontend should render an exposed control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiType {
    /// Plain knob, no extra chrome
    Empty,
    /// Knob with an on/off check
    Check,
}

impl UiType {
    pub const ALL: [UiType; 2] = [UiType::Empty, UiType::Check];
}

impl fmt::Display for UiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiType::Empty => write!(f, "empty"),
            UiType::Check => write!(f, "check"),
        }
    }
}

impl FromStr for UiType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" => Ok(UiType::Empty),
            "check" => Ok(UiType::Check),
            other => Err(format!("'{}' is not a valid ui type", other)),
        }
    }
}

/// One exposed control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub cc: u8,
    pub ui_type: UiType,
    pub description: String,
}

impl Device {
    pub fn new(cc: u8, ui_type: UiType, description: impl Into<String>) -> Self {
        Self {
            cc,
            ui_type,
            description: description.into(),
        }
    }
}

/// A mutation of the registry, as posted to `/devices`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeviceUpdate {
    Add(Device),
    Remove(u8),
    Clear,
}

/// The registry itself
///
/// One entry per cc: adding a device whose cc is already present replaces the
/// old entry. Order of first exposure is preserved.
#[derive(Debug, Default)]
pub struct ExposedDevices {
    devices: Vec<Device>,
}

impl ExposedDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one update and return the resulting device list
    pub fn apply(&mut self, update: DeviceUpdate) -> Vec<Device> {
        match update {
            DeviceUpdate::Add(device) => {
                if let Some(existing) = self.devices.iter_mut().find(|d| d.cc == device.cc) {
                    *existing = device;
                } else {
                    self.devices.push(device);
                }
            }
            DeviceUpdate::Remove(cc) => {
                self.devices.retain(|d| d.cc != cc);
            }
            DeviceUpdate::Clear => {
                self.devices.clear();
            }
        }
        self.snapshot()
    }

    /// Current device list
    pub fn snapshot(&self) -> Vec<Device> {
        self.devices.clone()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// `cc|type|description` lines, one per device, for display surfaces
    pub fn joined_lines(&self) -> Vec<String> {
        self.devices
            .iter()
            .map(|d| format!("{}|{}|{}", d.cc, d.ui_type, d.description))
            .collect()
    }
}
