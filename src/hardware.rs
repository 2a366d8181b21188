//! Hardware facts consumed by candidate selection.
//!
//! Detection and report parsing happen elsewhere; this module only defines the
//! shape of the facts that detection produces, deserialized from JSON.
//!
//! # Design
//!
//! - **Pre-classified**: Facts arrive already classified (vendor, GPU kind, bus
//!   type). Raw PCI/USB id matching is the detection collaborator's job.
//! - **Forgiving**: Every collection defaults to empty so a partial report still
//!   produces a candidate set.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use strum::{Display, EnumString};

use crate::types::DarwinVersion;

/// CPU vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
pub enum CpuVendor {
    #[default]
    Intel,
    #[serde(rename = "AMD")]
    #[strum(serialize = "AMD")]
    Amd,
    Other,
}

/// Machine form factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
pub enum Platform {
    #[default]
    Desktop,
    Laptop,
}

impl Platform {
    pub fn is_laptop(self) -> bool {
        matches!(self, Self::Laptop)
    }
}

/// Integrated vs. discrete graphics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString)]
pub enum GpuKind {
    Integrated,
    Discrete,
}

/// Bus a device hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum BusType {
    #[default]
    Pci,
    Usb,
    Acpi,
}

/// Input device attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString)]
pub enum InputKind {
    #[serde(rename = "PS/2")]
    #[strum(serialize = "PS/2")]
    Ps2,
    I2C,
    Other,
}

/// Network controller family, as classified by detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
pub enum NetworkChipset {
    /// Broadcom Wi-Fi that AirportBrcmFixup patches on every release
    BroadcomWiFi,
    /// Broadcom Wi-Fi that AirportBrcmFixup patches from Darwin 19
    BroadcomWiFiFrom19,
    /// Broadcom Wi-Fi that AirportBrcmFixup patches from Darwin 20
    BroadcomWiFiFrom20,
    /// Intel Wi-Fi; the itlwm / AirportItlwm choice is the caller's
    IntelWiFi,
    /// Qualcomm Atheros Wi-Fi handled by the ElCapitan IO80211 stack
    AtherosWiFi,
    /// Intel I225/I226 2.5G Ethernet
    IntelI225,
    AtherosE2200,
    IntelMausi,
    RealtekRtl8125,
    RealtekRtl8100,
    RealtekRtl8111,
    IntelIgb,
    BroadcomBcm57xx,
    IntelX500,
    #[default]
    Other,
}

impl NetworkChipset {
    pub fn is_broadcom_wifi(self) -> bool {
        matches!(self, Self::BroadcomWiFi | Self::BroadcomWiFiFrom19 | Self::BroadcomWiFiFrom20)
    }

    /// Lowest Darwin version AirportBrcmFixup supports this card on.
    pub fn brcm_fixup_since(self) -> Option<DarwinVersion> {
        match self {
            Self::BroadcomWiFi => Some(DarwinVersion::new(0, 0, 0)),
            Self::BroadcomWiFiFrom19 => Some(DarwinVersion::new(19, 0, 0)),
            Self::BroadcomWiFiFrom20 => Some(DarwinVersion::new(20, 0, 0)),
            _ => None,
        }
    }

    /// Ethernet driver for wired chipsets.
    pub fn ethernet_kext(self) -> Option<&'static str> {
        let kext = match self {
            Self::IntelI225 => "AppleIGC",
            Self::AtherosE2200 => "AtherosE2200Ethernet",
            Self::IntelMausi => "IntelMausiEthernet",
            Self::RealtekRtl8125 => "LucyRTL8125Ethernet",
            Self::RealtekRtl8100 => "RealtekRTL8100",
            Self::RealtekRtl8111 => "RealtekRTL8111",
            Self::IntelIgb => "AppleIGB",
            Self::BroadcomBcm57xx => "CatalinaBCM5701Ethernet",
            Self::IntelX500 => "IntelLucy",
            _ => return None,
        };
        Some(kext)
    }
}

/// Bluetooth controller family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
pub enum BluetoothChipset {
    Atheros,
    Broadcom,
    Intel,
    /// Works with the stock stack once BlueToolFixup patches it
    Generic,
    #[default]
    Other,
}

/// Touchpad / touchscreen vendor, where it changes the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
pub enum InputVendor {
    Alps,
    /// ELAN parts reachable over SMBus
    Elan,
    Synaptics,
    #[default]
    Other,
}

/// SD card reader family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
pub enum SdChipset {
    /// Realtek reader supported by RealtekCardReader
    RealtekPcie,
    /// Realtek reader only Sinetek-rtsx drives
    RealtekRtsx,
    #[default]
    Other,
}

/// How macOS copes with a SATA controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
pub enum SataSupport {
    #[default]
    Native,
    /// Needs CtlnaAHCIPort (Darwin 20+)
    Unsupported,
    /// Needs CtlnaAHCIPort, or SATA-unsupported before Darwin 20
    UnsupportedLegacy,
}

/// How macOS copes with a USB controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
pub enum UsbSupport {
    #[default]
    Native,
    /// AMD APU xHCI; GenericUSBXHCI on laptops
    AmdApu,
    /// Third-party xHCI needing XHCI-unsupported
    Unsupported,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuFacts {
    pub vendor: CpuVendor,
    /// Marketing name, e.g. "Intel Core i7-8700K"
    pub processor_name: String,
    /// Microarchitecture codename, e.g. "Coffee Lake"
    pub codename: String,
    pub core_count: u32,
    /// Number of physical CPU packages
    pub cpu_count: u32,
    pub avx2: bool,
    /// High-end desktop / workstation part (X, W, EP ... or Xeon)
    pub hedt: bool,
}

impl CpuFacts {
    pub fn is_intel(&self) -> bool {
        self.vendor == CpuVendor::Intel
    }

    pub fn is_amd(&self) -> bool {
        self.vendor == CpuVendor::Amd
    }

    /// Intel Core branded part.
    pub fn is_intel_core(&self) -> bool {
        self.is_intel() && self.processor_name.contains(" Core")
    }

    pub fn codename_is(&self, codename: &str) -> bool {
        self.codename.contains(codename)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuFacts {
    pub name: String,
    pub manufacturer: String,
    pub kind: GpuKind,
    #[serde(default)]
    pub codename: String,
}

impl GpuFacts {
    pub fn is_amd(&self) -> bool {
        self.manufacturer.contains("AMD")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAdapter {
    pub name: String,
    #[serde(default)]
    pub bus: BusType,
    #[serde(default)]
    pub chipset: NetworkChipset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothAdapter {
    pub name: String,
    #[serde(default)]
    pub chipset: BluetoothChipset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDevice {
    pub name: String,
    pub kind: InputKind,
    #[serde(default)]
    pub vendor: InputVendor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdController {
    pub name: String,
    #[serde(default)]
    pub chipset: SdChipset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageController {
    /// Name as reported (e.g. "Samsung NVMe Controller")
    pub name: String,
    #[serde(default)]
    pub sata: SataSupport,
}

impl StorageController {
    pub fn is_nvme(&self) -> bool {
        self.name.contains("NVMe") || self.name.contains("NVM Express")
    }

    pub fn is_ahci(&self) -> bool {
        self.name.contains("AHCI")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbController {
    pub name: String,
    #[serde(default)]
    pub support: UsbSupport,
}

/// Everything candidate selection needs to know about the machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareFacts {
    pub cpu: CpuFacts,
    pub platform: Platform,
    pub motherboard: String,
    pub gpus: Vec<GpuFacts>,
    /// Codec ids of audio devices that have AppleALC layouts
    pub audio_codecs: Vec<String>,
    pub network: Vec<NetworkAdapter>,
    pub bluetooth: Vec<BluetoothAdapter>,
    pub storage_controllers: Vec<StorageController>,
    pub sd_controllers: Vec<SdController>,
    pub usb_controllers: Vec<UsbController>,
    pub input: Vec<InputDevice>,
    /// An ACPI device exposes a Lenovo Yoga/IdeaPad/ThinkPad SMC HID
    pub yoga_hid: bool,
    /// The BATP ACPI patch is enabled (battery fields wider than one byte)
    pub battery_patch: bool,
    /// The build will apply OCLP-style root patches
    pub needs_root_patch: bool,
}

impl HardwareFacts {
    /// Load hardware facts from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read hardware facts from {:?}", path.as_ref()))?;

        let facts: Self =
            serde_json::from_str(&content).context("Failed to parse hardware facts JSON")?;

        Ok(facts)
    }

    pub fn motherboard_is(&self, vendor: &str) -> bool {
        self.motherboard.to_uppercase().contains(vendor)
    }

    /// Surface devices need BigSurface instead of the generic laptop set.
    pub fn is_surface(&self) -> bool {
        self.motherboard_is("SURFACE")
    }

    pub fn has_gpu_from(&self, manufacturer: &str) -> bool {
        self.gpus.iter().any(|g| g.manufacturer.contains(manufacturer))
    }

    /// True when no PCI network adapter exists (all USB, or none at all).
    pub fn lacks_pci_network(&self) -> bool {
        self.network.iter().all(|n| n.bus == BusType::Usb)
    }
}

impl fmt::Display for HardwareFacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CPU: {} {} ({} cores), Platform: {}, GPUs: {}",
            self.cpu.vendor,
            self.cpu.codename,
            self.cpu.core_count,
            self.platform,
            self.gpus.len()
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
