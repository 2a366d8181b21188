//! The stock kext catalog.
//!
//! Descriptor data is kept in Rust rather than a data file because:
//! 1. **Compile-time checks**: a malformed version is a build error, not a runtime one
//! 2. **Easy updates**: add/remove drivers in one place
//! 3. **Testability**: the table is validated by the unit tests below
//!
//! Bounds left as `None` fall back to [`DEFAULT_BOUNDS`].
//!
//! | Conflict group      | Members |
//! |---------------------|---------|
//! | GPU                 | NootRX, NootedRed, WhateverGreen |
//! | IntelWiFi           | AirportItlwm, itlwm |
//! | SATA                | CtlnaAHCIPort, SATA-unsupported |
//! | RealtekCardReader   | RealtekCardReader, Sinetek-rtsx |
//! | TSC                 | AmdTscSync, VoodooTSCSync, CpuTscSync, ForgedInvariant |

use super::KextDescriptor;
use crate::types::{DarwinVersion, VersionBounds};

/// Lowest Darwin version the stock catalog supports (macOS High Sierra).
pub const LOWEST_VERSION: DarwinVersion = DarwinVersion::new(17, 0, 0);

/// Latest Darwin version the stock catalog supports.
pub const LATEST_VERSION: DarwinVersion = DarwinVersion::new(25, 99, 99);

/// Latest Darwin version with a non-beta macOS release (macOS Sequoia).
pub const LATEST_RELEASE_VERSION: DarwinVersion = DarwinVersion::new(24, 99, 99);

pub const DEFAULT_BOUNDS: VersionBounds = VersionBounds::new(LOWEST_VERSION, LATEST_VERSION);

/// The patching framework nearly every plugin hooks into.
pub const CORE_HOOK: &str = "Lilu";

struct Entry {
    name: &'static str,
    description: &'static str,
    category: &'static str,
    required: bool,
    min: Option<DarwinVersion>,
    max: Option<DarwinVersion>,
    requires: &'static [&'static str],
    group: Option<&'static str>,
}

const fn v(major: u32, minor: u32, patch: u32) -> Option<DarwinVersion> {
    Some(DarwinVersion::new(major, minor, patch))
}

/// Shorthand for an optional, unbounded, group-less entry.
const fn plain(
    name: &'static str,
    category: &'static str,
    description: &'static str,
    requires: &'static [&'static str],
) -> Entry {
    Entry {
        name,
        description,
        category,
        required: false,
        min: None,
        max: None,
        requires,
        group: None,
    }
}

const LILU: &[&str] = &["Lilu"];
const LILU_SMC: &[&str] = &["Lilu", "VirtualSMC"];
const I2C: &[&str] = &["VoodooI2C"];

const ENTRIES: &[Entry] = &[
    // Required
    Entry {
        required: true,
        ..plain("Lilu", "Required", "Arbitrary kext, library and program patching", &[])
    },
    Entry {
        required: true,
        ..plain("VirtualSMC", "Required", "Advanced Apple SMC emulator in the kernel", LILU)
    },
    // VirtualSMC plugins
    plain("SMCBatteryManager", "VirtualSMC Plugins", "Manages, monitors and reports battery status", LILU_SMC),
    plain("SMCDellSensors", "VirtualSMC Plugins", "Fan monitoring and control on Dell computers", LILU_SMC),
    plain("SMCLightSensor", "VirtualSMC Plugins", "Exposes the ambient light sensor", LILU_SMC),
    plain("SMCProcessor", "VirtualSMC Plugins", "Intel CPU temperature sensors", LILU_SMC),
    Entry {
        min: v(18, 0, 0),
        ..plain("SMCRadeonSensors", "VirtualSMC Plugins", "Temperature readings for AMD GPUs", LILU_SMC)
    },
    plain("SMCSuperIO", "VirtualSMC Plugins", "Hardware sensor monitoring and fan speed control", LILU_SMC),
    // Graphics
    Entry {
        min: v(20, 5, 0),
        group: Some("GPU"),
        ..plain("NootRX", "Graphics", "Patches for RDNA 2 discrete GPUs", LILU)
    },
    Entry {
        min: v(19, 0, 0),
        group: Some("GPU"),
        ..plain("NootedRed", "Graphics", "Support for AMD Vega integrated GPUs", LILU)
    },
    Entry {
        group: Some("GPU"),
        ..plain("WhateverGreen", "Graphics", "Various patches necessary for GPU support", LILU)
    },
    // Audio
    plain("AppleALC", "Audio", "Native HD audio for unofficially supported codecs", LILU),
    // Wi-Fi
    plain("AirportBrcmFixup", "Wi-Fi", "Patches for non-native Broadcom Wi-Fi cards", LILU),
    Entry {
        group: Some("IntelWiFi"),
        ..plain("AirportItlwm", "Wi-Fi", "Intel Wi-Fi driver using the native Wi-Fi interface", &[])
    },
    Entry {
        min: v(18, 0, 0),
        max: v(24, 99, 99),
        ..plain("corecaptureElCap", "Wi-Fi", "Enables legacy Qualcomm Atheros wireless cards", &["IO80211ElCap"])
    },
    Entry {
        min: v(18, 0, 0),
        max: v(24, 99, 99),
        ..plain("IO80211ElCap", "Wi-Fi", "Enables legacy Qualcomm Atheros wireless cards", &["corecaptureElCap"])
    },
    Entry {
        min: v(23, 0, 0),
        ..plain("IO80211FamilyLegacy", "Wi-Fi", "Enables legacy Apple wireless adapters", &["AMFIPass", "IOSkywalkFamily"])
    },
    Entry {
        min: v(23, 0, 0),
        ..plain("IOSkywalkFamily", "Wi-Fi", "Enables legacy Apple wireless adapters", &["AMFIPass", "IO80211FamilyLegacy"])
    },
    Entry {
        group: Some("IntelWiFi"),
        ..plain("itlwm", "Wi-Fi", "Intel Wi-Fi driver emulated as Ethernet, managed through HeliPort", &[])
    },
    // Bluetooth
    Entry {
        max: v(20, 99, 99),
        ..plain("Ath3kBT", "Bluetooth", "Uploads firmware for Atheros Bluetooth", &["Ath3kBTInjector"])
    },
    Entry {
        max: v(20, 99, 99),
        ..plain("Ath3kBTInjector", "Bluetooth", "Uploads firmware for Atheros Bluetooth", &["Ath3kBT"])
    },
    Entry {
        min: v(21, 0, 0),
        ..plain("BlueToolFixup", "Bluetooth", "Patches the Bluetooth stack for third-party cards", LILU)
    },
    Entry {
        max: v(20, 99, 99),
        ..plain(
            "BrcmBluetoothInjector",
            "Bluetooth",
            "Enables the Broadcom Bluetooth toggle on older releases",
            &["BrcmBluetoothInjector", "BrcmFirmwareData", "BrcmPatchRAM2", "BrcmPatchRAM3"],
        )
    },
    plain(
        "BrcmFirmwareData",
        "Bluetooth",
        "Applies PatchRAM updates to Broadcom RAMUSB devices",
        &["BlueToolFixup", "BrcmBluetoothInjector", "BrcmPatchRAM2", "BrcmPatchRAM3"],
    ),
    Entry {
        max: v(18, 99, 99),
        ..plain(
            "BrcmPatchRAM2",
            "Bluetooth",
            "Applies PatchRAM updates to Broadcom RAMUSB devices",
            &["BlueToolFixup", "BrcmBluetoothInjector", "BrcmFirmwareData", "BrcmPatchRAM3"],
        )
    },
    Entry {
        min: v(19, 0, 0),
        ..plain(
            "BrcmPatchRAM3",
            "Bluetooth",
            "Applies PatchRAM updates to Broadcom RAMUSB devices",
            &["BlueToolFixup", "BrcmBluetoothInjector", "BrcmFirmwareData", "BrcmPatchRAM2"],
        )
    },
    plain(
        "IntelBluetoothFirmware",
        "Bluetooth",
        "Uploads firmware for Intel Bluetooth",
        &["BlueToolFixup", "IntelBTPatcher", "IntelBluetoothInjector"],
    ),
    plain(
        "IntelBTPatcher",
        "Bluetooth",
        "Fixes Intel Bluetooth bugs for better connectivity",
        &["Lilu", "BlueToolFixup", "IntelBluetoothFirmware", "IntelBluetoothInjector"],
    ),
    Entry {
        max: v(20, 99, 99),
        ..plain(
            "IntelBluetoothInjector",
            "Bluetooth",
            "Enables the Intel Bluetooth toggle on older releases",
            &["BlueToolFixup", "IntelBluetoothFirmware", "IntelBTPatcher"],
        )
    },
    // Ethernet
    plain("AppleIGB", "Ethernet", "Intel IGB Ethernet controllers", &[]),
    plain("AppleIGC", "Ethernet", "Intel 2.5G Ethernet (i225/i226)", &[]),
    plain("SimpleGBE", "Ethernet", "i210/i211 Ethernet driver", &[]),
    plain("AtherosE2200Ethernet", "Ethernet", "Atheros E2200 family", &[]),
    Entry {
        min: v(20, 0, 0),
        ..plain("CatalinaBCM5701Ethernet", "Ethernet", "Broadcom BCM57XX Ethernet family", &[])
    },
    plain("HoRNDIS", "Ethernet", "Internet through Android USB tethering", &[]),
    plain("IntelLucy", "Ethernet", "Intel X500 family", &[]),
    plain("IntelMausiEthernet", "Ethernet", "Intel Ethernet LAN driver", &[]),
    plain("LucyRTL8125Ethernet", "Ethernet", "Realtek RTL8125 family", &[]),
    plain("NullEthernet", "Ethernet", "Creates a null Ethernet when no supported network hardware exists", &[]),
    plain("RealtekRTL8100", "Ethernet", "Realtek RTL8100 family", &[]),
    plain("RealtekRTL8111", "Ethernet", "Realtek RTL8111/8168 family", &[]),
    // USB
    plain("GenericUSBXHCI", "USB", "Fixes USB 3.0 issues on some AMD APU systems", &[]),
    plain("USBToolBox", "USB", "Flexible USB mapping", &[]),
    plain("UTBDefault", "USB", "Enables all USB ports (assumes no port limit)", &["USBToolBox"]),
    plain("XHCI-unsupported", "USB", "USB 3.0 for unsupported xHCI controllers", &[]),
    // Input
    plain("AlpsHID", "Input", "Native multitouch for Alps I2C touchpads", I2C),
    plain("VoodooInput", "Input", "Magic Trackpad 2 emulation for arbitrary input sources", &[]),
    plain("VoodooPS2Controller", "Input", "PS/2 keyboards, touchpads and mice", &[]),
    plain("VoodooRMI", "Input", "Synaptics touchpads over SMBus/I2C", &[]),
    Entry {
        min: v(18, 0, 0),
        ..plain("VoodooSMBus", "Input", "i2c-i801 and ELAN SMBus touchpads", &[])
    },
    plain("VoodooI2C", "Input", "Intel I2C controller and slave device drivers", &[]),
    plain("VoodooI2CAtmelMXT", "Input", "Satellite for Atmel MXT I2C touchscreens", I2C),
    plain("VoodooI2CELAN", "Input", "Satellite for ELAN I2C touchpads", I2C),
    plain("VoodooI2CFTE", "Input", "Satellite for FTE touchpads", I2C),
    plain("VoodooI2CHID", "Input", "Satellite for HID I2C and ELAN1200+ devices", I2C),
    plain("VoodooI2CSynaptics", "Input", "Satellite for Synaptics I2C touchpads", I2C),
    // Brand specific
    Entry {
        max: v(23, 99, 99),
        ..plain("AsusSMC", "Brand Specific", "ALS, keyboard backlight and Fn keys on ASUS laptops", LILU)
    },
    plain("BigSurface", "Brand Specific", "Integrated support for Surface hardware", LILU),
    plain("YogaSMC", "Brand Specific", "SMC key sync, sensors and vendor features", LILU_SMC),
    // Storage
    Entry {
        min: v(20, 0, 0),
        group: Some("SATA"),
        ..plain("CtlnaAHCIPort", "Storage", "Improved support for some SATA controllers", &[])
    },
    Entry {
        max: v(19, 99, 99),
        group: Some("SATA"),
        ..plain("SATA-unsupported", "Storage", "Improved support for some SATA controllers", &[])
    },
    Entry {
        min: v(18, 0, 0),
        ..plain("NVMeFix", "Storage", "NVMe SSD compatibility and power fixes", LILU)
    },
    // Card reader
    Entry {
        min: v(18, 0, 0),
        max: v(23, 99, 99),
        group: Some("RealtekCardReader"),
        ..plain("RealtekCardReader", "Card Reader", "Realtek PCIe/USB SD card reader driver", &["RealtekCardReaderFriend"])
    },
    Entry {
        min: v(18, 0, 0),
        max: v(22, 99, 99),
        ..plain(
            "RealtekCardReaderFriend",
            "Card Reader",
            "Lets System Information recognize the Realtek reader",
            &["Lilu", "RealtekCardReader"],
        )
    },
    Entry {
        group: Some("RealtekCardReader"),
        ..plain("Sinetek-rtsx", "Card Reader", "Realtek PCIe SD card reader driver", &[])
    },
    // TSC synchronization
    Entry {
        group: Some("TSC"),
        ..plain("AmdTscSync", "TSC Synchronization", "VoodooTSCSync variant for AMD CPUs", &[])
    },
    Entry {
        group: Some("TSC"),
        ..plain("VoodooTSCSync", "TSC Synchronization", "TSC sync for Intel CPUs", &[])
    },
    Entry {
        group: Some("TSC"),
        ..plain("CpuTscSync", "TSC Synchronization", "TSC sync and xcpm_urgency disable on Intel CPUs", LILU)
    },
    Entry {
        group: Some("TSC"),
        ..plain("ForgedInvariant", "TSC Synchronization", "Plug-and-play TSC sync for AMD and Intel", LILU)
    },
    // Extras
    Entry {
        min: v(20, 0, 0),
        ..plain("AMFIPass", "Extras", "Alternative to the amfi=0x80 boot argument", LILU)
    },
    Entry {
        min: v(21, 4, 0),
        ..plain("ASPP-Override", "Extras", "Re-enables CPU power management on Sandy Bridge", &[])
    },
    Entry {
        min: v(22, 0, 0),
        ..plain("AppleIntelCPUPowerManagement", "Extras", "Re-enables CPU power management on legacy Intel CPUs", &[])
    },
    Entry {
        min: v(22, 0, 0),
        ..plain(
            "AppleIntelCPUPowerManagementClient",
            "Extras",
            "Re-enables CPU power management on legacy Intel CPUs",
            &[],
        )
    },
    plain("AppleMCEReporterDisabler", "Extras", "Disables AppleMCEReporter to prevent kernel panics", &[]),
    plain("BrightnessKeys", "Extras", "Brightness key handler without DSDT patches", LILU),
    plain("CPUFriend", "Extras", "Dynamic power management data injection", LILU),
    plain("CpuTopologyRebuild", "Extras", "Core layout optimization for Alder Lake and newer", LILU),
    Entry {
        min: v(22, 0, 0),
        ..plain("CryptexFixup", "Extras", "Patches for installing the Rosetta cryptex", LILU)
    },
    plain("ECEnabler", "Extras", "Reads embedded controller fields wider than one byte", LILU),
    plain("FeatureUnlock", "Extras", "Enables extra features on unsupported hardware", LILU),
    plain("HibernationFixup", "Extras", "Fixes hibernation compatibility issues", LILU),
    Entry {
        min: v(17, 5, 0),
        max: v(19, 6, 0),
        ..plain("NoTouchID", "Extras", "Avoids auth dialog lag on Touch ID board ids", LILU)
    },
    plain("RestrictEvents", "Extras", "Blocks unwanted processes and unlocks features", LILU),
    plain("RTCMemoryFixup", "Extras", "Emulates some offsets in CMOS (RTC) memory", LILU),
];

/// Materialize the stock table as descriptors.
pub fn descriptors() -> Vec<KextDescriptor> {
    ENTRIES
        .iter()
        .map(|e| KextDescriptor {
            name: e.name.to_string(),
            description: e.description.to_string(),
            category: e.category.to_string(),
            required: e.required,
            min_version: e.min.unwrap_or(LOWEST_VERSION),
            max_version: e.max.unwrap_or(LATEST_VERSION),
            requires: e.requires.iter().map(|r| r.to_string()).collect(),
            conflict_group: e.group.map(str::to_string),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let mut seen = HashSet::new();
        for entry in ENTRIES {
            assert!(seen.insert(entry.name), "duplicate entry {}", entry.name);
        }
    }

    #[test]
    fn test_only_lilu_and_virtualsmc_required() {
        let required: Vec<&str> = ENTRIES.iter().filter(|e| e.required).map(|e| e.name).collect();
        assert_eq!(required, vec!["Lilu", "VirtualSMC"]);
    }

    #[test]
    fn test_windows_are_ordered() {
        for kext in descriptors() {
            assert!(
                kext.min_version <= kext.max_version,
                "{} has an inverted window",
                kext.name
            );
        }
    }

    #[test]
    fn test_conflict_groups_match_table() {
        let gpu: Vec<String> = descriptors()
            .into_iter()
            .filter(|k| k.conflict_group.as_deref() == Some("GPU"))
            .map(|k| k.name)
            .collect();
        assert_eq!(gpu, vec!["NootRX", "NootedRed", "WhateverGreen"]);
    }

    #[test]
    fn test_unbounded_entries_use_defaults() {
        let lilu = descriptors().into_iter().find(|k| k.name == "Lilu").unwrap();
        assert_eq!(lilu.min_version, LOWEST_VERSION);
        assert_eq!(lilu.max_version, LATEST_VERSION);
    }
}
