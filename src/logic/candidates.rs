//! Candidate kexts derived from hardware facts.
//!
//! Produces the ordered list of names handed to the compatibility gate and then
//! to [`crate::logic::resolver::DependencyResolver::select`]. Rules only read
//! facts; nothing here consults selection state or the catalog windows.
//!
//! # Design
//!
//! - **Order matters**: later rules may inspect earlier picks (e.g. NootedRed
//!   pulls in ForgedInvariant), and the resolver applies picks in this order,
//!   so a later conflict-group member wins
//! - **First occurrence kept**: duplicates are dropped, not moved
//! - **No dialogs**: choices that need a human (audio layout, Navi 21/23 GPU
//!   driver without an Intel iGPU, Intel Wi-Fi flavour) are passed in as
//!   explicit candidates instead
//!
//! Rules run in this order: platform sensors, CPU quirks, graphics, root
//! patch, network, Bluetooth, laptop input, ACPI extras (YogaSMC, ECEnabler),
//! SD readers, storage, USB, legacy power management.

use tracing::debug;

use crate::hardware::{
    BluetoothChipset, GpuKind, HardwareFacts, InputKind, InputVendor, NetworkChipset, SataSupport,
    SdChipset, UsbSupport,
};
use crate::types::DarwinVersion;

const CATALINA: DarwinVersion = DarwinVersion::new(19, 0, 0);
const BIG_SUR: DarwinVersion = DarwinVersion::new(20, 0, 0);
const SONOMA: DarwinVersion = DarwinVersion::new(23, 0, 0);
const TAHOE: DarwinVersion = DarwinVersion::new(25, 0, 0);

/// Hybrid-core Intel generations that benefit from CpuTopologyRebuild.
const HYBRID_CODENAMES: &[&str] = &["Alder Lake", "Raptor Lake"];

/// Ordered, de-duplicated list of candidate names.
#[derive(Debug, Default)]
struct Picks(Vec<String>);

impl Picks {
    fn push(&mut self, name: &str) {
        if !self.contains(name) {
            self.0.push(name.to_string());
        }
    }

    fn extend(&mut self, names: &[&str]) {
        for name in names {
            self.push(name);
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }
}

/// Derive candidate kext names for `facts` on `target`.
pub fn candidate_kexts(facts: &HardwareFacts, target: DarwinVersion) -> Vec<String> {
    let mut picks = Picks::default();
    let cpu = &facts.cpu;
    let laptop = facts.platform.is_laptop();
    let surface = facts.is_surface();

    picks.push("UTBDefault");

    if cpu.is_intel() {
        picks.extend(&["SMCProcessor", "SMCSuperIO"]);
    }

    if laptop && !surface {
        picks.push("SMCBatteryManager");
        if facts.motherboard_is("DELL") {
            picks.push("SMCDellSensors");
        }
        picks.push("SMCLightSensor");
    }

    if !cpu.is_intel_core() || target >= SONOMA {
        picks.push("RestrictEvents");
    }

    if !facts.audio_codecs.is_empty() && target < TAHOE {
        picks.push("AppleALC");
    }

    if (cpu.is_amd() && target >= DarwinVersion::new(21, 4, 0))
        || (cpu.cpu_count > 1 && target >= CATALINA)
    {
        picks.push("AppleMCEReporterDisabler");
    }

    if target >= DarwinVersion::new(22, 0, 0) && !cpu.avx2 {
        picks.push("CryptexFixup");
    }

    if HYBRID_CODENAMES.iter().any(|c| cpu.codename_is(c)) && cpu.core_count > 6 {
        picks.push("CpuTopologyRebuild");
    }

    gpu_picks(facts, target, &mut picks);

    if laptop && (facts.motherboard_is("ASUS") || picks.contains("NootedRed")) {
        picks.push("ForgedInvariant");
    }

    if cpu.hedt {
        picks.push("CpuTscSync");
    }

    if facts.needs_root_patch {
        picks.extend(&["AMFIPass", "RestrictEvents"]);
    }

    network_picks(facts, target, &mut picks);

    if facts.lacks_pci_network() {
        picks.push("NullEthernet");
    }

    for adapter in &facts.bluetooth {
        match adapter.chipset {
            BluetoothChipset::Atheros => picks.extend(&["Ath3kBT", "Ath3kBTInjector"]),
            BluetoothChipset::Broadcom => picks.push("BrcmFirmwareData"),
            BluetoothChipset::Intel => picks.push("IntelBluetoothFirmware"),
            BluetoothChipset::Generic => picks.push("BlueToolFixup"),
            BluetoothChipset::Other => {}
        }
    }

    if laptop {
        if surface {
            picks.push("BigSurface");
        } else {
            if facts.motherboard_is("ASUS") {
                picks.push("AsusSMC");
            }
            picks.push("BrightnessKeys");

            for device in &facts.input {
                match device.kind {
                    InputKind::Ps2 => {
                        picks.push("VoodooPS2Controller");
                        match device.vendor {
                            InputVendor::Synaptics => picks.push("VoodooRMI"),
                            InputVendor::Elan => picks.push("VoodooSMBus"),
                            _ => {}
                        }
                    }
                    InputKind::I2C => {
                        picks.push("VoodooI2CHID");
                        match device.vendor {
                            InputVendor::Alps => picks.push("AlpsHID"),
                            InputVendor::Synaptics => picks.push("VoodooRMI"),
                            _ => {}
                        }
                    }
                    InputKind::Other => {}
                }
            }
        }
    }

    if facts.yoga_hid {
        picks.push("YogaSMC");
    }

    if facts.battery_patch {
        picks.push("ECEnabler");
    }

    for reader in &facts.sd_controllers {
        match reader.chipset {
            SdChipset::RealtekRtsx => picks.push("Sinetek-rtsx"),
            SdChipset::RealtekPcie => picks.push("RealtekCardReader"),
            SdChipset::Other => {}
        }
    }

    for controller in &facts.storage_controllers {
        if controller.is_nvme() {
            picks.push("NVMeFix");
        } else if !controller.is_ahci() || cpu.is_amd() {
            match controller.sata {
                SataSupport::Native => {}
                _ if target >= BIG_SUR => picks.push("CtlnaAHCIPort"),
                SataSupport::UnsupportedLegacy => picks.push("SATA-unsupported"),
                SataSupport::Unsupported => {}
            }
        }
    }

    for controller in &facts.usb_controllers {
        match controller.support {
            UsbSupport::AmdApu if laptop => picks.push("GenericUSBXHCI"),
            UsbSupport::Unsupported => picks.push("XHCI-unsupported"),
            _ => {}
        }
    }

    if cpu.codename_is("Sandy Bridge") {
        picks.push("ASPP-Override");
    }

    if cpu.codename_is("Sandy Bridge") || cpu.codename_is("Ivy Bridge") {
        picks.extend(&["AppleIntelCPUPowerManagement", "AppleIntelCPUPowerManagementClient"]);
    }

    debug!(count = picks.0.len(), "Derived candidate kexts for {}", facts);
    picks.0
}

fn gpu_picks(facts: &HardwareFacts, target: DarwinVersion, picks: &mut Picks) {
    for gpu in &facts.gpus {
        match gpu.kind {
            GpuKind::Integrated if gpu.is_amd() => picks.push("NootedRed"),
            GpuKind::Integrated => picks.push("WhateverGreen"),
            GpuKind::Discrete if gpu.codename.contains("Navi 22") => {
                picks.push("NootRX");
                break;
            }
            GpuKind::Discrete if gpu.codename == "Navi 21" || gpu.codename == "Navi 23" => {
                // NootRX cannot coexist with an Intel iGPU
                if facts.has_gpu_from("Intel") {
                    picks.push("WhateverGreen");
                } else {
                    debug!(gpu = %gpu.name, "Graphics kext for {} is left to the caller", gpu.codename);
                }
            }
            GpuKind::Discrete if target >= TAHOE => {
                debug!(gpu = %gpu.name, "No stock graphics kext for discrete GPUs on Darwin {}", target);
                break;
            }
            GpuKind::Discrete => picks.push("WhateverGreen"),
        }
    }
}

fn network_picks(facts: &HardwareFacts, target: DarwinVersion, picks: &mut Picks) {
    for adapter in &facts.network {
        let chipset = adapter.chipset;

        if chipset.is_broadcom_wifi() && target >= SONOMA {
            picks.push("IOSkywalkFamily");
        }

        if let Some(since) = chipset.brcm_fixup_since() {
            if target >= since {
                picks.push("AirportBrcmFixup");
            }
        } else if let Some(kext) = chipset.ethernet_kext() {
            picks.push(kext);
        } else {
            match chipset {
                NetworkChipset::AtherosWiFi => {
                    picks.push("corecaptureElCap");
                    if target > DarwinVersion::new(20, 99, 99) {
                        picks.push("AMFIPass");
                    }
                }
                NetworkChipset::IntelWiFi => {
                    debug!(adapter = %adapter.name, "Intel Wi-Fi driver choice is left to the caller");
                }
                _ => {}
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
