use crate::storage::FileStorage;

/// Whether the storage is exposed to the host as a USB drive during this run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbMode {
    /// Storage is a USB drive, the firmware sees it read-only
    Enabled,
    /// Storage is private to the firmware and writable
    DataOnly,
}

/// Check and consume the USB marker file at boot.
///
/// The marker is written by the `enable_usb` command right before a reset, so it only enables the USB drive for
/// one boot.
pub fn check_usb_mode<S: FileStorage>(storage: &mut S, marker: &str) -> UsbMode {
    if !storage.exists(marker) {
        return UsbMode::DataOnly;
    }
    if let Err(e) = storage.remove(marker) {
        warn!("Failed to remove usb marker {}: {:?}", marker, e);
    }
    info!("USB drive enabled for this boot");
    UsbMode::Enabled
}

/// Write the USB marker file, takes effect on next boot
pub fn request_usb_mode<S: FileStorage>(storage: &mut S, marker: &str) -> bool {
    match storage.write(marker, b"") {
        Ok(()) => true,
        Err(e) => {
            error!("Failed to write usb marker {}: {:?}", marker, e);
            false
        }
    }
}

pub(crate) fn reboot() {
    warn!("Rebooting macropad!");
    // For cortex-m:
    #[cfg(all(
        target_arch = "arm",
        target_os = "none",
        any(target_abi = "eabi", target_abi = "eabihf")
    ))]
    cortex_m::peripheral::SCB::sys_reset();
}
