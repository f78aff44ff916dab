use embassy_time::Duration;

/// Version reported to the host on connect
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The config struct for the macropad.
///
/// These are board and build level settings. User settings which are editable from the host live in
/// [`Settings`](crate::settings::Settings).
#[derive(Clone, Debug)]
pub struct MacroPadConfig<'a> {
    pub behavior_config: BehaviorConfig,
    pub host_config: HostConfig<'a>,
    pub storage_config: StorageConfig<'a>,
    /// Run memory maintenance when the free heap drops below this many bytes
    pub memory_limit: usize,
}

impl Default for MacroPadConfig<'_> {
    fn default() -> Self {
        Self {
            behavior_config: BehaviorConfig::default(),
            host_config: HostConfig::default(),
            storage_config: StorageConfig::default(),
            memory_limit: 18000,
        }
    }
}

/// How held keys repeat their action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RetriggerMode {
    /// Every held key with the retrigger flag repeats independently
    PerKey,
    /// Only one key is active at a time: presses are ignored while another key is held
    SingleSlot,
}

/// How the content of a group is laid out on the keys
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LayoutMode {
    /// Content item `i` is bound to key `i`, items beyond the key count are not reachable
    Direct,
    /// Content is split into tabs of [`TAB_SIZE`] items, the last three keys are a toolbar:
    /// previous tab, back (home on long groups) and next tab
    Tabbed,
}

/// Number of content items on one tab in [`LayoutMode::Tabbed`]
pub const TAB_SIZE: usize = 9;

/// Config for key behavior
#[derive(Clone, Copy, Debug)]
pub struct BehaviorConfig {
    /// A held retriggerable key fires again after this interval
    pub retrigger_threshold: Duration,
    pub retrigger_mode: RetriggerMode,
    pub layout_mode: LayoutMode,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            retrigger_threshold: Duration::from_millis(750),
            retrigger_mode: RetriggerMode::PerKey,
            layout_mode: LayoutMode::Direct,
        }
    }
}

/// Config for the serial host channel
#[derive(Clone, Copy, Debug)]
pub struct HostConfig<'a> {
    /// Max bytes discarded per tick while recovering from a malformed frame
    pub readout_size: usize,
    /// Max bytes read per tick while waiting for a complete line
    pub read_chunk_size: usize,
    /// Lines longer than this are treated as malformed
    pub max_line_length: usize,
    /// Version pushed to the host on connect
    pub firmware_version: &'a str,
}

impl Default for HostConfig<'_> {
    fn default() -> Self {
        Self {
            readout_size: 64,
            read_chunk_size: 256,
            max_line_length: 16 * 1024,
            firmware_version: FIRMWARE_VERSION,
        }
    }
}

/// File names used on the persistent storage
#[derive(Clone, Copy, Debug)]
pub struct StorageConfig<'a> {
    pub settings_file: &'a str,
    pub macro_file: &'a str,
    /// Marker file which enables the USB drive on next boot
    pub usb_enabled_file: &'a str,
    /// Directory listed to the host as available audio files
    pub audio_dir: Option<&'a str>,
}

impl Default for StorageConfig<'_> {
    fn default() -> Self {
        Self {
            settings_file: "settings.json",
            macro_file: "macros.json",
            usb_enabled_file: "usbenabled",
            audio_dir: None,
        }
    }
}
