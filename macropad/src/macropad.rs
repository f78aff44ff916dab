use embassy_time::{Duration, Instant, Timer};

use crate::Device;
use crate::boot;
use crate::config::{MacroPadConfig, RetriggerMode};
use crate::encoder::EncoderState;
use crate::host::{ControlChannel, HostContext, HostEffect};
use crate::interpreter::{Interpreter, MacroTarget, RunOutcome, Trigger};
use crate::key_indicator::KeyIndicator;
use crate::macro_store::MacroStore;
use crate::navigation::{BoundAction, NavigationStack};
use crate::node::NodeId;
use crate::settings::Settings;
use crate::storage::FileStorage;
use crate::system::{SysCall, step_brightness};

/// Interval between two iterations of [`MacroPad::run`]
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// The macropad application: owns the state and drives the device from a single polling loop.
///
/// Every step of [`MacroPad::tick`] returns immediately, delays inside macros are deferred to later ticks.
pub struct MacroPad<'a, D: Device, S: FileStorage, const NUM_KEYS: usize> {
    config: MacroPadConfig<'a>,
    settings: Settings,
    store: MacroStore,
    navigation: NavigationStack,
    keys: [KeyIndicator; NUM_KEYS],
    /// Macro started by the press of each key, its release phase runs when the key goes up
    held_macros: [Option<NodeId>; NUM_KEYS],
    interpreter: Interpreter,
    encoder: EncoderState,
    host: ControlChannel<'a>,
    /// Last key or encoder activity, for the display sleep
    last_activity: Instant,
    device: D,
    storage: S,
}

impl<'a, D: Device, S: FileStorage, const NUM_KEYS: usize> MacroPad<'a, D, S, NUM_KEYS> {
    /// Load settings and macros from `storage` and show the root group
    pub fn new(device: D, mut storage: S, config: MacroPadConfig<'a>) -> Self {
        let files = config.storage_config;
        let settings = Settings::load(&mut storage, files.settings_file);
        let store = MacroStore::load(&mut storage, files.macro_file);
        info!("Loaded {} macro nodes", store.len());

        let mut pad = Self {
            navigation: NavigationStack::new(config.behavior_config.layout_mode),
            keys: core::array::from_fn(KeyIndicator::new),
            held_macros: core::array::from_fn(|_| None),
            interpreter: Interpreter::new(),
            encoder: EncoderState::new(),
            host: ControlChannel::new(config.host_config, files),
            last_activity: Instant::now(),
            config,
            settings,
            store,
            device,
            storage,
        };
        pad.apply_settings();
        pad.refresh();
        pad
    }

    /// Run the polling loop forever
    pub async fn run(&mut self) -> ! {
        loop {
            self.tick(Instant::now());
            Timer::after(POLL_INTERVAL).await;
        }
    }

    /// One iteration of the polling loop
    pub fn tick(&mut self, now: Instant) {
        self.check_sleep(now);
        self.device.refresh();

        if let Some(free) = self.device.free_memory()
            && free < self.config.memory_limit
        {
            debug!("Free memory {} below limit, reclaiming", free);
            self.device.reclaim_memory();
        }

        self.host.poll_connection(&mut self.device, &mut self.storage);
        if self.host.is_connected() {
            let effect = if self.host.is_draining() {
                self.host.recover(&mut self.device, &mut self.store, &mut self.storage)
            } else if self.host.has_input(&mut self.device) {
                let ctx = HostContext {
                    settings: &mut self.settings,
                    store: &mut self.store,
                    storage: &mut self.storage,
                };
                self.host.process(&mut self.device, ctx)
            } else {
                HostEffect::None
            };
            self.apply_host_effect(effect, now);
        }

        self.run_deferred(now);

        if let Some(event) = self.device.poll_key_event() {
            self.wake(now);
            if event.index >= NUM_KEYS {
                warn!("Key event for unknown key {}", event.index);
            } else if event.pressed {
                self.key_pressed(event.index, now);
            } else {
                self.key_released(event.index, now);
            }
        }

        self.retrigger(now);
        self.poll_encoder(now);
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &MacroStore {
        &self.store
    }

    pub fn navigation(&self) -> &NavigationStack {
        &self.navigation
    }

    pub fn keys(&self) -> &[KeyIndicator; NUM_KEYS] {
        &self.keys
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn check_sleep(&mut self, now: Instant) {
        let Some(timeout) = self.settings.sleep_timeout() else {
            return;
        };
        if !self.device.is_sleeping() && now.saturating_duration_since(self.last_activity) > timeout {
            debug!("Display going to sleep");
            self.device.set_sleep(true);
        }
    }

    fn wake(&mut self, now: Instant) {
        self.last_activity = now;
        if self.device.is_sleeping() {
            self.device.set_sleep(false);
        }
    }

    /// Bind the open group to the keys
    fn refresh(&mut self) {
        self.navigation.refresh_group(
            &self.store,
            &mut self.keys,
            self.settings.invertcolors,
            &mut self.device,
        );
    }

    fn apply_settings(&mut self) {
        self.interpreter.set_layout(self.settings.keyboardlayout);
        self.apply_brightness();
    }

    fn apply_brightness(&mut self) {
        let brightness = self.settings.brightness;
        self.device.set_brightness(brightness);
        self.device.set_pixel_brightness(brightness);
        self.device.show();
    }

    fn enable_usb(&mut self) {
        if boot::request_usb_mode(&mut self.storage, self.config.storage_config.usb_enabled_file) {
            self.device.hard_reset();
        }
    }

    fn apply_host_effect(&mut self, effect: HostEffect, now: Instant) {
        match effect {
            HostEffect::None => {}
            HostEffect::SettingsChanged => {
                self.apply_settings();
                self.refresh();
            }
            HostEffect::MacrosReplaced => {
                self.navigation.reset_to_root();
                self.refresh();
                self.wake(now);
            }
            HostEffect::EnableUsb => self.enable_usb(),
            HostEffect::SoftReset => self.device.soft_reset(),
            HostEffect::HardReset => self.device.hard_reset(),
        }
    }

    fn dispatch_syscalls(&mut self, outcome: RunOutcome) {
        for syscall in outcome.syscalls {
            debug!("System call {:?}", syscall);
            match syscall {
                SysCall::EnableUsb => self.enable_usb(),
                SysCall::SoftReset => self.device.soft_reset(),
                SysCall::HardReset => self.device.hard_reset(),
                SysCall::CloseGroup => {
                    self.navigation.close();
                    self.refresh();
                }
                SysCall::GoToRoot => {
                    self.navigation.reset_to_root();
                    self.refresh();
                }
                SysCall::IncreaseBrightness | SysCall::DecreaseBrightness => {
                    let increase = syscall == SysCall::IncreaseBrightness;
                    self.settings.brightness = step_brightness(self.settings.brightness, increase);
                    self.apply_brightness();
                }
                SysCall::Unknown => {}
            }
        }
    }

    fn run_deferred(&mut self, now: Instant) {
        while let Some(entry) = self.interpreter.pop_due(now) {
            let held = match entry.trigger {
                Trigger::Key(index) => self.keys.get(index).is_some_and(KeyIndicator::is_pressed),
                Trigger::Encoder => false,
            };
            let outcome = self
                .interpreter
                .run_deferred(&mut self.device, &self.store, entry, held, now);
            self.dispatch_syscalls(outcome);
        }
    }

    fn key_pressed(&mut self, index: usize, now: Instant) {
        if self.config.behavior_config.retrigger_mode == RetriggerMode::SingleSlot
            && self.keys.iter().any(KeyIndicator::is_pressed)
        {
            debug!("Key {} ignored, another key is held", index);
            return;
        }
        if let Some(action) = self.keys[index].press(now, &mut self.device) {
            self.dispatch_action(index, action, now);
        }
    }

    fn key_released(&mut self, index: usize, now: Instant) {
        if !self.keys[index].is_pressed() {
            return;
        }
        self.keys[index].release(&mut self.device);
        if let Some(id) = self.held_macros[index].take() {
            let target = MacroTarget::Node(id);
            if let Some(instructions) = target.resolve(&self.store) {
                self.interpreter
                    .run(&mut self.device, &target, instructions, 0, false, Trigger::Key(index), now);
            }
        }
    }

    fn dispatch_action(&mut self, index: usize, action: BoundAction, now: Instant) {
        match action {
            BoundAction::OpenGroup(id) => {
                self.navigation.open(&id);
                self.refresh();
            }
            BoundAction::RunMacro(id) => {
                let target = MacroTarget::Node(id.clone());
                let Some(instructions) = target.resolve(&self.store) else {
                    return;
                };
                let outcome = self
                    .interpreter
                    .run(&mut self.device, &target, instructions, 0, true, Trigger::Key(index), now);
                self.held_macros[index] = Some(id);
                self.dispatch_syscalls(outcome);
            }
            BoundAction::PrevTab => {
                if self.navigation.prev_tab() {
                    self.refresh();
                }
            }
            BoundAction::NextTab => {
                if self.navigation.next_tab() {
                    self.refresh();
                }
            }
            BoundAction::CloseGroup => {
                self.navigation.close();
                self.refresh();
            }
            BoundAction::GoToRoot => {
                self.navigation.reset_to_root();
                self.refresh();
            }
        }
    }

    /// Fire held retriggerable keys again: release the previous run, then press again
    fn retrigger(&mut self, now: Instant) {
        let threshold = self.config.behavior_config.retrigger_threshold;
        for index in 0..NUM_KEYS {
            if !self.keys[index].retrigger_due(now, threshold) {
                continue;
            }
            let Some(action) = self.keys[index].mark_fired(now) else {
                continue;
            };
            self.wake(now);
            if let Some(id) = self.held_macros[index].take() {
                let target = MacroTarget::Node(id);
                if let Some(instructions) = target.resolve(&self.store) {
                    self.interpreter
                        .run(&mut self.device, &target, instructions, 0, false, Trigger::Key(index), now);
                }
            }
            self.dispatch_action(index, action, now);
        }
    }

    fn poll_encoder(&mut self, now: Instant) {
        for event in self.encoder.poll(&mut self.device) {
            let target = MacroTarget::Encoder {
                group: self.navigation.current().clone(),
                event,
            };
            let Some(instructions) = target.resolve(&self.store) else {
                continue;
            };
            if instructions.is_empty() {
                continue;
            }
            // Same as `self.wake(now)`, split into field borrows since `instructions` borrows `self.store`
            self.last_activity = now;
            if self.device.is_sleeping() {
                self.device.set_sleep(false);
            }
            let outcome = self
                .interpreter
                .run_oneshot(&mut self.device, &target, instructions, Trigger::Encoder, now);
            self.dispatch_syscalls(outcome);
        }
    }
}
