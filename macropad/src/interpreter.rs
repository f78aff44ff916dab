//! Macro execution.
//!
//! A macro runs in two phases. The press phase runs when the key goes down: instructions are executed in order until
//! a delay, which schedules the rest as a deferred continuation instead of blocking. The release phase runs when the
//! key goes up and releases whatever the sequence holds: bare and `-` key codes, a held consumer code, an
//! indefinite tone, indefinite midi notes and mouse buttons.
//!
//! Timed effects (tone stop, midi note off) are deferred entries as well. The main loop pops due entries with
//! [`Interpreter::pop_due`] and runs them with [`Interpreter::run_deferred`].
use core::cmp::Ordering;

use embassy_time::{Duration, Instant};
use heapless::binary_heap::{BinaryHeap, Min};
use heapless::Vec as HVec;
use macropad_types::keycode::HidKeyCode;
use macropad_types::layout::KeyboardLayout;

use crate::encoder::EncoderEvent;
use crate::hid::HidOutput;
use crate::instruction::{Instruction, MAX_NOTES, MidiStep, PressMode};
use crate::macro_store::MacroStore;
use crate::node::{MacroNode, NodeId};
use crate::system::SysCall;

/// Max system calls collected from one run
pub const MAX_SYSCALLS: usize = 4;

/// Initial, centered pitch bend
pub const PITCH_BEND_CENTER: u16 = 8192;

/// The sequence a continuation belongs to, resolved again by id when it runs
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MacroTarget {
    /// The content of a macro node
    Node(NodeId),
    /// An encoder binding of a group
    Encoder { group: NodeId, event: EncoderEvent },
}

impl MacroTarget {
    /// The instructions of the target in `store`, `None` if the node is gone or of the wrong kind
    pub fn resolve<'a>(&self, store: &'a MacroStore) -> Option<&'a [Instruction]> {
        match (self, store.get(self.id())?) {
            (MacroTarget::Node(_), MacroNode::Macro { instructions, .. }) => Some(instructions),
            (MacroTarget::Encoder { event, .. }, MacroNode::Group { encoder, .. }) => Some(match event {
                EncoderEvent::Switch => &encoder.switch,
                EncoderEvent::Increased => &encoder.increased,
                EncoderEvent::Decreased => &encoder.decreased,
            }),
            _ => None,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            MacroTarget::Node(id) | MacroTarget::Encoder { group: id, .. } => id,
        }
    }
}

/// What started a run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Trigger {
    /// Key with this index, continuations only run the press phase while it's held
    Key(usize),
    Encoder,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeferredAction {
    /// Continue `target` at instruction `index`
    Resume { target: MacroTarget, index: usize },
    StopTone,
    NoteOff { notes: HVec<u8, MAX_NOTES>, velocity: u8 },
}

#[derive(Clone, Debug)]
pub struct DeferredEntry {
    pub due: Instant,
    /// Insertion order, breaks ties between entries due at the same time
    seq: u32,
    pub trigger: Trigger,
    pub action: DeferredAction,
}

impl PartialEq for DeferredEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DeferredEntry {}

impl PartialOrd for DeferredEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DeferredEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

/// Result of one run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunOutcome {
    /// System calls met in the press phase, the caller dispatches them
    pub syscalls: HVec<SysCall, MAX_SYSCALLS>,
    /// The press phase stopped at a delay and scheduled the rest
    pub deferred: bool,
}

impl RunOutcome {
    pub fn merge(&mut self, other: RunOutcome) {
        for syscall in other.syscalls {
            if self.syscalls.push(syscall).is_err() {
                warn!("Too many system calls in one macro, {:?} dropped", syscall);
            }
        }
        self.deferred |= other.deferred;
    }
}

fn is_delay(instruction: &Instruction) -> bool {
    matches!(instruction, Instruction::Delay(s) if *s != 0.0)
}

/// Longest delay, tone or note in seconds, longer ones are cut to this
const MAX_DELAY_SECS: f64 = 86_400.0;

/// `now` plus `s` seconds, `None` if that's past the end of time
fn due_after(now: Instant, s: f64) -> Option<Instant> {
    let micros = (s.abs().min(MAX_DELAY_SECS) * 1_000_000.0) as u64;
    now.checked_add(Duration::try_from_micros(micros)?)
}

/// Runs macros against the HID outputs, `QUEUE` is the capacity of the deferred queue
pub struct Interpreter<const QUEUE: usize = 16> {
    deferred: BinaryHeap<DeferredEntry, Min, QUEUE>,
    seq: u32,
    pitch_bend: u16,
    /// Layout text is typed with
    layout: KeyboardLayout,
}

impl<const QUEUE: usize> Default for Interpreter<QUEUE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const QUEUE: usize> Interpreter<QUEUE> {
    pub fn new() -> Self {
        Self {
            deferred: BinaryHeap::new(),
            seq: 0,
            pitch_bend: PITCH_BEND_CENTER,
            layout: KeyboardLayout::Us,
        }
    }

    pub fn set_layout(&mut self, layout: KeyboardLayout) {
        self.layout = layout;
    }

    pub fn layout(&self) -> KeyboardLayout {
        self.layout
    }

    /// Number of deferred entries waiting
    pub fn pending(&self) -> usize {
        self.deferred.len()
    }

    /// Current pitch bend, shared by all macros
    pub fn pitch_bend(&self) -> u16 {
        self.pitch_bend
    }

    /// Due time of the next deferred entry
    pub fn next_due(&self) -> Option<Instant> {
        self.deferred.peek().map(|entry| entry.due)
    }

    /// Pop the earliest entry if it's due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<DeferredEntry> {
        if self.deferred.peek()?.due <= now {
            self.deferred.pop()
        } else {
            None
        }
    }

    /// Schedule `action` to run `s` seconds after `now`
    fn schedule_after(&mut self, now: Instant, s: f64, trigger: Trigger, action: DeferredAction) -> bool {
        match due_after(now, s) {
            Some(due) => self.schedule(due, trigger, action),
            None => {
                warn!("Deferred entry {}s after {} overflows, dropped", s, now.as_micros());
                false
            }
        }
    }

    fn schedule(&mut self, due: Instant, trigger: Trigger, action: DeferredAction) -> bool {
        let entry = DeferredEntry {
            due,
            seq: self.seq,
            trigger,
            action,
        };
        self.seq = self.seq.wrapping_add(1);
        match self.deferred.push(entry) {
            Ok(()) => true,
            Err(_) => {
                warn!("Deferred queue is full, entry dropped");
                false
            }
        }
    }

    /// Run one phase of `instructions` from `start`: the press phase if `pressed`, otherwise the release phase
    #[allow(clippy::too_many_arguments)]
    pub fn run<H: HidOutput + ?Sized>(
        &mut self,
        hid: &mut H,
        target: &MacroTarget,
        instructions: &[Instruction],
        start: usize,
        pressed: bool,
        trigger: Trigger,
        now: Instant,
    ) -> RunOutcome {
        let tail = instructions.get(start..).unwrap_or_default();
        if pressed {
            self.press_phase(hid, target, tail, start, trigger, now)
        } else {
            Self::release_phase(hid, tail);
            RunOutcome::default()
        }
    }

    /// Press phase immediately followed by the release phase, for triggers without a release
    pub fn run_oneshot<H: HidOutput + ?Sized>(
        &mut self,
        hid: &mut H,
        target: &MacroTarget,
        instructions: &[Instruction],
        trigger: Trigger,
        now: Instant,
    ) -> RunOutcome {
        let outcome = self.run(hid, target, instructions, 0, true, trigger, now);
        self.run(hid, target, instructions, 0, false, trigger, now);
        outcome
    }

    /// Run a popped entry. `held` tells whether the key that started it is still down.
    ///
    /// A continuation whose target no longer resolves in `store` is dropped.
    pub fn run_deferred<H: HidOutput + ?Sized>(
        &mut self,
        hid: &mut H,
        store: &MacroStore,
        entry: DeferredEntry,
        held: bool,
        now: Instant,
    ) -> RunOutcome {
        match entry.action {
            DeferredAction::StopTone => {
                hid.stop_tone();
                RunOutcome::default()
            }
            DeferredAction::NoteOff { notes, velocity } => {
                for note in notes {
                    hid.note_off(note, velocity);
                }
                RunOutcome::default()
            }
            DeferredAction::Resume { target, index } => {
                let Some(instructions) = target.resolve(store) else {
                    debug!("Continuation of {} dropped, node is gone", target.id());
                    return RunOutcome::default();
                };
                let outcome = self.run(hid, &target, instructions, index, true, entry.trigger, now);
                if !held {
                    // The key is up already: release what this run pressed, up to the next delay
                    let tail = instructions.get(index..).unwrap_or_default();
                    let end = if outcome.deferred {
                        tail.iter().position(is_delay).unwrap_or(tail.len())
                    } else {
                        tail.len()
                    };
                    Self::release_phase(hid, &tail[..end]);
                }
                outcome
            }
        }
    }

    fn press_phase<H: HidOutput + ?Sized>(
        &mut self,
        hid: &mut H,
        target: &MacroTarget,
        tail: &[Instruction],
        start: usize,
        trigger: Trigger,
        now: Instant,
    ) -> RunOutcome {
        let mut outcome = RunOutcome::default();
        for (offset, instruction) in tail.iter().enumerate() {
            match instruction {
                Instruction::Delay(s) if *s == 0.0 => {}
                Instruction::Delay(s) => {
                    let resume = DeferredAction::Resume {
                        target: target.clone(),
                        index: start + offset + 1,
                    };
                    self.schedule_after(now, *s, trigger, resume);
                    outcome.deferred = true;
                    return outcome;
                }
                Instruction::TypeText(text) => hid.write_text(text, self.layout),
                Instruction::KeyCode { mode, codes } => match mode {
                    PressMode::Press => codes.iter().for_each(|&code| hid.press_key(code)),
                    PressMode::Tap => {
                        codes.iter().for_each(|&code| hid.press_key(code));
                        codes.iter().rev().for_each(|&code| hid.release_key(code));
                    }
                    PressMode::Release => {}
                },
                Instruction::ReleaseAll => hid.release_all_keys(),
                Instruction::ConsumerCode { mode, code } => match mode {
                    PressMode::Press => hid.press_consumer(*code),
                    PressMode::Tap => {
                        hid.press_consumer(*code);
                        hid.release_consumer();
                    }
                    PressMode::Release => {}
                },
                Instruction::MouseMove { x, y, wheel, button } => {
                    if let Some(button) = button {
                        hid.click(*button);
                    }
                    hid.move_by(*x, *y, *wheel);
                }
                Instruction::Tone { frequency, duration } => {
                    hid.start_tone(*frequency);
                    if *duration > 0.0 {
                        self.schedule_after(now, *duration, trigger, DeferredAction::StopTone);
                    }
                }
                Instruction::PlayFile(path) => {
                    if let Err(e) = hid.play_file(path) {
                        debug!("Failed to play {}: {:?}", path.as_str(), e);
                    }
                }
                Instruction::Midi(step) => self.midi_press(hid, step, trigger, now),
                Instruction::SysCall(syscall) => {
                    if outcome.syscalls.push(*syscall).is_err() {
                        warn!("Too many system calls in one macro, {:?} dropped", syscall);
                    }
                }
                Instruction::Unknown => {}
            }
        }
        outcome
    }

    fn midi_press<H: HidOutput + ?Sized>(&mut self, hid: &mut H, step: &MidiStep, trigger: Trigger, now: Instant) {
        for &note in &step.notes_on {
            hid.note_on(note, step.velocity);
        }
        if step.duration > 0.0 && !step.notes_on.is_empty() {
            let note_off = DeferredAction::NoteOff {
                notes: step.notes_on.clone(),
                velocity: step.velocity,
            };
            self.schedule_after(now, step.duration, trigger, note_off);
        }
        for &note in &step.notes_off {
            hid.note_off(note, step.velocity);
        }
        if let Some(bend) = step.pitch_bend {
            self.pitch_bend = bend.apply(self.pitch_bend);
            hid.pitch_bend(self.pitch_bend);
        }
        if let Some((control, value)) = step.control_change {
            hid.control_change(control, value);
        }
        if let Some(program) = step.program_change {
            hid.program_change(program);
        }
    }

    fn release_phase<H: HidOutput + ?Sized>(hid: &mut H, tail: &[Instruction]) {
        let mut keys: HVec<HidKeyCode, 32> = HVec::new();
        let mut consumer = false;
        let mut tone = false;
        let mut mouse = false;
        for instruction in tail {
            match instruction {
                Instruction::KeyCode {
                    mode: PressMode::Press | PressMode::Release,
                    codes,
                } => {
                    for &code in codes {
                        if !keys.contains(&code) && keys.push(code).is_err() {
                            // Too many distinct keys to track, release this one right away
                            hid.release_key(code);
                        }
                    }
                }
                Instruction::ConsumerCode {
                    mode: PressMode::Press | PressMode::Release,
                    ..
                } => consumer = true,
                Instruction::Tone { duration, .. } if *duration == 0.0 => tone = true,
                Instruction::Midi(step) if step.duration == 0.0 => {
                    for &note in &step.notes_on {
                        hid.note_off(note, step.velocity);
                    }
                }
                Instruction::MouseMove { .. } => mouse = true,
                _ => {}
            }
        }
        for &code in &keys {
            hid.release_key(code);
        }
        if consumer {
            hid.release_consumer();
        }
        if tone {
            hid.stop_tone();
        }
        if mouse {
            hid.release_all_buttons();
        }
    }
}
