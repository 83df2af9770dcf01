//! Control loop
//!
//! A dedicated worker thread ticking at the configured frame rate. Each
//! tick: drain commands → poll input → process button edges → condition →
//! resolve preset hold → assemble frames → emit → publish runtime state →
//! drive indicators. Scheduling is wall-clock anchored (`epoch + n·T`);
//! an overrun skips the missed ticks instead of bursting so DMX values
//! never fast-forward.
//!
//! The loop never propagates an error out of a tick: subsystem failures
//! are recorded in RuntimeState and retried on the next tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use followspot_core::conditioner::{self, Conditioned};
use followspot_core::{
    ButtonCommand, ButtonMachine, ConfigSnapshot, ConfigStore, FrameAssembler, RuntimeHandle,
    FIXTURE_LIMIT,
};

use crate::indicators::{FixtureStatusSink, IndicatorSink};
use crate::input::{DeviceProvider, InputStage, VirtualPad};
use crate::sacn::SacnEmitter;
use crate::Result;

/// Commands delivered to the loop from the HTTP surface (and internally
/// from button edges).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopCommand {
    /// Take control: resume output
    Activate,
    /// Release control: zero frame next tick, then keepalives
    Release,
    /// Load a preset into the held-values slot
    RecallPreset(String),
    /// Drop the held values; live conditioning resumes
    ClearPresetHold,
    /// Finish the tick, flush zero frames, exit the thread
    Shutdown,
}

/// The control loop and everything it owns.
pub struct ControlLoop {
    store: Arc<ConfigStore>,
    runtime: RuntimeHandle,
    commands: Receiver<LoopCommand>,
    input: InputStage,
    buttons: ButtonMachine,
    assembler: FrameAssembler,
    emitter: SacnEmitter,
    indicators: Box<dyn IndicatorSink>,
    fixture_leds: Box<dyn FixtureStatusSink>,
    values: Conditioned,
    hold: Option<Conditioned>,
    active: bool,
    shutdown: bool,
}

impl ControlLoop {
    /// Wire up a loop. Returns the loop and the command sender handed to
    /// the HTTP surface.
    pub fn new(
        store: Arc<ConfigStore>,
        runtime: RuntimeHandle,
        pad: Arc<VirtualPad>,
        provider: Arc<dyn DeviceProvider>,
        indicators: Box<dyn IndicatorSink>,
        fixture_leds: Box<dyn FixtureStatusSink>,
    ) -> Result<(Self, Sender<LoopCommand>)> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let emitter = SacnEmitter::new()?;
        Ok((
            Self {
                store,
                runtime,
                commands: rx,
                input: InputStage::new(provider, pad),
                buttons: ButtonMachine::new(),
                assembler: FrameAssembler::new(),
                emitter,
                indicators,
                fixture_leds,
                values: Conditioned::default(),
                hold: None,
                active: false,
                shutdown: false,
            },
            tx,
        ))
    }

    /// Run on a dedicated worker thread.
    pub fn spawn(self) -> JoinHandle<()> {
        thread::Builder::new()
            .name("control-loop".into())
            .spawn(move || self.run())
            .expect("control loop thread spawn failed")
    }

    /// Blocking scheduler: fixed period with drift correction.
    pub fn run(mut self) {
        let mut period = period_of(self.store.snapshot().settings.frame_rate);
        let mut epoch = Instant::now();
        let mut n: u64 = 0;
        tracing::info!(period_ms = period.as_millis() as u64, "control loop started");

        loop {
            self.tick(Instant::now());
            if self.shutdown {
                break;
            }

            let configured = period_of(self.store.snapshot().settings.frame_rate);
            if configured != period {
                tracing::info!(
                    period_ms = configured.as_millis() as u64,
                    "frame rate changed, rescheduling"
                );
                period = configured;
                epoch = Instant::now();
                n = 0;
            }

            n += 1;
            let mut target = epoch + mul(period, n);
            let now = Instant::now();
            if target <= now {
                // Overrun: jump past the missed ticks, never burst-catch-up.
                let elapsed = now.duration_since(epoch).as_nanos();
                let missed = (elapsed / period.as_nanos().max(1)) as u64;
                n = missed + 1;
                target = epoch + mul(period, n);
            }
            thread::sleep(target.saturating_duration_since(Instant::now()));
        }

        tracing::info!("control loop stopped");
    }

    /// One tick. Public for integration tests; `run` drives this.
    pub fn tick(&mut self, now: Instant) {
        let snapshot = self.store.snapshot();
        let mut tick_error: Option<String> = None;

        let pending: Vec<LoopCommand> = self.commands.try_iter().collect();
        for command in pending {
            self.handle_command(command, &snapshot);
        }
        if self.shutdown {
            self.finish(&snapshot);
            return;
        }

        if let Err(e) = self.emitter.reconfigure(&snapshot.settings.bind_addresses) {
            tick_error.get_or_insert_with(|| e.to_string());
        }

        let (sample, source) = self.input.poll(&snapshot.settings, now);

        for command in self.buttons.update(&sample.buttons, now, &snapshot) {
            self.handle_command(command.into(), &snapshot);
        }

        let held = self.buttons.held(&snapshot);
        self.values = conditioner::condition(&snapshot.settings, &sample.axes, &held, self.values);
        let output = self.hold.unwrap_or(self.values);

        self.assembler.assemble(&snapshot, output, self.active);

        let mut universe_ok: HashMap<u16, bool> = HashMap::new();
        for (universe, buffer) in self.assembler.buffers() {
            match self
                .emitter
                .transmit(&snapshot.settings, universe, buffer.data(), buffer.dirty())
            {
                Ok(_) => {
                    universe_ok.insert(universe, true);
                }
                Err(e) => {
                    universe_ok.insert(universe, false);
                    tick_error.get_or_insert_with(|| e.to_string());
                }
            }
        }
        for universe in self.assembler.finish_tick() {
            self.emitter.retire(universe);
        }

        let fixture_ok = fixture_slot_health(&snapshot, &universe_ok);
        let active = self.active;
        let values = output;
        self.runtime.update(|state| {
            state.active = active;
            state.joystick_name = source.device_name.clone();
            state.axis_count = source.axis_count;
            state.button_count = source.button_count;
            state.virtual_active = source.virtual_active;
            state.last_frame = Some(now);
            state.values = values;
            state.fixture_ok = fixture_ok.clone();
            match &tick_error {
                Some(message) => state.set_error(message.clone()),
                None => state.clear_error(),
            }
        });

        self.indicators.set_power(true);
        self.indicators.set_error(tick_error.is_some());
        self.fixture_leds.set_slots(&fixture_ok);

        if let Some(message) = tick_error {
            tracing::warn!(error = %message, "tick completed with error");
        }
    }

    fn handle_command(&mut self, command: LoopCommand, snapshot: &ConfigSnapshot) {
        match command {
            LoopCommand::Activate => {
                if !self.active {
                    tracing::info!("activate: taking control");
                    self.active = true;
                }
            }
            LoopCommand::Release => {
                if self.active {
                    tracing::info!("release: zero frame next, output suspended");
                    self.active = false;
                }
            }
            LoopCommand::RecallPreset(id) => match snapshot.preset(&id) {
                Some(preset) => {
                    tracing::info!(preset = %preset.name, "preset recalled");
                    self.hold = Some(preset.values());
                }
                None => tracing::warn!(id = %id, "recall of unknown preset ignored"),
            },
            LoopCommand::ClearPresetHold => {
                if self.hold.take().is_some() {
                    tracing::info!("preset hold released");
                }
            }
            LoopCommand::Shutdown => {
                self.shutdown = true;
            }
        }
    }

    /// Final tick work: zero frames on every live universe, indicators off.
    fn finish(&mut self, snapshot: &ConfigSnapshot) {
        let universes = self.assembler.universes();
        tracing::info!(?universes, "shutdown: flushing zero frames");
        self.emitter.flush_zero(&snapshot.settings, &universes);
        self.indicators.set_power(false);
        self.indicators.set_error(false);
        self.fixture_leds.set_slots(&[]);
        self.runtime.update(|state| state.active = false);
    }
}

impl From<ButtonCommand> for LoopCommand {
    fn from(command: ButtonCommand) -> Self {
        match command {
            ButtonCommand::Activate => LoopCommand::Activate,
            ButtonCommand::Release => LoopCommand::Release,
            ButtonCommand::RecallPreset(id) => LoopCommand::RecallPreset(id),
            ButtonCommand::ClearPresetHold => LoopCommand::ClearPresetHold,
        }
    }
}

fn period_of(frame_rate: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(frame_rate.max(1)))
}

fn mul(period: Duration, n: u64) -> Duration {
    Duration::from_nanos((period.as_nanos() as u64).saturating_mul(n))
}

fn fixture_slot_health(snapshot: &ConfigSnapshot, universe_ok: &HashMap<u16, bool>) -> Vec<bool> {
    let settings = &snapshot.settings;
    let mut slots = vec![false; FIXTURE_LIMIT];
    for fixture in &snapshot.fixtures {
        let slot = usize::from(fixture.status_led);
        if slot == 0 || slot > FIXTURE_LIMIT || !fixture.enabled {
            continue;
        }
        let universe = if settings.multi_universe_enabled {
            fixture.universe
        } else {
            settings.default_universe
        };
        slots[slot - 1] = universe_ok.get(&universe).copied().unwrap_or(false);
    }
    slots
}
