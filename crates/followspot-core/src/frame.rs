//! DMX frame assembly
//!
//! Each tick the assembler resolves the current values for every enabled
//! fixture and packs them into per-universe 512-byte buffers. Buffers are
//! created lazily when a universe gains its first enabled fixture and
//! retired with a final all-zero frame when it loses its last one. A
//! buffer is dirty when any byte changed since the previous tick; the
//! emitter uses that to decide between an immediate send and a keepalive.

use std::collections::BTreeMap;

use crate::conditioner::{self, Conditioned};
use crate::fixture::Fixture;
use crate::store::ConfigSnapshot;
use crate::{DmxFrame, DMX_SLOTS};

/// One universe's outgoing DMX state.
#[derive(Debug, Clone)]
pub struct UniverseBuffer {
    data: DmxFrame,
    dirty: bool,
    retiring: bool,
}

impl UniverseBuffer {
    fn new(data: DmxFrame) -> Self {
        Self {
            data,
            dirty: true,
            retiring: false,
        }
    }

    /// The 512 DMX slot values (slot 1 at index 0).
    pub fn data(&self) -> &DmxFrame {
        &self.data
    }

    /// Whether any byte changed since the previous tick.
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Whether this buffer is sending its final zero frame.
    pub fn retiring(&self) -> bool {
        self.retiring
    }
}

/// Owns the per-universe buffers and rebuilds them from the fixture patch
/// every tick.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffers: BTreeMap<u16, UniverseBuffer>,
    blanked: bool,
}

impl FrameAssembler {
    /// Create an assembler with no allocated universes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild all universe buffers for this tick.
    ///
    /// While inactive the buffers are zeroed exactly once (the release
    /// frame) and then left untouched until output resumes.
    pub fn assemble(&mut self, snapshot: &ConfigSnapshot, values: Conditioned, active: bool) {
        if !active {
            if !self.blanked {
                for buffer in self.buffers.values_mut() {
                    buffer.data = [0u8; DMX_SLOTS];
                    buffer.dirty = true;
                }
                self.blanked = true;
            }
            return;
        }
        self.blanked = false;

        let settings = &snapshot.settings;
        let mut frames: BTreeMap<u16, DmxFrame> = BTreeMap::new();
        for fixture in snapshot.fixtures.iter().filter(|f| f.enabled) {
            let universe = if settings.multi_universe_enabled {
                fixture.universe
            } else {
                settings.default_universe
            };
            let frame = frames.entry(universe).or_insert([0u8; DMX_SLOTS]);
            let resolved = conditioner::apply_fixture(values, fixture, settings);
            write_fixture(frame, fixture, resolved);
        }

        for (universe, frame) in frames {
            match self.buffers.get_mut(&universe) {
                Some(buffer) => {
                    buffer.retiring = false;
                    if buffer.data != frame {
                        buffer.data = frame;
                        buffer.dirty = true;
                    }
                }
                None => {
                    tracing::debug!(universe, "universe buffer allocated");
                    self.buffers.insert(universe, UniverseBuffer::new(frame));
                }
            }
        }

        // Universes that lost their last enabled fixture go out with one
        // zero frame before the buffer is dropped.
        for (universe, buffer) in self.buffers.iter_mut() {
            if !buffer.retiring && !snapshot_uses_universe(snapshot, *universe) {
                tracing::debug!(universe, "universe buffer retiring");
                buffer.data = [0u8; DMX_SLOTS];
                buffer.dirty = true;
                buffer.retiring = true;
            }
        }
    }

    /// Iterate the live buffers in universe order.
    pub fn buffers(&self) -> impl Iterator<Item = (u16, &UniverseBuffer)> {
        self.buffers.iter().map(|(u, b)| (*u, b))
    }

    /// Universes currently held by the assembler.
    pub fn universes(&self) -> Vec<u16> {
        self.buffers.keys().copied().collect()
    }

    /// Clear dirty flags and drop retired buffers after the emit pass.
    /// Returns the universes that were retired.
    pub fn finish_tick(&mut self) -> Vec<u16> {
        let retired: Vec<u16> = self
            .buffers
            .iter()
            .filter(|(_, b)| b.retiring)
            .map(|(u, _)| *u)
            .collect();
        self.buffers.retain(|_, b| !b.retiring);
        for buffer in self.buffers.values_mut() {
            buffer.dirty = false;
        }
        retired
    }
}

fn snapshot_uses_universe(snapshot: &ConfigSnapshot, universe: u16) -> bool {
    let settings = &snapshot.settings;
    snapshot.fixtures.iter().filter(|f| f.enabled).any(|f| {
        let target = if settings.multi_universe_enabled {
            f.universe
        } else {
            settings.default_universe
        };
        target == universe
    })
}

fn write_fixture(frame: &mut DmxFrame, fixture: &Fixture, values: Conditioned) {
    let put = |frame: &mut DmxFrame, offset: u16, value: u8| {
        if let Some(index) = fixture.slot(offset) {
            frame[index] = value;
        }
    };

    put(frame, fixture.pan_coarse, (values.pan16 >> 8) as u8);
    put(frame, fixture.pan_fine, (values.pan16 & 0xFF) as u8);
    put(frame, fixture.tilt_coarse, (values.tilt16 >> 8) as u8);
    put(frame, fixture.tilt_fine, (values.tilt16 & 0xFF) as u8);
    put(frame, fixture.dimmer, values.dim8);
    put(frame, fixture.zoom, (values.zoom16 >> 8) as u8);
    put(frame, fixture.zoom_fine, (values.zoom16 & 0xFF) as u8);
    put(frame, fixture.color_temp_channel, fixture.color_temp_value);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(id: &str, universe: u16) -> Fixture {
        Fixture {
            id: id.into(),
            universe,
            start_addr: 1,
            pan_coarse: 1,
            pan_fine: 2,
            tilt_coarse: 3,
            tilt_fine: 4,
            dimmer: 5,
            ..Default::default()
        }
    }

    fn snapshot_with(fixtures: Vec<Fixture>) -> ConfigSnapshot {
        let mut snap = ConfigSnapshot::default();
        snap.settings.multi_universe_enabled = true;
        snap.fixtures = fixtures;
        snap
    }

    #[test]
    fn basic_frame_layout() {
        let snap = snapshot_with(vec![fixture("F1", 1)]);
        let mut assembler = FrameAssembler::new();
        let values = Conditioned {
            pan16: 0x8000,
            tilt16: 0x8000,
            dim8: 255,
            zoom16: 0,
        };
        assembler.assemble(&snap, values, true);

        let (universe, buffer) = assembler.buffers().next().unwrap();
        assert_eq!(universe, 1);
        assert!(buffer.dirty());
        assert_eq!(&buffer.data()[0..5], &[0x80, 0x00, 0x80, 0x00, 0xFF]);
        assert!(buffer.data()[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn unused_offsets_stay_untouched() {
        let fx = Fixture {
            dimmer: 0,
            ..fixture("F1", 1)
        };
        let snap = snapshot_with(vec![fx]);
        let mut assembler = FrameAssembler::new();
        assembler.assemble(
            &snap,
            Conditioned {
                dim8: 255,
                ..Conditioned::default()
            },
            true,
        );
        let (_, buffer) = assembler.buffers().next().unwrap();
        assert_eq!(buffer.data()[4], 0);
    }

    #[test]
    fn dirty_clears_when_values_hold() {
        let snap = snapshot_with(vec![fixture("F1", 1)]);
        let mut assembler = FrameAssembler::new();
        let values = Conditioned::default();

        assembler.assemble(&snap, values, true);
        assert!(assembler.buffers().next().unwrap().1.dirty());
        assembler.finish_tick();

        assembler.assemble(&snap, values, true);
        assert!(!assembler.buffers().next().unwrap().1.dirty());
    }

    #[test]
    fn release_zeroes_every_buffer_once() {
        let snap = snapshot_with(vec![fixture("F1", 1), fixture("F2", 2)]);
        let mut assembler = FrameAssembler::new();
        assembler.assemble(
            &snap,
            Conditioned {
                dim8: 200,
                ..Conditioned::default()
            },
            true,
        );
        assembler.finish_tick();

        assembler.assemble(&snap, Conditioned::default(), false);
        for (_, buffer) in assembler.buffers() {
            assert!(buffer.dirty());
            assert!(buffer.data().iter().all(|&b| b == 0));
        }
        assembler.finish_tick();

        // second inactive tick leaves the buffers untouched
        assembler.assemble(&snap, Conditioned::default(), false);
        for (_, buffer) in assembler.buffers() {
            assert!(!buffer.dirty());
        }
    }

    #[test]
    fn universe_retires_with_final_zero_frame() {
        let mut snap = snapshot_with(vec![fixture("F1", 1), fixture("F2", 2)]);
        let mut assembler = FrameAssembler::new();
        assembler.assemble(&snap, Conditioned::default(), true);
        assembler.finish_tick();
        assert_eq!(assembler.universes(), vec![1, 2]);

        snap.fixtures[1].enabled = false;
        assembler.assemble(&snap, Conditioned::default(), true);
        let retiring: Vec<_> = assembler
            .buffers()
            .filter(|(_, b)| b.retiring())
            .map(|(u, b)| (u, b.dirty(), b.data().iter().all(|&x| x == 0)))
            .collect();
        assert_eq!(retiring, vec![(2, true, true)]);

        let retired = assembler.finish_tick();
        assert_eq!(retired, vec![2]);
        assert_eq!(assembler.universes(), vec![1]);
    }

    #[test]
    fn single_universe_mode_folds_everything_onto_default() {
        let mut snap = snapshot_with(vec![fixture("F1", 1), {
            let mut f = fixture("F2", 7);
            f.start_addr = 10;
            f
        }]);
        snap.settings.multi_universe_enabled = false;
        snap.settings.default_universe = 3;

        let mut assembler = FrameAssembler::new();
        assembler.assemble(&snap, Conditioned::default(), true);
        assert_eq!(assembler.universes(), vec![3]);
    }

    #[test]
    fn shared_universe_fixtures_overlay_distinct_slots() {
        let a = fixture("A", 1);
        let mut b = fixture("B", 1);
        b.start_addr = 101;
        let snap = snapshot_with(vec![a, b]);

        let mut assembler = FrameAssembler::new();
        let values = Conditioned {
            dim8: 42,
            ..Conditioned::default()
        };
        assembler.assemble(&snap, values, true);
        let (_, buffer) = assembler.buffers().next().unwrap();
        assert_eq!(buffer.data()[4], 42); // A's dimmer at slot 5
        assert_eq!(buffer.data()[104], 42); // B's dimmer at slot 105
    }

    #[test]
    fn fixture_bias_lands_in_the_frame() {
        let mut fx = fixture("F1", 1);
        fx.pan_bias = 256;
        let snap = snapshot_with(vec![fx]);
        let mut assembler = FrameAssembler::new();
        assembler.assemble(&snap, Conditioned::default(), true);
        let (_, buffer) = assembler.buffers().next().unwrap();
        assert_eq!(buffer.data()[0], 0x81); // 0x8000 + 256 → coarse 0x81
    }
}
