//! Song scheduler — timed calls against the engine on a virtual clock.
//!
//! [`Scheduler`] is a queue of `(fire time, task)` pairs. It never reads a
//! wall clock: whoever drives it calls [`Scheduler::advance_to`] with the
//! current engine time (or any time, in tests), and every task that has
//! come due runs in fire-time order. Tasks with equal fire times run in the
//! order they were scheduled.
//!
//! Playback started here is controlled through a [`PlaybackHandle`].
//! Stopping it marks every task it armed as cancelled. Cancelled tasks never
//! run; the queue drops them on the next [`Scheduler::advance_to`], or at once
//! through [`Scheduler::cancel`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{debug, info, trace};

use crate::dsp::engine::{AudioEngine, NoteConfig};
use crate::dsp::oscillator::Waveform;
use crate::pitch;
use crate::song::Song;

/// Extra time after a song's nominal length before it reports finished.
pub const FINISH_MARGIN: f64 = 0.5;

/// Defaults for song notes that carry no override.
pub const SONG_NOTE_VOLUME: f64 = 0.4;
pub const SONG_NOTE_ATTACK: f64 = 0.02;
pub const SONG_NOTE_RELEASE: f64 = 0.2;

/// Stereo positions the arpeggiator cycles through.
pub const ARPEGGIO_PANS: [f64; 5] = [-0.4, -0.2, 0.0, 0.2, 0.4];

/// Anything that can sound a one-shot note.
pub trait NotePlayer {
    fn play_note(&mut self, note: NoteConfig);
}

impl NotePlayer for AudioEngine {
    fn play_note(&mut self, note: NoteConfig) {
        AudioEngine::play_note(self, note);
    }
}

type Task<T> = Box<dyn FnOnce(&mut Scheduler<T>, &mut T)>;

/// Per-note callback, shared by every note task of one playback.
pub type NoteCallback = Box<dyn FnMut(&str)>;
pub type FinishCallback = Box<dyn FnOnce()>;

#[derive(Debug, Default)]
struct PlaybackState {
    stopped: Cell<bool>,
    finished: Cell<bool>,
}

/// Live state of one song or arpeggio performance.
///
/// Dropping the handle does not stop playback; call [`stop`](Self::stop).
#[derive(Debug)]
pub struct PlaybackHandle {
    state: Rc<PlaybackState>,
}

impl PlaybackHandle {
    fn new() -> Self {
        PlaybackHandle {
            state: Rc::new(PlaybackState::default()),
        }
    }

    /// Mark every task this playback still has pending as cancelled. Safe
    /// to call any number of times, including after the playback finished;
    /// notes armed past the finish time are cancelled too.
    pub fn stop(&self) {
        if self.state.stopped.replace(true) {
            return;
        }
        info!(finished = self.state.finished.get(), "playback stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.get()
    }

    /// True once a song has run to its finish time without being stopped.
    pub fn is_finished(&self) -> bool {
        self.state.finished.get()
    }

    fn token(&self) -> Rc<PlaybackState> {
        Rc::clone(&self.state)
    }
}

struct Entry<T> {
    fire_at: f64,
    owner: Rc<PlaybackState>,
    task: Task<T>,
}

/// Virtual-clock task queue driving calls against a target `T`.
pub struct Scheduler<T> {
    now: f64,
    /// Sorted by fire time; insertion order breaks ties.
    queue: VecDeque<Entry<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Scheduler::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Scheduler {
            now: 0.0,
            queue: VecDeque::new(),
        }
    }

    /// Start the clock at `now` (usually the engine's current time).
    pub fn starting_at(now: f64) -> Self {
        Scheduler {
            now,
            queue: VecDeque::new(),
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    fn schedule(&mut self, fire_at: f64, owner: &Rc<PlaybackState>, task: Task<T>) {
        let idx = self.queue.partition_point(|e| e.fire_at <= fire_at);
        self.queue.insert(
            idx,
            Entry {
                fire_at,
                owner: Rc::clone(owner),
                task,
            },
        );
    }

    /// Tasks that are armed and not cancelled.
    pub fn pending(&self) -> usize {
        self.queue.iter().filter(|e| !e.owner.stopped.get()).count()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Fire time of the earliest live task.
    pub fn next_fire_time(&self) -> Option<f64> {
        self.queue
            .iter()
            .find(|e| !e.owner.stopped.get())
            .map(|e| e.fire_at)
    }

    /// Drop tasks belonging to stopped playbacks.
    pub fn purge_cancelled(&mut self) {
        self.queue.retain(|e| !e.owner.stopped.get());
    }

    /// Stop `handle` and forget its tasks right away.
    pub fn cancel(&mut self, handle: &PlaybackHandle) {
        handle.stop();
        self.purge_cancelled();
    }

    /// Move the clock to `time`, running every task due by then. Returns
    /// the number of tasks run. The clock never moves backwards.
    pub fn advance_to(&mut self, time: f64, target: &mut T) -> usize {
        self.purge_cancelled();
        let mut ran = 0;
        while self.queue.front().is_some_and(|e| e.fire_at <= time) {
            let Some(entry) = self.queue.pop_front() else {
                break;
            };
            if entry.owner.stopped.get() {
                trace!(fire_at = entry.fire_at, "dropping cancelled task");
                continue;
            }
            self.now = self.now.max(entry.fire_at);
            (entry.task)(self, target);
            ran += 1;
        }
        self.now = self.now.max(time);
        ran
    }
}

impl<T: NotePlayer + 'static> Scheduler<T> {
    /// Arm one task per playable note of `song`, plus the finish task at
    /// `duration + 0.5 s`. Notes whose pitch is not in the table are skipped.
    pub fn play_song(
        &mut self,
        song: &Song,
        on_note_play: Option<NoteCallback>,
        on_finish: Option<FinishCallback>,
    ) -> PlaybackHandle {
        let handle = PlaybackHandle::new();
        let owner = handle.token();
        let start = self.now;
        let on_note_play = on_note_play.map(|cb| Rc::new(RefCell::new(cb)));

        let mut armed = 0;
        for note in &song.notes {
            let Some(frequency) = pitch::frequency(&note.note) else {
                debug!(song = %song.id, note = %note.note, "skipping unknown pitch");
                continue;
            };
            let config = NoteConfig {
                frequency,
                wave: note.wave.unwrap_or_default(),
                volume: note.volume.unwrap_or(SONG_NOTE_VOLUME),
                duration: note.duration,
                attack: note.attack.unwrap_or(SONG_NOTE_ATTACK),
                release: note.release.unwrap_or(SONG_NOTE_RELEASE),
                pan: note.pan.unwrap_or(0.0),
                ..NoteConfig::default()
            };
            let name = note.note.clone();
            let callback = on_note_play.clone();
            self.schedule(
                start + note.delay.max(0.0),
                &owner,
                Box::new(move |_, player: &mut T| {
                    player.play_note(config);
                    if let Some(cb) = callback {
                        let mut cb = cb.borrow_mut();
                        (*cb)(&name);
                    }
                }),
            );
            armed += 1;
        }

        let state = Rc::clone(&owner);
        let song_id = song.id.clone();
        self.schedule(
            start + song.duration_seconds() + FINISH_MARGIN,
            &owner,
            Box::new(move |_, _| {
                state.finished.set(true);
                info!(song = %song_id, "song finished");
                if let Some(cb) = on_finish {
                    cb();
                }
            }),
        );

        info!(song = %song.id, notes = armed, start, "song started");
        handle
    }

    /// Cycle through `notes` every `config.interval` seconds until the
    /// handle is stopped. The first note plays immediately.
    pub fn play_arpeggio(&mut self, notes: &[&str], config: ArpeggioConfig) -> PlaybackHandle {
        let handle = PlaybackHandle::new();
        if notes.is_empty() {
            debug!("empty arpeggio, nothing to play");
            return handle;
        }
        let arpeggio = Rc::new(Arpeggio {
            notes: notes.iter().map(|n| n.to_string()).collect(),
            config,
        });
        let owner = handle.token();
        let task_owner = Rc::clone(&owner);
        let now = self.now;
        self.schedule(
            now,
            &owner,
            Box::new(move |scheduler, player| arpeggio_step(scheduler, player, arpeggio, task_owner, 0)),
        );
        handle
    }
}

/// Settings for [`Scheduler::play_arpeggio`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArpeggioConfig {
    pub wave: Waveform,
    /// Seconds between notes.
    pub interval: f64,
    pub volume: f64,
}

impl Default for ArpeggioConfig {
    fn default() -> Self {
        ArpeggioConfig {
            wave: Waveform::Triangle,
            interval: 0.15,
            volume: 0.4,
        }
    }
}

struct Arpeggio {
    notes: Vec<String>,
    config: ArpeggioConfig,
}

fn arpeggio_step<T: NotePlayer + 'static>(
    scheduler: &mut Scheduler<T>,
    player: &mut T,
    arpeggio: Rc<Arpeggio>,
    owner: Rc<PlaybackState>,
    step: usize,
) {
    let name = &arpeggio.notes[step % arpeggio.notes.len()];
    let config = arpeggio.config;
    // Unknown names still take their slot in the rhythm.
    if let Some(frequency) = pitch::frequency(name) {
        player.play_note(NoteConfig {
            frequency,
            wave: config.wave,
            volume: config.volume,
            duration: config.interval + 0.05,
            attack: 0.01,
            release: 0.1,
            pan: ARPEGGIO_PANS[step % ARPEGGIO_PANS.len()],
            ..NoteConfig::default()
        });
    }
    let next = scheduler.now() + config.interval.max(1e-3);
    let token = Rc::clone(&owner);
    scheduler.schedule(
        next,
        &token,
        Box::new(move |scheduler, player| arpeggio_step(scheduler, player, arpeggio, owner, step + 1)),
    );
}
