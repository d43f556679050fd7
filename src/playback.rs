//! The single active media element and its observable playback state.
//!
//! [`PlaybackContext`] is owned by the app and passed to whoever needs it.
//! Consumers that only render read a [`watch`] receiver from
//! [`PlaybackContext::subscribe`].

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a media element. Events carry it so the context can tell
/// current elements from superseded ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(u64);

impl ElementId {
    pub fn next() -> Self {
        Self(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Something that can play media and reports changes as [`MediaEvent`]s.
pub trait MediaElement: Send + Sync {
    fn id(&self) -> ElementId;
    fn play(&self);
    fn pause(&self);
    fn is_paused(&self) -> bool;
    /// Seconds.
    fn current_time(&self) -> f64;
    /// Seconds; zero until metadata is known.
    fn duration(&self) -> f64;
    fn set_current_time(&self, secs: f64);
    fn set_muted(&self, muted: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEventKind {
    TimeUpdate,
    LoadedMetadata,
    Play,
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaEvent {
    pub element: ElementId,
    pub kind: MediaEventKind,
}

/// Derived playback state published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSnapshot {
    pub element: Option<ElementId>,
    pub current_time: f64,
    pub duration: f64,
    pub is_playing: bool,
    pub muted: bool,
}

impl PlaybackSnapshot {
    fn idle(muted: bool) -> Self {
        Self {
            element: None,
            current_time: 0.0,
            duration: 0.0,
            is_playing: false,
            muted,
        }
    }

    /// Fraction played in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

pub struct PlaybackContext {
    current: Option<Arc<dyn MediaElement>>,
    state: PlaybackSnapshot,
    tx: watch::Sender<PlaybackSnapshot>,
}

impl PlaybackContext {
    pub fn new(start_muted: bool) -> Self {
        let state = PlaybackSnapshot::idle(start_muted);
        let (tx, _rx) = watch::channel(state);
        Self {
            current: None,
            state,
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state
    }

    pub fn muted(&self) -> bool {
        self.state.muted
    }

    pub fn current_id(&self) -> Option<ElementId> {
        self.current.as_ref().map(|el| el.id())
    }

    fn publish(&mut self) {
        self.tx.send_replace(self.state);
    }

    /// Makes `element` the one and only current element, replacing whatever
    /// was there. `None` clears it.
    pub fn register_video(&mut self, element: Option<Arc<dyn MediaElement>>) {
        match &element {
            Some(el) => {
                el.set_muted(self.state.muted);
                self.state.element = Some(el.id());
                self.state.duration = el.duration();
                self.state.current_time = el.current_time();
                self.state.is_playing = !el.is_paused();
                tracing::debug!(element = ?el.id(), "Media element registered");
            }
            None => {
                self.state = PlaybackSnapshot::idle(self.state.muted);
            }
        }
        self.current = element;
        self.publish();
    }

    /// Applies an event from the element's event stream. Events from an
    /// element that is no longer current are ignored; returns whether the
    /// event was applied.
    pub fn handle_event(&mut self, event: MediaEvent) -> bool {
        let Some(el) = self.current.as_ref().filter(|el| el.id() == event.element) else {
            tracing::trace!(element = ?event.element, kind = ?event.kind, "Ignoring stale media event");
            return false;
        };

        match event.kind {
            MediaEventKind::TimeUpdate => {
                self.state.current_time = el.current_time();
            }
            MediaEventKind::LoadedMetadata => {
                self.state.duration = el.duration();
                self.state.current_time = el.current_time();
            }
            MediaEventKind::Play => self.state.is_playing = true,
            MediaEventKind::Pause => self.state.is_playing = false,
        }
        self.publish();
        true
    }

    pub fn toggle_play(&self) {
        let Some(el) = &self.current else {
            return;
        };
        if el.is_paused() {
            el.play();
        } else {
            el.pause();
        }
    }

    /// Jumps to `secs`, clamped to the known duration.
    pub fn seek(&mut self, secs: f64) {
        let Some(el) = &self.current else {
            return;
        };
        let mut target = secs.max(0.0);
        if self.state.duration > 0.0 {
            target = target.min(self.state.duration);
        }
        el.set_current_time(target);
        self.state.current_time = target;
        self.publish();
    }

    pub fn seek_by(&mut self, delta_secs: f64) {
        self.seek(self.state.current_time + delta_secs);
    }

    /// Flips the global mute default and applies it to the current element.
    pub fn toggle_mute(&mut self) {
        self.state.muted = !self.state.muted;
        if let Some(el) = &self.current {
            el.set_muted(self.state.muted);
        }
        self.publish();
    }
}

// ============================================================================
// Terminal clip
// ============================================================================

#[derive(Debug)]
struct ClipState {
    time: f64,
    paused: bool,
    muted: bool,
}

/// A clock-driven stand-in for a video element.
///
/// The terminal cannot decode video, so each feed item gets a clip of fixed
/// nominal length that advances on [`tick`](Self::tick), loops at the end,
/// and reports through the same event stream a real player would.
pub struct VirtualClip {
    id: ElementId,
    duration: f64,
    state: Mutex<ClipState>,
    events: mpsc::UnboundedSender<MediaEvent>,
}

impl VirtualClip {
    pub fn new(duration_secs: f64, events: mpsc::UnboundedSender<MediaEvent>) -> Arc<Self> {
        let clip = Arc::new(Self {
            id: ElementId::next(),
            duration: duration_secs.max(0.0),
            state: Mutex::new(ClipState {
                time: 0.0,
                paused: true,
                muted: true,
            }),
            events,
        });
        clip.emit(MediaEventKind::LoadedMetadata);
        clip
    }

    fn emit(&self, kind: MediaEventKind) {
        // Receiver gone means the app is shutting down.
        let _ = self.events.send(MediaEvent {
            element: self.id,
            kind,
        });
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    /// Advances playback by `dt_secs` if playing.
    pub fn tick(&self, dt_secs: f64) {
        {
            let mut state = self.state.lock();
            if state.paused || self.duration <= 0.0 {
                return;
            }
            state.time = (state.time + dt_secs) % self.duration;
        }
        self.emit(MediaEventKind::TimeUpdate);
    }
}

impl MediaElement for VirtualClip {
    fn id(&self) -> ElementId {
        self.id
    }

    fn play(&self) {
        let changed = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.paused, false)
        };
        if changed {
            self.emit(MediaEventKind::Play);
        }
    }

    fn pause(&self) {
        let changed = {
            let mut state = self.state.lock();
            !std::mem::replace(&mut state.paused, true)
        };
        if changed {
            self.emit(MediaEventKind::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn current_time(&self) -> f64 {
        self.state.lock().time
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn set_current_time(&self, secs: f64) {
        self.state.lock().time = secs.clamp(0.0, self.duration);
        self.emit(MediaEventKind::TimeUpdate);
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(secs: f64) -> (Arc<VirtualClip>, mpsc::UnboundedReceiver<MediaEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (VirtualClip::new(secs, tx), rx)
    }

    fn drain(ctx: &mut PlaybackContext, rx: &mut mpsc::UnboundedReceiver<MediaEvent>) {
        while let Ok(event) = rx.try_recv() {
            ctx.handle_event(event);
        }
    }

    #[test]
    fn test_register_applies_global_mute() {
        let mut ctx = PlaybackContext::new(true);
        let (a, _rx) = clip(30.0);
        a.set_muted(false);
        ctx.register_video(Some(a.clone()));
        assert!(a.is_muted());
        assert_eq!(ctx.snapshot().duration, 30.0);
    }

    #[test]
    fn test_stale_events_ignored() {
        let mut ctx = PlaybackContext::new(true);
        let (a, mut rx_a) = clip(30.0);
        let (b, _rx_b) = clip(20.0);
        ctx.register_video(Some(a.clone()));
        ctx.register_video(Some(b.clone()));

        a.play();
        let event = rx_a.try_recv().unwrap();
        assert_eq!(event.kind, MediaEventKind::LoadedMetadata);
        assert!(!ctx.handle_event(event));
        let play = rx_a.try_recv().unwrap();
        assert!(!ctx.handle_event(play));
        assert!(!ctx.snapshot().is_playing);
        assert_eq!(ctx.snapshot().duration, 20.0);
    }

    #[test]
    fn test_toggle_play_round_trip() {
        let mut ctx = PlaybackContext::new(true);
        let (a, mut rx) = clip(30.0);
        ctx.register_video(Some(a.clone()));
        ctx.toggle_play();
        drain(&mut ctx, &mut rx);
        assert!(ctx.snapshot().is_playing);
        ctx.toggle_play();
        drain(&mut ctx, &mut rx);
        assert!(!ctx.snapshot().is_playing);
    }

    #[test]
    fn test_controls_without_element_are_noops() {
        let mut ctx = PlaybackContext::new(false);
        ctx.toggle_play();
        ctx.seek(10.0);
        assert_eq!(ctx.snapshot(), PlaybackSnapshot::idle(false));
        ctx.toggle_mute();
        assert!(ctx.muted());
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let mut ctx = PlaybackContext::new(true);
        let (a, _rx) = clip(30.0);
        ctx.register_video(Some(a.clone()));
        ctx.seek(45.0);
        assert_eq!(a.current_time(), 30.0);
        ctx.seek_by(-100.0);
        assert_eq!(ctx.snapshot().current_time, 0.0);
    }

    #[test]
    fn test_toggle_mute_reaches_current_element() {
        let mut ctx = PlaybackContext::new(true);
        let (a, _rx) = clip(30.0);
        ctx.register_video(Some(a.clone()));
        ctx.toggle_mute();
        assert!(!a.is_muted());
        let (b, _rx_b) = clip(30.0);
        b.set_muted(true);
        ctx.register_video(Some(b.clone()));
        assert!(!b.is_muted());
    }

    #[test]
    fn test_clip_tick_loops() {
        let mut ctx = PlaybackContext::new(true);
        let (a, mut rx) = clip(10.0);
        ctx.register_video(Some(a.clone()));
        a.play();
        a.tick(12.5);
        drain(&mut ctx, &mut rx);
        assert!((ctx.snapshot().current_time - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_subscribers_see_updates() {
        let mut ctx = PlaybackContext::new(true);
        let rx = ctx.subscribe();
        ctx.toggle_mute();
        assert!(!rx.borrow().muted);
    }

    #[test]
    fn test_unregister_resets_state() {
        let mut ctx = PlaybackContext::new(true);
        let (a, _rx) = clip(30.0);
        ctx.register_video(Some(a));
        ctx.register_video(None);
        assert_eq!(ctx.current_id(), None);
        assert_eq!(ctx.snapshot().duration, 0.0);
    }
}
