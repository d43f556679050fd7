//! Wheel, touch-drag and mouse-drag input reduced to one signed distance.
//!
//! Positive distance means content moved up, which steps to the next video.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Touch,
    Mouse,
}

/// Raw pointer input in pixel units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureInput {
    /// One wheel notch. Positive `delta_y` scrolls down.
    Wheel { delta_y: f32 },
    PressStart { kind: PointerKind, y: f32, pointers: u8 },
    PressMove { kind: PointerKind, y: f32, pointers: u8 },
    PressEnd { kind: PointerKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// Maps a signed distance to a step. Anything under `threshold` in
/// magnitude is ignored.
pub fn classify(distance: f32, threshold: f32) -> Option<Direction> {
    if !distance.is_finite() || distance.abs() < threshold {
        return None;
    }
    if distance > 0.0 {
        Some(Direction::Next)
    } else {
        Some(Direction::Prev)
    }
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    kind: PointerKind,
    start_y: f32,
    current_y: f32,
}

/// Turns a stream of [`GestureInput`]s into at most one [`Direction`] per
/// discrete gesture.
#[derive(Debug, Clone)]
pub struct GestureTracker {
    threshold: f32,
    drag: Option<Drag>,
}

impl GestureTracker {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            drag: None,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Feeds one input. While `modal_open` every input is swallowed and any
    /// drag in progress is forgotten.
    pub fn handle(
        &mut self,
        input: GestureInput,
        modal_open: bool,
        has_items: bool,
    ) -> Option<Direction> {
        if modal_open {
            self.drag = None;
            return None;
        }

        match input {
            GestureInput::Wheel { delta_y } => {
                if !has_items {
                    return None;
                }
                classify(delta_y, self.threshold)
            }
            GestureInput::PressStart { kind, y, pointers } => {
                if !has_items || pointers > 1 {
                    return None;
                }
                self.drag = Some(Drag {
                    kind,
                    start_y: y,
                    current_y: y,
                });
                None
            }
            GestureInput::PressMove { kind, y, pointers } => {
                if pointers > 1 {
                    return None;
                }
                if let Some(drag) = self.drag.as_mut().filter(|d| d.kind == kind) {
                    drag.current_y = y;
                }
                None
            }
            GestureInput::PressEnd { kind } => {
                let drag = match self.drag {
                    Some(d) if d.kind == kind => d,
                    _ => return None,
                };
                self.drag = None;
                classify(drag.start_y - drag.current_y, self.threshold)
            }
        }
    }
}
