//! X11 backend built on the XRecord extension.
//!
//! XRecord needs two connections: a control display used to create, and
//! later disable, the record context, and a data display that
//! `XRecordEnableContext` blocks on while it streams intercepted device
//! events into [`record_callback`].  The hook thread sits inside that call
//! for the life of the session; `uninstall_hook` disables the context from
//! the control display, which makes the call return.
//!
//! Key symbols are read from a keyboard mapping snapshot taken at install,
//! so the callback never issues Xlib requests of its own.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Xlib/XRecord FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "linux")]

use std::os::raw::{c_char, c_int};
use std::ptr;
use std::sync::{Mutex, Once, PoisonError};

use iohook_core::click::{ClickTracker, Release};
use iohook_core::keymap::linux_x11::keysym_to_char;
use iohook_core::{NativeButton, NativeEvent, NativeKey, NativeKind, NativeWheel, Platform, WheelAxis};
use x11::xlib;
use x11::xrecord;

use super::BackendClaim;
use crate::application::backend::{EventSink, HookError, PlatformBackend};
use crate::config::HookConfig;

const SHIFT_MASK: u16 = 1 << 0;
const LOCK_MASK: u16 = 1 << 1;
const CONTROL_MASK: u16 = 1 << 2;

/// Wire size of one core protocol event.
const X_EVENT_LEN: usize = 32;

static INIT_THREADS: Once = Once::new();

pub struct X11Backend {
    fallback_click_ms: u64,
    wheel_lines: u16,
    active: Mutex<Option<ActiveRecord>>,
    _claim: BackendClaim,
}

/// Control connection and the context it created, kept so another thread
/// can disable recording.
struct ActiveRecord {
    control: *mut xlib::Display,
    context: xrecord::XRecordContext,
}

// SAFETY: Xlib is initialised with XInitThreads before any display is
// opened, which makes a Display usable from several threads.
unsafe impl Send for ActiveRecord {}

impl X11Backend {
    /// # Errors
    ///
    /// [`HookError::BackendInUse`] if another native backend exists.
    pub fn new(config: &HookConfig) -> Result<Self, HookError> {
        Ok(Self {
            fallback_click_ms: config.multi_click_interval_ms,
            wheel_lines: config.wheel_lines,
            active: Mutex::new(None),
            _claim: BackendClaim::acquire()?,
        })
    }
}

impl PlatformBackend for X11Backend {
    fn name(&self) -> &'static str {
        "x11"
    }

    fn install_hook(&self, sink: EventSink) -> Result<(), HookError> {
        // SAFETY: XInitThreads must precede every other Xlib call; Once
        // guarantees it runs exactly once per process.
        INIT_THREADS.call_once(|| unsafe {
            xlib::XInitThreads();
        });

        let control = Connection::open()?;
        let keymap = KeyboardMap::load(control.0);
        let context = create_context(control.0)?;
        let data = match Connection::open() {
            Ok(data) => data,
            Err(err) => {
                // SAFETY: the context belongs to `control`, which is still open.
                unsafe { xrecord::XRecordFreeContext(control.0, context) };
                return Err(err);
            }
        };

        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(ActiveRecord {
            control: control.0,
            context,
        });

        let mut state = RecordState {
            sink: sink.clone(),
            clicks: ClickTracker::new(self.fallback_click_ms),
            keymap,
            wheel_lines: self.wheel_lines,
            last_time: 0,
        };

        // SAFETY: `state` outlives the call, which only returns once the
        // context is disabled; the callback is the only user of the pointer.
        let enabled = unsafe {
            xrecord::XRecordEnableContext(
                data.0,
                context,
                Some(record_callback),
                &mut state as *mut RecordState as *mut c_char,
            )
        };

        let active = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if active.is_some() {
            // SAFETY: disabling is finished; nobody else can reach the context.
            unsafe { xrecord::XRecordFreeContext(control.0, context) };
        }
        drop(data);
        drop(control);

        if enabled == 0 {
            return Err(HookError::RecordEnableContext);
        }
        sink.dispatch(NativeEvent::new(
            Platform::X11,
            state.last_time,
            0,
            NativeKind::HookDisabled,
        ));
        Ok(())
    }

    fn uninstall_hook(&self) -> Result<(), HookError> {
        let guard = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(active) = guard.as_ref() else {
            return Ok(());
        };
        // SAFETY: the control display stays open while `active` is set, and
        // the lock keeps install_hook from closing it underneath us.
        let disabled = unsafe {
            let status = xrecord::XRecordDisableContext(active.control, active.context);
            xlib::XSync(active.control, xlib::False);
            status
        };
        if disabled == 0 {
            return Err(HookError::Failure("XRecordDisableContext failed".to_string()));
        }
        Ok(())
    }
}

// ── Connections ──────────────────────────────────────────────────────────────

/// An open display; closed on drop.
struct Connection(*mut xlib::Display);

impl Connection {
    fn open() -> Result<Self, HookError> {
        // SAFETY: a null name selects $DISPLAY.
        let display = unsafe { xlib::XOpenDisplay(ptr::null()) };
        if display.is_null() {
            let name = std::env::var("DISPLAY").unwrap_or_else(|_| "<unset>".to_string());
            return Err(HookError::OpenDisplay(name));
        }
        Ok(Connection(display))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // SAFETY: the pointer came from XOpenDisplay and is closed once.
        unsafe {
            xlib::XCloseDisplay(self.0);
        }
    }
}

fn create_context(control: *mut xlib::Display) -> Result<xrecord::XRecordContext, HookError> {
    let (mut major, mut minor): (c_int, c_int) = (0, 0);
    // SAFETY: `control` is an open display; out-params are valid.
    if unsafe { xrecord::XRecordQueryVersion(control, &mut major, &mut minor) } == 0 {
        return Err(HookError::RecordNotFound);
    }

    // SAFETY: XRecordAllocRange returns a zeroed range or null.
    let range = unsafe { xrecord::XRecordAllocRange() };
    if range.is_null() {
        return Err(HookError::RecordAllocRange);
    }

    let mut clients: xrecord::XRecordClientSpec = xrecord::XRecordAllClients;
    let mut ranges = range;
    // SAFETY: `range` is non-null and owned here until XFree below.
    let context = unsafe {
        (*range).device_events.first = xlib::KeyPress as u8;
        (*range).device_events.last = xlib::MotionNotify as u8;
        let context = xrecord::XRecordCreateContext(control, 0, &mut clients, 1, &mut ranges, 1);
        xlib::XFree(range.cast());
        // The data connection must see the context.
        xlib::XSync(control, xlib::False);
        context
    };
    if context == 0 {
        return Err(HookError::RecordCreateContext);
    }
    Ok(context)
}

// ── Keyboard mapping ─────────────────────────────────────────────────────────

/// Keysyms at levels 0 and 1 for every keycode the server reports.
struct KeyboardMap {
    min_keycode: u8,
    levels: Vec<[u32; 2]>,
}

impl KeyboardMap {
    /// Character a press produces under `state`. Control chords type
    /// nothing.
    fn typed_char(&self, keycode: u8, state: u16) -> Option<char> {
        if state & CONTROL_MASK != 0 {
            return None;
        }
        let level = usize::from(state & SHIFT_MASK != 0);
        let ch = keysym_to_char(self.keysym(keycode, level))?;
        if state & LOCK_MASK != 0 && ch.is_alphabetic() {
            Some(swap_case(ch))
        } else {
            Some(ch)
        }
    }

    fn load(display: *mut xlib::Display) -> Self {
        let (mut min, mut max): (c_int, c_int) = (0, 0);
        let mut per_keycode: c_int = 0;
        // SAFETY: `display` is open; the returned table holds
        // `count * per_keycode` keysyms and is freed below.
        unsafe {
            xlib::XDisplayKeycodes(display, &mut min, &mut max);
            let count = (max - min + 1).max(0);
            let table = xlib::XGetKeyboardMapping(display, min as u8, count, &mut per_keycode);
            if table.is_null() || per_keycode <= 0 {
                return KeyboardMap {
                    min_keycode: min as u8,
                    levels: Vec::new(),
                };
            }
            let per = per_keycode as usize;
            let levels = (0..count as usize)
                .map(|i| {
                    let base = *table.add(i * per) as u32;
                    let shifted = if per > 1 {
                        *table.add(i * per + 1) as u32
                    } else {
                        base
                    };
                    [base, if shifted == 0 { base } else { shifted }]
                })
                .collect();
            xlib::XFree(table.cast());
            KeyboardMap {
                min_keycode: min as u8,
                levels,
            }
        }
    }

    fn keysym(&self, keycode: u8, level: usize) -> u32 {
        keycode
            .checked_sub(self.min_keycode)
            .and_then(|i| self.levels.get(usize::from(i)))
            .map_or(0, |syms| syms[level.min(1)])
    }
}

// ── Record callback ──────────────────────────────────────────────────────────

struct RecordState {
    sink: EventSink,
    clicks: ClickTracker,
    keymap: KeyboardMap,
    wheel_lines: u16,
    last_time: u64,
}

/// Fields of a core device event as laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WireEvent {
    kind: u8,
    detail: u8,
    time: u32,
    root_x: i16,
    root_y: i16,
    state: u16,
}

impl WireEvent {
    fn parse(bytes: &[u8], swapped: bool) -> Option<Self> {
        if bytes.len() < X_EVENT_LEN {
            return None;
        }
        let u16_at = |at: usize| {
            let raw = [bytes[at], bytes[at + 1]];
            if swapped {
                u16::from_ne_bytes(raw).swap_bytes()
            } else {
                u16::from_ne_bytes(raw)
            }
        };
        let raw_time = [bytes[4], bytes[5], bytes[6], bytes[7]];
        let time = if swapped {
            u32::from_ne_bytes(raw_time).swap_bytes()
        } else {
            u32::from_ne_bytes(raw_time)
        };
        Some(WireEvent {
            kind: bytes[0] & 0x7F,
            detail: bytes[1],
            time,
            root_x: u16_at(20) as i16,
            root_y: u16_at(22) as i16,
            state: u16_at(28),
        })
    }
}

unsafe extern "C" fn record_callback(closure: *mut c_char, data: *mut xrecord::XRecordInterceptData) {
    if data.is_null() {
        return;
    }
    if !closure.is_null() {
        // SAFETY: `closure` is the RecordState passed to XRecordEnableContext,
        // alive and exclusively ours for the duration of that call.
        let state = &mut *(closure as *mut RecordState);
        let intercept = &*data;
        match intercept.category {
            xrecord::XRecordStartOfData => {
                state.last_time = u64::from(intercept.server_time as u32);
                state.sink.dispatch(NativeEvent::new(
                    Platform::X11,
                    state.last_time,
                    0,
                    NativeKind::HookEnabled,
                ));
            }
            xrecord::XRecordFromServer if !intercept.data.is_null() => {
                // data_len counts 4-byte units.
                let len = (intercept.data_len as usize).saturating_mul(4);
                let bytes = std::slice::from_raw_parts(intercept.data, len);
                if let Some(event) = WireEvent::parse(bytes, intercept.client_swapped != 0) {
                    state.handle(event);
                }
            }
            _ => {}
        }
    }
    // SAFETY: every intercept handed to the callback must be freed by it.
    xrecord::XRecordFreeData(data);
}

impl RecordState {
    fn emit(&self, time: u64, state: u16, kind: NativeKind) {
        self.sink
            .dispatch(NativeEvent::new(Platform::X11, time, u64::from(state), kind));
    }

    fn handle(&mut self, event: WireEvent) {
        let time = u64::from(event.time);
        self.last_time = time;
        let (x, y) = (i32::from(event.root_x), i32::from(event.root_y));

        match c_int::from(event.kind) {
            xlib::KeyPress => {
                let key = self.native_key(event.detail);
                self.emit(time, event.state, NativeKind::KeyDown(key));
                if let Some(ch) = self.keymap.typed_char(event.detail, event.state) {
                    self.emit(time, event.state, NativeKind::KeyTyped(key, ch));
                }
            }
            xlib::KeyRelease => {
                let key = self.native_key(event.detail);
                self.emit(time, event.state, NativeKind::KeyUp(key));
            }
            xlib::ButtonPress => match wheel_step(event.detail) {
                Some((axis, delta)) => {
                    let wheel = NativeWheel {
                        axis,
                        delta,
                        amount: self.wheel_lines,
                        page: false,
                        x,
                        y,
                    };
                    self.emit(time, event.state, NativeKind::Wheel(wheel));
                }
                None => {
                    let clicks = self.clicks.press(event.detail, time);
                    let button = NativeButton {
                        button: event.detail,
                        clicks,
                        x,
                        y,
                    };
                    self.emit(time, event.state, NativeKind::ButtonDown(button));
                }
            },
            xlib::ButtonRelease if wheel_step(event.detail).is_none() => {
                let Release { clicks, clicked } = self.clicks.release(event.detail);
                let button = NativeButton {
                    button: event.detail,
                    clicks,
                    x,
                    y,
                };
                self.emit(time, event.state, NativeKind::ButtonUp(button));
                if clicked {
                    self.emit(time, event.state, NativeKind::ButtonClick(button));
                }
            }
            xlib::MotionNotify => {
                self.clicks.motion();
                self.emit(time, event.state, NativeKind::Motion { x, y });
            }
            _ => {}
        }
    }

    fn native_key(&self, keycode: u8) -> NativeKey {
        NativeKey {
            code: self.keymap.keysym(keycode, 0),
            scan_code: u32::from(keycode),
            extended: false,
        }
    }

}

/// Buttons 4..=7 are wheel notches: +1 for 4 (up) and 7 (right), -1 for 5
/// (down) and 6 (left).
fn wheel_step(button: u8) -> Option<(WheelAxis, i32)> {
    match button {
        4 => Some((WheelAxis::Vertical, 1)),
        5 => Some((WheelAxis::Vertical, -1)),
        6 => Some((WheelAxis::Horizontal, -1)),
        7 => Some((WheelAxis::Horizontal, 1)),
        _ => None,
    }
}

fn swap_case(ch: char) -> char {
    if ch.is_uppercase() {
        ch.to_lowercase().next().unwrap_or(ch)
    } else {
        ch.to_uppercase().next().unwrap_or(ch)
    }
}
