//! macOS backend: a listen-only Quartz event tap.
//!
//! `install_hook` checks accessibility trust, creates the tap, attaches it
//! to the hook thread's `CFRunLoop` and runs that loop until
//! `uninstall_hook` stops it.  `HookEnabled` is reported from a run loop
//! entry observer, so by the time `start()` returns the loop is running and
//! a stop request cannot be lost.
//!
//! Several CoreGraphics / CoreFoundation calls are not exposed by the
//! `core-graphics` crate and are declared here directly.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Quartz and CoreFoundation
//! FFI calls. All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "macos")]

use std::ffi::c_void;
use std::ptr;
use std::sync::{Mutex, PoisonError};

use core_foundation::base::TCFType;
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop, CFRunLoopSource};
use core_graphics::event::{CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType};
use iohook_core::click::{ClickTracker, Release};
use iohook_core::normalize::modifiers::QUARTZ_BUTTON_SHIFT;
use iohook_core::{NativeButton, NativeEvent, NativeKey, NativeKind, NativeWheel, Platform, WheelAxis};

use super::BackendClaim;
use crate::application::backend::{EventSink, HookError, PlatformBackend};
use crate::config::HookConfig;

// FFI declarations for functions not exposed by the core-graphics crate.
type CFMachPortRef = *mut c_void;
type CFRunLoopSourceRef = *mut c_void;
type CFRunLoopObserverRef = *mut c_void;
type CFAllocatorRef = *const c_void;
type CFIndex = isize;
type CGEventRef = *mut c_void;
type CGEventFlags = u64;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct CGPoint {
    x: f64,
    y: f64,
}

#[repr(C)]
struct CFRunLoopObserverContext {
    version: CFIndex,
    info: *mut c_void,
    retain: *const c_void,
    release: *const c_void,
    copy_description: *const c_void,
}

type CGEventTapCallback =
    extern "C" fn(proxy: *mut c_void, event_type: u32, event: CGEventRef, user_info: *mut c_void) -> CGEventRef;
type CFRunLoopObserverCallback = extern "C" fn(observer: CFRunLoopObserverRef, activity: u64, info: *mut c_void);

// Event field constants
const MOUSE_EVENT_CLICK_STATE: u32 = 1;
const MOUSE_EVENT_BUTTON_NUMBER: u32 = 3;
const KEYBOARD_EVENT_KEYCODE: u32 = 9;
const SCROLL_WHEEL_EVENT_DELTA_AXIS_1: u32 = 11;
const SCROLL_WHEEL_EVENT_DELTA_AXIS_2: u32 = 12;

const RUN_LOOP_ENTRY: u64 = 1;

/// Lines per notch; macOS does not expose the user setting through Quartz.
const DEFAULT_WHEEL_LINES: u16 = 1;

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: CGEventTapCallback,
        user_info: *mut c_void,
    ) -> CFMachPortRef;
    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
    fn CGEventGetLocation(event: CGEventRef) -> CGPoint;
    fn CGEventGetIntegerValueField(event: CGEventRef, field: u32) -> i64;
    fn CGEventGetFlags(event: CGEventRef) -> CGEventFlags;
    fn CGEventGetTimestamp(event: CGEventRef) -> u64;
    fn CGEventKeyboardGetUnicodeString(
        event: CGEventRef,
        max_len: usize,
        actual_len: *mut usize,
        buffer: *mut u16,
    );
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFMachPortCreateRunLoopSource(
        allocator: CFAllocatorRef,
        port: CFMachPortRef,
        order: CFIndex,
    ) -> CFRunLoopSourceRef;
    fn CFMachPortInvalidate(port: CFMachPortRef);
    fn CFRunLoopObserverCreate(
        allocator: CFAllocatorRef,
        activities: u64,
        repeats: bool,
        order: CFIndex,
        callout: CFRunLoopObserverCallback,
        context: *mut CFRunLoopObserverContext,
    ) -> CFRunLoopObserverRef;
    fn CFRunLoopAddObserver(run_loop: *mut c_void, observer: CFRunLoopObserverRef, mode: *const c_void);
    fn CFRunLoopRemoveObserver(run_loop: *mut c_void, observer: CFRunLoopObserverRef, mode: *const c_void);
    fn CFRelease(object: *const c_void);
}

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;
}

pub struct MacosBackend {
    fallback_click_ms: u64,
    run_loop: Mutex<Option<LoopHandle>>,
    _claim: BackendClaim,
}

/// The hook thread's run loop, kept so another thread can stop it.
struct LoopHandle(CFRunLoop);

// SAFETY: CFRunLoopStop is documented as callable from any thread, and that
// is the only thing done with the handle off the hook thread.
unsafe impl Send for LoopHandle {}

impl MacosBackend {
    /// # Errors
    ///
    /// [`HookError::BackendInUse`] if another native backend exists.
    pub fn new(config: &HookConfig) -> Result<Self, HookError> {
        Ok(Self {
            fallback_click_ms: config.multi_click_interval_ms,
            run_loop: Mutex::new(None),
            _claim: BackendClaim::acquire()?,
        })
    }
}

impl PlatformBackend for MacosBackend {
    fn name(&self) -> &'static str {
        "quartz"
    }

    fn install_hook(&self, sink: EventSink) -> Result<(), HookError> {
        // SAFETY: AXIsProcessTrusted has no preconditions.
        if !unsafe { AXIsProcessTrusted() } {
            return Err(HookError::AccessibilityDisabled);
        }

        let mut state = Box::new(TapState {
            sink: sink.clone(),
            clicks: ClickTracker::new(self.fallback_click_ms),
            buttons: 0,
            tap: ptr::null_mut(),
        });
        let state_ptr = &mut *state as *mut TapState as *mut c_void;

        // SAFETY: `state` is boxed and outlives the tap, which is
        // invalidated below before the box is dropped.
        let tap = unsafe {
            CGEventTapCreate(
                CGEventTapLocation::Session as u32,
                CGEventTapPlacement::HeadInsertEventTap as u32,
                CGEventTapOptions::ListenOnly as u32,
                event_mask(),
                tap_callback,
                state_ptr,
            )
        };
        if tap.is_null() {
            return Err(HookError::CreateEventPort);
        }
        state.tap = tap;

        // SAFETY: `tap` is a valid mach port created above.
        let raw_source = unsafe { CFMachPortCreateRunLoopSource(ptr::null(), tap, 0) };
        if raw_source.is_null() {
            // SAFETY: the tap is ours and not attached to any run loop.
            unsafe { release_tap(tap) };
            return Err(HookError::CreateRunLoopSource);
        }
        // SAFETY: the source was returned by a Create function.
        let source = unsafe { CFRunLoopSource::wrap_under_create_rule(raw_source as *mut _) };

        let run_loop = CFRunLoop::get_current();
        let raw_loop = run_loop.as_concrete_TypeRef() as *mut c_void;
        if raw_loop.is_null() {
            // SAFETY: as above.
            unsafe { release_tap(tap) };
            return Err(HookError::GetRunLoop);
        }

        let mut observer_context = CFRunLoopObserverContext {
            version: 0,
            info: state_ptr,
            retain: ptr::null(),
            release: ptr::null(),
            copy_description: ptr::null(),
        };
        // SAFETY: the context is copied by CFRunLoopObserverCreate; `info`
        // stays valid for the observer's life.
        let observer = unsafe {
            CFRunLoopObserverCreate(ptr::null(), RUN_LOOP_ENTRY, false, 0, on_run_loop_entry, &mut observer_context)
        };
        if observer.is_null() {
            // SAFETY: as above.
            unsafe { release_tap(tap) };
            return Err(HookError::CreateObserver);
        }

        // SAFETY: run loop, source, tap and observer are all valid here.
        unsafe {
            run_loop.add_source(&source, kCFRunLoopCommonModes);
            CFRunLoopAddObserver(raw_loop, observer, kCFRunLoopCommonModes as *const c_void);
            CGEventTapEnable(tap, true);
        }
        *self.run_loop.lock().unwrap_or_else(PoisonError::into_inner) = Some(LoopHandle(run_loop.clone()));

        CFRunLoop::run_current();

        self.run_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // SAFETY: the loop has returned; nothing else uses these objects.
        unsafe {
            CGEventTapEnable(tap, false);
            CFRunLoopRemoveObserver(raw_loop, observer, kCFRunLoopCommonModes as *const c_void);
            CFRelease(observer as *const c_void);
            run_loop.remove_source(&source, kCFRunLoopCommonModes);
            release_tap(tap);
        }

        let held = state.buttons;
        drop(state);
        sink.dispatch(NativeEvent::new(Platform::Quartz, 0, held, NativeKind::HookDisabled));
        Ok(())
    }

    fn uninstall_hook(&self) -> Result<(), HookError> {
        if let Some(handle) = self
            .run_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            handle.0.stop();
        }
        Ok(())
    }
}

/// # Safety
///
/// `tap` must be a valid mach port owned by the caller.
unsafe fn release_tap(tap: CFMachPortRef) {
    CFMachPortInvalidate(tap);
    CFRelease(tap as *const c_void);
}

fn event_mask() -> u64 {
    [
        CGEventType::LeftMouseDown,
        CGEventType::LeftMouseUp,
        CGEventType::RightMouseDown,
        CGEventType::RightMouseUp,
        CGEventType::OtherMouseDown,
        CGEventType::OtherMouseUp,
        CGEventType::MouseMoved,
        CGEventType::LeftMouseDragged,
        CGEventType::RightMouseDragged,
        CGEventType::OtherMouseDragged,
        CGEventType::KeyDown,
        CGEventType::KeyUp,
        CGEventType::FlagsChanged,
        CGEventType::ScrollWheel,
    ]
    .into_iter()
    .fold(0, |mask, t| mask | (1u64 << t as u64))
}

// ── Callbacks ────────────────────────────────────────────────────────────────

struct TapState {
    sink: EventSink,
    clicks: ClickTracker,
    /// Held buttons, already shifted into the Quartz modifier word layout.
    buttons: u64,
    tap: CFMachPortRef,
}

extern "C" fn on_run_loop_entry(_observer: CFRunLoopObserverRef, _activity: u64, info: *mut c_void) {
    if info.is_null() {
        return;
    }
    // SAFETY: `info` is the TapState handed to the observer; run loop
    // callbacks never overlap.
    let state = unsafe { &*(info as *const TapState) };
    state
        .sink
        .dispatch(NativeEvent::new(Platform::Quartz, 0, 0, NativeKind::HookEnabled));
}

extern "C" fn tap_callback(_proxy: *mut c_void, event_type: u32, event: CGEventRef, user_info: *mut c_void) -> CGEventRef {
    if user_info.is_null() || event.is_null() {
        return event;
    }
    // SAFETY: `user_info` is the TapState handed to CGEventTapCreate; run
    // loop callbacks never overlap.
    let state = unsafe { &mut *(user_info as *mut TapState) };

    if event_type == CGEventType::TapDisabledByTimeout as u32 {
        state.sink.logger().warn("event tap timed out; re-enabling");
        // SAFETY: the tap is alive while its callback runs.
        unsafe { CGEventTapEnable(state.tap, true) };
        return event;
    }

    // SAFETY: `event` is valid for the duration of the callback.
    unsafe { state.handle(event_type, event) };
    // Listen-only: hand the event on unchanged.
    event
}

impl TapState {
    fn emit(&self, time: u64, flags: u64, kind: NativeKind) {
        self.sink
            .dispatch(NativeEvent::new(Platform::Quartz, time, flags | self.buttons, kind));
    }

    /// # Safety
    ///
    /// `event` must be a valid CGEvent.
    unsafe fn handle(&mut self, event_type: u32, event: CGEventRef) {
        let time = CGEventGetTimestamp(event);
        let flags = CGEventGetFlags(event) & 0xFFFF_FFFF;
        let location = CGEventGetLocation(event);
        let (x, y) = (location.x.round() as i32, location.y.round() as i32);
        let button_number = || CGEventGetIntegerValueField(event, MOUSE_EVENT_BUTTON_NUMBER).clamp(0, 31) as u8;
        let click_state = || CGEventGetIntegerValueField(event, MOUSE_EVENT_CLICK_STATE);
        let keycode = || KeyCodeOf(CGEventGetIntegerValueField(event, KEYBOARD_EVENT_KEYCODE) as u32);

        const LEFT_DOWN: u32 = CGEventType::LeftMouseDown as u32;
        const LEFT_UP: u32 = CGEventType::LeftMouseUp as u32;
        const RIGHT_DOWN: u32 = CGEventType::RightMouseDown as u32;
        const RIGHT_UP: u32 = CGEventType::RightMouseUp as u32;
        const OTHER_DOWN: u32 = CGEventType::OtherMouseDown as u32;
        const OTHER_UP: u32 = CGEventType::OtherMouseUp as u32;
        const MOVED: u32 = CGEventType::MouseMoved as u32;
        const LEFT_DRAGGED: u32 = CGEventType::LeftMouseDragged as u32;
        const RIGHT_DRAGGED: u32 = CGEventType::RightMouseDragged as u32;
        const OTHER_DRAGGED: u32 = CGEventType::OtherMouseDragged as u32;
        const KEY_DOWN: u32 = CGEventType::KeyDown as u32;
        const KEY_UP: u32 = CGEventType::KeyUp as u32;
        const FLAGS_CHANGED: u32 = CGEventType::FlagsChanged as u32;
        const SCROLL: u32 = CGEventType::ScrollWheel as u32;

        match event_type {
            LEFT_DOWN => self.press(0, click_state(), time, flags, x, y),
            RIGHT_DOWN => self.press(1, click_state(), time, flags, x, y),
            OTHER_DOWN => self.press(button_number(), click_state(), time, flags, x, y),
            LEFT_UP => self.release(0, click_state(), time, flags, x, y),
            RIGHT_UP => self.release(1, click_state(), time, flags, x, y),
            OTHER_UP => self.release(button_number(), click_state(), time, flags, x, y),
            MOVED | LEFT_DRAGGED | RIGHT_DRAGGED | OTHER_DRAGGED => {
                self.clicks.motion();
                self.emit(time, flags, NativeKind::Motion { x, y });
            }
            KEY_DOWN => {
                let key = keycode().native();
                self.emit(time, flags, NativeKind::KeyDown(key));
                if let Some(ch) = typed_char(event) {
                    self.emit(time, flags, NativeKind::KeyTyped(key, ch));
                }
            }
            KEY_UP => {
                let key = keycode().native();
                self.emit(time, flags, NativeKind::KeyUp(key));
            }
            FLAGS_CHANGED => {
                let code = keycode();
                let key = code.native();
                if code.is_down(flags) {
                    self.emit(time, flags, NativeKind::KeyDown(key));
                } else {
                    self.emit(time, flags, NativeKind::KeyUp(key));
                }
            }
            SCROLL => {
                let vertical = CGEventGetIntegerValueField(event, SCROLL_WHEEL_EVENT_DELTA_AXIS_1);
                let horizontal = CGEventGetIntegerValueField(event, SCROLL_WHEEL_EVENT_DELTA_AXIS_2);
                for (axis, delta) in [(WheelAxis::Vertical, vertical), (WheelAxis::Horizontal, horizontal)] {
                    if delta == 0 {
                        continue;
                    }
                    let wheel = NativeWheel {
                        axis,
                        delta: delta.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
                        amount: DEFAULT_WHEEL_LINES,
                        page: false,
                        x,
                        y,
                    };
                    self.emit(time, flags, NativeKind::Wheel(wheel));
                }
            }
            _ => {}
        }
    }

    /// `reported` is the event's click state, counted by the window server
    /// against the user's double-click setting.
    fn press(&mut self, ordinal: u8, reported: i64, time: u64, flags: u64, x: i32, y: i32) {
        if ordinal < 5 {
            self.buttons |= 1 << (QUARTZ_BUTTON_SHIFT + u32::from(ordinal));
        }
        let tracked = self.clicks.press(ordinal, time / 1_000_000);
        let clicks = click_count(reported, tracked);
        let button = NativeButton { button: ordinal, clicks, x, y };
        self.emit(time, flags, NativeKind::ButtonDown(button));
    }

    fn release(&mut self, ordinal: u8, reported: i64, time: u64, flags: u64, x: i32, y: i32) {
        if ordinal < 5 {
            self.buttons &= !(1 << (QUARTZ_BUTTON_SHIFT + u32::from(ordinal)));
        }
        // The tracker only decides whether a drag broke the click.
        let Release { clicks, clicked } = self.clicks.release(ordinal);
        let clicks = click_count(reported, clicks);
        let button = NativeButton { button: ordinal, clicks, x, y };
        self.emit(time, flags, NativeKind::ButtonUp(button));
        if clicked {
            self.emit(time, flags, NativeKind::ButtonClick(button));
        }
    }
}

/// The window server's click count, or the tracker's when the event carries
/// none (synthetic events report zero).
fn click_count(reported: i64, tracked: u16) -> u16 {
    if reported > 0 {
        u16::try_from(reported).unwrap_or(u16::MAX)
    } else {
        tracked
    }
}

/// A virtual keycode as reported by Quartz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeyCodeOf(u32);

impl KeyCodeOf {
    fn native(self) -> NativeKey {
        NativeKey {
            code: self.0,
            scan_code: self.0,
            extended: false,
        }
    }

    /// For modifier keys, whether the flags after a FlagsChanged event show
    /// the key as down.
    fn is_down(self, flags: u64) -> bool {
        let mask: u64 = match self.0 {
            0x38 | 0x3C => 0x0002_0000, // shift
            0x3B | 0x3E => 0x0004_0000, // control
            0x3A | 0x3D => 0x0008_0000, // option
            0x37 | 0x36 => 0x0010_0000, // command
            0x39 => 0x0001_0000,        // caps lock
            0x3F => 0x0080_0000,        // fn
            _ => return false,
        };
        flags & mask != 0
    }
}

/// # Safety
///
/// `event` must be a valid keyboard CGEvent.
unsafe fn typed_char(event: CGEventRef) -> Option<char> {
    let mut buffer = [0u16; 4];
    let mut len: usize = 0;
    CGEventKeyboardGetUnicodeString(event, buffer.len(), &mut len, buffer.as_mut_ptr());
    if len == 0 {
        return None;
    }
    char::decode_utf16(buffer[..len.min(buffer.len())].iter().copied())
        .next()
        .and_then(Result::ok)
        .filter(|c| !c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_keys_read_their_own_flag() {
        // Arrange
        let shift_and_command = 0x0002_0000 | 0x0010_0000;

        // Act / Assert
        assert!(KeyCodeOf(0x38).is_down(shift_and_command));
        assert!(KeyCodeOf(0x36).is_down(shift_and_command));
        assert!(!KeyCodeOf(0x3B).is_down(shift_and_command));
        assert!(!KeyCodeOf(0x00).is_down(shift_and_command));
    }

    #[test]
    fn test_window_server_click_state_wins_over_the_tracker() {
        // Arrange: a slow third click the fallback interval would restart.
        let mut tracker = ClickTracker::new(500);
        tracker.press(0, 0);
        tracker.release(0);
        let tracked = tracker.press(0, 2_000);

        // Act
        let clicks = click_count(3, tracked);

        // Assert
        assert_eq!(tracked, 1);
        assert_eq!(clicks, 3);
    }

    #[test]
    fn test_missing_click_state_falls_back_to_the_tracker() {
        assert_eq!(click_count(0, 2), 2);
        assert_eq!(click_count(-1, 1), 1);
        assert_eq!(click_count(i64::MAX, 1), u16::MAX);
    }

    #[test]
    fn test_event_mask_covers_keys_buttons_and_wheel() {
        let mask = event_mask();

        assert_ne!(mask & (1 << CGEventType::KeyDown as u64), 0);
        assert_ne!(mask & (1 << CGEventType::OtherMouseUp as u64), 0);
        assert_ne!(mask & (1 << CGEventType::ScrollWheel as u64), 0);
        assert_eq!(mask & (1 << CGEventType::Null as u64), 0);
    }
}
