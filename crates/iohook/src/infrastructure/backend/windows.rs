//! Windows low-level keyboard and mouse hooks.
//!
//! `install_hook` runs on the engine's hook thread: it raises the thread to
//! `THREAD_PRIORITY_TIME_CRITICAL`, installs `WH_KEYBOARD_LL` and
//! `WH_MOUSE_LL`, and pumps a Win32 message loop until `uninstall_hook`
//! posts `WM_QUIT` to it.  Both hook procedures are called by Windows on that
//! same thread, so the per-session state lives in a thread-local.
//!
//! The hook callbacks must return within the system timeout or Windows
//! silently removes the hook.  They only translate and queue.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::cell::RefCell;
use std::ffi::c_void;
use std::sync::atomic::{AtomicU32, Ordering};

use iohook_core::click::{ClickTracker, Release};
use iohook_core::normalize::modifiers::{windows_is_lock_vk, windows_modifier_bit};
use iohook_core::{NativeButton, NativeEvent, NativeKey, NativeKind, NativeWheel, Platform, WheelAxis};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::SystemInformation::GetTickCount64;
use windows::Win32::System::Threading::{
    GetCurrentThread, GetCurrentThreadId, SetThreadPriority, THREAD_PRIORITY_TIME_CRITICAL,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetDoubleClickTime, GetKeyState, GetKeyboardLayout, ToUnicodeEx,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, SystemParametersInfoW, UnhookWindowsHookEx, HC_ACTION, HHOOK,
    KBDLLHOOKSTRUCT, KBDLLHOOKSTRUCT_FLAGS, LLKHF_EXTENDED, MSG, MSLLHOOKSTRUCT, PM_NOREMOVE,
    SPI_GETWHEELSCROLLLINES, SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS, WH_KEYBOARD_LL, WH_MOUSE_LL,
    WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP,
    WM_MOUSEHWHEEL, WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP,
    WM_SYSKEYDOWN, WM_SYSKEYUP, WM_XBUTTONDOWN, WM_XBUTTONUP, XBUTTON1,
};

use super::BackendClaim;
use crate::application::backend::{EventSink, HookError, PlatformBackend};
use crate::config::HookConfig;

/// `SPI_GETWHEELSCROLLLINES` value meaning "scroll one page per notch".
const WHEEL_PAGESCROLL: u32 = u32::MAX;

/// `ToUnicodeEx` flag: do not change the keyboard state (dead keys).
const TO_UNICODE_NO_STATE_CHANGE: u32 = 0x4;

const VK_CAPITAL: u32 = 0x14;
const VK_NUMLOCK: u32 = 0x90;
const VK_SCROLL: u32 = 0x91;

/// Button ordinal → the VK whose bit tracks it in the modifier word.
const BUTTON_VKS: [u32; 5] = [0x01, 0x02, 0x04, 0x05, 0x06];

pub struct WindowsBackend {
    fallback_click_ms: u64,
    fallback_wheel_lines: u16,
    /// Id of the thread running the message loop; 0 when none.
    loop_thread: AtomicU32,
    _claim: BackendClaim,
}

impl WindowsBackend {
    /// # Errors
    ///
    /// [`HookError::BackendInUse`] if another native backend exists.
    pub fn new(config: &HookConfig) -> Result<Self, HookError> {
        Ok(Self {
            fallback_click_ms: config.multi_click_interval_ms,
            fallback_wheel_lines: config.wheel_lines,
            loop_thread: AtomicU32::new(0),
            _claim: BackendClaim::acquire()?,
        })
    }

    fn multi_click_ms(&self) -> u64 {
        // SAFETY: GetDoubleClickTime has no preconditions.
        match unsafe { GetDoubleClickTime() } {
            0 => self.fallback_click_ms,
            ms => u64::from(ms),
        }
    }

    /// Lines per notch, and whether the OS scrolls by pages instead.
    fn wheel_lines(&self) -> (u16, bool) {
        let mut lines: u32 = 0;
        // SAFETY: SPI_GETWHEELSCROLLLINES writes one u32 through pvparam.
        let queried = unsafe {
            SystemParametersInfoW(
                SPI_GETWHEELSCROLLLINES,
                0,
                Some(&mut lines as *mut u32 as *mut c_void),
                SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
            )
        };
        match (queried, lines) {
            (Ok(()), WHEEL_PAGESCROLL) => (1, true),
            (Ok(()), lines) if lines > 0 => (u16::try_from(lines).unwrap_or(u16::MAX), false),
            _ => (self.fallback_wheel_lines, false),
        }
    }
}

impl PlatformBackend for WindowsBackend {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn install_hook(&self, sink: EventSink) -> Result<(), HookError> {
        raise_thread_priority(&sink);

        let mut msg = MSG::default();
        // SAFETY: PeekMessageW with PM_NOREMOVE only forces creation of this
        // thread's message queue so PostThreadMessageW can reach it.
        unsafe {
            let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
            self.loop_thread.store(GetCurrentThreadId(), Ordering::SeqCst);
        }

        let (wheel_lines, page_scroll) = self.wheel_lines();
        let context = HookContext {
            sink: sink.clone(),
            clicks: ClickTracker::new(self.multi_click_ms()),
            held: initial_lock_word(),
            wheel_lines,
            page_scroll,
        };
        CONTEXT.with(|slot| *slot.borrow_mut() = Some(context));

        let hooks = match InstalledHooks::install() {
            Ok(hooks) => hooks,
            Err(err) => {
                CONTEXT.with(|slot| slot.borrow_mut().take());
                self.loop_thread.store(0, Ordering::SeqCst);
                return Err(err);
            }
        };

        sink.dispatch(native(tick_count(), 0, NativeKind::HookEnabled));

        // Win32 message loop – blocks until WM_QUIT is posted.
        // SAFETY: Standard Win32 GetMessage/DispatchMessage loop pattern on
        // the thread that owns the hooks.
        unsafe {
            while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
                DispatchMessageW(&msg);
            }
        }

        drop(hooks);
        self.loop_thread.store(0, Ordering::SeqCst);
        let held = CONTEXT.with(|slot| slot.borrow_mut().take().map_or(0, |ctx| ctx.held));
        sink.dispatch(native(tick_count(), held, NativeKind::HookDisabled));
        Ok(())
    }

    fn uninstall_hook(&self) -> Result<(), HookError> {
        let thread_id = self.loop_thread.load(Ordering::SeqCst);
        if thread_id == 0 {
            return Ok(());
        }
        // SAFETY: posting to a thread id is safe even if the thread has
        // already exited; the call then fails and we report it.
        unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) }
            .map_err(|e| HookError::Failure(format!("PostThreadMessageW(WM_QUIT): {e}")))
    }
}

fn raise_thread_priority(sink: &EventSink) {
    // SAFETY: GetCurrentThread returns a pseudo-handle valid on this thread.
    if let Err(e) = unsafe { SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL) } {
        sink.logger()
            .warn(&format!("could not raise hook thread priority: {e}"));
    }
}

fn tick_count() -> u64 {
    // SAFETY: GetTickCount64 has no preconditions.
    unsafe { GetTickCount64() }
}

fn native(time: u64, held: u64, kind: NativeKind) -> NativeEvent {
    NativeEvent::new(Platform::Windows, time, held, kind)
}

/// Lock keys are toggles; their current state is sampled once at install.
fn initial_lock_word() -> u64 {
    [VK_CAPITAL, VK_NUMLOCK, VK_SCROLL]
        .into_iter()
        // SAFETY: GetKeyState has no preconditions; bit 0 is the toggle.
        .filter(|&vk| unsafe { GetKeyState(vk as i32) } & 1 != 0)
        .filter_map(windows_modifier_bit)
        .fold(0, |acc, bit| acc | bit)
}

// ── Hook registration ────────────────────────────────────────────────────────

/// Both hooks; unhooked on drop.
struct InstalledHooks {
    keyboard: HHOOK,
    mouse: HHOOK,
}

impl InstalledHooks {
    fn install() -> Result<Self, HookError> {
        // SAFETY: the calling thread runs a message loop right after this.
        let keyboard = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) }
            .map_err(|e| HookError::SetWindowsHook(format!("WH_KEYBOARD_LL: {e}")))?;
        // SAFETY: as above.
        let mouse = match unsafe { SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0) } {
            Ok(hook) => hook,
            Err(e) => {
                // SAFETY: `keyboard` was installed above and is not used again.
                unsafe {
                    let _ = UnhookWindowsHookEx(keyboard);
                }
                return Err(HookError::SetWindowsHook(format!("WH_MOUSE_LL: {e}")));
            }
        };
        Ok(Self { keyboard, mouse })
    }
}

impl Drop for InstalledHooks {
    fn drop(&mut self) {
        // SAFETY: both handles came from SetWindowsHookExW on this thread.
        unsafe {
            let _ = UnhookWindowsHookEx(self.keyboard);
            let _ = UnhookWindowsHookEx(self.mouse);
        }
    }
}

// ── Per-thread hook state ────────────────────────────────────────────────────

struct HookContext {
    sink: EventSink,
    clicks: ClickTracker,
    /// Modifier word in the layout `windows_modifier_bit` defines.
    held: u64,
    wheel_lines: u16,
    page_scroll: bool,
}

impl HookContext {
    fn emit(&self, time: u64, kind: NativeKind) {
        self.sink.dispatch(native(time, self.held, kind));
    }

    fn key_down(&mut self, vk: u32) {
        if let Some(bit) = windows_modifier_bit(vk) {
            if windows_is_lock_vk(vk) {
                self.held ^= bit;
            } else {
                self.held |= bit;
            }
        }
    }

    fn key_up(&mut self, vk: u32) {
        if let Some(bit) = windows_modifier_bit(vk) {
            if !windows_is_lock_vk(vk) {
                self.held &= !bit;
            }
        }
    }

    fn set_button(&mut self, ordinal: u8, down: bool) {
        let Some(bit) = BUTTON_VKS
            .get(usize::from(ordinal).wrapping_sub(1))
            .and_then(|&vk| windows_modifier_bit(vk))
        else {
            return;
        };
        if down {
            self.held |= bit;
        } else {
            self.held &= !bit;
        }
    }

    fn is_held(&self, vk: u32) -> bool {
        windows_modifier_bit(vk).is_some_and(|bit| self.held & bit != 0)
    }

    /// Character `vk` produces under the tracked modifier state, if any.
    fn typed_char(&self, vk: u32, scan_code: u32) -> Option<char> {
        const SIDED: [(u32, usize); 6] = [
            (0xA0, 0x10),
            (0xA1, 0x10),
            (0xA2, 0x11),
            (0xA3, 0x11),
            (0xA4, 0x12),
            (0xA5, 0x12),
        ];
        let mut state = [0u8; 256];
        for (sided, generic) in SIDED {
            if self.is_held(sided) {
                state[sided as usize] = 0x80;
                state[generic] = 0x80;
            }
        }
        if self.is_held(VK_CAPITAL) {
            state[VK_CAPITAL as usize] = 0x01;
        }

        let mut buffer = [0u16; 4];
        // SAFETY: both buffers are valid for the lengths passed; the
        // no-state-change flag keeps dead keys intact for the focused app.
        let written = unsafe {
            let layout = GetKeyboardLayout(0);
            ToUnicodeEx(vk, scan_code, &state, &mut buffer, TO_UNICODE_NO_STATE_CHANGE, Some(layout))
        };
        if written != 1 {
            return None;
        }
        char::from_u32(u32::from(buffer[0])).filter(|c| !c.is_control())
    }
}

thread_local! {
    static CONTEXT: RefCell<Option<HookContext>> = const { RefCell::new(None) };
}

fn with_context(f: impl FnOnce(&mut HookContext)) {
    CONTEXT.with(|slot| {
        if let Ok(mut slot) = slot.try_borrow_mut() {
            if let Some(ctx) = slot.as_mut() {
                f(ctx);
            }
        }
    });
}

// ── Hook procedures ──────────────────────────────────────────────────────────

/// Low-level keyboard hook callback.
///
/// # Safety
///
/// Called by Windows on the hook thread; must return quickly.
unsafe extern "system" fn keyboard_hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        // SAFETY: l_param points to a KBDLLHOOKSTRUCT when n_code == HC_ACTION.
        let kbs = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
        let key = NativeKey {
            code: kbs.vkCode,
            scan_code: kbs.scanCode,
            extended: (kbs.flags & LLKHF_EXTENDED) != KBDLLHOOKSTRUCT_FLAGS(0),
        };
        let time = u64::from(kbs.time);

        with_context(|ctx| match w_param.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => {
                ctx.key_down(key.code);
                ctx.emit(time, NativeKind::KeyDown(key));
                if let Some(ch) = ctx.typed_char(key.code, key.scan_code) {
                    ctx.emit(time, NativeKind::KeyTyped(key, ch));
                }
            }
            WM_KEYUP | WM_SYSKEYUP => {
                ctx.key_up(key.code);
                ctx.emit(time, NativeKind::KeyUp(key));
            }
            _ => {}
        });
    }

    // SAFETY: Forward the event to the next hook in the chain; this hook
    // only observes.
    CallNextHookEx(None, n_code, w_param, l_param)
}

/// Low-level mouse hook callback.
///
/// # Safety
///
/// Called by Windows on the hook thread; must return quickly.
unsafe extern "system" fn mouse_hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        // SAFETY: l_param points to a MSLLHOOKSTRUCT when n_code == HC_ACTION.
        let mhs = &*(l_param.0 as *const MSLLHOOKSTRUCT);
        with_context(|ctx| handle_mouse(ctx, w_param.0 as u32, mhs));
    }

    // SAFETY: Forward to the next hook in the chain.
    CallNextHookEx(None, n_code, w_param, l_param)
}

fn handle_mouse(ctx: &mut HookContext, message: u32, mhs: &MSLLHOOKSTRUCT) {
    let (x, y) = (mhs.pt.x, mhs.pt.y);
    let time = u64::from(mhs.time);
    let high_word = (mhs.mouseData >> 16) as u16;
    let x_button = if high_word == XBUTTON1 { 4 } else { 5 };

    let press = |ctx: &mut HookContext, ordinal: u8| {
        ctx.set_button(ordinal, true);
        let clicks = ctx.clicks.press(ordinal, time);
        let button = NativeButton { button: ordinal, clicks, x, y };
        ctx.emit(time, NativeKind::ButtonDown(button));
    };
    let release = |ctx: &mut HookContext, ordinal: u8| {
        ctx.set_button(ordinal, false);
        let Release { clicks, clicked } = ctx.clicks.release(ordinal);
        let button = NativeButton { button: ordinal, clicks, x, y };
        ctx.emit(time, NativeKind::ButtonUp(button));
        if clicked {
            ctx.emit(time, NativeKind::ButtonClick(button));
        }
    };

    match message {
        WM_MOUSEMOVE => {
            ctx.clicks.motion();
            ctx.emit(time, NativeKind::Motion { x, y });
        }
        WM_LBUTTONDOWN => press(ctx, 1),
        WM_LBUTTONUP => release(ctx, 1),
        WM_RBUTTONDOWN => press(ctx, 2),
        WM_RBUTTONUP => release(ctx, 2),
        WM_MBUTTONDOWN => press(ctx, 3),
        WM_MBUTTONUP => release(ctx, 3),
        WM_XBUTTONDOWN => press(ctx, x_button),
        WM_XBUTTONUP => release(ctx, x_button),
        WM_MOUSEWHEEL | WM_MOUSEHWHEEL => {
            let axis = if message == WM_MOUSEWHEEL {
                WheelAxis::Vertical
            } else {
                WheelAxis::Horizontal
            };
            let wheel = NativeWheel {
                axis,
                delta: i32::from(high_word as i16),
                amount: ctx.wheel_lines,
                page: ctx.page_scroll,
                x,
                y,
            };
            ctx.emit(time, NativeKind::Wheel(wheel));
        }
        _ => {}
    }
}
