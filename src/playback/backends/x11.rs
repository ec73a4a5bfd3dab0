use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{self, ConnectionExt as _};
use x11rb::protocol::xtest::{self, ConnectionExt as _};
use x11rb::rust_connection::RustConnection;

use super::COMMON_MODIFIER_KEYCODES;
use crate::keyboard::{
    key_hold_ms, keystroke_for_output_char, KEY_1, KEY_A, KEY_APOSTROPHE, KEY_BACKSPACE,
    KEY_LEFT, KEY_LEFTBRACE, KEY_LEFTSHIFT, KEY_MINUS, KEY_Q, KEY_RIGHT,
};
use crate::sink::KeystrokeSink;

// X11 special focus value: the focused window follows the pointer.
const POINTER_ROOT: xproto::Window = 1;

// Gap between repeated taps of the same key (backspace, arrows).
const REPEAT_GAP_MS: (u64, u64) = (25, 45);

fn evdev_to_x11_keycode(evdev_keycode: u32) -> Result<u8> {
    // X11 keycodes are evdev + 8 on Xorg and Xwayland.
    let x11 = evdev_keycode
        .checked_add(8)
        .ok_or_else(|| anyhow!("evdev keycode overflow"))?;
    u8::try_from(x11).map_err(|_| anyhow!("evdev keycode {evdev_keycode} out of range for X11"))
}

fn query_xtest(conn: &impl Connection) -> Result<()> {
    let ext = conn
        .extension_information(xtest::X11_EXTENSION_NAME)
        .context("failed to query X11 extension info")?;
    if ext.is_none() {
        bail!("X11 output requires the XTEST extension (not present on this X server)");
    }
    Ok(())
}

fn keysyms_for_keycode(conn: &impl Connection, keycode: u8) -> Result<(u32, u32)> {
    let reply = conn
        .get_keyboard_mapping(keycode, 1)
        .context("failed to request keyboard mapping")?
        .reply()
        .context("failed to read keyboard mapping")?;

    if reply.keysyms_per_keycode == 0 {
        bail!("X server returned 0 keysyms per keycode");
    }
    let at = |i: usize| reply.keysyms.get(i).copied().unwrap_or(x11rb::NO_SYMBOL);
    Ok((at(0), at(1)))
}

/// Check a handful of keys against US QWERTY; keystrokes are computed for it.
fn validate_us_keymap(conn: &impl Connection) -> Result<()> {
    // For Latin-1, X11 keysyms equal the character code.
    let checks = [
        (KEY_A, 'a', 'A'),
        (KEY_Q, 'q', 'Q'),
        (KEY_1, '1', '!'),
        (KEY_MINUS, '-', '_'),
        (KEY_APOSTROPHE, '\'', '"'),
        (KEY_LEFTBRACE, '[', '{'),
    ];

    for (evdev, lower, upper) in checks {
        let keycode = evdev_to_x11_keycode(evdev)?;
        let (got0, got1) = keysyms_for_keycode(conn, keycode)?;
        if got0 == x11rb::NO_SYMBOL || got1 == x11rb::NO_SYMBOL {
            bail!(
                "could not validate the X server keymap: keycode {keycode} returned NoSymbol \
                 (got {got0:#x}/{got1:#x})"
            );
        }
        if got0 != lower as u32 || got1 != upper as u32 {
            bail!(
                "X11 output requires a US keyboard layout, but keycode {keycode} maps to \
                 {got0:#x}/{got1:#x}. Try `setxkbmap us`."
            );
        }
    }
    Ok(())
}

fn require_explicit_focus(conn: &impl Connection) -> Result<()> {
    let focus = conn
        .get_input_focus()
        .context("failed to request input focus")?
        .reply()
        .context("failed to read input focus reply")?;

    if focus.focus == x11rb::NONE {
        bail!("no X11 input focus detected; click into the target editor before starting");
    }
    if focus.focus == POINTER_ROOT {
        bail!(
            "X11 input focus is set to PointerRoot; click into the target editor window to \
             give it explicit focus before starting"
        );
    }
    Ok(())
}

fn xtest_key(conn: &impl Connection, root: xproto::Window, keycode: u8, pressed: bool) -> Result<()> {
    let type_ = if pressed {
        xproto::KEY_PRESS_EVENT
    } else {
        xproto::KEY_RELEASE_EVENT
    };
    conn.xtest_fake_input(type_, keycode, x11rb::CURRENT_TIME, root, 0, 0, 0)
        .context("failed to send XTEST fake input")?;
    Ok(())
}

fn reset_common_modifiers_best_effort(conn: &impl Connection, root: xproto::Window) {
    for keycode in COMMON_MODIFIER_KEYCODES {
        if let Ok(code) = evdev_to_x11_keycode(keycode) {
            let _ = xtest_key(conn, root, code, false);
        }
    }
    let _ = conn.flush();
}

/// Types into whichever X11 window has keyboard focus, through XTEST.
pub struct X11Sink {
    conn: RustConnection,
    root: xproto::Window,
    shift_down: bool,
    rng: StdRng,
}

impl X11Sink {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("failed to connect to X11")?;
        query_xtest(&conn)?;
        validate_us_keymap(&conn)?;

        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| anyhow!("invalid X11 screen index"))?
            .root;

        require_explicit_focus(&conn)?;

        // X11 has no per-client modifier state; start from a neutral one.
        reset_common_modifiers_best_effort(&conn, root);
        debug!(screen = screen_num, "connected to X11");

        Ok(Self {
            conn,
            root,
            shift_down: false,
            rng: StdRng::from_entropy(),
        })
    }

    fn key(&mut self, evdev: u32, pressed: bool) -> Result<()> {
        let keycode = evdev_to_x11_keycode(evdev)?;
        xtest_key(&self.conn, self.root, keycode, pressed)?;
        self.conn.flush().context("failed to flush X11 connection")?;
        Ok(())
    }

    fn tap(&mut self, evdev: u32) -> Result<()> {
        self.key(evdev, true)?;
        thread::sleep(Duration::from_millis(key_hold_ms(&mut self.rng)));
        self.key(evdev, false)
    }

    fn set_shift(&mut self, down: bool) -> Result<()> {
        if self.shift_down != down {
            self.key(KEY_LEFTSHIFT, down)?;
            self.shift_down = down;
        }
        Ok(())
    }

    fn tap_repeated(&mut self, evdev: u32, count: usize) -> Result<()> {
        self.set_shift(false)?;
        for i in 0..count {
            if i > 0 {
                let gap = self.rng.gen_range(REPEAT_GAP_MS.0..=REPEAT_GAP_MS.1);
                thread::sleep(Duration::from_millis(gap));
            }
            self.tap(evdev)?;
        }
        Ok(())
    }
}

impl KeystrokeSink for X11Sink {
    fn emit(&mut self, text: &str) -> Result<()> {
        for c in text.chars() {
            let stroke = keystroke_for_output_char(c)
                .ok_or_else(|| anyhow!("character {c:?} cannot be typed on a US QWERTY layout"))?;
            self.set_shift(stroke.shift)?;
            self.tap(stroke.keycode)?;
        }
        self.set_shift(false)
    }

    fn backspace(&mut self, count: usize) -> Result<()> {
        self.tap_repeated(KEY_BACKSPACE, count)
    }

    fn cursor_left(&mut self, count: usize) -> Result<()> {
        self.tap_repeated(KEY_LEFT, count)
    }

    fn cursor_right(&mut self, count: usize) -> Result<()> {
        self.tap_repeated(KEY_RIGHT, count)
    }
}

impl Drop for X11Sink {
    fn drop(&mut self) {
        reset_common_modifiers_best_effort(&self.conn, self.root);
    }
}
