use rand::Rng;
use rand_distr::{Distribution, Normal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub keycode: u32,
    pub shift: bool,
}

// Linux evdev keycodes (see linux/input-event-codes.h)
pub const KEY_1: u32 = 2;
pub const KEY_2: u32 = 3;
pub const KEY_3: u32 = 4;
pub const KEY_4: u32 = 5;
pub const KEY_5: u32 = 6;
pub const KEY_6: u32 = 7;
pub const KEY_7: u32 = 8;
pub const KEY_8: u32 = 9;
pub const KEY_9: u32 = 10;
pub const KEY_0: u32 = 11;

pub const KEY_MINUS: u32 = 12;
pub const KEY_EQUAL: u32 = 13;
pub const KEY_BACKSPACE: u32 = 14;

pub const KEY_Q: u32 = 16;
pub const KEY_W: u32 = 17;
pub const KEY_E: u32 = 18;
pub const KEY_R: u32 = 19;
pub const KEY_T: u32 = 20;
pub const KEY_Y: u32 = 21;
pub const KEY_U: u32 = 22;
pub const KEY_I: u32 = 23;
pub const KEY_O: u32 = 24;
pub const KEY_P: u32 = 25;

pub const KEY_LEFTBRACE: u32 = 26;
pub const KEY_RIGHTBRACE: u32 = 27;
pub const KEY_ENTER: u32 = 28;

pub const KEY_LEFTCTRL: u32 = 29;

pub const KEY_A: u32 = 30;
pub const KEY_S: u32 = 31;
pub const KEY_D: u32 = 32;
pub const KEY_F: u32 = 33;
pub const KEY_G: u32 = 34;
pub const KEY_H: u32 = 35;
pub const KEY_J: u32 = 36;
pub const KEY_K: u32 = 37;
pub const KEY_L: u32 = 38;

pub const KEY_SEMICOLON: u32 = 39;
pub const KEY_APOSTROPHE: u32 = 40;
pub const KEY_GRAVE: u32 = 41;

pub const KEY_LEFTSHIFT: u32 = 42;

pub const KEY_BACKSLASH: u32 = 43;

pub const KEY_Z: u32 = 44;
pub const KEY_X: u32 = 45;
pub const KEY_C: u32 = 46;
pub const KEY_V: u32 = 47;
pub const KEY_B: u32 = 48;
pub const KEY_N: u32 = 49;
pub const KEY_M: u32 = 50;

pub const KEY_COMMA: u32 = 51;
pub const KEY_DOT: u32 = 52;
pub const KEY_SLASH: u32 = 53;

pub const KEY_RIGHTSHIFT: u32 = 54;

pub const KEY_LEFTALT: u32 = 56;
pub const KEY_SPACE: u32 = 57;

pub const KEY_RIGHTCTRL: u32 = 97;
pub const KEY_RIGHTALT: u32 = 100;

pub const KEY_LEFT: u32 = 105;
pub const KEY_RIGHT: u32 = 106;

// Indexed by `c - 'a'`.
const LETTER_KEYCODES: [u32; 26] = [
    KEY_A, KEY_B, KEY_C, KEY_D, KEY_E, KEY_F, KEY_G, KEY_H, KEY_I, KEY_J, KEY_K, KEY_L, KEY_M,
    KEY_N, KEY_O, KEY_P, KEY_Q, KEY_R, KEY_S, KEY_T, KEY_U, KEY_V, KEY_W, KEY_X, KEY_Y, KEY_Z,
];

// (unshifted, shifted, keycode) for the number row and symbol keys.
const SYMBOL_KEYS: [(char, char, u32); 21] = [
    ('1', '!', KEY_1),
    ('2', '@', KEY_2),
    ('3', '#', KEY_3),
    ('4', '$', KEY_4),
    ('5', '%', KEY_5),
    ('6', '^', KEY_6),
    ('7', '&', KEY_7),
    ('8', '*', KEY_8),
    ('9', '(', KEY_9),
    ('0', ')', KEY_0),
    ('-', '_', KEY_MINUS),
    ('=', '+', KEY_EQUAL),
    ('[', '{', KEY_LEFTBRACE),
    (']', '}', KEY_RIGHTBRACE),
    ('\\', '|', KEY_BACKSLASH),
    (';', ':', KEY_SEMICOLON),
    ('\'', '"', KEY_APOSTROPHE),
    ('`', '~', KEY_GRAVE),
    (',', '<', KEY_COMMA),
    ('.', '>', KEY_DOT),
    ('/', '?', KEY_SLASH),
];

pub fn typed_char_for_output_char(c: char) -> Option<char> {
    match c {
        '\n' => Some('\n'),
        // Tab and CR are not in the typable allowlist.
        '\t' | '\r' => None,

        // Editors with smart-quote substitution turn the ASCII keystrokes back
        // into the intended punctuation.
        '’' | '‘' => Some('\''),
        '”' | '“' => Some('"'),

        c if c.is_ascii_graphic() || c == ' ' => Some(c),
        _ => None,
    }
}

pub fn keystroke_for_output_char(c: char) -> Option<KeyStroke> {
    typed_char_for_output_char(c).and_then(char_to_keystroke)
}

pub fn find_first_unsupported_char(text: &str) -> Option<(usize, char)> {
    text.char_indices()
        .find(|&(_idx, c)| keystroke_for_output_char(c).is_none())
}

pub fn char_to_keystroke(c: char) -> Option<KeyStroke> {
    match c {
        'a'..='z' => Some(KeyStroke {
            keycode: LETTER_KEYCODES[(c as u8 - b'a') as usize],
            shift: false,
        }),
        'A'..='Z' => Some(KeyStroke {
            keycode: LETTER_KEYCODES[(c as u8 - b'A') as usize],
            shift: true,
        }),
        ' ' => Some(KeyStroke {
            keycode: KEY_SPACE,
            shift: false,
        }),
        '\n' => Some(KeyStroke {
            keycode: KEY_ENTER,
            shift: false,
        }),
        _ => SYMBOL_KEYS.iter().find_map(|&(plain, shifted, keycode)| {
            if c == plain {
                Some(KeyStroke {
                    keycode,
                    shift: false,
                })
            } else if c == shifted {
                Some(KeyStroke {
                    keycode,
                    shift: true,
                })
            } else {
                None
            }
        }),
    }
}

/// Which hand a touch typist uses for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hand {
    Left,
    Right,
    /// Thumb keys, newlines and anything off the main block.
    #[default]
    None,
}

const LEFT_HAND_KEYS: &str = "`12345qwertasdfgzxcvb~!@#$%";
const RIGHT_HAND_KEYS: &str = "67890-=yuiop[]\\hjkl;'nm,./^&*()_+{}|:\"<>?";

pub fn hand_for_char(c: char) -> Hand {
    let c = c.to_ascii_lowercase();
    if LEFT_HAND_KEYS.contains(c) {
        Hand::Left
    } else if RIGHT_HAND_KEYS.contains(c) {
        Hand::Right
    } else {
        Hand::None
    }
}

fn qwerty_neighbors(base: char) -> &'static [char] {
    match base {
        'a' => &['q', 'w', 's', 'z', 'x'],
        'b' => &['v', 'g', 'h', 'n'],
        'c' => &['x', 'd', 'f', 'v'],
        'd' => &['s', 'e', 'r', 'f', 'c', 'x'],
        'e' => &['w', 's', 'd', 'r', '3', '4'],
        'f' => &['d', 'r', 't', 'g', 'v', 'c'],
        'g' => &['f', 't', 'y', 'h', 'b', 'v'],
        'h' => &['g', 'y', 'u', 'j', 'n', 'b'],
        'i' => &['u', 'j', 'k', 'o', '8', '9'],
        'j' => &['h', 'u', 'i', 'k', 'm', 'n'],
        'k' => &['j', 'i', 'o', 'l', ',', 'm'],
        'l' => &['k', 'o', 'p', ';', '.'],
        'm' => &['n', 'j', 'k', ','],
        'n' => &['b', 'h', 'j', 'm'],
        'o' => &['i', 'k', 'l', 'p', '9', '0'],
        'p' => &['o', 'l', '[', ';', '0', '-'],
        'q' => &['w', 'a', '1', '2'],
        'r' => &['e', 'd', 'f', 't', '4', '5'],
        's' => &['a', 'w', 'e', 'd', 'x', 'z'],
        't' => &['r', 'f', 'g', 'y', '5', '6'],
        'u' => &['y', 'h', 'j', 'i', '7', '8'],
        'v' => &['c', 'f', 'g', 'b'],
        'w' => &['q', 'a', 's', 'e', '2', '3'],
        'x' => &['z', 's', 'd', 'c'],
        'y' => &['t', 'g', 'h', 'u', '6', '7'],
        'z' => &['a', 's', 'x'],
        '1' => &['2', 'q', '`'],
        '2' => &['1', '3', 'q', 'w'],
        '3' => &['2', '4', 'w', 'e'],
        '4' => &['3', '5', 'e', 'r'],
        '5' => &['4', '6', 'r', 't'],
        '6' => &['5', '7', 't', 'y'],
        '7' => &['6', '8', 'y', 'u'],
        '8' => &['7', '9', 'u', 'i'],
        '9' => &['8', '0', 'i', 'o'],
        '0' => &['9', '-', 'o', 'p'],
        '-' => &['0', '=', 'p', '['],
        '=' => &['-', '[', ']'],
        _ => &[],
    }
}

/// Pick a key physically adjacent to `c` on a US-QWERTY board.
///
/// Letters keep their case: a slip next to `A` produces an uppercase letter
/// (or the unshifted digit, since shifted digits are not letters).
pub fn qwerty_adjacent_char(c: char, rng: &mut impl Rng) -> Option<char> {
    let (base, make_upper) = if c.is_ascii_uppercase() {
        (c.to_ascii_lowercase(), true)
    } else {
        (c, false)
    };

    let neighbors = qwerty_neighbors(base);
    if neighbors.is_empty() {
        return None;
    }

    let chosen = neighbors[rng.gen_range(0..neighbors.len())];
    Some(if make_upper {
        chosen.to_ascii_uppercase()
    } else {
        chosen
    })
}

/// How long a physical key stays down, in milliseconds.
pub fn key_hold_ms(rng: &mut impl Rng) -> u64 {
    match Normal::<f64>::new(38.0, 12.0) {
        Ok(dist) => dist.sample(rng).clamp(18.0, 70.0).round() as u64,
        Err(_) => 38,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn letters_map_to_their_keys_with_shift_for_uppercase() {
        assert_eq!(
            char_to_keystroke('q'),
            Some(KeyStroke {
                keycode: KEY_Q,
                shift: false
            })
        );
        assert_eq!(
            char_to_keystroke('Z'),
            Some(KeyStroke {
                keycode: KEY_Z,
                shift: true
            })
        );
        assert_eq!(
            char_to_keystroke('?'),
            Some(KeyStroke {
                keycode: KEY_SLASH,
                shift: true
            })
        );
        assert_eq!(char_to_keystroke('\t'), None);
    }

    #[test]
    fn every_printable_ascii_char_is_typable() {
        for b in 32u8..=126u8 {
            let c = b as char;
            assert!(
                keystroke_for_output_char(c).is_some(),
                "expected {c:?} to be typable"
            );
        }
        assert_eq!(find_first_unsupported_char("ok\tno"), Some((2, '\t')));
        assert_eq!(find_first_unsupported_char("It’s fine\n"), None);
    }

    #[test]
    fn hands_split_the_keyboard_down_the_middle() {
        assert_eq!(hand_for_char('a'), Hand::Left);
        assert_eq!(hand_for_char('S'), Hand::Left);
        assert_eq!(hand_for_char('k'), Hand::Right);
        assert_eq!(hand_for_char('?'), Hand::Right);
        assert_eq!(hand_for_char(' '), Hand::None);
        assert_eq!(hand_for_char('\n'), Hand::None);
    }

    #[test]
    fn adjacent_chars_are_neighbors_and_keep_case() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let lower = qwerty_adjacent_char('g', &mut rng).unwrap();
            assert!(qwerty_neighbors('g').contains(&lower));

            let upper = qwerty_adjacent_char('G', &mut rng).unwrap();
            assert!(upper.is_ascii_uppercase());
            assert!(qwerty_neighbors('g').contains(&upper.to_ascii_lowercase()));
        }
        assert_eq!(qwerty_adjacent_char(' ', &mut rng), None);
    }

    #[test]
    fn every_neighbor_is_typable() {
        for c in ('a'..='z').chain('0'..='9') {
            for n in qwerty_neighbors(c) {
                assert!(char_to_keystroke(*n).is_some(), "{c} -> {n}");
            }
        }
    }

    #[test]
    fn key_hold_is_clamped() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let ms = key_hold_ms(&mut rng);
            assert!((18..=70).contains(&ms));
        }
    }
}
