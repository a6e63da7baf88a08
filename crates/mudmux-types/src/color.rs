//! Color-code helpers.
//!
//! The proxy uses `@`-prefixed color codes internally (`@r`, `@G`,
//! `@x123`) and converts them to ANSI SGR sequences only at the moment
//! a line is formatted for a socket. All functions here are pure; the
//! rest of the workspace treats this module as an opaque collaborator.
//!
//! # Code grammar
//!
//! | Code | Meaning |
//! |------|---------|
//! | `@k`..`@w` | normal foreground (black, red, green, yellow, blue, magenta, cyan, white) |
//! | `@K`..`@W` | bold foreground |
//! | `@x<n>` | xterm-256 foreground, `n` in 0..=255 |
//! | `@z<n>` | xterm-256 background, `n` in 0..=255 |
//! | `@.` | reset |
//! | `@@` | literal `@` |

const ESC: char = '\x1b';

/// Maps a base code letter to its ANSI color number, if valid.
fn base_color(ch: char) -> Option<u8> {
    match ch.to_ascii_lowercase() {
        'k' => Some(0),
        'r' => Some(1),
        'g' => Some(2),
        'y' => Some(3),
        'b' => Some(4),
        'm' => Some(5),
        'c' => Some(6),
        'w' => Some(7),
        _ => None,
    }
}

/// Consumes up to three digits from the iterator, returning the value
/// if it fits in 0..=255.
fn take_xterm_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<u8> {
    let mut digits = String::new();
    while digits.len() < 3 {
        match chars.peek() {
            Some(c) if c.is_ascii_digit() => {
                digits.push(*c);
                chars.next();
            }
            _ => break,
        }
    }
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u16>().ok().and_then(|n| u8::try_from(n).ok())
}

/// Converts `@`-codes in `input` to ANSI escape sequences.
///
/// Unrecognized codes pass through unchanged so a stray `@` in mud
/// output is not eaten.
#[must_use]
pub fn to_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '@' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some('@') => {
                chars.next();
                out.push('@');
            }
            Some('.') => {
                chars.next();
                out.push_str("\x1b[0m");
            }
            Some('x') | Some('z') => {
                let which = chars.next().unwrap_or('x');
                if let Some(n) = take_xterm_number(&mut chars) {
                    let base = if which == 'x' { 38 } else { 48 };
                    out.push_str(&format!("\x1b[{base};5;{n}m"));
                } else {
                    out.push('@');
                    out.push(which);
                }
            }
            Some(c) if base_color(c).is_some() => {
                chars.next();
                let color = 30 + u16::from(base_color(c).unwrap_or(7));
                if c.is_ascii_uppercase() {
                    out.push_str(&format!("\x1b[1;{color}m"));
                } else {
                    out.push_str(&format!("\x1b[0;{color}m"));
                }
            }
            _ => out.push('@'),
        }
    }
    out
}

/// Removes all `@`-codes from `input`, leaving plain text.
#[must_use]
pub fn strip_codes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '@' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some('@') => {
                chars.next();
                out.push('@');
            }
            Some('.') => {
                chars.next();
            }
            Some('x') | Some('z') => {
                chars.next();
                let _ = take_xterm_number(&mut chars);
            }
            Some(c) if base_color(c).is_some() => {
                chars.next();
            }
            _ => out.push('@'),
        }
    }
    out
}

/// Removes ANSI escape sequences from `input`.
#[must_use]
pub fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != ESC {
            out.push(ch);
            continue;
        }
        // CSI sequence: ESC [ <params> <final byte in @..~>
        if chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        }
    }
    out
}

/// Converts ANSI SGR sequences back into `@`-codes.
///
/// Covers the sequences [`to_ansi`] emits plus the common mud output
/// forms (bare `ESC[m`, multi-parameter SGR with a leading bold).
/// Non-SGR escapes are dropped.
#[must_use]
pub fn ansi_to_codes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != ESC {
            if ch == '@' {
                out.push_str("@@");
            } else {
                out.push(ch);
            }
            continue;
        }
        if chars.peek() != Some(&'[') {
            continue;
        }
        chars.next();
        let mut params = String::new();
        let mut final_byte = ' ';
        for c in chars.by_ref() {
            if ('@'..='~').contains(&c) {
                final_byte = c;
                break;
            }
            params.push(c);
        }
        if final_byte != 'm' {
            continue;
        }
        out.push_str(&sgr_to_code(&params));
    }
    out
}

/// Translates one SGR parameter list into an `@`-code.
fn sgr_to_code(params: &str) -> String {
    let nums: Vec<u16> = params
        .split(';')
        .filter_map(|p| if p.is_empty() { Some(0) } else { p.parse().ok() })
        .collect();

    const LETTERS: [char; 8] = ['k', 'r', 'g', 'y', 'b', 'm', 'c', 'w'];

    match nums.as_slice() {
        [] | [0] => "@.".to_string(),
        [38, 5, n] => format!("@x{n}"),
        [48, 5, n] => format!("@z{n}"),
        _ => {
            let bold = nums.first() == Some(&1);
            if let Some(color) = nums.iter().find(|n| (30..=37).contains(*n)) {
                let letter = LETTERS[usize::from(color - 30)];
                if bold {
                    format!("@{}", letter.to_ascii_uppercase())
                } else {
                    format!("@{letter}")
                }
            } else {
                String::new()
            }
        }
    }
}

/// Returns `true` if the whole string is a sequence of valid color
/// codes (the grammar accepted for `color`-typed settings).
#[must_use]
pub fn is_valid_code(input: &str) -> bool {
    if input.is_empty() {
        return false;
    }
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '@' {
            return false;
        }
        match chars.next() {
            Some('.') => {}
            Some('x') | Some('z') => {
                if take_xterm_number(&mut chars).is_none() {
                    return false;
                }
            }
            Some(c) if base_color(c).is_some() => {}
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_ansi_basic() {
        assert_eq!(to_ansi("@rred@."), "\x1b[0;31mred\x1b[0m");
        assert_eq!(to_ansi("@Rbold"), "\x1b[1;31mbold");
    }

    #[test]
    fn to_ansi_xterm() {
        assert_eq!(to_ansi("@x123hi"), "\x1b[38;5;123mhi");
        assert_eq!(to_ansi("@z17bg"), "\x1b[48;5;17mbg");
    }

    #[test]
    fn literal_at_passes_through() {
        assert_eq!(to_ansi("a@@b"), "a@b");
        assert_eq!(strip_codes("a@@b"), "a@b");
    }

    #[test]
    fn unknown_code_is_preserved() {
        assert_eq!(to_ansi("mail@host"), "mail@host");
        assert_eq!(strip_codes("mail@host"), "mail@host");
    }

    #[test]
    fn strip_codes_removes_colors() {
        assert_eq!(strip_codes("@rred@. @x200x"), "red x");
    }

    #[test]
    fn strip_ansi_removes_sgr() {
        assert_eq!(strip_ansi("\x1b[0;31mred\x1b[0m plain"), "red plain");
    }

    #[test]
    fn ansi_round_trips_to_codes() {
        let ansi = to_ansi("@Ghello@. @x45there");
        assert_eq!(ansi_to_codes(&ansi), "@Ghello@. @x45there");
    }

    #[test]
    fn codes_validate() {
        assert!(is_valid_code("@r"));
        assert!(is_valid_code("@R@z200"));
        assert!(is_valid_code("@."));
        assert!(!is_valid_code(""));
        assert!(!is_valid_code("red"));
        assert!(!is_valid_code("@q"));
        assert!(!is_valid_code("@r "));
    }
}
