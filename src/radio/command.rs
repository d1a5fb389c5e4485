use common::RadioMode;

use super::interval::AdvInterval;

/// A control command the radio controller acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetMode(RadioMode),
    SetInterval(AdvInterval),
}

/// Parse control text: `idle`, `scan`, `adv` or `int <ms>`.
///
/// Anything else yields `None`; unknown text is not an error.
pub fn parse(text: &str) -> Option<Command> {
    let mut tokens = text.split_whitespace();
    let head = tokens.next()?;

    if head == "int" {
        let arg = tokens.next()?;
        if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        // only digits, so the parse can fail on overflow alone
        let ms = arg.parse::<u64>().unwrap_or(u64::MAX);
        return Some(Command::SetInterval(AdvInterval::from_ms_clamped(ms)));
    }

    RadioMode::from_name(head).map(Command::SetMode)
}
