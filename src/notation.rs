//! Wire notation: rows `A..G`, columns `a..g`.
//!
//! A chaos reply is a bare position; an order reply is `<from><to>`, with a
//! pass written as the last placed chip's position doubled; the referee
//! announces a chaos move as a colour digit followed by the position.

use crate::board::{ChaosMove, Colour, OrderMove, Position, BOARD_SIZE, NUM_COLOURS};

pub fn format_position(p: Position) -> String {
    let row = (b'A' + p.row() as u8) as char;
    let col = (b'a' + p.column() as u8) as char;
    format!("{row}{col}")
}

pub fn parse_position(s: &str) -> Option<Position> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let row = bytes[0].checked_sub(b'A')? as usize;
    let col = bytes[1].checked_sub(b'a')? as usize;
    if row >= BOARD_SIZE || col >= BOARD_SIZE {
        return None;
    }
    Some(Position::new(row, col))
}

pub fn parse_colour(s: &str) -> Option<Colour> {
    let [digit] = s.as_bytes() else {
        return None;
    };
    let colour = digit.checked_sub(b'0')?;
    (1..=NUM_COLOURS as Colour)
        .contains(&colour)
        .then_some(colour)
}

pub fn format_chaos_reply(m: ChaosMove) -> String {
    format_position(m.pos)
}

pub fn format_order_reply(m: OrderMove, last_placed: Position) -> String {
    match m {
        OrderMove::Pass => {
            let p = format_position(last_placed);
            format!("{p}{p}")
        }
        OrderMove::Slide { from, to } => {
            format!("{}{}", format_position(from), format_position(to))
        }
    }
}

/// `<colour><position>`, e.g. `5Cd`.
pub fn parse_chaos_announcement(s: &str) -> Option<ChaosMove> {
    if s.len() != 3 {
        return None;
    }
    let colour = parse_colour(&s[..1])?;
    let pos = parse_position(&s[1..])?;
    Some(ChaosMove { pos, colour })
}

/// `<from><to>`; identical halves mean a pass.
pub fn parse_order_reply(s: &str) -> Option<OrderMove> {
    if s.len() != 4 {
        return None;
    }
    let from = parse_position(&s[..2])?;
    let to = parse_position(&s[2..])?;
    Some(if from == to {
        OrderMove::Pass
    } else {
        OrderMove::Slide { from, to }
    })
}
