//! Console protocol against a tournament referee on stdin/stdout.
//!
//! The first token decides our role: `Start` seats us as Chaos, anything
//! else must be the first chaos announcement and seats us as Order. Every
//! reply is flushed immediately; the referee's clock is running.

use std::io::{self, BufRead, Write};

use crate::board::{ChaosMove, BOARD_AREA};
use crate::maker::MoveMaker;
use crate::notation;

pub fn run_console_game(
    maker: &mut MoveMaker,
    input: impl BufRead,
    output: impl Write,
) -> io::Result<()> {
    let mut tokens = Tokens::new(input);
    let first = tokens.next()?;
    if first == "Start" {
        play_as_chaos(maker, &mut tokens, output)
    } else {
        let m = notation::parse_chaos_announcement(&first).ok_or_else(|| invalid(&first))?;
        play_as_order(maker, m, &mut tokens, output)
    }
}

fn play_as_chaos(
    maker: &mut MoveMaker,
    tokens: &mut Tokens<impl BufRead>,
    mut output: impl Write,
) -> io::Result<()> {
    for round in 0..BOARD_AREA {
        if round > 0 {
            let token = tokens.next()?;
            let m = notation::parse_order_reply(&token).ok_or_else(|| invalid(&token))?;
            maker.register_order_move(m);
        }
        let token = tokens.next()?;
        let colour = notation::parse_colour(&token).ok_or_else(|| invalid(&token))?;
        let m = maker.suggest_chaos_move(colour);
        log::debug!("round {round}: drew {colour}, placing at {}", notation::format_position(m.pos));
        writeln!(output, "{}", notation::format_chaos_reply(m))?;
        output.flush()?;
        maker.register_chaos_move(m);
    }
    Ok(())
}

fn play_as_order(
    maker: &mut MoveMaker,
    first: ChaosMove,
    tokens: &mut Tokens<impl BufRead>,
    mut output: impl Write,
) -> io::Result<()> {
    let mut announced = first;
    for round in 0..BOARD_AREA {
        if round > 0 {
            let token = tokens.next()?;
            announced =
                notation::parse_chaos_announcement(&token).ok_or_else(|| invalid(&token))?;
        }
        maker.register_chaos_move(announced);
        let m = maker.suggest_order_move();
        log::debug!("round {round}: answering {m:?}");
        writeln!(output, "{}", notation::format_order_reply(m, announced.pos))?;
        output.flush()?;
        maker.register_order_move(m);
    }
    Ok(())
}

fn invalid(token: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("unrecognised referee message: {token:?}"),
    )
}

struct Tokens<R> {
    input: R,
    pending: Vec<String>,
}

impl<R: BufRead> Tokens<R> {
    fn new(input: R) -> Self {
        Tokens {
            input,
            pending: Vec::new(),
        }
    }

    fn next(&mut self) -> io::Result<String> {
        loop {
            if let Some(token) = self.pending.pop() {
                return Ok(token);
            }
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "referee stream closed",
                ));
            }
            self.pending
                .extend(line.split_whitespace().rev().map(str::to_owned));
        }
    }
}
