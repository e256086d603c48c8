//! Participant metadata entry before the window opens.

use anyhow::Result;
use facesearch_core::{Handedness, ParticipantInfo, Sex, Vision, validate_sub_id};
use std::fmt::Display;
use std::io::{self, BufRead, StdinLock, Stdout, Write};

const CANCEL: &str = ":q";

pub trait ParticipantPrompt {
    /// `Ok(None)` when the participant cancelled the form.
    fn ask(&mut self) -> Result<Option<ParticipantInfo>>;
}

/// Line-based form on a terminal.
pub struct TerminalPrompt<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl TerminalPrompt<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_answer(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{question}: ")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let answer = line.trim();
        if answer == CANCEL {
            return Ok(None);
        }
        Ok(Some(answer.to_string()))
    }

    fn free_text(&mut self, field: &str) -> io::Result<Option<String>> {
        self.read_answer(field)
    }

    fn sub_id(&mut self) -> io::Result<Option<String>> {
        loop {
            let Some(answer) = self.read_answer("sub_id")? else {
                return Ok(None);
            };
            match validate_sub_id(&answer) {
                Ok(()) => return Ok(Some(answer)),
                Err(err) => writeln!(self.output, "  {err}")?,
            }
        }
    }

    fn choose<T: Copy + Display>(&mut self, field: &str, options: &[T]) -> io::Result<Option<T>> {
        let listing = options
            .iter()
            .enumerate()
            .map(|(i, o)| format!("{}) {o}", i + 1))
            .collect::<Vec<_>>()
            .join("  ");
        loop {
            let Some(answer) = self.read_answer(&format!("{field} [{listing}]"))? else {
                return Ok(None);
            };
            if let Some(choice) = pick(&answer, options) {
                return Ok(Some(choice));
            }
            writeln!(self.output, "  Please enter one of: {listing}")?;
        }
    }
}

/// Matches an answer against the option number or its label.
fn pick<T: Copy + Display>(answer: &str, options: &[T]) -> Option<T> {
    if let Ok(n) = answer.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| options.get(i)).copied();
    }
    options
        .iter()
        .find(|o| o.to_string().eq_ignore_ascii_case(answer))
        .copied()
}

impl<R: BufRead, W: Write> ParticipantPrompt for TerminalPrompt<R, W> {
    fn ask(&mut self) -> Result<Option<ParticipantInfo>> {
        writeln!(
            self.output,
            "Participant information (enter '{CANCEL}' to cancel)"
        )?;
        let Some(age) = self.free_text("age")? else {
            return Ok(None);
        };
        let Some(sex) = self.choose("sex", &Sex::ALL)? else {
            return Ok(None);
        };
        let Some(sub_id) = self.sub_id()? else {
            return Ok(None);
        };
        let Some(vision) = self.choose("vision", &Vision::ALL)? else {
            return Ok(None);
        };
        let Some(handedness) = self.choose("handedness", &Handedness::ALL)? else {
            return Ok(None);
        };
        Ok(Some(ParticipantInfo::new(
            sub_id, age, sex, vision, handedness,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(input: &str) -> (Option<ParticipantInfo>, String) {
        let mut out = Vec::new();
        let info = TerminalPrompt::new(Cursor::new(input.as_bytes()), &mut out)
            .ask()
            .unwrap();
        (info, String::from_utf8(out).unwrap())
    }

    #[test]
    fn accepts_numbers_and_names() {
        let (info, _) = run("31\n1\n007\nCorrected-To-Normal\nright\n");
        let info = info.unwrap();
        assert_eq!(info.age, "31");
        assert_eq!(info.sex, Sex::Male);
        assert_eq!(info.sub_id, "007");
        assert_eq!(info.vision, Vision::CorrectedToNormal);
        assert_eq!(info.handedness, Handedness::Right);
    }

    #[test]
    fn invalid_answers_are_asked_again() {
        let (info, out) = run("22\n3\nother\nfemale\n../x\n12\n2\n1\n");
        let info = info.unwrap();
        assert_eq!(info.sex, Sex::Female);
        assert_eq!(info.sub_id, "12");
        assert_eq!(info.vision, Vision::CorrectedToNormal);
        assert_eq!(info.handedness, Handedness::Left);
        assert_eq!(out.matches("Please enter one of").count(), 2);
    }

    #[test]
    fn cancel_and_end_of_input_yield_none() {
        assert!(run("25\n:q\n").0.is_none());
        assert!(run("25\n2\n").0.is_none());
        assert!(run("").0.is_none());
    }

    #[test]
    fn option_numbers_are_one_based() {
        assert_eq!(pick("0", &Sex::ALL), None);
        assert_eq!(pick("2", &Sex::ALL), Some(Sex::Female));
        assert_eq!(pick("3", &Sex::ALL), None);
    }
}
