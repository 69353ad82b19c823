use std::fmt;

use quiz_core::model::{OptionId, QuizMode};

/// One line typed at the quiz prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Start(QuizMode),
    DrawAgain,
    /// Pick for a single-choice question, or the full selection for a
    /// multiple-choice one.
    Answer(Vec<OptionId>),
    Toggle(OptionId),
    Confirm,
    Next,
    Prev,
    GoTo(usize),
    Show,
    Submit,
    Exit,
    Stats,
    Reload,
    Push(String),
    /// Flag the current question as wrong (remote only).
    Report(String),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    Empty,
    Unknown(String),
    MissingArgument(&'static str),
    InvalidOption(String),
    InvalidIndex(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Empty => write!(f, "empty command"),
            InputError::Unknown(cmd) => write!(f, "unknown command: {cmd} (try `help`)"),
            InputError::MissingArgument(cmd) => write!(f, "{cmd} needs an argument"),
            InputError::InvalidOption(raw) => write!(f, "not an option letter: {raw}"),
            InputError::InvalidIndex(raw) => write!(f, "not a question number: {raw}"),
        }
    }
}

impl std::error::Error for InputError {}

pub const HELP: &str = "\
commands:
  practice | exam | mistakes | instant   start a mode
  again                                  draw another instant question
  a <letters>                            answer, e.g. `a B` or `a A,C`
  t <letter>                             toggle a multiple-choice option
  c                                      confirm a multiple-choice selection
  n | p | g <number>                     next, previous, go to question
  show | stats | submit | exit
  reload                                 fetch the bank again
  push <json>                            apply a bank push message
  report <text>                          report an error in the current question
  quit";

fn parse_letters(raw: &str) -> Result<Vec<OptionId>, InputError> {
    let letters: Vec<OptionId> = raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| OptionId::parse(s).map_err(|_| InputError::InvalidOption(s.to_string())))
        .collect::<Result<_, _>>()?;
    if letters.is_empty() {
        return Err(InputError::MissingArgument("a"));
    }
    Ok(letters)
}

impl Input {
    pub fn parse(line: &str) -> Result<Self, InputError> {
        let line = line.trim();
        let (cmd, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(cmd, rest)| (cmd, rest.trim()));

        let input = match cmd.to_ascii_lowercase().as_str() {
            "" => return Err(InputError::Empty),
            "practice" | "exam" | "mistakes" | "instant" => {
                let mode = QuizMode::parse(&cmd.to_ascii_lowercase())
                    .map_err(|_| InputError::Unknown(cmd.to_string()))?;
                Input::Start(mode)
            }
            "again" => Input::DrawAgain,
            "a" | "answer" => Input::Answer(parse_letters(rest)?),
            "t" | "toggle" => {
                if rest.is_empty() {
                    return Err(InputError::MissingArgument("t"));
                }
                let option =
                    OptionId::parse(rest).map_err(|_| InputError::InvalidOption(rest.to_string()))?;
                Input::Toggle(option)
            }
            "c" | "confirm" => Input::Confirm,
            "n" | "next" => Input::Next,
            "p" | "prev" => Input::Prev,
            "g" | "go" => {
                let number: usize = rest
                    .parse()
                    .map_err(|_| InputError::InvalidIndex(rest.to_string()))?;
                // Shown 1-based.
                let index = number
                    .checked_sub(1)
                    .ok_or_else(|| InputError::InvalidIndex(rest.to_string()))?;
                Input::GoTo(index)
            }
            "show" => Input::Show,
            "submit" => Input::Submit,
            "exit" => Input::Exit,
            "stats" => Input::Stats,
            "reload" => Input::Reload,
            "push" => {
                if rest.is_empty() {
                    return Err(InputError::MissingArgument("push"));
                }
                Input::Push(rest.to_string())
            }
            "report" => {
                if rest.is_empty() {
                    return Err(InputError::MissingArgument("report"));
                }
                Input::Report(rest.to_string())
            }
            "help" | "?" => Input::Help,
            "quit" | "q" => Input::Quit,
            _ => return Err(InputError::Unknown(cmd.to_string())),
        };
        Ok(input)
    }
}
