//! Line-based session scripts.
//!
//! ```text
//! # comment
//! press authority sprint_pressed
//! start replica-0 Action.Dash
//! stop authority Action.Sprint
//! tick 3
//! settle 50
//! join
//! show replica-1
//! expect running authority Action.Sprint
//! expect idle replica-0 Action.Dash
//! expect converged
//! ```

use anyhow::{Context, Result, anyhow, bail};

use action_core::{RequestKind, Tag};
use runtime::PeerId;

/// Upper bound for `settle` without an explicit limit.
pub const DEFAULT_SETTLE_TICKS: u64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    Running { peer: PeerId, action: Tag },
    Idle { peer: PeerId, action: Tag },
    /// Every peer holds the authority's tags.
    Converged,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Press { peer: PeerId, input: String },
    Dispatch {
        peer: PeerId,
        kind: RequestKind,
        action: Tag,
    },
    Tick(u64),
    Settle(u64),
    Join,
    Show(Option<PeerId>),
    Expect(Expectation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    /// 1-based line number in the source.
    pub line: usize,
    pub step: Step,
}

pub fn parse(source: &str) -> Result<Vec<ScriptLine>> {
    let mut steps = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = raw.split('#').next().unwrap_or_default().trim();
        if text.is_empty() {
            continue;
        }
        let step = parse_step(text).with_context(|| format!("line {}: `{}`", line, text))?;
        steps.push(ScriptLine { line, step });
    }
    Ok(steps)
}

fn parse_step(text: &str) -> Result<Step> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let step = match words.as_slice() {
        ["press", peer, input] => Step::Press {
            peer: peer.parse()?,
            input: input.to_string(),
        },
        [command @ ("start" | "stop"), peer, action] => Step::Dispatch {
            peer: peer.parse()?,
            kind: command.parse()?,
            action: Tag::new(action)?,
        },
        ["tick"] => Step::Tick(1),
        ["tick", count] => Step::Tick(count.parse().context("tick count")?),
        ["settle"] => Step::Settle(DEFAULT_SETTLE_TICKS),
        ["settle", max] => Step::Settle(max.parse().context("settle limit")?),
        ["join"] => Step::Join,
        ["show"] => Step::Show(None),
        ["show", peer] => Step::Show(Some(peer.parse()?)),
        ["expect", "converged"] => Step::Expect(Expectation::Converged),
        ["expect", "running", peer, action] => Step::Expect(Expectation::Running {
            peer: peer.parse()?,
            action: Tag::new(action)?,
        }),
        ["expect", "idle", peer, action] => Step::Expect(Expectation::Idle {
            peer: peer.parse()?,
            action: Tag::new(action)?,
        }),
        [command, ..] => bail!("unknown command `{}`", command),
        [] => return Err(anyhow!("empty line")),
    };
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command() {
        let source = "
# warm up
press authority sprint_pressed
start replica-0 Action.Dash   # forwarded
stop authority Action.Sprint
tick
tick 4
settle
settle 9
join
show
show replica-1
expect running authority Action.Sprint
expect idle replica-0 Action.Dash
expect converged
";
        let steps = parse(source).unwrap();
        assert_eq!(steps.len(), 13);
        assert_eq!(steps[0].line, 3);
        assert_eq!(
            steps[1].step,
            Step::Dispatch {
                peer: PeerId::Replica(0),
                kind: RequestKind::Start,
                action: Tag::new("Action.Dash").unwrap(),
            }
        );
        assert_eq!(steps[3].step, Step::Tick(1));
        assert_eq!(steps[5].step, Step::Settle(DEFAULT_SETTLE_TICKS));
        assert_eq!(steps[9].step, Step::Show(Some(PeerId::Replica(1))));
        assert_eq!(steps[12].step, Step::Expect(Expectation::Converged));
    }

    #[test]
    fn errors_name_the_line() {
        let err = parse("tick\nfly authority\n").unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));

        let err = parse("start authority Action..Dash").unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));

        assert!(parse("press server dash").is_err());
        assert!(parse("tick many").is_err());
    }
}
