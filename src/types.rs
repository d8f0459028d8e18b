use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// What happens to running tasks when a run is cancelled.
///
/// In both cases no new task is dispatched and every task that has not
/// started yet ends up `Cancelled`.
///
/// - `Drain`: let running task bodies finish and record their outcomes
///   (default behaviour).
/// - `Abort`: abort running task bodies and mark them `Cancelled` right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CancelPolicy {
    #[default]
    Drain,
    Abort,
}

impl FromStr for CancelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drain" => Ok(CancelPolicy::Drain),
            "abort" => Ok(CancelPolicy::Abort),
            other => Err(format!(
                "invalid cancel_policy: {other} (expected \"drain\" or \"abort\")"
            )),
        }
    }
}

/// Parse a duration string like `"500ms"`, `"3s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit: u64 = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is out of range"))
}
