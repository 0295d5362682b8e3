use anyhow::{bail, Context, Result};
use midikbd_keymap::{COLS, ROWS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Press,
    Release,
}

/// One scripted switch change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub at_ms: u32,
    pub action: Action,
    pub row: usize,
    pub col: usize,
}

/// Parse a key script: one `<tick_ms> press|release <row> <col>` per line.
///
/// Blank lines and everything after `#` are ignored. Ticks must not go
/// backwards.
pub fn parse_script(input: &str) -> Result<Vec<Step>> {
    let mut steps: Vec<Step> = Vec::new();

    for (line_num, line) in input.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let &[at, action, row, col] = fields.as_slice() else {
            bail!(
                "line {}: expected `<tick_ms> press|release <row> <col>`, got {} fields",
                line_num + 1,
                fields.len()
            );
        };

        let at_ms: u32 = at
            .parse()
            .with_context(|| format!("line {}: invalid tick {:?}", line_num + 1, at))?;
        let action = match action {
            "press" => Action::Press,
            "release" => Action::Release,
            other => bail!("line {}: unknown action {:?}", line_num + 1, other),
        };
        let row = parse_coord(row, ROWS).with_context(|| format!("line {}: row", line_num + 1))?;
        let col = parse_coord(col, COLS).with_context(|| format!("line {}: column", line_num + 1))?;

        if let Some(last) = steps.last() {
            if at_ms < last.at_ms {
                bail!(
                    "line {}: tick {} goes back before {}",
                    line_num + 1,
                    at_ms,
                    last.at_ms
                );
            }
        }

        steps.push(Step {
            at_ms,
            action,
            row,
            col,
        });
    }

    Ok(steps)
}

fn parse_coord(field: &str, limit: usize) -> Result<usize> {
    let value: usize = field
        .parse()
        .with_context(|| format!("invalid number {:?}", field))?;
    if value >= limit {
        bail!("{} out of range 0..{}", value, limit);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let script = "# C4 for a while\n\
                      0 press 1 4\n\
                      \n\
                      100 release 1 4   # let go\n";
        let steps = parse_script(script).unwrap();
        assert_eq!(
            steps,
            vec![
                Step {
                    at_ms: 0,
                    action: Action::Press,
                    row: 1,
                    col: 4
                },
                Step {
                    at_ms: 100,
                    action: Action::Release,
                    row: 1,
                    col: 4
                },
            ]
        );
    }

    #[test]
    fn test_bad_action() {
        let err = parse_script("0 hold 1 1").unwrap_err();
        assert!(err.to_string().contains("unknown action"));
    }

    #[test]
    fn test_out_of_range() {
        assert!(parse_script("0 press 8 0").is_err());
        assert!(parse_script("0 press 0 8").is_err());
        assert!(parse_script("0 press -1 0").is_err());
    }

    #[test]
    fn test_ticks_go_backwards() {
        assert!(parse_script("50 press 0 0\n10 release 0 0").is_err());
    }

    #[test]
    fn test_wrong_field_count() {
        assert!(parse_script("0 press 1").is_err());
        assert!(parse_script("0 press 1 2 3").is_err());
    }
}
