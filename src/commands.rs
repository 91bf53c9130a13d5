use crate::error::{DeskError, Result};
use crate::query::SortSpec;
use std::path::PathBuf;

/// One line of input to the interactive shell. `pos` arguments address
/// rows of the current view, starting at 1.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Load(PathBuf),
    View(Option<usize>),
    Groups,
    Search(String),
    Filter { column: String, values: Vec<String> },
    HasValue(String),
    Unfilter(String),
    ClearFilters,
    Sort(Option<SortSpec>),
    ChangedOnly(bool),
    Set { pos: usize, column: String, value: String },
    Fill { column: String, value: String },
    Delete(usize),
    Undo,
    Upload(Vec<PathBuf>),
    Image(usize),
    Values(String),
    Counts { column: String, limit: Option<usize> },
    Help,
    Quit,
}

pub const HELP: &str = "Commands:
  load <file.xlsx|csv|json>   Load a grid
  view [n]                    Show the first n rows of the view
  groups                      Show column groups
  search <text|column:text>   Search rows (empty clears)
  filter <column>=<a>|<b>     Keep rows whose column is one of the values
  has <column>                Toggle the non-empty filter for a column
  unfilter <column>           Drop the filter for a column
  clear                       Drop every filter
  sort <column> [desc]        Sort the view
  unsort                      Restore load order
  changed on|off              Only show changed rows
  set <pos> <column>=<value>  Edit a cell of the view row at pos
  fill <column>=<value>       Edit a column on every filtered row
  delete <pos>                Delete the view row at pos
  undo                        Undo the last edit
  upload <dir|file>...        Upload image files
  image <pos>                 Resolve the image of the view row at pos
  values <column>             List distinct values of a column
  counts <column> [n]         Show the n most frequent values in the view
  q                           Quit";

fn invalid(message: impl Into<String>) -> DeskError {
    DeskError::InvalidCommand(message.into())
}

fn position(arg: &str) -> Result<usize> {
    match arg.trim().parse::<usize>() {
        Ok(pos) if pos > 0 => Ok(pos),
        _ => Err(invalid(format!("expected a row position, got {:?}", arg))),
    }
}

fn assignment(arg: &str) -> Result<(String, String)> {
    let (column, value) = arg
        .split_once('=')
        .ok_or_else(|| invalid("expected <column>=<value>"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(invalid("missing column"));
    }
    Ok((column.to_string(), value.trim().to_string()))
}

fn required<'a>(arg: &'a str, what: &str) -> Result<&'a str> {
    let arg = arg.trim();
    if arg.is_empty() {
        Err(invalid(format!("missing {}", what)))
    } else {
        Ok(arg)
    }
}

impl Command {
    pub fn parse(line: &str) -> Result<Command> {
        let line = line.trim();
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));

        match word {
            "load" => Ok(Command::Load(PathBuf::from(required(rest, "file")?))),
            "view" => match rest.trim() {
                "" => Ok(Command::View(None)),
                n => Ok(Command::View(Some(position(n)?))),
            },
            "groups" => Ok(Command::Groups),
            "search" => Ok(Command::Search(rest.trim().to_string())),
            "filter" => {
                let (column, values) = assignment(rest)?;
                let values = values
                    .split('|')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                Ok(Command::Filter { column, values })
            }
            "has" => Ok(Command::HasValue(required(rest, "column")?.to_string())),
            "unfilter" => Ok(Command::Unfilter(required(rest, "column")?.to_string())),
            "clear" => Ok(Command::ClearFilters),
            "sort" => {
                let rest = required(rest, "column")?;
                let spec = match rest.rsplit_once(' ') {
                    Some((column, "desc")) => SortSpec::descending(column.trim()),
                    Some((column, "asc")) => SortSpec::ascending(column.trim()),
                    _ => SortSpec::ascending(rest),
                };
                Ok(Command::Sort(Some(spec)))
            }
            "unsort" => Ok(Command::Sort(None)),
            "changed" => match rest.trim() {
                "on" => Ok(Command::ChangedOnly(true)),
                "off" => Ok(Command::ChangedOnly(false)),
                other => Err(invalid(format!("expected on or off, got {:?}", other))),
            },
            "set" => {
                let (pos, assign) = required(rest, "position")?
                    .split_once(' ')
                    .ok_or_else(|| invalid("expected set <pos> <column>=<value>"))?;
                let (column, value) = assignment(assign)?;
                Ok(Command::Set {
                    pos: position(pos)?,
                    column,
                    value,
                })
            }
            "fill" => {
                let (column, value) = assignment(rest)?;
                Ok(Command::Fill { column, value })
            }
            "delete" => Ok(Command::Delete(position(rest)?)),
            "undo" => Ok(Command::Undo),
            "upload" => {
                let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
                if paths.is_empty() {
                    return Err(invalid("missing files"));
                }
                Ok(Command::Upload(paths))
            }
            "image" => Ok(Command::Image(position(rest)?)),
            "values" => Ok(Command::Values(required(rest, "column")?.to_string())),
            "counts" => {
                let rest = required(rest, "column")?;
                match rest.rsplit_once(' ') {
                    Some((column, n)) if n.parse::<usize>().is_ok() => Ok(Command::Counts {
                        column: column.trim().to_string(),
                        limit: Some(position(n)?),
                    }),
                    _ => Ok(Command::Counts {
                        column: rest.to_string(),
                        limit: None,
                    }),
                }
            }
            "help" => Ok(Command::Help),
            "q" | "quit" => Ok(Command::Quit),
            "" => Err(invalid("empty command")),
            other => Err(invalid(format!("unknown command {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filters_with_spaces_in_column() {
        assert_eq!(
            Command::parse("filter Product Type = Soap | Gel").unwrap(),
            Command::Filter {
                column: "Product Type".into(),
                values: vec!["Soap".into(), "Gel".into()],
            }
        );
    }

    #[test]
    fn parses_sort_direction() {
        assert_eq!(
            Command::parse("sort Unit Price desc").unwrap(),
            Command::Sort(Some(SortSpec::descending("Unit Price")))
        );
        assert_eq!(
            Command::parse("sort Price").unwrap(),
            Command::Sort(Some(SortSpec::ascending("Price")))
        );
        assert_eq!(Command::parse("unsort").unwrap(), Command::Sort(None));
    }

    #[test]
    fn parses_set_and_rejects_bad_positions() {
        assert_eq!(
            Command::parse("set 3 Brand=Acme Co").unwrap(),
            Command::Set {
                pos: 3,
                column: "Brand".into(),
                value: "Acme Co".into(),
            }
        );
        assert!(Command::parse("set 0 Brand=x").is_err());
        assert!(Command::parse("delete two").is_err());
    }

    #[test]
    fn parses_counts_with_optional_limit() {
        assert_eq!(
            Command::parse("counts Product Type 5").unwrap(),
            Command::Counts {
                column: "Product Type".into(),
                limit: Some(5),
            }
        );
        assert_eq!(
            Command::parse("counts Brand").unwrap(),
            Command::Counts {
                column: "Brand".into(),
                limit: None,
            }
        );
        assert!(Command::parse("counts Brand 0").is_err());
    }

    #[test]
    fn search_keeps_colon_syntax() {
        assert_eq!(
            Command::parse("search Brand:aceb").unwrap(),
            Command::Search("Brand:aceb".into())
        );
        assert_eq!(Command::parse("search").unwrap(), Command::Search(String::new()));
    }

    #[test]
    fn unknown_and_empty_commands_fail() {
        assert!(matches!(
            Command::parse("frobnicate"),
            Err(DeskError::InvalidCommand(_))
        ));
        assert!(Command::parse("   ").is_err());
        assert!(Command::parse("upload").is_err());
    }
}
