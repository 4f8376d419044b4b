use std::path::PathBuf;

pub const DEFAULT_CONFIG: &str = "pgctx.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Validate,
    Sql,
    Fetch,
    Fields,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Validate(ValidateArgs),
    Sql(SqlArgs),
    Fetch(FetchArgs),
    Fields(FieldsArgs),
}

/// Options every command accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonArgs {
    pub config: PathBuf,
    pub database: Option<String>,
}

impl Default for CommonArgs {
    fn default() -> Self {
        Self {
            config: PathBuf::from(DEFAULT_CONFIG),
            database: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidateArgs {
    pub common: CommonArgs,
    /// Validate one context; all file-backed profiles otherwise.
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SqlArgs {
    pub common: CommonArgs,
    pub context: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchArgs {
    pub common: CommonArgs,
    pub context: String,
    pub id: String,
    pub compact: bool,
}

#[derive(Debug, Clone)]
pub struct FieldsArgs {
    pub common: CommonArgs,
    pub context: String,
    pub json: bool,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1).map(|s| s.as_str());
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    let (topic, parsed) = match first {
        "-h" | "--help" | "help" => return Ok(Command::Help(HelpTopic::Root)),
        "validate" => (HelpTopic::Validate, parse_tokens(it)?),
        "sql" => (HelpTopic::Sql, parse_tokens(it)?),
        "fetch" => (HelpTopic::Fetch, parse_tokens(it)?),
        "fields" => (HelpTopic::Fields, parse_tokens(it)?),
        _ => anyhow::bail!("unknown command: {first}"),
    };

    if parsed.help {
        return Ok(Command::Help(topic));
    }
    parsed.into_command(topic)
}

/// Flags and positionals shared by all commands; each command then checks
/// which of them it accepts.
#[derive(Debug, Default)]
struct Parsed {
    common: CommonArgs,
    help: bool,
    id: Option<String>,
    compact: bool,
    json: bool,
    positionals: Vec<String>,
}

fn parse_tokens<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Parsed> {
    let mut parsed = Parsed::default();

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => parsed.help = true,
            "--config" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--config requires a value");
                };
                parsed.common.config = PathBuf::from(v);
            }
            _ if token.starts_with("--config=") => {
                parsed.common.config = PathBuf::from(token.trim_start_matches("--config="));
            }
            "--database" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--database requires a value");
                };
                parsed.common.database = Some(v.to_string());
            }
            _ if token.starts_with("--database=") => {
                parsed.common.database = Some(token.trim_start_matches("--database=").to_string());
            }
            "--id" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--id requires a value");
                };
                parsed.id = Some(v.to_string());
            }
            _ if token.starts_with("--id=") => {
                parsed.id = Some(token.trim_start_matches("--id=").to_string());
            }
            "--compact" => parsed.compact = true,
            "--json" => parsed.json = true,
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            other => parsed.positionals.push(other.to_string()),
        }
    }

    Ok(parsed)
}

impl Parsed {
    fn into_command(self, topic: HelpTopic) -> anyhow::Result<Command> {
        let Parsed {
            common,
            id,
            compact,
            json,
            mut positionals,
            ..
        } = self;

        if compact && topic != HelpTopic::Fetch {
            anyhow::bail!("--compact is only valid for `pgctx fetch`");
        }
        if json && topic != HelpTopic::Fields {
            anyhow::bail!("--json is only valid for `pgctx fields`");
        }

        match topic {
            HelpTopic::Validate => {
                if id.is_some() {
                    anyhow::bail!("--id is not valid for `pgctx validate`");
                }
                if positionals.len() > 1 {
                    anyhow::bail!("unexpected positional argument: {}", positionals[1]);
                }
                Ok(Command::Validate(ValidateArgs {
                    common,
                    context: positionals.pop(),
                }))
            }
            HelpTopic::Sql => {
                let context = single_context(positionals, "pgctx sql <CONTEXT>")?;
                Ok(Command::Sql(SqlArgs {
                    common,
                    context,
                    id,
                }))
            }
            HelpTopic::Fetch => {
                if positionals.len() > 2 {
                    anyhow::bail!("unexpected positional argument: {}", positionals[2]);
                }
                let mut positionals = positionals.into_iter();
                let Some(context) = positionals.next() else {
                    anyhow::bail!("missing context: usage `pgctx fetch <CONTEXT> <ID>`");
                };
                let id = match (positionals.next(), id) {
                    (Some(_), Some(_)) => anyhow::bail!("pass the id either positionally or with --id"),
                    (Some(id), None) | (None, Some(id)) => id,
                    (None, None) => anyhow::bail!("missing id: usage `pgctx fetch <CONTEXT> <ID>`"),
                };
                Ok(Command::Fetch(FetchArgs {
                    common,
                    context,
                    id,
                    compact,
                }))
            }
            HelpTopic::Fields => {
                if id.is_some() {
                    anyhow::bail!("--id is not valid for `pgctx fields`");
                }
                let context = single_context(positionals, "pgctx fields <CONTEXT>")?;
                Ok(Command::Fields(FieldsArgs {
                    common,
                    context,
                    json,
                }))
            }
            HelpTopic::Root => Ok(Command::Help(HelpTopic::Root)),
        }
    }
}

fn single_context(positionals: Vec<String>, usage: &str) -> anyhow::Result<String> {
    let mut positionals = positionals.into_iter();
    let Some(context) = positionals.next() else {
        anyhow::bail!("missing context: usage `{usage}`");
    };
    if let Some(extra) = positionals.next() {
        anyhow::bail!("unexpected positional argument: {extra}");
    }
    Ok(context)
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
pgctx - inspect and run context profiles

USAGE:
  pgctx <COMMAND> [OPTIONS]

COMMANDS:
  validate      Check profiles against the schema catalog and join limits
  sql           Print the SQL built for a custom-join profile
  fetch         Fetch and print the shaped data of one entity
  fields        Print the field tree a profile exposes

GLOBAL OPTIONS:
  --config <FILE>       Config file path (default: pgctx.toml)
  --database <URL>      Override database.url from config
  -h, --help            Print help

Run `pgctx <command> --help` for more."
            );
        }
        HelpTopic::Validate => {
            println!(
                "\
USAGE:
  pgctx validate [CONTEXT] [OPTIONS]

Validates CONTEXT, or every profile of a file-backed profile set.

OPTIONS:
  --config <FILE>       Config file path (default: pgctx.toml)
  --database <URL>      Override database.url from config
  -h, --help            Print help"
            );
        }
        HelpTopic::Sql => {
            println!(
                "\
USAGE:
  pgctx sql <CONTEXT> [OPTIONS]

Prints the generated statement and checks that it parses as a single SELECT.

OPTIONS:
  --id <ID>             Root id shown as the bound parameter
  --config <FILE>       Config file path (default: pgctx.toml)
  --database <URL>      Override database.url from config
  -h, --help            Print help"
            );
        }
        HelpTopic::Fetch => {
            println!(
                "\
USAGE:
  pgctx fetch <CONTEXT> <ID> [OPTIONS]

Prints the shaped object as JSON. Ctrl-C cancels the running query.

OPTIONS:
  --compact             Print JSON on one line
  --config <FILE>       Config file path (default: pgctx.toml)
  --database <URL>      Override database.url from config
  -h, --help            Print help"
            );
        }
        HelpTopic::Fields => {
            println!(
                "\
USAGE:
  pgctx fields <CONTEXT> [OPTIONS]

OPTIONS:
  --json                Print the tree as JSON instead of a table
  --config <FILE>       Config file path (default: pgctx.toml)
  --database <URL>      Override database.url from config
  -h, --help            Print help"
            );
        }
    }
}
