use clap::{Parser, Subcommand};
use task_core::config::ConfigOverrides;
use task_core::model::canonical_key;

#[derive(Parser, Debug)]
#[command(author, version, about = "Manage tasks stored in MongoDB", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Override configuration values (format KEY=VALUE)
    ///
    /// Keys: mongodb_uri, database, collection, theme
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Open the interactive menu (default)
    ///
    /// Example: taskmgr menu
    Menu,
    /// Connect to MongoDB, create indexes and report readiness
    ///
    /// Example: taskmgr setup
    Setup,
}

impl Cli {
    pub fn selected_command(&self) -> Command {
        self.command.unwrap_or(Command::Menu)
    }

    pub fn overrides(&self) -> Result<ConfigOverrides, String> {
        build_overrides(&self.config_override)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    MongodbUri,
    Database,
    Collection,
    Theme,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let field = canonical_key(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match field.as_str() {
        "mongodb_uri" | "mongo_uri" | "uri" => ConfigOverrideTarget::MongodbUri,
        "database" | "db" | "db_name" => ConfigOverrideTarget::Database,
        "collection" => ConfigOverrideTarget::Collection,
        "theme" => ConfigOverrideTarget::Theme,
        other => return Err(format!("unknown config field '{other}'")),
    };

    if value.is_empty() {
        return Err(format!("{field} override requires a value"));
    }

    Ok(ParsedConfigOverride { target, value })
}

/// Later overrides of the same key replace earlier ones.
pub fn build_overrides<S: AsRef<str>>(raw: &[S]) -> Result<ConfigOverrides, String> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry.as_ref())?;
        let slot = match parsed.target {
            ConfigOverrideTarget::MongodbUri => &mut overrides.mongodb_uri,
            ConfigOverrideTarget::Database => &mut overrides.database,
            ConfigOverrideTarget::Collection => &mut overrides.collection,
            ConfigOverrideTarget::Theme => &mut overrides.theme,
        };
        *slot = Some(parsed.value);
    }
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, ConfigOverrideTarget, build_overrides, parse_config_override};
    use clap::Parser;

    #[test]
    fn parse_config_override_canonicalizes_field_names() {
        let parsed = parse_config_override(" MongoDB-URI = mongodb://db:27017 ").unwrap();

        assert_eq!(parsed.target, ConfigOverrideTarget::MongodbUri);
        assert_eq!(parsed.value, "mongodb://db:27017");
    }

    #[test]
    fn parse_config_override_keeps_equals_in_value() {
        let parsed =
            parse_config_override("mongodb_uri=mongodb://db/?serverSelectionTimeoutMS=500")
                .unwrap();

        assert_eq!(parsed.value, "mongodb://db/?serverSelectionTimeoutMS=500");
    }

    #[test]
    fn parse_config_override_rejects_unknown_fields() {
        let err = parse_config_override("unknown.field=value").unwrap_err();
        assert!(err.contains("unknown config field"));
    }

    #[test]
    fn parse_config_override_rejects_missing_equals() {
        let err = parse_config_override("database").unwrap_err();
        assert!(err.contains("KEY=VALUE"));
    }

    #[test]
    fn parse_config_override_rejects_empty_value() {
        let err = parse_config_override("collection=  ").unwrap_err();
        assert!(err.contains("requires a value"));
    }

    #[test]
    fn build_overrides_last_value_wins() {
        let overrides = build_overrides(&["db=first", "theme=noir", "database=second"]).unwrap();

        assert_eq!(overrides.database.as_deref(), Some("second"));
        assert_eq!(overrides.theme.as_deref(), Some("noir"));
        assert_eq!(overrides.mongodb_uri, None);
    }

    #[test]
    fn missing_subcommand_defaults_to_menu() {
        let cli = Cli::try_parse_from(["taskmgr"]).unwrap();
        assert_eq!(cli.selected_command(), Command::Menu);

        let cli =
            Cli::try_parse_from(["taskmgr", "setup", "--config-override", "db=work"]).unwrap();
        assert_eq!(cli.selected_command(), Command::Setup);
        assert_eq!(cli.config_override, vec!["db=work"]);
    }
}
