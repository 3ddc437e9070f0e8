//! Resolves a [`Settings`] from parsed CLI matches, optionally overlaid on
//! a `yoyo.toml` config file. The layered ini-inheritance reader spec.md
//! §6 calls out as an external collaborator is out of scope; this reads
//! one flat TOML file and lets CLI flags override it, matching the
//! "resolved, flat settings object" framing of SPEC_FULL.md §2.

use yoyo_core::Settings;

const DEFAULT_CONFIG_FILE: &str = "yoyo.toml";

/// TOML-deserializable shape of `yoyo.toml`. Every field is optional; CLI
/// flags win whenever both are present.
#[derive(Debug, Default, serde::Deserialize)]
struct FileConfig {
    database_url: Option<String>,
    sources: Option<Vec<String>>,
    lock_timeout_seconds: Option<u64>,
    log_level: Option<String>,
}

/// Builds a [`Settings`] from `matches`, layering `yoyo.toml` underneath
/// explicit CLI flags unless `--no-config-file` is given.
pub fn resolve_settings(matches: &clap::ArgMatches) -> Settings {
    let mut settings = Settings::default();
    let no_config_file = matches.get_flag("no-config-file");

    if !no_config_file {
        if let Some(file_config) = read_config_file(DEFAULT_CONFIG_FILE) {
            if let Some(url) = file_config.database_url {
                settings.database_url = url;
            }
            if let Some(sources) = file_config.sources {
                settings.sources = sources;
            }
            if let Some(timeout) = file_config.lock_timeout_seconds {
                settings.lock_timeout_seconds = timeout;
            }
            if let Some(level) = file_config.log_level {
                settings.log_level = level;
            }
        }
    }
    settings.no_config_file = no_config_file;

    if let Some(url) = matches.get_one::<String>("database") {
        settings.database_url = url.clone();
    }
    if let Some(revision) = matches.get_one::<String>("revision") {
        settings.revision = Some(revision.clone());
    }

    settings.batch = matches.get_flag("batch");
    settings.prompt_password = matches.get_flag("prompt-password");

    let verbosity = matches.get_count("verbose") as i32 - matches.get_count("quiet") as i32;
    settings.verbosity = verbosity;
    settings.verbose = verbosity > 0;
    settings.log_level = match verbosity {
        v if v <= -1 => "error".to_string(),
        0 => settings.log_level,
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    if settings.prompt_password {
        settings.database_url = prompt_for_password(&settings.database_url);
    }

    settings
}

fn read_config_file(path: &str) -> Option<FileConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    toml::from_str(&contents).ok()
}

/// Prompts on stdin for a password and splices it into `url`'s userinfo,
/// replacing any existing one. Falls back to `url` unchanged if it cannot
/// be parsed.
fn prompt_for_password(url: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(url) else {
        return url.to_string();
    };

    print!("Password: ");
    use std::io::Write as _;
    std::io::stdout().flush().ok();
    let mut password = String::new();
    if std::io::stdin().read_line(&mut password).is_err() {
        return url.to_string();
    }

    if parsed.set_password(Some(password.trim())).is_err() {
        return url.to_string();
    }
    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_for_password_unparseable_url_unchanged() {
        assert_eq!(prompt_for_password("not a url"), "not a url");
    }
}
