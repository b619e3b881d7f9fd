//! Config command - View and manage Syncward configuration
//!
//! Provides the `syncward config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Writes a default configuration file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use syncward_core::config::Config;
use tracing::info;

use super::CliContext;
use crate::output::get_formatter;

const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("sessions.file", "Session collection file"),
    ("scheduler.schedule_check_secs", "Seconds between schedule checks (1-60)"),
    ("scheduler.wifi_poll_secs", "Seconds between WiFi samples"),
    ("executor.rsync_binary", "rsync executable"),
    ("executor.password_env", "Environment variable carrying the password"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.format", "pretty|json"),
    ("logging.audit_dir", "Sync log directory"),
    ("logging.max_size_mb", "Max sync log file size (MiB)"),
    ("logging.max_files", "Max rotated sync log files"),
];

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "scheduler.wifi_poll_secs")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value),
            ConfigCommand::Validate => self.execute_validate(ctx),
            ConfigCommand::Init { force } => self.execute_init(ctx, *force),
        }
    }

    fn execute_show(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.config();

        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.format.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    fn execute_set(&self, ctx: &CliContext, key: &str, value: &str) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let mut config = ctx.config();

        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("");
                formatter.info("Supported keys:");
                for (key, help) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {:<36} - {}", key, help));
                }
            }
            return Ok(());
        }

        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "errors": messages,
                }));
            } else {
                formatter.error(&format!("Invalid value for '{}': {}", key, messages.join("; ")));
            }
            return Ok(());
        }

        config
            .save(&ctx.config_path)
            .context("Failed to write configuration file")?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": ctx.config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {} = {}", key, value));
            formatter.info(&format!("Saved to {}", ctx.config_path.display()));
        }
        Ok(())
    }

    fn execute_validate(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config_path = &ctx.config_path;

        // Load explicitly so parse errors surface
        let config = match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                let message = if config_path.exists() {
                    format!("Failed to parse configuration: {}", e)
                } else {
                    "Configuration file not found. Using defaults.".to_string()
                };
                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [message],
                    }));
                } else if config_path.exists() {
                    formatter.error(&message);
                    formatter.info(&format!("File: {}", config_path.display()));
                } else {
                    formatter.info(&format!(
                        "Configuration file not found at {}",
                        config_path.display()
                    ));
                    formatter.info("Using default configuration. Run 'syncward config init' to create one.");
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");

        let errors = config.validate();

        if ctx.format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(())
    }

    fn execute_init(&self, ctx: &CliContext, force: bool) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config_path = &ctx.config_path;

        if config_path.exists() && !force {
            anyhow::bail!(
                "{} already exists; pass --force to overwrite it",
                config_path.display()
            );
        }

        Config::default()
            .save(config_path)
            .context("Failed to write configuration file")?;
        info!(config_path = %config_path.display(), "Wrote default configuration");

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Wrote {}", config_path.display()));
        }
        Ok(())
    }
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- sessions ---
        "sessions.file" => {
            config.sessions.file = PathBuf::from(value);
        }

        // --- scheduler ---
        "scheduler.schedule_check_secs" => {
            config.scheduler.schedule_check_secs = value
                .parse::<u64>()
                .context("Expected a positive integer")?;
        }
        "scheduler.wifi_poll_secs" => {
            config.scheduler.wifi_poll_secs = value
                .parse::<u64>()
                .context("Expected a positive integer")?;
        }

        // --- executor ---
        "executor.rsync_binary" => {
            config.executor.rsync_binary = value.to_string();
        }
        "executor.password_env" => {
            config.executor.password_env = value.to_string();
        }

        // --- logging ---
        "logging.level" => {
            config.logging.level = value.to_string();
        }
        "logging.format" => {
            config.logging.format = value.to_string();
        }
        "logging.audit_dir" => {
            config.logging.audit_dir = PathBuf::from(value);
        }
        "logging.max_size_mb" => {
            config.logging.max_size_mb = value
                .parse::<u64>()
                .context("Expected a positive integer")?;
        }
        "logging.max_files" => {
            config.logging.max_files = value
                .parse::<u32>()
                .context("Expected a positive integer")?;
        }

        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sessions_file() {
        let mut config = Config::default();
        apply_config_value(&mut config, "sessions.file", "/tmp/sessions.json").unwrap();
        assert_eq!(config.sessions.file, PathBuf::from("/tmp/sessions.json"));
    }

    #[test]
    fn test_apply_wifi_poll() {
        let mut config = Config::default();
        apply_config_value(&mut config, "scheduler.wifi_poll_secs", "5").unwrap();
        assert_eq!(config.scheduler.wifi_poll_secs, 5);
    }

    #[test]
    fn test_apply_rejects_non_numeric() {
        let mut config = Config::default();
        assert!(apply_config_value(&mut config, "logging.max_files", "many").is_err());
        assert_eq!(config.logging.max_files, Config::default().logging.max_files);
    }

    #[test]
    fn test_apply_unknown_key() {
        let mut config = Config::default();
        let err = apply_config_value(&mut config, "sync.root", "/x").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_every_supported_key_applies() {
        let samples = [
            ("sessions.file", "/tmp/s.json"),
            ("scheduler.schedule_check_secs", "15"),
            ("scheduler.wifi_poll_secs", "10"),
            ("executor.rsync_binary", "/usr/bin/rsync"),
            ("executor.password_env", "RSYNC_PASSWORD"),
            ("logging.level", "debug"),
            ("logging.format", "json"),
            ("logging.audit_dir", "/tmp/logs"),
            ("logging.max_size_mb", "20"),
            ("logging.max_files", "3"),
        ];
        assert_eq!(samples.len(), SUPPORTED_KEYS.len());

        let mut config = Config::default();
        for (key, value) in samples {
            apply_config_value(&mut config, key, value).unwrap();
        }
        assert!(config.validate().is_empty());
    }
}
