use std::env;
use std::io::Write;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serial_test::serial;
use tempfile::NamedTempFile;

use skein::config::{Config, EnvConfig};

/// Restores an environment variable to its previous value on drop, so a
/// panicking test cannot leak state into the next one.
struct EnvVarGuard {
    key: &'static str,
    previous: Option<String>,
}

impl EnvVarGuard {
    fn set(key: &'static str, value: &str) -> Self {
        let previous = env::var(key).ok();
        // SAFETY: tests touching the environment are serialized via #[serial]
        unsafe { env::set_var(key, value) };
        Self { key, previous }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        // SAFETY: tests touching the environment are serialized via #[serial]
        unsafe {
            match &self.previous {
                Some(value) => env::set_var(self.key, value),
                None => env::remove_var(self.key),
            }
        }
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert!(config.src.is_empty());
    assert_eq!(config.entry_file_name, "main.py");
}

#[test]
#[serial]
fn test_toml_config_loading() {
    let toml_content = r#"
src = ["challengelibs", "/opt/shared"]
entry-file-name = "solution.py"
        "#;

    let mut temp_file = NamedTempFile::new().expect("temp file");
    temp_file
        .write_all(toml_content.as_bytes())
        .expect("write config");

    let config = Config::load(Some(temp_file.path())).expect("config should load");
    assert_eq!(
        config.src,
        vec![PathBuf::from("challengelibs"), PathBuf::from("/opt/shared")]
    );
    assert_eq!(config.entry_file_name, "solution.py");
}

#[test]
#[serial]
fn test_invalid_toml_config() {
    let toml_content = "src = \"not-a-list";

    let mut temp_file = NamedTempFile::new().expect("temp file");
    temp_file
        .write_all(toml_content.as_bytes())
        .expect("write config");

    let result = Config::load(Some(temp_file.path()));
    assert!(result.is_err());
    let error_message = result.unwrap_err().to_string();
    assert!(
        error_message.contains("Failed to load CLI config"),
        "unexpected error: {error_message}"
    );
}

#[test]
#[serial]
fn test_env_src_overrides_file_config() {
    let _guard = EnvVarGuard::set("SKEIN_SRC", "libs, more/libs");

    let env_config = EnvConfig::from_env();
    assert_eq!(
        env_config.src,
        Some(vec![PathBuf::from("libs"), PathBuf::from("more/libs")])
    );

    let combined = env_config.apply_to(Config {
        src: vec![PathBuf::from("from-file")],
        ..Default::default()
    });
    assert_eq!(
        combined.src,
        vec![PathBuf::from("libs"), PathBuf::from("more/libs")]
    );
}

#[test]
#[serial]
fn test_env_entry_file_name() {
    let _guard = EnvVarGuard::set("SKEIN_ENTRY_FILE_NAME", "run.py");

    let env_config = EnvConfig::from_env();
    assert_eq!(env_config.entry_file_name.as_deref(), Some("run.py"));

    let combined = env_config.apply_to(Config::default());
    assert_eq!(combined.entry_file_name, "run.py");
}

#[test]
#[serial]
fn test_blank_env_values_are_ignored() {
    let _src_guard = EnvVarGuard::set("SKEIN_SRC", " , ");
    let _entry_guard = EnvVarGuard::set("SKEIN_ENTRY_FILE_NAME", "  ");

    let env_config = EnvConfig::from_env();
    assert_eq!(env_config.src, None);
    assert_eq!(env_config.entry_file_name, None);
}

#[test]
#[serial]
fn test_cli_config_takes_precedence_over_env() {
    let _guard = EnvVarGuard::set("SKEIN_ENTRY_FILE_NAME", "from_env.py");

    let mut temp_file = NamedTempFile::new().expect("temp file");
    temp_file
        .write_all(b"entry-file-name = \"from_cli.py\"")
        .expect("write config");

    let config = Config::load(Some(temp_file.path())).expect("config should load");
    assert_eq!(config.entry_file_name, "from_cli.py");
}
