use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use toml_edit::{DocumentMut, Item, Table, Value as TomlValue};
use tracing::debug;

const DEFAULTS_TABLE: &str = "defaults";
const DEV_DIR_KEY: &str = "dev_dir";
const SNAPS_DIR_KEY: &str = "snaps_dir";

/// Persistent key/value configuration backing the snapshot store.
///
/// The on-disk form is a TOML file with a single `[defaults]` table. Loading
/// is self-repairing: `dev_dir` and `snaps_dir` are filled in with platform
/// defaults when absent and the merged document is written back, so a fresh
/// machine ends up with a config file it can edit. Keys this crate does not
/// recognize are kept verbatim, in the file and in the loaded view.
#[derive(Clone, Debug)]
pub struct Settings {
    dev_dir: String,
    snaps_dir: String,
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Load from the default location, honoring `SNAPDEPS_CONFIG_PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error when no config location can be determined or the file
    /// cannot be read, parsed, or (on first use) written back.
    pub fn load_default() -> Result<Self> {
        let path = default_config_path()?;
        Self::load(&path)
    }

    /// Load from an explicit config file path.
    ///
    /// A missing file is treated as an empty configuration, not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read settings {}", path.display()))
            }
        };
        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("failed to parse settings {}", path.display()))?;

        let data_base = default_data_base();
        let mut injected = ensure_default(&mut doc, DEV_DIR_KEY, &data_base.join("dev"))?;
        injected |= ensure_default(&mut doc, SNAPS_DIR_KEY, &data_base.join("snaps"))?;
        if injected {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(path, doc.to_string())
                .with_context(|| format!("failed to write settings {}", path.display()))?;
            debug!(path = %path.display(), "settings defaults written");
        }

        Self::from_document(&doc, path)
    }

    /// Build a fully in-memory configuration, bypassing the filesystem.
    ///
    /// Intended for embedding and for tests that inject throwaway cache
    /// directories.
    #[must_use]
    pub fn with_dirs(dev_dir: impl Into<String>, snaps_dir: impl Into<String>) -> Self {
        let dev_dir = dev_dir.into();
        let snaps_dir = snaps_dir.into();
        let mut values = BTreeMap::new();
        values.insert(DEV_DIR_KEY.to_string(), dev_dir.clone());
        values.insert(SNAPS_DIR_KEY.to_string(), snaps_dir.clone());
        Self {
            dev_dir,
            snaps_dir,
            values,
        }
    }

    /// Directory holding one persistent development clone per repository.
    #[must_use]
    pub fn dev_dir(&self) -> &str {
        &self.dev_dir
    }

    /// Directory holding immutable per-commit snapshot clones.
    #[must_use]
    pub fn snaps_dir(&self) -> &str {
        &self.snaps_dir
    }

    /// Look up any string key from the `[defaults]` table.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn from_document(doc: &DocumentMut, path: &Path) -> Result<Self> {
        let mut values = BTreeMap::new();
        if let Some(table) = doc.get(DEFAULTS_TABLE).and_then(Item::as_table) {
            for (key, item) in table.iter() {
                if let Some(value) = item.as_str() {
                    values.insert(key.to_string(), value.to_string());
                }
            }
        }
        let dev_dir = required_string(&values, DEV_DIR_KEY, path)?;
        let snaps_dir = required_string(&values, SNAPS_DIR_KEY, path)?;
        Ok(Self {
            dev_dir,
            snaps_dir,
            values,
        })
    }
}

/// Location of the settings file: `SNAPDEPS_CONFIG_PATH` when set, otherwise
/// a file named `config` under the platform config directory.
pub fn default_config_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("SNAPDEPS_CONFIG_PATH") {
        return absolutize(PathBuf::from(override_path));
    }
    let base = dirs_next::config_dir()
        .or_else(|| dirs_next::home_dir().map(|home| home.join(".config")))
        .context("could not determine a config directory for this platform")?;
    Ok(base.join("snapdeps").join("config"))
}

fn default_data_base() -> PathBuf {
    dirs_next::data_dir()
        .or_else(|| dirs_next::home_dir().map(|home| home.join(".local").join("share")))
        .unwrap_or_else(env::temp_dir)
        .join("snapdeps")
}

fn absolutize(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(env::current_dir()
            .context("failed to resolve SNAPDEPS_CONFIG_PATH")?
            .join(path))
    }
}

fn defaults_table_mut(doc: &mut DocumentMut) -> Result<&mut Table> {
    doc.entry(DEFAULTS_TABLE)
        .or_insert(Item::Table(Table::new()))
        .as_table_mut()
        .ok_or_else(|| anyhow!("[{DEFAULTS_TABLE}] must be a table"))
}

fn ensure_default(doc: &mut DocumentMut, key: &str, value: &Path) -> Result<bool> {
    let table = defaults_table_mut(doc)?;
    if table.contains_key(key) {
        return Ok(false);
    }
    table.insert(
        key,
        Item::Value(TomlValue::from(value.to_string_lossy().into_owned())),
    );
    Ok(true)
}

fn required_string(values: &BTreeMap<String, String>, key: &str, path: &Path) -> Result<String> {
    values
        .get(key)
        .cloned()
        .ok_or_else(|| anyhow!("settings key '{key}' in {} must be a string", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    struct EnvVarGuard {
        key: &'static str,
        previous: Option<std::ffi::OsString>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.previous.as_ref() {
                Some(value) => env::set_var(self.key, value),
                None => env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn missing_file_gets_platform_defaults_and_is_created() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("config");

        let settings = Settings::load(&path)?;
        assert!(Path::new(settings.dev_dir()).ends_with("snapdeps/dev"));
        assert!(Path::new(settings.snaps_dir()).ends_with("snapdeps/snaps"));

        let written = fs::read_to_string(&path)?;
        assert!(written.contains("[defaults]"));
        assert!(written.contains("dev_dir"));
        assert!(written.contains("snaps_dir"));
        Ok(())
    }

    #[test]
    fn existing_values_survive_default_injection() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("config");
        fs::write(
            &path,
            "# tuned by hand\n[defaults]\ndev_dir = \"/srv/checkouts\"\nextra = \"kept\"\n",
        )?;

        let settings = Settings::load(&path)?;
        assert_eq!(settings.dev_dir(), "/srv/checkouts");
        assert!(Path::new(settings.snaps_dir()).ends_with("snapdeps/snaps"));
        assert_eq!(settings.get("extra"), Some("kept"));

        let written = fs::read_to_string(&path)?;
        assert!(written.contains("# tuned by hand"));
        assert!(written.contains("extra = \"kept\""));
        assert!(written.contains("snaps_dir"));
        Ok(())
    }

    #[test]
    fn complete_files_are_left_untouched() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("config");
        let contents = "[defaults]\ndev_dir = \"/a/dev\"\nsnaps_dir = \"/a/snaps\"\n";
        fs::write(&path, contents)?;

        let settings = Settings::load(&path)?;
        assert_eq!(settings.dev_dir(), "/a/dev");
        assert_eq!(settings.snaps_dir(), "/a/snaps");
        assert_eq!(fs::read_to_string(&path)?, contents);
        Ok(())
    }

    #[test]
    fn unrelated_tables_are_preserved() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("config");
        fs::write(&path, "[mirror]\nurl = \"https://example.invalid\"\n")?;

        let _settings = Settings::load(&path)?;
        let written = fs::read_to_string(&path)?;
        assert!(written.contains("[mirror]"));
        assert!(written.contains("[defaults]"));
        Ok(())
    }

    #[test]
    fn non_string_dirs_are_rejected() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("config");
        fs::write(&path, "[defaults]\ndev_dir = 3\nsnaps_dir = \"/a/snaps\"\n")?;

        let err = Settings::load(&path).unwrap_err();
        assert!(err.to_string().contains("must be a string"));
        Ok(())
    }

    #[test]
    fn with_dirs_exposes_both_directories() {
        let settings = Settings::with_dirs("/tmp/dev", "/tmp/snaps");
        assert_eq!(settings.dev_dir(), "/tmp/dev");
        assert_eq!(settings.snaps_dir(), "/tmp/snaps");
        assert_eq!(settings.get("dev_dir"), Some("/tmp/dev"));
        assert_eq!(settings.get("missing"), None);
    }

    #[test]
    #[serial]
    fn env_override_selects_the_config_file() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("nested").join("config");
        let _guard = EnvVarGuard::set("SNAPDEPS_CONFIG_PATH", &path.to_string_lossy());

        let settings = Settings::load_default()?;
        assert!(path.exists(), "override path should receive the defaults");
        assert!(Path::new(settings.dev_dir()).ends_with("snapdeps/dev"));
        Ok(())
    }
}
