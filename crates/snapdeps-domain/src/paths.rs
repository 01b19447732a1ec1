use std::path::{Path, PathBuf};

use dirs_next::home_dir;

/// Expand a leading `~` to the current user's home directory.
///
/// Configured directories are stored verbatim and expanded at use time, so a
/// config file written on one account stays meaningful on another. Paths
/// without a leading tilde (and `~` when no home directory can be determined)
/// come back unchanged.
#[must_use]
pub fn expand_user(path: &Path) -> PathBuf {
    let Some(text) = path.to_str() else {
        return path.to_path_buf();
    };
    if text == "~" {
        if let Some(home) = home_dir() {
            return home;
        }
    } else if let Some(rest) = text.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_tilde_becomes_home() {
        let Some(home) = home_dir() else {
            eprintln!("skipping bare_tilde_becomes_home (no home directory)");
            return;
        };
        assert_eq!(expand_user(Path::new("~")), home);
    }

    #[test]
    fn tilde_prefix_joins_onto_home() {
        let Some(home) = home_dir() else {
            eprintln!("skipping tilde_prefix_joins_onto_home (no home directory)");
            return;
        };
        assert_eq!(
            expand_user(Path::new("~/snapdeps/dev")),
            home.join("snapdeps").join("dev")
        );
    }

    #[test]
    fn absolute_paths_pass_through() {
        assert_eq!(
            expand_user(Path::new("/var/tmp/dev")),
            PathBuf::from("/var/tmp/dev")
        );
    }

    #[test]
    fn interior_tilde_is_not_expanded() {
        assert_eq!(
            expand_user(Path::new("repos/~backup")),
            PathBuf::from("repos/~backup")
        );
    }
}
