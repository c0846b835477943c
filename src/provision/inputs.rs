//! Local credential file loading.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};

use crate::error::ProvisionError;
use crate::remote::expand_tilde;

/// Reads a local UTF-8 file, expanding a leading `~/`.
///
/// # Errors
///
/// Returns [`ProvisionError::LocalInput`] when the path is blank, or the
/// file is missing, unreadable, or not valid UTF-8.
pub fn read_local_input(path: &Utf8Path) -> Result<String, ProvisionError> {
    let expanded = Utf8PathBuf::from(expand_tilde(path.as_str()));
    if expanded.as_str().trim().is_empty() {
        return Err(ProvisionError::LocalInput {
            path: expanded,
            message: String::from("path must not be empty"),
        });
    }

    read_to_string_ambient(&expanded)
        .map_err(|message| ProvisionError::LocalInput {
            path: expanded.clone(),
            message,
        })
}

fn read_to_string_ambient(path: &Utf8Path) -> Result<String, String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|err| err.to_string())?;
        Utf8PathBuf::try_from(cwd)
            .map_err(|err| err.to_string())?
            .join(path)
    };

    let parent = absolute
        .parent()
        .ok_or_else(|| format!("path has no parent directory: {path}"))?;
    let file_name = absolute
        .file_name()
        .ok_or_else(|| format!("path has no file name: {path}"))?;

    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_name).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_path_is_rejected() {
        let err = read_local_input(Utf8Path::new("  ")).expect_err("blank path should fail");
        assert!(
            matches!(err, ProvisionError::LocalInput { ref message, .. } if message.contains("empty")),
            "got: {err:?}"
        );
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_local_input(Utf8Path::new("/nonexistent/clusterseed/kubeconfig"))
            .expect_err("missing file should fail");
        assert!(
            err.to_string()
                .starts_with("failed to read /nonexistent/clusterseed/kubeconfig"),
            "got: {err}"
        );
    }
}
