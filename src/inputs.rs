use std::path::{Path, PathBuf};

use crate::InputError;

/// Which definition files a run processes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InputSelection {
    /// Exactly these files, in this order.
    Files(Vec<PathBuf>),
    /// Every `*.json` file in a directory.
    Directory {
        /// The directory to search.
        path: PathBuf,
        /// Whether to descend into subdirectories.
        recursive: bool,
    },
}

impl InputSelection {
    /// Bind the selection from positional files and the directory options.
    pub fn from_args(
        files: Vec<String>,
        directory: Option<String>,
        recursive: bool,
    ) -> Result<Self, InputError> {
        match (files.is_empty(), directory) {
            (false, Some(_)) => Err(InputError::ConflictingSelection),
            (true, None) => Err(InputError::NoSelection),
            (false, None) if recursive => Err(InputError::RecursiveWithoutDirectory),
            (false, None) => Ok(InputSelection::Files(
                files.into_iter().map(PathBuf::from).collect(),
            )),
            (true, Some(path)) => Ok(InputSelection::Directory {
                path: PathBuf::from(path),
                recursive,
            }),
        }
    }

    /// Check that every named path exists.
    pub fn validate(&self) -> Result<(), InputError> {
        match self {
            InputSelection::Files(files) => {
                for file in files {
                    if !file.exists() {
                        return Err(InputError::MissingPath { path: file.clone() });
                    }
                }
                Ok(())
            }
            InputSelection::Directory { path, .. } => {
                if !path.exists() {
                    Err(InputError::MissingPath { path: path.clone() })
                } else if !path.is_dir() {
                    Err(InputError::NotADirectory { path: path.clone() })
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Resolve the selection to the files to process.
    pub fn collect(&self) -> Result<Vec<PathBuf>, InputError> {
        match self {
            InputSelection::Files(files) => Ok(files.clone()),
            InputSelection::Directory { path, recursive } => {
                let mut files = vec![];
                collect_json_files(path, *recursive, &mut files)?;
                tracing::debug!(
                    directory = %path.display(),
                    recursive,
                    count = files.len(),
                    "collected definition files"
                );
                Ok(files)
            }
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn collect_json_files(
    dir: &Path,
    recursive: bool,
    files: &mut Vec<PathBuf>,
) -> Result<(), InputError> {
    let read_error = |source| InputError::ReadDirectory {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = std::fs::read_dir(dir)
        .map_err(read_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_error)?;
    entries.sort_by_key(|entry| entry.file_name());
    let mut subdirectories = vec![];
    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type().map_err(read_error)?;
        if file_type.is_dir() {
            subdirectories.push(path);
        } else if is_json(&path) && path.is_file() {
            files.push(path);
        }
    }
    if recursive {
        for subdirectory in subdirectories {
            collect_json_files(&subdirectory, recursive, files)?;
        }
    }
    Ok(())
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
