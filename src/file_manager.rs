//! # File Management Module
//!
//! Discovery dei video da inviare alla pipeline quando si usa la CLI.
//!
//! ## Responsabilità:
//! - Espansione degli input: file passati esplicitamente + scansione ricorsiva
//!   delle directory
//! - Riconoscimento dei formati video per estensione
//! - Deduplica degli input (lo stesso file passato due volte è un solo job)
//!
//! ## Formati riconosciuti nelle directory:
//! MP4, MOV, AVI, MKV, WebM, M4V
//!
//! Un file passato esplicitamente viene accettato qualunque sia l'estensione:
//! sarà FFmpeg a rifiutarlo se non è un video.

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

/// Resolves CLI inputs into video files
pub struct FileManager;

impl FileManager {
    /// Find all video files below a directory
    pub fn find_video_files(dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| Self::is_video(path))
            .collect()
    }

    /// Check if a file is a video
    pub fn is_video(path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                VIDEO_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }

    /// Expand files and directories into a sorted, deduplicated list of sources
    pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut sources = BTreeSet::new();

        for input in inputs {
            if input.is_dir() {
                sources.extend(Self::find_video_files(input));
            } else if input.is_file() {
                sources.insert(input.clone());
            } else {
                return Err(anyhow::anyhow!("Input does not exist: {}", input.display()));
            }
        }

        Ok(sources.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_video() {
        assert!(FileManager::is_video(Path::new("clip.mp4")));
        assert!(FileManager::is_video(Path::new("CLIP.MOV")));
        assert!(!FileManager::is_video(Path::new("notes.txt")));
        assert!(!FileManager::is_video(Path::new("noext")));
    }

    #[test]
    fn test_collect_inputs_scans_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        std::fs::write(nested.join("b.mkv"), b"b").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"c").unwrap();

        let explicit = dir.path().join("a.mp4");
        let inputs = FileManager::collect_inputs(&[dir.path().to_path_buf(), explicit]).unwrap();

        assert_eq!(inputs.len(), 2);
        assert!(inputs.iter().all(|p| FileManager::is_video(p)));
    }

    #[test]
    fn test_explicit_file_is_kept_regardless_of_extension() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("recording.bin");
        std::fs::write(&file, b"x").unwrap();

        let inputs = FileManager::collect_inputs(&[file.clone()]).unwrap();
        assert_eq!(inputs, vec![file]);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let err = FileManager::collect_inputs(&[PathBuf::from("/no/such/video.mp4")]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
