//! On-disk layout of a results root.
//!
//! ```text
//! <root>/summary_results.csv
//! <root>/<basename>/resultados_detecciones_filtrados/*.csv
//! <root>/<basename>/resultados_imagenes_filtrados/<label>/*.png
//! <root>/<basename>/resultados_imagenes_filtrados/comparison/*.png
//! ```

use std::path::{Path, PathBuf};

pub const SUMMARY_FILE: &str = "summary_results.csv";
pub const DETECTIONS_DIR: &str = "resultados_detecciones_filtrados";
pub const IMAGES_DIR: &str = "resultados_imagenes_filtrados";
pub const COMPARISON_DIR: &str = "comparison";

/// File name without directory and extension.
pub fn basename_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Paths for one input file under a results root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    pub basename: String,
    pub dir: PathBuf,
}

impl FileLayout {
    pub fn new(root: &Path, basename: impl Into<String>) -> Self {
        let basename = basename.into();
        Self {
            dir: root.join(&basename),
            basename,
        }
    }

    pub fn for_input(root: &Path, input: &Path) -> Self {
        Self::new(root, basename_of(input))
    }

    pub fn detections_dir(&self) -> PathBuf {
        self.dir.join(DETECTIONS_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.dir.join(IMAGES_DIR)
    }

    pub fn variant_images_dir(&self, label: &str) -> PathBuf {
        self.images_dir().join(label)
    }

    pub fn comparison_dir(&self) -> PathBuf {
        self.images_dir().join(COMPARISON_DIR)
    }

    /// `{basename}_{label}_window{N}.png`, `N` being the zero-based window index.
    pub fn variant_image(&self, label: &str, window_index: usize) -> PathBuf {
        self.variant_images_dir(label)
            .join(format!("{}_{}_window{}.png", self.basename, label, window_index))
    }

    pub fn comparison_image(&self, window_index: usize) -> PathBuf {
        self.comparison_dir()
            .join(format!("{}_comparison_window{}.png", self.basename, window_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_paths_follow_layout() {
        let layout = FileLayout::for_input(Path::new("/out"), Path::new("/data/REC01.mseed"));
        assert_eq!(layout.basename, "REC01");
        assert_eq!(
            layout.variant_image("0.5-2Hz", 0),
            PathBuf::from("/out/REC01/resultados_imagenes_filtrados/0.5-2Hz/REC01_0.5-2Hz_window0.png")
        );
        assert_eq!(
            layout.comparison_image(4),
            PathBuf::from("/out/REC01/resultados_imagenes_filtrados/comparison/REC01_comparison_window4.png")
        );
        assert_eq!(
            layout.detections_dir(),
            PathBuf::from("/out/REC01/resultados_detecciones_filtrados")
        );
    }
}
