//! Listing of the images generated for one processed file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::ORIGINAL_LABEL;
use crate::io::layout::{COMPARISON_DIR, FileLayout};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageIndex {
    pub original: Vec<PathBuf>,
    /// `(filter label, images)` in label order.
    pub filtered: Vec<(String, Vec<PathBuf>)>,
    pub comparison: Vec<PathBuf>,
}

impl ImageIndex {
    /// Scan the image folders of `layout`. Images are ordered by window index.
    ///
    /// Filter folders are discovered on disk, so labels do not need to be known
    /// up front; missing folders simply yield empty lists.
    pub fn scan(layout: &FileLayout) -> Self {
        let images_dir = layout.images_dir();
        let mut index = ImageIndex {
            original: window_images(&layout.variant_images_dir(ORIGINAL_LABEL), &layout.basename, ORIGINAL_LABEL),
            comparison: window_images(&layout.comparison_dir(), &layout.basename, COMPARISON_DIR),
            filtered: Vec::new(),
        };

        let Ok(entries) = fs::read_dir(&images_dir) else {
            return index;
        };
        let mut labels: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name != ORIGINAL_LABEL && name != COMPARISON_DIR)
            .collect();
        labels.sort();

        for label in labels {
            let images = window_images(&layout.variant_images_dir(&label), &layout.basename, &label);
            index.filtered.push((label, images));
        }
        index
    }

    pub fn total(&self) -> usize {
        self.original.len() + self.comparison.len() + self.filtered.iter().map(|(_, v)| v.len()).sum::<usize>()
    }

    pub fn filtered_for(&self, label: &str) -> &[PathBuf] {
        self.filtered
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }
}

/// `{basename}_{label}_window{N}.png` files in `dir`, sorted by `N`.
fn window_images(dir: &Path, basename: &str, label: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let prefix = format!("{basename}_{label}_window");
    let mut found: Vec<(usize, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let n = name.strip_prefix(&prefix)?.strip_suffix(".png")?.parse().ok()?;
            Some((n, e.path()))
        })
        .collect();
    found.sort();
    found.into_iter().map(|(_, p)| p).collect()
}
