//! Asset discovery and loading: icons and BDF fonts on disk.
//!
//! ## Rust concepts
//! - `fs::read_dir()` for directory traversal
//! - `Path` and `PathBuf` for cross-platform file paths
//! - `Arc` so one decoded icon can back several scene elements

use crate::error::Result;
use image::{ImageReader, RgbImage};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Resolves icon references like `/graphics/logo.bmp` against a root
/// directory and decodes them.
#[derive(Clone, Debug)]
pub struct IconStore {
    root: PathBuf,
}

impl IconStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a reference onto the store root.
    ///
    /// References are written as absolute paths on the device volume, so a
    /// leading `/` is relative to the root. `..` components are dropped so
    /// a reference can never leave the root.
    pub fn resolve(&self, reference: &str) -> PathBuf {
        let mut path = self.root.clone();
        for component in Path::new(reference).components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
        path
    }

    /// Decode the referenced icon to RGB.
    pub fn load(&self, reference: &str) -> Result<Arc<RgbImage>> {
        let path = self.resolve(reference);
        let img = ImageReader::open(&path)?.with_guessed_format()?.decode()?;
        Ok(Arc::new(img.to_rgb8()))
    }
}

/// Scan a directory for icon images, returning sorted file names.
pub fn list_icons(dir: &Path) -> Vec<String> {
    list_with_extension(dir, |ext| matches!(ext, "bmp" | "png" | "jpg" | "jpeg"), true)
}

/// Scan a directory for available BDF fonts, returning names without the
/// `.bdf` extension.
pub fn list_fonts(dir: &Path) -> Vec<String> {
    list_with_extension(dir, |ext| ext == "bdf", false)
}

fn list_with_extension(dir: &Path, accept: impl Fn(&str) -> bool, keep_ext: bool) -> Vec<String> {
    let mut names = Vec::new();

    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(_) => return names,
    };

    for entry in read_dir.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let accepted = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| accept(&e.to_ascii_lowercase()));
        if !accepted {
            continue;
        }

        let name = if keep_ext {
            path.file_name()
        } else {
            path.file_stem()
        };
        if let Some(name) = name.and_then(|s| s.to_str()) {
            names.push(name.to_string());
        }
    }

    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"fake").unwrap();
    }

    fn write_icon(dir: &Path, name: &str, w: u32, h: u32) {
        RgbImage::from_pixel(w, h, image::Rgb([255, 0, 0]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn resolve_strips_leading_slash() {
        let store = IconStore::new("/media");
        assert_eq!(store.resolve("/graphics/logo.bmp"), PathBuf::from("/media/graphics/logo.bmp"));
        assert_eq!(store.resolve("logo.bmp"), PathBuf::from("/media/logo.bmp"));
    }

    #[test]
    fn resolve_cannot_escape_root() {
        let store = IconStore::new("/media");
        assert_eq!(store.resolve("../../etc/passwd"), PathBuf::from("/media/etc/passwd"));
    }

    #[test]
    fn load_decodes_bmp() {
        let tmp = TempDir::new().unwrap();
        let graphics = tmp.path().join("graphics");
        fs::create_dir(&graphics).unwrap();
        write_icon(&graphics, "logo.bmp", 12, 9);

        let icon = IconStore::new(tmp.path()).load("/graphics/logo.bmp").unwrap();
        assert_eq!(icon.dimensions(), (12, 9));
        assert_eq!(icon.get_pixel(0, 0).0, [255, 0, 0]);
    }

    #[test]
    fn load_missing_icon_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(IconStore::new(tmp.path()).load("/graphics/nope.bmp").is_err());
    }

    #[test]
    fn load_corrupt_icon_is_an_error() {
        let tmp = TempDir::new().unwrap();
        create_file(tmp.path(), "broken.bmp");
        assert!(IconStore::new(tmp.path()).load("broken.bmp").is_err());
    }

    #[test]
    fn list_icons_finds_supported_formats_sorted() {
        let tmp = TempDir::new().unwrap();
        create_file(tmp.path(), "zebra.bmp");
        create_file(tmp.path(), "apple.PNG");
        create_file(tmp.path(), "mango.jpg");
        create_file(tmp.path(), "readme.txt");

        assert_eq!(list_icons(tmp.path()), vec!["apple.PNG", "mango.jpg", "zebra.bmp"]);
    }

    #[test]
    fn list_fonts_finds_bdf_files() {
        let tmp = TempDir::new().unwrap();
        create_file(tmp.path(), "helvB08.bdf");
        create_file(tmp.path(), "helvB12.bdf");
        create_file(tmp.path(), "readme.txt");

        assert_eq!(list_fonts(tmp.path()), vec!["helvB08", "helvB12"]);
    }

    #[test]
    fn listing_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(list_fonts(&tmp.path().join("fonts")).is_empty());
        assert!(list_icons(&tmp.path().join("graphics")).is_empty());
    }
}
