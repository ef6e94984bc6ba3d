use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Scratch directory removed when dropped.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("segbox-{}", Uuid::new_v4()));
        fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Writes a raw little-endian `uint8` NRRD file with sizes in file order (x y z).
pub fn write_nrrd_u8(path: &Path, sizes: [usize; 3], data: &[u8]) {
    let header = format!(
        "NRRD0004\n# test volume\ntype: unsigned char\ndimension: 3\nsizes: {} {} {}\nencoding: raw\n\n",
        sizes[0], sizes[1], sizes[2]
    );
    let mut bytes = header.into_bytes();
    bytes.extend_from_slice(data);
    fs::write(path, bytes).unwrap();
}
