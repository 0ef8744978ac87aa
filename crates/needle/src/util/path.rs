use std::path::{Path, PathBuf};

use uuid::Uuid;

/// A path in `dir` whose file name is a fresh UUID v4.
///
/// Concurrent downloads into the same directory never pick the same name.
pub fn unique_output_path<P>(dir: P) -> PathBuf
where
    P: AsRef<Path>,
{
    dir.as_ref().join(Uuid::new_v4().to_string())
}
