//! Scripted stand-in for ffmpeg used by the unit tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Write an executable `ffmpeg` shell script into `dir`.
///
/// Invocations carrying `-progress` run `encode`, everything else runs
/// `probe`. Both bodies can use `$last`, the final argument (the output
/// target for encodes, the input for probes).
pub(crate) fn fake_encoder(dir: &Path, probe: &str, encode: &str) -> PathBuf {
    let script = format!(
        "#!/bin/sh\n\
         for last; do :; done\n\
         mode=probe\n\
         for arg; do\n\
         \x20 if [ \"$arg\" = \"-progress\" ]; then mode=encode; fi\n\
         done\n\
         if [ \"$mode\" = encode ]; then\n\
         {encode}\n\
         else\n\
         {probe}\n\
         fi\n"
    );
    let path = dir.join("ffmpeg");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
