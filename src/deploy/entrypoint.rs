/*!
 * Entrypoint Discovery
 */

use std::path::Path;

/// First candidate that exists as a regular file directly inside `dir`
pub fn find_entrypoint<'a, S: AsRef<str>>(dir: &Path, candidates: &'a [S]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|candidate| candidate.as_ref())
        .find(|candidate| dir.join(candidate).is_file())
}
