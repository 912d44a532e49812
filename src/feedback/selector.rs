//! Sound and phrase selection
//!
//! Pure helpers: pick one entry uniformly at random and resolve sound
//! references against the configured sound root. Existence is checked by
//! the playback side, not here.

use std::path::{Path, PathBuf};

use rand::Rng;
use rand::seq::SliceRandom;

/// Pick one entry from a non-empty set uniformly at random
///
/// Returns `None` for an empty set.
pub fn pick_random<'a, T, R: Rng + ?Sized>(set: &'a [T], rng: &mut R) -> Option<&'a T> {
    set.choose(rng)
}

/// Resolve a sound reference to a playable path
///
/// Absolute paths pass through verbatim; relative paths are joined to the
/// configured sound root.
#[must_use]
pub fn resolve_sound_path(reference: &str, sound_dir: &Path) -> PathBuf {
    let path = Path::new(reference);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        sound_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn single_element_set_always_selected() {
        let set = vec!["ding.wav".to_string()];
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..10 {
            assert_eq!(pick_random(&set, &mut rng), Some(&"ding.wav".to_string()));
        }
    }

    #[test]
    fn empty_set_selects_nothing() {
        let set: Vec<String> = vec![];
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(pick_random(&set, &mut rng), None);
    }

    #[test]
    fn selection_is_deterministic_for_a_fixed_seed() {
        let set = vec!["a", "b", "c", "d"];

        let mut rng1 = StdRng::seed_from_u64(42);
        let mut rng2 = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            assert_eq!(pick_random(&set, &mut rng1), pick_random(&set, &mut rng2));
        }
    }

    #[test]
    fn absolute_path_passes_through() {
        let resolved = resolve_sound_path("/tmp/chime.wav", Path::new("/srv/sounds"));
        assert_eq!(resolved, PathBuf::from("/tmp/chime.wav"));
    }

    #[test]
    fn relative_path_joins_sound_dir() {
        let resolved = resolve_sound_path("chime.wav", Path::new("/srv/sounds"));
        assert_eq!(resolved, PathBuf::from("/srv/sounds/chime.wav"));
    }
}
