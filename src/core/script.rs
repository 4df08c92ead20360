//! Script Selection
//!
//! Picks one narration script uniformly at random from a static pool.
//! Pure selection: no inputs beyond the pool, no side effects, and the
//! pool is non-empty by construction.

use rand::Rng;

/// A selected narration script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptChoice {
    /// Short hint used to build the video title
    pub title_hint: String,
    /// Full narration text
    pub text: String,
}

/// Static narration pool: (title hint, narration text)
const SCRIPT_POOL: &[(&str, &str)] = &[
    (
        "The Endless Universe",
        "The universe is vast, mysterious, and endlessly fascinating.",
    ),
    (
        "Stories in Starlight",
        "Every star in the night sky has its own story to tell.",
    ),
    (
        "Beyond Our Galaxy",
        "What lies beyond our galaxy? The search continues...",
    ),
    (
        "Ancient Light",
        "Some of the light reaching your eyes tonight left its star before humans existed.",
    ),
    (
        "A Pale Blue Dot",
        "Seen from deep space, everything we have ever known fits on a single pale blue dot.",
    ),
];

/// Returns one script chosen uniformly at random from the pool.
pub fn select_script() -> ScriptChoice {
    let idx = rand::thread_rng().gen_range(0..SCRIPT_POOL.len());
    nth_script(idx)
}

/// Returns the script at `idx`, wrapping around the pool. Deterministic
/// accessor used by tests and the `--script` CLI override.
pub fn nth_script(idx: usize) -> ScriptChoice {
    let (title_hint, text) = SCRIPT_POOL[idx % SCRIPT_POOL.len()];
    ScriptChoice {
        title_hint: title_hint.to_string(),
        text: text.to_string(),
    }
}

/// Number of scripts in the pool
pub fn pool_len() -> usize {
    SCRIPT_POOL.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_is_non_empty() {
        assert!(pool_len() > 0);
    }

    #[test]
    fn test_selection_comes_from_pool() {
        for _ in 0..50 {
            let choice = select_script();
            assert!(SCRIPT_POOL
                .iter()
                .any(|(hint, text)| *hint == choice.title_hint && *text == choice.text));
        }
    }

    #[test]
    fn test_nth_wraps_around() {
        assert_eq!(nth_script(0), nth_script(pool_len()));
        assert_eq!(nth_script(2), nth_script(2 + pool_len()));
    }

    #[test]
    fn test_scripts_are_usable_narration() {
        for i in 0..pool_len() {
            let choice = nth_script(i);
            assert!(!choice.text.trim().is_empty());
            assert!(!choice.title_hint.trim().is_empty());
        }
    }
}
