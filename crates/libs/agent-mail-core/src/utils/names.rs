//! Memorable agent name generation.
//!
//! Names are `Adjective + Noun`, e.g. `GreenCastle`, drawn from two fixed
//! word lists. `unique_agent_name` prefers a caller-supplied hint when it
//! sanitizes to a usable name and is free within the project, falling back
//! to random generation with bounded retries.

use rand::Rng;
use rand::seq::SliceRandom;

const ADJECTIVES: &[&str] = &[
    "Green", "Blue", "Red", "Silver", "Golden", "Crimson", "Amber", "Violet",
    "Scarlet", "Emerald", "Copper", "Jade", "Azure", "Coral", "Ivory", "Onyx",
    "Quiet", "Swift", "Bold", "Calm", "Brave", "Bright", "Sharp", "Steady",
    "Lucky", "Clever", "Gentle", "Fierce", "Noble", "Rapid", "Solid", "Vivid",
    "Wild", "Young", "Ancient", "Hidden", "Frozen", "Burning", "Shining", "Silent",
];

const NOUNS: &[&str] = &[
    "Castle", "Lake", "River", "Forest", "Mountain", "Harbor", "Meadow", "Canyon",
    "Island", "Valley", "Bridge", "Tower", "Garden", "Desert", "Glacier", "Summit",
    "Falcon", "Otter", "Heron", "Badger", "Raven", "Lynx", "Wren", "Fox",
    "Comet", "Nebula", "Ember", "Lantern", "Compass", "Anchor", "Beacon", "Prism",
    "Willow", "Cedar", "Maple", "Birch", "Cactus", "Reef", "Delta", "Plateau",
];

/// Sanitize a caller-supplied name hint: keep only alphanumerics, cap at
/// 40 characters. Returns `None` if nothing usable remains.
fn sanitize_hint(hint: &str) -> Option<String> {
    let cleaned: String = hint.chars().filter(|c| c.is_ascii_alphanumeric()).take(40).collect();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

/// Generate a random `Adjective + Noun` candidate name.
fn random_candidate(rng: &mut impl Rng) -> String {
    let adj = ADJECTIVES.choose(rng).copied().unwrap_or("Green");
    let noun = NOUNS.choose(rng).copied().unwrap_or("Castle");
    format!("{adj}{noun}")
}

/// Choose a unique agent name for a project.
///
/// `is_taken` is called with each candidate and must return whether that
/// name is already in use within the project. Up to 1000 random
/// collisions are tolerated before giving up with `NAME_EXHAUSTION`.
pub fn unique_agent_name(
    hint: Option<&str>,
    mut is_taken: impl FnMut(&str) -> bool,
) -> Result<String, u32> {
    if let Some(hint) = hint {
        if let Some(candidate) = sanitize_hint(hint) {
            if !is_taken(&candidate) {
                return Ok(candidate);
            }
        }
    }

    let mut rng = rand::thread_rng();
    for attempt in 1..=1000u32 {
        let candidate = random_candidate(&mut rng);
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
        if attempt == 1000 {
            return Err(attempt);
        }
    }
    Err(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_sanitized_hint_when_free() {
        let name = unique_agent_name(Some("My Agent!"), |_| false).unwrap();
        assert_eq!(name, "MyAgent");
    }

    #[test]
    fn falls_back_to_random_when_hint_taken() {
        let name = unique_agent_name(Some("Taken"), |n| n == "Taken").unwrap();
        assert_ne!(name, "Taken");
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn exhausts_after_1000_collisions() {
        let result = unique_agent_name(None, |_| true);
        assert_eq!(result, Err(1000));
    }

    #[test]
    fn empty_hint_falls_back_to_random() {
        let name = unique_agent_name(Some("!!!"), |_| false).unwrap();
        assert!(!name.is_empty());
    }
}
