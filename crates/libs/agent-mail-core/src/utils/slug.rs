//! Project slug derivation.
//!
//! `slugify` is the only identity-canonicalization path the core
//! implements: lowercase ASCII, with any run of non-alphanumeric
//! characters collapsed to a single hyphen, trimmed of leading/trailing
//! hyphens. An empty result falls back to `"project"`. There is no hash
//! suffix and no git-awareness — those modes are explicitly out of scope
//! (see DESIGN.md, Open Question 3).

/// Derive a stable, filesystem-safe slug from a project's `human_key`.
pub fn slugify(human_key: &str) -> String {
    let lower = human_key.to_ascii_lowercase();
    let mut slug = String::with_capacity(lower.len());
    let mut last_was_sep = false;

    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('-');
            last_was_sep = true;
        }
    }

    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        "project".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugifies_absolute_path() {
        assert_eq!(slugify("/abs/backend"), "abs-backend");
    }

    #[test]
    fn collapses_runs_of_separators() {
        assert_eq!(slugify("My   Cool///Project!!"), "my-cool-project");
    }

    #[test]
    fn trims_leading_and_trailing_separators() {
        assert_eq!(slugify("--hello--"), "hello");
    }

    #[test]
    fn empty_input_falls_back_to_project() {
        assert_eq!(slugify(""), "project");
        assert_eq!(slugify("!!!"), "project");
    }

    #[test]
    fn is_idempotent_on_already_slug_input() {
        let once = slugify("abs-backend");
        assert_eq!(slugify(&once), once);
    }
}
