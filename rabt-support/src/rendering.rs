//! Text rendering utilities for human-friendly error messages.
//!
//! Provides helpers to format resolution chains, type names, counted
//! nouns and "did you mean?" suggestions in error output.

/// Renders a resolution chain as a readable string, outermost key first.
///
/// # Examples
/// ```
/// use rabt_support::rendering::render_chain;
///
/// let chain = vec!["UserService", "UserRepo", "'connection'"];
/// let rendered = render_chain(&chain);
/// assert_eq!(rendered, "UserService → UserRepo → 'connection'");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Renders the "while attempting to resolve" suffix used by resolution errors.
///
/// Returns an empty string for an empty chain so it can be appended
/// unconditionally.
///
/// ```
/// use rabt_support::rendering::render_resolve_context;
///
/// assert_eq!(render_resolve_context(&["A", "B"]), " while attempting to resolve A → B");
/// assert_eq!(render_resolve_context(&[] as &[&str]), "");
/// ```
pub fn render_resolve_context(chain: &[impl AsRef<str>]) -> String {
    if chain.is_empty() {
        String::new()
    } else {
        format!(" while attempting to resolve {}", render_chain(chain))
    }
}

/// Quotes a string key the way it appears in diagnostics.
///
/// ```
/// use rabt_support::rendering::quote_name;
///
/// assert_eq!(quote_name("database_url"), "'database_url'");
/// ```
pub fn quote_name(name: &str) -> String {
    format!("'{name}'")
}

/// Formats a count with the singular or plural form of a noun.
///
/// ```
/// use rabt_support::rendering::count_noun;
///
/// assert_eq!(count_noun(1, "dependency", "dependencies"), "1 dependency");
/// assert_eq!(count_noun(3, "parameter", "parameters"), "3 parameters");
/// ```
pub fn count_noun(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use rabt_support::rendering::shorten_type_name;
///
/// let short = shorten_type_name("my_app::services::user::UserService");
/// assert_eq!(short, "UserService");
///
/// let short = shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>");
/// assert_eq!(short, "Arc<dyn Logger>");
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut current_segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                current_segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' => {
                result.push_str(&current_segment);
                result.push(ch);
                current_segment.clear();
            }
            _ => {
                current_segment.push(ch);
            }
        }
    }

    result.push_str(&current_segment);
    result
}

/// Generates "did you mean?" suggestions from the registered key names.
///
/// Compares the requested name against available names and returns
/// the closest matches, best first.
pub fn suggest_similar(
    requested: &str,
    available: &[&str],
    max_suggestions: usize,
) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    if requested_short.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter(|&&name| name != requested)
        .filter_map(|&name| {
            let name_lower = name.to_lowercase();
            let name_short = shorten_type_name(name).to_lowercase();

            if name_short.is_empty() {
                return None;
            }

            if name_lower.contains(&requested_lower)
                || requested_lower.contains(&name_lower)
            {
                return Some((name, 100));
            }

            if name_short.contains(&requested_short)
                || requested_short.contains(&name_short)
            {
                return Some((name, 80));
            }

            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            if common >= 3 {
                return Some((name, common * 10));
            }

            None
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.dedup_by(|a, b| a.0 == b.0);
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_simple_chain() {
        let chain = vec!["A", "B", "C"];
        assert_eq!(render_chain(&chain), "A → B → C");
    }

    #[test]
    fn render_single_element_chain() {
        let chain = vec!["A"];
        assert_eq!(render_chain(&chain), "A");
    }

    #[test]
    fn render_empty_chain() {
        let chain: Vec<&str> = vec![];
        assert_eq!(render_chain(&chain), "");
    }

    #[test]
    fn resolve_context_mentions_chain() {
        let chain = vec!["Outer".to_string(), "'inner'".to_string()];
        assert_eq!(
            render_resolve_context(&chain),
            " while attempting to resolve Outer → 'inner'"
        );
    }

    #[test]
    fn shorten_simple_path() {
        assert_eq!(
            shorten_type_name("my_app::services::UserService"),
            "UserService"
        );
    }

    #[test]
    fn shorten_with_generics() {
        assert_eq!(
            shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>"),
            "Arc<dyn Logger>"
        );
    }

    #[test]
    fn shorten_no_path() {
        assert_eq!(shorten_type_name("String"), "String");
    }

    #[test]
    fn count_noun_singular_and_plural() {
        assert_eq!(count_noun(0, "parameter", "parameters"), "0 parameters");
        assert_eq!(count_noun(1, "parameter", "parameters"), "1 parameter");
    }

    #[test]
    fn suggest_similar_names() {
        let available = vec!["'user_service'", "'user_repository'", "'logger'", "'database'"];

        let suggestions = suggest_similar("'user_servise'", &available, 3);
        assert!(!suggestions.is_empty());
        assert!(suggestions[0].contains("user_serv"));
    }

    #[test]
    fn suggest_skips_exact_name() {
        let available = vec!["'database'"];
        let suggestions = suggest_similar("'database'", &available, 3);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn suggest_no_match() {
        let available = vec!["my_app::Database"];
        let suggestions = suggest_similar("XyzAbcDef", &available, 3);
        assert!(suggestions.is_empty());
    }
}
