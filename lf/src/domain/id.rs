//! Record ID generation
//!
//! All IDs use the format: `{12-char-hex}-{kind}-{slug}`
//! Example: `8c1f0e93ab47-lead-jane-doe`
//!
//! Records of one kind often share a slug, so the hex part is the only
//! thing telling them apart. Inserts still check it against the collection.

use tracing::debug;

const MAX_SLUG_LEN: usize = 40;
const HEX_LEN: usize = 12;

/// Generate a record ID from its kind and a human label
pub fn generate_id(kind: &str, label: &str) -> String {
    let uuid = uuid::Uuid::now_v7().simple().to_string();
    // v7 uuids share a timestamp prefix; take the random tail so ids made
    // in the same millisecond still differ
    let hex = &uuid[uuid.len() - HEX_LEN..];
    let slug = slugify(label);
    if slug.is_empty() {
        format!("{}-{}", hex, kind)
    } else {
        format!("{}-{}-{}", hex, kind, slug)
    }
}

/// `candidate`, or a freshly generated id while `taken` reports it in use
pub fn ensure_unique_id(candidate: String, kind: &str, label: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut id = candidate;
    while taken(&id) {
        debug!(%id, kind, "ensure_unique_id: id already in use, regenerating");
        id = generate_id(kind, label);
    }
    id
}

fn slugify(label: &str) -> String {
    let slug = label
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2018}' | '\u{2019}'))
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let mut truncated: String = slug.chars().take(MAX_SLUG_LEN).collect();
    while truncated.ends_with('-') {
        truncated.pop();
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_format() {
        let id = generate_id("lead", "Jane O'Doe");
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts[0].len(), HEX_LEN);
        assert_eq!(parts[1], "lead");
        assert_eq!(parts[2], "jane-odoe");
    }

    #[test]
    fn test_generate_id_empty_label() {
        let id = generate_id("task", "  ");
        assert!(id.ends_with("-task"));
    }

    #[test]
    fn test_generate_id_unique() {
        let a = generate_id("task", "same");
        let b = generate_id("task", "same");
        assert_ne!(a, b);
    }

    #[test]
    fn test_no_duplicates_among_many_ids_with_one_slug() {
        let ids: std::collections::HashSet<String> = (0..20_000).map(|_| generate_id("task", "sales_navigator")).collect();
        assert_eq!(ids.len(), 20_000);
    }

    #[test]
    fn test_ensure_unique_id_regenerates_taken_id() {
        let taken = "abc-task-sales-navigator";
        let id = ensure_unique_id(taken.to_string(), "task", "sales_navigator", |id| id == taken);
        assert_ne!(id, taken);
        assert!(id.ends_with("-task-sales-navigator"));

        let free = ensure_unique_id("free".to_string(), "task", "x", |id| id == taken);
        assert_eq!(free, "free");
    }

    #[test]
    fn test_slug_is_capped() {
        let long = "word ".repeat(40);
        assert!(slugify(&long).len() <= MAX_SLUG_LEN);
        assert!(!slugify(&long).ends_with('-'));
    }
}
