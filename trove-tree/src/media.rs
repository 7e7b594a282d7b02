//! Media references
//!
//! Entities carry up to [`MAX_MEDIA`] opaque media references and one
//! designated primary reference. The primary must be one of the references;
//! otherwise it falls back to the first reference, or to nothing.

/// Maximum number of media references per entity.
pub const MAX_MEDIA: usize = 4;

/// Resolve the primary reference for a media set.
///
/// # Examples
///
/// ```
/// use trove_tree::media::resolve_primary;
///
/// let media = vec!["a.jpg".to_string(), "b.jpg".to_string()];
/// assert_eq!(resolve_primary(&media, Some("b.jpg")), Some("b.jpg".to_string()));
/// assert_eq!(resolve_primary(&media, Some("zzz.jpg")), Some("a.jpg".to_string()));
/// assert_eq!(resolve_primary(&[], Some("a.jpg")), None);
/// ```
pub fn resolve_primary(media: &[String], primary: Option<&str>) -> Option<String> {
    match primary {
        Some(p) if media.iter().any(|m| m == p) => Some(p.to_string()),
        _ => media.first().cloned(),
    }
}

/// Re-establish the media invariants in place: drop empty and duplicate
/// references, keep at most [`MAX_MEDIA`], and re-derive the primary.
pub fn normalize(media: &mut Vec<String>, primary: &mut Option<String>) {
    let mut seen = Vec::with_capacity(media.len());
    for reference in media.drain(..) {
        if !reference.is_empty() && !seen.contains(&reference) {
            seen.push(reference);
        }
    }
    seen.truncate(MAX_MEDIA);
    *primary = resolve_primary(&seen, primary.as_deref());
    *media = seen;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_caps_and_dedups() {
        let mut media = refs(&["a", "b", "a", "", "c", "d", "e"]);
        let mut primary = Some("e".to_string());
        normalize(&mut media, &mut primary);

        assert_eq!(media, refs(&["a", "b", "c", "d"]));
        // "e" was cut by the cap, so the primary falls back to the first ref.
        assert_eq!(primary.as_deref(), Some("a"));
    }

    #[test]
    fn test_normalize_keeps_valid_primary() {
        let mut media = refs(&["a", "b"]);
        let mut primary = Some("b".to_string());
        normalize(&mut media, &mut primary);
        assert_eq!(primary.as_deref(), Some("b"));
    }

    #[test]
    fn test_empty_media_clears_primary() {
        let mut media = Vec::new();
        let mut primary = Some("a".to_string());
        normalize(&mut media, &mut primary);
        assert!(primary.is_none());
    }
}
