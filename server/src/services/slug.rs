/// Normalizes a title or a looked-up slug into the canonical slug form.
///
/// Lowercases, turns every run of non-alphanumeric characters into a single
/// `-` and strips dashes from both ends, so `" Dev  Conf 2025 "` and
/// `"dev-conf-2025"` map to the same key.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}
