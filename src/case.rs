//! Case conversion for default column and table names: field `authorId` maps to column `author_id`.

/// Convert a single identifier from camelCase (or PascalCase) to snake_case.
/// e.g. "authorId" -> "author_id", "BookTag" -> "book_tag"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
