//! Scanning of `?` placeholders outside quoted literals and identifiers.

const QUOTES: [char; 3] = ['\'', '"', '`'];

/// Calls `on_placeholder` with the byte offset of each `?` that is not inside quotes.
fn scan(sql: &str, mut on_placeholder: impl FnMut(usize)) {
    let mut quote: Option<char> = None;
    for (i, c) in sql.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if QUOTES.contains(&c) => quote = Some(c),
            None if c == '?' => on_placeholder(i),
            None => {}
        }
    }
}

pub fn count_placeholders(sql: &str) -> usize {
    let mut n = 0;
    scan(sql, |_| n += 1);
    n
}

/// Rewrite `?` placeholders as `$1, $2, ...` (PostgreSQL).
pub fn number_placeholders(sql: &str) -> String {
    let mut positions = Vec::new();
    scan(sql, |i| positions.push(i));
    let mut out = String::with_capacity(sql.len() + positions.len() * 2);
    let mut last = 0;
    for (n, pos) in positions.iter().enumerate() {
        out.push_str(&sql[last..*pos]);
        out.push('$');
        out.push_str(&(n + 1).to_string());
        last = pos + 1;
    }
    out.push_str(&sql[last..]);
    out
}

/// True when the fragment has an `OR` at parenthesis depth 0, so appending it
/// with `AND` would change its meaning unless it is wrapped.
pub fn needs_grouping(fragment: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut depth = 0i32;
    let mut word = String::new();
    let mut top_level_or = false;
    let mut flush = |word: &mut String, depth: i32| {
        if depth == 0 && word.eq_ignore_ascii_case("or") {
            top_level_or = true;
        }
        word.clear();
    };
    for c in fragment.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if QUOTES.contains(&c) => {
                flush(&mut word, depth);
                quote = Some(c);
            }
            None if c == '(' => {
                flush(&mut word, depth);
                depth += 1;
            }
            None if c == ')' => {
                flush(&mut word, depth);
                depth -= 1;
            }
            None if c.is_whitespace() => flush(&mut word, depth),
            None => word.push(c),
        }
    }
    flush(&mut word, depth);
    top_level_or
}
