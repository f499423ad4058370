//! Title Normalization
//!
//! Strips border quotes and redundant whitespace from scenario titles. Titles
//! may contain variable references wrapped in quotes (`'<variable>'`), and a
//! naive trim would eat the quote belonging to a variable sitting at the
//! string border, so stripping is variable-aware.
//!
//! Operates on `char` positions so border and distance arithmetic stays
//! correct for non-ASCII titles.

/// Position of the first occurrence of `pattern` in `chars`, or -1.
fn find_seq(chars: &[char], pattern: &[char]) -> isize {
    if pattern.is_empty() || chars.len() < pattern.len() {
        return -1;
    }
    for i in 0..=(chars.len() - pattern.len()) {
        if &chars[i..i + pattern.len()] == pattern {
            return i as isize;
        }
    }
    -1
}

/// Position of the last occurrence of `pattern` in `chars`, or -1.
fn rfind_seq(chars: &[char], pattern: &[char]) -> isize {
    if pattern.is_empty() || chars.len() < pattern.len() {
        return -1;
    }
    for i in (0..=(chars.len() - pattern.len())).rev() {
        if &chars[i..i + pattern.len()] == pattern {
            return i as isize;
        }
    }
    -1
}

/// Position of the first occurrence of `symbol` at or after `from`, or -1.
fn find_from(chars: &[char], symbol: char, from: usize) -> isize {
    for (i, c) in chars.iter().enumerate().skip(from) {
        if *c == symbol {
            return i as isize;
        }
    }
    -1
}

/// Position of the last occurrence of `symbol` in `[0, end_excl)`, or -1.
fn rfind_before(chars: &[char], symbol: char, end_excl: usize) -> isize {
    let end_excl = end_excl.min(chars.len());
    for i in (0..end_excl).rev() {
        if chars[i] == symbol {
            return i as isize;
        }
    }
    -1
}

fn count(chars: &[char], symbol: char) -> usize {
    chars.iter().filter(|c| **c == symbol).count()
}

fn is_balanced(chars: &[char], symbol: char) -> bool {
    count(chars, symbol) % 2 == 0
}

/// Positions of the outermost `symbol<` opener and `>symbol` closer. The
/// closer position points at the symbol itself, not the `>`. -1 when absent.
fn var_boundary_positions(chars: &[char], symbol: char) -> (isize, isize) {
    let var_start = find_seq(chars, &[symbol, '<']);
    let mut var_end = rfind_seq(chars, &['>', symbol]);
    if var_end != -1 {
        var_end += 1;
    }
    (var_start, var_end)
}

/// Border stripping for strings whose outermost symbols may belong to a
/// variable reference rather than to a quoted title.
fn handle_variables(chars: Vec<char>, symbol: char, balanced: bool) -> Vec<char> {
    if chars.is_empty() {
        return chars;
    }
    let start: isize = 0;
    let end = chars.len() - 1;
    let symbol_start = find_from(&chars, symbol, 0);
    let symbol_end = rfind_before(&chars, symbol, chars.len());
    let (var_start, var_end) = var_boundary_positions(&chars, symbol);

    if var_start == symbol_start && var_end == symbol_end {
        // Outermost symbols exactly bound a variable reference.
        return chars;
    } else if var_start == symbol_start && symbol_start == start && chars[end] == symbol {
        // Variable at the start, stray quote at the end.
        return chars[..end].to_vec();
    } else if var_end == symbol_end && symbol_end == end as isize && chars[0] == symbol {
        // Variable at the end, stray quote at the start.
        return chars[1..].to_vec();
    }

    if balanced && chars[0] == symbol && chars[end] == symbol {
        return chars[1..end].to_vec();
    }

    chars
}

/// One stripping pass for a single quote symbol.
fn strip_symbol(chars: Vec<char>, symbol: char) -> Vec<char> {
    if chars.is_empty() {
        return chars;
    }
    let end = chars.len() - 1;
    if !(chars[0] == symbol || chars[end] == symbol) {
        return chars;
    }

    let balanced = is_balanced(&chars, symbol);
    let mut chars = handle_variables(chars, symbol, balanced);
    if chars.is_empty() {
        return chars;
    }

    // Variable handling might have fixed the balance, hence recalculating.
    let end = chars.len() - 1;
    let balanced = is_balanced(&chars, symbol);
    let occurrences = count(&chars, symbol);

    if !balanced && occurrences == 1 {
        // Trailing symbol at the beginning or at the end.
        if chars[0] == symbol {
            chars = chars[1..].to_vec();
        } else if chars[end] == symbol {
            chars = chars[..end].to_vec();
        }
    } else if !balanced && occurrences == 3 {
        // Keep the pair with the shortest distance, omit the farthest quote.
        let left_distance = find_from(&chars, symbol, 1);
        let right_distance = end as isize - rfind_before(&chars, symbol, end);
        if left_distance > right_distance {
            chars = chars[1..].to_vec();
        } else {
            chars = chars[..end].to_vec();
        }
    } else if !balanced && occurrences > 3 {
        // Apostrophes and nested quotes we cannot fully disambiguate; strip a
        // border pair only when neither border belongs to a variable.
        let (var_start, var_end) = var_boundary_positions(&chars, symbol);
        if var_start != 0
            && var_end != end as isize
            && chars[0] == symbol
            && chars[end] == symbol
        {
            chars = chars[1..end].to_vec();
        }
    }

    // Trim spaces only; inner whitespace is collapsed by the caller.
    let mut s = 0;
    let mut e = chars.len();
    while s < e && chars[s] == ' ' {
        s += 1;
    }
    while e > s && chars[e - 1] == ' ' {
        e -= 1;
    }
    chars[s..e].to_vec()
}

/// Strip border quotes from a title, one configured symbol at a time in the
/// given order, then collapse any whitespace run to a single space and trim.
pub fn normalize_title(title: &str, symbols: &str) -> String {
    let mut chars: Vec<char> = title.chars().collect();
    for symbol in symbols.chars() {
        chars = strip_symbol(chars, symbol);
    }
    let collapsed: String = chars.into_iter().collect();
    collapsed.split_whitespace().collect::<Vec<_>>().join(" ")
}
