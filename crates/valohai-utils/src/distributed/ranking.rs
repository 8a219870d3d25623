use std::collections::HashMap;

/// Map member ids to dense 0-based ranks.
///
/// Ids sort numerically when every one of them parses as an integer, and
/// lexicographically otherwise. The fallback is all-or-nothing.
pub fn compute_member_id_ranks<S: AsRef<str>>(member_ids: &[S]) -> HashMap<String, usize> {
    let ids: Vec<&str> = member_ids.iter().map(AsRef::as_ref).collect();
    let numeric: Option<Vec<i128>> = ids.iter().map(|id| parse_integer(id)).collect();

    let mut order: Vec<usize> = (0..ids.len()).collect();
    match numeric {
        Some(values) => order.sort_by_key(|&i| values[i]),
        None => order.sort_by_key(|&i| ids[i]),
    }

    order.into_iter().enumerate().map(|(rank, i)| (ids[i].to_string(), rank)).collect()
}

/// Integer literal with surrounding whitespace, an optional sign and single
/// underscores between digits, e.g. `" 1_000 "`.
fn parse_integer(id: &str) -> Option<i128> {
    let trimmed = id.trim();
    let digits = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);
    let well_formed = !digits.is_empty()
        && digits.split('_').all(|group| !group.is_empty() && group.bytes().all(|b| b.is_ascii_digit()));
    if !well_formed {
        return None;
    }
    trimmed.replace('_', "").parse().ok()
}
