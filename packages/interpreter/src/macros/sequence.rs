use crate::value::SEQUENCE_SEPARATOR;

/// Split a sequence expression into its elements.
///
/// Elements are separated by `;`. An element `prefix[a,b]` expands to
/// `prefix` followed by every integer from `a` to `b` inclusive, counting down
/// when `a > b`. Sequences of more than `limit` elements are rejected before
/// any range is expanded.
pub fn parse_sequence(source: &str, limit: usize) -> Result<Vec<String>, String> {
    let mut items = Vec::new();
    for element in source.split(SEQUENCE_SEPARATOR) {
        let element = element.trim();
        if element.is_empty() {
            continue;
        }
        match element.find('[') {
            Some(open) if element.ends_with(']') => {
                let prefix = &element[..open];
                let range = &element[open + 1..element.len() - 1];
                let (from, to) = parse_range(range)
                    .ok_or_else(|| format!("invalid range '{}' in '{}'", range, element))?;
                let size = (i128::from(to) - i128::from(from)).unsigned_abs() + 1;
                if (items.len() as u128) + size > limit as u128 {
                    return Err(too_long(limit));
                }
                if from <= to {
                    items.extend((from..=to).map(|n| format!("{}{}", prefix, n)));
                } else {
                    items.extend((to..=from).rev().map(|n| format!("{}{}", prefix, n)));
                }
            }
            Some(_) => return Err(format!("unterminated range in '{}'", element)),
            None => {
                if items.len() >= limit {
                    return Err(too_long(limit));
                }
                items.push(element.to_string());
            }
        }
    }
    Ok(items)
}

fn too_long(limit: usize) -> String {
    format!("sequence has more than {} elements", limit)
}

fn parse_range(range: &str) -> Option<(i64, i64)> {
    let (from, to) = range.split_once(',')?;
    Some((from.trim().parse().ok()?, to.trim().parse().ok()?))
}
