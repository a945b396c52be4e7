// Sequence Similarity
//
// Ratcliff/Obershelp "gestalt" matching: find the longest common block,
// recurse on both sides, and report 2*M/T where M is the number of matched
// characters and T the combined length.

use std::collections::HashMap;

/// Similarity ratio of two strings in `[0, 1]`.
///
/// Works on Unicode scalar values. Two empty strings are identical (1.0).
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let matched = matching_chars(&a, &b);
    2.0 * matched as f64 / total as f64
}

/// Total size of all matching blocks
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut b_index: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, &c) in b.iter().enumerate() {
        b_index.entry(c).or_default().push(j);
    }

    let mut total = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, size) = longest_match(a, &b_index, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        total += size;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            queue.push((i + size, ahi, j + size, bhi));
        }
    }

    total
}

/// Longest block `a[i..i+k] == b[j..j+k]` inside the given ranges.
///
/// Ties go to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b_index: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);

    // run length of the match ending at a[i-1], b[j]
    let mut prev: HashMap<usize, usize> = HashMap::new();

    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b_index.get(c) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = if j > 0 { prev.get(&(j - 1)).copied().unwrap_or(0) } else { 0 } + 1;
                next.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        prev = next;
    }

    (best_i, best_j, best_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[rstest]
    #[case("", "", 1.0)]
    #[case("abc", "", 0.0)]
    #[case("aphids", "aphids", 1.0)]
    #[case("abcd", "bcde", 0.75)]
    #[case("abc", "xyz", 0.0)]
    // "a" matches first, then "b" on the right side; "c" stays unmatched
    #[case("abc", "acb", 2.0 * 2.0 / 6.0)]
    fn test_sequence_ratio(#[case] a: &str, #[case] b: &str, #[case] expected: f64) {
        assert!(close(sequence_ratio(a, b), expected), "{} vs {}", a, b);
    }

    #[test]
    fn test_symmetric_for_simple_cases() {
        assert!(close(sequence_ratio("leaf spot", "leaf"), sequence_ratio("leaf", "leaf spot")));
    }

    #[test]
    fn test_substring_ratio() {
        // "aphids" (6) inside a 33 char query: 2*6/39
        let query = "how to control aphids in mustard?";
        assert!(close(sequence_ratio(query, "aphids"), 12.0 / 39.0));
    }

    #[test]
    fn test_ratio_bounds() {
        let r = sequence_ratio("xyzabc123", "fruit borer");
        assert!((0.0..=1.0).contains(&r));
    }
}
