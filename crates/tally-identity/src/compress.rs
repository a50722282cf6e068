//! Run-length compression of the token's hex suffix.
//!
//! Runs of up to four identical characters are kept literally. A run of five
//! or more becomes the character followed by `.N.` where `N` is the run
//! length minus one, so eight zeros compress to `0.7.`.

/// Shortest run that is worth compressing.
const MIN_RUN: usize = 5;

/// Length of the hex rendering of port + IP.
pub const EXPANDED_LEN: usize = 36;

/// Compress a string of hex digits.
pub fn compress(hex: &str) -> String {
    let mut out = String::with_capacity(hex.len());
    let mut chars = hex.chars().peekable();
    while let Some(c) = chars.next() {
        let mut run = 1;
        while chars.next_if_eq(&c).is_some() {
            run += 1;
        }
        if run >= MIN_RUN {
            out.push(c);
            out.push('.');
            out.push_str(&(run - 1).to_string());
            out.push('.');
        } else {
            out.extend(std::iter::repeat_n(c, run));
        }
    }
    out
}

/// Expand a compressed suffix back into lowercase hex.
///
/// Segments split on `.` alternate literal and count. Each count `k` repeats
/// the last character of the preceding literal `k` more times. Returns
/// `None` for anything [`compress`] could not have produced from
/// [`EXPANDED_LEN`] hex digits.
pub fn expand(compressed: &str) -> Option<String> {
    let segments: Vec<&str> = compressed.split('.').collect();
    if segments.len() % 2 == 0 {
        return None;
    }

    let mut out = String::with_capacity(EXPANDED_LEN);
    for (i, seg) in segments.iter().enumerate() {
        if i % 2 == 0 {
            if !seg.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
                return None;
            }
            out.push_str(seg);
        } else {
            let last = segments[i - 1].chars().last()?;
            let count = parse_count(seg)?;
            out.extend(std::iter::repeat_n(last, count));
        }
        if out.len() > EXPANDED_LEN {
            return None;
        }
    }
    Some(out)
}

/// Decimal run count without sign or leading zeros.
fn parse_count(seg: &str) -> Option<usize> {
    if seg.is_empty() || seg.starts_with('0') || !seg.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let count: usize = seg.parse().ok()?;
    (count < EXPANDED_LEN).then_some(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_runs_stay_literal() {
        assert_eq!(compress("aaaab"), "aaaab");
        assert_eq!(compress("abcd"), "abcd");
    }

    #[test]
    fn long_runs_use_count_minus_one() {
        assert_eq!(compress("00000000"), "0.7.");
        assert_eq!(compress("00000"), "0.4.");
        assert_eq!(compress("1f00000000ff"), "1f0.7.ff");
    }

    #[test]
    fn typical_ipv4_suffix() {
        // port 8080, ::ffff:127.0.0.1
        let hex = "1f9000000000000000000000ffff7f000001";
        let c = compress(hex);
        assert_eq!(c, "1f90.20.ffff7f0.4.1");
        assert_eq!(expand(&c).as_deref(), Some(hex));
    }

    #[test]
    fn expand_literal_only() {
        assert_eq!(expand("abc").as_deref(), Some("abc"));
    }

    #[test]
    fn expand_rejects_even_segment_count() {
        assert_eq!(expand("0.7"), None);
        assert_eq!(expand("a.b.c.d"), None);
    }

    #[test]
    fn expand_rejects_count_without_preceding_char() {
        assert_eq!(expand(".7.a"), None);
    }

    #[test]
    fn expand_rejects_bad_counts() {
        assert_eq!(expand("0.x."), None);
        assert_eq!(expand("0.07."), None);
        assert_eq!(expand("0.0."), None);
        assert_eq!(expand("0.-1."), None);
        assert_eq!(expand("0.99999999999999999999999."), None);
    }

    #[test]
    fn expand_rejects_non_lowercase_hex() {
        assert_eq!(expand("AB"), None);
        assert_eq!(expand("zz"), None);
    }

    #[test]
    fn expand_rejects_overlong_output() {
        assert_eq!(expand("0.35.1"), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn expand_inverts_compress(hex in "[0-9a-f]{36}") {
                prop_assert_eq!(expand(&compress(&hex)), Some(hex));
            }

            #[test]
            fn expand_inverts_compress_on_runny_input(
                runs in proptest::collection::vec((0u8..16, 1usize..12), 1..8)
            ) {
                let mut hex: String = runs
                    .iter()
                    .flat_map(|&(d, n)| std::iter::repeat_n(char::from_digit(u32::from(d), 16).unwrap(), n))
                    .collect();
                hex.truncate(EXPANDED_LEN);
                prop_assert_eq!(expand(&compress(&hex)), Some(hex));
            }
        }
    }
}
