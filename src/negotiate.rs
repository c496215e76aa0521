//! `Accept` header negotiation.
//!
//! Media ranges are parsed with the `mime` crate. Each offered type takes the
//! quality of the most specific range that matches it, so `application/json;q=0`
//! rejects JSON even when `*/*` accepts everything else.

use std::cmp::Ordering;

use mime::Mime;

pub const JSON: &str = "application/json";
pub const XML: &str = "application/xml";
pub const TEXT: &str = "text/plain";
pub const HTML: &str = "text/html";

/// Types the result pipeline can produce, in preference order.
pub const OFFERED: [&str; 4] = [JSON, XML, TEXT, HTML];

#[derive(Debug)]
struct MediaRange {
    mime: Mime,
    quality: f32,
    position: usize,
}

impl MediaRange {
    fn specificity(&self) -> u8 {
        match (self.mime.type_() == mime::STAR, self.mime.subtype() == mime::STAR) {
            (true, _) => 0,
            (false, true) => 1,
            (false, false) => 2,
        }
    }

    fn matches(&self, kind: &str, subtype: &str) -> bool {
        let range_kind = self.mime.type_();
        let range_subtype = self.mime.subtype();
        (range_kind == mime::STAR || range_kind.as_str().eq_ignore_ascii_case(kind))
            && (range_subtype == mime::STAR || range_subtype.as_str().eq_ignore_ascii_case(subtype))
    }
}

/// Parses the ranges of `accept`; malformed ranges and invalid `q` values are dropped.
fn parse(accept: &str) -> Vec<MediaRange> {
    accept
        .split(',')
        .enumerate()
        .filter_map(|(position, part)| {
            let part = part.trim();
            let mime = if part == "*" || part.starts_with("*;") {
                format!("*/*{}", &part[1..]).parse::<Mime>().ok()?
            } else {
                part.parse::<Mime>().ok()?
            };

            let quality = match mime.get_param("q") {
                Some(value) => {
                    let quality = value.as_str().trim().parse::<f32>().ok()?;
                    if !(0.0..=1.0).contains(&quality) {
                        return None;
                    }
                    quality
                }
                None => 1.0,
            };

            Some(MediaRange {
                mime,
                quality,
                position,
            })
        })
        .collect()
}

/// How one offered type fares against the header.
struct Candidate<'a> {
    offered: &'static str,
    range: &'a MediaRange,
}

impl Candidate<'_> {
    fn rank(&self, other: &Self) -> Ordering {
        self.range
            .quality
            .total_cmp(&other.range.quality)
            .then(self.range.specificity().cmp(&other.range.specificity()))
            .then(other.range.position.cmp(&self.range.position))
    }
}

/// Picks the best of `offered` for `accept`, or `fallback` when nothing is acceptable.
///
/// Every offered type is scored by its most specific matching range. The
/// highest quality wins; ties go to the more specific match, then the earlier
/// range in the header, then the earlier type in `offered`.
pub fn negotiate(accept: &str, offered: &[&'static str], fallback: &'static str) -> &'static str {
    let ranges = parse(accept);

    let mut best: Option<Candidate<'_>> = None;
    for &candidate in offered {
        let Some((kind, subtype)) = candidate.split_once('/') else {
            continue;
        };
        let matched = ranges
            .iter()
            .filter(|range| range.matches(kind, subtype))
            .max_by(|a, b| {
                a.specificity()
                    .cmp(&b.specificity())
                    .then(b.position.cmp(&a.position))
            });
        let Some(range) = matched else {
            continue;
        };
        if range.quality <= 0.0 {
            continue;
        }

        let current = Candidate {
            offered: candidate,
            range,
        };
        match &best {
            Some(held) if current.rank(held) != Ordering::Greater => {}
            _ => best = Some(current),
        }
    }

    best.map(|c| c.offered).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(accept: &str) -> &'static str {
        negotiate(accept, &OFFERED, JSON)
    }

    #[test]
    fn test_empty_or_unknown_falls_back_to_json() {
        assert_eq!(pick(""), JSON);
        assert_eq!(pick("image/png"), JSON);
        assert_eq!(pick("garbage"), JSON);
    }

    #[test]
    fn test_exact_types() {
        assert_eq!(pick("application/xml"), XML);
        assert_eq!(pick("text/plain"), TEXT);
        assert_eq!(pick("TEXT/HTML"), HTML);
    }

    #[test]
    fn test_quality_ordering() {
        assert_eq!(pick("application/json;q=0.5, text/html;q=0.9"), HTML);
        assert_eq!(pick("text/plain;q=0, application/xml;q=0.1"), XML);
    }

    #[test]
    fn test_browser_accept_prefers_html() {
        assert_eq!(
            pick("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
            HTML
        );
    }

    #[test]
    fn test_wildcards() {
        assert_eq!(pick("*/*"), JSON);
        assert_eq!(pick("*"), JSON);
        assert_eq!(pick("text/*"), TEXT);
        assert_eq!(pick("text/*, text/html"), HTML);
    }

    #[test]
    fn test_rejected_everything_falls_back() {
        assert_eq!(pick("*/*;q=0"), JSON);
    }

    #[test]
    fn test_specific_rejection_beats_wildcard() {
        assert_eq!(pick("*/*, application/json;q=0"), XML);
        assert_eq!(pick("text/*;q=0.9, text/plain;q=0"), HTML);
    }

    #[test]
    fn test_invalid_quality_drops_the_range() {
        assert_eq!(pick("application/xml;q=abc, text/plain"), TEXT);
        assert_eq!(pick("application/xml;q=2, text/plain;q=0.5"), TEXT);
        assert_eq!(pick("application/xml;q=abc"), JSON);
    }

    #[test]
    fn test_negotiation_is_stable() {
        let accept = "text/plain;q=0.8, application/xml";
        assert_eq!(pick(accept), pick(accept));
    }
}
