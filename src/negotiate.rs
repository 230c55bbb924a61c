//! `Accept-Encoding` negotiation.

/// Picks the best token from `supported` for the client's `Accept-Encoding`
/// declaration.
///
/// Tokens with a zero weight are excluded. A `*` entry stands for every
/// supported token the client did not name explicitly. Among acceptable
/// tokens the highest weight wins, ties going to the earlier entry in
/// `supported`. `identity` is implicitly acceptable to the client, but it is
/// only returned when it appears in `supported`.
///
/// Returns `None` when nothing in `supported` is acceptable, including when
/// the declaration is empty.
pub fn select_encoding<'a>(supported: &[&'a str], accept_encoding: &str) -> Option<&'a str> {
    let declared: Vec<(&str, f32)> = accept_encoding
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_encoding_with_quality)
        .filter(|(encoding, _)| !encoding.is_empty())
        .collect();

    let weight_of = |token: &str| -> Option<f32> {
        declared
            .iter()
            .find(|(encoding, _)| encoding.eq_ignore_ascii_case(token))
            .map(|(_, quality)| *quality)
            .or_else(|| {
                declared
                    .iter()
                    .find(|(encoding, _)| *encoding == "*")
                    .map(|(_, quality)| *quality)
            })
            .or_else(|| token.eq_ignore_ascii_case("identity").then_some(1.0))
    };

    let mut best: Option<(&'a str, f32)> = None;
    for &token in supported {
        let Some(quality) = weight_of(token) else {
            continue;
        };
        if quality <= 0.0 {
            continue;
        }
        match best {
            Some((_, best_quality)) if quality <= best_quality => {}
            _ => best = Some((token, quality)),
        }
    }

    best.map(|(token, _)| token)
}

/// Parses an encoding entry like "gzip" or "br;q=0.8" into (encoding, quality).
fn parse_encoding_with_quality(s: &str) -> (&str, f32) {
    let mut parts = s.split(';');
    let encoding = parts.next().unwrap_or("").trim();

    let quality = parts
        .filter_map(|param| {
            let (name, value) = param.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("q")
                .then(|| value.trim().parse::<f32>().ok())
                .flatten()
                .filter(|q| q.is_finite())
        })
        .next()
        .unwrap_or(1.0);

    (encoding, quality.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_simple() {
        assert_eq!(select_encoding(&["br"], "br"), Some("br"));
        assert_eq!(select_encoding(&["br"], "gzip, deflate, br"), Some("br"));
        assert_eq!(select_encoding(&["br"], "BR"), Some("br"));
    }

    #[test]
    fn test_select_unsupported() {
        assert_eq!(select_encoding(&["br"], "gzip"), None);
        assert_eq!(select_encoding(&["br"], "identity"), None);
        assert_eq!(select_encoding(&["br"], ""), None);
    }

    #[test]
    fn test_select_quality_zero() {
        assert_eq!(select_encoding(&["br"], "br;q=0"), None);
        assert_eq!(select_encoding(&["br"], "gzip, br;q=0.0"), None);
        assert_eq!(select_encoding(&["br"], "br;q=0.001"), Some("br"));
        // Non-finite weights are ignored like any other unparseable weight
        assert_eq!(select_encoding(&["br"], "br;q=NaN"), Some("br"));
        assert_eq!(select_encoding(&["br", "gzip"], "br;q=nan, gzip;q=0.5"), Some("br"));
    }

    #[test]
    fn test_select_wildcard() {
        assert_eq!(select_encoding(&["br"], "*"), Some("br"));
        assert_eq!(select_encoding(&["br"], "gzip;q=1.0, *;q=0.5"), Some("br"));
        assert_eq!(select_encoding(&["br"], "*;q=0"), None);
        // An explicit weight beats the wildcard
        assert_eq!(select_encoding(&["br"], "br;q=0, *"), None);
    }

    #[test]
    fn test_select_highest_weight() {
        assert_eq!(
            select_encoding(&["gzip", "br"], "gzip;q=0.5, br;q=0.9"),
            Some("br")
        );
        assert_eq!(
            select_encoding(&["gzip", "br"], "gzip;q=1.0, br;q=0.9"),
            Some("gzip")
        );
    }

    #[test]
    fn test_select_ties_follow_server_order() {
        assert_eq!(select_encoding(&["br", "gzip"], "gzip, br"), Some("br"));
        assert_eq!(select_encoding(&["gzip", "br"], "br, gzip"), Some("gzip"));
    }

    #[test]
    fn test_identity_is_implicit() {
        assert_eq!(select_encoding(&["br", "identity"], "gzip"), Some("identity"));
        assert_eq!(
            select_encoding(&["br", "identity"], "gzip, identity;q=0"),
            None
        );
    }

    #[test]
    fn test_parse_quality() {
        assert_eq!(parse_encoding_with_quality("br"), ("br", 1.0));
        assert_eq!(parse_encoding_with_quality("br;q=0.8"), ("br", 0.8));
        assert_eq!(parse_encoding_with_quality("br ; Q=0.5"), ("br", 0.5));
        assert_eq!(parse_encoding_with_quality("br;q=bogus"), ("br", 1.0));
        assert_eq!(parse_encoding_with_quality("br;q=7"), ("br", 1.0));
        assert_eq!(parse_encoding_with_quality("br;q=nan"), ("br", 1.0));
        assert_eq!(parse_encoding_with_quality("br;q=-inf"), ("br", 1.0));
    }
}
