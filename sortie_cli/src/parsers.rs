use jiff::{SignedDuration, Span, SpanRelativeTo};

/// Accepts `PT30S`, friendly spans like `30s` or `2m`, or a number of seconds.
pub fn parse_duration(input: &str) -> Result<SignedDuration, String> {
    if let Ok(duration) = input.parse::<SignedDuration>() {
        return Ok(duration);
    }

    if let Ok(duration) = input
        .parse::<Span>()
        .and_then(|span| span.to_duration(SpanRelativeTo::days_are_24_hours()))
    {
        return Ok(duration);
    }

    match input.parse::<u64>() {
        Ok(seconds) => i64::try_from(seconds)
            .map(SignedDuration::from_secs)
            .map_err(|_| format!("Duration {input} is too large")),
        Err(_) => Err(format!("Invalid duration {input}")),
    }
}

/// `auto` or `0` for every core, otherwise a thread count.
pub fn parse_threads(input: &str) -> Result<usize, String> {
    if input.eq_ignore_ascii_case("auto") {
        return Ok(0);
    }

    input
        .parse::<usize>()
        .map_err(|_| format!("Invalid thread count {input}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("PT30S"), Ok(SignedDuration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Ok(SignedDuration::from_secs(120)));
        assert_eq!(parse_duration("15"), Ok(SignedDuration::from_secs(15)));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-5").is_err());
    }

    #[test]
    fn test_parse_threads() {
        assert_eq!(parse_threads("auto"), Ok(0));
        assert_eq!(parse_threads("4"), Ok(4));
        assert!(parse_threads("many").is_err());
    }
}
