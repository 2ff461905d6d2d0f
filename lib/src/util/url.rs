/// Canonical form of a node URL: surrounding whitespace and trailing slashes removed.
///
/// Every URL is normalized before it is stored or compared, so
/// `http://node-b:8080/` and `http://node-b:8080` refer to the same party.
pub fn normalize(url: &str) -> String {
    url.trim().trim_end_matches('/').to_owned()
}

/// Joins a normalized base URL and an endpoint path.
pub fn join(base: &str, path: &str) -> String {
    format!("{}/{}", normalize(base), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_removed() {
        assert_eq!(
            normalize("http://node-b:8080/"),
            "http://node-b:8080",
            "trailing slash should be dropped"
        );
        assert_eq!(
            normalize(" http://node-b:8080// "),
            "http://node-b:8080",
            "repeated slashes and whitespace should be dropped"
        );
    }

    #[test]
    fn join_inserts_exactly_one_slash() {
        assert_eq!(
            join("http://node-b:8080/", "/partyinfo"),
            "http://node-b:8080/partyinfo",
            "joined url should contain a single separator"
        );
    }
}
