//! # Secret Naming
//!
//! Canonical secret names join a namespace, a watched directory, and a
//! filename into a single stable identifier. The canonical name is the join
//! key between files on disk and secret objects on the cluster; a version
//! suffix (`<name>.<n>`) is appended elsewhere and is never part of the
//! canonical name itself.

/// Sanitize one name component: trim surrounding whitespace, replace every
/// run of whitespace, `/`, and `.` with a single underscore, then strip
/// leading and trailing underscores.
fn sanitize(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    let mut pending_sep = false;
    for ch in part.trim().chars() {
        if ch.is_whitespace() || ch == '/' || ch == '.' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.push(ch);
    }
    out.trim_matches('_').to_string()
}

/// Derive the canonical secret name for a (namespace, directory, filename)
/// triple.
///
/// Pure and total: every input produces a deterministic name, including
/// degenerate cases such as empty components (which collapse to bare
/// underscore joins). The result is idempotent under re-sanitization.
pub fn canonicalize(namespace: &str, directory: &str, filename: &str) -> String {
    format!("{}_{}_{}", sanitize(namespace), sanitize(directory), sanitize(filename))
}

/// Split a versioned secret object name into its canonical base and version
/// suffix. A missing or non-numeric suffix is the implicit version 0.
pub fn parse_versioned_name(name: &str) -> (&str, u64) {
    match name.split_once('.') {
        Some((base, suffix)) => (base, suffix.parse().unwrap_or(0)),
        None => (name, 0),
    }
}

/// Render the platform object name for a canonical name at a given version.
/// Version 0 is implicit: the object carries the bare canonical name.
pub fn versioned_name(canonical: &str, version: u64) -> String {
    if version == 0 {
        canonical.to_string()
    } else {
        format!("{}.{}", canonical, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_basic() {
        assert_eq!(
            canonicalize("prod", "/run/secrets", "db_password.txt"),
            "prod_run_secrets_db_password_txt"
        );
    }

    #[test]
    fn test_canonicalize_trims_and_collapses() {
        assert_eq!(canonicalize("  ns  ", "./certs/", "tls. key"), "ns_certs_tls_key");
        // runs of separators collapse to one underscore
        assert_eq!(sanitize("a..//  b"), "a_b");
    }

    #[test]
    fn test_canonicalize_deterministic() {
        let a = canonicalize("ns", "/etc/app", "token");
        let b = canonicalize("ns", "/etc/app", "token");
        assert_eq!(a, b);
    }

    #[test]
    fn test_sanitize_idempotent() {
        for input in ["/run/secrets/", "a b.c", "", "___x___", "plain"] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once);
        }
    }

    #[test]
    fn test_canonicalize_empty_components() {
        // degenerate but deterministic
        assert_eq!(canonicalize("", "", ""), "__");
        assert_eq!(canonicalize("ns", "", "f"), "ns__f");
    }

    #[test]
    fn test_parse_versioned_name() {
        assert_eq!(parse_versioned_name("ns_dir_file.3"), ("ns_dir_file", 3));
        assert_eq!(parse_versioned_name("ns_dir_file"), ("ns_dir_file", 0));
        // non-numeric suffix is implicit version 0
        assert_eq!(parse_versioned_name("ns_dir_file.bak"), ("ns_dir_file", 0));
    }

    #[test]
    fn test_versioned_name_round_trip() {
        assert_eq!(versioned_name("ns_dir_file", 0), "ns_dir_file");
        assert_eq!(versioned_name("ns_dir_file", 2), "ns_dir_file.2");
        let name = versioned_name("ns_dir_file", 7);
        let (base, v) = parse_versioned_name(&name);
        assert_eq!((base, v), ("ns_dir_file", 7));
    }

    proptest::proptest! {
        #[test]
        fn prop_canonical_names_carry_no_separators(ns in ".*", dir in ".*", file in ".*") {
            let name = canonicalize(&ns, &dir, &file);
            proptest::prop_assert!(!name.contains('/'));
            proptest::prop_assert!(!name.contains('.'));
            proptest::prop_assert!(!name.chars().any(char::is_whitespace));
            proptest::prop_assert_eq!(&name, &canonicalize(&ns, &dir, &file));
        }

        #[test]
        fn prop_sanitize_is_idempotent(input in ".*") {
            let once = sanitize(&input);
            proptest::prop_assert_eq!(&sanitize(&once), &once);
        }
    }
}
