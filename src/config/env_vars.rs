/// Name of the environment variable `value` refers to, if the whole value is
/// a single `${VAR}`, `$VAR` or `%VAR%` reference.
pub fn parse_env_reference(value: &str) -> Option<&str> {
    parse_reference(value).map(|(name, _)| name)
}

/// Variable name plus whether the form is explicit (`${VAR}`, `%VAR%`).
/// A bare `$VAR` is not explicit: it may just be a password starting with `$`.
fn parse_reference(value: &str) -> Option<(&str, bool)> {
    let value = value.trim();

    let (name, explicit) = if let Some(inner) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        (inner, true)
    } else if let Some(inner) = value.strip_prefix('%').and_then(|v| v.strip_suffix('%')) {
        (inner, true)
    } else if let Some(inner) = value.strip_prefix('$') {
        (inner, false)
    } else {
        return None;
    };

    if is_valid_var_name(name) {
        Some((name, explicit))
    } else {
        None
    }
}

/// Resolve a secret that may be an environment variable reference.
///
/// Literal values are returned unchanged, and so is a bare `$VAR` whose
/// variable is unset. An explicit `${VAR}` or `%VAR%` reference to an unset
/// variable yields `Err` with the variable name.
pub fn resolve_secret(value: &str) -> Result<String, String> {
    match parse_reference(value) {
        Some((name, explicit)) => match std::env::var(name) {
            Ok(resolved) => Ok(resolved),
            Err(_) if !explicit => Ok(value.to_string()),
            Err(_) => Err(name.to_string()),
        },
        None => Ok(value.to_string()),
    }
}

fn is_valid_var_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|c| c.is_ascii_alphanumeric() || c == b'_')
        && !name.as_bytes()[0].is_ascii_digit()
}
