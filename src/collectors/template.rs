use crate::constants::USER_PLACEHOLDER;
use crate::errors::CollectError;

/// Expand `{name}` placeholders in one left-to-right pass.
///
/// Unknown placeholders are kept verbatim and substituted values are never
/// expanded again, so a username containing braces cannot inject another
/// placeholder.
pub fn expand_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open..];

        let replaced = after.find('}').and_then(|close| {
            let key = &after[1..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (close, *value))
        });

        match replaced {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = &after[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Resolve a search-root template for one user.
///
/// Every `{user}` is replaced with `username`. The result is not checked
/// against the remote host.
///
/// # Errors
///
/// `InvalidTemplate` when the template is empty or only whitespace.
pub fn resolve(template: &str, username: &str) -> Result<String, CollectError> {
    if template.trim().is_empty() {
        return Err(CollectError::InvalidTemplate {
            template: template.to_string(),
            user: username.to_string(),
        });
    }

    let key = &USER_PLACEHOLDER[1..USER_PLACEHOLDER.len() - 1];
    Ok(expand_placeholders(template, &[(key, username)]))
}
