//! Minimal command template engine
//!
//! Supports identifier access `{{.key}}` over a flat string map, the
//! only template form provider commands use. Richer constructs are
//! rejected rather than half-supported.

use std::collections::HashMap;

use thiserror::Error;

/// Template parse and resolution errors; both fail the step
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unclosed '{{{{' in template")]
    Unclosed,

    #[error("unsupported template expression '{{{{{0}}}}}'")]
    Unsupported(String),

    #[error("unknown template variable '{0}'")]
    UnknownVariable(String),
}

/// Substitute every `{{.key}}` in `template` with the matching context
/// value.
pub fn render(template: &str, context: &HashMap<String, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or(TemplateError::Unclosed)?;

        let expr = after[..end].trim();
        let key = expr
            .strip_prefix('.')
            .filter(|key| !key.is_empty() && is_identifier(key))
            .ok_or_else(|| TemplateError::Unsupported(expr.to_string()))?;

        let value = context
            .get(key)
            .ok_or_else(|| TemplateError::UnknownVariable(key.to_string()))?;
        out.push_str(value);

        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

fn is_identifier(key: &str) -> bool {
    key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitutes_variables() {
        let ctx = context(&[("releaseName", "my-app"), ("chartPath", "./c")]);
        let resolved = render("helm template {{.releaseName}} {{.chartPath}}", &ctx).unwrap();
        assert_eq!(resolved, "helm template my-app ./c");
    }

    #[test]
    fn test_whitespace_inside_braces_is_accepted() {
        let ctx = context(&[("namespace", "prod")]);
        assert_eq!(render("-n {{ .namespace }}", &ctx).unwrap(), "-n prod");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(
            render("terraform plan -out=tfplan", &context(&[])).unwrap(),
            "terraform plan -out=tfplan"
        );
    }

    #[test]
    fn test_unknown_variable_is_an_error() {
        let err = render("{{.missing}}", &context(&[])).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownVariable(key) if key == "missing"));
    }

    #[test]
    fn test_unclosed_braces_are_an_error() {
        let err = render("echo {{.name", &context(&[("name", "x")])).unwrap_err();
        assert!(matches!(err, TemplateError::Unclosed));
    }

    #[test]
    fn test_non_field_expression_is_unsupported() {
        let err = render("{{range .items}}", &context(&[])).unwrap_err();
        assert!(matches!(err, TemplateError::Unsupported(_)));

        let err = render("{{.bad key}}", &context(&[])).unwrap_err();
        assert!(matches!(err, TemplateError::Unsupported(_)));
    }
}
