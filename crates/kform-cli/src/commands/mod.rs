//! CLI commands

pub mod cat;
pub mod create;
pub mod fn_run;
pub mod kustomize;

use indexmap::IndexMap;

use crate::error::{CliError, Result};

/// Parse repeated `KEY=VALUE` values, keeping their order
pub(crate) fn parse_pairs(what: &str, values: &[String]) -> Result<IndexMap<String, String>> {
    values
        .iter()
        .map(|value| match value.split_once('=') {
            Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
            _ => Err(CliError::usage(format!(
                "{} must have a value of the form 'key=value': {}",
                what, value
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let pairs = parse_pairs("--label", &["b=2".into(), "a=x=y".into()]).unwrap();
        assert_eq!(
            pairs.into_iter().collect::<Vec<_>>(),
            [("b".to_string(), "2".to_string()), ("a".to_string(), "x=y".to_string())]
        );
        assert!(matches!(
            parse_pairs("--label", &["novalue".into()]),
            Err(CliError::Usage { .. })
        ));
    }
}
