//! jq pre-filter for input documents, backed by jaq.
use anyhow::{Context, Result, anyhow};
use jaq_core::{load, Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value;

/// Run `filter_src` on `input`; every value the filter yields becomes a sample.
pub fn run_jaq(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader
        .load(&arena, program)
        .map_err(|errs| {
            rejected(filter_src, "syntax error", errs.iter().map(|(_, e)| format!("{e:?}")))
        })?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|errs| {
            let names = errs
                .into_iter()
                .flat_map(|(_, undefined)| undefined)
                .map(|(name, kind)| format!("`{name}` ({kind:?})"));
            rejected(filter_src, "undefined name", names)
        })?;

    let inputs = RcIter::new(core::iter::empty());
    let mut it = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    while let Some(item) = it.next() {
        let v = item.map_err(|e| anyhow!("jq runtime error: {e:?}"))?;
        // Val: Display -> JSON text
        let value = serde_json::from_str::<Value>(&v.to_string())
            .with_context(|| format!("jq output is not JSON: {v}"))?;
        out.push(value);
    }
    Ok(out)
}

/// One error for everything jaq rejected while preparing `filter_src`.
fn rejected<I>(filter_src: &str, stage: &str, details: I) -> anyhow::Error
where
    I: IntoIterator<Item = String>,
{
    let details: Vec<String> = details.into_iter().collect();
    anyhow!("{stage} in jq filter `{filter_src}`: {}", details.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_outputs_become_samples() {
        let input = json!({"data": [{"id": 1}, {"id": 2}]});
        let out = run_jaq(".data[]", &input).unwrap();
        assert_eq!(out, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[test]
    fn bad_filter_is_an_error() {
        let error = run_jaq(".data[", &json!({})).unwrap_err();
        assert!(error.to_string().starts_with("syntax error in jq filter `.data[`"));

        let error = run_jaq("no_such_function", &json!({})).unwrap_err().to_string();
        assert!(error.starts_with("undefined name in jq filter"));
        assert!(error.contains("`no_such_function`"));
    }
}
