//! Identifier renaming and auxiliary-call rewriting
//!
//! Both transforms are pure: they take an expression by reference and build a new one.

use indexmap::{IndexMap, IndexSet};

use crate::ast::{is_identifier, Expr};
use crate::error::{CodegenError, CodegenResult, Phase};

/// One-shot identifier renaming table.
///
/// Applied once, not iterated to a fixpoint, so cycles are rejected on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMap {
    entries: IndexMap<String, String>,
}

impl NameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> CodegenResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries: IndexMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        for start in entries.keys() {
            let mut current = start;
            let mut steps = 0;
            while let Some(next) = entries.get(current) {
                if next == current {
                    break;
                }
                if next == start || steps > entries.len() {
                    return Err(CodegenError::collision(
                        start.as_str(),
                        "name map contains a renaming cycle",
                    ));
                }
                current = next;
                steps += 1;
            }
        }

        Ok(Self { entries })
    }

    /// Map every name to `name + suffix`
    pub fn with_suffix<'a, I>(names: I, suffix: &str) -> CodegenResult<Self>
    where
        I: IntoIterator<Item = &'a String>,
    {
        Self::from_pairs(names.into_iter().map(|n| (n.clone(), format!("{}{}", n, suffix))))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Image of `name`, or `name` itself when unmapped
    pub fn apply<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).unwrap_or(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Rename every free identifier of `expr` that appears in `map`.
///
/// Function names at call sites are left alone. An empty map returns the input unchanged.
pub fn map_names(expr: &Expr, map: &NameMap) -> CodegenResult<Expr> {
    if map.is_empty() {
        return Ok(expr.clone());
    }
    if let Some((from, to)) = map.iter().find(|(_, to)| !is_identifier(to)) {
        return Err(CodegenError::malformed(
            "",
            Phase::Finalize,
            format!("cannot rename `{}` to `{}`: not an identifier", from, to),
        ));
    }
    Ok(rename(expr, map))
}

fn rename(expr: &Expr, map: &NameMap) -> Expr {
    match expr {
        Expr::Number(_) => expr.clone(),
        Expr::Ident(name) => Expr::Ident(map.apply(name).to_string()),
        Expr::Neg(inner) => Expr::Neg(Box::new(rename(inner, map))),
        Expr::Binary { op, lhs, rhs } => Expr::binary(*op, rename(lhs, map), rename(rhs, map)),
        Expr::Call { name, args } => Expr::Call {
            name: name.clone(),
            args: args.iter().map(|arg| rename(arg, map)).collect(),
        },
    }
}

/// Append `extra` as a trailing argument to every call of a function in `functions`.
///
/// Must run exactly once per expression: a call that already ends in `extra` is an error.
pub fn add_arg_to_calls(
    expr: &Expr,
    functions: &IndexSet<String>,
    extra: &str,
) -> CodegenResult<Expr> {
    if functions.is_empty() {
        return Ok(expr.clone());
    }
    rewrite_calls(expr, functions, extra)
}

fn rewrite_calls(expr: &Expr, functions: &IndexSet<String>, extra: &str) -> CodegenResult<Expr> {
    Ok(match expr {
        Expr::Number(_) | Expr::Ident(_) => expr.clone(),
        Expr::Neg(inner) => Expr::Neg(Box::new(rewrite_calls(inner, functions, extra)?)),
        Expr::Binary { op, lhs, rhs } => Expr::binary(
            *op,
            rewrite_calls(lhs, functions, extra)?,
            rewrite_calls(rhs, functions, extra)?,
        ),
        Expr::Call { name, args } => {
            let mut new_args = args
                .iter()
                .map(|arg| rewrite_calls(arg, functions, extra))
                .collect::<CodegenResult<Vec<_>>>()?;
            if functions.contains(name) {
                if matches!(args.last(), Some(Expr::Ident(last)) if last == extra) {
                    return Err(CodegenError::malformed(
                        "",
                        Phase::Finalize,
                        format!("call to `{}` already passes `{}`", name, extra),
                    ));
                }
                new_args.push(Expr::ident(extra));
            }
            Expr::Call {
                name: name.clone(),
                args: new_args,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn aux(names: &[&str]) -> IndexSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_map_is_identity() {
        let expr = Expr::parse("a*x + f(b, 2.50)").unwrap();
        assert_eq!(map_names(&expr, &NameMap::new()).unwrap(), expr);
    }

    #[test]
    fn test_renames_only_mapped_identifiers() {
        let map = NameMap::from_pairs([("x", "x__"), ("y", "y__")]).unwrap();
        let expr = Expr::parse("x*x + p - y").unwrap();
        assert_eq!(map_names(&expr, &map).unwrap().to_string(), "x__*x__ + p - y__");
    }

    #[test]
    fn test_function_names_are_not_renamed() {
        let map = NameMap::from_pairs([("f", "g")]).unwrap();
        let expr = Expr::parse("f(f)").unwrap();
        assert_eq!(map_names(&expr, &map).unwrap().to_string(), "f(g)");
    }

    #[test]
    fn test_substitution_is_simultaneous() {
        let map = NameMap::from_pairs([("a", "b"), ("b", "c")]).unwrap();
        let expr = Expr::parse("a + b").unwrap();
        assert_eq!(map_names(&expr, &map).unwrap().to_string(), "b + c");
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = NameMap::from_pairs([("a", "b"), ("b", "a")]).unwrap_err();
        assert!(matches!(err, CodegenError::NameCollision { .. }));
    }

    #[test]
    fn test_non_identifier_image_is_malformed() {
        let map = NameMap::from_pairs([("x", "x y")]).unwrap();
        let err = map_names(&Expr::parse("x").unwrap(), &map).unwrap_err();
        assert!(matches!(
            err,
            CodegenError::MalformedExpression { phase: Phase::Finalize, .. }
        ));
    }

    #[test]
    fn test_add_arg_to_nested_calls() {
        let expr = Expr::parse("f(g(x), 1) + sin(f(y, z))").unwrap();
        let rewritten = add_arg_to_calls(&expr, &aux(&["f", "g"]), "p_").unwrap();
        assert_eq!(
            rewritten.to_string(),
            "f(g(x, p_), 1, p_) + sin(f(y, z, p_))"
        );
    }

    #[test]
    fn test_call_count_is_preserved() {
        let names = aux(&["f"]);
        let expr = Expr::parse("f(x) * f(f(y)) - f()").unwrap();
        let rewritten = add_arg_to_calls(&expr, &names, "p_").unwrap();
        assert_eq!(expr.count_calls(&names), 4);
        assert_eq!(rewritten.count_calls(&names), 4);

        let mut arities = Vec::new();
        rewritten.walk(&mut |node| {
            if let Expr::Call { name, args } = node {
                if name == "f" {
                    assert_eq!(args.last(), Some(&Expr::ident("p_")));
                    arities.push(args.len());
                }
            }
        });
        assert_eq!(arities, vec![2, 2, 2, 1]);
    }

    #[test]
    fn test_second_rewrite_is_rejected() {
        let names = aux(&["f"]);
        let once = add_arg_to_calls(&Expr::parse("f(x)").unwrap(), &names, "p_").unwrap();
        assert!(add_arg_to_calls(&once, &names, "p_").is_err());
    }

    #[test]
    fn test_no_auxiliary_functions_is_identity() {
        let expr = Expr::parse("sin(x)").unwrap();
        assert_eq!(add_arg_to_calls(&expr, &IndexSet::new(), "p_").unwrap(), expr);
    }
}
