//! Runtime matching: walk a compiled [`DecisionTree`] against a concrete
//! term, using a caller-supplied [`Environment`] to destructure it.

use crate::binding::{Binding, BindingId};
use crate::pattern::{Constraint, PrimType, RuleSet, Symbol};
use crate::trie::DecisionTree;
use rustc_hash::FxHashMap;

/// Bridges this crate's binding/constraint vocabulary to a caller's own term
/// representation `V` (an SSA `Value`, a constant-folded literal, ...).
///
/// Every method is a partial destructuring query: returning `None` simply
/// means "this binding's value doesn't satisfy that kind of test", which the
/// matcher treats as a non-match for whichever `Switch` case was asking.
pub trait Environment<V> {
    /// Destructure `value` as a constructor application, returning its
    /// variant tag and field count if it is one.
    fn variant_of(&self, value: &V) -> Option<(u32, u8)>;
    /// Extract field `index` of a value previously confirmed (by
    /// `variant_of`) to be a constructor application with enough fields.
    fn field(&self, value: &V, index: u8) -> V;
    fn const_bool(&self, value: &V) -> Option<bool>;
    fn const_int(&self, value: &V) -> Option<(i128, PrimType)>;
    fn const_prim(&self, value: &V) -> Option<Symbol>;
    /// Are two values, as produced by this environment, equal? Used for
    /// repeated-variable (`TestEqual`) checks.
    fn values_equal(&self, a: &V, b: &V) -> bool;
}

/// Walk `tree` against `input`, returning the matched rule's index, if any.
pub fn matches<V: Clone, E: Environment<V>>(
    tree: &DecisionTree,
    rules: &RuleSet,
    env: &E,
    input: V,
) -> Option<usize> {
    let mut resolved: FxHashMap<BindingId, V> = FxHashMap::default();
    resolved.insert(rules.root(), input);
    walk(tree, rules, env, &mut resolved)
}

fn resolve<V: Clone, E: Environment<V>>(
    binding: BindingId,
    rules: &RuleSet,
    env: &E,
    resolved: &mut FxHashMap<BindingId, V>,
) -> V {
    if let Some(v) = resolved.get(&binding) {
        return v.clone();
    }
    let value = match rules.binding(binding) {
        Binding::Root => unreachable!("root binding must be pre-seeded"),
        Binding::Field { parent, index } => {
            let parent_value = resolve(parent, rules, env, resolved);
            env.field(&parent_value, index)
        }
    };
    resolved.insert(binding, value.clone());
    value
}

fn walk<V: Clone, E: Environment<V>>(
    tree: &DecisionTree,
    rules: &RuleSet,
    env: &E,
    resolved: &mut FxHashMap<BindingId, V>,
) -> Option<usize> {
    match tree {
        DecisionTree::Leaf(rule_index) => Some(*rule_index),
        DecisionTree::Fail => None,
        DecisionTree::Switch {
            binding,
            cases,
            default,
        } => {
            let value = resolve(*binding, rules, env, resolved);
            let key = classify(cases, &value, env);
            let next = key
                .and_then(|k| cases.get(&k))
                .map(|t| t.as_ref())
                .unwrap_or(default.as_ref());
            walk(next, rules, env, resolved)
        }
        DecisionTree::TestEqual {
            a,
            b,
            on_equal,
            on_not_equal,
        } => {
            let va = resolve(*a, rules, env, resolved);
            let vb = resolve(*b, rules, env, resolved);
            if env.values_equal(&va, &vb) {
                walk(on_equal, rules, env, resolved)
            } else {
                walk(on_not_equal, rules, env, resolved)
            }
        }
    }
}

/// Figure out which `Constraint` shape `value` satisfies, based on which
/// shape the node's cases are actually testing (a well-formed rule set never
/// mixes shapes on one binding).
fn classify<V, E: Environment<V>>(
    cases: &std::collections::BTreeMap<Constraint, Box<DecisionTree>>,
    value: &V,
    env: &E,
) -> Option<Constraint> {
    match cases.keys().next()? {
        Constraint::Variant { .. } => {
            let (variant, arity) = env.variant_of(value)?;
            Some(Constraint::Variant { variant, arity })
        }
        Constraint::ConstBool(_) => env.const_bool(value).map(Constraint::ConstBool),
        Constraint::ConstInt(_, _) => env
            .const_int(value)
            .map(|(v, ty)| Constraint::ConstInt(v, ty)),
        Constraint::ConstPrim(_) => env.const_prim(value).map(Constraint::ConstPrim),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Pattern, SourcePos};
    use crate::trie::compile;

    struct BoolEnv;
    impl Environment<bool> for BoolEnv {
        fn variant_of(&self, _value: &bool) -> Option<(u32, u8)> {
            None
        }
        fn field(&self, _value: &bool, _index: u8) -> bool {
            unreachable!("bool has no fields")
        }
        fn const_bool(&self, value: &bool) -> Option<bool> {
            Some(*value)
        }
        fn const_int(&self, _value: &bool) -> Option<(i128, PrimType)> {
            None
        }
        fn const_prim(&self, _value: &bool) -> Option<Symbol> {
            None
        }
        fn values_equal(&self, a: &bool, b: &bool) -> bool {
            a == b
        }
    }

    #[test]
    fn matches_the_right_branch() {
        let mut rules = RuleSet::new();
        rules.add_rule(
            Pattern::Const(Constraint::ConstBool(true)),
            0,
            SourcePos::default(),
            100,
        );
        rules.add_rule(
            Pattern::Const(Constraint::ConstBool(false)),
            0,
            SourcePos::default(),
            200,
        );
        let tree = compile(&mut rules);
        assert_eq!(matches(&tree, &rules, &BoolEnv, true), Some(0));
        assert_eq!(matches(&tree, &rules, &BoolEnv, false), Some(1));
    }
}
