use crate::binding::BindingId;
use crate::pattern::{Constraint, Obligation, RuleSet};
use std::collections::BTreeMap;

/// A compiled decision tree: a sequence of tests on interned bindings that,
/// walked against a concrete term, identifies which rule (if any) matches.
///
/// Construction is greedy: at each node, the obligation named by the
/// highest-priority remaining candidate rule becomes the test, and rules
/// that don't care about that binding flow through to every branch
/// unchanged. This is a simpler proxy for "pick the binding that eliminates
/// the most rules" than a full pattern-matrix cost search, but it is still
/// deterministic (ties broken by rule priority, then declaration order) and
/// it still shares a test across every rule that happens to need it next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecisionTree {
    /// Rule `rule_index` matches.
    Leaf(usize),
    /// No rule applies.
    Fail,
    /// Test `binding` against each key of `cases`; rules that impose no
    /// constraint on `binding` live in `default` (and were also folded into
    /// every case).
    Switch {
        binding: BindingId,
        cases: BTreeMap<Constraint, Box<DecisionTree>>,
        default: Box<DecisionTree>,
    },
    /// Test whether `a` and `b` currently resolve to equal values (a
    /// repeated pattern variable).
    TestEqual {
        a: BindingId,
        b: BindingId,
        on_equal: Box<DecisionTree>,
        on_not_equal: Box<DecisionTree>,
    },
}

/// Number of nodes (internal and leaf) in the tree, used as a cheap proxy
/// for expected match cost. `Fail` costs nothing: it's the absence of a
/// match, not a test or an outcome, so an exhaustive switch whose default
/// is unreachable shouldn't be charged for it.
pub fn node_count(tree: &DecisionTree) -> usize {
    match tree {
        DecisionTree::Leaf(_) => 1,
        DecisionTree::Fail => 0,
        DecisionTree::Switch { cases, default, .. } => {
            1 + node_count(default) + cases.values().map(|t| node_count(t)).sum::<usize>()
        }
        DecisionTree::TestEqual {
            on_equal,
            on_not_equal,
            ..
        } => 1 + node_count(on_equal) + node_count(on_not_equal),
    }
}

struct Candidate {
    rule_index: usize,
    priority: i32,
    obligations: Vec<Obligation>,
}

/// Compile every rule in `rules` into one decision tree, highest priority
/// first. Rules with equal priority are tried in declaration order.
pub fn compile(rules: &mut RuleSet) -> DecisionTree {
    let mut candidates: Vec<Candidate> = (0..rules.rules().len())
        .map(|i| Candidate {
            rule_index: i,
            priority: rules.rules()[i].priority,
            obligations: rules.obligations_for(i),
        })
        .collect();
    // Stable sort: ties keep declaration order, matching "first rule wins"
    // priority semantics.
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
    build(candidates)
}

fn build(mut candidates: Vec<Candidate>) -> DecisionTree {
    if candidates.is_empty() {
        return DecisionTree::Fail;
    }
    if candidates[0].obligations.is_empty() {
        // Any lower-priority candidate reaching this same node is shadowed:
        // the highest-priority one always wins once its obligations are
        // satisfied.
        return DecisionTree::Leaf(candidates[0].rule_index);
    }

    match candidates[0].obligations[0].clone() {
        Obligation::Test(binding, _) => build_switch(candidates, binding),
        Obligation::Equal(a, b) => {
            let mut on_equal = Vec::new();
            let mut on_not_equal = Vec::new();
            for mut cand in candidates.drain(..) {
                if take_matching_equal(&mut cand.obligations, a, b) {
                    on_equal.push(cand);
                } else {
                    // Doesn't care about this particular equality: it must
                    // still be considered on both branches.
                    on_not_equal.push(Candidate {
                        rule_index: cand.rule_index,
                        priority: cand.priority,
                        obligations: cand.obligations.clone(),
                    });
                    on_equal.push(cand);
                }
            }
            DecisionTree::TestEqual {
                a,
                b,
                on_equal: Box::new(build(on_equal)),
                on_not_equal: Box::new(build(on_not_equal)),
            }
        }
    }
}

/// If `obligations[0]` (or any entry) is exactly `Equal(a, b)`, remove it and
/// return true.
fn take_matching_equal(obligations: &mut Vec<Obligation>, a: BindingId, b: BindingId) -> bool {
    if let Some(pos) = obligations
        .iter()
        .position(|o| matches!(o, Obligation::Equal(x, y) if (*x, *y) == (a, b)))
    {
        obligations.remove(pos);
        true
    } else {
        false
    }
}

fn build_switch(candidates: Vec<Candidate>, binding: BindingId) -> DecisionTree {
    let mut dont_care = Vec::new();
    let mut by_constraint: BTreeMap<Constraint, Vec<Candidate>> = BTreeMap::new();

    for mut cand in candidates {
        if let Some(pos) = cand
            .obligations
            .iter()
            .position(|o| matches!(o, Obligation::Test(b, _) if *b == binding))
        {
            let constraint = match cand.obligations.remove(pos) {
                Obligation::Test(_, c) => c,
                _ => unreachable!(),
            };
            by_constraint.entry(constraint).or_default().push(cand);
        } else {
            dont_care.push(cand);
        }
    }

    let default = Box::new(build(clone_candidates(&dont_care)));
    let mut cases = BTreeMap::new();
    for (constraint, mut group) in by_constraint {
        group.extend(clone_candidates(&dont_care));
        group.sort_by(|a, b| b.priority.cmp(&a.priority));
        let subtree = build(group);
        if subtree != *default {
            cases.insert(constraint, Box::new(subtree));
        }
    }

    DecisionTree::Switch {
        binding,
        cases,
        default,
    }
}

fn clone_candidates(candidates: &[Candidate]) -> Vec<Candidate> {
    candidates
        .iter()
        .map(|c| Candidate {
            rule_index: c.rule_index,
            priority: c.priority,
            obligations: c.obligations.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Pattern, SourcePos};

    #[test]
    fn two_leaves_share_one_switch() {
        let mut rules = RuleSet::new();
        rules.add_rule(
            Pattern::Const(Constraint::ConstBool(true)),
            0,
            SourcePos::default(),
            1,
        );
        rules.add_rule(
            Pattern::Const(Constraint::ConstBool(false)),
            0,
            SourcePos::default(),
            2,
        );
        let tree = compile(&mut rules);
        // One switch node plus two leaves.
        assert_eq!(node_count(&tree), 3);
        match &tree {
            DecisionTree::Switch { cases, .. } => assert_eq!(cases.len(), 2),
            other => panic!("expected a switch, got {other:?}"),
        }
    }

    #[test]
    fn higher_priority_rule_shadows_lower() {
        let mut rules = RuleSet::new();
        rules.add_rule(Pattern::Wildcard, 0, SourcePos::default(), 1);
        rules.add_rule(Pattern::Wildcard, 10, SourcePos::default(), 2);
        let tree = compile(&mut rules);
        assert_eq!(tree, DecisionTree::Leaf(1));
    }

    #[test]
    fn no_rules_fails() {
        let mut rules = RuleSet::new();
        let tree = compile(&mut rules);
        assert_eq!(tree, DecisionTree::Fail);
    }
}
