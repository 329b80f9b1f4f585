use crate::binding::{Binding, BindingId};
use retarget_entity::PrimaryMap;
use rustc_hash::FxHashMap;

/// An interned symbol (identifier or primitive-test name). Interning is the
/// caller's responsibility; this crate only ever compares symbols for
/// equality.
pub type Symbol = u32;

/// The primitive scalar kinds a constant pattern can test, independent of
/// whatever richer type system the embedding crate has (it maps its own
/// types down to this set when building rules).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum PrimType {
    I8,
    I16,
    I32,
    I64,
    I128,
    F32,
    F64,
    Bool,
}

/// An atomic test on the value a single binding refers to.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum Constraint {
    /// The value is an application of `variant` with exactly `arity` fields.
    Variant { variant: u32, arity: u8 },
    ConstBool(bool),
    ConstInt(i128, PrimType),
    ConstPrim(Symbol),
}

/// A name bound by a [`Pattern::Var`], usable to require two sub-patterns to
/// match equal values (a repeated variable) or to carry a captured value
/// into the rule's result. Equality of `VarId`s is what the decision-tree
/// builder turns into a [`crate::DecisionTree::TestEqual`] node.
pub type VarId = u32;

/// A pattern to match against one binding's value.
#[derive(Clone, Debug)]
pub enum Pattern {
    /// Matches anything, binds nothing.
    Wildcard,
    /// Matches anything; if the same `VarId` appears elsewhere in the rule,
    /// the two occurrences must match equal values.
    Var(VarId),
    /// Matches a specific constant.
    Const(Constraint),
    /// Matches a constructor application and recurses into its fields.
    Variant(u32, Vec<Pattern>),
    /// All sub-patterns must match the same binding.
    And(Vec<Pattern>),
}

/// Where a rule came from, for diagnostics (pattern-compile conflicts report
/// the positions of both offending rules).
#[derive(Copy, Clone, Debug, Default)]
pub struct SourcePos {
    pub file: Symbol,
    pub line: u32,
    pub col: u32,
}

/// One priority-ordered rule: match `pattern` against the input, and if it
/// matches, the `result` token identifies to the caller which action to run.
/// `result` is opaque here — this crate's job ends at "which rule matched".
#[derive(Clone, Debug)]
pub struct Rule {
    pub pattern: Pattern,
    pub priority: i32,
    pub pos: SourcePos,
    pub result: usize,
}

/// An obligation still to be checked before a candidate rule can be
/// considered fully matched at some point in the decision tree.
#[derive(Clone, Debug)]
pub(crate) enum Obligation {
    Test(BindingId, Constraint),
    Equal(BindingId, BindingId),
}

/// A set of rules sharing one binding-interning table, ready to be compiled
/// into a [`crate::DecisionTree`] by [`crate::trie::compile`].
pub struct RuleSet {
    pub(crate) rules: Vec<Rule>,
    bindings: PrimaryMap<BindingId, Binding>,
    interned: FxHashMap<Binding, BindingId>,
    root: BindingId,
}

impl RuleSet {
    /// Create a new, empty rule set.
    pub fn new() -> Self {
        let mut bindings = PrimaryMap::new();
        let mut interned = FxHashMap::default();
        let root = bindings.push(Binding::Root);
        interned.insert(Binding::Root, root);
        Self {
            rules: Vec::new(),
            bindings,
            interned,
            root,
        }
    }

    /// The binding naming the term each rule's pattern matches against.
    pub fn root(&self) -> BindingId {
        self.root
    }

    /// Intern (or look up) a binding, returning its id.
    pub fn intern(&mut self, binding: Binding) -> BindingId {
        if let Some(&id) = self.interned.get(&binding) {
            return id;
        }
        let id = self.bindings.push(binding);
        self.interned.insert(binding, id);
        id
    }

    /// Look up an interned binding's definition.
    pub fn binding(&self, id: BindingId) -> Binding {
        self.bindings[id]
    }

    /// Add a rule, matched against the root binding. Returns the rule's
    /// index, used by [`crate::DecisionTree::Leaf`].
    pub fn add_rule(&mut self, pattern: Pattern, priority: i32, pos: SourcePos, result: usize) -> usize {
        let index = self.rules.len();
        self.rules.push(Rule {
            pattern,
            priority,
            pos,
            result,
        });
        index
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Flatten a rule's pattern tree into a flat obligation list: atomic
    /// tests on interned bindings, plus equalities between bindings that
    /// share a repeated [`VarId`].
    pub(crate) fn obligations_for(&mut self, rule_index: usize) -> Vec<Obligation> {
        let root = self.root;
        let pattern = self.rules[rule_index].pattern.clone();
        let mut obligations = Vec::new();
        let mut vars: FxHashMap<VarId, BindingId> = FxHashMap::default();
        self.walk(&pattern, root, &mut obligations, &mut vars);
        obligations
    }

    fn walk(
        &mut self,
        pattern: &Pattern,
        binding: BindingId,
        obligations: &mut Vec<Obligation>,
        vars: &mut FxHashMap<VarId, BindingId>,
    ) {
        match pattern {
            Pattern::Wildcard => {}
            Pattern::Var(v) => {
                if let Some(&prior) = vars.get(v) {
                    obligations.push(Obligation::Equal(prior, binding));
                } else {
                    vars.insert(*v, binding);
                }
            }
            Pattern::Const(c) => obligations.push(Obligation::Test(binding, *c)),
            Pattern::Variant(variant, fields) => {
                obligations.push(Obligation::Test(
                    binding,
                    Constraint::Variant {
                        variant: *variant,
                        arity: fields.len() as u8,
                    },
                ));
                for (i, field_pattern) in fields.iter().enumerate() {
                    let field_binding = self.intern(Binding::Field {
                        parent: binding,
                        index: i as u8,
                    });
                    self.walk(field_pattern, field_binding, obligations, vars);
                }
            }
            Pattern::And(subs) => {
                for sub in subs {
                    self.walk(sub, binding, obligations, vars);
                }
            }
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}
