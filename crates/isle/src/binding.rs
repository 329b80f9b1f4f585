use retarget_entity::entity_impl;

/// A reference to an interned [`Binding`] within one [`RuleSet`](crate::RuleSet).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u32);
entity_impl!(BindingId, "b");

/// How to obtain the value a binding refers to, relative to the rule's
/// input term.
///
/// Bindings form a tree of "occurrences" rooted at the term being matched:
/// `Root` is the term itself, and `Field { parent, index }` is the `index`-th
/// sub-term produced by destructuring whatever `parent` names. Two patterns
/// that project the same field of the same parent end up pointing at the
/// same interned `BindingId`, which is what lets the decision-tree builder
/// share tests across rules.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Binding {
    /// The value being matched.
    Root,
    /// The `index`-th field of whatever `parent` destructures to, valid only
    /// once `parent` has been tested against a `Variant` constraint with a
    /// matching arity.
    Field { parent: BindingId, index: u8 },
}
