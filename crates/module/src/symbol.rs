//! The symbol table: every function and data object a module declares, by
//! name, plus whatever a completed compile has learned about it (its size,
//! its offset once placed, and the relocations its body carries).

use crate::error::ModuleError;
use crate::ids::{DataId, FuncId};
use retarget_codegen::ir::Signature;
use retarget_codegen::machinst::MachReloc;
use retarget_entity::EntityRef;
use rustc_hash::FxHashMap;
use std::string::String;
use std::vec::Vec;

/// How a declared symbol is visible outside this module.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Linkage {
    /// Visible to other modules and the final link; must be defined here.
    Export,
    /// Visible only within this module.
    Local,
    /// Declared here but defined elsewhere; this module only ever
    /// references it, never compiles or places it.
    Import,
}

impl Linkage {
    /// Can a symbol with this linkage ever be compiled/placed by this
    /// module, as opposed to only referenced?
    pub fn is_definable(self) -> bool {
        !matches!(self, Linkage::Import)
    }
}

/// One declared function: its signature, linkage, and — once compiled —
/// its code size, placement offset, and relocations.
pub struct FuncDeclaration {
    pub name: String,
    pub linkage: Linkage,
    pub signature: Signature,
    pub size: Option<u32>,
    pub offset: Option<u32>,
    pub relocations: Vec<MachReloc>,
}

/// One declared data object: like a function but with a raw byte size
/// instead of a signature, and no relocations of its own to compile (its
/// contents are supplied by the caller, not this crate).
pub struct DataDeclaration {
    pub name: String,
    pub linkage: Linkage,
    pub size: Option<u32>,
    pub offset: Option<u32>,
}

/// Either kind of symbol a name can resolve to, as returned by
/// [`SymbolTable::lookup`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AnyId {
    Func(FuncId),
    Data(DataId),
}

/// Every function and data object one module has declared. Names are
/// unique within a table regardless of kind: a function and a data object
/// can't share a name, so `lookup` alone is enough to disambiguate a
/// `call` target from a data reference while parsing a textual module.
#[derive(Default)]
pub struct SymbolTable {
    funcs: Vec<FuncDeclaration>,
    data: Vec<DataDeclaration>,
    names: FxHashMap<String, AnyId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a function. Declaring the same name twice with an identical
    /// signature and linkage returns the existing id; declaring it again
    /// with anything different is an error, matching the "one truth per
    /// name" contract a linker needs.
    pub fn declare_func(
        &mut self,
        name: &str,
        linkage: Linkage,
        signature: &Signature,
    ) -> Result<FuncId, ModuleError> {
        if let Some(&existing) = self.names.get(name) {
            return match existing {
                AnyId::Func(id) => {
                    let decl = &self.funcs[id.index()];
                    if decl.linkage == linkage && decl.signature == *signature {
                        Ok(id)
                    } else {
                        Err(ModuleError::IncompatibleDeclaration(name.into()))
                    }
                }
                AnyId::Data(_) => Err(ModuleError::IncompatibleDeclaration(name.into())),
            };
        }
        let id = FuncId::new(self.funcs.len());
        self.funcs.push(FuncDeclaration {
            name: name.into(),
            linkage,
            signature: signature.clone(),
            size: None,
            offset: None,
            relocations: Vec::new(),
        });
        self.names.insert(name.into(), AnyId::Func(id));
        Ok(id)
    }

    /// Declare a data object, by the same same-name-same-shape contract as
    /// [`Self::declare_func`].
    pub fn declare_data(&mut self, name: &str, linkage: Linkage, size: u32) -> Result<DataId, ModuleError> {
        if let Some(&existing) = self.names.get(name) {
            return match existing {
                AnyId::Data(id) => {
                    let decl = &self.data[id.index()];
                    if decl.linkage == linkage && decl.size == Some(size) {
                        Ok(id)
                    } else {
                        Err(ModuleError::IncompatibleDeclaration(name.into()))
                    }
                }
                AnyId::Func(_) => Err(ModuleError::IncompatibleDeclaration(name.into())),
            };
        }
        let id = DataId::new(self.data.len());
        self.data.push(DataDeclaration {
            name: name.into(),
            linkage,
            size: Some(size),
            offset: None,
        });
        self.names.insert(name.into(), AnyId::Data(id));
        Ok(id)
    }

    pub fn get_func(&self, id: FuncId) -> Option<&FuncDeclaration> {
        self.funcs.get(id.index())
    }

    pub fn get_data(&self, id: DataId) -> Option<&DataDeclaration> {
        self.data.get(id.index())
    }

    /// Resolve a declared name to whichever kind of symbol it names.
    /// Returns `None` for an undeclared name rather than an error, per the
    /// lookup contract: callers that need a hard failure on a missing
    /// symbol call [`Self::get_func`]/[`Self::get_data`] after mapping a
    /// `None` themselves.
    pub fn lookup(&self, name: &str) -> Option<AnyId> {
        self.names.get(name).copied()
    }

    /// Record the result of compiling `id`'s body: its final size, offset
    /// within the module's code section, and the relocations its
    /// instructions generated.
    pub fn define_func(
        &mut self,
        id: FuncId,
        size: u32,
        offset: u32,
        relocations: Vec<MachReloc>,
    ) -> Result<(), ModuleError> {
        let decl = self.funcs.get_mut(id.index()).ok_or(ModuleError::NoSuchFunc(id))?;
        decl.size = Some(size);
        decl.offset = Some(offset);
        decl.relocations = relocations;
        Ok(())
    }

    pub fn define_data_offset(&mut self, id: DataId, offset: u32) -> Result<(), ModuleError> {
        let decl = self.data.get_mut(id.index()).ok_or(ModuleError::NoSuchData(id))?;
        decl.offset = Some(offset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retarget_codegen::ir::CallConv;

    #[test]
    fn declaring_the_same_function_twice_returns_the_same_id() {
        let mut table = SymbolTable::new();
        let sig = Signature::new(CallConv::SystemV);
        let a = table.declare_func("f", Linkage::Export, &sig).unwrap();
        let b = table.declare_func("f", Linkage::Export, &sig).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn redeclaring_with_different_linkage_is_an_error() {
        let mut table = SymbolTable::new();
        let sig = Signature::new(CallConv::SystemV);
        table.declare_func("f", Linkage::Export, &sig).unwrap();
        let err = table.declare_func("f", Linkage::Local, &sig).unwrap_err();
        assert!(matches!(err, ModuleError::IncompatibleDeclaration(_)));
    }

    #[test]
    fn a_function_and_data_object_cannot_share_a_name() {
        let mut table = SymbolTable::new();
        let sig = Signature::new(CallConv::SystemV);
        table.declare_func("thing", Linkage::Export, &sig).unwrap();
        let err = table.declare_data("thing", Linkage::Local, 8).unwrap_err();
        assert!(matches!(err, ModuleError::IncompatibleDeclaration(_)));
    }

    #[test]
    fn lookup_finds_both_kinds_of_symbol() {
        let mut table = SymbolTable::new();
        let sig = Signature::new(CallConv::SystemV);
        let func_id = table.declare_func("f", Linkage::Export, &sig).unwrap();
        let data_id = table.declare_data("d", Linkage::Local, 4).unwrap();
        assert_eq!(table.lookup("f"), Some(AnyId::Func(func_id)));
        assert_eq!(table.lookup("d"), Some(AnyId::Data(data_id)));
        assert_eq!(table.lookup("missing"), None);
    }
}
