use std::cell::RefCell;
use std::rc::Rc;

use linked_hash_map::LinkedHashMap;

use crate::compiler::srcloc::Srcloc;
use crate::compiler::typedtree::{Definition, Module, ModuleKind, OperationData};
use crate::compiler::types::Type;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub loc: Srcloc,
    pub message: String,
}

/// Receives warnings raised while obligations are generated.
pub trait DiagnosticSink {
    fn report(&self, diagnostic: Diagnostic);

    fn warning(&self, loc: &Srcloc, message: &str) {
        self.report(Diagnostic {
            severity: Severity::Warning,
            loc: loc.clone(),
            message: message.to_string(),
        });
    }
}

/// A sink that collects everything it is given.
#[derive(Default, Debug)]
pub struct Diagnostics {
    entries: RefCell<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.borrow().clone()
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        log::debug!("diagnostic {}: {}", diagnostic.loc, diagnostic.message);
        self.entries.borrow_mut().push(diagnostic);
    }
}

/// Read-only view of the type checked program around the definition being
/// analysed.
pub trait Environment {
    fn find_name(&self, name: &str) -> Option<Rc<Definition>>;
    fn state_definition(&self) -> Option<Rc<Definition>>;
    fn enclosing_class(&self) -> Option<String>;
    fn is_class(&self, name: &str) -> bool;
    fn diagnostics(&self) -> Rc<dyn DiagnosticSink>;

    fn is_record(&self, ty: &Type) -> bool {
        ty.is_record()
    }
    fn is_map(&self, ty: &Type) -> bool {
        ty.is_map()
    }
    fn is_function(&self, ty: &Type) -> bool {
        ty.is_function()
    }
    fn is_class_type(&self, ty: &Type) -> bool {
        match ty {
            Type::Named { name, .. } => self.is_class(name),
            _ => false,
        }
    }

    /// The operation called by name, if there is one.
    fn find_operation(&self, name: &str) -> Option<OperationData> {
        match self.find_name(name).as_ref().map(|d| d.as_ref()) {
            Some(Definition::ExplicitOperation(o)) => Some(o.clone()),
            _ => None,
        }
    }
}

/// The environment of one module or class: every definition it contains,
/// in declaration order.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct ModuleEnvironment {
    pub name: String,
    pub kind: ModuleKind,
    pub definitions: LinkedHashMap<String, Rc<Definition>>,
    #[derivative(Debug = "ignore")]
    sink: Rc<dyn DiagnosticSink>,
}

impl ModuleEnvironment {
    pub fn new(module: &Module, sink: Rc<dyn DiagnosticSink>) -> Self {
        let mut definitions = LinkedHashMap::new();
        for d in module.definitions.iter() {
            definitions.insert(d.name(), d.clone());
        }
        ModuleEnvironment {
            name: module.name.clone(),
            kind: module.kind,
            definitions,
            sink,
        }
    }
}

impl Environment for ModuleEnvironment {
    fn find_name(&self, name: &str) -> Option<Rc<Definition>> {
        self.definitions.get(name).cloned()
    }

    fn state_definition(&self) -> Option<Rc<Definition>> {
        self.definitions
            .values()
            .find(|d| matches!(d.as_ref(), Definition::State(_)))
            .cloned()
    }

    fn enclosing_class(&self) -> Option<String> {
        if self.kind == ModuleKind::Class {
            Some(self.name.clone())
        } else {
            None
        }
    }

    fn is_class(&self, name: &str) -> bool {
        self.kind == ModuleKind::Class && self.name == name
    }

    fn diagnostics(&self) -> Rc<dyn DiagnosticSink> {
        self.sink.clone()
    }
}
