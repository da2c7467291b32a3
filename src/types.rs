//! Static type tags used by the type checker.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Signature of a function or method as seen by the checker.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSig {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
}

/// A user-defined class as seen by the checker. The tables are filled after
/// the class handle is bound, so members may mention the class itself.
pub struct ClassType {
    pub name: String,
    pub superclass: Option<Rc<ClassType>>,
    methods: RefCell<HashMap<String, Rc<FunctionSig>>>,
    fields: RefCell<HashMap<String, Type>>,
}

impl ClassType {
    pub fn new(name: &str, superclass: Option<Rc<ClassType>>) -> Self {
        ClassType {
            name: name.to_string(),
            superclass,
            methods: RefCell::new(HashMap::new()),
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn add_method(&self, name: &str, sig: Rc<FunctionSig>) {
        self.methods.borrow_mut().insert(name.to_string(), sig);
    }

    pub fn add_field(&self, name: &str, ty: Type) {
        self.fields.borrow_mut().insert(name.to_string(), ty);
    }

    /// Most-derived method named `name`.
    pub fn find_method(&self, name: &str) -> Option<Rc<FunctionSig>> {
        if let Some(sig) = self.methods.borrow().get(name) {
            return Some(Rc::clone(sig));
        }

        self.superclass.as_ref().and_then(|s| s.find_method(name))
    }

    pub fn find_field(&self, name: &str) -> Option<Type> {
        if let Some(ty) = self.fields.borrow().get(name) {
            return Some(ty.clone());
        }

        self.superclass.as_ref().and_then(|s| s.find_field(name))
    }

    /// The initializer is the method named like the class, looked up on
    /// this class only.
    pub fn initializer(&self) -> Option<Rc<FunctionSig>> {
        self.methods.borrow().get(&self.name).cloned()
    }

    /// Nominal subtyping: `self` is `other` or inherits from it.
    pub fn is_subclass_of(&self, other: &ClassType) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }

        match &self.superclass {
            Some(superclass) => superclass.is_subclass_of(other),
            None => false,
        }
    }
}

// Members can refer back to the class, so a derived Debug would recurse.
impl fmt::Debug for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassType")
            .field("name", &self.name)
            .field(
                "superclass",
                &self.superclass.as_ref().map(|s| s.name.as_str()),
            )
            .finish()
    }
}

/// Type tag.
#[derive(Debug, Clone)]
pub enum Type {
    Nil,
    Number,
    String,
    Boolean,
    Void,
    /// A function or bound method value.
    Function(Rc<FunctionSig>),
    /// The class object itself (the constructor).
    Class(Rc<ClassType>),
    /// A value whose type is the class.
    Instance(Rc<ClassType>),
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Nil, Type::Nil)
            | (Type::Number, Type::Number)
            | (Type::String, Type::String)
            | (Type::Boolean, Type::Boolean)
            | (Type::Void, Type::Void) => true,
            (Type::Function(a), Type::Function(b)) => {
                a.params == b.params && a.return_type == b.return_type
            }
            (Type::Class(a), Type::Class(b)) | (Type::Instance(a), Type::Instance(b)) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

impl Type {
    /// Can a value of type `value` be stored in a slot of type `self`?
    /// Equal tags, a subclass instance, or `nil` into a class-typed slot.
    pub fn accepts(&self, value: &Type) -> bool {
        match (self, value) {
            (Type::Instance(target), Type::Instance(actual)) => actual.is_subclass_of(target),
            (Type::Instance(_), Type::Nil) => true,
            (Type::Void, Type::Nil) => true,
            _ => self == value,
        }
    }

    /// Primitive value types that have no `nil` default.
    pub fn requires_initializer(&self) -> bool {
        matches!(self, Type::Number | Type::String | Type::Boolean)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Nil => write!(f, "nil"),
            Type::Number => write!(f, "number"),
            Type::String => write!(f, "string"),
            Type::Boolean => write!(f, "boolean"),
            Type::Void => write!(f, "void"),
            Type::Function(sig) => {
                let params: Vec<String> = sig.params.iter().map(|p| p.to_string()).collect();
                write!(f, "fun({}): {}", params.join(", "), sig.return_type)
            }
            Type::Class(class) => write!(f, "class {}", class.name),
            Type::Instance(class) => write!(f, "{}", class.name),
        }
    }
}
