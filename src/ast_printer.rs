use crate::ast::{Expr, FunctionDecl, LiteralValue, Stmt, VarDecl};

/// Renders the AST in parenthesized prefix form, one line per top-level
/// statement. Used by the `parse` command.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print_program(statements: &[Stmt]) -> String {
        statements
            .iter()
            .map(Self::print_stmt)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn print_stmt(stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expression(expr) => format!("(; {})", Self::print(expr)),

            Stmt::Print(expr) => format!("(print {})", Self::print(expr)),

            Stmt::Var(decl) => Self::var(decl),

            Stmt::Block(statements) => Self::block(statements),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    Self::print(condition),
                    Self::print_stmt(then_branch),
                    Self::print_stmt(else_branch)
                ),
                None => format!(
                    "(if {} {})",
                    Self::print(condition),
                    Self::print_stmt(then_branch)
                ),
            },

            Stmt::While { condition, body } => {
                format!("(while {} {})", Self::print(condition), Self::print_stmt(body))
            }

            Stmt::Function(decl) => format!("(fun {})", Self::function(decl)),

            Stmt::Return { value, .. } => match value {
                Some(value) => format!("(return {})", Self::print(value)),
                None => "(return)".into(),
            },

            Stmt::Class(decl) => {
                let mut s = format!("(class {}", decl.name.lexeme);
                if let Some(superclass) = &decl.superclass {
                    s.push_str(" < ");
                    s.push_str(&Self::print(superclass));
                }
                for field in &decl.fields {
                    s.push(' ');
                    s.push_str(&Self::var(field));
                }
                for method in &decl.methods {
                    s.push_str(" (method ");
                    s.push_str(&Self::function(method));
                    s.push(')');
                }
                s.push(')');
                s
            }
        }
    }

    pub fn print(expr: &Expr) -> String {
        match expr {
            // ── literals ────────────────────────────────────────────────
            Expr::Literal(lit) => match lit {
                LiteralValue::True => "true".into(),

                LiteralValue::False => "false".into(),

                LiteralValue::Nil => "nil".into(),

                LiteralValue::Str(s) => format!("{:?}", s),

                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        // 3.0 → 3.0, keeps numbers visibly numeric
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }
            },

            Expr::Grouping(inner) => format!("(group {})", Self::print(inner)),

            // ── operators ───────────────────────────────────────────────
            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, Self::print(right))
            }

            Expr::Postfix { operand, operator } => {
                format!("(post{} {})", operator.lexeme, Self::print(operand))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                Self::print(left),
                Self::print(right)
            ),

            // ── names ───────────────────────────────────────────────────
            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, Self::print(value))
            }

            Expr::This { .. } => "this".into(),

            Expr::Super { method, .. } => format!("(super {})", method.lexeme),

            // ── calls and properties ────────────────────────────────────
            Expr::Call {
                callee, arguments, ..
            } => {
                let mut s = format!("(call {}", Self::print(callee));
                for arg in arguments {
                    s.push(' ');
                    s.push_str(&Self::print(arg));
                }
                s.push(')');
                s
            }

            Expr::Get { object, name } => format!("(. {} {})", Self::print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(.= {} {} {})",
                Self::print(object),
                name.lexeme,
                Self::print(value)
            ),
        }
    }

    fn var(decl: &VarDecl) -> String {
        let mut s = format!("(var {}", decl.name.lexeme);
        if let Some(annotation) = &decl.type_annotation {
            s.push_str(": ");
            s.push_str(&annotation.lexeme);
        }
        if let Some(initializer) = &decl.initializer {
            s.push(' ');
            s.push_str(&Self::print(initializer));
        }
        s.push(')');
        s
    }

    fn block(statements: &[Stmt]) -> String {
        let mut s = String::from("(block");
        for stmt in statements {
            s.push(' ');
            s.push_str(&Self::print_stmt(stmt));
        }
        s.push(')');
        s
    }

    fn function(decl: &FunctionDecl) -> String {
        let params: Vec<String> = decl
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name.lexeme, p.type_annotation.lexeme))
            .collect();

        let mut s = format!("{}({})", decl.name.lexeme, params.join(", "));
        if let Some(return_type) = &decl.return_type {
            s.push_str(": ");
            s.push_str(&return_type.lexeme);
        }
        s.push(' ');
        s.push_str(&Self::block(&decl.body));
        s
    }
}
