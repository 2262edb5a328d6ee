/*
 * Unparser
 *
 * Serializes an expression AST back to source form for round-trip checks.
 * Binary chains print flat, so inputs with explicit grouping parens assert
 * against an expected string instead of their own source.
 */

use aster_runtime::expression_parser::ast::*;
use aster_runtime::values::format_number;

pub fn unparse(expression: &Expression) -> String {
    match expression {
        Expression::Literal(e) => match &e.value {
            LiteralValue::Undefined => "undefined".to_string(),
            LiteralValue::Null => "null".to_string(),
            LiteralValue::Boolean(b) => b.to_string(),
            LiteralValue::Number(n) => format_number(*n),
            LiteralValue::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        },
        Expression::ArrayLiteral(e) => {
            let elements: Vec<String> = e.elements.iter().map(unparse).collect();
            format!("[{}]", elements.join(", "))
        }
        Expression::AccessThis(e) => ancestor_prefix_standalone(e.ancestor),
        Expression::AccessScope(e) => format!("{}{}", ancestor_prefix(e.ancestor), e.name),
        Expression::AccessMember(e) => format!("{}.{}", unparse(&e.object), e.name),
        Expression::AccessKeyed(e) => format!("{}[{}]", unparse(&e.object), unparse(&e.key)),
        Expression::CallScope(e) => format!(
            "{}{}({})",
            ancestor_prefix(e.ancestor),
            e.name,
            unparse_args(&e.args)
        ),
        Expression::CallMember(e) => format!(
            "{}.{}({})",
            unparse(&e.object),
            e.name,
            unparse_args(&e.args)
        ),
        Expression::Unary(e) => format!("{}{}", e.operator.as_str(), unparse(&e.expr)),
        Expression::Binary(e) => format!(
            "{} {} {}",
            unparse(&e.left),
            e.operator.as_str(),
            unparse(&e.right)
        ),
        Expression::Conditional(e) => format!(
            "{} ? {} : {}",
            unparse(&e.condition),
            unparse(&e.yes),
            unparse(&e.no)
        ),
        Expression::Assign(e) => format!("{} = {}", unparse(&e.target), unparse(&e.value)),
        Expression::Interpolation(e) => {
            let mut out = String::new();
            out.push_str(&e.parts[0]);
            for (index, expr) in e.expressions.iter().enumerate() {
                out.push_str("${");
                out.push_str(&unparse(expr));
                out.push('}');
                out.push_str(&e.parts[index + 1]);
            }
            out
        }
    }
}

fn unparse_args(args: &[Expression]) -> String {
    let args: Vec<String> = args.iter().map(unparse).collect();
    args.join(", ")
}

fn ancestor_prefix(ancestor: usize) -> String {
    "$parent.".repeat(ancestor)
}

fn ancestor_prefix_standalone(ancestor: usize) -> String {
    if ancestor == 0 {
        "$this".to_string()
    } else {
        let mut out = "$parent".to_string();
        for _ in 1..ancestor {
            out.push_str(".$parent");
        }
        out
    }
}
