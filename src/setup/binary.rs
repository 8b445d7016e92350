use std::{cell::RefCell, cmp::Ordering, rc::Rc};

use rug::{Float, Integer};

use crate::{
    interpreter::{
        context::MathContext,
        history::History,
        registry::{Associativity, BinaryFn, Engine, NumberConverter, UnaryFn},
        value::{Operand, Value},
    },
    setup::{ans_function, assignment, bconv_function, to_integer, to_unsigned},
};

/// Populates an engine with the bitwise calculator grammar.
///
/// Everything is integer arithmetic: the number converter truncates literals
/// on entry, `+` is OR, `*` (and juxtaposition) is AND, and the explicit
/// `| & ^ << >>` operators are available alongside comparisons. The constant
/// table carries the machine integer limits.
pub fn install(engine: &mut Engine,
               history: &Rc<RefCell<History>>,
               juxtaposition: Option<i32>) {
    let context = Rc::clone(engine.context());

    let auto_declare: crate::interpreter::registry::UnknownIdentifier = Rc::new(|_| Ok(Value::Null));
    engine.set_unknown_identifier(Some(auto_declare));
    engine.set_number_converter(truncating_converter(&context));

    engine.register_unary('!', 9, Associativity::Right, logical_not(&context));
    engine.register_unary('-', 9, Associativity::Right, negate(&context));
    engine.register_unary('~', 9, Associativity::Right, complement(&context));

    engine.register_binary("=", 1, Associativity::Right, assignment());

    engine.register_binary("||", 2, Associativity::Left, logical(&context, |a, b| a || b));
    engine.register_binary("&&", 3, Associativity::Left, logical(&context, |a, b| a && b));

    engine.register_binary("==", 4, Associativity::Left,
                           comparison(&context, |order| order == Ordering::Equal));
    engine.register_binary("!=", 4, Associativity::Left,
                           comparison(&context, |order| order != Ordering::Equal));
    engine.register_binary("<", 4, Associativity::Left,
                           comparison(&context, |order| order == Ordering::Less));
    engine.register_binary(">", 4, Associativity::Left,
                           comparison(&context, |order| order == Ordering::Greater));
    engine.register_binary("<=", 4, Associativity::Left,
                           comparison(&context, |order| order != Ordering::Greater));
    engine.register_binary(">=", 4, Associativity::Left,
                           comparison(&context, |order| order != Ordering::Less));

    engine.register_binary("+", 5, Associativity::Left, integer_binary(&context, |a, b| a | b));
    engine.register_binary("|", 5, Associativity::Left, integer_binary(&context, |a, b| a | b));

    engine.register_binary("^", 6, Associativity::Left, integer_binary(&context, |a, b| a ^ b));

    engine.register_binary("*", 7, Associativity::Left, integer_binary(&context, |a, b| a & b));
    engine.register_binary("&", 7, Associativity::Left, integer_binary(&context, |a, b| a & b));

    engine.register_binary("<<", 8, Associativity::Left, shift(&context, |a, by| a << by));
    engine.register_binary(">>", 8, Associativity::Left, shift(&context, |a, by| a >> by));

    install_juxtaposition(engine, &context, juxtaposition);

    engine.register_function("ans", 0, 1, ans_function(history));
    engine.register_function("bconv", 2, 2, bconv_function(&context));

    install_constants(engine, &context);
}

/// Installs (or removes) juxtaposition-as-AND, mirroring the default
/// grammar's juxtaposition-as-multiplication.
pub fn install_juxtaposition(engine: &mut Engine,
                             context: &Rc<RefCell<MathContext>>,
                             offset: Option<i32>) {
    match offset {
        None => engine.disable_juxtaposition(),
        Some(offset) => engine.set_juxtaposition(7 + offset.signum(),
                                                 Associativity::Right,
                                                 integer_binary(context, |a, b| a & b)),
    }
}

fn install_constants(engine: &Engine, context: &Rc<RefCell<MathContext>>) {
    let precision = context.borrow().precision;
    let number = |value: Integer| Value::Number(Float::with_val(precision, &value));

    engine.register_constant("false", number(Integer::from(0)));
    engine.register_constant("true", number(Integer::from(1)));

    engine.register_constant("BM", number(Integer::from(u8::MAX)));
    engine.register_constant("bm", number(Integer::from(i8::MIN)));
    engine.register_constant("bM", number(Integer::from(i8::MAX)));

    engine.register_constant("sm", number(Integer::from(i16::MIN)));
    engine.register_constant("sM", number(Integer::from(i16::MAX)));
    engine.register_constant("SM", number(Integer::from(u16::MAX)));

    engine.register_constant("im", number(Integer::from(i32::MIN)));
    engine.register_constant("iM", number(Integer::from(i32::MAX)));
    engine.register_constant("IM", number(Integer::from(u32::MAX)));

    engine.register_constant("lm", number(Integer::from(i64::MIN)));
    engine.register_constant("lM", number(Integer::from(i64::MAX)));
    engine.register_constant("LM", number(Integer::from(u64::MAX)));
}

/// A number converter that truncates every literal to an integer.
fn truncating_converter(context: &Rc<RefCell<MathContext>>) -> NumberConverter {
    let context = Rc::clone(context);
    Rc::new(move |literal| {
        let context = context.borrow();
        let mut number = context.parse_number(literal)?;
        number.trunc_mut();
        Ok(Value::Number(number))
    })
}

fn integer_binary<F>(context: &Rc<RefCell<MathContext>>, op: F) -> BinaryFn
    where F: Fn(Integer, &Integer) -> Integer + 'static
{
    let context = Rc::clone(context);
    Rc::new(move |lhs, rhs| {
        let lhs = to_integer(&lhs.value())?;
        let rhs = to_integer(&rhs.value())?;
        Ok(Operand::Value(Value::Number(context.borrow().number(&op(lhs, &rhs)))))
    })
}

fn shift<F>(context: &Rc<RefCell<MathContext>>, op: F) -> BinaryFn
    where F: Fn(Integer, u32) -> Integer + 'static
{
    let context = Rc::clone(context);
    Rc::new(move |lhs, rhs| {
        let lhs = to_integer(&lhs.value())?;
        let by = to_unsigned(&rhs.value())?;
        Ok(Operand::Value(Value::Number(context.borrow().number(&op(lhs, by)))))
    })
}

fn comparison<F>(context: &Rc<RefCell<MathContext>>, accept: F) -> BinaryFn
    where F: Fn(Ordering) -> bool + 'static
{
    let context = Rc::clone(context);
    Rc::new(move |lhs, rhs| {
        let lhs = to_integer(&lhs.value())?;
        let rhs = to_integer(&rhs.value())?;
        let result = accept(lhs.cmp(&rhs));
        Ok(Operand::Value(Value::Number(context.borrow().number(u32::from(result)))))
    })
}

fn logical<F>(context: &Rc<RefCell<MathContext>>, accept: F) -> BinaryFn
    where F: Fn(bool, bool) -> bool + 'static
{
    let context = Rc::clone(context);
    Rc::new(move |lhs, rhs| {
        let result = accept(lhs.value().is_truthy()?, rhs.value().is_truthy()?);
        Ok(Operand::Value(Value::Number(context.borrow().number(u32::from(result)))))
    })
}

fn logical_not(context: &Rc<RefCell<MathContext>>) -> UnaryFn {
    let context = Rc::clone(context);
    Rc::new(move |operand| {
        let result = !operand.value().is_truthy()?;
        Ok(Operand::Value(Value::Number(context.borrow().number(u32::from(result)))))
    })
}

fn negate(context: &Rc<RefCell<MathContext>>) -> UnaryFn {
    let context = Rc::clone(context);
    Rc::new(move |operand| {
        let integer = to_integer(&operand.value())?;
        Ok(Operand::Value(Value::Number(context.borrow().number(&-integer))))
    })
}

fn complement(context: &Rc<RefCell<MathContext>>) -> UnaryFn {
    let context = Rc::clone(context);
    Rc::new(move |operand| {
        let integer = to_integer(&operand.value())?;
        Ok(Operand::Value(Value::Number(context.borrow().number(&!integer))))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::registry::Engine as TestEngine;

    fn engine() -> TestEngine {
        let context = Rc::new(RefCell::new(MathContext::default()));
        let history = Rc::new(RefCell::new(History::new()));
        let mut engine = TestEngine::new(context);
        install(&mut engine, &history, Some(-1));
        engine
    }

    #[test]
    fn plus_is_or_and_star_is_and() {
        let engine = engine();
        let or = engine.evaluate("6 + 9").unwrap();
        assert_eq!(or.as_number().unwrap().to_f64(), 15.0);
        let and = engine.evaluate("6 * 3").unwrap();
        assert_eq!(and.as_number().unwrap().to_f64(), 2.0);
    }

    #[test]
    fn shifts_and_limits() {
        let engine = engine();
        let shifted = engine.evaluate("1 << 8").unwrap();
        assert_eq!(shifted.as_number().unwrap().to_f64(), 256.0);
        let limit = engine.evaluate("BM").unwrap();
        assert_eq!(limit.as_number().unwrap().to_f64(), 255.0);
    }

    #[test]
    fn literals_truncate_on_entry() {
        let engine = engine();
        let value = engine.evaluate("3.9").unwrap();
        assert_eq!(value.as_number().unwrap().to_f64(), 3.0);
    }
}
