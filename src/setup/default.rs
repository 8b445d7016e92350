use std::{cell::RefCell, cmp::Ordering, rc::Rc};

use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};
use rug::{
    Float,
    float::{Constant, Special},
    ops::Pow,
    rand::RandState,
};

use crate::{
    error::{Error, RuntimeError},
    interpreter::{
        context::MathContext,
        history::History,
        registry::{Associativity, BinaryFn, Engine, FunctionFn, UNLIMITED_ARGUMENTS, UnaryFn},
        value::{Operand, Value},
    },
    setup::{ans_function, assignment, bconv_function, chemical, to_integer, to_unsigned},
};

/// Precedence of multiplication; the juxtaposition operator sits at a signed
/// offset from it.
pub const MUL_PRECEDENCE: i32 = 6;

/// Populates an engine with the default calculator grammar: operators,
/// functions, constants, the chemical sub-evaluator behind `chem.M`, and the
/// unknown-identifier hook that auto-declares variables.
pub fn install(engine: &mut Engine,
               history: &Rc<RefCell<History>>,
               rng: &Rc<RefCell<RandState<'static>>>,
               juxtaposition: Option<i32>) {
    let context = Rc::clone(engine.context());

    let auto_declare: crate::interpreter::registry::UnknownIdentifier = Rc::new(|_| Ok(Value::Null));
    engine.set_unknown_identifier(Some(auto_declare));

    install_operators(engine, &context);
    install_juxtaposition(engine, &context, juxtaposition);
    install_functions(engine, &context, history, rng);
    install_constants(engine, &context);
}

fn install_operators(engine: &mut Engine, context: &Rc<RefCell<MathContext>>) {
    engine.register_unary('!', 7, Associativity::Right, logical_not(context));
    engine.register_unary('+', 7, Associativity::Right, absolute(context));
    engine.register_unary('-', 7, Associativity::Right, negate(context));
    engine.register_unary('~', 7, Associativity::Right, complement(context));

    engine.register_binary("=", 1, Associativity::Right, assignment());

    engine.register_binary("||", 2, Associativity::Left, logical(context, |a, b| a || b));
    engine.register_binary("&&", 3, Associativity::Left, logical(context, |a, b| a && b));

    engine.register_binary("==", 4, Associativity::Left,
                           comparison(context, |order| order == Some(Ordering::Equal)));
    engine.register_binary("!=", 4, Associativity::Left,
                           comparison(context, |order| matches!(order, Some(o) if o != Ordering::Equal)));
    engine.register_binary("<", 4, Associativity::Left,
                           comparison(context, |order| order == Some(Ordering::Less)));
    engine.register_binary(">", 4, Associativity::Left,
                           comparison(context, |order| order == Some(Ordering::Greater)));
    engine.register_binary("<=", 4, Associativity::Left,
                           comparison(context, |order| matches!(order, Some(Ordering::Less | Ordering::Equal))));
    engine.register_binary(">=", 4, Associativity::Left,
                           comparison(context, |order| matches!(order, Some(Ordering::Greater | Ordering::Equal))));

    engine.register_binary("+", 5, Associativity::Left, addition(context));
    engine.register_binary("-", 5, Associativity::Left, subtraction(context));

    engine.register_binary("*", MUL_PRECEDENCE, Associativity::Left, multiplication(context));
    engine.register_binary("/", MUL_PRECEDENCE, Associativity::Left, division(context));
    engine.register_binary("//", MUL_PRECEDENCE, Associativity::Left,
                           number_binary(context, |a, b, c| {
                               let mut quotient = c.number(a / b);
                               quotient.trunc_mut();
                               quotient
                           }));
    engine.register_binary("%", MUL_PRECEDENCE, Associativity::Left,
                           number_binary(context, |a, b, c| c.number(a % b)));

    engine.register_binary("^", 8, Associativity::Right,
                           number_binary(context, |a, b, c| c.number(a.pow(b))));
    engine.register_binary("**", 8, Associativity::Right,
                           number_binary(context, |a, b, c| c.number(a.pow(b))));
}

/// Installs (or removes) juxtaposition-as-multiplication.
///
/// `offset` is clamped to its sign: the operator binds one step below, at,
/// or one step above explicit multiplication. `None` disables juxtaposition
/// so adjacent primaries become a syntax error.
pub fn install_juxtaposition(engine: &mut Engine,
                             context: &Rc<RefCell<MathContext>>,
                             offset: Option<i32>) {
    match offset {
        None => engine.disable_juxtaposition(),
        Some(offset) => engine.set_juxtaposition(MUL_PRECEDENCE + offset.signum(),
                                                 Associativity::Right,
                                                 multiplication(context)),
    }
}

fn install_functions(engine: &mut Engine,
                     context: &Rc<RefCell<MathContext>>,
                     history: &Rc<RefCell<History>>,
                     rng: &Rc<RefCell<RandState<'static>>>) {
    engine.register_function("ans", 0, 1, ans_function(history));
    engine.register_function("bconv", 2, 2, bconv_function(context));

    engine.register_function("random", 0, 2, random(context, rng));

    engine.register_function("trunc", 1, 1, number_fn(context, |x, c| {
                                 let mut value = x[0].clone();
                                 value.trunc_mut();
                                 Ok(c.number(&value))
                             }));
    engine.register_function("sgn", 1, 1, number_fn(context, |x, c| {
                                 if x[0].is_nan() {
                                     return Ok(c.number(Special::Nan));
                                 }
                                 let sign = i32::from(x[0] > 0) - i32::from(x[0] < 0);
                                 Ok(c.number(sign))
                             }));
    engine.register_function("abs", 1, 1, number_fn(context, |x, c| Ok(c.number(x[0].abs_ref()))));
    engine.register_function("neg", 1, 1, number_fn(context, |x, c| Ok(c.number(-&x[0]))));
    engine.register_function("neg2", 1, 1, number_fn(context, |x, c| {
                                 let magnitude = c.number(x[0].abs_ref());
                                 Ok(c.number(-&magnitude))
                             }));

    engine.register_function("math.pow", 2, 2,
                             number_fn(context, |x, c| Ok(c.number((&x[0]).pow(&x[1])))));
    engine.register_function("math.sqr", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].square_ref()))));
    engine.register_function("math.cb", 1, 1,
                             number_fn(context, |x, c| Ok(c.number((&x[0]).pow(3u32)))));
    engine.register_function("math.root", 2, 2, number_fn(context, |x, c| {
                                 let exponent = c.number(x[1].recip_ref());
                                 Ok(c.number((&x[0]).pow(&exponent)))
                             }));
    engine.register_function("math.sqrt", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].sqrt_ref()))));
    engine.register_function("math.cbrt", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].cbrt_ref()))));

    engine.register_function("math.exp", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].exp_ref()))));
    engine.register_function("math.exp2", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].exp2_ref()))));
    engine.register_function("math.exp10", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].exp10_ref()))));
    engine.register_function("math.log", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].ln_ref()))));
    engine.register_function("math.log2", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].log2_ref()))));
    engine.register_function("math.log10", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].log10_ref()))));
    engine.register_function("math.logn", 2, 2, number_fn(context, |x, c| {
                                 let numerator = c.number(x[0].ln_ref());
                                 let denominator = c.number(x[1].ln_ref());
                                 Ok(c.number(&numerator / &denominator))
                             }));

    engine.register_function("math.sin", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].sin_ref()))));
    engine.register_function("math.cos", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].cos_ref()))));
    engine.register_function("math.tan", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].tan_ref()))));
    engine.register_function("math.cot", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].cot_ref()))));
    engine.register_function("math.sec", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].sec_ref()))));
    engine.register_function("math.csc", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].csc_ref()))));

    engine.register_function("math.asin", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].asin_ref()))));
    engine.register_function("math.acos", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].acos_ref()))));
    engine.register_function("math.atan", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].atan_ref()))));
    engine.register_function("math.atan2", 2, 2,
                             number_fn(context, |x, c| Ok(c.number(x[0].atan2_ref(&x[1])))));
    engine.register_function("math.acot", 1, 1, number_fn(context, |x, c| {
                                 let inverse = c.number(x[0].recip_ref());
                                 Ok(c.number(inverse.atan_ref()))
                             }));
    engine.register_function("math.asec", 1, 1, number_fn(context, |x, c| {
                                 let inverse = c.number(x[0].recip_ref());
                                 Ok(c.number(inverse.acos_ref()))
                             }));
    engine.register_function("math.acsc", 1, 1, number_fn(context, |x, c| {
                                 let inverse = c.number(x[0].recip_ref());
                                 Ok(c.number(inverse.asin_ref()))
                             }));

    engine.register_function("math.sinh", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].sinh_ref()))));
    engine.register_function("math.cosh", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].cosh_ref()))));
    engine.register_function("math.tanh", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].tanh_ref()))));
    engine.register_function("math.coth", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].coth_ref()))));
    engine.register_function("math.sech", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].sech_ref()))));
    engine.register_function("math.csch", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].csch_ref()))));

    engine.register_function("math.asinh", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].asinh_ref()))));
    engine.register_function("math.acosh", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].acosh_ref()))));
    engine.register_function("math.atanh", 1, 1,
                             number_fn(context, |x, c| Ok(c.number(x[0].atanh_ref()))));
    engine.register_function("math.acoth", 1, 1, number_fn(context, |x, c| {
                                 let inverse = c.number(x[0].recip_ref());
                                 Ok(c.number(inverse.atanh_ref()))
                             }));
    engine.register_function("math.asech", 1, 1, number_fn(context, |x, c| {
                                 let inverse = c.number(x[0].recip_ref());
                                 Ok(c.number(inverse.acosh_ref()))
                             }));
    engine.register_function("math.acsch", 1, 1, number_fn(context, |x, c| {
                                 let inverse = c.number(x[0].recip_ref());
                                 Ok(c.number(inverse.asinh_ref()))
                             }));

    engine.register_function("or", 2, 2, integer_fn(context, |a, b| a | b));
    engine.register_function("and", 2, 2, integer_fn(context, |a, b| a & b));
    engine.register_function("xor", 2, 2, integer_fn(context, |a, b| a ^ b));
    engine.register_function("lshift", 2, 2, shift_fn(context, |a, by| a << by));
    engine.register_function("rshift", 2, 2, shift_fn(context, |a, by| a >> by));

    engine.register_function("min", 1, UNLIMITED_ARGUMENTS, number_fn(context, |x, c| {
                                 Ok(c.number(pick(x, Ordering::Less)))
                             }));
    engine.register_function("max", 1, UNLIMITED_ARGUMENTS, number_fn(context, |x, c| {
                                 Ok(c.number(pick(x, Ordering::Greater)))
                             }));

    engine.register_function("math.mean", 1, UNLIMITED_ARGUMENTS, number_fn(context, |x, c| {
                                 let sum = c.number(Float::sum(x.iter()));
                                 let count = c.number(u32::try_from(x.len()).unwrap_or(u32::MAX));
                                 Ok(c.number(&sum / &count))
                             }));
    engine.register_function("math.median", 1, UNLIMITED_ARGUMENTS,
                             number_fn(context, |x, c| Ok(median(&sorted(x), c))));
    engine.register_function("math.mode", 1, UNLIMITED_ARGUMENTS,
                             number_fn(context, |x, c| Ok(c.number(&mode(&sorted(x))))));
    engine.register_function("math.q1", 1, UNLIMITED_ARGUMENTS, number_fn(context, |x, c| {
                                 let values = sorted(x);
                                 let middle = values.len() / 4;
                                 Ok(half_point(&values, middle, middle % 2 == 0, c))
                             }));
    engine.register_function("math.q2", 1, UNLIMITED_ARGUMENTS,
                             number_fn(context, |x, c| Ok(median(&sorted(x), c))));
    engine.register_function("math.q3", 1, UNLIMITED_ARGUMENTS, number_fn(context, |x, c| {
                                 let values = sorted(x);
                                 let middle = values.len() / 2;
                                 let index = middle + values.len() % 2 + middle / 2;
                                 Ok(half_point(&values, index, middle % 2 == 0, c))
                             }));

    engine.register_function("tostr", 1, 1, {
        let context = Rc::clone(context);
        Rc::new(move |args| Ok(Operand::Value(Value::Text(args[0].value()
                                                                 .render(&context.borrow())))))
    });
    engine.register_function("strlen", 1, 1, {
        let context = Rc::clone(context);
        Rc::new(move |args| {
            let value = args[0].value();
            let length = value.as_text()?.chars().count();
            let length = u32::try_from(length).unwrap_or(u32::MAX);
            Ok(Operand::Value(Value::Number(context.borrow().number(length))))
        })
    });

    let chem = Rc::new(chemical::build());
    engine.register_function("chem.M", 1, 1, Rc::new(move |args| {
                                 let value = args[0].value();
                                 Ok(Operand::Value(chemical::molar_mass(&chem, value.as_text()?)?))
                             }));

    engine.register_function("date.now", 0, 0, Rc::new(|_| {
                                 Ok(Operand::Value(Value::Timestamp(Local::now().naive_local())))
                             }));
    engine.register_function("date.parse", 1, 1, Rc::new(|args| {
                                 let value = args[0].value();
                                 Ok(Operand::Value(Value::Timestamp(parse_date(value.as_text()?)?)))
                             }));
    engine.register_function("date.dur", 1, 1, Rc::new(|args| {
                                 Ok(Operand::Value(Value::Duration(parse_dur(&args[0].value())?)))
                             }));
}

fn install_constants(engine: &Engine, context: &Rc<RefCell<MathContext>>) {
    let precision = context.borrow().precision;
    let number = |literal: &str| constant(precision, literal);

    engine.register_constant("null", Value::Null);

    engine.register_constant("inf", Value::Number(Float::with_val(precision, Special::Infinity)));
    engine.register_constant("ninf",
                             Value::Number(Float::with_val(precision, Special::NegInfinity)));
    engine.register_constant("nan", Value::Number(Float::with_val(precision, Special::Nan)));

    engine.register_constant("Y", number("1000000000000000000000000"));
    engine.register_constant("Z", number("1000000000000000000000"));
    engine.register_constant("E", number("1000000000000000000"));
    engine.register_constant("P", number("1000000000000000"));
    engine.register_constant("T", number("1000000000000"));
    engine.register_constant("G", number("1000000000"));
    engine.register_constant("M", number("1000000"));
    engine.register_constant("k", number("1000"));
    engine.register_constant("h", number("100"));
    engine.register_constant("da", number("10"));
    engine.register_constant("d", number("0.1"));
    engine.register_constant("c", number("0.01"));
    engine.register_constant("m", number("0.001"));
    engine.register_constant("u", number("0.000001"));
    engine.register_constant("n", number("0.000000001"));
    engine.register_constant("p", number("0.000000000001"));
    engine.register_constant("f", number("0.000000000000001"));
    engine.register_constant("a", number("0.000000000000000001"));
    engine.register_constant("z", number("0.000000000000000000001"));
    engine.register_constant("y", number("0.000000000000000000000001"));

    engine.register_constant("pc", number("0.01"));
    engine.register_constant("pm", number("0.001"));
    engine.register_constant("ptt", number("0.0001"));
    engine.register_constant("ppm", number("0.000001"));
    engine.register_constant("ppb", number("0.000000001"));
    engine.register_constant("ppt", number("0.000000000001"));
    engine.register_constant("ppq", number("0.000000000000001"));

    engine.register_constant("math.pi", Value::Number(Float::with_val(precision, Constant::Pi)));
    engine.register_constant("math.E", Value::Number(Float::with_val(precision, Constant::Euler)));
    engine.register_constant("math.catalan",
                             Value::Number(Float::with_val(precision, Constant::Catalan)));
    engine.register_constant("math.ln2", Value::Number(Float::with_val(precision, Constant::Log2)));
    engine.register_constant("math.e", number("2.71828182846"));

    engine.register_constant("phys.N", number("602214085700000000000000"));
    engine.register_constant("phys.c", number("299792458"));
    engine.register_constant("phys.au", number("149597870700"));
    engine.register_constant("phys.D", number("86400"));
    engine.register_constant("phys.M", number("1988920000000000000000000000000"));
    engine.register_constant("phys.ly", number("9460730472580800"));
    engine.register_constant("phys.pc", number("30856775814913700"));
    engine.register_constant("phys.G", number("0.00000000006674"));
    engine.register_constant("phys.g", number("9.80665"));
    engine.register_constant("phys.R", number("8.3144626181532"));

    engine.register_constant("googol",
                             number("10000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000"));
}

/// Builds a numeric constant from a decimal literal.
fn constant(precision: u32, literal: &str) -> Value {
    let parsed = Float::parse(literal).expect("constant literals are well-formed");
    Value::Number(Float::with_val(precision, parsed))
}

/// Wraps a callback over numeric arguments: every operand must be a number.
fn number_fn<F>(context: &Rc<RefCell<MathContext>>, op: F) -> FunctionFn
    where F: Fn(&[Float], &MathContext) -> Result<Float, Error> + 'static
{
    let context = Rc::clone(context);
    Rc::new(move |args| {
        let mut numbers = Vec::with_capacity(args.len());
        for arg in args {
            numbers.push(arg.value().as_number()?.clone());
        }
        Ok(Operand::Value(Value::Number(op(&numbers, &context.borrow())?)))
    })
}

/// Wraps a two-argument integer operation; operands are truncated first.
fn integer_fn<F>(context: &Rc<RefCell<MathContext>>, op: F) -> FunctionFn
    where F: Fn(rug::Integer, &rug::Integer) -> rug::Integer + 'static
{
    let context = Rc::clone(context);
    Rc::new(move |args| {
        let lhs = to_integer(&args[0].value())?;
        let rhs = to_integer(&args[1].value())?;
        Ok(Operand::Value(Value::Number(context.borrow().number(&op(lhs, &rhs)))))
    })
}

/// Wraps a shift operation; the shift amount must fit in `u32`.
fn shift_fn<F>(context: &Rc<RefCell<MathContext>>, op: F) -> FunctionFn
    where F: Fn(rug::Integer, u32) -> rug::Integer + 'static
{
    let context = Rc::clone(context);
    Rc::new(move |args| {
        let lhs = to_integer(&args[0].value())?;
        let by = to_unsigned(&args[1].value())?;
        Ok(Operand::Value(Value::Number(context.borrow().number(&op(lhs, by)))))
    })
}

fn logical_not(context: &Rc<RefCell<MathContext>>) -> UnaryFn {
    let context = Rc::clone(context);
    Rc::new(move |operand| {
        let result = !operand.value().is_truthy()?;
        Ok(Operand::Value(Value::Number(context.borrow().number(u32::from(result)))))
    })
}

fn absolute(context: &Rc<RefCell<MathContext>>) -> UnaryFn {
    let context = Rc::clone(context);
    Rc::new(move |operand| {
        let value = operand.value();
        Ok(Operand::Value(Value::Number(context.borrow().number(value.as_number()?.abs_ref()))))
    })
}

fn negate(context: &Rc<RefCell<MathContext>>) -> UnaryFn {
    let context = Rc::clone(context);
    Rc::new(move |operand| {
        let value = operand.value();
        match value {
            Value::Duration(duration) => Ok(Operand::Value(Value::Duration(-duration))),
            _ => Ok(Operand::Value(Value::Number(context.borrow().number(-value.as_number()?)))),
        }
    })
}

fn complement(context: &Rc<RefCell<MathContext>>) -> UnaryFn {
    let context = Rc::clone(context);
    Rc::new(move |operand| {
        let integer = to_integer(&operand.value())?;
        Ok(Operand::Value(Value::Number(context.borrow().number(&!integer))))
    })
}

/// Wraps a callback over two numeric operands.
fn number_binary<F>(context: &Rc<RefCell<MathContext>>, op: F) -> BinaryFn
    where F: Fn(&Float, &Float, &MathContext) -> Float + 'static
{
    let context = Rc::clone(context);
    Rc::new(move |lhs, rhs| {
        let (lhs, rhs) = (lhs.value(), rhs.value());
        let result = op(lhs.as_number()?, rhs.as_number()?, &context.borrow());
        Ok(Operand::Value(Value::Number(result)))
    })
}

/// The `+` operator: numeric addition, timestamp/duration arithmetic, or
/// string concatenation depending on the operand tags. In the concatenation
/// case `Null` contributes nothing.
fn addition(context: &Rc<RefCell<MathContext>>) -> BinaryFn {
    let context = Rc::clone(context);
    Rc::new(move |lhs, rhs| {
        let result = match (lhs.value(), rhs.value()) {
            (Value::Number(a), Value::Number(b)) => {
                Value::Number(context.borrow().number(&a + &b))
            },
            (Value::Timestamp(at), Value::Duration(by))
            | (Value::Duration(by), Value::Timestamp(at)) => {
                Value::Timestamp(at.checked_add_signed(by).ok_or(RuntimeError::DateOverflow)?)
            },
            (Value::Duration(a), Value::Duration(b)) => {
                Value::Duration(a.checked_add(&b).ok_or(RuntimeError::DateOverflow)?)
            },
            (a, b) => {
                let context = context.borrow();
                let mut text = String::new();
                if a != Value::Null {
                    text.push_str(&a.render(&context));
                }
                if b != Value::Null {
                    text.push_str(&b.render(&context));
                }
                Value::Text(text)
            },
        };
        Ok(Operand::Value(result))
    })
}

fn subtraction(context: &Rc<RefCell<MathContext>>) -> BinaryFn {
    let context = Rc::clone(context);
    Rc::new(move |lhs, rhs| {
        let result = match (lhs.value(), rhs.value()) {
            (Value::Number(a), Value::Number(b)) => {
                Value::Number(context.borrow().number(&a - &b))
            },
            (Value::Timestamp(at), Value::Duration(by)) => {
                Value::Timestamp(at.checked_sub_signed(by).ok_or(RuntimeError::DateOverflow)?)
            },
            (Value::Timestamp(a), Value::Timestamp(b)) => {
                Value::Duration(a.signed_duration_since(b))
            },
            (Value::Duration(a), Value::Duration(b)) => {
                Value::Duration(a.checked_sub(&b).ok_or(RuntimeError::DateOverflow)?)
            },
            (a, b) => {
                return Err(RuntimeError::TypeMismatch { expected: a.kind(),
                                                        found:    b.kind(), }.into());
            },
        };
        Ok(Operand::Value(result))
    })
}

/// The `*` operator: numeric multiplication, string repetition, or duration
/// scaling depending on the operand tags. Also serves as the juxtaposition
/// operator.
pub fn multiplication(context: &Rc<RefCell<MathContext>>) -> BinaryFn {
    let context = Rc::clone(context);
    Rc::new(move |lhs, rhs| {
        let result = match (lhs.value(), rhs.value()) {
            (Value::Number(a), Value::Number(b)) => {
                Value::Number(context.borrow().number(&a * &b))
            },
            (Value::Text(text), Value::Number(count)) => {
                let count = count.to_f64();
                if !count.is_finite() || count < 0.0 {
                    return Err(RuntimeError::IntegerConversion.into());
                }
                Value::Text(text.repeat(count as usize))
            },
            (Value::Duration(by), Value::Number(factor))
            | (Value::Number(factor), Value::Duration(by)) => {
                Value::Duration(scale_duration(by, &factor)?)
            },
            (a, b) => {
                return Err(RuntimeError::TypeMismatch { expected: a.kind(),
                                                        found:    b.kind(), }.into());
            },
        };
        Ok(Operand::Value(result))
    })
}

fn division(context: &Rc<RefCell<MathContext>>) -> BinaryFn {
    let context = Rc::clone(context);
    Rc::new(move |lhs, rhs| {
        let result = match (lhs.value(), rhs.value()) {
            (Value::Number(a), Value::Number(b)) => {
                Value::Number(context.borrow().number(&a / &b))
            },
            (Value::Duration(by), Value::Number(divisor)) => {
                let inverse = context.borrow().number(divisor.recip_ref());
                Value::Duration(scale_duration(by, &inverse)?)
            },
            (a, b) => {
                return Err(RuntimeError::TypeMismatch { expected: a.kind(),
                                                        found:    b.kind(), }.into());
            },
        };
        Ok(Operand::Value(result))
    })
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn scale_duration(duration: TimeDelta, factor: &Float) -> Result<TimeDelta, Error> {
    let factor = factor.to_f64();
    if !factor.is_finite() {
        return Err(RuntimeError::DateOverflow.into());
    }

    let scaled = duration.num_milliseconds() as f64 * factor;
    if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
        return Err(RuntimeError::DateOverflow.into());
    }

    Ok(TimeDelta::milliseconds(scaled as i64))
}

/// Orders two values of the same kind; numbers containing NaN order as
/// `None`, which makes every comparison against them false.
fn compare(lhs: &Value, rhs: &Value) -> Result<Option<Ordering>, Error> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(a.partial_cmp(b)),
        (Value::Text(a), Value::Text(b)) => Ok(Some(a.cmp(b))),
        (Value::Timestamp(a), Value::Timestamp(b)) => Ok(Some(a.cmp(b))),
        (Value::Duration(a), Value::Duration(b)) => Ok(Some(a.cmp(b))),
        (a, b) => Err(RuntimeError::TypeMismatch { expected: a.kind(),
                                                   found:    b.kind(), }.into()),
    }
}

fn comparison<F>(context: &Rc<RefCell<MathContext>>, accept: F) -> BinaryFn
    where F: Fn(Option<Ordering>) -> bool + 'static
{
    let context = Rc::clone(context);
    Rc::new(move |lhs, rhs| {
        let result = accept(compare(&lhs.value(), &rhs.value())?);
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

fn random(context: &Rc<RefCell<MathContext>>,
          rng: &Rc<RefCell<RandState<'static>>>)
          -> FunctionFn {
    let context = Rc::clone(context);
    let rng = Rc::clone(rng);
    Rc::new(move |args| {
        let context = context.borrow();
        let mut rng = rng.borrow_mut();
        let uniform = Float::with_val(context.precision, Float::random_cont(&mut *rng));

        let result = match args.len() {
            0 => uniform,
            1 => {
                let value = args[0].value();
                context.number(&uniform * value.as_number()?)
            },
            _ => {
                let (low, high) = (args[0].value(), args[1].value());
                let (low, high) = (low.as_number()?, high.as_number()?);
                let width = context.number(high - low);
                context.number(low + &context.number(&uniform * &width))
            },
        };
        Ok(Operand::Value(Value::Number(result)))
    })
}

/// Folds the extreme of a non-empty argument list, skipping NaN like the
/// underlying comparison does.
fn pick(values: &[Float], keep: Ordering) -> Float {
    let mut result = values[0].clone();
    for value in &values[1..] {
        if value.partial_cmp(&result) == Some(keep) {
            result = value.clone();
        }
    }
    result
}

fn sorted(values: &[Float]) -> Vec<Float> {
    let mut values = values.to_vec();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    values
}

/// Mean of the two elements around `index` when the split is even,
/// otherwise the element at `index` itself.
fn half_point(values: &[Float], index: usize, even: bool, context: &MathContext) -> Float {
    if even && index > 0 && index < values.len() {
        let sum = context.number(&values[index - 1] + &values[index]);
        return context.number(&sum / 2u32);
    }
    context.number(&values[index.min(values.len() - 1)])
}

fn median(values: &[Float], context: &MathContext) -> Float {
    let middle = values.len() / 2;
    if values.len() % 2 == 0 {
        let sum = context.number(&values[middle - 1] + &values[middle]);
        return context.number(&sum / 2u32);
    }
    context.number(&values[middle])
}

/// Most frequent element of a sorted list; the first such element wins ties.
fn mode(values: &[Float]) -> Float {
    let mut best = &values[0];
    let mut best_run = 1;
    let mut current = &values[0];
    let mut run = 1;

    for value in &values[1..] {
        if value == current {
            run += 1;
        } else {
            if run > best_run {
                best_run = run;
                best = current;
            }
            current = value;
            run = 1;
        }
    }
    if run > best_run {
        best = current;
    }

    best.clone()
}

fn parse_date(text: &str) -> Result<NaiveDateTime, RuntimeError> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(parsed);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(midnight);
    }

    Err(RuntimeError::InvalidDate { text: text.to_string() })
}

/// Interprets a duration argument: a number counts seconds, a string is
/// `[-]H:MM:SS` with an optional fractional second part.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn parse_dur(value: &Value) -> Result<TimeDelta, Error> {
    if let Value::Number(seconds) = value {
        let seconds = seconds.to_f64();
        if !seconds.is_finite() || seconds.abs() >= i64::MAX as f64 / 1_000.0 {
            return Err(RuntimeError::DateOverflow.into());
        }
        return Ok(TimeDelta::milliseconds((seconds * 1_000.0) as i64));
    }

    let text = value.as_text()?;
    let invalid = || RuntimeError::InvalidDuration { text: text.to_string() };

    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let parts: Vec<&str> = body.split(':').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|part| part.is_empty()) {
        return Err(invalid().into());
    }

    let mut seconds = 0.0f64;
    for part in &parts {
        let value: f64 = part.parse().map_err(|_| invalid())?;
        if value < 0.0 {
            return Err(invalid().into());
        }
        seconds = seconds * 60.0 + value;
    }

    #[allow(clippy::cast_possible_truncation)]
    let mut milliseconds = (seconds * 1_000.0) as i64;
    if negative {
        milliseconds = -milliseconds;
    }
    Ok(TimeDelta::milliseconds(milliseconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse_from_numbers_and_clock_strings() {
        assert_eq!(parse_dur(&Value::Number(Float::with_val(53, 90))).unwrap(),
                   TimeDelta::seconds(90));
        assert_eq!(parse_dur(&Value::Text(String::from("1:30:00"))).unwrap(),
                   TimeDelta::seconds(5_400));
        assert_eq!(parse_dur(&Value::Text(String::from("-0:00:30"))).unwrap(),
                   TimeDelta::seconds(-30));
        assert!(parse_dur(&Value::Text(String::from("1:2:3:4"))).is_err());
    }

    #[test]
    fn dates_parse_with_and_without_time() {
        let full = parse_date("2020-06-01 12:30:00").unwrap();
        assert_eq!(full.format("%H:%M").to_string(), "12:30");
        let midnight = parse_date("2020-06-01").unwrap();
        assert_eq!(midnight.format("%H:%M:%S").to_string(), "00:00:00");
        assert!(parse_date("junk").is_err());
    }
}
