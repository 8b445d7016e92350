use reckon::{
    error::{Error, ParseError},
    interpreter::value::Value,
    setup::{Options, Session},
};

fn session() -> Session {
    Session::new(&Options::default())
}

fn eval(session: &mut Session, source: &str) -> Value {
    session.evaluate_statement(source)
           .unwrap_or_else(|e| panic!("'{source}' failed: {e}"))
}

fn number(session: &mut Session, source: &str) -> f64 {
    eval(session, source).as_number()
                         .unwrap_or_else(|e| panic!("'{source}' not numeric: {e}"))
                         .to_f64()
}

fn render(session: &mut Session, source: &str) -> String {
    let value = eval(session, source);
    let context = session.context.borrow();
    value.render(&context)
}

#[test]
fn left_associative_operators_group_left() {
    let mut s = session();
    assert_eq!(number(&mut s, "2-3-4"), -5.0);
    assert_eq!(number(&mut s, "100/10/5"), 2.0);
    assert_eq!(number(&mut s, "7 // 2"), 3.0);
    assert_eq!(number(&mut s, "7 % 3"), 1.0);
}

#[test]
fn right_associative_operators_group_right() {
    let mut s = session();
    assert_eq!(number(&mut s, "2**3**2"), 512.0);
    assert_eq!(number(&mut s, "2^3^2"), 512.0);
}

#[test]
fn unary_minus_binds_below_exponentiation() {
    let mut s = session();
    assert_eq!(number(&mut s, "-2**2"), -4.0);
    assert_eq!(number(&mut s, "-2*3"), -6.0);
    assert_eq!(number(&mut s, "--2"), 2.0);
    // Unary '+' is absolute value.
    assert_eq!(number(&mut s, "+-5"), 5.0);
}

#[test]
fn precedence_follows_the_configured_table() {
    let mut s = session();
    assert_eq!(number(&mut s, "1+2*3"), 7.0);
    assert_eq!(number(&mut s, "(1+2)*3"), 9.0);
    assert_eq!(number(&mut s, "2*3 == 6"), 1.0);
    assert_eq!(number(&mut s, "1 < 2 && 2 < 3"), 1.0);
}

#[test]
fn parenthesization_round_trips() {
    let mut s = session();
    for source in ["2+3*4", "-2**2", "math.sqrt(16)", "\"ab\" + \"cd\""] {
        let plain = eval(&mut s, source);
        let wrapped = eval(&mut s, &format!("({source})"));
        assert_eq!(plain, wrapped, "'{source}' changed under parentheses");
    }
}

#[test]
fn assignment_initializes_and_chains() {
    let mut s = session();
    assert_eq!(number(&mut s, "x = 5"), 5.0);
    assert!(s.take_unbound().is_empty());
    assert_eq!(number(&mut s, "x"), 5.0);
    assert_eq!(number(&mut s, "x = x + 1"), 6.0);

    assert_eq!(number(&mut s, "a = b = 3"), 3.0);
    assert_eq!(number(&mut s, "a"), 3.0);
    assert_eq!(number(&mut s, "b"), 3.0);
}

#[test]
fn assignment_to_non_variable_is_an_error() {
    let mut s = session();
    let error = s.evaluate_statement("5 = 3").unwrap_err();
    assert_eq!(error, Error::Parse(ParseError::AssignmentTarget));
    let error = s.evaluate_statement("math.pi + 1 = 3").unwrap_err();
    assert_eq!(error, Error::Parse(ParseError::AssignmentTarget));
}

#[test]
fn reading_an_unknown_identifier_leaves_no_trace() {
    let mut s = session();

    for _ in 0..2 {
        let value = eval(&mut s, "y");
        assert_eq!(value, Value::Null);
        assert_eq!(s.take_unbound(), vec![String::from("y")]);
    }

    // A failing statement still rolls its declarations back.
    assert!(s.evaluate_statement("z - 1").is_err());
    assert_eq!(s.take_unbound(), vec![String::from("z")]);
    assert!(s.engine().resolve_variable("z").is_none());
}

#[test]
fn call_syntax_never_auto_declares() {
    let mut s = session();
    let error = s.evaluate_statement("foo(1)").unwrap_err();
    assert_eq!(error,
               Error::Parse(ParseError::UnknownFunction { name: String::from("foo") }));
    assert!(s.take_unbound().is_empty());
}

#[test]
fn function_arity_is_enforced() {
    let mut s = session();
    assert_eq!(number(&mut s, "math.pow(2, 10)"), 1024.0);

    let error = s.evaluate_statement("math.pow(2)").unwrap_err();
    assert_eq!(error,
               Error::Parse(ParseError::ArgumentCount { name:  String::from("math.pow"),
                                                        min:   2,
                                                        max:   2,
                                                        found: 1, }));
    assert!(s.evaluate_statement("math.pow(1, 2, 3)").is_err());

    // ans takes zero or one argument.
    assert!(s.evaluate_statement("ans(0, 1)").is_err());
}

#[test]
fn history_indexes_absolutely_and_relatively() {
    let mut s = session();
    eval(&mut s, "10");
    eval(&mut s, "20");
    eval(&mut s, "30");

    // Query through the engine directly so the probes do not grow history.
    let engine = s.engine();
    assert_eq!(engine.evaluate("ans()").unwrap().as_number().unwrap().to_f64(), 30.0);
    assert_eq!(engine.evaluate("ans(-2)").unwrap().as_number().unwrap().to_f64(), 20.0);
    assert_eq!(engine.evaluate("ans(0)").unwrap().as_number().unwrap().to_f64(), 10.0);

    let error = engine.evaluate("ans(5)").unwrap_err();
    assert_eq!(error,
               Error::Parse(ParseError::HistoryIndexOutOfRange { index: 5, count: 3 }));
}

#[test]
fn juxtaposition_multiplies_and_can_be_disabled() {
    let mut s = session();
    let explicit = eval(&mut s, "2*math.pi");
    let implicit = eval(&mut s, "2 math.pi");
    assert_eq!(explicit, implicit);

    assert_eq!(number(&mut s, "2(3+4)"), 14.0);

    s.set_juxtaposition(None);
    assert!(s.evaluate_statement("2 math.pi").is_err());
    s.set_juxtaposition(Some(-1));
    assert!(number(&mut s, "2 math.pi") > 6.0);
}

#[test]
fn juxtaposition_offset_changes_binding() {
    // Below multiplication: 1/2 pi == (1/2)*pi.
    let mut below = session();
    below.set_juxtaposition(Some(-1));
    let loose = number(&mut below, "1/2 math.pi");
    assert!((loose - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

    // Above multiplication: 1/2 pi == 1/(2*pi).
    let mut above = session();
    above.set_juxtaposition(Some(1));
    let tight = number(&mut above, "1/2 math.pi");
    assert!((tight - 1.0 / (2.0 * std::f64::consts::PI)).abs() < 1e-12);
}

#[test]
fn input_base_governs_literals() {
    let mut s = session();
    session_base(&mut s, 16, 10);
    assert_eq!(number(&mut s, "ff"), 255.0);
    assert_eq!(number(&mut s, "10"), 16.0);
}

#[test]
fn base_sixteen_round_trips() {
    let mut s = session();
    session_base(&mut s, 16, 16);
    s.context.borrow_mut().digits = 0;
    assert_eq!(render(&mut s, "ff"), "ff");
}

fn session_base(session: &mut Session, input: i32, output: i32) {
    let mut context = session.context.borrow_mut();
    context.input_base = input;
    context.output_base = output;
}

#[test]
fn scientific_notation_is_accepted_in_decimal() {
    let mut s = session();
    assert_eq!(number(&mut s, "1.5e3"), 1500.0);
    assert_eq!(number(&mut s, "2.5e-3"), 0.0025);
    assert_eq!(number(&mut s, "1e+2"), 100.0);
}

#[test]
fn numeric_specials_propagate_instead_of_failing() {
    let mut s = session();
    assert_eq!(render(&mut s, "1/0"), "inf");
    assert_eq!(render(&mut s, "-1/0"), "-inf");
    assert_eq!(render(&mut s, "0/0"), "nan");
    assert_eq!(render(&mut s, "math.sqrt(-1)"), "nan");
    // NaN propagates through arithmetic and compares false.
    assert_eq!(render(&mut s, "nan + 1"), "nan");
    assert_eq!(number(&mut s, "nan == nan"), 0.0);
    assert_eq!(number(&mut s, "nan != 1"), 0.0);
    assert_eq!(number(&mut s, "nan < 1"), 0.0);
}

#[test]
fn lexical_errors_carry_their_position() {
    let mut s = session();
    let error = s.evaluate_statement("1 + `").unwrap_err();
    assert_eq!(error,
               Error::Parse(ParseError::UnrecognizedCharacter { found:    '`',
                                                                position: 4, }));
}

#[test]
fn malformed_input_is_a_syntax_error() {
    let mut s = session();
    assert!(s.evaluate_statement("(1 + 2").is_err());
    assert!(s.evaluate_statement("1 +").is_err());
    assert!(s.evaluate_statement("math.sin 1").is_err());
    assert!(s.evaluate_statement("").is_err());
}

#[test]
fn greedy_operator_matching_prefers_the_longest() {
    let mut s = session();
    // ** must win over * even though both are registered.
    assert_eq!(number(&mut s, "2**3"), 8.0);
    // A binary minus followed by a unary minus.
    assert_eq!(number(&mut s, "2--3"), 5.0);
    assert_eq!(number(&mut s, "2**-1"), 0.5);
}
