use reckon::{
    interpreter::value::Value,
    setup::{self, Mode, Options, Session, commands},
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
fn constants_are_registered() {
    let mut s = session();
    assert!((number(&mut s, "math.pi") - std::f64::consts::PI).abs() < 1e-12);
    assert_eq!(number(&mut s, "k"), 1000.0);
    assert_eq!(number(&mut s, "ppm"), 1e-6);
    assert_eq!(number(&mut s, "phys.c"), 299_792_458.0);
    assert_eq!(eval(&mut s, "null"), Value::Null);
    assert_eq!(render(&mut s, "googol"), "1e100");
}

#[test]
fn function_library_behaves() {
    let mut s = session();
    assert_eq!(number(&mut s, "math.sqrt(9)"), 3.0);
    assert_eq!(number(&mut s, "math.cbrt(27)"), 3.0);
    assert_eq!(number(&mut s, "math.exp2(10)"), 1024.0);
    assert_eq!(number(&mut s, "math.log10(1000)"), 3.0);
    assert_eq!(number(&mut s, "math.logn(8, 2)"), 3.0);
    assert!(number(&mut s, "math.sin(0)").abs() < 1e-12);
    assert!((number(&mut s, "math.atan2(1, 1)") - std::f64::consts::FRAC_PI_4).abs() < 1e-12);

    assert_eq!(number(&mut s, "trunc(3.7)"), 3.0);
    assert_eq!(number(&mut s, "sgn(-42)"), -1.0);
    assert_eq!(number(&mut s, "sgn(0)"), 0.0);
    assert_eq!(number(&mut s, "abs(-5)"), 5.0);
    assert_eq!(number(&mut s, "neg(5)"), -5.0);
    assert_eq!(number(&mut s, "neg2(-5)"), -5.0);

    assert_eq!(number(&mut s, "min(3, 1, 2)"), 1.0);
    assert_eq!(number(&mut s, "max(3, 1, 2)"), 3.0);
    assert_eq!(number(&mut s, "math.mean(1, 2, 3)"), 2.0);
    assert_eq!(number(&mut s, "math.median(5, 1, 3)"), 3.0);
    assert_eq!(number(&mut s, "math.median(4, 1, 3, 2)"), 2.5);
    assert_eq!(number(&mut s, "math.mode(1, 2, 2, 3)"), 2.0);

    assert_eq!(number(&mut s, "or(12, 10)"), 14.0);
    assert_eq!(number(&mut s, "and(12, 10)"), 8.0);
    assert_eq!(number(&mut s, "xor(12, 10)"), 6.0);
    assert_eq!(number(&mut s, "lshift(1, 8)"), 256.0);
    assert_eq!(number(&mut s, "rshift(256, 4)"), 16.0);

    assert_eq!(number(&mut s, "bconv(\"ff\", 16)"), 255.0);
    assert_eq!(number(&mut s, "~0"), -1.0);
}

#[test]
fn string_values_overload_the_operators() {
    let mut s = session();
    assert_eq!(eval(&mut s, "\"ab\" + \"cd\""), Value::Text(String::from("abcd")));
    assert_eq!(eval(&mut s, "\"ab\" * 3"), Value::Text(String::from("ababab")));
    assert_eq!(number(&mut s, "strlen(\"abcd\")"), 4.0);
    assert_eq!(eval(&mut s, "\"n = \" + 2"), Value::Text(String::from("n = 2")));

    // Concatenation with an uninitialized (null) variable drops the null.
    assert_eq!(eval(&mut s, "ghost + 1"), Value::Text(String::from("1")));
    assert_eq!(s.take_unbound(), vec![String::from("ghost")]);

    s.context.borrow_mut().output_base = 16;
    assert_eq!(eval(&mut s, "tostr(255)"), Value::Text(String::from("ff")));
}

#[test]
fn timestamps_and_durations_combine() {
    let mut s = session();
    assert_eq!(render(&mut s, "date.parse(\"2020-01-01\") + date.dur(86400)"),
               "2020-01-02 00:00:00");
    assert_eq!(render(&mut s, "date.parse(\"2020-01-02\") - date.parse(\"2020-01-01\")"),
               "24:00:00");
    assert_eq!(render(&mut s, "date.dur(\"1:30:00\") * 2"), "03:00:00");
    assert_eq!(render(&mut s, "date.dur(90) + date.dur(30)"), "00:02:00");
    assert_eq!(render(&mut s, "date.parse(\"2020-01-01 06:00:00\") - date.dur(\"6:00:00\")"),
               "2020-01-01 00:00:00");

    // The date output format is runtime-configurable.
    s.context.borrow_mut().date_format = String::from("%d.%m.%Y");
    assert_eq!(render(&mut s, "date.parse(\"2020-01-02\")"), "02.01.2020");

    assert!(s.evaluate_statement("date.parse(\"bogus\")").is_err());
    assert!(s.evaluate_statement("date.parse(\"2020-01-01\") * 2").is_err());
}

#[test]
fn molar_mass_goes_through_the_nested_engine() {
    let mut s = session();
    assert!((number(&mut s, "chem.M(\"H2O\")") - 18.01528).abs() < 1e-4);
    assert!((number(&mut s, "chem.M(\"C6H12O6\")") - 180.155_88).abs() < 1e-3);
    assert!((number(&mut s, "chem.M(\"Ca(OH)2\")") - 74.092_68).abs() < 1e-3);

    // The nested engine keeps its own context: dropping the outer precision
    // to 8 bits must not degrade formula evaluation.
    s.context.borrow_mut().precision = 8;
    assert!((number(&mut s, "chem.M(\"H2O\")") - 18.01528).abs() < 1e-4);

    assert!(s.evaluate_statement("chem.M(\"Xx\")").is_err());
    assert!(s.evaluate_statement("chem.M(\"2HO\")").is_err());
}

#[test]
fn random_is_seeded_and_reproducible() {
    let mut one = Session::new(&Options { seed: 42, ..Options::default() });
    let mut two = Session::new(&Options { seed: 42, ..Options::default() });

    let a = eval(&mut one, "random()");
    let b = eval(&mut two, "random()");
    assert_eq!(a, b);

    let value = number(&mut one, "random(10, 20)");
    assert!((10.0..20.0).contains(&value));
}

#[test]
fn binary_mode_switches_the_grammar() {
    let mut s = Session::new(&Options { binary: true, ..Options::default() });
    assert_eq!(s.mode, Mode::Binary);

    assert_eq!(number(&mut s, "6 + 9"), 15.0);
    assert_eq!(number(&mut s, "6 * 3"), 2.0);
    assert_eq!(number(&mut s, "1 << 10"), 1024.0);
    assert_eq!(number(&mut s, "12 ^ 10"), 6.0);
    assert_eq!(number(&mut s, "true"), 1.0);
    assert_eq!(number(&mut s, "iM"), f64::from(i32::MAX));

    // Both grammars share one history.
    s.switch_mode();
    assert_eq!(s.mode, Mode::Default);
    assert_eq!(number(&mut s, "ans(0)"), 15.0);
}

#[test]
fn statements_split_outside_strings_only() {
    let mut s = session();
    for statement in setup::split_statements("1+1; x = \"a;b\"; strlen(x)") {
        if !statement.trim().is_empty() {
            eval(&mut s, &statement);
        }
    }
    assert_eq!(s.history.borrow().count(), 3);
    let latest = s.history.borrow().latest().unwrap().clone();
    assert_eq!(latest.as_number().unwrap().to_f64(), 3.0);
}

#[test]
fn listing_reflects_the_registry() {
    let s = session();
    let listing = commands::render_listing(s.engine(), &s.context.borrow(), ".*").unwrap();
    assert!(listing.contains("math.sin"));
    assert!(listing.contains("**"));
    assert!(listing.contains("googol"));

    let filtered = commands::render_listing(s.engine(), &s.context.borrow(), "^math").unwrap();
    assert!(filtered.contains("math.cos"));
    assert!(!filtered.contains("googol"));

    assert!(commands::render_listing(s.engine(), &s.context.borrow(), "(").is_err());
}

#[test]
fn clearing_variables_keeps_constants() {
    let mut s = session();
    eval(&mut s, "x = 5");
    assert!(s.engine().resolve_variable("x").is_some());

    s.clear_variables();
    assert!(s.engine().resolve_variable("x").is_none());
    assert!(s.engine().resolve_variable("math.pi").is_some());
}

#[test]
fn context_changes_apply_to_subsequent_statements() {
    let mut s = session();
    commands::execute(&mut s, "base 16").unwrap();
    commands::execute(&mut s, "digits 0").unwrap();
    assert_eq!(render(&mut s, "ff"), "ff");
    assert_eq!(render(&mut s, "ff + 1"), "100");

    commands::execute(&mut s, "base 10").unwrap();
    assert_eq!(render(&mut s, "255"), "255");
}
