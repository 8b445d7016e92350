use std::{cell::RefCell, rc::Rc};

use rug::Float;

use crate::{
    error::{Error, ParseError},
    interpreter::{
        context::MathContext,
        registry::{Associativity, BinaryFn, Engine},
        value::{Operand, Value},
    },
};

/// Atomic masses by element symbol, in unified atomic mass units.
const ATOMIC_MASSES: &[(&str, &str)] = &[
    ("H", "1.00794"),
    ("He", "4.002602"),
    ("Li", "6.941"),
    ("Be", "9.012182"),
    ("B", "10.811"),
    ("C", "12.0107"),
    ("N", "14.0067"),
    ("O", "15.9994"),
    ("F", "18.998403"),
    ("Ne", "20.1797"),
    ("Na", "22.989769"),
    ("Mg", "24.305"),
    ("Al", "26.981539"),
    ("Si", "28.0855"),
    ("P", "30.973762"),
    ("S", "32.065"),
    ("Cl", "35.453"),
    ("Ar", "39.948"),
    ("K", "39.0983"),
    ("Ca", "40.078"),
    ("Sc", "44.955912"),
    ("Ti", "47.867"),
    ("V", "50.9415"),
    ("Cr", "51.9961"),
    ("Mn", "54.938045"),
    ("Fe", "55.845"),
    ("Co", "58.933195"),
    ("Ni", "58.6934"),
    ("Cu", "63.546"),
    ("Zn", "65.38"),
    ("Ga", "69.723"),
    ("Ge", "72.64"),
    ("As", "74.9216"),
    ("Se", "78.96"),
    ("Br", "79.904"),
    ("Kr", "83.798"),
    ("Rb", "85.4678"),
    ("Sr", "87.62"),
    ("Y", "88.90585"),
    ("Zr", "91.224"),
    ("Nb", "92.90638"),
    ("Mo", "95.94"),
    ("Tc", "98"),
    ("Ru", "101.07"),
    ("Rh", "102.9055"),
    ("Pd", "106.42"),
    ("Ag", "107.8682"),
    ("Cd", "112.411"),
    ("In", "114.818"),
    ("Sn", "118.71"),
    ("Sb", "121.76"),
    ("Te", "127.6"),
    ("I", "126.90447"),
    ("Xe", "131.293"),
    ("Cs", "132.90545"),
    ("Ba", "137.327"),
    ("La", "138.90547"),
    ("Ce", "140.116"),
    ("Pr", "140.90765"),
    ("Nd", "144.242"),
    ("Pm", "145"),
    ("Sm", "150.36"),
    ("Eu", "151.964"),
    ("Gd", "157.25"),
    ("Tb", "158.92535"),
    ("Dy", "162.5"),
    ("Ho", "164.93032"),
    ("Er", "167.259"),
    ("Tm", "168.93421"),
    ("Yb", "173.04"),
    ("Lu", "174.967"),
    ("Hf", "178.49"),
    ("Ta", "180.94788"),
    ("W", "183.84"),
    ("Re", "186.207"),
    ("Os", "190.23"),
    ("Ir", "192.217"),
    ("Pt", "195.084"),
    ("Au", "196.96657"),
    ("Hg", "200.59"),
    ("Tl", "204.3833"),
    ("Pb", "207.2"),
    ("Bi", "208.9804"),
    ("Po", "209"),
    ("At", "210"),
    ("Rn", "222"),
    ("Fr", "223"),
    ("Ra", "226"),
    ("Ac", "227"),
    ("Th", "232.03806"),
    ("Pa", "231.03588"),
    ("U", "238.02891"),
    ("Np", "237"),
    ("Pu", "244"),
    ("Am", "243"),
    ("Cm", "247"),
    ("Bk", "247"),
    ("Cf", "251"),
    ("Es", "252"),
    ("Fm", "257"),
    ("Md", "258"),
    ("No", "259"),
    ("Lr", "262"),
    ("Rf", "261"),
    ("Db", "262"),
    ("Sg", "266"),
    ("Bh", "264"),
    ("Hs", "277"),
    ("Mt", "268"),
    ("Ds", "281"),
    ("Uun", "281"),
    ("Rg", "272"),
    ("Uuu", "272"),
    ("Cn", "285"),
    ("UUb", "285"),
    ("Uut", "284"),
    ("Fl", "289"),
    ("Uuq", "289"),
    ("Uup", "288"),
    ("Lv", "292"),
    ("Uuh", "292"),
    ("Uus", "294"),
    ("Uuo", "294"),
];

/// Builds the chemical sub-evaluator: an independently-configured engine
/// whose whole grammar is `+`, `*` and juxtaposition-as-multiplication over
/// the element-mass constants.
///
/// The instance owns its own context, so the surrounding calculator's bases
/// and precision never leak into formula evaluation, and it installs no
/// unknown-identifier hook: an unknown element symbol is an error.
#[must_use]
pub fn build() -> Engine {
    let context = Rc::new(RefCell::new(MathContext { precision: 128,
                                                     ..MathContext::default() }));
    let mut engine = Engine::new(Rc::clone(&context));

    engine.register_binary("+", 5, Associativity::Left, numeric(&context, false));
    engine.register_binary("*", 6, Associativity::Left, numeric(&context, true));
    engine.set_juxtaposition(6, Associativity::Right, numeric(&context, true));

    let precision = context.borrow().precision;
    for (symbol, mass) in ATOMIC_MASSES {
        let parsed = Float::parse(mass).expect("atomic masses are well-formed");
        engine.register_constant(symbol, Value::Number(Float::with_val(precision, parsed)));
    }

    engine
}

fn numeric(context: &Rc<RefCell<MathContext>>, multiply: bool) -> BinaryFn {
    let context = Rc::clone(context);
    Rc::new(move |lhs, rhs| {
        let (lhs, rhs) = (lhs.value(), rhs.value());
        let (a, b) = (lhs.as_number()?, rhs.as_number()?);
        let context = context.borrow();
        let result = if multiply { context.number(a * b) } else { context.number(a + b) };
        Ok(Operand::Value(Value::Number(result)))
    })
}

/// Rewrites a chemical compound string into an arithmetic expression over
/// element symbols: `*` before each subscript digit run, `+` at element and
/// group boundaries. `H2O` becomes `H*2+O`, `Ca(OH)2` becomes `Ca+(O+H)*2`.
///
/// # Errors
/// Returns `ParseError::InvalidCompound` when the string is empty, starts
/// with a digit, or contains anything but alphanumerics and parentheses.
pub fn rewrite_formula(text: &str) -> Result<String, ParseError> {
    if text.is_empty() || text.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(ParseError::InvalidCompound { details: String::from("must start with an element symbol") });
    }

    let mut result = String::with_capacity(text.len() * 2);
    let mut last = '\0';
    for c in text.chars() {
        if !c.is_ascii_alphanumeric() && c != '(' && c != ')' {
            return Err(ParseError::InvalidCompound { details: format!("unexpected character '{c}'") });
        }

        if last != '\0' && last != '(' {
            if c.is_ascii_digit() {
                if !last.is_ascii_digit() {
                    result.push('*');
                }
            } else if c.is_ascii_uppercase() || c == '(' {
                result.push('+');
            }
        }

        result.push(c);
        last = c;
    }

    Ok(result)
}

/// Computes the molar mass of a compound by rewriting it and evaluating the
/// result on the chemical engine.
///
/// # Errors
/// Propagates rewrite errors and evaluation errors (an unknown element
/// symbol surfaces as an unknown identifier).
pub fn molar_mass(engine: &Engine, compound: &str) -> Result<Value, Error> {
    engine.evaluate(&rewrite_formula(compound)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_subscripts_and_groups() {
        assert_eq!(rewrite_formula("H2O").unwrap(), "H*2+O");
        assert_eq!(rewrite_formula("Ca(OH)2").unwrap(), "Ca+(O+H)*2");
        assert_eq!(rewrite_formula("C6H12O6").unwrap(), "C*6+H*12+O*6");
        assert_eq!(rewrite_formula("NaCl").unwrap(), "Na+Cl");
    }

    #[test]
    fn rejects_malformed_compounds() {
        assert!(rewrite_formula("").is_err());
        assert!(rewrite_formula("2HO").is_err());
        assert!(rewrite_formula("H2O!").is_err());
    }

    #[test]
    fn evaluates_molar_masses() {
        let engine = build();
        let water = molar_mass(&engine, "H2O").unwrap();
        let mass = water.as_number().unwrap().to_f64();
        assert!((mass - 18.01528).abs() < 1e-4);

        assert!(molar_mass(&engine, "Xx2").is_err());
    }
}
