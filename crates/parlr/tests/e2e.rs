//! End-to-end scenarios: grammar in, parse out.

use parlr::grammar::{Assoc, Grammar, SymbolID::*};
use parlr::runtime::glr::GlrSemanticAction;
use parlr::runtime::parser::SemanticAction;
use parlr::runtime::spec::ParserSpec;
use parlr::runtime::Token;
use parlr::{generate, GeneratorOptions};

fn act<V, F>(f: F) -> SemanticAction<V>
where
    F: Fn(Vec<V>) -> V + Send + Sync + 'static,
{
    Box::new(f)
}

fn glr_act<V, F>(f: F) -> GlrSemanticAction<V>
where
    F: Fn(&[V]) -> V + Send + Sync + 'static,
{
    Box::new(f)
}

/// Tokenize a whitespace-separated sentence against the grammar's terminal
/// names; a `NAME=value` entry carries a value, everything else carries its
/// own name.
fn tokens(spec: &ParserSpec, sentence: &str) -> Vec<Token<String>> {
    sentence
        .split_whitespace()
        .map(|word| {
            let (name, value) = match word.split_once('=') {
                Some((name, value)) => (name, value.to_owned()),
                None => (word, word.to_owned()),
            };
            let terminal = spec
                .terminal_index(name)
                .unwrap_or_else(|| panic!("no terminal named {}", name));
            Token::new(terminal, value)
        })
        .collect()
}

fn feed(tokens: Vec<Token<String>>) -> impl FnMut() -> Option<Token<String>> {
    let mut iter = tokens.into_iter();
    move || iter.next()
}

// Scenario 1: stratified expression grammar; the precedence of * over + is
// structural, and the semantic value is the evaluated integer.
#[test]
fn stratified_arithmetic_evaluates() {
    let grammar = Grammar::define(|g| {
        let plus = g.terminal("+")?;
        let minus = g.terminal("-")?;
        let star = g.terminal("*")?;
        let slash = g.terminal("/")?;
        let num = g.terminal("NUM")?;
        let expr = g.nonterminal("expr")?;
        let term = g.nonterminal("term")?;
        let factor = g.nonterminal("factor")?;
        g.rule(expr, [N(expr), T(plus), N(term)])?; // 1
        g.rule(expr, [N(expr), T(minus), N(term)])?; // 2
        g.rule(expr, [N(term)])?; // 3
        g.rule(term, [N(term), T(star), N(factor)])?; // 4
        g.rule(term, [N(term), T(slash), N(factor)])?; // 5
        g.rule(term, [N(factor)])?; // 6
        g.rule(factor, [T(num)])?; // 7
        Ok(())
    })
    .unwrap();

    let generated = generate(&grammar, &GeneratorOptions::new()).unwrap();
    assert!(generated.conflicts().is_empty());

    let parser = generated
        .parser::<i64>(vec![
            act(|_| 0),
            act(|args| args[0] + args[2]),
            act(|args| args[0] - args[2]),
            act(|args| args[0]),
            act(|args| args[0] * args[2]),
            act(|args| args[0] / args[2]),
            act(|args| args[0]),
            act(|args| args[0]),
        ])
        .unwrap();

    let spec = parser.spec();
    let input: Vec<Token<i64>> = tokens(spec, "NUM=1 + NUM=2 * NUM=3")
        .into_iter()
        .map(|t| Token::new(t.terminal, t.value.parse().unwrap_or(0)))
        .collect();
    let mut iter = input.into_iter();
    let value = parser
        .parse(move || iter.next(), |msg, _| panic!("{}", msg))
        .unwrap();
    assert_eq!(value, 7);
}

// Scenario 2: flat expression grammar disambiguated by precedence groups,
// with unary minus borrowing a higher level through `prec:`.
fn flat_expression(plus_minus: Assoc) -> (Grammar, Vec<SemanticAction<String>>) {
    let grammar = Grammar::define(|g| {
        let lt = g.terminal("<")?;
        let plus = g.terminal("+")?;
        let minus = g.terminal("-")?;
        let star = g.terminal("*")?;
        let slash = g.terminal("/")?;
        let num = g.terminal("NUM")?;
        let uminus = g.terminal("UMINUS")?;
        g.precedence(Assoc::Nonassoc, [lt])?;
        g.precedence(plus_minus, [plus, minus])?;
        g.precedence(Assoc::Left, [star, slash])?;
        g.precedence(Assoc::Nonassoc, [uminus])?;
        let e = g.nonterminal("e")?;
        g.rule(e, [N(e), T(lt), N(e)])?; // 1
        g.rule(e, [N(e), T(plus), N(e)])?; // 2
        g.rule(e, [N(e), T(minus), N(e)])?; // 3
        g.rule(e, [N(e), T(star), N(e)])?; // 4
        g.rule(e, [N(e), T(slash), N(e)])?; // 5
        g.rule_with_prec(e, [T(minus), N(e)], uminus)?; // 6
        g.rule(e, [T(num)])?; // 7
        Ok(())
    })
    .unwrap();

    let binary = |op: &'static str| {
        act(move |args: Vec<String>| format!("({}{}{})", args[0], op, args[2]))
    };
    let actions = vec![
        act(|_| String::new()),
        binary("<"),
        binary("+"),
        binary("-"),
        binary("*"),
        binary("/"),
        act(|args: Vec<String>| format!("(-{})", args[1])),
        act(|mut args: Vec<String>| args.pop().expect("NUM carries its text")),
    ];
    (grammar, actions)
}

#[test]
fn unary_minus_binds_tighter_than_multiplication() {
    let (grammar, actions) = flat_expression(Assoc::Left);
    let generated = generate(&grammar, &GeneratorOptions::new()).unwrap();
    assert!(generated.conflicts().is_empty());
    let parser = generated.parser(actions).unwrap();

    let input = tokens(parser.spec(), "- NUM=1 * NUM=2");
    let value = parser
        .parse(feed(input), |msg, _| panic!("{}", msg))
        .unwrap();
    assert_eq!(value, "((-1)*2)");
}

#[test]
fn associativity_decides_the_lean_of_an_operator_chain() {
    let (grammar, actions) = flat_expression(Assoc::Left);
    let generated = generate(&grammar, &GeneratorOptions::new()).unwrap();
    let parser = generated.parser(actions).unwrap();
    let input = tokens(parser.spec(), "NUM=1 - NUM=2 - NUM=3");
    let value = parser
        .parse(feed(input), |msg, _| panic!("{}", msg))
        .unwrap();
    assert_eq!(value, "((1-2)-3)");

    let (grammar, actions) = flat_expression(Assoc::Right);
    let generated = generate(&grammar, &GeneratorOptions::new()).unwrap();
    let parser = generated.parser(actions).unwrap();
    let input = tokens(parser.spec(), "NUM=1 - NUM=2 - NUM=3");
    let value = parser
        .parse(feed(input), |msg, _| panic!("{}", msg))
        .unwrap();
    assert_eq!(value, "(1-(2-3))");
}

#[test]
fn chained_nonassoc_operator_is_a_syntax_error() {
    let (grammar, actions) = flat_expression(Assoc::Left);
    let generated = generate(&grammar, &GeneratorOptions::new()).unwrap();
    let parser = generated.parser(actions).unwrap();

    let input = tokens(parser.spec(), "NUM=1 < NUM=2 < NUM=3");
    let mut errors = Vec::new();
    let outcome = parser.parse(feed(input), |msg, _| errors.push(msg.to_owned()));
    assert!(outcome.is_err());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("nonassociative"), "{}", errors[0]);
}

// Scenario 3: the dangling else. Shift wins, one conflict is reported, and
// the else binds to the inner if.
#[test]
fn dangling_else_prefers_the_inner_if() {
    let grammar = Grammar::define(|g| {
        let r#if = g.terminal("IF")?;
        let then = g.terminal("THEN")?;
        let r#else = g.terminal("ELSE")?;
        let cond = g.terminal("E")?;
        let simple = g.terminal("S")?;
        let stmt = g.nonterminal("stmt")?;
        g.rule(stmt, [T(r#if), T(cond), T(then), N(stmt)])?; // 1
        g.rule(stmt, [T(r#if), T(cond), T(then), N(stmt), T(r#else), N(stmt)])?; // 2
        g.rule(stmt, [T(simple)])?; // 3
        Ok(())
    })
    .unwrap();

    let generated = generate(&grammar, &GeneratorOptions::new().expect(1)).unwrap();
    assert_eq!(generated.conflicts().unresolved(), 1);

    let parser = generated
        .parser::<String>(vec![
            act(|_| String::new()),
            act(|args| format!("if({})", args[3])),
            act(|args| format!("ifelse({},{})", args[3], args[5])),
            act(|_| "s".to_owned()),
        ])
        .unwrap();

    let input = tokens(parser.spec(), "IF E THEN IF E THEN S ELSE S");
    let value = parser
        .parse(feed(input), |msg, _| panic!("{}", msg))
        .unwrap();
    assert_eq!(value, "if(ifelse(s,s))");
}

// Scenario 4: an `error SEMI` production resynchronizes after a malformed
// statement, the callback fires once, and the rest of the input parses.
#[test]
fn error_production_resynchronizes_on_semicolon() {
    let grammar = Grammar::define(|g| {
        let id = g.terminal("ID")?;
        let plus = g.terminal("+")?;
        let semi = g.terminal(";")?;
        let stmts = g.nonterminal("stmts")?;
        let stmt = g.nonterminal("stmt")?;
        let expr = g.nonterminal("expr")?;
        g.rule(stmts, [N(stmts), N(stmt)])?; // 1
        g.rule(stmts, [N(stmt)])?; // 2
        g.rule(stmt, [N(expr), T(semi)])?; // 3
        g.rule(stmt, [T(g.error_token()), T(semi)])?; // 4
        g.rule(expr, [N(expr), T(plus), T(id)])?; // 5
        g.rule(expr, [T(id)])?; // 6
        Ok(())
    })
    .unwrap();

    let generated = generate(&grammar, &GeneratorOptions::new()).unwrap();
    assert!(generated.conflicts().is_empty());

    let parser = generated
        .parser::<String>(vec![
            act(|_| String::new()),
            act(|args| format!("{},{}", args[0], args[1])),
            act(|mut args| args.pop().expect("one statement")),
            act(|mut args| args.swap_remove(0)),
            act(|_| "<err>".to_owned()),
            act(|args| format!("({}+{})", args[0], args[2])),
            act(|_| "id".to_owned()),
        ])
        .unwrap();

    let input = tokens(parser.spec(), "ID ID ; ID + ID ;");
    let mut errors = Vec::new();
    let value = parser
        .parse(feed(input), |msg, _| errors.push(msg.to_owned()))
        .unwrap();
    assert_eq!(errors.len(), 1, "exactly one error episode: {:?}", errors);
    assert_eq!(value, "<err>,(id+id)");
}

#[test]
fn recovery_gives_up_without_an_error_production() {
    let grammar = Grammar::define(|g| {
        let id = g.terminal("ID")?;
        let semi = g.terminal(";")?;
        let stmt = g.nonterminal("stmt")?;
        g.rule(stmt, [T(id), T(semi)])?;
        Ok(())
    })
    .unwrap();
    let generated = generate(&grammar, &GeneratorOptions::new()).unwrap();
    let parser = generated
        .parser::<String>(vec![act(|_| String::new()), act(|_| "s".to_owned())])
        .unwrap();

    let input = tokens(parser.spec(), "; ;");
    let mut errors = 0;
    let outcome = parser.parse(feed(input), |_, _| errors += 1);
    assert!(outcome.is_err());
    assert_eq!(errors, 1);
}

// Scenario 5: the ambiguous grammar S -> S S | a in GLR mode produces every
// grouping of `a a a`.
#[test]
fn glr_mode_yields_every_grouping() {
    let grammar = Grammar::define(|g| {
        let a = g.terminal("a")?;
        let s = g.nonterminal("s")?;
        g.rule(s, [N(s), N(s)])?; // 1
        g.rule(s, [T(a)])?; // 2
        Ok(())
    })
    .unwrap();

    let generated = generate(&grammar, &GeneratorOptions::new().glr()).unwrap();
    assert!(generated.conflicts().unresolved() > 0);

    let parser = generated
        .glr_parser::<String>(vec![
            glr_act(|_| String::new()),
            glr_act(|args| format!("({}{})", args[0], args[1])),
            glr_act(|_| "a".to_owned()),
        ])
        .unwrap();

    let input = tokens(parser.spec(), "a a a");
    let mut parses = parser
        .parse(feed(input), |msg, _| panic!("{}", msg))
        .unwrap();
    parses.sort();
    assert_eq!(parses, vec!["((aa)a)".to_owned(), "(a(aa))".to_owned()]);
}

// Scenario 6: a reduce/reduce conflict resolves to the smaller production id
// deterministically, and is retained in GLR mode.
fn reduce_reduce_grammar() -> Grammar {
    Grammar::define(|g| {
        let x = g.terminal("x")?;
        let s = g.nonterminal("s")?;
        let a = g.nonterminal("a")?;
        let b = g.nonterminal("b")?;
        g.rule(s, [N(a)])?; // 1
        g.rule(s, [N(b)])?; // 2
        g.rule(a, [T(x)])?; // 3
        g.rule(b, [T(x)])?; // 4
        Ok(())
    })
    .unwrap()
}

#[test]
fn reduce_reduce_is_deterministic_in_lalr_mode() {
    let generated = generate(&reduce_reduce_grammar(), &GeneratorOptions::new().expect(1)).unwrap();
    assert_eq!(generated.conflicts().unresolved(), 1);

    let parser = generated
        .parser::<String>(vec![
            act(|_| String::new()),
            act(|mut args| args.pop().expect("value")),
            act(|mut args| args.pop().expect("value")),
            act(|_| "a".to_owned()),
            act(|_| "b".to_owned()),
        ])
        .unwrap();
    let input = tokens(parser.spec(), "x");
    let value = parser
        .parse(feed(input), |msg, _| panic!("{}", msg))
        .unwrap();
    assert_eq!(value, "a");
}

#[test]
fn reduce_reduce_is_retained_in_glr_mode() {
    let generated = generate(&reduce_reduce_grammar(), &GeneratorOptions::new().glr()).unwrap();
    let parser = generated
        .glr_parser::<String>(vec![
            glr_act(|_| String::new()),
            glr_act(|args: &[String]| args[0].clone()),
            glr_act(|args: &[String]| args[0].clone()),
            glr_act(|_| "a".to_owned()),
            glr_act(|_| "b".to_owned()),
        ])
        .unwrap();
    let input = tokens(parser.spec(), "x");
    let mut parses = parser
        .parse(feed(input), |msg, _| panic!("{}", msg))
        .unwrap();
    parses.sort();
    assert_eq!(parses, vec!["a".to_owned(), "b".to_owned()]);
}

#[test]
fn artifacts_land_where_the_options_point() {
    let dir = std::env::temp_dir().join(format!("parlr-e2e-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let table_path = dir.join("expr.automaton");
    let driver_path = dir.join("expr_parser.rs");

    let grammar = Grammar::define(|g| {
        let num = g.terminal("NUM")?;
        let plus = g.terminal("PLUS")?;
        let e = g.nonterminal("expr")?;
        g.rule(e, [N(e), T(plus), T(num)])?;
        g.rule(e, [T(num)])?;
        Ok(())
    })
    .unwrap();

    let options = GeneratorOptions::new()
        .out_table(&table_path)
        .output("expr_parser", &driver_path);
    generate(&grammar, &options).unwrap();

    let dump = std::fs::read_to_string(&table_path).unwrap();
    assert!(dump.contains("#### state 0"));
    let driver = std::fs::read_to_string(&driver_path).unwrap();
    assert!(driver.contains("pub mod expr_parser"));
    assert!(driver.contains("parser_spec"));

    std::fs::remove_dir_all(&dir).ok();
}
