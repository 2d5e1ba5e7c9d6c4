//! A small calculator: generates the expression tables at startup, then
//! evaluates the expression given on the command line.
//!
//! ```text
//! cargo run --example calculator -- '1 + 2 * (3 - 4)'
//! ```

use anyhow::Context as _;
use parlr::grammar::{Assoc, Grammar, SymbolID::*};
use parlr::runtime::spec::ParserSpec;
use parlr::runtime::Token;
use parlr::{generate, GeneratorOptions};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let input = std::env::args()
        .nth(1)
        .context("usage: calculator '<expression>'")?;

    let grammar = Grammar::define(|g| {
        let lparen = g.terminal("(")?;
        let rparen = g.terminal(")")?;
        let plus = g.terminal("+")?;
        let minus = g.terminal("-")?;
        let star = g.terminal("*")?;
        let slash = g.terminal("/")?;
        let num = g.terminal("NUM")?;
        let uminus = g.terminal("UMINUS")?;
        g.precedence(Assoc::Left, [plus, minus])?;
        g.precedence(Assoc::Left, [star, slash])?;
        g.precedence(Assoc::Nonassoc, [uminus])?;

        let expr = g.nonterminal("expr")?;
        g.rule(expr, [N(expr), T(plus), N(expr)])?; // 1
        g.rule(expr, [N(expr), T(minus), N(expr)])?; // 2
        g.rule(expr, [N(expr), T(star), N(expr)])?; // 3
        g.rule(expr, [N(expr), T(slash), N(expr)])?; // 4
        g.rule_with_prec(expr, [T(minus), N(expr)], uminus)?; // 5
        g.rule(expr, [T(lparen), N(expr), T(rparen)])?; // 6
        g.rule(expr, [T(num)])?; // 7
        Ok(())
    })?;

    let generated = generate(&grammar, &GeneratorOptions::new())?;
    let parser = generated.parser::<f64>(vec![
        Box::new(|_| 0.0),
        Box::new(|args| args[0] + args[2]),
        Box::new(|args| args[0] - args[2]),
        Box::new(|args| args[0] * args[2]),
        Box::new(|args| args[0] / args[2]),
        Box::new(|args| -args[1]),
        Box::new(|args| args[1]),
        Box::new(|args| args[0]),
    ])?;

    let mut tokens = lex(parser.spec(), &input)?.into_iter();
    let value = parser.parse(
        move || tokens.next(),
        |message, _token| eprintln!("{}", message),
    )?;
    println!("{}", value);
    Ok(())
}

fn lex(spec: &ParserSpec, input: &str) -> anyhow::Result<Vec<Token<f64>>> {
    let terminal = |name: &str| {
        spec.terminal_index(name)
            .with_context(|| format!("grammar has no terminal {}", name))
    };

    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        text.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = text.parse().with_context(|| format!("bad number {}", text))?;
                tokens.push(Token::new(terminal("NUM")?, value));
            }
            '(' | ')' | '+' | '-' | '*' | '/' => {
                chars.next();
                tokens.push(Token::new(terminal(&c.to_string())?, 0.0));
            }
            other => anyhow::bail!("unexpected character {:?}", other),
        }
    }
    Ok(tokens)
}
