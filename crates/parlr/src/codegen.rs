//! The driver emitter: renders the assembled tables as a self-contained Rust
//! module that reconstructs the [`ParserSpec`] with no dependency beyond
//! `parlr-runtime`. Build scripts write this to `OUT_DIR` and `include!` it.

use crate::util::display_fn;
use parlr_runtime::spec::{Action, ParserSpec, StateIdx, TerminalIdx};
use std::fmt;

/// Renders a generated parser module through `fmt::Display`.
pub struct Codegen<'a> {
    spec: &'a ParserSpec,
    module: &'a str,
}

impl<'a> Codegen<'a> {
    pub fn new(spec: &'a ParserSpec, module: &'a str) -> Self {
        Self { spec, module }
    }
}

impl fmt::Display for Codegen<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spec = self.spec;

        writeln!(f, "// This file is @generated by parlr. Do not edit by hand.")?;
        writeln!(f)?;
        writeln!(f, "#[allow(unused)]")?;
        writeln!(f, "pub mod {} {{", self.module)?;
        writeln!(
            f,
            "    use parlr_runtime::spec::{{Action as A, ParserSpec, RuleInfo, SpecParts}};"
        )?;

        // Named indices for identifier-safe terminals.
        writeln!(f, "\n    pub mod terminals {{")?;
        for t in 0..spec.terminal_count() as TerminalIdx {
            let name = spec.terminal_name(t);
            if is_ident(name) {
                writeln!(f, "        pub const {}: u16 = {};", name, t)?;
            }
        }
        writeln!(f, "    }}")?;

        writeln!(f, "\n    pub fn parser_spec() -> ParserSpec {{")?;

        writeln!(f, "        let actions = vec![")?;
        for state in 0..spec.state_count() as StateIdx {
            write!(f, "            ")?;
            for t in 0..spec.terminal_count() as TerminalIdx {
                emit_action(f, spec.action(state, t))?;
                f.write_str(", ")?;
            }
            writeln!(f, "// state {}", state)?;
        }
        writeln!(f, "        ];")?;

        writeln!(f, "        let gotos = vec![")?;
        for state in 0..spec.state_count() as StateIdx {
            write!(f, "            ")?;
            for n in 0..spec.nonterminal_count() as u16 {
                match spec.goto(state, n) {
                    Some(next) => write!(f, "Some({}), ", next)?,
                    None => f.write_str("None, ")?,
                }
            }
            writeln!(f, "// state {}", state)?;
        }
        writeln!(f, "        ];")?;

        writeln!(f, "        let rules = vec![")?;
        for rule in 0..spec.rule_count() as u16 {
            let info = spec.rule(rule);
            writeln!(
                f,
                "            RuleInfo {{ left: {}, arity: {}, name: {:?}.into() }},",
                info.left, info.arity, info.name
            )?;
        }
        writeln!(f, "        ];")?;

        write!(f, "        let terminal_names = vec![")?;
        for t in 0..spec.terminal_count() as TerminalIdx {
            write!(f, "{:?}.into(), ", spec.terminal_name(t))?;
        }
        writeln!(f, "];")?;

        write!(f, "        let nonterminal_names = vec![")?;
        for n in 0..spec.nonterminal_count() as u16 {
            write!(f, "{:?}.into(), ", spec.nonterminal_name(n))?;
        }
        writeln!(f, "];")?;

        writeln!(
            f,
            "        ParserSpec::from_parts(SpecParts {{ actions, gotos, rules, terminal_names, nonterminal_names }})"
        )?;
        writeln!(f, "            .expect(\"embedded tables are well-formed\")")?;
        writeln!(f, "    }}")?;
        writeln!(f, "}}")
    }
}

fn emit_action(f: &mut fmt::Formatter<'_>, action: &Action) -> fmt::Result {
    match action {
        Action::Shift(next) => write!(f, "A::Shift({})", next),
        Action::Reduce(rule) => write!(f, "A::Reduce({})", rule),
        Action::Accept => f.write_str("A::Accept"),
        Action::Fail => f.write_str("A::Fail"),
        Action::Error => f.write_str("A::Error"),
        Action::Conflict(list) => {
            f.write_str("A::Conflict(Box::new([")?;
            for action in list.iter() {
                emit_action(f, action)?;
                f.write_str(", ")?;
            }
            f.write_str("]))")
        }
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render a module and check the shape we promise to build scripts.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Grammar, SymbolID::*};
    use crate::{lalr, lr0, table, DriverKind};

    #[test]
    fn emitted_module_embeds_the_tables() {
        let g = Grammar::define(|g| {
            let num = g.terminal("NUM")?;
            let plus = g.terminal("+")?;
            let e = g.nonterminal("expr")?;
            g.rule(e, [N(e), T(plus), T(num)])?;
            g.rule(e, [T(num)])?;
            Ok(())
        })
        .unwrap();
        let automaton = lr0::lr0(&g);
        let data = lalr::lalr(&g, &automaton);
        let (spec, _) = table::assemble(&g, &automaton, &data, DriverKind::Lalr).unwrap();

        let module = Codegen::new(&spec, "parser").to_string();
        assert!(module.contains("pub mod parser {"));
        assert!(module.contains("pub fn parser_spec() -> ParserSpec {"));
        // NUM is identifier-safe, "+" is not.
        assert!(module.contains("pub const NUM: u16 = 2;"));
        assert!(!module.contains("pub const +"));
        assert!(module.contains("A::Accept"));
        assert!(module.contains("// state 0"));
    }
}
