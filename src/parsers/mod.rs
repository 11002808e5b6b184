//! Built-in parsers
//!
//! | Parser | Id | Priority | Multi-line |
//! |--------|----|----------|------------|
//! | [`GoParser`] | `go` | 90 | panics |
//! | [`TypeScriptParser`] | `typescript` | 90 | pretty `tsc` output |
//! | [`PythonParser`] | `python` | 90 | tracebacks |
//! | [`RustParser`] | `rust` | 90 | rustc diagnostics, panics |
//! | [`InfrastructureParser`] | `infrastructure` | 70 | no |
//! | [`GenericParser`] | `generic` | 0 | no |

pub mod generic;
pub mod go;
pub mod infrastructure;
pub mod python;
pub mod rust;
pub mod typescript;

pub use generic::GenericParser;
pub use go::GoParser;
pub use infrastructure::InfrastructureParser;
pub use python::PythonParser;
pub use rust::RustParser;
pub use typescript::TypeScriptParser;

use crate::parser::Parser;

/// Id of the generic fallback parser, excluded from support reporting
pub const GENERIC_ID: &str = "generic";

/// Priority shared by the dedicated language parsers
pub const LANGUAGE_PRIORITY: i32 = 90;

/// Priority of the infrastructure parser
pub const INFRASTRUCTURE_PRIORITY: i32 = 70;

/// Priority of the generic fallback
pub const GENERIC_PRIORITY: i32 = 0;

/// Fresh instances of every built-in parser
pub fn default_parsers() -> Vec<Box<dyn Parser>> {
    vec![
        Box::new(GoParser::new()),
        Box::new(TypeScriptParser::new()),
        Box::new(PythonParser::new()),
        Box::new(RustParser::new()),
        Box::new(InfrastructureParser::new()),
        Box::new(GenericParser::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parsers_ids_unique() {
        let parsers = default_parsers();
        let mut ids: Vec<&str> = parsers.iter().map(|p| p.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), parsers.len());
    }

    #[test]
    fn test_priorities() {
        for parser in default_parsers() {
            match parser.id() {
                GENERIC_ID => assert_eq!(parser.priority(), GENERIC_PRIORITY),
                "infrastructure" => assert_eq!(parser.priority(), INFRASTRUCTURE_PRIORITY),
                _ => assert!(parser.priority() > INFRASTRUCTURE_PRIORITY),
            }
        }
    }
}
