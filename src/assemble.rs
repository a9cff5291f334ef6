//! Program reassembly.
//!
//! Composes the final script text: header block, hoisted configuration,
//! passthrough code, and the invocation wrapper around the main procedure.
//! Passthrough text is emitted exactly as extracted; repeated builds of the
//! same input produce byte-identical output.

use crate::extract::{ExtractedProgram, MainForm};

/// Compose the final script.
///
/// Emission order: header; blank line; hoisted configuration declaration (if
/// present); passthrough statements and boundary comments in original order;
/// the invocation wrapper. The wrapper stays in the source's form family and
/// receives the hoisted configuration identifier as sole argument only when
/// the procedure declared a parameter.
pub fn assemble(header: &str, program: &ExtractedProgram) -> String {
    let mut out = String::with_capacity(
        header.len() + program.passthrough.len() + program.main.body.len() + 64,
    );
    out.push_str(header);
    out.push('\n');
    if let Some(config) = &program.config {
        out.push_str(&terminated(&config.declaration));
        out.push_str("\n\n");
    }
    if !program.passthrough.is_empty() {
        out.push_str(&program.passthrough);
        out.push_str("\n\n");
    }
    out.push_str(&invocation(program));
    out.push('\n');
    out
}

/// The hoisted declaration keeps its text verbatim, with a statement
/// terminator ensured so the following code cannot fuse with it.
fn terminated(declaration: &str) -> String {
    let trimmed = declaration.trim_end();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{trimmed};")
    }
}

fn invocation(program: &ExtractedProgram) -> String {
    let main = &program.main;
    let argument = match (&program.config, &main.parameter) {
        (Some(config), Some(_)) => config.name.as_str(),
        _ => "",
    };
    let parameter = main.parameter.as_deref().unwrap_or("");
    match main.form {
        MainForm::Arrow => format!("void (({parameter}) => {})({argument});", main.body),
        MainForm::FunctionExpr => match &main.name {
            Some(name) => format!(
                "void (function {name}({parameter}) {})({argument});",
                main.body
            ),
            None => format!("void (function ({parameter}) {})({argument});", main.body),
        },
        MainForm::Method => format!("void (function ({parameter}) {})({argument});", main.body),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::extract::extract;

    const HEADER: &str = "// ==UserScript==\n// @name         Demo\n// ==/UserScript==\n";

    #[test]
    fn arrow_main_with_config_is_invoked_with_the_hoisted_identifier() {
        let extracted = extract(
            "\
// @preserve scriptConfig
const cfg = { x: 1 }

defineUserScript({
  main: (cfg) => { console.log(cfg.x) },
})
",
        )
        .unwrap();

        assert_eq!(
            assemble(HEADER, &extracted),
            "\
// ==UserScript==
// @name         Demo
// ==/UserScript==

const cfg = { x: 1 };

void ((cfg) => { console.log(cfg.x) })(cfg);
"
        );
    }

    #[test]
    fn no_config_means_zero_argument_invocation() {
        let extracted = extract("defineUserScript({ main: (cfg) => { run(cfg) } })\n").unwrap();
        assert_eq!(
            assemble(HEADER, &extracted),
            "\
// ==UserScript==
// @name         Demo
// ==/UserScript==

void ((cfg) => { run(cfg) })();
"
        );
    }

    #[test]
    fn config_without_parameter_is_hoisted_but_not_passed() {
        let extracted = extract(
            "\
// @preserve scriptConfig
const options = { verbose: true };

defineUserScript({ main: () => { run() } })
",
        )
        .unwrap();

        assert_eq!(
            assemble(HEADER, &extracted),
            "\
// ==UserScript==
// @name         Demo
// ==/UserScript==

const options = { verbose: true };

void (() => { run() })();
"
        );
    }

    #[test]
    fn named_function_expression_keeps_its_name() {
        let extracted =
            extract("defineUserScript({ main: function boot() {\n  start();\n} })\n").unwrap();
        assert_eq!(
            assemble(HEADER, &extracted),
            "\
// ==UserScript==
// @name         Demo
// ==/UserScript==

void (function boot() {
  start();
})();
"
        );
    }

    #[test]
    fn method_shorthand_emits_in_the_function_expression_family() {
        let extracted = extract("defineUserScript({\n  main() {\n    start();\n  },\n})\n").unwrap();
        assert_eq!(
            assemble(HEADER, &extracted),
            "\
// ==UserScript==
// @name         Demo
// ==/UserScript==

void (function () {
    start();
  })();
"
        );
    }

    #[test]
    fn passthrough_sits_between_config_and_wrapper() {
        let extracted = extract(
            "\
// src/utils/log.ts
var log = (m) => console.log(m);

// @preserve scriptConfig
const cfg = { level: \"info\" };

defineUserScript({ main: (cfg) => { log(cfg.level) } })
",
        )
        .unwrap();

        assert_eq!(
            assemble(HEADER, &extracted),
            "\
// ==UserScript==
// @name         Demo
// ==/UserScript==

const cfg = { level: \"info\" };

// src/utils/log.ts
var log = (m) => console.log(m);

void ((cfg) => { log(cfg.level) })(cfg);
"
        );
    }
}
