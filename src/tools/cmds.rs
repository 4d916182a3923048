use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::rc::Rc;

use crate::compiler::environment::{DiagnosticSink, Diagnostics, ModuleEnvironment};
use crate::compiler::pog::driver::{generate, CancelToken, DefaultPogOpts, PogOpts};
use crate::compiler::typedtree::Module;
use crate::tools::argparse::{
    ArgumentParser, ArgumentValue, IntConversion, TArgOptionAction, Argument,
};
use crate::util::version;

fn pog_parser() -> ArgumentParser {
    let mut parser = ArgumentParser::new(
        "pog",
        "Generate the proof obligations of a type checked VDM module.",
    );
    parser.add_argument(
        &["--version"],
        Argument::new()
            .set_action(TArgOptionAction::StoreTrue)
            .set_help("show the version and exit"),
    );
    parser.add_argument(
        &["-j", "--json"],
        Argument::new()
            .set_action(TArgOptionAction::StoreTrue)
            .set_help("print obligations as json"),
    );
    parser.add_argument(
        &["-p", "--po"],
        Argument::new()
            .set_action(TArgOptionAction::Append)
            .set_type(Rc::new(IntConversion {}))
            .set_help("show only obligation N (repeatable)"),
    );
    parser.add_argument(
        &["-n", "--name"],
        Argument::new()
            .set_action(TArgOptionAction::Append)
            .set_help("show only obligations of definitions matching REGEX (repeatable)"),
    );
    parser.add_argument(
        &["--no-ambiguity-checks"],
        Argument::new()
            .set_action(TArgOptionAction::StoreTrue)
            .set_help("do not report ambiguous updates as obligations"),
    );
    parser.add_argument(
        &["--no-recursion-warnings"],
        Argument::new()
            .set_action(TArgOptionAction::StoreTrue)
            .set_help("do not warn about recursive functions without a measure"),
    );
    parser.add_argument(
        &["--max-alternatives"],
        Argument::new()
            .set_type(Rc::new(IntConversion {}))
            .set_help("largest number of alternatives one obligation may expand to"),
    );
    parser.add_argument(
        &["module"],
        Argument::new()
            .set_optional()
            .set_help("path to a type checked module in json form"),
    );
    parser
}

fn flag(parsed: &HashMap<String, ArgumentValue>, name: &str) -> bool {
    matches!(parsed.get(name), Some(ArgumentValue::ArgBool(true)))
}

fn list<T, F>(parsed: &HashMap<String, ArgumentValue>, name: &str, f: F) -> Vec<T>
where
    F: Fn(&ArgumentValue) -> Option<T>,
{
    match parsed.get(name) {
        Some(ArgumentValue::ArgArray(l)) => l.iter().filter_map(f).collect(),
        _ => vec![],
    }
}

/// Run the generator as directed by the command line and return what should
/// be printed.  The first element of args is the program name.
pub fn launch_pog(args: &[String]) -> Result<String, String> {
    let parser = pog_parser();
    let parsed = parser.parse_args(args.get(1..).unwrap_or(&[]))?;

    if flag(&parsed, "version") {
        return Ok(version());
    }

    let path = match parsed.get("module") {
        Some(ArgumentValue::ArgString(p)) => p.clone(),
        _ => {
            return Err(format!(
                "{}\n\nError: no module given",
                parser.compile_help_messages()
            ))
        }
    };
    let text = fs::read_to_string(&path).map_err(|e| format!("error reading {}: {}", path, e))?;
    let module: Module =
        serde_json::from_str(&text).map_err(|e| format!("error parsing {}: {}", path, e))?;

    let mut opts: Rc<dyn PogOpts> = Rc::new(DefaultPogOpts::new(&path));
    if flag(&parsed, "no_ambiguity_checks") {
        opts = opts.set_ambiguity_checks(false);
    }
    if flag(&parsed, "no_recursion_warnings") {
        opts = opts.set_recursion_warnings(false);
    }
    if let Some(ArgumentValue::ArgInt(n)) = parsed.get("max_alternatives") {
        if *n < 1 {
            return Err(format!("--max-alternatives must be positive, not {}", n));
        }
        opts = opts.set_max_alternatives(*n as usize);
    }

    let diagnostics = Rc::new(Diagnostics::new());
    let sink: Rc<dyn DiagnosticSink> = diagnostics.clone();
    let env = ModuleEnvironment::new(&module, sink);
    let result = generate(opts, &env, &module, &CancelToken::new()).map_err(|e| e.to_string())?;

    let numbers = list(&parsed, "po", |v| match v {
        ArgumentValue::ArgInt(n) if *n > 0 => Some(*n as usize),
        _ => None,
    });
    let names = list(&parsed, "name", |v| match v {
        ArgumentValue::ArgString(s) => Some(s.clone()),
        _ => None,
    });
    let selected = result
        .obligations
        .select(&numbers, &names)
        .map_err(|e| e.to_string())?;

    if flag(&parsed, "json") {
        let warnings: Vec<serde_json::Value> = diagnostics
            .entries()
            .iter()
            .map(|d| json!({ "location": d.loc.to_string(), "message": d.message }))
            .collect();
        let out = json!({
            "module": module.name,
            "complete": result.complete,
            "obligations": selected.to_json(),
            "warnings": warnings
        });
        return serde_json::to_string_pretty(&out).map_err(|e| e.to_string());
    }

    let mut out = selected.to_string();
    for d in diagnostics.entries().iter() {
        out += &format!("Warning {}: {}\n", d.loc, d.message);
    }
    if !result.complete {
        out += "Generation was cancelled; the list is incomplete.\n";
    }
    Ok(out)
}

pub fn pog(args: &[String]) {
    crate::tools::log::init();
    match launch_pog(args) {
        Ok(out) => {
            if let Err(e) = io::stdout().write_all(out.as_bytes()) {
                eprintln!("{}", e);
            }
            io::stdout().flush().ok();
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
