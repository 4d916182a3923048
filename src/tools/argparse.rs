use std::collections::HashMap;
use std::rc::Rc;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum TArgOptionAction {
    Store,
    StoreTrue,
    Append,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgumentValue {
    ArgString(String),
    ArgInt(i64),
    ArgBool(bool),
    ArgArray(Vec<ArgumentValue>),
}

pub trait ArgumentValueConv {
    fn convert(&self, arg: &str) -> Result<ArgumentValue, String>;
}

struct EmptyConversion {}
impl ArgumentValueConv for EmptyConversion {
    fn convert(&self, arg: &str) -> Result<ArgumentValue, String> {
        Ok(ArgumentValue::ArgString(arg.to_string()))
    }
}

pub struct IntConversion {}
impl ArgumentValueConv for IntConversion {
    fn convert(&self, arg: &str) -> Result<ArgumentValue, String> {
        arg.parse::<i64>()
            .map(ArgumentValue::ArgInt)
            .map_err(|_| format!("expected a number but found {}", arg))
    }
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct Argument {
    action: TArgOptionAction,
    #[derivative(Debug = "ignore")]
    typeofarg: Rc<dyn ArgumentValueConv>,
    default: Option<ArgumentValue>,
    help: String,
    optional: bool,
}

impl Default for Argument {
    fn default() -> Self {
        Argument {
            action: TArgOptionAction::Store,
            typeofarg: Rc::new(EmptyConversion {}),
            default: None,
            help: "".to_string(),
            optional: false,
        }
    }
}

impl Argument {
    pub fn new() -> Self {
        Argument::default()
    }

    pub fn set_action(self, a: TArgOptionAction) -> Self {
        let mut s = self;
        s.action = a;
        s
    }
    pub fn set_type(self, t: Rc<dyn ArgumentValueConv>) -> Self {
        let mut s = self;
        s.typeofarg = t;
        s
    }
    pub fn set_default(self, v: ArgumentValue) -> Self {
        let mut s = self;
        s.default = Some(v);
        s
    }
    pub fn set_help(self, h: &str) -> Self {
        let mut s = self;
        s.help = h.to_string();
        s
    }
    /// A positional argument that may be left out.
    pub fn set_optional(self) -> Self {
        let mut s = self;
        s.optional = true;
        s
    }
}

#[derive(Debug, Clone)]
struct Arg {
    names: Vec<String>,
    options: Argument,
}

fn is_optional(arg: &str) -> bool {
    arg.starts_with('-') && arg.len() > 1
}

#[derive(Debug, Clone)]
pub struct ArgumentParser {
    prog: String,
    desc: String,
    positional_args: Vec<Arg>,
    optional_args: Vec<Arg>,
}

impl ArgumentParser {
    pub fn new(prog: &str, desc: &str) -> ArgumentParser {
        let mut start = ArgumentParser {
            prog: prog.to_string(),
            desc: desc.to_string(),
            positional_args: vec![],
            optional_args: vec![],
        };
        start.add_argument(
            &["-h", "--help"],
            Argument::new()
                .set_help("show this help message")
                .set_action(TArgOptionAction::StoreTrue),
        );
        start
    }

    pub fn add_argument(&mut self, names: &[&str], options: Argument) {
        let arg = Arg {
            names: names.iter().map(|n| n.to_string()).collect(),
            options,
        };
        if names.len() == 1 && !is_optional(names[0]) {
            self.positional_args.push(arg);
        } else {
            self.optional_args.push(arg);
        }
    }

    fn optional_arg_name(arg: &Arg) -> String {
        let name = arg
            .names
            .iter()
            .find(|n| n.starts_with("--"))
            .or_else(|| arg.names.first())
            .cloned()
            .unwrap_or_default();
        name.trim_start_matches('-').replace('-', "_")
    }

    fn error(&self, msg: &str) -> String {
        format!("{}\n\nError: {}", self.compile_help_messages(), msg)
    }

    /// Parse arguments, not including the program name.  Asking for help
    /// comes back as an Err holding the usage text.
    pub fn parse_args(&self, args: &[String]) -> Result<HashMap<String, ArgumentValue>, String> {
        let mut params: HashMap<String, ArgumentValue> = HashMap::new();
        for a in self.optional_args.iter() {
            if let Some(dv) = &a.options.default {
                params.insert(ArgumentParser::optional_arg_name(a), dv.clone());
            }
        }

        let mut positional: Vec<&String> = vec![];
        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            i += 1;
            if !is_optional(arg) {
                positional.push(arg);
                continue;
            }

            let optional_arg = self
                .optional_args
                .iter()
                .find(|a| a.names.iter().any(|n| n == arg))
                .ok_or_else(|| self.error(&format!("Unknown option: {}", arg)))?;
            let name = ArgumentParser::optional_arg_name(optional_arg);

            if optional_arg.options.action == TArgOptionAction::StoreTrue {
                params.insert(name, ArgumentValue::ArgBool(true));
                continue;
            }

            let value = args
                .get(i)
                .ok_or_else(|| self.error(&format!("{} requires a value", name)))?;
            i += 1;
            let converted = optional_arg
                .options
                .typeofarg
                .convert(value)
                .map_err(|e| self.error(&e))?;

            match optional_arg.options.action {
                TArgOptionAction::Append => {
                    let mut list = match params.get(&name) {
                        Some(ArgumentValue::ArgArray(l)) => l.clone(),
                        _ => vec![],
                    };
                    list.push(converted);
                    params.insert(name, ArgumentValue::ArgArray(list));
                }
                _ => {
                    params.insert(name, converted);
                }
            }
        }

        if params.contains_key("help") {
            return Err(self.compile_help_messages());
        }

        let mut remaining = positional.into_iter();
        for a in self.positional_args.iter() {
            let name = &a.names[0];
            match remaining.next() {
                Some(v) => {
                    let converted = a.options.typeofarg.convert(v).map_err(|e| self.error(&e))?;
                    params.insert(name.clone(), converted);
                }
                None => {
                    if let Some(dv) = &a.options.default {
                        params.insert(name.clone(), dv.clone());
                    } else if !a.options.optional {
                        return Err(self.error(&format!(
                            "The following arguments are required: {}",
                            name
                        )));
                    }
                }
            }
        }
        if let Some(extra) = remaining.next() {
            return Err(self.error(&format!("Unexpected argument: {}", extra)));
        }

        Ok(params)
    }

    pub fn compile_help_messages(&self) -> String {
        let line = |a: &Arg| {
            let mut msg = format!(" {}", a.names.join(", "));
            if !a.options.help.is_empty() {
                msg += &format!("  {}", a.options.help);
            }
            msg
        };

        let opts: Vec<String> = self
            .optional_args
            .iter()
            .map(|a| format!("[{}]", a.names[0]))
            .collect();
        let positionals: Vec<String> =
            self.positional_args.iter().map(|a| a.names[0].clone()).collect();
        let mut messages = vec![
            format!("usage: {} {} {}", self.prog, opts.join(" "), positionals.join(" ")),
            "".to_string(),
            self.desc.clone(),
        ];

        if !self.positional_args.is_empty() {
            messages.push("".to_string());
            messages.push("positional arguments:".to_string());
            for a in self.positional_args.iter() {
                messages.push(line(a));
            }
        }
        messages.push("".to_string());
        messages.push("optional arguments:".to_string());
        for a in self.optional_args.iter() {
            messages.push(line(a));
        }

        messages.join("\n")
    }
}
