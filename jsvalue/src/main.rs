use clap::Parser as ClapParser;
use std::process;

use jsvalue::{Engine, EngineSettings, RopeString, Value, to_boolean};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Literals to box: undefined, null, true, false, a number, or any
    /// other text as a string
    #[arg(required = false)]
    literals: Vec<String>,

    /// Join the string literals into one rope before inspecting
    #[arg(long, help = "Concatenate string literals into a rope")]
    concat: bool,

    /// Log verbosity, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Bound on the dynamic scope chain
    #[arg(long, default_value_t = EngineSettings::default().max_scope_depth)]
    max_scope_depth: usize,
}

fn parse_literal(text: &str) -> Value {
    match text {
        "undefined" => Value::Undefined,
        "null" => Value::NULL,
        "true" => Value::TRUE,
        "false" => Value::FALSE,
        _ => text
            .parse::<f64>()
            .map_or_else(|_| Value::from(text), Value::from),
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let mut engine = Engine::new(EngineSettings {
        max_scope_depth: cli.max_scope_depth,
        ..EngineSettings::default()
    });

    let mut values: Vec<Value> = cli.literals.iter().map(|s| parse_literal(s)).collect();
    if cli.concat {
        let (strings, rest): (Vec<_>, Vec<_>) = values.into_iter().partition(Value::is_string);
        let rope = strings
            .iter()
            .filter_map(Value::as_string)
            .fold(RopeString::empty(), |rope, s| {
                RopeString::concat(rope, RopeString::leaf(s))
            });
        values = rest;
        values.push(Value::from(rope));
    }

    for value in &values {
        let word = match engine.pack(value) {
            Ok(word) => word,
            Err(err) => {
                eprintln!("Error packing {value}: {err}");
                process::exit(1);
            }
        };
        let tag = value.tag();
        println!("{value}");
        println!("  tag        {tag} ({})", tag.code());
        println!("  field      {}", tag.field_name());
        println!("  typeof     {}", value.type_of());
        println!("  word       {:#018x}", word.bits());
        println!(
            "  predicates tagged={} primitive={} object={} function={} truthy={}",
            value.is_tagged(),
            value.is_primitive(),
            value.is_object(),
            value.is_function(),
            to_boolean(value),
        );
    }
}
