//! Symbolic Model Code Generator CLI
//!
//! Usage:
//!   symcodegen model.json
//!   symcodegen model.json --function vfield
//!   cat model.json | symcodegen --no-reuse --json

use clap::Parser as ClapParser;
use colored::Colorize;
use env_logger::Env;
use log::debug;
use std::fs;
use std::io::{self, Read};

use symcodegen::{
    matlab, CodeGenerator, CodegenError, GeneratedModel, GeneratorConfig, ModelSpec, ReuseConfig,
};

#[derive(ClapParser, Debug)]
#[command(name = "symcodegen")]
#[command(version = "0.1.0")]
#[command(about = "Generates MATLAB vector field code from symbolic ODE models")]
struct Args {
    /// JSON model file; reads stdin when omitted
    #[arg(value_name = "MODEL")]
    input_file: Option<String>,

    /// Disable automatic reused-term discovery
    #[arg(long = "no-reuse")]
    no_reuse: bool,

    /// Occurrences a subexpression needs before it is hoisted
    #[arg(long = "min-occurrences", default_value_t = 2)]
    min_occurrences: usize,

    /// Output as JSON
    #[arg(short = 'j', long = "json")]
    json_output: bool,

    /// Print only the named function
    #[arg(short = 'f', long = "function")]
    function: Option<String>,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

impl Args {
    fn config(&self) -> GeneratorConfig {
        GeneratorConfig {
            reuse: ReuseConfig {
                enabled: !self.no_reuse,
                min_occurrences: self.min_occurrences,
                ..ReuseConfig::default()
            },
        }
    }
}

fn fail(kind: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", kind.red(), err);
    std::process::exit(1);
}

fn error_kind(err: &CodegenError) -> &'static str {
    match err {
        CodegenError::LexerError { .. } | CodegenError::ParseError { .. } => "Parse error",
        CodegenError::Json(_) => "Model error",
        CodegenError::NameCollision { .. } | CodegenError::UndefinedName { .. } => "Name error",
        _ => "Code generation error",
    }
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let source = if let Some(file) = &args.input_file {
        fs::read_to_string(file)
            .unwrap_or_else(|e| fail("Error", format!("Failed to read file '{}': {}", file, e)))
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .unwrap_or_else(|e| fail("Error", format!("Failed to read stdin: {}", e)));
        buffer
    };

    let model = ModelSpec::from_json(&source).unwrap_or_else(|e| fail(error_kind(&e), e));
    debug!(
        "loaded model `{}`: {} parameter(s), {} variable(s), {} auxiliary function(s)",
        model.name,
        model.parameters.len(),
        model.variables.len(),
        model.auxiliary.len()
    );

    let backend = matlab::backend().unwrap_or_else(|e| fail(error_kind(&e), e));
    let result = CodeGenerator::new(backend, &model, args.config())
        .and_then(|generator| generator.generate())
        .unwrap_or_else(|e| fail(error_kind(&e), e));

    if let Some(name) = &args.function {
        match result.function(name) {
            Some(function) => print!("{}", function.code),
            None => fail("Error", format!("model has no function named `{}`", name)),
        }
    } else if args.json_output {
        match result.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => fail("Error", format!("Failed to serialize to JSON: {}", e)),
        }
    } else {
        print_model(&result, args.verbose);
    }
}

fn print_model(model: &GeneratedModel, verbose: bool) {
    if verbose {
        eprintln!("{}", "Generation Results".bold().green());
        eprintln!("{}", "=".repeat(50));
        eprintln!("{}: {}", "Model".cyan(), model.model);
        eprintln!("{}: {}", "Target".cyan(), model.backend);
        for function in &model.functions {
            eprintln!("  {} ({:?})", function.name.bold(), function.kind);
        }
        eprintln!();
    }

    for function in &model.functions {
        println!("{}", function.code);
    }
}
