use std::env;
use std::fs;
use std::process::ExitCode;

fn run() -> Result<String, String> {
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "subc".to_string());
    let Some(path) = args.next() else {
        return Err(format!("usage: {program} <source-path>"));
    };

    let source = fs::read_to_string(&path).map_err(|e| format!("{path}: {e}"))?;
    subc::compile(&source).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(asm) => {
            print!("{asm}");
            ExitCode::SUCCESS
        }
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
