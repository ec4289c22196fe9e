use std::{env, fs, process::ExitCode, time::Instant};

use cinder::{
    CodeImage, Exception, Interpreter, NoLimitTracker, Object, PrintWriter, ProfilingTracer, Runner, StdPrint,
    StderrTracer, VmTracer, disassemble,
};

const USAGE: &str = "usage: cinder [dis|profile|trace] <image>";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let (command, path) = match args.as_slice() {
        [path] => ("run", path.as_str()),
        [command, path] => (command.as_str(), path.as_str()),
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let image = match read_image(path) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match command {
        "run" => finish(Runner::new(image).run_no_limits()),
        "dis" => {
            print!("{}", disassemble(&image));
            ExitCode::SUCCESS
        }
        "profile" => {
            let start = Instant::now();
            let (result, interp) = run_traced(image, ProfilingTracer::new());
            let elapsed = start.elapsed();
            eprint!("{}", interp.tracer().report());
            eprintln!("time taken: {elapsed:?}");
            finish(result)
        }
        "trace" => finish(run_traced(image, StderrTracer::new()).0),
        other => {
            eprintln!("unknown command '{other}'\n{USAGE}");
            ExitCode::FAILURE
        }
    }
}

fn run_traced<Tr: VmTracer>(image: CodeImage, tracer: Tr) -> (Result<Object, Exception>, Interpreter<NoLimitTracker, Tr>) {
    let mut interp = Interpreter::with_tracker(NoLimitTracker, tracer);
    let result = Runner::new(image).run_in(&mut interp);
    (result, interp)
}

fn finish(result: Result<Object, Exception>) -> ExitCode {
    match result {
        Ok(value) => {
            print_result(&value);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn print_result(value: &Object) {
    if *value == Object::None {
        return;
    }
    let mut out = StdPrint::default();
    if let Err(err) = out.write_line(&value.repr()) {
        eprintln!("{err}");
    }
}

fn read_image(path: &str) -> Result<CodeImage, String> {
    let bytes = fs::read(path).map_err(|err| format!("reading {path}: {err}"))?;
    CodeImage::load(&bytes).map_err(|err| format!("decoding {path}: {err}"))
}
